//! Generates the Kotlin and Swift bindings for `PayBridge`.

fn main() {
    uniffi::uniffi_bindgen_main();
}
