//! `PayBridge` is the crate hosts link against to get Kotlin and Swift bindings.
//!
//! All functionality lives in `paybridge-core`; this crate re-exports it and its
//! `UniFFI` scaffolding.

pub use paybridge_core::*;

paybridge_core::uniffi_reexport_scaffolding!();
