//! `paybridge-core` bridges a host application to a payment SDK for sources that
//! are completed on an external authentication page.
//!
//! A [`RedirectSession`] creates the source, opens the redirect, matches the
//! return event against the in-flight source and polls its status until the
//! caller can be settled. The payment SDK and the browsing surface are provided
//! by the host through the [`PaymentSdk`] and [`RedirectSurface`] foreign traits.

#![deny(clippy::all, clippy::pedantic, clippy::nursery)]

mod config;
pub use config::*;

mod error;
pub use error::*;

mod platform;
pub use platform::*;

mod redirect;
pub use redirect::*;

mod session;
pub use session::*;

mod source;
pub use source::*;

/// Forwards the bridge's log records to the host.
pub mod logger;

pub mod testing;

// private modules
mod correlator;
mod launcher;
mod poller;
mod registry;
mod resolver;

#[cfg(test)]
mod test_utils;

uniffi::setup_scaffolding!("paybridge_core");
