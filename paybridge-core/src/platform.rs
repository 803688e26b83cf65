//! Interfaces implemented by the host: the native payment SDK and the external browsing surface.

use thiserror::Error;

use crate::source::{Source, SourceParams};

/// Errors reported by the payment SDK.
#[derive(Debug, Error, uniffi::Error)]
pub enum SdkError {
    /// The SDK call failed (network, API or validation error).
    #[error("sdk error: {message}")]
    Failed {
        /// Message reported by the SDK.
        message: String,
    },
    /// Unexpected `UniFFI` callback error.
    #[error("unexpected uniffi callback error: {0}")]
    UnexpectedUniFFICallbackError(String),
}

impl SdkError {
    /// The message to surface to the caller.
    #[must_use]
    pub fn message(&self) -> String {
        match self {
            Self::Failed { message } | Self::UnexpectedUniFFICallbackError(message) => {
                message.clone()
            }
        }
    }
}

impl From<uniffi::UnexpectedUniFFICallbackError> for SdkError {
    fn from(error: uniffi::UnexpectedUniFFICallbackError) -> Self {
        Self::UnexpectedUniFFICallbackError(error.reason)
    }
}

/// Errors reported by the external browsing surface.
#[derive(Debug, Error, uniffi::Error)]
pub enum SurfaceError {
    /// The surface could not open the URL.
    #[error("surface error: {message}")]
    OpenFailed {
        /// Message reported by the platform.
        message: String,
    },
    /// Unexpected `UniFFI` callback error.
    #[error("unexpected uniffi callback error: {0}")]
    UnexpectedUniFFICallbackError(String),
}

impl From<uniffi::UnexpectedUniFFICallbackError> for SurfaceError {
    fn from(error: uniffi::UnexpectedUniFFICallbackError) -> Self {
        Self::UnexpectedUniFFICallbackError(error.reason)
    }
}

/// The native payment SDK.
///
/// Every method blocks; the bridge always calls them from a background worker.
#[uniffi::export(with_foreign)]
pub trait PaymentSdk: Send + Sync {
    /// Configures the SDK with the merchant publishable key.
    ///
    /// # Errors
    ///
    /// Returns an error if the SDK rejects the key.
    fn set_publishable_key(&self, publishable_key: String) -> Result<(), SdkError>;

    /// Creates a source.
    ///
    /// # Errors
    ///
    /// Returns an error if the SDK cannot create the source.
    fn create_source(&self, params: SourceParams) -> Result<Source, SdkError>;

    /// Retrieves the current state of a source.
    ///
    /// The returned status should come from [`crate::source_status_from_sdk`]
    /// applied to the SDK's raw status string.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    fn retrieve_source(
        &self,
        source_id: String,
        client_secret: String,
    ) -> Result<Source, SdkError>;
}

/// The platform surface that shows the external authentication page.
#[uniffi::export(with_foreign)]
pub trait RedirectSurface: Send + Sync {
    /// Whether a foreground display surface exists to launch the browser from.
    fn is_available(&self) -> bool;

    /// Opens `url` in the external browser and returns without waiting for it to close.
    ///
    /// # Errors
    ///
    /// Returns an error if the browser could not be launched.
    fn open_url(&self, url: String) -> Result<(), SurfaceError>;
}
