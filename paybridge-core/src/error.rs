use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString};
use thiserror::Error;

/// Result alias used across the bridge.
pub type PayBridgeResult<T, E = PayBridgeError> = std::result::Result<T, E>;

/// The named reasons a caller request can be rejected with.
///
/// The string form (camelCase) is the key the host uses in its error-code map,
/// see [`crate::ErrorCatalog`].
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    AsRefStr,
    Display,
    EnumIter,
    EnumString,
    Serialize,
    Deserialize,
    uniffi::Enum,
)]
#[strum(serialize_all = "camelCase")]
#[serde(rename_all = "camelCase")]
pub enum ErrorKind {
    /// A redirect was required but no foreground display surface was available.
    ActivityUnavailable,
    /// The user left the external browser without returning, or the source was canceled.
    RedirectCancelled,
    /// The return event carried a client secret that does not belong to the in-flight source.
    RedirectNoSource,
    /// The return event carried a source id that does not match the in-flight source.
    RedirectWrongSourceId,
    /// The source ended up failed (or in a status the bridge does not recognize).
    RedirectFailed,
    /// The payment SDK refused to create the source.
    SourceCreationFailed,
    /// A redirect request is already outstanding on this session.
    RequestInProgress,
    /// `complete_redirect_flow` was called without a previously created source.
    NoCreatedSource,
}

/// Error outputs from `PayBridge`
#[derive(Debug, Clone, PartialEq, Eq, Error, uniffi::Error)]
pub enum PayBridgeError {
    /// The outstanding caller request was rejected.
    ///
    /// `code` and `message` are resolved through the session's error catalog.
    #[error("{code}: {message}")]
    Rejected {
        /// Which failure occurred.
        kind: ErrorKind,
        /// The host-facing error code.
        code: String,
        /// Human readable description.
        message: String,
    },
    /// The presented input is not valid for the requested operation
    #[error("invalid_input_{attribute}: {reason}")]
    InvalidInput {
        /// The attribute that is invalid
        attribute: String,
        /// The reason the input is invalid
        reason: String,
    },
    /// Unexpected `UniFFI` callback error.
    #[error("unexpected uniffi callback error: {0}")]
    UnexpectedUniFFICallbackError(String),
}

impl PayBridgeError {
    /// Returns the rejection kind, if this error settled a caller request.
    #[must_use]
    pub const fn kind(&self) -> Option<ErrorKind> {
        match self {
            Self::Rejected { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    pub(crate) fn invalid_input(attribute: &str, reason: &str) -> Self {
        Self::InvalidInput {
            attribute: attribute.to_string(),
            reason: reason.to_string(),
        }
    }
}

impl From<uniffi::UnexpectedUniFFICallbackError> for PayBridgeError {
    fn from(error: uniffi::UnexpectedUniFFICallbackError) -> Self {
        Self::UnexpectedUniFFICallbackError(error.reason)
    }
}
