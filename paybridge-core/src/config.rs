//! Host-supplied configuration: publishable key, error codes and the poll policy.

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;

use crate::error::{ErrorKind, PayBridgeError, PayBridgeResult};

/// Maximum number of re-queries while a source stays `pending`.
pub const DEFAULT_MAX_POLL_RETRIES: u32 = 10;
/// Delay between two status queries, in milliseconds.
pub const DEFAULT_RETRY_DELAY_MS: u64 = 1_000;
/// Hard timeout applied to each individual status query, in milliseconds.
pub const DEFAULT_QUERY_TIMEOUT_MS: u64 = 60_000;

/// Options passed by the host on `init`.
#[derive(Debug, Clone, Default, PartialEq, Eq, uniffi::Record)]
pub struct InitOptions {
    /// The merchant publishable key forwarded to the payment SDK.
    pub publishable_key: Option<String>,
}

/// A host-facing `(errorCode, description)` pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, uniffi::Record)]
#[serde(rename_all = "camelCase")]
pub struct ErrorDescriptor {
    /// The code the host promise is rejected with.
    pub error_code: String,
    /// The message attached to the rejection.
    pub description: String,
}

/// Maps every [`ErrorKind`] to the code and description surfaced to the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorCatalog {
    entries: HashMap<ErrorKind, ErrorDescriptor>,
}

impl ErrorCatalog {
    /// Builds a catalog from the host's error-code map.
    ///
    /// Keys are the camelCase [`ErrorKind`] names. Unknown keys are skipped and
    /// missing kinds keep their defaults.
    #[must_use]
    pub fn from_host(error_codes: HashMap<String, ErrorDescriptor>) -> Self {
        let mut catalog = Self::default();
        for (key, descriptor) in error_codes {
            match key.parse::<ErrorKind>() {
                Ok(kind) => {
                    catalog.entries.insert(kind, descriptor);
                }
                Err(_) => log::warn!("ignoring unknown error code key `{key}`"),
            }
        }
        catalog
    }

    /// Returns the descriptor for `kind`.
    #[must_use]
    pub fn descriptor(&self, kind: ErrorKind) -> ErrorDescriptor {
        self.entries
            .get(&kind)
            .cloned()
            .unwrap_or_else(|| default_descriptor(kind))
    }

    /// All entries, ordered by kind declaration.
    #[must_use]
    pub fn entries(&self) -> Vec<(ErrorKind, ErrorDescriptor)> {
        ErrorKind::iter()
            .map(|kind| (kind, self.descriptor(kind)))
            .collect()
    }

    /// Builds the rejection for `kind` using the catalog's code and description.
    #[must_use]
    pub fn rejection(&self, kind: ErrorKind) -> PayBridgeError {
        let ErrorDescriptor {
            error_code,
            description,
        } = self.descriptor(kind);
        PayBridgeError::Rejected {
            kind,
            code: error_code,
            message: description,
        }
    }

    /// Builds the rejection for `kind` with the catalog's code but a caller-provided message.
    #[must_use]
    pub fn rejection_with_message(&self, kind: ErrorKind, message: String) -> PayBridgeError {
        PayBridgeError::Rejected {
            kind,
            code: self.descriptor(kind).error_code,
            message,
        }
    }
}

impl Default for ErrorCatalog {
    fn default() -> Self {
        Self {
            entries: ErrorKind::iter()
                .map(|kind| (kind, default_descriptor(kind)))
                .collect(),
        }
    }
}

fn default_descriptor(kind: ErrorKind) -> ErrorDescriptor {
    let (error_code, description) = match kind {
        ErrorKind::ActivityUnavailable => {
            ("activityUnavailable", "Activity is not available")
        }
        ErrorKind::RedirectCancelled => ("redirectCancelled", "Redirect was cancelled"),
        ErrorKind::RedirectNoSource => {
            ("redirectNoSource", "Received redirect uri but there is no source")
        }
        ErrorKind::RedirectWrongSourceId => (
            "redirectWrongSourceId",
            "Received wrong source id in redirect uri",
        ),
        ErrorKind::RedirectFailed => ("redirectFailed", "Redirect failed"),
        ErrorKind::SourceCreationFailed => ("initSourceFail", "Failed to create source"),
        ErrorKind::RequestInProgress => (
            "requestInProgress",
            "Another source redirect is still in progress",
        ),
        ErrorKind::NoCreatedSource => {
            ("noCreatedSource", "There is no created source to redirect")
        }
    };
    ErrorDescriptor {
        error_code: error_code.to_string(),
        description: description.to_string(),
    }
}

/// Retry and timeout policy of the status poller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, uniffi::Record)]
pub struct PollPolicy {
    /// How many times a `pending` source is re-queried before resolving with it anyway.
    pub max_retries: u32,
    /// Delay between two queries, in milliseconds.
    pub retry_delay_ms: u64,
    /// Timeout for a single query, in milliseconds.
    pub query_timeout_ms: u64,
}

impl PollPolicy {
    pub(crate) const fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub(crate) const fn query_timeout(&self) -> Duration {
        Duration::from_millis(self.query_timeout_ms)
    }
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_POLL_RETRIES,
            retry_delay_ms: DEFAULT_RETRY_DELAY_MS,
            query_timeout_ms: DEFAULT_QUERY_TIMEOUT_MS,
        }
    }
}

/// Mutable settings of a session, written by `init`.
#[derive(Debug, Default)]
pub(crate) struct BridgeSettings {
    publishable_key: Option<String>,
    catalog: ErrorCatalog,
    catalog_from_host: bool,
}

impl BridgeSettings {
    /// Validates the publishable key from `options`.
    ///
    /// Returns the key when it differs from the configured one and must be
    /// forwarded to the SDK.
    pub(crate) fn publishable_key_change(
        &self,
        options: &InitOptions,
    ) -> PayBridgeResult<Option<String>> {
        let Some(key) = options.publishable_key.as_deref() else {
            return Ok(None);
        };
        if key.trim().is_empty() {
            return Err(PayBridgeError::invalid_input(
                "publishable_key",
                "must not be empty",
            ));
        }
        if self.publishable_key.as_deref() == Some(key) {
            return Ok(None);
        }
        Ok(Some(key.to_string()))
    }

    pub(crate) fn set_publishable_key(&mut self, key: String) {
        self.publishable_key = Some(key);
    }

    /// Installs the host's error codes. Only the first call has an effect.
    pub(crate) fn apply_error_codes(
        &mut self,
        error_codes: HashMap<String, ErrorDescriptor>,
    ) {
        if self.catalog_from_host {
            log::debug!("error codes already configured, keeping the first catalog");
            return;
        }
        self.catalog = ErrorCatalog::from_host(error_codes);
        self.catalog_from_host = true;
    }

    pub(crate) const fn has_publishable_key(&self) -> bool {
        self.publishable_key.is_some()
    }

    pub(crate) const fn catalog(&self) -> &ErrorCatalog {
        &self.catalog
    }
}
