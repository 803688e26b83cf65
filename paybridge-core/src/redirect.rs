//! The return leg of a redirect: the callback URL the external page sends the customer back to.

use url::Url;

use crate::error::{PayBridgeError, PayBridgeResult};
use crate::source::Source;

const CLIENT_SECRET_PARAM: &str = "client_secret";
const SOURCE_PARAM: &str = "source";

/// Identifiers extracted from a redirect callback URL.
///
/// A missing parameter, or a URL that cannot be parsed at all, leaves the
/// field empty; the correlator treats that as a mismatch.
pub(crate) struct RedirectReturnEvent {
    pub(crate) client_secret: Option<String>,
    pub(crate) source_id: Option<String>,
}

impl RedirectReturnEvent {
    pub(crate) fn from_callback_url(callback_url: &str) -> Self {
        let Ok(url) = Url::parse(callback_url) else {
            log::warn!("redirect callback is not a valid URL");
            return Self {
                client_secret: None,
                source_id: None,
            };
        };
        Self {
            client_secret: query_param(&url, CLIENT_SECRET_PARAM),
            source_id: query_param(&url, SOURCE_PARAM),
        }
    }
}

// First occurrence wins when a parameter is repeated.
fn query_param(url: &Url, name: &str) -> Option<String> {
    url.query_pairs()
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.into_owned())
}

/// Builds the callback URL the external page redirects to once the customer is done.
///
/// `client_secret` and `source` are appended as query parameters to `return_url`,
/// percent-encoded so they come back byte-for-byte identical.
///
/// # Errors
///
/// Returns [`PayBridgeError::InvalidInput`] if `return_url` is not an absolute URL.
#[uniffi::export]
pub fn build_return_url(
    return_url: &str,
    source_id: &str,
    client_secret: &str,
) -> PayBridgeResult<String> {
    let mut url = Url::parse(return_url)
        .map_err(|e| PayBridgeError::invalid_input("return_url", &e.to_string()))?;
    url.query_pairs_mut()
        .append_pair(CLIENT_SECRET_PARAM, client_secret)
        .append_pair(SOURCE_PARAM, source_id);
    Ok(url.into())
}

/// Builds the callback URL for `source`, see [`build_return_url`].
///
/// # Errors
///
/// Returns [`PayBridgeError::InvalidInput`] if `return_url` is not an absolute URL.
pub fn return_url_for(return_url: &str, source: &Source) -> PayBridgeResult<String> {
    build_return_url(return_url, &source.id, &source.client_secret)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::redirect_source;

    #[test]
    fn test_round_trip_preserves_identifiers() {
        let source = redirect_source("src_1Abc+/=", "src_client_secret_&?=é");
        let callback = return_url_for("myapp://payments/return", &source).unwrap();
        let event = RedirectReturnEvent::from_callback_url(&callback);
        assert_eq!(event.client_secret.as_deref(), Some("src_client_secret_&?=é"));
        assert_eq!(event.source_id.as_deref(), Some("src_1Abc+/="));
    }

    #[test]
    fn test_existing_query_is_kept() {
        let source = redirect_source("src_1", "secret_1");
        let callback =
            return_url_for("https://shop.example/return?order=42", &source).unwrap();
        assert_eq!(
            callback,
            "https://shop.example/return?order=42&client_secret=secret_1&source=src_1"
        );
    }

    #[test]
    fn test_missing_parameters_are_empty() {
        let event = RedirectReturnEvent::from_callback_url("myapp://return?source=src_1");
        assert_eq!(event.client_secret, None);
        assert_eq!(event.source_id.as_deref(), Some("src_1"));

        let garbage = RedirectReturnEvent::from_callback_url("not a url");
        assert_eq!(garbage.client_secret, None);
        assert_eq!(garbage.source_id, None);
    }

    #[test]
    fn test_first_repeated_parameter_wins() {
        let event = RedirectReturnEvent::from_callback_url(
            "myapp://return?source=src_1&source=src_2&client_secret=a",
        );
        assert_eq!(event.source_id.as_deref(), Some("src_1"));
    }

    #[test]
    fn test_relative_return_url_is_rejected() {
        let source = redirect_source("src_1", "secret_1");
        assert!(matches!(
            return_url_for("/return", &source),
            Err(PayBridgeError::InvalidInput { .. })
        ));
    }
}
