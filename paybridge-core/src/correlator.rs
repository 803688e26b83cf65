//! Validation of a redirect return event against the source that initiated the redirect.
//!
//! The return channel is a public URL. Both the client secret and the source id
//! must match the in-flight source before its status is polled.

use crate::error::ErrorKind;
use crate::redirect::RedirectReturnEvent;
use crate::registry::CreatedSource;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Verdict {
    Matched,
    Mismatch(ErrorKind),
}

/// Classifies `event` against `expected`. First failing check wins.
pub(crate) fn correlate(
    expected: &CreatedSource,
    event: Option<&RedirectReturnEvent>,
) -> Verdict {
    let Some(event) = event else {
        log::info!("browser closed without returning for source {}", expected.id());
        return Verdict::Mismatch(ErrorKind::RedirectCancelled);
    };

    let secret_matches = event
        .client_secret
        .as_deref()
        .is_some_and(|secret| expected.client_secret_matches(secret));
    if !secret_matches {
        log::warn!("redirect return for source {} carries a foreign client secret", expected.id());
        return Verdict::Mismatch(ErrorKind::RedirectNoSource);
    }

    if event.source_id.as_deref() != Some(expected.id()) {
        log::warn!("redirect return does not carry source id {}", expected.id());
        return Verdict::Mismatch(ErrorKind::RedirectWrongSourceId);
    }

    Verdict::Matched
}
