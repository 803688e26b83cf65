//! Status polling after a matched redirect return.
//!
//! Queries run one at a time on the blocking pool, each bounded by the policy's
//! query timeout. A `pending` source is re-queried after a fixed delay up to
//! `max_retries` times; after that the last snapshot is used as is.

use std::fmt;
use std::sync::Arc;

use backon::{ConstantBuilder, Retryable};
use secrecy::{ExposeSecret, SecretString};

use crate::config::PollPolicy;
use crate::error::ErrorKind;
use crate::platform::PaymentSdk;
use crate::source::{Source, SourceStatus};

/// The source a poll loop is bound to.
pub(crate) struct PollTarget {
    source_id: String,
    client_secret: SecretString,
}

impl PollTarget {
    pub(crate) fn new(source_id: String, client_secret: String) -> Self {
        Self {
            source_id,
            client_secret: SecretString::from(client_secret),
        }
    }

    pub(crate) fn source_id(&self) -> &str {
        &self.source_id
    }
}

/// Why a poll loop stopped without a status to settle with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum PollFailure {
    /// The SDK query failed.
    Query(String),
    /// The SDK did not answer within the query timeout.
    TimedOut,
}

impl fmt::Display for PollFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Query(message) => write!(f, "status query failed: {message}"),
            Self::TimedOut => f.write_str("status query timed out"),
        }
    }
}

#[derive(Debug)]
pub(crate) enum PollOutcome {
    /// Settle the caller with this result.
    Settle(Result<Source, ErrorKind>),
    /// Leave the caller unsettled.
    Abandon(PollFailure),
}

enum PollError {
    StillPending(Source),
    Failure(PollFailure),
}

impl PollError {
    const fn is_pending(&self) -> bool {
        matches!(self, Self::StillPending(_))
    }
}

pub(crate) struct StatusPoller {
    sdk: Arc<dyn PaymentSdk>,
    policy: PollPolicy,
}

impl StatusPoller {
    pub(crate) fn new(sdk: Arc<dyn PaymentSdk>, policy: PollPolicy) -> Self {
        Self { sdk, policy }
    }

    /// Polls until the source leaves `pending`, retries run out, or a query fails.
    pub(crate) async fn poll(&self, target: &PollTarget) -> PollOutcome {
        let backoff = ConstantBuilder::default()
            .with_delay(self.policy.retry_delay())
            .with_max_times(usize::try_from(self.policy.max_retries).unwrap_or(usize::MAX));

        let mut attempt: u32 = 0;
        let result = (|| {
            let current = attempt;
            attempt += 1;
            self.query(target, current)
        })
        .retry(backoff)
        .sleep(tokio::time::sleep)
        .when(PollError::is_pending)
        .notify(|_, delay| {
            log::debug!(
                "source {} still pending, querying again in {delay:?}",
                target.source_id
            );
        })
        .await;

        match result {
            Ok(source) | Err(PollError::StillPending(source)) => {
                PollOutcome::Settle(classify(source))
            }
            Err(PollError::Failure(failure)) => {
                log::warn!("giving up on source {}: {failure}", target.source_id);
                PollOutcome::Abandon(failure)
            }
        }
    }

    async fn query(&self, target: &PollTarget, attempt: u32) -> Result<Source, PollError> {
        log::debug!(
            "querying status of source {} (attempt {attempt})",
            target.source_id
        );
        let sdk = Arc::clone(&self.sdk);
        let source_id = target.source_id.clone();
        let client_secret = target.client_secret.expose_secret().to_string();
        let query =
            tokio::task::spawn_blocking(move || sdk.retrieve_source(source_id, client_secret));

        let source = match tokio::time::timeout(self.policy.query_timeout(), query).await {
            Err(_) => return Err(PollError::Failure(PollFailure::TimedOut)),
            Ok(Err(join_error)) => {
                return Err(PollError::Failure(PollFailure::Query(join_error.to_string())))
            }
            Ok(Ok(Err(sdk_error))) => {
                return Err(PollError::Failure(PollFailure::Query(sdk_error.message())))
            }
            Ok(Ok(Ok(source))) => source,
        };

        if source.status == SourceStatus::Pending {
            Err(PollError::StillPending(source))
        } else {
            Ok(source)
        }
    }
}

/// Maps a polled status to the caller's settlement.
///
/// `Pending` only gets here once retries are exhausted and resolves with the stale snapshot.
fn classify(source: Source) -> Result<Source, ErrorKind> {
    match source.status {
        SourceStatus::Chargeable | SourceStatus::Consumed | SourceStatus::Pending => Ok(source),
        SourceStatus::Canceled => Err(ErrorKind::RedirectCancelled),
        SourceStatus::Failed | SourceStatus::Unknown => Err(ErrorKind::RedirectFailed),
    }
}
