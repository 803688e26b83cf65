//! Settlement of the single outstanding caller request.
//!
//! A [`PendingRequest`] is consumed by settling it, so a request can be resolved
//! or rejected at most once. Code paths that settle first take the request out of
//! the registry (see [`crate::registry::SourceRegistry::take_in_flight`]), which
//! clears the in-flight state in the same step.

use tokio::sync::oneshot;

use crate::error::{PayBridgeError, PayBridgeResult};
use crate::source::Source;

type Outcome = PayBridgeResult<Source>;

/// The resolve/reject sink of a caller waiting on a redirect.
#[derive(Debug)]
pub(crate) struct PendingRequest {
    responder: oneshot::Sender<Outcome>,
}

/// The caller's side of a [`PendingRequest`].
#[derive(Debug)]
pub(crate) struct Settlement {
    receiver: oneshot::Receiver<Outcome>,
}

impl PendingRequest {
    pub(crate) fn new() -> (Self, Settlement) {
        let (responder, receiver) = oneshot::channel();
        (Self { responder }, Settlement { receiver })
    }

    pub(crate) fn resolve(self, source: Source) {
        log::info!("resolving source {}", source.id);
        self.send(Ok(source));
    }

    pub(crate) fn reject(self, error: PayBridgeError) {
        log::info!("rejecting source request: {error}");
        self.send(Err(error));
    }

    pub(crate) fn settle(self, outcome: Outcome) {
        match outcome {
            Ok(source) => self.resolve(source),
            Err(error) => self.reject(error),
        }
    }

    /// Drops the request without settling it. The caller keeps waiting forever.
    pub(crate) fn abandon(self) {
        log::warn!("abandoning source request without settling it");
        drop(self.responder);
    }

    fn send(self, outcome: Outcome) {
        if self.responder.send(outcome).is_err() {
            log::debug!("caller stopped waiting before settlement");
        }
    }
}

impl Settlement {
    /// Waits for the request to be settled.
    ///
    /// An abandoned request never completes.
    pub(crate) async fn wait(self) -> Outcome {
        match self.receiver.await {
            Ok(outcome) => outcome,
            Err(_) => std::future::pending().await,
        }
    }
}
