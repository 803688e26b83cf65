//! In-flight state of a session: the created source and the caller waiting on it.
//!
//! All transitions run under one lock so that read-check-act against the
//! created source and the pending request is a single step.

use std::sync::{Mutex, MutexGuard, PoisonError};

use secrecy::{ExposeSecret, SecretString};
use subtle::ConstantTimeEq;

use crate::correlator::{correlate, Verdict};
use crate::error::ErrorKind;
use crate::poller::PollTarget;
use crate::redirect::RedirectReturnEvent;
use crate::resolver::{PendingRequest, Settlement};
use crate::source::Source;

/// A source produced by the SDK, held until its redirect is settled.
///
/// The client secret only lives in `client_secret`; the snapshot's copy is blanked
/// and put back when the source is handed out again.
pub(crate) struct CreatedSource {
    snapshot: Source,
    client_secret: SecretString,
}

impl CreatedSource {
    pub(crate) fn new(mut snapshot: Source) -> Self {
        let client_secret = SecretString::from(std::mem::take(&mut snapshot.client_secret));
        Self {
            snapshot,
            client_secret,
        }
    }

    pub(crate) fn id(&self) -> &str {
        &self.snapshot.id
    }

    /// The created source with a blank client secret.
    pub(crate) const fn snapshot(&self) -> &Source {
        &self.snapshot
    }

    /// The created source, client secret included.
    pub(crate) fn to_source(&self) -> Source {
        Source {
            client_secret: self.client_secret.expose_secret().to_string(),
            ..self.snapshot.clone()
        }
    }

    pub(crate) fn into_source(self) -> Source {
        let mut source = self.snapshot;
        source.client_secret = self.client_secret.expose_secret().to_string();
        source
    }

    pub(crate) fn client_secret_matches(&self, candidate: &str) -> bool {
        self.client_secret
            .expose_secret()
            .as_bytes()
            .ct_eq(candidate.as_bytes())
            .into()
    }

    pub(crate) fn poll_target(&self) -> PollTarget {
        PollTarget::new(
            self.snapshot.id.clone(),
            self.client_secret.expose_secret().to_string(),
        )
    }
}

/// A created source together with the caller waiting on its redirect.
pub(crate) struct InFlight {
    pub(crate) source: CreatedSource,
    pub(crate) pending: PendingRequest,
}

enum Slot {
    Idle,
    /// Created but not launched yet; `complete_redirect_flow` picks it up.
    Created(CreatedSource),
    /// Browser is open, waiting for the return event.
    AwaitingReturn(InFlight),
    /// Return event matched; the status poller owns settlement.
    Polling(InFlight),
}

/// A redirect request is already outstanding.
#[derive(Debug, PartialEq, Eq)]
pub(crate) struct Occupied;

/// What the session must do after a return event.
pub(crate) enum ReturnStep {
    /// Nothing is waiting for a return event.
    Ignored,
    /// The event did not match; the request was removed and must be rejected.
    Rejected(InFlight, ErrorKind),
    /// The event matched; poll the source status.
    Poll(PollTarget),
}

pub(crate) struct SourceRegistry {
    slot: Mutex<Slot>,
}

impl SourceRegistry {
    pub(crate) const fn new() -> Self {
        Self {
            slot: Mutex::new(Slot::Idle),
        }
    }

    // Slot transitions never leave a half-written value behind, so a poisoned lock is still usable.
    fn slot(&self) -> MutexGuard<'_, Slot> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Remembers a freshly created source for a later `complete_redirect_flow`.
    pub(crate) fn record_created(&self, source: CreatedSource) -> Result<(), Occupied> {
        let mut slot = self.slot();
        match *slot {
            Slot::AwaitingReturn(_) | Slot::Polling(_) => Err(Occupied),
            Slot::Idle | Slot::Created(_) => {
                *slot = Slot::Created(source);
                Ok(())
            }
        }
    }

    /// Removes the source remembered by [`Self::record_created`].
    pub(crate) fn take_created(&self) -> Result<Option<CreatedSource>, Occupied> {
        let mut slot = self.slot();
        match std::mem::replace(&mut *slot, Slot::Idle) {
            Slot::Idle => Ok(None),
            Slot::Created(source) => Ok(Some(source)),
            in_flight @ (Slot::AwaitingReturn(_) | Slot::Polling(_)) => {
                *slot = in_flight;
                Err(Occupied)
            }
        }
    }

    /// Registers `source` and a new pending request, before the browser is opened.
    pub(crate) fn arm(&self, source: CreatedSource) -> Result<Settlement, Occupied> {
        let mut slot = self.slot();
        if matches!(*slot, Slot::AwaitingReturn(_) | Slot::Polling(_)) {
            return Err(Occupied);
        }
        let (pending, settlement) = PendingRequest::new();
        *slot = Slot::AwaitingReturn(InFlight { source, pending });
        Ok(settlement)
    }

    /// Correlates a return event with the source awaiting it.
    ///
    /// Only the first event after a launch is acted upon.
    pub(crate) fn on_return(&self, event: Option<&RedirectReturnEvent>) -> ReturnStep {
        let mut slot = self.slot();
        match std::mem::replace(&mut *slot, Slot::Idle) {
            Slot::AwaitingReturn(in_flight) => match correlate(&in_flight.source, event) {
                Verdict::Matched => {
                    let target = in_flight.source.poll_target();
                    *slot = Slot::Polling(in_flight);
                    ReturnStep::Poll(target)
                }
                Verdict::Mismatch(kind) => ReturnStep::Rejected(in_flight, kind),
            },
            other => {
                *slot = other;
                ReturnStep::Ignored
            }
        }
    }

    /// Takes the in-flight request for `source_id`, leaving the registry idle.
    pub(crate) fn take_in_flight(&self, source_id: &str) -> Option<InFlight> {
        let mut slot = self.slot();
        match std::mem::replace(&mut *slot, Slot::Idle) {
            Slot::AwaitingReturn(in_flight) | Slot::Polling(in_flight)
                if in_flight.source.id() == source_id =>
            {
                Some(in_flight)
            }
            other => {
                *slot = other;
                None
            }
        }
    }

    pub(crate) fn is_in_flight(&self) -> bool {
        matches!(*self.slot(), Slot::AwaitingReturn(_) | Slot::Polling(_))
    }

    pub(crate) fn has_created(&self) -> bool {
        !matches!(*self.slot(), Slot::Idle)
    }
}

/// Releases the in-flight slot of `source_id` when the waiting caller goes away
/// before its request settles.
///
/// Hosts drop the caller's future when they cancel it; without this the slot
/// would refuse every later request until a return event shows up.
pub(crate) struct CallerGuard<'a> {
    registry: &'a SourceRegistry,
    source_id: Option<String>,
}

impl<'a> CallerGuard<'a> {
    pub(crate) const fn new(registry: &'a SourceRegistry, source_id: String) -> Self {
        Self {
            registry,
            source_id: Some(source_id),
        }
    }

    /// The request settled; leave the registry alone.
    pub(crate) fn disarm(mut self) {
        self.source_id = None;
    }
}

impl Drop for CallerGuard<'_> {
    fn drop(&mut self) {
        let Some(source_id) = self.source_id.take() else {
            return;
        };
        if self.registry.take_in_flight(&source_id).is_some() {
            log::info!("caller of source {source_id} went away, releasing its redirect");
        }
    }
}
