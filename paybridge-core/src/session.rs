//! The long-lived bridge session shared by the host runtime and the platform return handler.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::config::{BridgeSettings, ErrorCatalog, ErrorDescriptor, InitOptions, PollPolicy};
use crate::error::{ErrorKind, PayBridgeError, PayBridgeResult};
use crate::launcher::{launch, Launch};
use crate::platform::{PaymentSdk, RedirectSurface};
use crate::poller::{PollOutcome, PollTarget, StatusPoller};
use crate::redirect::RedirectReturnEvent;
use crate::registry::{CallerGuard, CreatedSource, Occupied, ReturnStep, SourceRegistry};
use crate::source::{Source, SourceParams, SourceStatus};

/// What a redirect return event led to.
#[derive(Debug, Clone, PartialEq, Eq, uniffi::Enum)]
pub enum ReturnOutcome {
    /// No redirect was waiting for a return event.
    Ignored,
    /// The waiting caller was rejected.
    Rejected {
        /// Why the caller was rejected.
        kind: ErrorKind,
    },
    /// The waiting caller was resolved with a source in `status`.
    Resolved {
        /// The status of the source the caller was resolved with.
        status: SourceStatus,
    },
    /// Polling stopped without settling the waiting caller.
    Abandoned {
        /// Why polling stopped.
        reason: String,
    },
}

/// Bridge session for redirect-based payment sources.
///
/// One session is created per host module and handed to both the host runtime
/// (source creation) and the platform component that receives redirect returns.
/// At most one redirect request is outstanding at a time; further requests are
/// rejected with [`ErrorKind::RequestInProgress`] until it settles.
#[derive(uniffi::Object)]
pub struct RedirectSession {
    sdk: Arc<dyn PaymentSdk>,
    surface: Arc<dyn RedirectSurface>,
    poller: StatusPoller,
    registry: SourceRegistry,
    settings: RwLock<BridgeSettings>,
}

#[uniffi::export(async_runtime = "tokio")]
impl RedirectSession {
    /// Creates a session on top of the host's payment SDK and browsing surface.
    ///
    /// `policy` defaults to 10 retries, one second apart, with a 60 second query timeout.
    #[uniffi::constructor]
    #[must_use]
    pub fn new(
        sdk: Arc<dyn PaymentSdk>,
        surface: Arc<dyn RedirectSurface>,
        policy: Option<PollPolicy>,
    ) -> Arc<Self> {
        let poller = StatusPoller::new(Arc::clone(&sdk), policy.unwrap_or_default());
        Arc::new(Self {
            sdk,
            surface,
            poller,
            registry: SourceRegistry::new(),
            settings: RwLock::new(BridgeSettings::default()),
        })
    }

    /// Configures the publishable key and the host's error codes.
    ///
    /// A changed key is forwarded to the payment SDK. Error codes are only taken
    /// from the first call.
    ///
    /// # Errors
    ///
    /// Returns [`PayBridgeError::InvalidInput`] if the key is empty or the SDK refuses it.
    pub fn init(
        &self,
        options: InitOptions,
        error_codes: HashMap<String, ErrorDescriptor>,
    ) -> PayBridgeResult<()> {
        let changed_key = self.settings().publishable_key_change(&options)?;
        if let Some(key) = changed_key {
            self.sdk
                .set_publishable_key(key.clone())
                .map_err(|e| PayBridgeError::invalid_input("publishable_key", &e.message()))?;
            self.settings_mut().set_publishable_key(key);
            log::info!("payment sdk configured with a new publishable key");
        }
        self.settings_mut().apply_error_codes(error_codes);
        Ok(())
    }

    /// Creates a source and keeps it for a later [`Self::complete_redirect_flow`].
    ///
    /// Resolves right away with the created source.
    ///
    /// # Errors
    ///
    /// Rejects with `sourceCreationFailed` if the SDK refuses the parameters and
    /// with `requestInProgress` while another redirect is outstanding.
    pub async fn create_source(&self, params: SourceParams) -> PayBridgeResult<Source> {
        let catalog = self.catalog();
        self.ensure_idle(&catalog)?;
        let created = self.create(params, &catalog).await?;
        let snapshot = created.to_source();
        self.registry
            .record_created(created)
            .map_err(|Occupied| catalog.rejection(ErrorKind::RequestInProgress))?;
        Ok(snapshot)
    }

    /// Creates a source and, if it needs one, runs the external redirect.
    ///
    /// Completes once the redirect has been correlated and the source status polled,
    /// or immediately for sources that do not redirect.
    ///
    /// # Errors
    ///
    /// Rejects with one of the redirect error kinds, see [`ErrorKind`].
    pub async fn create_source_with_redirect(
        &self,
        params: SourceParams,
    ) -> PayBridgeResult<Source> {
        let catalog = self.catalog();
        self.ensure_idle(&catalog)?;
        let created = self.create(params, &catalog).await?;
        self.launch_and_wait(created, &catalog).await
    }

    /// Runs the redirect for the source created by [`Self::create_source`].
    ///
    /// # Errors
    ///
    /// Rejects with `noCreatedSource` if there is no such source, otherwise as
    /// [`Self::create_source_with_redirect`].
    pub async fn complete_redirect_flow(&self) -> PayBridgeResult<Source> {
        let catalog = self.catalog();
        let created = match self.registry.take_created() {
            Ok(Some(created)) => created,
            Ok(None) => return Err(catalog.rejection(ErrorKind::NoCreatedSource)),
            Err(Occupied) => return Err(catalog.rejection(ErrorKind::RequestInProgress)),
        };
        self.launch_and_wait(created, &catalog).await
    }

    /// Handles the application regaining the foreground after a redirect.
    ///
    /// `callback_url` is the return URL the external page opened, or `None` when
    /// the app resumed without one (the customer closed the browser). A matching
    /// return is followed by status polling; this call completes when polling ends.
    pub async fn handle_redirect_return(&self, callback_url: Option<String>) -> ReturnOutcome {
        let event = callback_url
            .as_deref()
            .map(RedirectReturnEvent::from_callback_url);
        let catalog = self.catalog();

        match self.registry.on_return(event.as_ref()) {
            ReturnStep::Ignored => {
                log::debug!("redirect return with nothing in flight, ignoring");
                ReturnOutcome::Ignored
            }
            ReturnStep::Rejected(in_flight, kind) => {
                in_flight.pending.reject(catalog.rejection(kind));
                ReturnOutcome::Rejected { kind }
            }
            ReturnStep::Poll(target) => self.poll_and_settle(&target, &catalog).await,
        }
    }

    /// Whether a caller is currently waiting on a redirect.
    #[must_use]
    pub fn has_pending_request(&self) -> bool {
        self.registry.is_in_flight()
    }

    /// Whether the session holds a created source, launched or not.
    #[must_use]
    pub fn has_created_source(&self) -> bool {
        self.registry.has_created()
    }
}

impl RedirectSession {
    fn settings(&self) -> RwLockReadGuard<'_, BridgeSettings> {
        self.settings.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn settings_mut(&self) -> RwLockWriteGuard<'_, BridgeSettings> {
        self.settings.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn catalog(&self) -> ErrorCatalog {
        self.settings().catalog().clone()
    }

    fn ensure_idle(&self, catalog: &ErrorCatalog) -> PayBridgeResult<()> {
        if self.registry.is_in_flight() {
            log::warn!("refusing a new source request while a redirect is in flight");
            return Err(catalog.rejection(ErrorKind::RequestInProgress));
        }
        Ok(())
    }

    async fn create(
        &self,
        params: SourceParams,
        catalog: &ErrorCatalog,
    ) -> PayBridgeResult<CreatedSource> {
        let has_key = self.settings().has_publishable_key();
        if !has_key {
            return Err(PayBridgeError::invalid_input(
                "publishable_key",
                "call init with a publishable key first",
            ));
        }

        let sdk = Arc::clone(&self.sdk);
        let params = params.with_mimic_applied();
        let source_type = params.source_type;
        let source = tokio::task::spawn_blocking(move || sdk.create_source(params))
            .await
            .map_err(|e| {
                catalog.rejection_with_message(ErrorKind::SourceCreationFailed, e.to_string())
            })?
            .map_err(|e| {
                log::warn!("payment sdk failed to create a {source_type} source: {e}");
                catalog.rejection_with_message(ErrorKind::SourceCreationFailed, e.message())
            })?;

        if source.requires_redirect() && source.redirect_url.is_none() {
            log::warn!("source {} has a redirect flow but no redirect url", source.id);
            return Err(catalog.rejection(ErrorKind::RedirectFailed));
        }
        log::info!("created source {} with the {} flow", source.id, source.flow);
        Ok(CreatedSource::new(source))
    }

    async fn launch_and_wait(
        &self,
        created: CreatedSource,
        catalog: &ErrorCatalog,
    ) -> PayBridgeResult<Source> {
        match launch(&self.registry, self.surface.as_ref(), catalog, created)? {
            Launch::Immediate(source) => Ok(source),
            Launch::Redirecting {
                source_id,
                settlement,
            } => {
                let guard = CallerGuard::new(&self.registry, source_id);
                let outcome = settlement.wait().await;
                guard.disarm();
                outcome
            }
        }
    }

    async fn poll_and_settle(&self, target: &PollTarget, catalog: &ErrorCatalog) -> ReturnOutcome {
        let outcome = self.poller.poll(target).await;
        let Some(in_flight) = self.registry.take_in_flight(target.source_id()) else {
            log::warn!("source {} was settled while polling", target.source_id());
            return ReturnOutcome::Ignored;
        };

        match outcome {
            PollOutcome::Settle(result) => {
                let returned = match &result {
                    Ok(source) => ReturnOutcome::Resolved {
                        status: source.status,
                    },
                    Err(kind) => ReturnOutcome::Rejected { kind: *kind },
                };
                in_flight
                    .pending
                    .settle(result.map_err(|kind| catalog.rejection(kind)));
                returned
            }
            PollOutcome::Abandon(failure) => {
                // TODO: reject with `redirectFailed` instead once hosts stop relying on the hang.
                in_flight.pending.abandon();
                ReturnOutcome::Abandoned {
                    reason: failure.to_string(),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::task::JoinHandle;

    use super::*;
    use crate::redirect::return_url_for;
    use crate::source::{ChargeMimic, SourceFlow, SourceType};
    use crate::test_utils::{rejection, RecordingSurface};
    use crate::testing::{ScriptedQuery, ScriptedSdk};

    const RETURN_URL: &str = "paybridge://stripe-redirect";

    struct Harness {
        sdk: Arc<ScriptedSdk>,
        surface: Arc<RecordingSurface>,
        session: Arc<RedirectSession>,
    }

    fn harness(sdk: ScriptedSdk) -> Harness {
        let sdk = Arc::new(sdk);
        let surface = Arc::new(RecordingSurface::new());
        let session = RedirectSession::new(sdk.clone(), surface.clone(), None);
        session
            .init(
                InitOptions {
                    publishable_key: Some("pk_test_123".to_string()),
                },
                HashMap::new(),
            )
            .unwrap();
        Harness {
            sdk,
            surface,
            session,
        }
    }

    fn ideal() -> SourceParams {
        let mut params = SourceParams::new(SourceType::Ideal);
        params.amount = Some(1_099);
        params.currency = Some("eur".to_string());
        params.return_url = Some(RETURN_URL.to_string());
        params
    }

    fn spawn_redirect(session: &Arc<RedirectSession>) -> JoinHandle<PayBridgeResult<Source>> {
        let session = Arc::clone(session);
        tokio::spawn(async move { session.create_source_with_redirect(ideal()).await })
    }

    async fn until_in_flight(session: &RedirectSession) {
        while !session.has_pending_request() {
            tokio::task::yield_now().await;
        }
    }

    fn matching_return(source: &Source) -> Option<String> {
        Some(return_url_for(RETURN_URL, source).unwrap())
    }

    #[test]
    fn test_init_forwards_only_changed_keys() {
        let Harness { sdk, session, .. } = harness(ScriptedSdk::default());
        let same = InitOptions {
            publishable_key: Some("pk_test_123".to_string()),
        };
        session.init(same, HashMap::new()).unwrap();
        let other = InitOptions {
            publishable_key: Some("pk_test_456".to_string()),
        };
        session.init(other, HashMap::new()).unwrap();

        assert_eq!(sdk.keys(), vec!["pk_test_123", "pk_test_456"]);
    }

    #[tokio::test]
    async fn test_creation_requires_a_publishable_key() {
        let sdk = Arc::new(ScriptedSdk::default());
        let session = RedirectSession::new(sdk.clone(), Arc::new(RecordingSurface::new()), None);

        let error = session.create_source(ideal()).await.unwrap_err();

        assert!(matches!(error, PayBridgeError::InvalidInput { .. }));
        assert!(sdk.create_params().is_empty());
    }

    #[tokio::test]
    async fn test_mimic_overrides_owner_name() {
        let Harness { sdk, session, .. } = harness(ScriptedSdk::default());
        let mut params = ideal();
        params.owner_name = Some("Jenny Rosen".to_string());
        params.mimic = Some(ChargeMimic::FailingCharge);

        let created = session.create_source(params).await.unwrap();

        let sent = sdk.create_params();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].owner_name.as_deref(), Some("failing_charge"));
        assert_eq!(sdk.last_created(), Some(created));
    }

    #[tokio::test]
    async fn test_sdk_refusal_rejects_with_init_source_fail() {
        let Harness { session, .. } = harness(ScriptedSdk::default().failing_creation("invalid iban"));

        let error = session.create_source_with_redirect(ideal()).await.unwrap_err();

        assert_eq!(
            error,
            PayBridgeError::Rejected {
                kind: ErrorKind::SourceCreationFailed,
                code: "initSourceFail".to_string(),
                message: "invalid iban".to_string(),
            }
        );
        assert!(!session.has_created_source());
    }

    #[tokio::test]
    async fn test_immediate_flow_skips_the_redirect() {
        let Harness {
            surface, session, ..
        } = harness(ScriptedSdk::new(SourceFlow::Immediate));

        let resolved = session.create_source_with_redirect(ideal()).await.unwrap();

        assert_eq!(resolved.flow, SourceFlow::Immediate);
        assert!(!resolved.client_secret.is_empty());
        assert!(surface.opened().is_empty());
        assert!(!session.has_pending_request());
    }

    #[tokio::test(start_paused = true)]
    async fn test_matching_return_resolves_after_polling() {
        let Harness {
            sdk,
            surface,
            session,
        } = harness(ScriptedSdk::default().answering([
            ScriptedQuery::Status(SourceStatus::Pending),
            ScriptedQuery::Status(SourceStatus::Chargeable),
        ]));
        let caller = spawn_redirect(&session);
        until_in_flight(&session).await;
        let created = sdk.last_created().unwrap();
        assert_eq!(surface.opened(), vec![created.redirect_url.clone().unwrap()]);

        let outcome = session.handle_redirect_return(matching_return(&created)).await;

        assert_eq!(
            outcome,
            ReturnOutcome::Resolved {
                status: SourceStatus::Chargeable
            }
        );
        let source = caller.await.unwrap().unwrap();
        assert_eq!(source.status, SourceStatus::Chargeable);
        assert_eq!(sdk.query_count(), 2);
        assert!(!session.has_pending_request());
        assert!(!session.has_created_source());
    }

    #[tokio::test(start_paused = true)]
    async fn test_resume_without_url_cancels() {
        let Harness { sdk, session, .. } = harness(ScriptedSdk::default());
        let caller = spawn_redirect(&session);
        until_in_flight(&session).await;

        let outcome = session.handle_redirect_return(None).await;

        assert_eq!(
            outcome,
            ReturnOutcome::Rejected {
                kind: ErrorKind::RedirectCancelled
            }
        );
        let error = caller.await.unwrap().unwrap_err();
        assert_eq!(error, rejection(ErrorKind::RedirectCancelled));
        assert_eq!(sdk.query_count(), 0);
        assert_eq!(
            session.handle_redirect_return(None).await,
            ReturnOutcome::Ignored
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_request_is_refused_while_in_flight() {
        let Harness { session, .. } = harness(ScriptedSdk::default());
        let _caller = spawn_redirect(&session);
        until_in_flight(&session).await;

        let error = session.create_source_with_redirect(ideal()).await.unwrap_err();

        assert_eq!(error.kind(), Some(ErrorKind::RequestInProgress));
        assert!(session.has_pending_request());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_caller_frees_the_session() {
        let Harness { sdk, session, .. } =
            harness(ScriptedSdk::default().answering([ScriptedQuery::Status(
                SourceStatus::Chargeable,
            )]));
        let abandoned = spawn_redirect(&session);
        until_in_flight(&session).await;

        abandoned.abort();
        assert!(abandoned.await.unwrap_err().is_cancelled());

        assert!(!session.has_pending_request());
        assert!(!session.has_created_source());
        let caller = spawn_redirect(&session);
        until_in_flight(&session).await;
        let created = sdk.last_created().unwrap();
        session.handle_redirect_return(matching_return(&created)).await;
        assert_eq!(caller.await.unwrap().unwrap().id, created.id);
    }

    #[tokio::test(start_paused = true)]
    async fn test_create_then_complete_redirect_flow() {
        let Harness {
            surface, session, ..
        } = harness(ScriptedSdk::default().answering([ScriptedQuery::Status(
            SourceStatus::Consumed,
        )]));

        let created = session.create_source(ideal()).await.unwrap();
        assert_eq!(created.status, SourceStatus::Pending);
        assert!(!created.client_secret.is_empty());
        assert!(session.has_created_source());
        assert!(surface.opened().is_empty());

        let caller = {
            let session = Arc::clone(&session);
            tokio::spawn(async move { session.complete_redirect_flow().await })
        };
        until_in_flight(&session).await;
        session.handle_redirect_return(matching_return(&created)).await;

        let source = caller.await.unwrap().unwrap();
        assert_eq!(source.status, SourceStatus::Consumed);
        let error = session.complete_redirect_flow().await.unwrap_err();
        assert_eq!(error.kind(), Some(ErrorKind::NoCreatedSource));
    }

    #[tokio::test]
    async fn test_unavailable_surface_keeps_source_for_retry() {
        let Harness {
            surface, session, ..
        } = harness(ScriptedSdk::default());
        surface.set_available(false);

        let error = session.create_source_with_redirect(ideal()).await.unwrap_err();

        assert_eq!(error.kind(), Some(ErrorKind::ActivityUnavailable));
        assert!(session.has_created_source());
        assert!(!session.has_pending_request());
    }

    #[tokio::test(start_paused = true)]
    async fn test_query_failure_leaves_caller_waiting() {
        let Harness { sdk, session, .. } = harness(
            ScriptedSdk::default().answering([ScriptedQuery::Error("offline".to_string())]),
        );
        let caller = spawn_redirect(&session);
        until_in_flight(&session).await;
        let created = sdk.last_created().unwrap();

        let outcome = session.handle_redirect_return(matching_return(&created)).await;

        assert_eq!(
            outcome,
            ReturnOutcome::Abandoned {
                reason: "status query failed: offline".to_string()
            }
        );
        assert!(!session.has_pending_request());
        assert!(tokio::time::timeout(Duration::from_secs(3_600), caller)
            .await
            .is_err());
    }
}
