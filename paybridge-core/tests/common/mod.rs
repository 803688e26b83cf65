//! Common test utilities shared across integration tests.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use paybridge_core::testing::ScriptedSdk;
use paybridge_core::{
    InitOptions, PollPolicy, RedirectSession, RedirectSurface, SourceParams, SourceType,
    SurfaceError,
};

pub const RETURN_URL: &str = "paybridge-demo://stripe-redirect";

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A browsing surface that records the URLs it was asked to open.
pub struct BrowserLog {
    opened: Mutex<Vec<String>>,
}

impl BrowserLog {
    pub const fn new() -> Self {
        Self {
            opened: Mutex::new(Vec::new()),
        }
    }

    pub fn opened(&self) -> Vec<String> {
        lock(&self.opened).clone()
    }
}

impl Default for BrowserLog {
    fn default() -> Self {
        Self::new()
    }
}

impl RedirectSurface for BrowserLog {
    fn is_available(&self) -> bool {
        true
    }

    fn open_url(&self, url: String) -> Result<(), SurfaceError> {
        lock(&self.opened).push(url);
        Ok(())
    }
}

pub struct Fixture {
    pub sdk: Arc<ScriptedSdk>,
    pub browser: Arc<BrowserLog>,
    pub session: Arc<RedirectSession>,
}

/// An initialized session with the default poll policy.
pub fn fixture(sdk: ScriptedSdk) -> Fixture {
    fixture_with_policy(sdk, None)
}

pub fn fixture_with_policy(sdk: ScriptedSdk, policy: Option<PollPolicy>) -> Fixture {
    let sdk = Arc::new(sdk);
    let browser = Arc::new(BrowserLog::new());
    let session = RedirectSession::new(sdk.clone(), browser.clone(), policy);
    let initialized = session.init(
        InitOptions {
            publishable_key: Some("pk_test_paybridge".to_string()),
        },
        std::collections::HashMap::new(),
    );
    assert!(initialized.is_ok(), "init failed: {initialized:?}");
    Fixture {
        sdk,
        browser,
        session,
    }
}

pub fn ideal_params() -> SourceParams {
    let mut params = SourceParams::new(SourceType::Ideal);
    params.amount = Some(1_099);
    params.currency = Some("eur".to_string());
    params.return_url = Some(RETURN_URL.to_string());
    params
}

/// Waits until the session has a caller parked on a redirect.
pub async fn until_in_flight(session: &RedirectSession) {
    while !session.has_pending_request() {
        tokio::task::yield_now().await;
    }
}
