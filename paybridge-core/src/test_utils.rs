//! Fixtures and a recording browser surface for unit tests.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use crate::config::ErrorCatalog;
use crate::error::{ErrorKind, PayBridgeError};
use crate::platform::{RedirectSurface, SurfaceError};
use crate::registry::SourceRegistry;
use crate::source::{Source, SourceFlow, SourceStatus};

pub fn redirect_source(id: &str, client_secret: &str) -> Source {
    Source {
        id: id.to_string(),
        client_secret: client_secret.to_string(),
        flow: SourceFlow::Redirect,
        status: SourceStatus::Pending,
        redirect_url: Some(format!("https://hooks.example/redirect/{id}")),
        source_type: Some("ideal".to_string()),
        amount: Some(1_099),
        currency: Some("eur".to_string()),
    }
}

pub fn rejection(kind: ErrorKind) -> PayBridgeError {
    ErrorCatalog::default().rejection(kind)
}

pub struct RecordingSurface {
    available: AtomicBool,
    fail_open: AtomicBool,
    opened: Mutex<Vec<String>>,
    watched: Mutex<Option<Arc<SourceRegistry>>>,
    in_flight_at_open: Mutex<Vec<bool>>,
}

impl RecordingSurface {
    pub fn new() -> Self {
        Self {
            available: AtomicBool::new(true),
            fail_open: AtomicBool::new(false),
            opened: Mutex::new(Vec::new()),
            watched: Mutex::new(None),
            in_flight_at_open: Mutex::new(Vec::new()),
        }
    }

    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    pub fn set_fail_open(&self, fail: bool) {
        self.fail_open.store(fail, Ordering::SeqCst);
    }

    /// Samples `registry.is_in_flight()` each time a URL is opened.
    pub fn watch(&self, registry: Arc<SourceRegistry>) {
        *self.watched.lock().unwrap() = Some(registry);
    }

    pub fn opened(&self) -> Vec<String> {
        self.opened.lock().unwrap().clone()
    }

    pub fn in_flight_at_open(&self) -> Vec<bool> {
        self.in_flight_at_open.lock().unwrap().clone()
    }
}

impl RedirectSurface for RecordingSurface {
    fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }

    fn open_url(&self, url: String) -> Result<(), SurfaceError> {
        if let Some(registry) = self.watched.lock().unwrap().as_ref() {
            self.in_flight_at_open
                .lock()
                .unwrap()
                .push(registry.is_in_flight());
        }
        if self.fail_open.load(Ordering::SeqCst) {
            return Err(SurfaceError::OpenFailed {
                message: "no browser installed".to_string(),
            });
        }
        self.opened.lock().unwrap().push(url);
        Ok(())
    }
}
