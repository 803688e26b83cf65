//! A scripted, in-memory [`PaymentSdk`] for test mode and local simulation.
//!
//! Created sources get fresh identifiers; status queries are answered from a
//! script and keep answering `pending` once it runs out.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use uuid::Uuid;

use crate::platform::{PaymentSdk, SdkError};
use crate::source::{Source, SourceFlow, SourceParams, SourceStatus};

/// One scripted answer to [`PaymentSdk::retrieve_source`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptedQuery {
    /// Answer with the created source in this status.
    Status(SourceStatus),
    /// Fail the query with this message.
    Error(String),
}

impl ScriptedQuery {
    /// Parses one entry of a status script: `error` fails the query, anything
    /// else is read as an SDK status string.
    #[must_use]
    pub fn parse(entry: &str) -> Self {
        if entry.trim().eq_ignore_ascii_case("error") {
            Self::Error("scripted query failure".to_string())
        } else {
            Self::Status(SourceStatus::from_sdk(entry.trim()))
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A payment SDK answering from a script and recording every call.
#[derive(Debug)]
pub struct ScriptedSdk {
    flow: SourceFlow,
    creation_failure: Option<String>,
    stall: Option<Duration>,
    queries: Mutex<VecDeque<ScriptedQuery>>,
    created: Mutex<Vec<Source>>,
    create_params: Mutex<Vec<SourceParams>>,
    queried: Mutex<Vec<(String, String)>>,
    keys: Mutex<Vec<String>>,
    query_count: AtomicUsize,
}

impl ScriptedSdk {
    /// An SDK creating sources with the given flow.
    #[must_use]
    pub fn new(flow: SourceFlow) -> Self {
        Self {
            flow,
            creation_failure: None,
            stall: None,
            queries: Mutex::new(VecDeque::new()),
            created: Mutex::new(Vec::new()),
            create_params: Mutex::new(Vec::new()),
            queried: Mutex::new(Vec::new()),
            keys: Mutex::new(Vec::new()),
            query_count: AtomicUsize::new(0),
        }
    }

    /// Answers status queries with `queries`, in order.
    #[must_use]
    pub fn answering(self, queries: impl IntoIterator<Item = ScriptedQuery>) -> Self {
        lock(&self.queries).extend(queries);
        self
    }

    /// Refuses every source creation with `message`.
    #[must_use]
    pub fn failing_creation(mut self, message: impl Into<String>) -> Self {
        self.creation_failure = Some(message.into());
        self
    }

    /// Blocks every status query for `stall` before answering.
    #[must_use]
    pub const fn stalling(mut self, stall: Duration) -> Self {
        self.stall = Some(stall);
        self
    }

    /// Number of status queries received so far.
    #[must_use]
    pub fn query_count(&self) -> usize {
        self.query_count.load(Ordering::SeqCst)
    }

    /// `(source_id, client_secret)` of every status query, in order.
    #[must_use]
    pub fn queried(&self) -> Vec<(String, String)> {
        lock(&self.queried).clone()
    }

    /// Every publishable key the SDK was configured with.
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        lock(&self.keys).clone()
    }

    /// Parameters of every creation request, as received.
    #[must_use]
    pub fn create_params(&self) -> Vec<SourceParams> {
        lock(&self.create_params).clone()
    }

    /// Every source created so far.
    #[must_use]
    pub fn created(&self) -> Vec<Source> {
        lock(&self.created).clone()
    }

    /// The most recently created source.
    #[must_use]
    pub fn last_created(&self) -> Option<Source> {
        lock(&self.created).last().cloned()
    }
}

impl Default for ScriptedSdk {
    fn default() -> Self {
        Self::new(SourceFlow::Redirect)
    }
}

impl PaymentSdk for ScriptedSdk {
    fn set_publishable_key(&self, publishable_key: String) -> Result<(), SdkError> {
        if !publishable_key.starts_with("pk_") {
            return Err(SdkError::Failed {
                message: "not a publishable key".to_string(),
            });
        }
        lock(&self.keys).push(publishable_key);
        Ok(())
    }

    fn create_source(&self, params: SourceParams) -> Result<Source, SdkError> {
        lock(&self.create_params).push(params.clone());
        if let Some(message) = &self.creation_failure {
            return Err(SdkError::Failed {
                message: message.clone(),
            });
        }

        let id = format!("src_{}", Uuid::new_v4().simple());
        // query-string delimiters must survive the return leg untouched
        let client_secret = format!("{id}_secret_{}+/=&?", Uuid::new_v4().simple());
        let redirect_url = matches!(self.flow, SourceFlow::Redirect)
            .then(|| format!("https://hooks.example/redirect/{id}"));
        let source = Source {
            id,
            client_secret,
            flow: self.flow,
            status: SourceStatus::Pending,
            redirect_url,
            source_type: Some(params.source_type.to_string()),
            amount: params.amount,
            currency: params.currency,
        };
        log::debug!("scripted sdk created source {}", source.id);
        lock(&self.created).push(source.clone());
        Ok(source)
    }

    fn retrieve_source(
        &self,
        source_id: String,
        client_secret: String,
    ) -> Result<Source, SdkError> {
        self.query_count.fetch_add(1, Ordering::SeqCst);
        lock(&self.queried).push((source_id.clone(), client_secret.clone()));
        if let Some(stall) = self.stall {
            std::thread::sleep(stall);
        }

        let status = match lock(&self.queries).pop_front() {
            None => SourceStatus::Pending,
            Some(ScriptedQuery::Status(status)) => status,
            Some(ScriptedQuery::Error(message)) => return Err(SdkError::Failed { message }),
        };
        let known = lock(&self.created)
            .iter()
            .find(|source| source.id == source_id)
            .cloned();
        let mut source = known.unwrap_or_else(|| Source {
            id: source_id,
            client_secret,
            flow: self.flow,
            status,
            redirect_url: None,
            source_type: None,
            amount: None,
            currency: None,
        });
        source.status = status;
        Ok(source)
    }
}
