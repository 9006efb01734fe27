//! Scripted port implementations
//!
//! Each mock records what it was asked to do so tests can assert on the
//! exact sequence of calls the routing core made.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use polaris_core::{AccountMetadataReader, EndpointProber, OperationRequest, RequestExecutor};
use polaris_domain::{AccountProperties, ClassifiedError, Endpoint, ExecutorResponse, TopologyError};
use serde_json::json;
use tokio::time::Instant;

/// One scripted executor reaction
#[derive(Debug, Clone)]
pub enum Step {
    Respond(Result<ExecutorResponse, ClassifiedError>),
    /// Never completes; only the deadline or cancellation ends the attempt
    Hang,
}

/// An executor call as observed by the mock
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub endpoint: Endpoint,
    pub session_token: Option<String>,
    pub at: Instant,
}

/// Executor that replays a script in call order
///
/// Region rules take precedence over the script. Once the script is empty
/// every call succeeds with `{"ok": true}`.
#[derive(Default)]
pub struct ScriptedExecutor {
    script: Mutex<VecDeque<Step>>,
    region_rules: Mutex<HashMap<String, ClassifiedError>>,
    calls: Mutex<Vec<RecordedCall>>,
    routing_refreshes: AtomicUsize,
}

impl ScriptedExecutor {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn then(&self, step: Step) -> &Self {
        self.script.lock().push_back(step);
        self
    }

    pub fn then_err(&self, error: ClassifiedError) -> &Self {
        self.then(Step::Respond(Err(error)))
    }

    pub fn then_ok(&self, response: ExecutorResponse) -> &Self {
        self.then(Step::Respond(Ok(response)))
    }

    pub fn then_hang(&self) -> &Self {
        self.then(Step::Hang)
    }

    /// Every call to `region` fails with `error`
    pub fn fail_region(&self, region: &str, error: ClassifiedError) {
        self.region_rules.lock().insert(region.to_string(), error);
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    pub fn regions_called(&self) -> Vec<String> {
        self.calls.lock().iter().map(|c| c.endpoint.region.clone()).collect()
    }

    pub fn routing_refreshes(&self) -> usize {
        self.routing_refreshes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RequestExecutor for ScriptedExecutor {
    async fn execute(
        &self,
        endpoint: &Endpoint,
        _request: &OperationRequest,
        session_token: Option<&str>,
    ) -> Result<ExecutorResponse, ClassifiedError> {
        self.calls.lock().push(RecordedCall {
            endpoint: endpoint.clone(),
            session_token: session_token.map(str::to_string),
            at: Instant::now(),
        });

        if let Some(error) = self.region_rules.lock().get(&endpoint.region).cloned() {
            return Err(error);
        }

        let step = self.script.lock().pop_front();
        match step {
            Some(Step::Respond(result)) => result,
            Some(Step::Hang) => std::future::pending().await,
            None => Ok(ExecutorResponse::ok(json!({"ok": true}))),
        }
    }

    async fn refresh_routing(&self, _partition: Option<&str>) {
        self.routing_refreshes.fetch_add(1, Ordering::SeqCst);
    }
}

/// Metadata reader that replays documents, then repeats the last good one
#[derive(Default)]
pub struct ScriptedReader {
    documents: Mutex<VecDeque<Result<AccountProperties, TopologyError>>>,
    last: Mutex<Option<AccountProperties>>,
    calls: AtomicUsize,
}

impl ScriptedReader {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Reader that always returns `document`
    pub fn serving(document: AccountProperties) -> Arc<Self> {
        let reader = Self::new();
        reader.push(Ok(document));
        reader
    }

    pub fn push(&self, document: Result<AccountProperties, TopologyError>) {
        self.documents.lock().push_back(document);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AccountMetadataReader for ScriptedReader {
    async fn read_account(&self) -> Result<AccountProperties, TopologyError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let next = self.documents.lock().pop_front();
        match next {
            Some(Ok(document)) => {
                *self.last.lock() = Some(document.clone());
                Ok(document)
            }
            Some(Err(e)) => Err(e),
            None => self
                .last
                .lock()
                .clone()
                .ok_or_else(|| TopologyError::Unavailable("no document scripted".into())),
        }
    }
}

/// Prober whose answer can be flipped at runtime
pub struct TogglingProber {
    alive: AtomicBool,
    probes: AtomicUsize,
}

impl TogglingProber {
    pub fn new(alive: bool) -> Arc<Self> {
        Arc::new(Self { alive: AtomicBool::new(alive), probes: AtomicUsize::new(0) })
    }

    pub fn set_alive(&self, alive: bool) {
        self.alive.store(alive, Ordering::SeqCst);
    }

    pub fn probes(&self) -> usize {
        self.probes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EndpointProber for TogglingProber {
    async fn probe(&self, _endpoint: &Endpoint) -> bool {
        self.probes.fetch_add(1, Ordering::SeqCst);
        self.alive.load(Ordering::SeqCst)
    }
}
