use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::join_all;
use tracing::{debug, info, warn};

use studymate_core::config::OrchestratorConfig;
use studymate_core::error::{BackendError, Error, ErrorKind, Result};
use studymate_core::traits::Backend;
use studymate_core::types::{Availability, BackendCall, CallState, BackendId, CombinedAnswer, GenerationRequest, OutlineKind};

use crate::combine::{policy_for, CombinePolicy, Contribution};

/// Owns the backend adapters and runs one query round across them.
pub struct Orchestrator {
    backends: BTreeMap<BackendId, Arc<dyn Backend>>,
    timeout: Duration,
    policy: Box<dyn CombinePolicy>,
}

impl Orchestrator {
    pub fn new(backends: Vec<Arc<dyn Backend>>, config: &OrchestratorConfig) -> Self {
        let backends = backends.into_iter().map(|b| (b.id().clone(), b)).collect();
        Self { backends, timeout: Duration::from_millis(config.timeout_ms), policy: policy_for(config.combine) }
    }

    pub fn with_policy(mut self, policy: Box<dyn CombinePolicy>) -> Self {
        self.policy = policy;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn backend(&self, id: &BackendId) -> Option<&Arc<dyn Backend>> {
        self.backends.get(id)
    }

    pub fn status(&self) -> BTreeMap<BackendId, Availability> {
        self.backends.iter().map(|(id, b)| (id.clone(), b.health())).collect()
    }

    /// Run `request` on every requested backend concurrently and wait for all of them.
    ///
    /// Unknown or unavailable backends are recorded as failed without being called.
    /// The returned calls are in BackendId order.
    pub async fn dispatch(&self, requested: &BTreeSet<BackendId>, request: GenerationRequest) -> Vec<BackendCall> {
        let request = Arc::new(request);
        let round_start = Instant::now();
        let mut calls: Vec<BackendCall> = Vec::with_capacity(requested.len());
        let mut pending = Vec::new();

        for id in requested {
            let Some(backend) = self.backends.get(id) else {
                calls.push(BackendCall::failed(id.clone(), &BackendError::unavailable("unknown backend"), Duration::ZERO));
                continue;
            };
            if backend.health() == Availability::Unavailable {
                calls.push(BackendCall::failed(id.clone(), &BackendError::unavailable("backend unavailable"), Duration::ZERO));
                continue;
            }
            let backend = Arc::clone(backend);
            let request = Arc::clone(&request);
            let timeout = self.timeout;
            let handle = tokio::spawn(async move { run_call(backend, request, timeout).await });
            pending.push((calls.len(), id.clone(), handle));
            calls.push(BackendCall::pending(id.clone()));
        }
        debug!(requested = requested.len(), dispatched = pending.len(), "dispatching backend calls");

        let (slots, rest): (Vec<_>, Vec<_>) = pending.into_iter().map(|(slot, id, handle)| ((slot, id), handle)).unzip();
        for ((slot, id), joined) in slots.into_iter().zip(join_all(rest).await) {
            let call = joined.unwrap_or_else(|e| {
                warn!(backend = %id, error = %e, "backend task aborted");
                BackendCall::failed(id, &BackendError::new(ErrorKind::Internal, format!("backend task failed: {e}")), round_start.elapsed())
            });
            calls[slot] = call;
        }
        debug_assert!(calls.iter().all(|c| c.state != CallState::Pending));
        calls
    }

    /// Merge the successful calls of a round. Zero successes fail the round.
    pub fn combine(&self, calls: Vec<BackendCall>, outline: Option<OutlineKind>) -> Result<CombinedAnswer> {
        let (contributors, missing): (Vec<_>, Vec<_>) = calls.iter().cloned().partition(BackendCall::is_success);
        if contributors.is_empty() {
            return Err(Error::AllBackendsFailed { calls });
        }

        let text = if contributors.len() == 1 {
            contributors[0].answer.clone().unwrap_or_default()
        } else {
            let contributions: Vec<Contribution<'_>> = contributors
                .iter()
                .map(|c| Contribution {
                    backend: &c.backend,
                    label: self.backends.get(&c.backend).map_or(c.backend.as_str(), |b| b.display_name()),
                    answer: c.answer.as_deref().unwrap_or_default(),
                })
                .collect();
            self.policy.combine(&contributions, outline)
        };
        info!(contributors = contributors.len(), missing = missing.len(), policy = self.policy.name(), "combined answers");
        Ok(CombinedAnswer { text, contributors, missing })
    }

    /// `dispatch` followed by `combine`.
    pub async fn run(&self, requested: &BTreeSet<BackendId>, request: GenerationRequest, outline: Option<OutlineKind>) -> Result<CombinedAnswer> {
        let calls = self.dispatch(requested, request).await;
        self.combine(calls, outline)
    }
}

async fn run_call(backend: Arc<dyn Backend>, request: Arc<GenerationRequest>, timeout: Duration) -> BackendCall {
    let id = backend.id().clone();
    let start = Instant::now();
    let outcome = tokio::time::timeout(timeout, backend.generate(&request)).await;
    let latency = start.elapsed();
    match outcome {
        Ok(Ok(answer)) => {
            debug!(backend = %id, latency_ms = latency.as_millis() as u64, "backend answered");
            BackendCall::succeeded(id, answer, latency)
        }
        Ok(Err(e)) => {
            warn!(backend = %id, kind = %e.kind, error = %e.message, "backend failed");
            BackendCall::failed(id, &e, latency)
        }
        Err(_) => {
            warn!(backend = %id, timeout_ms = timeout.as_millis() as u64, "backend timed out");
            BackendCall::failed(id, &BackendError::new(ErrorKind::Timeout, format!("no answer within {} ms", timeout.as_millis())), latency)
        }
    }
}
