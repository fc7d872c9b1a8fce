#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use studymate_core::error::{BackendError, ErrorKind};
use studymate_core::traits::Backend;
use studymate_core::types::{Availability, BackendId, GenerationRequest};

/// Scripted backend that counts how often `generate` runs.
pub struct FakeBackend {
    pub id: BackendId,
    pub name: String,
    pub available: bool,
    pub delay: Duration,
    pub answer: Result<String, BackendError>,
    pub restructured: Option<String>,
    pub can_restructure: bool,
    pub panics: bool,
    pub calls: Arc<AtomicUsize>,
    pub last_passages: std::sync::Mutex<Vec<String>>,
}

impl FakeBackend {
    pub fn answering(id: &str, answer: &str) -> Self {
        Self {
            id: BackendId::new(id),
            name: id.to_uppercase(),
            available: true,
            delay: Duration::ZERO,
            answer: Ok(answer.to_string()),
            restructured: None,
            can_restructure: true,
            panics: false,
            calls: Arc::new(AtomicUsize::new(0)),
            last_passages: std::sync::Mutex::new(Vec::new()),
        }
    }

    pub fn failing(id: &str, kind: ErrorKind) -> Self {
        Self { answer: Err(BackendError::new(kind, "scripted failure")), ..Self::answering(id, "") }
    }

    pub fn unavailable(id: &str) -> Self {
        Self { available: false, ..Self::answering(id, "never") }
    }

    pub fn slow(id: &str, answer: &str, delay: Duration) -> Self {
        Self { delay, ..Self::answering(id, answer) }
    }

    pub fn with_restructured(mut self, text: &str) -> Self {
        self.restructured = Some(text.to_string());
        self
    }

    pub fn without_restructure(mut self) -> Self {
        self.can_restructure = false;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Backend for FakeBackend {
    fn id(&self) -> &BackendId {
        &self.id
    }

    fn display_name(&self) -> &str {
        &self.name
    }

    fn health(&self) -> Availability {
        if self.available { Availability::Available } else { Availability::Unavailable }
    }

    fn supports_restructure(&self) -> bool {
        self.can_restructure
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<String, BackendError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.panics {
            panic!("scripted panic");
        }
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if request.restructure.is_some() {
            return self.restructured.clone().ok_or_else(|| BackendError::malformed("cannot restructure"));
        }
        *self.last_passages.lock().unwrap() = request.passages.clone();
        self.answer.clone()
    }
}

pub fn shared(backends: Vec<FakeBackend>) -> (Vec<Arc<FakeBackend>>, Vec<Arc<dyn Backend>>) {
    let fakes: Vec<Arc<FakeBackend>> = backends.into_iter().map(Arc::new).collect();
    let dyns = fakes.iter().map(|f| Arc::clone(f) as Arc<dyn Backend>).collect();
    (fakes, dyns)
}
