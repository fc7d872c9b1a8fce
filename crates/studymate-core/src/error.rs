use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::types::BackendCall;

/// Failure categories shared by every backend adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Unavailable,
    AuthFailed,
    RateLimited,
    Timeout,
    MalformedResponse,
    Transport,
    Internal,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unavailable => "unavailable",
            Self::AuthFailed => "auth_failed",
            Self::RateLimited => "rate_limited",
            Self::Timeout => "timeout",
            Self::MalformedResponse => "malformed_response",
            Self::Transport => "transport",
            Self::Internal => "internal",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A recovered, typed backend failure. Never propagated past the orchestrator.
#[derive(Debug, Clone, Error)]
#[error("{kind}: {message}")]
pub struct BackendError {
    pub kind: ErrorKind,
    pub message: String,
}

impl BackendError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self { kind, message: message.into() }
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unavailable, message)
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::MalformedResponse, message)
    }
}

/// Whole-call failures surfaced to callers of the pipeline.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Document produced no passages to index")]
    EmptyDocument,

    #[error("No index built: ingest a document before asking")]
    NoIndexBuilt,

    #[error("All {} requested backends failed", calls.len())]
    AllBackendsFailed { calls: Vec<BackendCall> },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Operation failed: {0}")]
    Operation(String),
}

pub type Result<T> = std::result::Result<T, Error>;
