use serde::{Deserialize, Serialize};

use crate::{
    completion::CompletionResponse,
    error::{ErrorKind, LLMError},
};

/// How one backend fared during a `complete` call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AttemptOutcome {
    Success,
    /// The breaker rejected the call; the backend was not contacted.
    CircuitOpen,
    Failed { kind: ErrorKind, message: String },
}

/// Diagnostic entry for one backend tried by the chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttemptRecord {
    pub backend_id: String,
    pub outcome: AttemptOutcome,
    /// Backend invocations made, retries included. Zero when the breaker rejected.
    pub tries: u32,
}

impl AttemptRecord {
    pub(super) fn success(backend_id: &str, tries: u32) -> Self {
        Self {
            backend_id: backend_id.to_string(),
            outcome: AttemptOutcome::Success,
            tries,
        }
    }

    pub(super) fn circuit_open(backend_id: &str) -> Self {
        Self {
            backend_id: backend_id.to_string(),
            outcome: AttemptOutcome::CircuitOpen,
            tries: 0,
        }
    }

    pub(super) fn failed(backend_id: &str, err: &LLMError, tries: u32) -> Self {
        Self {
            backend_id: backend_id.to_string(),
            outcome: AttemptOutcome::Failed {
                kind: err.kind(),
                message: err.to_string(),
            },
            tries,
        }
    }

    pub fn is_success(&self) -> bool {
        self.outcome == AttemptOutcome::Success
    }

    /// Human-readable error, `None` for a success.
    pub fn error(&self) -> Option<String> {
        match &self.outcome {
            AttemptOutcome::Success => None,
            AttemptOutcome::CircuitOpen => Some("circuit open".to_string()),
            AttemptOutcome::Failed { message, .. } => Some(message.clone()),
        }
    }
}

/// Outcome of [`FallbackChain::complete`](super::FallbackChain::complete).
#[derive(Debug, Clone, PartialEq)]
pub struct FallbackResult {
    pub succeeded: bool,
    pub response: Option<CompletionResponse>,
    /// Backend that answered; `None` when served from cache or when every backend failed
    pub used_backend_id: Option<String>,
    /// One record per backend tried, in the order they were tried
    pub attempts: Vec<AttemptRecord>,
    /// The caller's token fired before a backend answered
    pub cancelled: bool,
}

impl FallbackResult {
    pub(super) fn cached(response: CompletionResponse) -> Self {
        Self {
            succeeded: true,
            response: Some(response),
            used_backend_id: None,
            attempts: Vec::new(),
            cancelled: false,
        }
    }

    pub(super) fn answered(
        response: CompletionResponse,
        backend_id: &str,
        attempts: Vec<AttemptRecord>,
    ) -> Self {
        Self {
            succeeded: true,
            response: Some(response),
            used_backend_id: Some(backend_id.to_string()),
            attempts,
            cancelled: false,
        }
    }

    pub(super) fn exhausted(attempts: Vec<AttemptRecord>, cancelled: bool) -> Self {
        Self {
            succeeded: false,
            response: None,
            used_backend_id: None,
            attempts,
            cancelled,
        }
    }

    /// Served from cache without touching a backend.
    pub fn from_cache(&self) -> bool {
        self.succeeded && self.used_backend_id.is_none()
    }

    /// Whether the call stopped because the caller cancelled it, either mid-call or
    /// before the next backend was tried.
    pub fn was_cancelled(&self) -> bool {
        self.cancelled
    }

    /// Converts into a plain `Result`, summarising every attempt on failure.
    ///
    /// A chain whose every backend was circuit-open yields [`LLMError::CircuitOpen`]
    /// naming them all.
    pub fn into_result(self) -> Result<CompletionResponse, LLMError> {
        if self.was_cancelled() {
            return Err(LLMError::Cancelled);
        }
        let all_open = !self.attempts.is_empty()
            && self
                .attempts
                .iter()
                .all(|attempt| attempt.outcome == AttemptOutcome::CircuitOpen);
        if all_open {
            let backend = self
                .attempts
                .iter()
                .map(|attempt| attempt.backend_id.as_str())
                .collect::<Vec<_>>()
                .join(", ");
            return Err(LLMError::CircuitOpen { backend });
        }
        match self.response {
            Some(response) if self.succeeded => Ok(response),
            _ => Err(LLMError::Generic(format!(
                "all backends failed: {}",
                summarize(&self.attempts)
            ))),
        }
    }
}

fn summarize(attempts: &[AttemptRecord]) -> String {
    if attempts.is_empty() {
        return "no backend was tried".to_string();
    }
    attempts
        .iter()
        .map(|attempt| {
            format!(
                "{}: {}",
                attempt.backend_id,
                attempt.error().unwrap_or_else(|| "ok".to_string())
            )
        })
        .collect::<Vec<_>>()
        .join("; ")
}
