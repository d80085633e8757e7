use std::fmt;
use std::sync::Arc;

use crate::{
    backoff::BackoffPolicy, circuit_breaker::CircuitBreaker, completion::CompletionProvider,
    error::LLMError,
};

/// One backend in a fallback chain together with its breaker and retry schedule.
pub(super) struct ChainLink {
    pub(super) id: BackendId,
    pub(super) provider: Arc<dyn CompletionProvider>,
    pub(super) breaker: Arc<CircuitBreaker>,
    pub(super) policy: BackoffPolicy,
}

impl ChainLink {
    pub(super) fn id(&self) -> &str {
        self.id.as_str()
    }
}

impl fmt::Debug for ChainLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChainLink")
            .field("id", &self.id)
            .field("breaker", &self.breaker)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

/// Non-empty backend identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(super) struct BackendId(String);

impl BackendId {
    pub(super) fn new(id: impl Into<String>) -> Result<Self, LLMError> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(LLMError::config("backend id cannot be empty"));
        }
        Ok(Self(id))
    }

    pub(super) fn as_str(&self) -> &str {
        &self.0
    }
}
