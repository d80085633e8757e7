use async_trait::async_trait;

use crate::{
    backoff::BackoffPolicy,
    completion::{CompletionProvider, CompletionRequest, CompletionResponse},
    error::LLMError,
};

use super::retry::retry_with_policy;

/// Resilient wrapper that retries transient failures of a single backend using
/// exponential backoff.
pub struct ResilientLLM {
    inner: Box<dyn CompletionProvider>,
    policy: BackoffPolicy,
    label: String,
}

impl ResilientLLM {
    /// Creates a new resilient wrapper around an existing provider.
    pub fn new(inner: Box<dyn CompletionProvider>, policy: BackoffPolicy) -> Self {
        Self {
            inner,
            policy,
            label: "resilient".to_string(),
        }
    }

    /// Name used in log lines.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn policy(&self) -> &BackoffPolicy {
        &self.policy
    }
}

#[async_trait]
impl CompletionProvider for ResilientLLM {
    async fn complete(&self, req: &CompletionRequest) -> Result<CompletionResponse, LLMError> {
        let outcome =
            retry_with_policy(&self.policy, &self.label, || self.inner.complete(req)).await;
        match outcome.result {
            Ok(response) => Ok(response),
            Err(err) if err.is_retryable() => Err(LLMError::RetryExceeded {
                attempts: outcome.attempts,
                last_error: err.to_string(),
            }),
            Err(err) => Err(err),
        }
    }
}
