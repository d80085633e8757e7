//! Scripted in-process backend.
//!
//! Plays back a queue of outcomes, then falls back to a default reply. Useful for tests,
//! demos and for exercising fallback routing without network access.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::{
    completion::{CompletionProvider, CompletionRequest, CompletionResponse, Usage},
    error::LLMError,
};

/// Failure classes the mock can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockFailure {
    /// 5xx-style provider error
    Transient,
    RateLimited,
    Timeout,
    Auth,
}

impl MockFailure {
    fn to_error(self, name: &str) -> LLMError {
        match self {
            MockFailure::Transient => LLMError::ProviderError(format!("{name}: 503 unavailable")),
            MockFailure::RateLimited => LLMError::RateLimited(format!("{name}: 429 slow down")),
            MockFailure::Timeout => LLMError::Timeout(format!("{name}: no response")),
            MockFailure::Auth => LLMError::AuthError(format!("{name}: invalid api key")),
        }
    }
}

/// One scripted outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockOutcome {
    Reply(String),
    Fail(MockFailure),
}

/// A [`CompletionProvider`] driven by a script.
#[derive(Debug)]
pub struct MockProvider {
    name: String,
    default_reply: Option<String>,
    default_failure: Option<MockFailure>,
    script: Mutex<VecDeque<MockOutcome>>,
    latency: Option<Duration>,
    calls: AtomicUsize,
}

impl MockProvider {
    /// A backend that always replies with `reply`.
    pub fn new(name: impl Into<String>, reply: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            default_reply: Some(reply.into()),
            default_failure: None,
            script: Mutex::new(VecDeque::new()),
            latency: None,
            calls: AtomicUsize::new(0),
        }
    }

    /// A backend that always fails with `failure`.
    pub fn failing(name: impl Into<String>, failure: MockFailure) -> Self {
        Self {
            default_reply: None,
            default_failure: Some(failure),
            ..Self::new(name, "")
        }
    }

    /// Queues outcomes to be played back before the default behaviour.
    pub fn with_script(self, outcomes: impl IntoIterator<Item = MockOutcome>) -> Self {
        self.lock_script().extend(outcomes);
        self
    }

    /// Sleeps this long before every answer.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of times `complete` was called.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn next_outcome(&self) -> MockOutcome {
        if let Some(outcome) = self.lock_script().pop_front() {
            return outcome;
        }
        match (&self.default_failure, &self.default_reply) {
            (Some(failure), _) => MockOutcome::Fail(*failure),
            (None, Some(reply)) => MockOutcome::Reply(reply.clone()),
            (None, None) => MockOutcome::Fail(MockFailure::Transient),
        }
    }

    fn lock_script(&self) -> std::sync::MutexGuard<'_, VecDeque<MockOutcome>> {
        self.script
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl CompletionProvider for MockProvider {
    async fn complete(&self, req: &CompletionRequest) -> Result<CompletionResponse, LLMError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        match self.next_outcome() {
            MockOutcome::Reply(text) => {
                let prompt_tokens = count_words(req.messages.iter().map(|m| m.content.as_str()));
                let completion_tokens = count_words(std::iter::once(text.as_str()));
                Ok(CompletionResponse {
                    text,
                    model: req.model.clone().or_else(|| Some("mock-model".to_string())),
                    backend: Some(self.name.clone()),
                    usage: Some(Usage {
                        prompt_tokens,
                        completion_tokens,
                        total_tokens: prompt_tokens + completion_tokens,
                    }),
                })
            }
            MockOutcome::Fail(failure) => Err(failure.to_error(&self.name)),
        }
    }
}

fn count_words<'a>(texts: impl Iterator<Item = &'a str>) -> u32 {
    let words: usize = texts.map(|text| text.split_whitespace().count()).sum();
    u32::try_from(words).unwrap_or(u32::MAX)
}

#[cfg(test)]
mod tests {
    use super::{MockFailure, MockOutcome, MockProvider};
    use crate::completion::{CompletionProvider, CompletionRequest};

    #[tokio::test]
    async fn plays_script_then_default() {
        let mock = MockProvider::new("mock", "fine").with_script([
            MockOutcome::Fail(MockFailure::Timeout),
            MockOutcome::Reply("scripted".to_string()),
        ]);
        let req = CompletionRequest::new("two words");

        let err = mock.complete(&req).await.expect_err("scripted failure");
        assert!(err.is_timeout());
        assert_eq!(mock.complete(&req).await.expect("reply").text, "scripted");

        let response = mock.complete(&req).await.expect("default");
        assert_eq!(response.text, "fine");
        assert_eq!(response.backend.as_deref(), Some("mock"));
        assert_eq!(response.usage.expect("usage").prompt_tokens, 2);
        assert_eq!(mock.calls(), 3);
    }

    #[tokio::test]
    async fn failing_mock_always_fails() {
        let mock = MockProvider::failing("down", MockFailure::Auth);
        let err = mock
            .complete(&CompletionRequest::new("hi"))
            .await
            .expect_err("auth failure");
        assert!(err.is_auth_error());
    }
}
