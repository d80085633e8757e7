use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, RwLock};

use tokio_util::sync::CancellationToken;

use crate::{
    backoff::BackoffPolicy,
    cache::{FingerprintFn, TtlCache},
    circuit_breaker::{BreakerSnapshot, CircuitBreaker, CircuitBreakerConfig},
    clock::Clock,
    completion::{CompletionProvider, CompletionRequest, CompletionResponse},
    config::ResilienceSettings,
    error::LLMError,
    resilient_llm::{retry_with_policy, RetryOutcome},
};

use super::{
    builder::{make_link, FallbackChainBuilder},
    link::{BackendId, ChainLink},
    result::{AttemptRecord, FallbackResult},
    stats::{ChainStats, StatsRecorder},
};

/// Tries backends in priority order, each behind its own circuit breaker and retry
/// loop, with an optional response cache in front.
///
/// The chain is `Send + Sync`; share it behind an `Arc` to serve concurrent callers.
pub struct FallbackChain {
    links: RwLock<Vec<Arc<ChainLink>>>,
    cache: Option<Arc<TtlCache<String, CompletionResponse>>>,
    fingerprint: FingerprintFn,
    clock: Arc<dyn Clock>,
    stats: StatsRecorder,
}

enum LinkOutcome {
    Answered(CompletionResponse),
    Failed,
    Cancelled,
}

impl FallbackChain {
    /// Starts an empty [`FallbackChainBuilder`].
    pub fn builder() -> FallbackChainBuilder {
        FallbackChainBuilder::new()
    }

    /// Builds a chain straight from settings. See [`FallbackChainBuilder::from_settings`].
    pub fn from_settings(
        settings: &ResilienceSettings,
        providers: impl IntoIterator<Item = (String, Arc<dyn CompletionProvider>)>,
    ) -> Result<Self, LLMError> {
        FallbackChainBuilder::from_settings(settings, providers)?.build()
    }

    pub(super) fn from_parts(
        links: Vec<Arc<ChainLink>>,
        cache: Option<Arc<TtlCache<String, CompletionResponse>>>,
        fingerprint: FingerprintFn,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            links: RwLock::new(links),
            cache,
            fingerprint,
            clock,
            stats: StatsRecorder::default(),
        }
    }

    /// Serves `request` from the cache or the first backend that answers.
    ///
    /// Never returns an error: a failed call yields `succeeded == false` with one
    /// attempt record per backend tried.
    pub async fn complete(&self, request: &CompletionRequest) -> FallbackResult {
        self.run(request, None).await
    }

    /// Like [`complete`](Self::complete), but stops as soon as `token` is cancelled.
    ///
    /// An in-flight backend call that gets cancelled counts as a failure for that
    /// backend's breaker and is never retried; no further backends are tried.
    pub async fn complete_with_cancel(
        &self,
        request: &CompletionRequest,
        token: &CancellationToken,
    ) -> FallbackResult {
        self.run(request, Some(token)).await
    }

    async fn run(
        &self,
        request: &CompletionRequest,
        token: Option<&CancellationToken>,
    ) -> FallbackResult {
        self.stats.request();

        let key = self.cache.as_ref().map(|_| (self.fingerprint)(request));
        if let (Some(cache), Some(key)) = (&self.cache, &key) {
            if let Some(response) = cache.get(key) {
                log::debug!("fallback chain: cache hit");
                self.stats.cache_hit();
                self.stats.success();
                return FallbackResult::cached(response);
            }
        }

        let links = self.snapshot_links();
        let mut attempts = Vec::with_capacity(links.len());
        let mut cancelled = false;
        for link in &links {
            if token.is_some_and(CancellationToken::is_cancelled) {
                log::info!("fallback chain: cancelled before trying {}", link.id());
                cancelled = true;
                break;
            }
            match self.try_link(link, request, token, &mut attempts).await {
                LinkOutcome::Answered(response) => {
                    if let (Some(cache), Some(key)) = (&self.cache, key) {
                        cache.put(key, response.clone());
                    }
                    self.stats.success();
                    return FallbackResult::answered(response, link.id(), attempts);
                }
                LinkOutcome::Failed => continue,
                LinkOutcome::Cancelled => {
                    cancelled = true;
                    break;
                }
            }
        }

        cancelled |= token.is_some_and(CancellationToken::is_cancelled);
        self.stats.failure();
        if !cancelled {
            log::warn!(
                "fallback chain: no backend answered after {} attempt(s)",
                attempts.len()
            );
        }
        FallbackResult::exhausted(attempts, cancelled)
    }

    async fn try_link(
        &self,
        link: &ChainLink,
        request: &CompletionRequest,
        token: Option<&CancellationToken>,
        attempts: &mut Vec<AttemptRecord>,
    ) -> LinkOutcome {
        let Some(admission) = link.breaker.try_acquire() else {
            log::debug!("fallback chain: {} skipped, circuit open", link.id());
            self.stats.circuit_rejection();
            attempts.push(AttemptRecord::circuit_open(link.id()));
            return LinkOutcome::Failed;
        };

        let tries = AtomicU32::new(0);
        let retry = retry_with_policy(&link.policy, link.id(), || {
            tries.fetch_add(1, Ordering::Relaxed);
            link.provider.complete(request)
        });

        let outcome = match token {
            Some(token) => tokio::select! {
                biased;
                _ = token.cancelled() => None,
                outcome = retry => Some(outcome),
            },
            None => Some(retry.await),
        };

        let Some(RetryOutcome { result, attempts: made }) = outcome else {
            let made = tries.load(Ordering::Relaxed);
            log::info!("fallback chain: {} cancelled by caller", link.id());
            admission.failure();
            self.stats.retries(made);
            attempts.push(AttemptRecord::failed(link.id(), &LLMError::Cancelled, made));
            return LinkOutcome::Cancelled;
        };

        self.stats.retries(made);
        match result {
            Ok(response) => {
                admission.success();
                attempts.push(AttemptRecord::success(link.id(), made));
                LinkOutcome::Answered(response)
            }
            Err(err) => {
                admission.failure();
                log::warn!(
                    "fallback chain: {} failed after {made} attempt(s): {err}",
                    link.id()
                );
                attempts.push(AttemptRecord::failed(link.id(), &err, made));
                if err.is_cancelled() {
                    LinkOutcome::Cancelled
                } else {
                    LinkOutcome::Failed
                }
            }
        }
    }

    fn snapshot_links(&self) -> Vec<Arc<ChainLink>> {
        self.links
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Backend ids in the order they are tried.
    pub fn backend_ids(&self) -> Vec<String> {
        self.snapshot_links()
            .iter()
            .map(|link| link.id().to_string())
            .collect()
    }

    /// Appends a backend at the lowest priority.
    pub fn add_link(
        &self,
        id: impl Into<String>,
        provider: impl CompletionProvider + 'static,
        breaker: CircuitBreakerConfig,
        policy: BackoffPolicy,
    ) -> Result<(), LLMError> {
        let id = BackendId::new(id)?;
        let link = make_link(id, Arc::new(provider), breaker, policy, &self.clock)?;

        let mut links = self
            .links
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if links.iter().any(|existing| existing.id() == link.id()) {
            return Err(LLMError::config(format!(
                "backend '{}' is already in the chain",
                link.id()
            )));
        }
        log::info!("fallback chain: added backend {}", link.id());
        links.push(Arc::new(link));
        Ok(())
    }

    /// Removes a backend. Calls already running against it finish normally.
    pub fn remove_link(&self, id: &str) -> Result<(), LLMError> {
        let mut links = self
            .links
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let Some(index) = links.iter().position(|link| link.id() == id) else {
            return Err(LLMError::InvalidRequest(format!("unknown backend '{id}'")));
        };
        if links.len() == 1 {
            return Err(LLMError::InvalidRequest(
                "cannot remove the last backend of a fallback chain".to_string(),
            ));
        }
        links.remove(index);
        log::info!("fallback chain: removed backend {id}");
        Ok(())
    }

    /// The breaker guarding backend `id`, for inspection or operator actions such as
    /// [`CircuitBreaker::reset`].
    pub fn breaker(&self, id: &str) -> Option<Arc<CircuitBreaker>> {
        self.snapshot_links()
            .iter()
            .find(|link| link.id() == id)
            .map(|link| Arc::clone(&link.breaker))
    }

    /// Breaker state of every backend, in chain order.
    pub fn health(&self) -> Vec<(String, BreakerSnapshot)> {
        self.snapshot_links()
            .iter()
            .map(|link| (link.id().to_string(), link.breaker.snapshot()))
            .collect()
    }

    /// The response cache, if one was configured.
    pub fn cache(&self) -> Option<&Arc<TtlCache<String, CompletionResponse>>> {
        self.cache.as_ref()
    }

    /// Request counters since the chain was built.
    pub fn stats(&self) -> ChainStats {
        self.stats.snapshot()
    }
}

impl fmt::Debug for FallbackChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FallbackChain")
            .field("links", &self.backend_ids())
            .field("cached", &self.cache.is_some())
            .field("stats", &self.stats())
            .finish()
    }
}
