use std::collections::HashSet;
use std::sync::Arc;

use crate::{
    backoff::BackoffPolicy,
    cache::{fingerprint, FingerprintFn, TtlCache},
    circuit_breaker::{CircuitBreaker, CircuitBreakerConfig},
    clock::{self, Clock},
    completion::{CompletionProvider, CompletionResponse},
    config::ResilienceSettings,
    error::LLMError,
};

use super::{
    chain::FallbackChain,
    link::{BackendId, ChainLink},
};

struct PendingLink {
    id: String,
    provider: Arc<dyn CompletionProvider>,
    breaker: Option<CircuitBreakerConfig>,
    policy: Option<BackoffPolicy>,
}

/// Builder for [`FallbackChain`]. Links run in the order they are added.
pub struct FallbackChainBuilder {
    links: Vec<PendingLink>,
    breaker_defaults: CircuitBreakerConfig,
    backoff_defaults: BackoffPolicy,
    cache: Option<Arc<TtlCache<String, CompletionResponse>>>,
    fingerprint: Option<FingerprintFn>,
    clock: Option<Arc<dyn Clock>>,
}

impl Default for FallbackChainBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl FallbackChainBuilder {
    pub fn new() -> Self {
        Self {
            links: Vec::new(),
            breaker_defaults: CircuitBreakerConfig::default(),
            backoff_defaults: BackoffPolicy::default(),
            cache: None,
            fingerprint: None,
            clock: None,
        }
    }

    /// Seeds a builder from settings: defaults, per-backend overrides, priority order
    /// and a response cache sized from the settings.
    ///
    /// Every provider in `providers` becomes a link; settings for ids that have no
    /// provider are ignored.
    pub fn from_settings(
        settings: &ResilienceSettings,
        providers: impl IntoIterator<Item = (String, Arc<dyn CompletionProvider>)>,
    ) -> Result<Self, LLMError> {
        settings.validate()?;
        let mut providers: Vec<(String, Arc<dyn CompletionProvider>)> =
            providers.into_iter().collect();

        let order: Vec<String> = settings
            .ordered(providers.iter().map(|(id, _)| id.as_str()))
            .into_iter()
            .map(str::to_string)
            .collect();

        let mut builder = Self::new()
            .breaker_defaults(settings.breaker_config()?)
            .backoff_defaults(settings.backoff_policy()?)
            .cache(Arc::new(TtlCache::new(settings.cache_config()?)?));

        for id in order {
            let Some(index) = providers.iter().position(|(pid, _)| *pid == id) else {
                continue;
            };
            let (id, provider) = providers.swap_remove(index);
            let breaker = settings.breaker_config_for(&id)?;
            let policy = settings.backoff_policy_for(&id)?;
            builder.links.push(PendingLink {
                id,
                provider,
                breaker: Some(breaker),
                policy: Some(policy),
            });
        }
        Ok(builder)
    }

    /// Appends a backend that uses the builder's breaker and backoff defaults.
    pub fn link(
        mut self,
        id: impl Into<String>,
        provider: impl CompletionProvider + 'static,
    ) -> Self {
        self.links.push(PendingLink {
            id: id.into(),
            provider: Arc::new(provider),
            breaker: None,
            policy: None,
        });
        self
    }

    /// Appends a backend with its own breaker configuration and backoff policy.
    pub fn link_with(
        mut self,
        id: impl Into<String>,
        provider: impl CompletionProvider + 'static,
        breaker: CircuitBreakerConfig,
        policy: BackoffPolicy,
    ) -> Self {
        self.links.push(PendingLink {
            id: id.into(),
            provider: Arc::new(provider),
            breaker: Some(breaker),
            policy: Some(policy),
        });
        self
    }

    pub fn breaker_defaults(mut self, config: CircuitBreakerConfig) -> Self {
        self.breaker_defaults = config;
        self
    }

    pub fn backoff_defaults(mut self, policy: BackoffPolicy) -> Self {
        self.backoff_defaults = policy;
        self
    }

    /// Response cache consulted before any backend. Pass the same `Arc` to several
    /// chains to share it.
    pub fn cache(mut self, cache: Arc<TtlCache<String, CompletionResponse>>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Replaces the request fingerprint used as cache key.
    pub fn fingerprint<F>(mut self, f: F) -> Self
    where
        F: Fn(&crate::completion::CompletionRequest) -> String + Send + Sync + 'static,
    {
        let f: FingerprintFn = Arc::new(f);
        self.fingerprint = Some(f);
        self
    }

    /// Time source for the breakers this builder creates.
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn build(self) -> Result<FallbackChain, LLMError> {
        if self.links.is_empty() {
            return Err(LLMError::config("fallback chain needs at least one backend"));
        }
        self.breaker_defaults.validate()?;

        let clock = self.clock.unwrap_or_else(clock::system);
        let mut seen = HashSet::new();
        let mut links = Vec::with_capacity(self.links.len());
        for pending in self.links {
            let id = BackendId::new(pending.id)?;
            if !seen.insert(id.clone()) {
                return Err(LLMError::config(format!(
                    "backend '{}' added twice",
                    id.as_str()
                )));
            }
            links.push(Arc::new(make_link(
                id,
                pending.provider,
                pending.breaker.unwrap_or_else(|| self.breaker_defaults.clone()),
                pending.policy.unwrap_or_else(|| self.backoff_defaults.clone()),
                &clock,
            )?));
        }

        Ok(FallbackChain::from_parts(
            links,
            self.cache,
            self.fingerprint
                .unwrap_or_else(|| Arc::new(fingerprint) as FingerprintFn),
            clock,
        ))
    }
}

pub(super) fn make_link(
    id: BackendId,
    provider: Arc<dyn CompletionProvider>,
    breaker: CircuitBreakerConfig,
    policy: BackoffPolicy,
    clock: &Arc<dyn Clock>,
) -> Result<ChainLink, LLMError> {
    let breaker = CircuitBreaker::with_clock(id.as_str(), breaker, Arc::clone(clock))?;
    Ok(ChainLink {
        id,
        provider,
        breaker: Arc::new(breaker),
        policy,
    })
}
