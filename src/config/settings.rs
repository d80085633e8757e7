use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{
    backoff::{self, BackoffPolicy},
    cache::CacheConfig,
    circuit_breaker::CircuitBreakerConfig,
    error::LLMError,
};

/// Top-level resilience options. Every field has a default, so an empty document is a
/// valid configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResilienceSettings {
    pub failure_threshold: u32,
    pub recovery_timeout_secs: u64,
    pub success_threshold: u32,
    pub half_open_max_probes: u32,
    pub max_attempts: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub exponential_base: f64,
    pub jitter: bool,
    pub cache_capacity: usize,
    pub cache_ttl_secs: u64,
    /// Per-backend overrides, in priority order
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub backends: Vec<BackendSettings>,
}

/// Overrides for one backend. Unset fields inherit the top-level values.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BackendSettings {
    pub id: String,
    /// Lower runs first. Backends without a priority keep their listed order after
    /// those that have one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub breaker: Option<BreakerOverrides>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backoff: Option<BackoffOverrides>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BreakerOverrides {
    pub failure_threshold: Option<u32>,
    pub recovery_timeout_secs: Option<u64>,
    pub success_threshold: Option<u32>,
    pub half_open_max_probes: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackoffOverrides {
    pub max_attempts: Option<u32>,
    pub initial_delay_ms: Option<u64>,
    pub max_delay_ms: Option<u64>,
    pub exponential_base: Option<f64>,
    pub jitter: Option<bool>,
}

impl Default for ResilienceSettings {
    fn default() -> Self {
        let breaker = CircuitBreakerConfig::default();
        Self {
            failure_threshold: breaker.failure_threshold,
            recovery_timeout_secs: breaker.recovery_timeout.as_secs(),
            success_threshold: breaker.success_threshold,
            half_open_max_probes: breaker.half_open_max_probes,
            max_attempts: backoff::DEFAULT_MAX_ATTEMPTS,
            initial_delay_ms: millis(backoff::DEFAULT_INITIAL_DELAY),
            max_delay_ms: millis(backoff::DEFAULT_MAX_DELAY),
            exponential_base: backoff::DEFAULT_EXPONENTIAL_BASE,
            jitter: true,
            cache_capacity: CacheConfig::default().capacity,
            cache_ttl_secs: CacheConfig::default().ttl.as_secs(),
            backends: Vec::new(),
        }
    }
}

impl ResilienceSettings {
    /// Checks every derived configuration, including per-backend overrides.
    pub fn validate(&self) -> Result<(), LLMError> {
        self.breaker_config()?;
        self.backoff_policy()?;
        self.cache_config()?;

        let mut seen = std::collections::HashSet::new();
        for backend in &self.backends {
            if backend.id.trim().is_empty() {
                return Err(LLMError::config("backend id cannot be empty"));
            }
            if !seen.insert(backend.id.as_str()) {
                return Err(LLMError::config(format!(
                    "backend '{}' is configured twice",
                    backend.id
                )));
            }
            self.breaker_config_for(&backend.id)?;
            self.backoff_policy_for(&backend.id)?;
        }
        Ok(())
    }

    pub fn breaker_config(&self) -> Result<CircuitBreakerConfig, LLMError> {
        let config = CircuitBreakerConfig {
            failure_threshold: self.failure_threshold,
            recovery_timeout: Duration::from_secs(self.recovery_timeout_secs),
            success_threshold: self.success_threshold,
            half_open_max_probes: self.half_open_max_probes,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn backoff_policy(&self) -> Result<BackoffPolicy, LLMError> {
        BackoffPolicy::new(
            self.max_attempts,
            Duration::from_millis(self.initial_delay_ms),
            Duration::from_millis(self.max_delay_ms),
            self.exponential_base,
            self.jitter,
        )
    }

    pub fn cache_config(&self) -> Result<CacheConfig, LLMError> {
        CacheConfig::new(self.cache_capacity, Duration::from_secs(self.cache_ttl_secs))
    }

    /// Breaker configuration for `id`, with its overrides applied.
    pub fn breaker_config_for(&self, id: &str) -> Result<CircuitBreakerConfig, LLMError> {
        let mut config = CircuitBreakerConfig {
            failure_threshold: self.failure_threshold,
            recovery_timeout: Duration::from_secs(self.recovery_timeout_secs),
            success_threshold: self.success_threshold,
            half_open_max_probes: self.half_open_max_probes,
        };
        if let Some(overrides) = self.backend(id).and_then(|b| b.breaker.as_ref()) {
            if let Some(value) = overrides.failure_threshold {
                config.failure_threshold = value;
            }
            if let Some(value) = overrides.recovery_timeout_secs {
                config.recovery_timeout = Duration::from_secs(value);
            }
            if let Some(value) = overrides.success_threshold {
                config.success_threshold = value;
            }
            if let Some(value) = overrides.half_open_max_probes {
                config.half_open_max_probes = value;
            }
        }
        config.validate()?;
        Ok(config)
    }

    /// Backoff policy for `id`, with its overrides applied.
    pub fn backoff_policy_for(&self, id: &str) -> Result<BackoffPolicy, LLMError> {
        let overrides = self
            .backend(id)
            .and_then(|b| b.backoff.clone())
            .unwrap_or_default();
        BackoffPolicy::new(
            overrides.max_attempts.unwrap_or(self.max_attempts),
            Duration::from_millis(overrides.initial_delay_ms.unwrap_or(self.initial_delay_ms)),
            Duration::from_millis(overrides.max_delay_ms.unwrap_or(self.max_delay_ms)),
            overrides.exponential_base.unwrap_or(self.exponential_base),
            overrides.jitter.unwrap_or(self.jitter),
        )
    }

    /// Orders `ids` by configured priority; ids without one keep their relative order
    /// and run after prioritised ones.
    pub fn ordered<'a>(&self, ids: impl IntoIterator<Item = &'a str>) -> Vec<&'a str> {
        let mut ids: Vec<(usize, &'a str)> = ids.into_iter().enumerate().collect();
        ids.sort_by_key(|(index, id)| {
            let priority = self.backend(id).and_then(|b| b.priority);
            (priority.is_none(), priority.unwrap_or(u32::MAX), *index)
        });
        ids.into_iter().map(|(_, id)| id).collect()
    }

    fn backend(&self, id: &str) -> Option<&BackendSettings> {
        self.backends.iter().find(|b| b.id == id)
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
