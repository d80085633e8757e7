use std::time::Duration;

use crate::error::LLMError;

pub const DEFAULT_FAILURE_THRESHOLD: u32 = 5;
pub const DEFAULT_RECOVERY_TIMEOUT: Duration = Duration::from_secs(60);
pub const DEFAULT_SUCCESS_THRESHOLD: u32 = 2;
pub const DEFAULT_HALF_OPEN_MAX_PROBES: u32 = 1;

/// Thresholds for a [`CircuitBreaker`](super::CircuitBreaker).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures in Closed that open the circuit
    pub failure_threshold: u32,
    /// How long the circuit stays Open before a probe is let through
    pub recovery_timeout: Duration,
    /// Consecutive probe successes in Half-Open that close the circuit
    pub success_threshold: u32,
    /// Probe requests allowed in flight at once while Half-Open
    pub half_open_max_probes: u32,
}

impl CircuitBreakerConfig {
    /// Creates a validated configuration with a single Half-Open probe.
    pub fn new(
        failure_threshold: u32,
        recovery_timeout: Duration,
        success_threshold: u32,
    ) -> Result<Self, LLMError> {
        let config = Self {
            failure_threshold,
            recovery_timeout,
            success_threshold,
            half_open_max_probes: DEFAULT_HALF_OPEN_MAX_PROBES,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn with_failure_threshold(mut self, threshold: u32) -> Self {
        self.failure_threshold = threshold;
        self
    }

    pub fn with_recovery_timeout(mut self, timeout: Duration) -> Self {
        self.recovery_timeout = timeout;
        self
    }

    pub fn with_success_threshold(mut self, threshold: u32) -> Self {
        self.success_threshold = threshold;
        self
    }

    pub fn with_half_open_max_probes(mut self, probes: u32) -> Self {
        self.half_open_max_probes = probes;
        self
    }

    /// Rejects thresholds below one and a zero recovery timeout.
    pub fn validate(&self) -> Result<(), LLMError> {
        if self.failure_threshold < 1 {
            return Err(LLMError::config("failure_threshold must be at least 1"));
        }
        if self.success_threshold < 1 {
            return Err(LLMError::config("success_threshold must be at least 1"));
        }
        if self.half_open_max_probes < 1 {
            return Err(LLMError::config("half_open_max_probes must be at least 1"));
        }
        if self.recovery_timeout.is_zero() {
            return Err(LLMError::config("recovery_timeout must be greater than 0"));
        }
        Ok(())
    }
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: DEFAULT_FAILURE_THRESHOLD,
            recovery_timeout: DEFAULT_RECOVERY_TIMEOUT,
            success_threshold: DEFAULT_SUCCESS_THRESHOLD,
            half_open_max_probes: DEFAULT_HALF_OPEN_MAX_PROBES,
        }
    }
}
