//! Exponential backoff with optional full jitter.

use std::time::Duration;

use rand::Rng;

use crate::error::LLMError;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_INITIAL_DELAY: Duration = Duration::from_secs(1);
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(30);
pub const DEFAULT_EXPONENTIAL_BASE: f64 = 2.0;

/// Immutable retry schedule for one backend.
///
/// The policy holds no per-call state: the attempt index is passed in, so a single
/// instance serves every concurrent retry sequence.
#[derive(Debug, Clone, PartialEq)]
pub struct BackoffPolicy {
    max_attempts: u32,
    initial_delay: Duration,
    max_delay: Duration,
    exponential_base: f64,
    jitter: bool,
}

impl BackoffPolicy {
    /// Creates a validated policy.
    pub fn new(
        max_attempts: u32,
        initial_delay: Duration,
        max_delay: Duration,
        exponential_base: f64,
        jitter: bool,
    ) -> Result<Self, LLMError> {
        if max_attempts < 1 {
            return Err(LLMError::config("max_attempts must be at least 1"));
        }
        if initial_delay.is_zero() {
            return Err(LLMError::config("initial_delay must be greater than 0"));
        }
        if max_delay < initial_delay {
            return Err(LLMError::config(format!(
                "max_delay ({max_delay:?}) must not be below initial_delay ({initial_delay:?})"
            )));
        }
        if !exponential_base.is_finite() || exponential_base <= 1.0 {
            return Err(LLMError::config(format!(
                "exponential_base must be a finite number greater than 1, got {exponential_base}"
            )));
        }
        Ok(Self {
            max_attempts,
            initial_delay,
            max_delay,
            exponential_base,
            jitter,
        })
    }

    /// A policy that makes exactly one attempt.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn initial_delay(&self) -> Duration {
        self.initial_delay
    }

    pub fn max_delay(&self) -> Duration {
        self.max_delay
    }

    pub fn exponential_base(&self) -> f64 {
        self.exponential_base
    }

    pub fn jitter(&self) -> bool {
        self.jitter
    }

    /// Returns a copy with jitter switched on or off.
    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    /// Whether another attempt is allowed after attempt `attempt` (1-based) failed.
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }

    /// Delay to wait after attempt `attempt` (1-based) failed.
    ///
    /// Without jitter this is `min(max_delay, initial_delay * base^(attempt - 1))`. With
    /// jitter the value is drawn uniformly from `[0, that]`.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let capped = self.capped_delay(attempt);
        if !self.jitter {
            return capped;
        }
        let ceiling = u64::try_from(capped.as_nanos()).unwrap_or(u64::MAX);
        Duration::from_nanos(rand::thread_rng().gen_range(0..=ceiling))
    }

    fn capped_delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let nanos = self.initial_delay.as_nanos() as f64 * self.exponential_base.powi(exponent);
        if !nanos.is_finite() || nanos >= self.max_delay.as_nanos() as f64 {
            return self.max_delay;
        }
        Duration::from_nanos(nanos as u64).min(self.max_delay)
    }
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            initial_delay: DEFAULT_INITIAL_DELAY,
            max_delay: DEFAULT_MAX_DELAY,
            exponential_base: DEFAULT_EXPONENTIAL_BASE,
            jitter: true,
        }
    }
}
