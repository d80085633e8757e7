use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::clock::{self, Clock};
use crate::error::LLMError;

use super::config::CircuitBreakerConfig;
use super::state::{BreakerMetrics, BreakerSnapshot, BreakerState, CircuitState};

struct Inner {
    state: BreakerState,
    /// Bumped on every state transition so stale probe admissions can be told apart.
    epoch: u64,
    metrics: BreakerMetrics,
}

/// Which probe slot, if any, a resolution gives back.
#[derive(Clone, Copy)]
enum Release {
    /// Plain `record_*` calls: release one slot if currently Half-Open.
    IfHalfOpen,
    /// An [`Admission`] that took a probe slot during `epoch`.
    Probe(u64),
    Nothing,
}

/// What an admitted call was granted.
#[derive(Clone, Copy)]
struct Grant {
    epoch: u64,
    probe: bool,
}

#[derive(Clone, Copy)]
enum Outcome {
    Success,
    Failure,
}

/// Failure/success tracker and gate for a single backend.
///
/// Callers ask [`admit`](Self::admit) before every backend call and report the result
/// with [`record_success`](Self::record_success) or
/// [`record_failure`](Self::record_failure) once the call has resolved. The lock is held
/// only around these state updates, never across the backend call.
pub struct CircuitBreaker {
    name: String,
    config: CircuitBreakerConfig,
    clock: Arc<dyn Clock>,
    inner: Mutex<Inner>,
}

impl CircuitBreaker {
    /// Creates a Closed breaker for backend `name` using the system clock.
    pub fn new(name: impl Into<String>, config: CircuitBreakerConfig) -> Result<Self, LLMError> {
        Self::with_clock(name, config, clock::system())
    }

    /// Creates a Closed breaker reading time from `clock`.
    pub fn with_clock(
        name: impl Into<String>,
        config: CircuitBreakerConfig,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, LLMError> {
        config.validate()?;
        Ok(Self {
            name: name.into(),
            config,
            clock,
            inner: Mutex::new(Inner {
                state: BreakerState::closed(),
                epoch: 0,
                metrics: BreakerMetrics::default(),
            }),
        })
    }

    /// Backend this breaker guards; used in log lines.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Validated thresholds this breaker was built with.
    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    /// Stored state. An Open breaker whose timeout has elapsed still reports Open until
    /// the next [`admit`](Self::admit).
    pub fn state(&self) -> CircuitState {
        self.lock().state.public()
    }

    /// State and counters read under a single lock.
    pub fn snapshot(&self) -> BreakerSnapshot {
        self.lock().state.snapshot()
    }

    /// Lifetime counters; [`reset`](Self::reset) keeps them.
    pub fn metrics(&self) -> BreakerMetrics {
        self.lock().metrics.clone()
    }

    /// Gate checked before every backend call.
    ///
    /// Performs the Open → Half-Open transition once the recovery timeout has elapsed.
    /// In Half-Open each admitted call occupies a probe slot until it is recorded.
    pub fn admit(&self) -> bool {
        self.try_admit().is_some()
    }

    /// RAII form of [`admit`](Self::admit).
    ///
    /// Dropping the returned [`Admission`] without resolving it gives back its probe slot
    /// and leaves every counter untouched. An admission resolved after the breaker has
    /// since changed state is ignored.
    pub fn try_acquire(&self) -> Option<Admission<'_>> {
        self.try_admit().map(|grant| Admission {
            breaker: self,
            grant,
            resolved: false,
        })
    }

    /// Reports a successful call. Unlike [`Admission::success`] this always applies
    /// to the current state.
    pub fn record_success(&self) {
        let mut inner = self.lock();
        self.resolve(&mut inner, Outcome::Success, Release::IfHalfOpen);
    }

    /// Reports a failed call against the current state.
    pub fn record_failure(&self) {
        let mut inner = self.lock();
        self.resolve(&mut inner, Outcome::Failure, Release::IfHalfOpen);
    }

    /// Operator reset back to Closed with cleared counters. Metrics are kept.
    pub fn reset(&self) {
        let mut inner = self.lock();
        self.transition(&mut inner, BreakerState::closed());
        log::info!("circuit breaker '{}' reset to closed", self.name);
    }

    /// Opens the circuit immediately, as if the failure threshold had been reached now.
    pub fn force_open(&self) {
        let mut inner = self.lock();
        self.open(&mut inner);
    }

    fn try_admit(&self) -> Option<Grant> {
        let mut inner = self.lock();
        let admitted = match inner.state {
            BreakerState::Closed { .. } => Some(Grant {
                epoch: inner.epoch,
                probe: false,
            }),
            BreakerState::Open { opened_at } => {
                let elapsed = self.clock.now().saturating_duration_since(opened_at);
                if elapsed >= self.config.recovery_timeout {
                    self.transition(
                        &mut inner,
                        BreakerState::HalfOpen {
                            successes: 0,
                            probes_in_flight: 1,
                        },
                    );
                    log::info!(
                        "circuit breaker '{}' half-open after {:?}, probing backend",
                        self.name,
                        elapsed
                    );
                    Some(Grant {
                        epoch: inner.epoch,
                        probe: true,
                    })
                } else {
                    None
                }
            }
            BreakerState::HalfOpen {
                successes,
                probes_in_flight,
            } => {
                if probes_in_flight < self.config.half_open_max_probes {
                    inner.state = BreakerState::HalfOpen {
                        successes,
                        probes_in_flight: probes_in_flight + 1,
                    };
                    Some(Grant {
                        epoch: inner.epoch,
                        probe: true,
                    })
                } else {
                    None
                }
            }
        };

        match admitted {
            Some(_) => inner.metrics.admitted += 1,
            None => {
                inner.metrics.rejected += 1;
                log::debug!("circuit breaker '{}' rejected call", self.name);
            }
        }
        admitted
    }

    /// Applies an admission's outcome only if no transition happened since it was
    /// granted.
    fn resolve_grant(&self, grant: Grant, outcome: Outcome) {
        let mut inner = self.lock();
        if grant.epoch != inner.epoch {
            log::debug!(
                "circuit breaker '{}' ignored result admitted before last transition",
                self.name
            );
            return;
        }
        let release = if grant.probe {
            Release::Probe(grant.epoch)
        } else {
            Release::Nothing
        };
        self.resolve(&mut inner, outcome, release);
    }

    fn resolve(&self, inner: &mut Inner, outcome: Outcome, release: Release) {
        Self::release_slot(inner, release);

        match outcome {
            Outcome::Success => {
                inner.metrics.successes += 1;
                match inner.state {
                    BreakerState::Closed { .. } => inner.state = BreakerState::closed(),
                    BreakerState::HalfOpen {
                        successes,
                        probes_in_flight,
                    } => {
                        let successes = successes + 1;
                        if successes >= self.config.success_threshold {
                            self.transition(inner, BreakerState::closed());
                            inner.metrics.times_closed += 1;
                            log::info!(
                                "circuit breaker '{}' closed after {} successful probes",
                                self.name,
                                successes
                            );
                        } else {
                            inner.state = BreakerState::HalfOpen {
                                successes,
                                probes_in_flight,
                            };
                        }
                    }
                    // Late plain record from a call admitted before the circuit opened.
                    BreakerState::Open { .. } => {}
                }
            }
            Outcome::Failure => {
                inner.metrics.failures += 1;
                match inner.state {
                    BreakerState::Closed { failures } => {
                        let failures = failures + 1;
                        if failures >= self.config.failure_threshold {
                            self.open(inner);
                        } else {
                            inner.state = BreakerState::Closed { failures };
                        }
                    }
                    BreakerState::HalfOpen { .. } => self.open(inner),
                    BreakerState::Open { .. } => {}
                }
            }
        }
    }

    fn release(&self, release: Release) {
        let mut inner = self.lock();
        Self::release_slot(&mut inner, release);
    }

    fn release_slot(inner: &mut Inner, release: Release) {
        let applies = match release {
            Release::IfHalfOpen => true,
            Release::Probe(epoch) => epoch == inner.epoch,
            Release::Nothing => false,
        };
        if !applies {
            return;
        }
        if let BreakerState::HalfOpen {
            successes,
            probes_in_flight,
        } = inner.state
        {
            inner.state = BreakerState::HalfOpen {
                successes,
                probes_in_flight: probes_in_flight.saturating_sub(1),
            };
        }
    }

    fn open(&self, inner: &mut Inner) {
        let previous = inner.state.public();
        self.transition(
            inner,
            BreakerState::Open {
                opened_at: self.clock.now(),
            },
        );
        inner.metrics.times_opened += 1;
        match previous {
            CircuitState::HalfOpen => log::warn!(
                "circuit breaker '{}' re-opened: probe failed",
                self.name
            ),
            _ => log::warn!(
                "circuit breaker '{}' opened for {:?}",
                self.name,
                self.config.recovery_timeout
            ),
        }
    }

    fn transition(&self, inner: &mut Inner, next: BreakerState) {
        inner.state = next;
        inner.epoch = inner.epoch.wrapping_add(1);
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("name", &self.name)
            .field("state", &self.lock().state)
            .field("config", &self.config)
            .finish()
    }
}

/// Permission to make one backend call.
///
/// Resolve it with [`success`](Self::success) or [`failure`](Self::failure). Dropping it
/// unresolved means the call was abandoned: the probe slot is returned and no counter
/// moves.
///
/// Outcomes only count toward the state the admission was granted in. A call admitted
/// while Closed that finishes after the breaker went Half-Open cannot close it, and a
/// stale failure cannot reopen a recovered breaker.
#[must_use = "an admission must be resolved or it is treated as abandoned"]
pub struct Admission<'a> {
    breaker: &'a CircuitBreaker,
    grant: Grant,
    resolved: bool,
}

impl Admission<'_> {
    /// Whether this call is a Half-Open probe.
    pub fn is_probe(&self) -> bool {
        self.grant.probe
    }

    /// The call succeeded.
    pub fn success(mut self) {
        self.resolved = true;
        self.breaker.resolve_grant(self.grant, Outcome::Success);
    }

    /// The call failed or was cancelled by the caller.
    pub fn failure(mut self) {
        self.resolved = true;
        self.breaker.resolve_grant(self.grant, Outcome::Failure);
    }
}

impl Drop for Admission<'_> {
    fn drop(&mut self) {
        if !self.resolved && self.grant.probe {
            self.breaker.release(Release::Probe(self.grant.epoch));
        }
    }
}
