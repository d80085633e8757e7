use std::fmt;
use std::time::Instant;

use serde::{Deserialize, Serialize};

/// Externally visible breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CircuitState::Closed => "closed",
            CircuitState::Open => "open",
            CircuitState::HalfOpen => "half_open",
        };
        write!(f, "{name}")
    }
}

/// Internal state machine. Counters live inside the variant they belong to, so an Open
/// breaker always has an `opened_at` and only Half-Open carries a success count.
#[derive(Debug, Clone)]
pub(super) enum BreakerState {
    Closed {
        failures: u32,
    },
    Open {
        opened_at: Instant,
    },
    HalfOpen {
        successes: u32,
        probes_in_flight: u32,
    },
}

impl BreakerState {
    pub(super) fn closed() -> Self {
        Self::Closed { failures: 0 }
    }

    pub(super) fn public(&self) -> CircuitState {
        match self {
            Self::Closed { .. } => CircuitState::Closed,
            Self::Open { .. } => CircuitState::Open,
            Self::HalfOpen { .. } => CircuitState::HalfOpen,
        }
    }

    pub(super) fn snapshot(&self) -> BreakerSnapshot {
        match *self {
            Self::Closed { failures } => BreakerSnapshot {
                state: CircuitState::Closed,
                consecutive_failures: failures,
                consecutive_successes: 0,
                opened_at: None,
                probes_in_flight: 0,
            },
            Self::Open { opened_at } => BreakerSnapshot {
                state: CircuitState::Open,
                consecutive_failures: 0,
                consecutive_successes: 0,
                opened_at: Some(opened_at),
                probes_in_flight: 0,
            },
            Self::HalfOpen {
                successes,
                probes_in_flight,
            } => BreakerSnapshot {
                state: CircuitState::HalfOpen,
                consecutive_failures: 0,
                consecutive_successes: successes,
                opened_at: None,
                probes_in_flight,
            },
        }
    }
}

/// Point-in-time copy of a breaker's counters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BreakerSnapshot {
    pub state: CircuitState,
    pub consecutive_failures: u32,
    pub consecutive_successes: u32,
    pub opened_at: Option<Instant>,
    pub probes_in_flight: u32,
}

/// Lifetime counters for one breaker.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BreakerMetrics {
    /// Calls let through by `admit`
    pub admitted: u64,
    /// Calls rejected because the circuit was open or out of probes
    pub rejected: u64,
    pub successes: u64,
    pub failures: u64,
    pub times_opened: u64,
    pub times_closed: u64,
}

impl BreakerMetrics {
    /// Share of resolved calls that failed (0.0 when nothing resolved yet).
    pub fn failure_rate(&self) -> f64 {
        let resolved = self.successes + self.failures;
        if resolved == 0 {
            return 0.0;
        }
        self.failures as f64 / resolved as f64
    }
}
