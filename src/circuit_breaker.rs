//! Per-backend circuit breaker.
//!
//! ## States
//!
//! - **Closed**: requests pass through; consecutive failures are counted.
//! - **Open**: the backend is assumed down; requests are rejected without a call.
//! - **Half-Open**: a bounded number of probe requests test whether it recovered.
//!
//! Transitions out of Open happen lazily inside [`CircuitBreaker::admit`]; there is no
//! background timer. Every breaker owns its own lock, so breakers for different backends
//! never contend.

#[path = "circuit_breaker/config.rs"]
mod config;

#[path = "circuit_breaker/state.rs"]
mod state;

#[path = "circuit_breaker/breaker.rs"]
mod breaker;


pub use breaker::{Admission, CircuitBreaker};
pub use config::CircuitBreakerConfig;
pub use state::{BreakerMetrics, BreakerSnapshot, CircuitState};
