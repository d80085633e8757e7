//! Resilience layer for calls to LLM backends.
//!
//! The building blocks can be used on their own or composed by [`FallbackChain`]:
//!
//! - [`BackoffPolicy`]: exponential delay schedule with optional jitter.
//! - [`CircuitBreaker`]: per-backend closed/open/half-open gate.
//! - [`TtlCache`]: bounded LRU with per-entry expiry for completed responses.
//! - [`FallbackChain`]: tries backends in order, each behind its breaker and retry loop.
//!
//! ```no_run
//! use llm_resilience::{backends::MockProvider, CompletionRequest, FallbackChain};
//!
//! # async fn run() -> Result<(), llm_resilience::LLMError> {
//! let chain = FallbackChain::builder()
//!     .link("primary", MockProvider::new("primary", "hello"))
//!     .link("secondary", MockProvider::new("secondary", "hi"))
//!     .build()?;
//!
//! let response = chain
//!     .complete(&CompletionRequest::new("Say hello"))
//!     .await
//!     .into_result()?;
//! println!("{}", response.text);
//! # Ok(())
//! # }
//! ```

pub mod backends;
pub mod backoff;
pub mod cache;
pub mod chain;
pub mod circuit_breaker;
pub mod clock;
pub mod completion;
pub mod config;
pub mod error;
pub mod resilient_llm;

#[cfg(feature = "logging")]
pub mod logging;

#[cfg(feature = "logging")]
pub use logging::init_logging;

pub use backoff::BackoffPolicy;
pub use cache::{CacheConfig, CacheStats, TtlCache};
pub use chain::{
    AttemptOutcome, AttemptRecord, FallbackChain, FallbackChainBuilder, FallbackResult,
};
pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
pub use completion::{CompletionProvider, CompletionRequest, CompletionResponse};
pub use config::ResilienceSettings;
pub use error::{ErrorKind, LLMError};
pub use resilient_llm::ResilientLLM;
