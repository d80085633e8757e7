//! Ordered fallback across several backends.
//!
//! ```text
//! complete(request)
//!     → cache hit?                      return cached response, no backend touched
//!     → for each link, in priority order:
//!         breaker rejects?              record "circuit open", next link
//!         retry loop (link's backoff)   success → cache + return
//!                                       exhausted / permanent error → next link
//!     → every link failed               return all attempt records
//! ```

#[path = "fallback/link.rs"]
mod link;

#[path = "fallback/result.rs"]
mod result;

#[path = "fallback/stats.rs"]
mod stats;

#[path = "fallback/builder.rs"]
mod builder;

#[path = "fallback/chain.rs"]
mod chain;


pub use builder::FallbackChainBuilder;
pub use chain::FallbackChain;
pub use result::{AttemptOutcome, AttemptRecord, FallbackResult};
pub use stats::ChainStats;
