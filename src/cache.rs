//! Bounded response cache with time-based expiry.

#[path = "cache/ttl_cache.rs"]
mod ttl_cache;

#[path = "cache/fingerprint.rs"]
mod fingerprint;

#[cfg(test)]
#[path = "cache/tests.rs"]
mod tests;

pub use fingerprint::{fingerprint, FingerprintFn};
pub use ttl_cache::{CacheConfig, CacheStats, TtlCache};
