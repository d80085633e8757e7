use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Request counters for a chain.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainStats {
    pub total_requests: u64,
    pub cache_hits: u64,
    pub successes: u64,
    /// Requests where every backend failed or was circuit-open
    pub failures: u64,
    /// Extra backend invocations beyond the first per backend
    pub total_retries: u64,
    pub circuit_rejections: u64,
}

#[derive(Debug, Default)]
pub(super) struct StatsRecorder {
    total_requests: AtomicU64,
    cache_hits: AtomicU64,
    successes: AtomicU64,
    failures: AtomicU64,
    total_retries: AtomicU64,
    circuit_rejections: AtomicU64,
}

impl StatsRecorder {
    pub(super) fn request(&self) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
    }

    pub(super) fn cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub(super) fn success(&self) {
        self.successes.fetch_add(1, Ordering::Relaxed);
    }

    pub(super) fn failure(&self) {
        self.failures.fetch_add(1, Ordering::Relaxed);
    }

    pub(super) fn retries(&self, tries: u32) {
        let retries = u64::from(tries.saturating_sub(1));
        if retries > 0 {
            self.total_retries.fetch_add(retries, Ordering::Relaxed);
        }
    }

    pub(super) fn circuit_rejection(&self) {
        self.circuit_rejections.fetch_add(1, Ordering::Relaxed);
    }

    pub(super) fn snapshot(&self) -> ChainStats {
        ChainStats {
            total_requests: self.total_requests.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            successes: self.successes.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            total_retries: self.total_retries.load(Ordering::Relaxed),
            circuit_rejections: self.circuit_rejections.load(Ordering::Relaxed),
        }
    }
}
