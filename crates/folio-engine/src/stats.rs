//! Engine counters.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use folio_portfolio::{ErrorCode, OptimizerError};

use crate::cache::Lookup;

/// Request, solve and cache counters.
#[derive(Debug, Default)]
pub struct EngineStats {
    requests: AtomicU64,
    solves: AtomicU64,
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,
    shared: AtomicU64,
    rejections: AtomicU64,
    failures: AtomicU64,
    cancelled: AtomicU64,
}

impl EngineStats {
    /// Creates zeroed counters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Counts an incoming request.
    pub fn record_request(&self) {
        self.requests.fetch_add(1, Ordering::Relaxed);
    }

    /// Counts one solver invocation.
    pub fn record_solve(&self) {
        self.solves.fetch_add(1, Ordering::Relaxed);
    }

    /// Counts how a cache lookup was satisfied.
    pub fn record_lookup(&self, lookup: Lookup) {
        let counter = match lookup {
            Lookup::Hit => &self.cache_hits,
            Lookup::Computed => &self.cache_misses,
            Lookup::Shared => &self.shared,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Counts a failed request by kind.
    pub fn record_error(&self, error: &OptimizerError) {
        let counter = match error.code() {
            ErrorCode::OverCapacity => &self.rejections,
            ErrorCode::Cancelled => &self.cancelled,
            _ => &self.failures,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Number of solver invocations so far.
    pub fn solves(&self) -> u64 {
        self.solves.load(Ordering::Relaxed)
    }

    /// Point-in-time copy of every counter.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            requests: self.requests.load(Ordering::Relaxed),
            solves: self.solves.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            cache_misses: self.cache_misses.load(Ordering::Relaxed),
            shared: self.shared.load(Ordering::Relaxed),
            rejections: self.rejections.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            cancelled: self.cancelled.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of [`EngineStats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StatsSnapshot {
    /// Requests received.
    pub requests: u64,
    /// Solver invocations.
    pub solves: u64,
    /// Requests answered from a stored result.
    pub cache_hits: u64,
    /// Requests that ran a computation.
    pub cache_misses: u64,
    /// Requests that waited on another caller's computation.
    pub shared: u64,
    /// Requests rejected with `OVER_CAPACITY`.
    pub rejections: u64,
    /// Requests that failed for any other reason.
    pub failures: u64,
    /// Requests cancelled.
    pub cancelled: u64,
}

impl StatsSnapshot {
    /// Fraction of lookups answered without running a computation.
    pub fn hit_rate(&self) -> Option<f64> {
        let lookups = self.cache_hits + self.cache_misses + self.shared;
        if lookups == 0 {
            None
        } else {
            Some((self.cache_hits + self.shared) as f64 / lookups as f64)
        }
    }
}
