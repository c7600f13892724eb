//! Single-flight result cache.
//!
//! At most one computation runs per key at a time. Callers that arrive while
//! it runs wait for it and receive the same `Arc`. Successful results are
//! kept for the configured time-to-live; failures reach every caller that
//! was waiting but are never stored.
//!
//! If the caller driving a computation goes away, the next waiter takes
//! over and starts it again.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use tokio::sync::OnceCell;
use tracing::debug;

use folio_portfolio::OptimizerResult;

use crate::clock::Clock;
use crate::key::CacheKey;

type Slot<V> = Arc<OnceCell<OptimizerResult<Arc<V>>>>;

/// How a lookup was satisfied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lookup {
    /// A stored, unexpired result.
    Hit,
    /// This caller ran the computation.
    Computed,
    /// This caller waited for a computation started by another.
    Shared,
}

struct Entry<V> {
    value: Arc<V>,
    inserted: Instant,
}

/// TTL cache with per-key single-flight computation.
pub struct SingleFlightCache<V> {
    entries: DashMap<String, Entry<V>>,
    in_flight: DashMap<String, Slot<V>>,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl<V: Send + Sync + 'static> SingleFlightCache<V> {
    /// Creates a cache. A zero `ttl` disables storage but keeps single-flight.
    pub fn new(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: DashMap::new(),
            in_flight: DashMap::new(),
            ttl,
            clock,
        }
    }

    /// Returns the stored result for `key`, dropping it if expired.
    pub fn get(&self, key: &CacheKey) -> Option<Arc<V>> {
        let now = self.clock.now();
        let expired = match self.entries.get(key.canonical()) {
            Some(entry) if self.is_fresh(&entry, now) => return Some(Arc::clone(&entry.value)),
            Some(_) => true,
            None => false,
        };
        if expired {
            self.entries
                .remove_if(key.canonical(), |_, entry| !self.is_fresh(entry, now));
            debug!(key = %key, "cache entry expired");
        }
        None
    }

    /// Returns the stored result for `key` or computes it with `init`.
    pub async fn get_or_try_init<F, Fut>(
        &self,
        key: &CacheKey,
        init: F,
    ) -> (OptimizerResult<Arc<V>>, Lookup)
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = OptimizerResult<V>>,
    {
        if let Some(value) = self.get(key) {
            return (Ok(value), Lookup::Hit);
        }

        let slot: Slot<V> = Arc::clone(
            self.in_flight
                .entry(key.canonical().to_string())
                .or_insert_with(|| Arc::new(OnceCell::new()))
                .value(),
        );

        let mut lookup = Lookup::Shared;
        let result = slot
            .get_or_init(|| async {
                // A leader may have stored its result and retired the slot
                // between the first lookup and the slot being created.
                if let Some(value) = self.get(key) {
                    lookup = Lookup::Hit;
                    self.retire(key, &slot);
                    return Ok(value);
                }
                lookup = Lookup::Computed;
                let result = init().await.map(Arc::new);
                if let Ok(value) = &result {
                    self.insert(key, Arc::clone(value));
                }
                self.retire(key, &slot);
                result
            })
            .await
            .clone();

        (result, lookup)
    }

    fn insert(&self, key: &CacheKey, value: Arc<V>) {
        if self.ttl.is_zero() {
            return;
        }
        self.entries.insert(
            key.canonical().to_string(),
            Entry {
                value,
                inserted: self.clock.now(),
            },
        );
    }

    fn retire(&self, key: &CacheKey, slot: &Slot<V>) {
        self.in_flight
            .remove_if(key.canonical(), |_, current| Arc::ptr_eq(current, slot));
    }

    fn is_fresh(&self, entry: &Entry<V>, now: Instant) -> bool {
        now.saturating_duration_since(entry.inserted) < self.ttl
    }

    /// Removes expired entries and returns how many were dropped.
    pub fn sweep(&self) -> usize {
        let now = self.clock.now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| self.is_fresh(entry, now));
        // Initialized slots are always retired by their leader; any left
        // over belong to a computation that finished without it.
        self.in_flight.retain(|_, slot| !slot.initialized());
        before.saturating_sub(self.entries.len())
    }

    /// Drops every stored result. Running computations are unaffected.
    pub fn clear(&self) {
        self.entries.clear();
    }

    /// Number of stored results, expired ones included until swept.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of computations currently running.
    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    /// Configured time-to-live.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }
}
