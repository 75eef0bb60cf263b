//! In-memory caches shared across requests
//!
//! `TtlCache` is a keyed map with optional size bound and optional entry lifetime.
//! `ForecastCache` wraps it for forecast results and adds single-flight: concurrent
//! requests for the same key wait for the first computation instead of repeating it.

use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, RwLock};
use tokio::time::Instant;

use crate::error::Result;
use crate::types::{ForecastKey, ForecastResult};

struct CacheEntry<V> {
    value: V,
    cached_at: Instant,
}

/// Keyed cache; `capacity = None` is unbounded, `ttl = None` never expires
pub struct TtlCache<K, V> {
    entries: RwLock<HashMap<K, CacheEntry<V>>>,
    capacity: Option<usize>,
    ttl: Option<Duration>,
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new(capacity: Option<usize>, ttl: Option<Duration>) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            capacity: capacity.filter(|c| *c > 0),
            ttl,
        }
    }

    pub fn unbounded() -> Self {
        Self::new(None, None)
    }

    fn is_fresh(&self, entry: &CacheEntry<V>, now: Instant) -> bool {
        match self.ttl {
            Some(ttl) => now.duration_since(entry.cached_at) < ttl,
            None => true,
        }
    }

    pub async fn get(&self, key: &K) -> Option<V> {
        let entries = self.entries.read().await;
        let now = Instant::now();
        entries
            .get(key)
            .filter(|entry| self.is_fresh(entry, now))
            .map(|entry| entry.value.clone())
    }

    /// Insert, dropping expired entries and then the oldest ones beyond capacity
    pub async fn insert(&self, key: K, value: V) {
        let mut entries = self.entries.write().await;
        let now = Instant::now();
        if self.ttl.is_some() {
            entries.retain(|_, entry| self.is_fresh(entry, now));
        }

        if let Some(capacity) = self.capacity {
            while entries.len() >= capacity && !entries.contains_key(&key) {
                let oldest = entries
                    .iter()
                    .min_by_key(|(_, entry)| entry.cached_at)
                    .map(|(k, _)| k.clone());
                match oldest {
                    Some(k) => {
                        entries.remove(&k);
                    }
                    None => break,
                }
            }
        }

        entries.insert(
            key,
            CacheEntry {
                value,
                cached_at: now,
            },
        );
    }

    pub async fn remove(&self, key: &K) -> Option<V> {
        self.entries.write().await.remove(key).map(|e| e.value)
    }

    /// Entries currently stored, expired ones included until the next insert
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    pub async fn clear(&self) {
        self.entries.write().await.clear();
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
}

/// Memoized forecast results keyed by the literal request
pub struct ForecastCache {
    entries: TtlCache<ForecastKey, Arc<ForecastResult>>,
    in_flight: Mutex<HashMap<ForecastKey, Arc<Mutex<()>>>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl Default for ForecastCache {
    fn default() -> Self {
        Self::new(None, None)
    }
}

impl ForecastCache {
    pub fn new(capacity: Option<usize>, ttl: Option<Duration>) -> Self {
        Self {
            entries: TtlCache::new(capacity, ttl),
            in_flight: Mutex::new(HashMap::new()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub async fn get(&self, key: &ForecastKey) -> Option<Arc<ForecastResult>> {
        self.entries.get(key).await
    }

    /// Cached value for `key`, or run `compute` once and cache its success.
    /// Errors are returned to the caller and never stored.
    pub async fn get_or_compute<F, Fut>(
        &self,
        key: ForecastKey,
        compute: F,
    ) -> Result<Arc<ForecastResult>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<ForecastResult>>,
    {
        if let Some(hit) = self.entries.get(&key).await {
            self.hits.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(key = %key, "Forecast cache hit");
            return Ok(hit);
        }

        let gate = {
            let mut in_flight = self.in_flight.lock().await;
            in_flight
                .entry(key.clone())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        let guard = gate.lock().await;

        // Another request may have filled the slot while we waited
        if let Some(hit) = self.entries.get(&key).await {
            drop(guard);
            self.release(&key, &gate).await;
            self.hits.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(key = %key, "Forecast cache hit after wait");
            return Ok(hit);
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(key = %key, "Forecast cache miss");
        let outcome = match compute().await {
            Ok(result) => {
                let result = Arc::new(result);
                self.entries.insert(key.clone(), Arc::clone(&result)).await;
                Ok(result)
            }
            Err(e) => Err(e),
        };

        drop(guard);
        self.release(&key, &gate).await;
        outcome
    }

    /// Forget the in-flight gate once nobody else is waiting on it
    async fn release(&self, key: &ForecastKey, gate: &Arc<Mutex<()>>) {
        let mut in_flight = self.in_flight.lock().await;
        let idle = in_flight
            .get(key)
            .map(|g| Arc::ptr_eq(g, gate) && Arc::strong_count(g) <= 2)
            .unwrap_or(false);
        if idle {
            in_flight.remove(key);
        }
    }

    pub async fn len(&self) -> usize {
        self.entries.len().await
    }

    pub async fn clear(&self) {
        self.entries.clear().await;
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}
