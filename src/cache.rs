//! TTL response cache
//!
//! Generic time-to-live store behind the dispatcher with:
//! - Lazy expiry on read plus a periodic background sweep
//! - Single-flight coalescing so concurrent misses on one key trigger
//!   exactly one fetch
//! - Hit/miss statistics for monitoring
//!
//! The cache itself never fails and never stores error results; only
//! [`TtlCache::get_or_fetch`] propagates the fetch closure's error, cloned to
//! every caller that was waiting on the same key.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{broadcast, Mutex, RwLock};
use tracing::{debug, warn};

/// A single cached value with its expiry bookkeeping
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    /// Cached value
    pub value: V,
    /// Insertion timestamp
    pub inserted_at: Instant,
    /// Time-to-live for this entry
    pub ttl: Duration,
}

impl<V> CacheEntry<V> {
    /// Create a new cache entry with TTL
    pub fn new(value: V, ttl: Duration) -> Self {
        Self {
            value,
            inserted_at: Instant::now(),
            ttl,
        }
    }

    /// Check if the entry has expired
    pub fn is_expired(&self) -> bool {
        self.inserted_at.elapsed() >= self.ttl
    }
}

/// Cache statistics for monitoring
#[derive(Debug, Clone, Default)]
pub struct CacheStats {
    /// Reads answered from a live entry
    pub hits: u64,
    /// Reads that found nothing usable
    pub misses: u64,
    /// Reads that found an entry already past its TTL
    pub expired_reads: u64,
    /// Entries written
    pub inserts: u64,
    /// Callers that waited on another caller's in-flight fetch
    pub coalesced_waits: u64,
    /// Entries removed by background sweeps
    pub swept: u64,
}

impl CacheStats {
    /// Calculate hit rate
    pub fn hit_rate(&self) -> f64 {
        if self.hits + self.misses == 0 {
            0.0
        } else {
            self.hits as f64 / (self.hits + self.misses) as f64
        }
    }
}

/// Outcome channel shared by callers racing on the same missing key
type InflightSender<V, E> = broadcast::Sender<Result<V, E>>;

/// TTL cache with single-flight fetch coalescing
///
/// `V` is the cached value, `E` the error type a fetch closure may produce.
/// Both must be cheap to clone; every coalesced caller receives its own copy
/// of the single outcome.
pub struct TtlCache<V, E = ()> {
    /// Live entries
    entries: Arc<RwLock<HashMap<String, CacheEntry<V>>>>,
    /// Per-key in-flight markers for miss coalescing
    inflight: Arc<Mutex<HashMap<String, InflightSender<V, E>>>>,
    /// TTL applied by `put` and `get_or_fetch`
    default_ttl: Duration,
    /// Counters, behind a sync lock since they are touched on every read
    stats: Arc<parking_lot::RwLock<CacheStats>>,
}

impl<V, E> TtlCache<V, E>
where
    V: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    /// Create a new cache with the given default TTL
    pub fn new(default_ttl: Duration) -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
            inflight: Arc::new(Mutex::new(HashMap::new())),
            default_ttl,
            stats: Arc::new(parking_lot::RwLock::new(CacheStats::default())),
        }
    }

    /// Get a value, removing it on the spot if its TTL has elapsed
    pub async fn get(&self, key: &str) -> Option<V> {
        let mut entries = self.entries.write().await;
        if let Some(entry) = entries.get(key) {
            if entry.is_expired() {
                entries.remove(key);
                let mut stats = self.stats.write();
                stats.misses += 1;
                stats.expired_reads += 1;
                debug!("Cache entry expired on read: {}", key);
                return None;
            }
            let value = entry.value.clone();
            self.stats.write().hits += 1;
            return Some(value);
        }
        self.stats.write().misses += 1;
        None
    }

    /// Insert a value with the default TTL, overwriting any previous entry
    pub async fn put(&self, key: String, value: V) {
        self.put_with_ttl(key, value, self.default_ttl).await;
    }

    /// Insert a value with a custom TTL
    ///
    /// Overwriting an existing key resets its TTL clock.
    pub async fn put_with_ttl(&self, key: String, value: V, ttl: Duration) {
        let mut entries = self.entries.write().await;
        entries.insert(key, CacheEntry::new(value, ttl));
        self.stats.write().inserts += 1;
    }

    /// Remove an entry, returning the value if one was present
    pub async fn invalidate(&self, key: &str) -> Option<V> {
        self.entries.write().await.remove(key).map(|entry| entry.value)
    }

    /// Get the cached value or run `fetch` to produce it, single-flight
    ///
    /// When several callers miss on the same key concurrently, one of them
    /// runs `fetch`; the rest await that outcome on a broadcast channel.
    /// Successful values are cached with the default TTL, errors are handed
    /// to every waiter but never cached.
    pub async fn get_or_fetch<F, Fut>(&self, key: &str, fetch: F) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        if let Some(value) = self.get(key).await {
            return Ok(value);
        }

        enum Role<V, E> {
            Leader,
            Follower(broadcast::Receiver<Result<V, E>>),
        }

        let role = {
            let mut inflight = self.inflight.lock().await;
            if let Some(tx) = inflight.get(key) {
                Role::Follower(tx.subscribe())
            } else if let Some(value) = self.lookup(key).await {
                // a leader finished between our miss and taking the lock
                return Ok(value);
            } else {
                let (tx, _rx) = broadcast::channel(1);
                inflight.insert(key.to_string(), tx);
                Role::Leader
            }
        };

        match role {
            Role::Leader => {
                let result = fetch().await;
                if let Ok(value) = &result {
                    self.put(key.to_string(), value.clone()).await;
                }
                let mut inflight = self.inflight.lock().await;
                if let Some(tx) = inflight.remove(key) {
                    // no live followers is fine
                    let _ = tx.send(result.clone());
                }
                result
            }
            Role::Follower(mut rx) => {
                self.stats.write().coalesced_waits += 1;
                match rx.recv().await {
                    Ok(result) => result,
                    Err(_) => {
                        // the leader went away without publishing; fetch directly
                        warn!("In-flight fetch for {} vanished, fetching directly", key);
                        let result = fetch().await;
                        if let Ok(value) = &result {
                            self.put(key.to_string(), value.clone()).await;
                        }
                        result
                    }
                }
            }
        }
    }

    /// Remove all expired entries, returning how many were dropped
    pub async fn sweep(&self) -> usize {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired());
        let swept = before - entries.len();
        drop(entries);

        if swept > 0 {
            self.stats.write().swept += swept as u64;
            debug!("Swept {} expired cache entries", swept);
        }
        swept
    }

    /// Number of entries currently stored, expired or not
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Whether the cache holds no entries
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Whether a live (unexpired) entry exists for the key
    pub async fn contains_key(&self, key: &str) -> bool {
        self.lookup(key).await.is_some()
    }

    /// Snapshot of the current statistics
    pub fn stats(&self) -> CacheStats {
        self.stats.read().clone()
    }

    /// Read-only lookup without stats bookkeeping or expired-entry removal
    async fn lookup(&self, key: &str) -> Option<V> {
        let entries = self.entries.read().await;
        entries
            .get(key)
            .filter(|entry| !entry.is_expired())
            .map(|entry| entry.value.clone())
    }

    /// Start the background sweep task
    pub fn spawn_sweeper(cache: Arc<Self>, interval: Duration) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // the first tick fires immediately; skip it
            ticker.tick().await;
            loop {
                ticker.tick().await;
                cache.sweep().await;
            }
        })
    }
}
