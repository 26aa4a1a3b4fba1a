//! Core TTL cache implementation
//!
//! This module provides a thread-safe, string-keyed cache where every
//! entry expires a fixed TTL after insertion. Expired entries are reaped
//! by a background sweeper that runs at half-TTL cadence, and an optional
//! eviction callback observes every entry exactly once as it leaves the
//! cache (explicit eviction, clear, or sweep).
//!
//! The callback is always invoked *after* the entry has been removed from
//! the backing map and *outside* the map lock. Removal under the write
//! lock is the linearization point, so a sweep racing an explicit
//! eviction can never observe the same entry twice, and callbacks are
//! free to call back into the cache without deadlocking.

use std::collections::HashMap;
use std::sync::{Arc, Condvar, Mutex, RwLock, Weak};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{debug, trace, warn};

use crate::error::{ErrorClassification, ErrorSeverity};
use crate::time::{Clock, SystemClock};

/// Cache error type
#[derive(Debug, Clone, Error)]
pub enum CacheError {
    #[error("cache keys must be non-empty")]
    EmptyKey,
}

impl ErrorClassification for CacheError {
    fn is_retryable(&self) -> bool {
        false
    }

    fn severity(&self) -> ErrorSeverity {
        ErrorSeverity::Error
    }
}

/// Callback invoked once per entry as it leaves the cache
pub type EvictionCallback<V> = Arc<dyn Fn(&str, &V) + Send + Sync>;

/// Entry stored in the cache with its expiry deadline
struct CacheContainer<V> {
    value: V,
    expires_at: Instant,
}

impl<V> CacheContainer<V> {
    /// Expiry is monotonic: once this returns true it stays true, because
    /// the deadline is fixed at insertion and the clock only moves forward.
    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

struct CacheState<V, C> {
    entries: RwLock<HashMap<String, CacheContainer<V>>>,
    ttl: Duration,
    on_evict: RwLock<Option<EvictionCallback<V>>>,
    clock: C,
}

impl<V, C> CacheState<V, C>
where
    V: Clone,
    C: Clock,
{
    /// Remove every expired entry and invoke the eviction callback once
    /// per reaped entry. Returns the number of entries removed.
    fn sweep_expired(&self) -> usize {
        let now = self.clock.now();
        let reaped: Vec<(String, CacheContainer<V>)> = {
            let mut entries = self.entries.write().unwrap();
            let keys: Vec<String> = entries
                .iter()
                .filter(|(_, container)| container.is_expired(now))
                .map(|(k, _)| k.clone())
                .collect();
            keys.into_iter().filter_map(|k| entries.remove(&k).map(|c| (k, c))).collect()
        };

        let count = reaped.len();
        let callback = self.on_evict.read().unwrap().clone();
        for (key, container) in reaped {
            if let Some(callback) = &callback {
                callback(&key, &container.value);
            }
        }
        count
    }
}

/// Thread-safe TTL cache keyed by string paths
///
/// Entries expire `ttl` after insertion. [`MemoryCache::new`] starts a
/// background sweeper that reaps expired entries every `ttl / 2`;
/// [`MemoryCache::with_clock`] skips the sweeper so tests can drive
/// expiry deterministically through a mock clock and
/// [`MemoryCache::sweep_now`].
///
/// # Example
/// ```
/// use std::time::Duration;
///
/// use vaultline_common::cache::MemoryCache;
///
/// let cache: MemoryCache<u32> = MemoryCache::new(Duration::from_secs(60));
/// cache.add("apps/key@1", 42).unwrap();
/// assert_eq!(cache.get("apps/key@1"), Some(42));
/// ```
pub struct MemoryCache<V, C = SystemClock>
where
    V: Clone + Send + Sync + 'static,
    C: Clock + 'static,
{
    state: Arc<CacheState<V, C>>,
    sweeper: Option<Arc<Sweeper>>,
}

impl<V> MemoryCache<V, SystemClock>
where
    V: Clone + Send + Sync + 'static,
{
    /// Create a cache with the given TTL and a running background sweeper
    pub fn new(ttl: Duration) -> Self {
        let state = Arc::new(CacheState {
            entries: RwLock::new(HashMap::new()),
            ttl,
            on_evict: RwLock::new(None),
            clock: SystemClock,
        });
        let sweeper = Sweeper::spawn(&state, sweep_interval(ttl));
        Self { state, sweeper: sweeper.map(Arc::new) }
    }
}

/// The sweeper runs at half the entry TTL so an expired entry waits at
/// most one full TTL before it is reaped.
fn sweep_interval(ttl: Duration) -> Duration {
    (ttl / 2).max(Duration::from_millis(10))
}

impl<V, C> MemoryCache<V, C>
where
    V: Clone + Send + Sync + 'static,
    C: Clock + 'static,
{
    /// Create a cache with a custom clock and no background sweeper
    ///
    /// Expiry is still enforced on `get`; reaping happens only through
    /// [`MemoryCache::sweep_now`]. Intended for tests with a mock clock.
    pub fn with_clock(ttl: Duration, clock: C) -> Self {
        let state = Arc::new(CacheState {
            entries: RwLock::new(HashMap::new()),
            ttl,
            on_evict: RwLock::new(None),
            clock,
        });
        Self { state, sweeper: None }
    }

    /// Install the eviction callback, replacing any previous one
    pub fn on_eviction(self, callback: impl Fn(&str, &V) + Send + Sync + 'static) -> Self {
        *self.state.on_evict.write().unwrap() = Some(Arc::new(callback));
        self
    }

    /// Insert a value, overwriting any prior entry for the key
    ///
    /// The entry's expiry is reset to now + TTL. Overwriting does not
    /// invoke the eviction callback; the replaced value is simply
    /// dropped.
    ///
    /// # Errors
    /// Fails with [`CacheError::EmptyKey`] for an empty key.
    pub fn add(&self, key: impl Into<String>, value: V) -> Result<(), CacheError> {
        let key = key.into();
        if key.is_empty() {
            return Err(CacheError::EmptyKey);
        }

        let expires_at = self.state.clock.now() + self.state.ttl;
        let mut entries = self.state.entries.write().unwrap();
        entries.insert(key, CacheContainer { value, expires_at });
        Ok(())
    }

    /// Get a live value
    ///
    /// Returns `None` if the key is absent or the entry has expired.
    /// Expired entries are left in place for the sweeper; lookups have no
    /// side effects.
    pub fn get(&self, key: &str) -> Option<V> {
        let now = self.state.clock.now();
        let entries = self.state.entries.read().unwrap();
        entries.get(key).filter(|container| !container.is_expired(now)).map(|c| c.value.clone())
    }

    /// Remove an entry and invoke the eviction callback for it
    ///
    /// Returns `true` when an entry was present. The container is dropped
    /// as soon as the callback returns.
    pub fn evict(&self, key: &str) -> bool {
        let removed = {
            let mut entries = self.state.entries.write().unwrap();
            entries.remove(key)
        };

        match removed {
            Some(container) => {
                trace!(key, "evicting cache entry");
                if let Some(callback) = self.state.on_evict.read().unwrap().clone() {
                    callback(key, &container.value);
                }
                true
            }
            None => false,
        }
    }

    /// Evict every entry, invoking the callback for each
    pub fn clear(&self) {
        let drained: Vec<(String, CacheContainer<V>)> = {
            let mut entries = self.state.entries.write().unwrap();
            entries.drain().collect()
        };

        debug!(count = drained.len(), "clearing cache");
        let callback = self.state.on_evict.read().unwrap().clone();
        for (key, container) in drained {
            if let Some(callback) = &callback {
                callback(&key, &container.value);
            }
        }
    }

    /// Reap expired entries immediately
    ///
    /// Returns the number of entries removed. The background sweeper calls
    /// the same path; tests with a mock clock call this directly.
    pub fn sweep_now(&self) -> usize {
        self.state.sweep_expired()
    }

    /// Get the current number of entries, including not-yet-reaped expired
    /// ones
    pub fn len(&self) -> usize {
        self.state.entries.read().unwrap().len()
    }

    /// Check if the cache is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<V, C> Clone for MemoryCache<V, C>
where
    V: Clone + Send + Sync + 'static,
    C: Clock + 'static,
{
    fn clone(&self) -> Self {
        Self { state: Arc::clone(&self.state), sweeper: self.sweeper.clone() }
    }
}

/// Handle to the background sweeper thread
///
/// Dropping the last cache clone drops this handle, which signals the
/// thread to stop and joins it.
struct Sweeper {
    signal: Arc<(Mutex<bool>, Condvar)>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl Sweeper {
    fn spawn<V, C>(state: &Arc<CacheState<V, C>>, interval: Duration) -> Option<Self>
    where
        V: Clone + Send + Sync + 'static,
        C: Clock + 'static,
    {
        let weak: Weak<CacheState<V, C>> = Arc::downgrade(state);
        let signal = Arc::new((Mutex::new(false), Condvar::new()));
        let thread_signal = Arc::clone(&signal);

        let spawned = std::thread::Builder::new()
            .name("vaultline-cache-sweeper".to_string())
            .spawn(move || {
                let (lock, condvar) = &*thread_signal;
                let mut stopped = lock.lock().unwrap();
                loop {
                    let (guard, _) = condvar.wait_timeout(stopped, interval).unwrap();
                    stopped = guard;
                    if *stopped {
                        break;
                    }
                    let Some(state) = weak.upgrade() else {
                        break;
                    };
                    let reaped = state.sweep_expired();
                    if reaped > 0 {
                        trace!(reaped, "cache sweep reaped expired entries");
                    }
                }
            });

        match spawned {
            Ok(handle) => Some(Self { signal, handle: Mutex::new(Some(handle)) }),
            Err(e) => {
                warn!("failed to spawn cache sweeper thread: {e}");
                None
            }
        }
    }
}

impl Drop for Sweeper {
    fn drop(&mut self) {
        let (lock, condvar) = &*self.signal;
        if let Ok(mut stopped) = lock.lock() {
            *stopped = true;
        }
        condvar.notify_all();
        if let Some(handle) = self.handle.lock().ok().and_then(|mut h| h.take()) {
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for cache::core.
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::time::MockClock;

    fn mock_cache(ttl_secs: u64) -> (MemoryCache<i32, MockClock>, MockClock) {
        let clock = MockClock::new();
        let cache = MemoryCache::with_clock(Duration::from_secs(ttl_secs), clock.clone());
        (cache, clock)
    }

    /// Validates `MemoryCache::add` behavior for the add and get scenario.
    ///
    /// Assertions:
    /// - Confirms `cache.get("a")` equals `Some(1)`.
    /// - Confirms `cache.get("missing")` equals `None`.
    /// - Confirms `cache.len()` equals `2`.
    #[test]
    fn test_add_and_get() {
        let (cache, _clock) = mock_cache(10);

        cache.add("a", 1).unwrap();
        cache.add("b", 2).unwrap();

        assert_eq!(cache.get("a"), Some(1));
        assert_eq!(cache.get("b"), Some(2));
        assert_eq!(cache.get("missing"), None);
        assert_eq!(cache.len(), 2);
    }

    /// Validates `MemoryCache::add` behavior for the empty key rejection
    /// scenario.
    ///
    /// Assertions:
    /// - Ensures `cache.add("", 1)` fails with `CacheError::EmptyKey`.
    #[test]
    fn test_add_rejects_empty_key() {
        let (cache, _clock) = mock_cache(10);
        assert!(matches!(cache.add("", 1), Err(CacheError::EmptyKey)));
    }

    /// Validates `MemoryCache::add` behavior for the overwrite resets expiry
    /// scenario.
    ///
    /// Assertions:
    /// - Confirms the overwritten value is returned after the original
    ///   would have expired.
    #[test]
    fn test_overwrite_resets_expiry() {
        let (cache, clock) = mock_cache(10);

        cache.add("key", 1).unwrap();
        clock.advance(Duration::from_secs(6));
        cache.add("key", 2).unwrap();
        clock.advance(Duration::from_secs(6));

        // 12s since the first insert, 6s since the overwrite
        assert_eq!(cache.get("key"), Some(2));
    }

    /// Validates `MemoryCache::get` behavior for the expired entry scenario.
    ///
    /// Assertions:
    /// - Confirms `cache.get("key")` equals `None` after the TTL passes.
    /// - Confirms the expired entry is left in place (no side effect).
    #[test]
    fn test_get_expired_has_no_side_effect() {
        let (cache, clock) = mock_cache(10);

        cache.add("key", 1).unwrap();
        clock.advance(Duration::from_secs(11));

        assert_eq!(cache.get("key"), None);
        assert_eq!(cache.len(), 1); // still present until swept
    }

    /// Validates `MemoryCache::evict` behavior for the explicit eviction
    /// scenario.
    ///
    /// Assertions:
    /// - Ensures `cache.evict("key")` evaluates to true.
    /// - Confirms the callback observed the evicted entry once.
    /// - Ensures a second evict returns false without a callback.
    #[test]
    fn test_evict_invokes_callback_once() {
        let (cache, _clock) = mock_cache(10);
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&calls);
        let cache = cache.on_eviction(move |key, value| {
            assert_eq!(key, "key");
            assert_eq!(*value, 7);
            seen.fetch_add(1, Ordering::SeqCst);
        });

        cache.add("key", 7).unwrap();
        assert!(cache.evict("key"));
        assert!(!cache.evict("key"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.get("key"), None);
    }

    /// Validates `MemoryCache::sweep_now` behavior for the sweep reaps
    /// expired scenario.
    ///
    /// Assertions:
    /// - Confirms `cache.sweep_now()` equals `2`.
    /// - Confirms the callback ran once per reaped entry.
    /// - Confirms the live entry survived.
    #[test]
    fn test_sweep_reaps_only_expired() {
        let (cache, clock) = mock_cache(10);
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&calls);
        let cache = cache.on_eviction(move |_, _| {
            seen.fetch_add(1, Ordering::SeqCst);
        });

        cache.add("old-1", 1).unwrap();
        cache.add("old-2", 2).unwrap();
        clock.advance(Duration::from_secs(8));
        cache.add("fresh", 3).unwrap();
        clock.advance(Duration::from_secs(4));

        assert_eq!(cache.sweep_now(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(cache.get("fresh"), Some(3));
        assert_eq!(cache.len(), 1);
    }

    /// Validates sweep racing explicit eviction never double-invokes the
    /// callback for the same entry.
    ///
    /// Assertions:
    /// - Confirms exactly one callback invocation for the contested entry.
    #[test]
    fn test_sweep_and_evict_never_double_invoke() {
        let (cache, clock) = mock_cache(5);
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&calls);
        let cache = cache.on_eviction(move |_, _| {
            seen.fetch_add(1, Ordering::SeqCst);
        });

        for round in 0..50 {
            let key = format!("entry-{round}");
            cache.add(key.clone(), round).unwrap();
            clock.advance(Duration::from_secs(6));

            let sweeper = {
                let cache = cache.clone();
                std::thread::spawn(move || cache.sweep_now())
            };
            let evicted = cache.evict(&key);
            let swept = sweeper.join().unwrap();

            // Exactly one of the two paths removed the entry
            assert!(evicted as usize + swept == 1, "round {round}: evicted={evicted} swept={swept}");
        }

        assert_eq!(calls.load(Ordering::SeqCst), 50);
    }

    /// Validates `MemoryCache::clear` behavior for the clear scenario.
    ///
    /// Assertions:
    /// - Confirms the callback ran once per entry.
    /// - Ensures `cache.is_empty()` evaluates to true.
    #[test]
    fn test_clear_evicts_all() {
        let (cache, _clock) = mock_cache(10);
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&calls);
        let cache = cache.on_eviction(move |_, _| {
            seen.fetch_add(1, Ordering::SeqCst);
        });

        cache.add("a", 1).unwrap();
        cache.add("b", 2).unwrap();
        cache.add("c", 3).unwrap();
        cache.clear();

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert!(cache.is_empty());
    }

    /// Validates `MemoryCache::clone` behavior for the clone shares storage
    /// scenario.
    ///
    /// Assertions:
    /// - Confirms `clone.get("key")` equals `Some(9)`.
    #[test]
    fn test_clone_shares_storage() {
        let (cache, _clock) = mock_cache(10);
        cache.add("key", 9).unwrap();

        let clone = cache.clone();
        assert_eq!(clone.get("key"), Some(9));

        clone.add("other", 10).unwrap();
        assert_eq!(cache.get("other"), Some(10));
    }

    /// Validates `MemoryCache::new` behavior for the background sweeper
    /// scenario.
    ///
    /// Assertions:
    /// - Confirms the sweeper reaps an expired entry without an explicit
    ///   sweep call.
    #[test]
    fn test_background_sweeper_reaps() {
        let cache: MemoryCache<i32> = MemoryCache::new(Duration::from_millis(40));
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&calls);
        let cache = cache.on_eviction(move |_, _| {
            seen.fetch_add(1, Ordering::SeqCst);
        });

        cache.add("key", 1).unwrap();
        assert_eq!(cache.get("key"), Some(1));

        // Entry expires at 40ms; the sweeper runs every 20ms
        std::thread::sleep(Duration::from_millis(200));

        assert_eq!(cache.get("key"), None);
        assert_eq!(cache.len(), 0);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    /// Validates concurrent adds from multiple threads land without loss.
    ///
    /// Assertions:
    /// - Confirms `cache.len()` equals `100`.
    #[test]
    fn test_thread_safety() {
        let cache: MemoryCache<i32> = MemoryCache::new(Duration::from_secs(60));
        let mut handles = vec![];

        for i in 0..10 {
            let cache = cache.clone();
            handles.push(std::thread::spawn(move || {
                for j in 0..10 {
                    cache.add(format!("key-{i}-{j}"), i * 10 + j).unwrap();
                }
            }));
        }

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(cache.len(), 100);
    }
}
