use parking_lot::{Condvar, Mutex};
use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::sync::{Arc, Weak};

use crate::registry::{CacheId, CacheRegistry, Clearable};
use crate::CacheableKey;
#[cfg(feature = "stats")]
use crate::CacheStats;

/// A thread-safe memoizing wrapper around a pure function `K -> V`.
///
/// For each key the wrapped function runs **at most once** between two
/// clears, however many threads ask for it at the same time. The first caller
/// to miss a key becomes its *winner*: it records the key as in flight,
/// releases the cache lock and runs the function. Callers that arrive while
/// the key is in flight block on that key's wait gate (a [`Condvar`]) and
/// return the winner's value once it is stored. Other keys stay fully
/// accessible while the function runs, because the lock only guards map
/// bookkeeping.
///
/// # Bypass
///
/// The cache is skipped entirely, and the function called directly, when
///
/// * the instance was built with caching disabled (see
///   [`with_caching`](Self::with_caching)), or
/// * the argument has no cache key, i.e. [`CacheableKey::cache_key`] returned
///   `None` (NaN for floating-point arguments).
///
/// # Lifecycle
///
/// Every instance registers with the global [`CacheRegistry`] on construction
/// and deregisters when dropped, so [`clear_caches`](crate::clear_caches)
/// reaches it for as long as it is alive.
///
/// # Panics
///
/// [`call`](Self::call) panics if it detects that two threads both computed
/// the same key as winners. That can only happen through a synchronisation
/// bug and is treated as fatal. A panic raised *by the wrapped function*
/// propagates to its caller. The in-flight record is released first, so
/// blocked callers wake up and one of them retries the computation.
///
/// # Examples
///
/// ```
/// use memoquad_core::CachedFunction;
/// use std::sync::atomic::{AtomicUsize, Ordering};
/// use std::sync::Arc;
///
/// let counter = Arc::new(AtomicUsize::new(0));
/// let c = Arc::clone(&counter);
/// let f = CachedFunction::new("counter", move |_x: f64| {
///     c.fetch_add(1, Ordering::SeqCst) + 1
/// });
///
/// assert_eq!(f.call(2.0), 1);
/// assert_eq!(f.call(1.0), 2);
/// assert_eq!(f.call(1.0), 2);
/// assert_eq!(f.call(2.0), 1);
///
/// f.clear_cache();
/// assert_eq!(f.call(1.0), 3);
/// ```
pub struct CachedFunction<K: CacheableKey, V> {
    inner: Arc<FunctionCache<K, V>>,
    id: CacheId,
}

struct FunctionCache<K: CacheableKey, V> {
    name: String,
    func: Box<dyn Fn(K) -> V + Send + Sync>,
    active: bool,
    state: Mutex<CacheState<K::Key, V>>,
    #[cfg(feature = "stats")]
    stats: CacheStats,
}

/// Everything behind the cache lock. A key is in at most one of the two maps.
struct CacheState<H, V> {
    entries: HashMap<H, V>,
    /// Wait gate per key whose value is being computed.
    in_flight: HashMap<H, Arc<Condvar>>,
}

impl<K, V> CachedFunction<K, V>
where
    K: CacheableKey + 'static,
    V: Clone + Send + 'static,
{
    /// Creates a new caching wrapper around `func`.
    ///
    /// # Parameters
    ///
    /// * `name` - Diagnostic name, used in logs and by
    ///   [`CacheRegistry::clear_by_name`]
    /// * `func` - The pure function to memoize
    pub fn new<F>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(K) -> V + Send + Sync + 'static,
    {
        Self::with_caching(name, func, true)
    }

    /// Creates a new wrapper, choosing whether results are actually cached.
    ///
    /// With `active == false` every call runs `func`, which is useful for
    /// measuring how much a cache actually saves.
    pub fn with_caching<F>(name: impl Into<String>, func: F, active: bool) -> Self
    where
        F: Fn(K) -> V + Send + Sync + 'static,
    {
        let name = name.into();
        let inner = Arc::new(FunctionCache {
            name,
            func: Box::new(func),
            active,
            state: Mutex::new(CacheState {
                entries: HashMap::new(),
                in_flight: HashMap::new(),
            }),
            #[cfg(feature = "stats")]
            stats: CacheStats::new(),
        });

        let weak: Weak<FunctionCache<K, V>> = Arc::downgrade(&inner);
        let id = CacheRegistry::global().register(&inner.name, weak);

        Self { inner, id }
    }

    /// Returns `func(arg)`, computing it only if no cached value exists.
    ///
    /// # Thread Safety
    ///
    /// May be called from any number of threads at once. The cache lock is
    /// held only while inspecting or updating the maps, never while the
    /// wrapped function runs. When this returns, the value is already stored
    /// and visible to every later caller (unless cleared in the meantime).
    pub fn call(&self, arg: K) -> V {
        let inner = &*self.inner;

        let key = match arg.cache_key() {
            Some(key) if inner.active => key,
            _ => {
                #[cfg(feature = "stats")]
                inner.stats.record_bypass();
                return (inner.func)(arg);
            }
        };

        let mut state = inner.state.lock();
        #[cfg_attr(not(feature = "stats"), allow(unused_variables, unused_assignments))]
        let mut waited = false;
        loop {
            if let Some(value) = state.entries.get(&key) {
                #[cfg(feature = "stats")]
                if waited {
                    inner.stats.record_coalesced();
                } else {
                    inner.stats.record_hit();
                }
                return value.clone();
            }

            let Some(gate) = state.in_flight.get(&key).cloned() else {
                break;
            };

            tracing::trace!(cache = %inner.name, "waiting for in-flight computation");
            waited = true;
            while state
                .in_flight
                .get(&key)
                .is_some_and(|current| Arc::ptr_eq(current, &gate))
            {
                gate.wait(&mut state);
            }
            // The winner is done. Either its value is in `entries`, or the
            // cache was cleared (or the winner panicked) and we start over.
        }

        let gate = Arc::new(Condvar::new());
        state.in_flight.insert(key.clone(), Arc::clone(&gate));
        drop(state);

        #[cfg(feature = "stats")]
        inner.stats.record_miss();
        tracing::trace!(cache = %inner.name, "cache miss, computing");

        let pending = PendingComputation {
            name: &inner.name,
            state: &inner.state,
            key: Some(key),
            gate,
        };
        let value = (inner.func)(arg);
        pending.finish(value.clone());
        value
    }

    /// Empties the cache.
    ///
    /// Computations already in flight are not disturbed. They store their
    /// results in the now-empty cache when they finish.
    pub fn clear_cache(&self) {
        self.inner.clear_cache();
    }

    /// Returns `true` if a value for `arg` is currently cached.
    pub fn contains(&self, arg: &K) -> bool {
        arg.cache_key()
            .is_some_and(|key| self.inner.state.lock().entries.contains_key(&key))
    }

    /// Number of cached values.
    pub fn len(&self) -> usize {
        self.inner.state.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Whether results are cached at all (see [`with_caching`](Self::with_caching)).
    pub fn is_active(&self) -> bool {
        self.inner.active
    }

    /// Identity of this instance in the [`CacheRegistry`].
    pub fn id(&self) -> CacheId {
        self.id
    }

    /// Returns the access counters for this cache.
    #[cfg(feature = "stats")]
    pub fn stats(&self) -> &CacheStats {
        &self.inner.stats
    }
}

impl<K: CacheableKey, V> Clearable for FunctionCache<K, V>
where
    V: Send,
{
    fn clear_cache(&self) {
        // Values may own caches whose `Drop` needs the registry, so they are
        // dropped after the state lock is released.
        let entries = std::mem::take(&mut self.state.lock().entries);
        drop(entries);
    }
}

impl<K: CacheableKey, V> Drop for CachedFunction<K, V> {
    fn drop(&mut self) {
        CacheRegistry::global().deregister(self.id);
    }
}

impl<K: CacheableKey, V> fmt::Debug for CachedFunction<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("CachedFunction")
            .field("name", &self.inner.name)
            .field("id", &self.id)
            .field("active", &self.inner.active)
            .field("entries", &state.entries.len())
            .field("in_flight", &state.in_flight.len())
            .finish()
    }
}

/// The winner's claim on an in-flight key.
///
/// Dropping it without calling [`finish`](Self::finish), which only happens
/// when the wrapped function panics, withdraws the claim and wakes the
/// waiters so one of them can take over.
struct PendingComputation<'a, H: Eq + Hash, V> {
    name: &'a str,
    state: &'a Mutex<CacheState<H, V>>,
    key: Option<H>,
    gate: Arc<Condvar>,
}

impl<H: Eq + Hash, V> PendingComputation<'_, H, V> {
    fn finish(mut self, value: V) {
        let Some(key) = self.key.take() else {
            return;
        };

        let mut state = self.state.lock();
        state.in_flight.remove(&key);
        let duplicate = state.entries.contains_key(&key);
        if !duplicate {
            state.entries.insert(key, value);
        }
        drop(state);
        self.gate.notify_all();

        if duplicate {
            tracing::error!(
                cache = self.name,
                "duplicate computation: key was cached while this thread held its in-flight claim"
            );
            panic!(
                "cache `{}`: duplicate computation for a key that was already in flight",
                self.name
            );
        }
    }
}

impl<H: Eq + Hash, V> Drop for PendingComputation<'_, H, V> {
    fn drop(&mut self) {
        if let Some(key) = self.key.take() {
            tracing::debug!(cache = self.name, "computation abandoned, releasing waiters");
            self.state.lock().in_flight.remove(&key);
            self.gate.notify_all();
        }
    }
}
