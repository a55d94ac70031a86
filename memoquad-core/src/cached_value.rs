use parking_lot::{Condvar, Mutex};
use std::fmt;
use std::sync::{Arc, Weak};

use crate::registry::{CacheId, CacheRegistry, Clearable};
#[cfg(feature = "stats")]
use crate::CacheStats;

/// A lazily computed value of a zero-argument function, with the same
/// single-flight guarantee as [`CachedFunction`](crate::CachedFunction).
///
/// The first [`get`](Self::get) runs the function. Concurrent callers wait
/// for that result, and later callers get a clone of it until the value is
/// cleared, either directly or through [`clear_caches`](crate::clear_caches).
///
/// # Examples
///
/// ```
/// use memoquad_core::CachedValue;
/// use std::sync::atomic::{AtomicUsize, Ordering};
/// use std::sync::Arc;
///
/// let counter = Arc::new(AtomicUsize::new(0));
/// let c = Arc::clone(&counter);
/// let value = CachedValue::new("counter", move || c.fetch_add(1, Ordering::SeqCst) + 1);
///
/// assert_eq!(value.get(), 1);
/// assert_eq!(value.get(), 1);
/// value.clear_cache();
/// assert_eq!(value.get(), 2);
/// ```
pub struct CachedValue<V> {
    inner: Arc<ValueCache<V>>,
    id: CacheId,
}

struct ValueCache<V> {
    name: String,
    func: Box<dyn Fn() -> V + Send + Sync>,
    active: bool,
    state: Mutex<ValueState<V>>,
    computed: Condvar,
    #[cfg(feature = "stats")]
    stats: CacheStats,
}

struct ValueState<V> {
    value: Option<V>,
    in_flight: bool,
}

impl<V> CachedValue<V>
where
    V: Clone + Send + 'static,
{
    pub fn new<F>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn() -> V + Send + Sync + 'static,
    {
        Self::with_caching(name, func, true)
    }

    /// Creates a new wrapper; with `active == false` every `get` recomputes.
    pub fn with_caching<F>(name: impl Into<String>, func: F, active: bool) -> Self
    where
        F: Fn() -> V + Send + Sync + 'static,
    {
        let inner = Arc::new(ValueCache {
            name: name.into(),
            func: Box::new(func),
            active,
            state: Mutex::new(ValueState {
                value: None,
                in_flight: false,
            }),
            computed: Condvar::new(),
            #[cfg(feature = "stats")]
            stats: CacheStats::new(),
        });

        let weak: Weak<ValueCache<V>> = Arc::downgrade(&inner);
        let id = CacheRegistry::global().register(&inner.name, weak);

        Self { inner, id }
    }

    /// Returns the cached value, computing it first if necessary.
    pub fn get(&self) -> V {
        let inner = &*self.inner;
        if !inner.active {
            #[cfg(feature = "stats")]
            inner.stats.record_bypass();
            return (inner.func)();
        }

        let mut state = inner.state.lock();
        #[cfg_attr(not(feature = "stats"), allow(unused_variables, unused_assignments))]
        let mut waited = false;
        while state.in_flight {
            waited = true;
            inner.computed.wait(&mut state);
        }

        if let Some(value) = &state.value {
            #[cfg(feature = "stats")]
            if waited {
                inner.stats.record_coalesced();
            } else {
                inner.stats.record_hit();
            }
            return value.clone();
        }

        state.in_flight = true;
        drop(state);

        #[cfg(feature = "stats")]
        inner.stats.record_miss();
        tracing::trace!(cache = %inner.name, "cached value missing, computing");

        let pending = PendingValue {
            cache: inner,
            finished: false,
        };
        let value = (inner.func)();
        pending.finish(value.clone());
        value
    }

    /// Drops the stored value so the next [`get`](Self::get) recomputes it.
    pub fn clear_cache(&self) {
        self.inner.clear_cache();
    }

    /// Returns `true` if a value is currently stored.
    pub fn is_valid(&self) -> bool {
        self.inner.state.lock().value.is_some()
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn is_active(&self) -> bool {
        self.inner.active
    }

    pub fn id(&self) -> CacheId {
        self.id
    }

    #[cfg(feature = "stats")]
    pub fn stats(&self) -> &CacheStats {
        &self.inner.stats
    }
}

impl<V: Send> Clearable for ValueCache<V> {
    fn clear_cache(&self) {
        let value = self.state.lock().value.take();
        drop(value);
    }
}

impl<V> Drop for CachedValue<V> {
    fn drop(&mut self) {
        CacheRegistry::global().deregister(self.id);
    }
}

impl<V> fmt::Debug for CachedValue<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("CachedValue")
            .field("name", &self.inner.name)
            .field("id", &self.id)
            .field("active", &self.inner.active)
            .field("valid", &state.value.is_some())
            .field("in_flight", &state.in_flight)
            .finish()
    }
}

struct PendingValue<'a, V> {
    cache: &'a ValueCache<V>,
    finished: bool,
}

impl<V> PendingValue<'_, V> {
    fn finish(mut self, value: V) {
        let mut state = self.cache.state.lock();
        state.in_flight = false;
        let duplicate = state.value.is_some();
        if !duplicate {
            state.value = Some(value);
        }
        self.finished = true;
        drop(state);
        self.cache.computed.notify_all();

        if duplicate {
            tracing::error!(
                cache = %self.cache.name,
                "duplicate computation: value was stored while this thread was computing it"
            );
            panic!(
                "cached value `{}`: duplicate computation while in flight",
                self.cache.name
            );
        }
    }
}

impl<V> Drop for PendingValue<'_, V> {
    fn drop(&mut self) {
        if !self.finished {
            tracing::debug!(cache = %self.cache.name, "computation abandoned, releasing waiters");
            self.cache.state.lock().in_flight = false;
            self.cache.computed.notify_all();
        }
    }
}
