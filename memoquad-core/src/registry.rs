//! # Cache Registry
//!
//! Process-wide bookkeeping of every live cache, so that all memoized results
//! can be dropped with one call when global configuration changes (for
//! example the integration tolerance).
//!
//! Caches register themselves on construction and deregister in `Drop`. The
//! registry only keeps a [`Weak`] reference to each cache.
//! [`CacheRegistry::clear_all`] upgrades the handles it will clear, so a
//! cache dropped by its owner mid-clear stays alive until the clear is done.
//! No registry lock is held while clearing, so a cache whose cleared values
//! own other caches can deregister them on the same thread.
//!
//! # Examples
//!
//! ```rust
//! use memoquad_core::{clear_caches, CachedFunction};
//!
//! let square = CachedFunction::new("square", |x: f64| x * x);
//! assert_eq!(square.call(3.0), 9.0);
//! assert!(square.contains(&3.0));
//!
//! clear_caches();
//! assert!(!square.contains(&3.0));
//! ```

use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock, Weak};

/// Anything the registry can clear.
pub trait Clearable: Send + Sync {
    /// Drops every memoized result held by `self`.
    fn clear_cache(&self);
}

/// Identity of a registered cache instance.
///
/// Ids are handed out from a monotonic counter and never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheId(u64);

impl fmt::Display for CacheId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cache#{}", self.0)
    }
}

struct RegisteredCache {
    name: String,
    target: Weak<dyn Clearable>,
}

/// Registry of live caches, keyed by instance identity.
pub struct CacheRegistry {
    /// Map from cache id to its name and a weak handle used for clearing
    caches: RwLock<HashMap<CacheId, RegisteredCache>>,
    next_id: AtomicU64,
}

impl CacheRegistry {
    fn new() -> Self {
        Self {
            caches: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Get the global cache registry
    pub fn global() -> &'static CacheRegistry {
        static INSTANCE: OnceLock<CacheRegistry> = OnceLock::new();
        INSTANCE.get_or_init(CacheRegistry::new)
    }

    /// Registers a cache and returns the id it must deregister with.
    ///
    /// # Arguments
    ///
    /// * `name` - Diagnostic name of the cache (need not be unique)
    /// * `target` - Weak handle used to clear the cache
    pub fn register(&self, name: &str, target: Weak<dyn Clearable>) -> CacheId {
        let id = CacheId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.caches.write().insert(
            id,
            RegisteredCache {
                name: name.to_string(),
                target,
            },
        );
        tracing::trace!(%id, name, "cache registered");
        id
    }

    /// Removes a cache from the registry.
    ///
    /// A [`clear_all`](Self::clear_all) that already took its snapshot may
    /// still clear the cache once more.
    ///
    /// # Returns
    ///
    /// `true` if the cache was registered
    pub fn deregister(&self, id: CacheId) -> bool {
        let removed = self.caches.write().remove(&id).is_some();
        if removed {
            tracing::trace!(%id, "cache deregistered");
        }
        removed
    }

    /// Clears every registered cache.
    ///
    /// The registry lock is only held while taking a snapshot of the live
    /// caches. Caches registered after that are not cleared.
    ///
    /// # Returns
    ///
    /// Number of caches cleared
    pub fn clear_all(&self) -> usize {
        let caches = self.live_caches(|_| true);
        for cache in &caches {
            cache.clear_cache();
        }

        tracing::debug!(count = caches.len(), "cleared all registered caches");
        caches.len()
    }

    /// Clears every live cache registered under `name`.
    ///
    /// # Returns
    ///
    /// Number of caches cleared
    pub fn clear_by_name(&self, name: &str) -> usize {
        let caches = self.live_caches(|entry| entry.name == name);
        for cache in &caches {
            cache.clear_cache();
        }
        caches.len()
    }

    fn live_caches<P>(&self, mut predicate: P) -> Vec<Arc<dyn Clearable>>
    where
        P: FnMut(&RegisteredCache) -> bool,
    {
        self.caches
            .read()
            .values()
            .filter(|entry| predicate(entry))
            .filter_map(|entry| entry.target.upgrade())
            .collect()
    }

    /// Names of all registered caches (duplicates included).
    pub fn names(&self) -> Vec<String> {
        self.caches
            .read()
            .values()
            .map(|entry| entry.name.clone())
            .collect()
    }

    /// Number of registered caches.
    pub fn len(&self) -> usize {
        self.caches.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.caches.read().is_empty()
    }
}

/// Clears every cache in the process.
///
/// Call this after changing anything a cached computation implicitly depends
/// on, such as the default integration tolerance.
///
/// # Returns
///
/// Number of caches cleared
pub fn clear_caches() -> usize {
    CacheRegistry::global().clear_all()
}
