use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Per-cache access counters.
///
/// Every call into a [`CachedFunction`](crate::CachedFunction) or
/// [`CachedValue`](crate::CachedValue) lands in exactly one bucket:
///
/// * **hit** - the value was already cached
/// * **miss** - this caller computed the value
/// * **coalesced** - another caller was already computing it, and this caller
///   waited for that result instead of computing it again
/// * **bypass** - caching was disabled for the instance, or the argument was
///   not comparable (NaN), so the value was computed without touching the cache
///
/// The counters are diagnostic only. They use `Relaxed` atomics and never
/// influence what a cache returns.
///
/// # Examples
///
/// ```
/// use memoquad_core::CacheStats;
///
/// let stats = CacheStats::new();
/// stats.record_hit();
/// stats.record_hit();
/// stats.record_miss();
/// stats.record_coalesced();
///
/// assert_eq!(stats.total_calls(), 4);
/// assert!((stats.hit_rate() - 0.5).abs() < f64::EPSILON);
/// ```
#[derive(Debug)]
pub struct CacheStats {
    hits: AtomicU64,
    misses: AtomicU64,
    coalesced: AtomicU64,
    bypasses: AtomicU64,
}

impl CacheStats {
    /// Creates a new `CacheStats` instance with zero counters.
    pub fn new() -> Self {
        Self {
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            coalesced: AtomicU64::new(0),
            bypasses: AtomicU64::new(0),
        }
    }

    #[inline]
    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_coalesced(&self) {
        self.coalesced.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_bypass(&self) {
        self.bypasses.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns the number of calls answered from the cache.
    #[inline]
    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    /// Returns the number of times the wrapped function ran to fill the cache.
    #[inline]
    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    /// Returns the number of calls that waited on another caller's computation.
    #[inline]
    pub fn coalesced(&self) -> u64 {
        self.coalesced.load(Ordering::Relaxed)
    }

    /// Returns the number of calls that skipped the cache entirely.
    #[inline]
    pub fn bypasses(&self) -> u64 {
        self.bypasses.load(Ordering::Relaxed)
    }

    /// Returns the total number of calls, whichever path they took.
    #[inline]
    pub fn total_calls(&self) -> u64 {
        self.hits() + self.misses() + self.coalesced() + self.bypasses()
    }

    /// Returns the fraction of calls answered straight from the cache.
    ///
    /// Returns 0.0 if there have been no calls.
    ///
    /// # Examples
    ///
    /// ```
    /// use memoquad_core::CacheStats;
    ///
    /// let stats = CacheStats::new();
    /// assert_eq!(stats.hit_rate(), 0.0);
    ///
    /// stats.record_miss();
    /// stats.record_hit();
    /// stats.record_hit();
    /// stats.record_hit();
    /// assert!((stats.hit_rate() - 0.75).abs() < 1e-12);
    /// ```
    #[inline]
    pub fn hit_rate(&self) -> f64 {
        let total = self.total_calls();
        if total == 0 {
            0.0
        } else {
            self.hits() as f64 / total as f64
        }
    }

    /// Resets all counters to zero.
    pub fn reset(&self) {
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
        self.coalesced.store(0, Ordering::Relaxed);
        self.bypasses.store(0, Ordering::Relaxed);
    }
}

impl Default for CacheStats {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for CacheStats {
    fn clone(&self) -> Self {
        Self {
            hits: AtomicU64::new(self.hits()),
            misses: AtomicU64::new(self.misses()),
            coalesced: AtomicU64::new(self.coalesced()),
            bypasses: AtomicU64::new(self.bypasses()),
        }
    }
}

impl fmt::Display for CacheStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} calls ({} hits, {} misses, {} coalesced, {} bypassed)",
            self.total_calls(),
            self.hits(),
            self.misses(),
            self.coalesced(),
            self.bypasses()
        )
    }
}
