use std::hash::Hash;

/// Converts a function argument into the key a [`CachedFunction`](crate::CachedFunction)
/// stores its result under.
///
/// Returning `None` marks the argument as *not comparable*: equality is
/// undefined for it, so the cache must not look it up or store it. The call
/// is forwarded straight to the wrapped function instead. The obvious case is
/// a floating-point NaN.
///
/// # Examples
///
/// ```
/// use memoquad_core::CacheableKey;
///
/// assert_eq!(1.5f64.cache_key(), Some(1.5f64.to_bits()));
/// assert_eq!((-0.0f64).cache_key(), 0.0f64.cache_key());
/// assert_eq!(f64::NAN.cache_key(), None);
/// ```
pub trait CacheableKey {
    /// The hashable form of the argument.
    type Key: Eq + Hash + Clone + Send + Sync + 'static;

    /// Returns the cache key for `self`, or `None` if `self` cannot be cached.
    fn cache_key(&self) -> Option<Self::Key>;
}

/// Marker trait for argument types that are already `Eq + Hash + Clone` and
/// can serve as their own cache key.
///
/// Implement it for your own key types to get [`CacheableKey`] for free:
///
/// ```
/// use memoquad_core::{CacheableKey, DefaultCacheableKey};
///
/// #[derive(Debug, Clone, PartialEq, Eq, Hash)]
/// struct ComponentId(u32);
///
/// impl DefaultCacheableKey for ComponentId {}
///
/// assert_eq!(ComponentId(7).cache_key(), Some(ComponentId(7)));
/// ```
pub trait DefaultCacheableKey {}

impl<T> CacheableKey for T
where
    T: DefaultCacheableKey + Eq + Hash + Clone + Send + Sync + 'static,
{
    type Key = T;

    #[inline]
    fn cache_key(&self) -> Option<T> {
        Some(self.clone())
    }
}

macro_rules! default_cacheable {
    ($($t:ty),* $(,)?) => {
        $(impl DefaultCacheableKey for $t {})*
    };
}

default_cacheable!(
    u8,
    u16,
    u32,
    u64,
    u128,
    usize,
    i8,
    i16,
    i32,
    i64,
    i128,
    isize,
    bool,
    char,
    String,
    &'static str,
    (),
);

impl CacheableKey for f64 {
    type Key = u64;

    #[inline]
    fn cache_key(&self) -> Option<u64> {
        if self.is_nan() {
            None
        } else if *self == 0.0 {
            // -0.0 == 0.0, so both must share a key
            Some(0.0f64.to_bits())
        } else {
            Some(self.to_bits())
        }
    }
}

impl CacheableKey for f32 {
    type Key = u32;

    #[inline]
    fn cache_key(&self) -> Option<u32> {
        if self.is_nan() {
            None
        } else if *self == 0.0 {
            Some(0.0f32.to_bits())
        } else {
            Some(self.to_bits())
        }
    }
}
