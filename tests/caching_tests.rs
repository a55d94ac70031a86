/// Integration tests for function and value caches and global clearing

#[cfg(test)]
mod tests {
    use memoquad::{clear_caches, CacheRegistry, CachedFunction, CachedValue};
    use serial_test::serial;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn counter() -> (Arc<AtomicUsize>, impl Fn(f64) -> usize + Send + Sync + 'static) {
        let counter = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&counter);
        (counter, move |_x: f64| c.fetch_add(1, Ordering::SeqCst) + 1)
    }

    #[test]
    #[serial]
    fn test_memoization_and_clear() {
        let (_, f) = counter();
        let cache = CachedFunction::new("caching_sequence", f);

        assert_eq!(cache.call(2.0), 1);
        assert_eq!(cache.call(1.0), 2);
        assert_eq!(cache.call(1.0), 2);
        assert_eq!(cache.call(2.0), 1);

        cache.clear_cache();
        assert_eq!(cache.call(1.0), 3);
        assert_eq!(cache.call(2.0), 4);
        assert_eq!(cache.call(3.0), 5);
    }

    #[test]
    #[serial]
    fn test_clear_continues_counting() {
        let (_, f) = counter();
        let cache = CachedFunction::new("caching_continue", f);

        assert_eq!(cache.call(3.0), 1);
        assert_eq!(cache.call(2.0), 2);
        assert_eq!(cache.call(1.0), 3);

        cache.clear_cache();
        assert_eq!(cache.call(1.0), 4);
        assert_eq!(cache.call(2.0), 5);
        assert_eq!(cache.call(3.0), 6);
    }

    #[test]
    #[serial]
    fn test_independent_caches() {
        let (_, f1) = counter();
        let (_, f2) = counter();
        let cache1 = CachedFunction::new("independent_1", f1);
        let cache2 = CachedFunction::new("independent_2", f2);

        assert_eq!(cache1.call(1.0), 1);
        assert_eq!(cache1.call(2.0), 2);
        assert_eq!(cache2.call(1.0), 1);

        cache1.clear_cache();
        assert_eq!(cache2.call(1.0), 1);
        assert_eq!(cache1.call(1.0), 3);

        assert!(clear_caches() >= 2);
        assert!(cache1.is_empty());
        assert!(cache2.is_empty());
        assert_eq!(cache1.call(2.0), 4);
        assert_eq!(cache2.call(1.0), 2);
    }

    #[test]
    #[serial]
    fn test_destroyed_cache_does_not_block_clear() {
        let (_, f1) = counter();
        let (_, f2) = counter();
        let survivor = CachedFunction::new("survivor", f1);
        let doomed = CachedFunction::new("doomed", f2);

        survivor.call(1.0);
        doomed.call(1.0);
        let doomed_id = doomed.id();
        drop(doomed);

        assert!(!CacheRegistry::global().deregister(doomed_id));
        clear_caches();
        assert!(survivor.is_empty());
        assert_eq!(survivor.call(1.0), 2);
    }

    #[test]
    #[serial]
    fn test_clear_by_name() {
        let (_, f1) = counter();
        let (_, f2) = counter();
        let target = CachedFunction::new("clear_by_name_target", f1);
        let other = CachedFunction::new("clear_by_name_other", f2);

        target.call(1.0);
        other.call(1.0);

        assert_eq!(
            CacheRegistry::global().clear_by_name("clear_by_name_target"),
            1
        );
        assert!(target.is_empty());
        assert!(other.contains(&1.0));
        assert!(CacheRegistry::global()
            .names()
            .contains(&"clear_by_name_other".to_string()));
    }

    #[test]
    #[serial]
    fn test_value_cache_and_global_clear() {
        let counter = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&counter);
        let value = CachedValue::new("value_cache", move || {
            c.fetch_add(1, Ordering::SeqCst) + 1
        });

        assert_eq!(value.get(), 1);
        assert_eq!(value.get(), 1);
        assert!(value.is_valid());

        clear_caches();
        assert!(!value.is_valid());
        assert_eq!(value.get(), 2);
    }

    #[test]
    #[serial]
    fn test_function_feeding_value() {
        let (counter, f) = counter();
        let function = Arc::new(CachedFunction::new("feeding_function", f));
        let source = Arc::clone(&function);
        let total = CachedValue::new("feeding_total", move || {
            (1..=3).map(|i| source.call(i as f64)).sum::<usize>()
        });

        assert_eq!(total.get(), 1 + 2 + 3);
        assert_eq!(counter.load(Ordering::SeqCst), 3);

        total.clear_cache();
        assert_eq!(total.get(), 6);
        assert_eq!(counter.load(Ordering::SeqCst), 3);

        clear_caches();
        assert_eq!(total.get(), 4 + 5 + 6);
    }

    #[test]
    #[serial]
    fn test_inactive_and_nan_bypass() {
        let (_, f) = counter();
        let inactive = CachedFunction::with_caching("inactive", f, false);
        assert_eq!(inactive.call(1.0), 1);
        assert_eq!(inactive.call(1.0), 2);

        let (_, f) = counter();
        let cache = CachedFunction::new("nan_bypass", f);
        assert_eq!(cache.call(f64::NAN), 1);
        assert_eq!(cache.call(f64::NAN), 2);
        assert_eq!(cache.call(-0.0), 3);
        assert_eq!(cache.call(0.0), 3);
    }

    #[cfg(feature = "stats")]
    #[test]
    #[serial]
    fn test_statistics() {
        let (_, f) = counter();
        let cache = CachedFunction::new("statistics", f);
        cache.call(1.0);
        cache.call(1.0);
        cache.call(1.0);
        cache.call(f64::NAN);

        let stats = cache.stats();
        assert_eq!(stats.misses(), 1);
        assert_eq!(stats.hits(), 2);
        assert_eq!(stats.bypasses(), 1);
        assert!((stats.hit_rate() - 0.5).abs() < 1e-12);
    }

    #[test]
    #[serial]
    fn test_clear_caches_with_cached_caches() {
        use std::sync::mpsc;
        use std::thread;
        use std::time::Duration;

        let factory = CachedFunction::new("cache_factory", |seed: u32| {
            Arc::new(CachedValue::new("owned_value", move || seed + 1))
        });
        assert_eq!(factory.call(1).get(), 2);
        assert!(CacheRegistry::global()
            .names()
            .contains(&"owned_value".to_string()));

        let (done_tx, done_rx) = mpsc::channel();
        thread::spawn(move || {
            let cleared = clear_caches();
            done_tx.send(cleared).unwrap();
        });
        let cleared = done_rx
            .recv_timeout(Duration::from_secs(5))
            .expect("clear_caches did not return");
        assert!(cleared >= 2);

        assert!(factory.is_empty());
        assert!(!CacheRegistry::global()
            .names()
            .contains(&"owned_value".to_string()));
    }
}
