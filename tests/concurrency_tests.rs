/// Integration tests for single-flight behaviour under concurrent callers

#[cfg(test)]
mod tests {
    use memoquad::{clear_caches, CachedFunction, CachedValue};
    use parking_lot::Mutex;
    use serial_test::serial;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Barrier};
    use std::thread;
    use std::time::Duration;

    #[test]
    #[serial]
    fn test_concurrent_callers_compute_once() {
        const CALLERS: usize = 32;

        let computations = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&computations);
        let cache = Arc::new(CachedFunction::new("dedup", move |x: f64| {
            c.fetch_add(1, Ordering::SeqCst);
            thread::sleep(Duration::from_millis(20));
            x.sqrt()
        }));
        let barrier = Arc::new(Barrier::new(CALLERS));

        let handles: Vec<_> = (0..CALLERS)
            .map(|_| {
                let cache = Arc::clone(&cache);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    cache.call(16.0)
                })
            })
            .collect();

        let results: Vec<f64> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(results.iter().all(|&r| r == 4.0));
        assert_eq!(computations.load(Ordering::SeqCst), 1);
    }

    #[test]
    #[serial]
    fn test_random_keys_each_computed_once() {
        const THREADS: usize = 8;
        const CALLS: usize = 500;
        const KEYS: u32 = 40;

        let per_key: Arc<Mutex<HashMap<u32, usize>>> = Arc::new(Mutex::new(HashMap::new()));
        let counts = Arc::clone(&per_key);
        let cache = Arc::new(CachedFunction::new("random_keys", move |key: u32| {
            *counts.lock().entry(key).or_insert(0) += 1;
            thread::sleep(Duration::from_micros(200));
            key * 2
        }));

        let handles: Vec<_> = (0..THREADS)
            .map(|seed| {
                let cache = Arc::clone(&cache);
                thread::spawn(move || {
                    let mut rng = fastrand::Rng::with_seed(seed as u64);
                    for _ in 0..CALLS {
                        let key = rng.u32(0..KEYS);
                        assert_eq!(cache.call(key), key * 2);
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        let per_key = per_key.lock();
        assert!(per_key.values().all(|&n| n == 1));
        assert_eq!(per_key.len(), cache.len());
    }

    #[test]
    #[serial]
    fn test_clear_caches_while_computing() {
        const THREADS: usize = 6;

        let cache = Arc::new(CachedFunction::new("clear_under_load", |x: u32| {
            thread::sleep(Duration::from_micros(100));
            x + 1
        }));
        let value = Arc::new(CachedValue::new("clear_under_load_value", || 7u32));

        let workers: Vec<_> = (0..THREADS)
            .map(|seed| {
                let cache = Arc::clone(&cache);
                let value = Arc::clone(&value);
                thread::spawn(move || {
                    let mut rng = fastrand::Rng::with_seed(100 + seed as u64);
                    for _ in 0..300 {
                        let key = rng.u32(0..16);
                        assert_eq!(cache.call(key), key + 1);
                        assert_eq!(value.get(), 7);
                    }
                })
            })
            .collect();

        let clearer = thread::spawn(|| {
            for _ in 0..50 {
                clear_caches();
                thread::sleep(Duration::from_micros(300));
            }
        });

        for worker in workers {
            worker.join().unwrap();
        }
        clearer.join().unwrap();
    }

    #[test]
    #[serial]
    fn test_caches_created_and_dropped_concurrently_with_clear() {
        let stop = Arc::new(std::sync::atomic::AtomicBool::new(false));

        let clearer = {
            let stop = Arc::clone(&stop);
            thread::spawn(move || {
                let mut rounds = 0;
                loop {
                    clear_caches();
                    rounds += 1;
                    if stop.load(Ordering::SeqCst) {
                        break rounds;
                    }
                }
            })
        };

        let builders: Vec<_> = (0..4)
            .map(|i| {
                thread::spawn(move || {
                    for n in 0..200u64 {
                        let cache = CachedFunction::new(format!("short_lived_{}", i), |x: u64| x);
                        assert_eq!(cache.call(n), n);
                    }
                })
            })
            .collect();

        for builder in builders {
            builder.join().unwrap();
        }
        stop.store(true, Ordering::SeqCst);
        assert!(clearer.join().unwrap() > 0);
    }
}
