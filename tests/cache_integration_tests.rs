//! Integration Tests for the cache engine
//!
//! Exercises the public API end to end: concurrent access, expiry sweeps on a
//! real runtime, snapshot files and the instance registry.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use lru_memcache::{CacheError, Memcache, Registry, Snapshot};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

// == Concurrency ==

#[test]
fn test_concurrent_stress_keeps_structure_consistent() {
    let cache: Arc<Memcache<u64>> = Arc::new(Memcache::new(64, false));
    let workers = 8;
    let ops_per_worker = 5_000;

    let handles: Vec<_> = (0..workers)
        .map(|worker| {
            let cache = Arc::clone(&cache);
            thread::spawn(move || {
                let mut rng = StdRng::seed_from_u64(worker as u64);
                for i in 0..ops_per_worker {
                    let key = format!("k{}", rng.random_range(0..128u32));
                    match rng.random_range(0..10u8) {
                        0..=4 => cache.set(key, i),
                        5..=8 => {
                            cache.get(&key);
                        }
                        _ => {
                            cache.delete(&key);
                        }
                    }
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    assert!(cache.size() <= cache.cap());
    assert_eq!(cache.keys().len(), cache.size());
    cache.check_consistency().unwrap();
}

#[test]
fn test_clear_under_concurrent_writers() {
    let cache: Arc<Memcache<u32>> = Arc::new(Memcache::new(32, false));
    let running = Arc::new(AtomicBool::new(true));

    let writers: Vec<_> = (0..4)
        .map(|w| {
            let cache = Arc::clone(&cache);
            let running = Arc::clone(&running);
            thread::spawn(move || {
                let mut i = 0u32;
                while running.load(Ordering::Relaxed) {
                    cache.set(format!("{}-{}", w, i % 50), i);
                    i = i.wrapping_add(1);
                }
            })
        })
        .collect();

    for _ in 0..200 {
        cache.clear();
        cache.check_consistency().unwrap();
    }

    running.store(false, Ordering::Relaxed);
    for writer in writers {
        writer.join().unwrap();
    }

    cache.clear();
    assert_eq!(cache.size(), 0);
    assert!(cache.keys().is_empty());
    assert!(cache.head_key().is_none());
}

#[test]
fn test_get_order_wraps_tail() {
    let capacity = 16u32;
    let cache: Memcache<u32> = Memcache::new(capacity as usize, false);
    for i in 0..capacity {
        cache.set(i.to_string(), i);
    }
    assert_eq!(cache.size(), capacity as usize);

    for i in 0..capacity {
        assert_eq!(cache.get(&i.to_string()), Some(i));
        assert_eq!(cache.head_key(), Some(i.to_string()));
        if i < capacity - 1 {
            assert_eq!(cache.tail_key(), Some((i + 1).to_string()));
        } else {
            assert_eq!(cache.tail_key(), Some("0".to_string()));
        }
    }
}

// == Expiry ==

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_expiry_sweep_on_runtime() {
    let cache = Memcache::<String>::with_options(100, true, Duration::from_millis(50));

    for i in 0..10 {
        cache.set_expire(i.to_string(), format!("hello-{}", i), 1);
    }
    cache.set("keep", "forever".to_string());
    assert_eq!(cache.size(), 11);

    tokio::time::sleep(Duration::from_millis(1_500)).await;

    assert_eq!(cache.size(), 1);
    assert!(cache.contains("keep"));
    assert_eq!(cache.stats().expirations, 10);
    cache.shutdown();
}

#[tokio::test]
async fn test_expiry_disabled_ignores_set_expire() {
    let cache = Memcache::<String>::with_capacity(10, false);
    cache.set_expire("key", "value".to_string(), 1);

    assert!(!cache.has_sweeper());
    assert_eq!(cache.size(), 0);
}

// == Snapshots ==

#[tokio::test]
async fn test_snapshot_file_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let cache: Arc<Memcache<Vec<u8>>> = Arc::new(Memcache::new(10, false));
    for i in 0..10u8 {
        cache.set(format!("blob{}", i), vec![i; i as usize]);
    }
    cache.get("blob0");
    cache.get("blob5");
    cache.set("blob10", vec![10]);

    let snapshot = cache.snapshot().unwrap();
    let path = snapshot.persist(dir.path()).await.unwrap();
    assert_eq!(
        path.file_name().and_then(|n| n.to_str()),
        Some(snapshot.file_name().as_str())
    );

    let restored: Arc<Memcache<Vec<u8>>> = Snapshot::from_file(&path)
        .await
        .unwrap()
        .restore(false)
        .unwrap();

    assert_eq!(restored.entries(), cache.entries());
    assert_eq!(restored.entries_rev(), cache.entries_rev());
    assert_eq!(restored.size(), cache.size());
    assert_eq!(restored.cap(), cache.cap());
    restored.check_consistency().unwrap();
}

#[test]
fn test_snapshot_corrupt_file_is_decode_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("1.bin");
    std::fs::write(&path, b"LRUS\x01 this is not compressed").unwrap();

    let result = tokio_test::block_on(Snapshot::from_file(&path));
    match result {
        Err(err) => assert!(err.is_decode(), "unexpected error: {}", err),
        Ok(_) => panic!("corrupt snapshot decoded"),
    }
}

#[test]
fn test_snapshot_missing_file_is_io_error() {
    let result = tokio_test::block_on(Snapshot::from_file("/definitely/not/here.bin"));
    assert!(matches!(result, Err(CacheError::Io(_))));
}

// == Registry ==

#[test]
fn test_registry_bulk_clear() {
    let registry = Registry::new();
    let sessions: Arc<Memcache<String>> = Arc::new(Memcache::new(10, false));
    let counters: Arc<Memcache<u64>> = Arc::new(Memcache::new(10, false));
    registry.register(&sessions);
    registry.register(&counters);

    sessions.set("alice", "token".to_string());
    counters.set("hits", 3);

    assert_eq!(registry.lives(), 2);
    assert_eq!(registry.total_size(), 2);

    registry.clear_all();
    assert_eq!(sessions.size(), 0);
    assert_eq!(counters.size(), 0);
}

// == Expiry under traffic ==

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_sweep_runs_alongside_concurrent_traffic() {
    let cache = Memcache::<u64>::with_options(16, true, Duration::from_millis(5));
    assert!(cache.has_sweeper());

    let workers: Vec<_> = (0..4u64)
        .map(|worker| {
            let cache = Arc::clone(&cache);
            tokio::task::spawn_blocking(move || {
                let mut rng = StdRng::seed_from_u64(100 + worker);
                for i in 0..20_000u64 {
                    let key = format!("k{}", rng.random_range(0..32u32));
                    match rng.random_range(0..10u8) {
                        0..=2 => cache.set(key, i),
                        3..=5 => cache.set_expire(key, i, rng.random_range(0..2i64)),
                        6..=8 => {
                            cache.get(&key);
                        }
                        _ => {
                            cache.delete(&key);
                        }
                    }
                }
            })
        })
        .collect();

    for worker in workers {
        worker.await.unwrap();
    }
    cache.check_consistency().unwrap();
    assert!(cache.size() <= cache.cap());
    cache.set_expire("last", 0, 0);

    // Every remaining deadline is at most one second out.
    tokio::time::sleep(Duration::from_millis(1_300)).await;
    assert_eq!(cache.pending_expirations(), 0);
    cache.check_consistency().unwrap();
    assert!(cache.stats().expirations > 0);
    cache.shutdown();
}
