// Tests for the bounded worker pool

use std::sync::Arc;
use std::time::Duration;

use checksum::hash::{
    CancelToken, ChecksumEngine, ChecksumResult, EngineConfig, HashRegistry, PoolStats, SourceMessage,
    WorkItem, WorkerPool,
};
use crossbeam_channel::unbounded;
use tempfile::tempdir;

use crate::common::{drain, instrumented_registry, write_file, Gauge};

fn pool_config(workers: usize) -> EngineConfig {
    EngineConfig {
        workers,
        ..EngineConfig::default()
    }
}

#[test]
fn test_open_files_never_exceed_worker_count() {
    let dir = tempdir().unwrap();
    for i in 0..40 {
        // Several chunks per file so each adapter lives a while
        write_file(dir.path(), &format!("d{}/f{}.bin", i % 5, i), &vec![7u8; 64]);
    }
    let gauge = Arc::new(Gauge::default());
    let registry = instrumented_registry(Arc::clone(&gauge), Duration::from_millis(2));
    let engine = ChecksumEngine::new(registry).with_workers(3).with_buffer_size(16);

    let (checksums, errors) = drain(engine.checksum_tree(dir.path(), "counting"));

    assert!(errors.is_empty());
    assert_eq!(checksums.len(), 40);
    assert_eq!(gauge.created(), 40);
    assert!(gauge.peak() >= 1);
    assert!(gauge.peak() <= 3, "peak of {} concurrent adapters", gauge.peak());
    assert_eq!(gauge.live(), 0);
}

#[test]
fn test_single_worker_still_completes() {
    let dir = tempdir().unwrap();
    for i in 0..10 {
        write_file(dir.path(), &format!("f{}.txt", i), b"data");
    }
    let gauge = Arc::new(Gauge::default());
    let registry = instrumented_registry(Arc::clone(&gauge), Duration::ZERO);
    let engine = ChecksumEngine::new(registry).with_workers(1);

    let (checksums, _) = drain(engine.checksum_tree(dir.path(), "counting"));

    assert_eq!(checksums.len(), 10);
    assert_eq!(gauge.peak(), 1);
}

#[test]
fn test_pool_emits_one_result_per_item() {
    let dir = tempdir().unwrap();
    let factory = HashRegistry::standard().factory("md5").unwrap();
    let (results, received) = unbounded::<SourceMessage>();

    let pool = WorkerPool::spawn(&pool_config(4), results, CancelToken::new()).unwrap();
    assert_eq!(pool.workers(), 4);
    assert!(!pool.is_idle());

    for i in 0..25 {
        let path = write_file(dir.path(), &format!("f{}.txt", i), b"abc");
        pool.dispatch(WorkItem {
            path,
            factory: Arc::clone(&factory),
        })
        .unwrap();
    }
    // A missing path still yields exactly one result
    pool.dispatch(WorkItem {
        path: dir.path().join("gone"),
        factory: Arc::clone(&factory),
    })
    .unwrap();

    let stats = pool.finish();
    assert_eq!(
        stats,
        PoolStats {
            dispatched: 26,
            completed: 26,
            skipped: 0,
        }
    );

    let messages: Vec<SourceMessage> = received.try_iter().collect();
    assert_eq!(messages.len(), 26);
    let failures = messages
        .iter()
        .filter(|m| matches!(m, SourceMessage::Result(ChecksumResult::Error(_))))
        .count();
    assert_eq!(failures, 1);
}

#[test]
fn test_finish_with_nothing_dispatched() {
    let (results, received) = unbounded();

    let pool = WorkerPool::spawn(&pool_config(2), results, CancelToken::new()).unwrap();
    assert_eq!(pool.in_flight(), 0);

    assert_eq!(pool.finish(), PoolStats::default());
    assert!(received.try_recv().is_err());
}

#[test]
fn test_cancelled_pool_skips_queued_items() {
    let dir = tempdir().unwrap();
    let factory = HashRegistry::standard().factory("sha1").unwrap();
    let (results, received) = unbounded();
    let cancel = CancelToken::new();
    cancel.cancel();

    let pool = WorkerPool::spawn(&pool_config(2), results, cancel.clone()).unwrap();
    for i in 0..8 {
        let path = write_file(dir.path(), &format!("f{}.txt", i), b"abc");
        pool.dispatch(WorkItem {
            path,
            factory: Arc::clone(&factory),
        })
        .unwrap();
    }
    let stats = pool.finish();

    assert!(cancel.is_cancelled());
    assert_eq!(stats.dispatched, 8);
    assert_eq!(stats.skipped, 8);
    assert_eq!(stats.completed, 0);
    assert!(received.try_recv().is_err());
}

#[test]
fn test_dropped_results_still_account_for_every_item() {
    let dir = tempdir().unwrap();
    let factory = HashRegistry::standard().factory("md5").unwrap();
    let (results, received) = unbounded();
    drop(received);

    let pool = WorkerPool::spawn(&pool_config(2), results, CancelToken::new()).unwrap();
    let mut returned = 0;
    for i in 0..20 {
        let path = write_file(dir.path(), &format!("f{}.txt", i), b"abc");
        // Refused once a worker has noticed nobody is listening
        if pool
            .dispatch(WorkItem {
                path,
                factory: Arc::clone(&factory),
            })
            .is_err()
        {
            returned += 1;
        }
    }

    let stats = pool.finish();
    assert_eq!(stats.dispatched + returned, 20);
    assert_eq!(stats.completed + stats.skipped, stats.dispatched);
    // The first item is always hashed; that is how the closed stream is noticed
    assert!(stats.completed >= 1);
}
