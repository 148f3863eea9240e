//! Tests for WorkerPool

use super::*;
use std::sync::mpsc;

fn small_pool(size: usize, depth: usize) -> WorkerPool {
    WorkerPool::new("test", PoolConfig::new(size, depth, Duration::from_secs(5))).unwrap()
}

/// Occupies every worker until the returned sender is dropped or signalled.
fn occupy_workers(pool: &WorkerPool) -> Vec<mpsc::Sender<()>> {
    let mut releases = Vec::new();
    for _ in 0..pool.config().size {
        let (release_tx, release_rx) = mpsc::channel::<()>();
        pool.schedule(move || {
            let _ = release_rx.recv();
            Ok(())
        })
        .unwrap();
        releases.push(release_tx);
    }

    let deadline = Instant::now() + Duration::from_secs(5);
    while pool.stats().active < pool.config().size {
        assert!(Instant::now() < deadline, "workers never picked up jobs");
        thread::sleep(Duration::from_millis(1));
    }
    releases
}

#[test]
fn test_zero_size_is_rejected() {
    let err = WorkerPool::new("bad", PoolConfig::new(0, 4, Duration::from_secs(1))).unwrap_err();
    assert!(matches!(err, PoolError::InvalidConfig(_)));
}

#[test]
fn test_zero_depth_is_rejected() {
    let err = WorkerPool::new("bad", PoolConfig::new(1, 0, Duration::from_secs(1))).unwrap_err();
    assert!(matches!(err, PoolError::InvalidConfig(_)));
}

#[test]
fn test_schedule_returns_job_value() {
    let pool = small_pool(2, 4);
    let task = pool.schedule(|| Ok(String::from("pong"))).unwrap();
    assert_eq!(task.wait(Some(Duration::from_secs(5))).unwrap(), "pong");
}

#[test]
fn test_job_error_rejects_task() {
    let pool = small_pool(1, 4);
    let task = pool
        .schedule(|| -> anyhow::Result<()> { anyhow::bail!("remote said no") })
        .unwrap();

    match task.wait(Some(Duration::from_secs(5))) {
        Err(TaskError::Failed(err)) => assert!(err.to_string().contains("remote said no")),
        other => panic!("unexpected outcome: {other:?}"),
    }
}

#[test]
fn test_panicking_job_is_contained() {
    let pool = small_pool(1, 4);
    let task = pool
        .schedule(|| -> anyhow::Result<()> { panic!("worker exploded") })
        .unwrap();

    match task.wait(Some(Duration::from_secs(5))) {
        Err(TaskError::Panicked(msg)) => assert!(msg.contains("worker exploded")),
        other => panic!("unexpected outcome: {other:?}"),
    }

    // The worker survives and keeps serving.
    let next = pool.schedule(|| Ok(1)).unwrap();
    assert_eq!(next.wait(Some(Duration::from_secs(5))).unwrap(), 1);
}

#[test]
fn test_full_queue_returns_queue_full_without_blocking() {
    let pool = small_pool(1, 1);
    let releases = occupy_workers(&pool);

    pool.schedule(|| Ok(())).unwrap();

    let started = Instant::now();
    let err = pool.schedule(|| Ok(())).unwrap_err();
    assert_eq!(err, PoolError::QueueFull);
    assert!(started.elapsed() < Duration::from_millis(50));

    drop(releases);
}

#[test]
fn test_wait_zero_timeout_returns_timeout_not_result() {
    let pool = small_pool(1, 4);
    let task = pool
        .schedule(|| {
            thread::sleep(Duration::from_millis(200));
            Ok(99)
        })
        .unwrap();

    let err = task.wait(Some(Duration::ZERO)).unwrap_err();
    assert!(err.is_timeout());

    // The job was not cancelled by the timeout.
    assert_eq!(task.wait(Some(Duration::from_secs(5))).unwrap(), 99);
}

#[test]
fn test_schedule_after_shutdown_fails() {
    let pool = small_pool(2, 4);
    pool.shutdown(Duration::from_secs(1));

    assert!(pool.is_shutdown());
    assert_eq!(pool.schedule(|| Ok(())).unwrap_err(), PoolError::Shutdown);
}

#[test]
fn test_shutdown_is_idempotent() {
    let pool = small_pool(2, 4);
    pool.shutdown(Duration::from_secs(1));
    pool.shutdown(Duration::from_secs(1));
    assert!(!pool.stats().accepting);
}

#[test]
fn test_shutdown_drains_jobs_queued_before_it() {
    let pool = small_pool(1, 8);
    let tasks: Vec<_> = (0..4).map(|i| pool.schedule(move || Ok(i)).unwrap()).collect();

    pool.shutdown(Duration::from_secs(5));

    let values: Vec<_> = tasks
        .iter()
        .map(|t| t.wait(Some(Duration::ZERO)).unwrap())
        .collect();
    assert_eq!(values, vec![0, 1, 2, 3]);
}

#[test]
fn test_shutdown_with_busy_worker_is_bounded_and_abandons_queue() {
    let pool = small_pool(1, 4);
    let releases = occupy_workers(&pool);
    let queued = pool.schedule(|| Ok(())).unwrap();

    let started = Instant::now();
    pool.shutdown(Duration::from_millis(100));
    assert!(started.elapsed() < Duration::from_secs(2));

    assert!(matches!(
        queued.wait(Some(Duration::from_secs(1))),
        Err(TaskError::Abandoned)
    ));
    drop(releases);
}

#[test]
fn test_stats_track_completion() {
    let pool = small_pool(2, 8);
    let tasks: Vec<_> = (0..5).map(|_| pool.schedule(|| Ok(())).unwrap()).collect();
    for task in &tasks {
        task.wait(Some(Duration::from_secs(5))).unwrap();
    }

    // The counter is bumped just after the task settles.
    let deadline = Instant::now() + Duration::from_secs(5);
    while pool.stats().completed < 5 {
        assert!(Instant::now() < deadline);
        thread::sleep(Duration::from_millis(1));
    }

    let stats = pool.stats();
    assert_eq!(stats.completed, 5);
    assert_eq!(stats.queued, 0);
    assert_eq!(stats.workers, 2);
}
