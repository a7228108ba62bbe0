//! Worker pool tests: capacity, liveness, replacement, shutdown.

use std::sync::atomic::Ordering;
use std::time::Duration;

use goal_renderer::engine::RenderPage;
use goal_renderer::generator::Dimensions;
use goal_renderer::pool::PoolError;

use crate::helpers::*;

fn page() -> RenderPage {
    RenderPage::new("<html></html>", Dimensions::default())
}

/// Borrowed workers never exceed capacity and are never shared
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrency_never_exceeds_capacity() {
    let (pool, state) = mock_pool(3);
    state.set_delay(Duration::from_millis(10));
    pool.initialize().await.unwrap();

    let tasks: Vec<_> = (0..12)
        .map(|_| {
            let pool = pool.clone();
            let state = state.clone();
            tokio::spawn(async move {
                let mut worker = pool.acquire().await.unwrap();
                let id = worker.id();
                assert!(state.claim(id), "worker {} handed out twice", id);
                assert!(pool.borrowed() <= pool.capacity());

                worker.render(&page()).await.unwrap();

                state.unclaim(id);
                worker.release().await;
            })
        })
        .collect();
    for task in tasks {
        task.await.unwrap();
    }

    assert_eq!(state.renders(), 12);
    assert!(state.max_active() <= 3);
    assert_eq!(state.launches(), 3);

    let stats = pool.stats();
    assert_eq!(stats.borrowed, 0);
    assert_eq!(stats.idle, 3);
}

/// A dead idle worker is closed and replaced before being handed out
#[tokio::test]
async fn test_dead_idle_worker_replaced_on_acquire() {
    let (pool, state) = mock_pool(1);
    pool.initialize().await.unwrap();
    state.kill(0);

    let worker = pool.acquire().await.unwrap();
    assert_eq!(worker.id(), 1);
    assert!(worker.is_live().await);
    assert_eq!(*state.closed_ids.lock().unwrap(), vec![0]);

    let stats = pool.stats();
    assert_eq!(stats.replacements, 1);
    assert_eq!(stats.tracked, 1);
    worker.release().await;
}

/// A worker that dies while borrowed is replaced when it comes back
#[tokio::test]
async fn test_dead_worker_replaced_on_release() {
    let (pool, state) = mock_pool(1);
    pool.initialize().await.unwrap();

    let worker = pool.acquire().await.unwrap();
    state.kill(worker.id());
    worker.release().await;

    let stats = pool.stats();
    assert_eq!(stats.idle, 1);
    assert_eq!(stats.tracked, 1);
    assert_eq!(stats.replacements, 1);
    assert_eq!(state.closes(), 1);

    let next = pool.acquire().await.unwrap();
    assert_eq!(next.id(), 1);
    next.release().await;
}

/// A failed replacement leaves the pool one worker short but still serving
#[tokio::test]
async fn test_failed_replacement_degrades_capacity() {
    let (pool, state) = mock_pool(2);
    pool.initialize().await.unwrap();

    let a = pool.acquire().await.unwrap();
    let b = pool.acquire().await.unwrap();
    let a_id = a.id();

    state.refuse_launches.store(true, Ordering::SeqCst);
    state.kill(b.id());
    b.release().await;

    let stats = pool.stats();
    assert_eq!(stats.tracked, 1);
    assert_eq!(stats.replacement_failures, 1);
    assert_eq!(stats.degraded_by(), 1);

    a.release().await;
    let again = pool.acquire().await.unwrap();
    assert_eq!(again.id(), a_id);
    again.release().await;
}

/// Top-up restores capacity once launches succeed again
#[tokio::test]
async fn test_top_up_restores_capacity() {
    let (pool, state) = mock_pool(2);
    pool.initialize().await.unwrap();

    let worker = pool.acquire().await.unwrap();
    state.refuse_launches.store(true, Ordering::SeqCst);
    state.kill(worker.id());
    worker.release().await;
    assert_eq!(pool.stats().tracked, 1);

    assert_eq!(pool.top_up().await, 0);

    state.refuse_launches.store(false, Ordering::SeqCst);
    assert_eq!(pool.top_up().await, 1);
    assert_eq!(pool.stats().tracked, 2);
    assert_eq!(pool.top_up().await, 0);
}

/// Init failure closes the workers that did launch and keeps the pool empty
#[tokio::test]
async fn test_init_failure_closes_launched_workers() {
    let (pool, state) = mock_pool(3);
    state.launch_budget.store(2, Ordering::SeqCst);

    let err = pool.initialize().await.unwrap_err();
    match err {
        PoolError::InitFailure {
            capacity, failed, ..
        } => {
            assert_eq!(capacity, 3);
            assert_eq!(failed, 1);
        }
        other => panic!("unexpected error: {other}"),
    }

    assert_eq!(state.closes(), 2);
    let stats = pool.stats();
    assert_eq!(stats.tracked, 0);
    assert!(!stats.initialized);
    assert!(matches!(
        pool.acquire().await.unwrap_err(),
        PoolError::NotInitialized
    ));
}

/// Shutdown closes idle workers now, borrowed workers on return, each once
#[tokio::test]
async fn test_shutdown_closes_each_worker_once() {
    let (pool, state) = mock_pool(3);
    pool.initialize().await.unwrap();

    let held = pool.acquire().await.unwrap();
    pool.shutdown().await;
    assert_eq!(state.closes(), 2);

    held.release().await;
    assert_eq!(state.closes(), 3);

    pool.shutdown().await;
    assert_eq!(state.closes(), 3);

    let mut ids = state.closed_ids.lock().unwrap().clone();
    ids.sort_unstable();
    assert_eq!(ids, vec![0, 1, 2]);

    assert!(pool.acquire().await.unwrap_err().is_shutdown());
    assert_eq!(pool.stats().tracked, 0);
}

/// Shutdown wakes waiters with an error instead of leaving them blocked
#[tokio::test]
async fn test_shutdown_fails_waiters() {
    let (pool, _state) = mock_pool(1);
    pool.initialize().await.unwrap();
    let held = pool.acquire().await.unwrap();

    let waiter = {
        let pool = pool.clone();
        tokio::spawn(async move { pool.acquire().await })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;

    pool.shutdown().await;
    let result = tokio::time::timeout(Duration::from_secs(1), waiter)
        .await
        .expect("waiter not woken")
        .unwrap();
    assert!(result.unwrap_err().is_shutdown());
    held.release().await;
}

/// A waiter is served as soon as a worker is released
#[tokio::test]
async fn test_waiter_served_on_release() {
    let (pool, _state) = mock_pool(1);
    pool.initialize().await.unwrap();
    let held = pool.acquire().await.unwrap();
    let held_id = held.id();

    let waiter = {
        let pool = pool.clone();
        tokio::spawn(async move { pool.acquire().await.map(|w| w.id()) })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(!waiter.is_finished());

    held.release().await;
    let id = tokio::time::timeout(Duration::from_secs(1), waiter)
        .await
        .expect("waiter not served")
        .unwrap()
        .unwrap();
    assert_eq!(id, held_id);
}

/// Dropping a borrowed worker without release still returns it
#[tokio::test]
async fn test_dropped_worker_returns_to_pool() {
    let (pool, _state) = mock_pool(1);
    pool.initialize().await.unwrap();

    let worker = pool.acquire().await.unwrap();
    drop(worker);

    let again = tokio::time::timeout(Duration::from_secs(1), pool.acquire())
        .await
        .expect("worker never returned")
        .unwrap();
    assert_eq!(pool.borrowed(), 1);
    again.release().await;
    assert_eq!(pool.borrowed(), 0);
}

/// Cancelled waiters leave the counters untouched
#[tokio::test]
async fn test_cancelled_acquire_leaks_nothing() {
    let (pool, _state) = mock_pool(1);
    pool.initialize().await.unwrap();
    let held = pool.acquire().await.unwrap();

    let cancelled = tokio::time::timeout(Duration::from_millis(20), pool.acquire()).await;
    assert!(cancelled.is_err());

    held.release().await;
    let stats = pool.stats();
    assert_eq!(stats.borrowed, 0);
    assert_eq!(stats.idle, 1);
    assert_eq!(stats.tracked, 1);
}

/// A release whose caller goes away still hands the worker back
#[tokio::test(start_paused = true)]
async fn test_cancelled_release_returns_worker() {
    let (pool, state) = mock_pool(1);
    pool.initialize().await.unwrap();
    let worker = pool.acquire().await.unwrap();

    state.set_live_check_delay(Duration::from_millis(50));
    let cut = tokio::time::timeout(Duration::from_millis(10), worker.release()).await;
    assert!(cut.is_err());
    assert_eq!(pool.borrowed(), 0);

    let again = tokio::time::timeout(Duration::from_secs(5), pool.acquire())
        .await
        .expect("worker never returned")
        .unwrap();
    assert_eq!(again.id(), 0);
    assert_eq!(state.closes(), 0);
    assert_eq!(pool.stats().tracked, 1);
    again.release().await;
}

/// A dead worker whose release is cut short is still replaced
#[tokio::test(start_paused = true)]
async fn test_cancelled_release_of_dead_worker_replaces_it() {
    let (pool, state) = mock_pool(1);
    pool.initialize().await.unwrap();
    let worker = pool.acquire().await.unwrap();

    state.kill(worker.id());
    state.set_launch_delay(Duration::from_millis(100));
    let cut = tokio::time::timeout(Duration::from_millis(10), worker.release()).await;
    assert!(cut.is_err());

    tokio::time::sleep(Duration::from_millis(200)).await;
    let stats = pool.stats();
    assert_eq!(stats.tracked, 1);
    assert_eq!(stats.idle, 1);
    assert_eq!(stats.replacements, 1);
    assert_eq!(*state.closed_ids.lock().unwrap(), vec![0]);
}

/// An acquire timeout during a slow replacement does not lose the worker
#[tokio::test(start_paused = true)]
async fn test_acquire_timeout_during_replacement() {
    let mut config = pool_config(1);
    config.acquire_timeout = Some(Duration::from_millis(50));
    let (pool, state) = mock_pool_with(config);
    pool.initialize().await.unwrap();

    state.set_launch_delay(Duration::from_millis(200));
    state.kill(0);
    let err = pool.acquire().await.unwrap_err();
    assert!(err.is_timeout());

    tokio::time::sleep(Duration::from_millis(200)).await;
    let stats = pool.stats();
    assert_eq!(stats.tracked, 1);
    assert_eq!(stats.idle, 1);
    assert_eq!(stats.replacements, 1);
    assert_eq!(*state.closed_ids.lock().unwrap(), vec![0]);

    let worker = pool.acquire().await.unwrap();
    assert_eq!(worker.id(), 1);
    worker.release().await;
}

/// A slow replacement that fails after the acquirer gave up is still counted
#[tokio::test(start_paused = true)]
async fn test_acquire_timeout_during_failed_replacement() {
    let mut config = pool_config(1);
    config.acquire_timeout = Some(Duration::from_millis(50));
    let (pool, state) = mock_pool_with(config);
    pool.initialize().await.unwrap();

    state.set_launch_delay(Duration::from_millis(200));
    state.refuse_launches.store(true, Ordering::SeqCst);
    state.kill(0);
    assert!(pool.acquire().await.unwrap_err().is_timeout());

    tokio::time::sleep(Duration::from_millis(200)).await;
    let stats = pool.stats();
    assert_eq!(stats.tracked, 0);
    assert_eq!(stats.replacement_failures, 1);
    assert_eq!(state.closes(), 1);
}

/// Configured acquire timeout surfaces as a pool error
#[tokio::test(start_paused = true)]
async fn test_acquire_timeout() {
    let mut config = pool_config(1);
    config.acquire_timeout = Some(Duration::from_millis(50));
    let (pool, _state) = mock_pool_with(config);
    pool.initialize().await.unwrap();

    let held = pool.acquire().await.unwrap();
    let err = pool.acquire().await.unwrap_err();
    assert!(err.is_timeout());
    assert!(matches!(err, PoolError::AcquireTimeout(d) if d == Duration::from_millis(50)));
    held.release().await;
}

/// Clones share the same workers
#[tokio::test]
async fn test_clones_share_workers() {
    let (pool, state) = mock_pool(2);
    let other = pool.clone();
    other.initialize().await.unwrap();
    pool.initialize().await.unwrap();

    assert_eq!(state.launches(), 2);
    let worker = pool.acquire().await.unwrap();
    assert_eq!(other.borrowed(), 1);
    worker.release().await;
    assert_eq!(pool.stats(), other.stats());
}
