//! Throughput properties under paused time.
//!
//! Each mock render takes 50ms of virtual time, so wall-clock shape follows
//! directly from pool capacity.

use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use tokio::time::Instant;

use goal_renderer::generator::{Dimensions, Generator};
use goal_renderer::template::TemplateCache;

use crate::helpers::*;

const RENDER: Duration = Duration::from_millis(50);

async fn run_concurrent(capacity: usize, requests: usize) -> (Duration, usize) {
    let dir = template_dir();
    let (pool, state) = mock_pool(capacity);
    state.set_delay(RENDER);
    pool.initialize().await.unwrap();

    let templates = Arc::new(TemplateCache::new(dir.path()));
    templates.load("goal").await.unwrap();
    let generator = Generator::new(pool, templates, 1);
    let request = goal_card(1).render_request(Dimensions::default()).unwrap();

    let start = Instant::now();
    let results = join_all((0..requests).map(|_| generator.generate(&request))).await;
    let elapsed = start.elapsed();

    assert!(results.iter().all(|r| r.is_ok()));
    (elapsed, state.max_active())
}

/// Two requests on two workers run side by side
#[tokio::test(start_paused = true)]
async fn test_parallel_when_capacity_allows() {
    let (elapsed, max_active) = run_concurrent(2, 2).await;

    assert_eq!(max_active, 2);
    assert!(elapsed >= RENDER, "elapsed {:?}", elapsed);
    assert!(elapsed < RENDER * 2, "elapsed {:?}", elapsed);
}

/// Three requests on one worker are serialized
#[tokio::test(start_paused = true)]
async fn test_serialized_on_single_worker() {
    let (elapsed, max_active) = run_concurrent(1, 3).await;

    assert_eq!(max_active, 1);
    assert!(elapsed >= RENDER * 3, "elapsed {:?}", elapsed);
    assert!(elapsed < RENDER * 4, "elapsed {:?}", elapsed);
}

/// Lifecycle drain waits for in-flight renders before closing the pool
#[tokio::test(start_paused = true)]
async fn test_shutdown_drains_in_flight_work() {
    use goal_renderer::health::HealthChecker;
    use goal_renderer::lifecycle::Lifecycle;

    let dir = template_dir();
    let (pool, state) = mock_pool(1);
    state.set_delay(Duration::from_millis(250));

    let lifecycle = Lifecycle::new(
        pool.clone(),
        Arc::new(HealthChecker::new("mock")),
        Duration::from_secs(5),
    );
    lifecycle.startup().await.unwrap();

    let templates = Arc::new(TemplateCache::new(dir.path()));
    templates.load("goal").await.unwrap();
    let generator = Generator::new(pool.clone(), templates, 1);
    let request = goal_card(1).render_request(Dimensions::default()).unwrap();
    let in_flight = tokio::spawn(async move { generator.generate(&request).await });
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(pool.borrowed(), 1);

    assert!(lifecycle.shutdown().await);
    assert!(in_flight.await.unwrap().is_ok());
    assert_eq!(state.closes(), 1);
    assert!(pool.is_shutdown());
}
