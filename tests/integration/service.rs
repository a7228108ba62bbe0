//! Image service tests: generate, upload, caption, lookup, delete.

use std::sync::Arc;

use bytes::Bytes;
use object_store::path::Path;

use goal_renderer::engine::{StubLauncher, STUB_PNG};
use goal_renderer::generator::{Dimensions, Generator};
use goal_renderer::lookup::{EventLookup, LookupError, StaticPayloadSource};
use goal_renderer::observability::Metrics;
use goal_renderer::pool::WorkerPool;
use goal_renderer::service::{ImageService, ServiceError};
use goal_renderer::storage::BucketStorage;
use goal_renderer::template::TemplateCache;

use crate::helpers::*;

const CDN: &str = "https://cdn.example.com";

struct Fixture {
    service: ImageService<StubLauncher>,
    storage: Arc<BucketStorage>,
    metrics: Arc<Metrics>,
    _templates: tempfile::TempDir,
}

fn fixture(source: Option<StaticPayloadSource>) -> Fixture {
    let dir = template_dir();
    let pool = WorkerPool::new(StubLauncher, &pool_config(1));
    let generator = Generator::new(pool, Arc::new(TemplateCache::new(dir.path())), 2);
    let storage = Arc::new(BucketStorage::in_memory(CDN));
    let metrics = Arc::new(Metrics::new().unwrap());

    let mut service = ImageService::new(generator, storage.clone(), Dimensions::default())
        .with_metrics(Arc::clone(&metrics));
    if let Some(source) = source {
        service = service.with_source(Arc::new(source));
    }

    Fixture {
        service,
        storage,
        metrics,
        _templates: dir,
    }
}

fn lookup(event_id: u64) -> EventLookup {
    EventLookup {
        fixture_id: 900,
        event_id,
        event_type: "GOAL".into(),
    }
}

/// The PNG is stored under images/ and the URL points at the CDN base
#[tokio::test]
async fn test_generate_and_upload() {
    let fx = fixture(None);

    let uploaded = fx.service.generate_and_upload(&goal_card(5)).await.unwrap();

    assert!(uploaded.key.starts_with("images/"));
    assert!(uploaded.key.ends_with("-goal-5.png"));
    assert_eq!(uploaded.url, format!("{}/{}", CDN, uploaded.key));
    assert!(uploaded.caption.ends_with("#NewcastleUnited #PremierLeague #Goal #Football"));
    assert!(uploaded.caption.contains("Alexander Isak (35')"));

    let stored = fx
        .storage
        .inner()
        .get(&Path::from(uploaded.key.as_str()))
        .await
        .unwrap()
        .bytes()
        .await
        .unwrap();
    assert_eq!(stored, Bytes::from_static(STUB_PNG));

    let metrics = fx.metrics.export();
    assert!(metrics.contains("goal_renderer_uploads_total{result=\"success\"} 1"));
}

/// Event lookups resolve through the payload source
#[tokio::test]
async fn test_generate_for_event() {
    let source = StaticPayloadSource::new();
    source.insert(900, 14, goal_card(77));
    source.insert(900, 18, goal_card(78));
    let fx = fixture(Some(source));

    let uploaded = fx.service.generate_for_event(&lookup(77)).await.unwrap();
    assert!(uploaded.key.ends_with("-goal-77.png"));

    let err = fx.service.generate_for_event(&lookup(78)).await.unwrap_err();
    assert!(matches!(
        err,
        ServiceError::LookupFailed(LookupError::UnsupportedEvent { type_id: 18, .. })
    ));

    let err = fx.service.generate_for_event(&lookup(1)).await.unwrap_err();
    assert!(matches!(
        err,
        ServiceError::LookupFailed(LookupError::NotFound { .. })
    ));
}

/// Event generation needs a payload source
#[tokio::test]
async fn test_generate_for_event_without_source() {
    let fx = fixture(None);
    let err = fx.service.generate_for_event(&lookup(1)).await.unwrap_err();
    assert!(matches!(err, ServiceError::NoPayloadSource));
}

/// Delete removes the stored object
#[tokio::test]
async fn test_delete() {
    let fx = fixture(None);
    let uploaded = fx.service.generate_and_upload(&goal_card(9)).await.unwrap();

    fx.service.delete(&uploaded.key).await.unwrap();
    assert!(fx
        .storage
        .inner()
        .head(&Path::from(uploaded.key.as_str()))
        .await
        .is_err());
}
