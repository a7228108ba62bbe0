//! Image service: generate, upload, delete.

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tracing::info;

use crate::card::GoalCard;
use crate::engine::WorkerLauncher;
use crate::generator::{Dimensions, GenerateError, Generator};
use crate::lookup::{EventLookup, LookupError, PayloadSource};
use crate::observability::Metrics;
use crate::storage::{image_key, ObjectStorage, StorageError};

/// Result of a generate-and-upload call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadedImage {
    pub url: String,
    pub key: String,
    pub caption: String,
}

/// Error type for the image service.
#[derive(Debug)]
pub enum ServiceError {
    /// The card could not be turned into a render request.
    Payload(serde_json::Error),
    /// Rendering failed.
    Generate(GenerateError),
    /// Upload or delete failed.
    Storage(StorageError),
    /// Payload lookup failed.
    LookupFailed(LookupError),
    /// `generate_for_event` was called without a payload source.
    NoPayloadSource,
}

impl fmt::Display for ServiceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServiceError::Payload(e) => write!(f, "invalid payload: {}", e),
            ServiceError::Generate(e) => write!(f, "{}", e),
            ServiceError::Storage(e) => write!(f, "{}", e),
            ServiceError::LookupFailed(e) => write!(f, "{}", e),
            ServiceError::NoPayloadSource => write!(f, "no payload source configured"),
        }
    }
}

impl std::error::Error for ServiceError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ServiceError::Payload(e) => Some(e),
            ServiceError::Generate(e) => Some(e),
            ServiceError::Storage(e) => Some(e),
            ServiceError::LookupFailed(e) => Some(e),
            ServiceError::NoPayloadSource => None,
        }
    }
}

impl From<GenerateError> for ServiceError {
    fn from(e: GenerateError) -> Self {
        ServiceError::Generate(e)
    }
}

impl From<StorageError> for ServiceError {
    fn from(e: StorageError) -> Self {
        ServiceError::Storage(e)
    }
}

impl From<LookupError> for ServiceError {
    fn from(e: LookupError) -> Self {
        ServiceError::LookupFailed(e)
    }
}

/// Generates goal cards and hands them to storage.
pub struct ImageService<L: WorkerLauncher> {
    generator: Generator<L>,
    storage: Arc<dyn ObjectStorage>,
    source: Option<Arc<dyn PayloadSource>>,
    dimensions: Dimensions,
    metrics: Option<Arc<Metrics>>,
}

impl<L: WorkerLauncher> ImageService<L> {
    pub fn new(
        generator: Generator<L>,
        storage: Arc<dyn ObjectStorage>,
        dimensions: Dimensions,
    ) -> Self {
        Self {
            generator,
            storage,
            source: None,
            dimensions,
            metrics: None,
        }
    }

    /// Enable [`generate_for_event`](Self::generate_for_event).
    pub fn with_source(mut self, source: Arc<dyn PayloadSource>) -> Self {
        self.source = Some(source);
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn generator(&self) -> &Generator<L> {
        &self.generator
    }

    /// Render a card, upload it and build its caption.
    pub async fn generate_and_upload(&self, card: &GoalCard) -> Result<UploadedImage, ServiceError> {
        let start = Instant::now();
        let request = card
            .render_request(self.dimensions)
            .map_err(ServiceError::Payload)?;
        let png = self.generator.generate(&request).await?;

        let file_name = card.file_name();
        let key = image_key(&file_name);
        info!(file = %file_name, key = %key, bytes = png.len(), "uploading generated image");

        let stored = self.storage.store(png, &key).await;
        if let Some(ref metrics) = self.metrics {
            metrics.record_upload(stored.is_ok());
        }
        let url = stored?;

        info!(
            key = %key,
            url = %url,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "image generated and uploaded"
        );

        Ok(UploadedImage {
            url,
            key,
            caption: card.caption(),
        })
    }

    /// Look up the card for an event, then generate and upload it.
    pub async fn generate_for_event(
        &self,
        lookup: &EventLookup,
    ) -> Result<UploadedImage, ServiceError> {
        let source = self.source.as_ref().ok_or(ServiceError::NoPayloadSource)?;
        info!(
            fixture_id = lookup.fixture_id,
            event_id = lookup.event_id,
            "generating image for event"
        );
        let card = source.fetch(lookup).await?;
        self.generate_and_upload(&card).await
    }

    /// Delete a previously uploaded image.
    pub async fn delete(&self, key: &str) -> Result<(), ServiceError> {
        self.storage.remove(key).await?;
        info!(key = %key, "image deleted");
        Ok(())
    }
}
