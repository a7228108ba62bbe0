//! `object_store` backed image storage (DigitalOcean Spaces / S3 compatible).

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use object_store::aws::AmazonS3Builder;
use object_store::memory::InMemory;
use object_store::path::Path;
use object_store::{Attribute, Attributes, ObjectStore, PutOptions, PutPayload};
use tracing::{debug, info, instrument, warn};

use super::{ObjectStorage, StorageError, PNG_CONTENT_TYPE};
use crate::config::StorageConfig;

/// Object storage client for generated images.
pub struct BucketStorage {
    store: Arc<dyn ObjectStore>,
    bucket: String,
    /// Public URL prefix for stored keys.
    base_url: String,
}

impl BucketStorage {
    /// Create a client for the configured bucket.
    pub fn from_config(config: &StorageConfig) -> Result<Self, StorageError> {
        if !config.is_configured() {
            return Err(StorageError::NotConfigured);
        }

        let store = AmazonS3Builder::new()
            .with_endpoint(&config.endpoint)
            .with_bucket_name(&config.bucket)
            .with_access_key_id(&config.access_key_id)
            .with_secret_access_key(&config.secret_access_key)
            .with_region(&config.region)
            .build()
            .map_err(|e| StorageError::Client(e.to_string()))?;

        info!(bucket = %config.bucket, region = %config.region, "object storage client initialized");

        Ok(Self {
            store: Arc::new(store),
            bucket: config.bucket.clone(),
            base_url: config.public_base_url(),
        })
    }

    /// In-memory store, for tests and dry runs.
    pub fn in_memory(base_url: impl Into<String>) -> Self {
        Self {
            store: Arc::new(InMemory::new()),
            bucket: "memory".to_string(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Public URL for a key.
    pub fn url_for(&self, key: &str) -> String {
        format!("{}/{}", self.base_url, key)
    }

    /// Underlying store (for inspection in tests).
    pub fn inner(&self) -> &Arc<dyn ObjectStore> {
        &self.store
    }
}

#[async_trait]
impl ObjectStorage for BucketStorage {
    #[instrument(skip(self, bytes), fields(bucket = %self.bucket, key = %key))]
    async fn store(&self, bytes: Bytes, key: &str) -> Result<String, StorageError> {
        let location = Path::from(key);
        let size = bytes.len();

        let mut attributes = Attributes::new();
        attributes.insert(Attribute::ContentType, PNG_CONTENT_TYPE.into());
        let options = PutOptions {
            attributes,
            ..PutOptions::default()
        };

        self.store
            .put_opts(&location, PutPayload::from(bytes), options)
            .await
            .map_err(|source| {
                warn!(error = %source, "upload failed");
                StorageError::Upload {
                    key: key.to_string(),
                    source,
                }
            })?;

        let url = self.url_for(key);
        debug!(size, url = %url, "image uploaded");
        Ok(url)
    }

    #[instrument(skip(self), fields(bucket = %self.bucket, key = %key))]
    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.store
            .delete(&Path::from(key))
            .await
            .map_err(|source| StorageError::Delete {
                key: key.to_string(),
                source,
            })?;

        debug!("image deleted");
        Ok(())
    }
}
