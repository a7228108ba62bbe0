//! Object storage for generated images.
//!
//! The pipeline only needs two operations, `store` and `remove`, so the rest
//! of the crate talks to the [`ObjectStorage`] trait. [`BucketStorage`] is the
//! `object_store` backed implementation (S3 compatible services, or memory
//! in tests).

mod bucket;

pub use bucket::BucketStorage;

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use bytes::Bytes;

/// Prefix for all generated image keys.
pub const IMAGE_PREFIX: &str = "images";

/// Content type attached to uploaded images.
pub const PNG_CONTENT_TYPE: &str = "image/png";

/// Error type for storage operations.
#[derive(Debug)]
pub enum StorageError {
    /// No bucket configured.
    NotConfigured,
    /// The storage client could not be built.
    Client(String),
    /// Upload failed.
    Upload {
        key: String,
        source: object_store::Error,
    },
    /// Delete failed.
    Delete {
        key: String,
        source: object_store::Error,
    },
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::NotConfigured => write!(f, "DO_SPACES_BUCKET is not configured"),
            StorageError::Client(msg) => write!(f, "failed to create storage client: {}", msg),
            StorageError::Upload { key, source } => {
                write!(f, "failed to upload {}: {}", key, source)
            }
            StorageError::Delete { key, source } => {
                write!(f, "failed to delete {}: {}", key, source)
            }
        }
    }
}

impl std::error::Error for StorageError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StorageError::Upload { source, .. } | StorageError::Delete { source, .. } => {
                Some(source)
            }
            _ => None,
        }
    }
}

/// Destination for generated images.
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Store bytes under `key` and return the public URL.
    async fn store(&self, bytes: Bytes, key: &str) -> Result<String, StorageError>;

    /// Remove the object stored under `key`.
    async fn remove(&self, key: &str) -> Result<(), StorageError>;
}

/// Storage key for a generated image: `images/<unix_millis>-<file_name>`.
pub fn image_key(file_name: &str) -> String {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default();
    format!("{}/{}-{}", IMAGE_PREFIX, millis, file_name)
}
