//! Object storage configuration (DigitalOcean Spaces / S3 compatible).

use super::parse::{env_opt, env_or};
use super::ConfigError;

const DEFAULT_ENDPOINT: &str = "https://sgp1.digitaloceanspaces.com";
const DEFAULT_REGION: &str = "sgp1";

/// Object storage configuration loaded from environment.
#[derive(Clone, Debug)]
pub struct StorageConfig {
    /// S3 endpoint URL.
    pub endpoint: String,
    /// Bucket region.
    pub region: String,
    /// Bucket name (uploads fail while empty).
    pub bucket: String,
    /// Access key ID.
    pub access_key_id: String,
    /// Secret access key.
    pub secret_access_key: String,
    /// CDN base URL used for public links instead of the bucket URL.
    pub cdn_endpoint: Option<String>,
}

impl StorageConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            endpoint: env_or("DO_SPACES_ENDPOINT", DEFAULT_ENDPOINT),
            region: env_or("DO_SPACES_REGION", DEFAULT_REGION),
            bucket: env_or("DO_SPACES_BUCKET", ""),
            access_key_id: env_or("DO_SPACES_ACCESS_KEY", ""),
            secret_access_key: env_or("DO_SPACES_SECRET_KEY", ""),
            cdn_endpoint: env_opt("DO_SPACES_CDN_ENDPOINT")
                .map(|s| s.trim_end_matches('/').to_string()),
        })
    }

    /// Check if a bucket is configured.
    pub fn is_configured(&self) -> bool {
        !self.bucket.is_empty()
    }

    /// Base URL under which stored keys are publicly reachable.
    pub fn public_base_url(&self) -> String {
        match &self.cdn_endpoint {
            Some(cdn) => cdn.clone(),
            None => format!(
                "https://{}.{}.digitaloceanspaces.com",
                self.bucket, self.region
            ),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            region: DEFAULT_REGION.to_string(),
            bucket: String::new(),
            access_key_id: String::new(),
            secret_access_key: String::new(),
            cdn_endpoint: None,
        }
    }
}
