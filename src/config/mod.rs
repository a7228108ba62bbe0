//! Configuration module for goal_renderer.
//!
//! This module provides centralized configuration loading from environment variables.
//!
//! # Example
//!
//! ```rust,ignore
//! use goal_renderer::config::Config;
//!
//! let config = Config::from_env()?;
//! println!("Pool size: {}", config.pool.capacity());
//! println!("Render timeout: {:?}", config.render.timeout);
//! ```

mod error;
mod logging;
mod parse;
mod pool;
mod render;
mod server;
mod storage;

pub use error::ConfigError;
pub use logging::{LogFormat, LoggingConfig};
pub use parse::parse_duration;
pub use pool::{PoolConfig, DEFAULT_POOL_SIZE};
pub use render::{EngineType, RenderConfig};
pub use server::ServerConfig;
pub use storage::StorageConfig;

/// Complete application configuration.
#[derive(Clone, Debug, Default)]
pub struct Config {
    /// Worker pool configuration.
    pub pool: PoolConfig,
    /// Render pipeline configuration.
    pub render: RenderConfig,
    /// Object storage configuration.
    pub storage: StorageConfig,
    /// Process lifecycle configuration.
    pub server: ServerConfig,
    /// Logging configuration.
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            pool: PoolConfig::from_env()?,
            render: RenderConfig::from_env()?,
            storage: StorageConfig::from_env()?,
            server: ServerConfig::from_env()?,
            logging: LoggingConfig::from_env()?,
        })
    }

    /// Print configuration summary to log.
    pub fn log_summary(&self) {
        use tracing::{info, warn};

        info!("Configuration loaded:");
        info!("  Engine: {:?}", self.render.engine);
        info!("  Pool size: {}", self.pool.capacity());
        info!(
            "  Output: {}x{} @{}x",
            self.render.dimensions.width, self.render.dimensions.height, self.render.dimensions.scale
        );
        info!("  Render timeout: {}ms", self.render.timeout.as_millis());
        info!("  Max retries: {}", self.render.max_retries());
        info!("  Templates: {}", self.render.template_dir.display());

        if let Some(ref path) = self.render.chrome_path {
            info!("  Chrome: {}", path.display());
        }

        match self.pool.acquire_timeout {
            Some(t) => info!("  Acquire timeout: {}ms", t.as_millis()),
            None => info!("  Acquire timeout: disabled"),
        }

        if let Some(interval) = self.pool.repair_interval {
            info!("  Pool repair: every {}s", interval.as_secs());
        }

        if let Some(ref internal) = self.server.internal_addr {
            info!("  Internal server: {}", internal);
        }

        info!("  Drain timeout: {}s", self.server.drain_timeout.as_secs());

        if self.storage.is_configured() {
            info!(
                "  Storage: bucket={} region={}",
                self.storage.bucket, self.storage.region
            );
        } else {
            warn!("DO_SPACES_BUCKET not configured - image upload will fail");
        }
    }
}
