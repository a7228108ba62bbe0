//! Worker pool configuration.

use std::num::NonZeroUsize;
use std::time::Duration;

use super::parse::{env_duration, env_parse};
use super::ConfigError;

/// Default number of browser workers kept warm.
pub const DEFAULT_POOL_SIZE: usize = 3;

/// Worker pool configuration loaded from environment.
#[derive(Clone, Debug)]
pub struct PoolConfig {
    /// Target number of workers (never zero).
    capacity: NonZeroUsize,
    /// Optional upper bound on how long `acquire()` may wait.
    pub acquire_timeout: Option<Duration>,
    /// Optional interval for topping the pool back up after failed replacements.
    pub repair_interval: Option<Duration>,
}

impl PoolConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let raw: usize = env_parse("BROWSER_POOL_SIZE", DEFAULT_POOL_SIZE)?;
        let capacity = NonZeroUsize::new(raw).ok_or_else(|| ConfigError::Invalid {
            key: "BROWSER_POOL_SIZE".into(),
            message: "pool size cannot be zero".into(),
        })?;

        Ok(Self {
            capacity,
            acquire_timeout: env_duration("POOL_ACQUIRE_TIMEOUT", "off")?,
            repair_interval: env_duration("POOL_REPAIR_INTERVAL", "off")?,
        })
    }

    /// Build a configuration with the given capacity and no optional timers.
    pub fn with_capacity(capacity: NonZeroUsize) -> Self {
        Self {
            capacity,
            acquire_timeout: None,
            repair_interval: None,
        }
    }

    /// Get pool capacity.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity.get()
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self::with_capacity(NonZeroUsize::MIN.saturating_add(DEFAULT_POOL_SIZE - 1))
    }
}
