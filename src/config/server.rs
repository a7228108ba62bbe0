//! Process lifecycle configuration (internal server, shutdown drain).

use std::net::SocketAddr;
use std::time::Duration;

use super::parse::{env_opt, env_parse};
use super::ConfigError;

/// Server configuration loaded from environment.
#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// Internal server address for /health and /metrics.
    pub internal_addr: Option<SocketAddr>,
    /// Grace period for in-flight renders during shutdown.
    pub drain_timeout: Duration,
}

impl ServerConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Parse internal address
        let internal_addr = env_opt("INTERNAL_ADDR")
            .map(|s| {
                s.parse::<SocketAddr>().map_err(|e| ConfigError::Parse {
                    key: "INTERNAL_ADDR".into(),
                    value: s,
                    error: format!("{}", e),
                })
            })
            .transpose()?;

        let drain_timeout_secs: u64 = env_parse("DRAIN_TIMEOUT_SECS", 30)?;

        Ok(Self {
            internal_addr,
            drain_timeout: Duration::from_secs(drain_timeout_secs),
        })
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            internal_addr: None,
            drain_timeout: Duration::from_secs(30),
        }
    }
}
