//! Logging configuration.

use super::parse::env_or;
use super::ConfigError;

/// Log output format.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// One JSON object per line (default).
    #[default]
    Json,
    /// Human-readable tracing output.
    Text,
}

/// Logging configuration loaded from environment.
#[derive(Clone, Debug)]
pub struct LoggingConfig {
    /// Log level filter (from LOG_LEVEL or RUST_LOG).
    pub filter: String,
    /// Service name for structured logging.
    pub service_name: String,
    /// Output format.
    pub format: LogFormat,
}

impl LoggingConfig {
    /// Load configuration from environment variables.
    ///
    /// Priority: LOG_LEVEL > RUST_LOG > default
    ///
    /// LOG_LEVEL accepts simple values: trace, debug, info, warn, error
    /// RUST_LOG accepts full tracing filter syntax: goal_renderer=debug,chromiumoxide=warn
    pub fn from_env() -> Result<Self, ConfigError> {
        let format = match env_or("LOG_FORMAT", "json").to_lowercase().as_str() {
            "json" => LogFormat::Json,
            "text" | "pretty" => LogFormat::Text,
            other => {
                return Err(ConfigError::Invalid {
                    key: "LOG_FORMAT".into(),
                    message: format!("unknown format '{}', expected: json, text", other),
                })
            }
        };

        Ok(Self {
            filter: Self::resolve_log_filter(),
            service_name: env_or("SERVICE_NAME", "goal_renderer"),
            format,
        })
    }

    /// Resolve log filter from environment.
    ///
    /// Priority: LOG_LEVEL > RUST_LOG > default (info)
    fn resolve_log_filter() -> String {
        // 1. Check LOG_LEVEL first (simple: debug, info, warn, error)
        if let Ok(level) = std::env::var("LOG_LEVEL") {
            let level = level.to_lowercase();
            match level.as_str() {
                "trace" | "debug" | "info" | "warn" | "error" => {
                    return format!("goal_renderer={}", level);
                }
                _ => {
                    // Logging is not up yet; fall through to RUST_LOG
                    eprintln!(
                        "Warning: Invalid LOG_LEVEL '{}', expected: trace, debug, info, warn, error",
                        level
                    );
                }
            }
        }

        // 2. Check RUST_LOG (full tracing filter syntax)
        if let Ok(filter) = std::env::var("RUST_LOG") {
            return filter;
        }

        // 3. Default
        "goal_renderer=info".to_string()
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "goal_renderer=info".to_string(),
            service_name: "goal_renderer".to_string(),
            format: LogFormat::Json,
        }
    }
}
