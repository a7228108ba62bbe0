//! Render pipeline configuration.

use std::num::NonZeroU32;
use std::path::PathBuf;
use std::time::Duration;

use super::parse::{env_duration, env_opt, env_or, env_parse, env_required_duration};
use super::ConfigError;
use crate::generator::Dimensions;

/// Rendering engine selection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum EngineType {
    /// Headless Chromium driven over the DevTools protocol (default).
    #[default]
    Chrome,
    /// Stub engine - returns a fixed 1x1 PNG (benchmarking, no browser installed).
    Stub,
}

impl EngineType {
    fn parse(raw: &str) -> Result<Self, ConfigError> {
        match raw.trim().to_lowercase().as_str() {
            "chrome" | "chromium" => Ok(EngineType::Chrome),
            "stub" => Ok(EngineType::Stub),
            other => Err(ConfigError::Invalid {
                key: "RENDER_ENGINE".into(),
                message: format!("unknown engine '{}', expected: chrome, stub", other),
            }),
        }
    }
}

/// Render configuration loaded from environment.
#[derive(Clone, Debug)]
pub struct RenderConfig {
    /// Engine backing the worker pool.
    pub engine: EngineType,
    /// Custom browser binary (auto-detected when unset).
    pub chrome_path: Option<PathBuf>,
    /// Output raster size.
    pub dimensions: Dimensions,
    /// Per-attempt render timeout.
    pub timeout: Duration,
    /// Delay after network idle before capture (fonts, images).
    pub settle: Option<Duration>,
    /// Render attempts per request (never zero).
    pub(crate) max_retries: NonZeroU32,
    /// Directory holding `<name>.html` templates.
    pub template_dir: PathBuf,
}

impl RenderConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let engine = EngineType::parse(&env_or("RENDER_ENGINE", "chrome"))?;

        let width: u32 = env_parse("IMAGE_WIDTH", 900)?;
        let height: u32 = env_parse("IMAGE_HEIGHT", 900)?;
        let scale: f64 = env_parse("IMAGE_SCALE", 1.0)?;
        if width == 0 || height == 0 {
            return Err(ConfigError::Invalid {
                key: "IMAGE_WIDTH/IMAGE_HEIGHT".into(),
                message: "dimensions must be positive".into(),
            });
        }
        if !(scale > 0.0 && scale.is_finite()) {
            return Err(ConfigError::Invalid {
                key: "IMAGE_SCALE".into(),
                message: "scale factor must be a positive number".into(),
            });
        }

        let retries: u32 = env_parse("RENDER_MAX_RETRIES", 2)?;
        let max_retries = NonZeroU32::new(retries).ok_or_else(|| ConfigError::Invalid {
            key: "RENDER_MAX_RETRIES".into(),
            message: "at least one attempt is required".into(),
        })?;

        Ok(Self {
            engine,
            chrome_path: env_opt("CHROME_PATH").map(PathBuf::from),
            dimensions: Dimensions::new(width, height).with_scale(scale),
            timeout: env_required_duration("RENDER_TIMEOUT", "30s")?,
            settle: env_duration("RENDER_SETTLE", "500ms")?,
            max_retries,
            template_dir: PathBuf::from(env_or("TEMPLATE_DIR", "templates")),
        })
    }

    /// Get the number of render attempts per request.
    #[inline]
    pub fn max_retries(&self) -> u32 {
        self.max_retries.get()
    }
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            engine: EngineType::Chrome,
            chrome_path: None,
            dimensions: Dimensions::default(),
            timeout: Duration::from_secs(30),
            settle: Some(Duration::from_millis(500)),
            max_retries: NonZeroU32::MIN.saturating_add(1),
            template_dir: PathBuf::from("templates"),
        }
    }
}
