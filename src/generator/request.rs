//! Render request types.

use serde::Serialize;
use serde_json::Value;

/// Default output width and height in CSS pixels.
pub const DEFAULT_SIZE: u32 = 900;

/// Target raster size.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
    /// Device scale factor (1.0 = one image pixel per CSS pixel).
    pub scale: f64,
}

impl Dimensions {
    #[inline]
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            scale: 1.0,
        }
    }

    #[inline]
    pub fn with_scale(mut self, scale: f64) -> Self {
        self.scale = scale;
        self
    }
}

impl Default for Dimensions {
    fn default() -> Self {
        Self::new(DEFAULT_SIZE, DEFAULT_SIZE)
    }
}

/// One render request: template name, payload and raster size.
///
/// Immutable once constructed.
#[derive(Debug, Clone)]
pub struct RenderRequest {
    template: String,
    payload: Value,
    dimensions: Dimensions,
}

impl RenderRequest {
    /// Create a request from any serializable payload.
    pub fn new<T: Serialize>(
        template: impl Into<String>,
        payload: &T,
        dimensions: Dimensions,
    ) -> Result<Self, serde_json::Error> {
        Ok(Self::from_value(
            template,
            serde_json::to_value(payload)?,
            dimensions,
        ))
    }

    /// Create a request from an already-built JSON value.
    pub fn from_value(template: impl Into<String>, payload: Value, dimensions: Dimensions) -> Self {
        Self {
            template: template.into(),
            payload,
            dimensions,
        }
    }

    #[inline]
    pub fn template(&self) -> &str {
        &self.template
    }

    #[inline]
    pub fn payload(&self) -> &Value {
        &self.payload
    }

    #[inline]
    pub fn dimensions(&self) -> Dimensions {
        self.dimensions
    }
}
