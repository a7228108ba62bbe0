//! Rendering engines for goal_renderer.
//!
//! A rendering engine is an external, stateful process (a headless browser)
//! that loads markup and captures a raster image. The pool never talks to an
//! engine directly; it goes through two traits:
//!
//! - [`WorkerLauncher`] creates new engine instances.
//! - [`RenderWorker`] is one live instance: liveness probe, render, close.
//!
//! # Available Engines
//!
//! | Engine | Feature | Description |
//! |--------|---------|-------------|
//! | [`ChromeLauncher`] | `chrome` | **Default.** Headless Chromium over the DevTools protocol |
//! | [`StubLauncher`] | - | Returns a fixed 1x1 PNG, useful for benchmarking |
//!
//! # Example
//!
//! ```rust,ignore
//! use goal_renderer::engine::{StubLauncher, WorkerLauncher, RenderWorker, RenderPage};
//!
//! let mut worker = StubLauncher.launch(0).await?;
//! let png = worker.render(&RenderPage::new(html, dimensions)).await?;
//! worker.close().await;
//! ```

#[cfg(feature = "chrome")]
mod chrome;
mod stub;

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;

use crate::config::{EngineType, RenderConfig};
use crate::generator::Dimensions;

#[cfg(feature = "chrome")]
pub use chrome::{ChromeLauncher, ChromeWorker};
pub use stub::{StubLauncher, StubWorker, STUB_PNG};

/// Error type for a single render attempt or engine launch.
#[derive(Debug, Clone)]
pub enum RenderError {
    /// The page did not reach network idle and capture within the deadline.
    Timeout(Duration),
    /// The engine surface crashed or rejected a command.
    Fault(String),
    /// The engine process could not be started.
    Launch(String),
    /// The worker was already closed.
    Closed,
}

impl RenderError {
    /// Returns true if this error is a render timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(self, RenderError::Timeout(_))
    }

    /// Returns true if this error happened while starting an engine.
    pub fn is_launch(&self) -> bool {
        matches!(self, RenderError::Launch(_))
    }

    /// Short label used for metrics and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            RenderError::Timeout(_) => "timeout",
            RenderError::Fault(_) => "fault",
            RenderError::Launch(_) => "launch",
            RenderError::Closed => "closed",
        }
    }
}

impl fmt::Display for RenderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenderError::Timeout(d) => write!(f, "render timed out after {}ms", d.as_millis()),
            RenderError::Fault(msg) => write!(f, "render fault: {}", msg),
            RenderError::Launch(msg) => write!(f, "engine launch failed: {}", msg),
            RenderError::Closed => write!(f, "worker is closed"),
        }
    }
}

impl std::error::Error for RenderError {}

/// One page to render: final markup plus output raster size.
#[derive(Debug, Clone)]
pub struct RenderPage {
    pub html: String,
    pub dimensions: Dimensions,
}

impl RenderPage {
    pub fn new(html: impl Into<String>, dimensions: Dimensions) -> Self {
        Self {
            html: html.into(),
            dimensions,
        }
    }
}

/// One instance of an external rendering engine.
///
/// A worker is owned by exactly one party at a time: the pool while idle,
/// one generation while borrowed. Implementations can therefore keep
/// per-instance state behind `&mut self` without locking.
#[async_trait]
pub trait RenderWorker: Send + Sync + 'static {
    /// Pool-assigned identity.
    fn id(&self) -> u64;

    /// Cheap liveness probe. Never errors; returns false when the engine
    /// connection is gone.
    async fn is_live(&self) -> bool;

    /// Render markup on a fresh surface and capture a PNG.
    ///
    /// The surface is opened and closed within the call.
    async fn render(&mut self, page: &RenderPage) -> Result<Bytes, RenderError>;

    /// Terminate the engine. Idempotent; failures are logged, not returned.
    async fn close(&mut self);
}

/// Factory for [`RenderWorker`] instances.
#[async_trait]
pub trait WorkerLauncher: Send + Sync + 'static {
    /// Worker type produced by this launcher.
    type Worker: RenderWorker;

    /// Start a new engine instance.
    async fn launch(&self, id: u64) -> Result<Self::Worker, RenderError>;

    /// Returns the engine name for logging.
    fn name(&self) -> &'static str;
}

/// Engine selected at runtime from configuration.
pub enum EngineLauncher {
    #[cfg(feature = "chrome")]
    Chrome(ChromeLauncher),
    Stub(StubLauncher),
}

impl EngineLauncher {
    /// Build the launcher named by `RENDER_ENGINE`.
    pub fn from_config(config: &RenderConfig) -> Result<Self, RenderError> {
        match config.engine {
            #[cfg(feature = "chrome")]
            EngineType::Chrome => Ok(EngineLauncher::Chrome(ChromeLauncher::from_config(config))),
            #[cfg(not(feature = "chrome"))]
            EngineType::Chrome => Err(RenderError::Launch(
                "built without the `chrome` feature; set RENDER_ENGINE=stub".into(),
            )),
            EngineType::Stub => Ok(EngineLauncher::Stub(StubLauncher)),
        }
    }
}

/// Worker produced by [`EngineLauncher`].
pub enum EngineWorker {
    #[cfg(feature = "chrome")]
    Chrome(ChromeWorker),
    Stub(StubWorker),
}

#[async_trait]
impl RenderWorker for EngineWorker {
    fn id(&self) -> u64 {
        match self {
            #[cfg(feature = "chrome")]
            EngineWorker::Chrome(w) => w.id(),
            EngineWorker::Stub(w) => w.id(),
        }
    }

    async fn is_live(&self) -> bool {
        match self {
            #[cfg(feature = "chrome")]
            EngineWorker::Chrome(w) => w.is_live().await,
            EngineWorker::Stub(w) => w.is_live().await,
        }
    }

    async fn render(&mut self, page: &RenderPage) -> Result<Bytes, RenderError> {
        match self {
            #[cfg(feature = "chrome")]
            EngineWorker::Chrome(w) => w.render(page).await,
            EngineWorker::Stub(w) => w.render(page).await,
        }
    }

    async fn close(&mut self) {
        match self {
            #[cfg(feature = "chrome")]
            EngineWorker::Chrome(w) => w.close().await,
            EngineWorker::Stub(w) => w.close().await,
        }
    }
}

#[async_trait]
impl WorkerLauncher for EngineLauncher {
    type Worker = EngineWorker;

    async fn launch(&self, id: u64) -> Result<EngineWorker, RenderError> {
        match self {
            #[cfg(feature = "chrome")]
            EngineLauncher::Chrome(l) => l.launch(id).await.map(EngineWorker::Chrome),
            EngineLauncher::Stub(l) => l.launch(id).await.map(EngineWorker::Stub),
        }
    }

    fn name(&self) -> &'static str {
        match self {
            #[cfg(feature = "chrome")]
            EngineLauncher::Chrome(l) => l.name(),
            EngineLauncher::Stub(l) => l.name(),
        }
    }
}
