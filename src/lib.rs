//! goal_renderer - pooled headless-browser rendering of goal graphics.
//!
//! A small, bounded set of browser workers is kept warm. Each generation
//! borrows one worker, renders an HTML template filled with a JSON payload,
//! captures a PNG and hands the worker back. Dead workers are replaced on the
//! fly and failed attempts are retried a bounded number of times.
//!
//! # Architecture
//!
//! ```text
//! ImageService ──► Generator ──► WorkerPool ──► RenderWorker (Chrome / Stub)
//!      │               │
//!      │               └──► TemplateCache
//!      └──► ObjectStorage (S3-compatible)
//! ```
//!
//! - [`template::TemplateCache`] - memoized HTML markup with a data placeholder
//! - [`pool::WorkerPool`] - bounded pool with liveness checks and replacement
//! - [`generator::Generator`] - acquire, render, release, retry
//! - [`lifecycle::Lifecycle`] - pre-warm on startup, drain on shutdown
//! - [`service::ImageService`] - generate, upload, caption, delete
//!
//! # Example
//!
//! ```rust,ignore
//! use goal_renderer::config::PoolConfig;
//! use goal_renderer::engine::StubLauncher;
//! use goal_renderer::generator::{Dimensions, Generator, RenderRequest};
//! use goal_renderer::pool::WorkerPool;
//! use goal_renderer::template::TemplateCache;
//!
//! let pool = WorkerPool::new(StubLauncher, &PoolConfig::default());
//! pool.initialize().await?;
//!
//! let generator = Generator::new(pool, Arc::new(TemplateCache::new("templates")), 2);
//! let request = RenderRequest::new("goal", &card, Dimensions::default())?;
//! let png = generator.generate(&request).await?;
//! ```

/// Package version from Cargo.toml
pub const PKG_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Git commit hash (8 chars) with optional "-dirty" suffix
pub const BUILD_VERSION: &str = env!("BUILD_VERSION");

/// Full version string: "0.1.0 (abc12345)" or "0.1.0 (abc12345-dirty)"
pub const VERSION: &str = concat!(env!("CARGO_PKG_VERSION"), " (", env!("BUILD_VERSION"), ")");

pub mod card;
pub mod config;
pub mod engine;
pub mod generator;
pub mod health;
pub mod lifecycle;
pub mod logging;
pub mod lookup;
pub mod observability;
pub mod pool;
pub mod server;
pub mod service;
pub mod storage;
pub mod template;

// Re-exports for convenience
pub use config::Config;
pub use generator::{GenerateError, Generator, RenderRequest};
pub use pool::{PoolError, WorkerPool};
