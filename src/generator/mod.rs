//! Generation pipeline.
//!
//! Turns one [`RenderRequest`] into one PNG with bounded retries:
//!
//! ```text
//! initialize pool (lazy) ─▶ load template ─▶ inject payload
//!                                                  │
//!        ┌─────────────────────────────────────────┘
//!        ▼
//!   ┌─ acquire ─▶ render ─▶ release ─┐
//!   │                                 │ ok ──▶ PNG
//!   └──────── attempts left ◀─────────┘ err
//! ```
//!
//! The worker is released after every attempt, success or failure, so dead
//! workers are detected and replaced by the pool on one code path.

mod request;

pub use request::{Dimensions, RenderRequest, DEFAULT_SIZE};

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;
use tracing::{debug, info, warn};

use crate::engine::{RenderError, RenderPage, WorkerLauncher};
use crate::observability::Metrics;
use crate::pool::{PoolError, WorkerPool};
use crate::template::{self, TemplateCache, TemplateError};

/// Cause of the last failed attempt.
#[derive(Debug)]
pub enum FailureCause {
    /// The engine failed to render.
    Render(RenderError),
    /// The pool could not provide a worker.
    Pool(PoolError),
}

impl fmt::Display for FailureCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureCause::Render(e) => write!(f, "{}", e),
            FailureCause::Pool(e) => write!(f, "{}", e),
        }
    }
}

/// Error type for a generation.
///
/// Worker-level failures that were recovered by a retry never show up here.
#[derive(Debug)]
pub enum GenerateError {
    /// The template could not be loaded or filled. Not retried.
    Template(TemplateError),
    /// Every attempt failed, or the pool stopped serving workers.
    RenderFailed { attempts: u32, cause: FailureCause },
}

impl GenerateError {
    /// Returns true if the request failed on its template.
    pub fn is_template(&self) -> bool {
        matches!(self, GenerateError::Template(_))
    }

    /// Number of render attempts made before giving up.
    pub fn attempts(&self) -> u32 {
        match self {
            GenerateError::Template(_) => 0,
            GenerateError::RenderFailed { attempts, .. } => *attempts,
        }
    }

    /// Label used for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            GenerateError::Template(_) => "template_error",
            GenerateError::RenderFailed { .. } => "render_failed",
        }
    }
}

impl fmt::Display for GenerateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GenerateError::Template(e) => write!(f, "template load failure: {}", e),
            GenerateError::RenderFailed { attempts, cause } => {
                write!(f, "render failed after {} attempt(s): {}", attempts, cause)
            }
        }
    }
}

impl std::error::Error for GenerateError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            GenerateError::Template(e) => Some(e),
            GenerateError::RenderFailed { cause, .. } => match cause {
                FailureCause::Render(e) => Some(e),
                FailureCause::Pool(e) => Some(e),
            },
        }
    }
}

impl From<TemplateError> for GenerateError {
    fn from(e: TemplateError) -> Self {
        GenerateError::Template(e)
    }
}

/// Renders requests on a shared [`WorkerPool`].
pub struct Generator<L: WorkerLauncher> {
    pool: WorkerPool<L>,
    templates: Arc<TemplateCache>,
    max_retries: u32,
    metrics: Option<Arc<Metrics>>,
}

impl<L: WorkerLauncher> Clone for Generator<L> {
    fn clone(&self) -> Self {
        Self {
            pool: self.pool.clone(),
            templates: Arc::clone(&self.templates),
            max_retries: self.max_retries,
            metrics: self.metrics.clone(),
        }
    }
}

impl<L: WorkerLauncher> Generator<L> {
    /// Create a generator making at most `max_retries` attempts per request
    /// (at least one).
    pub fn new(pool: WorkerPool<L>, templates: Arc<TemplateCache>, max_retries: u32) -> Self {
        Self {
            pool,
            templates,
            max_retries: max_retries.max(1),
            metrics: None,
        }
    }

    /// Record attempt and generation metrics.
    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// The pool this generator borrows from.
    pub fn pool(&self) -> &WorkerPool<L> {
        &self.pool
    }

    pub fn templates(&self) -> &Arc<TemplateCache> {
        &self.templates
    }

    #[inline]
    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Render one request to PNG.
    pub async fn generate(&self, request: &RenderRequest) -> Result<Bytes, GenerateError> {
        let start = Instant::now();
        let result = self.run(request).await;

        if let Some(ref metrics) = self.metrics {
            let label = match &result {
                Ok(_) => "success",
                Err(e) => e.kind(),
            };
            metrics.record_generation(label, start.elapsed().as_secs_f64());
        }

        match &result {
            Ok(png) => info!(
                template = request.template(),
                bytes = png.len(),
                elapsed_ms = start.elapsed().as_millis() as u64,
                "image generated"
            ),
            Err(e) => warn!(
                template = request.template(),
                attempts = e.attempts(),
                error = %e,
                "image generation failed"
            ),
        }

        result
    }

    async fn run(&self, request: &RenderRequest) -> Result<Bytes, GenerateError> {
        if let Err(e) = self.pool.initialize().await {
            return Err(GenerateError::RenderFailed {
                attempts: 0,
                cause: FailureCause::Pool(e),
            });
        }

        let markup = self.templates.load(request.template()).await?;
        let html = template::inject(request.template(), &markup, request.payload())?;
        let page = RenderPage::new(html, request.dimensions());

        let mut attempt = 0;
        loop {
            attempt += 1;

            let mut worker = match self.pool.acquire().await {
                Ok(worker) => worker,
                Err(e) => {
                    return Err(GenerateError::RenderFailed {
                        attempts: attempt - 1,
                        cause: FailureCause::Pool(e),
                    })
                }
            };
            let worker_id = worker.id();

            let attempt_start = Instant::now();
            let result = worker.render(&page).await;
            let elapsed = attempt_start.elapsed();

            // Always hand the worker back; the pool re-checks liveness
            worker.release().await;

            if let Some(ref metrics) = self.metrics {
                let outcome = match &result {
                    Ok(_) => "success",
                    Err(e) => e.kind(),
                };
                metrics.record_render_attempt(outcome, elapsed.as_secs_f64());
            }

            match result {
                Ok(png) => {
                    debug!(
                        worker = worker_id,
                        attempt,
                        elapsed_ms = elapsed.as_millis() as u64,
                        "render attempt succeeded"
                    );
                    return Ok(png);
                }
                Err(e) if attempt >= self.max_retries => {
                    warn!(worker = worker_id, attempt, error = %e, "render attempt failed, giving up");
                    return Err(GenerateError::RenderFailed {
                        attempts: attempt,
                        cause: FailureCause::Render(e),
                    });
                }
                Err(e) => {
                    warn!(
                        worker = worker_id,
                        attempt,
                        max_retries = self.max_retries,
                        error = %e,
                        "render attempt failed, retrying"
                    );
                }
            }
        }
    }
}
