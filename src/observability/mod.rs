//! Observability module for metrics.
//!
//! Logging lives in [`crate::logging`]; this module holds the Prometheus
//! registry exported by the internal server.
//!
//! # Usage
//!
//! ```rust,ignore
//! use goal_renderer::observability::Metrics;
//!
//! let metrics = Metrics::new()?;
//! metrics.record_render_attempt("success", 1.2);
//! println!("{}", metrics.export());
//! ```

pub mod metrics;

// Re-exports
pub use metrics::Metrics;
