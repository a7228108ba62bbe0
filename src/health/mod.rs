//! Health checks for Kubernetes probes, derived from worker pool state.
//!
//! - **Liveness**: can the process still render? (pool running, workers left)
//! - **Readiness**: should work be routed here? (warm, not draining)
//! - **Startup**: has the pool reached capacity? (wait before other probes)
//!
//! # Kubernetes Integration
//!
//! ```yaml
//! livenessProbe:
//!   httpGet:
//!     path: /health/live
//!     port: 9090
//!   initialDelaySeconds: 5
//!   periodSeconds: 10
//!
//! readinessProbe:
//!   httpGet:
//!     path: /health/ready
//!     port: 9090
//!   initialDelaySeconds: 5
//!   periodSeconds: 5
//!
//! startupProbe:
//!   httpGet:
//!     path: /health/startup
//!     port: 9090
//!   failureThreshold: 30
//!   periodSeconds: 2
//! ```

mod checker;
mod status;

pub use checker::HealthChecker;
pub use status::{CheckResult, HealthDetails, HealthStatus, ProbeType};
