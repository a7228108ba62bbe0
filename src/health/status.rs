//! Health status types for Kubernetes probes.

use serde::Serialize;

/// Health check probe types (Kubernetes-compatible).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeType {
    /// Liveness probe: restart container if failed.
    Liveness,
    /// Readiness probe: remove from load balancer if failed.
    Readiness,
    /// Startup probe: wait for initialization.
    Startup,
}

impl std::fmt::Display for ProbeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Liveness => write!(f, "liveness"),
            Self::Readiness => write!(f, "readiness"),
            Self::Startup => write!(f, "startup"),
        }
    }
}

/// Health status response.
#[derive(Debug, Clone, Serialize)]
pub struct HealthStatus {
    /// Overall status: "healthy", "unhealthy", "not_ready"
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Individual check results
    pub checks: Vec<CheckResult>,
    /// Pool and process information
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<HealthDetails>,
}

impl HealthStatus {
    pub fn healthy() -> Self {
        Self {
            status: "healthy",
            message: None,
            checks: Vec::new(),
            details: None,
        }
    }

    pub fn unhealthy(message: impl Into<String>) -> Self {
        Self {
            status: "unhealthy",
            message: Some(message.into()),
            checks: Vec::new(),
            details: None,
        }
    }

    pub fn not_ready(message: impl Into<String>) -> Self {
        Self {
            status: "not_ready",
            message: Some(message.into()),
            checks: Vec::new(),
            details: None,
        }
    }

    pub fn with_check(mut self, check: CheckResult) -> Self {
        self.checks.push(check);
        self
    }

    pub fn with_details(mut self, details: HealthDetails) -> Self {
        self.details = Some(details);
        self
    }

    /// Returns true if status is healthy.
    pub fn is_healthy(&self) -> bool {
        self.status == "healthy"
    }
}

/// Individual health check result.
#[derive(Debug, Clone, Serialize)]
pub struct CheckResult {
    /// Check name (e.g., "pool_initialized", "workers_available")
    pub name: &'static str,
    /// Check status: "pass", "fail", "warn", "pending"
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl CheckResult {
    pub fn pass(name: &'static str) -> Self {
        Self {
            name,
            status: "pass",
            message: None,
        }
    }

    pub fn fail(name: &'static str, message: impl Into<String>) -> Self {
        Self {
            name,
            status: "fail",
            message: Some(message.into()),
        }
    }

    pub fn warn(name: &'static str, message: impl Into<String>) -> Self {
        Self {
            name,
            status: "warn",
            message: Some(message.into()),
        }
    }

    pub fn pending(name: &'static str) -> Self {
        Self {
            name,
            status: "pending",
            message: None,
        }
    }

    /// Returns true if check passed.
    pub fn is_pass(&self) -> bool {
        self.status == "pass"
    }

    /// Returns true if check failed.
    pub fn is_fail(&self) -> bool {
        self.status == "fail"
    }
}

/// Pool and process information included in health responses.
#[derive(Debug, Clone, Serialize)]
pub struct HealthDetails {
    pub uptime_seconds: u64,
    pub version: &'static str,
    /// Rendering engine name
    pub engine: &'static str,
    pub capacity: usize,
    pub tracked: usize,
    pub idle: usize,
    pub borrowed: usize,
    pub replacement_failures: u64,
}
