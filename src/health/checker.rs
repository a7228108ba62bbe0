//! Health checker implementation.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use super::{CheckResult, HealthDetails, HealthStatus, ProbeType};
use crate::pool::PoolStats;

/// Health checker for Kubernetes probes.
///
/// Probe results are derived from a [`PoolStats`] snapshot taken by the
/// caller, so the checker itself holds no reference to the pool.
pub struct HealthChecker {
    /// Set once the pool is warm
    startup_complete: AtomicBool,
    /// Set when graceful shutdown begins
    draining: AtomicBool,
    start_time: Instant,
    engine: &'static str,
}

impl HealthChecker {
    pub fn new(engine: &'static str) -> Self {
        Self {
            startup_complete: AtomicBool::new(false),
            draining: AtomicBool::new(false),
            start_time: Instant::now(),
            engine,
        }
    }

    /// Mark startup as complete.
    pub fn mark_startup_complete(&self) {
        self.startup_complete.store(true, Ordering::SeqCst);
    }

    /// Mark the service as draining (readiness fails from now on).
    pub fn mark_draining(&self) {
        self.draining.store(true, Ordering::SeqCst);
    }

    pub fn is_startup_complete(&self) -> bool {
        self.startup_complete.load(Ordering::Relaxed)
    }

    /// Perform health check based on probe type.
    pub fn check(&self, probe: ProbeType, stats: &PoolStats) -> HealthStatus {
        match probe {
            ProbeType::Liveness => self.check_liveness(stats),
            ProbeType::Readiness => self.check_readiness(stats),
            ProbeType::Startup => self.check_startup(stats),
        }
    }

    /// Liveness probe: can this process still render at all?
    ///
    /// Checks:
    /// - Pool not shut down
    /// - At least one worker tracked (capacity has not degraded to zero)
    fn check_liveness(&self, stats: &PoolStats) -> HealthStatus {
        let pool_check = if stats.shutdown {
            CheckResult::fail("pool_running", "Pool shut down")
        } else {
            CheckResult::pass("pool_running")
        };

        let workers_check = if !stats.initialized || stats.tracked > 0 {
            CheckResult::pass("workers_alive")
        } else {
            CheckResult::fail(
                "workers_alive",
                format!("0/{} workers left after failed replacements", stats.capacity),
            )
        };

        let all_pass = pool_check.is_pass() && workers_check.is_pass();
        let status = if all_pass {
            HealthStatus::healthy()
        } else {
            HealthStatus::unhealthy("Liveness check failed")
        };
        status.with_check(pool_check).with_check(workers_check)
    }

    /// Readiness probe: should new generations be routed here?
    ///
    /// Checks:
    /// - Startup complete and not draining
    /// - Pool capacity (warns when degraded or fully borrowed)
    fn check_readiness(&self, stats: &PoolStats) -> HealthStatus {
        if !self.startup_complete.load(Ordering::Relaxed) {
            return HealthStatus::not_ready("Startup not complete")
                .with_check(CheckResult::fail("startup_complete", "Startup in progress"));
        }
        if self.draining.load(Ordering::Relaxed) || stats.shutdown {
            return HealthStatus::not_ready("Shutting down")
                .with_check(CheckResult::fail("accepting_work", "Draining"));
        }
        if stats.tracked == 0 {
            return HealthStatus::not_ready("No workers available")
                .with_check(CheckResult::fail("pool_capacity", "0 workers tracked"));
        }

        let capacity_check = if stats.degraded_by() > 0 {
            CheckResult::warn(
                "pool_capacity",
                format!("degraded: {}/{} workers", stats.tracked, stats.capacity),
            )
        } else if stats.idle == 0 {
            CheckResult::warn(
                "pool_capacity",
                format!("all {} workers busy", stats.borrowed),
            )
        } else {
            CheckResult::pass("pool_capacity")
        };

        // Readiness passes with warnings; waiters just queue longer
        HealthStatus::healthy()
            .with_check(CheckResult::pass("startup_complete"))
            .with_check(capacity_check)
            .with_details(self.details(stats))
    }

    /// Startup probe: is the pool warm?
    fn check_startup(&self, stats: &PoolStats) -> HealthStatus {
        let pool_check = if stats.initialized {
            CheckResult::pass("pool_initialized")
        } else {
            CheckResult::pending("pool_initialized")
        };

        if stats.initialized && self.is_startup_complete() {
            HealthStatus::healthy()
                .with_check(pool_check)
                .with_details(self.details(stats))
        } else {
            HealthStatus::not_ready("Pool warming up").with_check(pool_check)
        }
    }

    fn details(&self, stats: &PoolStats) -> HealthDetails {
        HealthDetails {
            uptime_seconds: self.start_time.elapsed().as_secs(),
            version: env!("CARGO_PKG_VERSION"),
            engine: self.engine,
            capacity: stats.capacity,
            tracked: stats.tracked,
            idle: stats.idle,
            borrowed: stats.borrowed,
            replacement_failures: stats.replacement_failures,
        }
    }

    /// Get process uptime.
    pub fn uptime(&self) -> Duration {
        self.start_time.elapsed()
    }
}
