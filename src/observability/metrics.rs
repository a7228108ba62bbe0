//! Prometheus metrics for goal_renderer.
//!
//! Implements RED methodology metrics (Rate, Errors, Duration) for render
//! attempts and whole generations, plus pool and template cache gauges.

use prometheus::{
    CounterVec, Encoder, Gauge, GaugeVec, Histogram, HistogramOpts, Opts, Registry, TextEncoder,
};
use tracing::warn;

use crate::pool::PoolStats;

/// Prometheus metrics registry with all application metrics.
///
/// Follows RED methodology:
/// - **R**ate: generations and render attempts per second
/// - **E**rrors: failed attempts by kind, failed generations
/// - **D**uration: latency distribution (histograms)
pub struct Metrics {
    registry: Registry,

    // === Render Metrics ===
    /// Render attempts by outcome (success, timeout, fault, closed)
    pub render_attempts_total: CounterVec,

    /// Single render attempt duration in seconds
    pub render_duration_seconds: Histogram,

    /// Generations by result (success, render_failed, template_error)
    pub generations_total: CounterVec,

    /// End-to-end generation duration in seconds (includes acquire wait)
    pub generation_duration_seconds: Histogram,

    // === Pool Metrics ===
    /// Workers by state (capacity, tracked, idle, borrowed)
    pub pool_workers: GaugeVec,

    /// Successful engine launches
    pub pool_launches: Gauge,

    /// Dead workers replaced
    pub pool_replacements: Gauge,

    /// Dead workers that could not be replaced
    pub pool_replacement_failures: Gauge,

    // === Template Cache Metrics ===
    /// Template cache hits
    pub template_cache_hits: Gauge,

    /// Template cache misses
    pub template_cache_misses: Gauge,

    // === Storage Metrics ===
    /// Uploads by result (success, error)
    pub uploads_total: CounterVec,

    // === System Metrics ===
    /// Process uptime in seconds
    pub process_uptime_seconds: Gauge,
}

impl Metrics {
    /// Create a new metrics registry with all metrics.
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        // Browser render buckets (in seconds)
        let render_buckets = vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.0, 3.0, 5.0, 10.0, 20.0, 30.0];

        let render_attempts_total = CounterVec::new(
            Opts::new(
                "goal_renderer_render_attempts_total",
                "Total render attempts",
            ),
            &["outcome"],
        )?;
        registry.register(Box::new(render_attempts_total.clone()))?;

        let render_duration_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "goal_renderer_render_duration_seconds",
                "Render attempt duration in seconds",
            )
            .buckets(render_buckets.clone()),
        )?;
        registry.register(Box::new(render_duration_seconds.clone()))?;

        let generations_total = CounterVec::new(
            Opts::new("goal_renderer_generations_total", "Total generations"),
            &["result"],
        )?;
        registry.register(Box::new(generations_total.clone()))?;

        let generation_duration_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "goal_renderer_generation_duration_seconds",
                "Generation duration in seconds",
            )
            .buckets(render_buckets),
        )?;
        registry.register(Box::new(generation_duration_seconds.clone()))?;

        // Pool metrics
        let pool_workers = GaugeVec::new(
            Opts::new("goal_renderer_pool_workers", "Pool workers by state"),
            &["state"],
        )?;
        registry.register(Box::new(pool_workers.clone()))?;

        let pool_launches = Gauge::new("goal_renderer_pool_launches", "Engine launches")?;
        registry.register(Box::new(pool_launches.clone()))?;

        let pool_replacements =
            Gauge::new("goal_renderer_pool_replacements", "Dead workers replaced")?;
        registry.register(Box::new(pool_replacements.clone()))?;

        let pool_replacement_failures = Gauge::new(
            "goal_renderer_pool_replacement_failures",
            "Dead workers that could not be replaced",
        )?;
        registry.register(Box::new(pool_replacement_failures.clone()))?;

        // Template cache metrics
        let template_cache_hits =
            Gauge::new("goal_renderer_template_cache_hits", "Template cache hits")?;
        registry.register(Box::new(template_cache_hits.clone()))?;

        let template_cache_misses = Gauge::new(
            "goal_renderer_template_cache_misses",
            "Template cache misses",
        )?;
        registry.register(Box::new(template_cache_misses.clone()))?;

        let uploads_total = CounterVec::new(
            Opts::new("goal_renderer_uploads_total", "Total image uploads"),
            &["result"],
        )?;
        registry.register(Box::new(uploads_total.clone()))?;

        let process_uptime_seconds = Gauge::new(
            "goal_renderer_process_uptime_seconds",
            "Process uptime in seconds",
        )?;
        registry.register(Box::new(process_uptime_seconds.clone()))?;

        Ok(Self {
            registry,
            render_attempts_total,
            render_duration_seconds,
            generations_total,
            generation_duration_seconds,
            pool_workers,
            pool_launches,
            pool_replacements,
            pool_replacement_failures,
            template_cache_hits,
            template_cache_misses,
            uploads_total,
            process_uptime_seconds,
        })
    }

    /// Record one render attempt.
    pub fn record_render_attempt(&self, outcome: &str, duration_secs: f64) {
        self.render_attempts_total
            .with_label_values(&[outcome])
            .inc();
        self.render_duration_seconds.observe(duration_secs);
    }

    /// Record one finished generation.
    pub fn record_generation(&self, result: &str, duration_secs: f64) {
        self.generations_total.with_label_values(&[result]).inc();
        self.generation_duration_seconds.observe(duration_secs);
    }

    /// Record one upload.
    pub fn record_upload(&self, success: bool) {
        let result = if success { "success" } else { "error" };
        self.uploads_total.with_label_values(&[result]).inc();
    }

    /// Update pool gauges from a stats snapshot.
    pub fn update_pool(&self, stats: &PoolStats) {
        for (state, value) in [
            ("capacity", stats.capacity),
            ("tracked", stats.tracked),
            ("idle", stats.idle),
            ("borrowed", stats.borrowed),
        ] {
            self.pool_workers
                .with_label_values(&[state])
                .set(value as f64);
        }
        self.pool_launches.set(stats.launches as f64);
        self.pool_replacements.set(stats.replacements as f64);
        self.pool_replacement_failures
            .set(stats.replacement_failures as f64);
    }

    /// Update template cache gauges.
    pub fn update_template_cache(&self, hits: u64, misses: u64) {
        self.template_cache_hits.set(hits as f64);
        self.template_cache_misses.set(misses as f64);
    }

    /// Update process uptime.
    pub fn update_uptime(&self, seconds: f64) {
        self.process_uptime_seconds.set(seconds);
    }

    /// Export metrics in Prometheus text format.
    pub fn export(&self) -> String {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
            warn!(error = %e, "failed to encode metrics");
        }
        String::from_utf8_lossy(&buffer).into_owned()
    }

    /// Get the Prometheus registry (for custom metrics).
    pub fn registry(&self) -> &Registry {
        &self.registry
    }
}
