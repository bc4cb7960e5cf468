//! Prometheus metrics registry for the air-quality tracker.
//!
//! [`AppMetrics`] owns all registered metrics and the [`Registry`] they
//! belong to. Construct it once at startup, wrap in `Arc`, and pass it
//! to the scheduler and the cache handle.
//!
//! Exposed at `GET /metrics` in Prometheus text exposition format
//! (`text/plain; version=0.0.4`).

use prometheus::{Counter, Gauge, Histogram, HistogramOpts, Opts, Registry};

use crate::ingest::types::CycleSummary;

/// All application-level Prometheus metrics.
pub struct AppMetrics {
    /// Ingestion cycles that produced a summary.
    pub cycles_total: Counter,
    /// Ingestion cycles aborted before any work (configuration or store failure).
    pub cycle_errors_total: Counter,
    /// Locations processed successfully, across all cycles.
    pub locations_succeeded_total: Counter,
    /// Locations that failed, across all cycles.
    pub locations_failed_total: Counter,
    /// Alerts created, across all cycles.
    pub alerts_created_total: Counter,
    /// Alerts raised by the most recent cycle.
    pub active_alerts: Gauge,
    /// Wall-clock duration of each cycle in seconds.
    pub cycle_duration: Histogram,
    pub cache_hits_total: Counter,
    pub cache_misses_total: Counter,
    /// The registry that owns all of the above metrics.
    pub registry: Registry,
}

impl AppMetrics {
    /// Create and register all metrics. Returns an error if any metric
    /// name is invalid or duplicated.
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let cycles_total = Counter::with_opts(Opts::new(
            "air_quality_tracker_cycles_total",
            "Completed ingestion cycles",
        ))?;

        let cycle_errors_total = Counter::with_opts(Opts::new(
            "air_quality_tracker_cycle_errors_total",
            "Ingestion cycles aborted before processing locations",
        ))?;

        let locations_succeeded_total = Counter::with_opts(Opts::new(
            "air_quality_tracker_locations_succeeded_total",
            "Locations ingested successfully",
        ))?;

        let locations_failed_total = Counter::with_opts(Opts::new(
            "air_quality_tracker_locations_failed_total",
            "Locations that failed ingestion",
        ))?;

        let alerts_created_total = Counter::with_opts(Opts::new(
            "air_quality_tracker_alerts_created_total",
            "Alerts created by ingestion cycles",
        ))?;

        let active_alerts = Gauge::with_opts(Opts::new(
            "air_quality_tracker_active_alerts",
            "Alerts raised by the latest ingestion cycle",
        ))?;

        let cycle_duration = Histogram::with_opts(
            HistogramOpts::new(
                "air_quality_tracker_cycle_duration_seconds",
                "Ingestion cycle duration in seconds",
            )
            .buckets(vec![1.0, 5.0, 15.0, 30.0, 60.0, 120.0, 300.0, 600.0]),
        )?;

        let cache_hits_total = Counter::with_opts(Opts::new(
            "air_quality_tracker_cache_hits_total",
            "Cache lookups that returned a value",
        ))?;

        let cache_misses_total = Counter::with_opts(Opts::new(
            "air_quality_tracker_cache_misses_total",
            "Cache lookups that missed, errored or were disabled",
        ))?;

        registry.register(Box::new(cycles_total.clone()))?;
        registry.register(Box::new(cycle_errors_total.clone()))?;
        registry.register(Box::new(locations_succeeded_total.clone()))?;
        registry.register(Box::new(locations_failed_total.clone()))?;
        registry.register(Box::new(alerts_created_total.clone()))?;
        registry.register(Box::new(active_alerts.clone()))?;
        registry.register(Box::new(cycle_duration.clone()))?;
        registry.register(Box::new(cache_hits_total.clone()))?;
        registry.register(Box::new(cache_misses_total.clone()))?;

        Ok(Self {
            cycles_total,
            cycle_errors_total,
            locations_succeeded_total,
            locations_failed_total,
            alerts_created_total,
            active_alerts,
            cycle_duration,
            cache_hits_total,
            cache_misses_total,
            registry,
        })
    }

    /// Fold a finished cycle into the counters.
    pub fn record_cycle(&self, summary: &CycleSummary, elapsed_seconds: f64) {
        self.cycles_total.inc();
        self.locations_succeeded_total.inc_by(summary.success as f64);
        self.locations_failed_total.inc_by(summary.failed as f64);
        self.alerts_created_total.inc_by(summary.alerts as f64);
        self.active_alerts.set(summary.alerts as f64);
        self.cycle_duration.observe(elapsed_seconds);
    }

    /// Render all metrics as Prometheus text format (for the `/metrics` endpoint).
    pub fn render(&self) -> Result<String, prometheus::Error> {
        use prometheus::Encoder;
        let encoder = prometheus::TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buf = Vec::new();
        encoder.encode(&metric_families, &mut buf)?;
        Ok(String::from_utf8(buf).unwrap_or_default())
    }
}
