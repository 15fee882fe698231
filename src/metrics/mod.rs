//! Prometheus metrics for the indexing engine
//!
//! Tracks discovery syncs, retry runs, channel submissions, inspection
//! passes and the summary gauges dashboards scrape.
//!
//! # Usage
//!
//! Call `init_metrics()` at application startup to register all metrics.
//! If initialization fails, metrics operations become no-ops. Cron-style
//! deployments can dump the registry with `write_textfile()` instead of
//! running a scrape endpoint.

use prometheus::{
    register_counter_vec, register_gauge_vec, register_histogram_vec, CounterVec, Encoder,
    GaugeVec, HistogramVec, TextEncoder,
};
use std::path::Path;
use std::sync::OnceLock;

use crate::summary::IndexingSummary;

// ============================================================================
// Metrics Storage
// ============================================================================

/// Container for engine operation metrics
struct EngineMetrics {
    sync_runs: CounterVec,
    records_created: CounterVec,
    retry_runs: CounterVec,
    retry_duration: HistogramVec,
    urls_submitted: CounterVec,
    submission_errors: CounterVec,
    budget_exhausted: CounterVec,
    inspections: CounterVec,
    newly_indexed: CounterVec,
}

/// Container for summary gauges
struct SummaryMetrics {
    buckets: GaugeVec,
    tracking_status: GaugeVec,
    quota_remaining: GaugeVec,
    blockers: GaugeVec,
    avg_days_to_index: GaugeVec,
}

/// Global storage for engine metrics
static ENGINE_METRICS: OnceLock<EngineMetrics> = OnceLock::new();

/// Global storage for summary metrics
static SUMMARY_METRICS: OnceLock<SummaryMetrics> = OnceLock::new();

/// Flag to track if initialization was attempted
static METRICS_INIT_ATTEMPTED: OnceLock<bool> = OnceLock::new();

// ============================================================================
// Initialization
// ============================================================================

/// Initialize all Prometheus metrics
///
/// This function should be called once at application startup.
/// If metric registration fails, errors are logged and subsequent
/// metric operations become no-ops.
pub fn init_metrics() -> Result<(), Box<dyn std::error::Error>> {
    // Prevent double initialization
    if METRICS_INIT_ATTEMPTED.get().is_some() {
        return Ok(());
    }
    METRICS_INIT_ATTEMPTED.set(true).ok();

    let engine = EngineMetrics {
        sync_runs: register_counter_vec!(
            "indexwatch_sync_runs_total",
            "Total discovery sync runs",
            &["site"]
        )?,
        records_created: register_counter_vec!(
            "indexwatch_records_created_total",
            "Total tracking records created by discovery",
            &["site"]
        )?,
        retry_runs: register_counter_vec!(
            "indexwatch_retry_runs_total",
            "Total retry runs",
            &["site"]
        )?,
        retry_duration: register_histogram_vec!(
            "indexwatch_retry_run_duration_seconds",
            "Wall-clock duration of one retry run in seconds",
            &["site"],
            vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0]
        )?,
        urls_submitted: register_counter_vec!(
            "indexwatch_urls_submitted_total",
            "Total URLs submitted per channel",
            &["site", "channel"]
        )?,
        submission_errors: register_counter_vec!(
            "indexwatch_submission_errors_total",
            "Total submission failures",
            &["site"]
        )?,
        budget_exhausted: register_counter_vec!(
            "indexwatch_retry_budget_exhausted_total",
            "Retry runs that hit their wall-clock budget",
            &["site"]
        )?,
        inspections: register_counter_vec!(
            "indexwatch_inspections_total",
            "Total URL inspections applied to the store",
            &["site"]
        )?,
        newly_indexed: register_counter_vec!(
            "indexwatch_newly_indexed_total",
            "Records first confirmed indexed by inspection",
            &["site"]
        )?,
    };

    let summary = SummaryMetrics {
        buckets: register_gauge_vec!(
            "indexwatch_summary_bucket",
            "Per-bucket record counts from the latest summary",
            &["site", "bucket"]
        )?,
        tracking_status: register_gauge_vec!(
            "indexwatch_tracking_status",
            "Raw stored status counts",
            &["site", "status"]
        )?,
        quota_remaining: register_gauge_vec!(
            "indexwatch_push_quota_remaining",
            "Push submissions left in the current local day",
            &["site"]
        )?,
        blockers: register_gauge_vec!(
            "indexwatch_blockers",
            "Active blockers by severity",
            &["site", "severity"]
        )?,
        avg_days_to_index: register_gauge_vec!(
            "indexwatch_avg_days_to_index",
            "Average days from first submission to indexed",
            &["site"]
        )?,
    };

    ENGINE_METRICS
        .set(engine)
        .map_err(|_| "Engine metrics already initialized")?;
    SUMMARY_METRICS
        .set(summary)
        .map_err(|_| "Summary metrics already initialized")?;

    tracing::info!("Prometheus metrics initialized successfully");
    Ok(())
}

/// Check if metrics have been initialized
pub fn metrics_initialized() -> bool {
    ENGINE_METRICS.get().is_some() && SUMMARY_METRICS.get().is_some()
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Encode all metrics to Prometheus text format
pub fn encode_metrics() -> Result<String, Box<dyn std::error::Error>> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8(buffer)?)
}

/// Dump the registry to a textfile for cron-driven scrapes.
///
/// Written via a sibling temp file and rename so a collector never reads a
/// half-written file.
pub fn write_textfile(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let text = encode_metrics()?;
    let tmp = path.with_extension("tmp");
    std::fs::write(&tmp, text)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}

/// Record one discovery sync run
pub fn record_sync_run(site: &str, created: usize) {
    let Some(m) = ENGINE_METRICS.get() else {
        return;
    };

    m.sync_runs.with_label_values(&[site]).inc();
    if created > 0 {
        m.records_created
            .with_label_values(&[site])
            .inc_by(created as f64);
    }
}

/// Record one retry run's result counts
pub fn record_retry_run(site: &str, succeeded: usize, errors: usize, budget_exhausted: bool) {
    let Some(m) = ENGINE_METRICS.get() else {
        return;
    };

    m.retry_runs.with_label_values(&[site]).inc();
    if succeeded > 0 {
        m.urls_submitted
            .with_label_values(&[site, "push"])
            .inc_by(succeeded as f64);
    }
    if errors > 0 {
        m.submission_errors
            .with_label_values(&[site])
            .inc_by(errors as f64);
    }
    if budget_exhausted {
        m.budget_exhausted.with_label_values(&[site]).inc();
    }
}

/// Record a single immediate submission
pub fn record_submission(site: &str, channel: &str, accepted: bool) {
    let Some(m) = ENGINE_METRICS.get() else {
        return;
    };

    if accepted {
        m.urls_submitted.with_label_values(&[site, channel]).inc();
    } else {
        m.submission_errors.with_label_values(&[site]).inc();
    }
}

/// Record one inspection refresh pass
pub fn record_inspection_pass(site: &str, inspected: usize, newly_indexed: usize) {
    let Some(m) = ENGINE_METRICS.get() else {
        return;
    };

    if inspected > 0 {
        m.inspections
            .with_label_values(&[site])
            .inc_by(inspected as f64);
    }
    if newly_indexed > 0 {
        m.newly_indexed
            .with_label_values(&[site])
            .inc_by(newly_indexed as f64);
    }
}

/// Histogram timer guard that records duration on drop
pub struct MetricsTimer {
    timer: Option<prometheus::HistogramTimer>,
}

impl MetricsTimer {
    fn new(timer: prometheus::HistogramTimer) -> Self {
        Self { timer: Some(timer) }
    }

    /// Create a no-op timer when metrics are not initialized
    fn noop() -> Self {
        Self { timer: None }
    }
}

impl Drop for MetricsTimer {
    fn drop(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.stop_and_record();
        }
    }
}

/// Start a retry-run timer (records duration on drop)
pub fn start_retry_timer(site: &str) -> MetricsTimer {
    match ENGINE_METRICS.get() {
        Some(m) => MetricsTimer::new(m.retry_duration.with_label_values(&[site]).start_timer()),
        None => MetricsTimer::noop(),
    }
}

/// Export the latest summary as gauges
pub fn set_summary_gauges(summary: &IndexingSummary) {
    let Some(m) = SUMMARY_METRICS.get() else {
        return;
    };

    let site = summary.site_id.as_str();
    let buckets: [(&str, u64); 7] = [
        ("indexed", summary.indexed),
        ("submitted", summary.submitted),
        ("discovered", summary.discovered),
        ("never_submitted", summary.never_submitted),
        ("errors", summary.errors),
        ("deindexed", summary.deindexed),
        ("chronic_failures", summary.chronic_failures),
    ];
    for (bucket, value) in buckets {
        m.buckets
            .with_label_values(&[site, bucket])
            .set(value as f64);
    }

    m.quota_remaining
        .with_label_values(&[site])
        .set(summary.quota.remaining as f64);

    for severity in ["critical", "warning", "info"] {
        let count = summary
            .blockers
            .iter()
            .filter(|b| b.severity.as_str() == severity)
            .count();
        m.blockers
            .with_label_values(&[site, severity])
            .set(count as f64);
    }

    if let Some(days) = summary.avg_days_to_index {
        m.avg_days_to_index.with_label_values(&[site]).set(days);
    }
}

/// Export raw stored status counts, summed across inspection states
pub fn set_tracking_status_counts(site: &str, counts: &[(String, Option<String>, u64)]) {
    let Some(m) = SUMMARY_METRICS.get() else {
        return;
    };

    let mut by_status: std::collections::HashMap<&str, u64> = std::collections::HashMap::new();
    for (status, _state, count) in counts {
        *by_status.entry(status.as_str()).or_default() += count;
    }

    for (status, count) in by_status {
        m.tracking_status
            .with_label_values(&[site, status])
            .set(count as f64);
    }
}

// ============================================================================
// Tests
// ============================================================================
