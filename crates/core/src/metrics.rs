//! Prometheus metrics for the search engine.
//!
//! Metrics are statics so any module can record without threading a
//! registry through; [`register_all`] adds them to a registry for export.

use once_cell::sync::Lazy;
use prometheus::{HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry};

// =============================================================================
// Search Metrics
// =============================================================================

/// Provider searches by outcome.
pub static PROVIDER_SEARCHES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "hunter_provider_searches_total",
            "Total provider searches",
        ),
        &["provider", "outcome"], // outcome: "results", "empty", "error", "timeout"
    )
    .unwrap()
});

/// Provider search duration.
pub static PROVIDER_SEARCH_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "hunter_provider_search_duration_seconds",
            "Duration of one provider worker",
        )
        .buckets(vec![0.1, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0]),
        &["provider"],
    )
    .unwrap()
});

/// Candidates rejected during ranking.
pub static CANDIDATES_REJECTED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "hunter_candidates_rejected_total",
            "Total candidates rejected while picking a winner",
        ),
        &["reason"], // reason: "release_group", "quality", "wordlist", "failed", "scene", "torrent"
    )
    .unwrap()
});

/// Scene reputation verdicts.
pub static SCENE_CHECKS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("hunter_scene_checks_total", "Total scene reputation checks"),
        &["verdict"],
    )
    .unwrap()
});

// =============================================================================
// Snatch Metrics
// =============================================================================

/// Snatch attempts by result type and outcome.
pub static SNATCHES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("hunter_snatches_total", "Total snatch attempts"),
        &["result_type", "outcome"], // outcome: "success", "failure"
    )
    .unwrap()
});

// =============================================================================
// External Service Metrics
// =============================================================================

/// External service request duration.
pub static EXTERNAL_SERVICE_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "hunter_external_service_duration_seconds",
            "Duration of external service calls",
        )
        .buckets(vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]),
        &["service", "operation"],
    )
    .unwrap()
});

/// External service requests total.
pub static EXTERNAL_SERVICE_REQUESTS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "hunter_external_service_requests_total",
            "Total external service requests",
        ),
        &["service", "operation", "status"], // status: "success", "error"
    )
    .unwrap()
});

// =============================================================================
// Helper functions
// =============================================================================

/// Get all metrics for registration in a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        Box::new(PROVIDER_SEARCHES.clone()),
        Box::new(PROVIDER_SEARCH_DURATION.clone()),
        Box::new(CANDIDATES_REJECTED.clone()),
        Box::new(SCENE_CHECKS.clone()),
        Box::new(SNATCHES.clone()),
        Box::new(EXTERNAL_SERVICE_DURATION.clone()),
        Box::new(EXTERNAL_SERVICE_REQUESTS.clone()),
    ]
}

/// Register every metric with `registry`.
pub fn register_all(registry: &Registry) -> prometheus::Result<()> {
    for metric in all_metrics() {
        registry.register(metric)?;
    }
    Ok(())
}
