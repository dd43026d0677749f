//! Prometheus metrics for encoder invocations.
//!
//! Nothing is registered automatically; callers add [`all_metrics`] to
//! their own registry.

use once_cell::sync::Lazy;
use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts};
use std::time::Duration;

// =============================================================================
// Invocation Metrics
// =============================================================================

/// Invocations total by kind and result.
pub static INVOCATIONS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "encodex_invocations_total",
            "Total encoder invocations",
        ),
        &["kind", "result"], // kind: "codecs", "formats", "probe", "encode"
    )
    .unwrap()
});

/// Invocation duration in seconds.
pub static INVOCATION_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "encodex_invocation_duration_seconds",
            "Wall-clock duration of encoder invocations",
        )
        .buckets(vec![0.05, 0.1, 0.5, 1.0, 5.0, 30.0, 60.0, 300.0, 900.0, 3600.0]),
        &["kind"],
    )
    .unwrap()
});

// =============================================================================
// Process Metrics
// =============================================================================

/// Encoder processes that had to be killed.
pub static PROCESSES_KILLED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "encodex_processes_killed_total",
        "Total encoder processes terminated before they exited",
    )
    .unwrap()
});

// =============================================================================
// Helper functions
// =============================================================================

/// Records one finished invocation. `result` is "success" or an error kind.
pub fn record_invocation(kind: &str, result: &str, elapsed: Duration) {
    INVOCATIONS.with_label_values(&[kind, result]).inc();
    INVOCATION_DURATION
        .with_label_values(&[kind])
        .observe(elapsed.as_secs_f64());
}

/// Get all metrics for registration in a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        Box::new(INVOCATIONS.clone()),
        Box::new(INVOCATION_DURATION.clone()),
        Box::new(PROCESSES_KILLED.clone()),
    ]
}
