//! Monitoring for the dispatch pipeline
//!
//! Provides observability through:
//! - Prometheus-style metrics via the `metrics` facade
//! - In-process counters for health endpoints
//! - Tracing subscriber presets

pub mod collector;
pub mod tracing_setup;

use metrics::{describe_counter, describe_histogram, Unit};
use std::time::Duration;

pub use collector::{DispatchStats, StatsSnapshot};
pub use tracing_setup::{init_tracing, init_tracing_with_config, TracingConfig};

/// Dispatches by terminal outcome
pub const DISPATCH_TOTAL: &str = "srf_dispatch_total";
/// Dispatch latency, from resolution to normalized response
pub const DISPATCH_LATENCY: &str = "srf_dispatch_latency_seconds";
/// Requests turned away by a saturated worker pool
pub const BLOCKING_SHED_TOTAL: &str = "srf_blocking_shed_total";

/// Register metric descriptions with the installed recorder.
///
/// Descriptions sent before a recorder is installed are dropped, so call
/// this after installing one.
pub fn register_metrics() {
    describe_counter!(
        DISPATCH_TOTAL,
        Unit::Count,
        "Dispatches by endpoint and outcome"
    );
    describe_histogram!(
        DISPATCH_LATENCY,
        Unit::Seconds,
        "Time spent dispatching one request"
    );
    describe_counter!(
        BLOCKING_SHED_TOTAL,
        Unit::Count,
        "Blocking operations rejected for lack of a worker slot"
    );
}

/// Record one finished dispatch
pub fn record_dispatch(endpoint: &str, outcome: &'static str, latency: Duration) {
    metrics::counter!(DISPATCH_TOTAL, 1, "endpoint" => endpoint.to_string(), "outcome" => outcome);
    metrics::histogram!(DISPATCH_LATENCY, latency.as_secs_f64(), "endpoint" => endpoint.to_string());
}

/// Record a request shed by the worker pool
pub fn record_shed() {
    metrics::counter!(BLOCKING_SHED_TOTAL, 1);
}
