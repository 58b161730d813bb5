//! OpenTelemetry tracing integration for the server

use opentelemetry::KeyValue;
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::{
    runtime,
    trace::{self, RandomIdGenerator, Sampler},
    Resource,
};
use std::time::Duration;
use tracing_opentelemetry::OpenTelemetryLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

/// Initialize OpenTelemetry with OTLP exporter
pub fn init_telemetry(service_name: &str) -> anyhow::Result<opentelemetry_sdk::trace::Tracer> {
    // Get OTLP endpoint from environment or use default
    let endpoint = std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT")
        .unwrap_or_else(|_| "http://localhost:4317".to_string());

    // Configure resource attributes
    let resource = Resource::new(vec![
        KeyValue::new("service.name", service_name.to_string()),
        KeyValue::new("service.version", env!("CARGO_PKG_VERSION")),
    ]);

    // Configure OTLP exporter
    let exporter = opentelemetry_otlp::new_exporter()
        .tonic()
        .with_endpoint(endpoint)
        .with_timeout(Duration::from_secs(3));

    // Build the trace pipeline
    let tracer = opentelemetry_otlp::new_pipeline()
        .tracing()
        .with_exporter(exporter)
        .with_trace_config(
            trace::config()
                .with_sampler(get_sampler())
                .with_id_generator(RandomIdGenerator::default())
                .with_resource(resource),
        )
        .install_batch(runtime::Tokio)?;

    Ok(tracer)
}

/// Get sampler configuration from environment
fn get_sampler() -> Sampler {
    sampler_for(std::env::var("OTEL_TRACES_SAMPLER_ARG").ok().as_deref())
}

/// Map a sampling ratio to a sampler; missing or unparsable means always on
fn sampler_for(arg: Option<&str>) -> Sampler {
    let sample_rate = arg
        .and_then(|s| s.parse::<f64>().ok())
        .unwrap_or(1.0); // Default to 100% sampling

    if sample_rate >= 1.0 {
        Sampler::AlwaysOn
    } else if sample_rate <= 0.0 {
        Sampler::AlwaysOff
    } else {
        Sampler::TraceIdRatioBased(sample_rate)
    }
}

/// Initialize the complete tracing stack (console + OpenTelemetry)
pub fn init_tracing_stack(service_name: &str) -> anyhow::Result<()> {
    // Initialize OpenTelemetry
    let tracer = init_telemetry(service_name)?;

    // Create OpenTelemetry layer
    let otel_layer = OpenTelemetryLayer::new(tracer);

    // Create console layer for local logging
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_thread_ids(true)
        .with_thread_names(true);

    // Create env filter
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,srf_core=debug,srf_server=debug"));

    // Combine all layers
    Registry::default()
        .with(filter)
        .with(fmt_layer)
        .with(otel_layer)
        .try_init()?;

    Ok(())
}

/// Shutdown OpenTelemetry provider
pub fn shutdown_telemetry() {
    opentelemetry::global::shutdown_tracer_provider();
}

/// Create the server span for one dispatched request
pub fn create_request_span(endpoint: &str, method: &str, request_id: &str) -> tracing::Span {
    tracing::info_span!(
        "dispatch_request",
        endpoint = %endpoint,
        method = %method,
        request_id = %request_id,
        otel.kind = "server",
        http.status_code = tracing::field::Empty,
        otel.status_code = tracing::field::Empty,
        error = tracing::field::Empty,
    )
}

/// Record the response status in current span
pub fn record_status(status: u16) {
    let span = tracing::Span::current();
    span.record("http.status_code", status);
    span.record("otel.status_code", if status >= 500 { "ERROR" } else { "OK" });
}

/// Record error in current span
pub fn record_error(error: &str) {
    let span = tracing::Span::current();
    span.record("otel.status_code", "ERROR");
    span.record("error", error);
}
