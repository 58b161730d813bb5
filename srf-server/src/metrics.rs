//! Prometheus metrics for the HTTP layer

use metrics::{counter, describe_counter};

/// Initialize all metric descriptions
pub fn init_metrics() {
    describe_counter!(
        "srf_http_errors_total",
        "Requests answered by the HTTP error mapper, by kind"
    );
    srf_core::monitoring::register_metrics();
}

/// Record an error response
pub fn record_error(kind: &'static str) {
    counter!("srf_http_errors_total", 1, "kind" => kind);
}

/// Storage for Prometheus handle
static PROMETHEUS_HANDLE: std::sync::OnceLock<metrics_exporter_prometheus::PrometheusHandle> =
    std::sync::OnceLock::new();

/// Initialize Prometheus exporter and return the handle
pub fn init_prometheus() -> anyhow::Result<()> {
    let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
    let handle = builder.install_recorder()?;
    PROMETHEUS_HANDLE
        .set(handle)
        .map_err(|_| anyhow::anyhow!("Failed to set Prometheus handle"))?;
    Ok(())
}

/// Get Prometheus metrics string
pub fn get_prometheus_metrics() -> String {
    PROMETHEUS_HANDLE
        .get()
        .map(|handle| handle.render())
        .unwrap_or_else(|| "# Prometheus metrics not initialized\n".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_before_init() {
        init_metrics();
        record_error("bad_request");
        assert!(!get_prometheus_metrics().is_empty());
    }
}
