//! SRF HTTP Server binary

use srf_core::monitoring::{init_tracing_with_config, TracingConfig};
use srf_server::{AppState, ServerConfig};
use tower::ServiceBuilder;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ServerConfig::load()?;

    // Initialize OpenTelemetry tracing
    let enable_otel = std::env::var("OTEL_ENABLED")
        .unwrap_or_else(|_| "false".to_string())
        .parse::<bool>()
        .unwrap_or(false);

    if enable_otel {
        srf_server::tracing::init_tracing_stack("srf-server")?;
        info!("OpenTelemetry tracing enabled");
    } else {
        // Fallback to console logging
        let tracing_config = if config.verbose_logs {
            TracingConfig::verbose()
        } else if config.debug {
            TracingConfig::development()
        } else {
            TracingConfig::production()
        };
        init_tracing_with_config(tracing_config);
        info!("Console logging enabled (set OTEL_ENABLED=true for OpenTelemetry)");
    }

    info!("Starting SRF HTTP Server v{}", env!("CARGO_PKG_VERSION"));

    // Initialize Prometheus metrics before the dispatcher registers its own
    srf_server::metrics::init_prometheus()?;
    srf_server::metrics::init_metrics();

    let addr = config.socket_addr()?;
    info!(
        max_blocking = config.worker_pool.max_blocking,
        backpressure = ?config.worker_pool.backpressure,
        max_body_bytes = config.max_body_bytes,
        "Configuration loaded"
    );

    // Build the application
    let app = srf_server::router(AppState::new(config)).layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(
                CorsLayer::new()
                    .allow_origin(Any)
                    .allow_methods(Any)
                    .allow_headers(Any),
            )
            .layer(CompressionLayer::new()),
    );

    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;

    // Set up shutdown signal handler
    let shutdown_signal = async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Received shutdown signal, shutting down gracefully..."),
            Err(e) => {
                warn!("Failed to listen for shutdown signal: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    // Run server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal)
        .await
        .map_err(|e| anyhow::anyhow!("Server error: {}", e))?;

    // Cleanup OpenTelemetry on shutdown
    if enable_otel {
        info!("Flushing OpenTelemetry traces...");
        srf_server::tracing::shutdown_telemetry();
    }

    info!("Server shutdown complete");
    Ok(())
}
