//! Tracing and logging setup

use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

/// Initialize tracing with default configuration
pub fn init_tracing() {
    init_tracing_with_config(TracingConfig::default());
}

/// Initialize tracing with custom configuration.
///
/// `RUST_LOG` takes precedence over `default_level`. Calling this twice is
/// harmless; the second subscriber is discarded.
pub fn init_tracing_with_config(config: TracingConfig) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.default_level));

    let (text_layer, json_layer) = if config.json_output {
        let json = fmt::layer()
            .json()
            .with_span_events(config.span_events)
            .with_target(true)
            .with_thread_ids(true);
        (None, Some(json))
    } else {
        let text = fmt::layer()
            .with_span_events(config.span_events)
            .with_target(config.show_target)
            .with_thread_ids(config.show_thread_ids)
            .with_thread_names(config.show_thread_names)
            .with_file(config.show_file)
            .with_line_number(config.show_line_number);
        (Some(text), None)
    };

    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(text_layer)
        .with(json_layer)
        .try_init();
}

/// Tracing configuration
#[derive(Debug, Clone)]
pub struct TracingConfig {
    /// Default log level if RUST_LOG is not set
    pub default_level: String,
    /// Show span events (enter, exit, close)
    pub span_events: FmtSpan,
    /// Show target module in logs
    pub show_target: bool,
    /// Show thread IDs
    pub show_thread_ids: bool,
    /// Show thread names
    pub show_thread_names: bool,
    /// Show source file
    pub show_file: bool,
    /// Show line numbers
    pub show_line_number: bool,
    /// Output logs as JSON
    pub json_output: bool,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            default_level: "srf_core=debug,info".to_string(),
            span_events: FmtSpan::CLOSE,
            show_target: true,
            show_thread_ids: false,
            show_thread_names: false,
            show_file: false,
            show_line_number: false,
            json_output: false,
        }
    }
}

impl TracingConfig {
    /// Create a production configuration
    pub fn production() -> Self {
        Self {
            default_level: "srf_core=info,warn".to_string(),
            span_events: FmtSpan::NONE,
            json_output: true,
            ..Self::default()
        }
    }

    /// Create a development configuration
    pub fn development() -> Self {
        Self {
            show_file: true,
            show_line_number: true,
            ..Self::default()
        }
    }

    /// Create a verbose configuration for debugging blocking handlers
    pub fn verbose() -> Self {
        Self {
            default_level: "srf_core=trace,debug".to_string(),
            span_events: FmtSpan::ENTER | FmtSpan::EXIT | FmtSpan::CLOSE,
            show_target: true,
            show_thread_ids: true,
            show_thread_names: true,
            show_file: true,
            show_line_number: true,
            json_output: false,
        }
    }
}

/// Log the terminal outcome of one dispatch
#[macro_export]
macro_rules! trace_dispatch {
    ($endpoint:expr, $outcome:expr, $status:expr, $duration:expr) => {
        tracing::info!(
            target: "srf_core::dispatch",
            endpoint = $endpoint,
            outcome = %$outcome,
            status = $status.as_u16(),
            duration_ms = $duration.as_millis() as u64,
            "Request dispatched"
        );
    };
}

/// Log a dispatch that failed with an error instead of a response
#[macro_export]
macro_rules! trace_dispatch_error {
    ($endpoint:expr, $error:expr, $duration:expr) => {
        tracing::error!(
            target: "srf_core::dispatch",
            endpoint = $endpoint,
            error = %$error,
            duration_ms = $duration.as_millis() as u64,
            "Dispatch failed"
        );
    };
}
