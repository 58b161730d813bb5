//! Server configuration
//!
//! Values come from an optional TOML file named by `SRF_CONFIG`, then
//! environment overrides:
//!
//! - `BIND_ADDRESS`: listen address (default: `0.0.0.0:8080`)
//! - `SRF_MAX_BODY_BYTES`: request body limit (default: 1 MiB)
//! - `DEBUG`: include error details in 5xx bodies (`true`/`1`/`yes`/`on`)
//! - `SRF_VERBOSE_LOGS`: trace-level logs with span events and thread ids
//! - `SRF_BLOCKING_WORKERS`, `SRF_BACKPRESSURE_MODE`, `SRF_QUEUE_TIMEOUT_MS`:
//!   worker pool settings

use serde::{Deserialize, Serialize};
use srf_core::WorkerPoolConfig;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors loading configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The configuration file could not be read
    #[error("failed to read {path}: {source}")]
    Io {
        /// File that failed
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// The configuration file is not valid TOML for this schema
    #[error("invalid configuration: {0}")]
    Parse(#[from] toml::de::Error),

    /// The bind address does not parse
    #[error("invalid bind address {0:?}")]
    BindAddress(String),
}

/// Server configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to listen on
    pub bind_address: String,
    /// Largest request body read before answering 413
    pub max_body_bytes: usize,
    /// Include error details in 5xx responses
    pub debug: bool,
    /// Trace-level console logging
    pub verbose_logs: bool,
    /// Blocking worker pool
    pub worker_pool: WorkerPoolConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            max_body_bytes: 1024 * 1024,
            debug: false,
            verbose_logs: false,
            worker_pool: WorkerPoolConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Load from `SRF_CONFIG` (if set) and the environment
    pub fn load() -> Result<Self, ConfigError> {
        let base = match std::env::var_os("SRF_CONFIG") {
            Some(path) => Self::from_file(Path::new(&path))?,
            None => Self::default(),
        };
        Ok(base.with_overrides(|key| std::env::var(key).ok()))
    }

    /// Parse a TOML file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Parse a TOML document
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Apply environment-style overrides from `lookup`
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(addr) = lookup("BIND_ADDRESS") {
            self.bind_address = addr;
        }
        if let Some(limit) = lookup("SRF_MAX_BODY_BYTES").and_then(|s| s.parse().ok()) {
            self.max_body_bytes = limit;
        }
        if let Some(debug) = lookup("DEBUG").and_then(|s| parse_flag(&s)) {
            self.debug = debug;
        }
        if let Some(verbose) = lookup("SRF_VERBOSE_LOGS").and_then(|s| parse_flag(&s)) {
            self.verbose_logs = verbose;
        }
        self.worker_pool = self.worker_pool.with_overrides(&lookup);
        self
    }

    /// Parsed bind address
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        self.bind_address
            .parse()
            .map_err(|_| ConfigError::BindAddress(self.bind_address.clone()))
    }
}

/// Boolean environment flag; unrecognized values are ignored
fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}
