//! # Blocking Worker Pool
//!
//! Operations declared as blocking never run on the reactor. They are handed
//! to tokio's blocking threads, and a semaphore caps how many of them may run
//! at once so a burst of slow handlers cannot exhaust the blocking pool.
//!
//! ## Back-pressure
//!
//! - `wait` (default): a request waits up to `queue_timeout_ms` for a free
//!   slot, then fails with [`PoolError::Saturated`]
//! - `shed`: a request fails immediately when every slot is busy
//!
//! ## Configuration
//!
//! - `SRF_BLOCKING_WORKERS`: maximum concurrent blocking operations (default: 64)
//! - `SRF_BACKPRESSURE_MODE`: `wait` or `shed` (default: `wait`)
//! - `SRF_QUEUE_TIMEOUT_MS`: wait budget in `wait` mode (default: 5000)

use crate::error::PoolError;
use crate::monitoring;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{debug, warn};

/// What to do when every blocking slot is busy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackpressureMode {
    /// Wait for a slot, bounded by the queue timeout
    #[default]
    Wait,
    /// Reject immediately
    Shed,
}

impl FromStr for BackpressureMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "wait" | "block" => Ok(Self::Wait),
            "shed" => Ok(Self::Shed),
            other => Err(format!("unknown backpressure mode: {}", other)),
        }
    }
}

/// Configuration for the blocking worker pool
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerPoolConfig {
    /// Maximum blocking operations running at once
    pub max_blocking: usize,
    /// Saturation policy
    pub backpressure: BackpressureMode,
    /// How long `wait` mode waits for a slot
    pub queue_timeout_ms: u64,
}

impl Default for WorkerPoolConfig {
    fn default() -> Self {
        Self {
            max_blocking: 64,
            backpressure: BackpressureMode::Wait,
            queue_timeout_ms: 5_000,
        }
    }
}

impl WorkerPoolConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        Self::default().with_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from `lookup`, leaving unset or unparsable keys alone
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(n) = lookup("SRF_BLOCKING_WORKERS").and_then(|s| s.parse().ok()) {
            self.max_blocking = n;
        }
        if let Some(mode) = lookup("SRF_BACKPRESSURE_MODE").and_then(|s| s.parse().ok()) {
            self.backpressure = mode;
        }
        if let Some(ms) = lookup("SRF_QUEUE_TIMEOUT_MS").and_then(|s| s.parse().ok()) {
            self.queue_timeout_ms = ms;
        }
        self
    }
}

/// Counters for the pool
#[derive(Debug, Default)]
pub struct WorkerPoolMetrics {
    completed: AtomicU64,
    shed: AtomicU64,
}

impl WorkerPoolMetrics {
    /// Blocking operations that ran to completion
    pub fn completed_count(&self) -> u64 {
        self.completed.load(Ordering::Relaxed)
    }

    /// Requests rejected for lack of a slot
    pub fn shed_count(&self) -> u64 {
        self.shed.load(Ordering::Relaxed)
    }
}

/// Bounded pool for blocking operations
#[derive(Debug, Clone)]
pub struct WorkerPool {
    config: WorkerPoolConfig,
    slots: Arc<Semaphore>,
    metrics: Arc<WorkerPoolMetrics>,
}

impl WorkerPool {
    /// Create a pool; a bound of zero is raised to one
    pub fn new(mut config: WorkerPoolConfig) -> Self {
        config.max_blocking = config.max_blocking.max(1);
        debug!(
            max_blocking = config.max_blocking,
            mode = ?config.backpressure,
            "Creating blocking worker pool"
        );

        Self {
            slots: Arc::new(Semaphore::new(config.max_blocking)),
            config,
            metrics: Arc::new(WorkerPoolMetrics::default()),
        }
    }

    /// Active configuration
    pub fn config(&self) -> &WorkerPoolConfig {
        &self.config
    }

    /// Pool counters
    pub fn metrics(&self) -> &WorkerPoolMetrics {
        &self.metrics
    }

    /// Blocking operations currently holding a slot
    pub fn in_flight(&self) -> usize {
        self.config.max_blocking - self.slots.available_permits()
    }

    /// Run `job` on a blocking thread once a slot is free.
    ///
    /// The slot is held by the job itself, so it stays occupied until the job
    /// returns even if the caller stops waiting.
    pub async fn run<F, R>(&self, job: F) -> Result<R, PoolError>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        let permit = self.acquire().await?;
        let metrics = self.metrics.clone();

        let output = tokio::task::spawn_blocking(move || {
            let _permit = permit;
            let output = job();
            metrics.completed.fetch_add(1, Ordering::Relaxed);
            output
        })
        .await?;

        Ok(output)
    }

    async fn acquire(&self) -> Result<OwnedSemaphorePermit, PoolError> {
        let permit = match self.config.backpressure {
            BackpressureMode::Shed => self.slots.clone().try_acquire_owned().ok(),
            BackpressureMode::Wait => {
                let budget = Duration::from_millis(self.config.queue_timeout_ms);
                tokio::time::timeout(budget, self.slots.clone().acquire_owned())
                    .await
                    .ok()
                    .and_then(Result::ok)
            }
        };

        permit.ok_or_else(|| {
            self.metrics.shed.fetch_add(1, Ordering::Relaxed);
            monitoring::record_shed();
            warn!(
                max_blocking = self.config.max_blocking,
                mode = ?self.config.backpressure,
                "Blocking worker pool saturated"
            );
            PoolError::Saturated {
                max_blocking: self.config.max_blocking,
            }
        })
    }
}

impl Default for WorkerPool {
    fn default() -> Self {
        Self::new(WorkerPoolConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::mpsc;

    fn pool(max_blocking: usize, backpressure: BackpressureMode, queue_timeout_ms: u64) -> WorkerPool {
        WorkerPool::new(WorkerPoolConfig {
            max_blocking,
            backpressure,
            queue_timeout_ms,
        })
    }

    /// Occupies one slot until the returned sender is dropped or signalled
    async fn occupy(pool: &WorkerPool) -> (mpsc::Sender<()>, tokio::task::JoinHandle<()>) {
        let (release_tx, release_rx) = mpsc::channel::<()>();
        let (started_tx, started_rx) = tokio::sync::oneshot::channel();
        let worker = pool.clone();
        let handle = tokio::spawn(async move {
            worker
                .run(move || {
                    let _ = started_tx.send(());
                    let _ = release_rx.recv();
                })
                .await
                .unwrap();
        });
        started_rx.await.unwrap();
        (release_tx, handle)
    }

    #[tokio::test]
    async fn test_runs_job_off_the_reactor() {
        let pool = WorkerPool::default();
        let reactor = std::thread::current().id();
        let worker = pool.run(|| std::thread::current().id()).await.unwrap();
        assert_ne!(reactor, worker);
        assert_eq!(pool.metrics().completed_count(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_shed_mode_rejects_when_full() {
        let pool = pool(1, BackpressureMode::Shed, 0);
        let (release, handle) = occupy(&pool).await;
        assert_eq!(pool.in_flight(), 1);

        let err = pool.run(|| ()).await.unwrap_err();
        assert!(matches!(err, PoolError::Saturated { max_blocking: 1 }));
        assert_eq!(pool.metrics().shed_count(), 1);

        release.send(()).unwrap();
        handle.await.unwrap();
        assert_eq!(pool.run(|| 7).await.unwrap(), 7);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_wait_mode_times_out() {
        let pool = pool(1, BackpressureMode::Wait, 20);
        let (release, handle) = occupy(&pool).await;

        let err = pool.run(|| ()).await.unwrap_err();
        assert!(matches!(err, PoolError::Saturated { .. }));

        release.send(()).unwrap();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_panicking_job_reports_join_error() {
        let pool = WorkerPool::default();
        let err = pool.run(|| panic!("boom")).await.unwrap_err();
        assert!(matches!(err, PoolError::Join(_)));
        assert_eq!(pool.in_flight(), 0);
    }

    #[test]
    fn test_zero_bound_is_raised() {
        let pool = pool(0, BackpressureMode::Wait, 10);
        assert_eq!(pool.config().max_blocking, 1);
    }

    #[test]
    fn test_config_overrides() {
        let env: HashMap<&str, &str> = [
            ("SRF_BLOCKING_WORKERS", "8"),
            ("SRF_BACKPRESSURE_MODE", "Shed"),
            ("SRF_QUEUE_TIMEOUT_MS", "not-a-number"),
        ]
        .into_iter()
        .collect();

        let config = WorkerPoolConfig::default()
            .with_overrides(|key| env.get(key).map(|v| v.to_string()));
        assert_eq!(config.max_blocking, 8);
        assert_eq!(config.backpressure, BackpressureMode::Shed);
        assert_eq!(config.queue_timeout_ms, 5_000);
    }

    #[test]
    fn test_backpressure_mode_parse() {
        assert_eq!("block".parse(), Ok(BackpressureMode::Wait));
        assert_eq!(" SHED ".parse(), Ok(BackpressureMode::Shed));
        assert!("drop".parse::<BackpressureMode>().is_err());
    }
}
