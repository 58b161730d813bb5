//! In-process dispatch counters, read by health endpoints and tests

use parking_lot::RwLock;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// A snapshot of dispatch counters at a point in time
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StatsSnapshot {
    /// Dispatches that produced a response or an error
    pub total: u64,
    /// Dispatches by outcome label
    pub by_outcome: BTreeMap<String, u64>,
    /// Mean latency over all dispatches, in microseconds
    pub mean_latency_us: u64,
    /// Slowest dispatch seen, in microseconds
    pub max_latency_us: u64,
    /// Seconds since the collector was created
    pub uptime_seconds: u64,
}

/// Lock-light dispatch statistics
#[derive(Debug)]
pub struct DispatchStats {
    total: AtomicU64,
    total_latency_us: AtomicU64,
    max_latency_us: AtomicU64,
    by_outcome: RwLock<BTreeMap<&'static str, u64>>,
    start_time: Instant,
}

impl DispatchStats {
    /// Create an empty collector
    pub fn new() -> Self {
        Self {
            total: AtomicU64::new(0),
            total_latency_us: AtomicU64::new(0),
            max_latency_us: AtomicU64::new(0),
            by_outcome: RwLock::new(BTreeMap::new()),
            start_time: Instant::now(),
        }
    }

    /// Record one finished dispatch
    pub fn record(&self, outcome: &'static str, latency: Duration) {
        let micros = latency.as_micros() as u64;
        self.total.fetch_add(1, Ordering::Relaxed);
        self.total_latency_us.fetch_add(micros, Ordering::Relaxed);
        self.max_latency_us.fetch_max(micros, Ordering::Relaxed);
        *self.by_outcome.write().entry(outcome).or_insert(0) += 1;
    }

    /// Dispatches recorded so far
    pub fn total(&self) -> u64 {
        self.total.load(Ordering::Relaxed)
    }

    /// Dispatches recorded under `outcome`
    pub fn count(&self, outcome: &str) -> u64 {
        self.by_outcome.read().get(outcome).copied().unwrap_or(0)
    }

    /// Get current statistics snapshot
    pub fn snapshot(&self) -> StatsSnapshot {
        let total = self.total();
        let mean_latency_us = match total {
            0 => 0,
            n => self.total_latency_us.load(Ordering::Relaxed) / n,
        };

        StatsSnapshot {
            total,
            by_outcome: self
                .by_outcome
                .read()
                .iter()
                .map(|(k, v)| (k.to_string(), *v))
                .collect(),
            mean_latency_us,
            max_latency_us: self.max_latency_us.load(Ordering::Relaxed),
            uptime_seconds: self.start_time.elapsed().as_secs(),
        }
    }
}

impl Default for DispatchStats {
    fn default() -> Self {
        Self::new()
    }
}
