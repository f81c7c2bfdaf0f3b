/// Timing and error accounting for concurrently dispatched API calls
use crate::error::{Result, ScaleTestError};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

/// Results of one concurrent action (e.g. "create deployments")
#[derive(Debug, Clone, Serialize)]
pub struct ActionMetrics {
    pub action: String,
    pub total_operations: u64,
    pub successful_operations: u64,
    pub failed_operations: u64,
    pub total_duration_ms: u64,
    pub min_latency_ms: u64,
    pub max_latency_ms: u64,
    pub avg_latency_ms: u64,
    pub p50_latency_ms: u64,
    pub p95_latency_ms: u64,
    pub p99_latency_ms: u64,
    pub throughput_ops_per_sec: f64,
    pub errors_by_type: HashMap<String, u64>,
    pub first_error: Option<String>,
}

impl ActionMetrics {
    pub fn new(action: &str) -> Self {
        Self {
            action: action.to_string(),
            total_operations: 0,
            successful_operations: 0,
            failed_operations: 0,
            total_duration_ms: 0,
            min_latency_ms: 0,
            max_latency_ms: 0,
            avg_latency_ms: 0,
            p50_latency_ms: 0,
            p95_latency_ms: 0,
            p99_latency_ms: 0,
            throughput_ops_per_sec: 0.0,
            errors_by_type: HashMap::new(),
            first_error: None,
        }
    }

    pub fn elapsed_secs(&self) -> f64 {
        self.total_duration_ms as f64 / 1000.0
    }

    pub fn success_rate(&self) -> f64 {
        if self.total_operations == 0 {
            0.0
        } else {
            (self.successful_operations as f64 / self.total_operations as f64) * 100.0
        }
    }

    pub fn error_rate(&self) -> f64 {
        if self.total_operations == 0 {
            0.0
        } else {
            100.0 - self.success_rate()
        }
    }

    /// Fail the phase when any call failed
    pub fn ensure_all_succeeded(&self) -> Result<()> {
        if self.failed_operations == 0 {
            return Ok(());
        }
        Err(ScaleTestError::ActionFailures {
            action: self.action.clone(),
            failed: self.failed_operations,
            total: self.total_operations,
            first_error: self
                .first_error
                .clone()
                .unwrap_or_else(|| "unknown".to_string()),
        })
    }
}

/// Shared state written by every worker of a concurrent action
#[derive(Debug, Clone, Default)]
pub struct ActionState {
    pub total_ops: Arc<AtomicU64>,
    pub successful_ops: Arc<AtomicU64>,
    pub failed_ops: Arc<AtomicU64>,
    pub latencies: Arc<parking_lot::Mutex<Vec<u64>>>,
    pub errors: Arc<parking_lot::Mutex<ErrorLog>>,
}

#[derive(Debug, Default)]
pub struct ErrorLog {
    pub by_type: HashMap<String, u64>,
    pub first: Option<String>,
}

impl ActionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_success(&self, latency_ms: u64) {
        self.total_ops.fetch_add(1, Ordering::Relaxed);
        self.successful_ops.fetch_add(1, Ordering::Relaxed);
        self.latencies.lock().push(latency_ms);
    }

    pub fn record_failure(&self, latency_ms: u64, kind: &str, message: String) {
        self.total_ops.fetch_add(1, Ordering::Relaxed);
        self.failed_ops.fetch_add(1, Ordering::Relaxed);
        self.latencies.lock().push(latency_ms);

        let mut errors = self.errors.lock();
        *errors.by_type.entry(kind.to_string()).or_insert(0) += 1;
        if errors.first.is_none() {
            errors.first = Some(message);
        }
    }

    pub fn get_metrics(&self, action: &str, duration_ms: u64) -> ActionMetrics {
        let total = self.total_ops.load(Ordering::Relaxed);
        let successful = self.successful_ops.load(Ordering::Relaxed);
        let failed = self.failed_ops.load(Ordering::Relaxed);

        let mut latencies = self.latencies.lock().clone();
        latencies.sort_unstable();

        let (min_lat, max_lat, avg_lat) = if !latencies.is_empty() {
            let min = latencies[0];
            let max = latencies[latencies.len() - 1];
            let avg = latencies.iter().sum::<u64>() / latencies.len() as u64;
            (min, max, avg)
        } else {
            (0, 0, 0)
        };

        let p50 = percentile(&latencies, 50);
        let p95 = percentile(&latencies, 95);
        let p99 = percentile(&latencies, 99);

        let throughput = if duration_ms > 0 {
            total as f64 / (duration_ms as f64 / 1000.0)
        } else {
            0.0
        };

        let errors = self.errors.lock();

        ActionMetrics {
            action: action.to_string(),
            total_operations: total,
            successful_operations: successful,
            failed_operations: failed,
            total_duration_ms: duration_ms,
            min_latency_ms: min_lat,
            max_latency_ms: max_lat,
            avg_latency_ms: avg_lat,
            p50_latency_ms: p50,
            p95_latency_ms: p95,
            p99_latency_ms: p99,
            throughput_ops_per_sec: throughput,
            errors_by_type: errors.by_type.clone(),
            first_error: errors.first.clone(),
        }
    }
}

fn percentile(sorted: &[u64], pct: usize) -> u64 {
    if sorted.is_empty() {
        return 0;
    }
    let idx = ((sorted.len() * pct) / 100).min(sorted.len() - 1);
    sorted[idx]
}
