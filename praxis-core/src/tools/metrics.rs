//! Per-tool metrics and the derived health status
//!
//! Counters are atomics so concurrent callers of the same tool can record
//! outcomes without a lock on the hot path; the running mean and last
//! operation timestamp sit behind a small mutex.

use super::result::ToolResult;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Health of a tool as observed through its metrics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ToolHealthStatus {
    /// Operating normally
    Healthy,
    /// Elevated failure or timeout rate
    Degraded,
    /// Failure or timeout rate beyond acceptable thresholds
    Unhealthy,
    /// Administratively disabled
    Maintenance,
    /// Connection-level recovery exhausted
    Offline,
}

impl fmt::Display for ToolHealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ToolHealthStatus::Healthy => "HEALTHY",
            ToolHealthStatus::Degraded => "DEGRADED",
            ToolHealthStatus::Unhealthy => "UNHEALTHY",
            ToolHealthStatus::Maintenance => "MAINTENANCE",
            ToolHealthStatus::Offline => "OFFLINE",
        };
        f.write_str(name)
    }
}

/// Derive a health status from rolling operation outcomes.
///
/// Pure function of the counters: failure rate above 50% or timeout rate
/// above 30% is unhealthy; failure rate above 20% or timeout rate above
/// 10% is degraded; an idle tool is healthy.
pub fn derive_health(total: u64, failed: u64, timeouts: u64) -> ToolHealthStatus {
    if total == 0 {
        return ToolHealthStatus::Healthy;
    }

    let failure_rate = failed as f64 / total as f64;
    let timeout_rate = timeouts as f64 / total as f64;

    if failure_rate > 0.5 || timeout_rate > 0.3 {
        ToolHealthStatus::Unhealthy
    } else if failure_rate > 0.2 || timeout_rate > 0.1 {
        ToolHealthStatus::Degraded
    } else {
        ToolHealthStatus::Healthy
    }
}

struct MetricsState {
    avg_response_time: Duration,
    last_operation: Option<(Instant, DateTime<Utc>)>,
    derived: ToolHealthStatus,
}

/// Rolling counters for one tool instance
pub struct ToolMetrics {
    tool_id: String,
    operations_total: AtomicU64,
    operations_successful: AtomicU64,
    operations_failed: AtomicU64,
    operations_retried: AtomicU64,
    rate_limit_hits: AtomicU64,
    timeouts: AtomicU64,
    state: Mutex<MetricsState>,
    /// MAINTENANCE/OFFLINE are forced by external action, never derived.
    forced_status: Mutex<Option<ToolHealthStatus>>,
}

impl fmt::Debug for ToolMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolMetrics")
            .field("tool_id", &self.tool_id)
            .field("operations_total", &self.operations_total())
            .field("health_status", &self.health_status())
            .finish()
    }
}

impl ToolMetrics {
    /// Create fresh metrics for a tool
    pub fn new(tool_id: impl Into<String>) -> Self {
        Self {
            tool_id: tool_id.into(),
            operations_total: AtomicU64::new(0),
            operations_successful: AtomicU64::new(0),
            operations_failed: AtomicU64::new(0),
            operations_retried: AtomicU64::new(0),
            rate_limit_hits: AtomicU64::new(0),
            timeouts: AtomicU64::new(0),
            state: Mutex::new(MetricsState {
                avg_response_time: Duration::ZERO,
                last_operation: None,
                derived: ToolHealthStatus::Healthy,
            }),
            forced_status: Mutex::new(None),
        }
    }

    /// Record one executed operation outcome.
    ///
    /// Updates the counters and the running-mean response time, then
    /// recomputes the derived health status.
    pub fn record(&self, result: &ToolResult) {
        let total = self.operations_total.fetch_add(1, Ordering::SeqCst) + 1;
        if result.success {
            self.operations_successful.fetch_add(1, Ordering::SeqCst);
        } else {
            self.operations_failed.fetch_add(1, Ordering::SeqCst);
        }
        self.operations_retried
            .fetch_add(result.retry_count as u64, Ordering::SeqCst);

        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.last_operation = Some((Instant::now(), Utc::now()));

        // Running mean: avg_n = (avg_{n-1} * (n-1) + t_n) / n
        let prev = state.avg_response_time.as_millis() as u64;
        let sample = result.execution_time.as_millis() as u64;
        let avg = (prev.saturating_mul(total - 1).saturating_add(sample)) / total;
        state.avg_response_time = Duration::from_millis(avg);

        state.derived = derive_health(
            total,
            self.operations_failed.load(Ordering::SeqCst),
            self.timeouts.load(Ordering::SeqCst),
        );
    }

    /// Count a timed-out operation. Call before `record` so the derived
    /// status sees the timeout.
    pub fn record_timeout(&self) {
        self.timeouts.fetch_add(1, Ordering::SeqCst);
    }

    /// Count an admission rejected by the rate limiter. Rejections are not
    /// executed operations and do not touch `operations_total`.
    pub fn record_rate_limit_hit(&self) {
        self.rate_limit_hits.fetch_add(1, Ordering::SeqCst);
    }

    /// Force MAINTENANCE/OFFLINE (or clear the override with `None`).
    pub fn force_status(&self, status: Option<ToolHealthStatus>) {
        *self.forced_status.lock().unwrap_or_else(|e| e.into_inner()) = status;
    }

    /// Current health: the forced override if set, otherwise the value
    /// derived from the counters.
    pub fn health_status(&self) -> ToolHealthStatus {
        if let Some(forced) = *self.forced_status.lock().unwrap_or_else(|e| e.into_inner()) {
            return forced;
        }
        self.state
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .derived
    }

    /// Total executed operations
    pub fn operations_total(&self) -> u64 {
        self.operations_total.load(Ordering::SeqCst)
    }

    /// Successful operations
    pub fn operations_successful(&self) -> u64 {
        self.operations_successful.load(Ordering::SeqCst)
    }

    /// Failed operations
    pub fn operations_failed(&self) -> u64 {
        self.operations_failed.load(Ordering::SeqCst)
    }

    /// Rejections by the local rate limiter
    pub fn rate_limit_hits(&self) -> u64 {
        self.rate_limit_hits.load(Ordering::SeqCst)
    }

    /// Timed-out operations
    pub fn timeouts(&self) -> u64 {
        self.timeouts.load(Ordering::SeqCst)
    }

    /// Serializable snapshot for health reporting
    pub fn snapshot(&self) -> MetricsSnapshot {
        // health_status takes the state lock itself, so it must run
        // before the guard below is acquired.
        let health_status = self.health_status();
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        MetricsSnapshot {
            tool_id: self.tool_id.clone(),
            operations_total: self.operations_total.load(Ordering::SeqCst),
            operations_successful: self.operations_successful.load(Ordering::SeqCst),
            operations_failed: self.operations_failed.load(Ordering::SeqCst),
            operations_retried: self.operations_retried.load(Ordering::SeqCst),
            rate_limit_hits: self.rate_limit_hits.load(Ordering::SeqCst),
            timeouts: self.timeouts.load(Ordering::SeqCst),
            avg_response_time_ms: state.avg_response_time.as_millis() as u64,
            seconds_since_last_operation: state
                .last_operation
                .map(|(instant, _)| instant.elapsed().as_secs()),
            last_operation_at: state.last_operation.map(|(_, at)| at),
            health_status,
        }
    }

    /// Snapshot as a JSON value
    pub fn snapshot_json(&self) -> Value {
        serde_json::to_value(self.snapshot()).unwrap_or(Value::Null)
    }

    /// Reset all counters and the derived status
    pub fn reset(&self) {
        self.operations_total.store(0, Ordering::SeqCst);
        self.operations_successful.store(0, Ordering::SeqCst);
        self.operations_failed.store(0, Ordering::SeqCst);
        self.operations_retried.store(0, Ordering::SeqCst);
        self.rate_limit_hits.store(0, Ordering::SeqCst);
        self.timeouts.store(0, Ordering::SeqCst);
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.avg_response_time = Duration::ZERO;
        state.last_operation = None;
        state.derived = ToolHealthStatus::Healthy;
    }
}

/// Point-in-time view of a tool's metrics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    /// Tool the counters belong to
    pub tool_id: String,
    /// Total executed operations
    pub operations_total: u64,
    /// Successful operations
    pub operations_successful: u64,
    /// Failed operations
    pub operations_failed: u64,
    /// Retries performed across operations
    pub operations_retried: u64,
    /// Rejections by the local rate limiter
    pub rate_limit_hits: u64,
    /// Timed-out operations
    pub timeouts: u64,
    /// Running mean response time in milliseconds
    pub avg_response_time_ms: u64,
    /// Seconds elapsed since the last operation, if any
    pub seconds_since_last_operation: Option<u64>,
    /// Wall-clock timestamp of the last operation, if any
    pub last_operation_at: Option<DateTime<Utc>>,
    /// Derived (or forced) health status
    pub health_status: ToolHealthStatus,
}

#[cfg(test)]
mod metrics_tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_idle_tool_is_healthy() {
        assert_eq!(derive_health(0, 0, 0), ToolHealthStatus::Healthy);
    }

    #[test]
    fn test_thresholds() {
        // failure_rate 0.583 > 0.5
        assert_eq!(derive_health(60, 35, 5), ToolHealthStatus::Unhealthy);
        // failure_rate 0.25, timeout_rate 0.05
        assert_eq!(derive_health(100, 25, 5), ToolHealthStatus::Degraded);
        // timeout_rate 0.35 alone is unhealthy
        assert_eq!(derive_health(100, 0, 35), ToolHealthStatus::Unhealthy);
        // timeout_rate 0.15 alone is degraded
        assert_eq!(derive_health(100, 0, 15), ToolHealthStatus::Degraded);
        // right at the boundaries is still healthy
        assert_eq!(derive_health(100, 20, 10), ToolHealthStatus::Healthy);
    }

    proptest! {
        #[test]
        fn prop_derive_health_matches_rates(total in 0u64..10_000, failed in 0u64..10_000, timeouts in 0u64..10_000) {
            let status = derive_health(total, failed, timeouts);
            if total == 0 {
                prop_assert_eq!(status, ToolHealthStatus::Healthy);
            } else {
                let fr = failed as f64 / total as f64;
                let tr = timeouts as f64 / total as f64;
                let expected = if fr > 0.5 || tr > 0.3 {
                    ToolHealthStatus::Unhealthy
                } else if fr > 0.2 || tr > 0.1 {
                    ToolHealthStatus::Degraded
                } else {
                    ToolHealthStatus::Healthy
                };
                prop_assert_eq!(status, expected);
            }
        }
    }

    #[test]
    fn test_record_updates_counters_and_mean() {
        let metrics = ToolMetrics::new("t1");
        metrics.record(&ToolResult::ok(Value::Null, Duration::from_millis(100)));
        metrics.record(&ToolResult::ok(Value::Null, Duration::from_millis(300)));

        let snap = metrics.snapshot();
        assert_eq!(snap.operations_total, 2);
        assert_eq!(snap.operations_successful, 2);
        assert_eq!(snap.avg_response_time_ms, 200);
        assert!(snap.seconds_since_last_operation.is_some());
    }

    #[test]
    fn test_scenario_many_failures_goes_unhealthy() {
        let metrics = ToolMetrics::new("t1");
        for _ in 0..25 {
            metrics.record(&ToolResult::ok(Value::Null, Duration::from_millis(1)));
        }
        for i in 0..35 {
            if i < 5 {
                metrics.record_timeout();
            }
            metrics.record(&ToolResult::fail("boom", Duration::from_millis(1)));
        }
        assert_eq!(metrics.operations_total(), 60);
        assert_eq!(metrics.operations_failed(), 35);
        assert_eq!(metrics.timeouts(), 5);
        assert_eq!(metrics.health_status(), ToolHealthStatus::Unhealthy);
    }

    #[test]
    fn test_forced_status_wins_until_cleared() {
        let metrics = ToolMetrics::new("t1");
        metrics.record(&ToolResult::ok(Value::Null, Duration::from_millis(1)));
        assert_eq!(metrics.health_status(), ToolHealthStatus::Healthy);

        metrics.force_status(Some(ToolHealthStatus::Maintenance));
        assert_eq!(metrics.health_status(), ToolHealthStatus::Maintenance);

        metrics.force_status(None);
        assert_eq!(metrics.health_status(), ToolHealthStatus::Healthy);
    }

    #[test]
    fn test_snapshot_returns_while_health_is_derived() {
        use std::sync::Arc;

        let metrics = Arc::new(ToolMetrics::new("t1"));
        metrics.record(&ToolResult::ok(Value::Null, Duration::from_millis(1)));

        // Run the snapshot on its own thread so a regression shows up as
        // a failed assertion instead of a hung test run.
        let worker = {
            let metrics = Arc::clone(&metrics);
            std::thread::spawn(move || metrics.snapshot())
        };
        let deadline = Instant::now() + Duration::from_secs(3);
        while !worker.is_finished() && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(10));
        }
        assert!(worker.is_finished(), "snapshot() never returned");

        let snap = worker.join().unwrap();
        assert_eq!(snap.operations_total, 1);
        assert_eq!(snap.health_status, ToolHealthStatus::Healthy);
    }

    #[test]
    fn test_rate_limit_hits_do_not_count_as_operations() {
        let metrics = ToolMetrics::new("t1");
        metrics.record_rate_limit_hit();
        assert_eq!(metrics.rate_limit_hits(), 1);
        assert_eq!(metrics.operations_total(), 0);
    }

    #[test]
    fn test_reset() {
        let metrics = ToolMetrics::new("t1");
        metrics.record(&ToolResult::fail("x", Duration::from_millis(1)));
        metrics.record_timeout();
        metrics.reset();

        let snap = metrics.snapshot();
        assert_eq!(snap.operations_total, 0);
        assert_eq!(snap.timeouts, 0);
        assert_eq!(snap.health_status, ToolHealthStatus::Healthy);
    }
}
