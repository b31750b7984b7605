//! Performance Metrics Module
//!
//! Operation counters for [`ConcurrentMap`](crate::ConcurrentMap). Every
//! operation records its outcome and the time spent inside the critical
//! section; operations that could not take the lock on the first attempt are
//! counted as contended.

use core::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

/// Snapshot of the metrics collected for one map
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PerformanceMetrics {
    /// Total number of operations performed
    pub total_operations: u64,
    /// Number of successful operations
    pub successful_operations: u64,
    /// Number of failed operations (lookups of missing keys, failed exports)
    pub failed_operations: u64,
    /// Number of operations that had to wait for the lock
    pub contended_operations: u64,
    /// Average time spent holding the lock, in nanoseconds
    pub avg_operation_time_ns: u64,
    /// Maximum time spent holding the lock, in nanoseconds
    pub max_operation_time_ns: u64,
    /// Number of entries after the most recent operation
    pub entries: usize,
    /// Largest number of entries observed
    pub peak_entries: usize,
}

impl PerformanceMetrics {
    /// Calculate success rate as percentage
    pub fn success_rate(&self) -> f64 {
        self.rate(self.successful_operations)
    }

    /// Calculate contention rate as percentage
    pub fn contention_rate(&self) -> f64 {
        self.rate(self.contended_operations)
    }

    /// Calculate failure rate as percentage
    pub fn failure_rate(&self) -> f64 {
        self.rate(self.failed_operations)
    }

    /// Get average operation time as Duration
    pub fn avg_operation_time(&self) -> Duration {
        Duration::from_nanos(self.avg_operation_time_ns)
    }

    /// Get maximum operation time as Duration
    pub fn max_operation_time(&self) -> Duration {
        Duration::from_nanos(self.max_operation_time_ns)
    }

    fn rate(&self, count: u64) -> f64 {
        if self.total_operations == 0 {
            0.0
        } else {
            (count as f64 / self.total_operations as f64) * 100.0
        }
    }
}

/// Lock-free metrics storage embedded in each map
#[derive(Debug)]
pub(crate) struct AtomicMetrics {
    enabled: AtomicBool,
    total_operations: AtomicU64,
    successful_operations: AtomicU64,
    failed_operations: AtomicU64,
    contended_operations: AtomicU64,
    total_time_ns: AtomicU64,
    max_time_ns: AtomicU64,
    entries: AtomicUsize,
    peak_entries: AtomicUsize,
}

impl AtomicMetrics {
    pub(crate) const fn new() -> Self {
        Self {
            enabled: AtomicBool::new(true),
            total_operations: AtomicU64::new(0),
            successful_operations: AtomicU64::new(0),
            failed_operations: AtomicU64::new(0),
            contended_operations: AtomicU64::new(0),
            total_time_ns: AtomicU64::new(0),
            max_time_ns: AtomicU64::new(0),
            entries: AtomicUsize::new(0),
            peak_entries: AtomicUsize::new(0),
        }
    }

    #[inline]
    pub(crate) fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    pub(crate) fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Relaxed);
    }

    /// Record a successful operation with its duration
    pub(crate) fn record_success(&self, duration: Duration) {
        self.total_operations.fetch_add(1, Ordering::Relaxed);
        self.successful_operations.fetch_add(1, Ordering::Relaxed);
        self.record_time(duration);
    }

    /// Record a failed operation with its duration
    pub(crate) fn record_failure(&self, duration: Duration) {
        self.total_operations.fetch_add(1, Ordering::Relaxed);
        self.failed_operations.fetch_add(1, Ordering::Relaxed);
        self.record_time(duration);
    }

    /// Record an operation that blocked on the lock
    pub(crate) fn record_contention(&self) {
        self.contended_operations.fetch_add(1, Ordering::Relaxed);
    }

    /// Update the entry gauge
    pub(crate) fn update_entries(&self, entries: usize) {
        self.entries.store(entries, Ordering::Relaxed);
        self.peak_entries.fetch_max(entries, Ordering::Relaxed);
    }

    fn record_time(&self, duration: Duration) {
        let duration_ns = u64::try_from(duration.as_nanos()).unwrap_or(u64::MAX);
        self.total_time_ns.fetch_add(duration_ns, Ordering::Relaxed);

        let mut current_max = self.max_time_ns.load(Ordering::Relaxed);
        while duration_ns > current_max {
            match self.max_time_ns.compare_exchange_weak(
                current_max,
                duration_ns,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => break,
                Err(x) => current_max = x,
            }
        }
    }

    /// Get current metrics snapshot
    pub(crate) fn snapshot(&self) -> PerformanceMetrics {
        let total_ops = self.total_operations.load(Ordering::Relaxed);
        let total_time = self.total_time_ns.load(Ordering::Relaxed);

        PerformanceMetrics {
            total_operations: total_ops,
            successful_operations: self.successful_operations.load(Ordering::Relaxed),
            failed_operations: self.failed_operations.load(Ordering::Relaxed),
            contended_operations: self.contended_operations.load(Ordering::Relaxed),
            avg_operation_time_ns: if total_ops > 0 { total_time / total_ops } else { 0 },
            max_operation_time_ns: self.max_time_ns.load(Ordering::Relaxed),
            entries: self.entries.load(Ordering::Relaxed),
            peak_entries: self.peak_entries.load(Ordering::Relaxed),
        }
    }

    /// Reset all counters
    pub(crate) fn reset(&self) {
        self.total_operations.store(0, Ordering::Relaxed);
        self.successful_operations.store(0, Ordering::Relaxed);
        self.failed_operations.store(0, Ordering::Relaxed);
        self.contended_operations.store(0, Ordering::Relaxed);
        self.total_time_ns.store(0, Ordering::Relaxed);
        self.max_time_ns.store(0, Ordering::Relaxed);
        // Entry gauges reflect current state
        self.peak_entries
            .store(self.entries.load(Ordering::Relaxed), Ordering::Relaxed);
    }
}

/// Trait for data structures that support performance metrics
pub trait MetricsCollector {
    /// Get current performance metrics
    fn metrics(&self) -> PerformanceMetrics;

    /// Reset all metrics
    fn reset_metrics(&self);

    /// Enable or disable metrics collection
    fn set_metrics_enabled(&self, enabled: bool);

    /// Check if metrics collection is enabled
    fn is_metrics_enabled(&self) -> bool;
}
