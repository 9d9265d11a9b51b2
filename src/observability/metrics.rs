//! Adapter counters
//!
//! Counters only, monotonic, process-local. Relaxed atomics: counters are
//! read for reporting, never for control flow.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::OnceLock;

use serde::Serialize;

/// Counters for planning and streaming
#[derive(Debug, Default)]
pub struct AdapterMetrics {
    queries_planned: AtomicU64,
    filters_pushed: AtomicU64,
    filters_residual: AtomicU64,
    aggregations_pushed: AtomicU64,
    aggregations_residual: AtomicU64,
    cursors_opened: AtomicU64,
    cursors_rejected: AtomicU64,
    rows_streamed: AtomicU64,
    stream_errors: AtomicU64,
}

impl AdapterMetrics {
    /// Create a registry with all counters at zero
    pub fn new() -> Self {
        Self::default()
    }

    /// Process-wide registry
    pub fn global() -> &'static AdapterMetrics {
        static GLOBAL: OnceLock<AdapterMetrics> = OnceLock::new();
        GLOBAL.get_or_init(AdapterMetrics::new)
    }

    pub fn increment_queries_planned(&self) {
        self.queries_planned.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_filters_pushed(&self) {
        self.filters_pushed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_filters_residual(&self) {
        self.filters_residual.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_aggregations_pushed(&self) {
        self.aggregations_pushed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_aggregations_residual(&self) {
        self.aggregations_residual.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_cursors_opened(&self) {
        self.cursors_opened.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_cursors_rejected(&self) {
        self.cursors_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_rows_streamed(&self) {
        self.rows_streamed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_stream_errors(&self) {
        self.stream_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Point-in-time copy of every counter
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            queries_planned: self.queries_planned.load(Ordering::Relaxed),
            filters_pushed: self.filters_pushed.load(Ordering::Relaxed),
            filters_residual: self.filters_residual.load(Ordering::Relaxed),
            aggregations_pushed: self.aggregations_pushed.load(Ordering::Relaxed),
            aggregations_residual: self.aggregations_residual.load(Ordering::Relaxed),
            cursors_opened: self.cursors_opened.load(Ordering::Relaxed),
            cursors_rejected: self.cursors_rejected.load(Ordering::Relaxed),
            rows_streamed: self.rows_streamed.load(Ordering::Relaxed),
            stream_errors: self.stream_errors.load(Ordering::Relaxed),
        }
    }

    /// Snapshot serialized as a JSON object
    pub fn to_json(&self) -> String {
        serde_json::to_string(&self.snapshot()).unwrap_or_else(|_| "{}".to_string())
    }
}

/// A point-in-time snapshot of all counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub queries_planned: u64,
    pub filters_pushed: u64,
    pub filters_residual: u64,
    pub aggregations_pushed: u64,
    pub aggregations_residual: u64,
    pub cursors_opened: u64,
    pub cursors_rejected: u64,
    pub rows_streamed: u64,
    pub stream_errors: u64,
}
