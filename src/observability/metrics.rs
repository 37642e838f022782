//! Metrics registry
//!
//! Counters only. Values increase monotonically for the life of the
//! process; tests compare deltas because the global instance is shared.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::OnceLock;

/// Operational counters for projections, fetches and batches
///
/// Relaxed ordering throughout: counters are advisory and never read back
/// to drive execution.
#[derive(Debug, Default)]
pub struct MetricsRegistry {
    root_projections_created: AtomicU64,
    rewritten_to_scan: AtomicU64,
    definitions_rejected: AtomicU64,
    queries_executed: AtomicU64,
    queries_failed: AtomicU64,
    rows_pushed: AtomicU64,
    null_rows_pushed: AtomicU64,
    duplicates_suppressed: AtomicU64,
    header_growths: AtomicU64,
    batches_executed: AtomicU64,
    batch_entry_failures: AtomicU64,
}

static GLOBAL: OnceLock<MetricsRegistry> = OnceLock::new();

impl MetricsRegistry {
    /// Create a new registry with all counters at zero
    pub fn new() -> Self {
        Self::default()
    }

    /// Process-wide registry used by builders, executors and batches
    pub fn global() -> &'static MetricsRegistry {
        GLOBAL.get_or_init(MetricsRegistry::new)
    }

    // Projections

    pub fn increment_root_projections(&self) {
        self.root_projections_created.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_rewritten_to_scan(&self) {
        self.rewritten_to_scan.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_definitions_rejected(&self) {
        self.definitions_rejected.fetch_add(1, Ordering::Relaxed);
    }

    // Queries

    pub fn increment_queries_executed(&self) {
        self.queries_executed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_queries_failed(&self) {
        self.queries_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_rows_pushed(&self) {
        self.rows_pushed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_null_rows_pushed(&self) {
        self.null_rows_pushed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_duplicates_suppressed(&self) {
        self.duplicates_suppressed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_header_growths(&self) {
        self.header_growths.fetch_add(1, Ordering::Relaxed);
    }

    // Batches

    pub fn increment_batches_executed(&self) {
        self.batches_executed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_batch_entry_failures(&self, count: u64) {
        self.batch_entry_failures.fetch_add(count, Ordering::Relaxed);
    }

    /// Take a point-in-time copy of all counters
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            root_projections_created: self.root_projections_created.load(Ordering::Relaxed),
            rewritten_to_scan: self.rewritten_to_scan.load(Ordering::Relaxed),
            definitions_rejected: self.definitions_rejected.load(Ordering::Relaxed),
            queries_executed: self.queries_executed.load(Ordering::Relaxed),
            queries_failed: self.queries_failed.load(Ordering::Relaxed),
            rows_pushed: self.rows_pushed.load(Ordering::Relaxed),
            null_rows_pushed: self.null_rows_pushed.load(Ordering::Relaxed),
            duplicates_suppressed: self.duplicates_suppressed.load(Ordering::Relaxed),
            header_growths: self.header_growths.load(Ordering::Relaxed),
            batches_executed: self.batches_executed.load(Ordering::Relaxed),
            batch_entry_failures: self.batch_entry_failures.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`MetricsRegistry`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub root_projections_created: u64,
    pub rewritten_to_scan: u64,
    pub definitions_rejected: u64,
    pub queries_executed: u64,
    pub queries_failed: u64,
    pub rows_pushed: u64,
    pub null_rows_pushed: u64,
    pub duplicates_suppressed: u64,
    pub header_growths: u64,
    pub batches_executed: u64,
    pub batch_entry_failures: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_registry_is_zero() {
        let metrics = MetricsRegistry::new();
        assert_eq!(metrics.snapshot(), MetricsSnapshot::default());
    }

    #[test]
    fn test_counters_increment() {
        let metrics = MetricsRegistry::new();
        metrics.increment_rows_pushed();
        metrics.increment_rows_pushed();
        metrics.increment_duplicates_suppressed();
        metrics.add_batch_entry_failures(3);

        let snap = metrics.snapshot();
        assert_eq!(snap.rows_pushed, 2);
        assert_eq!(snap.duplicates_suppressed, 1);
        assert_eq!(snap.batch_entry_failures, 3);
    }

    #[test]
    fn test_global_is_shared() {
        let before = MetricsRegistry::global().snapshot().header_growths;
        MetricsRegistry::global().increment_header_growths();
        assert!(MetricsRegistry::global().snapshot().header_growths > before);
    }
}
