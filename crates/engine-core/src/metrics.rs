use serde::Serialize;
use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

#[derive(Debug, Default)]
struct InnerMetrics {
    rows_loaded: AtomicU64,
    rows_deleted: AtomicU64,
    batches_loaded: AtomicU64,
    failure_count: AtomicU64,
    retry_count: AtomicU64,
}

/// Counters shared across every attempt of a run.
///
/// `rows_loaded` accumulates over attempts, so after a retry it also counts
/// rows that a later delete removed again.
#[derive(Debug, Clone)]
pub struct Metrics {
    inner: Arc<InnerMetrics>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub rows_loaded: u64,
    pub rows_deleted: u64,
    pub batches_loaded: u64,
    pub failure_count: u64,
    pub retry_count: u64,
}

impl Metrics {
    pub fn new() -> Self {
        Metrics {
            inner: Arc::new(InnerMetrics::default()),
        }
    }

    pub fn increment_rows_loaded(&self, count: u64) {
        self.inner.rows_loaded.fetch_add(count, Ordering::Relaxed);
    }

    pub fn increment_rows_deleted(&self, count: u64) {
        self.inner.rows_deleted.fetch_add(count, Ordering::Relaxed);
    }

    pub fn increment_batches(&self, count: u64) {
        self.inner.batches_loaded.fetch_add(count, Ordering::Relaxed);
    }

    pub fn increment_failures(&self, count: u64) {
        self.inner.failure_count.fetch_add(count, Ordering::Relaxed);
    }

    pub fn increment_retries(&self, count: u64) {
        self.inner.retry_count.fetch_add(count, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            rows_loaded: self.inner.rows_loaded.load(Ordering::Relaxed),
            rows_deleted: self.inner.rows_deleted.load(Ordering::Relaxed),
            batches_loaded: self.inner.batches_loaded.load(Ordering::Relaxed),
            failure_count: self.inner.failure_count.load(Ordering::Relaxed),
            retry_count: self.inner.retry_count.load(Ordering::Relaxed),
        }
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_counters() {
        let metrics = Metrics::new();
        let other = metrics.clone();

        metrics.increment_rows_loaded(100);
        other.increment_rows_loaded(50);
        other.increment_batches(2);
        metrics.increment_failures(1);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.rows_loaded, 150);
        assert_eq!(snapshot.batches_loaded, 2);
        assert_eq!(snapshot.failure_count, 1);
        assert_eq!(snapshot.retry_count, 0);
    }
}
