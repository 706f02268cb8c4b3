use std::error::Error;
use tracing::info;

/// Reported after each batch commits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchProgress {
    pub attempt: u32,
    /// 0-based position of the batch within the current attempt.
    pub batch_index: usize,
    pub batch_rows: usize,
    /// Rows committed so far in the current attempt.
    pub rows_loaded: u64,
}

/// Hook for callers that want to follow a run while it happens.
pub trait ProgressObserver: Send + Sync {
    fn on_batch_loaded(&self, progress: &BatchProgress);

    fn on_attempt_failed(&self, _attempt: u32, _error: &(dyn Error + 'static)) {}
}

/// Writes each committed batch to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogProgress;

impl ProgressObserver for LogProgress {
    fn on_batch_loaded(&self, progress: &BatchProgress) {
        info!(
            attempt = progress.attempt,
            batch = progress.batch_index + 1,
            batch_rows = progress.batch_rows,
            rows_loaded = progress.rows_loaded,
            "Batch {} loaded ({} rows, {} total)",
            progress.batch_index + 1,
            progress.batch_rows,
            progress.rows_loaded
        );
    }
}
