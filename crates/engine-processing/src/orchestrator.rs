use crate::{
    checker::{Availability, SourceAvailabilityChecker, format_count},
    error::PipelineError,
    extractor::ChunkedExtractor,
    loader::BulkLoader,
    replacer::PartitionReplacer,
    retry::classify_pipeline_error,
};
use connectors::sql::base::{
    destination::DestinationConnector,
    source::{SourceConnector, SourceQuery},
};
use engine_core::{
    config::PipelineConfig,
    metrics::Metrics,
    progress::{BatchProgress, LogProgress, ProgressObserver},
    retry::RetryError,
};
use std::{fmt, sync::Arc, time::Duration};
use tokio::time::Instant;
use tracing::{error, info};

/// Where an attempt currently is. Logged with every failure so the operator
/// can tell whether the destination partition was already cleared.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptState {
    Idle,
    Checking,
    EmptySourceExit,
    Cleaning,
    Loading { batch: usize },
    Done,
}

impl AttemptState {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttemptState::Idle => "idle",
            AttemptState::Checking => "checking",
            AttemptState::EmptySourceExit => "empty_source",
            AttemptState::Cleaning => "cleaning",
            AttemptState::Loading { .. } => "loading",
            AttemptState::Done => "done",
        }
    }

    /// True once the destination partition may have been modified.
    pub fn touched_destination(&self) -> bool {
        matches!(
            self,
            AttemptState::Cleaning | AttemptState::Loading { .. } | AttemptState::Done
        )
    }
}

impl fmt::Display for AttemptState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttemptState::Loading { batch } => write!(f, "loading batch {}", batch + 1),
            other => f.write_str(other.as_str()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadSummary {
    /// Attempt that succeeded, 1-based.
    pub attempts: u32,
    pub batches: usize,
    pub rows_loaded: u64,
    /// `None` when the table was truncated.
    pub rows_deleted: Option<u64>,
    pub elapsed: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    Loaded(LoadSummary),
    /// The source had no rows for the date. Nothing was written.
    EmptySource { attempts: u32 },
}

enum AttemptOutcome {
    Empty,
    Loaded {
        batches: usize,
        rows_loaded: u64,
        rows_deleted: Option<u64>,
    },
}

/// Drives check, clean, extract and load for one date, restarting the whole
/// sequence after a failure.
///
/// Every attempt opens its own sessions through the connectors, so nothing
/// from a failed attempt leaks into the next one. Rows already committed by
/// a failed attempt stay in place until the next attempt clears the
/// partition again.
pub struct RetryOrchestrator {
    config: PipelineConfig,
    source: Arc<dyn SourceConnector>,
    destination: Arc<dyn DestinationConnector>,
    observer: Arc<dyn ProgressObserver>,
    metrics: Metrics,
}

impl RetryOrchestrator {
    pub fn new(
        config: PipelineConfig,
        source: Arc<dyn SourceConnector>,
        destination: Arc<dyn DestinationConnector>,
    ) -> Self {
        Self {
            config,
            source,
            destination,
            observer: Arc::new(LogProgress),
            metrics: Metrics::new(),
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn ProgressObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn with_metrics(mut self, metrics: Metrics) -> Self {
        self.metrics = metrics;
        self
    }

    pub async fn run(&self) -> Result<RunOutcome, PipelineError> {
        self.config.validate()?;

        let started = Instant::now();
        let query = self.config.query.render(self.config.date);
        let policy = &self.config.retry;

        let result = policy
            .run(
                |attempt| self.run_attempt(attempt, &query),
                classify_pipeline_error,
            )
            .await;

        match result {
            Ok((attempt, AttemptOutcome::Empty)) => {
                info!(
                    date = %self.config.date,
                    source = %self.config.source_table,
                    "No source rows for {}, destination left untouched",
                    self.config.date
                );
                Ok(RunOutcome::EmptySource { attempts: attempt })
            }
            Ok((
                attempt,
                AttemptOutcome::Loaded {
                    batches,
                    rows_loaded,
                    rows_deleted,
                },
            )) => {
                let summary = LoadSummary {
                    attempts: attempt,
                    batches,
                    rows_loaded,
                    rows_deleted,
                    elapsed: started.elapsed(),
                };
                let metrics = self.metrics.snapshot();
                info!(
                    table = %self.config.destination_table,
                    date = %self.config.date,
                    attempts = summary.attempts,
                    batches = summary.batches,
                    rows_loaded = summary.rows_loaded,
                    rows_deleted = ?summary.rows_deleted,
                    elapsed_ms = summary.elapsed.as_millis() as u64,
                    failures = metrics.failure_count,
                    retries = metrics.retry_count,
                    "Loaded {} rows into {}",
                    format_count(summary.rows_loaded),
                    self.config.destination_table
                );
                Ok(RunOutcome::Loaded(summary))
            }
            Err(RetryError::Fatal { attempt, error }) => {
                error!(
                    attempt,
                    kind = error.kind(),
                    error = %error,
                    "Run aborted, error is not retryable"
                );
                Err(error)
            }
            Err(RetryError::AttemptsExceeded { attempts, error }) => {
                let err = PipelineError::Exhausted {
                    attempts,
                    last: Box::new(error),
                };
                error!(attempts, kind = err.kind(), error = %err, "Run failed");
                Err(err)
            }
        }
    }

    async fn run_attempt(
        &self,
        attempt: u32,
        query: &SourceQuery,
    ) -> Result<(u32, AttemptOutcome), PipelineError> {
        if attempt > 1 {
            self.metrics.increment_retries(1);
        }
        info!(
            attempt,
            max_attempts = self.config.retry.max_attempts,
            "Starting attempt"
        );

        let mut state = AttemptState::Idle;
        match self.drive(attempt, query, &mut state).await {
            Ok(outcome) => Ok((attempt, outcome)),
            Err(err) => {
                self.metrics.increment_failures(1);
                error!(
                    attempt,
                    max_attempts = self.config.retry.max_attempts,
                    state = %state,
                    destination_touched = state.touched_destination(),
                    kind = err.kind(),
                    error = %err,
                    "Attempt failed"
                );
                self.observer.on_attempt_failed(attempt, &err);
                Err(err)
            }
        }
    }

    async fn drive(
        &self,
        attempt: u32,
        query: &SourceQuery,
        state: &mut AttemptState,
    ) -> Result<AttemptOutcome, PipelineError> {
        let cfg = &self.config;

        *state = AttemptState::Checking;
        let source = self.source.connect().await?;
        let checker = SourceAvailabilityChecker::new(
            source.as_ref(),
            &cfg.source_table,
            &cfg.source_date_column,
        );
        if checker.check(cfg.date).await? == Availability::Empty {
            *state = AttemptState::EmptySourceExit;
            return Ok(AttemptOutcome::Empty);
        }

        *state = AttemptState::Cleaning;
        let destination = self.destination.connect().await?;
        let replacer = PartitionReplacer::new(
            destination.as_ref(),
            &cfg.destination_table,
            &cfg.destination_date_column,
            cfg.replace_mode,
        );
        let replaced = replacer.replace(cfg.date).await?;
        let rows_deleted = replaced.deleted_rows();
        if let Some(deleted) = rows_deleted {
            self.metrics.increment_rows_deleted(deleted);
        }

        *state = AttemptState::Loading { batch: 0 };
        let mut extractor =
            ChunkedExtractor::start(source.as_ref(), query, cfg.chunk_size).await?;
        let loader = BulkLoader::new(destination.as_ref(), &cfg.destination_table);
        let mut rows_loaded = 0u64;

        while let Some(batch) = extractor.next_batch().await? {
            *state = AttemptState::Loading { batch: batch.index };
            let written = loader.load(&batch).await?;
            rows_loaded += written;

            self.metrics.increment_rows_loaded(written);
            self.metrics.increment_batches(1);
            self.observer.on_batch_loaded(&BatchProgress {
                attempt,
                batch_index: batch.index,
                batch_rows: batch.len(),
                rows_loaded,
            });
        }

        *state = AttemptState::Done;
        Ok(AttemptOutcome::Loaded {
            batches: extractor.batches_emitted(),
            rows_loaded,
            rows_deleted,
        })
    }
}
