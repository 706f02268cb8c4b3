use crate::error::PipelineError;
use connectors::sql::base::destination::{DataDestination, TableName};
use model::records::batch::RowBatch;
use tracing::debug;

/// Writes one batch per destination transaction.
pub struct BulkLoader<'a> {
    destination: &'a dyn DataDestination,
    table: &'a TableName,
}

impl<'a> BulkLoader<'a> {
    pub fn new(destination: &'a dyn DataDestination, table: &'a TableName) -> Self {
        Self { destination, table }
    }

    /// Returns the number of rows committed. A failure leaves none of the
    /// batch behind and earlier batches untouched.
    pub async fn load(&self, batch: &RowBatch) -> Result<u64, PipelineError> {
        let written = self.destination.load_batch(self.table, batch).await?;
        debug!(
            table = %self.table,
            batch = batch.index,
            rows = written,
            "Batch committed"
        );
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{Call, RecordingDestination, rows};

    #[tokio::test]
    async fn test_load_commits_whole_batch() {
        let destination = RecordingDestination::default();
        let table: TableName = "ventas".parse().unwrap();
        let loader = BulkLoader::new(&destination, &table);

        let written = loader.load(&RowBatch::new(0, rows(0..3))).await.unwrap();

        assert_eq!(written, 3);
        assert_eq!(destination.calls(), vec![Call::Load { rows: 3 }]);
        assert_eq!(destination.row_count(), 3);
    }

    #[tokio::test]
    async fn test_failed_load_surfaces_error() {
        let destination = RecordingDestination::failing_loads();
        let table: TableName = "ventas".parse().unwrap();
        let loader = BulkLoader::new(&destination, &table);

        let err = loader.load(&RowBatch::new(0, rows(0..3))).await.unwrap_err();

        assert_eq!(err.kind(), "destination_unavailable");
        assert_eq!(destination.row_count(), 0);
    }
}
