use crate::error::PipelineError;
use connectors::sql::base::destination::{DataDestination, TableName};
use engine_core::config::ReplaceMode;
use model::core::date::PartitionDate;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Replaced {
    Truncated,
    Deleted(u64),
}

impl Replaced {
    pub fn deleted_rows(&self) -> Option<u64> {
        match self {
            Replaced::Truncated => None,
            Replaced::Deleted(n) => Some(*n),
        }
    }
}

/// Clears the destination partition ahead of a reload.
///
/// The removal commits on its own. If the attempt fails afterwards the
/// partition stays empty until the next attempt reloads it.
pub struct PartitionReplacer<'a> {
    destination: &'a dyn DataDestination,
    table: &'a TableName,
    date_column: &'a str,
    mode: ReplaceMode,
}

impl<'a> PartitionReplacer<'a> {
    pub fn new(
        destination: &'a dyn DataDestination,
        table: &'a TableName,
        date_column: &'a str,
        mode: ReplaceMode,
    ) -> Self {
        Self {
            destination,
            table,
            date_column,
            mode,
        }
    }

    pub async fn replace(&self, date: PartitionDate) -> Result<Replaced, PipelineError> {
        match self.mode {
            ReplaceMode::Truncate => {
                self.destination.truncate(self.table).await?;
                info!(table = %self.table, "Table truncated");
                Ok(Replaced::Truncated)
            }
            ReplaceMode::DeleteByDate => {
                let deleted = self
                    .destination
                    .delete_partition(self.table, self.date_column, date)
                    .await?;
                info!(
                    table = %self.table,
                    column = self.date_column,
                    date = %date,
                    deleted,
                    "Deleted existing rows for {}",
                    date
                );
                Ok(Replaced::Deleted(deleted))
            }
        }
    }
}
