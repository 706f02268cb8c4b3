use crate::error::SourceError;
use async_trait::async_trait;
use model::{core::date::PartitionDate, records::row::Row};
use std::fmt;

/// Name of the bound query parameter that carries the partition date.
pub const DATE_PARAM_NAME: &str = "fecha";

/// Fully qualified warehouse table: `project.dataset.table`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceTable {
    pub project: String,
    pub dataset: String,
    pub table: String,
}

impl SourceTable {
    pub fn new(project: &str, dataset: &str, table: &str) -> Self {
        SourceTable {
            project: project.to_string(),
            dataset: dataset.to_string(),
            table: table.to_string(),
        }
    }

    pub fn parts(&self) -> [&str; 3] {
        [&self.project, &self.dataset, &self.table]
    }
}

impl fmt::Display for SourceTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.project, self.dataset, self.table)
    }
}

/// A parameterized extract statement plus the date bound to
/// [`DATE_PARAM_NAME`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceQuery {
    pub sql: String,
    pub date: PartitionDate,
}

/// Forward-only cursor over a query result, one page at a time.
///
/// Pages arrive in result order. A stream is not restartable: re-reading the
/// data means running the query again.
#[async_trait]
pub trait RowStream: Send {
    /// Next non-empty page of rows, or `None` once the result is exhausted.
    async fn next_page(&mut self) -> Result<Option<Vec<Row>>, SourceError>;
}

#[async_trait]
pub trait DataSource: Send + Sync {
    /// Counts the rows of `table` whose `date_column` equals `date`.
    async fn count_partition_rows(
        &self,
        table: &SourceTable,
        date_column: &str,
        date: PartitionDate,
    ) -> Result<u64, SourceError>;

    /// Executes the extract statement and returns a lazy row stream.
    async fn query(&self, query: &SourceQuery) -> Result<Box<dyn RowStream>, SourceError>;
}

/// Opens a fresh source session. Called once per attempt.
#[async_trait]
pub trait SourceConnector: Send + Sync {
    async fn connect(&self) -> Result<Box<dyn DataSource>, SourceError>;
}
