use crate::{
    dialect::{Dialect, Postgres},
    error::{DestinationError, IdentifierError},
};
use async_trait::async_trait;
use model::{core::date::PartitionDate, records::batch::RowBatch};
use std::{fmt, str::FromStr};

/// Destination table name, optionally schema-qualified (`schema.table`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableName {
    parts: Vec<String>,
}

impl TableName {
    pub fn parts(&self) -> Vec<&str> {
        self.parts.iter().map(String::as_str).collect()
    }

    /// The table name rendered for PostgreSQL, each part quoted.
    pub fn quoted(&self) -> Result<String, IdentifierError> {
        Postgres.quote_path(&self.parts())
    }
}

impl FromStr for TableName {
    type Err = IdentifierError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<String> = s.trim().split('.').map(str::to_string).collect();
        if parts.len() > 3 {
            return Err(IdentifierError {
                dialect: Postgres.name(),
                ident: s.to_string(),
                reason: "too many name parts",
            });
        }
        let name = TableName { parts };
        // Validate eagerly so a bad name fails before any connection is made.
        name.quoted()?;
        Ok(name)
    }
}

impl fmt::Display for TableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.parts.join("."))
    }
}

#[async_trait]
pub trait DataDestination: Send + Sync {
    /// Removes every row of the table, committed before returning.
    async fn truncate(&self, table: &TableName) -> Result<(), DestinationError>;

    /// Removes the rows whose `date_column` equals `date`, committed before
    /// returning. Returns the number of deleted rows.
    async fn delete_partition(
        &self,
        table: &TableName,
        date_column: &str,
        date: PartitionDate,
    ) -> Result<u64, DestinationError>;

    /// Writes every row of `batch` inside one transaction and commits it.
    /// Either the whole batch lands or none of it does.
    async fn load_batch(
        &self,
        table: &TableName,
        batch: &RowBatch,
    ) -> Result<u64, DestinationError>;
}

/// Opens a fresh destination session. Called once per attempt.
#[async_trait]
pub trait DestinationConnector: Send + Sync {
    async fn connect(&self) -> Result<Box<dyn DataDestination>, DestinationError>;
}
