use crate::error::PipelineError;
use connectors::sql::base::source::{DataSource, SourceTable};
use model::core::date::PartitionDate;
use tracing::info;

/// Result of probing the source partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Availability {
    Empty,
    Rows(u64),
}

/// Asks the warehouse whether the partition has rows before anything on
/// the destination is touched.
pub struct SourceAvailabilityChecker<'a> {
    source: &'a dyn DataSource,
    table: &'a SourceTable,
    date_column: &'a str,
}

impl<'a> SourceAvailabilityChecker<'a> {
    pub fn new(source: &'a dyn DataSource, table: &'a SourceTable, date_column: &'a str) -> Self {
        Self {
            source,
            table,
            date_column,
        }
    }

    pub async fn check(&self, date: PartitionDate) -> Result<Availability, PipelineError> {
        let count = self
            .source
            .count_partition_rows(self.table, self.date_column, date)
            .await?;

        info!(
            table = %self.table,
            date = %date,
            rows = count,
            "Source has {} rows for {}",
            format_count(count),
            date
        );

        Ok(match count {
            0 => Availability::Empty,
            n => Availability::Rows(n),
        })
    }
}

/// `1234567` -> `1,234,567`
pub fn format_count(count: u64) -> String {
    let digits = count.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}
