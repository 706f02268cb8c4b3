use crate::records::row::Row;

/// A bounded group of rows that is loaded and committed together.
///
/// Batches are transient: produced by the extractor, consumed once by the
/// loader, never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct RowBatch {
    /// Zero-based position of the batch within one extraction.
    pub index: usize,
    pub rows: Vec<Row>,
}

impl RowBatch {
    pub fn new(index: usize, rows: Vec<Row>) -> Self {
        RowBatch { index, rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn into_rows(self) -> Vec<Row> {
        self.rows
    }
}
