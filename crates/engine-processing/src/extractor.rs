use crate::error::PipelineError;
use connectors::sql::base::source::{DataSource, RowStream, SourceQuery};
use model::records::{batch::RowBatch, row::Row};
use tracing::debug;

/// Regroups the pages of a source result into batches of exactly
/// `chunk_size` rows. Only the final batch may be shorter.
///
/// Forward-only: once a batch has been handed out it cannot be produced
/// again. A retry has to run the query again through [`ChunkedExtractor::start`].
pub struct ChunkedExtractor {
    stream: Box<dyn RowStream>,
    chunk_size: usize,
    buffer: Vec<Row>,
    next_index: usize,
    exhausted: bool,
}

impl ChunkedExtractor {
    pub async fn start(
        source: &dyn DataSource,
        query: &SourceQuery,
        chunk_size: usize,
    ) -> Result<Self, PipelineError> {
        let stream = source.query(query).await?;
        Ok(Self::new(stream, chunk_size))
    }

    pub fn new(stream: Box<dyn RowStream>, chunk_size: usize) -> Self {
        let chunk_size = chunk_size.max(1);
        Self {
            stream,
            chunk_size,
            buffer: Vec::new(),
            next_index: 0,
            exhausted: false,
        }
    }

    /// Pulls pages until a full batch is available or the result ends.
    /// Returns `None` once every row has been handed out.
    pub async fn next_batch(&mut self) -> Result<Option<RowBatch>, PipelineError> {
        while !self.exhausted && self.buffer.len() < self.chunk_size {
            match self.stream.next_page().await? {
                Some(page) => self.buffer.extend(page),
                None => self.exhausted = true,
            }
        }

        if self.buffer.is_empty() {
            return Ok(None);
        }

        let take = self.buffer.len().min(self.chunk_size);
        let rest = self.buffer.split_off(take);
        let rows = std::mem::replace(&mut self.buffer, rest);

        let batch = RowBatch::new(self.next_index, rows);
        self.next_index += 1;
        debug!(batch = batch.index, rows = batch.len(), "Batch extracted");
        Ok(Some(batch))
    }

    pub fn batches_emitted(&self) -> usize {
        self.next_index
    }
}
