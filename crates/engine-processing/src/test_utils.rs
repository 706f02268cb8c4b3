use async_trait::async_trait;
use connectors::{
    error::{DestinationError, SourceError},
    sql::base::{
        destination::{DataDestination, TableName},
        source::{DataSource, RowStream, SourceQuery, SourceTable},
    },
};
use model::{
    core::{date::PartitionDate, value::Value},
    records::{batch::RowBatch, row::Row},
};
use std::{collections::VecDeque, ops::Range, sync::Mutex};

pub fn rows(ids: Range<i64>) -> Vec<Row> {
    ids.map(|id| Row::new(vec![Value::Int(id), Value::String(format!("row-{id}"))]))
        .collect()
}

pub struct PagedStream {
    pages: VecDeque<Vec<Row>>,
    served: usize,
    fail_after: Option<usize>,
}

impl PagedStream {
    pub fn new(rows: Vec<Row>, page_size: usize) -> Self {
        let pages = rows.chunks(page_size).map(|c| c.to_vec()).collect();
        Self {
            pages,
            served: 0,
            fail_after: None,
        }
    }

    pub fn fail_after_pages(mut self, pages: usize) -> Self {
        self.fail_after = Some(pages);
        self
    }
}

#[async_trait]
impl RowStream for PagedStream {
    async fn next_page(&mut self) -> Result<Option<Vec<Row>>, SourceError> {
        if self.fail_after == Some(self.served) {
            return Err(SourceError::InvalidResponse("stream reset".into()));
        }
        self.served += 1;
        Ok(self.pages.pop_front())
    }
}

#[derive(Default)]
pub struct StaticSource {
    count: u64,
    fail_count: bool,
    last_count: Mutex<Option<(String, PartitionDate)>>,
}

impl StaticSource {
    pub fn with_count(count: u64) -> Self {
        Self {
            count,
            ..Default::default()
        }
    }

    pub fn failing_count() -> Self {
        Self {
            fail_count: true,
            ..Default::default()
        }
    }

    pub fn last_count_request(&self) -> Option<(String, PartitionDate)> {
        self.last_count.lock().unwrap().clone()
    }
}

#[async_trait]
impl DataSource for StaticSource {
    async fn count_partition_rows(
        &self,
        _table: &SourceTable,
        date_column: &str,
        date: PartitionDate,
    ) -> Result<u64, SourceError> {
        if self.fail_count {
            return Err(SourceError::Api {
                status: 503,
                message: "backend error".into(),
            });
        }
        *self.last_count.lock().unwrap() = Some((date_column.to_string(), date));
        Ok(self.count)
    }

    async fn query(&self, _query: &SourceQuery) -> Result<Box<dyn RowStream>, SourceError> {
        Ok(Box::new(PagedStream::new(
            rows(0..self.count as i64),
            1_000,
        )))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Truncate,
    Delete { column: String, date: PartitionDate },
    Load { rows: usize },
}

#[derive(Default)]
struct DestinationState {
    calls: Vec<Call>,
    rows: u64,
}

#[derive(Default)]
pub struct RecordingDestination {
    state: Mutex<DestinationState>,
    fail_loads: bool,
}

impl RecordingDestination {
    pub fn with_existing(rows: u64) -> Self {
        let destination = Self::default();
        destination.state.lock().unwrap().rows = rows;
        destination
    }

    pub fn failing_loads() -> Self {
        Self {
            fail_loads: true,
            ..Default::default()
        }
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn row_count(&self) -> u64 {
        self.state.lock().unwrap().rows
    }
}

#[async_trait]
impl DataDestination for RecordingDestination {
    async fn truncate(&self, _table: &TableName) -> Result<(), DestinationError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::Truncate);
        state.rows = 0;
        Ok(())
    }

    async fn delete_partition(
        &self,
        _table: &TableName,
        date_column: &str,
        date: PartitionDate,
    ) -> Result<u64, DestinationError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::Delete {
            column: date_column.to_string(),
            date,
        });
        Ok(std::mem::take(&mut state.rows))
    }

    async fn load_batch(
        &self,
        _table: &TableName,
        batch: &RowBatch,
    ) -> Result<u64, DestinationError> {
        if self.fail_loads {
            return Err(DestinationError::Write("connection reset".into()));
        }
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::Load { rows: batch.len() });
        state.rows += batch.len() as u64;
        Ok(batch.len() as u64)
    }
}
