#![allow(dead_code)]

use async_trait::async_trait;
use connectors::{
    error::{DestinationError, SourceError},
    sql::base::{
        destination::{DataDestination, DestinationConnector, TableName},
        source::{DataSource, RowStream, SourceConnector, SourceQuery, SourceTable},
    },
};
use engine_core::{
    config::{PipelineConfig, QueryTemplate, ReplaceMode},
    progress::{BatchProgress, ProgressObserver},
    retry::RetryPolicy,
};
use model::{
    core::{date::PartitionDate, value::Value},
    records::{batch::RowBatch, row::Row},
};
use std::{
    collections::{HashMap, HashSet, VecDeque},
    error::Error,
    sync::{Arc, Mutex},
    time::Duration,
};

/// Position of the date column in every row built by [`sales_rows`].
pub const DATE_COLUMN_INDEX: usize = 1;

pub const EXTRACT_QUERY: &str =
    "SELECT id, fecha, producto FROM `p.ventas.diarias` WHERE fecha = '$fecha'";

pub fn date(s: &str) -> PartitionDate {
    s.parse().expect("valid date")
}

/// `count` rows of `(id, fecha, producto)` starting at id `first_id`.
pub fn sales_rows(date: PartitionDate, first_id: i64, count: usize) -> Vec<Row> {
    (first_id..first_id + count as i64)
        .map(|id| {
            Row::new(vec![
                Value::Int(id),
                Value::Date(date.as_naive()),
                Value::String(format!("producto-{id}")),
            ])
        })
        .collect()
}

pub fn pipeline_config(fecha: PartitionDate, chunk_size: usize) -> PipelineConfig {
    PipelineConfig {
        date: fecha,
        source_table: SourceTable::new("p", "ventas", "diarias"),
        source_date_column: "fecha".into(),
        destination_table: "public.ventas".parse().expect("valid table"),
        destination_date_column: "fecha".into(),
        replace_mode: ReplaceMode::DeleteByDate,
        query: QueryTemplate::new(EXTRACT_QUERY).expect("template has date token"),
        chunk_size,
        retry: RetryPolicy::new(5, Duration::from_secs(5)),
    }
}

fn row_date(row: &Row) -> Option<PartitionDate> {
    match row.get(DATE_COLUMN_INDEX) {
        Some(Value::Date(d)) => Some(PartitionDate::new(*d)),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Source double
// ---------------------------------------------------------------------------

#[derive(Default)]
struct WarehouseState {
    partitions: HashMap<PartitionDate, Vec<Row>>,
    connects: u32,
    queries: Vec<SourceQuery>,
    fail_connects: HashSet<u32>,
    /// (connect number, pages served before the stream breaks)
    fail_streams: HashMap<u32, usize>,
}

/// In-memory warehouse. Every `connect` is one attempt; failures are planned
/// per connect number (1-based).
#[derive(Clone)]
pub struct MemoryWarehouse {
    state: Arc<Mutex<WarehouseState>>,
    page_size: usize,
}

impl MemoryWarehouse {
    pub fn new(page_size: usize) -> Self {
        Self {
            state: Arc::new(Mutex::new(WarehouseState::default())),
            page_size,
        }
    }

    pub fn with_partition(self, date: PartitionDate, rows: Vec<Row>) -> Self {
        self.state.lock().unwrap().partitions.insert(date, rows);
        self
    }

    pub fn fail_connect(self, connects: &[u32]) -> Self {
        self.state
            .lock()
            .unwrap()
            .fail_connects
            .extend(connects.iter().copied());
        self
    }

    pub fn break_stream(self, connect: u32, after_pages: usize) -> Self {
        self.state
            .lock()
            .unwrap()
            .fail_streams
            .insert(connect, after_pages);
        self
    }

    pub fn connects(&self) -> u32 {
        self.state.lock().unwrap().connects
    }

    pub fn queries(&self) -> Vec<SourceQuery> {
        self.state.lock().unwrap().queries.clone()
    }
}

#[async_trait]
impl SourceConnector for MemoryWarehouse {
    async fn connect(&self) -> Result<Box<dyn DataSource>, SourceError> {
        let mut state = self.state.lock().unwrap();
        state.connects += 1;
        let connect = state.connects;
        if state.fail_connects.contains(&connect) {
            return Err(SourceError::Api {
                status: 503,
                message: format!("warehouse unavailable (connect {connect})"),
            });
        }
        Ok(Box::new(MemorySource {
            state: self.state.clone(),
            page_size: self.page_size,
            break_after: state.fail_streams.get(&connect).copied(),
        }))
    }
}

struct MemorySource {
    state: Arc<Mutex<WarehouseState>>,
    page_size: usize,
    break_after: Option<usize>,
}

#[async_trait]
impl DataSource for MemorySource {
    async fn count_partition_rows(
        &self,
        _table: &SourceTable,
        _date_column: &str,
        date: PartitionDate,
    ) -> Result<u64, SourceError> {
        let state = self.state.lock().unwrap();
        Ok(state.partitions.get(&date).map_or(0, |rows| rows.len() as u64))
    }

    async fn query(&self, query: &SourceQuery) -> Result<Box<dyn RowStream>, SourceError> {
        let mut state = self.state.lock().unwrap();
        state.queries.push(query.clone());
        let rows = state.partitions.get(&query.date).cloned().unwrap_or_default();
        let pages = rows
            .chunks(self.page_size)
            .map(|page| page.to_vec())
            .collect();
        Ok(Box::new(MemoryStream {
            pages,
            served: 0,
            break_after: self.break_after,
        }))
    }
}

struct MemoryStream {
    pages: VecDeque<Vec<Row>>,
    served: usize,
    break_after: Option<usize>,
}

#[async_trait]
impl RowStream for MemoryStream {
    async fn next_page(&mut self) -> Result<Option<Vec<Row>>, SourceError> {
        if self.break_after == Some(self.served) {
            return Err(SourceError::InvalidResponse("result stream reset".into()));
        }
        self.served += 1;
        Ok(self.pages.pop_front())
    }
}

// ---------------------------------------------------------------------------
// Destination double
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TableEvent {
    Connect,
    Truncate,
    Delete(PartitionDate),
    Load { batch: usize, rows: usize },
}

#[derive(Default)]
struct TableState {
    rows: Vec<Row>,
    events: Vec<TableEvent>,
    connects: u32,
    fail_connects: HashSet<u32>,
    /// (connect number, batch index) whose load fails
    fail_loads: HashSet<(u32, usize)>,
    unsupported_partition_type: bool,
}

/// In-memory destination table. Committed rows survive failed attempts,
/// like a real table would keep batches committed before an error.
#[derive(Clone, Default)]
pub struct MemoryTable {
    state: Arc<Mutex<TableState>>,
}

impl MemoryTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rows(self, rows: Vec<Row>) -> Self {
        self.state.lock().unwrap().rows.extend(rows);
        self
    }

    pub fn fail_connect(self, connects: &[u32]) -> Self {
        self.state
            .lock()
            .unwrap()
            .fail_connects
            .extend(connects.iter().copied());
        self
    }

    pub fn fail_load(self, connect: u32, batch: usize) -> Self {
        self.state
            .lock()
            .unwrap()
            .fail_loads
            .insert((connect, batch));
        self
    }

    pub fn with_unsupported_partition_type(self) -> Self {
        self.state.lock().unwrap().unsupported_partition_type = true;
        self
    }

    pub fn rows(&self) -> Vec<Row> {
        self.state.lock().unwrap().rows.clone()
    }

    pub fn count_for(&self, date: PartitionDate) -> usize {
        self.state
            .lock()
            .unwrap()
            .rows
            .iter()
            .filter(|row| row_date(row) == Some(date))
            .count()
    }

    pub fn events(&self) -> Vec<TableEvent> {
        self.state.lock().unwrap().events.clone()
    }

    pub fn connects(&self) -> u32 {
        self.state.lock().unwrap().connects
    }

    /// Row sizes of every load, in order.
    pub fn load_sizes(&self) -> Vec<usize> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                TableEvent::Load { rows, .. } => Some(rows),
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl DestinationConnector for MemoryTable {
    async fn connect(&self) -> Result<Box<dyn DataDestination>, DestinationError> {
        let mut state = self.state.lock().unwrap();
        state.connects += 1;
        let connect = state.connects;
        if state.fail_connects.contains(&connect) {
            return Err(DestinationError::Write(format!(
                "connection refused (connect {connect})"
            )));
        }
        state.events.push(TableEvent::Connect);
        Ok(Box::new(MemorySession {
            state: self.state.clone(),
            connect,
        }))
    }
}

struct MemorySession {
    state: Arc<Mutex<TableState>>,
    connect: u32,
}

#[async_trait]
impl DataDestination for MemorySession {
    async fn truncate(&self, _table: &TableName) -> Result<(), DestinationError> {
        let mut state = self.state.lock().unwrap();
        state.rows.clear();
        state.events.push(TableEvent::Truncate);
        Ok(())
    }

    async fn delete_partition(
        &self,
        _table: &TableName,
        date_column: &str,
        date: PartitionDate,
    ) -> Result<u64, DestinationError> {
        let mut state = self.state.lock().unwrap();
        if state.unsupported_partition_type {
            return Err(DestinationError::UnsupportedPartitionType {
                column: date_column.to_string(),
                type_name: "int4".into(),
            });
        }
        let before = state.rows.len();
        state.rows.retain(|row| row_date(row) != Some(date));
        let deleted = (before - state.rows.len()) as u64;
        state.events.push(TableEvent::Delete(date));
        Ok(deleted)
    }

    async fn load_batch(
        &self,
        _table: &TableName,
        batch: &RowBatch,
    ) -> Result<u64, DestinationError> {
        let mut state = self.state.lock().unwrap();
        if state.fail_loads.contains(&(self.connect, batch.index)) {
            return Err(DestinationError::Write(format!(
                "connection lost during batch {}",
                batch.index
            )));
        }
        state.rows.extend(batch.rows.iter().cloned());
        state.events.push(TableEvent::Load {
            batch: batch.index,
            rows: batch.len(),
        });
        Ok(batch.len() as u64)
    }
}

// ---------------------------------------------------------------------------
// Observer double
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct RecordingObserver {
    batches: Mutex<Vec<BatchProgress>>,
    failures: Mutex<Vec<(u32, String)>>,
}

impl RecordingObserver {
    pub fn batches(&self) -> Vec<BatchProgress> {
        self.batches.lock().unwrap().clone()
    }

    pub fn failures(&self) -> Vec<(u32, String)> {
        self.failures.lock().unwrap().clone()
    }
}

impl ProgressObserver for RecordingObserver {
    fn on_batch_loaded(&self, progress: &BatchProgress) {
        self.batches.lock().unwrap().push(*progress);
    }

    fn on_attempt_failed(&self, attempt: u32, error: &(dyn Error + 'static)) {
        self.failures
            .lock()
            .unwrap()
            .push((attempt, error.to_string()));
    }
}
