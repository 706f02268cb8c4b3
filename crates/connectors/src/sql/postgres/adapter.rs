use crate::{
    dialect::{Dialect, Postgres},
    error::DestinationError,
    sql::{
        base::{
            destination::{DataDestination, DestinationConnector, TableName},
            encoder::CopyValueEncoder,
        },
        postgres::{
            encoder::{COPY_NULL, PgCopyValueEncoder},
            params::PartitionParam,
            utils::{PgConnectOptions, connect_client},
        },
    },
};
use async_trait::async_trait;
use bytes::Bytes;
use futures_util::{SinkExt, pin_mut};
use model::{core::date::PartitionDate, records::batch::RowBatch};
use tokio::sync::Mutex;
use tokio_postgres::{Client, types::Type};
use tracing::{debug, warn};

/// COPY data is flushed to the server in chunks of roughly this size.
const COPY_FLUSH_BYTES: usize = 64 * 1024;

/// PostgreSQL destination bound to one client connection.
pub struct PgDestination {
    client: Mutex<Client>,
}

impl PgDestination {
    pub fn new(client: Client) -> Self {
        PgDestination {
            client: Mutex::new(client),
        }
    }
}

pub fn truncate_statement(table: &TableName) -> Result<String, DestinationError> {
    Ok(format!("TRUNCATE TABLE {}", table.quoted()?))
}

pub fn delete_statement(
    table: &TableName,
    date_column: &str,
    param_cast: Option<&str>,
) -> Result<String, DestinationError> {
    let param = match param_cast {
        Some(ty) => format!("$1::{ty}"),
        None => "$1".to_string(),
    };
    Ok(format!(
        "DELETE FROM {} WHERE {} = {}",
        table.quoted()?,
        Postgres.quote_identifier(date_column)?,
        param
    ))
}

fn first_param(params: &[Type], statement: &str) -> Result<Type, DestinationError> {
    params
        .first()
        .cloned()
        .ok_or_else(|| DestinationError::Write(format!("statement has no parameter: {statement}")))
}

pub fn copy_statement(table: &TableName) -> Result<String, DestinationError> {
    Ok(format!(
        "COPY {} FROM STDIN WITH (FORMAT csv, NULL '{}')",
        table.quoted()?,
        COPY_NULL
    ))
}

#[async_trait]
impl DataDestination for PgDestination {
    async fn truncate(&self, table: &TableName) -> Result<(), DestinationError> {
        let statement = truncate_statement(table)?;
        debug!(%statement, "Truncating destination table");

        let mut client = self.client.lock().await;
        let tx = client.transaction().await?;
        tx.batch_execute(&statement).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn delete_partition(
        &self,
        table: &TableName,
        date_column: &str,
        date: PartitionDate,
    ) -> Result<u64, DestinationError> {
        let mut statement = delete_statement(table, date_column, None)?;

        let mut client = self.client.lock().await;
        let tx = client.transaction().await?;
        let mut prepared = tx.prepare(&statement).await?;
        let mut param_type = first_param(prepared.params(), &statement)?;
        if let Some(cast) = PartitionParam::session_cast(&param_type) {
            statement = delete_statement(table, date_column, Some(cast))?;
            prepared = tx.prepare(&statement).await?;
            param_type = first_param(prepared.params(), &statement)?;
        }
        debug!(%statement, %date, param_type = %param_type, "Deleting destination partition");
        let param = PartitionParam::for_type(&param_type, date_column, date)?;

        let deleted = tx.execute(&prepared, &[param.as_ref()]).await?;
        tx.commit().await?;
        Ok(deleted)
    }

    async fn load_batch(
        &self,
        table: &TableName,
        batch: &RowBatch,
    ) -> Result<u64, DestinationError> {
        if batch.is_empty() {
            return Ok(0);
        }

        let statement = copy_statement(table)?;
        let encoder = PgCopyValueEncoder::new();
        debug!(%statement, batch = batch.index, rows = batch.len(), "COPY batch");

        let mut client = self.client.lock().await;
        let tx = client.transaction().await?;
        let sink = tx.copy_in(statement.as_str()).await?;
        pin_mut!(sink);

        let mut buf = String::with_capacity(COPY_FLUSH_BYTES);
        for row in &batch.rows {
            encoder.encode_row(row, &mut buf);
            if buf.len() >= COPY_FLUSH_BYTES {
                sink.as_mut().send(Bytes::from(std::mem::take(&mut buf))).await?;
            }
        }
        if !buf.is_empty() {
            sink.as_mut().send(Bytes::from(buf)).await?;
        }

        let written = sink.as_mut().finish().await?;
        tx.commit().await?;

        if written != batch.len() as u64 {
            warn!(
                batch = batch.index,
                expected = batch.len(),
                written,
                "COPY row count differs from batch size"
            );
        }
        Ok(written)
    }
}

/// Opens a new PostgreSQL connection for each attempt.
#[derive(Debug, Clone)]
pub struct PgConnector {
    options: PgConnectOptions,
}

impl PgConnector {
    pub fn new(options: PgConnectOptions) -> Self {
        PgConnector { options }
    }
}

#[async_trait]
impl DestinationConnector for PgConnector {
    async fn connect(&self) -> Result<Box<dyn DataDestination>, DestinationError> {
        debug!(host = %self.options.host, db = %self.options.dbname, "Connecting to PostgreSQL");
        let client = connect_client(self.options.to_config()).await?;
        Ok(Box::new(PgDestination::new(client)))
    }
}
