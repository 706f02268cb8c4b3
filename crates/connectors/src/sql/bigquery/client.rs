use crate::{
    dialect::{BigQuery, Dialect},
    error::{IdentifierError, SourceError},
    sql::{
        base::source::{
            DATE_PARAM_NAME, DataSource, RowStream, SourceConnector, SourceQuery, SourceTable,
        },
        bigquery::{
            auth::TokenSource,
            decode::decode_row,
            types::{
                ErrorResponse, FormatOptions, JobReference, QueryParameter, QueryRequest,
                QueryResponse, TableFieldSchema, TableRow,
            },
        },
    },
};
use async_trait::async_trait;
use model::{
    core::{date::PartitionDate, value::Value},
    records::row::Row,
};
use reqwest::RequestBuilder;
use std::{str::FromStr, sync::Arc, time::Duration};
use tracing::{debug, info};

pub const DEFAULT_ENDPOINT: &str = "https://bigquery.googleapis.com/bigquery/v2";

/// BigQuery type used when binding the partition date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DateParamType {
    /// For `DATE` partition columns.
    #[default]
    Date,
    /// For date columns stored as `YYYY-MM-DD` strings.
    String,
}

impl DateParamType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DateParamType::Date => "DATE",
            DateParamType::String => "STRING",
        }
    }
}

impl FromStr for DateParamType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "date" => Ok(DateParamType::Date),
            "string" => Ok(DateParamType::String),
            other => Err(format!("unknown date parameter type '{other}'")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct BigQueryConfig {
    /// REST base URL, up to and including `/bigquery/v2`.
    pub endpoint: String,
    /// Project billed for the query jobs.
    pub run_project: String,
    pub location: String,
    pub date_param_type: DateParamType,
    /// Rows requested per result page.
    pub page_size: u32,
    /// Server-side wait per `jobs.query` / `getQueryResults` call.
    pub call_timeout: Duration,
    pub poll_interval: Duration,
    pub max_polls: u32,
}

impl BigQueryConfig {
    pub fn new(run_project: &str, location: &str) -> Self {
        BigQueryConfig {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            run_project: run_project.to_string(),
            location: location.to_string(),
            date_param_type: DateParamType::Date,
            page_size: 10_000,
            call_timeout: Duration::from_secs(10),
            poll_interval: Duration::from_secs(1),
            max_polls: 360,
        }
    }
}

pub fn count_statement(table: &SourceTable, date_column: &str) -> Result<String, IdentifierError> {
    Ok(format!(
        "SELECT COUNT(*) AS count FROM {} WHERE {} = @{}",
        BigQuery.quote_identifier(&table.to_string())?,
        BigQuery.quote_identifier(date_column)?,
        DATE_PARAM_NAME
    ))
}

/// One authenticated session against the BigQuery REST API.
#[derive(Clone)]
pub struct BigQuerySource {
    http: reqwest::Client,
    config: Arc<BigQueryConfig>,
    token: String,
}

impl BigQuerySource {
    pub fn new(http: reqwest::Client, config: Arc<BigQueryConfig>, token: String) -> Self {
        BigQuerySource {
            http,
            config,
            token,
        }
    }

    fn queries_url(&self) -> String {
        format!(
            "{}/projects/{}/queries",
            self.config.endpoint.trim_end_matches('/'),
            self.config.run_project
        )
    }

    fn date_parameter(&self, date: PartitionDate) -> QueryParameter {
        QueryParameter::scalar(
            DATE_PARAM_NAME,
            self.config.date_param_type.as_str(),
            date.to_string(),
        )
    }

    async fn start_query(
        &self,
        sql: &str,
        date: PartitionDate,
    ) -> Result<QueryResponse, SourceError> {
        let body = QueryRequest {
            query: sql,
            use_legacy_sql: false,
            location: &self.config.location,
            max_results: self.config.page_size,
            timeout_ms: self.config.call_timeout.as_millis() as u64,
            parameter_mode: "NAMED",
            query_parameters: vec![self.date_parameter(date)],
            format_options: FormatOptions {
                use_int64_timestamp: true,
            },
        };
        debug!(sql, %date, "Starting BigQuery job");
        let request = self.http.post(self.queries_url()).json(&body);
        self.send(request).await
    }

    async fn query_results(
        &self,
        job: &JobReference,
        page_token: Option<&str>,
    ) -> Result<QueryResponse, SourceError> {
        let url = format!("{}/{}", self.queries_url(), job.job_id);
        let location = job.location.as_deref().unwrap_or(&self.config.location);
        let mut params = vec![
            ("location", location.to_string()),
            ("maxResults", self.config.page_size.to_string()),
            ("timeoutMs", self.config.call_timeout.as_millis().to_string()),
            ("formatOptions.useInt64Timestamp", "true".to_string()),
        ];
        if let Some(token) = page_token {
            params.push(("pageToken", token.to_string()));
        }
        self.send(self.http.get(url).query(&params)).await
    }

    /// Starts the job and polls until BigQuery reports it complete.
    async fn run_to_completion(
        &self,
        sql: &str,
        date: PartitionDate,
    ) -> Result<QueryResponse, SourceError> {
        let mut response = self.start_query(sql, date).await?;
        let mut polls = 0;

        while !response.job_complete {
            let job = response.job_reference.clone().ok_or_else(|| {
                SourceError::InvalidResponse("incomplete job without a job reference".into())
            })?;
            if polls >= self.config.max_polls {
                return Err(SourceError::JobIncomplete {
                    job_id: job.job_id,
                    polls,
                });
            }
            polls += 1;
            debug!(job_id = %job.job_id, polls, "Waiting for BigQuery job");
            tokio::time::sleep(self.config.poll_interval).await;
            response = self.query_results(&job, None).await?;
        }

        Ok(response)
    }

    async fn send(&self, request: RequestBuilder) -> Result<QueryResponse, SourceError> {
        let response = request.bearer_auth(&self.token).send().await?;
        let status = response.status();
        let body = response.bytes().await?;

        if !status.is_success() {
            let message = serde_json::from_slice::<ErrorResponse>(&body)
                .map(|err| err.error.message)
                .unwrap_or_else(|_| String::from_utf8_lossy(&body).into_owned());
            return Err(SourceError::Api {
                status: status.as_u16(),
                message,
            });
        }

        Ok(serde_json::from_slice(&body)?)
    }
}

#[async_trait]
impl DataSource for BigQuerySource {
    async fn count_partition_rows(
        &self,
        table: &SourceTable,
        date_column: &str,
        date: PartitionDate,
    ) -> Result<u64, SourceError> {
        let sql = count_statement(table, date_column)?;
        let response = self.run_to_completion(&sql, date).await?;

        let fields = response.schema.map(|s| s.fields).unwrap_or_default();
        let row = response
            .rows
            .into_iter()
            .next()
            .ok_or_else(|| SourceError::InvalidResponse("count query returned no rows".into()))?;
        let row = decode_row(&fields, row)?;

        row.get(0).and_then(Value::as_u64).ok_or_else(|| {
            SourceError::InvalidResponse(format!("count query returned {:?}", row.get(0)))
        })
    }

    async fn query(&self, query: &SourceQuery) -> Result<Box<dyn RowStream>, SourceError> {
        let response = self.run_to_completion(&query.sql, query.date).await?;
        if let Some(total) = &response.total_rows {
            info!(total_rows = %total, "Source query finished");
        }

        Ok(Box::new(BigQueryRowStream {
            source: self.clone(),
            job: response.job_reference,
            fields: response.schema.map(|s| s.fields).unwrap_or_default(),
            buffered: Some(response.rows),
            page_token: response.page_token,
        }))
    }
}

/// Lazily pages through a finished query job.
pub struct BigQueryRowStream {
    source: BigQuerySource,
    job: Option<JobReference>,
    fields: Vec<TableFieldSchema>,
    buffered: Option<Vec<TableRow>>,
    page_token: Option<String>,
}

#[async_trait]
impl RowStream for BigQueryRowStream {
    async fn next_page(&mut self) -> Result<Option<Vec<Row>>, SourceError> {
        loop {
            if let Some(rows) = self.buffered.take()
                && !rows.is_empty()
            {
                let rows = rows
                    .into_iter()
                    .map(|row| decode_row(&self.fields, row))
                    .collect::<Result<Vec<_>, _>>()?;
                return Ok(Some(rows));
            }

            let Some(token) = self.page_token.take() else {
                return Ok(None);
            };
            let job = self.job.as_ref().ok_or_else(|| {
                SourceError::InvalidResponse("page token without a job reference".into())
            })?;
            let response = self.source.query_results(job, Some(&token)).await?;
            self.page_token = response.page_token;
            self.buffered = Some(response.rows);
        }
    }
}

/// Builds a fresh HTTP client and token for every attempt.
#[derive(Debug, Clone)]
pub struct BigQueryConnector {
    config: Arc<BigQueryConfig>,
    tokens: TokenSource,
}

impl BigQueryConnector {
    pub fn new(config: BigQueryConfig, tokens: TokenSource) -> Self {
        BigQueryConnector {
            config: Arc::new(config),
            tokens,
        }
    }
}

#[async_trait]
impl SourceConnector for BigQueryConnector {
    async fn connect(&self) -> Result<Box<dyn DataSource>, SourceError> {
        let token = self.tokens.token().await?;
        let http = reqwest::Client::builder()
            .user_agent(concat!("partload/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Box::new(BigQuerySource::new(http, self.config.clone(), token)))
    }
}
