use crate::error::CliError;
use clap::Parser;
use connectors::sql::{
    base::{destination::TableName, source::SourceTable},
    bigquery::{
        auth::TokenSource,
        client::{BigQueryConfig, DEFAULT_ENDPOINT, DateParamType},
    },
    postgres::utils::{PgConnectOptions, PgSslMode},
};
use engine_core::{
    config::{DEFAULT_CHUNK_SIZE, PipelineConfig, QueryTemplate, ReplaceMode},
    error::ConfigError,
    retry::RetryPolicy,
};
use model::core::date::PartitionDate;
use std::{path::PathBuf, time::Duration};

#[derive(Parser, Debug)]
#[command(
    name = "partload",
    version,
    about = "Reload one day's partition from BigQuery into a PostgreSQL table"
)]
pub struct Args {
    /// Partition date (YYYY-MM-DD). Defaults to yesterday.
    #[arg(long)]
    pub fecha: Option<PartitionDate>,

    /// File with the extract query; must contain the $fecha placeholder.
    #[arg(long)]
    pub sql_file: PathBuf,

    #[arg(long, default_value = "base")]
    pub db_name: String,

    #[arg(long, default_value = "postgres")]
    pub db_user: String,

    #[arg(long, env = "PARTLOAD_DB_PASSWORD", hide_env_values = true)]
    pub db_password: Option<String>,

    #[arg(long, default_value = "localhost")]
    pub db_host: String,

    #[arg(long, default_value_t = 5432)]
    pub db_port: u16,

    /// disable, prefer or require
    #[arg(long, default_value = "prefer")]
    pub db_sslmode: PgSslMode,

    /// Destination table, optionally schema-qualified.
    #[arg(long)]
    pub table_name: TableName,

    #[arg(long, default_value = "fecha")]
    pub date_column_destino: String,

    #[arg(long, default_value = "fecha")]
    pub date_column_origen: String,

    /// Truncate the whole destination table instead of deleting the date.
    #[arg(long)]
    pub truncate: bool,

    #[arg(long)]
    pub project_id: String,

    #[arg(long)]
    pub dataset_id: String,

    #[arg(long)]
    pub table_id: String,

    /// Project that runs (and pays for) the query jobs. Defaults to --project-id.
    #[arg(long)]
    pub project_id_run: Option<String>,

    #[arg(long, default_value = "us-east4")]
    pub gcp_location: String,

    /// BigQuery type of the bound date: date or string.
    #[arg(long, default_value = "date")]
    pub date_param_type: DateParamType,

    /// Rows per load transaction.
    #[arg(long, default_value_t = DEFAULT_CHUNK_SIZE)]
    pub chunk_size: usize,

    #[arg(long, default_value_t = 5)]
    pub max_attempts: u32,

    /// Fixed delay between attempts.
    #[arg(long, default_value_t = 5)]
    pub backoff_secs: u64,

    /// OAuth bearer token. Falls back to `gcloud auth print-access-token`.
    #[arg(long, env = "GOOGLE_OAUTH_ACCESS_TOKEN", hide_env_values = true)]
    pub access_token: Option<String>,

    #[arg(long, default_value = DEFAULT_ENDPOINT)]
    pub bigquery_endpoint: String,

    /// Rows requested per BigQuery result page.
    #[arg(long, default_value_t = 10_000)]
    pub page_size: u32,
}

/// Everything needed to build the connectors and the pipeline.
#[derive(Debug)]
pub struct RunSettings {
    pub pipeline: PipelineConfig,
    pub bigquery: BigQueryConfig,
    pub tokens: TokenSource,
    pub postgres: PgConnectOptions,
    /// File stem of the query template, used in the startup banner.
    pub script_name: String,
}

impl Args {
    pub async fn into_settings(self) -> Result<RunSettings, CliError> {
        if self.max_attempts == 0 {
            return Err(ConfigError::InvalidRetryBound.into());
        }
        if self.page_size == 0 {
            return Err(CliError::InvalidArgument {
                arg: "--page-size",
                message: "must be greater than zero".into(),
            });
        }

        let query = QueryTemplate::from_file(&self.sql_file).await?;
        let script_name = self
            .sql_file
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default();

        let pipeline = PipelineConfig {
            date: self.fecha.unwrap_or_else(PartitionDate::yesterday),
            source_table: SourceTable::new(&self.project_id, &self.dataset_id, &self.table_id),
            source_date_column: self.date_column_origen,
            destination_table: self.table_name,
            destination_date_column: self.date_column_destino,
            replace_mode: if self.truncate {
                ReplaceMode::Truncate
            } else {
                ReplaceMode::DeleteByDate
            },
            query,
            chunk_size: self.chunk_size,
            retry: RetryPolicy::new(self.max_attempts, Duration::from_secs(self.backoff_secs)),
        };
        pipeline.validate()?;

        let run_project = self.project_id_run.as_deref().unwrap_or(&self.project_id);
        let mut bigquery = BigQueryConfig::new(run_project, &self.gcp_location);
        bigquery.endpoint = self.bigquery_endpoint.trim_end_matches('/').to_string();
        bigquery.date_param_type = self.date_param_type;
        bigquery.page_size = self.page_size;

        let tokens = match self.access_token {
            Some(token) if !token.trim().is_empty() => TokenSource::Static(token.trim().to_string()),
            _ => TokenSource::Gcloud,
        };

        let postgres = PgConnectOptions {
            host: self.db_host,
            port: self.db_port,
            dbname: self.db_name,
            user: self.db_user,
            password: self.db_password,
            ssl_mode: self.db_sslmode,
        };

        Ok(RunSettings {
            pipeline,
            bigquery,
            tokens,
            postgres,
            script_name,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn template_file() -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new()
            .prefix("ventas_diarias")
            .suffix(".sql")
            .tempfile()
            .unwrap();
        writeln!(file, "SELECT * FROM `p.d.t` WHERE fecha = '$fecha'").unwrap();
        file
    }

    fn base_args(sql: &str) -> Vec<String> {
        [
            "partload",
            "--sql-file",
            sql,
            "--table-name",
            "public.ventas",
            "--project-id",
            "data-project",
            "--dataset-id",
            "ventas",
            "--table-id",
            "diarias",
            "--access-token",
            "token",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect()
    }

    #[tokio::test]
    async fn test_defaults() {
        let file = template_file();
        let args = Args::try_parse_from(base_args(file.path().to_str().unwrap())).unwrap();
        let settings = args.into_settings().await.unwrap();

        let pipeline = &settings.pipeline;
        assert_eq!(pipeline.date, PartitionDate::yesterday());
        assert_eq!(pipeline.chunk_size, 100_000);
        assert_eq!(pipeline.replace_mode, ReplaceMode::DeleteByDate);
        assert_eq!(pipeline.retry, RetryPolicy::default());
        assert_eq!(pipeline.source_date_column, "fecha");
        assert_eq!(pipeline.destination_date_column, "fecha");
        assert_eq!(pipeline.query.sql(), "SELECT * FROM `p.d.t` WHERE fecha = @fecha\n");

        assert_eq!(settings.bigquery.run_project, "data-project");
        assert_eq!(settings.bigquery.location, "us-east4");
        assert_eq!(settings.bigquery.endpoint, DEFAULT_ENDPOINT);
        assert_eq!(settings.postgres.port, 5432);
        assert_eq!(settings.postgres.ssl_mode, PgSslMode::Prefer);
        assert!(matches!(settings.tokens, TokenSource::Static(_)));
        assert!(settings.script_name.starts_with("ventas_diarias"));
    }

    #[tokio::test]
    async fn test_overrides() {
        let file = template_file();
        let mut argv = base_args(file.path().to_str().unwrap());
        argv.extend(
            [
                "--fecha",
                "2024-06-01",
                "--truncate",
                "--chunk-size",
                "500",
                "--max-attempts",
                "2",
                "--backoff-secs",
                "1",
                "--project-id-run",
                "billing",
                "--date-param-type",
                "string",
            ]
            .iter()
            .map(|s| s.to_string()),
        );

        let settings = Args::try_parse_from(argv)
            .unwrap()
            .into_settings()
            .await
            .unwrap();

        assert_eq!(settings.pipeline.date.to_string(), "2024-06-01");
        assert_eq!(settings.pipeline.replace_mode, ReplaceMode::Truncate);
        assert_eq!(settings.pipeline.chunk_size, 500);
        assert_eq!(
            settings.pipeline.retry,
            RetryPolicy::new(2, Duration::from_secs(1))
        );
        assert_eq!(settings.bigquery.run_project, "billing");
        assert_eq!(settings.bigquery.date_param_type, DateParamType::String);
    }

    #[test]
    fn test_rejects_malformed_date() {
        let mut argv = base_args("query.sql");
        argv.extend(["--fecha".to_string(), "01/06/2024".to_string()]);
        assert!(Args::try_parse_from(argv).is_err());
    }

    #[tokio::test]
    async fn test_rejects_zero_chunk_size() {
        let file = template_file();
        let mut argv = base_args(file.path().to_str().unwrap());
        argv.extend(["--chunk-size".to_string(), "0".to_string()]);

        let err = Args::try_parse_from(argv)
            .unwrap()
            .into_settings()
            .await
            .unwrap_err();
        assert!(matches!(err, CliError::Config(ConfigError::InvalidChunkSize)));
    }

    #[tokio::test]
    async fn test_rejects_embedded_date_token() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "SELECT * FROM `p.d.t` WHERE ts >= '$fecha 00:00:00'").unwrap();

        let err = Args::try_parse_from(base_args(file.path().to_str().unwrap()))
            .unwrap()
            .into_settings()
            .await
            .unwrap_err();
        assert!(matches!(err, CliError::Config(ConfigError::EmbeddedDateToken(_))));
    }

    #[tokio::test]
    async fn test_rejects_zero_attempts() {
        let file = template_file();
        let mut argv = base_args(file.path().to_str().unwrap());
        argv.extend(["--max-attempts".to_string(), "0".to_string()]);

        let err = Args::try_parse_from(argv)
            .unwrap()
            .into_settings()
            .await
            .unwrap_err();
        assert!(matches!(err, CliError::Config(ConfigError::InvalidRetryBound)));
    }
}
