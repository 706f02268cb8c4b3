use crate::{commands::Args, error::CliError, exit::ExitCode};
use clap::Parser;
use connectors::sql::{bigquery::client::BigQueryConnector, postgres::adapter::PgConnector};
use engine_processing::orchestrator::{RetryOrchestrator, RunOutcome};
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

mod commands;
mod error;
mod exit;

#[tokio::main]
async fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let args = Args::parse();

    let code = match run(args).await {
        Ok(outcome) => ExitCode::from(&outcome),
        Err(err) => {
            error!(kind = err.kind(), error = %err, "partload failed");
            ExitCode::Failure
        }
    };

    std::process::exit(code.as_i32());
}

async fn run(args: Args) -> Result<RunOutcome, CliError> {
    let settings = args.into_settings().await?;
    let pipeline = &settings.pipeline;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        script = %settings.script_name,
        run_project = %settings.bigquery.run_project,
        location = %settings.bigquery.location,
        date = %pipeline.date,
        source = %pipeline.source_table,
        destination = %pipeline.destination_table,
        "Starting partload {} for {}",
        settings.script_name,
        pipeline.date
    );

    let source = BigQueryConnector::new(settings.bigquery, settings.tokens);
    let destination = PgConnector::new(settings.postgres);
    let orchestrator =
        RetryOrchestrator::new(settings.pipeline, Arc::new(source), Arc::new(destination));

    Ok(orchestrator.run().await?)
}
