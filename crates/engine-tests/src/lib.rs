#![allow(dead_code)]

use async_trait::async_trait;
use connectors::{
    error::DestinationError,
    sql::{
        base::destination::{DataDestination, DestinationConnector},
        postgres::{adapter::PgDestination, utils::connect_client},
    },
};
use tokio_postgres::{Client, Config};

pub mod utils;

/// Connection URL of the PostgreSQL instance used by the ignored live tests.
const TEST_PG_URL_ENV: &str = "PARTLOAD_TEST_PG_URL";
const TEST_SCHEMA: &str = "partload_it";

fn test_pg_config() -> Config {
    let url = std::env::var(TEST_PG_URL_ENV)
        .unwrap_or_else(|_| panic!("{TEST_PG_URL_ENV} must point at a test database"));
    url.parse().expect("valid postgres url")
}

async fn pg_client() -> Client {
    connect_client(test_pg_config())
        .await
        .expect("connect postgres")
}

/// Drop & recreate the test schema so every live test starts empty.
async fn reset_test_schema(client: &Client) {
    client
        .batch_execute(&format!(
            "DROP SCHEMA IF EXISTS {TEST_SCHEMA} CASCADE; CREATE SCHEMA {TEST_SCHEMA};"
        ))
        .await
        .expect("reset test schema");
}

/// Destination connector built from a connection URL instead of CLI options.
pub struct UrlConnector {
    config: Config,
}

impl UrlConnector {
    pub fn new(config: Config) -> Self {
        Self { config }
    }
}

#[async_trait]
impl DestinationConnector for UrlConnector {
    async fn connect(&self) -> Result<Box<dyn DataDestination>, DestinationError> {
        let client = connect_client(self.config.clone()).await?;
        Ok(Box::new(PgDestination::new(client)))
    }
}
