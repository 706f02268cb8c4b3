//! Warehouse source backed by the BigQuery REST API (`jobs.query` and
//! `jobs.getQueryResults`).

pub mod auth;
pub mod client;
pub mod decode;
pub mod types;
