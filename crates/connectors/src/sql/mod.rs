pub mod base;
pub mod bigquery;
pub mod postgres;
