pub mod dialect;
pub mod error;
pub mod sql;
