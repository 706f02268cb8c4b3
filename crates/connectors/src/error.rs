use thiserror::Error;

/// A table or column name that cannot be safely quoted for a dialect.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("Invalid {dialect} identifier '{ident}': {reason}")]
pub struct IdentifierError {
    pub dialect: &'static str,
    pub ident: String,
    pub reason: &'static str,
}

/// Errors happening while building a connection to either data store.
#[derive(Debug, Error)]
pub enum ConnectorError {
    #[error("Invalid connection settings: {0}")]
    InvalidConfig(String),

    #[error("Failed to connect to PostgreSQL: {0}")]
    Connection(#[from] tokio_postgres::Error),

    #[error("TLS configuration error: {0}")]
    TlsConfig(#[from] native_tls::Error),
}

/// All errors coming from the warehouse side.
#[derive(Debug, Error)]
pub enum SourceError {
    /// Transport failure talking to the REST endpoint.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The API answered with a non-success status.
    #[error("BigQuery API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Failed to decode BigQuery response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Query job {job_id} still running after {polls} polls")]
    JobIncomplete { job_id: String, polls: u32 },

    #[error("Failed to obtain an access token: {0}")]
    Auth(String),

    /// A cell could not be converted according to the result schema.
    #[error("Invalid value in column '{column}' ({field_type}): {message}")]
    Value {
        column: String,
        field_type: String,
        message: String,
    },

    #[error("Unexpected response: {0}")]
    InvalidResponse(String),

    #[error(transparent)]
    Identifier(#[from] IdentifierError),
}

/// All errors coming from the relational destination.
#[derive(Debug, Error)]
pub enum DestinationError {
    #[error("Connector error: {0}")]
    Connector(#[from] ConnectorError),

    #[error("PostgreSQL error: {0}")]
    Postgres(#[from] tokio_postgres::Error),

    #[error(transparent)]
    Identifier(#[from] IdentifierError),

    /// The partition column has a type the date cannot be bound to.
    #[error("Cannot bind a partition date to column '{column}' of type {type_name}")]
    UnsupportedPartitionType { column: String, type_name: String },

    #[error("Write error: {0}")]
    Write(String),
}
