use connectors::error::IdentifierError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read query template {path}: {source}")]
    TemplateRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Query template does not contain the date placeholder '{0}'")]
    MissingDateToken(&'static str),

    #[error(
        "Date placeholder is part of the longer literal {0}; bind it on its own or cast it, e.g. DATE '$fecha'"
    )]
    EmbeddedDateToken(String),

    #[error("Chunk size must be greater than zero")]
    InvalidChunkSize,

    #[error("Retry bound must be at least one attempt")]
    InvalidRetryBound,

    #[error(transparent)]
    InvalidIdentifier(#[from] IdentifierError),
}
