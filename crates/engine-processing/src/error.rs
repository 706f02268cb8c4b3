use connectors::error::{DestinationError, SourceError};
use engine_core::error::ConfigError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Source unavailable: {0}")]
    SourceUnavailable(#[from] SourceError),

    #[error("Destination unavailable: {0}")]
    DestinationUnavailable(#[from] DestinationError),

    #[error("Retry attempts exhausted after {attempts} attempts: {last}")]
    Exhausted {
        attempts: u32,
        #[source]
        last: Box<PipelineError>,
    },

    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),
}

impl PipelineError {
    /// Stable short name used in structured logs.
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineError::SourceUnavailable(_) => "source_unavailable",
            PipelineError::DestinationUnavailable(_) => "destination_unavailable",
            PipelineError::Exhausted { .. } => "exhausted",
            PipelineError::Config(_) => "config",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exhausted_keeps_last_error() {
        let last = PipelineError::DestinationUnavailable(DestinationError::Write(
            "connection reset".into(),
        ));
        let err = PipelineError::Exhausted {
            attempts: 5,
            last: Box::new(last),
        };

        assert_eq!(err.kind(), "exhausted");
        assert_eq!(
            err.to_string(),
            "Retry attempts exhausted after 5 attempts: Destination unavailable: Write error: connection reset"
        );
        let source = std::error::Error::source(&err).unwrap();
        assert!(source.to_string().starts_with("Destination unavailable"));
    }
}
