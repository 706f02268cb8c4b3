use crate::error::PipelineError;
use connectors::error::{ConnectorError, DestinationError, SourceError};
use engine_core::retry::RetryDisposition;

/// Every store failure restarts the attempt. Only errors that would repeat
/// identically on the next attempt stop the run early.
pub fn classify_pipeline_error(err: &PipelineError) -> RetryDisposition {
    match err {
        PipelineError::SourceUnavailable(e) => classify_source_error(e),
        PipelineError::DestinationUnavailable(e) => classify_destination_error(e),
        PipelineError::Config(_) => RetryDisposition::Stop,
        PipelineError::Exhausted { .. } => RetryDisposition::Stop,
    }
}

pub fn classify_source_error(err: &SourceError) -> RetryDisposition {
    match err {
        SourceError::Identifier(_) => RetryDisposition::Stop,
        SourceError::Http(_)
        | SourceError::Api { .. }
        | SourceError::Decode(_)
        | SourceError::JobIncomplete { .. }
        | SourceError::Auth(_)
        | SourceError::Value { .. }
        | SourceError::InvalidResponse(_) => RetryDisposition::Retry,
    }
}

pub fn classify_destination_error(err: &DestinationError) -> RetryDisposition {
    match err {
        DestinationError::Identifier(_) => RetryDisposition::Stop,
        DestinationError::UnsupportedPartitionType { .. } => RetryDisposition::Stop,
        DestinationError::Connector(ConnectorError::InvalidConfig(_)) => RetryDisposition::Stop,
        DestinationError::Connector(_)
        | DestinationError::Postgres(_)
        | DestinationError::Write(_) => RetryDisposition::Retry,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use connectors::error::IdentifierError;

    #[test]
    fn test_store_failures_are_retried() {
        let api = PipelineError::SourceUnavailable(SourceError::Api {
            status: 503,
            message: "backend error".into(),
        });
        let write = PipelineError::DestinationUnavailable(DestinationError::Write("eof".into()));

        assert_eq!(classify_pipeline_error(&api), RetryDisposition::Retry);
        assert_eq!(classify_pipeline_error(&write), RetryDisposition::Retry);
    }

    #[test]
    fn test_deterministic_failures_stop() {
        let ident = IdentifierError {
            dialect: "PostgreSQL",
            ident: String::new(),
            reason: "empty identifier",
        };
        let unsupported = DestinationError::UnsupportedPartitionType {
            column: "fecha".into(),
            type_name: "int4".into(),
        };

        assert_eq!(
            classify_destination_error(&DestinationError::Identifier(ident)),
            RetryDisposition::Stop
        );
        assert_eq!(
            classify_destination_error(&unsupported),
            RetryDisposition::Stop
        );
    }
}
