use engine_core::error::ConfigError;
use engine_processing::error::PipelineError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CliError {
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("Invalid argument {arg}: {message}")]
    InvalidArgument { arg: &'static str, message: String },

    #[error(transparent)]
    Pipeline(#[from] PipelineError),
}

impl CliError {
    pub fn kind(&self) -> &'static str {
        match self {
            CliError::Config(_) | CliError::InvalidArgument { .. } => "config",
            CliError::Pipeline(err) => err.kind(),
        }
    }
}
