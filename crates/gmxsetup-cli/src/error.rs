use crate::utils::parser::ParseError;
use gmxsetup::engine::error::SetupError;
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, CliError>;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Setup(#[from] SetupError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Template management error: {0}")]
    Templates(String),

    #[error("Failed to parse file '{path}': {source}", path = path.display())]
    FileParsing {
        path: PathBuf,
        #[source]
        source: anyhow::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid argument: {0}")]
    Argument(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<ParseError> for CliError {
    fn from(err: ParseError) -> Self {
        CliError::Argument(err.to_string())
    }
}
