use crate::core::templates::TemplateError;
use crate::core::text::TextError;
use crate::core::tools::{Tool, ToolError};
use crate::engine::config::ConfigError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SetupError {
    #[error("External tool '{tool}' was not found (tried `{program}`)")]
    ToolNotFound { tool: Tool, program: String },

    #[error("External tool '{tool}' reported an error (exit code {code:?}): {message}")]
    ToolFailed {
        tool: Tool,
        code: Option<i32>,
        message: String,
    },

    #[error("Stage '{stage}' did not produce the expected file {path:?}")]
    MissingOutput { stage: &'static str, path: PathBuf },

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Template error: {0}")]
    Template(#[from] TemplateError),

    #[error("Text template error: {0}")]
    Text(#[from] TextError),

    #[error("I/O error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid parameter '{name}': {reason}")]
    InvalidParameter { name: &'static str, reason: String },

    #[error("Index group '{0}' is missing from the make_ndx output")]
    MissingIndexGroup(String),

    #[error("Unexpected make_ndx group listing: {0}")]
    IndexListing(String),

    #[error("Stage manifest {path:?} could not be processed: {reason}")]
    Manifest { path: PathBuf, reason: String },
}

impl SetupError {
    pub(crate) fn io(path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> SetupError {
        let path = path.into();
        move |source| SetupError::Io { path, source }
    }

    /// Whether the error came from an external tool, as opposed to the setup logic.
    pub fn is_tool_error(&self) -> bool {
        matches!(
            self,
            SetupError::ToolNotFound { .. } | SetupError::ToolFailed { .. }
        )
    }
}

impl From<ToolError> for SetupError {
    fn from(err: ToolError) -> Self {
        match err {
            ToolError::NotFound { tool, program } => SetupError::ToolNotFound { tool, program },
            ToolError::Failed {
                tool,
                code,
                message,
            } => SetupError::ToolFailed {
                tool,
                code,
                message,
            },
            ToolError::Io { tool, source } => SetupError::ToolFailed {
                tool,
                code: None,
                message: source.to_string(),
            },
        }
    }
}
