use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors in the caller's configuration, raised before any generation happens.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub enum ConfigError {
    #[error("Unknown architecture: {0}")]
    UnknownArchitecture(String),

    #[error("Architecture {0} has no native tool-call syntax")]
    ToolsUnsupported(String),

    #[error("Tool not found: {0}")]
    UnknownTool(String),

    #[error("Duplicate tool name: {0}")]
    DuplicateTool(String),

    #[error("Invalid action: {0}")]
    InvalidAction(String),

    #[error("Template error: {0}")]
    Template(String),

    #[error("Tokenizer error: {0}")]
    Tokenizer(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Why a raw tool payload could not be turned into tool requests.
///
/// Never surfaced by the parser; it degrades the payload to plain text instead.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NormalizeError {
    #[error("payload is not valid JSON: {0}")]
    InvalidJson(String),

    #[error("payload does not match a supported tool-call shape")]
    UnsupportedShape,

    #[error("tool call is missing a name")]
    MissingName,

    #[error("tool_calls array is empty")]
    EmptyCalls,
}
