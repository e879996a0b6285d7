//! CLI error types.

use std::fmt;

use pipelog::LogError;

/// CLI-specific errors.
#[derive(Debug)]
pub enum CliError {
    /// Invalid configuration.
    Config(String),
    /// The service rejected the credentials.
    Auth(String),
    /// The run or log does not exist.
    NotFound(String),
    /// Invalid argument.
    InvalidArgument(String),
    /// Command execution failed.
    Command(String),
    /// Output formatting error.
    Format(String),
    /// IO error.
    Io(std::io::Error),
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "configuration error: {msg}"),
            Self::Auth(msg) => write!(f, "authentication error: {msg}"),
            Self::NotFound(msg) => write!(f, "not found: {msg}"),
            Self::InvalidArgument(msg) => write!(f, "invalid argument: {msg}"),
            Self::Command(msg) => write!(f, "command error: {msg}"),
            Self::Format(msg) => write!(f, "format error: {msg}"),
            Self::Io(e) => write!(f, "IO error: {e}"),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for CliError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<LogError> for CliError {
    fn from(err: LogError) -> Self {
        match err {
            LogError::Validation(msg) => Self::InvalidArgument(msg),
            LogError::InvalidPattern(e) => Self::InvalidArgument(format!("bad pattern: {e}")),
            LogError::Authentication(msg) => Self::Auth(msg),
            LogError::Config(msg) => Self::Config(msg),
            e @ (LogError::NoLogs { .. } | LogError::LogFileNotFound { .. }) => {
                Self::NotFound(e.to_string())
            }
            LogError::Io(e) => Self::Io(e),
            e => Self::Command(e.to_string()),
        }
    }
}
