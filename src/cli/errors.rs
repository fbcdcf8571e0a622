//! CLI-specific error types
//!
//! Every CLI error is fatal: the process prints it and exits with status 1.

use std::fmt;
use std::io;

/// CLI error codes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CliErrorCode {
    /// Configuration file error
    ConfigError,
    /// I/O error (stdout, directories)
    IoError,
    /// Bad command line value
    InvalidArgument,
    /// Data directory missing
    NotInitialized,
    /// Synchronization failed
    SyncFailed,
}

impl CliErrorCode {
    /// Get the error code string
    pub fn code(&self) -> &'static str {
        match self {
            Self::ConfigError => "DSYNC_CLI_CONFIG_ERROR",
            Self::IoError => "DSYNC_CLI_IO_ERROR",
            Self::InvalidArgument => "DSYNC_CLI_INVALID_ARGUMENT",
            Self::NotInitialized => "DSYNC_CLI_NOT_INITIALIZED",
            Self::SyncFailed => "DSYNC_CLI_SYNC_FAILED",
        }
    }
}

/// CLI error
#[derive(Debug)]
pub struct CliError {
    code: CliErrorCode,
    message: String,
}

impl CliError {
    /// Create a new CLI error
    pub fn new(code: CliErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// Config error
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::ConfigError, msg)
    }

    /// I/O error
    pub fn io_error(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::IoError, msg)
    }

    /// Invalid argument
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::InvalidArgument, msg)
    }

    /// Not initialized
    pub fn not_initialized() -> Self {
        Self::new(
            CliErrorCode::NotInitialized,
            "Data directory not initialized. Run 'designsync init' first.",
        )
    }

    /// Synchronization failed; keeps the engine's coded message
    pub fn sync_failed(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::SyncFailed, msg)
    }

    /// Get the error code
    pub fn code(&self) -> &CliErrorCode {
        &self.code
    }

    /// Get the error code string
    pub fn code_str(&self) -> &'static str {
        self.code.code()
    }

    /// Get the error message
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code.code(), self.message)
    }
}

impl std::error::Error for CliError {}

impl From<io::Error> for CliError {
    fn from(e: io::Error) -> Self {
        Self::io_error(e.to_string())
    }
}

impl From<serde_json::Error> for CliError {
    fn from(e: serde_json::Error) -> Self {
        Self::io_error(format!("JSON error: {}", e))
    }
}

/// CLI result type
pub type CliResult<T> = Result<T, CliError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_carries_code() {
        let err = CliError::config_error("bad");
        assert_eq!(err.to_string(), "DSYNC_CLI_CONFIG_ERROR: bad");
        assert_eq!(err.code(), &CliErrorCode::ConfigError);
    }

    #[test]
    fn test_io_conversion() {
        let err: CliError = io::Error::new(io::ErrorKind::Other, "disk").into();
        assert_eq!(err.code_str(), "DSYNC_CLI_IO_ERROR");
        assert_eq!(err.message(), "disk");
    }
}
