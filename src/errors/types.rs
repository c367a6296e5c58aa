//! Error types for the notification relay
//!
//! Every failure the transport, the sender, and the config collaborator can
//! report is a variant of [`RelayError`]. Lifecycle and sender failures are
//! handed back to the caller as values; per-connection failures never leave
//! the connection handler.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Main relay error type
#[derive(Error, Debug)]
pub enum RelayError {
    // Transport configuration
    #[error("Invalid port {port}: must be an integer between 1-65535")]
    InvalidPort { port: u32 },

    // Lifecycle errors
    #[error("Server is already running")]
    AlreadyRunning,

    #[error("Server is not running")]
    NotRunning,

    #[error("Failed to start server on {addr}: {detail}")]
    BindFailure { addr: String, detail: String },

    #[error("Error listening for client connections: {detail}")]
    AcceptFailure { detail: String },

    #[error("Connection force-closed during shutdown")]
    ForceClosed,

    // Sender errors
    #[error("Message content cannot be empty")]
    EmptyMessage,

    #[error("Timed out after {timeout_secs:.1}s, check the network or whether the server is started")]
    Timeout { timeout_secs: f64 },

    #[error("Connection refused by {addr}, check whether the server is started")]
    ConnectionRefused { addr: String },

    #[error("{detail}")]
    Other { detail: String },

    // Config collaborator errors
    #[error("Configuration error: {message}")]
    Config {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("File I/O error for '{path}': {operation}")]
    Io {
        path: PathBuf,
        operation: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    // CLI validation
    #[error("Invalid command argument '{argument}': {reason}")]
    InvalidArgument { argument: String, reason: String },
}

/// Convenience type alias for Results using RelayError
pub type RelayResult<T> = Result<T, RelayError>;

impl RelayError {
    pub fn bind_failure(addr: impl Into<String>, detail: impl std::fmt::Display) -> Self {
        Self::BindFailure {
            addr: addr.into(),
            detail: detail.to_string(),
        }
    }

    pub fn accept_failure(detail: impl std::fmt::Display) -> Self {
        Self::AcceptFailure {
            detail: detail.to_string(),
        }
    }

    pub fn timeout(after: Duration) -> Self {
        Self::Timeout {
            timeout_secs: after.as_secs_f64(),
        }
    }

    pub fn other(detail: impl std::fmt::Display) -> Self {
        Self::Other {
            detail: detail.to_string(),
        }
    }

    /// Create a new Config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            source: None,
        }
    }

    /// Create a new Config error with source
    pub fn config_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Config {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a new I/O error with source
    pub fn io_with_source(
        path: impl Into<PathBuf>,
        operation: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Io {
            path: path.into(),
            operation: operation.into(),
            source: Some(Box::new(source)),
        }
    }

    pub fn invalid_argument(argument: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            argument: argument.into(),
            reason: reason.into(),
        }
    }

    /// Short stable label for the error class.
    ///
    /// Send failures are always one of `"timeout"`, `"refused"` or `"other"`
    /// (plus `"empty"` for input rejected before any network activity).
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidPort { .. } => "invalid-port",
            Self::AlreadyRunning => "already-running",
            Self::NotRunning => "not-running",
            Self::BindFailure { .. } => "bind",
            Self::AcceptFailure { .. } => "accept",
            Self::ForceClosed => "force-closed",
            Self::EmptyMessage => "empty",
            Self::Timeout { .. } => "timeout",
            Self::ConnectionRefused { .. } => "refused",
            Self::Other { .. } => "other",
            Self::Config { .. } => "config",
            Self::Io { .. } => "io",
            Self::InvalidArgument { .. } => "argument",
        }
    }
}
