//! Error context enhancement utilities
//!
//! Maps foreign errors into [`RelayError`] while attaching the operation
//! (and file, where there is one) that was being attempted.

use std::path::PathBuf;

use super::types::RelayError;

/// Extension trait for adding context to error types
pub trait ErrorContextExt<T> {
    /// Add operation context to the error
    fn with_context(self, operation: impl Into<String>) -> Result<T, RelayError>;

    /// Add operation and file context
    fn in_file_operation(
        self,
        path: impl Into<PathBuf>,
        operation: impl Into<String>,
    ) -> Result<T, RelayError>;
}

impl<T, E> ErrorContextExt<T> for Result<T, E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn with_context(self, operation: impl Into<String>) -> Result<T, RelayError> {
        self.map_err(|e| RelayError::Other {
            detail: format!("{}: {}", operation.into(), e),
        })
    }

    fn in_file_operation(
        self,
        path: impl Into<PathBuf>,
        operation: impl Into<String>,
    ) -> Result<T, RelayError> {
        self.map_err(|e| RelayError::io_with_source(path, operation, e))
    }
}
