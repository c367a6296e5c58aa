//! Argument validation for CLI commands
//!
//! Checks that clap cannot express (port ranges, timeout bounds) run here
//! before a command is routed to its handler.

use std::time::Duration;

use super::Commands;
use crate::errors::{RelayError, RelayResult};
use crate::shared::transport::validate_port;

/// Handles argument validation
pub struct ArgProcessor;

impl ArgProcessor {
    pub fn new() -> Self {
        Self
    }

    /// Validate command arguments
    pub fn validate_command(&self, command: &Commands) -> RelayResult<()> {
        match command {
            Commands::Serve { port, backlog, .. } => {
                if let Some(port) = port {
                    validate_port(*port)?;
                }
                if let Some(0) = backlog {
                    return Err(RelayError::invalid_argument(
                        "backlog",
                        "must be at least 1",
                    ));
                }
                Ok(())
            }
            Commands::Send { port, timeout, .. } => {
                if let Some(port) = port {
                    validate_port(*port)?;
                }
                self.validate_timeout(*timeout)
            }
            Commands::Config { port, .. } => {
                if let Some(port) = port {
                    validate_port(*port)?;
                }
                Ok(())
            }
            Commands::Run { command } => {
                if command.iter().all(|part| part.trim().is_empty()) {
                    return Err(RelayError::invalid_argument("command", "cannot be empty"));
                }
                Ok(())
            }
        }
    }

    fn validate_timeout(&self, timeout: f64) -> RelayResult<()> {
        send_timeout(timeout).map(|_| ())
    }
}

/// Convert a `--timeout` value in seconds into a send bound
///
/// Rejects zero, negative, non-finite and unrepresentably large values.
pub fn send_timeout(seconds: f64) -> RelayResult<Duration> {
    let invalid = || {
        RelayError::invalid_argument(
            "timeout",
            format!("must be a positive number of seconds, got: {seconds}"),
        )
    };
    if seconds <= 0.0 {
        return Err(invalid());
    }
    Duration::try_from_secs_f64(seconds).map_err(|_| invalid())
}

impl Default for ArgProcessor {
    fn default() -> Self {
        Self::new()
    }
}
