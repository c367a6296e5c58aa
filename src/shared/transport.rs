//! Transport configuration value
//!
//! The (host, port, backlog) triple the server binds with. It is validated
//! once and never mutated; replacing it means building a new value.

use std::fmt;

use crate::errors::{RelayError, RelayResult};

use super::protocol::DEFAULT_BACKLOG;

/// Immutable bind configuration for the listening socket
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportConfig {
    host: String,
    port: u16,
    backlog: u32,
}

impl TransportConfig {
    /// Validate a host/port pair with the default backlog
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::InvalidPort`] when `port` is outside 1..=65535.
    pub fn validate(host: impl Into<String>, port: u32) -> RelayResult<Self> {
        Self::new(host, port, DEFAULT_BACKLOG)
    }

    /// Validate a full triple
    pub fn new(host: impl Into<String>, port: u32, backlog: u32) -> RelayResult<Self> {
        let port = validate_port(port)?;
        Ok(Self {
            host: host.into(),
            port,
            backlog,
        })
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn backlog(&self) -> u32 {
        self.backlog
    }
}

impl fmt::Display for TransportConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Check that a port lies in 1..=65535
pub fn validate_port(port: u32) -> RelayResult<u16> {
    match u16::try_from(port) {
        Ok(p) if p != 0 => Ok(p),
        _ => Err(RelayError::InvalidPort { port }),
    }
}
