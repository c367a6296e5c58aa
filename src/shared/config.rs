use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::errors::RelayResult;

use super::protocol::{DEFAULT_BACKLOG, DEFAULT_PORT};
use super::transport::{validate_port, TransportConfig};

/// Persisted settings of the listening host
///
/// Missing keys fall back to their defaults so an older file keeps loading
/// after new options are added.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_server_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u32,
    #[serde(default = "default_backlog")]
    pub backlog: u32,
    /// Directory for daily rolling log files; stdout only when unset
    #[serde(default)]
    pub log_dir: Option<PathBuf>,
    /// Cap on concurrently running connection handlers
    #[serde(default)]
    pub max_handlers: Option<usize>,
}

/// Persisted settings of the sending side
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientSettings {
    #[serde(default = "default_client_host")]
    pub server_ip: String,
    #[serde(default = "default_port")]
    pub server_port: u32,
}

fn default_server_host() -> String {
    "0.0.0.0".to_string()
}

fn default_client_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u32 {
    u32::from(DEFAULT_PORT)
}

fn default_backlog() -> u32 {
    DEFAULT_BACKLOG
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_server_host(),
            port: default_port(),
            backlog: default_backlog(),
            log_dir: None,
            max_handlers: None,
        }
    }
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            server_ip: default_client_host(),
            server_port: default_port(),
        }
    }
}

impl ServerSettings {
    /// Validate into the immutable triple the server binds with
    pub fn transport(&self) -> RelayResult<TransportConfig> {
        TransportConfig::new(self.host.clone(), self.port, self.backlog)
    }
}

impl ClientSettings {
    /// Validated destination port
    pub fn port(&self) -> RelayResult<u16> {
        validate_port(self.server_port)
    }
}
