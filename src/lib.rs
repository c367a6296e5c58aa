//! Notification Relay Library
//!
//! This library provides the transport core for relaying short text
//! notifications from remote senders to a listening host: the server
//! lifecycle, the per-connection exchange, and the client send primitive.

pub mod cli;
pub mod config;
pub mod errors;
pub mod server;
pub mod shared;

// Re-export commonly used types for convenience
pub use config::{ClientSettings, ConfigManager, ConfigProvider, ServerSettings};
pub use errors::{RelayError, RelayResult};
pub use server::{NotificationSink, ServerController, ServerOptions, ServerState};
pub use shared::sender::{send, MessageSender};
pub use shared::transport::TransportConfig;
