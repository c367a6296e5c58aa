//! Notification server
//!
//! This module provides:
//! - TCP listener setup and the accept loop
//! - The per-connection read/display/acknowledge exchange
//! - Live-connection tracking for forced shutdown
//! - The start/stop lifecycle controller

pub mod acceptor;
pub mod exchange;
pub mod lifecycle;
pub mod registry;
pub mod sink;

// Re-export commonly used types
pub use acceptor::{ConnectionSource, HandlerLimit};
pub use exchange::ExchangeOutcome;
pub use lifecycle::{ServerController, ServerOptions, ServerState};
pub use sink::{ChannelSink, LoggingSink, NotificationSink, RelayEvent};
