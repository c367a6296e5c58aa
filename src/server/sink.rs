//! Event sinks the transport core publishes to
//!
//! The core never renders or forwards anything itself. It reports arrived
//! messages and status lines to a [`NotificationSink`] supplied at
//! construction.

use anyhow::Result;
use flume::{Receiver, Sender};
use tracing::info;

/// Receiver of transport events
///
/// `on_message_received` runs synchronously inside the connection handler,
/// before the acknowledgment is written. Implementations must not block
/// indefinitely; hand off to another thread if displaying is slow.
pub trait NotificationSink: Send + Sync {
    /// A non-empty message arrived on a connection
    fn on_message_received(&self, text: &str) -> Result<()>;

    /// Human-readable lifecycle or error report
    fn on_status(&self, text: &str);
}

/// Sink that only writes to the tracing log
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingSink;

impl NotificationSink for LoggingSink {
    fn on_message_received(&self, text: &str) -> Result<()> {
        info!("Notification: {}", text);
        Ok(())
    }

    fn on_status(&self, text: &str) {
        info!("{}", text);
    }
}

/// Event published by [`ChannelSink`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayEvent {
    Message(String),
    Status(String),
}

/// Sink that forwards every event into an unbounded channel
#[derive(Debug, Clone)]
pub struct ChannelSink {
    sender: Sender<RelayEvent>,
}

impl ChannelSink {
    /// Create the sink together with the receiving end
    pub fn new() -> (Self, Receiver<RelayEvent>) {
        let (sender, receiver) = flume::unbounded();
        (Self { sender }, receiver)
    }
}

impl NotificationSink for ChannelSink {
    fn on_message_received(&self, text: &str) -> Result<()> {
        self.sender
            .send(RelayEvent::Message(text.to_string()))
            .map_err(|_| anyhow::anyhow!("Notification receiver has been dropped"))
    }

    fn on_status(&self, text: &str) {
        // Status lines are best-effort; a closed receiver just loses them.
        let _ = self.sender.send(RelayEvent::Status(text.to_string()));
    }
}
