//! Wire contract shared by the server and the sender
//!
//! One message per TCP connection, no length prefix: the client writes the
//! raw UTF-8 text, the server answers with [`ACK_MESSAGE`] and closes.

use std::time::Duration;

/// Acknowledgment payload written back after a message is displayed
pub const ACK_MESSAGE: &str = "Message received";

/// Bytes taken by the server's single read. Anything beyond this in one
/// message is not seen by the server.
pub const RECEIVE_BUFFER_SIZE: usize = 4096;

/// Maximum acknowledgment bytes the sender reads
pub const ACK_BUFFER_SIZE: usize = 1024;

pub const DEFAULT_PORT: u16 = 5000;
pub const DEFAULT_BACKLOG: u32 = 10;

/// Connect and acknowledgment timeout used by the sender
pub const DEFAULT_SEND_TIMEOUT: Duration = Duration::from_secs(5);

/// Accept poll interval of the server loop
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Pause around socket setup/teardown so a previous bind can release
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_millis(500);

/// Decode received bytes, replacing invalid UTF-8 sequences
pub fn decode_message(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}
