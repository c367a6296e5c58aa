//! Client-side send primitive
//!
//! Opens one connection per message, writes the text, waits for the
//! acknowledgment and closes. Failures come back classified as
//! [`RelayError::Timeout`], [`RelayError::ConnectionRefused`] or
//! [`RelayError::Other`]; nothing is retried.

use std::io;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::debug;

use crate::errors::{RelayError, RelayResult};

use super::protocol::{decode_message, ACK_BUFFER_SIZE, DEFAULT_SEND_TIMEOUT};

/// Configuration for sender behavior
#[derive(Debug, Clone)]
pub struct SenderConfig {
    /// Bound applied to connect, write and the acknowledgment read each
    pub timeout: Duration,
}

impl Default for SenderConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_SEND_TIMEOUT,
        }
    }
}

/// One-shot message sender
#[derive(Debug, Clone, Default)]
pub struct MessageSender {
    config: SenderConfig,
}

impl MessageSender {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: SenderConfig) -> Self {
        Self { config }
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self::with_config(SenderConfig { timeout })
    }

    /// Send one message and return the acknowledgment text
    ///
    /// The connection is dropped (closed) on every return path.
    pub async fn send(&self, message: &str, host: &str, port: u16) -> RelayResult<String> {
        if message.is_empty() {
            return Err(RelayError::EmptyMessage);
        }
        if port == 0 {
            return Err(RelayError::InvalidPort { port: 0 });
        }

        let bound = self.config.timeout;
        let addr = format!("{host}:{port}");
        debug!("Sending {} bytes to {}", message.len(), addr);

        let mut stream = match timeout(bound, TcpStream::connect((host, port))).await {
            Err(_) => return Err(RelayError::timeout(bound)),
            Ok(Err(e)) => return Err(classify_io_error(e, &addr, bound)),
            Ok(Ok(stream)) => stream,
        };

        match timeout(bound, stream.write_all(message.as_bytes())).await {
            Err(_) => return Err(RelayError::timeout(bound)),
            Ok(Err(e)) => return Err(classify_io_error(e, &addr, bound)),
            Ok(Ok(())) => {}
        }

        let mut buffer = [0u8; ACK_BUFFER_SIZE];
        let read = match timeout(bound, stream.read(&mut buffer)).await {
            Err(_) => return Err(RelayError::timeout(bound)),
            Ok(Err(e)) => return Err(classify_io_error(e, &addr, bound)),
            Ok(Ok(n)) => n,
        };

        if read == 0 {
            return Err(RelayError::other(format!(
                "Failed to send message: {addr} closed the connection without acknowledgment"
            )));
        }

        let ack = decode_message(&buffer[..read]);
        debug!("Received acknowledgment from {}: {}", addr, ack);
        Ok(ack)
    }
}

/// Send with an explicit timeout bound
pub async fn send(message: &str, host: &str, port: u16, bound: Duration) -> RelayResult<String> {
    MessageSender::with_timeout(bound).send(message, host, port).await
}

fn classify_io_error(err: io::Error, addr: &str, bound: Duration) -> RelayError {
    match err.kind() {
        io::ErrorKind::ConnectionRefused => RelayError::ConnectionRefused {
            addr: addr.to_string(),
        },
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => RelayError::timeout(bound),
        _ => RelayError::other(format!("Failed to send message: {err}")),
    }
}
