//! Per-connection message exchange
//!
//! Exactly one read, one display hook call, one acknowledgment write, then
//! the connection is closed. Errors end here: they are reported to the
//! status hook and never reach the accept loop.

use flume::Receiver;
use std::net::SocketAddr;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, warn};

use crate::errors::{ErrorContextExt, RelayError, RelayResult};
use crate::shared::protocol::{decode_message, ACK_MESSAGE, RECEIVE_BUFFER_SIZE};

use super::sink::NotificationSink;

/// What a completed exchange did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExchangeOutcome {
    /// Message shown and acknowledged
    Delivered(String),
    /// Peer sent nothing; no hook call, no acknowledgment
    Empty,
}

/// Run the read/hook/ack protocol on an open stream
///
/// Whatever the single read returns is the whole message. A payload larger
/// than [`RECEIVE_BUFFER_SIZE`], or one split across TCP segments, is cut
/// at the first read.
pub async fn exchange<S>(
    stream: &mut S,
    peer: SocketAddr,
    sink: &dyn NotificationSink,
) -> RelayResult<ExchangeOutcome>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut buffer = vec![0u8; RECEIVE_BUFFER_SIZE];
    let read = stream
        .read(&mut buffer)
        .await
        .with_context("Failed to read message")?;

    if read == 0 {
        debug!("Connection from {} closed without a message", peer);
        return Ok(ExchangeOutcome::Empty);
    }

    let message = decode_message(&buffer[..read]);
    sink.on_status(&format!("Received message from {peer}"));
    sink.on_message_received(&message)
        .map_err(|e| RelayError::from(e.context("Display hook failed")))?;

    stream
        .write_all(ACK_MESSAGE.as_bytes())
        .await
        .with_context("Failed to write acknowledgment")?;
    stream
        .flush()
        .await
        .with_context("Failed to flush acknowledgment")?;

    Ok(ExchangeOutcome::Delivered(message))
}

/// Handle one accepted connection until it finishes or is force-closed
///
/// The stream is owned here and dropped on every exit path. A signal on
/// `closed` abandons any pending read or write.
pub async fn handle_connection<S>(
    mut stream: S,
    peer: SocketAddr,
    sink: &dyn NotificationSink,
    closed: &Receiver<()>,
) -> RelayResult<ExchangeOutcome>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let result = tokio::select! {
        result = exchange(&mut stream, peer, sink) => result,
        _ = closed.recv_async() => Err(RelayError::ForceClosed),
    };
    drop(stream);

    if let Err(ref e) = result {
        warn!("Error handling client message from {} ({}): {}", peer, e.kind(), e);
        sink.on_status(&format!("Error handling client message: {e}"));
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::sink::{ChannelSink, RelayEvent};
    use std::time::Duration;
    use tokio::io::duplex;

    fn peer() -> SocketAddr {
        SocketAddr::from(([127, 0, 0, 1], 50000))
    }

    struct FailingSink;

    impl NotificationSink for FailingSink {
        fn on_message_received(&self, _text: &str) -> anyhow::Result<()> {
            Err(anyhow::anyhow!("no display"))
        }

        fn on_status(&self, _text: &str) {}
    }

    #[tokio::test]
    async fn test_message_is_shown_then_acknowledged() {
        let (mut client, server) = duplex(8192);
        let (sink, events) = ChannelSink::new();

        client.write_all(b"build finished").await.unwrap();
        let (_keep_open, never) = flume::bounded::<()>(1);
        let outcome = handle_connection(server, peer(), &sink, &never).await.unwrap();

        assert_eq!(outcome, ExchangeOutcome::Delivered("build finished".to_string()));
        let events: Vec<_> = events.drain().collect();
        assert!(events.contains(&RelayEvent::Message("build finished".to_string())));

        let mut ack = String::new();
        client.read_to_string(&mut ack).await.unwrap();
        assert_eq!(ack, ACK_MESSAGE);
    }

    #[tokio::test]
    async fn test_empty_connection_is_discarded() {
        let (client, server) = duplex(64);
        drop(client);
        let (sink, events) = ChannelSink::new();
        let (_keep_open, never) = flume::bounded::<()>(1);

        let outcome = handle_connection(server, peer(), &sink, &never).await.unwrap();

        assert_eq!(outcome, ExchangeOutcome::Empty);
        assert!(events
            .drain()
            .all(|event| !matches!(event, RelayEvent::Message(_))));
    }

    #[tokio::test]
    async fn test_only_first_buffer_is_read() {
        let (mut client, server) = duplex(16 * 1024);
        let payload = vec![b'a'; RECEIVE_BUFFER_SIZE + 100];
        client.write_all(&payload).await.unwrap();
        let (sink, _events) = ChannelSink::new();
        let (_keep_open, never) = flume::bounded::<()>(1);

        let outcome = handle_connection(server, peer(), &sink, &never).await.unwrap();

        match outcome {
            ExchangeOutcome::Delivered(text) => assert_eq!(text.len(), RECEIVE_BUFFER_SIZE),
            other => panic!("Expected delivery, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_invalid_utf8_is_replaced() {
        let (mut client, server) = duplex(64);
        client.write_all(&[b'h', b'i', 0xfe]).await.unwrap();
        let (sink, _events) = ChannelSink::new();
        let (_keep_open, never) = flume::bounded::<()>(1);

        let outcome = handle_connection(server, peer(), &sink, &never).await.unwrap();
        assert_eq!(outcome, ExchangeOutcome::Delivered("hi\u{FFFD}".to_string()));
    }

    #[tokio::test]
    async fn test_hook_failure_skips_ack_and_closes() {
        let (mut client, server) = duplex(64);
        client.write_all(b"hello").await.unwrap();
        let (_keep_open, never) = flume::bounded::<()>(1);

        let result = handle_connection(server, peer(), &FailingSink, &never).await;
        match result {
            Err(RelayError::Other { detail }) => {
                assert_eq!(detail, "Display hook failed: no display")
            }
            other => panic!("Expected RelayError::Other, got {:?}", other),
        }

        let mut rest = Vec::new();
        client.read_to_end(&mut rest).await.unwrap();
        assert!(rest.is_empty());
    }

    #[tokio::test]
    async fn test_close_signal_interrupts_blocked_read() {
        let (_client, server) = duplex(64);
        let (sink, events) = ChannelSink::new();
        let (close, closed) = flume::bounded::<()>(1);

        let handler = tokio::spawn(async move {
            handle_connection(server, peer(), &sink, &closed).await
        });
        tokio::time::sleep(Duration::from_millis(20)).await;
        close.send(()).unwrap();

        let result = tokio::time::timeout(Duration::from_secs(1), handler)
            .await
            .expect("handler should not hang")
            .unwrap();
        assert!(matches!(result, Err(RelayError::ForceClosed)));
        assert!(events.drain().any(|event| matches!(
            event,
            RelayEvent::Status(ref s) if s.starts_with("Error handling client message")
        )));
    }
}
