//! Live-connection set
//!
//! Every accepted connection is registered here until its handler finishes.
//! An entry owns the close switch for that connection, which is how the
//! controller force-closes handlers that are still blocked in I/O.

use flume::{Receiver, Sender, TrySendError};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::{debug, warn};

pub type ConnectionId = u64;

/// Registry entry for one accepted connection
#[derive(Debug)]
pub struct ConnectionHandle {
    pub id: ConnectionId,
    pub peer: SocketAddr,
    close: Sender<()>,
}

impl ConnectionHandle {
    /// Ask the handler to drop its socket
    fn close(&self) -> Result<(), TrySendError<()>> {
        self.close.try_send(())
    }
}

#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    next_id: AtomicU64,
    live: Mutex<HashMap<ConnectionId, ConnectionHandle>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connection and hand back the receiving end of its close switch
    pub fn register(&self, peer: SocketAddr) -> (ConnectionId, Receiver<()>) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (close, closed) = flume::bounded(1);
        self.live
            .lock()
            .insert(id, ConnectionHandle { id, peer, close });
        debug!("Registered connection {} from {}", id, peer);
        (id, closed)
    }

    /// Remove a finished connection; false when it was already gone
    pub fn unregister(&self, id: ConnectionId) -> bool {
        let removed = self.live.lock().remove(&id).is_some();
        if removed {
            debug!("Unregistered connection {}", id);
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.live.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.live.lock().is_empty()
    }

    pub fn peers(&self) -> Vec<SocketAddr> {
        self.live.lock().values().map(|handle| handle.peer).collect()
    }

    /// Fire the close switch of every live connection
    ///
    /// Returns how many switches were fired. A switch that cannot be fired
    /// (handler already gone or already signalled) is logged and skipped.
    pub fn close_all(&self) -> usize {
        let live = self.live.lock();
        let mut fired = 0;
        for handle in live.values() {
            match handle.close() {
                Ok(()) => fired += 1,
                Err(e) => debug!(
                    "Error closing client connection {} ({}): {}",
                    handle.id, handle.peer, e
                ),
            }
        }
        fired
    }

    /// Wait until every handler has unregistered, at most `within`
    ///
    /// Entries still present at the deadline are dropped from the set.
    pub async fn drain(&self, within: Duration) -> bool {
        let deadline = Instant::now() + within;
        while !self.is_empty() {
            if Instant::now() >= deadline {
                let mut live = self.live.lock();
                warn!(
                    "{} connection(s) did not finish before the settle deadline",
                    live.len()
                );
                live.clear();
                return false;
            }
            sleep(Duration::from_millis(10)).await;
        }
        true
    }
}
