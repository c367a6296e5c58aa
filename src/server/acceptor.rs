//! Connection acceptor
//!
//! Owns the listening socket and turns each accepted connection into a
//! spawned handler task. The loop polls `accept` with a short timeout so it
//! notices a cleared running flag without blocking forever.

use flume::Receiver;
use parking_lot::Mutex;
use socket2::{Domain, Protocol, Socket, Type};
use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{lookup_host, TcpListener, TcpStream};
use tokio::sync::Semaphore;
use tokio::time::timeout;
use tracing::{debug, error, info};

use crate::errors::{RelayError, RelayResult};
use crate::shared::transport::TransportConfig;

use super::exchange::handle_connection;
use super::registry::ConnectionRegistry;
use super::sink::NotificationSink;

/// Bind and listen on the configured address with address reuse enabled
///
/// SO_REUSEPORT is attempted on platforms that have it; a rejection there
/// does not fail the bind.
pub async fn bind_listener(config: &TransportConfig) -> RelayResult<TcpListener> {
    let label = config.to_string();
    let addr = lookup_host((config.host(), config.port()))
        .await
        .map_err(|e| RelayError::bind_failure(&label, e))?
        .next()
        .ok_or_else(|| RelayError::bind_failure(&label, "address did not resolve"))?;

    let socket = Socket::new(Domain::for_address(addr), Type::STREAM, Some(Protocol::TCP))
        .map_err(|e| RelayError::bind_failure(&label, e))?;
    socket
        .set_reuse_address(true)
        .map_err(|e| RelayError::bind_failure(&label, e))?;
    set_reuse_port(&socket);
    socket
        .set_nonblocking(true)
        .map_err(|e| RelayError::bind_failure(&label, e))?;
    socket
        .bind(&addr.into())
        .map_err(|e| RelayError::bind_failure(&label, e))?;
    let backlog = i32::try_from(config.backlog()).unwrap_or(i32::MAX);
    socket
        .listen(backlog)
        .map_err(|e| RelayError::bind_failure(&label, e))?;

    let listener: std::net::TcpListener = socket.into();
    TcpListener::from_std(listener).map_err(|e| RelayError::bind_failure(&label, e))
}

#[cfg(all(
    unix,
    not(any(target_os = "solaris", target_os = "illumos", target_os = "cygwin"))
))]
fn set_reuse_port(socket: &Socket) {
    if let Err(e) = socket.set_reuse_port(true) {
        debug!("SO_REUSEPORT not available on this socket: {}", e);
    }
}

#[cfg(not(all(
    unix,
    not(any(target_os = "solaris", target_os = "illumos", target_os = "cygwin"))
)))]
fn set_reuse_port(_socket: &Socket) {}

/// How many connection handlers may run at once
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HandlerLimit {
    /// One task per accepted connection, no cap beyond the listen backlog
    #[default]
    Unbounded,
    /// At most `n` handlers exchange at once; the rest wait for a permit
    Bounded(usize),
}

impl HandlerLimit {
    pub fn from_option(max_handlers: Option<usize>) -> Self {
        match max_handlers {
            Some(n) if n > 0 => Self::Bounded(n),
            _ => Self::Unbounded,
        }
    }

    fn semaphore(self) -> Option<Arc<Semaphore>> {
        match self {
            Self::Unbounded => None,
            Self::Bounded(n) => Some(Arc::new(Semaphore::new(n))),
        }
    }
}

/// Anything the accept loop can pull connections from
pub trait ConnectionSource: Send + Sync + 'static {
    fn accept(&self) -> impl Future<Output = io::Result<(TcpStream, SocketAddr)>> + Send;
}

impl ConnectionSource for TcpListener {
    fn accept(&self) -> impl Future<Output = io::Result<(TcpStream, SocketAddr)>> + Send {
        TcpListener::accept(self)
    }
}

/// Accept loop state, moved into its own task by the controller
pub struct Acceptor<L = TcpListener> {
    listener: L,
    registry: Arc<ConnectionRegistry>,
    sink: Arc<dyn NotificationSink>,
    running: Arc<AtomicBool>,
    shutdown: Receiver<()>,
    poll_interval: Duration,
    limiter: Option<Arc<Semaphore>>,
    failure: Arc<Mutex<Option<String>>>,
}

impl<L: ConnectionSource> Acceptor<L> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        listener: L,
        registry: Arc<ConnectionRegistry>,
        sink: Arc<dyn NotificationSink>,
        running: Arc<AtomicBool>,
        shutdown: Receiver<()>,
        poll_interval: Duration,
        limit: HandlerLimit,
        failure: Arc<Mutex<Option<String>>>,
    ) -> Self {
        Self {
            listener,
            registry,
            sink,
            running,
            shutdown,
            poll_interval,
            limiter: limit.semaphore(),
            failure,
        }
    }

    /// Run until the running flag is cleared or accept fails
    ///
    /// The listener is dropped (closed) when this returns.
    pub async fn run(self) {
        self.sink.on_status("Server is listening for client connections...");

        while self.running.load(Ordering::SeqCst) {
            let accepted = tokio::select! {
                _ = self.shutdown.recv_async() => break,
                accepted = timeout(self.poll_interval, self.listener.accept()) => accepted,
            };

            match accepted {
                // Poll timeout: re-check the running flag.
                Err(_) => continue,
                Ok(Ok((stream, peer))) => self.dispatch(stream, peer),
                Ok(Err(e)) => {
                    if self.running.load(Ordering::SeqCst) {
                        let failure = RelayError::accept_failure(&e);
                        error!("{}", failure);
                        self.sink.on_status(&failure.to_string());
                        *self.failure.lock() = Some(failure.to_string());
                    }
                    break;
                }
            }
        }

        debug!("Accept loop exited");
    }

    fn dispatch(&self, stream: TcpStream, peer: SocketAddr) {
        info!("Accepted connection from {}", peer);
        self.sink.on_status(&format!("Accepted connection from {peer}"));

        let (id, closed) = self.registry.register(peer);
        let registry = self.registry.clone();
        let sink = self.sink.clone();
        let limiter = self.limiter.clone();

        tokio::spawn(async move {
            let _registration = scopeguard::guard(id, move |id| {
                registry.unregister(id);
            });

            let _permit = match limiter {
                Some(semaphore) => tokio::select! {
                    permit = semaphore.acquire_owned() => permit.ok(),
                    _ = closed.recv_async() => {
                        debug!("Connection {} closed while waiting for a handler slot", peer);
                        return;
                    }
                },
                None => None,
            };

            let _ = handle_connection(stream, peer, sink.as_ref(), &closed).await;
        });
    }
}
