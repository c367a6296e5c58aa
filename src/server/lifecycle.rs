//! Server lifecycle controller
//!
//! Start/stop state machine around the acceptor. Only one transition can be
//! in flight: a call that finds the server `Starting` or `Stopping` fails
//! immediately instead of racing the socket.

use flume::Sender;
use parking_lot::Mutex;
use std::fmt;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};
use tracing::{debug, info, warn};

use crate::errors::{RelayError, RelayResult};
use crate::shared::protocol::{DEFAULT_POLL_INTERVAL, DEFAULT_SETTLE_DELAY};
use crate::shared::transport::TransportConfig;

use super::acceptor::{bind_listener, Acceptor, HandlerLimit};
use super::registry::ConnectionRegistry;
use super::sink::NotificationSink;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    Stopped,
    Starting,
    Running,
    Stopping,
}

impl fmt::Display for ServerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Stopped => "stopped",
            Self::Starting => "starting",
            Self::Running => "running",
            Self::Stopping => "stopping",
        };
        f.write_str(label)
    }
}

/// Timing and concurrency knobs of the controller
#[derive(Debug, Clone)]
pub struct ServerOptions {
    /// Accept poll timeout; bounds how long the loop takes to notice stop
    pub poll_interval: Duration,
    /// Pause before binding and after teardown
    pub settle_delay: Duration,
    pub handler_limit: HandlerLimit,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            settle_delay: DEFAULT_SETTLE_DELAY,
            handler_limit: HandlerLimit::Unbounded,
        }
    }
}

/// Resources that exist only while the server runs
struct ActiveServer {
    local_addr: SocketAddr,
    shutdown: Sender<()>,
    accept_task: JoinHandle<()>,
}

pub struct ServerController {
    config: Mutex<TransportConfig>,
    options: ServerOptions,
    state: Mutex<ServerState>,
    running: Arc<AtomicBool>,
    registry: Arc<ConnectionRegistry>,
    sink: Arc<dyn NotificationSink>,
    active: Mutex<Option<ActiveServer>>,
    last_failure: Arc<Mutex<Option<String>>>,
}

impl ServerController {
    pub fn new(config: TransportConfig, sink: Arc<dyn NotificationSink>) -> Self {
        Self::with_options(config, sink, ServerOptions::default())
    }

    pub fn with_options(
        config: TransportConfig,
        sink: Arc<dyn NotificationSink>,
        options: ServerOptions,
    ) -> Self {
        Self {
            config: Mutex::new(config),
            options,
            state: Mutex::new(ServerState::Stopped),
            running: Arc::new(AtomicBool::new(false)),
            registry: Arc::new(ConnectionRegistry::new()),
            sink,
            active: Mutex::new(None),
            last_failure: Arc::new(Mutex::new(None)),
        }
    }

    pub fn state(&self) -> ServerState {
        *self.state.lock()
    }

    pub fn config(&self) -> TransportConfig {
        self.config.lock().clone()
    }

    /// Address the listener is bound to while running
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.active.lock().as_ref().map(|active| active.local_addr)
    }

    /// Number of accepted connections whose handler has not finished
    pub fn live_connections(&self) -> usize {
        self.registry.len()
    }

    /// Fatal accept-loop error of the current run, if any
    pub fn last_failure(&self) -> Option<String> {
        self.last_failure.lock().clone()
    }

    /// Swap the bind configuration; only allowed while stopped
    pub fn replace_config(&self, config: TransportConfig) -> RelayResult<()> {
        let state = self.state.lock();
        if *state != ServerState::Stopped {
            return Err(RelayError::AlreadyRunning);
        }
        *self.config.lock() = config;
        Ok(())
    }

    /// Bind, listen and spawn the accept loop
    ///
    /// Returns a status line naming the bound address. A bind failure leaves
    /// the controller `Stopped`.
    pub async fn start(&self) -> RelayResult<String> {
        self.transition(ServerState::Stopped, ServerState::Starting)
            .map_err(|_| RelayError::AlreadyRunning)?;
        let reset = scopeguard::guard(&self.state, |state| {
            *state.lock() = ServerState::Stopped;
        });

        sleep(self.options.settle_delay).await;

        let config = self.config();
        let listener = match bind_listener(&config).await {
            Ok(listener) => listener,
            Err(e) => {
                warn!("{}", e);
                self.sink.on_status(&e.to_string());
                return Err(e);
            }
        };
        let local_addr = listener
            .local_addr()
            .map_err(|e| RelayError::bind_failure(config.to_string(), e))?;

        let (shutdown, shutdown_receiver) = flume::bounded(1);
        *self.last_failure.lock() = None;
        self.running.store(true, Ordering::SeqCst);

        let acceptor = Acceptor::new(
            listener,
            self.registry.clone(),
            self.sink.clone(),
            self.running.clone(),
            shutdown_receiver,
            self.options.poll_interval,
            self.options.handler_limit,
            self.last_failure.clone(),
        );
        let accept_task = tokio::spawn(acceptor.run());

        *self.active.lock() = Some(ActiveServer {
            local_addr,
            shutdown,
            accept_task,
        });
        scopeguard::ScopeGuard::into_inner(reset);
        *self.state.lock() = ServerState::Running;

        let status = format!("Server started, listening on {local_addr}");
        info!("{}", status);
        self.sink.on_status(&status);
        Ok(status)
    }

    /// Stop accepting, force-close live connections and release the socket
    ///
    /// Handlers get up to one settle delay to unregister; the full settle
    /// delay then follows, so the address is quiet before `start()` can run.
    pub async fn stop(&self) -> RelayResult<String> {
        self.transition(ServerState::Running, ServerState::Stopping)
            .map_err(|_| RelayError::NotRunning)?;
        let _stopped = scopeguard::guard(&self.state, |state| {
            *state.lock() = ServerState::Stopped;
        });

        self.running.store(false, Ordering::SeqCst);
        let active = self.active.lock().take();

        let open = self.registry.peers();
        let fired = self.registry.close_all();
        if fired > 0 {
            info!("Force-closing {} client connection(s)", fired);
            debug!("Open connections at stop: {:?}", open);
        }

        if let Some(active) = active {
            // Wakes the loop early; the cleared flag alone ends it within one poll.
            let _ = active.shutdown.try_send(());
            self.join_acceptor(active.accept_task).await;
        }

        self.registry.drain(self.options.settle_delay).await;
        sleep(self.options.settle_delay).await;

        let status = "Server stopped".to_string();
        info!("{}", status);
        self.sink.on_status(&status);
        Ok(status)
    }

    async fn join_acceptor(&self, mut task: JoinHandle<()>) {
        let bound = self.options.poll_interval + self.options.settle_delay;
        if timeout(bound, &mut task).await.is_err() {
            warn!("Accept loop did not exit within {:?}, aborting it", bound);
            task.abort();
            let _ = task.await;
        }
        debug!("Listening socket released");
    }

    fn transition(&self, from: ServerState, to: ServerState) -> Result<(), ServerState> {
        let mut state = self.state.lock();
        if *state != from {
            return Err(*state);
        }
        *state = to;
        Ok(())
    }
}

impl Drop for ServerController {
    fn drop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(active) = self.active.get_mut().take() {
            active.accept_task.abort();
        }
        self.registry.close_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::sink::{ChannelSink, LoggingSink, RelayEvent};
    use crate::shared::protocol::ACK_MESSAGE;
    use crate::shared::sender::send;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;
    use tokio::time::Instant;

    fn fast_options() -> ServerOptions {
        ServerOptions {
            poll_interval: Duration::from_millis(50),
            settle_delay: Duration::from_millis(50),
            handler_limit: HandlerLimit::Unbounded,
        }
    }

    fn free_port() -> u16 {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    }

    fn controller_on(port: u16, sink: Arc<dyn NotificationSink>) -> ServerController {
        let config = TransportConfig::validate("127.0.0.1", u32::from(port)).unwrap();
        ServerController::with_options(config, sink, fast_options())
    }

    #[tokio::test]
    async fn test_start_stop_restart_same_port() {
        let port = free_port();
        let controller = controller_on(port, Arc::new(LoggingSink));

        let status = controller.start().await.unwrap();
        assert!(status.contains(&format!("127.0.0.1:{port}")));
        assert_eq!(controller.state(), ServerState::Running);

        controller.stop().await.unwrap();
        assert_eq!(controller.state(), ServerState::Stopped);
        assert!(controller.local_addr().is_none());

        controller.start().await.unwrap();
        assert_eq!(controller.state(), ServerState::Running);
        controller.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_start_twice_and_stop_twice() {
        let controller = controller_on(free_port(), Arc::new(LoggingSink));
        assert!(matches!(controller.stop().await, Err(RelayError::NotRunning)));

        controller.start().await.unwrap();
        let bound = controller.local_addr();
        assert!(matches!(
            controller.start().await,
            Err(RelayError::AlreadyRunning)
        ));
        assert_eq!(controller.local_addr(), bound);

        assert_eq!(controller.stop().await.unwrap(), "Server stopped");
        assert_eq!(controller.state(), ServerState::Stopped);
        assert!(matches!(controller.stop().await, Err(RelayError::NotRunning)));
    }

    #[tokio::test]
    async fn test_concurrent_start_fails_fast() {
        let controller = Arc::new(controller_on(free_port(), Arc::new(LoggingSink)));

        let first = {
            let controller = controller.clone();
            tokio::spawn(async move { controller.start().await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(controller.state(), ServerState::Starting);
        assert!(matches!(
            controller.start().await,
            Err(RelayError::AlreadyRunning)
        ));

        first.await.unwrap().unwrap();
        controller.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_bind_failure_returns_to_stopped() {
        let holder = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = holder.local_addr().unwrap().port();
        let (sink, events) = ChannelSink::new();
        let controller = controller_on(port, Arc::new(sink));

        let result = controller.start().await;

        assert!(matches!(result, Err(RelayError::BindFailure { .. })));
        assert_eq!(controller.state(), ServerState::Stopped);
        assert!(events.drain().any(|event| matches!(
            event,
            RelayEvent::Status(ref s) if s.starts_with("Failed to start server")
        )));
    }

    #[tokio::test]
    async fn test_message_reaches_hook_exactly_once() {
        let (sink, events) = ChannelSink::new();
        let controller = controller_on(free_port(), Arc::new(sink));
        controller.start().await.unwrap();
        let port = controller.local_addr().unwrap().port();

        let ack = send("build finished", "127.0.0.1", port, Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(ack, ACK_MESSAGE);

        controller.stop().await.unwrap();
        let messages: Vec<_> = events
            .drain()
            .filter_map(|event| match event {
                RelayEvent::Message(text) => Some(text),
                RelayEvent::Status(_) => None,
            })
            .collect();
        assert_eq!(messages, vec!["build finished".to_string()]);
    }

    #[tokio::test]
    async fn test_stop_force_closes_open_connections() {
        let controller = controller_on(free_port(), Arc::new(LoggingSink));
        controller.start().await.unwrap();
        let addr = controller.local_addr().unwrap();

        let mut clients = Vec::new();
        for _ in 0..3 {
            clients.push(TcpStream::connect(addr).await.unwrap());
        }
        let deadline = Instant::now() + Duration::from_secs(2);
        while controller.live_connections() < 3 && Instant::now() < deadline {
            sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(controller.live_connections(), 3);

        controller.stop().await.unwrap();
        assert_eq!(controller.live_connections(), 0);

        for mut client in clients {
            let mut buf = [0u8; 16];
            let read = timeout(Duration::from_secs(1), client.read(&mut buf))
                .await
                .expect("read should not hang after stop");
            // Either an orderly EOF or a reset; never an acknowledgment.
            assert!(matches!(read, Ok(0) | Err(_)));
        }
    }

    #[tokio::test]
    async fn test_bounded_handlers_still_deliver() {
        let (sink, events) = ChannelSink::new();
        let port = free_port();
        let config = TransportConfig::validate("127.0.0.1", u32::from(port)).unwrap();
        let options = ServerOptions {
            handler_limit: HandlerLimit::Bounded(1),
            ..fast_options()
        };
        let controller = ServerController::with_options(config, Arc::new(sink), options);
        controller.start().await.unwrap();

        // Occupies the only handler slot until it writes.
        let mut idle = TcpStream::connect(("127.0.0.1", port)).await.unwrap();
        sleep(Duration::from_millis(50)).await;

        let waiting = tokio::spawn(async move {
            send("second", "127.0.0.1", port, Duration::from_secs(5)).await
        });
        sleep(Duration::from_millis(100)).await;
        assert!(!events
            .drain()
            .any(|event| event == RelayEvent::Message("second".to_string())));

        idle.write_all(b"first").await.unwrap();
        let mut ack = [0u8; 64];
        let n = idle.read(&mut ack).await.unwrap();
        assert_eq!(&ack[..n], ACK_MESSAGE.as_bytes());

        assert_eq!(waiting.await.unwrap().unwrap(), ACK_MESSAGE);
        controller.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_settle_delay_follows_slow_drain() {
        let controller = controller_on(free_port(), Arc::new(LoggingSink));
        controller.start().await.unwrap();

        // A connection whose handler never unregisters uses up the drain bound.
        let (_id, _closed) = controller.registry.register("127.0.0.1:40000".parse().unwrap());

        let started = Instant::now();
        controller.stop().await.unwrap();
        let settle = fast_options().settle_delay;

        assert!(started.elapsed() >= settle * 2);
        assert_eq!(controller.live_connections(), 0);
        assert_eq!(controller.state(), ServerState::Stopped);
    }

    #[tokio::test]
    async fn test_replace_config_requires_stopped() {
        let controller = controller_on(free_port(), Arc::new(LoggingSink));
        controller.start().await.unwrap();

        let other = TransportConfig::validate("127.0.0.1", u32::from(free_port())).unwrap();
        assert!(matches!(
            controller.replace_config(other.clone()),
            Err(RelayError::AlreadyRunning)
        ));

        controller.stop().await.unwrap();
        controller.replace_config(other.clone()).unwrap();
        assert_eq!(controller.config(), other);
    }
}
