//! # Server Lifecycle and Acceptor
//!
//! Bind the listener, run the accept loop, and fan accepted connections out
//! to per-connection reader tasks feeding one bounded sink.
//!
//! ## Design Principles
//!
//! 1. **Async First**: Tokio tasks carry the acceptor and every reader;
//!    concurrency scales with open connections.
//! 2. **Explicit Ownership**: The sink's receiving half is handed out at
//!    construction; there is no global channel.
//! 3. **Fail-Open Accepts**: Accept errors are logged and retried forever;
//!    only bind failures are fatal.
//! 4. **Single-Fire Stop**: One oneshot signal ends the server; firing it
//!    releases the listener and initiates sink closure.

use std::net::SocketAddr;
use std::sync::Arc;

use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::TcpListener;
use tokio::sync::{mpsc, oneshot};
use tracing::{info, warn};

use funnel_common::{FunnelError, Message};

use crate::config::Config;
use crate::connection::Reader;
use crate::metrics::Metrics;

/// Listen backlog for the listening socket.
const BACKLOG: i32 = 1024;

/// TCP fan-in server: accepts connections and forwards every read chunk
/// into one bounded message sink.
pub struct Server {
    config: Config,
    metrics: Arc<Metrics>,
    messages_tx: mpsc::Sender<Message>,
    stop_rx: oneshot::Receiver<()>,
}

/// Single-fire handle that stops a running server.
///
/// Dropping the handle without calling [`ServerHandle::shutdown`] also stops
/// the server; hold it for as long as the server should run.
pub struct ServerHandle {
    stop_tx: oneshot::Sender<()>,
}

impl ServerHandle {
    /// Fires the stop signal.
    pub fn shutdown(self) {
        let _ = self.stop_tx.send(());
    }
}

impl Server {
    /// Creates a server that will listen on `addr` once started, with
    /// default sink capacity and read buffer size.
    ///
    /// Returns the server, its stop handle, and the receiving half of the
    /// message sink for the consumer. Performs no I/O.
    pub fn new(addr: impl Into<String>) -> (Self, ServerHandle, mpsc::Receiver<Message>) {
        Self::with_config(Config::new(addr))
    }

    /// Creates a server from a resolved configuration.
    pub fn with_config(config: Config) -> (Self, ServerHandle, mpsc::Receiver<Message>) {
        let (messages_tx, messages_rx) = mpsc::channel(config.queue_capacity);
        let (stop_tx, stop_rx) = oneshot::channel();

        let server = Server {
            config,
            metrics: Arc::new(Metrics::new()),
            messages_tx,
            stop_rx,
        };
        (server, ServerHandle { stop_tx }, messages_rx)
    }

    /// Shared metrics aggregator for this server.
    pub fn metrics(&self) -> Arc<Metrics> {
        Arc::clone(&self.metrics)
    }

    /// Binds the configured address and serves until the stop signal fires.
    ///
    /// Fails immediately with [`FunnelError::Bind`] if the listener cannot
    /// be created; this is the only error the server ever returns.
    pub async fn start(self) -> Result<(), FunnelError> {
        let listener = bind_listener(&self.config.addr)?;
        self.run(listener).await;
        Ok(())
    }

    /// Serves on an already-bound listener until the stop signal fires.
    ///
    /// Spawns the acceptor task, then suspends on the stop signal. On wake
    /// the acceptor is aborted, which releases the listener and drops the
    /// last server-held sink sender: readers spawned earlier keep their
    /// clones until their connections die, and the consumer observes
    /// end-of-stream once every sender is gone.
    pub async fn run(self, listener: TcpListener) {
        let acceptor = tokio::spawn(accept_loop(
            listener,
            self.messages_tx,
            Arc::clone(&self.metrics),
            self.config.read_buffer,
        ));

        let _ = self.stop_rx.await;

        acceptor.abort();
        let _ = acceptor.await;

        let snapshot = self.metrics.snapshot();
        info!(
            connections = snapshot.connections_total,
            messages = snapshot.messages_total,
            payload_bytes = snapshot.payload_bytes_total,
            io_errors = snapshot.io_errors_total,
            accept_errors = snapshot.accept_errors_total,
            "server stopped"
        );
    }
}

/// Builds a TCP listener with `SO_REUSEADDR` set before bind and registers
/// it with the tokio reactor.
pub fn bind_listener(addr: &str) -> Result<TcpListener, FunnelError> {
    create_listener(addr).map_err(|source| FunnelError::Bind {
        addr: addr.to_string(),
        source,
    })
}

fn create_listener(addr: &str) -> std::io::Result<TcpListener> {
    let addr: SocketAddr = addr
        .parse()
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e))?;

    let socket = Socket::new(
        match addr {
            SocketAddr::V4(_) => Domain::IPV4,
            SocketAddr::V6(_) => Domain::IPV6,
        },
        Type::STREAM,
        Some(Protocol::TCP),
    )?;

    socket.set_reuse_address(true)?;
    socket.set_nonblocking(true)?;
    socket.bind(&addr.into())?;
    socket.listen(BACKLOG)?;

    let listener = TcpListener::from_std(socket.into())?;
    info!(addr = %listener.local_addr()?, "listening");
    Ok(listener)
}

/// Accepts connections forever, spawning one reader task per connection.
///
/// Accept failures are transient: logged, counted, and retried.
async fn accept_loop(
    listener: TcpListener,
    messages_tx: mpsc::Sender<Message>,
    metrics: Arc<Metrics>,
    read_buffer: usize,
) {
    loop {
        let (stream, peer) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(source) => {
                let err = FunnelError::Accept { source };
                warn!(error = %err, "accept failed, retrying");
                metrics.record_accept_error();
                continue;
            }
        };

        info!(peer = %peer, "new connection");
        metrics.record_connection();

        let reader = Reader::new(
            stream,
            peer,
            messages_tx.clone(),
            Arc::clone(&metrics),
            read_buffer,
        );
        tokio::spawn(reader.run());
    }
}
