//! # Connection Reader
//!
//! Per-connection loop: read a chunk, enqueue it as a message, acknowledge.
//!
//! ## Design Principles
//!
//! 1. **Exclusive Ownership**: The reader owns its stream; nothing else
//!    touches the connection for its lifetime.
//! 2. **One Read, One Message**: Every successful read becomes exactly one
//!    message; no framing, splitting, or coalescing.
//! 3. **Errors End The Task**: Any read or write failure drops the stream
//!    and terminates the reader; no error reaches the client.
//! 4. **Backpressure From The Sink**: A full sink suspends the reader before
//!    it acknowledges, throttling that connection only.

use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use funnel_common::{ACK, FunnelError, Message};

use crate::metrics::Metrics;

/// Per-connection reader task state.
pub struct Reader {
    stream: TcpStream,
    peer: SocketAddr,
    messages_tx: mpsc::Sender<Message>,
    metrics: Arc<Metrics>,
    read_buffer: usize,
}

impl Reader {
    /// Creates a reader that exclusively owns `stream`.
    pub fn new(
        stream: TcpStream,
        peer: SocketAddr,
        messages_tx: mpsc::Sender<Message>,
        metrics: Arc<Metrics>,
        read_buffer: usize,
    ) -> Self {
        Reader {
            stream,
            peer,
            messages_tx,
            metrics,
            read_buffer,
        }
    }

    /// Runs the read loop until the connection ends.
    ///
    /// Terminates on peer close, on any read or write error, or when the
    /// sink has closed because the server stopped. The stream is dropped on
    /// every exit path.
    pub async fn run(mut self) {
        let mut buf = vec![0u8; self.read_buffer];

        loop {
            let n = match self.stream.read(&mut buf).await {
                Ok(0) => {
                    debug!(peer = %self.peer, "peer closed connection");
                    return;
                }
                Ok(n) => n,
                Err(source) => {
                    let err = FunnelError::Connection {
                        peer: self.peer.to_string(),
                        source,
                    };
                    warn!(error = %err, "read failed");
                    self.metrics.record_io_error();
                    return;
                }
            };

            let message = Message::new(self.peer.to_string(), Bytes::copy_from_slice(&buf[..n]));

            // Suspends while the sink is full.
            if self.messages_tx.send(message).await.is_err() {
                debug!(peer = %self.peer, "sink closed, dropping connection");
                return;
            }
            self.metrics.record_message(n);

            if let Err(source) = self.stream.write_all(ACK).await {
                let err = FunnelError::Connection {
                    peer: self.peer.to_string(),
                    source,
                };
                warn!(error = %err, "write failed");
                self.metrics.record_io_error();
                return;
            }
        }
    }
}
