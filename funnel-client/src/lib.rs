// funnel-client - Minimal blocking client for the funnel server
//
// Drives the wire format directly over std TCP so it can double as a manual
// smoke-test harness. The server's integration tests use it as their client.

use std::io::{Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream};
use std::time::Duration;

pub use funnel_common::ACK;

/// Blocking client for one funnel server connection.
pub struct FunnelClient {
    stream: TcpStream,
}

impl FunnelClient {
    /// Connects to a funnel server.
    pub fn connect(addr: SocketAddr) -> std::io::Result<Self> {
        let stream = TcpStream::connect(addr)?;
        stream.set_nodelay(true)?;
        Ok(FunnelClient { stream })
    }

    /// Sets an upper bound on how long [`FunnelClient::read_ack`] may block.
    pub fn set_ack_timeout(&self, timeout: Option<Duration>) -> std::io::Result<()> {
        self.stream.set_read_timeout(timeout)
    }

    /// Sends one payload.
    ///
    /// The server turns each of its reads into one message, so payloads from
    /// rapid back-to-back sends may arrive merged. Callers that need one
    /// message per payload should wait for the acknowledgement between
    /// sends.
    pub fn send(&mut self, payload: &[u8]) -> std::io::Result<()> {
        self.stream.write_all(payload)
    }

    /// Reads exactly one acknowledgement.
    pub fn read_ack(&mut self) -> std::io::Result<Vec<u8>> {
        let mut ack = vec![0u8; ACK.len()];
        self.stream.read_exact(&mut ack)?;
        Ok(ack)
    }

    /// Sends one payload and waits for its acknowledgement.
    pub fn send_acked(&mut self, payload: &[u8]) -> std::io::Result<Vec<u8>> {
        self.send(payload)?;
        self.read_ack()
    }

    /// Local address of the client socket; the server reports this as the
    /// message origin.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.stream.local_addr()
    }

    /// Closes both directions so the server observes end-of-stream.
    pub fn close(&self) -> std::io::Result<()> {
        self.stream.shutdown(Shutdown::Both)
    }
}
