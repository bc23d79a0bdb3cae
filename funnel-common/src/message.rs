//! # Message Unit
//!
//! Purpose: Define the unit of data forwarded from a client connection to
//! the consumer, and the fixed acknowledgement it is answered with.
//!
//! ## Design Principles
//!
//! 1. **Immutable Payloads**: `Bytes` keeps payloads cheap to clone and
//!    frozen after construction.
//! 2. **Exact Reads**: A message carries exactly the bytes one read
//!    returned, never the surrounding buffer.
//! 3. **Self-Describing Origin**: The remote address travels with the
//!    payload so the consumer needs no per-connection state.

use std::borrow::Cow;

use bytes::Bytes;

/// Fixed acknowledgement written back after every forwarded message.
pub const ACK: &[u8] = b"Thanks for the message";

/// A chunk of bytes received from one client connection.
///
/// One successful read produces exactly one message. No framing is applied:
/// a payload may cover part of, or several of, whatever the client considers
/// a logical unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Remote address of the connection that produced the message.
    pub origin: String,
    /// Raw bytes exactly as returned by the read that produced them.
    pub payload: Bytes,
}

impl Message {
    /// Builds a message from a peer address and the bytes read from it.
    pub fn new(origin: impl Into<String>, payload: impl Into<Bytes>) -> Self {
        Message {
            origin: origin.into(),
            payload: payload.into(),
        }
    }

    /// Payload rendered as text for logging; invalid UTF-8 is replaced.
    pub fn payload_text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn carries_exactly_the_bytes_read() {
        let buf = b"hello world, trailing garbage";
        let read_len = 11;
        let msg = Message::new("127.0.0.1:4000", Bytes::copy_from_slice(&buf[..read_len]));
        assert_eq!(msg.payload.as_ref(), b"hello world");
        assert_eq!(msg.origin, "127.0.0.1:4000");
    }

    #[test]
    fn renders_payload_as_text() {
        let msg = Message::new("peer", Bytes::from_static(b"ping"));
        assert_eq!(msg.payload_text(), "ping");

        let binary = Message::new("peer", Bytes::from_static(&[0xff, 0xfe]));
        assert!(binary.payload_text().contains('\u{fffd}'));
    }
}
