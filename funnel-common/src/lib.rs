// funnel-common - Shared types for the funnel message fan-in server
//
// This crate defines the message unit, the wire acknowledgement, and the
// error taxonomy shared between the server and its clients.

pub mod error;
pub mod message;

// Re-export for convenience
pub use error::*;
pub use message::*;
