//! # Funnel Error Types
//!
//! ## Design Principles
//!
//! 1. **Severity Drives Policy**: Each variant maps to a severity class that
//!    tells the observing loop whether to abort, drop the connection, or
//!    keep going.
//! 2. **Context Attached**: Variants carry the address or peer they refer
//!    to, so log lines need no extra plumbing.
//! 3. **Single Boundary Crossing**: Only the fatal bind failure is returned
//!    across a task boundary; everything else is logged where it happens.

use std::io;

use thiserror::Error;

/// Result type used across funnel components.
pub type FunnelResult<T> = Result<T, FunnelError>;

/// Coarse severity classes driving the error handling policy.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum ErrorSeverity {
    /// Startup failure; the process is expected to terminate.
    Fatal,
    /// Failure scoped to one connection; only that connection ends.
    ConnectionScoped,
    /// Retryable condition; the affected loop continues.
    Transient,
}

impl ErrorSeverity {
    /// Returns true if the loop observing the error may keep running.
    pub const fn is_recoverable(self) -> bool {
        !matches!(self, Self::Fatal)
    }
}

/// Errors produced by the funnel server.
#[derive(Debug, Error)]
pub enum FunnelError {
    /// The listening socket could not be created or bound.
    #[error("failed to bind listener on {addr}: {source}")]
    Bind {
        /// Address the server attempted to bind.
        addr: String,
        /// Underlying socket error.
        #[source]
        source: io::Error,
    },

    /// Accepting a pending connection failed.
    #[error("failed to accept connection: {source}")]
    Accept {
        /// Underlying socket error.
        #[source]
        source: io::Error,
    },

    /// Reading from or writing to an established connection failed.
    #[error("connection error with {peer}: {source}")]
    Connection {
        /// Remote address of the affected connection.
        peer: String,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
}

impl FunnelError {
    /// Returns the severity class of the error.
    pub const fn severity(&self) -> ErrorSeverity {
        match self {
            Self::Bind { .. } => ErrorSeverity::Fatal,
            Self::Accept { .. } => ErrorSeverity::Transient,
            Self::Connection { .. } => ErrorSeverity::ConnectionScoped,
        }
    }

    /// Returns true if the process should terminate on this error.
    pub const fn is_fatal(&self) -> bool {
        matches!(self.severity(), ErrorSeverity::Fatal)
    }
}
