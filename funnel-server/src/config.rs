//! # Server Configuration
//!
//! Purpose: Resolve the listen address, sink capacity, and read buffer size
//! from environment variables with safe defaults.
//!
//! ## Design Principles
//!
//! 1. **Environment Only**: No configuration files; a `FUNNEL_*` variable
//!    either overrides a default or the default stands.
//! 2. **Fail-Open Overrides**: A malformed override is logged and ignored
//!    rather than aborting startup.
//! 3. **Bounded By Default**: The sink capacity defaults small and is never
//!    unbounded.

use tracing::warn;

/// Default listen address: all interfaces, port 3000.
pub const DEFAULT_ADDR: &str = "0.0.0.0:3000";

/// Default capacity of the message sink.
pub const DEFAULT_QUEUE_CAPACITY: usize = 10;

/// Default upper bound on bytes consumed per read, in bytes.
pub const DEFAULT_READ_BUFFER: usize = 2048;

/// Resolved server configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Address the listener binds.
    pub addr: String,
    /// Capacity of the message sink; must be non-zero.
    pub queue_capacity: usize,
    /// Upper bound on bytes consumed per read; must be non-zero.
    pub read_buffer: usize,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            addr: DEFAULT_ADDR.to_string(),
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            read_buffer: DEFAULT_READ_BUFFER,
        }
    }
}

impl Config {
    /// Builds a configuration for the given address with default sizing.
    pub fn new(addr: impl Into<String>) -> Self {
        Config {
            addr: addr.into(),
            ..Default::default()
        }
    }

    /// Reads configuration from `FUNNEL_ADDR`, `FUNNEL_QUEUE_CAPACITY`, and
    /// `FUNNEL_READ_BUFFER`.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        Config {
            addr: lookup("FUNNEL_ADDR").unwrap_or_else(|| DEFAULT_ADDR.to_string()),
            queue_capacity: size_override(
                "FUNNEL_QUEUE_CAPACITY",
                lookup("FUNNEL_QUEUE_CAPACITY"),
                DEFAULT_QUEUE_CAPACITY,
            ),
            read_buffer: size_override(
                "FUNNEL_READ_BUFFER",
                lookup("FUNNEL_READ_BUFFER"),
                DEFAULT_READ_BUFFER,
            ),
        }
    }
}

fn size_override(key: &str, raw: Option<String>, default: usize) -> usize {
    match raw {
        Some(raw) => match raw.parse::<usize>() {
            Ok(value) if value > 0 => value,
            _ => {
                warn!(key, value = %raw, "ignoring invalid size override");
                default
            }
        },
        None => default,
    }
}
