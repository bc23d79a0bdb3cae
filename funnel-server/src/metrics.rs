//! # Server Metrics
//!
//! Provide lightweight counters and a payload-size histogram for the
//! connection fan-in path.
//!
//! ## Design Principles
//! 1. **Accumulator Pattern**: Use atomic counters to aggregate events cheaply.
//! 2. **Fixed Buckets**: Keep histogram buckets in a contiguous array for cache locality.
//! 3. **Zero-Cost Access**: Expose snapshots as plain structs without heap work.
//! 4. **Decoupled Reporting**: Recording never logs; the server decides when
//!    to surface a snapshot.

use std::sync::atomic::{AtomicU64, Ordering};

/// Default payload-size bucket boundaries in bytes.
///
/// The top boundary matches the default read buffer, so the overflow bucket
/// only fills when the buffer size is raised.
pub const DEFAULT_SIZE_BUCKETS: [u64; 6] = [16, 64, 256, 512, 1_024, 2_048];

/// Snapshot of all server counters at a point in time.
#[derive(Debug, Clone)]
pub struct MetricsSnapshot {
    /// Connections accepted since startup.
    pub connections_total: u64,
    /// Messages forwarded into the sink.
    pub messages_total: u64,
    /// Sum of payload bytes forwarded.
    pub payload_bytes_total: u64,
    /// Read and write failures on established connections.
    pub io_errors_total: u64,
    /// Accept failures observed by the acceptor.
    pub accept_errors_total: u64,
    /// Payload-size histogram snapshot.
    pub sizes: SizeSnapshot,
}

/// Snapshot of the payload-size histogram.
#[derive(Debug, Clone)]
pub struct SizeSnapshot {
    /// Bucket boundaries in bytes.
    pub bounds: Vec<u64>,
    /// Bucket counts, including the overflow bucket at the end.
    pub buckets: Vec<u64>,
}

/// Thread-safe metrics aggregator shared by the acceptor and readers.
///
/// The struct uses `AtomicU64` so record calls are zero-allocation and
/// cheap. `Ordering::Relaxed` is sufficient because no cross-field ordering
/// is required, only eventually consistent totals.
pub struct Metrics {
    connections_total: AtomicU64,
    messages_total: AtomicU64,
    io_errors_total: AtomicU64,
    accept_errors_total: AtomicU64,
    sizes: SizeHistogram,
}

impl Metrics {
    /// Creates a metrics aggregator with the default size buckets.
    pub fn new() -> Self {
        Metrics {
            connections_total: AtomicU64::new(0),
            messages_total: AtomicU64::new(0),
            io_errors_total: AtomicU64::new(0),
            accept_errors_total: AtomicU64::new(0),
            sizes: SizeHistogram::new(DEFAULT_SIZE_BUCKETS.to_vec()),
        }
    }

    /// Records an accepted connection.
    pub fn record_connection(&self) {
        self.connections_total.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a message forwarded into the sink with its payload size.
    pub fn record_message(&self, payload_len: usize) {
        self.messages_total.fetch_add(1, Ordering::Relaxed);
        self.sizes.record(payload_len as u64);
    }

    /// Records a read or write failure on an established connection.
    pub fn record_io_error(&self) {
        self.io_errors_total.fetch_add(1, Ordering::Relaxed);
    }

    /// Records an accept failure.
    pub fn record_accept_error(&self) {
        self.accept_errors_total.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns a snapshot of all counters and histogram buckets.
    pub fn snapshot(&self) -> MetricsSnapshot {
        let sizes = self.sizes.snapshot();
        MetricsSnapshot {
            connections_total: self.connections_total.load(Ordering::Relaxed),
            messages_total: self.messages_total.load(Ordering::Relaxed),
            payload_bytes_total: self.sizes.total_bytes(),
            io_errors_total: self.io_errors_total.load(Ordering::Relaxed),
            accept_errors_total: self.accept_errors_total.load(Ordering::Relaxed),
            sizes,
        }
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Fixed-bucket payload-size histogram.
///
/// Bucket selection is a linear scan; the list is small and stays hot in
/// cache.
struct SizeHistogram {
    bounds: Vec<u64>,
    buckets: Vec<AtomicU64>,
    sum: AtomicU64,
}

impl SizeHistogram {
    fn new(bounds: Vec<u64>) -> Self {
        let mut buckets = Vec::with_capacity(bounds.len() + 1);
        for _ in 0..=bounds.len() {
            buckets.push(AtomicU64::new(0));
        }

        SizeHistogram {
            bounds,
            buckets,
            sum: AtomicU64::new(0),
        }
    }

    fn record(&self, size: u64) {
        self.sum.fetch_add(size, Ordering::Relaxed);

        let mut bucket_idx = self.bounds.len();
        for (i, &bound) in self.bounds.iter().enumerate() {
            if size <= bound {
                bucket_idx = i;
                break;
            }
        }
        self.buckets[bucket_idx].fetch_add(1, Ordering::Relaxed);
    }

    fn total_bytes(&self) -> u64 {
        self.sum.load(Ordering::Relaxed)
    }

    fn snapshot(&self) -> SizeSnapshot {
        let buckets: Vec<u64> = self
            .buckets
            .iter()
            .map(|b| b.load(Ordering::Relaxed))
            .collect();

        SizeSnapshot {
            bounds: self.bounds.clone(),
            buckets,
        }
    }
}
