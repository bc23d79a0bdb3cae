
pub mod config;
pub mod connection;
pub mod consumer;
pub mod metrics;
pub mod server;

pub use config::Config;
pub use consumer::Consumer;
pub use metrics::Metrics;
pub use metrics::MetricsSnapshot;
pub use server::Server;
pub use server::ServerHandle;
