//! # Funnel Server
//!
//! Run the TCP fan-in server: accept client connections, forward every read
//! chunk to the logging consumer, and acknowledge each one.
//!
//! ## Design Principles
//!
//! 1. **Thin Binary**: Wiring only; behavior lives in the library crates.
//! 2. **Fatal Binds**: A bind failure is logged and exits non-zero.
//! 3. **Injectable Stop**: Ctrl-C fires the stop handle; without a signal
//!    the server runs forever.

use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use funnel_server::{Config, Consumer, Server};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let config = Config::from_env();
    let (server, handle, messages_rx) = Server::with_config(config);

    let consumer = tokio::spawn(Consumer::new(messages_rx).run());

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupt received, stopping");
            handle.shutdown();
        }
    });

    if let Err(err) = server.start().await {
        error!(error = %err, "fatal startup failure");
        return Err(err.into());
    }

    consumer.await?;
    Ok(())
}
