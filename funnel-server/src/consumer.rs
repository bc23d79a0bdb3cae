//! # Message Consumer
//!
//! Drain the message sink and emit one log line per message. Stands in for
//! arbitrary downstream processing.

use tokio::sync::mpsc;
use tracing::info;

use funnel_common::Message;

/// Single consumer for the message sink.
pub struct Consumer {
    messages_rx: mpsc::Receiver<Message>,
}

impl Consumer {
    /// Creates a consumer owning the receiving half of the sink.
    pub fn new(messages_rx: mpsc::Receiver<Message>) -> Self {
        Consumer { messages_rx }
    }

    /// Drains the sink until it is closed and empty.
    pub async fn run(mut self) {
        while let Some(message) = self.messages_rx.recv().await {
            info!(
                origin = %message.origin,
                payload = %message.payload_text(),
                "message received"
            );
        }
    }
}
