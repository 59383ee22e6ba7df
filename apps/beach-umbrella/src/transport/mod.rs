//! Byte-level plumbing between the client and the backend.
//!
//! A [`BackendLink`] is what a connected transport hands back: a sink that
//! accepts client commands and a stream of raw inbound text messages.
//! Decoding the text into instructions is left to the client loop so wire
//! errors can be logged per message.

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::channel::CommandSink;

pub mod memory;
pub mod websocket;

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("failed to connect to backend: {0}")]
    Connect(#[from] Box<tokio_tungstenite::tungstenite::Error>),
    #[error("invalid backend url {url}: {reason}")]
    InvalidUrl { url: String, reason: String },
    #[error("backend transport closed")]
    Closed,
}

#[derive(Debug)]
pub struct BackendLink {
    pub commands: CommandSink,
    pub inbound: mpsc::UnboundedReceiver<String>,
    pub task: Option<JoinHandle<()>>,
}

impl BackendLink {
    /// Stops the background I/O task, if the transport has one.
    pub fn abort(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}
