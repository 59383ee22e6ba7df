//! In-process transport for tests and headless runs.

use tokio::sync::mpsc;

use super::BackendLink;
use crate::protocol::{BackendInstruction, ClientCommand};

/// The backend end of an in-memory link.
#[derive(Debug)]
pub struct MemoryBackend {
    pub commands: mpsc::UnboundedReceiver<ClientCommand>,
    pub instructions: mpsc::UnboundedSender<String>,
}

impl MemoryBackend {
    /// Sends one raw text message as the backend would.
    pub fn send_text(&self, text: impl Into<String>) -> bool {
        self.instructions.send(text.into()).is_ok()
    }

    /// Sends a batch of instructions as one JSON array message.
    pub fn send_batch(&self, batch: &[BackendInstruction]) -> bool {
        match serde_json::to_string(batch) {
            Ok(text) => self.send_text(text),
            Err(_) => false,
        }
    }

    /// Commands the client has sent so far, without waiting.
    pub fn drain_commands(&mut self) -> Vec<ClientCommand> {
        let mut received = Vec::new();
        while let Ok(command) = self.commands.try_recv() {
            received.push(command);
        }
        received
    }
}

pub fn pair() -> (BackendLink, MemoryBackend) {
    let (command_tx, command_rx) = mpsc::unbounded_channel();
    let (text_tx, text_rx) = mpsc::unbounded_channel();
    let link = BackendLink {
        commands: command_tx,
        inbound: text_rx,
        task: None,
    };
    let backend = MemoryBackend {
        commands: command_rx,
        instructions: text_tx,
    };
    (link, backend)
}
