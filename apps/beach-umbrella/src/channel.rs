//! Outbound command channel to the backend.
//!
//! The channel starts out `Connecting` and queues every command. Once the
//! transport is up, [`CommandChannel::open`] drains the queue in order and
//! switches to sending straight into the transport sink. There is no way
//! back to queuing; a dropped transport surfaces as [`ChannelError::Closed`].

use std::collections::VecDeque;

use tokio::sync::mpsc;
use tracing::{debug, trace, warn};

use crate::protocol::ClientCommand;

pub type CommandSink = mpsc::UnboundedSender<ClientCommand>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChannelError {
    #[error("backend transport closed")]
    Closed,
    #[error("command channel already open")]
    AlreadyOpen,
}

#[derive(Debug)]
enum ChannelState {
    Connecting { pending: VecDeque<ClientCommand> },
    Open { sink: CommandSink },
}

#[derive(Debug)]
pub struct CommandChannel {
    state: ChannelState,
}

impl Default for CommandChannel {
    fn default() -> Self {
        Self::connecting()
    }
}

impl CommandChannel {
    pub fn connecting() -> Self {
        Self {
            state: ChannelState::Connecting {
                pending: VecDeque::new(),
            },
        }
    }

    pub fn is_open(&self) -> bool {
        matches!(self.state, ChannelState::Open { .. })
    }

    pub fn pending_len(&self) -> usize {
        match &self.state {
            ChannelState::Connecting { pending } => pending.len(),
            ChannelState::Open { .. } => 0,
        }
    }

    pub fn send(&mut self, command: ClientCommand) -> Result<(), ChannelError> {
        match &mut self.state {
            ChannelState::Connecting { pending } => {
                trace!(
                    target: "umbrella::channel",
                    cmd = command.kind(),
                    queued = pending.len() + 1,
                    "queueing command until connected"
                );
                pending.push_back(command);
                Ok(())
            }
            ChannelState::Open { sink } => {
                trace!(target: "umbrella::channel", cmd = command.kind(), "sending command");
                sink.send(command).map_err(|_| ChannelError::Closed)
            }
        }
    }

    /// Switches to direct sending after flushing every queued command, in
    /// the order it was queued. Returns the number of flushed commands.
    pub fn open(&mut self, sink: CommandSink) -> Result<usize, ChannelError> {
        let pending = match &mut self.state {
            ChannelState::Connecting { pending } => std::mem::take(pending),
            ChannelState::Open { .. } => {
                warn!(target: "umbrella::channel", "ignoring second open");
                return Err(ChannelError::AlreadyOpen);
            }
        };
        let flushed = pending.len();
        let mut closed = false;
        for command in pending {
            if !closed && sink.send(command).is_err() {
                closed = true;
            }
        }
        self.state = ChannelState::Open { sink };
        if closed {
            return Err(ChannelError::Closed);
        }
        debug!(target: "umbrella::channel", flushed, "command channel open");
        Ok(flushed)
    }
}
