//! Messages exchanged with the terminal backend.
//!
//! The backend owns the PTY and the escape-sequence state machine; it talks to
//! this client in terms of whole rendered lines. Inbound messages are
//! [`BackendInstruction`]s, outbound messages are [`ClientCommand`]s. Both are
//! closed enums: nothing the backend sends is ever interpreted as code.

use serde::{Deserialize, Serialize};

pub mod wire;

pub use wire::{WireError, decode_instructions, encode_command};

/// Identifier of an embedded frame, chosen by the backend.
pub type FrameId = String;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "camelCase")]
pub enum BackendInstruction {
    SetLine {
        line: usize,
        content: String,
    },
    InsertLine {
        line: usize,
        content: String,
    },
    AppendLine {
        content: String,
    },
    RemoveLine {
        line: usize,
    },
    RemoveLastLine,
    SetScreenZero {
        line: usize,
    },
    RemoveHistoryLines {
        count: usize,
    },
    CheckHistorySize,
    Reset,
    InsertFrame {
        line: usize,
        id: FrameId,
        source: String,
    },
    FrameWrite {
        content: String,
    },
    FrameCloseDocument,
    FrameLeave,
    FrameResize {
        id: FrameId,
        height: u32,
    },
    SetApplicationMode {
        enabled: bool,
    },
    ScrollToBottom,
}

impl BackendInstruction {
    /// Short name used in logs and error reports.
    pub fn op(&self) -> &'static str {
        match self {
            BackendInstruction::SetLine { .. } => "setLine",
            BackendInstruction::InsertLine { .. } => "insertLine",
            BackendInstruction::AppendLine { .. } => "appendLine",
            BackendInstruction::RemoveLine { .. } => "removeLine",
            BackendInstruction::RemoveLastLine => "removeLastLine",
            BackendInstruction::SetScreenZero { .. } => "setScreenZero",
            BackendInstruction::RemoveHistoryLines { .. } => "removeHistoryLines",
            BackendInstruction::CheckHistorySize => "checkHistorySize",
            BackendInstruction::Reset => "reset",
            BackendInstruction::InsertFrame { .. } => "insertFrame",
            BackendInstruction::FrameWrite { .. } => "frameWrite",
            BackendInstruction::FrameCloseDocument => "frameCloseDocument",
            BackendInstruction::FrameLeave => "frameLeave",
            BackendInstruction::FrameResize { .. } => "frameResize",
            BackendInstruction::SetApplicationMode { .. } => "setApplicationMode",
            BackendInstruction::ScrollToBottom => "scrollToBottom",
        }
    }
}

/// A key event as handed to the backend: the raw event plus the symbolic
/// name and chord the client resolved for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyDescriptor {
    pub code: u32,
    pub name: Option<String>,
    pub string: Option<String>,
    pub shift: bool,
    pub alt: bool,
    pub control: bool,
    pub chord: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "cmd", rename_all = "kebab-case")]
pub enum ClientCommand {
    Resize { cols: u16, lines: u16 },
    Keypress { key: KeyDescriptor },
    Focus { enabled: bool },
    PasteRequest,
    RemoveHistory { count: usize },
    /// Free-form message raised by the content of the current frame.
    FrameMessage { id: FrameId, data: String },
    /// Height the content of the current frame asked for.
    FrameResizeRequest { id: FrameId, height: u32 },
}

impl ClientCommand {
    pub fn kind(&self) -> &'static str {
        match self {
            ClientCommand::Resize { .. } => "resize",
            ClientCommand::Keypress { .. } => "keypress",
            ClientCommand::Focus { .. } => "focus",
            ClientCommand::PasteRequest => "paste-request",
            ClientCommand::RemoveHistory { .. } => "remove-history",
            ClientCommand::FrameMessage { .. } => "frame-message",
            ClientCommand::FrameResizeRequest { .. } => "frame-resize-request",
        }
    }
}
