//! Key translation: raw key events in, local actions or `keypress` commands
//! out.

pub mod names;

use tracing::{debug, trace};

use crate::channel::{ChannelError, CommandChannel};
use crate::protocol::{ClientCommand, KeyDescriptor};
use crate::screen::ScrollRequest;

/// Keys still forwarded while an embedded frame has the input.
const FRAME_PASSTHROUGH: [&str; 3] = ["c", "d", "z"];

/// A key event as reported by the host.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawKey {
    pub code: u32,
    pub name: Option<String>,
    pub string: Option<String>,
    pub shift: bool,
    pub alt: bool,
    pub control: bool,
}

impl RawKey {
    pub fn new(code: u32) -> Self {
        Self {
            code,
            ..Self::default()
        }
    }

    pub fn named(name: &str) -> Self {
        Self {
            code: names::key_code(name).unwrap_or_default(),
            name: Some(name.to_string()),
            ..Self::default()
        }
    }

    pub fn with_string(mut self, string: impl Into<String>) -> Self {
        self.string = Some(string.into());
        self
    }

    pub fn with_shift(mut self) -> Self {
        self.shift = true;
        self
    }

    pub fn with_alt(mut self) -> Self {
        self.alt = true;
        self
    }

    pub fn with_control(mut self) -> Self {
        self.control = true;
        self
    }

    /// Symbolic name: the host's name, else the key-code table, else the
    /// letter for control+A..Z.
    pub fn resolved_name(&self) -> Option<String> {
        if let Some(name) = &self.name {
            return Some(name.clone());
        }
        if let Some(name) = names::key_name(self.code) {
            return Some(name.to_string());
        }
        if self.control && (65..=90).contains(&self.code) {
            return char::from_u32(self.code).map(String::from);
        }
        None
    }

    fn printable(&self) -> Option<&str> {
        self.string
            .as_deref()
            .filter(|s| !s.is_empty() && s.chars().all(|c| !c.is_control()))
    }
}

/// `shift-control-alt-key`, modifiers in that fixed order; the key is the
/// lower-cased name, or the literal character for unnamed keys.
pub fn chord(key: &RawKey, name: Option<&str>) -> Option<String> {
    let base = match name {
        Some(name) => name.to_lowercase(),
        None => key.printable()?.to_string(),
    };
    let mut parts: Vec<&str> = Vec::with_capacity(4);
    if key.shift {
        parts.push("shift");
    }
    if key.control {
        parts.push("control");
    }
    if key.alt {
        parts.push("alt");
    }
    parts.push(&base);
    Some(parts.join("-"))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyAction {
    /// Handled locally by the viewport.
    Scroll(ScrollRequest),
    /// Ask the backend to paste the selection.
    Paste,
    Forward(KeyDescriptor),
    /// Nothing to send; the host keeps default handling.
    Ignore,
}

/// Decides what a key does without side effects.
pub fn translate(key: &RawKey, frame_active: bool) -> KeyAction {
    let name = key.resolved_name();
    if key.shift && !key.control && !key.alt {
        match name.as_deref() {
            Some("Page_Up") => return KeyAction::Scroll(ScrollRequest::PageUp),
            Some("Page_Down") => return KeyAction::Scroll(ScrollRequest::PageDown),
            Some("Home") => return KeyAction::Scroll(ScrollRequest::Top),
            Some("End") => return KeyAction::Scroll(ScrollRequest::Bottom),
            Some("Insert") => return KeyAction::Paste,
            _ => {}
        }
    }

    let Some(chord) = chord(key, name.as_deref()) else {
        return KeyAction::Ignore;
    };
    if frame_active {
        let passthrough = key.control
            && name
                .as_deref()
                .is_some_and(|n| FRAME_PASSTHROUGH.contains(&n.to_lowercase().as_str()));
        if !passthrough {
            return KeyAction::Ignore;
        }
    }
    KeyAction::Forward(KeyDescriptor {
        code: key.code,
        name,
        string: key.string.clone(),
        shift: key.shift,
        alt: key.alt,
        control: key.control,
        chord,
    })
}

/// What the host should do with the original event after translation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct KeyOutcome {
    /// True when the host's default handling must be suppressed.
    pub suppress: bool,
    pub scroll: Option<ScrollRequest>,
}

/// Translates a key and sends whatever it maps to. While a frame is current
/// default handling is never suppressed, since the frame consumes the key.
pub fn handle_key(
    key: &RawKey,
    frame_active: bool,
    channel: &mut CommandChannel,
) -> Result<KeyOutcome, ChannelError> {
    let action = translate(key, frame_active);
    trace!(target: "umbrella::keys", code = key.code, ?action, "key translated");
    let outcome = match action {
        KeyAction::Scroll(request) => KeyOutcome {
            suppress: true,
            scroll: Some(request),
        },
        KeyAction::Paste => {
            channel.send(ClientCommand::PasteRequest)?;
            KeyOutcome {
                suppress: true,
                scroll: None,
            }
        }
        KeyAction::Forward(descriptor) => {
            debug!(target: "umbrella::keys", chord = %descriptor.chord, "forwarding key");
            channel.send(ClientCommand::Keypress { key: descriptor })?;
            KeyOutcome {
                suppress: !frame_active,
                scroll: None,
            }
        }
        KeyAction::Ignore => KeyOutcome::default(),
    };
    Ok(outcome)
}
