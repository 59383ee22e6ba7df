//! Terminal input: crossterm events read on a dedicated thread and mapped to
//! [`ClientEvent`]s.

use std::thread;
use std::time::Duration;

use crossterm::event::{
    self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers, MouseEventKind,
};
use tokio::sync::mpsc;
use tracing::{trace, warn};

use crate::keys::RawKey;
use crate::protocol::FrameId;
use crate::screen::FrameSignal;

const POLL_INTERVAL: Duration = Duration::from_millis(50);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    Key(RawKey),
    /// Mouse wheel notches; negative scrolls towards history.
    Wheel(i32),
    Resize,
    Focus(bool),
    /// Raised by hosts that run frame content; the terminal reader never
    /// produces it.
    FrameSignal { id: FrameId, signal: FrameSignal },
    Quit,
}

/// Spawns the reader thread. It stops once the receiver is dropped.
pub fn spawn_reader() -> mpsc::UnboundedReceiver<ClientEvent> {
    let (tx, rx) = mpsc::unbounded_channel();
    thread::spawn(move || {
        loop {
            if tx.is_closed() {
                return;
            }
            match event::poll(POLL_INTERVAL) {
                Ok(false) => continue,
                Ok(true) => {}
                Err(err) => {
                    warn!(target: "umbrella::client", error = %err, "input poll failed");
                    return;
                }
            }
            let evt = match event::read() {
                Ok(evt) => evt,
                Err(err) => {
                    warn!(target: "umbrella::client", error = %err, "input read failed");
                    return;
                }
            };
            if let Some(client_event) = map_event(evt) {
                if tx.send(client_event).is_err() {
                    return;
                }
            }
        }
    });
    rx
}

pub fn map_event(evt: Event) -> Option<ClientEvent> {
    match evt {
        Event::Key(key) => map_key(key),
        Event::Mouse(mouse) => match mouse.kind {
            MouseEventKind::ScrollUp => Some(ClientEvent::Wheel(-1)),
            MouseEventKind::ScrollDown => Some(ClientEvent::Wheel(1)),
            _ => None,
        },
        Event::Resize(cols, rows) => {
            trace!(target: "umbrella::client", cols, rows, "terminal resized");
            Some(ClientEvent::Resize)
        }
        Event::FocusGained => Some(ClientEvent::Focus(true)),
        Event::FocusLost => Some(ClientEvent::Focus(false)),
        Event::Paste(_) => None,
    }
}

fn map_key(key: KeyEvent) -> Option<ClientEvent> {
    if key.kind == KeyEventKind::Release {
        return None;
    }
    let shift = key.modifiers.contains(KeyModifiers::SHIFT);
    let alt = key.modifiers.contains(KeyModifiers::ALT);
    let control = key.modifiers.contains(KeyModifiers::CONTROL);

    // control-alt-q leaves the client; everything else goes to the translator
    if control && alt && matches!(key.code, KeyCode::Char('q' | 'Q')) {
        return Some(ClientEvent::Quit);
    }

    let mut raw = match key.code {
        KeyCode::Char(c) => {
            let mut raw = RawKey::new(char_code(c));
            if !control {
                raw.string = Some(c.to_string());
            }
            raw
        }
        KeyCode::Backspace => RawKey::new(8),
        KeyCode::Tab => RawKey::new(9),
        KeyCode::BackTab => RawKey::new(9).with_shift(),
        KeyCode::Enter => RawKey::new(13).with_string("\r"),
        KeyCode::Esc => RawKey::new(27),
        KeyCode::PageUp => RawKey::new(33),
        KeyCode::PageDown => RawKey::new(34),
        KeyCode::End => RawKey::new(35),
        KeyCode::Home => RawKey::new(36),
        KeyCode::Left => RawKey::new(37),
        KeyCode::Up => RawKey::new(38),
        KeyCode::Right => RawKey::new(39),
        KeyCode::Down => RawKey::new(40),
        KeyCode::Insert => RawKey::new(45),
        KeyCode::Delete => RawKey::new(46),
        KeyCode::F(n @ 1..=12) => RawKey::new(111 + u32::from(n)),
        _ => return None,
    };
    raw.shift |= shift;
    raw.alt = alt;
    raw.control = control;
    Some(ClientEvent::Key(raw))
}

/// DOM key code of the physical key that produces `c` on a US layout.
/// Characters without one report 0 so they never alias a named key.
fn char_code(c: char) -> u32 {
    match c {
        'a'..='z' | 'A'..='Z' => u32::from(c.to_ascii_uppercase()),
        '0'..='9' | ' ' => u32::from(c),
        ')' => 48,
        '!' => 49,
        '@' => 50,
        '#' => 51,
        '$' => 52,
        '%' => 53,
        '^' => 54,
        '&' => 55,
        '*' => 56,
        '(' => 57,
        ';' | ':' => 186,
        '=' | '+' => 187,
        ',' | '<' => 188,
        '-' | '_' => 189,
        '.' | '>' => 190,
        '/' | '?' => 191,
        '`' | '~' => 192,
        '[' | '{' => 219,
        '\\' | '|' => 220,
        ']' | '}' => 221,
        '\'' | '"' => 222,
        _ => 0,
    }
}
