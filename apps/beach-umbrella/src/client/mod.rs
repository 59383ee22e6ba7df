//! The host application: wires the screen, the command channel and a
//! transport together and runs the event loop.
//!
//! [`Session`] holds all client state and is driven by three event sources:
//! backend messages, user input and the connection completing. [`run`] owns
//! the terminal and the `tokio::select!` loop around it.

pub mod input;
pub mod render;

use std::io::{self, Stdout};
use std::time::Duration;

use crossterm::event::{
    DisableFocusChange, DisableMouseCapture, EnableFocusChange, EnableMouseCapture,
};
use crossterm::execute;
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use tokio::sync::mpsc;
use tracing::{debug, info, trace, warn};

use crate::channel::{ChannelError, CommandChannel, CommandSink};
use crate::config::Config;
use crate::keys::handle_key;
use crate::protocol::{ClientCommand, WireError, decode_instructions};
use crate::screen::{ScreenController, ScrollRequest};
use crate::surface::{FixedSurface, RenderSurface};
use crate::telemetry::{self, PerfGuard};
use crate::transport::{BackendLink, TransportError, websocket};

pub use input::ClientEvent;
pub use render::TerminalSurface;

const RENDER_INTERVAL: Duration = Duration::from_millis(16);

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
    #[error("command channel error: {0}")]
    Channel(#[from] ChannelError),
    #[error("protocol error: {0}")]
    Wire(#[from] WireError),
    #[error("terminal io error: {0}")]
    Io(#[from] io::Error),
    #[error("shutdown requested")]
    Shutdown,
}

/// Client state independent of the terminal and the event loop.
pub struct Session<S: RenderSurface> {
    screen: ScreenController,
    channel: CommandChannel,
    surface: S,
    scroll_lines: u16,
    dirty: bool,
}

impl<S: RenderSurface> Session<S> {
    pub fn new(config: &Config, surface: S) -> Self {
        Self {
            screen: ScreenController::new(config.initial_size, config.history_budget),
            channel: CommandChannel::connecting(),
            surface,
            scroll_lines: config.scroll_lines,
            dirty: true,
        }
    }

    pub fn screen(&self) -> &ScreenController {
        &self.screen
    }

    pub fn channel(&self) -> &CommandChannel {
        &self.channel
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }

    /// Initial measurement. The resulting `resize` is queued until the
    /// channel opens.
    pub fn start(&mut self) -> Result<(), ClientError> {
        self.screen.resize(&self.surface, &mut self.channel)?;
        self.dirty = true;
        Ok(())
    }

    /// The transport is up: flush everything queued so far.
    pub fn connected(&mut self, sink: CommandSink) -> Result<usize, ClientError> {
        let flushed = self.channel.open(sink)?;
        info!(target: "umbrella::client", flushed, "connected to backend");
        Ok(flushed)
    }

    /// Applies one inbound message. Returns the number of instructions it
    /// carried; a malformed message changes nothing and yields `Wire`.
    pub fn handle_message(&mut self, text: &str) -> Result<usize, ClientError> {
        telemetry::record_bytes("client.inbound_bytes", text.len());
        let instructions = decode_instructions(text)?;
        let _guard = PerfGuard::new("client.apply_batch");
        let count = instructions.len();
        for instruction in instructions {
            self.screen
                .apply(instruction, &self.surface, &mut self.channel)?;
        }
        self.screen.finish_batch(&mut self.channel)?;
        let store = self.screen.line_store();
        telemetry::record_gauge("screen.records", store.len() as u64);
        telemetry::record_gauge("screen.history_extent", u64::from(store.history_extent()));
        self.dirty = true;
        trace!(target: "umbrella::client", count, "batch applied");
        Ok(count)
    }

    pub fn handle_event(&mut self, event: ClientEvent) -> Result<(), ClientError> {
        match event {
            ClientEvent::Key(key) => {
                let outcome = handle_key(&key, self.screen.frame_active(), &mut self.channel)?;
                if let Some(request) = outcome.scroll {
                    self.screen.scroll(request);
                    self.dirty = true;
                }
            }
            ClientEvent::Wheel(notches) => {
                let rows = notches.saturating_mul(i32::from(self.scroll_lines));
                self.screen.scroll(ScrollRequest::Rows(rows));
                self.dirty = true;
            }
            ClientEvent::Resize => {
                self.screen.resize(&self.surface, &mut self.channel)?;
                self.dirty = true;
            }
            ClientEvent::Focus(enabled) => {
                self.channel.send(ClientCommand::Focus { enabled })?;
            }
            ClientEvent::FrameSignal { id, signal } => {
                self.screen.frame_signal(&id, signal, &mut self.channel)?;
            }
            ClientEvent::Quit => return Err(ClientError::Shutdown),
        }
        Ok(())
    }

    pub fn take_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }
}

/// Connects to `config.backend_url` and runs until the backend goes away or
/// the user quits. With `headless` no terminal is touched and the screen is
/// logged instead of drawn.
pub async fn run(config: Config, headless: bool) -> Result<(), ClientError> {
    let url = websocket::parse_backend_url(&config.backend_url)?;
    let connecting = tokio::spawn(async move { websocket::connect(&url).await });

    if headless {
        let surface = FixedSurface::grid(config.initial_size.lines, config.initial_size.cols);
        let mut session = Session::new(&config, surface);
        session.start()?;
        let (_events_tx, events) = mpsc::unbounded_channel();
        let result = event_loop(&mut session, connecting, events, None).await;
        debug!(target: "umbrella::client", screen = %render::snapshot(session.screen()), "final screen");
        return finish(result);
    }

    let mut terminal = setup_terminal()?;
    let mut session = Session::new(&config, TerminalSurface);
    let result = match session.start() {
        Ok(()) => event_loop(&mut session, connecting, input::spawn_reader(), Some(&mut terminal)).await,
        Err(err) => Err(err),
    };
    restore_terminal(&mut terminal)?;
    finish(result)
}

fn finish(result: Result<(), ClientError>) -> Result<(), ClientError> {
    match result {
        Err(ClientError::Shutdown) => {
            info!(target: "umbrella::client", "client stopped by user");
            Ok(())
        }
        other => other,
    }
}

type Tui = Terminal<CrosstermBackend<Stdout>>;

type Connecting = tokio::task::JoinHandle<Result<BackendLink, TransportError>>;

async fn event_loop<S: RenderSurface>(
    session: &mut Session<S>,
    mut connecting: Connecting,
    events: mpsc::UnboundedReceiver<ClientEvent>,
    terminal: Option<&mut Tui>,
) -> Result<(), ClientError> {
    let mut link: Option<BackendLink> = None;
    let result = drive(session, &mut connecting, &mut link, events, terminal).await;
    match link.as_mut() {
        Some(link) => link.abort(),
        None => connecting.abort(),
    }
    result
}

async fn drive<S: RenderSurface>(
    session: &mut Session<S>,
    connecting: &mut Connecting,
    link: &mut Option<BackendLink>,
    mut events: mpsc::UnboundedReceiver<ClientEvent>,
    mut terminal: Option<&mut Tui>,
) -> Result<(), ClientError> {
    let mut render_tick = tokio::time::interval(RENDER_INTERVAL);
    debug!(target: "umbrella::client", "event loop started");

    loop {
        tokio::select! {
            joined = &mut *connecting, if link.is_none() => {
                let connected = joined.map_err(|err| ClientError::Io(io::Error::other(err)))??;
                session.connected(connected.commands.clone())?;
                *link = Some(connected);
            }
            message = recv_inbound(link) => {
                let Some(text) = message else {
                    warn!(target: "umbrella::client", "backend closed the connection");
                    return Err(TransportError::Closed.into());
                };
                match session.handle_message(&text) {
                    Ok(_) => {}
                    Err(ClientError::Wire(err)) => {
                        warn!(target: "umbrella::client", error = %err, "dropping malformed backend message");
                    }
                    Err(err) => return Err(err),
                }
                if terminal.is_none() {
                    trace!(target: "umbrella::client", screen = %render::snapshot(session.screen()), "screen updated");
                }
            }
            Some(event) = events.recv() => {
                session.handle_event(event)?;
            }
            _ = render_tick.tick() => {
                if let Some(tui) = terminal.as_deref_mut() {
                    if session.take_dirty() {
                        let _guard = PerfGuard::new("client.render");
                        let screen = session.screen();
                        tui.draw(|frame| render::draw(frame, screen))?;
                    }
                }
            }
        }
    }
}

async fn recv_inbound(link: &mut Option<BackendLink>) -> Option<String> {
    match link {
        Some(link) => link.inbound.recv().await,
        None => std::future::pending().await,
    }
}

fn setup_terminal() -> Result<Tui, ClientError> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture, EnableFocusChange)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout))?;
    terminal.hide_cursor()?;
    terminal.clear()?;
    Ok(terminal)
}

fn restore_terminal(terminal: &mut Tui) -> Result<(), ClientError> {
    terminal.show_cursor().ok();
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        DisableFocusChange,
        DisableMouseCapture,
        LeaveAlternateScreen
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::RawKey;
    use crate::protocol::BackendInstruction;
    use crate::screen::FrameSignal;
    use crate::transport::memory;

    fn session(lines: u16, cols: u16) -> Session<FixedSurface> {
        let mut session = Session::new(&Config::default(), FixedSurface::grid(lines, cols));
        session.start().unwrap();
        session
    }

    #[test_timeout::tokio_timeout_test]
    async fn initial_resize_waits_for_connection() {
        let mut session = session(5, 40);
        assert_eq!(session.channel().pending_len(), 1);

        let (link, mut backend) = memory::pair();
        assert_eq!(session.connected(link.commands.clone()).unwrap(), 1);
        assert_eq!(
            backend.drain_commands(),
            vec![ClientCommand::Resize { cols: 40, lines: 5 }]
        );
    }

    #[test_timeout::tokio_timeout_test]
    async fn malformed_messages_leave_the_screen_alone() {
        let mut session = session(5, 40);
        session
            .handle_message(r#"{"op":"appendLine","content":"ok"}"#)
            .unwrap();
        let err = session.handle_message(r#"{"op":"appendLine"}"#).unwrap_err();
        assert!(matches!(err, ClientError::Wire(_)));
        assert_eq!(session.screen().line_store().len(), 1);
    }

    #[test_timeout::tokio_timeout_test]
    async fn wheel_scrolls_by_configured_rows() {
        let mut session = session(4, 40);
        let batch: Vec<BackendInstruction> = (0..20)
            .map(|idx| BackendInstruction::AppendLine {
                content: format!("l{idx}"),
            })
            .collect();
        session
            .handle_message(&serde_json::to_string(&batch).unwrap())
            .unwrap();
        assert_eq!(session.screen().viewport().scroll_top(), 16);

        session.handle_event(ClientEvent::Wheel(-1)).unwrap();
        assert_eq!(session.screen().viewport().scroll_top(), 11);
        assert!(!session.screen().viewport().is_following());
    }

    #[test_timeout::tokio_timeout_test]
    async fn focus_and_keys_are_forwarded() {
        let mut session = session(4, 40);
        session.handle_event(ClientEvent::Focus(true)).unwrap();
        session.handle_event(ClientEvent::Key(RawKey::new(38))).unwrap();
        assert_eq!(session.channel().pending_len(), 3);
        assert!(matches!(
            session.handle_event(ClientEvent::Quit),
            Err(ClientError::Shutdown)
        ));
    }

    #[test_timeout::tokio_timeout_test]
    async fn frame_signals_are_relayed_for_the_current_frame() {
        let mut session = session(4, 40);
        let batch = vec![
            BackendInstruction::AppendLine { content: String::new() },
            BackendInstruction::InsertFrame {
                line: 0,
                id: "f1".into(),
                source: "http://f1.localhost/".into(),
            },
        ];
        session
            .handle_message(&serde_json::to_string(&batch).unwrap())
            .unwrap();
        let before = session.channel().pending_len();

        session
            .handle_event(ClientEvent::FrameSignal {
                id: "f0".into(),
                signal: FrameSignal::Message("stale".into()),
            })
            .unwrap();
        assert_eq!(session.channel().pending_len(), before);

        session
            .handle_event(ClientEvent::FrameSignal {
                id: "f1".into(),
                signal: FrameSignal::Resize(5),
            })
            .unwrap();
        assert_eq!(session.channel().pending_len(), before + 1);
    }

    #[test_timeout::tokio_timeout_test]
    async fn headless_loop_applies_messages_until_backend_closes() {
        let mut session = session(3, 20);
        let (link, backend) = memory::pair();
        let connecting = tokio::spawn(async move { Ok::<_, TransportError>(link) });
        let (_events_tx, events) = mpsc::unbounded_channel();

        assert!(backend.send_batch(&[
            BackendInstruction::AppendLine { content: "one".into() },
            BackendInstruction::AppendLine { content: "two".into() },
        ]));
        assert!(backend.send_text("not json"));
        let memory::MemoryBackend {
            mut commands,
            instructions,
        } = backend;
        drop(instructions);

        let result = event_loop(&mut session, connecting, events, None).await;
        assert!(matches!(
            result,
            Err(ClientError::Transport(TransportError::Closed))
        ));
        assert_eq!(session.screen().visible_rows(), vec!["one", "two", ""]);
        assert!(session.channel().is_open());
        assert_eq!(
            commands.try_recv().ok(),
            Some(ClientCommand::Resize { cols: 20, lines: 3 })
        );
    }
}
