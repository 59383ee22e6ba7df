//! The screen controller: applies backend instructions to whichever buffer
//! the current mode renders from.
//!
//! Line mode renders from the [`LineStore`] (scrollback plus live screen),
//! application mode from a fixed-size [`ApplicationBuffer`]. The line store
//! is kept across mode switches so history survives a full-screen program.

pub mod app_buffer;
pub mod frames;
pub mod line_store;
pub mod viewport;

use once_cell::unsync::OnceCell;
use tracing::{debug, error, trace, warn};

use crate::channel::{ChannelError, CommandChannel};
use crate::protocol::{BackendInstruction, ClientCommand, FrameId};
use crate::surface::{CellExtent, MeasureError, RenderSurface, TerminalSize, wrap_text};

pub use app_buffer::ApplicationBuffer;
pub use frames::{EmbeddedFrame, FrameManager, FrameSignal, FrameState};
pub use line_store::{DEFAULT_HISTORY_BUDGET, LineKind, LineRecord, LineStore};
pub use viewport::{ScrollRequest, Viewport};

/// Everything a buffer needs to measure content: the surface plus the cell
/// extent and grid size from the last successful resize.
#[derive(Clone, Copy)]
pub struct Metrics<'a> {
    pub surface: &'a dyn RenderSurface,
    pub cell: CellExtent,
    pub size: TerminalSize,
}

impl Metrics<'_> {
    pub fn text_extent(&self, content: &str) -> u32 {
        self.surface.line_extent(content, self.size.cols, self.cell)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScreenError {
    #[error("{op}: line {line} is outside the live screen ({live} lines)")]
    LineOutOfRange {
        op: &'static str,
        line: usize,
        live: usize,
    },
    #[error("{op}: screen has no lines")]
    EmptyStore { op: &'static str },
    #[error("no current frame")]
    NoCurrentFrame,
    #[error("frame {id} is not writable ({state:?})")]
    FrameNotWritable { id: FrameId, state: FrameState },
    #[error("{op} is not supported in application mode")]
    UnsupportedInMode { op: &'static str },
}

impl ScreenError {
    /// True when the backend asked for something that cannot happen on a
    /// screen in sync with it.
    pub fn is_precondition(&self) -> bool {
        !matches!(self, ScreenError::UnsupportedInMode { .. })
    }
}

/// Line operations shared by both rendering modes. Indices are relative to
/// the first line of the live screen.
pub trait ScreenBuffer {
    fn set_line(
        &mut self,
        line: usize,
        content: String,
        metrics: &Metrics<'_>,
    ) -> Result<(), ScreenError>;

    fn insert_line(
        &mut self,
        line: usize,
        content: String,
        metrics: &Metrics<'_>,
    ) -> Result<(), ScreenError>;

    fn append_line(&mut self, content: String, metrics: &Metrics<'_>);

    fn remove_line(&mut self, line: usize, metrics: &Metrics<'_>) -> Result<(), ScreenError>;

    fn remove_last_line(&mut self, metrics: &Metrics<'_>) -> Result<(), ScreenError>;

    /// Text rows in buffer order; frames are skipped.
    fn rows(&self) -> Vec<String>;
}

#[derive(Debug)]
enum ScreenMode {
    Line,
    Application(ApplicationBuffer),
}

#[derive(Debug)]
pub struct ScreenController {
    store: LineStore,
    mode: ScreenMode,
    size: TerminalSize,
    cell: CellExtent,
    scrollbar: OnceCell<u32>,
    frames: FrameManager,
    viewport: Viewport,
}

impl Default for ScreenController {
    fn default() -> Self {
        Self::new(TerminalSize::default(), DEFAULT_HISTORY_BUDGET)
    }
}

impl ScreenController {
    pub fn new(size: TerminalSize, history_budget: u32) -> Self {
        let cell = CellExtent::UNIT;
        Self {
            store: LineStore::new(history_budget),
            mode: ScreenMode::Line,
            size,
            cell,
            scrollbar: OnceCell::new(),
            frames: FrameManager::new(),
            viewport: Viewport::new(u32::from(size.lines) * cell.height),
        }
    }

    pub fn size(&self) -> TerminalSize {
        self.size
    }

    pub fn cell(&self) -> CellExtent {
        self.cell
    }

    pub fn line_store(&self) -> &LineStore {
        &self.store
    }

    pub fn frames(&self) -> &FrameManager {
        &self.frames
    }

    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    pub fn is_application_mode(&self) -> bool {
        matches!(self.mode, ScreenMode::Application(_))
    }

    pub fn application_buffer(&self) -> Option<&ApplicationBuffer> {
        match &self.mode {
            ScreenMode::Application(buffer) => Some(buffer),
            ScreenMode::Line => None,
        }
    }

    pub fn frame_active(&self) -> bool {
        self.frames.is_active()
    }

    fn metrics<'a>(&self, surface: &'a dyn RenderSurface) -> Metrics<'a> {
        Metrics {
            surface,
            cell: self.cell,
            size: self.size,
        }
    }

    fn document_extent(&self) -> u32 {
        self.store.total_extent() + self.store.trailing_space()
    }

    /// Applies one backend instruction. Precondition violations are logged
    /// and skipped (debug builds assert); only a closed transport is returned.
    pub fn apply(
        &mut self,
        instruction: BackendInstruction,
        surface: &dyn RenderSurface,
        channel: &mut CommandChannel,
    ) -> Result<(), ChannelError> {
        let op = instruction.op();
        trace!(target: "umbrella::screen", op, "applying instruction");
        match self.dispatch(instruction, surface, channel) {
            Ok(()) => Ok(()),
            Err(Dispatch::Channel(err)) => Err(err),
            Err(Dispatch::Screen(err)) if err.is_precondition() => {
                error!(
                    target: "umbrella::screen",
                    op,
                    error = %err,
                    "backend instruction out of sync with screen"
                );
                debug_assert!(false, "{op}: {err}");
                Ok(())
            }
            Err(Dispatch::Screen(err)) => {
                warn!(target: "umbrella::screen", op, error = %err, "instruction ignored");
                Ok(())
            }
        }
    }

    fn dispatch(
        &mut self,
        instruction: BackendInstruction,
        surface: &dyn RenderSurface,
        channel: &mut CommandChannel,
    ) -> Result<(), Dispatch> {
        let metrics = self.metrics(surface);
        match instruction {
            BackendInstruction::SetLine { line, content } => {
                self.active_buffer().set_line(line, content, &metrics)?
            }
            BackendInstruction::InsertLine { line, content } => {
                self.active_buffer().insert_line(line, content, &metrics)?
            }
            BackendInstruction::AppendLine { content } => {
                self.active_buffer().append_line(content, &metrics)
            }
            BackendInstruction::RemoveLine { line } => {
                self.active_buffer().remove_line(line, &metrics)?
            }
            BackendInstruction::RemoveLastLine => self.active_buffer().remove_last_line(&metrics)?,
            BackendInstruction::SetScreenZero { line } => {
                if self.is_application_mode() {
                    trace!(target: "umbrella::screen", line, "screen zero ignored in application mode");
                } else {
                    self.store.set_screen_zero(line, &metrics);
                }
            }
            // the retained line store still owns the outstanding eviction
            BackendInstruction::RemoveHistoryLines { count } => {
                self.store.remove_history_lines(count, &metrics);
            }
            BackendInstruction::CheckHistorySize => self.check_history_size(channel)?,
            BackendInstruction::Reset => self.reset(),
            BackendInstruction::InsertFrame { line, id, source } => {
                if self.is_application_mode() {
                    return Err(ScreenError::UnsupportedInMode { op: "insertFrame" }.into());
                }
                self.frames
                    .insert_frame(&mut self.store, line, id, &source, &metrics)?
            }
            BackendInstruction::FrameWrite { content } => {
                self.frames.write(&mut self.store, &content, &metrics)?;
                self.forward_document_signals(&metrics, channel)?;
            }
            BackendInstruction::FrameCloseDocument => {
                self.frames.close_document(&mut self.store, &metrics)?;
                self.forward_document_signals(&metrics, channel)?;
            }
            BackendInstruction::FrameLeave => self.frames.leave(),
            BackendInstruction::FrameResize { id, height } => {
                if !self
                    .frames
                    .resize_frame(&mut self.store, &id, height, &metrics)
                {
                    trace!(target: "umbrella::frames", id = %id, "resize for a frame no longer rendered");
                }
            }
            BackendInstruction::SetApplicationMode { enabled } => {
                self.set_application_mode(enabled, surface, channel)?
            }
            BackendInstruction::ScrollToBottom => {
                let document = self.document_extent();
                self.viewport.scroll_to_bottom(document);
            }
        }
        Ok(())
    }

    fn active_buffer(&mut self) -> &mut dyn ScreenBuffer {
        match &mut self.mode {
            ScreenMode::Line => &mut self.store,
            ScreenMode::Application(buffer) => buffer,
        }
    }

    fn reset(&mut self) {
        match &mut self.mode {
            ScreenMode::Line => {
                self.store.reset();
                self.frames.reset();
            }
            ScreenMode::Application(buffer) => buffer.clear(),
        }
        debug!(
            target: "umbrella::screen",
            application = self.is_application_mode(),
            "screen reset"
        );
    }

    /// Asks the backend to evict history once the scrollback is over budget.
    pub fn check_history_size(&mut self, channel: &mut CommandChannel) -> Result<(), ChannelError> {
        if self.is_application_mode() {
            return Ok(());
        }
        if let Some(count) = self.store.check_history_size() {
            channel.send(ClientCommand::RemoveHistory { count })?;
        }
        Ok(())
    }

    /// Relays a message or resize request raised by frame content. Only the
    /// current frame may talk to the backend; anything else is dropped and
    /// `false` returned.
    pub fn frame_signal(
        &mut self,
        id: &str,
        signal: FrameSignal,
        channel: &mut CommandChannel,
    ) -> Result<bool, ChannelError> {
        if self.frames.current() != Some(id) {
            debug!(target: "umbrella::frames", id, ?signal, "dropping signal from a frame that is not current");
            return Ok(false);
        }
        let id = id.to_string();
        let command = match signal {
            FrameSignal::Message(data) => ClientCommand::FrameMessage { id, data },
            FrameSignal::Resize(height) => ClientCommand::FrameResizeRequest { id, height },
        };
        channel.send(command)?;
        Ok(true)
    }

    fn forward_document_signals(
        &mut self,
        metrics: &Metrics<'_>,
        channel: &mut CommandChannel,
    ) -> Result<(), ChannelError> {
        let Some(id) = self.frames.current().map(str::to_string) else {
            return Ok(());
        };
        for signal in self.frames.take_signals(&mut self.store, metrics) {
            self.frame_signal(&id, signal, channel)?;
        }
        Ok(())
    }

    /// Runs after every inbound batch: eviction check, then autoscroll.
    pub fn finish_batch(&mut self, channel: &mut CommandChannel) -> Result<(), ChannelError> {
        self.check_history_size(channel)?;
        let document = self.document_extent();
        self.viewport.autoscroll(document);
        Ok(())
    }

    /// Enters or leaves application mode. Entering always allocates a fresh
    /// buffer sized to the current screen, so repeating it is harmless.
    pub fn set_application_mode(
        &mut self,
        enabled: bool,
        surface: &dyn RenderSurface,
        channel: &mut CommandChannel,
    ) -> Result<(), ChannelError> {
        self.mode = if enabled {
            ScreenMode::Application(ApplicationBuffer::new(self.size.lines))
        } else {
            ScreenMode::Line
        };
        debug!(target: "umbrella::screen", enabled, "application mode switched");
        self.resize(surface, channel).map(|_| ())
    }

    /// Re-measures the surface, adapts both buffers and reports the grid
    /// size to the backend. A failed measurement leaves everything as it was
    /// and returns `Ok(None)`.
    pub fn resize(
        &mut self,
        surface: &dyn RenderSurface,
        channel: &mut CommandChannel,
    ) -> Result<Option<TerminalSize>, ChannelError> {
        let (cell, size) = match self.measure(surface) {
            Ok(measured) => measured,
            Err(err) => {
                debug!(target: "umbrella::screen", error = %err, "resize skipped");
                return Ok(None);
            }
        };
        self.cell = cell;
        self.size = size;

        let metrics = self.metrics(surface);
        self.store.remeasure(&metrics);
        if let ScreenMode::Application(buffer) = &mut self.mode {
            buffer.resize(size.lines);
        }
        let document = self.document_extent();
        self.viewport
            .set_height(u32::from(size.lines) * cell.height, document);

        debug!(
            target: "umbrella::screen",
            lines = size.lines,
            cols = size.cols,
            "terminal resized"
        );
        channel.send(ClientCommand::Resize {
            cols: size.cols,
            lines: size.lines,
        })?;
        Ok(Some(size))
    }

    fn measure(&self, surface: &dyn RenderSurface) -> Result<(CellExtent, TerminalSize), MeasureError> {
        let cell = surface.cell_extent()?;
        let area = surface.available_area()?;
        let scrollbar = *self
            .scrollbar
            .get_or_try_init(|| surface.scrollbar_extent())?;
        let size = TerminalSize::from_measurements(cell, area, scrollbar)?;
        Ok((cell, size))
    }

    /// Scrolls the line-mode viewport; application mode has nothing to scroll.
    pub fn scroll(&mut self, request: ScrollRequest) {
        if self.is_application_mode() {
            return;
        }
        let document = self.document_extent();
        self.viewport.apply(request, document, self.cell.height);
    }

    /// The rows currently on screen, top to bottom, one per terminal line.
    pub fn visible_rows(&self) -> Vec<String> {
        let lines = usize::from(self.size.lines);
        if let ScreenMode::Application(buffer) = &self.mode {
            return buffer.rows();
        }
        let cell_height = self.cell.height.max(1);
        let cols = self.size.cols;
        let mut rows = Vec::new();
        for record in self.store.records() {
            let height = (record.extent() / cell_height).max(1) as usize;
            let mut record_rows = match record.kind() {
                LineKind::Text(content) => wrap_text(content, cols),
                LineKind::Frame(frame) => frame.rows(cols),
            };
            record_rows.resize(height, String::new());
            rows.extend(record_rows);
        }
        let trailing = (self.store.trailing_space() / cell_height) as usize;
        rows.extend(std::iter::repeat_with(String::new).take(trailing));

        let skip = (self.viewport.scroll_top() / cell_height) as usize;
        let mut visible: Vec<String> = rows.into_iter().skip(skip).take(lines).collect();
        visible.resize(lines, String::new());
        visible
    }
}

enum Dispatch {
    Screen(ScreenError),
    Channel(ChannelError),
}

impl From<ScreenError> for Dispatch {
    fn from(err: ScreenError) -> Self {
        Dispatch::Screen(err)
    }
}

impl From<ChannelError> for Dispatch {
    fn from(err: ChannelError) -> Self {
        Dispatch::Channel(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::screen::frames::{BufferedDocument, DocumentError, FrameDocument};
    use crate::surface::{FixedSurface, SurfaceArea};
    use tokio::sync::mpsc;

    fn open_channel() -> (CommandChannel, mpsc::UnboundedReceiver<ClientCommand>) {
        let mut channel = CommandChannel::connecting();
        let (tx, rx) = mpsc::unbounded_channel();
        channel.open(tx).unwrap();
        (channel, rx)
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<ClientCommand>) -> Vec<ClientCommand> {
        let mut out = Vec::new();
        while let Ok(command) = rx.try_recv() {
            out.push(command);
        }
        out
    }

    fn started(surface: &FixedSurface, channel: &mut CommandChannel) -> ScreenController {
        let mut screen = ScreenController::default();
        screen.resize(surface, channel).unwrap();
        screen
    }

    #[test_timeout::tokio_timeout_test]
    async fn resize_reports_measured_grid() {
        let surface = FixedSurface::new(
            CellExtent {
                width: 8,
                height: 16,
            },
            SurfaceArea {
                width: 330,
                height: 160,
            },
        )
        .with_scrollbar(10);
        let (mut channel, mut rx) = open_channel();
        let mut screen = ScreenController::default();
        let size = screen.resize(&surface, &mut channel).unwrap();
        assert_eq!(size, Some(TerminalSize { lines: 10, cols: 40 }));
        assert_eq!(drain(&mut rx), vec![ClientCommand::Resize { cols: 40, lines: 10 }]);

        screen.resize(&surface, &mut channel).unwrap();
        assert_eq!(surface.scrollbar_queries(), 1);
    }

    #[test_timeout::tokio_timeout_test]
    async fn detached_surface_skips_resize_without_mutation() {
        let surface = FixedSurface::grid(5, 20);
        let (mut channel, mut rx) = open_channel();
        let mut screen = started(&surface, &mut channel);
        drain(&mut rx);

        surface.set_detached(true);
        assert_eq!(screen.resize(&surface, &mut channel).unwrap(), None);
        assert_eq!(screen.size(), TerminalSize { lines: 5, cols: 20 });
        assert!(drain(&mut rx).is_empty());
    }

    #[test_timeout::tokio_timeout_test]
    async fn application_mode_is_idempotent_and_keeps_history() {
        let surface = FixedSurface::grid(3, 20);
        let (mut channel, mut rx) = open_channel();
        let mut screen = started(&surface, &mut channel);
        for text in ["a", "b", "c", "d"] {
            screen
                .apply(BackendInstruction::AppendLine { content: text.into() }, &surface, &mut channel)
                .unwrap();
        }

        screen.set_application_mode(true, &surface, &mut channel).unwrap();
        screen
            .apply(BackendInstruction::SetLine { line: 0, content: "x".into() }, &surface, &mut channel)
            .unwrap();
        screen.set_application_mode(true, &surface, &mut channel).unwrap();
        assert_eq!(screen.application_buffer().map(ApplicationBuffer::len), Some(3));
        assert_eq!(screen.visible_rows(), vec!["", "", ""]);

        screen.set_application_mode(false, &surface, &mut channel).unwrap();
        assert!(screen.application_buffer().is_none());
        assert_eq!(screen.visible_rows(), vec!["b", "c", "d"]);
        assert_eq!(screen.line_store().len(), 4);

        let resizes = drain(&mut rx)
            .into_iter()
            .filter(|cmd| matches!(cmd, ClientCommand::Resize { .. }))
            .count();
        assert_eq!(resizes, 4);
    }

    #[test_timeout::tokio_timeout_test]
    async fn batches_request_eviction_once_until_acknowledged() {
        let surface = FixedSurface::grid(2, 20);
        let (mut channel, mut rx) = open_channel();
        let mut screen = ScreenController::new(TerminalSize { lines: 2, cols: 20 }, 4);
        screen.resize(&surface, &mut channel).unwrap();
        drain(&mut rx);

        for idx in 0..10 {
            screen
                .apply(BackendInstruction::AppendLine { content: format!("l{idx}") }, &surface, &mut channel)
                .unwrap();
        }
        screen.finish_batch(&mut channel).unwrap();
        screen.finish_batch(&mut channel).unwrap();
        assert_eq!(drain(&mut rx), vec![ClientCommand::RemoveHistory { count: 5 }]);

        screen
            .apply(BackendInstruction::RemoveHistoryLines { count: 5 }, &surface, &mut channel)
            .unwrap();
        assert!(!screen.line_store().is_eviction_pending());
        assert_eq!(screen.line_store().screen_zero(), 3);
        screen.finish_batch(&mut channel).unwrap();
        assert!(drain(&mut rx).is_empty());
    }

    #[test_timeout::tokio_timeout_test]
    async fn following_viewport_shows_the_tail() {
        let surface = FixedSurface::grid(3, 20);
        let (mut channel, _rx) = open_channel();
        let mut screen = started(&surface, &mut channel);
        for idx in 0..6 {
            screen
                .apply(BackendInstruction::AppendLine { content: format!("l{idx}") }, &surface, &mut channel)
                .unwrap();
        }
        screen.finish_batch(&mut channel).unwrap();
        assert_eq!(screen.visible_rows(), vec!["l3", "l4", "l5"]);

        screen.scroll(ScrollRequest::PageUp);
        assert_eq!(screen.visible_rows(), vec!["l0", "l1", "l2"]);
        screen
            .apply(BackendInstruction::ScrollToBottom, &surface, &mut channel)
            .unwrap();
        assert_eq!(screen.visible_rows(), vec!["l3", "l4", "l5"]);
    }

    #[test_timeout::tokio_timeout_test]
    async fn short_screen_starts_at_the_top() {
        let surface = FixedSurface::grid(4, 20);
        let (mut channel, _rx) = open_channel();
        let mut screen = started(&surface, &mut channel);
        screen
            .apply(BackendInstruction::AppendLine { content: "$ ".into() }, &surface, &mut channel)
            .unwrap();
        screen.finish_batch(&mut channel).unwrap();
        assert_eq!(screen.visible_rows(), vec!["$ ", "", "", ""]);
    }

    #[test_timeout::tokio_timeout_test]
    async fn frames_are_unsupported_in_application_mode() {
        let surface = FixedSurface::grid(3, 20);
        let (mut channel, _rx) = open_channel();
        let mut screen = started(&surface, &mut channel);
        screen.set_application_mode(true, &surface, &mut channel).unwrap();
        screen
            .apply(
                BackendInstruction::InsertFrame {
                    line: 0,
                    id: "f".into(),
                    source: "http://f.localhost/".into(),
                },
                &surface,
                &mut channel,
            )
            .unwrap();
        assert!(!screen.frame_active());
    }

    /// Documents that talk back: `size=N` requests a height, anything else
    /// is posted as a message.
    #[derive(Debug)]
    struct ChattyDocument {
        inner: BufferedDocument,
        signals: Vec<FrameSignal>,
    }

    impl FrameDocument for ChattyDocument {
        fn open(&mut self) {
            self.inner.open();
        }

        fn write(&mut self, content: &str) -> Result<(), DocumentError> {
            self.inner.write(content)?;
            let signal = match content.strip_prefix("size=").and_then(|n| n.parse().ok()) {
                Some(height) => FrameSignal::Resize(height),
                None => FrameSignal::Message(content.to_string()),
            };
            self.signals.push(signal);
            Ok(())
        }

        fn close(&mut self) -> Result<(), DocumentError> {
            self.inner.close()
        }

        fn source(&self) -> &str {
            self.inner.source()
        }

        fn content_extent(&self, cols: u16, cell: CellExtent) -> Result<u32, MeasureError> {
            self.inner.content_extent(cols, cell)
        }

        fn rows(&self, cols: u16) -> Vec<String> {
            self.inner.rows(cols)
        }

        fn take_signals(&mut self) -> Vec<FrameSignal> {
            std::mem::take(&mut self.signals)
        }
    }

    struct ChattySurface(FixedSurface);

    impl RenderSurface for ChattySurface {
        fn cell_extent(&self) -> Result<CellExtent, MeasureError> {
            self.0.cell_extent()
        }

        fn available_area(&self) -> Result<SurfaceArea, MeasureError> {
            self.0.available_area()
        }

        fn scrollbar_extent(&self) -> Result<u32, MeasureError> {
            self.0.scrollbar_extent()
        }

        fn create_document(&self, id: &str, source: &str) -> Box<dyn FrameDocument> {
            Box::new(ChattyDocument {
                inner: BufferedDocument::new(id, source),
                signals: Vec::new(),
            })
        }
    }

    fn insert_frame(
        screen: &mut ScreenController,
        id: &str,
        surface: &dyn RenderSurface,
        channel: &mut CommandChannel,
    ) {
        screen
            .apply(BackendInstruction::AppendLine { content: String::new() }, surface, channel)
            .unwrap();
        let line = screen.line_store().len() - 1;
        screen
            .apply(
                BackendInstruction::InsertFrame {
                    line,
                    id: id.into(),
                    source: format!("http://{id}.localhost/"),
                },
                surface,
                channel,
            )
            .unwrap();
    }

    #[test_timeout::tokio_timeout_test]
    async fn frame_content_signals_reach_the_backend() {
        let surface = ChattySurface(FixedSurface::grid(10, 40));
        let (mut channel, mut rx) = open_channel();
        let mut screen = ScreenController::default();
        screen.resize(&surface, &mut channel).unwrap();
        insert_frame(&mut screen, "f1", &surface, &mut channel);
        drain(&mut rx);

        for content in ["ready", "size=7"] {
            screen
                .apply(BackendInstruction::FrameWrite { content: content.into() }, &surface, &mut channel)
                .unwrap();
        }
        assert_eq!(
            drain(&mut rx),
            vec![
                ClientCommand::FrameMessage { id: "f1".into(), data: "ready".into() },
                ClientCommand::FrameResizeRequest { id: "f1".into(), height: 7 },
            ]
        );
    }

    #[test_timeout::tokio_timeout_test]
    async fn only_the_current_frame_may_signal() {
        let surface = FixedSurface::grid(10, 40);
        let (mut channel, mut rx) = open_channel();
        let mut screen = started(&surface, &mut channel);
        insert_frame(&mut screen, "f1", &surface, &mut channel);
        insert_frame(&mut screen, "f2", &surface, &mut channel);
        drain(&mut rx);

        let stale = FrameSignal::Message("late".into());
        assert!(!screen.frame_signal("f1", stale, &mut channel).unwrap());
        assert!(drain(&mut rx).is_empty());

        let live = FrameSignal::Message("hello".into());
        assert!(screen.frame_signal("f2", live, &mut channel).unwrap());
        assert_eq!(
            drain(&mut rx),
            vec![ClientCommand::FrameMessage { id: "f2".into(), data: "hello".into() }]
        );

        screen.apply(BackendInstruction::FrameLeave, &surface, &mut channel).unwrap();
        assert!(!screen.frame_signal("f2", FrameSignal::Resize(3), &mut channel).unwrap());
        assert!(drain(&mut rx).is_empty());
    }

    #[test_timeout::tokio_timeout_test]
    #[cfg_attr(debug_assertions, should_panic(expected = "setLine"))]
    async fn out_of_sync_instruction_asserts_in_debug() {
        let surface = FixedSurface::grid(3, 20);
        let (mut channel, _rx) = open_channel();
        let mut screen = started(&surface, &mut channel);
        screen
            .apply(BackendInstruction::SetLine { line: 2, content: "x".into() }, &surface, &mut channel)
            .unwrap();
        assert_eq!(screen.line_store().len(), 0);
    }
}
