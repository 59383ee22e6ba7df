//! Embedded frames: inline sub-documents that occupy one logical line but
//! render as tall as their content.
//!
//! A frame lives inside the [`LineStore`] record it replaced, so it keeps
//! rendering after it stops being the write target. The [`FrameManager`] only
//! remembers which frame is current.

use std::fmt;

use tracing::{debug, trace, warn};

use super::line_store::LineStore;
use super::{Metrics, ScreenError};
use crate::protocol::FrameId;
use crate::surface::{CellExtent, MeasureError, wrap_text, wrapped_rows};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameState {
    Opening,
    Writable,
    Closed,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DocumentError {
    #[error("document is not open for writing")]
    NotOpen,
}

/// Something a frame's content sends back towards the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameSignal {
    Message(String),
    Resize(u32),
}

/// The backing document of a frame, provided by the render surface.
pub trait FrameDocument: fmt::Debug {
    /// Starts a fresh content stream, discarding anything written before.
    fn open(&mut self);

    fn write(&mut self, content: &str) -> Result<(), DocumentError>;

    fn close(&mut self) -> Result<(), DocumentError>;

    fn source(&self) -> &str;

    /// Rendered height of the current content.
    fn content_extent(&self, cols: u16, cell: CellExtent) -> Result<u32, MeasureError>;

    /// Content as cell rows, for hosts that render text.
    fn rows(&self, cols: u16) -> Vec<String>;

    /// Drains signals raised by the content since the last call. Documents
    /// whose content cannot talk back never have any.
    fn take_signals(&mut self) -> Vec<FrameSignal> {
        Vec::new()
    }
}

/// In-memory document that accumulates written content as text.
#[derive(Debug, Clone)]
pub struct BufferedDocument {
    id: String,
    source: String,
    buffer: String,
    open: bool,
}

impl BufferedDocument {
    pub fn new(id: &str, source: &str) -> Self {
        Self {
            id: id.to_string(),
            source: source.to_string(),
            buffer: String::new(),
            open: false,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn contents(&self) -> &str {
        &self.buffer
    }
}

impl FrameDocument for BufferedDocument {
    fn open(&mut self) {
        self.buffer.clear();
        self.open = true;
    }

    fn write(&mut self, content: &str) -> Result<(), DocumentError> {
        if !self.open {
            return Err(DocumentError::NotOpen);
        }
        self.buffer.push_str(content);
        Ok(())
    }

    fn close(&mut self) -> Result<(), DocumentError> {
        if !self.open {
            return Err(DocumentError::NotOpen);
        }
        self.open = false;
        Ok(())
    }

    fn source(&self) -> &str {
        &self.source
    }

    fn content_extent(&self, cols: u16, cell: CellExtent) -> Result<u32, MeasureError> {
        if self.buffer.is_empty() {
            return Ok(0);
        }
        let rows: u32 = self.buffer.lines().map(|line| wrapped_rows(line, cols)).sum();
        Ok(rows * cell.height)
    }

    fn rows(&self, cols: u16) -> Vec<String> {
        self.buffer
            .lines()
            .flat_map(|line| wrap_text(line, cols))
            .collect()
    }
}

#[derive(Debug)]
pub struct EmbeddedFrame {
    id: FrameId,
    state: FrameState,
    document: Box<dyn FrameDocument>,
    measured: u32,
    requested: Option<u32>,
}

impl EmbeddedFrame {
    /// Creates the frame and starts its document; the frame ends up writable.
    fn start(id: FrameId, document: Box<dyn FrameDocument>) -> Self {
        let mut frame = Self {
            id,
            state: FrameState::Opening,
            document,
            measured: 0,
            requested: None,
        };
        frame.document.open();
        frame.state = FrameState::Writable;
        trace!(
            target: "umbrella::frames",
            id = %frame.id,
            source = frame.document.source(),
            "frame writable"
        );
        frame
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn state(&self) -> FrameState {
        self.state
    }

    pub fn document(&self) -> &dyn FrameDocument {
        self.document.as_ref()
    }

    /// Rendered extent of the frame line; never less than one cell. The most
    /// recent height signal wins: a `frameResize` until the next write, the
    /// measured content after it.
    pub fn extent(&self, cell: CellExtent) -> u32 {
        self.requested.unwrap_or(self.measured).max(cell.height)
    }

    pub fn rows(&self, cols: u16) -> Vec<String> {
        self.document.rows(cols)
    }

    fn write(&mut self, content: &str) -> Result<(), ScreenError> {
        if self.state != FrameState::Writable {
            return Err(ScreenError::FrameNotWritable {
                id: self.id.clone(),
                state: self.state,
            });
        }
        if let Err(DocumentError::NotOpen) = self.document.write(content) {
            debug!(
                target: "umbrella::frames",
                id = %self.id,
                "document not open; reopening before write"
            );
            self.document.open();
            if let Err(err) = self.document.write(content) {
                warn!(
                    target: "umbrella::frames",
                    id = %self.id,
                    error = %err,
                    "frame write failed after reopening"
                );
                return Ok(());
            }
        }
        // new content supersedes an earlier frameResize; height follows the content again
        self.requested = None;
        Ok(())
    }

    fn close(&mut self) {
        if let Err(err) = self.document.close() {
            trace!(
                target: "umbrella::frames",
                id = %self.id,
                error = %err,
                "ignoring close error"
            );
        }
        self.state = FrameState::Closed;
    }

    /// Re-measures the document. Measurement failures keep the old height.
    pub(crate) fn remeasure(&mut self, cols: u16, cell: CellExtent) {
        match self.document.content_extent(cols, cell) {
            Ok(extent) => self.measured = extent,
            Err(err) => trace!(
                target: "umbrella::frames",
                id = %self.id,
                error = %err,
                "frame measurement skipped"
            ),
        }
    }

    fn request_height(&mut self, height: u32) {
        self.requested = Some(height);
    }
}

#[derive(Debug, Default)]
pub struct FrameManager {
    current: Option<FrameId>,
}

impl FrameManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Option<&str> {
        self.current.as_deref()
    }

    pub fn is_active(&self) -> bool {
        self.current.is_some()
    }

    /// Replaces the line at `line` with a new frame and makes it current. The
    /// previously current frame is closed and stays rendered where it is.
    pub fn insert_frame(
        &mut self,
        store: &mut LineStore,
        line: usize,
        id: FrameId,
        source: &str,
        metrics: &Metrics<'_>,
    ) -> Result<(), ScreenError> {
        store.check_line("insertFrame", line)?;

        if let Some(previous) = self.current.take() {
            let closed = store.update_frame(&previous, metrics, |frame| frame.close());
            if closed.is_none() {
                trace!(
                    target: "umbrella::frames",
                    id = %previous,
                    "previous frame no longer rendered"
                );
            }
        }

        let document = metrics.surface.create_document(&id, source);
        let mut frame = EmbeddedFrame::start(id.clone(), document);
        frame.remeasure(metrics.size.cols, metrics.cell);
        store.place_frame(line, frame, metrics)?;
        debug!(target: "umbrella::frames", id = %id, line, "frame inserted");
        self.current = Some(id);
        Ok(())
    }

    pub fn write(
        &mut self,
        store: &mut LineStore,
        content: &str,
        metrics: &Metrics<'_>,
    ) -> Result<(), ScreenError> {
        let id = self.current.as_ref().ok_or(ScreenError::NoCurrentFrame)?;
        store
            .update_frame(id, metrics, |frame| {
                frame.write(content)?;
                frame.remeasure(metrics.size.cols, metrics.cell);
                Ok(())
            })
            .ok_or(ScreenError::NoCurrentFrame)?
    }

    pub fn close_document(
        &mut self,
        store: &mut LineStore,
        metrics: &Metrics<'_>,
    ) -> Result<(), ScreenError> {
        let id = self.current.as_ref().ok_or(ScreenError::NoCurrentFrame)?;
        store
            .update_frame(id, metrics, |frame| {
                frame.remeasure(metrics.size.cols, metrics.cell);
                frame.close();
            })
            .ok_or(ScreenError::NoCurrentFrame)
    }

    /// Signals raised by the current frame's document. Frames that are no
    /// longer current are never polled.
    pub fn take_signals(
        &mut self,
        store: &mut LineStore,
        metrics: &Metrics<'_>,
    ) -> Vec<FrameSignal> {
        let Some(id) = self.current.as_ref() else {
            return Vec::new();
        };
        store
            .update_frame(id, metrics, |frame| frame.document.take_signals())
            .unwrap_or_default()
    }

    /// Stops targeting the current frame without touching the frame itself.
    pub fn leave(&mut self) {
        if let Some(id) = self.current.take() {
            debug!(target: "umbrella::frames", id = %id, "left frame");
        }
    }

    /// Applies a height reported for any frame, current or not. Returns false
    /// when the frame is no longer in the store.
    pub fn resize_frame(
        &mut self,
        store: &mut LineStore,
        id: &str,
        height: u32,
        metrics: &Metrics<'_>,
    ) -> bool {
        store
            .update_frame(id, metrics, |frame| frame.request_height(height))
            .is_some()
    }

    pub fn reset(&mut self) {
        self.current = None;
    }
}
