//! Scrollback plus live screen for line mode.
//!
//! Records are kept in one contiguous vector. `screen_zero` splits it: records
//! below it are history, records from it on are the live screen. Every index
//! the backend sends is relative to `screen_zero`, so the backend never needs
//! to know how much history the client still holds.

use tracing::{debug, trace};

use super::frames::EmbeddedFrame;
use super::{Metrics, ScreenBuffer, ScreenError};

/// Scrollback budget in surface extent units.
pub const DEFAULT_HISTORY_BUDGET: u32 = 10_000;

#[derive(Debug)]
pub enum LineKind {
    Text(String),
    Frame(EmbeddedFrame),
}

#[derive(Debug)]
pub struct LineRecord {
    kind: LineKind,
    extent: u32,
}

impl LineRecord {
    fn from_text(content: String, metrics: &Metrics<'_>) -> Self {
        let extent = metrics.text_extent(&content);
        Self {
            kind: LineKind::Text(content),
            extent,
        }
    }

    fn frame(frame: EmbeddedFrame, metrics: &Metrics<'_>) -> Self {
        let extent = frame.extent(metrics.cell);
        Self {
            kind: LineKind::Frame(frame),
            extent,
        }
    }

    pub fn kind(&self) -> &LineKind {
        &self.kind
    }

    pub fn extent(&self) -> u32 {
        self.extent
    }

    pub fn text(&self) -> Option<&str> {
        match &self.kind {
            LineKind::Text(content) => Some(content),
            LineKind::Frame(_) => None,
        }
    }

    pub fn as_frame(&self) -> Option<&EmbeddedFrame> {
        match &self.kind {
            LineKind::Frame(frame) => Some(frame),
            LineKind::Text(_) => None,
        }
    }

    fn remeasure(&mut self, metrics: &Metrics<'_>) {
        self.extent = match &mut self.kind {
            LineKind::Text(content) => metrics.text_extent(content),
            LineKind::Frame(frame) => {
                frame.remeasure(metrics.size.cols, metrics.cell);
                frame.extent(metrics.cell)
            }
        };
    }
}

#[derive(Debug)]
pub struct LineStore {
    records: Vec<LineRecord>,
    screen_zero: usize,
    eviction_pending: bool,
    history_budget: u32,
    trailing_space: u32,
}

impl Default for LineStore {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_BUDGET)
    }
}

impl LineStore {
    pub fn new(history_budget: u32) -> Self {
        Self {
            records: Vec::new(),
            screen_zero: 0,
            eviction_pending: false,
            history_budget,
            trailing_space: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn screen_zero(&self) -> usize {
        self.screen_zero
    }

    pub fn live_len(&self) -> usize {
        self.records.len() - self.screen_zero
    }

    pub fn history_budget(&self) -> u32 {
        self.history_budget
    }

    pub fn is_eviction_pending(&self) -> bool {
        self.eviction_pending
    }

    pub fn records(&self) -> &[LineRecord] {
        &self.records
    }

    /// Blank extent rendered below the last record so the live screen starts
    /// at the top of the viewport when it holds fewer lines than the terminal.
    pub fn trailing_space(&self) -> u32 {
        self.trailing_space
    }

    /// Extent of everything above `index` (absolute).
    pub fn offset_of(&self, index: usize) -> u32 {
        self.records[..index.min(self.records.len())]
            .iter()
            .map(LineRecord::extent)
            .sum()
    }

    pub fn history_extent(&self) -> u32 {
        self.offset_of(self.screen_zero)
    }

    pub fn total_extent(&self) -> u32 {
        self.offset_of(self.records.len())
    }

    /// Live-relative line to absolute index, if the line exists.
    pub fn check_line(&self, op: &'static str, line: usize) -> Result<usize, ScreenError> {
        let index = self.screen_zero + line;
        if index < self.records.len() {
            Ok(index)
        } else {
            Err(ScreenError::LineOutOfRange {
                op,
                line,
                live: self.live_len(),
            })
        }
    }

    pub fn set_screen_zero(&mut self, screen_zero: usize, metrics: &Metrics<'_>) {
        self.screen_zero = screen_zero.min(self.records.len());
        self.bound_live(metrics);
        self.adjust_trailing_space(metrics);
        trace!(
            target: "umbrella::screen",
            requested = screen_zero,
            screen_zero = self.screen_zero,
            records = self.records.len(),
            "screen zero moved"
        );
    }

    /// Looks for a history prefix whose removal brings the scrollback under
    /// budget. Returns the prefix length to request from the backend; at most
    /// one request is outstanding at a time.
    pub fn check_history_size(&mut self) -> Option<usize> {
        if self.eviction_pending {
            trace!(
                target: "umbrella::screen",
                "eviction already requested; waiting for backend"
            );
            return None;
        }
        let history = self.history_extent();
        if history <= self.history_budget {
            return None;
        }
        let mut removed = 0u32;
        for count in 0..=self.screen_zero {
            if history - removed < self.history_budget {
                self.eviction_pending = true;
                debug!(
                    target: "umbrella::screen",
                    count,
                    history,
                    budget = self.history_budget,
                    "requesting history eviction"
                );
                return Some(count);
            }
            if count < self.screen_zero {
                removed += self.records[count].extent;
            }
        }
        None
    }

    /// Physically drops the first `count` history records. This is the
    /// backend's acknowledgement of an eviction request.
    pub fn remove_history_lines(&mut self, count: usize, metrics: &Metrics<'_>) -> usize {
        let count = count.min(self.screen_zero);
        self.records.drain(..count);
        self.screen_zero -= count;
        self.eviction_pending = false;
        self.adjust_trailing_space(metrics);
        debug!(
            target: "umbrella::screen",
            removed = count,
            remaining = self.records.len(),
            "history evicted"
        );
        count
    }

    pub fn reset(&mut self) {
        self.records.clear();
        self.screen_zero = 0;
        self.eviction_pending = false;
        self.trailing_space = 0;
    }

    /// Re-measures every record, e.g. after the cell size or width changed.
    pub fn remeasure(&mut self, metrics: &Metrics<'_>) {
        for record in &mut self.records {
            record.remeasure(metrics);
        }
        self.bound_live(metrics);
        self.adjust_trailing_space(metrics);
    }

    pub(crate) fn place_frame(
        &mut self,
        line: usize,
        frame: EmbeddedFrame,
        metrics: &Metrics<'_>,
    ) -> Result<(), ScreenError> {
        let index = self.check_line("insertFrame", line)?;
        self.records[index] = LineRecord::frame(frame, metrics);
        self.adjust_trailing_space(metrics);
        Ok(())
    }

    /// Runs `apply` on the frame with `id` and re-measures its record.
    /// Searches from the bottom since the newest frames sit there.
    pub(crate) fn update_frame<R>(
        &mut self,
        id: &str,
        metrics: &Metrics<'_>,
        apply: impl FnOnce(&mut EmbeddedFrame) -> R,
    ) -> Option<R> {
        let record = self.records.iter_mut().rev().find(
            |record| matches!(&record.kind, LineKind::Frame(frame) if frame.id() == id),
        )?;
        let LineKind::Frame(frame) = &mut record.kind else {
            return None;
        };
        let result = apply(frame);
        record.extent = frame.extent(metrics.cell);
        self.adjust_trailing_space(metrics);
        Some(result)
    }

    pub fn frame(&self, id: &str) -> Option<&EmbeddedFrame> {
        self.records
            .iter()
            .rev()
            .filter_map(LineRecord::as_frame)
            .find(|frame| frame.id() == id)
    }

    /// Keeps the live region within the terminal height by moving the oldest
    /// live records into history.
    fn bound_live(&mut self, metrics: &Metrics<'_>) {
        let lines = usize::from(metrics.size.lines);
        if self.live_len() > lines {
            self.screen_zero = self.records.len() - lines;
        }
    }

    fn adjust_trailing_space(&mut self, metrics: &Metrics<'_>) {
        let lines = u32::from(metrics.size.lines);
        self.trailing_space = if self.live_len() < lines as usize {
            let screen_extent = lines * metrics.cell.height;
            let live_extent = self.total_extent() - self.history_extent();
            screen_extent.saturating_sub(live_extent)
        } else {
            0
        };
    }

    fn grow(&mut self, index: usize, content: String, metrics: &Metrics<'_>) {
        let record = LineRecord::from_text(content, metrics);
        if index >= self.records.len() {
            self.records.push(record);
        } else {
            self.records.insert(index, record);
        }
        self.bound_live(metrics);
        self.adjust_trailing_space(metrics);
    }
}

impl ScreenBuffer for LineStore {
    fn set_line(
        &mut self,
        line: usize,
        content: String,
        metrics: &Metrics<'_>,
    ) -> Result<(), ScreenError> {
        let index = self.check_line("setLine", line)?;
        self.records[index] = LineRecord::from_text(content, metrics);
        self.adjust_trailing_space(metrics);
        Ok(())
    }

    fn insert_line(
        &mut self,
        line: usize,
        content: String,
        metrics: &Metrics<'_>,
    ) -> Result<(), ScreenError> {
        let last_row = usize::from(metrics.size.lines).saturating_sub(1);
        let index = if line >= last_row {
            self.records.len()
        } else {
            self.screen_zero + line
        };
        self.grow(index, content, metrics);
        Ok(())
    }

    fn append_line(&mut self, content: String, metrics: &Metrics<'_>) {
        let end = self.records.len();
        self.grow(end, content, metrics);
    }

    fn remove_line(&mut self, line: usize, metrics: &Metrics<'_>) -> Result<(), ScreenError> {
        let index = self.check_line("removeLine", line)?;
        self.records.remove(index);
        self.adjust_trailing_space(metrics);
        Ok(())
    }

    fn remove_last_line(&mut self, metrics: &Metrics<'_>) -> Result<(), ScreenError> {
        if self.records.pop().is_none() {
            return Err(ScreenError::EmptyStore {
                op: "removeLastLine",
            });
        }
        self.screen_zero = self.screen_zero.min(self.records.len());
        self.adjust_trailing_space(metrics);
        Ok(())
    }

    fn rows(&self) -> Vec<String> {
        self.records
            .iter()
            .filter_map(|record| record.text().map(str::to_string))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surface::{CellExtent, FixedSurface, TerminalSize};

    fn metrics(surface: &FixedSurface, lines: u16) -> Metrics<'_> {
        Metrics {
            surface,
            cell: CellExtent::UNIT,
            size: TerminalSize { lines, cols: 80 },
        }
    }

    fn live_texts(store: &LineStore) -> Vec<&str> {
        store.records()[store.screen_zero()..]
            .iter()
            .filter_map(LineRecord::text)
            .collect()
    }

    #[test_timeout::timeout]
    fn indices_are_relative_to_screen_zero() {
        let surface = FixedSurface::grid(3, 80);
        let m = metrics(&surface, 3);
        let mut store = LineStore::default();
        for text in ["h0", "h1", "a", "b", "c"] {
            store.append_line(text.into(), &m);
        }
        assert_eq!(store.screen_zero(), 2);
        store.set_line(1, "B".into(), &m).unwrap();
        assert_eq!(live_texts(&store), vec!["a", "B", "c"]);
        store.remove_line(0, &m).unwrap();
        assert_eq!(live_texts(&store), vec!["B", "c"]);
        assert_eq!(store.records()[0].text(), Some("h0"));
    }

    #[test_timeout::timeout]
    fn insert_at_last_row_appends() {
        let surface = FixedSurface::grid(4, 80);
        let m = metrics(&surface, 4);
        let mut store = LineStore::default();
        store.append_line("a".into(), &m);
        store.insert_line(3, "tail".into(), &m).unwrap();
        store.insert_line(9, "far".into(), &m).unwrap();
        store.insert_line(0, "head".into(), &m).unwrap();
        assert_eq!(live_texts(&store), vec!["head", "a", "tail", "far"]);
    }

    #[test_timeout::timeout]
    fn insert_past_the_end_never_leaves_gaps() {
        let surface = FixedSurface::grid(10, 80);
        let m = metrics(&surface, 10);
        let mut store = LineStore::default();
        store.insert_line(5, "x".into(), &m).unwrap();
        assert_eq!(store.len(), 1);
        assert_eq!(live_texts(&store), vec!["x"]);
    }

    #[test_timeout::timeout]
    fn growth_moves_overflow_into_history() {
        let surface = FixedSurface::grid(2, 80);
        let m = metrics(&surface, 2);
        let mut store = LineStore::default();
        for idx in 0..5 {
            store.append_line(format!("l{idx}"), &m);
            assert!(store.live_len() <= 2);
        }
        assert_eq!(store.screen_zero(), 3);
        assert_eq!(live_texts(&store), vec!["l3", "l4"]);
    }

    #[test_timeout::timeout]
    fn out_of_range_operations_are_rejected() {
        let surface = FixedSurface::grid(4, 80);
        let m = metrics(&surface, 4);
        let mut store = LineStore::default();
        let err = store.set_line(0, "x".into(), &m).unwrap_err();
        assert!(err.is_precondition());
        assert!(matches!(
            store.remove_last_line(&m),
            Err(ScreenError::EmptyStore { .. })
        ));
        assert!(store.is_empty());
    }

    #[test_timeout::timeout]
    fn trailing_space_fills_short_screens() {
        let surface = FixedSurface::grid(5, 80);
        let m = metrics(&surface, 5);
        let mut store = LineStore::default();
        store.append_line("a".into(), &m);
        store.append_line("b".into(), &m);
        assert_eq!(store.trailing_space(), 3);
        for text in ["c", "d", "e"] {
            store.append_line(text.into(), &m);
        }
        assert_eq!(store.trailing_space(), 0);
        store.set_screen_zero(4, &m);
        assert_eq!(store.trailing_space(), 4);
    }

    #[test_timeout::timeout]
    fn eviction_requests_smallest_prefix_once() {
        let surface = FixedSurface::grid(2, 80);
        let m = metrics(&surface, 2);
        let mut store = LineStore::new(10);
        for idx in 0..16 {
            store.append_line(format!("l{idx}"), &m);
        }
        assert_eq!(store.history_extent(), 14);
        assert_eq!(store.check_history_size(), Some(5));
        assert!(store.is_eviction_pending());
        assert_eq!(store.check_history_size(), None);

        assert_eq!(store.remove_history_lines(5, &m), 5);
        assert!(!store.is_eviction_pending());
        assert_eq!(store.records()[0].text(), Some("l5"));
        assert_eq!(store.screen_zero(), 9);
        assert_eq!(store.check_history_size(), None);
    }

    #[test_timeout::timeout]
    fn oversized_single_history_line_is_still_evictable() {
        let surface = FixedSurface::grid(1, 4);
        let m = Metrics {
            surface: &surface,
            cell: CellExtent::UNIT,
            size: TerminalSize { lines: 1, cols: 4 },
        };
        let mut store = LineStore::new(5);
        store.append_line("x".repeat(40), &m);
        store.append_line("live".into(), &m);
        assert_eq!(store.history_extent(), 10);
        assert_eq!(store.check_history_size(), Some(1));
    }

    #[test_timeout::timeout]
    fn eviction_ack_is_clamped_to_history() {
        let surface = FixedSurface::grid(2, 80);
        let m = metrics(&surface, 2);
        let mut store = LineStore::default();
        for idx in 0..4 {
            store.append_line(format!("l{idx}"), &m);
        }
        assert_eq!(store.remove_history_lines(10, &m), 2);
        assert_eq!(store.screen_zero(), 0);
        assert_eq!(live_texts(&store), vec!["l2", "l3"]);
    }

    #[test_timeout::timeout]
    fn reset_then_append_keeps_everything_live() {
        let surface = FixedSurface::grid(10, 80);
        let m = metrics(&surface, 10);
        let mut store = LineStore::default();
        for idx in 0..30 {
            store.append_line(format!("old{idx}"), &m);
        }
        store.reset();
        for idx in 0..7 {
            store.append_line(format!("new{idx}"), &m);
        }
        assert_eq!(store.len(), 7);
        assert_eq!(store.screen_zero(), 0);
    }
}
