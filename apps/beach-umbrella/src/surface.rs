//! Measurements of the thing the client renders into.
//!
//! Everything the screen needs to know about its environment goes through
//! [`RenderSurface`]: the extent of one character cell, the area available for
//! lines, the width eaten by the vertical scrollbar, and how tall a given line
//! or frame document renders. Extents are in surface units (pixels for a
//! graphical host, rows for a terminal host); the history budget uses the same
//! unit.

use std::cell::Cell;

use crate::screen::frames::{BufferedDocument, FrameDocument};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellExtent {
    pub width: u32,
    pub height: u32,
}

impl CellExtent {
    pub const UNIT: CellExtent = CellExtent {
        width: 1,
        height: 1,
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SurfaceArea {
    pub width: u32,
    pub height: u32,
}

/// Terminal dimensions in character cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TerminalSize {
    pub lines: u16,
    pub cols: u16,
}

impl Default for TerminalSize {
    fn default() -> Self {
        Self { lines: 24, cols: 80 }
    }
}

impl TerminalSize {
    /// Derives the grid size from a cell measurement. The scrollbar is
    /// subtracted from the width so the last column never renders under it.
    pub fn from_measurements(
        cell: CellExtent,
        area: SurfaceArea,
        scrollbar: u32,
    ) -> Result<Self, MeasureError> {
        if cell.width == 0 || cell.height == 0 {
            return Err(MeasureError::Degenerate);
        }
        let usable_width = area.width.saturating_sub(scrollbar);
        let cols = (usable_width / cell.width).clamp(1, u16::MAX as u32) as u16;
        let lines = (area.height / cell.height).clamp(1, u16::MAX as u32) as u16;
        Ok(Self { lines, cols })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum MeasureError {
    #[error("render surface is detached")]
    Detached,
    #[error("character cell measured with zero extent")]
    Degenerate,
    #[error("surface query failed: {0}")]
    Io(#[from] std::io::Error),
}

pub trait RenderSurface {
    fn cell_extent(&self) -> Result<CellExtent, MeasureError>;

    fn available_area(&self) -> Result<SurfaceArea, MeasureError>;

    fn scrollbar_extent(&self) -> Result<u32, MeasureError>;

    /// Rendered extent of a line of content when wrapped at `cols` columns.
    fn line_extent(&self, content: &str, cols: u16, cell: CellExtent) -> u32 {
        wrapped_rows(content, cols) * cell.height
    }

    /// Creates the backing document for a new embedded frame.
    fn create_document(&self, id: &str, source: &str) -> Box<dyn FrameDocument> {
        Box::new(BufferedDocument::new(id, source))
    }
}

/// Number of rows a line occupies when wrapped; an empty line still takes one.
pub fn wrapped_rows(content: &str, cols: u16) -> u32 {
    let width = content.trim_end_matches('\n').chars().count() as u32;
    let cols = u32::from(cols.max(1));
    width.div_ceil(cols).max(1)
}

/// Splits one line of content into rows of at most `cols` characters.
pub fn wrap_text(content: &str, cols: u16) -> Vec<String> {
    let width = usize::from(cols.max(1));
    let chars: Vec<char> = content.trim_end_matches('\n').chars().collect();
    if chars.is_empty() {
        return vec![String::new()];
    }
    chars.chunks(width).map(|chunk| chunk.iter().collect()).collect()
}

/// A surface with fixed measurements, used by headless runs and tests.
#[derive(Debug)]
pub struct FixedSurface {
    cell: CellExtent,
    area: SurfaceArea,
    scrollbar: u32,
    detached: Cell<bool>,
    scrollbar_queries: Cell<u32>,
}

impl FixedSurface {
    pub fn new(cell: CellExtent, area: SurfaceArea) -> Self {
        Self {
            cell,
            area,
            scrollbar: 0,
            detached: Cell::new(false),
            scrollbar_queries: Cell::new(0),
        }
    }

    /// A surface of `lines` x `cols` unit cells.
    pub fn grid(lines: u16, cols: u16) -> Self {
        Self::new(
            CellExtent::UNIT,
            SurfaceArea {
                width: u32::from(cols),
                height: u32::from(lines),
            },
        )
    }

    pub fn with_scrollbar(mut self, extent: u32) -> Self {
        self.scrollbar = extent;
        self
    }

    pub fn set_area(&mut self, area: SurfaceArea) {
        self.area = area;
    }

    /// Simulates the surface being removed from layout, e.g. mid mode switch.
    pub fn set_detached(&self, detached: bool) {
        self.detached.set(detached);
    }

    pub fn scrollbar_queries(&self) -> u32 {
        self.scrollbar_queries.get()
    }

    fn ensure_attached(&self) -> Result<(), MeasureError> {
        if self.detached.get() {
            Err(MeasureError::Detached)
        } else {
            Ok(())
        }
    }
}

impl RenderSurface for FixedSurface {
    fn cell_extent(&self) -> Result<CellExtent, MeasureError> {
        self.ensure_attached()?;
        Ok(self.cell)
    }

    fn available_area(&self) -> Result<SurfaceArea, MeasureError> {
        self.ensure_attached()?;
        Ok(self.area)
    }

    fn scrollbar_extent(&self) -> Result<u32, MeasureError> {
        self.ensure_attached()?;
        self.scrollbar_queries.set(self.scrollbar_queries.get() + 1);
        Ok(self.scrollbar)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test_timeout::timeout]
    fn size_divides_area_by_cell_and_skips_scrollbar() {
        let size = TerminalSize::from_measurements(
            CellExtent {
                width: 8,
                height: 16,
            },
            SurfaceArea {
                width: 660,
                height: 390,
            },
            15,
        )
        .unwrap();
        assert_eq!(size, TerminalSize { lines: 24, cols: 80 });
    }

    #[test_timeout::timeout]
    fn degenerate_cells_are_rejected() {
        let err = TerminalSize::from_measurements(
            CellExtent {
                width: 0,
                height: 16,
            },
            SurfaceArea {
                width: 100,
                height: 100,
            },
            0,
        )
        .unwrap_err();
        assert!(matches!(err, MeasureError::Degenerate));
    }

    #[test_timeout::timeout]
    fn wrapping_counts_at_least_one_row() {
        assert_eq!(wrapped_rows("", 80), 1);
        assert_eq!(wrapped_rows("abc\n", 80), 1);
        assert_eq!(wrapped_rows(&"x".repeat(81), 80), 2);
        assert_eq!(wrapped_rows(&"x".repeat(160), 80), 2);
        assert_eq!(wrap_text("abcde", 2), vec!["ab", "cd", "e"]);
        assert_eq!(wrap_text("", 2), vec![String::new()]);
    }

    #[test_timeout::timeout]
    fn detached_surface_fails_every_query() {
        let surface = FixedSurface::grid(24, 80);
        surface.set_detached(true);
        assert!(matches!(surface.cell_extent(), Err(MeasureError::Detached)));
        assert!(matches!(
            surface.available_area(),
            Err(MeasureError::Detached)
        ));
    }
}
