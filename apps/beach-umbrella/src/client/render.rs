//! Drawing the screen into the host terminal with ratatui.

use ratatui::Frame;
use ratatui::layout::{Constraint, Direction, Layout};
use ratatui::text::Line;
use ratatui::widgets::{Paragraph, Scrollbar, ScrollbarOrientation, ScrollbarState};

use crate::screen::ScreenController;
use crate::surface::{CellExtent, MeasureError, RenderSurface, SurfaceArea};

/// Width of the scrollbar gutter on the right edge, in columns.
pub const SCROLLBAR_COLUMNS: u32 = 1;

/// The host terminal as a render surface: one surface unit per cell.
#[derive(Debug, Default, Clone, Copy)]
pub struct TerminalSurface;

impl RenderSurface for TerminalSurface {
    fn cell_extent(&self) -> Result<CellExtent, MeasureError> {
        Ok(CellExtent::UNIT)
    }

    fn available_area(&self) -> Result<SurfaceArea, MeasureError> {
        let (cols, rows) = crossterm::terminal::size().map_err(MeasureError::Io)?;
        if cols == 0 || rows == 0 {
            return Err(MeasureError::Detached);
        }
        Ok(SurfaceArea {
            width: u32::from(cols),
            height: u32::from(rows),
        })
    }

    fn scrollbar_extent(&self) -> Result<u32, MeasureError> {
        Ok(SCROLLBAR_COLUMNS)
    }
}

/// Renders the visible rows plus a scrollbar reflecting the line-mode
/// viewport position.
pub fn draw(frame: &mut Frame<'_>, screen: &ScreenController) {
    let area = frame.area();
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Min(1),
            Constraint::Length(SCROLLBAR_COLUMNS as u16),
        ])
        .split(area);

    let lines: Vec<Line<'static>> = screen.visible_rows().into_iter().map(Line::from).collect();
    frame.render_widget(Paragraph::new(lines), chunks[0]);

    if screen.is_application_mode() {
        return;
    }
    let store = screen.line_store();
    let viewport = screen.viewport();
    let document = store.total_extent() + store.trailing_space();
    let mut state = ScrollbarState::new(document.saturating_sub(viewport.height()) as usize)
        .viewport_content_length(viewport.height() as usize)
        .position(viewport.scroll_top() as usize);
    frame.render_stateful_widget(
        Scrollbar::new(ScrollbarOrientation::VerticalRight)
            .begin_symbol(None)
            .end_symbol(None),
        chunks[1],
        &mut state,
    );
}

/// Plain-text dump of the visible rows, used by headless runs.
pub fn snapshot(screen: &ScreenController) -> String {
    let mut out = String::new();
    for row in screen.visible_rows() {
        out.push_str(row.trim_end());
        out.push('\n');
    }
    out
}
