use tracing::trace;

/// Local scroll actions. None of these reach the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollRequest {
    PageUp,
    PageDown,
    Top,
    Bottom,
    /// Scroll by a number of cell rows; negative scrolls towards history.
    Rows(i32),
}

/// The visible window over the line-mode document. All values are in
/// surface extent units; the document height is supplied by the caller since
/// the line store owns it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Viewport {
    scroll_top: u32,
    height: u32,
    follow_tail: bool,
}

impl Viewport {
    pub fn new(height: u32) -> Self {
        Self {
            scroll_top: 0,
            height,
            follow_tail: true,
        }
    }

    pub fn scroll_top(&self) -> u32 {
        self.scroll_top
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn is_following(&self) -> bool {
        self.follow_tail
    }

    pub fn set_height(&mut self, height: u32, document: u32) {
        self.height = height;
        self.clamp(document);
    }

    fn max_top(&self, document: u32) -> u32 {
        document.saturating_sub(self.height)
    }

    fn clamp(&mut self, document: u32) {
        let max_top = self.max_top(document);
        if self.follow_tail || self.scroll_top > max_top {
            self.scroll_top = max_top;
        }
    }

    pub fn scroll_to_bottom(&mut self, document: u32) {
        self.scroll_top = self.max_top(document);
        self.follow_tail = true;
    }

    /// Keeps a following viewport pinned to the tail after content changed.
    pub fn autoscroll(&mut self, document: u32) {
        if self.follow_tail {
            self.scroll_top = self.max_top(document);
        } else {
            self.clamp(document);
        }
    }

    pub fn apply(&mut self, request: ScrollRequest, document: u32, cell_height: u32) {
        match request {
            ScrollRequest::PageUp => self.scroll_by(-i64::from(self.height), document),
            ScrollRequest::PageDown => self.scroll_by(i64::from(self.height), document),
            ScrollRequest::Top => {
                self.scroll_top = 0;
                self.follow_tail = self.max_top(document) == 0;
            }
            ScrollRequest::Bottom => self.scroll_to_bottom(document),
            ScrollRequest::Rows(rows) => {
                self.scroll_by(i64::from(rows) * i64::from(cell_height), document)
            }
        }
        trace!(
            target: "umbrella::screen",
            ?request,
            scroll_top = self.scroll_top,
            follow_tail = self.follow_tail,
            "viewport scrolled"
        );
    }

    fn scroll_by(&mut self, delta: i64, document: u32) {
        let max_top = self.max_top(document);
        let target = (i64::from(self.scroll_top) + delta).clamp(0, i64::from(max_top));
        self.scroll_top = target as u32;
        self.follow_tail = self.scroll_top >= max_top;
    }
}
