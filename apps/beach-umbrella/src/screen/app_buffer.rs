//! Fixed-size character matrix used while a full-screen program runs.

use std::collections::VecDeque;

use super::{Metrics, ScreenBuffer, ScreenError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplicationBuffer {
    rows: VecDeque<String>,
}

impl ApplicationBuffer {
    /// A buffer of `lines` blank rows.
    pub fn new(lines: u16) -> Self {
        let lines = usize::from(lines.max(1));
        Self {
            rows: std::iter::repeat_with(String::new).take(lines).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn row(&self, line: usize) -> Option<&str> {
        self.rows.get(line).map(String::as_str)
    }

    /// Grows with blank rows at the bottom or drops rows from the top.
    pub fn resize(&mut self, lines: u16) {
        let lines = usize::from(lines.max(1));
        while self.rows.len() < lines {
            self.rows.push_back(String::new());
        }
        while self.rows.len() > lines {
            self.rows.pop_front();
        }
    }

    pub fn clear(&mut self) {
        self.rows.iter_mut().for_each(String::clear);
    }

    fn check_line(&self, op: &'static str, line: usize) -> Result<(), ScreenError> {
        if line < self.rows.len() {
            Ok(())
        } else {
            Err(ScreenError::LineOutOfRange {
                op,
                line,
                live: self.rows.len(),
            })
        }
    }
}

impl ScreenBuffer for ApplicationBuffer {
    fn set_line(
        &mut self,
        line: usize,
        content: String,
        _metrics: &Metrics<'_>,
    ) -> Result<(), ScreenError> {
        self.check_line("setLine", line)?;
        self.rows[line] = content;
        Ok(())
    }

    /// Past the bottom the whole screen scrolls up; inside it, rows below the
    /// insertion point shift down and the bottom row falls off.
    fn insert_line(
        &mut self,
        line: usize,
        content: String,
        _metrics: &Metrics<'_>,
    ) -> Result<(), ScreenError> {
        if line >= self.rows.len() {
            self.rows.push_back(content);
            self.rows.pop_front();
        } else {
            self.rows.insert(line, content);
            self.rows.pop_back();
        }
        Ok(())
    }

    fn append_line(&mut self, content: String, _metrics: &Metrics<'_>) {
        self.rows.push_back(content);
        self.rows.pop_front();
    }

    fn remove_line(&mut self, line: usize, _metrics: &Metrics<'_>) -> Result<(), ScreenError> {
        self.check_line("removeLine", line)?;
        self.rows.remove(line);
        self.rows.push_back(String::new());
        Ok(())
    }

    fn remove_last_line(&mut self, _metrics: &Metrics<'_>) -> Result<(), ScreenError> {
        match self.rows.back_mut() {
            Some(last) => {
                last.clear();
                Ok(())
            }
            None => Err(ScreenError::EmptyStore {
                op: "removeLastLine",
            }),
        }
    }

    fn rows(&self) -> Vec<String> {
        self.rows.iter().cloned().collect()
    }
}
