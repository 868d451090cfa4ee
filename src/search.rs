//! View state: the scroll position, the active search pattern, and the
//! movements that change them.
//!
//! Movement is pure arithmetic over the layout index; nothing here touches
//! the terminal. The render loop checks `needs_redraw` after every event.

use log::debug;
use regex::Regex;

use crate::layout::LayoutIndex;

#[derive(Debug, Default)]
pub struct ViewState {
    /// Absolute document row at the top of the viewport.
    pub row: u32,
    pub pattern: Option<Regex>,
    pub needs_redraw: bool,
}

impl ViewState {
    pub fn new() -> Self {
        Self { row: 0, pattern: None, needs_redraw: true }
    }

    /// Move by `delta` rows, clamped to `[0, max_scroll]`.
    pub fn scroll(&mut self, layout: &LayoutIndex, view_rows: u32, delta: i32) {
        let max = layout.max_scroll(view_rows);
        let target = i64::from(self.row) + i64::from(delta);
        let clamped = target.clamp(0, i64::from(max)) as u32;
        if clamped != self.row {
            self.row = clamped;
            self.needs_redraw = true;
        }
    }

    pub fn goto(&mut self, layout: &LayoutIndex, view_rows: u32, row: u32) {
        let clamped = row.min(layout.max_scroll(view_rows));
        if clamped != self.row {
            self.row = clamped;
            self.needs_redraw = true;
        }
    }

    pub fn goto_top(&mut self, layout: &LayoutIndex, view_rows: u32) {
        self.goto(layout, view_rows, 0);
    }

    pub fn goto_bottom(&mut self, layout: &LayoutIndex, view_rows: u32) {
        self.goto(layout, view_rows, layout.max_scroll(view_rows));
    }

    pub fn set_pattern(&mut self, pattern: Regex) {
        debug!("search pattern set: {}", pattern.as_str());
        self.pattern = Some(pattern);
    }

    /// Jump to the first match strictly below the current top row.
    pub fn search_next(&mut self, layout: &LayoutIndex, view_rows: u32) -> bool {
        let Some(pattern) = self.pattern.clone() else {
            return false;
        };
        for (target, line) in match_rows(layout) {
            if target > self.row && pattern.is_match(line) {
                self.goto(layout, view_rows, target);
                return true;
            }
        }
        false
    }

    /// Jump to the last match strictly above the current top row.
    pub fn search_prev(&mut self, layout: &LayoutIndex, view_rows: u32) -> bool {
        let Some(pattern) = self.pattern.clone() else {
            return false;
        };
        let mut found = None;
        for (target, line) in match_rows(layout) {
            if target >= self.row {
                break;
            }
            if pattern.is_match(line) {
                found = Some(target);
            }
        }
        match found {
            Some(target) => {
                self.goto(layout, view_rows, target);
                true
            }
            None => false,
        }
    }
}

/// Every text line in document order with the scroll target that puts it at
/// the viewport top. Lines sit two rows below their block's offset (rule and
/// margin precede them).
fn match_rows(layout: &LayoutIndex) -> impl Iterator<Item = (u32, &str)> {
    layout.real_entries().iter().flat_map(|(offset, block)| {
        block
            .text_lines()
            .unwrap_or(&[])
            .iter()
            .enumerate()
            .map(move |(i, line)| (offset + i as u32 + 2, line.as_str()))
    })
}
