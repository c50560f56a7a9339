//! Cursor/offset coherence for one panel.

use super::layout::{content_lines, visible_rows};
use super::lines::{PanelModel, Shape};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScrollState {
    pub cursor: usize,
    pub offset: usize,
    /// Set by the mouse wheel; while set, refreshes leave the offset alone.
    pub independent: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Motion {
    Down(usize),
    Up(usize),
    Top,
    Bottom,
}

/// Largest useful offset. Grouped panels with headers find the smallest
/// offset whose line plan still shows the last row.
pub fn max_scroll(model: &PanelModel, height: u16) -> usize {
    let n = model.len();
    if n == 0 {
        return 0;
    }
    if !model.has_headers() {
        return n.saturating_sub(visible_rows(height));
    }
    let room = content_lines(height);
    (0..n)
        .find(|&off| model.line_of_row(off, room, n - 1).is_some())
        .unwrap_or(n - 1)
}

/// Rows the current line plan draws, first and last.
pub fn drawn_range(state: &ScrollState, model: &PanelModel, height: u16) -> Option<(usize, usize)> {
    let lines = model.plan(state.offset, content_lines(height));
    let mut rows = lines.iter().filter_map(|l| l.row());
    let first = rows.next()?;
    let last = rows.last().unwrap_or(first);
    Some((first, last))
}

/// Bring the cursor into the viewport, scrolling as little as possible.
pub fn ensure_visible(state: &mut ScrollState, model: &PanelModel, height: u16) {
    let n = model.len();
    if n == 0 {
        state.cursor = 0;
        state.offset = 0;
        return;
    }
    state.cursor = state.cursor.min(n - 1);
    let visible = visible_rows(height);

    if state.cursor < state.offset {
        state.offset = state.cursor;
    } else {
        let headers = if model.has_headers() {
            model.header_lines_between(state.offset, state.cursor)
        } else {
            0
        };
        let effective = visible.saturating_sub(headers).max(1);
        if state.cursor >= state.offset + effective {
            let mut new_offset = state.cursor + 1 - effective;
            // Leaving the top makes "▲ more above" consume a line.
            if state.offset == 0 && model.shape == Shape::Grouped && new_offset < state.cursor {
                new_offset += 1;
            }
            state.offset = new_offset;
        }
    }

    let room = content_lines(height);
    while state.offset < state.cursor && model.line_of_row(state.offset, room, state.cursor).is_none() {
        state.offset += 1;
    }
    state.offset = state.offset.min(max_scroll(model, height));
}

/// Keyboard motion: keyboard wins back the viewport.
pub fn move_cursor(state: &mut ScrollState, motion: Motion, model: &PanelModel, height: u16) {
    let n = model.len();
    if n == 0 {
        *state = ScrollState::default();
        return;
    }
    state.cursor = match motion {
        Motion::Down(k) => (state.cursor + k).min(n - 1),
        Motion::Up(k) => state.cursor.saturating_sub(k),
        Motion::Top => 0,
        Motion::Bottom => n - 1,
    };
    state.independent = false;
    ensure_visible(state, model, height);
}

/// Mouse wheel or ctrl+e/ctrl+y: move the viewport, drag the cursor along only if it fell out.
pub fn wheel(state: &mut ScrollState, delta: isize, model: &PanelModel, height: u16) {
    if model.is_empty() {
        return;
    }
    let max = max_scroll(model, height) as isize;
    state.offset = (state.offset as isize + delta).clamp(0, max) as usize;
    state.independent = true;
    if let Some((first, last)) = drawn_range(state, model, height) {
        state.cursor = state.cursor.clamp(first, last);
    }
}

/// After new data arrives or the terminal resizes.
pub fn refresh(state: &mut ScrollState, model: &PanelModel, height: u16) {
    if !state.independent {
        ensure_visible(state, model, height);
        return;
    }
    let n = model.len();
    state.cursor = if n == 0 { 0 } else { state.cursor.min(n - 1) };
    state.offset = state.offset.min(max_scroll(model, height));
}

pub fn half_page(height: u16) -> usize {
    (visible_rows(height) / 2).max(1)
}

pub fn full_page(height: u16) -> usize {
    visible_rows(height)
}
