//! Mouse hit-testing, the inverse of panel rendering.

use super::layout::{content_lines, contains, Panel, PanelBounds, CONTENT_OFFSET};
use super::lines::PanelModel;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hit {
    Divider(usize),
    /// `row` is -1 on chrome, headers, separators and indicators.
    Panel { panel: Panel, row: i32 },
    Outside,
}

impl Hit {
    pub fn row(&self) -> Option<(Panel, usize)> {
        match *self {
            Hit::Panel { panel, row } if row >= 0 => Some((panel, row as usize)),
            _ => None,
        }
    }
}

/// Resolve a screen position. Dividers win over panel bodies.
pub fn hit_test(
    bounds: &PanelBounds,
    models: &[PanelModel; 3],
    offsets: [usize; 3],
    x: u16,
    y: u16,
) -> Hit {
    for (i, d) in bounds.dividers.iter().enumerate() {
        if d.height > 0 && contains(*d, x, y) {
            return Hit::Divider(i);
        }
    }
    for panel in Panel::ALL {
        let rect = bounds.panel(panel);
        if !contains(rect, x, y) {
            continue;
        }
        let idx = panel.index();
        return Hit::Panel {
            panel,
            row: row_at(&models[idx], offsets[idx], rect.height, y.saturating_sub(rect.y)),
        };
    }
    Hit::Outside
}

/// Row under panel-relative line `rel_y` (0 is the top border).
pub fn row_at(model: &PanelModel, offset: usize, height: u16, rel_y: u16) -> i32 {
    if rel_y < CONTENT_OFFSET {
        return -1;
    }
    let line = (rel_y - CONTENT_OFFSET) as usize;
    let room = content_lines(height);
    if line >= room {
        return -1;
    }
    match model.plan(offset, room).get(line).and_then(|l| l.row()) {
        Some(i) => i as i32,
        None => -1,
    }
}
