//! Divider dragging: mouse motion to pane-ratio changes.

use crate::config::MIN_PANE_RATIO;

/// A drag in progress, captured on press inside a divider strip.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DragState {
    pub divider: usize,
    pub start_y: u16,
    pub start_ratios: [f64; 3],
}

impl DragState {
    pub fn new(divider: usize, start_y: u16, start_ratios: [f64; 3]) -> Self {
        Self {
            divider,
            start_y,
            start_ratios,
        }
    }

    /// Ratios for the mouse at `y`, or `None` when the move violates the minimum.
    pub fn ratios_at(&self, y: u16, available: u16) -> Option<[f64; 3]> {
        ratio_from_drag(
            self.start_ratios,
            self.divider,
            y as i32 - self.start_y as i32,
            available,
        )
    }
}

/// Shift the boundary of `divider` by `dy` lines of `available`.
pub fn ratio_from_drag(ratios: [f64; 3], divider: usize, dy: i32, available: u16) -> Option<[f64; 3]> {
    if divider > 1 || available == 0 {
        return None;
    }
    let delta = dy as f64 / available as f64;
    let (a, b) = (divider, divider + 1);
    let mut out = ratios;
    out[a] += delta;
    out[b] -= delta;

    if out[a] < MIN_PANE_RATIO {
        let deficit = MIN_PANE_RATIO - out[a];
        out[a] = MIN_PANE_RATIO;
        out[b] -= deficit;
    } else if out[b] < MIN_PANE_RATIO {
        let deficit = MIN_PANE_RATIO - out[b];
        out[b] = MIN_PANE_RATIO;
        out[a] -= deficit;
    }
    if out[a] < MIN_PANE_RATIO - 1e-9 || out[b] < MIN_PANE_RATIO - 1e-9 {
        return None;
    }

    let sum: f64 = out.iter().sum();
    if sum <= 0.0 {
        return None;
    }
    Some([out[0] / sum, out[1] / sum, out[2] / sum])
}
