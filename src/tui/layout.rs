//! Panel geometry: three stacked panels, two draggable dividers.

use ratatui::layout::{Constraint, Direction, Layout, Rect};

pub const FOOTER_LINES: u16 = 3;
pub const SEARCH_LINES: u16 = 2;
/// Title + two borders + two scroll indicator reservations.
pub const PANEL_CHROME: u16 = 5;
/// Height of a divider hit strip.
pub const DIVIDER_BAND: u16 = 3;
/// Top border and title line sit above the first content line.
pub const CONTENT_OFFSET: u16 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Panel {
    CurrentWork,
    TaskList,
    Activity,
}

impl Panel {
    pub const ALL: [Panel; 3] = [Panel::CurrentWork, Panel::TaskList, Panel::Activity];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(i: usize) -> Option<Panel> {
        Panel::ALL.get(i).copied()
    }

    pub fn next(self) -> Panel {
        Panel::ALL[(self.index() + 1) % 3]
    }

    pub fn prev(self) -> Panel {
        Panel::ALL[(self.index() + 2) % 3]
    }

    pub fn title(self) -> &'static str {
        match self {
            Panel::CurrentWork => "Current Work",
            Panel::TaskList => "Task List",
            Panel::Activity => "Activity",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PanelBounds {
    pub search: Option<Rect>,
    pub panels: [Rect; 3],
    pub dividers: [Rect; 2],
    pub footer: Option<Rect>,
    /// Lines shared by the three panels.
    pub available: u16,
}

impl PanelBounds {
    pub fn panel(&self, panel: Panel) -> Rect {
        self.panels[panel.index()]
    }
}

/// Split `area` into search bar, panels and footer.
pub fn compute(area: Rect, ratios: [f64; 3], embedded: bool, search_visible: bool) -> PanelBounds {
    let footer_h = if embedded { 0 } else { FOOTER_LINES };
    let search_h = if search_visible { SEARCH_LINES } else { 0 };
    let reserved = footer_h + search_h;
    let available = area.height.saturating_sub(reserved);

    let h0 = ((available as f64 * ratios[0]).round() as u16).min(available);
    let h1 = ((available as f64 * ratios[1]).round() as u16).min(available - h0);
    let h2 = available - h0 - h1;

    let top = area.y + search_h.min(area.height);
    let x = area.x;
    let w = area.width;
    let panels = [
        Rect::new(x, top, w, h0),
        Rect::new(x, top + h0, w, h1),
        Rect::new(x, top + h0 + h1, w, h2),
    ];

    let divider = |boundary: u16| {
        let y = boundary.saturating_sub(1).max(top);
        Rect::new(x, y, w, DIVIDER_BAND.min(area.bottom().saturating_sub(y)))
    };
    let dividers = [divider(panels[1].y), divider(panels[2].y)];

    PanelBounds {
        search: (search_h > 0).then(|| Rect::new(x, area.y, w, search_h.min(area.height))),
        panels,
        dividers,
        footer: (footer_h > 0 && area.height >= footer_h)
            .then(|| Rect::new(x, area.bottom() - footer_h, w, footer_h)),
        available,
    }
}

/// Data rows a panel of `height` lines can show once chrome is subtracted.
pub fn visible_rows(height: u16) -> usize {
    height.saturating_sub(PANEL_CHROME).max(1) as usize
}

/// Lines inside the border below the title line.
pub fn content_lines(height: u16) -> usize {
    height.saturating_sub(3) as usize
}

/// Screen row of the first content line of a panel.
pub fn content_top(rect: Rect) -> u16 {
    rect.y + CONTENT_OFFSET
}

/// Centered popup, percentages of `r`.
pub fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}

pub fn contains(r: Rect, x: u16, y: u16) -> bool {
    x >= r.x && x < r.x + r.width && y >= r.y && y < r.y + r.height
}
