//! Issue-detail modals: a stack with per-modal section focus and a sibling scope.

use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};

use crate::issue::{Issue, IssueDetails};

use super::layout::Panel;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ModalFocus {
    #[default]
    None,
    ParentEpic,
    EpicTasks,
    BlockedBy,
    Blocks,
}

const SECTION_ORDER: [ModalFocus; 4] = [
    ModalFocus::ParentEpic,
    ModalFocus::EpicTasks,
    ModalFocus::BlockedBy,
    ModalFocus::Blocks,
];

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Modal {
    pub issue_id: String,
    pub details: Option<IssueDetails>,
    pub error: Option<String>,
    pub scroll: usize,
    pub focus: ModalFocus,
    pub epic_cursor: usize,
    pub blocked_by_cursor: usize,
    pub blocks_cursor: usize,
    /// Ids Left/Right step through.
    pub scope: Vec<String>,
    pub source: Option<Panel>,
}

impl Modal {
    pub fn new(issue_id: impl Into<String>, scope: Vec<String>, source: Option<Panel>) -> Self {
        Self {
            issue_id: issue_id.into(),
            scope,
            source,
            ..Self::default()
        }
    }

    pub fn is_loading(&self) -> bool {
        self.details.is_none() && self.error.is_none()
    }

    fn section_len(&self, section: ModalFocus) -> usize {
        let Some(d) = &self.details else {
            return 0;
        };
        match section {
            ModalFocus::None => 0,
            ModalFocus::ParentEpic => usize::from(d.parent_epic.is_some()),
            ModalFocus::EpicTasks => {
                if d.issue.is_epic() {
                    d.epic_children.len()
                } else {
                    0
                }
            }
            ModalFocus::BlockedBy => d.blocked_by.len(),
            ModalFocus::Blocks => d.blocks.len(),
        }
    }

    /// Sections present, in visual top-to-bottom order.
    pub fn sections(&self) -> Vec<ModalFocus> {
        SECTION_ORDER
            .into_iter()
            .filter(|s| self.section_len(*s) > 0)
            .collect()
    }

    fn has_parent(&self) -> bool {
        self.section_len(ModalFocus::ParentEpic) > 0
    }

    fn cursor_mut(&mut self, section: ModalFocus) -> Option<&mut usize> {
        match section {
            ModalFocus::EpicTasks => Some(&mut self.epic_cursor),
            ModalFocus::BlockedBy => Some(&mut self.blocked_by_cursor),
            ModalFocus::Blocks => Some(&mut self.blocks_cursor),
            _ => None,
        }
    }

    pub fn cycle_focus(&mut self, forward: bool) {
        let sections = self.sections();
        if sections.is_empty() {
            self.focus = ModalFocus::None;
            return;
        }
        let pos = sections.iter().position(|s| *s == self.focus);
        self.focus = match (pos, forward) {
            (None, true) => sections[0],
            (None, false) => sections[sections.len() - 1],
            (Some(i), true) if i + 1 < sections.len() => sections[i + 1],
            (Some(i), false) if i > 0 => sections[i - 1],
            _ => ModalFocus::None,
        };
    }

    pub fn move_down(&mut self, max_scroll: usize) {
        match self.focus {
            ModalFocus::None => {
                if self.scroll == 0 && self.has_parent() {
                    self.scroll = 1;
                } else {
                    self.scroll = (self.scroll + 1).min(max_scroll.max(self.scroll));
                }
            }
            ModalFocus::ParentEpic => {
                self.focus = ModalFocus::None;
                self.scroll = 1;
            }
            ModalFocus::EpicTasks => {
                let len = self.section_len(ModalFocus::EpicTasks);
                if self.epic_cursor + 1 < len {
                    self.epic_cursor += 1;
                } else {
                    self.focus = ModalFocus::None;
                    self.scroll = (self.scroll + 1).min(max_scroll.max(self.scroll));
                }
            }
            section => {
                let len = self.section_len(section);
                if let Some(c) = self.cursor_mut(section) {
                    if *c + 1 < len {
                        *c += 1;
                    }
                }
            }
        }
    }

    pub fn move_up(&mut self) {
        match self.focus {
            ModalFocus::None => {
                if self.scroll == 0 {
                    if self.has_parent() {
                        self.focus = ModalFocus::ParentEpic;
                    }
                } else {
                    self.scroll -= 1;
                }
            }
            ModalFocus::ParentEpic => {}
            section => {
                if let Some(c) = self.cursor_mut(section) {
                    *c = c.saturating_sub(1);
                }
            }
        }
    }

    pub fn scroll_by(&mut self, delta: isize, max_scroll: usize) {
        self.focus = ModalFocus::None;
        self.scroll = (self.scroll as isize + delta).clamp(0, max_scroll as isize) as usize;
    }

    /// Linked issue under the focused section, with the scope the new modal navigates.
    pub fn selected_link(&self) -> Option<(String, Vec<String>)> {
        let d = self.details.as_ref()?;
        match self.focus {
            ModalFocus::None => None,
            ModalFocus::ParentEpic => d.parent_epic.as_ref().map(|p| (p.id.clone(), self.scope.clone())),
            ModalFocus::EpicTasks => d.epic_children.get(self.epic_cursor).map(|c| {
                let scope = d.epic_children.iter().map(|i| i.id.clone()).collect();
                (c.id.clone(), scope)
            }),
            ModalFocus::BlockedBy => d
                .blocked_by
                .get(self.blocked_by_cursor)
                .map(|i| (i.id.clone(), self.scope.clone())),
            ModalFocus::Blocks => d
                .blocks
                .get(self.blocks_cursor)
                .map(|i| (i.id.clone(), self.scope.clone())),
        }
    }

    /// Step through the scope circularly; returns the new id to fetch.
    pub fn navigate(&mut self, delta: isize) -> Option<String> {
        let n = self.scope.len() as isize;
        if n == 0 {
            return None;
        }
        let idx = self.scope.iter().position(|id| *id == self.issue_id)? as isize;
        let next = (idx + delta).rem_euclid(n) as usize;
        let id = self.scope[next].clone();
        if id == self.issue_id {
            return None;
        }
        self.issue_id = id.clone();
        self.details = None;
        self.error = None;
        self.scroll = 0;
        self.focus = ModalFocus::None;
        self.epic_cursor = 0;
        self.blocked_by_cursor = 0;
        self.blocks_cursor = 0;
        Some(id)
    }

    /// Install fetched details and repair focus and cursors against the new content.
    pub fn set_details(&mut self, details: IssueDetails) {
        self.details = Some(details);
        self.error = None;
        if self.focus != ModalFocus::None && self.section_len(self.focus) == 0 {
            self.focus = ModalFocus::None;
        }
        for section in [ModalFocus::EpicTasks, ModalFocus::BlockedBy, ModalFocus::Blocks] {
            let len = self.section_len(section);
            if let Some(c) = self.cursor_mut(section) {
                *c = (*c).min(len.saturating_sub(1));
            }
        }
    }

    pub fn title(&self) -> String {
        match &self.details {
            Some(d) => format!(" {} · {} ", d.issue.id, d.issue.title),
            None => format!(" {} ", self.issue_id),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModalStack {
    modals: Vec<Modal>,
}

impl ModalStack {
    pub fn push(&mut self, modal: Modal) {
        self.modals.push(modal);
    }

    pub fn pop(&mut self) -> Option<Modal> {
        self.modals.pop()
    }

    pub fn top(&self) -> Option<&Modal> {
        self.modals.last()
    }

    pub fn top_mut(&mut self) -> Option<&mut Modal> {
        self.modals.last_mut()
    }

    pub fn is_empty(&self) -> bool {
        self.modals.is_empty()
    }

    pub fn len(&self) -> usize {
        self.modals.len()
    }

    pub fn clear(&mut self) {
        self.modals.clear();
    }

    /// Deliver details to every modal still showing `issue_id`; false if none is.
    pub fn apply_details(&mut self, details: &IssueDetails) -> bool {
        let mut applied = false;
        for m in self.modals.iter_mut().filter(|m| m.issue_id == details.issue.id) {
            m.set_details(details.clone());
            applied = true;
        }
        applied
    }

    pub fn apply_error(&mut self, issue_id: &str, error: &str) -> bool {
        let mut applied = false;
        for m in self.modals.iter_mut().filter(|m| m.issue_id == issue_id && m.details.is_none()) {
            m.error = Some(error.to_string());
            applied = true;
        }
        applied
    }

    pub fn ids(&self) -> Vec<String> {
        self.modals.iter().map(|m| m.issue_id.clone()).collect()
    }
}

/// Rendered modal body plus the line the focused item sits on.
pub struct ModalBody {
    pub lines: Vec<Line<'static>>,
    pub focus_line: Option<usize>,
}

fn label(text: &str) -> Span<'static> {
    Span::styled(format!("{:<10}", text), Style::default().fg(Color::DarkGray))
}

fn section_header(title: &str, count: usize, focused: bool) -> Line<'static> {
    let style = if focused {
        Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(Color::Rgb(140, 140, 140)).add_modifier(Modifier::BOLD)
    };
    Line::from(Span::styled(format!("── {} ({}) ", title, count), style))
}

fn link_line(issue: &Issue, selected: bool) -> Line<'static> {
    let marker = if selected { "▸ " } else { "  " };
    let style = if selected {
        Style::default().fg(Color::Black).bg(Color::Cyan)
    } else {
        Style::default()
    };
    Line::from(vec![
        Span::styled(marker.to_string(), style),
        Span::styled(format!("{} ", issue.id), style.fg(if selected { Color::Black } else { Color::Yellow })),
        Span::styled(format!("[{}] ", issue.status), style.fg(if selected { Color::Black } else { Color::DarkGray })),
        Span::styled(issue.title.clone(), style),
    ])
}

fn wrap(text: &str, width: usize) -> Vec<String> {
    let width = width.max(10);
    let mut out = Vec::new();
    for raw in text.lines() {
        let mut current = String::new();
        for word in raw.split_whitespace() {
            let needed = if current.is_empty() { word.len() } else { current.len() + 1 + word.len() };
            if needed > width && !current.is_empty() {
                out.push(std::mem::take(&mut current));
            }
            if !current.is_empty() {
                current.push(' ');
            }
            current.push_str(word);
        }
        out.push(current);
    }
    out
}

/// Build the body lines for `modal` at `width` columns.
pub fn body(modal: &Modal, width: u16) -> ModalBody {
    let mut lines: Vec<Line<'static>> = Vec::new();
    let mut focus_line = None;

    let Some(d) = &modal.details else {
        let text = match &modal.error {
            Some(e) => Line::from(Span::styled(format!("Error: {}", e), Style::default().fg(Color::Red))),
            None => Line::from(Span::styled("Loading…", Style::default().fg(Color::DarkGray))),
        };
        return ModalBody {
            lines: vec![text],
            focus_line: None,
        };
    };
    let issue = &d.issue;
    let w = width.saturating_sub(4) as usize;

    if let Some(parent) = &d.parent_epic {
        let focused = modal.focus == ModalFocus::ParentEpic;
        if focused {
            focus_line = Some(lines.len());
        }
        let mut line = link_line(parent, focused);
        line.spans.insert(0, label("Epic"));
        lines.push(line);
    }

    lines.push(Line::from(vec![
        label("Status"),
        Span::styled(issue.status.to_string(), Style::default().fg(Color::Green)),
        Span::raw("   "),
        label("Type"),
        Span::raw(issue.issue_type.to_string()),
        Span::raw("   "),
        label("Priority"),
        Span::styled(issue.priority.to_string(), Style::default().fg(Color::Yellow)),
    ]));
    if issue.points > 0 || !issue.labels.is_empty() {
        lines.push(Line::from(vec![
            label("Points"),
            Span::raw(issue.points.to_string()),
            Span::raw("   "),
            label("Labels"),
            Span::raw(issue.labels.join(", ")),
        ]));
    }
    if let Some(s) = &issue.implementer_session {
        lines.push(Line::from(vec![label("Implementer"), Span::raw(s.clone())]));
    }
    if let Some(s) = &issue.reviewer_session {
        lines.push(Line::from(vec![label("Reviewer"), Span::raw(s.clone())]));
    }
    lines.push(Line::from(vec![
        label("Updated"),
        Span::raw(issue.updated_at.format("%Y-%m-%d %H:%M").to_string()),
    ]));

    lines.push(Line::from(""));
    if issue.description.trim().is_empty() {
        lines.push(Line::from(Span::styled("No description.", Style::default().fg(Color::DarkGray))));
    } else {
        lines.extend(wrap(&issue.description, w).into_iter().map(Line::from));
    }
    if !issue.acceptance.trim().is_empty() {
        lines.push(Line::from(""));
        lines.push(section_header("Acceptance", 1, false));
        lines.extend(wrap(&issue.acceptance, w).into_iter().map(Line::from));
    }

    let sections: [(ModalFocus, &str, &[Issue], usize); 3] = [
        (ModalFocus::EpicTasks, "Epic tasks", d.epic_children.as_slice(), modal.epic_cursor),
        (ModalFocus::BlockedBy, "Blocked by", d.blocked_by.as_slice(), modal.blocked_by_cursor),
        (ModalFocus::Blocks, "Blocks", d.blocks.as_slice(), modal.blocks_cursor),
    ];
    for (section, title, items, cursor) in sections {
        if modal.section_len(section) == 0 {
            continue;
        }
        let focused = modal.focus == section;
        lines.push(Line::from(""));
        lines.push(section_header(title, items.len(), focused));
        for (i, item) in items.iter().enumerate() {
            let selected = focused && i == cursor;
            if selected {
                focus_line = Some(lines.len());
            }
            lines.push(link_line(item, selected));
        }
    }

    ModalBody { lines, focus_line }
}

/// Keep the focused item inside the viewport and the scroll in range.
pub fn sync_scroll(modal: &mut Modal, body: &ModalBody, viewport: usize) {
    let max = body.lines.len().saturating_sub(viewport.max(1));
    if let Some(line) = body.focus_line {
        if modal.focus != ModalFocus::ParentEpic {
            if line < modal.scroll {
                modal.scroll = line;
            } else if line >= modal.scroll + viewport.max(1) {
                modal.scroll = line + 1 - viewport.max(1);
            }
        }
    }
    if modal.focus == ModalFocus::ParentEpic {
        modal.scroll = 0;
    }
    if modal.scroll > max && !(modal.scroll == 1 && max == 0 && modal.focus == ModalFocus::None) {
        modal.scroll = max;
    }
}
