//! The line plan of a panel body.
//!
//! Rendering and hit-testing both walk the `PanelLine` sequence produced
//! here, so a click always lands on the row that was drawn under it.

use crate::issue::{Issue, Status};

/// Task List grouping. Declaration order is display order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Category {
    InProgress,
    Reviewable,
    NeedsRework,
    Ready,
    Blocked,
    Closed,
}

impl Category {
    pub fn label(self) -> &'static str {
        match self {
            Category::InProgress => "IN PROGRESS",
            Category::Reviewable => "REVIEWABLE",
            Category::NeedsRework => "NEEDS REWORK",
            Category::Ready => "READY",
            Category::Blocked => "BLOCKED",
            Category::Closed => "CLOSED",
        }
    }

    /// Task List category; in-progress issues belong to Current Work.
    pub fn of(issue: &Issue) -> Option<Category> {
        match issue.status {
            Status::InReview => Some(Category::Reviewable),
            Status::Open if issue.reviewer_session.is_some() => Some(Category::NeedsRework),
            Status::Open => Some(Category::Ready),
            Status::Blocked => Some(Category::Blocked),
            Status::Closed => Some(Category::Closed),
            Status::InProgress => None,
        }
    }

    /// Swimlane lane: like `of` but in-progress gets its own lane.
    pub fn lane(issue: &Issue) -> Category {
        Category::of(issue).unwrap_or(Category::InProgress)
    }
}

/// Which group a data row belongs to; a change of group emits a header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowGroup {
    /// No header (Activity, board backlog).
    Plain,
    /// The focused issue at the top of Current Work.
    Focused,
    /// In-progress rows under Current Work's section header.
    InProgressSection,
    Category(Category),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PanelLine {
    MoreAbove,
    MoreBelow,
    CategoryHeader(Category),
    SectionHeader,
    TableHeader,
    Separator,
    Row(usize),
}

impl PanelLine {
    pub fn row(&self) -> Option<usize> {
        match self {
            PanelLine::Row(i) => Some(*i),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    /// Current Work and Task List: optional ▲, group headers, rows, ▼.
    Grouped,
    /// Activity: a table header, rows, ▼. Never shows ▲.
    Table,
}

/// Row groups plus shape: everything the line plan needs about a panel.
#[derive(Debug, Clone, PartialEq)]
pub struct PanelModel {
    pub shape: Shape,
    pub groups: Vec<RowGroup>,
}

impl PanelModel {
    pub fn grouped(groups: Vec<RowGroup>) -> Self {
        Self {
            shape: Shape::Grouped,
            groups,
        }
    }

    pub fn flat(rows: usize) -> Self {
        Self::grouped(vec![RowGroup::Plain; rows])
    }

    pub fn table(rows: usize) -> Self {
        Self {
            shape: Shape::Table,
            groups: vec![RowGroup::Plain; rows],
        }
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// True when some row carries a header line.
    pub fn has_headers(&self) -> bool {
        self.groups.iter().any(|g| header_for(*g).is_some())
    }

    /// Header and separator lines emitted for rows `from..=to` when `from` is the first drawn row.
    pub fn header_lines_between(&self, from: usize, to: usize) -> usize {
        let mut prev: Option<RowGroup> = None;
        let mut emitted_header = false;
        let mut count = 0;
        for g in self.groups.iter().take(to + 1).skip(from) {
            if prev != Some(*g) {
                count += group_lines(*g, emitted_header);
                if header_for(*g).is_some() {
                    emitted_header = true;
                }
            }
            prev = Some(*g);
        }
        count
    }

    /// Lay out the panel body for `offset` within `room` content lines.
    pub fn plan(&self, offset: usize, room: usize) -> Vec<PanelLine> {
        let n = self.groups.len();
        let mut lines = Vec::with_capacity(room);
        if room == 0 {
            return lines;
        }
        if self.shape == Shape::Table {
            lines.push(PanelLine::TableHeader);
        }
        if n == 0 {
            return lines;
        }
        let offset = offset.min(n - 1);
        if self.shape == Shape::Grouped && offset > 0 {
            lines.push(PanelLine::MoreAbove);
        }

        let mut prev: Option<RowGroup> = None;
        let mut emitted_header = false;
        for i in offset..n {
            let g = self.groups[i];
            let mut pending: Vec<PanelLine> = Vec::new();
            if prev != Some(g) {
                if let Some(header) = header_for(g) {
                    if emitted_header && matches!(header, PanelLine::CategoryHeader(_)) {
                        pending.push(PanelLine::Separator);
                    }
                    pending.push(header);
                }
            }
            let more_after = usize::from(i + 1 < n);
            if lines.len() + pending.len() + 1 + more_after > room {
                if lines.len() < room {
                    lines.push(PanelLine::MoreBelow);
                }
                return lines;
            }
            if pending.iter().any(|l| !matches!(l, PanelLine::Separator)) {
                emitted_header = true;
            }
            lines.extend(pending);
            lines.push(PanelLine::Row(i));
            prev = Some(g);
        }
        lines
    }

    /// Index of the line showing `row`, if it is drawn.
    pub fn line_of_row(&self, offset: usize, room: usize, row: usize) -> Option<usize> {
        self.plan(offset, room)
            .iter()
            .position(|l| *l == PanelLine::Row(row))
    }
}

fn header_for(g: RowGroup) -> Option<PanelLine> {
    match g {
        RowGroup::Plain | RowGroup::Focused => None,
        RowGroup::InProgressSection => Some(PanelLine::SectionHeader),
        RowGroup::Category(c) => Some(PanelLine::CategoryHeader(c)),
    }
}

fn group_lines(g: RowGroup, after_header: bool) -> usize {
    match g {
        RowGroup::Plain | RowGroup::Focused => 0,
        RowGroup::InProgressSection => 1,
        RowGroup::Category(_) => 1 + usize::from(after_header),
    }
}
