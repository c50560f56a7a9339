//! Board mode: sparse positions, backlog and swimlane views, picker and editor state.

use std::ops::Range;

use thiserror::Error;
use tui_textarea::{CursorMove, TextArea};

use crate::issue::{Board, BoardIssueView, BoardViewMode, Status};

use super::lines::{Category, PanelModel, RowGroup};
use super::scroll::ScrollState;

/// Gap left between neighbouring positions.
pub const POSITION_GAP: i64 = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveDir {
    Up,
    Down,
    Top,
    Bottom,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PositionWrite {
    Set { issue_id: String, position: i64 },
    Swap { a: String, b: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum MoveError {
    #[error("no issue selected")]
    NoSelection,
    #[error("already at the top")]
    AtTop,
    #[error("already at the bottom")]
    AtBottom,
}

/// Smallest and largest position stored for a board, filtered rows included.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Extent {
    pub min: Option<i64>,
    pub max: Option<i64>,
}

impl Extent {
    pub fn from_positions(positions: &[(String, i64)]) -> Self {
        Self {
            min: positions.iter().map(|(_, p)| *p).min(),
            max: positions.iter().map(|(_, p)| *p).max(),
        }
    }

    fn widen(self, rows: &[BoardIssueView]) -> Self {
        let positioned = rows.iter().filter(|r| r.has_position).map(|r| r.position);
        let (mut min, mut max) = (self.min, self.max);
        for p in positioned {
            min = Some(min.map_or(p, |m| m.min(p)));
            max = Some(max.map_or(p, |m| m.max(p)));
        }
        Self { min, max }
    }

    /// First key past everything stored.
    fn after(self) -> i64 {
        self.max.map_or(POSITION_GAP, |m| m + POSITION_GAP)
    }
}

/// Positioned rows by ascending position, then unpositioned rows in store order.
pub fn sort_board_issues(mut views: Vec<BoardIssueView>) -> Vec<BoardIssueView> {
    views.sort_by_key(|v| (!v.has_position, if v.has_position { v.position } else { 0 }));
    views
}

/// Backlog rows regrouped by lane; order within a lane is preserved.
pub fn swimlane_rows(sorted: &[BoardIssueView]) -> Vec<BoardIssueView> {
    let mut rows = sorted.to_vec();
    rows.sort_by_key(|v| Category::lane(&v.issue));
    rows
}

/// Index range of the lane containing `index`.
pub fn lane_bounds(rows: &[BoardIssueView], index: usize) -> Range<usize> {
    let Some(row) = rows.get(index) else {
        return 0..0;
    };
    let lane = Category::lane(&row.issue);
    let start = rows[..index]
        .iter()
        .rposition(|r| Category::lane(&r.issue) != lane)
        .map(|i| i + 1)
        .unwrap_or(0);
    let end = rows[index..]
        .iter()
        .position(|r| Category::lane(&r.issue) != lane)
        .map(|i| index + i)
        .unwrap_or(rows.len());
    start..end
}

/// Writes that move `rows[cursor]` one step or to an end of `bounds`.
///
/// Every move is at most two writes: keys are assigned on demand and never
/// renumbered.
pub fn plan_move(
    rows: &[BoardIssueView],
    cursor: usize,
    dir: MoveDir,
    bounds: Range<usize>,
    extent: Extent,
) -> Result<Vec<PositionWrite>, MoveError> {
    if cursor >= rows.len() || !bounds.contains(&cursor) {
        return Err(MoveError::NoSelection);
    }
    let extent = extent.widen(rows);
    let set = |position| PositionWrite::Set {
        issue_id: rows[cursor].issue.id.clone(),
        position,
    };
    match dir {
        MoveDir::Up => {
            if cursor == bounds.start {
                return Err(MoveError::AtTop);
            }
            Ok(step(rows, cursor, cursor - 1, extent))
        }
        MoveDir::Down => {
            if cursor + 1 >= bounds.end {
                return Err(MoveError::AtBottom);
            }
            Ok(step(rows, cursor, cursor + 1, extent))
        }
        MoveDir::Top => {
            if cursor == bounds.start {
                return Err(MoveError::AtTop);
            }
            Ok(vec![set(extent.min.map_or(POSITION_GAP, |m| m - POSITION_GAP))])
        }
        MoveDir::Bottom => {
            if cursor + 1 >= bounds.end {
                return Err(MoveError::AtBottom);
            }
            Ok(vec![set(extent.after())])
        }
    }
}

/// Exchange the order of the adjacent rows `cur` and `tgt`.
fn step(rows: &[BoardIssueView], cur: usize, tgt: usize, extent: Extent) -> Vec<PositionWrite> {
    let (c, t) = (&rows[cur], &rows[tgt]);
    let set = |v: &BoardIssueView, position| PositionWrite::Set {
        issue_id: v.issue.id.clone(),
        position,
    };
    let after = extent.after();
    match (c.has_position, t.has_position) {
        (true, true) => vec![PositionWrite::Swap {
            a: c.issue.id.clone(),
            b: t.issue.id.clone(),
        }],
        // Positioned rows sort first: the unpositioned row takes the other's
        // key and the positioned one goes past every stored key.
        (true, false) => vec![set(t, c.position), set(c, after)],
        (false, true) => vec![set(c, t.position), set(t, after)],
        // Both keyed after the stored range, in their new order.
        (false, false) => {
            let (first, second) = if cur < tgt { (t, c) } else { (c, t) };
            vec![set(first, after), set(second, after + POSITION_GAP)]
        }
    }
}

/// Status presets cycled with `s`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StatusFilter {
    #[default]
    All,
    Open,
    InProgress,
    InReview,
    Blocked,
}

impl StatusFilter {
    pub fn next(self) -> Self {
        match self {
            StatusFilter::All => StatusFilter::Open,
            StatusFilter::Open => StatusFilter::InProgress,
            StatusFilter::InProgress => StatusFilter::InReview,
            StatusFilter::InReview => StatusFilter::Blocked,
            StatusFilter::Blocked => StatusFilter::All,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            StatusFilter::All => "all",
            StatusFilter::Open => "open",
            StatusFilter::InProgress => "in progress",
            StatusFilter::InReview => "in review",
            StatusFilter::Blocked => "blocked",
        }
    }

    /// Statuses to fetch; empty means every status.
    pub fn statuses(self, include_closed: bool) -> Vec<Status> {
        match self {
            StatusFilter::All if include_closed => Vec::new(),
            StatusFilter::All => Status::ALL.into_iter().filter(|s| *s != Status::Closed).collect(),
            StatusFilter::Open => vec![Status::Open],
            StatusFilter::InProgress => vec![Status::InProgress],
            StatusFilter::InReview => vec![Status::InReview],
            StatusFilter::Blocked => vec![Status::Blocked],
        }
    }
}

#[derive(Debug, Clone)]
pub struct BoardMode {
    pub board: Board,
    /// Backlog order.
    pub rows: Vec<BoardIssueView>,
    pub lanes: Vec<BoardIssueView>,
    pub backlog: ScrollState,
    pub swimlane: ScrollState,
    pub status_filter: StatusFilter,
    pub pending_selection: Option<String>,
    pub extent: Extent,
    pub loaded: bool,
}

impl BoardMode {
    pub fn new(board: Board) -> Self {
        Self {
            board,
            rows: Vec::new(),
            lanes: Vec::new(),
            backlog: ScrollState::default(),
            swimlane: ScrollState::default(),
            status_filter: StatusFilter::All,
            pending_selection: None,
            extent: Extent::default(),
            loaded: false,
        }
    }

    pub fn view_mode(&self) -> BoardViewMode {
        self.board.view_mode
    }

    /// Replace the rows; returns true when a pending selection moved the cursor.
    pub fn set_issues(&mut self, views: Vec<BoardIssueView>, positions: &[(String, i64)]) -> bool {
        self.rows = sort_board_issues(views);
        self.lanes = swimlane_rows(&self.rows);
        self.extent = Extent::from_positions(positions);
        self.loaded = true;

        let found = self
            .pending_selection
            .take()
            .and_then(|id| self.current_rows().iter().position(|r| r.issue.id == id));
        if let Some(i) = found {
            let scroll = self.scroll_mut();
            scroll.cursor = i;
            scroll.independent = false;
        }
        for (state, len) in [
            (&mut self.backlog, self.rows.len()),
            (&mut self.swimlane, self.lanes.len()),
        ] {
            state.cursor = state.cursor.min(len.saturating_sub(1));
        }
        found.is_some()
    }

    pub fn current_rows(&self) -> &[BoardIssueView] {
        match self.board.view_mode {
            BoardViewMode::Backlog => &self.rows,
            BoardViewMode::Swimlanes => &self.lanes,
        }
    }

    pub fn scroll(&self) -> &ScrollState {
        match self.board.view_mode {
            BoardViewMode::Backlog => &self.backlog,
            BoardViewMode::Swimlanes => &self.swimlane,
        }
    }

    pub fn scroll_mut(&mut self) -> &mut ScrollState {
        match self.board.view_mode {
            BoardViewMode::Backlog => &mut self.backlog,
            BoardViewMode::Swimlanes => &mut self.swimlane,
        }
    }

    pub fn model(&self) -> PanelModel {
        match self.board.view_mode {
            BoardViewMode::Backlog => PanelModel::flat(self.rows.len()),
            BoardViewMode::Swimlanes => PanelModel::grouped(
                self.lanes
                    .iter()
                    .map(|v| RowGroup::Category(Category::lane(&v.issue)))
                    .collect(),
            ),
        }
    }

    pub fn selected(&self) -> Option<&BoardIssueView> {
        self.current_rows().get(self.scroll().cursor)
    }

    /// Toggle backlog/swimlanes, keeping the selected issue selected.
    pub fn toggle_view(&mut self) {
        let selected = self.selected().map(|v| v.issue.id.clone());
        self.board.view_mode = self.board.view_mode.toggled();
        if let Some(id) = selected {
            if let Some(i) = self.current_rows().iter().position(|r| r.issue.id == id) {
                self.scroll_mut().cursor = i;
            }
        }
    }

    /// Plan a move of the selected row and remember it for re-selection.
    pub fn prepare_move(&mut self, dir: MoveDir) -> Result<Vec<PositionWrite>, MoveError> {
        let rows = self.current_rows();
        let cursor = self.scroll().cursor;
        let bounds = match self.board.view_mode {
            BoardViewMode::Backlog => 0..rows.len(),
            BoardViewMode::Swimlanes => lane_bounds(rows, cursor),
        };
        let writes = plan_move(rows, cursor, dir, bounds, self.extent)?;
        let moved = rows.get(cursor).map(|r| r.issue.id.clone());
        self.pending_selection = moved;
        Ok(writes)
    }

    /// Esc in board mode: true when a filter was cleared instead of leaving.
    pub fn clear_filters(&mut self) -> bool {
        if self.status_filter != StatusFilter::All {
            self.status_filter = StatusFilter::All;
            true
        } else {
            false
        }
    }

    pub fn title(&self) -> String {
        let view = match self.board.view_mode {
            BoardViewMode::Backlog => "backlog",
            BoardViewMode::Swimlanes => "swimlanes",
        };
        let mut title = format!("Board: {} [{}]", self.board.name, view);
        if self.status_filter != StatusFilter::All {
            title.push_str(&format!(" status:{}", self.status_filter.label()));
        }
        title
    }
}

#[derive(Debug, Clone, Default)]
pub struct BoardPicker {
    pub boards: Vec<Board>,
    pub cursor: usize,
    pub loading: bool,
}

impl BoardPicker {
    pub fn set_boards(&mut self, boards: Vec<Board>) {
        self.boards = boards;
        self.cursor = self.cursor.min(self.boards.len().saturating_sub(1));
        self.loading = false;
    }

    pub fn move_by(&mut self, delta: isize) {
        if self.boards.is_empty() {
            return;
        }
        let max = self.boards.len() as isize - 1;
        self.cursor = (self.cursor as isize + delta).clamp(0, max) as usize;
    }

    pub fn selected(&self) -> Option<&Board> {
        self.boards.get(self.cursor)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditorField {
    Name,
    Query,
}

/// Live match count for the query being typed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryPreview {
    Pending,
    Matches(usize),
    Error(String),
}

#[derive(Debug, Clone)]
pub struct BoardEditor {
    /// `None` when creating.
    pub original: Option<Board>,
    pub name: TextArea<'static>,
    pub query: TextArea<'static>,
    pub focus: EditorField,
    pub preview: Option<QueryPreview>,
    /// Bumped on every query edit; stale previews are dropped.
    pub preview_token: u64,
}

fn single_line(text: &str) -> TextArea<'static> {
    let mut ta = TextArea::from([text.to_string()]);
    ta.move_cursor(CursorMove::End);
    ta
}

impl BoardEditor {
    pub fn create() -> Self {
        Self {
            original: None,
            name: single_line(""),
            query: single_line(""),
            focus: EditorField::Name,
            preview: None,
            preview_token: 0,
        }
    }

    pub fn edit(board: &Board) -> Self {
        Self {
            original: Some(board.clone()),
            name: single_line(&board.name),
            query: single_line(&board.query),
            focus: EditorField::Name,
            preview: None,
            preview_token: 0,
        }
    }

    pub fn name_text(&self) -> String {
        self.name.lines().join(" ")
    }

    pub fn query_text(&self) -> String {
        self.query.lines().join(" ")
    }

    pub fn toggle_focus(&mut self) {
        self.focus = match self.focus {
            EditorField::Name => EditorField::Query,
            EditorField::Query => EditorField::Name,
        };
    }

    pub fn focused_mut(&mut self) -> &mut TextArea<'static> {
        match self.focus {
            EditorField::Name => &mut self.name,
            EditorField::Query => &mut self.query,
        }
    }

    pub fn bump_preview(&mut self) -> u64 {
        self.preview_token += 1;
        self.preview = Some(QueryPreview::Pending);
        self.preview_token
    }

    /// The board to save, or a message when the name is missing.
    pub fn to_board(&self) -> Result<Board, String> {
        let name = self.name_text().trim().to_string();
        if name.is_empty() {
            return Err("Board name is required".to_string());
        }
        let mut board = self.original.clone().unwrap_or(Board {
            id: String::new(),
            name: String::new(),
            query: String::new(),
            view_mode: BoardViewMode::Backlog,
            is_builtin: false,
            last_viewed_at: None,
        });
        board.name = name;
        board.query = self.query_text().trim().to_string();
        Ok(board)
    }
}
