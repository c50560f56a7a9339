//! View state, messages and effects.
//!
//! `App` owns every piece of mutable view state. Input and effect results
//! arrive as [`Msg`] values, `update::update` mutates the app and returns an
//! optional [`Effect`] that the runtime executes off the UI thread.

use std::time::{Duration, Instant};

use ratatui::crossterm::event::{KeyEvent, MouseEvent};
use ratatui::layout::Rect;
use tui_textarea::{CursorMove, TextArea};

use crate::config::{normalize_ratios, Config, ConfigFile, FilterPrefs};
use crate::issue::{ActivityEntry, Board, BoardIssueView, Handoff, Issue, IssueDetails, Status};

use super::autofill::AutofillSources;
use super::board::{BoardEditor, BoardMode, BoardPicker, PositionWrite};
use super::drag::DragState;
use super::form::{FieldId, FormState, FormSubmission};
use super::keymap::{Context, Key, Registry};
use super::layout::{self, Panel, PanelBounds};
use super::lines::{Category, PanelModel, RowGroup};
use super::modal::{ModalFocus, ModalStack};
use super::scroll::{self, ScrollState};

/// Transient status lifetime.
pub const STATUS_TTL: Duration = Duration::from_secs(2);
/// Two clicks on the same row within this window open it.
pub const DOUBLE_CLICK: Duration = Duration::from_millis(400);
/// Delay before the board editor previews a query.
pub const PREVIEW_DELAY: Duration = Duration::from_millis(300);
pub const ACTIVITY_LIMIT: usize = 200;
pub const HANDOFF_LIMIT: usize = 50;

/// Everything the Current Work, Task List and Activity panels show.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    /// The request this answers.
    pub request: DataRequest,
    pub focused: Option<Issue>,
    pub in_progress: Vec<Issue>,
    /// `None` when the search query failed to parse; the old rows stay.
    pub tasks: Option<Vec<Issue>>,
    pub query_error: Option<String>,
    pub activity: Vec<ActivityEntry>,
    pub status_counts: Vec<(Status, usize)>,
    pub total: usize,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DataRequest {
    /// Increases with every request; results for older ones are dropped.
    pub seq: u64,
    pub query: String,
    pub include_closed: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IssueAction {
    Review,
    Approve,
    Reopen,
}

#[derive(Debug)]
pub enum Msg {
    Key(KeyEvent),
    Mouse(MouseEvent),
    Resize(u16, u16),
    /// Periodic refresh.
    Tick,
    DataLoaded(Box<Snapshot>),
    DataFailed(String),
    DetailsLoaded(Box<IssueDetails>),
    DetailsFailed { issue_id: String, error: String },
    BoardsLoaded(Vec<Board>),
    BoardIssuesLoaded {
        board_id: String,
        issues: Vec<BoardIssueView>,
        positions: Vec<(String, i64)>,
    },
    HandoffsLoaded(Vec<Handoff>),
    AutofillLoaded(AutofillSources),
    EditFormReady { issue: Box<Issue>, dependencies: Vec<String> },
    /// Status line text with nothing to refresh.
    Notice(String),
    ActionDone(String),
    ActionFailed(String),
    IssueSaved { issue_id: String, message: String },
    FormSaveFailed(String),
    BoardSaved { board: Board, quiet: bool },
    BoardDeleted(String),
    EditorFinished { field: FieldId, result: Result<String, String> },
    QueryPreviewTick { token: u64 },
    QueryPreviewLoaded { token: u64, query: String, result: Result<usize, String> },
    SyncFinished(Result<String, String>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    FetchData(DataRequest),
    FetchDetails(String),
    FetchBoards,
    FetchBoardIssues { board_id: String, statuses: Vec<Status> },
    FetchHandoffs,
    FetchAutofillSources,
    FetchEditForm(String),
    IssueAction { issue_id: String, action: IssueAction },
    CloseIssue { issue_id: String, reason: String },
    DeleteIssue(String),
    SaveIssue(Box<FormSubmission>),
    ApplyBoardMoves { board_id: String, writes: Vec<PositionWrite> },
    SaveBoard { board: Board, quiet: bool },
    DeleteBoard(String),
    PersistConfig(ConfigFile),
    /// Runs on the UI thread with the terminal released.
    OpenEditor { field: FieldId, text: String },
    CopyToClipboard(String),
    /// Debounced: a newer schedule cancels the pending one.
    ScheduleQueryPreview { token: u64, delay: Duration },
    PreviewQuery { token: u64, query: String },
    RunSync(String),
    Batch(Vec<Effect>),
}

impl Effect {
    /// Combine optional effects; `None` when nothing is left.
    pub fn batch(effects: impl IntoIterator<Item = Option<Effect>>) -> Option<Effect> {
        let mut out: Vec<Effect> = effects.into_iter().flatten().collect();
        match out.len() {
            0 => None,
            1 => out.pop(),
            _ => Some(Effect::Batch(out)),
        }
    }

    /// Flatten nested batches into execution order.
    pub fn flatten(self) -> Vec<Effect> {
        match self {
            Effect::Batch(items) => items.into_iter().flat_map(Effect::flatten).collect(),
            other => vec![other],
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConfirmKind {
    DeleteIssue { issue_id: String, title: String },
    DeleteBoard { board_id: String, name: String },
}

#[derive(Debug, Clone)]
pub struct CloseDialog {
    pub issue_id: String,
    pub title: String,
    pub reason: TextArea<'static>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListKind {
    Handoffs,
    Stats,
    TdqHelp,
}

#[derive(Debug, Clone)]
pub struct ListOverlay {
    pub kind: ListKind,
    pub scroll: usize,
    pub handoffs: Vec<Handoff>,
    pub loading: bool,
    /// Board editor hidden while query help is up.
    pub return_to: Option<BoardEditor>,
}

impl ListOverlay {
    pub fn new(kind: ListKind) -> Self {
        Self {
            kind,
            scroll: 0,
            handoffs: Vec::new(),
            loading: false,
            return_to: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HelpOverlay {
    /// Context whose bindings are listed.
    pub context: Context,
    pub scroll: usize,
}

#[derive(Debug, Clone)]
pub struct SearchBar {
    pub active: bool,
    pub input: TextArea<'static>,
}

impl SearchBar {
    pub fn text(&self) -> String {
        self.input.lines().join(" ")
    }

    pub fn set_text(&mut self, text: &str) {
        self.input = TextArea::from([text.to_string()]);
        self.input.move_cursor(CursorMove::End);
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusMessage {
    pub text: String,
    pub at: Instant,
    pub error: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Click {
    pub at: Instant,
    pub panel: Panel,
    pub row: usize,
}

/// Startup options from the command line.
#[derive(Debug, Clone)]
pub struct AppOptions {
    pub session: String,
    pub embedded: bool,
    pub refresh: Duration,
}

pub struct App {
    pub config: Config,
    pub config_file: ConfigFile,
    pub session: String,
    pub embedded: bool,
    pub refresh: Duration,
    pub registry: Registry,
    pub should_quit: bool,

    pub focused: Option<Issue>,
    pub in_progress: Vec<Issue>,
    /// Task List rows in category order.
    pub tasks: Vec<Issue>,
    pub activity: Vec<ActivityEntry>,
    pub status_counts: Vec<(Status, usize)>,
    pub total_issues: usize,
    pub query_error: Option<String>,
    pub loaded: bool,
    /// Last data request sent and the newest one applied.
    pub data_seq: u64,
    pub data_applied: u64,

    pub active_panel: Panel,
    pub scroll: [ScrollState; 3],
    pub pane_ratios: [f64; 3],
    pub area: Rect,
    pub drag: Option<DragState>,
    pub last_click: Option<Click>,
    pub pending_keys: Vec<Key>,

    pub search: SearchBar,
    pub filter: FilterPrefs,

    pub modals: ModalStack,
    pub help: Option<HelpOverlay>,
    pub confirm: Option<ConfirmKind>,
    pub close_confirm: Option<CloseDialog>,
    pub form: Option<FormState>,
    pub form_saving: bool,
    pub board_picker: Option<BoardPicker>,
    pub board_editor: Option<BoardEditor>,
    pub list_overlay: Option<ListOverlay>,
    pub getting_started: bool,
    pub getting_started_seen: bool,
    pub sync_prompt: bool,
    pub board: Option<BoardMode>,

    pub status: Option<StatusMessage>,
}

impl App {
    pub fn new(config: Config, config_file: ConfigFile, options: AppOptions) -> Self {
        let pane_ratios = normalize_ratios(config_file.pane_heights);
        let filter = config_file.filter.clone();
        let mut search = SearchBar {
            active: false,
            input: TextArea::default(),
        };
        search.set_text(&filter.search_query);
        let sync_prompt = config_file.sync_command.is_some();
        Self {
            config,
            config_file,
            session: options.session,
            embedded: options.embedded,
            refresh: options.refresh,
            registry: Registry::new(),
            should_quit: false,
            focused: None,
            in_progress: Vec::new(),
            tasks: Vec::new(),
            activity: Vec::new(),
            status_counts: Vec::new(),
            total_issues: 0,
            query_error: None,
            loaded: false,
            data_seq: 0,
            data_applied: 0,
            active_panel: Panel::TaskList,
            scroll: [ScrollState::default(); 3],
            pane_ratios,
            area: Rect::new(0, 0, 80, 24),
            drag: None,
            last_click: None,
            pending_keys: Vec::new(),
            search,
            filter,
            modals: ModalStack::default(),
            help: None,
            confirm: None,
            close_confirm: None,
            form: None,
            form_saving: false,
            board_picker: None,
            board_editor: None,
            list_overlay: None,
            getting_started: false,
            getting_started_seen: false,
            sync_prompt,
            board: None,
            status: None,
        }
    }

    /// Effects to run once at startup.
    pub fn init(&mut self) -> Option<Effect> {
        Some(self.fetch_data())
    }

    /// The handler table for the next key, by overlay precedence.
    pub fn context(&self) -> Context {
        if self.sync_prompt {
            Context::SyncPrompt
        } else if self.getting_started {
            Context::GettingStarted
        } else if self.help.is_some() {
            Context::Help
        } else if self.close_confirm.is_some() {
            Context::CloseConfirm
        } else if self.confirm.is_some() {
            Context::Confirm
        } else if self.board_editor.is_some() {
            Context::BoardEditor
        } else if self.board_picker.is_some() {
            Context::BoardPicker
        } else if self.form.is_some() {
            Context::Form
        } else if let Some(list) = &self.list_overlay {
            match list.kind {
                ListKind::Handoffs => Context::Handoffs,
                ListKind::Stats => Context::Stats,
                ListKind::TdqHelp => Context::TdqHelp,
            }
        } else if self.search.active {
            Context::Search
        } else if let Some(modal) = self.modals.top() {
            match modal.focus {
                ModalFocus::None => Context::Modal,
                ModalFocus::ParentEpic => Context::ParentEpicFocused,
                ModalFocus::EpicTasks => Context::EpicTasks,
                ModalFocus::BlockedBy => Context::BlockedByFocused,
                ModalFocus::Blocks => Context::BlocksFocused,
            }
        } else if self.board.is_some() {
            Context::Board
        } else {
            Context::Main
        }
    }

    pub fn flash(&mut self, text: impl Into<String>) {
        self.status = Some(StatusMessage {
            text: text.into(),
            at: Instant::now(),
            error: false,
        });
    }

    pub fn flash_error(&mut self, text: impl Into<String>) {
        let text = text.into();
        tracing::warn!(error = %text, "action failed");
        self.status = Some(StatusMessage {
            text,
            at: Instant::now(),
            error: true,
        });
    }

    pub fn clear_old_status(&mut self) {
        if let Some(status) = &self.status {
            if status.at.elapsed() >= STATUS_TTL {
                self.status = None;
            }
        }
    }

    pub fn search_visible(&self) -> bool {
        self.search.active || !self.filter.search_query.is_empty()
    }

    pub fn bounds(&self) -> PanelBounds {
        layout::compute(self.area, self.pane_ratios, self.embedded, self.search_visible())
    }

    pub fn panel_height(&self, panel: Panel) -> u16 {
        self.bounds().panel(panel).height
    }

    /// Focused issue first, then the in-progress list without it.
    pub fn current_work_rows(&self) -> Vec<&Issue> {
        let focused_id = self.focused.as_ref().map(|f| f.id.as_str());
        self.focused
            .iter()
            .chain(self.in_progress.iter().filter(|i| Some(i.id.as_str()) != focused_id))
            .collect()
    }

    pub fn panel_model(&self, panel: Panel) -> PanelModel {
        match panel {
            Panel::CurrentWork => {
                let mut groups = Vec::new();
                if self.focused.is_some() {
                    groups.push(RowGroup::Focused);
                }
                let rest = self.current_work_rows().len() - groups.len();
                groups.extend(std::iter::repeat(RowGroup::InProgressSection).take(rest));
                PanelModel::grouped(groups)
            }
            Panel::TaskList => match &self.board {
                Some(board) => board.model(),
                None => PanelModel::grouped(
                    self.tasks
                        .iter()
                        .map(|i| RowGroup::Category(Category::lane(i)))
                        .collect(),
                ),
            },
            Panel::Activity => PanelModel::table(self.activity.len()),
        }
    }

    pub fn models(&self) -> [PanelModel; 3] {
        Panel::ALL.map(|p| self.panel_model(p))
    }

    pub fn scroll_state(&self, panel: Panel) -> &ScrollState {
        match (&self.board, panel) {
            (Some(board), Panel::TaskList) => board.scroll(),
            _ => &self.scroll[panel.index()],
        }
    }

    pub fn scroll_mut(&mut self, panel: Panel) -> &mut ScrollState {
        match (&mut self.board, panel) {
            (Some(board), Panel::TaskList) => board.scroll_mut(),
            _ => &mut self.scroll[panel.index()],
        }
    }

    pub fn offsets(&self) -> [usize; 3] {
        Panel::ALL.map(|p| self.scroll_state(p).offset)
    }

    /// Issue ids of a panel's rows, in row order.
    pub fn panel_ids(&self, panel: Panel) -> Vec<Option<String>> {
        match panel {
            Panel::CurrentWork => self.current_work_rows().iter().map(|i| Some(i.id.clone())).collect(),
            Panel::TaskList => match &self.board {
                Some(board) => board.current_rows().iter().map(|v| Some(v.issue.id.clone())).collect(),
                None => self.tasks.iter().map(|i| Some(i.id.clone())).collect(),
            },
            Panel::Activity => self.activity.iter().map(|a| a.issue_id.clone()).collect(),
        }
    }

    pub fn selected_id(&self, panel: Panel) -> Option<String> {
        let cursor = self.scroll_state(panel).cursor;
        self.panel_ids(panel).into_iter().nth(cursor).flatten()
    }

    /// The issue an action applies to: the open modal, else the active panel's row.
    pub fn target_id(&self) -> Option<String> {
        match self.modals.top() {
            Some(m) => Some(m.issue_id.clone()),
            None => self.selected_id(self.active_panel),
        }
    }

    pub fn find_issue(&self, id: &str) -> Option<&Issue> {
        if let Some(m) = self.modals.top() {
            if let Some(d) = m.details.as_ref().filter(|d| d.issue.id == id) {
                return Some(&d.issue);
            }
        }
        self.focused
            .iter()
            .chain(self.in_progress.iter())
            .chain(self.tasks.iter())
            .chain(self.board.iter().flat_map(|b| b.rows.iter().map(|v| &v.issue)))
            .find(|i| i.id == id)
    }

    pub fn fetch_data(&mut self) -> Effect {
        self.data_seq += 1;
        Effect::FetchData(DataRequest {
            seq: self.data_seq,
            query: self.filter.search_query.clone(),
            include_closed: self.filter.include_closed,
        })
    }

    /// A snapshot answers an older request than the one on screen, or a
    /// filter that is no longer current.
    pub fn is_stale(&self, request: &DataRequest) -> bool {
        request.seq <= self.data_applied
            || request.query != self.filter.search_query
            || request.include_closed != self.filter.include_closed
    }

    pub fn fetch_board_issues(&self) -> Option<Effect> {
        self.board.as_ref().map(|b| Effect::FetchBoardIssues {
            board_id: b.board.id.clone(),
            statuses: b.status_filter.statuses(self.filter.include_closed),
        })
    }

    /// Data, board rows and every open modal.
    pub fn refresh_all(&mut self) -> Option<Effect> {
        let mut effects = vec![Some(self.fetch_data()), self.fetch_board_issues()];
        let mut ids = self.modals.ids();
        ids.dedup();
        effects.extend(ids.into_iter().map(|id| Some(Effect::FetchDetails(id))));
        Effect::batch(effects)
    }

    /// Config file contents reflecting the current view.
    pub fn config_snapshot(&self) -> ConfigFile {
        ConfigFile {
            pane_heights: self.pane_ratios,
            filter: self.filter.clone(),
            sync_command: self.config_file.sync_command.clone(),
        }
    }

    /// Re-run cursor/offset coherence for every panel after data or geometry changed.
    pub fn refresh_scroll(&mut self) {
        for panel in Panel::ALL {
            let model = self.panel_model(panel);
            let height = self.panel_height(panel);
            scroll::refresh(self.scroll_mut(panel), &model, height);
        }
    }

    pub fn ensure_visible(&mut self, panel: Panel) {
        let model = self.panel_model(panel);
        let height = self.panel_height(panel);
        scroll::ensure_visible(self.scroll_mut(panel), &model, height);
    }

    /// Install fresh panel data, keeping each panel's selected issue selected.
    pub fn apply_snapshot(&mut self, snapshot: Snapshot) {
        let keep: Vec<Option<String>> = Panel::ALL.iter().map(|p| self.selected_id(*p)).collect();

        self.data_applied = self.data_applied.max(snapshot.request.seq);
        self.focused = snapshot.focused;
        self.in_progress = snapshot.in_progress;
        if let Some(mut tasks) = snapshot.tasks {
            tasks.sort_by_key(Category::lane);
            self.tasks = tasks;
        }
        self.query_error = snapshot.query_error;
        self.activity = snapshot.activity;
        self.status_counts = snapshot.status_counts;
        self.total_issues = snapshot.total;

        if !self.loaded {
            self.loaded = true;
            if snapshot.total == 0 && !self.getting_started_seen {
                self.getting_started = true;
            }
        }

        for (panel, id) in Panel::ALL.into_iter().zip(keep) {
            if panel == Panel::TaskList && self.board.is_some() {
                continue;
            }
            let Some(id) = id else { continue };
            if let Some(i) = self.panel_ids(panel).iter().position(|x| x.as_deref() == Some(id.as_str())) {
                self.scroll_mut(panel).cursor = i;
            }
        }
        self.refresh_scroll();
    }

    pub fn status_count(&self, status: Status) -> usize {
        self.status_counts
            .iter()
            .find(|(s, _)| *s == status)
            .map(|(_, n)| *n)
            .unwrap_or(0)
    }
}

/// Inner size of the detail modal for a terminal `area`.
pub fn modal_viewport(area: Rect) -> (u16, usize) {
    let rect = layout::centered_rect(80, 80, area);
    // Borders plus the footer hint line.
    (rect.width.saturating_sub(2), rect.height.saturating_sub(3) as usize)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn app() -> App {
        let config = Config::new(PathBuf::from("/tmp/tdmon-test"), PathBuf::from("/tmp/tdmon-test/db"));
        App::new(
            config,
            ConfigFile::default(),
            AppOptions {
                session: "ses_test".into(),
                embedded: false,
                refresh: Duration::from_secs(2),
            },
        )
    }

    #[test]
    fn context_precedence_follows_overlay_stack() {
        let mut a = app();
        assert_eq!(a.context(), Context::Main);
        a.modals.push(super::super::modal::Modal::new("td-1", vec![], None));
        assert_eq!(a.context(), Context::Modal);
        a.search.active = true;
        assert_eq!(a.context(), Context::Search);
        a.list_overlay = Some(ListOverlay::new(ListKind::Stats));
        assert_eq!(a.context(), Context::Stats);
        a.form = Some(FormState::create(None));
        assert_eq!(a.context(), Context::Form);
        a.confirm = Some(ConfirmKind::DeleteIssue { issue_id: "td-1".into(), title: "x".into() });
        assert_eq!(a.context(), Context::Confirm);
        a.help = Some(HelpOverlay { context: Context::Confirm, scroll: 0 });
        assert_eq!(a.context(), Context::Help);
        a.sync_prompt = true;
        assert_eq!(a.context(), Context::SyncPrompt);
    }

    #[test]
    fn focused_issue_leads_current_work_without_duplicates() {
        let mut a = app();
        let mut focused = Issue::new("td-f", "focus");
        focused.status = Status::InProgress;
        a.apply_snapshot(Snapshot {
            focused: Some(focused.clone()),
            in_progress: vec![focused, Issue::new("td-2", "other")],
            tasks: Some(vec![]),
            total: 2,
            ..Snapshot::default()
        });
        let ids: Vec<_> = a.current_work_rows().iter().map(|i| i.id.clone()).collect();
        assert_eq!(ids, vec!["td-f", "td-2"]);
        assert_eq!(
            a.panel_model(Panel::CurrentWork).groups,
            vec![RowGroup::Focused, RowGroup::InProgressSection]
        );
    }

    #[test]
    fn empty_database_shows_getting_started_once() {
        let mut a = app();
        a.apply_snapshot(Snapshot::default());
        assert!(a.getting_started);
        a.getting_started = false;
        a.getting_started_seen = true;
        a.apply_snapshot(Snapshot::default());
        assert!(!a.getting_started);
    }

    #[test]
    fn refresh_keeps_the_selected_issue() {
        let mut a = app();
        let rows = |ids: &[&str]| ids.iter().map(|id| Issue::new(*id, *id)).collect::<Vec<_>>();
        a.apply_snapshot(Snapshot { tasks: Some(rows(&["td-a", "td-b", "td-c"])), total: 3, ..Snapshot::default() });
        a.scroll[Panel::TaskList.index()].cursor = 1;
        a.apply_snapshot(Snapshot { tasks: Some(rows(&["td-x", "td-a", "td-b"])), total: 3, ..Snapshot::default() });
        assert_eq!(a.selected_id(Panel::TaskList).as_deref(), Some("td-b"));
    }

    #[test]
    fn batch_collapses() {
        assert_eq!(Effect::batch([None, None]), None);
        assert_eq!(Effect::batch([Some(Effect::FetchBoards), None]), Some(Effect::FetchBoards));
        let nested = Effect::Batch(vec![Effect::FetchBoards, Effect::Batch(vec![Effect::FetchHandoffs])]);
        assert_eq!(nested.flatten(), vec![Effect::FetchBoards, Effect::FetchHandoffs]);
    }
}
