//! Key bindings: (key sequence, context) -> command.

use ratatui::crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

/// Which handler table applies to the next key press.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Context {
    Main,
    Search,
    Modal,
    Help,
    Confirm,
    CloseConfirm,
    Form,
    BoardPicker,
    BoardEditor,
    Board,
    EpicTasks,
    ParentEpicFocused,
    BlockedByFocused,
    BlocksFocused,
    Handoffs,
    Stats,
    TdqHelp,
    GettingStarted,
    SyncPrompt,
}

impl Context {
    /// Context consulted when this one has no binding for a key.
    pub fn fallback(self) -> Option<Context> {
        match self {
            Context::Board => Some(Context::Main),
            Context::EpicTasks
            | Context::ParentEpicFocused
            | Context::BlockedByFocused
            | Context::BlocksFocused => Some(Context::Modal),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Context::Main => "Main",
            Context::Search => "Search",
            Context::Modal => "Issue details",
            Context::Help => "Help",
            Context::Confirm => "Confirm",
            Context::CloseConfirm => "Close issue",
            Context::Form => "Issue form",
            Context::BoardPicker => "Boards",
            Context::BoardEditor => "Board editor",
            Context::Board => "Board",
            Context::EpicTasks => "Epic tasks",
            Context::ParentEpicFocused => "Parent epic",
            Context::BlockedByFocused => "Blocked by",
            Context::BlocksFocused => "Blocks",
            Context::Handoffs => "Handoffs",
            Context::Stats => "Stats",
            Context::TdqHelp => "Query help",
            Context::GettingStarted => "Getting started",
            Context::SyncPrompt => "Sync",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    // Global
    Quit,
    ToggleHelp,
    Refresh,
    NextPanel,
    PrevPanel,
    FocusCurrentWork,
    FocusTaskList,
    FocusActivity,
    CloseOverlay,
    // Cursor and scroll
    CursorDown,
    CursorUp,
    CursorTop,
    CursorBottom,
    HalfPageDown,
    HalfPageUp,
    PageDown,
    PageUp,
    ScrollDown,
    ScrollUp,
    // Issue actions
    OpenDetails,
    MarkForReview,
    Approve,
    Delete,
    CloseIssue,
    Reopen,
    CopyId,
    ShowHandoffs,
    ShowStats,
    // Modal navigation
    ModalPrev,
    ModalNext,
    FocusNextSection,
    FocusPrevSection,
    SectionUnfocus,
    ModalSelect,
    ModalClose,
    // Search and filters
    SearchStart,
    SearchExit,
    SearchClear,
    SearchConfirm,
    CycleSort,
    CycleTypeFilter,
    ToggleClosed,
    // Forms
    NewIssue,
    EditIssue,
    FormSubmit,
    FormCancel,
    FormToggleExtended,
    FormOpenEditor,
    FormNextField,
    FormPrevField,
    // Boards
    OpenBoardPicker,
    SelectBoard,
    NewBoard,
    EditBoard,
    DeleteBoard,
    ExitBoard,
    CycleStatusFilter,
    MoveUp,
    MoveDown,
    MoveTop,
    MoveBottom,
    ToggleView,
    ShowTdqHelp,
    // Prompts
    Confirm,
    Cancel,
}

impl Command {
    pub fn id(self) -> &'static str {
        match self {
            Command::Quit => "quit",
            Command::ToggleHelp => "toggle-help",
            Command::Refresh => "refresh",
            Command::NextPanel => "next-panel",
            Command::PrevPanel => "prev-panel",
            Command::FocusCurrentWork => "focus-current-work",
            Command::FocusTaskList => "focus-task-list",
            Command::FocusActivity => "focus-activity",
            Command::CloseOverlay => "close-overlay",
            Command::CursorDown => "cursor-down",
            Command::CursorUp => "cursor-up",
            Command::CursorTop => "cursor-top",
            Command::CursorBottom => "cursor-bottom",
            Command::HalfPageDown => "half-page-down",
            Command::HalfPageUp => "half-page-up",
            Command::PageDown => "page-down",
            Command::PageUp => "page-up",
            Command::ScrollDown => "scroll-down",
            Command::ScrollUp => "scroll-up",
            Command::OpenDetails => "open-details",
            Command::MarkForReview => "mark-for-review",
            Command::Approve => "approve",
            Command::Delete => "delete",
            Command::CloseIssue => "close",
            Command::Reopen => "reopen",
            Command::CopyId => "copy",
            Command::ShowHandoffs => "show-handoffs",
            Command::ShowStats => "show-stats",
            Command::ModalPrev => "navigate-prev",
            Command::ModalNext => "navigate-next",
            Command::FocusNextSection => "focus-next-section",
            Command::FocusPrevSection => "focus-prev-section",
            Command::SectionUnfocus => "section-unfocus",
            Command::ModalSelect => "open-linked",
            Command::ModalClose => "close-modal",
            Command::SearchStart => "search-enter",
            Command::SearchExit => "search-exit",
            Command::SearchClear => "search-clear",
            Command::SearchConfirm => "search-confirm",
            Command::CycleSort => "cycle-sort",
            Command::CycleTypeFilter => "cycle-type-filter",
            Command::ToggleClosed => "toggle-closed",
            Command::NewIssue => "new",
            Command::EditIssue => "edit",
            Command::FormSubmit => "submit",
            Command::FormCancel => "cancel-form",
            Command::FormToggleExtended => "toggle-extended",
            Command::FormOpenEditor => "open-editor",
            Command::FormNextField => "next-field",
            Command::FormPrevField => "prev-field",
            Command::OpenBoardPicker => "board-picker",
            Command::SelectBoard => "select-board",
            Command::NewBoard => "new-board",
            Command::EditBoard => "edit-board",
            Command::DeleteBoard => "delete-board",
            Command::ExitBoard => "exit-board",
            Command::CycleStatusFilter => "cycle-status-filter",
            Command::MoveUp => "move-up",
            Command::MoveDown => "move-down",
            Command::MoveTop => "move-top",
            Command::MoveBottom => "move-bottom",
            Command::ToggleView => "toggle-view",
            Command::ShowTdqHelp => "tdq-help",
            Command::Confirm => "confirm",
            Command::Cancel => "cancel",
        }
    }

    /// Translate an action string returned by an overlay handler.
    pub fn from_action(action: &str) -> Option<Command> {
        ALL_COMMANDS.iter().copied().find(|c| c.id() == action)
    }
}

const ALL_COMMANDS: &[Command] = &[
    Command::Quit,
    Command::ToggleHelp,
    Command::Refresh,
    Command::NextPanel,
    Command::PrevPanel,
    Command::FocusCurrentWork,
    Command::FocusTaskList,
    Command::FocusActivity,
    Command::CloseOverlay,
    Command::CursorDown,
    Command::CursorUp,
    Command::CursorTop,
    Command::CursorBottom,
    Command::HalfPageDown,
    Command::HalfPageUp,
    Command::PageDown,
    Command::PageUp,
    Command::ScrollDown,
    Command::ScrollUp,
    Command::OpenDetails,
    Command::MarkForReview,
    Command::Approve,
    Command::Delete,
    Command::CloseIssue,
    Command::Reopen,
    Command::CopyId,
    Command::ShowHandoffs,
    Command::ShowStats,
    Command::ModalPrev,
    Command::ModalNext,
    Command::FocusNextSection,
    Command::FocusPrevSection,
    Command::SectionUnfocus,
    Command::ModalSelect,
    Command::ModalClose,
    Command::SearchStart,
    Command::SearchExit,
    Command::SearchClear,
    Command::SearchConfirm,
    Command::CycleSort,
    Command::CycleTypeFilter,
    Command::ToggleClosed,
    Command::NewIssue,
    Command::EditIssue,
    Command::FormSubmit,
    Command::FormCancel,
    Command::FormToggleExtended,
    Command::FormOpenEditor,
    Command::FormNextField,
    Command::FormPrevField,
    Command::OpenBoardPicker,
    Command::SelectBoard,
    Command::NewBoard,
    Command::EditBoard,
    Command::DeleteBoard,
    Command::ExitBoard,
    Command::CycleStatusFilter,
    Command::MoveUp,
    Command::MoveDown,
    Command::MoveTop,
    Command::MoveBottom,
    Command::ToggleView,
    Command::ShowTdqHelp,
    Command::Confirm,
    Command::Cancel,
];

/// A normalized key press. Shift is folded into the character for printable keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Key {
    pub code: KeyCode,
    pub mods: KeyModifiers,
}

impl Key {
    pub fn new(code: KeyCode, mods: KeyModifiers) -> Self {
        let mut mods = mods & (KeyModifiers::CONTROL | KeyModifiers::ALT | KeyModifiers::SHIFT);
        let code = match code {
            KeyCode::Char(c) => {
                mods.remove(KeyModifiers::SHIFT);
                if mods.contains(KeyModifiers::CONTROL) {
                    KeyCode::Char(c.to_ascii_lowercase())
                } else {
                    KeyCode::Char(c)
                }
            }
            KeyCode::BackTab => {
                mods.remove(KeyModifiers::SHIFT);
                KeyCode::BackTab
            }
            other => other,
        };
        Self { code, mods }
    }

    pub fn from_event(ev: &KeyEvent) -> Self {
        Self::new(ev.code, ev.modifiers)
    }

    /// Parse tokens like `j`, `G`, `ctrl+d`, `shift+tab`, `enter`, `pgdn`.
    pub fn parse(token: &str) -> Option<Self> {
        let mut mods = KeyModifiers::NONE;
        let mut rest = token;
        loop {
            let lower = rest.to_ascii_lowercase();
            if let Some(r) = lower.strip_prefix("ctrl+") {
                mods |= KeyModifiers::CONTROL;
                rest = &rest[rest.len() - r.len()..];
            } else if let Some(r) = lower.strip_prefix("alt+") {
                mods |= KeyModifiers::ALT;
                rest = &rest[rest.len() - r.len()..];
            } else if let Some(r) = lower.strip_prefix("shift+") {
                mods |= KeyModifiers::SHIFT;
                rest = &rest[rest.len() - r.len()..];
            } else {
                break;
            }
        }

        let code = match rest.to_ascii_lowercase().as_str() {
            "enter" => KeyCode::Enter,
            "esc" => KeyCode::Esc,
            "tab" if mods.contains(KeyModifiers::SHIFT) => KeyCode::BackTab,
            "tab" => KeyCode::Tab,
            "backtab" => KeyCode::BackTab,
            "up" => KeyCode::Up,
            "down" => KeyCode::Down,
            "left" => KeyCode::Left,
            "right" => KeyCode::Right,
            "home" => KeyCode::Home,
            "end" => KeyCode::End,
            "pgup" => KeyCode::PageUp,
            "pgdn" => KeyCode::PageDown,
            "backspace" => KeyCode::Backspace,
            "delete" => KeyCode::Delete,
            "space" => KeyCode::Char(' '),
            "f1" => KeyCode::F(1),
            _ => {
                let mut chars = rest.chars();
                let c = chars.next()?;
                if chars.next().is_some() {
                    return None;
                }
                KeyCode::Char(c)
            }
        };
        Some(Self::new(code, mods))
    }

    pub fn label(&self) -> String {
        let base = match self.code {
            KeyCode::Char(' ') => "space".to_string(),
            KeyCode::Char(c) => c.to_string(),
            KeyCode::Enter => "enter".to_string(),
            KeyCode::Esc => "esc".to_string(),
            KeyCode::Tab => "tab".to_string(),
            KeyCode::BackTab => "shift+tab".to_string(),
            KeyCode::Up => "↑".to_string(),
            KeyCode::Down => "↓".to_string(),
            KeyCode::Left => "←".to_string(),
            KeyCode::Right => "→".to_string(),
            KeyCode::Home => "home".to_string(),
            KeyCode::End => "end".to_string(),
            KeyCode::PageUp => "pgup".to_string(),
            KeyCode::PageDown => "pgdn".to_string(),
            KeyCode::F(n) => format!("F{}", n),
            other => format!("{:?}", other).to_lowercase(),
        };
        let mut out = String::new();
        if self.mods.contains(KeyModifiers::CONTROL) {
            out.push_str("ctrl+");
        }
        if self.mods.contains(KeyModifiers::ALT) {
            out.push_str("alt+");
        }
        out.push_str(&base);
        out
    }

    pub fn is_plain_char(&self) -> bool {
        matches!(self.code, KeyCode::Char(_))
            && !self.mods.intersects(KeyModifiers::CONTROL | KeyModifiers::ALT)
    }
}

#[derive(Debug, Clone)]
pub struct Binding {
    pub keys: Vec<Key>,
    pub context: Context,
    pub command: Command,
    pub description: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lookup {
    Command(Command),
    /// The keys so far start a longer sequence.
    Prefix,
    NoMatch,
}

#[derive(Debug, Clone)]
pub struct Registry {
    bindings: Vec<Binding>,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

// (keys, command, description); keys are space-separated sequences, `|` separates alternatives.
type Table = &'static [(&'static str, Command, &'static str)];

const MAIN: Table = &[
    ("q", Command::Quit, "quit"),
    ("?", Command::ToggleHelp, "toggle help"),
    ("ctrl+r", Command::Refresh, "refresh"),
    ("tab", Command::NextPanel, "next panel"),
    ("shift+tab", Command::PrevPanel, "previous panel"),
    ("1", Command::FocusCurrentWork, "focus current work"),
    ("2", Command::FocusTaskList, "focus task list"),
    ("3", Command::FocusActivity, "focus activity"),
    ("j|down", Command::CursorDown, "down"),
    ("k|up", Command::CursorUp, "up"),
    ("g g|home", Command::CursorTop, "top"),
    ("G|end", Command::CursorBottom, "bottom"),
    ("ctrl+d", Command::HalfPageDown, "half page down"),
    ("ctrl+u", Command::HalfPageUp, "half page up"),
    ("ctrl+f|pgdn", Command::PageDown, "page down"),
    ("ctrl+b|pgup", Command::PageUp, "page up"),
    ("ctrl+e", Command::ScrollDown, "scroll down"),
    ("ctrl+y", Command::ScrollUp, "scroll up"),
    ("enter", Command::OpenDetails, "open details"),
    ("m", Command::MarkForReview, "mark for review"),
    ("a", Command::Approve, "approve"),
    ("d", Command::Delete, "delete"),
    ("c", Command::CloseIssue, "close"),
    ("r", Command::Reopen, "reopen"),
    ("y", Command::CopyId, "copy id"),
    ("n", Command::NewIssue, "new issue"),
    ("e", Command::EditIssue, "edit issue"),
    ("/", Command::SearchStart, "search"),
    ("S", Command::CycleSort, "cycle sort"),
    ("T", Command::CycleTypeFilter, "cycle type filter"),
    ("C", Command::ToggleClosed, "toggle closed"),
    ("b", Command::OpenBoardPicker, "boards"),
    ("H", Command::ShowHandoffs, "handoffs"),
    ("i", Command::ShowStats, "stats"),
];

const BOARD: Table = &[
    ("J", Command::MoveDown, "move down"),
    ("K", Command::MoveUp, "move up"),
    ("g g|alt+up", Command::MoveTop, "move to top"),
    ("G|alt+down", Command::MoveBottom, "move to bottom"),
    ("v", Command::ToggleView, "toggle backlog/swimlanes"),
    ("s", Command::CycleStatusFilter, "cycle status filter"),
    ("C", Command::ToggleClosed, "toggle closed"),
    ("esc", Command::ExitBoard, "clear filter / exit board"),
];

const SEARCH: Table = &[
    ("esc", Command::SearchExit, "clear and exit search"),
    ("enter", Command::SearchConfirm, "confirm search"),
    ("ctrl+u", Command::SearchClear, "clear search"),
    ("down|ctrl+n", Command::CursorDown, "down"),
    ("up|ctrl+p", Command::CursorUp, "up"),
    ("?", Command::ToggleHelp, "toggle help"),
];

const MODAL: Table = &[
    ("esc|q", Command::ModalClose, "close"),
    ("j|down", Command::CursorDown, "scroll down / next item"),
    ("k|up", Command::CursorUp, "scroll up / previous item"),
    ("ctrl+d", Command::HalfPageDown, "half page down"),
    ("ctrl+u", Command::HalfPageUp, "half page up"),
    ("g g|home", Command::CursorTop, "top"),
    ("G|end", Command::CursorBottom, "bottom"),
    ("h|left", Command::ModalPrev, "previous issue"),
    ("l|right", Command::ModalNext, "next issue"),
    ("tab", Command::FocusNextSection, "focus next section"),
    ("shift+tab", Command::FocusPrevSection, "focus previous section"),
    ("enter", Command::ModalSelect, "open linked issue"),
    ("e", Command::EditIssue, "edit"),
    ("m", Command::MarkForReview, "mark for review"),
    ("a", Command::Approve, "approve"),
    ("c", Command::CloseIssue, "close"),
    ("r", Command::Reopen, "reopen"),
    ("d", Command::Delete, "delete"),
    ("y", Command::CopyId, "copy id"),
    ("?", Command::ToggleHelp, "toggle help"),
];

const SECTION: Table = &[("esc", Command::SectionUnfocus, "leave section")];

const HELP: Table = &[
    ("esc|?|q", Command::ToggleHelp, "close help"),
    ("j|down", Command::CursorDown, "scroll down"),
    ("k|up", Command::CursorUp, "scroll up"),
];

const CONFIRM: Table = &[
    ("y|enter", Command::Confirm, "confirm"),
    ("n|esc", Command::Cancel, "cancel"),
];

const CLOSE_CONFIRM: Table = &[
    ("enter", Command::Confirm, "close issue"),
    ("esc", Command::Cancel, "cancel"),
];

const FORM: Table = &[
    ("ctrl+s", Command::FormSubmit, "submit"),
    ("esc", Command::FormCancel, "cancel"),
    ("ctrl+x", Command::FormToggleExtended, "toggle extended fields"),
    ("ctrl+o", Command::FormOpenEditor, "edit in $EDITOR"),
    ("tab", Command::FormNextField, "next field"),
    ("shift+tab", Command::FormPrevField, "previous field"),
];

const BOARD_PICKER: Table = &[
    ("j|down", Command::CursorDown, "down"),
    ("k|up", Command::CursorUp, "up"),
    ("enter", Command::SelectBoard, "open board"),
    ("n", Command::NewBoard, "new board"),
    ("e", Command::EditBoard, "edit board"),
    ("d", Command::DeleteBoard, "delete board"),
    ("esc|q", Command::CloseOverlay, "close"),
];

const BOARD_EDITOR: Table = &[
    ("ctrl+s", Command::FormSubmit, "save board"),
    ("esc", Command::FormCancel, "cancel"),
    ("tab", Command::FormNextField, "next field"),
    ("shift+tab", Command::FormPrevField, "previous field"),
    ("f1", Command::ShowTdqHelp, "query language help"),
];

const LIST_OVERLAY: Table = &[
    ("esc|q", Command::CloseOverlay, "close"),
    ("j|down", Command::CursorDown, "down"),
    ("k|up", Command::CursorUp, "up"),
];

const GETTING_STARTED: Table = &[
    ("enter|esc|q", Command::CloseOverlay, "dismiss"),
    ("n", Command::NewIssue, "create first issue"),
];

impl Registry {
    pub fn new() -> Self {
        let mut bindings = Vec::new();
        let tables: &[(Context, Table)] = &[
            (Context::Main, MAIN),
            (Context::Board, BOARD),
            (Context::Search, SEARCH),
            (Context::Modal, MODAL),
            (Context::EpicTasks, SECTION),
            (Context::ParentEpicFocused, SECTION),
            (Context::BlockedByFocused, SECTION),
            (Context::BlocksFocused, SECTION),
            (Context::Help, HELP),
            (Context::Confirm, CONFIRM),
            (Context::SyncPrompt, CONFIRM),
            (Context::CloseConfirm, CLOSE_CONFIRM),
            (Context::Form, FORM),
            (Context::BoardPicker, BOARD_PICKER),
            (Context::BoardEditor, BOARD_EDITOR),
            (Context::Handoffs, LIST_OVERLAY),
            (Context::Stats, LIST_OVERLAY),
            (Context::TdqHelp, LIST_OVERLAY),
            (Context::GettingStarted, GETTING_STARTED),
        ];
        for (context, table) in tables {
            for (pattern, command, description) in table.iter() {
                for alternative in pattern.split('|') {
                    let keys: Option<Vec<Key>> = alternative.split(' ').map(Key::parse).collect();
                    match keys {
                        Some(keys) if !keys.is_empty() => bindings.push(Binding {
                            keys,
                            context: *context,
                            command: *command,
                            description,
                        }),
                        _ => tracing::warn!(key = alternative, "ignoring unparseable key binding"),
                    }
                }
            }
        }
        Self { bindings }
    }

    fn lookup_in(&self, keys: &[Key], context: Context) -> Lookup {
        let mut prefix = false;
        for b in self.bindings.iter().filter(|b| b.context == context) {
            if b.keys.as_slice() == keys {
                return Lookup::Command(b.command);
            }
            if b.keys.len() > keys.len() && b.keys.starts_with(keys) {
                prefix = true;
            }
        }
        if prefix {
            Lookup::Prefix
        } else {
            Lookup::NoMatch
        }
    }

    /// Resolve a key sequence, falling back through parent contexts.
    pub fn lookup_sequence(&self, keys: &[Key], context: Context) -> Lookup {
        let mut ctx = Some(context);
        while let Some(c) = ctx {
            match self.lookup_in(keys, c) {
                Lookup::NoMatch => ctx = c.fallback(),
                found => return found,
            }
        }
        Lookup::NoMatch
    }

    pub fn lookup(&self, event: &KeyEvent, context: Context) -> Option<Command> {
        match self.lookup_sequence(&[Key::from_event(event)], context) {
            Lookup::Command(c) => Some(c),
            _ => None,
        }
    }

    pub fn bindings_for(&self, context: Context) -> impl Iterator<Item = &Binding> {
        self.bindings.iter().filter(move |b| b.context == context)
    }

    /// First binding label for a command, for footers.
    pub fn key_label(&self, context: Context, command: Command) -> Option<String> {
        self.bindings_for(context)
            .find(|b| b.command == command)
            .map(|b| keys_label(&b.keys))
    }

    pub fn help_for(&self, context: Context) -> String {
        let mut out = String::new();
        let mut ctx = Some(context);
        while let Some(c) = ctx {
            out.push_str(c.label());
            out.push('\n');
            // Merge alternatives that share a command.
            let mut rows: Vec<(String, &'static str)> = Vec::new();
            for b in self.bindings_for(c) {
                let label = keys_label(&b.keys);
                match rows.iter_mut().find(|(_, d)| *d == b.description) {
                    Some(row) => {
                        row.0.push('/');
                        row.0.push_str(&label);
                    }
                    None => rows.push((label, b.description)),
                }
            }
            for (keys, description) in rows {
                out.push_str(&format!("  {:<16} {}\n", keys, description));
            }
            ctx = c.fallback();
            if ctx.is_some() {
                out.push('\n');
            }
        }
        out
    }
}

fn keys_label(keys: &[Key]) -> String {
    keys.iter().map(|k| k.label()).collect::<Vec<_>>().join("")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    #[test]
    fn parses_tokens() {
        assert_eq!(
            Key::parse("ctrl+d"),
            Some(Key::new(KeyCode::Char('d'), KeyModifiers::CONTROL))
        );
        assert_eq!(Key::parse("shift+tab"), Some(Key::new(KeyCode::BackTab, KeyModifiers::NONE)));
        assert_eq!(Key::parse("G"), Some(Key::new(KeyCode::Char('G'), KeyModifiers::NONE)));
        assert_eq!(Key::parse("bogus"), None);
    }

    #[test]
    fn shifted_chars_match_uppercase_bindings() {
        let reg = Registry::new();
        let ev = KeyEvent::new(KeyCode::Char('G'), KeyModifiers::SHIFT);
        assert_eq!(reg.lookup(&ev, Context::Main), Some(Command::CursorBottom));
    }

    #[test]
    fn board_falls_back_to_main() {
        let reg = Registry::new();
        assert_eq!(reg.lookup(&key(KeyCode::Char('J')), Context::Board), Some(Command::MoveDown));
        assert_eq!(reg.lookup(&key(KeyCode::Char('j')), Context::Board), Some(Command::CursorDown));
        assert_eq!(reg.lookup(&key(KeyCode::Char('J')), Context::Main), None);
    }

    #[test]
    fn board_moves_to_the_ends_with_gg_and_shift_g() {
        let reg = Registry::new();
        let g = Key::parse("g").unwrap();
        assert_eq!(reg.lookup_sequence(&[g], Context::Board), Lookup::Prefix);
        assert_eq!(reg.lookup_sequence(&[g, g], Context::Board), Lookup::Command(Command::MoveTop));
        let shift_g = KeyEvent::new(KeyCode::Char('G'), KeyModifiers::SHIFT);
        assert_eq!(reg.lookup(&shift_g, Context::Board), Some(Command::MoveBottom));
        let shift_t = KeyEvent::new(KeyCode::Char('T'), KeyModifiers::SHIFT);
        assert_eq!(reg.lookup(&shift_t, Context::Board), Some(Command::CycleTypeFilter));
        assert_eq!(reg.lookup(&key(KeyCode::Home), Context::Board), Some(Command::CursorTop));
    }

    #[test]
    fn section_contexts_fall_back_to_modal() {
        let reg = Registry::new();
        assert_eq!(
            reg.lookup(&key(KeyCode::Esc), Context::EpicTasks),
            Some(Command::SectionUnfocus)
        );
        assert_eq!(
            reg.lookup(&key(KeyCode::Char('h')), Context::BlocksFocused),
            Some(Command::ModalPrev)
        );
    }

    #[test]
    fn two_key_sequences_report_prefix() {
        let reg = Registry::new();
        let g = Key::parse("g").unwrap();
        assert_eq!(reg.lookup_sequence(&[g], Context::Main), Lookup::Prefix);
        assert_eq!(reg.lookup_sequence(&[g, g], Context::Main), Lookup::Command(Command::CursorTop));
    }

    #[test]
    fn action_strings_round_trip_through_ids() {
        assert_eq!(Command::from_action("submit"), Some(Command::FormSubmit));
        assert_eq!(Command::from_action("no-such-action"), None);
    }

    #[test]
    fn help_lists_context_and_fallback() {
        let reg = Registry::new();
        let help = reg.help_for(Context::Board);
        assert!(help.starts_with("Board\n"));
        assert!(help.contains("move down"));
        assert!(help.contains("Main\n"));
        assert!(help.contains("j/↓"));
    }
}
