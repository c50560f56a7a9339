//! The dispatcher: `update` applies one message to the app.

use std::time::Instant;

use chrono::Utc;
use ratatui::crossterm::event::{
    Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers, MouseButton, MouseEvent, MouseEventKind,
};
use ratatui::layout::Rect;
use tui_textarea::{Input, TextArea};

use crate::issue::IssueType;
use crate::tdq;

use super::app::{
    modal_viewport, App, Click, CloseDialog, ConfirmKind, Effect, HelpOverlay, IssueAction, ListKind,
    ListOverlay, Msg, DOUBLE_CLICK, PREVIEW_DELAY,
};
use super::board::{BoardEditor, BoardMode, BoardPicker, EditorField, MoveDir, QueryPreview};
use super::drag::DragState;
use super::form::{FormOutcome, FormState};
use super::hit::{hit_test, Hit};
use super::keymap::{Command, Context, Key, Lookup};
use super::layout::{self, Panel};
use super::modal::{self, Modal, ModalFocus};
use super::scroll::{self, Motion};

/// Lines per mouse wheel notch.
const WHEEL_STEP: isize = 3;

pub fn update(app: &mut App, msg: Msg) -> Option<Effect> {
    match msg {
        Msg::Key(key) => handle_key(app, key),
        Msg::Mouse(ev) => handle_mouse(app, ev),
        Msg::Resize(w, h) => {
            app.area = Rect::new(0, 0, w, h);
            app.refresh_scroll();
            None
        }
        Msg::Tick => app.refresh_all(),
        Msg::DataLoaded(snapshot) => {
            if app.is_stale(&snapshot.request) {
                tracing::debug!(seq = snapshot.request.seq, "dropping stale snapshot");
                return None;
            }
            app.apply_snapshot(*snapshot);
            None
        }
        Msg::DataFailed(error) => {
            app.flash_error(format!("Refresh failed: {}", error));
            None
        }
        Msg::DetailsLoaded(details) => {
            app.modals.apply_details(&details);
            None
        }
        Msg::DetailsFailed { issue_id, error } => {
            app.modals.apply_error(&issue_id, &error);
            None
        }
        Msg::BoardsLoaded(boards) => {
            if let Some(picker) = app.board_picker.as_mut() {
                picker.set_boards(boards);
            }
            None
        }
        Msg::BoardIssuesLoaded {
            board_id,
            issues,
            positions,
        } => {
            let board = app.board.as_mut().filter(|b| b.board.id == board_id)?;
            if board.set_issues(issues, &positions) {
                app.ensure_visible(Panel::TaskList);
            } else {
                app.refresh_scroll();
            }
            None
        }
        Msg::HandoffsLoaded(handoffs) => {
            if let Some(list) = app.list_overlay.as_mut().filter(|l| l.kind == ListKind::Handoffs) {
                list.handoffs = handoffs;
                list.loading = false;
            }
            None
        }
        Msg::AutofillLoaded(sources) => {
            if let Some(form) = app.form.as_mut() {
                form.set_sources(sources);
            }
            None
        }
        Msg::EditFormReady { issue, dependencies } => {
            app.form = Some(FormState::edit(&issue, dependencies));
            app.form_saving = false;
            Some(Effect::FetchAutofillSources)
        }
        Msg::Notice(message) => {
            app.flash(message);
            None
        }
        Msg::ActionDone(message) => {
            app.flash(message);
            app.refresh_all()
        }
        Msg::ActionFailed(error) => {
            app.flash_error(error);
            None
        }
        Msg::IssueSaved { issue_id, message } => {
            tracing::debug!(issue_id = %issue_id, "issue form saved");
            app.form = None;
            app.form_saving = false;
            if let Some(board) = app.board.as_mut() {
                board.pending_selection = Some(issue_id);
            }
            app.flash(message);
            app.refresh_all()
        }
        Msg::FormSaveFailed(error) => {
            app.form_saving = false;
            app.flash_error(error);
            None
        }
        Msg::BoardSaved { board, quiet } => {
            let mut effects = Vec::new();
            if let Some(mode) = app.board.as_mut().filter(|m| m.board.id == board.id) {
                mode.board.name = board.name.clone();
                mode.board.query = board.query.clone();
            }
            if !quiet {
                app.board_editor = None;
                app.flash(format!("Saved board {}", board.name));
                if app.board.as_ref().is_some_and(|m| m.board.id == board.id) {
                    effects.push(app.fetch_board_issues());
                }
            }
            if app.board_picker.is_some() {
                effects.push(Some(Effect::FetchBoards));
            }
            Effect::batch(effects)
        }
        Msg::BoardDeleted(board_id) => {
            if app.board.as_ref().is_some_and(|b| b.board.id == board_id) {
                app.board = None;
                app.refresh_scroll();
            }
            app.flash("Board deleted");
            app.board_picker.is_some().then_some(Effect::FetchBoards)
        }
        Msg::EditorFinished { field, result } => {
            match result {
                Ok(text) => {
                    if let Some(form) = app.form.as_mut() {
                        form.set_value(field, &text);
                        form.focus_field(field);
                    }
                }
                Err(error) => app.flash_error(format!("Editor failed: {}", error)),
            }
            None
        }
        Msg::QueryPreviewTick { token } => {
            let editor = app.board_editor.as_ref().filter(|e| e.preview_token == token)?;
            Some(Effect::PreviewQuery {
                token,
                query: editor.query_text(),
            })
        }
        Msg::QueryPreviewLoaded { token, query, result } => {
            if let Some(editor) = app.board_editor.as_mut() {
                if editor.preview_token == token && editor.query_text() == query {
                    editor.preview = Some(match result {
                        Ok(n) => QueryPreview::Matches(n),
                        Err(e) => QueryPreview::Error(e),
                    });
                }
            }
            None
        }
        Msg::SyncFinished(result) => match result {
            Ok(summary) => {
                app.flash(if summary.is_empty() { "Sync complete".to_string() } else { summary });
                app.refresh_all()
            }
            Err(error) => {
                app.flash_error(format!("Sync failed: {}", error));
                None
            }
        },
    }
}

fn handle_key(app: &mut App, key: KeyEvent) -> Option<Effect> {
    if key.kind != KeyEventKind::Press {
        return None;
    }
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        app.should_quit = true;
        return None;
    }

    let ctx = app.context();
    if ctx == Context::Form {
        if let Some(form) = app.form.as_mut() {
            match form.handle_key(&key) {
                FormOutcome::Consumed => return None,
                FormOutcome::Action(action) => {
                    app.pending_keys.clear();
                    return Command::from_action(action).and_then(|cmd| dispatch(app, cmd, ctx));
                }
                FormOutcome::NotConsumed => {}
            }
        }
    }

    app.pending_keys.push(Key::from_event(&key));
    match app.registry.lookup_sequence(&app.pending_keys, ctx) {
        Lookup::Command(cmd) => {
            app.pending_keys.clear();
            dispatch(app, cmd, ctx)
        }
        Lookup::Prefix => None,
        Lookup::NoMatch => {
            let was_sequence = app.pending_keys.len() > 1;
            app.pending_keys.clear();
            // A broken sequence: the last key may still be a binding on its own.
            if was_sequence {
                if let Lookup::Command(cmd) = app.registry.lookup_sequence(&[Key::from_event(&key)], ctx) {
                    return dispatch(app, cmd, ctx);
                }
            }
            text_input(app, ctx, &key)
        }
    }
}

/// Keys no binding claimed go to the text widget of the current context.
fn text_input(app: &mut App, ctx: Context, key: &KeyEvent) -> Option<Effect> {
    match ctx {
        Context::Search => {
            if key.code == KeyCode::Enter {
                return None;
            }
            if app.search.input.input(Input::from(Event::Key(*key))) {
                let query = app.search.text();
                return apply_query(app, query, false);
            }
            None
        }
        Context::Form => {
            if let Some(form) = app.form.as_mut() {
                form.input(key);
            }
            None
        }
        Context::BoardEditor => {
            let editor = app.board_editor.as_mut()?;
            if key.code == KeyCode::Enter {
                return None;
            }
            let focus = editor.focus;
            if editor.focused_mut().input(Input::from(Event::Key(*key))) && focus == EditorField::Query {
                let token = editor.bump_preview();
                return Some(Effect::ScheduleQueryPreview {
                    token,
                    delay: PREVIEW_DELAY,
                });
            }
            None
        }
        Context::CloseConfirm => {
            if let Some(dialog) = app.close_confirm.as_mut() {
                if key.code != KeyCode::Enter {
                    dialog.reason.input(Input::from(Event::Key(*key)));
                }
            }
            None
        }
        _ => None,
    }
}

fn is_modal(ctx: Context) -> bool {
    matches!(
        ctx,
        Context::Modal
            | Context::EpicTasks
            | Context::ParentEpicFocused
            | Context::BlockedByFocused
            | Context::BlocksFocused
    )
}

fn dispatch(app: &mut App, cmd: Command, ctx: Context) -> Option<Effect> {
    tracing::trace!(command = cmd.id(), context = ?ctx, "dispatch");
    match cmd {
        Command::Quit => {
            app.should_quit = true;
            None
        }
        Command::ToggleHelp => {
            app.help = match app.help {
                Some(_) => None,
                None => Some(HelpOverlay { context: ctx, scroll: 0 }),
            };
            None
        }
        Command::Refresh => {
            app.flash("Refreshing");
            app.refresh_all()
        }
        Command::NextPanel => {
            app.active_panel = app.active_panel.next();
            None
        }
        Command::PrevPanel => {
            app.active_panel = app.active_panel.prev();
            None
        }
        Command::FocusCurrentWork => {
            app.active_panel = Panel::CurrentWork;
            None
        }
        Command::FocusTaskList => {
            app.active_panel = Panel::TaskList;
            None
        }
        Command::FocusActivity => {
            app.active_panel = Panel::Activity;
            None
        }
        Command::CloseOverlay => close_overlay(app, ctx),

        Command::CursorDown
        | Command::CursorUp
        | Command::CursorTop
        | Command::CursorBottom
        | Command::HalfPageDown
        | Command::HalfPageUp
        | Command::PageDown
        | Command::PageUp => {
            cursor(app, cmd, ctx);
            None
        }
        Command::ScrollDown => {
            wheel_panel(app, app.active_panel, 1);
            None
        }
        Command::ScrollUp => {
            wheel_panel(app, app.active_panel, -1);
            None
        }

        Command::OpenDetails => open_details(app, app.active_panel),
        Command::MarkForReview => issue_action(app, IssueAction::Review),
        Command::Approve => issue_action(app, IssueAction::Approve),
        Command::Reopen => issue_action(app, IssueAction::Reopen),
        Command::Delete => {
            let issue_id = app.target_id()?;
            let title = issue_title(app, &issue_id);
            app.confirm = Some(ConfirmKind::DeleteIssue { issue_id, title });
            None
        }
        Command::CloseIssue => {
            let issue_id = app.target_id()?;
            let title = issue_title(app, &issue_id);
            app.close_confirm = Some(CloseDialog {
                issue_id,
                title,
                reason: TextArea::default(),
            });
            None
        }
        Command::CopyId => app.target_id().map(Effect::CopyToClipboard),
        Command::ShowHandoffs => {
            let mut list = ListOverlay::new(ListKind::Handoffs);
            list.loading = true;
            app.list_overlay = Some(list);
            Some(Effect::FetchHandoffs)
        }
        Command::ShowStats => {
            app.list_overlay = Some(ListOverlay::new(ListKind::Stats));
            None
        }

        Command::ModalPrev => app.modals.top_mut()?.navigate(-1).map(Effect::FetchDetails),
        Command::ModalNext => app.modals.top_mut()?.navigate(1).map(Effect::FetchDetails),
        Command::FocusNextSection => {
            app.modals.top_mut()?.cycle_focus(true);
            None
        }
        Command::FocusPrevSection => {
            app.modals.top_mut()?.cycle_focus(false);
            None
        }
        Command::SectionUnfocus => {
            app.modals.top_mut()?.focus = ModalFocus::None;
            None
        }
        Command::ModalSelect => {
            let (issue_id, scope) = app.modals.top()?.selected_link()?;
            push_modal(app, issue_id, scope, None)
        }
        Command::ModalClose => {
            app.modals.pop();
            None
        }

        Command::SearchStart => {
            app.search.active = true;
            app.search.set_text(&app.filter.search_query.clone());
            app.active_panel = Panel::TaskList;
            None
        }
        Command::SearchExit => {
            app.search.active = false;
            app.search.set_text("");
            apply_query(app, String::new(), true)
        }
        Command::SearchClear => {
            app.search.set_text("");
            apply_query(app, String::new(), false)
        }
        Command::SearchConfirm => {
            app.search.active = false;
            Some(Effect::PersistConfig(app.config_snapshot()))
        }
        Command::CycleSort => {
            app.filter.sort_mode = app.filter.sort_mode.next();
            let query = tdq::set_sort_token(&app.filter.search_query, app.filter.sort_mode.sort_token());
            app.flash(format!("Sort: {}", app.filter.sort_mode.label()));
            app.search.set_text(&query);
            apply_query(app, query, true)
        }
        Command::CycleTypeFilter => {
            let next = next_type(app.filter.type_filter.as_deref().and_then(IssueType::parse));
            app.filter.type_filter = next.map(|t| t.as_str().to_string());
            let query = tdq::set_type_token(&app.filter.search_query, next);
            app.flash(format!("Type: {}", next.map(|t| t.as_str()).unwrap_or("all")));
            app.search.set_text(&query);
            apply_query(app, query, true)
        }
        Command::ToggleClosed => {
            app.filter.include_closed = !app.filter.include_closed;
            app.flash(if app.filter.include_closed { "Showing closed issues" } else { "Hiding closed issues" });
            Effect::batch([
                Some(app.fetch_data()),
                app.fetch_board_issues(),
                Some(Effect::PersistConfig(app.config_snapshot())),
            ])
        }

        Command::NewIssue => {
            app.getting_started = false;
            app.getting_started_seen = true;
            let parent = app
                .modals
                .top()
                .and_then(|m| m.details.as_ref())
                .filter(|d| d.issue.is_epic())
                .map(|d| d.issue.id.clone());
            app.form = Some(FormState::create(parent.as_deref()));
            app.form_saving = false;
            Some(Effect::FetchAutofillSources)
        }
        Command::EditIssue => app.target_id().map(Effect::FetchEditForm),
        Command::FormSubmit => match ctx {
            Context::BoardEditor => save_board_editor(app),
            _ => submit_form(app),
        },
        Command::FormCancel => {
            match ctx {
                Context::BoardEditor => app.board_editor = None,
                _ => app.form = None,
            }
            None
        }
        Command::FormToggleExtended => {
            app.form.as_mut()?.toggle_extended();
            None
        }
        Command::FormOpenEditor => {
            let form = app.form.as_ref()?;
            let field = form.editor_target();
            Some(Effect::OpenEditor {
                field,
                text: form.value(field),
            })
        }
        Command::FormNextField | Command::FormPrevField => {
            match ctx {
                Context::BoardEditor => app.board_editor.as_mut()?.toggle_focus(),
                _ if cmd == Command::FormNextField => app.form.as_mut()?.next_focus(),
                _ => app.form.as_mut()?.prev_focus(),
            }
            None
        }

        Command::OpenBoardPicker => {
            app.board_picker = Some(BoardPicker {
                loading: true,
                ..BoardPicker::default()
            });
            Some(Effect::FetchBoards)
        }
        Command::SelectBoard => open_board(app),
        Command::NewBoard => {
            app.board_editor = Some(BoardEditor::create());
            None
        }
        Command::EditBoard => {
            let board = app.board_picker.as_ref()?.selected()?.clone();
            if board.is_builtin {
                app.flash_error("Built-in boards cannot be edited");
                return None;
            }
            let mut editor = BoardEditor::edit(&board);
            let token = editor.bump_preview();
            app.board_editor = Some(editor);
            Some(Effect::ScheduleQueryPreview {
                token,
                delay: PREVIEW_DELAY,
            })
        }
        Command::DeleteBoard => {
            let board = app.board_picker.as_ref()?.selected()?.clone();
            if board.is_builtin {
                app.flash_error("Built-in boards cannot be deleted");
                return None;
            }
            app.confirm = Some(ConfirmKind::DeleteBoard {
                board_id: board.id,
                name: board.name,
            });
            None
        }
        Command::ExitBoard => {
            let board = app.board.as_mut()?;
            if board.clear_filters() {
                return app.fetch_board_issues();
            }
            app.board = None;
            app.refresh_scroll();
            None
        }
        Command::CycleStatusFilter => {
            let board = app.board.as_mut()?;
            board.status_filter = board.status_filter.next();
            app.fetch_board_issues()
        }
        Command::MoveUp => move_selected(app, MoveDir::Up),
        Command::MoveDown => move_selected(app, MoveDir::Down),
        Command::MoveTop => move_selected(app, MoveDir::Top),
        Command::MoveBottom => move_selected(app, MoveDir::Bottom),
        Command::ToggleView => {
            let board = app.board.as_mut()?;
            board.toggle_view();
            let saved = board.board.clone();
            app.ensure_visible(Panel::TaskList);
            Some(Effect::SaveBoard {
                board: saved,
                quiet: true,
            })
        }
        Command::ShowTdqHelp => {
            let mut list = ListOverlay::new(ListKind::TdqHelp);
            list.return_to = app.board_editor.take();
            app.list_overlay = Some(list);
            None
        }

        Command::Confirm => confirm(app, ctx),
        Command::Cancel => {
            match ctx {
                Context::SyncPrompt => app.sync_prompt = false,
                Context::CloseConfirm => app.close_confirm = None,
                _ => app.confirm = None,
            }
            None
        }
    }
}

fn close_overlay(app: &mut App, ctx: Context) -> Option<Effect> {
    match ctx {
        Context::BoardPicker => app.board_picker = None,
        Context::GettingStarted => {
            app.getting_started = false;
            app.getting_started_seen = true;
        }
        Context::Handoffs | Context::Stats | Context::TdqHelp => {
            if let Some(list) = app.list_overlay.take() {
                if list.return_to.is_some() {
                    app.board_editor = list.return_to;
                }
            }
        }
        _ => {}
    }
    None
}

fn cursor(app: &mut App, cmd: Command, ctx: Context) {
    let delta: isize = match cmd {
        Command::CursorDown => 1,
        Command::CursorUp => -1,
        _ => 0,
    };
    match ctx {
        Context::Help => {
            if let Some(help) = app.help.as_mut() {
                help.scroll = step(help.scroll, cmd);
            }
        }
        Context::Handoffs | Context::Stats | Context::TdqHelp => {
            if let Some(list) = app.list_overlay.as_mut() {
                list.scroll = step(list.scroll, cmd);
            }
        }
        Context::BoardPicker => {
            if let Some(picker) = app.board_picker.as_mut() {
                picker.move_by(delta);
            }
        }
        c if is_modal(c) => {
            let (_, viewport) = modal_viewport(app.area);
            let max = modal_max_scroll(app);
            let Some(m) = app.modals.top_mut() else {
                return;
            };
            let half = (viewport / 2).max(1) as isize;
            match cmd {
                Command::CursorDown => m.move_down(max),
                Command::CursorUp => m.move_up(),
                Command::HalfPageDown | Command::PageDown => m.scroll_by(half, max),
                Command::HalfPageUp | Command::PageUp => m.scroll_by(-half, max),
                Command::CursorTop => m.scroll_by(-(max as isize) - 1, max),
                Command::CursorBottom => m.scroll_by(max as isize + 1, max),
                _ => {}
            }
        }
        _ => {
            let panel = if ctx == Context::Search { Panel::TaskList } else { app.active_panel };
            let height = app.panel_height(panel);
            let motion = match cmd {
                Command::CursorDown => Motion::Down(1),
                Command::CursorUp => Motion::Up(1),
                Command::CursorTop => Motion::Top,
                Command::CursorBottom => Motion::Bottom,
                Command::HalfPageDown => Motion::Down(scroll::half_page(height)),
                Command::HalfPageUp => Motion::Up(scroll::half_page(height)),
                Command::PageDown => Motion::Down(scroll::full_page(height)),
                _ => Motion::Up(scroll::full_page(height)),
            };
            let model = app.panel_model(panel);
            scroll::move_cursor(app.scroll_mut(panel), motion, &model, height);
        }
    }
}

/// Overlay scroll step; the renderer clamps the upper end.
fn step(scroll: usize, cmd: Command) -> usize {
    match cmd {
        Command::CursorDown => scroll.saturating_add(1),
        Command::CursorUp => scroll.saturating_sub(1),
        Command::HalfPageDown | Command::PageDown => scroll.saturating_add(10),
        Command::HalfPageUp | Command::PageUp => scroll.saturating_sub(10),
        Command::CursorTop => 0,
        Command::CursorBottom => usize::MAX / 2,
        _ => scroll,
    }
}

fn modal_max_scroll(app: &App) -> usize {
    let (width, viewport) = modal_viewport(app.area);
    app.modals
        .top()
        .map(|m| modal::body(m, width).lines.len().saturating_sub(viewport))
        .unwrap_or(0)
}

fn wheel_panel(app: &mut App, panel: Panel, delta: isize) {
    let model = app.panel_model(panel);
    let height = app.panel_height(panel);
    scroll::wheel(app.scroll_mut(panel), delta, &model, height);
}

fn issue_title(app: &App, issue_id: &str) -> String {
    app.find_issue(issue_id).map(|i| i.title.clone()).unwrap_or_default()
}

fn push_modal(app: &mut App, issue_id: String, scope: Vec<String>, source: Option<Panel>) -> Option<Effect> {
    app.modals.push(Modal::new(issue_id.clone(), scope, source));
    Some(Effect::FetchDetails(issue_id))
}

fn open_details(app: &mut App, panel: Panel) -> Option<Effect> {
    let issue_id = app.selected_id(panel)?;
    let mut scope: Vec<String> = Vec::new();
    for id in app.panel_ids(panel).into_iter().flatten() {
        if !scope.contains(&id) {
            scope.push(id);
        }
    }
    push_modal(app, issue_id, scope, Some(panel))
}

fn issue_action(app: &mut App, action: IssueAction) -> Option<Effect> {
    let issue_id = app.target_id()?;
    Some(Effect::IssueAction { issue_id, action })
}

fn next_type(current: Option<IssueType>) -> Option<IssueType> {
    match current {
        None => Some(IssueType::Bug),
        Some(IssueType::Bug) => Some(IssueType::Feature),
        Some(IssueType::Feature) => Some(IssueType::Task),
        Some(IssueType::Task) => Some(IssueType::Epic),
        Some(IssueType::Epic) => Some(IssueType::Chore),
        Some(IssueType::Chore) => None,
    }
}

/// Install a new search query and refetch; `persist` also writes the config file.
fn apply_query(app: &mut App, query: String, persist: bool) -> Option<Effect> {
    app.filter.search_query = query;
    app.scroll[Panel::TaskList.index()] = Default::default();
    Effect::batch([
        Some(app.fetch_data()),
        persist.then(|| Effect::PersistConfig(app.config_snapshot())),
    ])
}

fn submit_form(app: &mut App) -> Option<Effect> {
    if app.form_saving {
        return None;
    }
    match app.form.as_ref()?.submission() {
        Ok(submission) => {
            app.form_saving = true;
            Some(Effect::SaveIssue(Box::new(submission)))
        }
        Err(message) => {
            app.flash_error(message);
            None
        }
    }
}

fn save_board_editor(app: &mut App) -> Option<Effect> {
    match app.board_editor.as_ref()?.to_board() {
        Ok(board) => Some(Effect::SaveBoard { board, quiet: false }),
        Err(message) => {
            app.flash_error(message);
            None
        }
    }
}

fn open_board(app: &mut App) -> Option<Effect> {
    let board = app.board_picker.as_ref()?.selected()?.clone();
    app.board_picker = None;
    app.board = Some(BoardMode::new(board.clone()));
    app.active_panel = Panel::TaskList;
    app.flash(format!("Board: {}", board.name));
    let mut touched = board;
    touched.last_viewed_at = Some(Utc::now());
    Effect::batch([
        Some(Effect::SaveBoard {
            board: touched,
            quiet: true,
        }),
        app.fetch_board_issues(),
    ])
}

fn move_selected(app: &mut App, dir: MoveDir) -> Option<Effect> {
    if app.active_panel != Panel::TaskList {
        app.flash("Focus the Task List to reorder");
        return None;
    }
    let board = app.board.as_mut()?;
    let board_id = board.board.id.clone();
    match board.prepare_move(dir) {
        Ok(writes) => Some(Effect::ApplyBoardMoves { board_id, writes }),
        Err(e) => {
            app.flash(e.to_string());
            None
        }
    }
}

fn confirm(app: &mut App, ctx: Context) -> Option<Effect> {
    match ctx {
        Context::SyncPrompt => {
            app.sync_prompt = false;
            let command = app.config_file.sync_command.clone()?;
            app.flash("Syncing");
            Some(Effect::RunSync(command))
        }
        Context::CloseConfirm => {
            let dialog = app.close_confirm.take()?;
            Some(Effect::CloseIssue {
                issue_id: dialog.issue_id,
                reason: dialog.reason.lines().join("\n").trim().to_string(),
            })
        }
        _ => match app.confirm.take()? {
            ConfirmKind::DeleteIssue { issue_id, .. } => {
                // A deleted issue cannot stay open behind the dialog.
                while app.modals.top().is_some_and(|m| m.issue_id == issue_id) {
                    app.modals.pop();
                }
                Some(Effect::DeleteIssue(issue_id))
            }
            ConfirmKind::DeleteBoard { board_id, .. } => Some(Effect::DeleteBoard(board_id)),
        },
    }
}

fn handle_mouse(app: &mut App, ev: MouseEvent) -> Option<Effect> {
    let ctx = app.context();
    match ev.kind {
        MouseEventKind::ScrollDown | MouseEventKind::ScrollUp => {
            let delta = if ev.kind == MouseEventKind::ScrollDown { WHEEL_STEP } else { -WHEEL_STEP };
            match ctx {
                Context::Main | Context::Board => {
                    let bounds = app.bounds();
                    let panel = Panel::ALL
                        .into_iter()
                        .find(|p| layout::contains(bounds.panel(*p), ev.column, ev.row))?;
                    wheel_panel(app, panel, delta);
                }
                c if is_modal(c) => {
                    let max = modal_max_scroll(app);
                    app.modals.top_mut()?.scroll_by(delta, max);
                }
                Context::Help => {
                    let help = app.help.as_mut()?;
                    help.scroll = (help.scroll as isize + delta).max(0) as usize;
                }
                Context::Handoffs | Context::Stats | Context::TdqHelp => {
                    let list = app.list_overlay.as_mut()?;
                    list.scroll = (list.scroll as isize + delta).max(0) as usize;
                }
                _ => {}
            }
            None
        }
        MouseEventKind::Down(MouseButton::Left) => {
            if !matches!(ctx, Context::Main | Context::Board) {
                return None;
            }
            let bounds = app.bounds();
            let models = app.models();
            match hit_test(&bounds, &models, app.offsets(), ev.column, ev.row) {
                Hit::Divider(divider) => {
                    app.drag = Some(DragState::new(divider, ev.row, app.pane_ratios));
                    None
                }
                Hit::Panel { panel, row } => {
                    app.active_panel = panel;
                    if row < 0 {
                        return None;
                    }
                    let row = row as usize;
                    let state = app.scroll_mut(panel);
                    state.cursor = row;
                    state.independent = false;

                    let now = Instant::now();
                    let double = app
                        .last_click
                        .is_some_and(|c| c.panel == panel && c.row == row && now.duration_since(c.at) <= DOUBLE_CLICK);
                    if double {
                        app.last_click = None;
                        return open_details(app, panel);
                    }
                    app.last_click = Some(Click { at: now, panel, row });
                    None
                }
                Hit::Outside => None,
            }
        }
        MouseEventKind::Drag(MouseButton::Left) => {
            let available = app.bounds().available;
            let ratios = app.drag.as_ref()?.ratios_at(ev.row, available)?;
            app.pane_ratios = ratios;
            app.refresh_scroll();
            None
        }
        MouseEventKind::Up(MouseButton::Left) => {
            app.drag.take()?;
            Some(Effect::PersistConfig(app.config_snapshot()))
        }
        _ => None,
    }
}
