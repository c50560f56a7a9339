use chrono::Local;
use ratatui::{
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Wrap},
    Frame,
};
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use crate::issue::{BoardIssueView, Issue, Status};

use super::app::{modal_viewport, App, ConfirmKind, ListKind, ListOverlay};
use super::board::{EditorField, QueryPreview};
use super::form::plain_text;
use super::keymap::{Command, Context};
use super::layout::{centered_rect, content_lines, Panel};
use super::lines::{Category, PanelLine, RowGroup};
use super::modal;

const ACCENT: Color = Color::LightCyan;
const DIM: Color = Color::DarkGray;
const SUBTLE: Color = Color::Rgb(140, 140, 140);

pub fn draw(f: &mut Frame, app: &mut App) {
    app.area = f.area();
    let bounds = app.bounds();

    if let Some(rect) = bounds.search {
        draw_search(f, app, rect);
    }
    for panel in Panel::ALL {
        draw_panel(f, app, panel, bounds.panel(panel));
    }
    if let Some(rect) = bounds.footer {
        draw_footer(f, app, rect);
    }

    // Overlays, lowest precedence first.
    if !app.modals.is_empty() {
        draw_modal(f, app);
    }
    if app.list_overlay.is_some() {
        draw_list_overlay(f, app);
    }
    if app.form.is_some() {
        draw_form(f, app);
    }
    if app.board_picker.is_some() {
        draw_board_picker(f, app);
    }
    if app.board_editor.is_some() {
        draw_board_editor(f, app);
    }
    if app.confirm.is_some() {
        draw_confirm(f, app);
    }
    if app.close_confirm.is_some() {
        draw_close_confirm(f, app);
    }
    if app.help.is_some() {
        draw_help(f, app);
    }
    if app.getting_started {
        draw_getting_started(f);
    }
    if app.sync_prompt {
        draw_sync_prompt(f, app);
    }
}

/// Truncate to `width` display columns, ending in `…` when cut.
fn fit(text: &str, width: usize) -> String {
    if text.width() <= width {
        return text.to_string();
    }
    let mut out = String::new();
    let mut used = 0;
    for c in text.chars() {
        let w = c.width().unwrap_or(0);
        if used + w + 1 > width {
            break;
        }
        used += w;
        out.push(c);
    }
    if width > 0 {
        out.push('…');
    }
    out
}

fn cursor_line(prefix: &str, text: &str, cursor: Option<usize>) -> Line<'static> {
    let mut spans = vec![Span::styled(prefix.to_string(), Style::default().fg(ACCENT))];
    match cursor {
        Some(col) => {
            let chars: Vec<char> = text.chars().collect();
            spans.push(Span::raw(chars.iter().take(col).collect::<String>()));
            spans.push(Span::styled(
                chars.get(col).map(|c| c.to_string()).unwrap_or_else(|| " ".to_string()),
                Style::default().add_modifier(Modifier::REVERSED),
            ));
            spans.push(Span::raw(chars.iter().skip(col + 1).collect::<String>()));
        }
        None => spans.push(Span::raw(text.to_string())),
    }
    Line::from(spans)
}

fn status_color(status: Status) -> Color {
    match status {
        Status::Open => Color::White,
        Status::InProgress => Color::LightGreen,
        Status::Blocked => Color::LightRed,
        Status::InReview => Color::LightMagenta,
        Status::Closed => DIM,
    }
}

fn category_color(category: Category) -> Color {
    match category {
        Category::InProgress => Color::LightGreen,
        Category::Reviewable => Color::LightMagenta,
        Category::NeedsRework => Color::LightYellow,
        Category::Ready => ACCENT,
        Category::Blocked => Color::LightRed,
        Category::Closed => DIM,
    }
}

fn draw_search(f: &mut Frame, app: &App, area: Rect) {
    let text = app.search.text();
    let cursor = app.search.active.then(|| app.search.input.cursor().1);
    let mut lines = vec![cursor_line(" / ", &text, cursor)];
    lines.push(match &app.query_error {
        Some(e) => Line::from(Span::styled(format!("   {}", e), Style::default().fg(Color::LightRed))),
        None if app.search.active => Line::from(Span::styled(
            "   enter confirm · esc clear · ctrl+u erase",
            Style::default().fg(DIM),
        )),
        None => Line::from(Span::styled("   / to edit the filter", Style::default().fg(DIM))),
    });
    f.render_widget(Paragraph::new(lines), area);
}

fn panel_title(app: &App, panel: Panel) -> Line<'static> {
    let count = app.panel_model(panel).len();
    let name = match (panel, &app.board) {
        (Panel::TaskList, Some(board)) => board.title(),
        _ => panel.title().to_string(),
    };
    Line::from(vec![
        Span::styled(format!(" {} ", name), Style::default().fg(ACCENT).add_modifier(Modifier::BOLD)),
        Span::styled(format!("({}) ", count), Style::default().fg(DIM)),
    ])
}

fn panel_summary(app: &App, panel: Panel) -> Line<'static> {
    let dim = Style::default().fg(DIM);
    match panel {
        Panel::CurrentWork => {
            let focus = app
                .focused
                .as_ref()
                .map(|i| format!("focus {}", i.id))
                .unwrap_or_else(|| "no focused issue".to_string());
            Line::from(Span::styled(format!("session {} · {}", app.session, focus), dim))
        }
        Panel::TaskList => {
            if let Some(board) = &app.board {
                let query = if board.board.query.is_empty() { "all issues" } else { board.board.query.as_str() };
                let state = if board.loaded { "" } else { " · loading" };
                return Line::from(Span::styled(format!("{}{}", query, state), dim));
            }
            let mut spans = vec![Span::styled(
                format!(
                    "sort:{} type:{} closed:{}",
                    app.filter.sort_mode.label(),
                    app.filter.type_filter.as_deref().unwrap_or("all"),
                    if app.filter.include_closed { "shown" } else { "hidden" },
                ),
                dim,
            )];
            if app.query_error.is_some() {
                spans.push(Span::styled("  query error", Style::default().fg(Color::LightRed)));
            }
            Line::from(spans)
        }
        Panel::Activity => Line::from(Span::styled(format!("{} recent events", app.activity.len()), dim)),
    }
}

fn draw_panel(f: &mut Frame, app: &App, panel: Panel, area: Rect) {
    if area.height < 3 {
        return;
    }
    let active = app.active_panel == panel;
    let block = Block::default()
        .title(panel_title(app, panel))
        .borders(Borders::ALL)
        .border_style(Style::default().fg(if active { ACCENT } else { DIM }));
    let inner = block.inner(area);
    f.render_widget(block, area);
    if inner.height == 0 {
        return;
    }

    f.render_widget(Paragraph::new(panel_summary(app, panel)), Rect { height: 1, ..inner });
    let content = Rect::new(inner.x, inner.y + 1, inner.width, inner.height.saturating_sub(1));

    let model = app.panel_model(panel);
    if model.is_empty() {
        let text = if app.loaded { "Nothing here" } else { "Loading…" };
        f.render_widget(Paragraph::new(Span::styled(text, Style::default().fg(DIM))), content);
        return;
    }

    let state = *app.scroll_state(panel);
    let width = content.width as usize;
    let lines: Vec<Line> = model
        .plan(state.offset, content_lines(area.height))
        .into_iter()
        .map(|line| match line {
            PanelLine::MoreAbove => Line::from(Span::styled("  ▲ more above", Style::default().fg(DIM))),
            PanelLine::MoreBelow => Line::from(Span::styled("  ▼ more below", Style::default().fg(DIM))),
            PanelLine::Separator => Line::from(""),
            PanelLine::SectionHeader => {
                let n = model.groups.iter().filter(|g| **g == RowGroup::InProgressSection).count();
                Line::from(Span::styled(
                    format!("── In Progress ({}) ", n),
                    Style::default().fg(SUBTLE).add_modifier(Modifier::BOLD),
                ))
            }
            PanelLine::CategoryHeader(c) => {
                let n = model.groups.iter().filter(|g| **g == RowGroup::Category(c)).count();
                Line::from(Span::styled(
                    format!("── {} ({}) ", c.label(), n),
                    Style::default().fg(category_color(c)).add_modifier(Modifier::BOLD),
                ))
            }
            PanelLine::TableHeader => Line::from(Span::styled(
                fit("TIME      SESSION       ACTION          ISSUE      MESSAGE", width),
                Style::default().fg(SUBTLE).add_modifier(Modifier::BOLD),
            )),
            PanelLine::Row(i) => {
                let selected = i == state.cursor;
                let line = row_line(app, panel, i, width);
                if selected {
                    let bg = if active { Color::Rgb(30, 50, 70) } else { Color::Rgb(40, 40, 40) };
                    line.style(Style::default().bg(bg).add_modifier(Modifier::BOLD))
                } else {
                    line
                }
            }
        })
        .collect();
    f.render_widget(Paragraph::new(lines), content);
}

fn row_line(app: &App, panel: Panel, row: usize, width: usize) -> Line<'static> {
    match panel {
        Panel::CurrentWork => {
            let rows = app.current_work_rows();
            let Some(issue) = rows.get(row) else {
                return Line::from("");
            };
            let is_focused = app.focused.as_ref().is_some_and(|f| f.id == issue.id);
            issue_line(issue, if is_focused { "★ " } else { "  " }, width)
        }
        Panel::TaskList => match &app.board {
            Some(board) => match board.current_rows().get(row) {
                Some(view) => board_line(view, width),
                None => Line::from(""),
            },
            None => match app.tasks.get(row) {
                Some(issue) => issue_line(issue, "  ", width),
                None => Line::from(""),
            },
        },
        Panel::Activity => {
            let Some(entry) = app.activity.get(row) else {
                return Line::from("");
            };
            let head = format!(
                "{:<9} {:<13} {:<15} {:<10} ",
                entry.timestamp.with_timezone(&Local).format("%H:%M:%S"),
                fit(&entry.session_id, 13),
                fit(&entry.action.to_string(), 15),
                entry.issue_id.as_deref().unwrap_or("-"),
            );
            let rest = width.saturating_sub(head.width());
            Line::from(vec![
                Span::styled(head, Style::default().fg(SUBTLE)),
                Span::raw(fit(&entry.message, rest)),
            ])
        }
    }
}

fn issue_line(issue: &Issue, marker: &str, width: usize) -> Line<'static> {
    let head = format!("{}{:<9} {} {:<8} ", marker, issue.id, issue.priority, issue.issue_type);
    let status = format!(" {}", issue.status);
    let title_width = width.saturating_sub(head.width() + status.width());
    Line::from(vec![
        Span::styled(head, Style::default().fg(Color::Yellow)),
        Span::raw(fit(&issue.title, title_width)),
        Span::styled(status, Style::default().fg(status_color(issue.status))),
    ])
}

fn board_line(view: &BoardIssueView, width: usize) -> Line<'static> {
    let pos = if view.has_position {
        format!("{:>7} ", view.position)
    } else {
        "      · ".to_string()
    };
    let mut line = issue_line(&view.issue, "", width.saturating_sub(pos.width()));
    line.spans.insert(0, Span::styled(pos, Style::default().fg(DIM)));
    line
}

fn footer_hints(ctx: Context) -> &'static [(Command, &'static str)] {
    match ctx {
        Context::Main => &[
            (Command::OpenDetails, "open"),
            (Command::NewIssue, "new"),
            (Command::SearchStart, "search"),
            (Command::OpenBoardPicker, "boards"),
            (Command::CycleSort, "sort"),
            (Command::ToggleClosed, "closed"),
            (Command::ToggleHelp, "help"),
            (Command::Quit, "quit"),
        ],
        Context::Board => &[
            (Command::MoveDown, "move down"),
            (Command::MoveUp, "move up"),
            (Command::ToggleView, "view"),
            (Command::CycleStatusFilter, "status"),
            (Command::ExitBoard, "exit"),
            (Command::ToggleHelp, "help"),
        ],
        Context::Modal
        | Context::EpicTasks
        | Context::ParentEpicFocused
        | Context::BlockedByFocused
        | Context::BlocksFocused => &[
            (Command::ModalPrev, "prev"),
            (Command::ModalNext, "next"),
            (Command::FocusNextSection, "sections"),
            (Command::ModalSelect, "open link"),
            (Command::EditIssue, "edit"),
            (Command::ModalClose, "close"),
        ],
        Context::Search => &[
            (Command::SearchConfirm, "confirm"),
            (Command::SearchExit, "clear"),
            (Command::SearchClear, "erase"),
        ],
        Context::Form => &[
            (Command::FormSubmit, "submit"),
            (Command::FormToggleExtended, "more fields"),
            (Command::FormOpenEditor, "editor"),
            (Command::FormCancel, "cancel"),
        ],
        Context::BoardPicker => &[
            (Command::SelectBoard, "open"),
            (Command::NewBoard, "new"),
            (Command::EditBoard, "edit"),
            (Command::DeleteBoard, "delete"),
            (Command::CloseOverlay, "close"),
        ],
        Context::BoardEditor => &[
            (Command::FormSubmit, "save"),
            (Command::FormNextField, "field"),
            (Command::ShowTdqHelp, "query help"),
            (Command::FormCancel, "cancel"),
        ],
        Context::Confirm | Context::SyncPrompt => &[(Command::Confirm, "yes"), (Command::Cancel, "no")],
        Context::CloseConfirm => &[(Command::Confirm, "close issue"), (Command::Cancel, "cancel")],
        Context::Help => &[(Command::CursorDown, "scroll"), (Command::ToggleHelp, "close")],
        Context::Handoffs | Context::Stats | Context::TdqHelp => {
            &[(Command::CursorDown, "scroll"), (Command::CloseOverlay, "close")]
        }
        Context::GettingStarted => &[(Command::NewIssue, "new issue"), (Command::CloseOverlay, "dismiss")],
    }
}

fn draw_footer(f: &mut Frame, app: &App, area: Rect) {
    let ctx = app.context();
    let mut spans = Vec::new();
    for (command, text) in footer_hints(ctx) {
        let mut lookup = Some(ctx);
        let mut label = None;
        while let (Some(c), None) = (lookup, &label) {
            label = app.registry.key_label(c, *command);
            lookup = c.fallback();
        }
        if let Some(label) = label {
            spans.push(Span::styled(label, Style::default().fg(ACCENT)));
            spans.push(Span::styled(format!(" {}  ", text), Style::default().fg(DIM)));
        }
    }
    if let Some(status) = &app.status {
        let color = if status.error { Color::LightRed } else { Color::LightYellow };
        spans.push(Span::styled(" │ ", Style::default().fg(DIM)));
        spans.push(Span::styled(status.text.clone(), Style::default().fg(color)));
    }

    let footer = Paragraph::new(Line::from(spans)).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(DIM)),
    );
    f.render_widget(footer, area);
}

fn popup(title: String, color: Color) -> Block<'static> {
    Block::default()
        .title(Span::styled(title, Style::default().fg(color).add_modifier(Modifier::BOLD)))
        .borders(Borders::ALL)
        .border_style(Style::default().fg(color))
}

fn draw_modal(f: &mut Frame, app: &mut App) {
    let area = centered_rect(80, 80, f.area());
    let (width, viewport) = modal_viewport(f.area());
    let depth = app.modals.len();
    let Some(m) = app.modals.top_mut() else {
        return;
    };
    let body = modal::body(m, width);
    modal::sync_scroll(m, &body, viewport);

    let mut title = m.title();
    if depth > 1 {
        title.push_str(&format!("[{}] ", depth));
    }
    let block = popup(title, ACCENT);
    let inner = block.inner(area);
    f.render_widget(Clear, area);
    f.render_widget(block, area);
    if inner.height < 2 {
        return;
    }

    let body_area = Rect { height: inner.height - 1, ..inner };
    f.render_widget(Paragraph::new(body.lines).scroll((m.scroll as u16, 0)), body_area);

    let position = m
        .scope
        .iter()
        .position(|id| *id == m.issue_id)
        .map(|i| format!("{}/{}  ", i + 1, m.scope.len()))
        .unwrap_or_default();
    let hint = Line::from(vec![
        Span::styled(position, Style::default().fg(SUBTLE)),
        Span::styled(
            "h/l prev/next · tab sections · enter open · e edit · esc close",
            Style::default().fg(DIM),
        ),
    ]);
    f.render_widget(
        Paragraph::new(hint),
        Rect { y: inner.y + inner.height - 1, height: 1, ..inner },
    );
}

fn draw_form(f: &mut Frame, app: &App) {
    let Some(form) = &app.form else {
        return;
    };
    let area = centered_rect(70, 85, f.area());
    let mut title = form.heading();
    if app.form_saving {
        title.push_str("(saving) ");
    }
    let block = popup(title, ACCENT);
    let inner = block.inner(area);
    f.render_widget(Clear, area);
    f.render_widget(block, area);

    let lines = form.render_with_dropdown();
    let focus = lines
        .iter()
        .position(|l| plain_text(l).starts_with("▸ "))
        .unwrap_or(lines.len());
    let height = inner.height as usize;
    // Keep the focused label and a few lines of its value on screen.
    let scroll = (focus + 4).saturating_sub(height).min(lines.len().saturating_sub(1));
    f.render_widget(Paragraph::new(lines).scroll((scroll as u16, 0)), inner);
}

fn draw_board_picker(f: &mut Frame, app: &App) {
    let Some(picker) = &app.board_picker else {
        return;
    };
    let area = centered_rect(50, 60, f.area());
    let block = popup(" Boards ".to_string(), ACCENT);
    let inner = block.inner(area);
    f.render_widget(Clear, area);
    f.render_widget(block, area);

    let lines: Vec<Line> = if picker.loading {
        vec![Line::from(Span::styled("Loading…", Style::default().fg(DIM)))]
    } else if picker.boards.is_empty() {
        vec![Line::from(Span::styled("No boards. Press n to create one.", Style::default().fg(DIM)))]
    } else {
        picker
            .boards
            .iter()
            .enumerate()
            .map(|(i, board)| {
                let selected = i == picker.cursor;
                let style = if selected {
                    Style::default().fg(Color::Black).bg(ACCENT).add_modifier(Modifier::BOLD)
                } else {
                    Style::default()
                };
                let marker = if selected { "▸ " } else { "  " };
                let query = if board.is_builtin { "built-in".to_string() } else { board.query.clone() };
                Line::from(vec![
                    Span::styled(format!("{}{}", marker, board.name), style),
                    Span::styled(format!("  {}", query), Style::default().fg(DIM)),
                ])
            })
            .collect()
    };
    let scroll = (picker.cursor + 1).saturating_sub(inner.height as usize);
    f.render_widget(Paragraph::new(lines).scroll((scroll as u16, 0)), inner);
}

fn draw_board_editor(f: &mut Frame, app: &App) {
    let Some(editor) = &app.board_editor else {
        return;
    };
    let area = centered_rect(70, 40, f.area());
    let title = match &editor.original {
        Some(b) => format!(" Edit board {} ", b.name),
        None => " New board ".to_string(),
    };
    let block = popup(title, ACCENT);
    let inner = block.inner(area);
    f.render_widget(Clear, area);
    f.render_widget(block, area);

    let label = |text: &str, focused: bool| {
        let style = if focused {
            Style::default().fg(ACCENT).add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(SUBTLE)
        };
        Line::from(Span::styled(format!("{}{}", if focused { "▸ " } else { "  " }, text), style))
    };
    let name_focused = editor.focus == EditorField::Name;
    let preview = match &editor.preview {
        None => Line::from(""),
        Some(QueryPreview::Pending) => Line::from(Span::styled("    checking…", Style::default().fg(DIM))),
        Some(QueryPreview::Matches(n)) => Line::from(Span::styled(
            format!("    {} matching issues", n),
            Style::default().fg(Color::LightGreen),
        )),
        Some(QueryPreview::Error(e)) => {
            Line::from(Span::styled(format!("    {}", e), Style::default().fg(Color::LightRed)))
        }
    };
    let lines = vec![
        label("Name", name_focused),
        cursor_line("    ", &editor.name_text(), name_focused.then(|| editor.name.cursor().1)),
        Line::from(""),
        label("Query", !name_focused),
        cursor_line("    ", &editor.query_text(), (!name_focused).then(|| editor.query.cursor().1)),
        preview,
        Line::from(""),
        Line::from(Span::styled(
            "  tab switch · f1 query help · ctrl+s save · esc cancel",
            Style::default().fg(DIM),
        )),
    ];
    f.render_widget(Paragraph::new(lines).wrap(Wrap { trim: false }), inner);
}

fn draw_confirm(f: &mut Frame, app: &App) {
    let Some(confirm) = &app.confirm else {
        return;
    };
    let area = centered_rect(50, 25, f.area());
    let (title, question, detail) = match confirm {
        ConfirmKind::DeleteIssue { issue_id, title } => {
            (" Delete Issue ", format!("Delete issue {}?", issue_id), title.clone())
        }
        ConfirmKind::DeleteBoard { name, .. } => (
            " Delete Board ",
            format!("Delete board '{}'?", name),
            "Saved positions on this board are lost.".to_string(),
        ),
    };
    let text = vec![
        Line::from(""),
        Line::from(Span::styled(
            format!("  {}", question),
            Style::default().fg(Color::White).add_modifier(Modifier::BOLD),
        )),
        Line::from(Span::styled(format!("  {}", detail), Style::default().fg(Color::LightRed))),
        Line::from(""),
        Line::from(Span::styled("  y confirm · n cancel", Style::default().fg(DIM))),
    ];
    f.render_widget(Clear, area);
    f.render_widget(
        Paragraph::new(text)
            .wrap(Wrap { trim: false })
            .block(popup(title.to_string(), Color::LightRed)),
        area,
    );
}

fn draw_close_confirm(f: &mut Frame, app: &App) {
    let Some(dialog) = &app.close_confirm else {
        return;
    };
    let area = centered_rect(60, 30, f.area());
    let reason = dialog.reason.lines().join(" ");
    let text = vec![
        Line::from(""),
        Line::from(Span::styled(
            format!("  Close {}: {}", dialog.issue_id, dialog.title),
            Style::default().fg(Color::White).add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
        Line::from(Span::styled("  Reason (optional)", Style::default().fg(SUBTLE))),
        cursor_line("  ", &reason, Some(dialog.reason.cursor().1)),
        Line::from(""),
        Line::from(Span::styled("  enter close · esc cancel", Style::default().fg(DIM))),
    ];
    f.render_widget(Clear, area);
    f.render_widget(
        Paragraph::new(text)
            .wrap(Wrap { trim: false })
            .block(popup(" Close Issue ".to_string(), Color::LightYellow)),
        area,
    );
}

/// Render scrollable text lines, clamping the stored offset to the content.
fn scrolled(f: &mut Frame, area: Rect, block: Block<'static>, lines: Vec<Line<'static>>, scroll: &mut usize) {
    let inner = block.inner(area);
    let max = lines.len().saturating_sub(inner.height as usize);
    *scroll = (*scroll).min(max);
    f.render_widget(Clear, area);
    f.render_widget(Paragraph::new(lines).block(block).scroll((*scroll as u16, 0)), area);
}

fn draw_help(f: &mut Frame, app: &mut App) {
    let area = centered_rect(70, 80, f.area());
    let Some(help) = app.help.as_mut() else {
        return;
    };
    let text = app.registry.help_for(help.context);
    let lines: Vec<Line<'static>> = text
        .lines()
        .map(|l| {
            if l.starts_with("  ") {
                Line::from(l.to_string())
            } else {
                Line::from(Span::styled(l.to_string(), Style::default().fg(ACCENT).add_modifier(Modifier::BOLD)))
            }
        })
        .collect();
    scrolled(f, area, popup(" Keys ".to_string(), ACCENT), lines, &mut help.scroll);
}

fn draw_list_overlay(f: &mut Frame, app: &mut App) {
    let area = centered_rect(70, 80, f.area());
    let Some(kind) = app.list_overlay.as_ref().map(|l| l.kind) else {
        return;
    };
    let (title, lines) = match kind {
        ListKind::Handoffs => (" Handoffs ", app.list_overlay.as_ref().map(handoff_lines).unwrap_or_default()),
        ListKind::Stats => (" Stats ", stats_lines(app)),
        ListKind::TdqHelp => (" Query language ", tdq_help_lines()),
    };
    if let Some(list) = app.list_overlay.as_mut() {
        scrolled(f, area, popup(title.to_string(), ACCENT), lines, &mut list.scroll);
    }
}

fn handoff_lines(list: &ListOverlay) -> Vec<Line<'static>> {
    if list.loading {
        return vec![Line::from(Span::styled("Loading…", Style::default().fg(DIM)))];
    }
    if list.handoffs.is_empty() {
        return vec![Line::from(Span::styled("No handoffs recorded.", Style::default().fg(DIM)))];
    }
    let mut lines = Vec::new();
    for h in &list.handoffs {
        lines.push(Line::from(vec![
            Span::styled(h.issue_id.clone(), Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)),
            Span::styled(
                format!("  {}  {}", h.session_id, h.timestamp.with_timezone(&Local).format("%Y-%m-%d %H:%M")),
                Style::default().fg(DIM),
            ),
        ]));
        for (label, items, color) in [
            ("done", &h.done, Color::LightGreen),
            ("remaining", &h.remaining, Color::LightYellow),
            ("decisions", &h.decisions, ACCENT),
        ] {
            for item in items {
                lines.push(Line::from(vec![
                    Span::styled(format!("  {:<10} ", label), Style::default().fg(color)),
                    Span::raw(item.clone()),
                ]));
            }
        }
        lines.push(Line::from(""));
    }
    lines
}

fn stats_lines(app: &App) -> Vec<Line<'static>> {
    let mut lines = vec![
        Line::from(Span::styled(
            format!("Total issues: {}", app.total_issues),
            Style::default().add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
    ];
    let widest = app.status_counts.iter().map(|(_, n)| *n).max().unwrap_or(0).max(1);
    for status in Status::ALL {
        let n = app.status_count(status);
        let bar = "█".repeat((n * 30).div_ceil(widest).min(30));
        lines.push(Line::from(vec![
            Span::raw(format!("  {:<12} {:>4}  ", status.to_string(), n)),
            Span::styled(bar, Style::default().fg(status_color(status))),
        ]));
    }
    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled("Task List", Style::default().fg(SUBTLE).add_modifier(Modifier::BOLD))));
    for category in [
        Category::Reviewable,
        Category::NeedsRework,
        Category::Ready,
        Category::Blocked,
        Category::Closed,
    ] {
        let n = app.tasks.iter().filter(|i| Category::of(i) == Some(category)).count();
        lines.push(Line::from(vec![
            Span::styled(format!("  {:<14}", category.label()), Style::default().fg(category_color(category))),
            Span::raw(n.to_string()),
        ]));
    }
    lines
}

fn tdq_help_lines() -> Vec<Line<'static>> {
    let heading = |t: &str| Line::from(Span::styled(t.to_string(), Style::default().fg(ACCENT).add_modifier(Modifier::BOLD)));
    let row = |code: &str, text: &str| {
        Line::from(vec![
            Span::styled(format!("  {:<32}", code), Style::default().fg(Color::Yellow)),
            Span::raw(text.to_string()),
        ])
    };
    vec![
        heading("Terms"),
        row("cache", "title or id contains 'cache'"),
        row("status = open", "field comparison (= != ~ < > <= >=)"),
        row("priority <= P1", "priorities compare by rank"),
        row("labels ~ backend", "list fields match any element"),
        row("updated > -7d", "dates: today, -Nd, YYYY-MM-DD"),
        row("implementer = @me", "@me is the current session"),
        Line::from(""),
        heading("Combining"),
        row("a AND b   a b", "both (AND is implied)"),
        row("a OR b", "either"),
        row("NOT a", "negation"),
        row("( ... )", "grouping"),
        Line::from(""),
        heading("Functions"),
        row("has(parent)", "field is set"),
        row("is(blocked)", "status shorthand"),
        row("any(labels, ui, api)", "field matches any value"),
        row("descendant_of(td-0001)", "issue sits under the epic"),
        Line::from(""),
        heading("Sorting"),
        row("sort:priority  sort:-updated", "created updated id title points"),
        Line::from(""),
        heading("Fields"),
        Line::from("  id title description status type priority labels points"),
        Line::from("  parent implementer reviewer created updated"),
    ]
}

fn draw_getting_started(f: &mut Frame) {
    let area = centered_rect(60, 40, f.area());
    let text = vec![
        Line::from(""),
        Line::from(Span::styled(
            "  No issues yet.",
            Style::default().fg(Color::White).add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
        Line::from("  Agents file and update issues in this database; this"),
        Line::from("  monitor shows their work as it happens."),
        Line::from(""),
        Line::from(vec![
            Span::styled("  n", Style::default().fg(Color::LightGreen)),
            Span::styled(" create the first issue   ", Style::default().fg(DIM)),
            Span::styled("enter", Style::default().fg(ACCENT)),
            Span::styled(" dismiss", Style::default().fg(DIM)),
        ]),
    ];
    f.render_widget(Clear, area);
    f.render_widget(
        Paragraph::new(text)
            .wrap(Wrap { trim: false })
            .block(popup(" Getting started ".to_string(), ACCENT)),
        area,
    );
}

fn draw_sync_prompt(f: &mut Frame, app: &App) {
    let area = centered_rect(60, 25, f.area());
    let command = app.config_file.sync_command.clone().unwrap_or_default();
    let text = vec![
        Line::from(""),
        Line::from(Span::styled(
            "  Sync the issue database before starting?",
            Style::default().fg(Color::White).add_modifier(Modifier::BOLD),
        )),
        Line::from(Span::styled(format!("  $ {}", command), Style::default().fg(Color::Yellow))),
        Line::from(""),
        Line::from(Span::styled("  y run · n skip", Style::default().fg(DIM))),
    ];
    f.render_widget(Clear, area);
    f.render_widget(
        Paragraph::new(text)
            .wrap(Wrap { trim: false })
            .block(popup(" Sync ".to_string(), Color::LightYellow)),
        area,
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fit_truncates_by_display_width() {
        assert_eq!(fit("short", 10), "short");
        assert_eq!(fit("abcdefgh", 5), "abcd…");
        // Wide characters take two columns each.
        assert_eq!(fit("日本語テキスト", 5), "日本…");
    }
}
