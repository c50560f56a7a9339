mod helpers;

use chrono::Utc;
use ratatui::crossterm::event::KeyCode;

use helpers::{ctrl, issue, key, Harness};
use tdmon::config::SortMode;
use tdmon::issue::{ActionType, Handoff, Status};
use tdmon::store::{IssueStore, BUILTIN_BOARD_ID};
use tdmon::tui::app::{Effect, ListKind, Msg};
use tdmon::tui::board::QueryPreview;
use tdmon::tui::effects;
use tdmon::tui::keymap::Context;
use tdmon::tui::layout::Panel;
use tdmon::tui::update::update;

fn task_ids(h: &Harness) -> Vec<String> {
    h.app.tasks.iter().map(|i| i.id.clone()).collect()
}

#[test]
fn search_filters_live_and_confirm_persists() {
    let mut h = Harness::new(&[
        issue("td-1", "crash on save", Status::Open),
        issue("td-2", "dark mode", Status::Open),
    ]);

    h.press(KeyCode::Char('/'));
    assert_eq!(h.app.context(), Context::Search);
    h.type_str("crash");
    assert_eq!(task_ids(&h), vec!["td-1"]);

    h.press(KeyCode::Enter);
    assert!(!h.app.search.active);
    assert_eq!(h.app.filter.search_query, "crash");
    assert_eq!(h.ctx.config.load_file().filter.search_query, "crash");

    h.press(KeyCode::Char('/'));
    h.press(KeyCode::Esc);
    assert_eq!(h.app.filter.search_query, "");
    assert_eq!(task_ids(&h).len(), 2);
}

fn results(h: &Harness, effect: Effect) -> Vec<Msg> {
    effect
        .flatten()
        .into_iter()
        .flat_map(|e| effects::execute(e, &h.ctx))
        .collect()
}

#[test]
fn late_result_for_an_older_query_is_dropped() {
    let mut h = Harness::new(&[
        issue("td-1", "alpha one", Status::Open),
        issue("td-2", "alpha two", Status::Open),
        issue("td-3", "beta", Status::Open),
    ]);
    h.press(KeyCode::Char('/'));

    let older = update(&mut h.app, Msg::Key(key(KeyCode::Char('a')))).unwrap();
    update(&mut h.app, Msg::Key(key(KeyCode::Char('l'))));
    let newer = update(&mut h.app, Msg::Key(key(KeyCode::Char('p')))).unwrap();
    let (older, newer) = (results(&h, older), results(&h, newer));

    for msg in newer {
        update(&mut h.app, msg);
    }
    assert_eq!(task_ids(&h).len(), 2);
    for msg in older {
        update(&mut h.app, msg);
    }

    assert_eq!(h.app.search.text(), "alp");
    let mut ids = task_ids(&h);
    ids.sort();
    assert_eq!(ids, vec!["td-1", "td-2"]);
}

#[test]
fn refresh_issued_before_a_newer_one_is_dropped() {
    let mut h = Harness::new(&[issue("td-1", "one", Status::Open)]);
    let first = h.app.refresh_all().unwrap();
    let first = results(&h, first);
    h.store.insert_issue(issue("td-2", "two", Status::Open)).unwrap();
    let second = h.app.refresh_all().unwrap();
    let second = results(&h, second);

    for msg in second.into_iter().chain(first) {
        update(&mut h.app, msg);
    }
    assert_eq!(task_ids(&h).len(), 2);
}

#[test]
fn broken_query_reports_error_and_keeps_rows() {
    let mut h = Harness::new(&[issue("td-1", "one", Status::Open)]);

    h.press(KeyCode::Char('/'));
    h.type_str("(status");
    assert!(h.app.query_error.is_some());
    assert_eq!(task_ids(&h), vec!["td-1"]);

    h.send(Msg::Key(ctrl('u')));
    assert!(h.app.query_error.is_none());
}

#[test]
fn sort_and_type_cycles_rewrite_the_query() {
    let mut h = Harness::new(&[issue("td-1", "one", Status::Open)]);

    h.press(KeyCode::Char('S'));
    assert_eq!(h.app.filter.sort_mode, SortMode::Created);
    assert!(h.app.filter.search_query.contains("sort:-created"));

    h.press(KeyCode::Char('T'));
    assert_eq!(h.app.filter.type_filter.as_deref(), Some("bug"));
    assert!(h.app.filter.search_query.contains("type = bug"));
    assert!(h.app.tasks.is_empty());

    let saved = h.ctx.config.load_file();
    assert_eq!(saved.filter.sort_mode, SortMode::Created);
    assert_eq!(saved.filter.type_filter.as_deref(), Some("bug"));
}

#[test]
fn toggling_closed_shows_closed_issues() {
    let mut h = Harness::new(&[
        issue("td-1", "open", Status::Open),
        issue("td-2", "done", Status::Closed),
    ]);
    assert_eq!(task_ids(&h), vec!["td-1"]);

    h.press(KeyCode::Char('C'));
    assert!(h.app.filter.include_closed);
    assert_eq!(task_ids(&h), vec!["td-1", "td-2"]);
}

#[test]
fn two_key_sequence_jumps_to_top() {
    let seed: Vec<_> = (0..6)
        .map(|i| issue(&format!("td-{}", i), "row", Status::Open))
        .collect();
    let mut h = Harness::new(&seed);

    h.press(KeyCode::Char('G'));
    assert_eq!(h.app.scroll_state(Panel::TaskList).cursor, 5);

    h.press(KeyCode::Char('g'));
    assert_eq!(h.app.scroll_state(Panel::TaskList).cursor, 5);
    h.press(KeyCode::Char('g'));
    assert_eq!(h.app.scroll_state(Panel::TaskList).cursor, 0);
}

#[test]
fn help_remembers_the_context_it_was_opened_from() {
    let mut h = Harness::new(&[issue("td-1", "one", Status::Open)]);

    h.press(KeyCode::Enter);
    assert_eq!(h.app.context(), Context::Modal);
    h.press(KeyCode::Char('?'));
    assert_eq!(h.app.help.map(|help| help.context), Some(Context::Modal));

    h.press(KeyCode::Esc);
    assert!(h.app.help.is_none());
    assert_eq!(h.app.modals.len(), 1);
}

#[test]
fn delete_asks_first_and_closes_the_modal() {
    let mut h = Harness::new(&[
        issue("td-1", "one", Status::Open),
        issue("td-2", "two", Status::Open),
    ]);
    let target = h.app.selected_id(Panel::TaskList).unwrap();

    h.press(KeyCode::Enter);
    h.press(KeyCode::Char('d'));
    assert_eq!(h.app.context(), Context::Confirm);
    h.press(KeyCode::Char('n'));
    assert!(h.app.confirm.is_none());
    assert!(h.store.get_issue(&target).is_ok());

    h.press(KeyCode::Char('d'));
    h.press(KeyCode::Char('y'));
    assert!(h.app.modals.is_empty());
    assert!(h.store.get_issue(&target).is_err());
    assert!(!task_ids(&h).contains(&target));
}

#[test]
fn close_records_the_reason() {
    let mut h = Harness::new(&[issue("td-1", "one", Status::Open)]);

    h.press(KeyCode::Char('c'));
    assert_eq!(h.app.context(), Context::CloseConfirm);
    h.type_str("dup of td-9");
    h.press(KeyCode::Enter);

    assert!(h.app.close_confirm.is_none());
    assert_eq!(h.store.get_issue("td-1").unwrap().status, Status::Closed);
    let log = h.store.activity(5).unwrap();
    assert!(log
        .iter()
        .any(|e| e.action == ActionType::Close && e.message.contains("dup of td-9")));
}

#[test]
fn failed_action_flashes_an_error_without_changes() {
    let mut h = Harness::new(&[issue("td-1", "one", Status::Open)]);

    h.press(KeyCode::Char('a'));

    let status = h.app.status.as_ref().unwrap();
    assert!(status.error);
    assert_eq!(h.store.get_issue("td-1").unwrap().status, Status::Open);
}

#[test]
fn mark_for_review_moves_issue_to_reviewable() {
    let mut h = Harness::new(&[issue("td-1", "one", Status::InProgress)]);

    h.press(KeyCode::Char('1'));
    assert_eq!(h.app.selected_id(Panel::CurrentWork).as_deref(), Some("td-1"));
    h.press(KeyCode::Char('m'));

    assert_eq!(h.store.get_issue("td-1").unwrap().status, Status::InReview);
    assert!(h.app.in_progress.is_empty());
    assert_eq!(task_ids(&h), vec!["td-1"]);
}

#[test]
fn getting_started_leads_to_a_new_issue() {
    let mut h = Harness::new(&[]);
    assert_eq!(h.app.context(), Context::GettingStarted);

    h.press(KeyCode::Char('n'));
    assert!(!h.app.getting_started);
    assert_eq!(h.app.context(), Context::Form);

    h.type_str("First issue");
    h.send(Msg::Key(ctrl('s')));

    assert!(h.app.form.is_none());
    assert_eq!(h.app.tasks.len(), 1);
    assert_eq!(h.app.tasks[0].title, "First issue");
    assert!(!h.app.getting_started);
}

#[test]
fn empty_title_keeps_the_form_open() {
    let mut h = Harness::new(&[issue("td-1", "one", Status::Open)]);

    h.press(KeyCode::Char('n'));
    h.send(Msg::Key(ctrl('s')));

    assert!(h.app.form.is_some());
    assert!(!h.app.form_saving);
    assert!(h.app.status.as_ref().is_some_and(|s| s.error));
}

#[test]
fn board_moves_need_the_task_list() {
    let mut h = Harness::new(&[issue("td-1", "one", Status::Open)]);
    h.press(KeyCode::Char('b'));
    h.press(KeyCode::Enter);
    assert_eq!(h.app.context(), Context::Board);

    h.press(KeyCode::Char('3'));
    h.press(KeyCode::Char('J'));
    assert!(h.app.status.as_ref().unwrap().text.contains("Task List"));

    h.press(KeyCode::Esc);
    assert!(h.app.board.is_none());
}

#[test]
fn moving_past_the_board_edges_reports_why() {
    let mut h = Harness::new(&[
        issue("td-1", "one", Status::Open),
        issue("td-2", "two", Status::Open),
    ]);
    h.store.set_board_position(BUILTIN_BOARD_ID, "td-1", 10_000, "s").unwrap();
    h.store.set_board_position(BUILTIN_BOARD_ID, "td-2", 20_000, "s").unwrap();
    h.press(KeyCode::Char('b'));
    h.press(KeyCode::Enter);
    assert_eq!(h.app.board.as_ref().unwrap().scroll().cursor, 0);

    h.press(KeyCode::Char('K'));
    assert_eq!(h.app.status.as_ref().unwrap().text, "already at the top");

    h.press(KeyCode::Char('j'));
    assert_eq!(h.app.board.as_ref().unwrap().scroll().cursor, 1);
    h.press(KeyCode::Char('J'));
    assert_eq!(h.app.status.as_ref().unwrap().text, "already at the bottom");
    h.app.status = None;
    h.press(KeyCode::Char('G'));
    assert_eq!(h.app.status.as_ref().unwrap().text, "already at the bottom");

    let positions = h.store.board_positions(BUILTIN_BOARD_ID).unwrap();
    assert_eq!(positions, vec![("td-1".to_string(), 10_000), ("td-2".to_string(), 20_000)]);
}

#[test]
fn status_filter_is_cleared_before_leaving_the_board() {
    let mut h = Harness::new(&[
        issue("td-1", "one", Status::Open),
        issue("td-2", "two", Status::Blocked),
    ]);
    h.press(KeyCode::Char('b'));
    h.press(KeyCode::Enter);
    assert_eq!(h.app.board.as_ref().unwrap().current_rows().len(), 2);

    h.press(KeyCode::Char('s'));
    let rows = h.app.board.as_ref().unwrap().current_rows().to_vec();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].issue.status, Status::Open);

    h.press(KeyCode::Esc);
    assert!(h.app.board.is_some());
    assert_eq!(h.app.board.as_ref().unwrap().current_rows().len(), 2);
    h.press(KeyCode::Esc);
    assert!(h.app.board.is_none());
}

#[test]
fn board_editor_previews_and_saves() {
    let mut h = Harness::new(&[
        issue("td-1", "login bug", Status::Open),
        issue("td-2", "other", Status::Open),
    ]);
    h.press(KeyCode::Char('b'));
    h.press(KeyCode::Char('n'));
    assert_eq!(h.app.context(), Context::BoardEditor);

    h.type_str("Logins");
    h.press(KeyCode::Tab);
    h.type_str("login");
    assert_eq!(
        h.app.board_editor.as_ref().unwrap().preview,
        Some(QueryPreview::Matches(1))
    );

    h.press(KeyCode::F(1));
    assert_eq!(h.app.context(), Context::TdqHelp);
    h.press(KeyCode::Esc);
    assert_eq!(h.app.context(), Context::BoardEditor);
    assert_eq!(h.app.board_editor.as_ref().unwrap().query_text(), "login");

    h.send(Msg::Key(ctrl('s')));
    assert!(h.app.board_editor.is_none());
    let picker = h.app.board_picker.as_ref().unwrap();
    assert!(picker.boards.iter().any(|b| b.name == "Logins" && b.query == "login"));
}

#[test]
fn builtin_board_cannot_be_deleted_from_the_picker() {
    let mut h = Harness::new(&[issue("td-1", "one", Status::Open)]);
    h.press(KeyCode::Char('b'));

    h.press(KeyCode::Char('d'));
    assert!(h.app.confirm.is_none());
    assert!(h.app.status.as_ref().unwrap().error);
}

#[test]
fn handoffs_and_stats_overlays() {
    let h0 = issue("td-1", "one", Status::Open);
    let mut h = Harness::new(&[h0]);
    h.store
        .add_handoff(Handoff {
            issue_id: "td-1".to_string(),
            session_id: "ses_agent".to_string(),
            done: vec!["parser".to_string()],
            remaining: vec!["tests".to_string()],
            decisions: vec![],
            timestamp: Utc::now(),
        })
        .unwrap();

    h.press(KeyCode::Char('H'));
    let list = h.app.list_overlay.as_ref().unwrap();
    assert_eq!(list.kind, ListKind::Handoffs);
    assert!(!list.loading);
    assert_eq!(list.handoffs.len(), 1);

    h.press(KeyCode::Esc);
    h.press(KeyCode::Char('i'));
    assert_eq!(h.app.context(), Context::Stats);
    assert_eq!(h.app.status_count(Status::Open), 1);
}
