mod helpers;

use ratatui::crossterm::event::{KeyCode, MouseButton, MouseEventKind};
use ratatui::layout::Rect;

use helpers::{click, issue, key, mouse, Harness};
use tdmon::issue::{IssueType, Priority, Status};
use tdmon::store::{IssueStore, BUILTIN_BOARD_ID};
use tdmon::tui::app::Msg;
use tdmon::tui::form::FieldId;
use tdmon::tui::hit::{hit_test, Hit};
use tdmon::tui::layout::{visible_rows, Panel};
use tdmon::tui::update::update;

fn approx(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-3
}

#[test]
fn standard_terminal_layout_and_click_selects_first_row() {
    let mut h = Harness::new(&[
        issue("td-1", "first", Status::Open),
        issue("td-2", "second", Status::Open),
        issue("td-3", "third", Status::Open),
    ]);
    h.app.pane_ratios = [0.33, 0.34, 0.33];
    h.app.area = Rect::new(0, 0, 80, 24);
    h.app.active_panel = Panel::Activity;

    let bounds = h.app.bounds();
    let heights: Vec<u16> = Panel::ALL.iter().map(|p| bounds.panel(*p).height).collect();
    assert_eq!(heights, vec![7, 7, 7]);
    assert_eq!(visible_rows(bounds.panel(Panel::TaskList).height), 2);

    // Border, title, then the Ready header; the first row follows at y=10.
    let task_list = bounds.panel(Panel::TaskList);
    assert_eq!(task_list.y, 7);
    h.send(Msg::Mouse(click(10, task_list.y + 3)));

    assert_eq!(h.app.active_panel, Panel::TaskList);
    assert_eq!(h.app.scroll_state(Panel::TaskList).cursor, 0);
    assert_eq!(h.app.selected_id(Panel::TaskList), Some(h.app.tasks[0].id.clone()));
}

#[test]
fn literal_click_at_10_12_lands_on_the_third_ready_row() {
    let mut h = Harness::new(&[
        issue("td-1", "first", Status::Open),
        issue("td-2", "second", Status::Open),
        issue("td-3", "third", Status::Open),
    ]);
    h.app.pane_ratios = [0.33, 0.34, 0.33];
    h.app.area = Rect::new(0, 0, 80, 24);

    // The Ready header takes a content line, so y=12 is two rows below the first.
    let bounds = h.app.bounds();
    let models = h.app.models();
    assert_eq!(
        hit_test(&bounds, &models, h.app.offsets(), 10, 12),
        Hit::Panel { panel: Panel::TaskList, row: 2 }
    );
    assert_eq!(
        hit_test(&bounds, &models, h.app.offsets(), 10, 9),
        Hit::Panel { panel: Panel::TaskList, row: -1 }
    );

    h.send(Msg::Mouse(click(10, 12)));
    assert_eq!(h.app.active_panel, Panel::TaskList);
    assert_eq!(h.app.scroll_state(Panel::TaskList).cursor, 2);
    assert_eq!(h.app.selected_id(Panel::TaskList), Some(h.app.tasks[2].id.clone()));
}

#[test]
fn scrolled_past_first_category_hits_headers_as_chrome() {
    let mut seed = Vec::new();
    for i in 0..3 {
        seed.push(issue(&format!("td-r{}", i), "review me", Status::InReview));
    }
    for i in 0..5 {
        seed.push(issue(&format!("td-o{}", i), "ready", Status::Open));
    }
    let mut h = Harness::new(&seed);
    h.app.area = Rect::new(0, 0, 80, 40);
    {
        let state = h.app.scroll_mut(Panel::TaskList);
        state.offset = 4;
        state.cursor = 5;
    }

    let bounds = h.app.bounds();
    let models = h.app.models();
    let top = bounds.panel(Panel::TaskList).y + 2;
    let at = |rel: u16| hit_test(&bounds, &models, h.app.offsets(), 10, top + rel);

    assert_eq!(at(0), Hit::Panel { panel: Panel::TaskList, row: -1 });
    assert_eq!(at(1), Hit::Panel { panel: Panel::TaskList, row: -1 });
    assert_eq!(at(2), Hit::Panel { panel: Panel::TaskList, row: 4 });

    h.send(Msg::Mouse(click(10, top + 2)));
    assert_eq!(h.app.scroll_state(Panel::TaskList).cursor, 4);
    assert_eq!(h.app.tasks[4].status, Status::Open);
}

#[test]
fn swimlane_move_down_swaps_and_reselects_the_moved_issue() {
    let seed = [
        issue("td-1", "one", Status::InProgress),
        issue("td-2", "two", Status::InProgress),
        issue("td-3", "three", Status::InProgress),
    ];
    let mut h = Harness::new(&seed);
    for (i, id) in ["td-1", "td-2", "td-3"].iter().enumerate() {
        h.store
            .set_board_position(BUILTIN_BOARD_ID, id, (i as i64 + 1) * 10_000, "ses_seed")
            .unwrap();
    }

    h.press(KeyCode::Char('b'));
    h.press(KeyCode::Enter);
    h.press(KeyCode::Char('v'));
    h.press(KeyCode::Char('j'));

    let board = h.app.board.as_ref().unwrap();
    let ids: Vec<&str> = board.current_rows().iter().map(|v| v.issue.id.as_str()).collect();
    assert_eq!(ids, vec!["td-1", "td-2", "td-3"]);
    assert_eq!(board.scroll().cursor, 1);

    let effect = update(&mut h.app, Msg::Key(key(KeyCode::Char('J')))).unwrap();
    assert_eq!(
        h.app.board.as_ref().unwrap().pending_selection.as_deref(),
        Some("td-2")
    );
    h.run(effect);

    let board = h.app.board.as_ref().unwrap();
    let ids: Vec<&str> = board.current_rows().iter().map(|v| v.issue.id.as_str()).collect();
    assert_eq!(ids, vec!["td-1", "td-3", "td-2"]);
    assert_eq!(board.scroll().cursor, 2);
    assert!(board.pending_selection.is_none());

    let positions = h.store.board_positions(BUILTIN_BOARD_ID).unwrap();
    let order: Vec<&str> = positions.iter().map(|(id, _)| id.as_str()).collect();
    assert_eq!(order, vec!["td-1", "td-3", "td-2"]);
}

#[test]
fn dependency_autofill_through_the_dispatcher() {
    let mut h = Harness::new(&[
        issue("td-a", "Parser", Status::Open),
        issue("td-b", "Cache eviction", Status::Open),
        issue("td-cache-42", "Cache warmup", Status::Open),
    ]);

    h.press(KeyCode::Char('n'));
    {
        let form = h.app.form.as_mut().unwrap();
        assert_eq!(form.sources.open_issues.len(), 3);
        form.toggle_extended();
        form.focus_field(FieldId::Dependencies);
        form.set_value(FieldId::Dependencies, "td-a, td-b, ");
    }
    h.type_str("cach");

    let af = h.app.form.as_ref().unwrap().autofill.as_ref().unwrap();
    assert_eq!(af.items[0].item.id, "td-cache-42");
    assert!(af.items.iter().all(|s| s.item.id != "td-a" && s.item.id != "td-b"));

    h.press(KeyCode::Enter);
    let form = h.app.form.as_ref().unwrap();
    assert_eq!(form.value(FieldId::Dependencies), "td-a, td-b, td-cache-42, ");
    assert_eq!(form.focused_field(), Some(FieldId::Dependencies));
}

#[test]
fn stacked_modals_navigate_and_pop_back() {
    let mut epic = issue("td-e", "Storage rewrite", Status::Open);
    epic.issue_type = IssueType::Epic;
    epic.priority = Priority::P0;
    let mut seed = vec![epic];
    for id in ["td-c1", "td-c2", "td-c3"] {
        let mut child = issue(id, "child", Status::Open);
        child.parent_id = Some("td-e".into());
        child.priority = Priority::P3;
        seed.push(child);
    }
    let mut h = Harness::new(&seed);

    let epic_row = h.app.tasks.iter().position(|i| i.id == "td-e").unwrap();
    h.app.scroll_mut(Panel::TaskList).cursor = epic_row;
    h.press(KeyCode::Enter);
    h.press(KeyCode::Tab);
    h.press(KeyCode::Char('j'));
    let a_before = h.app.modals.top().unwrap().clone();
    assert_eq!(a_before.issue_id, "td-e");

    h.press(KeyCode::Enter);
    assert_eq!(h.app.modals.len(), 2);
    let b = h.app.modals.top().unwrap();
    let scope = b.scope.clone();
    assert_eq!(scope.len(), 3);
    assert_eq!(b.issue_id, scope[1]);
    assert!(b.details.is_some());

    h.press(KeyCode::Left);
    let b = h.app.modals.top().unwrap();
    assert_eq!(b.issue_id, scope[0]);
    assert_eq!(b.details.as_ref().map(|d| d.issue.id.clone()), Some(scope[0].clone()));

    h.press(KeyCode::Esc);
    assert_eq!(h.app.modals.len(), 1);
    assert_eq!(h.app.modals.top().unwrap(), &a_before);
}

#[test]
fn dragging_first_divider_past_minimum_clamps_and_persists() {
    let mut h = Harness::new(&[issue("td-1", "one", Status::Open)]);
    h.app.area = Rect::new(0, 0, 80, 24);
    h.app.pane_ratios = [0.33, 0.34, 0.33];
    assert_eq!(h.app.bounds().available, 21);

    h.send(Msg::Mouse(click(10, 7)));
    assert!(h.app.drag.is_some());
    h.send(Msg::Mouse(mouse(MouseEventKind::Drag(MouseButton::Left), 10, 2)));

    let r = h.app.pane_ratios;
    assert!(approx(r[0], 0.1));
    assert!(approx(r[1], 0.57));
    assert!(approx(r[2], 0.33));
    assert!(approx(r.iter().sum(), 1.0));

    h.send(Msg::Mouse(mouse(MouseEventKind::Up(MouseButton::Left), 10, 2)));
    assert!(h.app.drag.is_none());
    let saved = h.ctx.config.load_file();
    assert!(approx(saved.pane_heights[0], 0.1));
    assert!(approx(saved.pane_heights[1], 0.57));
}
