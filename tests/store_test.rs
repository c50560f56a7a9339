mod helpers;

use tdmon::issue::{ActionType, Board, BoardViewMode, IssueDraft, IssueType, Priority, Status};
use tdmon::store::{IssueFilter, IssueStore, JsonStore, StoreError, BUILTIN_BOARD_ID};

use helpers::{issue, test_config, test_store};

fn draft(title: &str) -> IssueDraft {
    IssueDraft {
        title: title.to_string(),
        ..IssueDraft::default()
    }
}

fn board(name: &str, query: &str) -> Board {
    Board {
        id: String::new(),
        name: name.to_string(),
        query: query.to_string(),
        view_mode: BoardViewMode::Backlog,
        is_builtin: false,
        last_viewed_at: None,
    }
}

#[test]
fn init_refuses_existing_database() {
    let tmp = tempfile::tempdir().unwrap();
    let config = test_config(&tmp);
    JsonStore::init(&config.data_dir).unwrap();

    assert!(matches!(JsonStore::init(&config.data_dir), Err(StoreError::Invalid(_))));
}

#[test]
fn writes_survive_reopen() {
    let tmp = tempfile::tempdir().unwrap();
    let config = test_config(&tmp);
    let store = test_store(&config, &[]);
    let created = store.create_issue(&draft("Persist me"), "ses_a").unwrap();
    drop(store);

    let reopened = JsonStore::open(&config.data_dir).unwrap();
    assert_eq!(reopened.get_issue(&created.id).unwrap().title, "Persist me");
    assert_eq!(reopened.list_boards().unwrap()[0].id, BUILTIN_BOARD_ID);
}

#[test]
fn create_trims_title_and_logs_activity() {
    let tmp = tempfile::tempdir().unwrap();
    let store = test_store(&test_config(&tmp), &[]);

    let mut d = draft("  Fix login  ");
    d.issue_type = Some(IssueType::Bug);
    d.priority = Some(Priority::P1);
    let created = store.create_issue(&d, "ses_a").unwrap();

    assert_eq!(created.title, "Fix login");
    assert_eq!(created.issue_type, IssueType::Bug);
    let log = store.activity(10).unwrap();
    assert_eq!(log[0].action, ActionType::Create);
    assert_eq!(log[0].session_id, "ses_a");
    assert_eq!(log[0].issue_id.as_deref(), Some(created.id.as_str()));
}

#[test]
fn create_rejects_blank_title_and_unknown_parent() {
    let tmp = tempfile::tempdir().unwrap();
    let store = test_store(&test_config(&tmp), &[]);

    assert!(matches!(store.create_issue(&draft("   "), "s"), Err(StoreError::Invalid(_))));

    let mut d = draft("orphan");
    d.parent_id = Some("td-missing".to_string());
    assert!(matches!(store.create_issue(&d, "s"), Err(StoreError::NotFound(_))));
}

#[test]
fn review_then_approve_records_sessions() {
    let tmp = tempfile::tempdir().unwrap();
    let store = test_store(&test_config(&tmp), &[issue("td-1", "work", Status::InProgress)]);

    let mut i = store.get_issue("td-1").unwrap();
    i.status = Status::InReview;
    store.update_issue(&i, ActionType::Review, "ses_impl").unwrap();
    assert_eq!(
        store.get_issue("td-1").unwrap().implementer_session.as_deref(),
        Some("ses_impl")
    );

    let mut i = store.get_issue("td-1").unwrap();
    i.status = Status::Closed;
    let own = store.update_issue(&i, ActionType::Approve, "ses_impl");
    assert!(matches!(own, Err(StoreError::Invalid(_))));

    store.update_issue(&i, ActionType::Approve, "ses_rev").unwrap();
    let done = store.get_issue("td-1").unwrap();
    assert_eq!(done.status, Status::Closed);
    assert_eq!(done.reviewer_session.as_deref(), Some("ses_rev"));
    assert!(done.closed_at.is_some());
}

#[test]
fn invalid_transitions_are_rejected() {
    let tmp = tempfile::tempdir().unwrap();
    let store = test_store(
        &test_config(&tmp),
        &[
            issue("td-open", "open", Status::Open),
            issue("td-closed", "closed", Status::Closed),
        ],
    );

    let open = store.get_issue("td-open").unwrap();
    assert!(store.update_issue(&open, ActionType::Reopen, "s").is_err());
    assert!(store.update_issue(&open, ActionType::Approve, "s").is_err());

    let closed = store.get_issue("td-closed").unwrap();
    assert!(store.update_issue(&closed, ActionType::Close, "s").is_err());
    assert!(store.update_issue(&closed, ActionType::Review, "s").is_err());

    let mut reopened = closed.clone();
    reopened.status = Status::Open;
    store.update_issue(&reopened, ActionType::Reopen, "s").unwrap();
    assert!(store.get_issue("td-closed").unwrap().closed_at.is_none());
}

#[test]
fn details_collect_epic_links_and_dependencies() {
    let tmp = tempfile::tempdir().unwrap();
    let mut epic = issue("td-e", "epic", Status::Open);
    epic.issue_type = IssueType::Epic;
    let mut child = issue("td-c", "child", Status::Open);
    child.parent_id = Some("td-e".into());
    let store = test_store(
        &test_config(&tmp),
        &[epic, child, issue("td-x", "blocker", Status::Open)],
    );
    store.add_dependency("td-c", "td-x", "s").unwrap();
    store.add_dependency("td-c", "td-x", "s").unwrap();

    let d = store.issue_details("td-c").unwrap();
    assert_eq!(d.parent_epic.map(|p| p.id), Some("td-e".to_string()));
    assert_eq!(d.blocked_by.len(), 1);
    assert_eq!(d.blocked_by[0].id, "td-x");

    let epic = store.issue_details("td-e").unwrap();
    assert_eq!(epic.epic_children.len(), 1);

    let blocker = store.issue_details("td-x").unwrap();
    assert_eq!(blocker.blocks[0].id, "td-c");

    assert!(store.add_dependency("td-c", "td-c", "s").is_err());
    store.remove_dependency("td-c", "td-x", "s").unwrap();
    assert!(store.dependencies("td-c").unwrap().is_empty());
}

#[test]
fn delete_clears_links_positions_and_focus() {
    let tmp = tempfile::tempdir().unwrap();
    let store = test_store(
        &test_config(&tmp),
        &[issue("td-1", "a", Status::Open), issue("td-2", "b", Status::Open)],
    );
    store.add_dependency("td-2", "td-1", "s").unwrap();
    store.set_board_position(BUILTIN_BOARD_ID, "td-1", 10_000, "s").unwrap();
    store.set_focused(Some("td-1")).unwrap();

    store.delete_issue("td-1", "s").unwrap();

    assert!(matches!(store.get_issue("td-1"), Err(StoreError::NotFound(_))));
    assert!(store.dependencies("td-2").unwrap().is_empty());
    assert!(store.board_positions(BUILTIN_BOARD_ID).unwrap().is_empty());
    assert_eq!(store.focused_issue_id().unwrap(), None);
}

#[test]
fn list_filters_by_query_status_and_limit() {
    let tmp = tempfile::tempdir().unwrap();
    let mut bug = issue("td-1", "crash on save", Status::Open);
    bug.issue_type = IssueType::Bug;
    let store = test_store(
        &test_config(&tmp),
        &[
            bug,
            issue("td-2", "save dialog", Status::InProgress),
            issue("td-3", "unrelated", Status::Open),
        ],
    );

    let saves = store
        .list_issues(&IssueFilter {
            query: "save".to_string(),
            ..IssueFilter::default()
        })
        .unwrap();
    assert_eq!(saves.len(), 2);

    let open_bugs = store
        .list_issues(&IssueFilter {
            statuses: vec![Status::Open],
            query: "type = bug".to_string(),
            limit: None,
        })
        .unwrap();
    assert_eq!(open_bugs.len(), 1);
    assert_eq!(open_bugs[0].id, "td-1");

    let limited = store
        .list_issues(&IssueFilter {
            limit: Some(1),
            ..IssueFilter::default()
        })
        .unwrap();
    assert_eq!(limited.len(), 1);

    let bad = store.list_issues(&IssueFilter {
        query: "(status = open".to_string(),
        ..IssueFilter::default()
    });
    assert!(matches!(bad, Err(StoreError::Query(_))));
}

#[test]
fn board_positions_set_swap_and_report_max() {
    let tmp = tempfile::tempdir().unwrap();
    let store = test_store(
        &test_config(&tmp),
        &[issue("td-1", "a", Status::Open), issue("td-2", "b", Status::Open)],
    );
    assert_eq!(store.max_board_position(BUILTIN_BOARD_ID).unwrap(), None);

    store.set_board_position(BUILTIN_BOARD_ID, "td-1", 10_000, "s").unwrap();
    assert!(store.swap_board_positions(BUILTIN_BOARD_ID, "td-1", "td-2", "s").is_err());

    store.set_board_position(BUILTIN_BOARD_ID, "td-2", 20_000, "s").unwrap();
    store.swap_board_positions(BUILTIN_BOARD_ID, "td-1", "td-2", "s").unwrap();

    let positions = store.board_positions(BUILTIN_BOARD_ID).unwrap();
    assert_eq!(
        positions,
        vec![("td-2".to_string(), 10_000), ("td-1".to_string(), 20_000)]
    );
    assert_eq!(store.max_board_position(BUILTIN_BOARD_ID).unwrap(), Some(20_000));

    let views = store.board_issues(BUILTIN_BOARD_ID, &[]).unwrap();
    assert!(views.iter().all(|v| v.has_position));
}

#[test]
fn boards_are_validated_and_builtin_is_protected() {
    let tmp = tempfile::tempdir().unwrap();
    let store = test_store(
        &test_config(&tmp),
        &[issue("td-1", "a", Status::Open), issue("td-2", "b", Status::Blocked)],
    );

    let saved = store.save_board(&board("Blocked", "is(blocked)"), "s").unwrap();
    assert!(!saved.id.is_empty());
    assert!(!saved.is_builtin);
    let rows = store.board_issues(&saved.id, &[]).unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].issue.id, "td-2");

    assert!(store.save_board(&board("Blocked", ""), "s").is_err());
    assert!(store.save_board(&board("", ""), "s").is_err());
    assert!(matches!(
        store.save_board(&board("Broken", "(status = open"), "s"),
        Err(StoreError::Query(_))
    ));

    let mut builtin = store.get_board(BUILTIN_BOARD_ID).unwrap();
    builtin.view_mode = BoardViewMode::Swimlanes;
    store.save_board(&builtin, "s").unwrap();
    builtin.name = "Renamed".to_string();
    assert!(store.save_board(&builtin, "s").is_err());
    assert!(store.delete_board(BUILTIN_BOARD_ID, "s").is_err());

    store.delete_board(&saved.id, "s").unwrap();
    assert!(matches!(store.get_board(&saved.id), Err(StoreError::NotFound(_))));
}

#[test]
fn sees_and_keeps_writes_from_another_process() {
    let tmp = tempfile::tempdir().unwrap();
    let config = test_config(&tmp);
    let monitor = test_store(&config, &[]);
    let agent = JsonStore::open(&config.data_dir).unwrap();

    agent.insert_issue(issue("td-agent", "agent work", Status::InProgress)).unwrap();
    let seen = monitor.list_issues(&IssueFilter::default()).unwrap();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].id, "td-agent");

    let created = monitor.create_issue(&draft("from the monitor"), "ses_tui").unwrap();

    let on_disk = JsonStore::open(&config.data_dir).unwrap();
    let mut ids: Vec<String> = on_disk
        .list_issues(&IssueFilter::default())
        .unwrap()
        .into_iter()
        .map(|i| i.id)
        .collect();
    ids.sort();
    let mut expected = vec!["td-agent".to_string(), created.id.clone()];
    expected.sort();
    assert_eq!(ids, expected);
    assert!(agent.get_issue(&created.id).is_ok());
}

#[test]
fn failed_write_leaves_memory_unchanged() {
    let tmp = tempfile::tempdir().unwrap();
    let config = test_config(&tmp);
    let store = test_store(&config, &[issue("td-1", "a", Status::Open)]);

    // A directory where the temp file goes makes the write fail.
    let blocker = JsonStore::db_path(&config.data_dir).with_extension("json.tmp");
    std::fs::create_dir(&blocker).unwrap();

    assert!(matches!(store.create_issue(&draft("lost"), "s"), Err(StoreError::Io(_))));
    assert!(store.delete_issue("td-1", "s").is_err());
    assert_eq!(store.list_issues(&IssueFilter::default()).unwrap().len(), 1);
    assert!(store.activity(10).unwrap().is_empty());

    std::fs::remove_dir(&blocker).unwrap();
    let created = store.create_issue(&draft("kept"), "s").unwrap();
    assert_eq!(created.id, "td-0001");
}
