//! Effect execution against the store, off the UI thread.

use std::process::Command;
use std::sync::Arc;

use crate::config::Config;
use crate::issue::{ActionType, Status};
use crate::store::{IssueFilter, IssueStore, StoreError};

use super::app::{DataRequest, Effect, IssueAction, Msg, Snapshot, ACTIVITY_LIMIT, HANDOFF_LIMIT};
use super::autofill::{AutofillItem, AutofillSources};
use super::board::PositionWrite;
use super::form::{FormMode, FormSubmission};

/// What a worker needs to run effects.
#[derive(Clone)]
pub struct EffectContext {
    pub store: Arc<dyn IssueStore>,
    pub session: String,
    pub config: Config,
}

/// Run one effect to completion and return the messages it produced.
pub fn execute(effect: Effect, ctx: &EffectContext) -> Vec<Msg> {
    let store = ctx.store.as_ref();
    let session = ctx.session.as_str();
    match effect {
        Effect::Batch(items) => items.into_iter().flat_map(|e| execute(e, ctx)).collect(),
        Effect::FetchData(request) => vec![match fetch_data(store, &request) {
            Ok(snapshot) => Msg::DataLoaded(Box::new(snapshot)),
            Err(e) => Msg::DataFailed(e.to_string()),
        }],
        Effect::FetchDetails(issue_id) => vec![match store.issue_details(&issue_id) {
            Ok(details) => Msg::DetailsLoaded(Box::new(details)),
            Err(e) => Msg::DetailsFailed {
                issue_id,
                error: e.to_string(),
            },
        }],
        Effect::FetchBoards => vec![match store.list_boards() {
            Ok(boards) => Msg::BoardsLoaded(boards),
            Err(e) => Msg::ActionFailed(format!("Failed to load boards: {}", e)),
        }],
        Effect::FetchBoardIssues { board_id, statuses } => {
            let loaded = store
                .board_issues(&board_id, &statuses)
                .and_then(|issues| Ok((issues, store.board_positions(&board_id)?)));
            vec![match loaded {
                Ok((issues, positions)) => Msg::BoardIssuesLoaded {
                    board_id,
                    issues,
                    positions,
                },
                Err(e) => Msg::ActionFailed(format!("Failed to load board: {}", e)),
            }]
        }
        Effect::FetchHandoffs => vec![match store.handoffs(HANDOFF_LIMIT) {
            Ok(handoffs) => Msg::HandoffsLoaded(handoffs),
            Err(e) => Msg::ActionFailed(format!("Failed to load handoffs: {}", e)),
        }],
        Effect::FetchAutofillSources => vec![match autofill_sources(store) {
            Ok(sources) => Msg::AutofillLoaded(sources),
            Err(e) => Msg::ActionFailed(format!("Failed to load autocomplete: {}", e)),
        }],
        Effect::FetchEditForm(issue_id) => {
            let loaded = store
                .get_issue(&issue_id)
                .and_then(|issue| Ok((issue, store.dependencies(&issue_id)?)));
            vec![match loaded {
                Ok((issue, dependencies)) => Msg::EditFormReady {
                    issue: Box::new(issue),
                    dependencies,
                },
                Err(e) => Msg::ActionFailed(e.to_string()),
            }]
        }
        Effect::IssueAction { issue_id, action } => vec![done(
            issue_action(store, &issue_id, action, session),
            |id| match action {
                IssueAction::Review => format!("Submitted {} for review", id),
                IssueAction::Approve => format!("Approved {}", id),
                IssueAction::Reopen => format!("Reopened {}", id),
            },
            &issue_id,
        )],
        Effect::CloseIssue { issue_id, reason } => vec![done(
            close_issue(store, &issue_id, &reason, session),
            |id| format!("Closed {}", id),
            &issue_id,
        )],
        Effect::DeleteIssue(issue_id) => vec![done(
            store.delete_issue(&issue_id, session),
            |id| format!("Deleted {}", id),
            &issue_id,
        )],
        Effect::SaveIssue(submission) => vec![match save_issue(store, &submission, session) {
            Ok((issue_id, message)) => Msg::IssueSaved { issue_id, message },
            Err(e) => Msg::FormSaveFailed(e.to_string()),
        }],
        Effect::ApplyBoardMoves { board_id, writes } => {
            vec![match apply_moves(store, &board_id, &writes, session) {
                Ok(()) => Msg::ActionDone("Board order updated".to_string()),
                Err(e) => Msg::ActionFailed(format!("Move failed: {}", e)),
            }]
        }
        Effect::SaveBoard { board, quiet } => vec![match store.save_board(&board, session) {
            Ok(board) => Msg::BoardSaved { board, quiet },
            Err(e) => Msg::ActionFailed(format!("Failed to save board: {}", e)),
        }],
        Effect::DeleteBoard(board_id) => vec![match store.delete_board(&board_id, session) {
            Ok(()) => Msg::BoardDeleted(board_id),
            Err(e) => Msg::ActionFailed(format!("Failed to delete board: {}", e)),
        }],
        Effect::PersistConfig(file) => match ctx.config.save_file(&file) {
            Ok(()) => vec![],
            Err(e) => vec![Msg::ActionFailed(format!("Failed to save config: {:#}", e))],
        },
        Effect::CopyToClipboard(text) => vec![match copy_to_clipboard(&text) {
            Ok(()) => Msg::Notice(format!("Copied {}", text)),
            Err(e) => Msg::ActionFailed(format!("Clipboard unavailable: {}", e)),
        }],
        // The runtime delays and cancels these; run directly they fire at once.
        Effect::ScheduleQueryPreview { token, .. } => vec![Msg::QueryPreviewTick { token }],
        Effect::PreviewQuery { token, query } => {
            let filter = IssueFilter {
                query: query.clone(),
                ..IssueFilter::default()
            };
            let result = store.list_issues(&filter).map(|i| i.len()).map_err(|e| match e {
                StoreError::Query(q) => q.to_string(),
                other => other.to_string(),
            });
            vec![Msg::QueryPreviewLoaded { token, query, result }]
        }
        Effect::RunSync(command) => vec![Msg::SyncFinished(run_sync(&command, ctx))],
        Effect::OpenEditor { .. } => {
            tracing::warn!("editor effect reached a worker; it must run on the UI thread");
            vec![]
        }
    }
}

fn done(result: Result<(), StoreError>, message: impl Fn(&str) -> String, issue_id: &str) -> Msg {
    match result {
        Ok(()) => Msg::ActionDone(message(issue_id)),
        Err(e) => Msg::ActionFailed(e.to_string()),
    }
}

fn fetch_data(store: &dyn IssueStore, request: &DataRequest) -> Result<Snapshot, StoreError> {
    let focused = match store.focused_issue_id()? {
        Some(id) => store.get_issue(&id).ok(),
        None => None,
    };
    let in_progress = store.list_issues(&IssueFilter::statuses(&[Status::InProgress]))?;

    let mut statuses = vec![Status::Open, Status::InReview, Status::Blocked];
    if request.include_closed {
        statuses.push(Status::Closed);
    }
    let filter = IssueFilter {
        statuses,
        query: request.query.clone(),
        limit: None,
    };
    let (tasks, query_error) = match store.list_issues(&filter) {
        Ok(tasks) => (Some(tasks), None),
        Err(StoreError::Query(e)) => (None, Some(e.to_string())),
        Err(e) => return Err(e),
    };

    let activity = store.activity(ACTIVITY_LIMIT)?;
    let all = store.list_issues(&IssueFilter::default())?;
    let status_counts = Status::ALL
        .iter()
        .map(|s| (*s, all.iter().filter(|i| i.status == *s).count()))
        .collect();

    Ok(Snapshot {
        request: request.clone(),
        focused,
        in_progress,
        tasks,
        query_error,
        activity,
        status_counts,
        total: all.len(),
    })
}

fn autofill_sources(store: &dyn IssueStore) -> Result<AutofillSources, StoreError> {
    let open = store.list_issues(&IssueFilter::statuses(&[
        Status::Open,
        Status::InProgress,
        Status::InReview,
        Status::Blocked,
    ]))?;
    Ok(AutofillSources {
        epics: open
            .iter()
            .filter(|i| i.is_epic())
            .map(|i| AutofillItem::new(&i.id, &i.title))
            .collect(),
        open_issues: open.iter().map(|i| AutofillItem::new(&i.id, &i.title)).collect(),
    })
}

fn issue_action(store: &dyn IssueStore, issue_id: &str, action: IssueAction, session: &str) -> Result<(), StoreError> {
    let mut issue = store.get_issue(issue_id)?;
    let kind = match action {
        IssueAction::Review => {
            issue.status = Status::InReview;
            ActionType::Review
        }
        IssueAction::Approve => {
            issue.status = Status::Closed;
            ActionType::Approve
        }
        IssueAction::Reopen => {
            issue.status = Status::Open;
            ActionType::Reopen
        }
    };
    store.update_issue(&issue, kind, session)?;
    tracing::info!(issue_id, action = %kind, "issue action applied");
    Ok(())
}

fn close_issue(store: &dyn IssueStore, issue_id: &str, reason: &str, session: &str) -> Result<(), StoreError> {
    let mut issue = store.get_issue(issue_id)?;
    issue.status = Status::Closed;
    store.update_issue(&issue, ActionType::Close, session)?;
    if !reason.is_empty() {
        store.log_activity(Some(issue_id), ActionType::Close, &format!("reason: {}", reason), session)?;
    }
    Ok(())
}

/// Create or update the issue, then reconcile its dependency list.
fn save_issue(store: &dyn IssueStore, submission: &FormSubmission, session: &str) -> Result<(String, String), StoreError> {
    let (issue_id, message) = match &submission.mode {
        FormMode::Create => {
            let issue = store.create_issue(&submission.draft, session)?;
            let message = format!("Created {}", issue.id);
            (issue.id, message)
        }
        FormMode::Edit { issue_id } => {
            let mut issue = store.get_issue(issue_id)?;
            submission.draft.apply_to(&mut issue);
            store.update_issue(&issue, ActionType::Update, session)?;
            (issue_id.clone(), format!("Updated {}", issue_id))
        }
    };

    for dep in &submission.dependencies {
        if !submission.original_dependencies.contains(dep) {
            store.add_dependency(&issue_id, dep, session)?;
        }
    }
    for dep in &submission.original_dependencies {
        if !submission.dependencies.contains(dep) {
            store.remove_dependency(&issue_id, dep, session)?;
        }
    }
    Ok((issue_id, message))
}

fn apply_moves(store: &dyn IssueStore, board_id: &str, writes: &[PositionWrite], session: &str) -> Result<(), StoreError> {
    for write in writes {
        match write {
            PositionWrite::Set { issue_id, position } => {
                store.set_board_position(board_id, issue_id, *position, session)?
            }
            PositionWrite::Swap { a, b } => store.swap_board_positions(board_id, a, b, session)?,
        }
    }
    Ok(())
}

fn copy_to_clipboard(text: &str) -> Result<(), arboard::Error> {
    let mut clipboard = arboard::Clipboard::new()?;
    clipboard.set_text(text.to_string())
}

/// Run the configured sync command through the shell in the data directory.
fn run_sync(command: &str, ctx: &EffectContext) -> Result<String, String> {
    tracing::info!(command, "running sync command");
    let output = Command::new("sh")
        .arg("-c")
        .arg(command)
        .current_dir(&ctx.config.data_dir)
        .output()
        .map_err(|e| format!("failed to launch: {}", e))?;
    let last_line = |bytes: &[u8]| {
        String::from_utf8_lossy(bytes)
            .lines()
            .rev()
            .find(|l| !l.trim().is_empty())
            .map(|l| l.trim().to_string())
            .unwrap_or_default()
    };
    if output.status.success() {
        Ok(last_line(&output.stdout))
    } else {
        let detail = last_line(&output.stderr);
        Err(if detail.is_empty() { output.status.to_string() } else { detail })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::issue::{Issue, IssueType};
    use crate::store::JsonStore;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn context(dir: &TempDir, seed: &[Issue]) -> EffectContext {
        let store = JsonStore::init(dir.path()).unwrap();
        for issue in seed {
            store.insert_issue(issue.clone()).unwrap();
        }
        EffectContext {
            store: Arc::new(store),
            session: "ses_a".into(),
            config: Config::new(dir.path().to_path_buf(), PathBuf::from(dir.path())),
        }
    }

    #[test]
    fn snapshot_splits_in_progress_from_tasks() {
        let dir = TempDir::new().unwrap();
        let mut doing = Issue::new("td-1", "doing");
        doing.status = Status::InProgress;
        let ctx = context(&dir, &[doing, Issue::new("td-2", "ready")]);

        let msgs = execute(
            Effect::FetchData(DataRequest {
                seq: 1,
                query: String::new(),
                include_closed: false,
            }),
            &ctx,
        );
        let Some(Msg::DataLoaded(snapshot)) = msgs.into_iter().next() else {
            panic!("expected a snapshot");
        };
        assert_eq!(snapshot.in_progress.len(), 1);
        let tasks = snapshot.tasks.unwrap();
        assert_eq!(tasks.iter().map(|i| i.id.as_str()).collect::<Vec<_>>(), vec!["td-2"]);
        assert_eq!(snapshot.total, 2);
    }

    #[test]
    fn bad_query_keeps_tasks_unset_and_reports() {
        let dir = TempDir::new().unwrap();
        let ctx = context(&dir, &[]);
        let msgs = execute(
            Effect::FetchData(DataRequest {
                seq: 1,
                query: "(status = open".into(),
                include_closed: false,
            }),
            &ctx,
        );
        let Some(Msg::DataLoaded(snapshot)) = msgs.into_iter().next() else {
            panic!("expected a snapshot");
        };
        assert!(snapshot.tasks.is_none());
        assert!(snapshot.query_error.is_some());
    }

    #[test]
    fn edit_reconciles_dependencies() {
        let dir = TempDir::new().unwrap();
        let seed: Vec<Issue> = ["td-1", "td-2", "td-3"].iter().map(|id| Issue::new(*id, *id)).collect();
        let ctx = context(&dir, &seed);
        ctx.store.add_dependency("td-1", "td-2", "ses_a").unwrap();

        let mut draft = crate::issue::IssueDraft {
            title: "renamed".into(),
            ..Default::default()
        };
        draft.issue_type = Some(IssueType::Bug);
        let submission = FormSubmission {
            mode: FormMode::Edit {
                issue_id: "td-1".into(),
            },
            draft,
            dependencies: vec!["td-3".into()],
            original_dependencies: vec!["td-2".into()],
        };
        let msgs = execute(Effect::SaveIssue(Box::new(submission)), &ctx);
        assert!(matches!(msgs.as_slice(), [Msg::IssueSaved { .. }]));
        assert_eq!(ctx.store.dependencies("td-1").unwrap(), vec!["td-3".to_string()]);
        let issue = ctx.store.get_issue("td-1").unwrap();
        assert_eq!(issue.title, "renamed");
        assert_eq!(issue.issue_type, IssueType::Bug);
    }

    #[test]
    fn approving_own_work_fails() {
        let dir = TempDir::new().unwrap();
        let ctx = context(&dir, &[Issue::new("td-1", "x")]);
        let review = execute(
            Effect::IssueAction {
                issue_id: "td-1".into(),
                action: IssueAction::Review,
            },
            &ctx,
        );
        assert!(matches!(review.as_slice(), [Msg::ActionDone(_)]));
        let approve = execute(
            Effect::IssueAction {
                issue_id: "td-1".into(),
                action: IssueAction::Approve,
            },
            &ctx,
        );
        assert!(matches!(approve.as_slice(), [Msg::ActionFailed(_)]));
    }

    #[test]
    #[cfg(unix)]
    fn sync_reports_last_output_line() {
        let dir = TempDir::new().unwrap();
        let ctx = context(&dir, &[]);
        assert_eq!(run_sync("echo one; echo two", &ctx), Ok("two".to_string()));
        assert!(run_sync("echo broken >&2; exit 3", &ctx).is_err());
    }
}
