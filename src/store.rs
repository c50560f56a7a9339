//! Issue store: the trait the view talks to and a JSON-file implementation.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::time::SystemTime;
use thiserror::Error;

use crate::issue::{
    ActionType, ActivityEntry, Board, BoardIssueView, BoardViewMode, Handoff, Issue, IssueDetails,
    IssueDraft, Status,
};
use crate::tdq::{self, EvalContext};

pub const BUILTIN_BOARD_ID: &str = "bd-all";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("issue '{0}' not found")]
    NotFound(String),
    #[error("{0}")]
    Invalid(String),
    #[error("query error: {0}")]
    Query(#[from] tdq::ParseError),
    #[error("store I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("store data is corrupt: {0}")]
    Parse(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, StoreError>;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct IssueFilter {
    /// Empty means every status.
    pub statuses: Vec<Status>,
    /// TDQ string; empty matches all.
    pub query: String,
    pub limit: Option<usize>,
}

impl IssueFilter {
    pub fn statuses(statuses: &[Status]) -> Self {
        Self {
            statuses: statuses.to_vec(),
            ..Self::default()
        }
    }
}

pub trait IssueStore: Send + Sync {
    // Reads
    fn list_issues(&self, filter: &IssueFilter) -> Result<Vec<Issue>>;
    fn get_issue(&self, id: &str) -> Result<Issue>;
    fn children(&self, parent_id: &str) -> Result<Vec<Issue>>;
    /// Ids this issue depends on (its blockers).
    fn dependencies(&self, id: &str) -> Result<Vec<String>>;
    /// Ids that depend on this issue.
    fn dependents(&self, id: &str) -> Result<Vec<String>>;
    fn focused_issue_id(&self) -> Result<Option<String>>;
    fn activity(&self, limit: usize) -> Result<Vec<ActivityEntry>>;
    fn handoffs(&self, limit: usize) -> Result<Vec<Handoff>>;
    fn list_boards(&self) -> Result<Vec<Board>>;
    fn get_board(&self, board_id: &str) -> Result<Board>;
    fn board_issues(&self, board_id: &str, statuses: &[Status]) -> Result<Vec<BoardIssueView>>;
    fn board_positions(&self, board_id: &str) -> Result<Vec<(String, i64)>>;
    fn max_board_position(&self, board_id: &str) -> Result<Option<i64>>;

    // Writes
    fn create_issue(&self, draft: &IssueDraft, session: &str) -> Result<Issue>;
    fn update_issue(&self, issue: &Issue, action: ActionType, session: &str) -> Result<()>;
    fn delete_issue(&self, id: &str, session: &str) -> Result<()>;
    fn add_dependency(&self, issue_id: &str, depends_on: &str, session: &str) -> Result<()>;
    fn remove_dependency(&self, issue_id: &str, depends_on: &str, session: &str) -> Result<()>;
    fn set_board_position(&self, board_id: &str, issue_id: &str, position: i64, session: &str) -> Result<()>;
    fn swap_board_positions(&self, board_id: &str, a: &str, b: &str, session: &str) -> Result<()>;
    fn save_board(&self, board: &Board, session: &str) -> Result<Board>;
    fn delete_board(&self, board_id: &str, session: &str) -> Result<()>;
    fn log_activity(&self, issue_id: Option<&str>, action: ActionType, message: &str, session: &str) -> Result<()>;

    /// Parent epic, children, blockers and dependents in one call.
    fn issue_details(&self, id: &str) -> Result<IssueDetails> {
        let issue = self.get_issue(id)?;
        let parent_epic = match issue.parent_id.as_deref() {
            Some(pid) => self.get_issue(pid).ok().filter(|p| p.is_epic()),
            None => None,
        };
        let epic_children = if issue.is_epic() {
            self.children(id)?
        } else {
            Vec::new()
        };
        let blocked_by = self
            .dependencies(id)?
            .iter()
            .filter_map(|d| self.get_issue(d).ok())
            .collect();
        let blocks = self
            .dependents(id)?
            .iter()
            .filter_map(|d| self.get_issue(d).ok())
            .collect();
        Ok(IssueDetails {
            issue,
            parent_epic,
            epic_children,
            blocked_by,
            blocks,
        })
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct Database {
    #[serde(default)]
    next_id: u64,
    #[serde(default)]
    issues: Vec<Issue>,
    /// (issue, depends_on)
    #[serde(default)]
    dependencies: Vec<(String, String)>,
    #[serde(default)]
    boards: Vec<Board>,
    /// board id -> issue id -> position
    #[serde(default)]
    positions: HashMap<String, HashMap<String, i64>>,
    #[serde(default)]
    activity: Vec<ActivityEntry>,
    #[serde(default)]
    handoffs: Vec<Handoff>,
    #[serde(default)]
    focused: Option<String>,
}

impl Database {
    fn issue(&self, id: &str) -> Result<&Issue> {
        self.issues
            .iter()
            .find(|i| i.id == id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    fn log(&mut self, issue_id: Option<&str>, action: ActionType, message: String, session: &str) {
        self.activity.push(ActivityEntry {
            timestamp: Utc::now(),
            session_id: session.to_string(),
            action,
            issue_id: issue_id.map(|s| s.to_string()),
            message,
        });
    }

    fn ensure_builtin_board(&mut self) {
        if !self.boards.iter().any(|b| b.id == BUILTIN_BOARD_ID) {
            self.boards.insert(
                0,
                Board {
                    id: BUILTIN_BOARD_ID.to_string(),
                    name: "All Issues".to_string(),
                    query: String::new(),
                    view_mode: BoardViewMode::Backlog,
                    is_builtin: true,
                    last_viewed_at: None,
                },
            );
        }
    }
}

/// Size and mtime of `db.json` as last seen by this process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FileStamp {
    len: u64,
    modified: SystemTime,
}

impl FileStamp {
    fn of(path: &Path) -> Option<Self> {
        let meta = std::fs::metadata(path).ok()?;
        Some(Self {
            len: meta.len(),
            modified: meta.modified().ok()?,
        })
    }
}

#[derive(Debug)]
struct State {
    db: Database,
    stamp: Option<FileStamp>,
}

/// Single-file JSON store (`<dir>/db.json`), shared with other processes.
///
/// Agents write the same file, so every call re-reads it when its size or
/// mtime moved since this process last saw it.
pub struct JsonStore {
    path: PathBuf,
    state: Mutex<State>,
}

impl JsonStore {
    pub fn db_path(dir: &Path) -> PathBuf {
        dir.join("db.json")
    }

    /// Create an empty database; fails if one already exists.
    pub fn init(dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(dir)?;
        let path = Self::db_path(dir);
        if path.exists() {
            return Err(StoreError::Invalid(format!(
                "database already exists at {}",
                path.display()
            )));
        }
        let mut db = Database::default();
        db.ensure_builtin_board();
        write_file(&path, &db)?;
        let stamp = FileStamp::of(&path);
        Ok(Self {
            path,
            state: Mutex::new(State { db, stamp }),
        })
    }

    pub fn open(dir: &Path) -> Result<Self> {
        let path = Self::db_path(dir);
        let (db, stamp) = read_file(&path)?;
        tracing::debug!(path = %path.display(), issues = db.issues.len(), "store opened");
        Ok(Self {
            path,
            state: Mutex::new(State { db, stamp }),
        })
    }

    /// Lock the state, reloading it first if the file changed underneath us.
    fn read(&self) -> Result<MutexGuard<'_, State>> {
        // Memory only ever holds data that was read from or written to disk.
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        let current = FileStamp::of(&self.path);
        if current != state.stamp {
            let (db, stamp) = read_file(&self.path)?;
            tracing::debug!(issues = db.issues.len(), "store reloaded after external change");
            state.db = db;
            state.stamp = stamp;
        }
        Ok(state)
    }

    /// Apply `change` to a fresh copy and install it only once it is on disk.
    fn write<T>(&self, change: impl FnOnce(&mut Database) -> Result<T>) -> Result<T> {
        let mut state = self.read()?;
        let mut next = state.db.clone();
        let out = change(&mut next)?;
        write_file(&self.path, &next)?;
        state.stamp = FileStamp::of(&self.path);
        state.db = next;
        Ok(out)
    }

    /// Seed helpers used by `init` and tests.
    pub fn insert_issue(&self, issue: Issue) -> Result<()> {
        self.write(|db| {
            db.issues.retain(|i| i.id != issue.id);
            db.issues.push(issue);
            Ok(())
        })
    }

    pub fn set_focused(&self, id: Option<&str>) -> Result<()> {
        self.write(|db| {
            db.focused = id.map(|s| s.to_string());
            Ok(())
        })
    }

    pub fn add_handoff(&self, handoff: Handoff) -> Result<()> {
        self.write(|db| {
            db.handoffs.push(handoff);
            Ok(())
        })
    }

    fn matching(db: &Database, query: &str, session: &str) -> Result<Vec<Issue>> {
        let q = tdq::parse(query)?;
        let ctx = EvalContext::new(session, &db.issues);
        let mut out: Vec<Issue> = db
            .issues
            .iter()
            .filter(|i| q.matches(i, &ctx))
            .cloned()
            .collect();
        default_order(&mut out);
        q.sort(&mut out);
        Ok(out)
    }
}

fn read_file(path: &Path) -> Result<(Database, Option<FileStamp>)> {
    let stamp = FileStamp::of(path);
    let content = std::fs::read_to_string(path)?;
    let mut db: Database = serde_json::from_str(&content)?;
    db.ensure_builtin_board();
    Ok((db, stamp))
}

fn write_file(path: &Path, db: &Database) -> Result<()> {
    let content = serde_json::to_string_pretty(db)?;
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, content)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}

/// Natural store order: priority, then newest first.
fn default_order(issues: &mut [Issue]) {
    issues.sort_by(|a, b| {
        a.priority
            .cmp(&b.priority)
            .then_with(|| b.updated_at.cmp(&a.updated_at))
            .then_with(|| a.id.cmp(&b.id))
    });
}

impl IssueStore for JsonStore {
    fn list_issues(&self, filter: &IssueFilter) -> Result<Vec<Issue>> {
        let state = self.read()?;
        let mut out = Self::matching(&state.db, &filter.query, "")?;
        if !filter.statuses.is_empty() {
            out.retain(|i| filter.statuses.contains(&i.status));
        }
        if let Some(limit) = filter.limit {
            out.truncate(limit);
        }
        Ok(out)
    }

    fn get_issue(&self, id: &str) -> Result<Issue> {
        self.read()?.db.issue(id).cloned()
    }

    fn children(&self, parent_id: &str) -> Result<Vec<Issue>> {
        let state = self.read()?;
        let mut out: Vec<Issue> = state
            .db
            .issues
            .iter()
            .filter(|i| i.parent_id.as_deref() == Some(parent_id))
            .cloned()
            .collect();
        default_order(&mut out);
        Ok(out)
    }

    fn dependencies(&self, id: &str) -> Result<Vec<String>> {
        let state = self.read()?;
        Ok(state
            .db
            .dependencies
            .iter()
            .filter(|(i, _)| i == id)
            .map(|(_, d)| d.clone())
            .collect())
    }

    fn dependents(&self, id: &str) -> Result<Vec<String>> {
        let state = self.read()?;
        Ok(state
            .db
            .dependencies
            .iter()
            .filter(|(_, d)| d == id)
            .map(|(i, _)| i.clone())
            .collect())
    }

    fn focused_issue_id(&self) -> Result<Option<String>> {
        Ok(self.read()?.db.focused.clone())
    }

    fn activity(&self, limit: usize) -> Result<Vec<ActivityEntry>> {
        let state = self.read()?;
        Ok(state.db.activity.iter().rev().take(limit).cloned().collect())
    }

    fn handoffs(&self, limit: usize) -> Result<Vec<Handoff>> {
        let state = self.read()?;
        Ok(state.db.handoffs.iter().rev().take(limit).cloned().collect())
    }

    fn list_boards(&self) -> Result<Vec<Board>> {
        let mut boards = self.read()?.db.boards.clone();
        boards.sort_by(|a, b| {
            b.is_builtin
                .cmp(&a.is_builtin)
                .then_with(|| b.last_viewed_at.cmp(&a.last_viewed_at))
                .then_with(|| a.name.cmp(&b.name))
        });
        Ok(boards)
    }

    fn get_board(&self, board_id: &str) -> Result<Board> {
        self.read()?
            .db
            .boards
            .iter()
            .find(|b| b.id == board_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(board_id.to_string()))
    }

    fn board_issues(&self, board_id: &str, statuses: &[Status]) -> Result<Vec<BoardIssueView>> {
        let state = self.read()?;
        let db = &state.db;
        let board = db
            .boards
            .iter()
            .find(|b| b.id == board_id)
            .ok_or_else(|| StoreError::NotFound(board_id.to_string()))?;
        let mut issues = Self::matching(db, &board.query, "")?;
        if !statuses.is_empty() {
            issues.retain(|i| statuses.contains(&i.status));
        }
        let positions = db.positions.get(board_id);
        Ok(issues
            .into_iter()
            .map(|issue| match positions.and_then(|p| p.get(&issue.id)) {
                Some(&pos) => BoardIssueView::positioned(issue, pos),
                None => BoardIssueView::unpositioned(issue),
            })
            .collect())
    }

    fn board_positions(&self, board_id: &str) -> Result<Vec<(String, i64)>> {
        let state = self.read()?;
        let mut out: Vec<(String, i64)> = state
            .db
            .positions
            .get(board_id)
            .map(|p| p.iter().map(|(k, v)| (k.clone(), *v)).collect())
            .unwrap_or_default();
        out.sort_by_key(|(_, p)| *p);
        Ok(out)
    }

    fn max_board_position(&self, board_id: &str) -> Result<Option<i64>> {
        Ok(self
            .read()?
            .db
            .positions
            .get(board_id)
            .and_then(|p| p.values().copied().max()))
    }

    fn create_issue(&self, draft: &IssueDraft, session: &str) -> Result<Issue> {
        if draft.title.trim().is_empty() {
            return Err(StoreError::Invalid("title is required".to_string()));
        }
        let issue = self.write(|db| {
            if let Some(pid) = draft.parent_id.as_deref() {
                db.issue(pid)?;
            }
            db.next_id += 1;
            let id = format!("td-{:04x}", db.next_id);
            let mut issue = Issue::new(id.clone(), draft.title.trim());
            draft.apply_to(&mut issue);
            issue.title = draft.title.trim().to_string();
            db.issues.push(issue.clone());
            db.log(Some(&id), ActionType::Create, format!("created {}", issue.title), session);
            Ok(issue)
        })?;
        tracing::info!(issue_id = %issue.id, "issue created");
        Ok(issue)
    }

    fn update_issue(&self, issue: &Issue, action: ActionType, session: &str) -> Result<()> {
        self.write(|db| {
            let existing = db.issue(&issue.id)?.clone();
            validate_transition(&existing, issue, action, session)?;
            let mut updated = issue.clone();
            updated.updated_at = Utc::now();
            match action {
                ActionType::Review => updated.implementer_session = Some(session.to_string()),
                ActionType::Approve => updated.reviewer_session = Some(session.to_string()),
                _ => {}
            }
            if updated.status == Status::Closed && existing.status != Status::Closed {
                updated.closed_at = Some(Utc::now());
            }
            if updated.status != Status::Closed {
                updated.closed_at = None;
            }
            if let Some(slot) = db.issues.iter_mut().find(|i| i.id == issue.id) {
                *slot = updated;
            }
            db.log(Some(&issue.id), action, format!("{} {}", action, issue.title), session);
            Ok(())
        })
    }

    fn delete_issue(&self, id: &str, session: &str) -> Result<()> {
        self.write(|db| {
            let title = db.issue(id)?.title.clone();
            db.issues.retain(|i| i.id != id);
            db.dependencies.retain(|(a, b)| a != id && b != id);
            for positions in db.positions.values_mut() {
                positions.remove(id);
            }
            if db.focused.as_deref() == Some(id) {
                db.focused = None;
            }
            db.log(Some(id), ActionType::Delete, format!("deleted {}", title), session);
            Ok(())
        })
    }

    fn add_dependency(&self, issue_id: &str, depends_on: &str, session: &str) -> Result<()> {
        if issue_id == depends_on {
            return Err(StoreError::Invalid("an issue cannot depend on itself".to_string()));
        }
        let pair = (issue_id.to_string(), depends_on.to_string());
        let known = self.read()?.db.dependencies.contains(&pair);
        if known {
            return Ok(());
        }
        self.write(|db| {
            db.issue(issue_id)?;
            db.issue(depends_on)?;
            if !db.dependencies.contains(&pair) {
                db.dependencies.push(pair);
                db.log(
                    Some(issue_id),
                    ActionType::AddDependency,
                    format!("depends on {}", depends_on),
                    session,
                );
            }
            Ok(())
        })
    }

    fn remove_dependency(&self, issue_id: &str, depends_on: &str, session: &str) -> Result<()> {
        let linked = |(a, b): &(String, String)| a == issue_id && b == depends_on;
        let known = self.read()?.db.dependencies.iter().any(|p| linked(p));
        if !known {
            return Ok(());
        }
        self.write(|db| {
            db.dependencies.retain(|pair| !linked(pair));
            db.log(
                Some(issue_id),
                ActionType::RemoveDependency,
                format!("no longer depends on {}", depends_on),
                session,
            );
            Ok(())
        })
    }

    fn set_board_position(&self, board_id: &str, issue_id: &str, position: i64, session: &str) -> Result<()> {
        self.write(|db| {
            db.issue(issue_id)?;
            db.positions
                .entry(board_id.to_string())
                .or_default()
                .insert(issue_id.to_string(), position);
            db.log(
                Some(issue_id),
                ActionType::BoardSetPosition,
                format!("position {} on {}", position, board_id),
                session,
            );
            Ok(())
        })
    }

    fn swap_board_positions(&self, board_id: &str, a: &str, b: &str, session: &str) -> Result<()> {
        self.write(|db| {
            let positions = db.positions.entry(board_id.to_string()).or_default();
            let (pa, pb) = match (positions.get(a).copied(), positions.get(b).copied()) {
                (Some(pa), Some(pb)) => (pa, pb),
                _ => {
                    return Err(StoreError::Invalid(
                        "both issues need a board position to swap".to_string(),
                    ))
                }
            };
            positions.insert(a.to_string(), pb);
            positions.insert(b.to_string(), pa);
            db.log(
                Some(a),
                ActionType::BoardSetPosition,
                format!("swapped with {} on {}", b, board_id),
                session,
            );
            Ok(())
        })
    }

    fn save_board(&self, board: &Board, session: &str) -> Result<Board> {
        if board.name.trim().is_empty() {
            return Err(StoreError::Invalid("board name is required".to_string()));
        }
        tdq::parse(&board.query)?;
        self.write(|db| {
            let mut saved = board.clone();
            let existing = db.boards.iter().position(|b| b.id == board.id);
            let action = if let Some(idx) = existing {
                let slot = &mut db.boards[idx];
                if slot.is_builtin && (slot.name != board.name || slot.query != board.query) {
                    return Err(StoreError::Invalid("built-in boards cannot be edited".to_string()));
                }
                saved.is_builtin = slot.is_builtin;
                *slot = saved.clone();
                ActionType::BoardUpdate
            } else {
                let taken: HashSet<&str> = db.boards.iter().map(|b| b.name.as_str()).collect();
                if taken.contains(board.name.as_str()) {
                    return Err(StoreError::Invalid(format!("board '{}' already exists", board.name)));
                }
                if saved.id.is_empty() {
                    db.next_id += 1;
                    saved.id = format!("bd-{:04x}", db.next_id);
                }
                saved.is_builtin = false;
                db.boards.push(saved.clone());
                ActionType::BoardCreate
            };
            db.log(None, action, format!("{} {}", action, saved.name), session);
            Ok(saved)
        })
    }

    fn delete_board(&self, board_id: &str, session: &str) -> Result<()> {
        self.write(|db| {
            let board = db
                .boards
                .iter()
                .find(|b| b.id == board_id)
                .cloned()
                .ok_or_else(|| StoreError::NotFound(board_id.to_string()))?;
            if board.is_builtin {
                return Err(StoreError::Invalid("built-in boards cannot be deleted".to_string()));
            }
            db.boards.retain(|b| b.id != board_id);
            db.positions.remove(board_id);
            db.log(None, ActionType::BoardDelete, format!("deleted board {}", board.name), session);
            Ok(())
        })
    }

    fn log_activity(&self, issue_id: Option<&str>, action: ActionType, message: &str, session: &str) -> Result<()> {
        self.write(|db| {
            db.log(issue_id, action, message.to_string(), session);
            Ok(())
        })
    }
}

fn validate_transition(existing: &Issue, updated: &Issue, action: ActionType, session: &str) -> Result<()> {
    let invalid = |msg: &str| Err(StoreError::Invalid(msg.to_string()));
    match action {
        ActionType::Review => {
            if !matches!(existing.status, Status::Open | Status::InProgress) {
                return invalid("only open or in-progress issues can be submitted for review");
            }
        }
        ActionType::Approve => {
            if existing.status != Status::InReview {
                return invalid("only issues in review can be approved");
            }
            if existing.implementer_session.as_deref() == Some(session) {
                return invalid("cannot approve your own work");
            }
        }
        ActionType::Close => {
            if existing.status == Status::Closed {
                return invalid("issue is already closed");
            }
        }
        ActionType::Reopen => {
            if existing.status != Status::Closed {
                return invalid("only closed issues can be reopened");
            }
        }
        _ => {}
    }
    if updated.title.trim().is_empty() {
        return invalid("title is required");
    }
    Ok(())
}
