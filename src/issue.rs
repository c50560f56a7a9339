use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Open,
    InProgress,
    Blocked,
    InReview,
    Closed,
}

impl Status {
    pub const ALL: [Status; 5] = [
        Status::Open,
        Status::InProgress,
        Status::Blocked,
        Status::InReview,
        Status::Closed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Open => "open",
            Status::InProgress => "in_progress",
            Status::Blocked => "blocked",
            Status::InReview => "in_review",
            Status::Closed => "closed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "open" => Some(Status::Open),
            "in_progress" | "inprogress" | "wip" => Some(Status::InProgress),
            "blocked" => Some(Status::Blocked),
            "in_review" | "inreview" | "review" => Some(Status::InReview),
            "closed" | "done" => Some(Status::Closed),
            _ => None,
        }
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueType {
    Bug,
    Feature,
    Task,
    Epic,
    Chore,
}

impl IssueType {
    pub const ALL: [IssueType; 5] = [
        IssueType::Bug,
        IssueType::Feature,
        IssueType::Task,
        IssueType::Epic,
        IssueType::Chore,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            IssueType::Bug => "bug",
            IssueType::Feature => "feature",
            IssueType::Task => "task",
            IssueType::Epic => "epic",
            IssueType::Chore => "chore",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        IssueType::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s.trim()))
    }
}

impl std::fmt::Display for IssueType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// P0 is the most urgent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Priority {
    P0,
    P1,
    P2,
    P3,
    P4,
}

impl Priority {
    pub const ALL: [Priority; 5] = [
        Priority::P0,
        Priority::P1,
        Priority::P2,
        Priority::P3,
        Priority::P4,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::P0 => "P0",
            Priority::P1 => "P1",
            Priority::P2 => "P2",
            Priority::P3 => "P3",
            Priority::P4 => "P4",
        }
    }

    pub fn rank(&self) -> u8 {
        *self as u8
    }

    pub fn parse(s: &str) -> Option<Self> {
        Priority::ALL
            .into_iter()
            .find(|p| p.as_str().eq_ignore_ascii_case(s.trim()))
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub status: Status,
    pub issue_type: IssueType,
    pub priority: Priority,
    #[serde(default)]
    pub points: u32,
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(default)]
    pub parent_id: Option<String>,
    #[serde(default)]
    pub acceptance: String,
    #[serde(default)]
    pub minor: bool,
    #[serde(default)]
    pub implementer_session: Option<String>,
    #[serde(default)]
    pub reviewer_session: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub closed_at: Option<DateTime<Utc>>,
}

impl Issue {
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            title: title.into(),
            description: String::new(),
            status: Status::Open,
            issue_type: IssueType::Task,
            priority: Priority::P2,
            points: 0,
            labels: Vec::new(),
            parent_id: None,
            acceptance: String::new(),
            minor: false,
            implementer_session: None,
            reviewer_session: None,
            created_at: now,
            updated_at: now,
            closed_at: None,
        }
    }

    pub fn is_epic(&self) -> bool {
        self.issue_type == IssueType::Epic
    }

    pub fn is_closed(&self) -> bool {
        self.status == Status::Closed
    }
}

/// Fields the form can set on a new or existing issue.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct IssueDraft {
    pub title: String,
    pub description: String,
    pub issue_type: Option<IssueType>,
    pub priority: Option<Priority>,
    pub points: u32,
    pub labels: Vec<String>,
    pub parent_id: Option<String>,
    pub acceptance: String,
    pub minor: bool,
    pub status: Option<Status>,
}

impl IssueDraft {
    pub fn apply_to(&self, issue: &mut Issue) {
        issue.title = self.title.clone();
        issue.description = self.description.clone();
        if let Some(t) = self.issue_type {
            issue.issue_type = t;
        }
        if let Some(p) = self.priority {
            issue.priority = p;
        }
        issue.points = self.points;
        issue.labels = self.labels.clone();
        issue.parent_id = self.parent_id.clone();
        issue.acceptance = self.acceptance.clone();
        issue.minor = self.minor;
        if let Some(s) = self.status {
            issue.status = s;
        }
    }
}

/// Tag recorded with every write for the audit log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    Create,
    Update,
    Delete,
    Close,
    Reopen,
    Review,
    Approve,
    AddDependency,
    RemoveDependency,
    BoardCreate,
    BoardUpdate,
    BoardDelete,
    BoardSetPosition,
}

impl std::fmt::Display for ActionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ActionType::Create => "create",
            ActionType::Update => "update",
            ActionType::Delete => "delete",
            ActionType::Close => "close",
            ActionType::Reopen => "reopen",
            ActionType::Review => "review",
            ActionType::Approve => "approve",
            ActionType::AddDependency => "add_dep",
            ActionType::RemoveDependency => "remove_dep",
            ActionType::BoardCreate => "board_create",
            ActionType::BoardUpdate => "board_update",
            ActionType::BoardDelete => "board_delete",
            ActionType::BoardSetPosition => "board_position",
        };
        write!(f, "{}", s)
    }
}

/// One row of the Activity panel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityEntry {
    pub timestamp: DateTime<Utc>,
    pub session_id: String,
    pub action: ActionType,
    #[serde(default)]
    pub issue_id: Option<String>,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Handoff {
    pub issue_id: String,
    pub session_id: String,
    #[serde(default)]
    pub done: Vec<String>,
    #[serde(default)]
    pub remaining: Vec<String>,
    #[serde(default)]
    pub decisions: Vec<String>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BoardViewMode {
    #[default]
    Backlog,
    Swimlanes,
}

impl BoardViewMode {
    pub fn toggled(self) -> Self {
        match self {
            BoardViewMode::Backlog => BoardViewMode::Swimlanes,
            BoardViewMode::Swimlanes => BoardViewMode::Backlog,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Board {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub query: String,
    #[serde(default)]
    pub view_mode: BoardViewMode,
    #[serde(default)]
    pub is_builtin: bool,
    #[serde(default)]
    pub last_viewed_at: Option<DateTime<Utc>>,
}

/// An issue as seen through a board: positions are sparse and optional.
#[derive(Debug, Clone, PartialEq)]
pub struct BoardIssueView {
    pub issue: Issue,
    pub has_position: bool,
    pub position: i64,
}

impl BoardIssueView {
    pub fn unpositioned(issue: Issue) -> Self {
        Self {
            issue,
            has_position: false,
            position: 0,
        }
    }

    pub fn positioned(issue: Issue, position: i64) -> Self {
        Self {
            issue,
            has_position: true,
            position,
        }
    }
}

/// Everything an issue-detail modal needs, fetched in one effect.
#[derive(Debug, Clone, PartialEq)]
pub struct IssueDetails {
    pub issue: Issue,
    pub parent_epic: Option<Issue>,
    pub epic_children: Vec<Issue>,
    pub blocked_by: Vec<Issue>,
    pub blocks: Vec<Issue>,
}

/// Comma-separated label or dependency list, trimmed, empties dropped.
pub fn split_list(s: &str) -> Vec<String> {
    s.split(',')
        .map(|p| p.trim())
        .filter(|p| !p.is_empty())
        .map(|p| p.to_string())
        .collect()
}
