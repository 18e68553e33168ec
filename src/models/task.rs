use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use super::{Id, UserRef};
use crate::datetime;
use crate::error::ValidationError;
use crate::validation;

/// Closed set of task states. On the wire: `"todo"`, `"in progress"`, `"done"`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskStatus {
    #[default]
    #[serde(rename = "todo", alias = "To Do", alias = "to_do")]
    Todo,
    #[serde(rename = "in progress", alias = "in_progress", alias = "In Progress")]
    InProgress,
    #[serde(rename = "done", alias = "Done")]
    Done,
}

impl TaskStatus {
    pub const ALL: [TaskStatus; 3] = [TaskStatus::Todo, TaskStatus::InProgress, TaskStatus::Done];

    pub fn as_wire(self) -> &'static str {
        match self {
            TaskStatus::Todo => "todo",
            TaskStatus::InProgress => "in progress",
            TaskStatus::Done => "done",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            TaskStatus::Todo => "To Do",
            TaskStatus::InProgress => "In Progress",
            TaskStatus::Done => "Done",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for TaskStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace(['_', '-'], " ");
        match normalized.as_str() {
            "todo" | "to do" => Ok(TaskStatus::Todo),
            "in progress" => Ok(TaskStatus::InProgress),
            "done" => Ok(TaskStatus::Done),
            _ => Err(ValidationError::new(
                "status",
                format!("Unknown status '{s}' (expected todo, in progress or done)"),
            )),
        }
    }
}

/// Canonical in-memory task. Every view renders this shape, whichever
/// endpoint the record came from.
#[derive(Debug, Clone, PartialEq)]
pub struct Task {
    pub id: Id,
    pub title: String,
    pub description: Option<String>,
    pub status: TaskStatus,
    pub due_date: Option<DateTime<Utc>>,
    pub assigned_to: Option<UserRef>,
    /// `None` for personal tasks.
    pub group_id: Option<Id>,
}

impl Task {
    pub fn is_personal(&self) -> bool {
        self.group_id.is_none()
    }

    /// Write shape for `PUT /user/tasks/{id}`; the assignee travels as an id.
    pub fn to_payload(&self) -> TaskPayload {
        TaskPayload {
            title: self.title.clone(),
            description: self.description.clone(),
            status: self.status,
            due_date: self.due_date,
            assigned_to_id: self.assigned_to.as_ref().and_then(|u| u.id.clone()),
            group_id: self.group_id.clone(),
        }
    }
}

// ─── ENDPOINT SHAPES ─────────────────────────────────────────────────────────

/// Task as returned by `GET /user/tasks` and the task write endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct UserTaskRecord {
    pub id: Id,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub status: TaskStatus,
    #[serde(default, deserialize_with = "crate::datetime::wire::deserialize")]
    pub due_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub assigned_to: Option<UserRef>,
    #[serde(default)]
    pub group_id: Option<Id>,
}

impl From<UserTaskRecord> for Task {
    fn from(record: UserTaskRecord) -> Self {
        Task {
            id: record.id,
            title: record.title,
            description: record.description,
            status: record.status,
            due_date: record.due_date,
            assigned_to: record.assigned_to,
            group_id: record.group_id,
        }
    }
}

/// Task as returned by `GET /user/groups/{id}/tasks`: `name`/`desc`/`due`,
/// `due` possibly preformatted for display (`26 Feb 2026, 07.00`), and the
/// assignee under `assignee`, possibly without an id. The dashboard spellings
/// are accepted as well since some backend versions send them here too.
#[derive(Debug, Clone, Deserialize)]
pub struct GroupTaskRecord {
    pub id: Id,
    #[serde(alias = "title")]
    pub name: String,
    #[serde(default, alias = "description")]
    pub desc: Option<String>,
    pub status: TaskStatus,
    #[serde(
        default,
        alias = "due_date",
        deserialize_with = "crate::datetime::wire::deserialize"
    )]
    pub due: Option<DateTime<Utc>>,
    #[serde(default, alias = "assignee")]
    pub assigned_to: Option<UserRef>,
    #[serde(default)]
    pub group_id: Option<Id>,
}

impl GroupTaskRecord {
    /// Records listed under a group belong to it even when the body omits `group_id`.
    pub fn into_task(self, group_id: &Id) -> Task {
        Task {
            id: self.id,
            title: self.name,
            description: self.desc,
            status: self.status,
            due_date: self.due,
            assigned_to: self.assigned_to,
            group_id: self.group_id.or_else(|| Some(group_id.clone())),
        }
    }
}

/// Body of `POST /user/tasks` and `PUT /user/tasks/{id}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskPayload {
    pub title: String,
    pub description: Option<String>,
    pub status: TaskStatus,
    #[serde(serialize_with = "crate::datetime::wire::serialize")]
    pub due_date: Option<DateTime<Utc>>,
    pub assigned_to_id: Option<Id>,
    pub group_id: Option<Id>,
}

/// User input for a new task. `due_date` is the local wall-clock value as typed.
#[derive(Debug, Clone, Default)]
pub struct TaskDraft {
    pub title: String,
    pub description: Option<String>,
    pub status: TaskStatus,
    pub due_date: Option<String>,
    /// Empty means personal task.
    pub group_id: Option<String>,
    pub assigned_to_id: Option<Id>,
}

impl TaskDraft {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    /// Validates the draft and converts it to the write shape, interpreting
    /// the due date in `tz`.
    pub fn into_payload<Tz: TimeZone>(self, tz: &Tz) -> Result<TaskPayload, ValidationError> {
        validation::task_title(&self.title)?;

        let due_date = match self.due_date.as_deref() {
            Some(raw) => datetime::to_utc_instant(raw, tz)?,
            None => None,
        };
        let group_id = self
            .group_id
            .map(|g| g.trim().to_string())
            .filter(|g| !g.is_empty())
            .map(Id::from);

        Ok(TaskPayload {
            title: self.title,
            description: self.description,
            status: self.status,
            due_date,
            assigned_to_id: self.assigned_to_id,
            group_id,
        })
    }
}
