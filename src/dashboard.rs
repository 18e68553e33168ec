// src/dashboard.rs

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;

use futures::future::try_join;
use log::debug;

use crate::api::ApiClient;
use crate::error::{ClientResult, ValidationError};
use crate::models::{Group, Id, Task, TaskStatus};
use crate::task_sync::{TaskSync, TaskView};

/// Per-status counters over a task list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TaskStats {
    pub total: usize,
    pub todo: usize,
    pub in_progress: usize,
    pub done: usize,
}

impl TaskStats {
    pub fn from_tasks<'a>(tasks: impl IntoIterator<Item = &'a Task>) -> Self {
        tasks.into_iter().fold(Self::default(), |mut stats, task| {
            stats.total += 1;
            match task.status {
                TaskStatus::Todo => stats.todo += 1,
                TaskStatus::InProgress => stats.in_progress += 1,
                TaskStatus::Done => stats.done += 1,
            }
            stats
        })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StatusFilter {
    #[default]
    All,
    Only(TaskStatus),
}

impl StatusFilter {
    pub fn matches(self, task: &Task) -> bool {
        match self {
            StatusFilter::All => true,
            StatusFilter::Only(status) => task.status == status,
        }
    }
}

impl FromStr for StatusFilter {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case("all") {
            return Ok(StatusFilter::All);
        }
        s.parse::<TaskStatus>().map(StatusFilter::Only)
    }
}

/// The signed-in user's task list together with the groups they belong to.
pub struct Dashboard {
    sync: Arc<TaskSync>,
    groups: HashMap<Id, Group>,
}

impl Dashboard {
    // GET /user/tasks + GET /user/groups/me
    pub async fn load(api: &ApiClient, sync: Arc<TaskSync>) -> ClientResult<Self> {
        let (tasks, groups) = try_join(api.list_tasks(), api.my_groups()).await?;

        let tasks: Vec<Task> = tasks.into_iter().map(Task::from).collect();
        debug!("Dashboard: {} tasks, {} groups", tasks.len(), groups.len());
        sync.replace_view(TaskView::Mine, tasks);

        Ok(Self {
            sync,
            groups: groups.into_iter().map(|g| (g.id.clone(), g)).collect(),
        })
    }

    pub fn groups(&self) -> impl Iterator<Item = &Group> {
        self.groups.values()
    }

    pub fn group(&self, group_id: &Id) -> Option<&Group> {
        self.groups.get(group_id)
    }

    /// Name shown next to a group task; personal tasks have none.
    pub fn group_label(&self, task: &Task) -> Option<String> {
        let group_id = task.group_id.as_ref()?;
        Some(
            self.groups
                .get(group_id)
                .map(|g| g.name.clone())
                .unwrap_or_else(|| "Group".to_string()),
        )
    }

    pub fn member_count(&self, group_id: &Id) -> usize {
        self.groups
            .get(group_id)
            .map(Group::active_member_count)
            .unwrap_or(0)
    }

    /// Current tasks of the dashboard view, after any mutations made through
    /// the shared [`TaskSync`].
    pub fn tasks(&self, filter: StatusFilter) -> Vec<Task> {
        self.sync
            .view(&TaskView::Mine)
            .into_iter()
            .filter(|t| filter.matches(t))
            .collect()
    }

    pub fn stats(&self) -> TaskStats {
        TaskStats::from_tasks(&self.sync.view(&TaskView::Mine))
    }
}
