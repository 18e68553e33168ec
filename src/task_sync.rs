// src/task_sync.rs
//
// Keeps every loaded task view consistent after a mutation without a full
// refetch. Views are only touched after the server acknowledged the change.

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::TimeZone;
use log::{debug, info};

use crate::api::ApiClient;
use crate::error::{ClientError, ClientResult, ValidationError};
use crate::models::{Id, Task, TaskDraft, TaskStatus, UserRef};

/// A rendered task list: the dashboard list or one group's task list.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TaskView {
    Mine,
    Group(Id),
}

impl TaskView {
    /// Whether `task` belongs in this view.
    pub fn accepts(&self, task: &Task) -> bool {
        match self {
            TaskView::Mine => true,
            TaskView::Group(group_id) => task.group_id.as_ref() == Some(group_id),
        }
    }
}

pub struct TaskSync {
    api: ApiClient,
    views: Mutex<HashMap<TaskView, Vec<Task>>>,
    in_flight: Mutex<HashSet<Id>>,
}

/// Marks a task id as having a mutation outstanding until dropped.
struct InFlight<'a> {
    set: &'a Mutex<HashSet<Id>>,
    id: Id,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.set
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.id);
    }
}

impl TaskSync {
    pub fn new(api: ApiClient) -> Self {
        Self {
            api,
            views: Mutex::new(HashMap::new()),
            in_flight: Mutex::new(HashSet::new()),
        }
    }

    // GET /user/tasks | GET /user/groups/{id}/tasks
    pub async fn load(&self, view: &TaskView) -> ClientResult<Vec<Task>> {
        let tasks: Vec<Task> = match view {
            TaskView::Mine => self
                .api
                .list_tasks()
                .await?
                .into_iter()
                .map(Task::from)
                .collect(),
            TaskView::Group(group_id) => self
                .api
                .group_tasks(group_id)
                .await?
                .into_iter()
                .map(|record| record.into_task(group_id))
                .collect(),
        };
        debug!("Loaded {} tasks into {:?}", tasks.len(), view);
        self.replace_view(view.clone(), tasks);
        Ok(self.view(view))
    }

    /// Snapshot of a view; empty if it was never loaded.
    pub fn view(&self, view: &TaskView) -> Vec<Task> {
        self.views().get(view).cloned().unwrap_or_default()
    }

    pub fn is_loaded(&self, view: &TaskView) -> bool {
        self.views().contains_key(view)
    }

    pub fn find(&self, task_id: &Id) -> Option<Task> {
        self.views()
            .values()
            .flatten()
            .find(|t| &t.id == task_id)
            .cloned()
    }

    pub(crate) fn replace_view(&self, view: TaskView, tasks: Vec<Task>) {
        let mut views = self.views();
        views.insert(view, tasks);
        fill_assignees(&mut views);
    }

    // PATCH /user/tasks/{id}
    pub async fn change_status(&self, task_id: &Id, status: TaskStatus) -> ClientResult<()> {
        let _guard = self.begin(task_id)?;
        self.api.update_task_status(task_id, status).await?;

        for task in self.views().values_mut().flatten() {
            if &task.id == task_id {
                task.status = status;
            }
        }
        info!("Task {} moved to {}", task_id, status);
        Ok(())
    }

    /// PUT /user/tasks/{id}. Returns the record now shown in the views.
    ///
    /// An assignee known only by initials is resolved from the other loaded
    /// views; if none of them knows it the save is refused rather than
    /// clearing the assignment.
    pub async fn save_task(&self, task: &Task) -> ClientResult<Task> {
        let _guard = self.begin(&task.id)?;
        let mut outgoing = task.clone();
        if let Some(assignee) = outgoing.assigned_to.as_mut().filter(|u| !u.is_identified()) {
            *assignee = self.known_assignee(&task.id).ok_or_else(|| {
                ValidationError::new(
                    "assigned_to",
                    "Assignee is not known for this task; reload your task list",
                )
            })?;
        }
        let returned = self
            .api
            .update_task(&outgoing.id, &outgoing.to_payload())
            .await?;

        let saved = match returned {
            Some(record) => {
                let mut saved = Task::from(record);
                if saved.group_id.is_none() {
                    saved.group_id = outgoing.group_id.clone();
                }
                saved
            }
            None => outgoing,
        };
        for (view, tasks) in self.views().iter_mut() {
            let Some(idx) = tasks.iter().position(|t| t.id == saved.id) else {
                continue;
            };
            if view.accepts(&saved) {
                tasks[idx] = saved.clone();
            } else {
                tasks.remove(idx);
            }
        }
        info!("Task {} saved", saved.id);
        Ok(saved)
    }

    /// POST /user/tasks. The due date is read as wall-clock time in `tz`.
    pub async fn create_task<Tz: TimeZone>(&self, draft: TaskDraft, tz: &Tz) -> ClientResult<Task> {
        let payload = draft.into_payload(tz)?;
        let record = self.api.create_task(&payload).await?;

        let mut created = Task::from(record);
        if created.group_id.is_none() {
            created.group_id = payload.group_id;
        }
        for (view, tasks) in self.views().iter_mut() {
            if view.accepts(&created) && !tasks.iter().any(|t| t.id == created.id) {
                tasks.push(created.clone());
            }
        }
        info!("Task {} created", created.id);
        Ok(created)
    }

    // DELETE /user/tasks/{id}
    pub async fn delete_task(&self, task_id: &Id) -> ClientResult<()> {
        let _guard = self.begin(task_id)?;
        self.api.delete_task(task_id).await?;

        for tasks in self.views().values_mut() {
            tasks.retain(|t| &t.id != task_id);
        }
        info!("Task {} deleted", task_id);
        Ok(())
    }

    fn begin(&self, task_id: &Id) -> ClientResult<InFlight<'_>> {
        let mut set = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        if !set.insert(task_id.clone()) {
            return Err(ClientError::Busy(task_id.clone()));
        }
        Ok(InFlight {
            set: &self.in_flight,
            id: task_id.clone(),
        })
    }

    fn known_assignee(&self, task_id: &Id) -> Option<UserRef> {
        self.views()
            .values()
            .flatten()
            .filter(|t| &t.id == task_id)
            .find_map(|t| t.assigned_to.clone().filter(UserRef::is_identified))
    }

    fn views(&self) -> MutexGuard<'_, HashMap<TaskView, Vec<Task>>> {
        self.views.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// Group listings may name an assignee by initials only; borrow the full
// reference from another view holding the same task.
fn fill_assignees(views: &mut HashMap<TaskView, Vec<Task>>) {
    let known: HashMap<Id, UserRef> = views
        .values()
        .flatten()
        .filter_map(|t| {
            let user = t.assigned_to.as_ref().filter(|u| u.is_identified())?;
            Some((t.id.clone(), user.clone()))
        })
        .collect();
    for task in views.values_mut().flatten() {
        let unresolved = task.assigned_to.as_ref().is_some_and(|u| !u.is_identified());
        if unresolved {
            if let Some(user) = known.get(&task.id) {
                task.assigned_to = Some(user.clone());
            }
        }
    }
}
