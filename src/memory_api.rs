//! In-memory implementation of [`TaskApi`] for tests and offline runs.
//!
//! Filtering, ordering and pagination follow the server's documented query
//! semantics closely enough for board and command flows. Individual task ids
//! can be marked to reject updates, which is how rollback paths are exercised.

use std::collections::HashSet;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::StatusCode;
use tokio::sync::Mutex;

use crate::api::{Paged, TaskApi, TaskListParams};
use crate::error::ApiError;
use crate::fields::*;
use crate::task::{NewTask, Task, TaskPatch};

#[derive(Default)]
struct State {
    tasks: Vec<Task>,
    failing: HashSet<u64>,
    updates: Vec<(u64, TaskPatch)>,
}

/// Task store behind a mutex, paginated like the real endpoint.
pub struct MemoryApi {
    state: Mutex<State>,
    page_size: usize,
}

impl MemoryApi {
    pub fn new(tasks: Vec<Task>) -> Self {
        MemoryApi {
            state: Mutex::new(State {
                tasks,
                ..Default::default()
            }),
            page_size: 50,
        }
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Make every later update of `id` fail with a 400 response.
    pub async fn fail_updates_for(&self, id: u64) {
        self.state.lock().await.failing.insert(id);
    }

    /// Patches received so far, in arrival order.
    pub async fn updates(&self) -> Vec<(u64, TaskPatch)> {
        self.state.lock().await.updates.clone()
    }

    pub async fn snapshot(&self) -> Vec<Task> {
        self.state.lock().await.tasks.clone()
    }
}

fn matches(task: &Task, params: &TaskListParams) -> bool {
    if let Some(project) = params.project {
        if task.scope_project != Some(project) {
            return false;
        }
    }
    if let Some(funding) = params.funding {
        if task.scope_funding != Some(funding) {
            return false;
        }
    }
    if params.unassigned
        && (task.scope_project.is_some() || task.scope_funding.is_some() || task.scope_project_funding.is_some())
    {
        return false;
    }
    if params.status.is_some_and(|s| s != task.status) {
        return false;
    }
    if params.priority.is_some_and(|p| p != task.priority) {
        return false;
    }
    if let Some(search) = params.search.as_deref().filter(|s| !s.is_empty()) {
        if !task.title.to_lowercase().contains(&search.to_lowercase()) {
            return false;
        }
    }
    true
}

fn sort(tasks: &mut [Task], ordering: Option<TaskOrdering>) {
    match ordering {
        Some(TaskOrdering::Newest) => tasks.sort_by(|a, b| b.created_at.cmp(&a.created_at)),
        Some(TaskOrdering::Oldest) => tasks.sort_by(|a, b| a.created_at.cmp(&b.created_at)),
        Some(TaskOrdering::Due) => tasks.sort_by(|a, b| a.due_date.cmp(&b.due_date)),
        Some(TaskOrdering::DueDesc) => tasks.sort_by(|a, b| b.due_date.cmp(&a.due_date)),
        Some(TaskOrdering::Priority) => tasks.sort_by_key(|t| t.priority),
        Some(TaskOrdering::PriorityDesc) => tasks.sort_by(|a, b| b.priority.cmp(&a.priority)),
        None => tasks.sort_by_key(|t| t.id),
    }
}

#[async_trait]
impl TaskApi for MemoryApi {
    async fn list_tasks(&self, params: &TaskListParams) -> Result<Paged<Task>, ApiError> {
        let state = self.state.lock().await;
        let mut selected: Vec<Task> = state.tasks.iter().filter(|t| matches(t, params)).cloned().collect();
        sort(&mut selected, params.ordering);

        let page = params.page.unwrap_or(1).max(1) as usize;
        let start = (page - 1) * self.page_size;
        let count = selected.len() as u64;
        let next = (start + self.page_size < selected.len()).then(|| format!("/api/tasks/?page={}", page + 1));
        let previous = (page > 1).then(|| format!("/api/tasks/?page={}", page - 1));
        let results = selected.into_iter().skip(start).take(self.page_size).collect();
        Ok(Paged {
            count,
            next,
            previous,
            results,
        })
    }

    async fn get_task(&self, id: u64) -> Result<Task, ApiError> {
        let state = self.state.lock().await;
        state
            .tasks
            .iter()
            .find(|t| t.id == id)
            .cloned()
            .ok_or(ApiError::NotFound(id))
    }

    async fn create_task(&self, task: &NewTask) -> Result<Task, ApiError> {
        let mut state = self.state.lock().await;
        let id = state.tasks.iter().map(|t| t.id).max().unwrap_or(0) + 1;
        let now = Utc::now();
        let created = Task {
            id,
            title: task.title.clone(),
            description: task.description.clone(),
            status: task.status,
            priority: task.priority,
            start_date: task.start_date,
            due_date: task.due_date,
            scope_project: task.project,
            scope_funding: task.funding,
            scope_project_funding: None,
            project_name: None,
            funding_name: None,
            est_hours: task.est_hours.clone(),
            cost_amount: task.cost_amount.clone(),
            cost_currency: task.cost_currency.clone(),
            created_at: Some(now),
            updated_at: Some(now),
        };
        state.tasks.push(created.clone());
        Ok(created)
    }

    async fn update_task(&self, id: u64, patch: &TaskPatch) -> Result<Task, ApiError> {
        let mut state = self.state.lock().await;
        state.updates.push((id, patch.clone()));
        if state.failing.contains(&id) {
            return Err(ApiError::Status {
                status: StatusCode::BAD_REQUEST,
                body: format!("{{\"detail\":\"update of task {id} rejected\"}}"),
            });
        }
        let task = state
            .tasks
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or(ApiError::NotFound(id))?;
        patch.apply_to(task);
        task.updated_at = Some(Utc::now());
        Ok(task.clone())
    }

    async fn delete_task(&self, id: u64) -> Result<(), ApiError> {
        let mut state = self.state.lock().await;
        let before = state.tasks.len();
        state.tasks.retain(|t| t.id != id);
        if state.tasks.len() == before {
            return Err(ApiError::NotFound(id));
        }
        Ok(())
    }
}
