//! Task records and the payloads used to create and patch them.
//!
//! `Task` mirrors what the API returns. `NewTask` and `TaskPatch` are what we
//! send back; a patch only carries the fields that change, and applying one to a
//! task yields the inverse patch, which is what optimistic updates use to undo
//! themselves.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::dates::{lenient_date, lenient_timestamp};
use crate::error::{ValidationError, ValidationErrors};
use crate::fields::*;

const MIN_TITLE_LEN: usize = 3;

/// A work item as returned by `GET /api/tasks/`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: u64,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub status: Status,
    pub priority: Priority,
    #[serde(default, deserialize_with = "lenient_date")]
    pub start_date: Option<NaiveDate>,
    #[serde(default, deserialize_with = "lenient_date")]
    pub due_date: Option<NaiveDate>,
    #[serde(default)]
    pub scope_project: Option<u64>,
    #[serde(default)]
    pub scope_funding: Option<u64>,
    #[serde(default)]
    pub scope_project_funding: Option<u64>,
    #[serde(default)]
    pub project_name: Option<String>,
    #[serde(default)]
    pub funding_name: Option<String>,
    #[serde(default)]
    pub est_hours: Option<String>,
    #[serde(default)]
    pub cost_amount: Option<String>,
    #[serde(default)]
    pub cost_currency: Option<String>,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// The single container a task belongs to, if any.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskScope {
    Unassigned,
    Project(u64),
    Funding(u64),
    ProjectFunding(u64),
}

impl Task {
    /// Scope of the task. The server guarantees at most one reference is set.
    pub fn scope(&self) -> TaskScope {
        match (self.scope_project, self.scope_funding, self.scope_project_funding) {
            (Some(p), _, _) => TaskScope::Project(p),
            (_, Some(f), _) => TaskScope::Funding(f),
            (_, _, Some(pf)) => TaskScope::ProjectFunding(pf),
            _ => TaskScope::Unassigned,
        }
    }

    pub fn is_done(&self) -> bool {
        self.status == Status::Done
    }

    pub fn is_high_priority(&self) -> bool {
        self.priority == Priority::High
    }
}

/// Partial update sent with `PATCH /api/tasks/{id}/`.
///
/// Outer `None` means "leave unchanged"; for nullable fields `Some(None)` clears
/// the value and serialises as JSON `null`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TaskPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<Status>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_date: Option<Option<NaiveDate>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date: Option<Option<NaiveDate>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project: Option<Option<u64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub funding: Option<Option<u64>>,
}

impl TaskPatch {
    pub fn status(status: Status) -> Self {
        TaskPatch {
            status: Some(status),
            ..Default::default()
        }
    }

    pub fn schedule(start: Option<NaiveDate>, due: Option<NaiveDate>) -> Self {
        TaskPatch {
            start_date: Some(start),
            due_date: Some(due),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == TaskPatch::default()
    }

    /// Apply the patch in place and return the patch that restores the
    /// previous values of exactly the fields that were touched.
    pub fn apply_to(&self, task: &mut Task) -> TaskPatch {
        let mut inverse = TaskPatch::default();
        if let Some(title) = &self.title {
            inverse.title = Some(std::mem::replace(&mut task.title, title.clone()));
        }
        if let Some(description) = &self.description {
            inverse.description = Some(std::mem::replace(&mut task.description, description.clone()));
        }
        if let Some(status) = self.status {
            inverse.status = Some(std::mem::replace(&mut task.status, status));
        }
        if let Some(priority) = self.priority {
            inverse.priority = Some(std::mem::replace(&mut task.priority, priority));
        }
        if let Some(start) = self.start_date {
            inverse.start_date = Some(std::mem::replace(&mut task.start_date, start));
        }
        if let Some(due) = self.due_date {
            inverse.due_date = Some(std::mem::replace(&mut task.due_date, due));
        }
        if let Some(project) = self.project {
            inverse.project = Some(std::mem::replace(&mut task.scope_project, project));
        }
        if let Some(funding) = self.funding {
            inverse.funding = Some(std::mem::replace(&mut task.scope_funding, funding));
        }
        inverse
    }

    /// Check the patch against the task it will be applied to.
    pub fn validate_against(&self, task: &Task) -> Result<(), ValidationErrors> {
        let mut errors = Vec::new();
        if let Some(title) = &self.title {
            check_title(title, &mut errors);
        }
        let start = self.start_date.unwrap_or(task.start_date);
        let due = self.due_date.unwrap_or(task.due_date);
        check_date_order(start, due, &mut errors);
        if matches!((self.project, self.funding), (Some(Some(_)), Some(Some(_)))) {
            errors.push(ValidationError::new("scope", "A task can belong to at most one scope"));
        }
        finish(errors)
    }
}

/// Body of `POST /api/tasks/`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewTask {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub status: Status,
    pub priority: Priority,
    pub start_date: Option<NaiveDate>,
    pub due_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub est_hours: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cost_amount: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cost_currency: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub funding: Option<u64>,
}

/// Raw user input for a new task, before validation.
#[derive(Debug, Clone)]
pub struct TaskDraft {
    pub title: String,
    pub description: Option<String>,
    pub status: Status,
    pub priority: Priority,
    pub start_date: Option<NaiveDate>,
    pub due_date: Option<NaiveDate>,
    pub est_hours: Option<String>,
    pub cost_amount: Option<String>,
    pub cost_currency: Option<String>,
    pub scope: ScopeKind,
    pub project_id: Option<u64>,
    pub funding_id: Option<u64>,
}

impl TaskDraft {
    pub fn new(title: impl Into<String>) -> Self {
        TaskDraft {
            title: title.into(),
            description: None,
            status: Status::Todo,
            priority: Priority::Medium,
            start_date: None,
            due_date: None,
            est_hours: None,
            cost_amount: None,
            cost_currency: None,
            scope: ScopeKind::Unassigned,
            project_id: None,
            funding_id: None,
        }
    }

    /// Validate every field and build the create payload.
    ///
    /// All problems are reported at once so the caller can show them inline.
    pub fn validate(self) -> Result<NewTask, ValidationErrors> {
        let mut errors = Vec::new();
        check_title(&self.title, &mut errors);
        check_date_order(self.start_date, self.due_date, &mut errors);
        check_non_negative("est_hours", self.est_hours.as_deref(), "Estimated hours must be ≥ 0", &mut errors);
        check_non_negative("cost_amount", self.cost_amount.as_deref(), "Cost amount must be ≥ 0", &mut errors);

        let (project, funding) = match self.scope {
            ScopeKind::Unassigned => (None, None),
            ScopeKind::Project => {
                if self.project_id.is_none() {
                    errors.push(ValidationError::new("project", "Select project"));
                }
                (self.project_id, None)
            }
            ScopeKind::Funding => {
                if self.funding_id.is_none() {
                    errors.push(ValidationError::new("funding", "Select funding"));
                }
                (None, self.funding_id)
            }
        };

        finish(errors)?;
        Ok(NewTask {
            title: self.title.trim().to_string(),
            description: self.description.filter(|d| !d.trim().is_empty()),
            status: self.status,
            priority: self.priority,
            start_date: self.start_date,
            due_date: self.due_date,
            est_hours: blank_to_none(self.est_hours),
            cost_amount: blank_to_none(self.cost_amount),
            cost_currency: blank_to_none(self.cost_currency),
            project,
            funding,
        })
    }
}

fn check_title(title: &str, errors: &mut Vec<ValidationError>) {
    if title.trim().chars().count() < MIN_TITLE_LEN {
        errors.push(ValidationError::new(
            "title",
            format!("Title must be at least {MIN_TITLE_LEN} characters"),
        ));
    }
}

fn check_date_order(start: Option<NaiveDate>, due: Option<NaiveDate>, errors: &mut Vec<ValidationError>) {
    if let (Some(start), Some(due)) = (start, due) {
        if due < start {
            errors.push(ValidationError::new("due_date", "End date cannot be before start date"));
        }
    }
}

fn check_non_negative(field: &'static str, value: Option<&str>, message: &str, errors: &mut Vec<ValidationError>) {
    let Some(raw) = value.map(str::trim).filter(|v| !v.is_empty()) else {
        return;
    };
    match raw.parse::<f64>() {
        Ok(n) if n >= 0.0 => {}
        _ => errors.push(ValidationError::new(field, message)),
    }
}

fn blank_to_none(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn finish(errors: Vec<ValidationError>) -> Result<(), ValidationErrors> {
    if errors.is_empty() {
        Ok(())
    } else {
        Err(ValidationErrors(errors))
    }
}
