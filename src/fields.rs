//! Enumerations and field types shared by the API records.
//!
//! Workflow status doubles as the kanban column key, priority travels over the
//! wire as a bare integer, and the ordering enums map CLI-friendly names onto the
//! `ordering` query values the server understands.

use std::fmt;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Workflow state of a task; also the kanban column a task belongs to.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, ValueEnum, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Todo,
    Doing,
    Done,
}

impl Status {
    /// Board columns, left to right.
    pub const ALL: [Status; 3] = [Status::Todo, Status::Doing, Status::Done];

    /// Wire value, also used as the `status` query parameter.
    pub fn as_str(self) -> &'static str {
        match self {
            Status::Todo => "todo",
            Status::Doing => "doing",
            Status::Done => "done",
        }
    }

    /// Column position on the board.
    pub fn column(self) -> usize {
        match self {
            Status::Todo => 0,
            Status::Doing => 1,
            Status::Done => 2,
        }
    }

    /// Column title shown on the board.
    pub fn title(self) -> &'static str {
        match self {
            Status::Todo => "To do",
            Status::Doing => "Doing",
            Status::Done => "Done",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Task priority. Serialised as the integers 1, 2 and 3.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, ValueEnum, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(try_from = "u8", into = "u8")]
pub enum Priority {
    Low,
    Medium,
    High,
}

impl Priority {
    pub fn level(self) -> u8 {
        match self {
            Priority::Low => 1,
            Priority::Medium => 2,
            Priority::High => 3,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Priority::Low => "Low",
            Priority::Medium => "Medium",
            Priority::High => "High",
        }
    }
}

impl TryFrom<u8> for Priority {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Priority::Low),
            2 => Ok(Priority::Medium),
            3 => Ok(Priority::High),
            other => Err(format!("priority must be 1, 2 or 3, got {other}")),
        }
    }
}

impl From<Priority> for u8 {
    fn from(p: Priority) -> Self {
        p.level()
    }
}

/// Lifecycle of a project record.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, ValueEnum, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ProjectStatus {
    New,
    Active,
    Closed,
}

/// Server-side orderings accepted by the task list endpoint.
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq, Hash)]
pub enum TaskOrdering {
    Newest,
    Oldest,
    Due,
    DueDesc,
    Priority,
    PriorityDesc,
}

impl TaskOrdering {
    /// Value of the `ordering` query parameter.
    pub fn as_query(self) -> &'static str {
        match self {
            TaskOrdering::Newest => "-created_at",
            TaskOrdering::Oldest => "created_at",
            TaskOrdering::Due => "due_date",
            TaskOrdering::DueDesc => "-due_date",
            TaskOrdering::Priority => "priority",
            TaskOrdering::PriorityDesc => "-priority",
        }
    }
}

/// Server-side orderings accepted by the project list endpoint.
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
pub enum ProjectOrdering {
    Name,
    NameDesc,
    Updated,
    UpdatedDesc,
    Start,
    End,
}

impl ProjectOrdering {
    pub fn as_query(self) -> &'static str {
        match self {
            ProjectOrdering::Name => "name",
            ProjectOrdering::NameDesc => "-name",
            ProjectOrdering::Updated => "updated_at",
            ProjectOrdering::UpdatedDesc => "-updated_at",
            ProjectOrdering::Start => "start_date",
            ProjectOrdering::End => "end_date",
        }
    }
}

/// Which container a new task is attached to.
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
pub enum ScopeKind {
    Unassigned,
    Project,
    Funding,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priority_wire_format() {
        assert_eq!(serde_json::to_string(&Priority::High).unwrap(), "3");
        let p: Priority = serde_json::from_str("2").unwrap();
        assert_eq!(p, Priority::Medium);
        assert!(serde_json::from_str::<Priority>("4").is_err());
    }

    #[test]
    fn test_status_wire_format() {
        assert_eq!(serde_json::to_string(&Status::Doing).unwrap(), "\"doing\"");
        let s: Status = serde_json::from_str("\"done\"").unwrap();
        assert_eq!(s, Status::Done);
        assert_eq!(Status::ALL.map(Status::column), [0, 1, 2]);
    }
}
