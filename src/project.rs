//! Project and funding records.
//!
//! Projects matter to the client mostly for their date window, which bounds
//! the overdue check and the schedule-vs-time comparison on the overview.
//! Fundings and project-funding links are only read for pick lists.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::dates::{lenient_date, lenient_timestamp};
use crate::fields::ProjectStatus;

/// A project as returned by `GET /api/projects/`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub status: ProjectStatus,
    #[serde(default, deserialize_with = "lenient_date")]
    pub start_date: Option<NaiveDate>,
    #[serde(default, deserialize_with = "lenient_date")]
    pub end_date: Option<NaiveDate>,
    #[serde(default)]
    pub funding_ids: Vec<u64>,
    #[serde(default)]
    pub owner: Option<u64>,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Project {
    /// First ~90 characters of the description, for one-line listings.
    pub fn tagline(&self) -> String {
        let text = self.description.as_deref().unwrap_or("").trim();
        text.chars().take(90).collect()
    }
}

/// A funding source (grant, sponsorship, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Funding {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub program: Option<String>,
    #[serde(default)]
    pub funder: Option<String>,
    #[serde(default)]
    pub amount_total: Option<String>,
    #[serde(default, deserialize_with = "lenient_date")]
    pub start_date: Option<NaiveDate>,
    #[serde(default, deserialize_with = "lenient_date")]
    pub end_date: Option<NaiveDate>,
}

/// Link between a project and one of its fundings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectFunding {
    pub id: u64,
    pub project: u64,
    pub funding: u64,
}

/// Minimal `{id, name}` entry used to fill selectors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PickItem {
    pub id: u64,
    pub name: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_project_deserialize_and_tagline() {
        let json = r#"{
            "id": 3, "name": "Solar school", "status": "active",
            "description": "Installing panels on the roof of the primary school and training the staff to maintain them over the next decade.",
            "start_date": "2025-01-01", "end_date": "", "funding_ids": [1, 2], "owner": 5
        }"#;
        let p: Project = serde_json::from_str(json).unwrap();
        assert_eq!(p.end_date, None);
        assert_eq!(p.start_date, NaiveDate::from_ymd_opt(2025, 1, 1));
        assert_eq!(p.tagline().chars().count(), 90);
    }
}
