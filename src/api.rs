//! REST client for the tracker API.
//!
//! [`TaskApi`] is the seam the boards talk through: [`HttpApi`] implements it
//! over `reqwest`, [`crate::memory_api::MemoryApi`] implements it in memory.
//! Project and funding reads only exist on [`HttpApi`].

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::config::ClientConfig;
use crate::error::ApiError;
use crate::fields::*;
use crate::project::{Funding, PickItem, Project, ProjectFunding};
use crate::task::{NewTask, Task, TaskPatch};

/// Upper bound on pages followed by [`fetch_all_tasks`].
const MAX_PAGES: u32 = 500;

/// Standard paginated list envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Paged<T> {
    pub count: u64,
    #[serde(default)]
    pub next: Option<String>,
    #[serde(default)]
    pub previous: Option<String>,
    pub results: Vec<T>,
}

/// Query parameters of `GET /api/tasks/`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct TaskListParams {
    pub project: Option<u64>,
    pub funding: Option<u64>,
    pub unassigned: bool,
    pub status: Option<Status>,
    pub ordering: Option<TaskOrdering>,
    pub page: Option<u32>,
    pub search: Option<String>,
    pub priority: Option<Priority>,
}

impl TaskListParams {
    pub fn for_project(project: u64) -> Self {
        TaskListParams {
            project: Some(project),
            ..Default::default()
        }
    }

    pub fn ordered(mut self, ordering: TaskOrdering) -> Self {
        self.ordering = Some(ordering);
        self
    }

    /// Query pairs in the order the server documents them; unset values are omitted.
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if let Some(project) = self.project {
            pairs.push(("project", project.to_string()));
        }
        if let Some(funding) = self.funding {
            pairs.push(("funding", funding.to_string()));
        }
        if self.unassigned {
            pairs.push(("unassigned", "true".to_string()));
        }
        if let Some(status) = self.status {
            pairs.push(("status", status.as_str().to_string()));
        }
        if let Some(ordering) = self.ordering {
            pairs.push(("ordering", ordering.as_query().to_string()));
        }
        if let Some(page) = self.page {
            pairs.push(("page", page.to_string()));
        }
        if let Some(search) = self.search.as_deref().filter(|s| !s.is_empty()) {
            pairs.push(("search", search.to_string()));
        }
        if let Some(priority) = self.priority {
            pairs.push(("priority", priority.level().to_string()));
        }
        pairs
    }
}

/// Task endpoints used by the boards and commands.
#[async_trait]
pub trait TaskApi: Send + Sync {
    /// Fetch one page of tasks.
    async fn list_tasks(&self, params: &TaskListParams) -> Result<Paged<Task>, ApiError>;

    async fn get_task(&self, id: u64) -> Result<Task, ApiError>;

    /// Create a task and return the stored record.
    async fn create_task(&self, task: &NewTask) -> Result<Task, ApiError>;

    /// Patch only the given fields and return the updated record.
    async fn update_task(&self, id: u64, patch: &TaskPatch) -> Result<Task, ApiError>;

    async fn delete_task(&self, id: u64) -> Result<(), ApiError>;
}

/// Fetch every page of a task listing, starting from `params.page` (or 1)
/// and following each `next` link until there is none.
pub async fn fetch_all_tasks(api: &dyn TaskApi, params: &TaskListParams) -> Result<Vec<Task>, ApiError> {
    let mut params = params.clone();
    let mut page = params.page.unwrap_or(1);
    let mut fetched = 0;
    let mut tasks = Vec::new();
    loop {
        params.page = Some(page);
        let batch = api.list_tasks(&params).await?;
        fetched += 1;
        tasks.extend(batch.results);
        let Some(next) = batch.next.as_deref() else {
            break;
        };
        if fetched >= MAX_PAGES {
            tracing::warn!(pages = fetched, "page limit reached, listing truncated");
            break;
        }
        page = match next_page(next) {
            Some(n) => n,
            None => {
                tracing::debug!(next, "next link without page number, assuming sequential");
                page + 1
            }
        };
    }
    tracing::debug!(count = tasks.len(), pages = fetched, "fetched task listing");
    Ok(tasks)
}

/// Page number carried by a `next` link. Relative links are accepted.
fn next_page(next: &str) -> Option<u32> {
    let base = reqwest::Url::parse("http://localhost/").ok()?;
    let url = base.join(next).ok()?;
    url.query_pairs()
        .find(|(key, _)| key == "page")
        .and_then(|(_, value)| value.parse().ok())
}

/// `reqwest`-backed client.
///
/// Cheaply cloneable (shares the reqwest client internally).
#[derive(Clone)]
pub struct HttpApi {
    client: reqwest::Client,
    config: ClientConfig,
}

impl HttpApi {
    pub fn new(config: ClientConfig) -> Result<Self, ApiError> {
        if !config.base_url.starts_with("http://") && !config.base_url.starts_with("https://") {
            return Err(ApiError::Url(config.base_url.clone()));
        }
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()?;
        Ok(HttpApi { client, config })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.config.api_root(), path);
        tracing::debug!(%method, %url, "api request");
        let mutating = method != Method::GET && method != Method::HEAD;
        let mut req = self
            .client
            .request(method, url)
            .header(reqwest::header::ACCEPT, "application/json");
        if mutating {
            if let Some(token) = &self.config.csrf_token {
                req = req.header("X-CSRFToken", token);
            }
        }
        req
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str, query: &[(&str, String)]) -> Result<T, ApiError> {
        let resp = self.request(Method::GET, path).query(query).send().await?;
        decode(resp).await
    }

    /// `GET /api/projects/`.
    pub async fn list_projects(
        &self,
        ordering: Option<ProjectOrdering>,
        search: Option<&str>,
        page: Option<u32>,
    ) -> Result<Paged<Project>, ApiError> {
        let mut query = Vec::new();
        if let Some(ordering) = ordering {
            query.push(("ordering", ordering.as_query().to_string()));
        }
        if let Some(search) = search.filter(|s| !s.is_empty()) {
            query.push(("search", search.to_string()));
        }
        if let Some(page) = page {
            query.push(("page", page.to_string()));
        }
        self.get_json("/api/projects/", &query).await
    }

    /// `GET /api/projects/{id}/`.
    pub async fn get_project(&self, id: u64) -> Result<Project, ApiError> {
        self.get_json(&format!("/api/projects/{id}/"), &[]).await
    }

    /// Project names for selectors.
    pub async fn pick_projects(&self) -> Result<Vec<PickItem>, ApiError> {
        let page: Paged<PickItem> = self
            .get_json("/api/projects/", &pick_query())
            .await?;
        Ok(page.results)
    }

    /// Funding names for selectors.
    pub async fn pick_fundings(&self) -> Result<Vec<PickItem>, ApiError> {
        let page: Paged<PickItem> = self
            .get_json("/api/fundings/", &pick_query())
            .await?;
        Ok(page.results)
    }

    /// `GET /api/fundings/{id}/`.
    pub async fn get_funding(&self, id: u64) -> Result<Funding, ApiError> {
        self.get_json(&format!("/api/fundings/{id}/"), &[]).await
    }

    /// Funding links of one project.
    pub async fn project_fundings(&self, project: u64) -> Result<Vec<ProjectFunding>, ApiError> {
        let page: Paged<ProjectFunding> = self
            .get_json("/api/project-fundings/", &[("project", project.to_string())])
            .await?;
        Ok(page.results)
    }
}

fn pick_query() -> Vec<(&'static str, String)> {
    vec![("ordering", "name".to_string()), ("page_size", "100".to_string())]
}

#[async_trait]
impl TaskApi for HttpApi {
    async fn list_tasks(&self, params: &TaskListParams) -> Result<Paged<Task>, ApiError> {
        self.get_json("/api/tasks/", &params.query_pairs()).await
    }

    async fn get_task(&self, id: u64) -> Result<Task, ApiError> {
        self.get_json(&format!("/api/tasks/{id}/"), &[]).await
    }

    async fn create_task(&self, task: &NewTask) -> Result<Task, ApiError> {
        let resp = self.request(Method::POST, "/api/tasks/").json(task).send().await?;
        decode(resp).await
    }

    async fn update_task(&self, id: u64, patch: &TaskPatch) -> Result<Task, ApiError> {
        let resp = self
            .request(Method::PATCH, &format!("/api/tasks/{id}/"))
            .json(patch)
            .send()
            .await?;
        decode(resp).await
    }

    async fn delete_task(&self, id: u64) -> Result<(), ApiError> {
        let resp = self
            .request(Method::DELETE, &format!("/api/tasks/{id}/"))
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            tracing::warn!(%status, task_id = id, "delete rejected");
            return Err(ApiError::Status { status, body });
        }
        Ok(())
    }
}

/// Turn a response into `T`, or into `ApiError::Status` for non-2xx answers.
async fn decode<T: DeserializeOwned>(resp: Response) -> Result<T, ApiError> {
    let status = resp.status();
    let body = resp.text().await?;
    if !status.is_success() {
        tracing::warn!(%status, "api request rejected");
        return Err(ApiError::Status { status, body });
    }
    Ok(serde_json::from_str(&body)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_pairs_skip_unset_values() {
        let params = TaskListParams::for_project(12).ordered(TaskOrdering::PriorityDesc);
        assert_eq!(
            params.query_pairs(),
            vec![("project", "12".to_string()), ("ordering", "-priority".to_string())]
        );

        let params = TaskListParams {
            unassigned: true,
            status: Some(Status::Doing),
            page: Some(2),
            search: Some(String::new()),
            priority: Some(Priority::High),
            ..Default::default()
        };
        assert_eq!(
            params.query_pairs(),
            vec![
                ("unassigned", "true".to_string()),
                ("status", "doing".to_string()),
                ("page", "2".to_string()),
                ("priority", "3".to_string()),
            ]
        );
    }

    #[test]
    fn test_next_page_reads_absolute_and_relative_links() {
        assert_eq!(next_page("https://tracker.example.org/api/tasks/?project=3&page=4"), Some(4));
        assert_eq!(next_page("/api/tasks/?page=2"), Some(2));
        assert_eq!(next_page("/api/tasks/?cursor=abc"), None);
    }

    #[test]
    fn test_rejects_non_http_base_url() {
        let err = HttpApi::new(ClientConfig::new("localhost:8000")).err().unwrap();
        assert!(matches!(err, ApiError::Url(_)));
    }
}
