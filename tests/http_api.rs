use chrono::NaiveDate;
use reqwest::StatusCode;
use serde_json::{json, Value};
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use project_tracker::api::{fetch_all_tasks, HttpApi, TaskApi, TaskListParams};
use project_tracker::config::ClientConfig;
use project_tracker::error::ApiError;
use project_tracker::fields::{Priority, Status, TaskOrdering};
use project_tracker::task::{TaskDraft, TaskPatch};

fn task_json(id: u64, status: &str) -> Value {
    json!({
        "id": id,
        "title": format!("Task {id}"),
        "description": null,
        "status": status,
        "priority": 2,
        "start_date": "2025-03-01",
        "due_date": null,
        "scope_project": 3,
        "scope_funding": null,
        "created_at": "2025-02-20T10:00:00Z",
        "updated_at": "2025-02-21T10:00:00Z"
    })
}

fn page(results: Vec<Value>, next: Option<&str>) -> Value {
    json!({
        "count": results.len(),
        "next": next,
        "previous": null,
        "results": results
    })
}

fn client(server: &MockServer) -> HttpApi {
    let config = ClientConfig::new(server.uri()).with_csrf_token(Some("secret-token".into()));
    HttpApi::new(config).unwrap()
}

#[tokio::test]
async fn test_list_tasks_sends_filters() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/tasks/"))
        .and(query_param("project", "3"))
        .and(query_param("status", "doing"))
        .and(query_param("ordering", "-priority"))
        .and(query_param("priority", "3"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page(vec![task_json(1, "doing")], None)))
        .expect(1)
        .mount(&server)
        .await;

    let params = TaskListParams {
        status: Some(Status::Doing),
        priority: Some(Priority::High),
        ..TaskListParams::for_project(3).ordered(TaskOrdering::PriorityDesc)
    };
    let listing = client(&server).list_tasks(&params).await.unwrap();
    assert_eq!(listing.count, 1);
    assert_eq!(listing.results[0].status, Status::Doing);
    assert_eq!(listing.results[0].start_date, NaiveDate::from_ymd_opt(2025, 3, 1));
}

#[tokio::test]
async fn test_fetch_all_follows_next_links() {
    let server = MockServer::start().await;
    let next = format!("{}/api/tasks/?page=2&project=3", server.uri());
    Mock::given(method("GET"))
        .and(path("/api/tasks/"))
        .and(query_param("page", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page(
            vec![task_json(1, "todo"), task_json(2, "todo")],
            Some(&next),
        )))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/tasks/"))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page(vec![task_json(3, "done")], None)))
        .mount(&server)
        .await;

    let api = client(&server);
    let tasks = fetch_all_tasks(&api, &TaskListParams::for_project(3)).await.unwrap();
    let ids: Vec<u64> = tasks.iter().map(|t| t.id).collect();
    assert_eq!(ids, vec![1, 2, 3]);
}

#[tokio::test]
async fn test_fetch_all_uses_page_from_next_link() {
    let server = MockServer::start().await;
    let next = format!("{}/api/tasks/?page=5&project=3", server.uri());
    Mock::given(method("GET"))
        .and(path("/api/tasks/"))
        .and(query_param("page", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page(vec![task_json(1, "todo")], Some(&next))))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/tasks/"))
        .and(query_param("page", "5"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page(vec![task_json(9, "doing")], None)))
        .expect(1)
        .mount(&server)
        .await;

    let tasks = fetch_all_tasks(&client(&server), &TaskListParams::for_project(3)).await.unwrap();
    let ids: Vec<u64> = tasks.iter().map(|t| t.id).collect();
    assert_eq!(ids, vec![1, 9]);
}

#[tokio::test]
async fn test_patch_sends_only_changed_fields_with_csrf() {
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .and(path("/api/tasks/7/"))
        .and(header("X-CSRFToken", "secret-token"))
        .and(body_json(json!({ "status": "done" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(task_json(7, "done")))
        .expect(1)
        .mount(&server)
        .await;

    let updated = client(&server)
        .update_task(7, &TaskPatch::status(Status::Done))
        .await
        .unwrap();
    assert_eq!(updated.status, Status::Done);
}

#[tokio::test]
async fn test_reschedule_patch_clears_dates_with_null() {
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .and(path("/api/tasks/7/"))
        .and(body_json(json!({ "start_date": "2025-04-01", "due_date": null })))
        .respond_with(ResponseTemplate::new(200).set_body_json(task_json(7, "todo")))
        .expect(1)
        .mount(&server)
        .await;

    let patch = TaskPatch::schedule(NaiveDate::from_ymd_opt(2025, 4, 1), None);
    client(&server).update_task(7, &patch).await.unwrap();
}

#[tokio::test]
async fn test_rejected_update_maps_to_status_error() {
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .and(path("/api/tasks/7/"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({ "status": ["Invalid choice."] })))
        .mount(&server)
        .await;

    let err = client(&server)
        .update_task(7, &TaskPatch::status(Status::Doing))
        .await
        .unwrap_err();
    assert_eq!(err.status(), Some(StatusCode::BAD_REQUEST));
    match err {
        ApiError::Status { body, .. } => assert!(body.contains("Invalid choice")),
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_create_task_posts_validated_payload() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/tasks/"))
        .and(header("X-CSRFToken", "secret-token"))
        .and(body_json(json!({
            "title": "Order panels",
            "status": "todo",
            "priority": 2,
            "start_date": null,
            "due_date": null,
            "project": 3
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(task_json(11, "todo")))
        .expect(1)
        .mount(&server)
        .await;

    let mut draft = TaskDraft::new(" Order panels ");
    draft.scope = project_tracker::fields::ScopeKind::Project;
    draft.project_id = Some(3);
    let created = client(&server).create_task(&draft.validate().unwrap()).await.unwrap();
    assert_eq!(created.id, 11);
}

#[tokio::test]
async fn test_delete_and_missing_task() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/api/tasks/5/"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/api/tasks/6/"))
        .respond_with(ResponseTemplate::new(404).set_body_string("{\"detail\":\"Not found.\"}"))
        .mount(&server)
        .await;

    let api = client(&server);
    api.delete_task(5).await.unwrap();
    let err = api.delete_task(6).await.unwrap_err();
    assert_eq!(err.status(), Some(StatusCode::NOT_FOUND));
}

#[tokio::test]
async fn test_pick_lists_and_project_window() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/projects/"))
        .and(query_param("ordering", "name"))
        .and(query_param("page_size", "100"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page(
            vec![json!({ "id": 3, "name": "Solar roof" })],
            None,
        )))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/projects/3/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": 3,
            "name": "Solar roof",
            "description": "Install panels on the community hall",
            "status": "active",
            "start_date": "2025-01-01",
            "end_date": "bogus",
            "funding_ids": [2]
        })))
        .mount(&server)
        .await;

    let api = client(&server);
    let picks = api.pick_projects().await.unwrap();
    assert_eq!(picks[0].name, "Solar roof");
    let project = api.get_project(3).await.unwrap();
    assert_eq!(project.start_date, NaiveDate::from_ymd_opt(2025, 1, 1));
    assert_eq!(project.end_date, None);
}
