//! Read-through caching and invalidation for `QueryClient`

mod common;

use common::{Harness, jwt_expiring_in};
use serde_json::json;
use std::time::Duration;
use taskboard_core::{NewTask, ProjectUpdate, TaskStatus, TaskUpdate};
use taskboard_http::{AuthService, QueryClient, QueryKey};
use wiremock::matchers::{method, path};
use wiremock::{Mock, ResponseTemplate};

fn task(id: &str, status: &str) -> serde_json::Value {
    json!({
        "id": id,
        "project_id": "p1",
        "title": format!("Task {id}"),
        "status": status,
        "created_at": "2024-05-01T12:00:00Z"
    })
}

fn project(id: &str, task_count: u64) -> serde_json::Value {
    json!({
        "id": id,
        "name": format!("Project {id}"),
        "color": "#3B82F6",
        "task_count": task_count,
        "created_at": "2024-05-01T12:00:00Z"
    })
}

async fn authenticated() -> Harness {
    let h = Harness::start().await;
    h.store_tokens(&jwt_expiring_in(3600), Some("refresh_1"));
    h
}

#[tokio::test]
async fn test_repeated_reads_hit_cache() {
    let h = authenticated().await;

    Mock::given(method("GET"))
        .and(path("/tasks"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([task("t1", "todo")])))
        .expect(1)
        .mount(&h.server)
        .await;
    Mock::given(method("GET"))
        .and(path("/projects/p1/tasks"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([task("t1", "todo")])))
        .expect(1)
        .mount(&h.server)
        .await;

    let queries = QueryClient::new(h.client.clone());
    for _ in 0..3 {
        assert_eq!(queries.tasks(None).await.unwrap().len(), 1);
        assert_eq!(queries.tasks(Some("p1")).await.unwrap().len(), 1);
    }
    assert_eq!(queries.cache().len(), 2);
}

#[tokio::test]
async fn test_failed_reads_are_not_cached() {
    let h = authenticated().await;

    Mock::given(method("GET"))
        .and(path("/projects"))
        .respond_with(ResponseTemplate::new(500))
        .expect(2)
        .mount(&h.server)
        .await;

    let queries = QueryClient::new(h.client.clone());
    assert_eq!(queries.projects().await.unwrap_err().status, 500);
    assert_eq!(queries.projects().await.unwrap_err().status, 500);
    assert!(queries.cache().is_empty());
}

#[tokio::test]
async fn test_create_task_invalidates_tasks_and_projects() {
    let h = authenticated().await;

    Mock::given(method("GET"))
        .and(path("/tasks"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(2)
        .mount(&h.server)
        .await;
    Mock::given(method("GET"))
        .and(path("/projects"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([project("p1", 0)])))
        .expect(2)
        .mount(&h.server)
        .await;
    Mock::given(method("POST"))
        .and(path("/tasks"))
        .respond_with(ResponseTemplate::new(201).set_body_json(task("t1", "todo")))
        .expect(1)
        .mount(&h.server)
        .await;

    let queries = QueryClient::new(h.client.clone());
    queries.tasks(None).await.unwrap();
    queries.projects().await.unwrap();

    let created = queries.create_task(&NewTask::new("Task t1")).await.unwrap();
    assert_eq!(created.id, "t1");
    assert!(queries.cache().get(&QueryKey::tasks(None)).is_none());
    assert!(queries.cache().get(&QueryKey::projects()).is_none());

    queries.tasks(None).await.unwrap();
    queries.projects().await.unwrap();
}

#[tokio::test]
async fn test_update_task_invalidates_task_entries_only() {
    let h = authenticated().await;

    Mock::given(method("GET"))
        .and(path("/tasks/t1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(task("t1", "todo")))
        .mount(&h.server)
        .await;
    Mock::given(method("GET"))
        .and(path("/projects"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([project("p1", 1)])))
        .expect(1)
        .mount(&h.server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/tasks/t1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(task("t1", "done")))
        .expect(1)
        .mount(&h.server)
        .await;

    let queries = QueryClient::new(h.client.clone());
    queries.task("t1").await.unwrap();
    queries.projects().await.unwrap();

    let update = TaskUpdate {
        status: Some(TaskStatus::Done),
        ..TaskUpdate::default()
    };
    let updated = queries.update_task("t1", &update).await.unwrap();
    assert_eq!(updated.status, TaskStatus::Done);

    assert!(queries.cache().get(&QueryKey::task("t1")).is_none());
    assert!(queries.cache().get(&QueryKey::projects()).is_some());
    queries.projects().await.unwrap();
}

#[tokio::test]
async fn test_delete_project_invalidates_project_and_tasks() {
    let h = authenticated().await;

    Mock::given(method("GET"))
        .and(path("/projects/p1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(project("p1", 1)))
        .mount(&h.server)
        .await;
    Mock::given(method("GET"))
        .and(path("/projects/p1/tasks"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([task("t1", "todo")])))
        .mount(&h.server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/projects/p1"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&h.server)
        .await;

    let queries = QueryClient::new(h.client.clone());
    queries.project("p1").await.unwrap();
    queries.tasks(Some("p1")).await.unwrap();
    assert_eq!(queries.cache().len(), 2);

    queries.delete_project("p1").await.unwrap();
    assert!(queries.cache().is_empty());
}

#[tokio::test]
async fn test_failed_mutation_keeps_cache() {
    let h = authenticated().await;

    Mock::given(method("GET"))
        .and(path("/projects"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([project("p1", 0)])))
        .expect(1)
        .mount(&h.server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/projects/p1"))
        .respond_with(ResponseTemplate::new(403))
        .expect(1)
        .mount(&h.server)
        .await;

    let queries = QueryClient::new(h.client.clone());
    queries.projects().await.unwrap();

    let update = ProjectUpdate {
        name: Some("Renamed".to_string()),
        ..ProjectUpdate::default()
    };
    let error = queries.update_project("p1", &update).await.unwrap_err();
    assert_eq!(error.status, 403);

    assert_eq!(queries.projects().await.unwrap()[0].name, "Project p1");
}

#[tokio::test]
async fn test_read_overlapping_mutation_is_not_cached() {
    let h = authenticated().await;

    Mock::given(method("GET"))
        .and(path("/tasks"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!([task("t1", "todo")]))
                .set_delay(Duration::from_millis(400)),
        )
        .up_to_n_times(1)
        .mount(&h.server)
        .await;
    Mock::given(method("GET"))
        .and(path("/tasks"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!([task("t1", "todo"), task("t2", "todo")])),
        )
        .mount(&h.server)
        .await;
    Mock::given(method("POST"))
        .and(path("/tasks"))
        .respond_with(ResponseTemplate::new(201).set_body_json(task("t2", "todo")))
        .expect(1)
        .mount(&h.server)
        .await;

    let queries = QueryClient::new(h.client.clone());
    let create = async {
        tokio::time::sleep(Duration::from_millis(100)).await;
        queries.create_task(&NewTask::new("Task t2")).await
    };
    let (listed, created) = tokio::join!(queries.tasks(None), create);

    // The slow read answered with the list from before the create
    assert_eq!(listed.unwrap().len(), 1);
    created.unwrap();
    assert!(queries.cache().get(&QueryKey::tasks(None)).is_none());

    assert_eq!(queries.tasks(None).await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_expired_session_drops_cached_reads() {
    let h = Harness::start().await;
    h.store_tokens("stale", Some("revoked"));

    Mock::given(method("GET"))
        .and(path("/tasks"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([task("t1", "todo")])))
        .expect(2)
        .mount(&h.server)
        .await;
    Mock::given(method("GET"))
        .and(path("/projects"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&h.server)
        .await;
    Mock::given(method("POST"))
        .and(path("/auth/refresh"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&h.server)
        .await;

    let queries = QueryClient::new(h.client.clone());
    assert_eq!(queries.tasks(None).await.unwrap().len(), 1);
    assert_eq!(queries.cache().len(), 1);

    let error = queries.projects().await.unwrap_err();
    assert!(error.is_unauthorized());
    assert_eq!(h.navigator.visits(), vec!["/auth".to_string()]);

    // Served from the server again, not from the previous session's cache
    queries.tasks(None).await.unwrap();
}

#[tokio::test]
async fn test_logout_drops_cached_reads() {
    let h = authenticated().await;

    Mock::given(method("GET"))
        .and(path("/projects"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([project("p1", 0)])))
        .expect(2)
        .mount(&h.server)
        .await;
    Mock::given(method("POST"))
        .and(path("/auth/logout"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&h.server)
        .await;

    let queries = QueryClient::new(h.client.clone());
    queries.projects().await.unwrap();

    AuthService::new(h.client.clone()).logout().await;

    queries.projects().await.unwrap();
    assert_eq!(queries.cache().len(), 1);
}
