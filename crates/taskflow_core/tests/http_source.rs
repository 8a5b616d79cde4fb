use chrono::{TimeZone, Utc};
use std::time::Duration;
use taskflow_core::{
    HttpTaskSource, RemoteError, RemoteOperation, RemoteTaskSource, Task, TaskCategory, TaskId,
};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn task(id: i64, title: &str) -> Task {
    let created = Utc.with_ymd_and_hms(2024, 9, 1, 8, 0, 0).unwrap();
    Task::new(TaskId(id), title, TaskCategory::Work, created)
}

fn source(server: &MockServer, timeout: Duration) -> HttpTaskSource {
    HttpTaskSource::new(server.uri(), timeout).expect("client should build")
}

#[tokio::test]
async fn list_decodes_camel_case_tasks() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/tasks"))
        .respond_with(ResponseTemplate::new(200).set_body_json(vec![task(1, "Ship release")]))
        .mount(&server)
        .await;

    let tasks = source(&server, Duration::from_secs(2)).list().await.unwrap();

    assert_eq!(tasks, vec![task(1, "Ship release")]);
}

#[tokio::test]
async fn create_posts_task_and_returns_remote_copy() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/tasks"))
        .respond_with(ResponseTemplate::new(201).set_body_json(task(4, "Book venue")))
        .expect(1)
        .mount(&server)
        .await;

    let created = source(&server, Duration::from_secs(2))
        .create(&task(4, "Book venue"))
        .await
        .unwrap();

    assert_eq!(created, task(4, "Book venue"));
}

#[tokio::test]
async fn server_error_maps_to_status() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/tasks"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let err = source(&server, Duration::from_secs(2))
        .list()
        .await
        .unwrap_err();

    assert_eq!(
        err,
        RemoteError::Status {
            operation: RemoteOperation::List,
            status: 500,
        }
    );
}

#[tokio::test]
async fn missing_task_on_update_and_delete_maps_to_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/tasks/7"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/tasks/7"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    let source = source(&server, Duration::from_secs(2));

    let update = source.update(TaskId(7), &task(7, "gone")).await.unwrap_err();
    let delete = source.delete(TaskId(7)).await.unwrap_err();

    assert_eq!(update, RemoteError::NotFound(TaskId(7)));
    assert_eq!(delete, RemoteError::NotFound(TaskId(7)));
}

#[tokio::test]
async fn missing_collection_on_list_stays_a_status_error() {
    let server = MockServer::start().await;

    let err = source(&server, Duration::from_secs(2))
        .list()
        .await
        .unwrap_err();

    assert_eq!(
        err,
        RemoteError::Status {
            operation: RemoteOperation::List,
            status: 404,
        }
    );
}

#[tokio::test]
async fn successful_delete_is_acknowledged() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/tasks/3"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;

    let ack = source(&server, Duration::from_secs(2))
        .delete(TaskId(3))
        .await
        .unwrap();

    assert!(ack.success);
}

#[tokio::test]
async fn slow_response_past_client_timeout_maps_to_timeout() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/tasks/2"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(task(2, "late"))
                .set_delay(Duration::from_millis(800)),
        )
        .mount(&server)
        .await;

    let err = source(&server, Duration::from_millis(100))
        .update(TaskId(2), &task(2, "late"))
        .await
        .unwrap_err();

    assert_eq!(err, RemoteError::Timeout(RemoteOperation::Update));
}

#[tokio::test]
async fn malformed_body_maps_to_decode() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/tasks"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&server)
        .await;

    let err = source(&server, Duration::from_secs(2))
        .list()
        .await
        .unwrap_err();

    assert!(matches!(err, RemoteError::Decode(_)), "unexpected error: {err}");
}
