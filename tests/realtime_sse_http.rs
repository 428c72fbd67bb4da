mod common;

use std::time::Duration;

use axum::body::Body;
use axum::http::{Method, StatusCode};
use http_body_util::BodyExt;

use common::app::{spawn_test_app, spawn_with_limits};
use common::fixtures::{counting_session_body, frames_for, frames_json};
use common::http::{request, response_json, send_json};

async fn next_chunk(body: &mut Body) -> Option<String> {
    let frame = tokio::time::timeout(Duration::from_secs(2), body.frame())
        .await
        .expect("sse chunk timeout")?
        .expect("sse frame");
    let data = frame.into_data().ok()?;
    Some(String::from_utf8_lossy(&data).to_string())
}

async fn create_session(app: &axum::Router) -> String {
    let (status, body) =
        send_json(app, Method::POST, "/api/sessions", Some(counting_session_body())).await;
    assert_eq!(status, StatusCode::CREATED);
    body["data"]["id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn it_sse_endpoint_is_reachable() {
    let app = spawn_test_app();
    let id = create_session(&app.app).await;

    let response = request(&app.app, Method::GET, &format!("/api/sessions/{id}/events"), None).await;

    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response
        .headers()
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    assert!(content_type.contains("text/event-stream"));
}

#[tokio::test]
async fn it_sse_streams_snapshots_until_stopped() {
    let app = spawn_test_app();
    let id = create_session(&app.app).await;

    let response = request(&app.app, Method::GET, &format!("/api/sessions/{id}/events"), None).await;
    let mut body = response.into_body();

    let first = next_chunk(&mut body).await.expect("initial snapshot");
    assert!(first.contains("event: snapshot"));
    assert!(first.contains("\"frameIndex\":0"));

    send_json(
        &app.app,
        Method::POST,
        &format!("/api/sessions/{id}/frames"),
        Some(frames_json(&frames_for(&[170.0], 0))),
    )
    .await;
    let second = next_chunk(&mut body).await.expect("frame snapshot");
    assert!(second.contains("\"frameIndex\":1"));
    assert!(second.contains("Good! Go down!"));

    send_json(&app.app, Method::DELETE, &format!("/api/sessions/{id}"), None).await;
    let last = next_chunk(&mut body).await.expect("final snapshot");
    assert!(last.contains("\"phase\":\"stopped\""));
    assert!(next_chunk(&mut body).await.is_none());
}

#[tokio::test]
async fn it_sse_unknown_session_is_not_found() {
    let app = spawn_test_app();
    let id = uuid::Uuid::new_v4();
    let response = request(&app.app, Method::GET, &format!("/api/sessions/{id}/events"), None).await;
    let (status, _, body) = response_json(response).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "NOT_FOUND");
}

#[tokio::test]
async fn it_sse_connection_limit() {
    let app = spawn_with_limits(4, 1);
    let id = create_session(&app.app).await;
    let path = format!("/api/sessions/{id}/events");

    let held = request(&app.app, Method::GET, &path, None).await;
    assert_eq!(held.status(), StatusCode::OK);

    let rejected = request(&app.app, Method::GET, &path, None).await;
    assert_eq!(rejected.status(), StatusCode::TOO_MANY_REQUESTS);

    drop(held);
    let retry = request(&app.app, Method::GET, &path, None).await;
    assert_eq!(retry.status(), StatusCode::OK);
}

#[tokio::test]
async fn it_sse_ends_on_shutdown() {
    let app = spawn_test_app();
    let id = create_session(&app.app).await;
    let response = request(&app.app, Method::GET, &format!("/api/sessions/{id}/events"), None).await;
    let mut body = response.into_body();
    next_chunk(&mut body).await.expect("initial snapshot");

    app.shutdown_tx.send(()).unwrap();
    while next_chunk(&mut body).await.is_some() {}
}
