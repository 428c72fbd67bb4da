mod common;

use axum::http::{Method, StatusCode};
use serde_json::json;

use common::app::{spawn_test_app, spawn_with_limits};
use common::fixtures::{counting_session_body, frames_for, frames_json, squat_cycle};
use common::http::{assert_json_error, assert_status_ok_json, request, response_json, send_json};

async fn create_counting_session(app: &axum::Router) -> String {
    let (status, body) =
        send_json(app, Method::POST, "/api/sessions", Some(counting_session_body())).await;
    assert_eq!(status, StatusCode::CREATED);
    body["data"]["id"].as_str().expect("session id").to_string()
}

#[tokio::test]
async fn it_health_reports_sessions() {
    let app = spawn_test_app();
    let (status, body) = send_json(&app.app, Method::GET, "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["sessions"]["active"], 0);

    let resp = request(&app.app, Method::GET, "/health/ready", None).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let resp = request(&app.app, Method::GET, "/health/live", None).await;
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn it_create_session_starts_calibrating() {
    let app = spawn_test_app();
    let (status, body) = send_json(&app.app, Method::POST, "/api/sessions", Some(json!({}))).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_status_ok_json(status, &body);
    assert_eq!(body["data"]["snapshot"]["phase"], "calibrating");
    assert_eq!(body["data"]["snapshot"]["counter"], 0);
}

#[tokio::test]
async fn it_session_with_thresholds_counts_reps() {
    let app = spawn_test_app();
    let id = create_counting_session(&app.app).await;

    let frames = frames_for(&squat_cycle(80.0), 0);
    let (status, body) = send_json(
        &app.app,
        Method::POST,
        &format!("/api/sessions/{id}/frames"),
        Some(frames_json(&frames)),
    )
    .await;
    assert_status_ok_json(status, &body);
    let snapshot = &body["data"]["snapshot"];
    assert_eq!(snapshot["phase"], "tracking");
    assert_eq!(snapshot["counter"], 1);
    assert_eq!(snapshot["stage"], "up");
    assert_eq!(snapshot["side"], "left");
    assert_eq!(snapshot["frameIndex"], frames.len());
    assert_eq!(snapshot["thresholds"]["downAngle"], 100.0);

    let (status, body) =
        send_json(&app.app, Method::GET, &format!("/api/sessions/{id}"), None).await;
    assert_status_ok_json(status, &body);
    assert_eq!(body["data"]["snapshot"]["counter"], 1);
}

#[tokio::test]
async fn it_single_frame_body_is_accepted() {
    let app = spawn_test_app();
    let id = create_counting_session(&app.app).await;

    let (status, body) = send_json(
        &app.app,
        Method::POST,
        &format!("/api/sessions/{id}/frames"),
        Some(json!({ "timestampMs": 0 })),
    )
    .await;
    assert_status_ok_json(status, &body);
    assert_eq!(body["data"]["snapshot"]["feedback"], "Stand in front of camera");
    assert_eq!(body["data"]["snapshot"]["angle"], 0.0);
}

#[tokio::test]
async fn it_invalid_frames_are_rejected() {
    let app = spawn_test_app();
    let id = create_counting_session(&app.app).await;
    let path = format!("/api/sessions/{id}/frames");

    let (status, body) = send_json(&app.app, Method::POST, &path, Some(json!({ "frames": [] }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_json_error(&body, "VALIDATION_ERROR");

    let truncated = json!({ "timestampMs": 0, "pose": [{ "x": 0.5, "y": 0.5, "z": 0.0, "visibility": 0.9 }] });
    let (status, body) = send_json(&app.app, Method::POST, &path, Some(truncated)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_json_error(&body, "VALIDATION_ERROR");

    let backwards = json!({ "frames": [{ "timestampMs": 66 }, { "timestampMs": 33 }] });
    let (status, body) = send_json(&app.app, Method::POST, &path, Some(backwards)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"].as_str().unwrap().contains("non-decreasing"));

    let (status, body) = send_json(&app.app, Method::POST, &path, Some(json!({ "foo": 1 }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_json_error(&body, "INVALID_REQUEST_BODY");
}

#[tokio::test]
async fn it_invalid_thresholds_are_rejected() {
    let app = spawn_test_app();
    let body = json!({ "thresholds": { "upAngle": 90.0, "downAngle": 120.0 } });
    let (status, body) = send_json(&app.app, Method::POST, "/api/sessions", Some(body)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_json_error(&body, "VALIDATION_ERROR");
}

#[tokio::test]
async fn it_unknown_session_is_not_found() {
    let app = spawn_test_app();
    let id = uuid::Uuid::new_v4();
    let (status, body) =
        send_json(&app.app, Method::GET, &format!("/api/sessions/{id}"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_json_error(&body, "NOT_FOUND");

    let (status, body) =
        send_json(&app.app, Method::GET, "/api/sessions/not-a-uuid", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_json_error(&body, "BAD_REQUEST");
}

#[tokio::test]
async fn it_reset_and_delete_session() {
    let app = spawn_test_app();
    let id = create_counting_session(&app.app).await;
    send_json(
        &app.app,
        Method::POST,
        &format!("/api/sessions/{id}/frames"),
        Some(frames_json(&frames_for(&squat_cycle(80.0), 0))),
    )
    .await;

    let (status, body) =
        send_json(&app.app, Method::POST, &format!("/api/sessions/{id}/reset"), None).await;
    assert_status_ok_json(status, &body);
    assert_eq!(body["data"]["snapshot"]["counter"], 0);
    assert_eq!(body["data"]["snapshot"]["stage"], "none");

    let (status, body) =
        send_json(&app.app, Method::DELETE, &format!("/api/sessions/{id}"), None).await;
    assert_status_ok_json(status, &body);
    assert_eq!(body["data"]["snapshot"]["phase"], "stopped");

    let (status, _) =
        send_json(&app.app, Method::GET, &format!("/api/sessions/{id}"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn it_list_and_capacity() {
    let app = spawn_with_limits(2, 2);
    create_counting_session(&app.app).await;
    create_counting_session(&app.app).await;

    let (status, body) = send_json(&app.app, Method::GET, "/api/sessions", None).await;
    assert_status_ok_json(status, &body);
    assert_eq!(body["data"].as_array().unwrap().len(), 2);

    let (status, body) = send_json(
        &app.app,
        Method::POST,
        "/api/sessions",
        Some(counting_session_body()),
    )
    .await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_json_error(&body, "SESSION_LIMIT");

    let resp = request(&app.app, Method::GET, "/health/ready", None).await;
    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn it_idle_sweep_frees_abandoned_slot() {
    let app = spawn_with_limits(1, 1);
    let abandoned = create_counting_session(&app.app).await;

    let (status, _) =
        send_json(&app.app, Method::POST, "/api/sessions", Some(counting_session_body())).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);

    let evicted = app
        .state
        .sessions()
        .evict_idle(std::time::Duration::ZERO)
        .await;
    assert_eq!(evicted, 1);

    let resp = request(&app.app, Method::GET, "/health/ready", None).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let (status, body) =
        send_json(&app.app, Method::GET, &format!("/api/sessions/{abandoned}"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_json_error(&body, "NOT_FOUND");

    create_counting_session(&app.app).await;
}

#[tokio::test]
async fn it_calibration_over_http() {
    let app = spawn_test_app();
    let body = json!({ "calibration": { "instructionMs": 100, "samplingMs": 200 } });
    let (status, body) = send_json(&app.app, Method::POST, "/api/sessions", Some(body)).await;
    assert_eq!(status, StatusCode::CREATED);
    let id = body["data"]["id"].as_str().unwrap().to_string();

    // 0..100 指令，100..300 采样站立，300..400 指令，400..600 采样下蹲
    let mut angles = Vec::new();
    for ts in (0..600).step_by(20) {
        angles.push(if ts < 300 { 170.0 } else { 80.0 });
    }
    let frames: Vec<_> = angles
        .iter()
        .enumerate()
        .map(|(i, a)| {
            squat_coach::engine::types::PoseFrame::detected(
                i as u64 * 20,
                common::fixtures::pose_at(*a),
            )
        })
        .collect();
    let mut all = frames;
    all.extend(frames_for(&[170.0], 600));

    let resp = request(
        &app.app,
        Method::POST,
        &format!("/api/sessions/{id}/frames"),
        Some(frames_json(&all)),
    )
    .await;
    let (status, _, body) = response_json(resp).await;
    assert_status_ok_json(status, &body);
    let snapshot = &body["data"]["snapshot"];
    assert_eq!(snapshot["phase"], "tracking");
    assert_eq!(snapshot["thresholds"]["upAngle"], 144.5);
    assert_eq!(snapshot["thresholds"]["downAngle"], 100.0);
}
