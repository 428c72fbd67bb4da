use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::Router;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::engine::calibration::CalibrationThresholds;
use crate::engine::config::CalibrationTimings;
use crate::engine::session::Snapshot;
use crate::engine::types::PoseFrame;
use crate::extractors::JsonBody;
use crate::response::{created, ok, AppError};
use crate::routes::realtime;
use crate::sessions::SessionOptions;
use crate::state::AppState;
use crate::validation::{validate_frames, validate_thresholds, validate_timings};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_sessions).post(create_session))
        .route("/:id", get(get_session).delete(stop_session))
        .route("/:id/frames", post(submit_frames))
        .route("/:id/reset", post(reset_session))
        .route("/:id/events", get(realtime::session_events))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateSessionRequest {
    /// 已知阈值时跳过校准
    thresholds: Option<CalibrationThresholds>,
    calibration: Option<CalibrationTimings>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SessionResponse {
    id: Uuid,
    snapshot: Arc<Snapshot>,
}

/// 单帧或一批帧
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum FramesRequest {
    Batch { frames: Vec<PoseFrame> },
    Single(PoseFrame),
}

impl FramesRequest {
    fn into_frames(self) -> Vec<PoseFrame> {
        match self {
            FramesRequest::Batch { frames } => frames,
            FramesRequest::Single(frame) => vec![frame],
        }
    }
}

async fn create_session(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<CreateSessionRequest>,
) -> Result<impl axum::response::IntoResponse, AppError> {
    if let Some(thresholds) = &req.thresholds {
        validate_thresholds(thresholds).map_err(AppError::validation)?;
    }
    if let Some(timings) = &req.calibration {
        validate_timings(timings).map_err(AppError::validation)?;
    }

    let handle = state
        .sessions()
        .create(SessionOptions {
            thresholds: req.thresholds,
            calibration: req.calibration,
        })
        .await?;

    Ok(created(SessionResponse {
        id: handle.id(),
        snapshot: handle.latest(),
    }))
}

async fn list_sessions(State(state): State<AppState>) -> impl axum::response::IntoResponse {
    ok(state.sessions().list().await)
}

async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl axum::response::IntoResponse, AppError> {
    let handle = state.sessions().get(id).await?;
    Ok(ok(SessionResponse {
        id,
        snapshot: handle.latest(),
    }))
}

async fn submit_frames(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    JsonBody(req): JsonBody<FramesRequest>,
) -> Result<impl axum::response::IntoResponse, AppError> {
    let frames = req.into_frames();
    validate_frames(&frames).map_err(|e| AppError::validation(&e))?;

    let handle = state.sessions().get(id).await?;
    let snapshot = handle.submit_batch(frames).await?;
    Ok(ok(SessionResponse { id, snapshot }))
}

async fn reset_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl axum::response::IntoResponse, AppError> {
    let handle = state.sessions().get(id).await?;
    let snapshot = handle.reset().await?;
    Ok(ok(SessionResponse { id, snapshot }))
}

async fn stop_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl axum::response::IntoResponse, AppError> {
    let snapshot = state.sessions().remove(id).await?;
    Ok(ok(SessionResponse { id, snapshot }))
}
