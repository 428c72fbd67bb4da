use std::convert::Infallible;
use std::time::Duration;

use axum::extract::{Path, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::Stream;
use uuid::Uuid;

use crate::engine::session::{SessionPhase, Snapshot};
use crate::response::AppError;
use crate::state::AppState;

fn snapshot_event(snapshot: &Snapshot) -> Option<Event> {
    match serde_json::to_string(snapshot) {
        Ok(json) => Some(Event::default().event("snapshot").data(json)),
        Err(e) => {
            tracing::error!(error = %e, "Failed to serialize snapshot");
            None
        }
    }
}

/// 推送会话快照：连接时先发送当前快照，之后每处理一帧推送一次。
/// 慢消费者只会看到最新快照，中间的会被跳过。
pub async fn session_events(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    let handle = state.sessions().get(id).await?;
    let slot = state
        .acquire_sse_slot()
        .ok_or_else(|| AppError::too_many_requests("RATE_LIMITED", "Too many SSE connections"))?;

    let mut snapshots = handle.subscribe();
    let mut shutdown_rx = state.shutdown_rx();

    let stream = async_stream::stream! {
        let _slot = slot;

        let current = snapshots.borrow_and_update().clone();
        if let Some(event) = snapshot_event(&current) {
            yield Ok(event);
        }
        let mut open = current.phase != SessionPhase::Stopped;

        while open {
            tokio::select! {
                changed = snapshots.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let snapshot = snapshots.borrow_and_update().clone();
                    if let Some(event) = snapshot_event(&snapshot) {
                        yield Ok(event);
                    }
                    open = snapshot.phase != SessionPhase::Stopped;
                }
                _ = shutdown_rx.recv() => {
                    break;
                }
            }
        }
        tracing::debug!(session_id = %id, "SSE stream closed");
    };

    Ok(Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keepalive"),
    ))
}
