//! Live tracking sessions.
//!
//! Each session is owned by a single tokio task. Frames reach it through a
//! bounded queue so they are processed strictly in arrival order, and every
//! processed frame publishes a fresh snapshot on a watch channel for readers
//! (HTTP polling and SSE subscribers) without touching the engine state.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::{broadcast, mpsc, oneshot, watch, RwLock};
use uuid::Uuid;

use crate::config::LimitsConfig;
use crate::engine::calibration::CalibrationThresholds;
use crate::engine::config::{CalibrationTimings, EngineConfig};
use crate::engine::session::{SessionPhase, Snapshot, TrackingSession};
use crate::engine::types::PoseFrame;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Session {0} not found")]
    NotFound(Uuid),
    #[error("Session limit reached ({0} active)")]
    CapacityExceeded(usize),
    #[error("Session {0} is closed")]
    Closed(Uuid),
    #[error("Invalid session options: {0}")]
    InvalidConfig(String),
}

pub enum SessionCommand {
    Frame {
        frame: PoseFrame,
        reply: Option<oneshot::Sender<Arc<Snapshot>>>,
    },
    Reset {
        reply: oneshot::Sender<Arc<Snapshot>>,
    },
    Stop,
}

/// Options accepted when a session is created.
#[derive(Debug, Clone, Default)]
pub struct SessionOptions {
    /// Skip calibration and count with these thresholds.
    pub thresholds: Option<CalibrationThresholds>,
    pub calibration: Option<CalibrationTimings>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    pub id: Uuid,
    pub phase: SessionPhase,
    pub counter: u32,
    pub frame_index: u64,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct SessionHandle {
    id: Uuid,
    created_at: DateTime<Utc>,
    commands: mpsc::Sender<SessionCommand>,
    snapshots: watch::Receiver<Arc<Snapshot>>,
    /// Unix millis of the last client interaction
    last_activity: Arc<AtomicI64>,
}

impl SessionHandle {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn latest(&self) -> Arc<Snapshot> {
        self.snapshots.borrow().clone()
    }

    fn touch(&self) {
        self.last_activity
            .store(Utc::now().timestamp_millis(), Ordering::Relaxed);
    }

    /// Time since a client last touched this session.
    pub fn idle_for(&self) -> Duration {
        let elapsed = Utc::now().timestamp_millis() - self.last_activity.load(Ordering::Relaxed);
        Duration::from_millis(elapsed.max(0) as u64)
    }

    /// True once the worker has exited.
    pub fn is_closed(&self) -> bool {
        self.commands.is_closed()
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<Snapshot>> {
        self.snapshots.clone()
    }

    pub fn summary(&self) -> SessionSummary {
        let latest = self.latest();
        SessionSummary {
            id: self.id,
            phase: latest.phase,
            counter: latest.counter,
            frame_index: latest.frame_index,
            created_at: self.created_at,
        }
    }

    /// Queue a frame without waiting for it to be processed.
    pub async fn push(&self, frame: PoseFrame) -> Result<(), SessionError> {
        self.touch();
        self.commands
            .send(SessionCommand::Frame { frame, reply: None })
            .await
            .map_err(|_| SessionError::Closed(self.id))
    }

    /// Queue a frame and wait for the snapshot it produced.
    pub async fn submit(&self, frame: PoseFrame) -> Result<Arc<Snapshot>, SessionError> {
        self.touch();
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(SessionCommand::Frame {
                frame,
                reply: Some(reply),
            })
            .await
            .map_err(|_| SessionError::Closed(self.id))?;
        rx.await.map_err(|_| SessionError::Closed(self.id))
    }

    /// Submit frames in order; returns the snapshot of the last one.
    pub async fn submit_batch(
        &self,
        frames: Vec<PoseFrame>,
    ) -> Result<Arc<Snapshot>, SessionError> {
        let mut frames = frames.into_iter();
        let Some(last) = frames.next_back() else {
            return Ok(self.latest());
        };
        for frame in frames {
            self.push(frame).await?;
        }
        self.submit(last).await
    }

    pub async fn reset(&self) -> Result<Arc<Snapshot>, SessionError> {
        self.touch();
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(SessionCommand::Reset { reply })
            .await
            .map_err(|_| SessionError::Closed(self.id))?;
        rx.await.map_err(|_| SessionError::Closed(self.id))
    }

    /// Ask the worker to stop after draining queued frames and wait for the final snapshot.
    pub async fn stop(&self) -> Arc<Snapshot> {
        let _ = self.commands.send(SessionCommand::Stop).await;
        let mut rx = self.snapshots.clone();
        let result = rx
            .wait_for(|snapshot| snapshot.phase == SessionPhase::Stopped)
            .await
            .map(|snapshot| snapshot.clone());
        match result {
            Ok(snapshot) => snapshot,
            Err(_) => self.latest(),
        }
    }
}

pub struct SessionRegistry {
    sessions: RwLock<HashMap<Uuid, SessionHandle>>,
    engine: EngineConfig,
    max_sessions: usize,
    queue_capacity: usize,
    shutdown_tx: broadcast::Sender<()>,
}

impl SessionRegistry {
    pub fn new(
        engine: EngineConfig,
        limits: &LimitsConfig,
        shutdown_tx: broadcast::Sender<()>,
    ) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            engine,
            max_sessions: limits.max_sessions,
            queue_capacity: limits.frame_queue_capacity.max(1),
            shutdown_tx,
        }
    }

    pub fn engine_config(&self) -> &EngineConfig {
        &self.engine
    }

    pub async fn create(&self, options: SessionOptions) -> Result<SessionHandle, SessionError> {
        let mut engine = self.engine.clone();
        if let Some(timings) = options.calibration {
            engine.calibration = timings;
        }
        engine.validate().map_err(SessionError::InvalidConfig)?;

        let mut sessions = self.sessions.write().await;
        prune_closed(&mut sessions);
        if sessions.len() >= self.max_sessions {
            tracing::warn!(active = sessions.len(), "Session limit reached");
            return Err(SessionError::CapacityExceeded(sessions.len()));
        }

        let tracker = match options.thresholds {
            Some(thresholds) => TrackingSession::with_thresholds(engine, thresholds),
            None => TrackingSession::new(engine),
        };

        let id = Uuid::new_v4();
        let (commands_tx, commands_rx) = mpsc::channel(self.queue_capacity);
        let (snapshot_tx, snapshot_rx) = watch::channel(Arc::new(tracker.last_snapshot().clone()));

        tokio::spawn(run_session(
            id,
            tracker,
            commands_rx,
            snapshot_tx,
            self.shutdown_tx.subscribe(),
        ));

        let created_at = Utc::now();
        let handle = SessionHandle {
            id,
            created_at,
            commands: commands_tx,
            snapshots: snapshot_rx,
            last_activity: Arc::new(AtomicI64::new(created_at.timestamp_millis())),
        };
        sessions.insert(id, handle.clone());
        tracing::info!(session_id = %id, active = sessions.len(), "Session created");
        Ok(handle)
    }

    pub async fn get(&self, id: Uuid) -> Result<SessionHandle, SessionError> {
        let handle = self
            .sessions
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or(SessionError::NotFound(id))?;
        handle.touch();
        Ok(handle)
    }

    pub async fn list(&self) -> Vec<SessionSummary> {
        let mut summaries: Vec<SessionSummary> = self
            .sessions
            .read()
            .await
            .values()
            .map(SessionHandle::summary)
            .collect();
        summaries.sort_by_key(|s| s.created_at);
        summaries
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Remove a session and return its final snapshot.
    pub async fn remove(&self, id: Uuid) -> Result<Arc<Snapshot>, SessionError> {
        let handle = self
            .sessions
            .write()
            .await
            .remove(&id)
            .ok_or(SessionError::NotFound(id))?;
        let final_snapshot = handle.stop().await;
        tracing::info!(session_id = %id, counter = final_snapshot.counter, "Session removed");
        Ok(final_snapshot)
    }

    /// Stop sessions nobody has touched for `idle_timeout` and drop entries
    /// whose worker already exited. Returns how many entries were removed.
    pub async fn evict_idle(&self, idle_timeout: Duration) -> usize {
        let (closed, idle) = {
            let mut sessions = self.sessions.write().await;
            let closed = prune_closed(&mut sessions);
            let idle_ids: Vec<Uuid> = sessions
                .iter()
                .filter(|(_, handle)| handle.idle_for() >= idle_timeout)
                .map(|(id, _)| *id)
                .collect();
            let idle: Vec<SessionHandle> = idle_ids
                .iter()
                .filter_map(|id| sessions.remove(id))
                .collect();
            (closed, idle)
        };

        for handle in &idle {
            let final_snapshot = handle.stop().await;
            tracing::info!(
                session_id = %handle.id(),
                idle_secs = handle.idle_for().as_secs(),
                counter = final_snapshot.counter,
                "Idle session evicted"
            );
        }
        closed + idle.len()
    }
}

fn prune_closed(sessions: &mut HashMap<Uuid, SessionHandle>) -> usize {
    let before = sessions.len();
    sessions.retain(|_, handle| !handle.is_closed());
    let pruned = before - sessions.len();
    if pruned > 0 {
        tracing::debug!(pruned, "Dropped sessions whose worker exited");
    }
    pruned
}

async fn run_session(
    id: Uuid,
    mut tracker: TrackingSession,
    mut commands: mpsc::Receiver<SessionCommand>,
    snapshots: watch::Sender<Arc<Snapshot>>,
    mut shutdown_rx: broadcast::Receiver<()>,
) {
    tracing::debug!(session_id = %id, "Session worker started");

    loop {
        tokio::select! {
            command = commands.recv() => match command {
                Some(SessionCommand::Frame { frame, reply }) => {
                    let previous_phase = tracker.phase();
                    let previous_counter = tracker.counter();
                    let snapshot = Arc::new(tracker.process(&frame));

                    if previous_phase != snapshot.phase {
                        tracing::info!(
                            session_id = %id,
                            thresholds = ?snapshot.thresholds,
                            "Calibration finished, tracking started"
                        );
                    }
                    if snapshot.counter > previous_counter {
                        tracing::info!(session_id = %id, counter = snapshot.counter, "Rep completed");
                    }

                    snapshots.send_replace(snapshot.clone());
                    if let Some(reply) = reply {
                        let _ = reply.send(snapshot);
                    }
                }
                Some(SessionCommand::Reset { reply }) => {
                    let snapshot = Arc::new(tracker.reset());
                    tracing::info!(session_id = %id, "Session counter reset");
                    snapshots.send_replace(snapshot.clone());
                    let _ = reply.send(snapshot);
                }
                Some(SessionCommand::Stop) | None => break,
            },
            _ = shutdown_rx.recv() => {
                tracing::info!(session_id = %id, "Shutdown signal received, stopping session");
                break;
            }
        }
    }

    let final_snapshot = tracker.last_snapshot().stopped();
    tracing::info!(
        session_id = %id,
        counter = final_snapshot.counter,
        frames = final_snapshot.frame_index,
        "Session stopped"
    );
    snapshots.send_replace(Arc::new(final_snapshot));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::rep_counter::Stage;

    fn registry(max_sessions: usize) -> SessionRegistry {
        let (tx, _) = broadcast::channel(4);
        let limits = LimitsConfig {
            max_sessions,
            max_sse_connections: 4,
            frame_queue_capacity: 8,
            session_idle_timeout_secs: 300,
        };
        SessionRegistry::new(EngineConfig::default(), &limits, tx)
    }

    fn counting() -> SessionOptions {
        SessionOptions {
            thresholds: Some(CalibrationThresholds::new(150.0, 100.0)),
            calibration: None,
        }
    }

    #[tokio::test]
    async fn create_and_get_session() {
        let registry = registry(2);
        let handle = registry.create(SessionOptions::default()).await.unwrap();
        let fetched = registry.get(handle.id()).await.unwrap();
        assert_eq!(fetched.latest().phase, SessionPhase::Calibrating);
        assert_eq!(registry.len().await, 1);
    }

    #[tokio::test]
    async fn capacity_is_enforced() {
        let registry = registry(1);
        registry.create(SessionOptions::default()).await.unwrap();
        let err = registry.create(SessionOptions::default()).await.err().unwrap();
        assert!(matches!(err, SessionError::CapacityExceeded(1)));
    }

    #[tokio::test]
    async fn frames_are_processed_in_order() {
        let registry = registry(1);
        let handle = registry.create(counting()).await.unwrap();
        let frames: Vec<PoseFrame> = (0..5).map(|i| PoseFrame::missing(i * 33)).collect();
        let snapshot = handle.submit_batch(frames).await.unwrap();
        assert_eq!(snapshot.frame_index, 5);
        assert_eq!(snapshot.timestamp_ms, 132);
        assert_eq!(snapshot.stage, Stage::None);
        assert_eq!(handle.latest().frame_index, 5);
    }

    #[tokio::test]
    async fn remove_returns_final_snapshot() {
        let registry = registry(1);
        let handle = registry.create(counting()).await.unwrap();
        handle.submit(PoseFrame::missing(0)).await.unwrap();

        let final_snapshot = registry.remove(handle.id()).await.unwrap();
        assert_eq!(final_snapshot.phase, SessionPhase::Stopped);
        assert_eq!(final_snapshot.frame_index, 1);
        assert!(registry.is_empty().await);
        assert!(matches!(
            handle.submit(PoseFrame::missing(33)).await,
            Err(SessionError::Closed(_))
        ));
    }

    #[tokio::test]
    async fn unknown_session_is_not_found() {
        let registry = registry(1);
        let id = Uuid::new_v4();
        assert!(matches!(registry.get(id).await, Err(SessionError::NotFound(_))));
        assert!(matches!(registry.remove(id).await, Err(SessionError::NotFound(_))));
    }

    #[tokio::test]
    async fn shutdown_stops_workers() {
        let (tx, _) = broadcast::channel(4);
        let limits = LimitsConfig {
            max_sessions: 2,
            max_sse_connections: 4,
            frame_queue_capacity: 8,
            session_idle_timeout_secs: 300,
        };
        let registry = SessionRegistry::new(EngineConfig::default(), &limits, tx.clone());
        let handle = registry.create(counting()).await.unwrap();
        let mut rx = handle.subscribe();

        tx.send(()).unwrap();
        let stopped = rx
            .wait_for(|s| s.phase == SessionPhase::Stopped)
            .await
            .map(|s| s.clone())
            .unwrap();
        assert_eq!(stopped.feedback, "Workout complete! You did 0 squats.");
    }

    #[tokio::test]
    async fn invalid_calibration_timings_rejected() {
        let registry = registry(1);
        let options = SessionOptions {
            thresholds: None,
            calibration: Some(CalibrationTimings {
                instruction_ms: 0,
                sampling_ms: 0,
            }),
        };
        assert!(matches!(
            registry.create(options).await,
            Err(SessionError::InvalidConfig(_))
        ));
    }

    #[tokio::test]
    async fn abandoned_session_is_evicted_when_idle() {
        let registry = registry(1);
        let handle = registry.create(SessionOptions::default()).await.unwrap();
        let mut rx = handle.subscribe();
        drop(handle);

        assert_eq!(registry.evict_idle(Duration::from_secs(300)).await, 0);
        assert_eq!(registry.len().await, 1);

        assert_eq!(registry.evict_idle(Duration::ZERO).await, 1);
        assert!(registry.is_empty().await);
        assert_eq!(rx.borrow_and_update().phase, SessionPhase::Stopped);
        assert!(registry.create(SessionOptions::default()).await.is_ok());
    }

    #[tokio::test]
    async fn activity_keeps_session_alive() {
        let registry = registry(1);
        let handle = registry.create(counting()).await.unwrap();
        tokio::time::sleep(Duration::from_millis(60)).await;
        handle.submit(PoseFrame::missing(0)).await.unwrap();

        assert_eq!(registry.evict_idle(Duration::from_millis(50)).await, 0);
        assert_eq!(registry.len().await, 1);
    }

    #[tokio::test]
    async fn stopped_worker_frees_its_slot() {
        let (tx, _) = broadcast::channel(4);
        let limits = LimitsConfig {
            max_sessions: 1,
            max_sse_connections: 4,
            frame_queue_capacity: 8,
            session_idle_timeout_secs: 300,
        };
        let registry = SessionRegistry::new(EngineConfig::default(), &limits, tx.clone());
        let handle = registry.create(counting()).await.unwrap();

        tx.send(()).unwrap();
        tokio::time::timeout(Duration::from_secs(1), async {
            while !handle.is_closed() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();

        let replacement = registry.create(counting()).await.unwrap();
        assert_ne!(replacement.id(), handle.id());
        assert_eq!(registry.len().await, 1);
    }
}
