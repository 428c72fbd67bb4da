use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::broadcast;

use crate::config::Config;
use crate::engine::config::EngineConfig;
use crate::sessions::SessionRegistry;

#[derive(Clone)]
pub struct AppState {
    sessions: Arc<SessionRegistry>,
    config: Arc<Config>,
    shutdown_tx: broadcast::Sender<()>,
    started_at: Instant,
    sse_connections: Arc<AtomicUsize>,
}

impl AppState {
    pub fn new(engine: EngineConfig, config: &Config, shutdown_tx: broadcast::Sender<()>) -> Self {
        let sessions = Arc::new(SessionRegistry::new(
            engine,
            &config.limits,
            shutdown_tx.clone(),
        ));

        Self {
            sessions,
            config: Arc::new(config.clone()),
            shutdown_tx,
            started_at: Instant::now(),
            sse_connections: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn sessions(&self) -> &SessionRegistry {
        &self.sessions
    }

    pub fn session_registry(&self) -> Arc<SessionRegistry> {
        self.sessions.clone()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn shutdown_rx(&self) -> broadcast::Receiver<()> {
        self.shutdown_tx.subscribe()
    }

    pub fn shutdown_tx(&self) -> &broadcast::Sender<()> {
        &self.shutdown_tx
    }

    pub fn uptime_secs(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }

    /// 尝试占用一个 SSE 连接名额；超出上限返回 None
    pub fn acquire_sse_slot(&self) -> Option<SseSlot> {
        let max = self.config.limits.max_sse_connections;
        let current = self.sse_connections.fetch_add(1, Ordering::SeqCst);
        if current >= max {
            self.sse_connections.fetch_sub(1, Ordering::SeqCst);
            return None;
        }
        Some(SseSlot(self.sse_connections.clone()))
    }

    pub fn sse_connections(&self) -> usize {
        self.sse_connections.load(Ordering::SeqCst)
    }
}

/// 连接关闭（流被丢弃）时释放名额
pub struct SseSlot(Arc<AtomicUsize>);

impl Drop for SseSlot {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}
