pub mod session_cleanup;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::sessions::SessionRegistry;

/// 周期回收空闲会话，收到关闭广播后退出
pub fn spawn_session_cleanup(
    registry: Arc<SessionRegistry>,
    every: Duration,
    idle_timeout: Duration,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // 第一次 tick 立即返回
        ticker.tick().await;

        tracing::info!(
            every_secs = every.as_secs(),
            idle_timeout_secs = idle_timeout.as_secs(),
            "Session cleanup started"
        );
        loop {
            tokio::select! {
                _ = ticker.tick() => session_cleanup::run(&registry, idle_timeout).await,
                _ = shutdown_rx.recv() => {
                    tracing::info!("Session cleanup stopping");
                    break;
                }
            }
        }
    })
}
