use std::time::Duration;

use crate::sessions::SessionRegistry;

pub async fn run(registry: &SessionRegistry, idle_timeout: Duration) {
    tracing::debug!("session_cleanup: start");
    let evicted = registry.evict_idle(idle_timeout).await;
    if evicted > 0 {
        let active = registry.len().await;
        tracing::info!(evicted, active, "session_cleanup: done");
    }
}
