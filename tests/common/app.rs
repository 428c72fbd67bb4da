use axum::Router;
use tokio::sync::broadcast;

use squat_coach::config::{Config, EngineEnvConfig, LimitsConfig};
use squat_coach::engine::config::EngineConfig;
use squat_coach::routes::build_router;
use squat_coach::state::AppState;

pub struct TestApp {
    pub app: Router,
    pub state: AppState,
    pub config: Config,
    pub shutdown_tx: broadcast::Sender<()>,
}

fn test_config(max_sessions: usize, max_sse_connections: usize) -> Config {
    // 直接构造 Config，避免 set_var 在并行测试中相互干扰
    Config {
        host: std::net::IpAddr::V4(std::net::Ipv4Addr::new(127, 0, 0, 1)),
        port: 5000,
        log_level: "info".to_string(),
        enable_file_logs: false,
        log_dir: "./logs".to_string(),
        cors_origin: "*".to_string(),
        limits: LimitsConfig {
            max_sessions,
            max_sse_connections,
            frame_queue_capacity: 16,
            session_idle_timeout_secs: 300,
        },
        engine: EngineEnvConfig {
            leg_selection_sticky: false,
            leg_switch_margin: 0.1,
            leg_switch_persist_frames: 5,
        },
    }
}

pub fn spawn_with_limits(max_sessions: usize, max_sse_connections: usize) -> TestApp {
    let config = test_config(max_sessions, max_sse_connections);
    let (shutdown_tx, _) = broadcast::channel::<()>(8);
    let engine = EngineConfig::from_env(&config.engine);
    let state = AppState::new(engine, &config, shutdown_tx.clone());
    let app = build_router(state.clone());

    TestApp {
        app,
        state,
        config,
        shutdown_tx,
    }
}

pub fn spawn_test_app() -> TestApp {
    spawn_with_limits(8, 8)
}
