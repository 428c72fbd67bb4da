use std::net::SocketAddr;
use std::time::Duration;

use axum::http::{header, HeaderValue};
use squat_coach::config::Config;
use squat_coach::constants::SESSION_SWEEP_INTERVAL_SECS;
use squat_coach::engine::config::EngineConfig;
use squat_coach::logging::{init_tracing, LogConfig};
use squat_coach::routes::build_router;
use squat_coach::state::AppState;
use squat_coach::workers::spawn_session_cleanup;
use tokio::sync::broadcast;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    let config = Config::from_env();

    init_tracing(&LogConfig::from(&config));
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "Starting squat-coach");

    let engine = EngineConfig::from_env(&config.engine);
    if let Err(e) = engine.validate() {
        panic!("FATAL: invalid engine configuration: {e}");
    }
    tracing::info!(
        sticky_leg_selection = engine.leg_selection.sticky,
        max_sessions = config.limits.max_sessions,
        "Engine configured"
    );

    let (shutdown_tx, _) = broadcast::channel::<()>(8);
    let state = AppState::new(engine, &config, shutdown_tx.clone());

    let cleanup = spawn_session_cleanup(
        state.session_registry(),
        Duration::from_secs(SESSION_SWEEP_INTERVAL_SECS),
        Duration::from_secs(config.limits.session_idle_timeout_secs),
        shutdown_tx.subscribe(),
    );

    let app = build_router(state)
        .layer(build_cors_layer(&config))
        .layer(TraceLayer::new_for_http())
        .layer(CatchPanicLayer::new())
        .layer(SetResponseHeaderLayer::overriding(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ));

    let addr = SocketAddr::new(config.host, config.port);
    tracing::info!(%addr, "Listening");
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind TCP listener");

    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown_tx))
        .await
    {
        tracing::error!(error = %e, "HTTP server crashed");
    }

    if let Err(e) = cleanup.await {
        tracing::warn!(error = %e, "Session cleanup task did not exit cleanly");
    }

    tracing::info!("Shutdown complete");
}

fn build_cors_layer(config: &Config) -> CorsLayer {
    if config.cors_origin.trim() == "*" {
        return CorsLayer::new()
            .allow_origin(Any)
            .allow_credentials(false)
            .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
            .allow_methods(Any);
    }

    match config.cors_origin.parse::<HeaderValue>() {
        Ok(origin) => CorsLayer::new()
            .allow_origin(origin)
            .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
            .allow_methods(Any),
        Err(e) => {
            panic!(
                "FATAL: Invalid CORS_ORIGIN '{}': {}. \
                 Fix the CORS_ORIGIN environment variable.",
                config.cors_origin, e
            );
        }
    }
}

async fn shutdown_signal(shutdown_tx: broadcast::Sender<()>) {
    #[cfg(unix)]
    {
        let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler");
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {},
            _ = sigterm.recv() => {},
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }

    // Session workers and SSE streams stop on this broadcast
    tracing::info!("Shutdown signal received");
    let _ = shutdown_tx.send(());
}
