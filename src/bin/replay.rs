use std::process::ExitCode;

use squat_coach::config::{env_or, Config};
use squat_coach::engine::config::EngineConfig;
use squat_coach::logging::{init_tracing, LogConfig};
use squat_coach::replay::{replay, JsonlFrameSource};

fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    let config = Config::from_env();
    init_tracing(&LogConfig::from(&config));

    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| env_or("REPLAY_PATH", ""));
    if path.is_empty() {
        eprintln!("usage: replay <recording.jsonl>  (or set REPLAY_PATH)");
        return ExitCode::from(2);
    }

    let mut source = match JsonlFrameSource::open(&path) {
        Ok(source) => source,
        Err(e) => {
            tracing::error!(path = %path, error = %e, "Cannot open recording");
            return ExitCode::FAILURE;
        }
    };

    let engine = EngineConfig::from_env(&config.engine);
    match replay(&mut source, engine) {
        Ok(summary) => {
            if source.skipped() > 0 {
                tracing::warn!(skipped = source.skipped(), "Some lines were not valid frames");
            }
            match serde_json::to_string_pretty(&summary) {
                Ok(json) => println!("{json}"),
                Err(e) => {
                    tracing::error!(error = %e, "Failed to serialize summary");
                    return ExitCode::FAILURE;
                }
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = %e, "Replay failed");
            ExitCode::FAILURE
        }
    }
}
