use std::env;
use std::net::{IpAddr, Ipv4Addr};
use std::str::FromStr;

use crate::constants::{
    DEFAULT_FRAME_QUEUE_CAPACITY, DEFAULT_MAX_SESSIONS, DEFAULT_MAX_SSE_CONNECTIONS,
    SESSION_IDLE_TIMEOUT_SECS,
};

#[derive(Debug, Clone)]
pub struct Config {
    pub host: IpAddr,
    pub port: u16,
    pub log_level: String,
    pub enable_file_logs: bool,
    pub log_dir: String,
    pub cors_origin: String,
    pub limits: LimitsConfig,
    pub engine: EngineEnvConfig,
}

#[derive(Debug, Clone)]
pub struct LimitsConfig {
    pub max_sessions: usize,
    pub max_sse_connections: usize,
    pub frame_queue_capacity: usize,
    pub session_idle_timeout_secs: u64,
}

#[derive(Debug, Clone)]
pub struct EngineEnvConfig {
    pub leg_selection_sticky: bool,
    pub leg_switch_margin: f64,
    pub leg_switch_persist_frames: u32,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            host: env_or_parse("HOST", IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1))),
            port: env_or_parse("PORT", 5000_u16),
            log_level: env_or("RUST_LOG", "info"),
            enable_file_logs: env_or_bool("ENABLE_FILE_LOGS", false),
            log_dir: env_or("LOG_DIR", "./logs"),
            cors_origin: env_or("CORS_ORIGIN", "*"),
            limits: LimitsConfig {
                max_sessions: env_or_parse("MAX_SESSIONS", DEFAULT_MAX_SESSIONS),
                max_sse_connections: env_or_parse(
                    "MAX_SSE_CONNECTIONS",
                    DEFAULT_MAX_SSE_CONNECTIONS,
                ),
                frame_queue_capacity: env_or_parse(
                    "FRAME_QUEUE_CAPACITY",
                    DEFAULT_FRAME_QUEUE_CAPACITY,
                )
                .max(1),
                session_idle_timeout_secs: env_or_parse(
                    "SESSION_IDLE_TIMEOUT_SECS",
                    SESSION_IDLE_TIMEOUT_SECS,
                )
                .max(1),
            },
            engine: EngineEnvConfig {
                leg_selection_sticky: env_or_bool("LEG_SELECTION_STICKY", false),
                leg_switch_margin: env_or_parse("LEG_SWITCH_MARGIN", 0.10_f64),
                leg_switch_persist_frames: env_or_parse("LEG_SWITCH_PERSIST_FRAMES", 5_u32),
            },
        }
    }
}

pub fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

pub fn env_or_parse<T>(key: &str, default: T) -> T
where
    T: FromStr + Copy,
{
    match env::var(key) {
        Ok(raw) => match raw.parse::<T>() {
            Ok(v) => v,
            Err(_) => {
                tracing::warn!(
                    key,
                    value = %raw,
                    "Failed to parse env var, using default"
                );
                default
            }
        },
        Err(_) => default,
    }
}

pub fn env_or_bool(key: &str, default: bool) -> bool {
    match env::var(key) {
        Ok(raw) => match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => true,
            "0" | "false" | "no" | "off" => false,
            _ => default,
        },
        Err(_) => default,
    }
}
