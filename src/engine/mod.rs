//! 深蹲识别引擎：纯计算，不依赖 I/O
//!
//! 输入为逐帧的姿态关键点，输出为计数、阶段、反馈与告警。

pub mod calibration;
pub mod camera;
pub mod config;
pub mod geometry;
pub mod leg;
pub mod rep_counter;
pub mod session;
pub mod types;

pub use calibration::{CalibrationThresholds, Calibrator};
pub use config::EngineConfig;
pub use session::{SessionPhase, Snapshot, TrackingSession};
pub use types::{Landmark, PoseFrame, PoseLandmarks};
