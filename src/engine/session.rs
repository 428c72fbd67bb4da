//! 单个训练会话的逐帧流水线
//!
//! 选腿 → 几何计算 → 机位检查 → 状态机，每帧输出一个不可变快照。
//! 会话先完成校准，再进入计数阶段。

use serde::Serialize;

use crate::engine::calibration::{
    CalibrationProgress, CalibrationRun, CalibrationStatus, CalibrationThresholds,
};
use crate::engine::camera::{CameraAlignment, CameraWarning, CameraWarningTimer};
use crate::engine::config::EngineConfig;
use crate::engine::geometry::{angle_3d, lateral_knee_deviation, trunk_lean_angle};
use crate::engine::leg::LegSelector;
use crate::engine::rep_counter::{FeedbackTone, FormSample, RepCounter, RepUpdate, Stage};
use crate::engine::types::{LandmarkFrame, PoseFrame, Side};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SessionPhase {
    Calibrating,
    Tracking,
    Stopped,
}

/// 对外发布的只读快照
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub frame_index: u64,
    pub timestamp_ms: u64,
    pub phase: SessionPhase,
    pub counter: u32,
    pub stage: Stage,
    pub feedback: String,
    pub feedback_tone: FeedbackTone,
    pub warnings: Vec<String>,
    pub angle: f64,
    pub back_angle: f64,
    pub back_ok: bool,
    pub side: Option<Side>,
    pub camera_warning: Option<CameraWarning>,
    pub calibration: Option<CalibrationProgress>,
    pub thresholds: Option<CalibrationThresholds>,
}

impl Snapshot {
    pub fn initial(phase: SessionPhase, thresholds: Option<CalibrationThresholds>) -> Self {
        let feedback = match phase {
            SessionPhase::Calibrating => "Calibrating: stand straight...",
            _ => "Stand in front of camera",
        };
        Self {
            frame_index: 0,
            timestamp_ms: 0,
            phase,
            counter: 0,
            stage: Stage::None,
            feedback: feedback.to_string(),
            feedback_tone: FeedbackTone::Neutral,
            warnings: Vec::new(),
            angle: 0.0,
            back_angle: 0.0,
            back_ok: true,
            side: None,
            camera_warning: None,
            calibration: None,
            thresholds,
        }
    }

    /// 会话结束时的最终快照
    pub fn stopped(&self) -> Self {
        Self {
            phase: SessionPhase::Stopped,
            feedback: format!("Workout complete! You did {} squats.", self.counter),
            feedback_tone: FeedbackTone::Neutral,
            warnings: Vec::new(),
            camera_warning: None,
            calibration: None,
            ..self.clone()
        }
    }
}

const CALIBRATION_COMPLETE: &str = "Calibration complete! Start squatting.";

enum Mode {
    Calibrating(CalibrationRun),
    Tracking(RepCounter),
}

/// 一帧的几何测量结果
struct Measurement {
    side: Side,
    sample: FormSample,
}

pub struct TrackingSession {
    config: EngineConfig,
    mode: Mode,
    selector: LegSelector,
    camera: CameraWarningTimer,
    frame_index: u64,
    last: Snapshot,
}

impl TrackingSession {
    /// 新会话，先进行校准
    pub fn new(config: EngineConfig) -> Self {
        let run = CalibrationRun::new(config.calibration, config.leg_selection.clone());
        Self {
            selector: LegSelector::new(config.leg_selection.clone()),
            config,
            mode: Mode::Calibrating(run),
            camera: CameraWarningTimer::new(),
            frame_index: 0,
            last: Snapshot::initial(SessionPhase::Calibrating, None),
        }
    }

    /// 已有阈值时跳过校准，直接计数
    pub fn with_thresholds(config: EngineConfig, thresholds: CalibrationThresholds) -> Self {
        Self {
            selector: LegSelector::new(config.leg_selection.clone()),
            config,
            mode: Mode::Tracking(RepCounter::new(thresholds)),
            camera: CameraWarningTimer::new(),
            frame_index: 0,
            last: Snapshot::initial(SessionPhase::Tracking, Some(thresholds)),
        }
    }

    pub fn phase(&self) -> SessionPhase {
        match self.mode {
            Mode::Calibrating(_) => SessionPhase::Calibrating,
            Mode::Tracking(_) => SessionPhase::Tracking,
        }
    }

    pub fn thresholds(&self) -> Option<CalibrationThresholds> {
        match &self.mode {
            Mode::Calibrating(_) => None,
            Mode::Tracking(counter) => Some(counter.thresholds()),
        }
    }

    pub fn counter(&self) -> u32 {
        match &self.mode {
            Mode::Calibrating(_) => 0,
            Mode::Tracking(counter) => counter.state().counter,
        }
    }

    pub fn last_snapshot(&self) -> &Snapshot {
        &self.last
    }

    /// 计数清零，阈值保留；校准中调用无效果
    pub fn reset(&mut self) -> Snapshot {
        if let Mode::Tracking(counter) = &mut self.mode {
            counter.reset();
            self.selector.reset();
            self.camera.reset();
            self.last = Snapshot {
                frame_index: self.frame_index,
                timestamp_ms: self.last.timestamp_ms,
                ..Snapshot::initial(SessionPhase::Tracking, Some(counter.thresholds()))
            };
        }
        self.last.clone()
    }

    pub fn process(&mut self, frame: &PoseFrame) -> Snapshot {
        self.frame_index += 1;
        let frame_index = self.frame_index;

        let snapshot = match &mut self.mode {
            Mode::Calibrating(run) => match run.feed(frame) {
                CalibrationStatus::InProgress(progress) => Snapshot {
                    frame_index,
                    timestamp_ms: frame.timestamp_ms,
                    feedback: progress.message(),
                    calibration: Some(progress),
                    ..Snapshot::initial(SessionPhase::Calibrating, None)
                },
                CalibrationStatus::Complete(outcome) => {
                    // 结束校准的那一帧直接进入计数
                    let mut counter = RepCounter::new(outcome.thresholds);
                    let mut snapshot = track_frame(
                        &mut counter,
                        &mut self.selector,
                        &mut self.camera,
                        frame_index,
                        frame,
                    );
                    snapshot.feedback = CALIBRATION_COMPLETE.to_string();
                    snapshot.feedback_tone = FeedbackTone::Positive;
                    self.mode = Mode::Tracking(counter);
                    snapshot
                }
            },
            Mode::Tracking(counter) => track_frame(
                counter,
                &mut self.selector,
                &mut self.camera,
                frame_index,
                frame,
            ),
        };

        self.last = snapshot.clone();
        snapshot
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }
}

fn track_frame(
    counter: &mut RepCounter,
    selector: &mut LegSelector,
    camera: &mut CameraWarningTimer,
    frame_index: u64,
    frame: &PoseFrame,
) -> Snapshot {
    let measurement = measure(selector, camera, frame);
    let update: RepUpdate = counter.update(measurement.as_ref().map(|m| &m.sample));
    let camera_warning = camera.tick();

    let (angle, back_angle) = match &measurement {
        Some(m) if m.sample.trunk_angle.is_finite() => (m.sample.knee_angle, m.sample.trunk_angle),
        Some(m) => (m.sample.knee_angle, 0.0),
        None => (0.0, 0.0),
    };

    Snapshot {
        frame_index,
        timestamp_ms: frame.timestamp_ms,
        phase: SessionPhase::Tracking,
        counter: update.state.counter,
        stage: update.state.stage,
        feedback: update.feedback.to_string(),
        feedback_tone: update.feedback.tone(),
        warnings: update.warnings.iter().map(ToString::to_string).collect(),
        angle,
        back_angle,
        back_ok: update.back_ok,
        side: measurement.as_ref().map(|m| m.side),
        camera_warning,
        calibration: None,
        thresholds: Some(counter.thresholds()),
    }
}

/// 没有关键点或膝角无定义时返回 None，按未检测处理
fn measure(
    selector: &mut LegSelector,
    camera: &mut CameraWarningTimer,
    frame: &PoseFrame,
) -> Option<Measurement> {
    let pose = frame.pose.as_ref()?;
    let side = selector.select(Some(pose));
    let joints = LandmarkFrame::from_pose(pose, side)?;

    let alignment = CameraAlignment::estimate(joints.left_hip_z, joints.right_hip_z);
    if alignment.is_diagonal() {
        tracing::debug!(
            deviation_degrees = alignment.deviation_degrees,
            "Diagonal camera position detected"
        );
    }
    camera.observe(&alignment);

    let knee_angle = angle_3d(&joints.hip, &joints.knee, &joints.ankle);
    if !knee_angle.is_finite() {
        return None;
    }

    Some(Measurement {
        side,
        sample: FormSample {
            knee_angle,
            trunk_angle: trunk_lean_angle(&joints.shoulder, &joints.hip),
            knee_deviation: lateral_knee_deviation(&joints.knee, &joints.ankle, &joints.hip),
        },
    })
}
