//! 动作阈值自动校准
//!
//! 两个阶段依次进行：站立 (UP) 与下蹲 (DOWN)。每个阶段先展示指令
//! （不采样），再在采样窗口内对每个有关键点的帧计算膝关节 3D 角度。
//! 各阶段取中位数，再按系数换算成状态机使用的阈值：
//!
//! - up_threshold   = round(站立中位数 × 0.85, 1)
//! - down_threshold = round(下蹲中位数 × 1.25, 1)
//!
//! 时间窗口以帧时间戳为准，因此同一套逻辑既能驱动实时会话（推送帧），
//! 也能驱动离线回放（拉取帧）。

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_SQUAT_ANGLE, DEFAULT_STANDING_ANGLE, DOWN_THRESHOLD_FACTOR, UP_THRESHOLD_FACTOR,
};
use crate::engine::config::{CalibrationTimings, LegSelectionConfig};
use crate::engine::geometry::{angle_3d, round_to};
use crate::engine::leg::LegSelector;
use crate::engine::types::{LandmarkFrame, PoseFrame};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CalibrationPhase {
    Up,
    Down,
}

impl CalibrationPhase {
    pub fn default_angle(self) -> f64 {
        match self {
            CalibrationPhase::Up => DEFAULT_STANDING_ANGLE,
            CalibrationPhase::Down => DEFAULT_SQUAT_ANGLE,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            CalibrationPhase::Up => "UP",
            CalibrationPhase::Down => "DOWN",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CalibrationStep {
    Instruction,
    Sampling,
}

/// 状态机使用的两个判定角度，会话开始后不再变化
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalibrationThresholds {
    pub up_angle: f64,
    pub down_angle: f64,
}

impl CalibrationThresholds {
    pub fn new(up_angle: f64, down_angle: f64) -> Self {
        Self {
            up_angle,
            down_angle,
        }
    }

    pub fn derive(standing_angle: f64, squat_angle: f64) -> Self {
        Self {
            up_angle: round_to(standing_angle * UP_THRESHOLD_FACTOR, 1),
            down_angle: round_to(squat_angle * DOWN_THRESHOLD_FACTOR, 1),
        }
    }
}

/// 中位数；偶数个样本时取中间两个的平均值
pub fn median(samples: &[f64]) -> Option<f64> {
    if samples.is_empty() {
        return None;
    }
    let mut sorted = samples.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    } else {
        Some(sorted[mid])
    }
}

/// 阶段代表角度；没有样本时退回默认值
pub fn phase_angle(phase: CalibrationPhase, samples: &[f64]) -> f64 {
    match median(samples) {
        Some(value) => round_to(value, 1),
        None => {
            let fallback = phase.default_angle();
            tracing::warn!(
                phase = phase.as_str(),
                fallback,
                "Could not measure calibration angle, using default"
            );
            fallback
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CalibrationProgress {
    pub phase: CalibrationPhase,
    pub step: CalibrationStep,
    /// 当前窗口剩余秒数（向上取整）
    pub remaining_secs: u64,
    pub samples: usize,
    pub last_angle: Option<f64>,
}

impl CalibrationProgress {
    pub fn message(&self) -> String {
        match (self.step, self.phase) {
            (CalibrationStep::Instruction, CalibrationPhase::Up) => format!(
                "Calibrating: stand straight! Measuring in {} sec...",
                self.remaining_secs
            ),
            (CalibrationStep::Instruction, CalibrationPhase::Down) => format!(
                "Calibrating: squat down! Measuring in {} sec...",
                self.remaining_secs
            ),
            (CalibrationStep::Sampling, _) => match self.last_angle {
                Some(angle) => format!("Measuring... Angle: {} deg", angle as i64),
                None => "Measuring...".to_string(),
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CalibrationOutcome {
    pub standing_angle: f64,
    pub squat_angle: f64,
    pub thresholds: CalibrationThresholds,
    pub standing_samples: usize,
    pub squat_samples: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CalibrationStatus {
    InProgress(CalibrationProgress),
    Complete(CalibrationOutcome),
}

/// 一次进行中的校准，逐帧推送驱动
#[derive(Debug, Clone)]
pub struct CalibrationRun {
    timings: CalibrationTimings,
    selector: LegSelector,
    phase: CalibrationPhase,
    step: CalibrationStep,
    deadline_ms: Option<u64>,
    standing: Vec<f64>,
    squat: Vec<f64>,
    outcome: Option<CalibrationOutcome>,
}

impl CalibrationRun {
    pub fn new(timings: CalibrationTimings, leg_selection: LegSelectionConfig) -> Self {
        Self {
            timings,
            selector: LegSelector::new(leg_selection),
            phase: CalibrationPhase::Up,
            step: CalibrationStep::Instruction,
            deadline_ms: None,
            standing: Vec::new(),
            squat: Vec::new(),
            outcome: None,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.outcome.is_some()
    }

    pub fn phase(&self) -> CalibrationPhase {
        self.phase
    }

    pub fn step(&self) -> CalibrationStep {
        self.step
    }

    /// 处理一帧。到达最后一个截止时间的那一帧只负责结束校准，不参与采样。
    pub fn feed(&mut self, frame: &PoseFrame) -> CalibrationStatus {
        if let Some(outcome) = self.outcome {
            return CalibrationStatus::Complete(outcome);
        }

        let now = frame.timestamp_ms;
        loop {
            let duration = self.step_duration();
            let deadline = *self.deadline_ms.get_or_insert(now.saturating_add(duration));
            if now < deadline {
                break;
            }
            if !self.advance(now) {
                return CalibrationStatus::Complete(self.finish());
            }
        }

        let mut last_angle = None;
        if self.step == CalibrationStep::Sampling {
            if let Some(angle) = self.sample(frame) {
                last_angle = Some(angle);
            }
        }

        let deadline = self.deadline_ms.unwrap_or(now);
        CalibrationStatus::InProgress(CalibrationProgress {
            phase: self.phase,
            step: self.step,
            remaining_secs: deadline.saturating_sub(now).div_ceil(1000),
            samples: self.current_samples().len(),
            last_angle: last_angle.or_else(|| self.current_samples().last().copied()),
        })
    }

    /// 结束校准，用已采集的样本计算阈值（帧源提前结束时同样适用）
    pub fn finish(&mut self) -> CalibrationOutcome {
        if let Some(outcome) = self.outcome {
            return outcome;
        }

        let standing_angle = phase_angle(CalibrationPhase::Up, &self.standing);
        let squat_angle = phase_angle(CalibrationPhase::Down, &self.squat);
        let thresholds = CalibrationThresholds::derive(standing_angle, squat_angle);

        tracing::info!(
            standing_angle,
            squat_angle,
            up_threshold = thresholds.up_angle,
            down_threshold = thresholds.down_angle,
            standing_samples = self.standing.len(),
            squat_samples = self.squat.len(),
            "Calibration complete"
        );

        let outcome = CalibrationOutcome {
            standing_angle,
            squat_angle,
            thresholds,
            standing_samples: self.standing.len(),
            squat_samples: self.squat.len(),
        };
        self.outcome = Some(outcome);
        outcome
    }

    fn step_duration(&self) -> u64 {
        match self.step {
            CalibrationStep::Instruction => self.timings.instruction_ms,
            CalibrationStep::Sampling => self.timings.sampling_ms,
        }
    }

    /// 进入下一个窗口；已经是最后一个窗口时返回 false
    fn advance(&mut self, now: u64) -> bool {
        match (self.phase, self.step) {
            (phase, CalibrationStep::Instruction) => {
                self.step = CalibrationStep::Sampling;
                tracing::debug!(phase = phase.as_str(), "Calibration sampling started");
            }
            (CalibrationPhase::Up, CalibrationStep::Sampling) => {
                self.phase = CalibrationPhase::Down;
                self.step = CalibrationStep::Instruction;
                tracing::debug!(samples = self.standing.len(), "Standing phase sampled");
            }
            (CalibrationPhase::Down, CalibrationStep::Sampling) => return false,
        }
        self.deadline_ms = Some(now.saturating_add(self.step_duration()));
        true
    }

    fn sample(&mut self, frame: &PoseFrame) -> Option<f64> {
        let pose = frame.pose.as_ref()?;
        let side = self.selector.select(Some(pose));
        let joints = LandmarkFrame::from_pose(pose, side)?;
        let angle = angle_3d(&joints.hip, &joints.knee, &joints.ankle);
        if !angle.is_finite() {
            return None;
        }
        match self.phase {
            CalibrationPhase::Up => self.standing.push(angle),
            CalibrationPhase::Down => self.squat.push(angle),
        }
        Some(angle)
    }

    fn current_samples(&self) -> &[f64] {
        match self.phase {
            CalibrationPhase::Up => &self.standing,
            CalibrationPhase::Down => &self.squat,
        }
    }
}

/// 拉取式帧源，例如摄像头采集或录制文件
pub trait FrameSource {
    /// 返回 None 表示帧流结束
    fn next_frame(&mut self) -> Option<PoseFrame>;
}

impl<I> FrameSource for I
where
    I: Iterator<Item = PoseFrame>,
{
    fn next_frame(&mut self) -> Option<PoseFrame> {
        self.next()
    }
}

/// 校准过程的展示出口（窗口、浏览器推流或日志）
pub trait CalibrationSink {
    fn on_progress(&mut self, progress: &CalibrationProgress);
}

impl<F> CalibrationSink for F
where
    F: FnMut(&CalibrationProgress),
{
    fn on_progress(&mut self, progress: &CalibrationProgress) {
        self(progress)
    }
}

#[derive(Debug, Clone)]
pub struct CalibrationResult {
    pub outcome: CalibrationOutcome,
    /// 结束校准的那一帧，应交给后续的计数流程
    pub pending: Option<PoseFrame>,
}

#[derive(Debug, Clone, Default)]
pub struct Calibrator {
    timings: CalibrationTimings,
    leg_selection: LegSelectionConfig,
}

impl Calibrator {
    pub fn new(timings: CalibrationTimings, leg_selection: LegSelectionConfig) -> Self {
        Self {
            timings,
            leg_selection,
        }
    }

    pub fn start(&self) -> CalibrationRun {
        CalibrationRun::new(self.timings, self.leg_selection.clone())
    }

    /// 从帧源拉取帧直至两个阶段结束或帧源耗尽
    pub fn run<S, K>(&self, source: &mut S, sink: &mut K) -> CalibrationResult
    where
        S: FrameSource + ?Sized,
        K: CalibrationSink + ?Sized,
    {
        let mut run = self.start();
        while let Some(frame) = source.next_frame() {
            match run.feed(&frame) {
                CalibrationStatus::InProgress(progress) => sink.on_progress(&progress),
                CalibrationStatus::Complete(outcome) => {
                    return CalibrationResult {
                        outcome,
                        pending: Some(frame),
                    };
                }
            }
        }

        tracing::warn!("Frame source ended during calibration");
        CalibrationResult {
            outcome: run.finish(),
            pending: None,
        }
    }
}
