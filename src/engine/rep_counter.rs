//! 深蹲计数状态机
//!
//! 三个状态：None（空闲）→ Up（站立）→ Down（下蹲）。
//! 膝角高于 up 阈值进入 Up，低于 down 阈值进入 Down，两者之间为死区，
//! 状态保持不变。Down → Up 的转换完成一个动作周期，只有下蹲阶段达到的
//! 最小角度不超过 down 阈值时才计数。

use std::fmt;

use serde::Serialize;

use crate::constants::{BACK_ANGLE_LIMIT, KNEE_DEVIATION_LIMIT, MIN_ANGLE_SENTINEL};
use crate::engine::calibration::CalibrationThresholds;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Stage {
    #[default]
    None,
    Up,
    Down,
}

/// 单帧的形态信号
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FormSample {
    pub knee_angle: f64,
    pub trunk_angle: f64,
    pub knee_deviation: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum FeedbackTone {
    Positive,
    Corrective,
    Neutral,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Feedback {
    StandInFrame,
    GoDown,
    RepCounted,
    NotDeepEnough { min_angle: f64 },
    DepthReached,
    GoLower { target: f64, current: f64 },
}

impl Feedback {
    pub fn tone(&self) -> FeedbackTone {
        match self {
            Feedback::StandInFrame => FeedbackTone::Neutral,
            Feedback::GoDown | Feedback::RepCounted | Feedback::DepthReached => {
                FeedbackTone::Positive
            }
            Feedback::NotDeepEnough { .. } | Feedback::GoLower { .. } => FeedbackTone::Corrective,
        }
    }
}

impl fmt::Display for Feedback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Feedback::StandInFrame => write!(f, "Stand in front of camera"),
            Feedback::GoDown => write!(f, "Good! Go down!"),
            Feedback::RepCounted => write!(f, "Great! Stand up!"),
            Feedback::NotDeepEnough { min_angle } => {
                write!(f, "Not deep enough! Min: {} deg", *min_angle as i64)
            }
            Feedback::DepthReached => write!(f, "Great depth! Stand up!"),
            Feedback::GoLower { target, current } => write!(
                f,
                "Lower! Need < {} deg. Now: {}",
                *target as i64, *current as i64
            ),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum FormWarning {
    RoundedBack,
    KneesCavingIn,
}

impl fmt::Display for FormWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FormWarning::RoundedBack => write!(f, "! Round back"),
            FormWarning::KneesCavingIn => write!(f, "! Knees caving in"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RepState {
    pub stage: Stage,
    pub counter: u32,
    /// 仅在 Down 阶段有意义，其余时间保持哨兵值 180°
    pub min_angle_reached: f64,
}

impl Default for RepState {
    fn default() -> Self {
        Self {
            stage: Stage::None,
            counter: 0,
            min_angle_reached: MIN_ANGLE_SENTINEL,
        }
    }
}

/// 一帧处理后的结果
#[derive(Debug, Clone, PartialEq)]
pub struct RepUpdate {
    pub state: RepState,
    pub feedback: Feedback,
    pub warnings: Vec<FormWarning>,
    pub rep_completed: bool,
    pub back_ok: bool,
}

#[derive(Debug, Clone)]
pub struct RepCounter {
    thresholds: CalibrationThresholds,
    state: RepState,
}

impl RepCounter {
    pub fn new(thresholds: CalibrationThresholds) -> Self {
        Self {
            thresholds,
            state: RepState::default(),
        }
    }

    pub fn thresholds(&self) -> CalibrationThresholds {
        self.thresholds
    }

    pub fn state(&self) -> RepState {
        self.state
    }

    pub fn reset(&mut self) {
        self.state = RepState::default();
    }

    /// 处理一帧；`None` 表示本帧没有关键点，状态保持不变
    pub fn update(&mut self, sample: Option<&FormSample>) -> RepUpdate {
        let Some(sample) = sample else {
            return RepUpdate {
                state: self.state,
                feedback: Feedback::StandInFrame,
                warnings: Vec::new(),
                rep_completed: false,
                back_ok: true,
            };
        };

        let was_down = self.state.stage == Stage::Down;
        // 躯干角无定义时不判定为弓背
        let back_ok = sample.trunk_angle.is_nan() || sample.trunk_angle <= BACK_ANGLE_LIMIT;

        // 形态告警基于本帧开始时的阶段
        let mut warnings = Vec::new();
        if was_down {
            if sample.trunk_angle > BACK_ANGLE_LIMIT {
                warnings.push(FormWarning::RoundedBack);
            }
            if sample.knee_deviation < -KNEE_DEVIATION_LIMIT {
                warnings.push(FormWarning::KneesCavingIn);
            }
        }

        let (feedback, rep_completed) = self.transition(sample.knee_angle);

        RepUpdate {
            state: self.state,
            feedback,
            warnings,
            rep_completed,
            back_ok,
        }
    }

    fn transition(&mut self, angle: f64) -> (Feedback, bool) {
        let CalibrationThresholds {
            up_angle,
            down_angle,
        } = self.thresholds;

        if self.state.stage == Stage::Down {
            self.state.min_angle_reached = self.state.min_angle_reached.min(angle);
        }

        if angle > up_angle {
            let mut rep_completed = false;
            let feedback = if self.state.stage == Stage::Down {
                let min_angle = self.state.min_angle_reached;
                self.state.min_angle_reached = MIN_ANGLE_SENTINEL;
                if min_angle <= down_angle {
                    self.state.counter += 1;
                    rep_completed = true;
                    tracing::debug!(counter = self.state.counter, min_angle, "Rep counted");
                    Feedback::RepCounted
                } else {
                    tracing::debug!(min_angle, down_angle, "Rep rejected, not deep enough");
                    Feedback::NotDeepEnough { min_angle }
                }
            } else {
                Feedback::GoDown
            };
            self.state.stage = Stage::Up;
            (feedback, rep_completed)
        } else if angle < down_angle {
            self.state.stage = Stage::Down;
            (Feedback::DepthReached, false)
        } else if self.state.stage == Stage::Down {
            (
                Feedback::GoLower {
                    target: down_angle,
                    current: angle,
                },
                false,
            )
        } else {
            (Feedback::GoDown, false)
        }
    }
}
