//! 选腿：比较左右腿 (hip, knee, ankle) 的平均可见度
//!
//! 默认每帧重新选择，平局取左腿。可选的粘滞策略只有在另一侧
//! 持续明显更清晰时才切换，避免边缘可见度下的来回跳变。

use crate::engine::config::LegSelectionConfig;
use crate::engine::types::{PoseLandmarks, Side};

fn mean(values: [f64; 3]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

/// 单帧选腿；没有关键点时默认左腿
pub fn select_leg(pose: Option<&PoseLandmarks>) -> Side {
    match pose.and_then(visibility_means) {
        Some((left, right)) if right > left => Side::Right,
        _ => Side::Left,
    }
}

fn visibility_means(pose: &PoseLandmarks) -> Option<(f64, f64)> {
    let left = pose.leg_visibility(Side::Left)?;
    let right = pose.leg_visibility(Side::Right)?;
    Some((mean(left), mean(right)))
}

#[derive(Debug, Clone)]
pub struct LegSelector {
    config: LegSelectionConfig,
    current: Option<Side>,
    challenger_frames: u32,
}

impl LegSelector {
    pub fn new(config: LegSelectionConfig) -> Self {
        Self {
            config,
            current: None,
            challenger_frames: 0,
        }
    }

    pub fn per_frame() -> Self {
        Self::new(LegSelectionConfig::default())
    }

    pub fn current(&self) -> Option<Side> {
        self.current
    }

    pub fn select(&mut self, pose: Option<&PoseLandmarks>) -> Side {
        if !self.config.sticky {
            let side = select_leg(pose);
            self.current = Some(side);
            return side;
        }

        let Some((left, right)) = pose.and_then(visibility_means) else {
            return self.current.unwrap_or(Side::Left);
        };

        let Some(current) = self.current else {
            let side = if right > left { Side::Right } else { Side::Left };
            self.current = Some(side);
            return side;
        };

        let (held, other) = match current {
            Side::Left => (left, right),
            Side::Right => (right, left),
        };

        if other - held > self.config.switch_margin {
            self.challenger_frames += 1;
            if self.challenger_frames >= self.config.persist_frames {
                let switched = current.opposite();
                tracing::debug!(
                    from = current.as_str(),
                    to = switched.as_str(),
                    held_visibility = held,
                    other_visibility = other,
                    "Switching tracked leg"
                );
                self.current = Some(switched);
                self.challenger_frames = 0;
                return switched;
            }
        } else {
            self.challenger_frames = 0;
        }
        current
    }

    pub fn reset(&mut self) {
        self.current = None;
        self.challenger_frames = 0;
    }
}
