//! 相机机位估计
//!
//! 通过左右髋部的深度差判断相机是正侧面还是斜向。斜向机位下仅依赖
//! 平面几何的判断不可靠，需要提示用户调整。

use serde::Serialize;

use crate::constants::{CAMERA_WARNING_FRAMES, DIAGONAL_Z_DIFF};
use crate::engine::geometry::round_to;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum CameraPosition {
    Side,
    Diagonal,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CameraAlignment {
    pub position: CameraPosition,
    /// 经验缩放后的偏离角（度），并非真实投影角
    pub deviation_degrees: f64,
}

impl CameraAlignment {
    pub fn estimate(left_hip_z: f64, right_hip_z: f64) -> Self {
        let z_diff = (left_hip_z - right_hip_z).abs();
        let deviation_degrees = round_to(z_diff.atan().to_degrees() * 2.0, 1);
        let position = if z_diff > DIAGONAL_Z_DIFF {
            CameraPosition::Diagonal
        } else {
            CameraPosition::Side
        };
        Self {
            position,
            deviation_degrees,
        }
    }

    pub fn is_diagonal(&self) -> bool {
        self.position == CameraPosition::Diagonal
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CameraWarning {
    pub deviation_degrees: f64,
    pub remaining_frames: u32,
}

/// 斜向机位告警倒计时，按帧递减
#[derive(Debug, Clone, Default)]
pub struct CameraWarningTimer {
    remaining: u32,
    last_deviation: f64,
}

impl CameraWarningTimer {
    pub fn new() -> Self {
        Self::default()
    }

    /// 斜向机位会重新开始倒计时
    pub fn observe(&mut self, alignment: &CameraAlignment) {
        if alignment.is_diagonal() {
            self.remaining = CAMERA_WARNING_FRAMES;
            self.last_deviation = alignment.deviation_degrees;
        }
    }

    /// 每个处理过的帧调用一次，无论是否检测到人
    pub fn tick(&mut self) -> Option<CameraWarning> {
        if self.remaining == 0 {
            return None;
        }
        let warning = CameraWarning {
            deviation_degrees: self.last_deviation,
            remaining_frames: self.remaining,
        };
        self.remaining -= 1;
        Some(warning)
    }

    pub fn reset(&mut self) {
        self.remaining = 0;
        self.last_deviation = 0.0;
    }
}
