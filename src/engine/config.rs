use serde::{Deserialize, Serialize};

use crate::constants::{CALIBRATION_INSTRUCTION_MS, CALIBRATION_SAMPLING_MS};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegSelectionConfig {
    /// false 时每帧独立选腿（默认行为）
    pub sticky: bool,
    /// 另一侧平均可见度需要超出当前侧的幅度
    pub switch_margin: f64,
    /// 超出幅度需要连续保持的帧数
    pub persist_frames: u32,
}

impl Default for LegSelectionConfig {
    fn default() -> Self {
        Self {
            sticky: false,
            switch_margin: 0.10,
            persist_frames: 5,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalibrationTimings {
    pub instruction_ms: u64,
    pub sampling_ms: u64,
}

impl Default for CalibrationTimings {
    fn default() -> Self {
        Self {
            instruction_ms: CALIBRATION_INSTRUCTION_MS,
            sampling_ms: CALIBRATION_SAMPLING_MS,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineConfig {
    #[serde(default)]
    pub leg_selection: LegSelectionConfig,
    #[serde(default)]
    pub calibration: CalibrationTimings,
}

impl EngineConfig {
    pub fn from_env(env_config: &crate::config::EngineEnvConfig) -> Self {
        Self {
            leg_selection: LegSelectionConfig {
                sticky: env_config.leg_selection_sticky,
                switch_margin: env_config.leg_switch_margin,
                persist_frames: env_config.leg_switch_persist_frames,
            },
            calibration: CalibrationTimings::default(),
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        let leg = &self.leg_selection;
        if !leg.switch_margin.is_finite() || !(0.0..=1.0).contains(&leg.switch_margin) {
            return Err(format!(
                "legSelection.switchMargin must be within [0, 1], got {}",
                leg.switch_margin
            ));
        }
        if leg.persist_frames == 0 {
            return Err("legSelection.persistFrames must be at least 1".to_string());
        }
        if self.calibration.sampling_ms == 0 {
            return Err("calibration.samplingMs must be positive".to_string());
        }
        Ok(())
    }
}
