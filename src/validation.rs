/// 请求输入验证
/// 帧数据在进入会话 worker 之前完成校验，worker 内部只处理合法帧。
use crate::constants::MAX_FRAMES_PER_REQUEST;
use crate::engine::calibration::CalibrationThresholds;
use crate::engine::config::CalibrationTimings;
use crate::engine::types::{PoseFrame, POSE_LANDMARK_COUNT};

/// 单帧：姿态存在时必须是完整的 33 点，坐标有限，可见度在 [0,1]
pub fn validate_frame(frame: &PoseFrame) -> Result<(), String> {
    let Some(pose) = &frame.pose else {
        return Ok(());
    };
    if pose.len() != POSE_LANDMARK_COUNT {
        return Err(format!(
            "pose must contain {} landmarks, got {}",
            POSE_LANDMARK_COUNT,
            pose.len()
        ));
    }
    for (idx, landmark) in pose.0.iter().enumerate() {
        if !landmark.position().is_finite() {
            return Err(format!("landmark {idx} has non-finite coordinates"));
        }
        if !(0.0..=1.0).contains(&landmark.visibility) {
            return Err(format!(
                "landmark {idx} visibility must be within [0, 1], got {}",
                landmark.visibility
            ));
        }
    }
    Ok(())
}

/// 一批帧：非空、数量有上限、时间戳不回退
pub fn validate_frames(frames: &[PoseFrame]) -> Result<(), String> {
    if frames.is_empty() {
        return Err("frames must not be empty".to_string());
    }
    if frames.len() > MAX_FRAMES_PER_REQUEST {
        return Err(format!(
            "at most {MAX_FRAMES_PER_REQUEST} frames per request, got {}",
            frames.len()
        ));
    }
    for (idx, frame) in frames.iter().enumerate() {
        validate_frame(frame).map_err(|e| format!("frame {idx}: {e}"))?;
    }
    if frames
        .windows(2)
        .any(|pair| pair[1].timestamp_ms < pair[0].timestamp_ms)
    {
        return Err("frame timestamps must be non-decreasing".to_string());
    }
    Ok(())
}

pub fn validate_thresholds(thresholds: &CalibrationThresholds) -> Result<(), &'static str> {
    let CalibrationThresholds {
        up_angle,
        down_angle,
    } = *thresholds;
    if !up_angle.is_finite() || !down_angle.is_finite() {
        return Err("thresholds must be finite");
    }
    if down_angle <= 0.0 || up_angle > 180.0 {
        return Err("thresholds must lie within (0, 180]");
    }
    if down_angle >= up_angle {
        return Err("downAngle must be lower than upAngle");
    }
    Ok(())
}

pub fn validate_timings(timings: &CalibrationTimings) -> Result<(), &'static str> {
    if timings.sampling_ms == 0 {
        return Err("calibration samplingMs must be positive");
    }
    Ok(())
}
