use serde_json::Value;

use squat_coach::engine::types::{
    Landmark, PoseFrame, PoseLandmarks, LEFT_ANKLE, LEFT_HIP, LEFT_KNEE, LEFT_SHOULDER,
    POSE_LANDMARK_COUNT, RIGHT_HIP,
};

pub const FRAME_MS: u64 = 33;

/// 左腿膝角为 `angle` 的侧面姿态：小腿竖直，大腿绕膝旋转，躯干竖直
pub fn pose_at(angle: f64) -> PoseLandmarks {
    pose_with(angle, 0.0, 0.0)
}

/// `lean` 为躯干前倾角（度），`right_hip_z` 控制双髋深度差
pub fn pose_with(angle: f64, lean: f64, right_hip_z: f64) -> PoseLandmarks {
    let mut points = vec![Landmark::new(0.5, 0.5, 0.0, 0.3); POSE_LANDMARK_COUNT];
    let rad = angle.to_radians();
    let hip = (0.5 - 0.2 * rad.sin(), 0.6 + 0.2 * rad.cos());
    let lean = lean.to_radians();
    points[LEFT_KNEE] = Landmark::new(0.5, 0.6, 0.0, 0.9);
    points[LEFT_ANKLE] = Landmark::new(0.5, 0.8, 0.0, 0.9);
    points[LEFT_HIP] = Landmark::new(hip.0, hip.1, 0.0, 0.9);
    points[LEFT_SHOULDER] = Landmark::new(hip.0 + 0.3 * lean.sin(), hip.1 - 0.3 * lean.cos(), 0.0, 0.9);
    points[RIGHT_HIP] = Landmark::new(hip.0, hip.1, right_hip_z, 0.3);
    PoseLandmarks::new(points)
}

/// 连续帧，时间戳从 `start_ms` 开始按 33ms 递增
pub fn frames_for(angles: &[f64], start_ms: u64) -> Vec<PoseFrame> {
    angles
        .iter()
        .enumerate()
        .map(|(i, angle)| PoseFrame::detected(start_ms + i as u64 * FRAME_MS, pose_at(*angle)))
        .collect()
}

/// 一次完整深蹲：站立 → 下蹲到 `bottom` → 站起
pub fn squat_cycle(bottom: f64) -> Vec<f64> {
    let mut angles = vec![170.0, 170.0, 150.0, 130.0, 110.0, 95.0];
    angles.push(bottom);
    angles.push(bottom);
    angles.extend([95.0, 110.0, 130.0, 150.0, 170.0, 170.0]);
    angles
}

pub fn frames_json(frames: &[PoseFrame]) -> Value {
    serde_json::json!({ "frames": frames })
}

pub fn counting_session_body() -> Value {
    serde_json::json!({ "thresholds": { "upAngle": 150.0, "downAngle": 100.0 } })
}
