use serde::{Deserialize, Serialize};

/// BlazePose 拓扑的关键点总数
pub const POSE_LANDMARK_COUNT: usize = 33;

pub const LEFT_SHOULDER: usize = 11;
pub const RIGHT_SHOULDER: usize = 12;
pub const LEFT_HIP: usize = 23;
pub const RIGHT_HIP: usize = 24;
pub const LEFT_KNEE: usize = 25;
pub const RIGHT_KNEE: usize = 26;
pub const LEFT_ANKLE: usize = 27;
pub const RIGHT_ANKLE: usize = 28;

/// 归一化模型空间中的三维关节点
///
/// x/y 约在 [0,1] 内（相对画面），y 向下增长；z 为相对深度，越小越靠近相机。
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Joint3D {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Joint3D {
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn sub(&self, other: &Joint3D) -> Joint3D {
        Joint3D::new(self.x - other.x, self.y - other.y, self.z - other.z)
    }

    pub fn dot(&self, other: &Joint3D) -> f64 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    pub fn scale(&self, k: f64) -> Joint3D {
        Joint3D::new(self.x * k, self.y * k, self.z * k)
    }

    pub fn norm(&self) -> f64 {
        self.dot(self).sqrt()
    }

    /// 投影到像素坐标，仅供渲染方使用
    pub fn to_pixels(&self, width: u32, height: u32) -> Joint2D {
        Joint2D {
            x: (self.x * width as f64) as i32,
            y: (self.y * height as f64) as i32,
        }
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }
}

/// 像素空间中的二维点
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Joint2D {
    pub x: i32,
    pub y: i32,
}

impl Joint2D {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// 能提供平面坐标的点
pub trait Planar {
    fn xy(&self) -> (f64, f64);
}

impl Planar for Joint2D {
    fn xy(&self) -> (f64, f64) {
        (self.x as f64, self.y as f64)
    }
}

impl Planar for Joint3D {
    fn xy(&self) -> (f64, f64) {
        (self.x, self.y)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Side {
    Left,
    Right,
}

impl Side {
    pub fn opposite(self) -> Side {
        match self {
            Side::Left => Side::Right,
            Side::Right => Side::Left,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Side::Left => "left",
            Side::Right => "right",
        }
    }
}

/// 姿态模型输出的单个关键点
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Landmark {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    /// 可见度 (0.0 - 1.0)
    #[serde(default)]
    pub visibility: f64,
}

impl Landmark {
    pub const fn new(x: f64, y: f64, z: f64, visibility: f64) -> Self {
        Self { x, y, z, visibility }
    }

    pub fn position(&self) -> Joint3D {
        Joint3D::new(self.x, self.y, self.z)
    }
}

/// 一帧中检测到的完整姿态（33 点）
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PoseLandmarks(pub Vec<Landmark>);

impl PoseLandmarks {
    pub fn new(landmarks: Vec<Landmark>) -> Self {
        Self(landmarks)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn is_complete(&self) -> bool {
        self.0.len() >= POSE_LANDMARK_COUNT
    }

    pub fn get(&self, index: usize) -> Option<&Landmark> {
        self.0.get(index)
    }

    /// 某一侧腿部 (hip, knee, ankle) 的可见度
    pub fn leg_visibility(&self, side: Side) -> Option<[f64; 3]> {
        let (hip, knee, ankle) = leg_indices(side);
        Some([
            self.get(hip)?.visibility,
            self.get(knee)?.visibility,
            self.get(ankle)?.visibility,
        ])
    }
}

pub(crate) fn leg_indices(side: Side) -> (usize, usize, usize) {
    match side {
        Side::Left => (LEFT_HIP, LEFT_KNEE, LEFT_ANKLE),
        Side::Right => (RIGHT_HIP, RIGHT_KNEE, RIGHT_ANKLE),
    }
}

fn shoulder_index(side: Side) -> usize {
    match side {
        Side::Left => LEFT_SHOULDER,
        Side::Right => RIGHT_SHOULDER,
    }
}

/// 输入单元：一帧的时间戳和检测结果，`pose = None` 表示本帧未检测到人
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PoseFrame {
    pub timestamp_ms: u64,
    #[serde(default)]
    pub pose: Option<PoseLandmarks>,
}

impl PoseFrame {
    pub fn detected(timestamp_ms: u64, pose: PoseLandmarks) -> Self {
        Self {
            timestamp_ms,
            pose: Some(pose),
        }
    }

    pub fn missing(timestamp_ms: u64) -> Self {
        Self {
            timestamp_ms,
            pose: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JointVisibility {
    pub shoulder: f64,
    pub hip: f64,
    pub knee: f64,
    pub ankle: f64,
}

/// 单侧身体的定长关节记录
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LandmarkFrame {
    pub side: Side,
    pub shoulder: Joint3D,
    pub hip: Joint3D,
    pub knee: Joint3D,
    pub ankle: Joint3D,
    /// 双侧髋部深度，用于相机角度估计
    pub left_hip_z: f64,
    pub right_hip_z: f64,
    pub visibility: JointVisibility,
}

impl LandmarkFrame {
    /// 从完整姿态中取出指定一侧的关节；关键点不足 33 个时返回 None
    pub fn from_pose(pose: &PoseLandmarks, side: Side) -> Option<Self> {
        if !pose.is_complete() {
            return None;
        }
        let (hip_idx, knee_idx, ankle_idx) = leg_indices(side);
        let shoulder = pose.get(shoulder_index(side))?;
        let hip = pose.get(hip_idx)?;
        let knee = pose.get(knee_idx)?;
        let ankle = pose.get(ankle_idx)?;

        Some(Self {
            side,
            shoulder: shoulder.position(),
            hip: hip.position(),
            knee: knee.position(),
            ankle: ankle.position(),
            left_hip_z: pose.get(LEFT_HIP)?.z,
            right_hip_z: pose.get(RIGHT_HIP)?.z,
            visibility: JointVisibility {
                shoulder: shoulder.visibility,
                hip: hip.visibility,
                knee: knee.visibility,
                ankle: ankle.visibility,
            },
        })
    }
}
