/// 躯干前倾超过此角度（度）视为弓背
pub const BACK_ANGLE_LIMIT: f64 = 35.0;

/// 膝关节横向偏移低于 -此值 视为膝内扣
pub const KNEE_DEVIATION_LIMIT: f64 = 0.15;

/// 髋部深度差超过此值（归一化深度单位）判定为斜向机位
pub const DIAGONAL_Z_DIFF: f64 = 0.1;

/// 斜向机位告警持续的帧数
pub const CAMERA_WARNING_FRAMES: u32 = 90;

/// "完全伸直、未观测到屈曲" 的哨兵角度
pub const MIN_ANGLE_SENTINEL: f64 = 180.0;

/// 每个校准阶段的指令展示时长（毫秒）
pub const CALIBRATION_INSTRUCTION_MS: u64 = 3_000;

/// 每个校准阶段的采样时长（毫秒）
pub const CALIBRATION_SAMPLING_MS: u64 = 2_000;

/// 站立阶段无有效样本时的默认角度
pub const DEFAULT_STANDING_ANGLE: f64 = 160.0;

/// 下蹲阶段无有效样本时的默认角度
pub const DEFAULT_SQUAT_ANGLE: f64 = 70.0;

pub const UP_THRESHOLD_FACTOR: f64 = 0.85;
pub const DOWN_THRESHOLD_FACTOR: f64 = 1.25;

/// 偏移向量长度低于此值时视为退化
pub const GEOMETRY_EPSILON: f64 = 1e-6;

/// 默认最大并发会话数
pub const DEFAULT_MAX_SESSIONS: usize = 16;

/// 默认 SSE 连接上限
pub const DEFAULT_MAX_SSE_CONNECTIONS: usize = 64;

/// 每个会话的待处理帧队列长度
pub const DEFAULT_FRAME_QUEUE_CAPACITY: usize = 64;

/// 会话无任何请求超过此秒数即被回收
pub const SESSION_IDLE_TIMEOUT_SECS: u64 = 300;

/// 空闲会话清理的执行间隔（秒）
pub const SESSION_SWEEP_INTERVAL_SECS: u64 = 30;

/// 单次请求最多提交的帧数
pub const MAX_FRAMES_PER_REQUEST: usize = 256;

/// 请求体上限：2 MiB
pub const MAX_BODY_SIZE: usize = 2 * 1024 * 1024;
