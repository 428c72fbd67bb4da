//! 关节几何计算
//!
//! 全部为纯函数：三点夹角（2D/3D）、躯干前倾角、膝关节横向偏移。
//! 角度结果保留 2 位小数，偏移量保留 4 位小数。

use crate::constants::GEOMETRY_EPSILON;
use crate::engine::types::{Joint3D, Planar};

/// 图像坐标系中的 "向上" 单位向量（y 向下增长）
const UP: Joint3D = Joint3D::new(0.0, -1.0, 0.0);

pub(crate) fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10_f64.powi(decimals);
    (value * factor).round() / factor
}

/// 平面夹角：b 为顶点，射线 b→a 与 b→c，结果折叠到 [0, 180]
pub fn angle_2d<P: Planar>(a: &P, b: &P, c: &P) -> f64 {
    let (ax, ay) = a.xy();
    let (bx, by) = b.xy();
    let (cx, cy) = c.xy();

    let radians = (cy - by).atan2(cx - bx) - (ay - by).atan2(ax - bx);
    let mut angle = radians.to_degrees().abs();
    if angle > 180.0 {
        angle = 360.0 - angle;
    }
    round_to(angle, 2)
}

/// 空间夹角：向量 (a-b) 与 (c-b) 的点积反余弦
///
/// 任一向量长度为 0 时角度无定义，返回 NaN。
pub fn angle_3d(a: &Joint3D, b: &Joint3D, c: &Joint3D) -> f64 {
    angle_between(&a.sub(b), &c.sub(b))
}

/// 躯干相对竖直方向的前倾角，0 表示完全竖直
pub fn trunk_lean_angle(shoulder: &Joint3D, hip: &Joint3D) -> f64 {
    angle_between(&shoulder.sub(hip), &UP)
}

fn angle_between(v1: &Joint3D, v2: &Joint3D) -> f64 {
    let denom = v1.norm() * v2.norm();
    if denom < GEOMETRY_EPSILON * GEOMETRY_EPSILON {
        return f64::NAN;
    }
    // 浮点误差可能让余弦略微越界
    let cos = (v1.dot(v2) / denom).clamp(-1.0, 1.0);
    round_to(cos.acos().to_degrees(), 2)
}

/// 膝关节相对 踝→髋 轴线的横向偏移
///
/// 将膝盖投影到轴线上，取残差向量的长度，并以残差的 x 分量定号：
/// 负值表示朝 -x 方向偏移（对建模的腿即 "内扣"）。
pub fn lateral_knee_deviation(knee: &Joint3D, ankle: &Joint3D, hip: &Joint3D) -> f64 {
    let axis = hip.sub(ankle);
    let axis_len = axis.norm();
    if axis_len < GEOMETRY_EPSILON {
        return 0.0;
    }

    let unit = axis.scale(1.0 / axis_len);
    let knee_vec = knee.sub(ankle);
    let projection = unit.scale(knee_vec.dot(&unit));
    let residual = knee_vec.sub(&projection);

    let sign = if residual.x >= 0.0 { 1.0 } else { -1.0 };
    round_to(sign * residual.norm(), 4)
}
