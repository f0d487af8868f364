//! 数学类型模块
//!
//! 提供渲染所需的数学类型和辅助函数，基于 `nalgebra`。
//!
//! # 约定
//!
//! - CPU 侧矩阵统一使用 nalgebra 的列主序 `Matrix4`
//! - HLSL 常量缓冲区默认按列主序解释 `float4x4`，而我们的
//!   着色器按行主序访问，因此上传前由调用方显式调用
//!   [`to_shader_matrix`] 做一次转置
//! - 材质常量缓冲区只存储字节，不做任何隐式转换

#![allow(dead_code)]

pub use nalgebra::{
    Matrix3 as Mat3, Matrix4 as Mat4, Point3, UnitQuaternion,
    Vector2 as Vec2, Vector3 as Vec3, Vector4 as Vec4,
};

// 类型别名，使用更简洁的名称
pub type Vector2 = Vec2<f32>;
pub type Vector3 = Vec3<f32>;
pub type Vector4 = Vec4<f32>;
pub type Matrix3 = Mat3<f32>;
pub type Matrix4 = Mat4<f32>;
pub type Quaternion = UnitQuaternion<f32>;

/// 把 CPU 侧矩阵转换为着色器期望的内存布局
///
/// 返回转置后的矩阵。调用方在写入常量缓冲区之前调用一次，
/// 材质本身不会再做任何转置。
pub fn to_shader_matrix(m: &Matrix4) -> Matrix4 {
    m.transpose()
}

/// 把矩阵按内存顺序展开为字节
///
/// 用于写入常量缓冲区的 `float4x4` 属性。
pub fn matrix_to_bytes(m: &Matrix4) -> [u8; 64] {
    let mut bytes = [0u8; 64];
    for (i, v) in m.as_slice().iter().enumerate() {
        bytes[i * 4..i * 4 + 4].copy_from_slice(&v.to_le_bytes());
    }
    bytes
}

/// 从字节还原矩阵（内存顺序与 [`matrix_to_bytes`] 一致）
pub fn matrix_from_bytes(bytes: &[u8; 64]) -> Matrix4 {
    let mut values = [0f32; 16];
    for (i, v) in values.iter_mut().enumerate() {
        let mut b = [0u8; 4];
        b.copy_from_slice(&bytes[i * 4..i * 4 + 4]);
        *v = f32::from_le_bytes(b);
    }
    Matrix4::from_column_slice(&values)
}

/// 颜色类型（RGBA，范围 0.0-1.0）
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Color {
    /// 创建新的颜色
    pub fn new(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    /// 创建 RGB 颜色（alpha = 1.0）
    pub fn rgb(r: f32, g: f32, b: f32) -> Self {
        Self::new(r, g, b, 1.0)
    }

    /// 转换为数组（用于清屏颜色等 API 参数）
    pub fn to_array(&self) -> [f32; 4] {
        [self.r, self.g, self.b, self.a]
    }

    // 预定义颜色
    pub const WHITE: Color = Color { r: 1.0, g: 1.0, b: 1.0, a: 1.0 };
    pub const BLACK: Color = Color { r: 0.0, g: 0.0, b: 0.0, a: 1.0 };
    pub const LIGHT_STEEL_BLUE: Color = Color { r: 0.69, g: 0.77, b: 0.87, a: 1.0 };
}

/// 数学常量
pub mod constants {
    /// π
    pub const PI: f32 = std::f32::consts::PI;

    /// π/2
    pub const HALF_PI: f32 = std::f32::consts::FRAC_PI_2;

    /// π/4
    pub const QUARTER_PI: f32 = std::f32::consts::FRAC_PI_4;

    /// 角度转弧度的系数
    pub const DEG_TO_RAD: f32 = PI / 180.0;

    /// 弧度转角度的系数
    pub const RAD_TO_DEG: f32 = 180.0 / PI;

    /// 浮点数比较的 epsilon
    pub const EPSILON: f32 = 1e-6;
}

/// 数学工具函数
pub mod utils {
    use super::constants;

    /// 限制值在范围内
    pub fn clamp<T: PartialOrd>(value: T, min: T, max: T) -> T {
        if value < min {
            min
        } else if value > max {
            max
        } else {
            value
        }
    }

    /// 角度转弧度
    pub fn deg_to_rad(degrees: f32) -> f32 {
        degrees * constants::DEG_TO_RAD
    }

    /// 弧度转角度
    pub fn rad_to_deg(radians: f32) -> f32 {
        radians * constants::RAD_TO_DEG
    }

    /// 检查两个浮点数是否近似相等
    pub fn approx_eq(a: f32, b: f32, epsilon: f32) -> bool {
        (a - b).abs() < epsilon
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_shader_matrix_transposes() {
        #[rustfmt::skip]
        let m = Matrix4::new(
            1.0, 2.0, 3.0, 4.0,
            5.0, 6.0, 7.0, 8.0,
            9.0, 10.0, 11.0, 12.0,
            13.0, 14.0, 15.0, 16.0,
        );
        let t = to_shader_matrix(&m);
        assert_eq!(t[(0, 1)], m[(1, 0)]);
        assert_eq!(t[(3, 0)], m[(0, 3)]);
        // 二次转置还原
        assert_eq!(to_shader_matrix(&t), m);
    }

    #[test]
    fn test_matrix_byte_round_trip() {
        let m = Matrix4::new_translation(&Vector3::new(1.0, 2.0, 3.0));
        let bytes = matrix_to_bytes(&m);
        let restored = matrix_from_bytes(&bytes);
        assert_eq!(m, restored);
    }

    #[test]
    fn test_deg_rad_conversion() {
        assert!(utils::approx_eq(
            utils::deg_to_rad(180.0),
            constants::PI,
            constants::EPSILON
        ));
    }
}
