//! Transform 组件
//!
//! 管理游戏对象的位置、旋转和缩放。

use super::Component;
use crate::core::math::{Matrix4, Vector3};

/// Transform 组件
///
/// 世界矩阵按 缩放 → 旋转 → 平移 的顺序作用于顶点。
pub struct Transform {
    /// 组件名称
    name: String,

    /// 位置
    pub position: Vector3,

    /// 欧拉角（度数，按 X/Y/Z 轴）
    pub euler_angle: Vector3,

    /// 缩放
    pub scale: Vector3,

    /// 世界矩阵缓存
    world_matrix: Matrix4,

    /// 世界矩阵是否需要更新
    world_dirty: bool,
}

impl Transform {
    /// 创建新的 Transform 组件
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            position: Vector3::zeros(),
            euler_angle: Vector3::zeros(),
            scale: Vector3::new(1.0, 1.0, 1.0),
            world_matrix: Matrix4::identity(),
            world_dirty: true,
        }
    }

    /// 创建带位置的 Transform
    pub fn with_position(name: impl Into<String>, position: Vector3) -> Self {
        let mut transform = Self::new(name);
        transform.position = position;
        transform
    }

    /// 设置位置
    pub fn set_position(&mut self, position: Vector3) {
        self.position = position;
        self.world_dirty = true;
    }

    /// 设置位置（分量形式）
    pub fn set_position_xyz(&mut self, x: f32, y: f32, z: f32) {
        self.set_position(Vector3::new(x, y, z));
    }

    /// 设置欧拉角（度数）
    pub fn set_euler_angle(&mut self, euler: Vector3) {
        self.euler_angle = euler;
        self.world_dirty = true;
    }

    /// 设置缩放
    pub fn set_scale(&mut self, scale: Vector3) {
        self.scale = scale;
        self.world_dirty = true;
    }

    /// 获取世界矩阵，需要时重新计算
    pub fn world_matrix(&mut self) -> Matrix4 {
        if self.world_dirty {
            self.update_world_matrix();
        }
        self.world_matrix
    }

    fn update_world_matrix(&mut self) {
        use crate::core::math::constants::DEG_TO_RAD;

        let pitch = self.euler_angle.x * DEG_TO_RAD;
        let yaw = self.euler_angle.y * DEG_TO_RAD;
        let roll = self.euler_angle.z * DEG_TO_RAD;

        let translation = Matrix4::new_translation(&self.position);

        let rotation_x = Matrix4::from_axis_angle(&Vector3::x_axis(), pitch);
        let rotation_y = Matrix4::from_axis_angle(&Vector3::y_axis(), yaw);
        let rotation_z = Matrix4::from_axis_angle(&Vector3::z_axis(), roll);
        let rotation = rotation_z * rotation_y * rotation_x;

        let scale = Matrix4::new_nonuniform_scaling(&self.scale);

        // 列主序下 T * R * S 等价于先缩放、再旋转、最后平移
        self.world_matrix = translation * rotation * scale;
        self.world_dirty = false;
    }
}

impl Component for Transform {
    fn name(&self) -> &str {
        &self.name
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::new("Transform")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::math::{utils, Vector4};

    #[test]
    fn test_scale_applies_before_translation() {
        let mut transform = Transform::new("box");
        transform.set_position_xyz(10.0, 0.0, 0.0);
        transform.set_scale(Vector3::new(2.0, 2.0, 2.0));

        // 点 (1,0,0)：先缩放到 (2,0,0)，再平移到 (12,0,0)
        let world = transform.world_matrix();
        let p = world * Vector4::new(1.0, 0.0, 0.0, 1.0);
        assert!(utils::approx_eq(p.x, 12.0, 1e-5));
    }

    #[test]
    fn test_rotation_applies_before_translation() {
        let mut transform = Transform::new("box");
        transform.set_position_xyz(0.0, 0.0, 5.0);
        transform.set_euler_angle(Vector3::new(0.0, 90.0, 0.0));

        // 点 (1,0,0) 绕 Y 轴转 90 度到 (0,0,-1)，再平移到 (0,0,4)
        let world = transform.world_matrix();
        let p = world * Vector4::new(1.0, 0.0, 0.0, 1.0);
        assert!(utils::approx_eq(p.x, 0.0, 1e-5));
        assert!(utils::approx_eq(p.z, 4.0, 1e-5));
    }

    #[test]
    fn test_world_matrix_recomputes_after_change() {
        let mut transform = Transform::new("box");
        let identity = transform.world_matrix();
        assert_eq!(identity, Matrix4::identity());

        transform.set_position_xyz(1.0, 2.0, 3.0);
        let moved = transform.world_matrix();
        assert!(utils::approx_eq(moved[(0, 3)], 1.0, 1e-6));
        assert!(utils::approx_eq(moved[(1, 3)], 2.0, 1e-6));
        assert!(utils::approx_eq(moved[(2, 3)], 3.0, 1e-6));
    }
}
