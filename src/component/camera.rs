//! Camera 组件
//!
//! 管理相机的视锥体、视图矩阵和投影矩阵。
//!
//! # 脏标记契约
//!
//! 任何改变位置或朝向的操作都会置脏标记。读取
//! [`Camera::view_matrix`] / [`Camera::proj_matrix`] 之前必须调用
//! [`Camera::update_view_matrix`] 清除脏标记，带着脏标记读取矩阵
//! 是致命断言：这表示调用方在用过期的相机数据渲染。

use super::{Component, Transform};
use crate::core::math::{Matrix4, Vector3};
use std::f32::consts::PI;

/// Camera 组件
pub struct Camera {
    /// Transform 组件（持有位置）
    transform: Transform,

    /// 相机坐标系：右向量
    right: Vector3,

    /// 相机坐标系：上向量
    up: Vector3,

    /// 相机坐标系：前向量
    look: Vector3,

    /// 近裁剪面距离
    near_z: f32,

    /// 远裁剪面距离
    far_z: f32,

    /// 宽高比
    aspect: f32,

    /// 垂直视场角（弧度）
    fov_y: f32,

    /// 近平面高度
    near_window_height: f32,

    /// 远平面高度
    far_window_height: f32,

    /// 视图矩阵
    view_matrix: Matrix4,

    /// 投影矩阵
    proj_matrix: Matrix4,

    /// 视图矩阵是否需要更新
    view_dirty: bool,
}

impl Camera {
    /// 创建新的 Camera
    pub fn new(name: impl Into<String>) -> Self {
        let mut camera = Self {
            transform: Transform::new(name),
            right: Vector3::new(1.0, 0.0, 0.0),
            up: Vector3::new(0.0, 1.0, 0.0),
            look: Vector3::new(0.0, 0.0, 1.0),
            near_z: 0.0,
            far_z: 0.0,
            aspect: 0.0,
            fov_y: 0.0,
            near_window_height: 0.0,
            far_window_height: 0.0,
            view_matrix: Matrix4::identity(),
            proj_matrix: Matrix4::identity(),
            view_dirty: true,
        };

        // 默认透视投影：FOV=45 度，aspect=1.0，near=1.0，far=1000.0
        camera.set_lens(0.25 * PI, 1.0, 1.0, 1000.0);
        camera
    }

    /// 创建主相机
    pub fn main_camera() -> Self {
        Self::new("MainCamera")
    }

    // ========== 位置相关 ==========

    /// 获取相机位置
    pub fn position(&self) -> Vector3 {
        self.transform.position
    }

    /// 设置相机位置
    pub fn set_position(&mut self, position: Vector3) {
        self.transform.set_position(position);
        self.view_dirty = true;
    }

    /// 设置相机位置（分量形式）
    pub fn set_position_xyz(&mut self, x: f32, y: f32, z: f32) {
        self.set_position(Vector3::new(x, y, z));
    }

    // ========== 视锥体属性 ==========

    /// 近裁剪面距离
    pub fn near_z(&self) -> f32 {
        self.near_z
    }

    /// 远裁剪面距离
    pub fn far_z(&self) -> f32 {
        self.far_z
    }

    /// 宽高比
    pub fn aspect(&self) -> f32 {
        self.aspect
    }

    /// 垂直 FOV（弧度）
    pub fn fov_y(&self) -> f32 {
        self.fov_y
    }

    /// 水平 FOV（弧度）
    pub fn fov_x(&self) -> f32 {
        let half_width = 0.5 * self.near_window_width();
        2.0 * (half_width / self.near_z).atan()
    }

    /// 近平面宽度
    pub fn near_window_width(&self) -> f32 {
        self.aspect * self.near_window_height
    }

    /// 近平面高度
    pub fn near_window_height(&self) -> f32 {
        self.near_window_height
    }

    /// 远平面宽度
    pub fn far_window_width(&self) -> f32 {
        self.aspect * self.far_window_height
    }

    /// 远平面高度
    pub fn far_window_height(&self) -> f32 {
        self.far_window_height
    }

    // ========== 透视投影 ==========

    /// 设置透视投影参数
    pub fn set_lens(&mut self, fov_y: f32, aspect: f32, near_z: f32, far_z: f32) {
        self.fov_y = fov_y;
        self.aspect = aspect;
        self.near_z = near_z;
        self.far_z = far_z;

        self.near_window_height = 2.0 * self.near_z * (0.5 * self.fov_y).tan();
        self.far_window_height = 2.0 * self.far_z * (0.5 * self.fov_y).tan();

        self.proj_matrix = Matrix4::new_perspective(aspect, fov_y, near_z, far_z);
    }

    /// 设置宽高比（窗口尺寸变化时调用）
    pub fn set_aspect(&mut self, aspect: f32) {
        if (self.aspect - aspect).abs() > f32::EPSILON {
            self.set_lens(self.fov_y, aspect, self.near_z, self.far_z);
        }
    }

    // ========== LookAt ==========

    /// 设置相机朝向目标点
    pub fn look_at(&mut self, position: Vector3, target: Vector3, world_up: Vector3) {
        let look = (target - position).normalize();
        let right = world_up.cross(&look).normalize();
        let up = look.cross(&right);

        self.transform.set_position(position);
        self.look = look;
        self.right = right;
        self.up = up;

        self.view_dirty = true;
    }

    // ========== 矩阵读取 ==========

    /// 视图矩阵
    ///
    /// 脏标记必须已被 [`Camera::update_view_matrix`] 清除。
    pub fn view_matrix(&self) -> Matrix4 {
        assert!(
            !self.view_dirty,
            "camera view matrix read while dirty; call update_view_matrix first"
        );
        self.view_matrix
    }

    /// 投影矩阵
    ///
    /// 与视图矩阵使用同一个脏标记契约。
    pub fn proj_matrix(&self) -> Matrix4 {
        assert!(
            !self.view_dirty,
            "camera proj matrix read while dirty; call update_view_matrix first"
        );
        self.proj_matrix
    }

    // ========== 相机移动 ==========

    /// 左右平移
    pub fn strafe(&mut self, distance: f32) {
        let offset = self.right * distance;
        self.transform.set_position(self.transform.position + offset);
        self.view_dirty = true;
    }

    /// 前后移动
    pub fn walk(&mut self, distance: f32) {
        let offset = self.look * distance;
        self.transform.set_position(self.transform.position + offset);
        self.view_dirty = true;
    }

    // ========== 相机旋转 ==========

    /// 俯仰旋转（绕右向量）
    pub fn pitch(&mut self, angle: f32) {
        use nalgebra::Unit;
        let axis = Unit::new_normalize(self.right);
        let rotation = Matrix4::from_axis_angle(&axis, angle);

        self.up = rotation.transform_vector(&self.up).normalize();
        self.look = rotation.transform_vector(&self.look).normalize();

        self.view_dirty = true;
    }

    /// 绕世界 Y 轴旋转
    pub fn rotate_y(&mut self, angle: f32) {
        let rotation = Matrix4::from_axis_angle(&Vector3::y_axis(), angle);

        self.right = rotation.transform_vector(&self.right).normalize();
        self.up = rotation.transform_vector(&self.up).normalize();
        self.look = rotation.transform_vector(&self.look).normalize();

        self.view_dirty = true;
    }

    // ========== 更新 ==========

    /// 重建视图矩阵并清除脏标记
    ///
    /// 位置或朝向变化后、读取矩阵前必须调用。
    pub fn update_view_matrix(&mut self) {
        if !self.view_dirty {
            return;
        }

        // 保持相机坐标轴正交归一化
        let look = self.look.normalize();
        let up = look.cross(&self.right).normalize();
        let right = up.cross(&look);

        let position = self.transform.position;
        let x = -position.dot(&right);
        let y = -position.dot(&up);
        let z = -position.dot(&look);

        self.right = right;
        self.up = up;
        self.look = look;

        #[rustfmt::skip]
        let view = Matrix4::new(
            right.x, right.y, right.z, x,
            up.x,    up.y,    up.z,    y,
            look.x,  look.y,  look.z,  z,
            0.0,     0.0,     0.0,     1.0,
        );

        self.view_matrix = view;
        self.view_dirty = false;
    }
}

impl Component for Camera {
    fn name(&self) -> &str {
        self.transform.name()
    }

    fn tick(&mut self, _delta_time: f32) {
        self.update_view_matrix();
    }
}

impl Default for Camera {
    fn default() -> Self {
        Self::main_camera()
    }
}
