//! GameObject 组件容器
//!
//! 游戏对象本身不包含渲染逻辑，只负责持有组件并在每帧
//! 驱动它们更新。世界矩阵由附加的 [`Transform`] 组件提供。

use super::{Camera, Component, Transform};
use crate::core::math::Matrix4;
use std::any::{Any, TypeId};

/// 组件存储包装器
///
/// 通过 `Box<dyn Any>` 做类型擦除，按 `TypeId` 查询
struct ComponentBox {
    component: Box<dyn Any>,
    type_id: TypeId,
}

/// GameObject - 游戏对象
///
/// 组件容器，可以添加、移除和查询组件
pub struct GameObject {
    /// 游戏对象名称
    name: String,

    /// 是否启用
    pub enabled: bool,

    /// 附加的组件列表
    components: Vec<ComponentBox>,
}

impl GameObject {
    /// 创建新的 GameObject
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            enabled: true,
            components: Vec::new(),
        }
    }

    /// 获取名称
    pub fn get_name(&self) -> &str {
        &self.name
    }

    // ========== 组件管理 ==========

    /// 添加组件
    pub fn add_component<T: 'static>(&mut self, component: T) {
        self.components.push(ComponentBox {
            component: Box::new(component),
            type_id: TypeId::of::<T>(),
        });
    }

    /// 移除第一个指定类型的组件
    ///
    /// # 返回
    /// 如果找到并移除了组件，返回 `true`
    pub fn remove_component<T: 'static>(&mut self) -> bool {
        let type_id = TypeId::of::<T>();

        if let Some(index) = self.components.iter().position(|c| c.type_id == type_id) {
            self.components.remove(index);
            true
        } else {
            false
        }
    }

    /// 获取组件的不可变引用
    pub fn get_component<T: 'static>(&self) -> Option<&T> {
        let type_id = TypeId::of::<T>();

        self.components
            .iter()
            .find(|c| c.type_id == type_id)
            .and_then(|c| c.component.downcast_ref::<T>())
    }

    /// 获取组件的可变引用
    pub fn get_component_mut<T: 'static>(&mut self) -> Option<&mut T> {
        let type_id = TypeId::of::<T>();

        self.components
            .iter_mut()
            .find(|c| c.type_id == type_id)
            .and_then(|c| c.component.downcast_mut::<T>())
    }

    /// 获取所有指定类型的组件的可变引用
    pub fn get_components_mut<T: 'static>(&mut self) -> Vec<&mut T> {
        let type_id = TypeId::of::<T>();

        self.components
            .iter_mut()
            .filter(|c| c.type_id == type_id)
            .filter_map(|c| c.component.downcast_mut::<T>())
            .collect()
    }

    /// 检查是否有指定类型的组件
    pub fn has_component<T: 'static>(&self) -> bool {
        let type_id = TypeId::of::<T>();
        self.components.iter().any(|c| c.type_id == type_id)
    }

    /// 获取组件数量
    pub fn component_count(&self) -> usize {
        self.components.len()
    }

    // ========== 便捷方法 ==========

    /// 创建带有 Transform 组件的 GameObject
    pub fn with_transform(name: impl Into<String>) -> Self {
        let mut go = Self::new(name);
        go.add_component(Transform::default());
        go
    }

    /// 创建带有 Camera 组件的 GameObject
    pub fn with_camera(name: impl Into<String>) -> Self {
        let mut go = Self::new(name);
        go.add_component(Camera::default());
        go
    }

    /// 获取或添加 Transform 组件
    pub fn get_or_add_transform(&mut self) -> &mut Transform {
        if !self.has_component::<Transform>() {
            self.add_component(Transform::default());
        }
        match self.get_component_mut::<Transform>() {
            Some(transform) => transform,
            None => unreachable!(),
        }
    }

    /// 获取世界矩阵（由 Transform 组件计算）
    pub fn world_matrix(&mut self) -> Matrix4 {
        self.get_or_add_transform().world_matrix()
    }
}

impl Component for GameObject {
    fn name(&self) -> &str {
        &self.name
    }

    fn tick(&mut self, delta_time: f32) {
        if !self.enabled {
            return;
        }

        // 组件存储为 Box<dyn Any>，按已知类型逐类更新
        for transform in self.get_components_mut::<Transform>() {
            transform.tick(delta_time);
        }

        for camera in self.get_components_mut::<Camera>() {
            camera.tick(delta_time);
        }
    }
}

impl Default for GameObject {
    fn default() -> Self {
        Self::new("GameObject")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::math::{utils, Vector3};

    #[test]
    fn test_create_game_object() {
        let go = GameObject::new("TestObject");
        assert_eq!(go.get_name(), "TestObject");
        assert!(go.enabled);
        assert_eq!(go.component_count(), 0);
    }

    #[test]
    fn test_add_and_get_component() {
        let mut go = GameObject::new("TestObject");
        go.add_component(Transform::new("TestTransform"));

        assert!(go.has_component::<Transform>());
        assert_eq!(go.component_count(), 1);
        assert!(go.get_component::<Transform>().is_some());
    }

    #[test]
    fn test_remove_component() {
        let mut go = GameObject::new("TestObject");
        go.add_component(Transform::new("TestTransform"));

        assert!(go.remove_component::<Transform>());
        assert!(!go.has_component::<Transform>());
        assert!(!go.remove_component::<Transform>());
    }

    #[test]
    fn test_multiple_components() {
        let mut go = GameObject::new("TestObject");
        go.add_component(Transform::new("Transform1"));
        go.add_component(Camera::new("Camera1"));

        assert_eq!(go.component_count(), 2);
        assert!(go.has_component::<Transform>());
        assert!(go.has_component::<Camera>());
    }

    #[test]
    fn test_world_matrix_from_transform() {
        let mut go = GameObject::with_transform("Box");
        go.get_or_add_transform()
            .set_position(Vector3::new(1.0, 2.0, 3.0));

        let world = go.world_matrix();
        assert!(utils::approx_eq(world[(0, 3)], 1.0, 1e-6));
        assert!(utils::approx_eq(world[(1, 3)], 2.0, 1e-6));
        assert!(utils::approx_eq(world[(2, 3)], 3.0, 1e-6));
    }
}
