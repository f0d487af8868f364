//! 组件系统模块
//!
//! 提供场景侧的组件：Transform、Camera 和组件容器 GameObject。

pub mod camera;
pub mod component;
pub mod game_object;
pub mod transform;

pub use camera::Camera;
pub use component::Component;
pub use game_object::GameObject;
pub use transform::Transform;
