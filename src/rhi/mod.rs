//! 渲染硬件接口（RHI）核心
//!
//! 平台无关的描述符生命周期、反射驱动的参数绑定和材质编排。
//! 所有逻辑都表达在 [`device`] 模块的后端 trait 之上，具体后端在
//! `gfx` 模块中实现。
//!
//! # 模块组织
//!
//! - [`device`]：后端 trait 与数据模型（堆、视图、根签名、编译）
//! - [`descriptor`]：持久描述符分配器（空闲块列表 + 懒增长堆池）
//! - [`cache`]：每帧 GPU 可见描述符缓存（重置一次的环）
//! - [`view`]：类型化资源视图（RAII 槽位管理）
//! - [`shader`]：反射驱动的根签名构建与按名绑定
//! - [`material`]：材质与逐对象常量缓冲区编排

pub mod cache;
pub mod descriptor;
pub mod device;
pub mod material;
pub mod shader;
pub mod view;

#[cfg(test)]
pub(crate) mod testing;

pub use cache::DescriptorCacheGpu;
pub use descriptor::{CpuDescriptorHandle, DescriptorAllocator, DescriptorSlot, GpuDescriptorHandle};
pub use material::Material;
pub use shader::{Shader, ShaderDefines, ShaderInfo};
pub use view::{ResourceView, ViewKind};
