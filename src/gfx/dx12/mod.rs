//! DirectX 12 后端
//!
//! - `context`: 窗口、设备、命令队列、交换链等核心对象
//! - `device`: `crate::rhi` 设备抽象的 D3D12 实现
//! - `compiler`: 基于 FXC 的着色器编译与反射
//! - `renderer`: 渲染编排（初始化场景、逐帧录制命令）

pub mod compiler;
pub mod context;
pub mod device;
pub mod renderer;

pub use context::Dx12Context;
pub use device::Dx12Device;
pub use renderer::Renderer;
