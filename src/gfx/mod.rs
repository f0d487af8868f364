//! 图形后端模块
//!
//! 目前只有 DirectX 12 一个后端，仅在 Windows 上编译。
//! RHI 核心（`crate::rhi`）不依赖本模块，非 Windows 平台只能
//! 使用核心逻辑与测试。

#[cfg(target_os = "windows")]
pub mod dx12;

#[cfg(target_os = "windows")]
pub use dx12::context::Dx12Context;
#[cfg(target_os = "windows")]
pub use dx12::renderer::Renderer;
