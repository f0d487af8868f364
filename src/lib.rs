//! BoxRender - DirectX 12 盒子渲染器
//!
//! 一个薄封装的面向对象 D3D12 渲染层：描述符生命周期管理、
//! 反射驱动的根签名与按名设参、组件化场景对象，最终在窗口里
//! 画一个带纹理的旋转盒子。
//!
//! # 模块结构
//!
//! - `core`: 核心功能模块（数学、日志、配置、错误处理）
//! - `component`: 组件化场景对象（GameObject、Transform、Camera）
//! - `geometry`: 几何体模块（顶点布局、盒子网格）
//! - `texture`: 纹理加载模块
//! - `rhi`: 与后端无关的渲染硬件接口（描述符、着色器、材质）
//! - `gfx`: 图形后端（DX12 实现，仅 Windows）
//!
//! # 描述符管理
//!
//! 持久资源的视图从 [`rhi::DescriptorAllocator`] 取 CPU 侧槽位，
//! 由 [`rhi::ResourceView`] 的生命周期自动归还；每帧绘制时
//! [`rhi::DescriptorCacheGpu`] 把散落的 CPU 描述符拷贝进
//! 着色器可见堆的连续区段，帧间整体重置。

pub mod component;
pub mod core;
pub mod geometry;
pub mod gfx;
pub mod rhi;
pub mod texture;
