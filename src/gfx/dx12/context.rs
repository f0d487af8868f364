//! DirectX 12 核心对象
//!
//! 封装窗口、设备、命令队列、交换链、后备缓冲 RTV 和同步栅栏。
//! 渲染编排在 `renderer` 中，本模块只负责初始化与窗口尺寸管理。
//!
//! # 初始化流程
//!
//! 1. 启用调试层（Debug 模式）
//! 2. 创建 DXGI 工厂
//! 3. 创建 D3D12 设备
//! 4. 创建命令队列
//! 5. 创建交换链
//! 6. 创建后备缓冲 RTV
//! 7. 创建同步对象（Fence）

use std::sync::Arc;
use tracing::{debug, info, warn};
use windows::{
    core::Interface, Win32::Graphics::Direct3D::*, Win32::Graphics::Direct3D12::*,
    Win32::Graphics::Dxgi::Common::*, Win32::Graphics::Dxgi::*,
};
use winit::dpi::LogicalSize;
use winit::event_loop::EventLoop;
use winit::raw_window_handle::{HasWindowHandle, RawWindowHandle};
use winit::window::{Window, WindowBuilder};

use crate::core::error::{GraphicsError, Result};
use crate::core::Config;

/// 交换链的后备缓冲数量
pub const FRAME_COUNT: usize = 2;

/// 后备缓冲格式
pub const BACK_BUFFER_FORMAT: DXGI_FORMAT = DXGI_FORMAT_R8G8B8A8_UNORM;

/// DirectX 12 核心对象集合
pub struct Dx12Context {
    /// D3D12 设备
    pub device: ID3D12Device,
    /// 命令队列
    pub command_queue: ID3D12CommandQueue,
    /// 交换链
    pub swap_chain: IDXGISwapChain3,
    /// 后备缓冲 RTV 堆
    pub rtv_heap: ID3D12DescriptorHeap,
    /// RTV 描述符大小
    pub rtv_descriptor_size: usize,
    /// 当前帧在交换链中的索引
    pub frame_index: usize,
    /// 同步栅栏
    pub fence: ID3D12Fence,
    /// 栅栏值
    pub fence_value: u64,
    /// 栅栏事件句柄
    pub fence_event: windows::Win32::Foundation::HANDLE,
    /// 窗口引用
    pub window: Arc<Window>,
    /// 窗口宽度
    pub width: u32,
    /// 窗口高度
    pub height: u32,
}

// DirectX 12 的设备对象是线程安全的
unsafe impl Send for Dx12Context {}
unsafe impl Sync for Dx12Context {}

impl Dx12Context {
    /// 创建 DirectX 12 核心对象
    pub fn new(event_loop: &EventLoop<()>, config: &Config) -> Result<Self> {
        let width = config.window.width;
        let height = config.window.height;

        // 创建窗口
        let window = Arc::new(
            WindowBuilder::new()
                .with_title(config.window.title.clone())
                .with_inner_size(LogicalSize::new(width, height))
                .with_resizable(config.window.resizable)
                .build(event_loop)
                .map_err(|e| {
                    GraphicsError::DeviceCreation(format!("Failed to create window: {}", e))
                })?,
        );

        unsafe {
            // 1. 启用调试层（仅 Debug 模式）
            #[cfg(debug_assertions)]
            {
                let mut debug_interface: Option<ID3D12Debug> = None;
                if D3D12GetDebugInterface(&mut debug_interface).is_ok() {
                    if let Some(debug_interface) = debug_interface {
                        debug_interface.EnableDebugLayer();
                        debug!("DX12 Debug Layer enabled");
                    }
                } else {
                    warn!("Failed to enable DX12 Debug Layer");
                }
            }

            // 2. 创建 DXGI 工厂
            #[cfg(debug_assertions)]
            let factory: IDXGIFactory4 = CreateDXGIFactory2(DXGI_CREATE_FACTORY_DEBUG)
                .map_err(|e| {
                    GraphicsError::DeviceCreation(format!("Failed to create DXGI factory: {:?}", e))
                })?;
            #[cfg(not(debug_assertions))]
            let factory: IDXGIFactory4 =
                CreateDXGIFactory2(DXGI_CREATE_FACTORY_FLAGS(0)).map_err(|e| {
                    GraphicsError::DeviceCreation(format!("Failed to create DXGI factory: {:?}", e))
                })?;

            // 3. 创建 D3D12 设备
            let mut device: Option<ID3D12Device> = None;
            D3D12CreateDevice(None, D3D_FEATURE_LEVEL_11_0, &mut device).map_err(|e| {
                GraphicsError::DeviceCreation(format!("Failed to create D3D12 device: {:?}", e))
            })?;
            let device = match device {
                Some(device) => device,
                None => {
                    return Err(GraphicsError::DeviceCreation(
                        "D3D12CreateDevice returned no device".to_string(),
                    )
                    .into())
                }
            };

            debug!("D3D12 device created");

            // 4. 创建命令队列
            let queue_desc = D3D12_COMMAND_QUEUE_DESC {
                Type: D3D12_COMMAND_LIST_TYPE_DIRECT,
                Flags: D3D12_COMMAND_QUEUE_FLAG_NONE,
                ..Default::default()
            };
            let command_queue: ID3D12CommandQueue =
                device.CreateCommandQueue(&queue_desc).map_err(|e| {
                    GraphicsError::DeviceCreation(format!(
                        "Failed to create command queue: {:?}",
                        e
                    ))
                })?;

            // 5. 创建交换链（从 winit 0.29 取 HWND）
            let window_handle = window.window_handle().map_err(|e| {
                GraphicsError::SwapchainError(format!("Failed to get window handle: {}", e))
            })?;
            let hwnd = match window_handle.as_raw() {
                RawWindowHandle::Win32(win32_handle) => windows::Win32::Foundation::HWND(
                    win32_handle.hwnd.get() as *mut core::ffi::c_void,
                ),
                _ => {
                    return Err(GraphicsError::SwapchainError(
                        "Expected Win32 window handle on Windows platform".to_string(),
                    )
                    .into())
                }
            };
            let swap_chain_desc = DXGI_SWAP_CHAIN_DESC1 {
                Width: width,
                Height: height,
                Format: BACK_BUFFER_FORMAT,
                SampleDesc: DXGI_SAMPLE_DESC {
                    Count: 1,
                    ..Default::default()
                },
                BufferUsage: DXGI_USAGE_RENDER_TARGET_OUTPUT,
                BufferCount: FRAME_COUNT as u32,
                SwapEffect: DXGI_SWAP_EFFECT_FLIP_DISCARD,
                ..Default::default()
            };

            let swap_chain: IDXGISwapChain1 = factory
                .CreateSwapChainForHwnd(&command_queue, hwnd, &swap_chain_desc, None, None)
                .map_err(|e| {
                    GraphicsError::SwapchainError(format!("Failed to create swap chain: {:?}", e))
                })?;
            let swap_chain: IDXGISwapChain3 = swap_chain.cast().map_err(|e| {
                GraphicsError::SwapchainError(format!(
                    "Failed to cast swap chain to IDXGISwapChain3: {:?}",
                    e
                ))
            })?;

            info!(width, height, buffers = FRAME_COUNT, "Swap chain created");

            // 6. 创建后备缓冲 RTV
            let rtv_heap_desc = D3D12_DESCRIPTOR_HEAP_DESC {
                NumDescriptors: FRAME_COUNT as u32,
                Type: D3D12_DESCRIPTOR_HEAP_TYPE_RTV,
                Flags: D3D12_DESCRIPTOR_HEAP_FLAG_NONE,
                NodeMask: 0,
            };
            let rtv_heap: ID3D12DescriptorHeap =
                device.CreateDescriptorHeap(&rtv_heap_desc).map_err(|e| {
                    GraphicsError::ResourceCreation(format!(
                        "Failed to create back buffer RTV heap: {:?}",
                        e
                    ))
                })?;
            let rtv_descriptor_size = device
                .GetDescriptorHandleIncrementSize(D3D12_DESCRIPTOR_HEAP_TYPE_RTV)
                as usize;

            Self::create_back_buffer_rtvs(&device, &swap_chain, &rtv_heap, rtv_descriptor_size)?;

            // 7. 创建同步对象
            let frame_index = swap_chain.GetCurrentBackBufferIndex() as usize;
            let fence: ID3D12Fence =
                device.CreateFence(0, D3D12_FENCE_FLAG_NONE).map_err(|e| {
                    GraphicsError::DeviceCreation(format!("Failed to create fence: {:?}", e))
                })?;
            let fence_value = 1;
            let fence_event =
                windows::Win32::System::Threading::CreateEventA(None, false, false, None)
                    .map_err(|e| {
                        GraphicsError::DeviceCreation(format!(
                            "Failed to create fence event: {:?}",
                            e
                        ))
                    })?;

            debug!("Synchronization objects created");
            info!("DX12 context initialization complete");

            Ok(Self {
                device,
                command_queue,
                swap_chain,
                rtv_heap,
                rtv_descriptor_size,
                frame_index,
                fence,
                fence_value,
                fence_event,
                window,
                width,
                height,
            })
        }
    }

    /// 为每个后备缓冲创建 RTV
    fn create_back_buffer_rtvs(
        device: &ID3D12Device,
        swap_chain: &IDXGISwapChain3,
        rtv_heap: &ID3D12DescriptorHeap,
        rtv_descriptor_size: usize,
    ) -> Result<()> {
        unsafe {
            let rtv_start = rtv_heap.GetCPUDescriptorHandleForHeapStart();
            for i in 0..FRAME_COUNT {
                let surface: ID3D12Resource = swap_chain.GetBuffer(i as u32).map_err(|e| {
                    GraphicsError::SwapchainError(format!(
                        "Failed to get swap chain buffer {}: {:?}",
                        i, e
                    ))
                })?;
                let handle = D3D12_CPU_DESCRIPTOR_HANDLE {
                    ptr: rtv_start.ptr + i * rtv_descriptor_size,
                };
                device.CreateRenderTargetView(&surface, None, handle);
            }
        }
        Ok(())
    }

    /// 当前后备缓冲的 RTV 句柄
    pub fn current_back_buffer_rtv(&self) -> D3D12_CPU_DESCRIPTOR_HANDLE {
        unsafe {
            D3D12_CPU_DESCRIPTOR_HANDLE {
                ptr: self.rtv_heap.GetCPUDescriptorHandleForHeapStart().ptr
                    + self.frame_index * self.rtv_descriptor_size,
            }
        }
    }

    /// 当前后备缓冲资源
    pub fn current_back_buffer(&self) -> Result<ID3D12Resource> {
        unsafe {
            self.swap_chain
                .GetBuffer(self.frame_index as u32)
                .map_err(|e| {
                    GraphicsError::SwapchainError(format!(
                        "Failed to get swap chain buffer: {:?}",
                        e
                    ))
                    .into()
                })
        }
    }

    /// 等待命令队列中所有已提交的工作完成
    ///
    /// 每帧提交后调用一次，帧间做完整的 CPU/GPU 同步。
    pub fn flush_command_queue(&mut self) -> Result<()> {
        unsafe {
            let wait_value = self.fence_value;
            self.fence_value += 1;

            self.command_queue
                .Signal(&self.fence, wait_value)
                .map_err(|e| {
                    GraphicsError::CommandExecution(format!("Failed to signal fence: {:?}", e))
                })?;

            if self.fence.GetCompletedValue() < wait_value {
                self.fence
                    .SetEventOnCompletion(wait_value, self.fence_event)
                    .map_err(|e| {
                        GraphicsError::CommandExecution(format!(
                            "Failed to set fence event: {:?}",
                            e
                        ))
                    })?;
                windows::Win32::System::Threading::WaitForSingleObject(
                    self.fence_event,
                    windows::Win32::System::Threading::INFINITE,
                );
            }
        }
        Ok(())
    }

    /// 调整交换链大小并重建后备缓冲 RTV
    pub fn resize(&mut self, width: u32, height: u32) -> Result<()> {
        self.flush_command_queue()?;

        unsafe {
            self.swap_chain
                .ResizeBuffers(
                    FRAME_COUNT as u32,
                    width,
                    height,
                    BACK_BUFFER_FORMAT,
                    DXGI_SWAP_CHAIN_FLAG(0),
                )
                .map_err(|e| {
                    GraphicsError::SwapchainError(format!(
                        "Failed to resize swap chain buffers: {:?}",
                        e
                    ))
                })?;

            Self::create_back_buffer_rtvs(
                &self.device,
                &self.swap_chain,
                &self.rtv_heap,
                self.rtv_descriptor_size,
            )?;

            self.width = width;
            self.height = height;
            self.frame_index = self.swap_chain.GetCurrentBackBufferIndex() as usize;
        }

        debug!(width, height, "Swap chain resized");
        Ok(())
    }

    /// 窗口引用
    pub fn window(&self) -> &Window {
        &self.window
    }
}
