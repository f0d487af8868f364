//! DX12 渲染编排
//!
//! 把场景（相机 + 旋转的盒子）画到窗口：初始化管线与资源，
//! 每帧录制命令列表、通过材质发出根绑定、提交并做完整同步。
//!
//! # 每帧流程
//!
//! 1. 更新盒子旋转与相机矩阵，写入材质参数
//! 2. 重置命令分配器/列表，重置每帧描述符缓存
//! 3. 屏障切换后备缓冲，清屏，设置渲染目标
//! 4. 材质上传常量缓冲区并绑定根参数
//! 5. 提交绘制，Present，栅栏全量同步

use std::mem::ManuallyDrop;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use tracing::{debug, info, trace, warn};
use windows::{
    core::s, Win32::Foundation::RECT, Win32::Graphics::Direct3D::*,
    Win32::Graphics::Direct3D12::*, Win32::Graphics::Dxgi::Common::*,
    Win32::Graphics::Dxgi::DXGI_PRESENT,
};
use winit::event_loop::EventLoop;
use winit::window::Window;

use crate::component::{Camera, GameObject};
use crate::core::error::{GraphicsError, Result};
use crate::core::math::{to_shader_matrix, Matrix4, Vector3};
use crate::core::Config;
use crate::geometry::MeshData;
use crate::rhi::cache::DescriptorCacheGpu;
use crate::rhi::descriptor::DescriptorAllocator;
use crate::rhi::device::{HeapKind, RenderDevice, ShaderStage};
use crate::rhi::material::Material;
use crate::rhi::shader::{Shader, ShaderInfo};
use crate::rhi::view::ResourceView;
use crate::texture::TextureData;

use super::compiler::FxcShaderCompiler;
use super::context::{Dx12Context, BACK_BUFFER_FORMAT};
use super::device::{
    Dx12CommandRecorder, Dx12DescriptorHeap, Dx12Device, Dx12Resource, Dx12RootSignature,
};

/// 深度缓冲格式
const DEPTH_BUFFER_FORMAT: DXGI_FORMAT = DXGI_FORMAT_D32_FLOAT;

/// 背景清屏色（淡钢蓝）
const CLEAR_COLOR: [f32; 4] = [0.69, 0.77, 0.87, 1.0];

/// 盒子纹理文件
const CRATE_TEXTURE_PATH: &str = "assets/textures/wood_crate.png";

/// 盒子绕 Y 轴的旋转速度（度/秒）
const BOX_SPIN_DEGREES_PER_SECOND: f32 = 30.0;

/// DX12 渲染器
pub struct Renderer {
    gfx: Dx12Context,
    device: Arc<Dx12Device>,

    // 描述符基础设施
    allocator: Arc<Mutex<DescriptorAllocator>>,
    descriptor_cache: DescriptorCacheGpu,

    // 命令录制
    command_allocator: ID3D12CommandAllocator,
    command_list: ID3D12GraphicsCommandList,
    pso: ID3D12PipelineState,

    // 深度缓冲
    dsv_heap: ID3D12DescriptorHeap,
    depth_buffer: ID3D12Resource,

    // 几何体
    vertex_buffer: ID3D12Resource,
    vertex_buffer_view: D3D12_VERTEX_BUFFER_VIEW,
    index_buffer: ID3D12Resource,
    index_buffer_view: D3D12_INDEX_BUFFER_VIEW,
    index_count: u32,

    // 材质与纹理（视图只还槽位，资源由渲染器持有）
    material: Material,
    crate_texture: Dx12Resource,
    crate_srv: Arc<ResourceView>,

    // 场景
    camera: Camera,
    box_object: GameObject,

    viewport: D3D12_VIEWPORT,
    scissor_rect: RECT,
    vsync: bool,
    start_time: Instant,
}

impl Renderer {
    /// 创建渲染器并上传所有静态资源
    pub fn new(event_loop: &EventLoop<()>, config: &Config) -> Result<Self> {
        let mut gfx = Dx12Context::new(event_loop, config)?;
        let device = Arc::new(Dx12Device::new(gfx.device.clone()));

        // 描述符基础设施：持久分配器 + 每帧 GPU 可见缓存
        let allocator = Arc::new(Mutex::new(DescriptorAllocator::new(
            Arc::clone(&device) as Arc<dyn RenderDevice>,
            HeapKind::CbvSrvUav,
            config.graphics.descriptors_per_heap,
        )));
        let descriptor_cache = DescriptorCacheGpu::new(
            Arc::clone(&device) as Arc<dyn RenderDevice>,
            config.graphics.descriptor_cache_capacity,
        )?;

        unsafe {
            // 命令分配器与命令列表（创建后保持打开，用于录制上传命令）
            let command_allocator: ID3D12CommandAllocator = gfx
                .device
                .CreateCommandAllocator(D3D12_COMMAND_LIST_TYPE_DIRECT)
                .map_err(|e| {
                    GraphicsError::DeviceCreation(format!(
                        "Failed to create command allocator: {:?}",
                        e
                    ))
                })?;
            let command_list: ID3D12GraphicsCommandList = gfx
                .device
                .CreateCommandList(0, D3D12_COMMAND_LIST_TYPE_DIRECT, &command_allocator, None)
                .map_err(|e| {
                    GraphicsError::DeviceCreation(format!(
                        "Failed to create command list: {:?}",
                        e
                    ))
                })?;

            // 深度缓冲
            let dsv_heap_desc = D3D12_DESCRIPTOR_HEAP_DESC {
                Type: D3D12_DESCRIPTOR_HEAP_TYPE_DSV,
                NumDescriptors: 1,
                Flags: D3D12_DESCRIPTOR_HEAP_FLAG_NONE,
                NodeMask: 0,
            };
            let dsv_heap: ID3D12DescriptorHeap =
                gfx.device.CreateDescriptorHeap(&dsv_heap_desc).map_err(|e| {
                    GraphicsError::ResourceCreation(format!("Failed to create DSV heap: {:?}", e))
                })?;
            let depth_buffer =
                Self::create_depth_buffer(&gfx.device, &dsv_heap, gfx.width, gfx.height)?;

            // 盒子网格，上传堆顶点/索引缓冲
            let mesh = MeshData::create_box(2.0, 2.0, 2.0);
            let vertex_buffer =
                Self::create_upload_buffer(&gfx.device, mesh.vertex_bytes(), "box vertices")?;
            let vertex_buffer_view = D3D12_VERTEX_BUFFER_VIEW {
                BufferLocation: vertex_buffer.GetGPUVirtualAddress(),
                SizeInBytes: mesh.vertex_bytes().len() as u32,
                StrideInBytes: crate::geometry::Vertex::stride() as u32,
            };
            let index_buffer =
                Self::create_upload_buffer(&gfx.device, mesh.index_bytes(), "box indices")?;
            let index_buffer_view = D3D12_INDEX_BUFFER_VIEW {
                BufferLocation: index_buffer.GetGPUVirtualAddress(),
                SizeInBytes: mesh.index_bytes().len() as u32,
                Format: DXGI_FORMAT_R16_UINT,
            };
            let index_count = mesh.index_count() as u32;

            info!(
                vertices = mesh.vertex_count(),
                indices = index_count,
                "Box geometry uploaded"
            );

            // 纹理：默认堆 + 上传堆拷贝，录制在初始命令列表上
            let texture_data = Self::load_crate_texture();
            let (crate_texture, texture_upload) =
                Self::create_texture(&gfx.device, &command_list, &texture_data)?;

            // 着色器与材质
            let compiler = FxcShaderCompiler::new();
            let shader_path =
                Path::new(env!("CARGO_MANIFEST_DIR")).join("src/gfx/dx12/shaders/box.hlsl");
            let shader = Shader::new(
                ShaderInfo::graphics("box", shader_path),
                device.as_ref(),
                &compiler,
            )?;

            let crate_srv = Arc::new(ResourceView::new(
                device.as_ref(),
                Arc::clone(&allocator),
                &texture_data.srv_description(),
                &crate_texture,
            )?);

            let mut material = Material::new();
            material.set_shader(shader);
            material.create_constant_buffer(device.as_ref())?;
            material.set_texture("gDiffuseMap", Arc::clone(&crate_srv));

            // 管线状态对象
            let pso = Self::create_pipeline_state(&gfx.device, &material)?;

            // 提交上传命令并等待完成，之后上传堆缓冲可以释放
            command_list.Close().map_err(|e| {
                GraphicsError::CommandExecution(format!(
                    "Failed to close upload command list: {:?}",
                    e
                ))
            })?;
            gfx.command_queue
                .ExecuteCommandLists(&[Some(command_list.clone().into())]);
            gfx.flush_command_queue()?;
            drop(texture_upload);

            // 场景：固定相机看向原点，盒子在原点绕 Y 旋转
            let aspect = gfx.width as f32 / gfx.height as f32;
            let mut camera = Camera::main_camera();
            camera.set_lens(0.25 * std::f32::consts::PI, aspect, 1.0, 1000.0);
            camera.look_at(
                Vector3::new(0.0, 3.54, -3.54),
                Vector3::zeros(),
                Vector3::new(0.0, 1.0, 0.0),
            );
            camera.update_view_matrix();

            let box_object = GameObject::with_transform("box");

            let viewport = D3D12_VIEWPORT {
                TopLeftX: 0.0,
                TopLeftY: 0.0,
                Width: gfx.width as f32,
                Height: gfx.height as f32,
                MinDepth: 0.0,
                MaxDepth: 1.0,
            };
            let scissor_rect = RECT {
                left: 0,
                top: 0,
                right: gfx.width as i32,
                bottom: gfx.height as i32,
            };

            info!("DX12 renderer initialized");

            Ok(Self {
                gfx,
                device,
                allocator,
                descriptor_cache,
                command_allocator,
                command_list,
                pso,
                dsv_heap,
                depth_buffer,
                vertex_buffer,
                vertex_buffer_view,
                index_buffer,
                index_buffer_view,
                index_count,
                material,
                crate_texture,
                crate_srv,
                camera,
                box_object,
                viewport,
                scissor_rect,
                vsync: config.graphics.vsync,
                start_time: Instant::now(),
            })
        }
    }

    /// 读取盒子纹理，文件缺失或损坏时退回程序生成的棋盘格
    fn load_crate_texture() -> TextureData {
        match TextureData::load_from_file("woodCrateTex", Path::new(CRATE_TEXTURE_PATH)) {
            Ok(texture) => texture,
            Err(e) => {
                warn!(
                    path = CRATE_TEXTURE_PATH,
                    error = %e,
                    "Crate texture unavailable, using generated checkerboard"
                );
                Self::checkerboard_texture()
            }
        }
    }

    fn checkerboard_texture() -> TextureData {
        const SIZE: u32 = 256;
        const CELL: u32 = 32;
        let mut pixels = Vec::with_capacity((SIZE * SIZE * 4) as usize);
        for y in 0..SIZE {
            for x in 0..SIZE {
                let light = ((x / CELL) + (y / CELL)) % 2 == 0;
                let value = if light { 200 } else { 90 };
                pixels.extend_from_slice(&[value, value, value, 255]);
            }
        }
        match TextureData::from_rgba8("woodCrateTex", SIZE, SIZE, pixels) {
            Ok(texture) => texture,
            Err(_) => unreachable!("checkerboard dimensions are constant"),
        }
    }

    /// 创建深度缓冲并写入 DSV
    fn create_depth_buffer(
        device: &ID3D12Device,
        dsv_heap: &ID3D12DescriptorHeap,
        width: u32,
        height: u32,
    ) -> Result<ID3D12Resource> {
        let heap_props = D3D12_HEAP_PROPERTIES {
            Type: D3D12_HEAP_TYPE_DEFAULT,
            ..Default::default()
        };
        let resource_desc = D3D12_RESOURCE_DESC {
            Dimension: D3D12_RESOURCE_DIMENSION_TEXTURE2D,
            Width: width as u64,
            Height: height,
            DepthOrArraySize: 1,
            MipLevels: 1,
            Format: DEPTH_BUFFER_FORMAT,
            SampleDesc: DXGI_SAMPLE_DESC { Count: 1, Quality: 0 },
            Layout: D3D12_TEXTURE_LAYOUT_UNKNOWN,
            Flags: D3D12_RESOURCE_FLAG_ALLOW_DEPTH_STENCIL,
            ..Default::default()
        };
        let clear_value = D3D12_CLEAR_VALUE {
            Format: DEPTH_BUFFER_FORMAT,
            Anonymous: D3D12_CLEAR_VALUE_0 {
                DepthStencil: D3D12_DEPTH_STENCIL_VALUE {
                    Depth: 1.0,
                    Stencil: 0,
                },
            },
        };

        unsafe {
            let mut depth_buffer: Option<ID3D12Resource> = None;
            device
                .CreateCommittedResource(
                    &heap_props,
                    D3D12_HEAP_FLAG_NONE,
                    &resource_desc,
                    D3D12_RESOURCE_STATE_DEPTH_WRITE,
                    Some(&clear_value),
                    &mut depth_buffer,
                )
                .map_err(|e| {
                    GraphicsError::ResourceCreation(format!(
                        "Failed to create depth buffer: {:?}",
                        e
                    ))
                })?;
            let depth_buffer = match depth_buffer {
                Some(buffer) => buffer,
                None => {
                    return Err(GraphicsError::ResourceCreation(
                        "depth buffer creation returned no resource".to_string(),
                    )
                    .into())
                }
            };

            device.CreateDepthStencilView(
                &depth_buffer,
                None,
                dsv_heap.GetCPUDescriptorHandleForHeapStart(),
            );

            debug!(width, height, "Depth buffer created");
            Ok(depth_buffer)
        }
    }

    /// 创建上传堆缓冲并写入初始数据
    fn create_upload_buffer(
        device: &ID3D12Device,
        data: &[u8],
        name: &str,
    ) -> Result<ID3D12Resource> {
        let heap_props = D3D12_HEAP_PROPERTIES {
            Type: D3D12_HEAP_TYPE_UPLOAD,
            ..Default::default()
        };
        let resource_desc = D3D12_RESOURCE_DESC {
            Dimension: D3D12_RESOURCE_DIMENSION_BUFFER,
            Width: data.len() as u64,
            Height: 1,
            DepthOrArraySize: 1,
            MipLevels: 1,
            SampleDesc: DXGI_SAMPLE_DESC { Count: 1, Quality: 0 },
            Layout: D3D12_TEXTURE_LAYOUT_ROW_MAJOR,
            ..Default::default()
        };

        unsafe {
            let mut buffer: Option<ID3D12Resource> = None;
            device
                .CreateCommittedResource(
                    &heap_props,
                    D3D12_HEAP_FLAG_NONE,
                    &resource_desc,
                    D3D12_RESOURCE_STATE_GENERIC_READ,
                    None,
                    &mut buffer,
                )
                .map_err(|e| {
                    GraphicsError::ResourceCreation(format!(
                        "Failed to create upload buffer '{}': {:?}",
                        name, e
                    ))
                })?;
            let buffer = match buffer {
                Some(buffer) => buffer,
                None => {
                    return Err(GraphicsError::ResourceCreation(format!(
                        "upload buffer '{}' creation returned no resource",
                        name
                    ))
                    .into())
                }
            };

            let mut mapped = std::ptr::null_mut();
            buffer.Map(0, None, Some(&mut mapped)).map_err(|e| {
                GraphicsError::ResourceCreation(format!(
                    "Failed to map upload buffer '{}': {:?}",
                    name, e
                ))
            })?;
            std::ptr::copy_nonoverlapping(data.as_ptr(), mapped as *mut u8, data.len());
            buffer.Unmap(0, None);

            Ok(buffer)
        }
    }

    /// 创建默认堆纹理并在命令列表上录制上传拷贝
    ///
    /// 返回 (纹理, 上传缓冲)。上传缓冲必须活到拷贝命令执行完毕。
    fn create_texture(
        device: &ID3D12Device,
        command_list: &ID3D12GraphicsCommandList,
        texture: &TextureData,
    ) -> Result<(Dx12Resource, ID3D12Resource)> {
        let width = texture.width();
        let height = texture.height();

        let heap_props = D3D12_HEAP_PROPERTIES {
            Type: D3D12_HEAP_TYPE_DEFAULT,
            ..Default::default()
        };
        let resource_desc = D3D12_RESOURCE_DESC {
            Dimension: D3D12_RESOURCE_DIMENSION_TEXTURE2D,
            Width: width as u64,
            Height: height,
            DepthOrArraySize: 1,
            MipLevels: 1,
            Format: DXGI_FORMAT_R8G8B8A8_UNORM,
            SampleDesc: DXGI_SAMPLE_DESC { Count: 1, Quality: 0 },
            Layout: D3D12_TEXTURE_LAYOUT_UNKNOWN,
            ..Default::default()
        };

        unsafe {
            let mut resource: Option<ID3D12Resource> = None;
            device
                .CreateCommittedResource(
                    &heap_props,
                    D3D12_HEAP_FLAG_NONE,
                    &resource_desc,
                    D3D12_RESOURCE_STATE_COPY_DEST,
                    None,
                    &mut resource,
                )
                .map_err(|e| {
                    GraphicsError::ResourceCreation(format!(
                        "Failed to create texture '{}': {:?}",
                        texture.name(),
                        e
                    ))
                })?;
            let resource = match resource {
                Some(resource) => resource,
                None => {
                    return Err(GraphicsError::ResourceCreation(format!(
                        "texture '{}' creation returned no resource",
                        texture.name()
                    ))
                    .into())
                }
            };

            // 上传堆中的行距按 256 字节对齐
            let row_pitch = texture.row_pitch() as usize;
            let aligned_pitch = (row_pitch + D3D12_TEXTURE_DATA_PITCH_ALIGNMENT as usize - 1)
                & !(D3D12_TEXTURE_DATA_PITCH_ALIGNMENT as usize - 1);
            let mut staging = vec![0u8; aligned_pitch * height as usize];
            for row in 0..height as usize {
                let src = &texture.pixels()[row * row_pitch..(row + 1) * row_pitch];
                staging[row * aligned_pitch..row * aligned_pitch + row_pitch]
                    .copy_from_slice(src);
            }
            let upload = Self::create_upload_buffer(device, &staging, "texture upload")?;

            let dst_location = D3D12_TEXTURE_COPY_LOCATION {
                pResource: ManuallyDrop::new(Some(resource.clone())),
                Type: D3D12_TEXTURE_COPY_TYPE_SUBRESOURCE_INDEX,
                Anonymous: D3D12_TEXTURE_COPY_LOCATION_0 {
                    SubresourceIndex: 0,
                },
            };
            let src_location = D3D12_TEXTURE_COPY_LOCATION {
                pResource: ManuallyDrop::new(Some(upload.clone())),
                Type: D3D12_TEXTURE_COPY_TYPE_PLACED_FOOTPRINT,
                Anonymous: D3D12_TEXTURE_COPY_LOCATION_0 {
                    PlacedFootprint: D3D12_PLACED_SUBRESOURCE_FOOTPRINT {
                        Offset: 0,
                        Footprint: D3D12_SUBRESOURCE_FOOTPRINT {
                            Format: DXGI_FORMAT_R8G8B8A8_UNORM,
                            Width: width,
                            Height: height,
                            Depth: 1,
                            RowPitch: aligned_pitch as u32,
                        },
                    },
                },
            };
            command_list.CopyTextureRegion(&dst_location, 0, 0, 0, &src_location, None);

            let barrier = Self::transition_barrier(
                &resource,
                D3D12_RESOURCE_STATE_COPY_DEST,
                D3D12_RESOURCE_STATE_PIXEL_SHADER_RESOURCE,
            );
            command_list.ResourceBarrier(&[barrier]);

            info!(
                name = texture.name(),
                width,
                height,
                "Texture upload recorded"
            );

            Ok((Dx12Resource::new(resource, texture.name()), upload))
        }
    }

    /// 从材质着色器构建图形 PSO
    fn create_pipeline_state(
        device: &ID3D12Device,
        material: &Material,
    ) -> Result<ID3D12PipelineState> {
        let shader = match material.shader() {
            Some(shader) => shader,
            None => {
                return Err(GraphicsError::DeviceCreation(
                    "material has no shader for pipeline creation".to_string(),
                )
                .into())
            }
        };
        let vs = match shader.stage_bytecode(ShaderStage::Vertex) {
            Some(bytecode) => bytecode,
            None => {
                return Err(GraphicsError::DeviceCreation(
                    "shader has no vertex stage".to_string(),
                )
                .into())
            }
        };
        let ps = match shader.stage_bytecode(ShaderStage::Pixel) {
            Some(bytecode) => bytecode,
            None => {
                return Err(GraphicsError::DeviceCreation(
                    "shader has no pixel stage".to_string(),
                )
                .into())
            }
        };
        let root_signature = match material
            .root_signature()
            .as_any()
            .downcast_ref::<Dx12RootSignature>()
        {
            Some(root_signature) => root_signature.native().clone(),
            None => {
                return Err(GraphicsError::DeviceCreation(
                    "root signature is not a D3D12 root signature".to_string(),
                )
                .into())
            }
        };

        // 与 geometry::Vertex 的内存布局一一对应
        let input_element_descs = [
            D3D12_INPUT_ELEMENT_DESC {
                SemanticName: s!("POSITION"),
                SemanticIndex: 0,
                Format: DXGI_FORMAT_R32G32B32_FLOAT,
                InputSlot: 0,
                AlignedByteOffset: 0,
                InputSlotClass: D3D12_INPUT_CLASSIFICATION_PER_VERTEX_DATA,
                InstanceDataStepRate: 0,
            },
            D3D12_INPUT_ELEMENT_DESC {
                SemanticName: s!("NORMAL"),
                SemanticIndex: 0,
                Format: DXGI_FORMAT_R32G32B32_FLOAT,
                InputSlot: 0,
                AlignedByteOffset: 12,
                InputSlotClass: D3D12_INPUT_CLASSIFICATION_PER_VERTEX_DATA,
                InstanceDataStepRate: 0,
            },
            D3D12_INPUT_ELEMENT_DESC {
                SemanticName: s!("TANGENT"),
                SemanticIndex: 0,
                Format: DXGI_FORMAT_R32G32B32_FLOAT,
                InputSlot: 0,
                AlignedByteOffset: 24,
                InputSlotClass: D3D12_INPUT_CLASSIFICATION_PER_VERTEX_DATA,
                InstanceDataStepRate: 0,
            },
            D3D12_INPUT_ELEMENT_DESC {
                SemanticName: s!("TEXCOORD"),
                SemanticIndex: 0,
                Format: DXGI_FORMAT_R32G32_FLOAT,
                InputSlot: 0,
                AlignedByteOffset: 36,
                InputSlotClass: D3D12_INPUT_CLASSIFICATION_PER_VERTEX_DATA,
                InstanceDataStepRate: 0,
            },
        ];

        unsafe {
            let mut pso_desc = D3D12_GRAPHICS_PIPELINE_STATE_DESC::default();
            pso_desc.pRootSignature = ManuallyDrop::new(Some(root_signature));
            pso_desc.VS = D3D12_SHADER_BYTECODE {
                pShaderBytecode: vs.as_ptr() as *const _,
                BytecodeLength: vs.len(),
            };
            pso_desc.PS = D3D12_SHADER_BYTECODE {
                pShaderBytecode: ps.as_ptr() as *const _,
                BytecodeLength: ps.len(),
            };
            pso_desc.BlendState = D3D12_BLEND_DESC {
                RenderTarget: [
                    D3D12_RENDER_TARGET_BLEND_DESC {
                        BlendEnable: false.into(),
                        LogicOpEnable: false.into(),
                        RenderTargetWriteMask: D3D12_COLOR_WRITE_ENABLE_ALL.0 as u8,
                        ..Default::default()
                    },
                    D3D12_RENDER_TARGET_BLEND_DESC::default(),
                    D3D12_RENDER_TARGET_BLEND_DESC::default(),
                    D3D12_RENDER_TARGET_BLEND_DESC::default(),
                    D3D12_RENDER_TARGET_BLEND_DESC::default(),
                    D3D12_RENDER_TARGET_BLEND_DESC::default(),
                    D3D12_RENDER_TARGET_BLEND_DESC::default(),
                    D3D12_RENDER_TARGET_BLEND_DESC::default(),
                ],
                ..Default::default()
            };
            pso_desc.RasterizerState = D3D12_RASTERIZER_DESC {
                FillMode: D3D12_FILL_MODE_SOLID,
                CullMode: D3D12_CULL_MODE_BACK,
                DepthClipEnable: true.into(),
                ..Default::default()
            };
            pso_desc.DepthStencilState = D3D12_DEPTH_STENCIL_DESC {
                DepthEnable: true.into(),
                DepthWriteMask: D3D12_DEPTH_WRITE_MASK_ALL,
                DepthFunc: D3D12_COMPARISON_FUNC_LESS,
                StencilEnable: false.into(),
                StencilReadMask: 0xFF,
                StencilWriteMask: 0xFF,
                FrontFace: D3D12_DEPTH_STENCILOP_DESC::default(),
                BackFace: D3D12_DEPTH_STENCILOP_DESC::default(),
            };
            pso_desc.SampleMask = 0xFFFFFFFF;
            pso_desc.InputLayout = D3D12_INPUT_LAYOUT_DESC {
                pInputElementDescs: input_element_descs.as_ptr(),
                NumElements: input_element_descs.len() as u32,
            };
            pso_desc.PrimitiveTopologyType = D3D12_PRIMITIVE_TOPOLOGY_TYPE_TRIANGLE;
            pso_desc.NumRenderTargets = 1;
            pso_desc.RTVFormats[0] = BACK_BUFFER_FORMAT;
            pso_desc.DSVFormat = DEPTH_BUFFER_FORMAT;
            pso_desc.SampleDesc.Count = 1;

            let pso = device.CreateGraphicsPipelineState(&pso_desc).map_err(|e| {
                GraphicsError::DeviceCreation(format!("Failed to create PSO: {:?}", e))
            })?;

            debug!("Graphics pipeline state created");
            Ok(pso)
        }
    }

    fn transition_barrier(
        resource: &ID3D12Resource,
        before: D3D12_RESOURCE_STATES,
        after: D3D12_RESOURCE_STATES,
    ) -> D3D12_RESOURCE_BARRIER {
        D3D12_RESOURCE_BARRIER {
            Type: D3D12_RESOURCE_BARRIER_TYPE_TRANSITION,
            Flags: D3D12_RESOURCE_BARRIER_FLAG_NONE,
            Anonymous: D3D12_RESOURCE_BARRIER_0 {
                Transition: ManuallyDrop::new(D3D12_RESOURCE_TRANSITION_BARRIER {
                    pResource: ManuallyDrop::new(Some(resource.clone())),
                    Subresource: D3D12_RESOURCE_BARRIER_ALL_SUBRESOURCES,
                    StateBefore: before,
                    StateAfter: after,
                }),
            },
        }
    }

    /// 渲染一帧
    pub fn draw(&mut self) -> Result<()> {
        // 场景更新：盒子旋转，相机矩阵
        let elapsed = self.start_time.elapsed().as_secs_f32();
        self.box_object
            .get_or_add_transform()
            .set_euler_angle(Vector3::new(
                0.0,
                elapsed * BOX_SPIN_DEGREES_PER_SECOND,
                0.0,
            ));
        self.camera.update_view_matrix();

        let world = self.box_object.world_matrix();
        let wvp: Matrix4 = self.camera.proj_matrix() * self.camera.view_matrix() * world;
        self.material
            .set_matrix("gWorldViewProj", &to_shader_matrix(&wvp));

        unsafe {
            // 上一帧已完整同步，可以立即复用分配器与缓存
            self.command_allocator.Reset().map_err(|e| {
                GraphicsError::CommandExecution(format!(
                    "Failed to reset command allocator: {:?}",
                    e
                ))
            })?;
            self.command_list
                .Reset(&self.command_allocator, &self.pso)
                .map_err(|e| {
                    GraphicsError::CommandExecution(format!(
                        "Failed to reset command list: {:?}",
                        e
                    ))
                })?;
            self.descriptor_cache.reset_cached_heaps();

            self.command_list.RSSetViewports(&[self.viewport]);
            self.command_list.RSSetScissorRects(&[self.scissor_rect]);

            let render_target = self.gfx.current_back_buffer()?;
            let barrier = Self::transition_barrier(
                &render_target,
                D3D12_RESOURCE_STATE_PRESENT,
                D3D12_RESOURCE_STATE_RENDER_TARGET,
            );
            self.command_list.ResourceBarrier(&[barrier]);

            let rtv_handle = self.gfx.current_back_buffer_rtv();
            let dsv_handle = self.dsv_heap.GetCPUDescriptorHandleForHeapStart();
            self.command_list
                .ClearRenderTargetView(rtv_handle, &CLEAR_COLOR, None);
            self.command_list.ClearDepthStencilView(
                dsv_handle,
                D3D12_CLEAR_FLAG_DEPTH,
                1.0,
                0,
                None,
            );
            self.command_list
                .OMSetRenderTargets(1, Some(&rtv_handle), false, Some(&dsv_handle));

            // 绑定每帧描述符缓存的着色器可见堆与根签名
            let cache_heap = match self
                .descriptor_cache
                .cbv_srv_uav_heap()
                .as_any()
                .downcast_ref::<Dx12DescriptorHeap>()
            {
                Some(heap) => heap.native().clone(),
                None => {
                    return Err(GraphicsError::CommandExecution(
                        "descriptor cache heap is not a D3D12 heap".to_string(),
                    )
                    .into())
                }
            };
            self.command_list.SetDescriptorHeaps(&[Some(cache_heap)]);

            let root_signature = match self
                .material
                .root_signature()
                .as_any()
                .downcast_ref::<Dx12RootSignature>()
            {
                Some(root_signature) => root_signature.native().clone(),
                None => {
                    return Err(GraphicsError::CommandExecution(
                        "root signature is not a D3D12 root signature".to_string(),
                    )
                    .into())
                }
            };
            self.command_list.SetGraphicsRootSignature(&root_signature);

            // 材质上传常量缓冲区并发出全部根绑定
            let mut recorder = Dx12CommandRecorder::new(&self.command_list);
            self.material
                .pass_parameters_to_shader(&mut recorder, &mut self.descriptor_cache)?;

            self.command_list
                .IASetPrimitiveTopology(D3D_PRIMITIVE_TOPOLOGY_TRIANGLELIST);
            self.command_list
                .IASetVertexBuffers(0, Some(&[self.vertex_buffer_view]));
            self.command_list
                .IASetIndexBuffer(Some(&self.index_buffer_view));
            self.command_list
                .DrawIndexedInstanced(self.index_count, 1, 0, 0, 0);

            let barrier_back = Self::transition_barrier(
                &render_target,
                D3D12_RESOURCE_STATE_RENDER_TARGET,
                D3D12_RESOURCE_STATE_PRESENT,
            );
            self.command_list.ResourceBarrier(&[barrier_back]);
            drop(render_target);

            self.command_list.Close().map_err(|e| {
                GraphicsError::CommandExecution(format!("Failed to close command list: {:?}", e))
            })?;
            self.gfx
                .command_queue
                .ExecuteCommandLists(&[Some(self.command_list.clone().into())]);

            let sync_interval = if self.vsync { 1 } else { 0 };
            self.gfx
                .swap_chain
                .Present(sync_interval, DXGI_PRESENT(0))
                .ok()
                .map_err(|e| {
                    GraphicsError::SwapchainError(format!("Failed to present: {:?}", e))
                })?;

            self.gfx.frame_index = self.gfx.swap_chain.GetCurrentBackBufferIndex() as usize;

            // 帧间完整同步，之后本帧资源可以安全复用
            self.gfx.flush_command_queue()?;

            trace!(frame_index = self.gfx.frame_index, "Frame presented");
        }
        Ok(())
    }

    /// 窗口大小变化时重建交换链与深度缓冲
    pub fn resize(&mut self, width: u32, height: u32) -> Result<()> {
        if width == 0 || height == 0 {
            return Ok(());
        }
        if width == self.gfx.width && height == self.gfx.height {
            return Ok(());
        }

        self.gfx.resize(width, height)?;
        self.depth_buffer =
            Self::create_depth_buffer(&self.gfx.device, &self.dsv_heap, width, height)?;

        self.viewport.Width = width as f32;
        self.viewport.Height = height as f32;
        self.scissor_rect.right = width as i32;
        self.scissor_rect.bottom = height as i32;

        self.camera.set_aspect(width as f32 / height as f32);
        self.camera.update_view_matrix();

        info!(width, height, "Renderer resized");
        Ok(())
    }

    /// 退出前等待 GPU 空闲
    pub fn wait_idle(&mut self) -> Result<()> {
        self.gfx.flush_command_queue()
    }

    /// 渲染窗口
    pub fn window(&self) -> &Window {
        self.gfx.window()
    }
}
