//! 后端设备抽象
//!
//! RHI 核心（描述符生命周期、反射驱动的绑定、材质编排）只依赖本模块
//! 定义的 trait，不直接接触任何图形 API。具体后端（DX12）在
//! `gfx::dx12` 中实现这些 trait。
//!
//! # 设计原则
//!
//! - **对象安全**：所有 trait 都以 `dyn` 方式使用，核心逻辑可以在
//!   没有 GPU 的环境下用模拟实现测试
//! - **数据模型自有**：根签名、视图、堆的描述结构由本 crate 定义，
//!   后端负责翻译为原生 API 结构
//! - **错误边界**：设备/驱动失败返回 `Err`，调用方的契约违反由
//!   上层以断言处理

use std::any::Any;
use std::path::Path;
use std::sync::Arc;

use crate::core::error::Result;
use super::descriptor::{CpuDescriptorHandle, GpuDescriptorHandle};

// ========== 描述符堆 ==========

/// 描述符堆类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HeapKind {
    /// CBV/SRV/UAV 共用堆
    CbvSrvUav,
    /// 渲染目标视图堆
    Rtv,
    /// 深度模板视图堆
    Dsv,
    /// 采样器堆
    Sampler,
}

impl HeapKind {
    /// 该类型的堆是否可以着色器可见
    pub fn is_shader_visible(&self) -> bool {
        matches!(self, HeapKind::CbvSrvUav | HeapKind::Sampler)
    }

    /// 获取堆类型名称
    pub fn name(&self) -> &'static str {
        match self {
            HeapKind::CbvSrvUav => "CBV/SRV/UAV",
            HeapKind::Rtv => "RTV",
            HeapKind::Dsv => "DSV",
            HeapKind::Sampler => "Sampler",
        }
    }
}

/// 描述符堆描述信息
#[derive(Debug, Clone)]
pub struct DescriptorHeapDesc {
    /// 堆类型
    pub kind: HeapKind,
    /// 描述符数量
    pub num_descriptors: u32,
    /// 是否着色器可见
    pub shader_visible: bool,
    /// 调试名称
    pub name: Option<String>,
}

impl DescriptorHeapDesc {
    /// 创建新的堆描述
    pub fn new(kind: HeapKind, num_descriptors: u32) -> Self {
        Self {
            kind,
            num_descriptors,
            shader_visible: false,
            name: None,
        }
    }

    /// 设置调试名称
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// 设置着色器可见性
    pub fn with_shader_visible(mut self, visible: bool) -> Self {
        assert!(
            !visible || self.kind.is_shader_visible(),
            "{} heaps cannot be shader visible",
            self.kind.name()
        );
        self.shader_visible = visible;
        self
    }

    /// 创建 RTV 堆描述
    pub fn rtv(num_descriptors: u32) -> Self {
        Self::new(HeapKind::Rtv, num_descriptors).with_name("RTV Heap")
    }

    /// 创建 DSV 堆描述
    pub fn dsv(num_descriptors: u32) -> Self {
        Self::new(HeapKind::Dsv, num_descriptors).with_name("DSV Heap")
    }

    /// 创建 CPU 侧 CBV/SRV/UAV 堆描述（持久分配器使用）
    pub fn cbv_srv_uav(num_descriptors: u32) -> Self {
        Self::new(HeapKind::CbvSrvUav, num_descriptors).with_name("CBV/SRV/UAV Heap")
    }

    /// 创建着色器可见的 CBV/SRV/UAV 堆描述（每帧缓存使用）
    pub fn cbv_srv_uav_shader_visible(num_descriptors: u32) -> Self {
        Self::new(HeapKind::CbvSrvUav, num_descriptors)
            .with_shader_visible(true)
            .with_name("Shader-Visible CBV/SRV/UAV Heap")
    }
}

/// 描述符堆
///
/// 一块连续的描述符存储。句柄通过基地址加增量计算。
pub trait DescriptorHeap: Send + Sync {
    /// 向下转型入口（后端取回原生堆时使用）
    fn as_any(&self) -> &dyn Any;

    /// 堆类型
    fn kind(&self) -> HeapKind;

    /// 容量（描述符个数）
    fn capacity(&self) -> u32;

    /// 单个描述符的增量大小
    fn increment_size(&self) -> u32;

    /// CPU 侧起始句柄
    fn cpu_start(&self) -> CpuDescriptorHandle;

    /// GPU 侧起始句柄（仅着色器可见的堆）
    fn gpu_start(&self) -> Option<GpuDescriptorHandle>;
}

// ========== 资源与视图 ==========

/// 纹理/视图格式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextureFormat {
    Rgba8Unorm,
    Bgra8Unorm,
    D24UnormS8Uint,
    R32Float,
    Unknown,
}

/// 视图描述
///
/// 四种视图形状的和类型。后端将其翻译为原生的视图描述结构。
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ViewDescription {
    /// 着色资源视图（2D 纹理）
    ShaderResource {
        format: TextureFormat,
        most_detailed_mip: u32,
        mip_levels: u32,
    },
    /// 渲染目标视图
    RenderTarget {
        format: TextureFormat,
        mip_slice: u32,
    },
    /// 深度模板视图
    DepthStencil {
        format: TextureFormat,
        mip_slice: u32,
    },
    /// 无序访问视图（2D 纹理）
    UnorderedAccess {
        format: TextureFormat,
        mip_slice: u32,
    },
}

/// GPU 资源（纹理、缓冲区）
///
/// 对核心层不透明，后端通过 `as_any` 取回原生资源。
pub trait GpuResource: Send + Sync {
    /// 向下转型入口
    fn as_any(&self) -> &dyn Any;

    /// 调试名称
    fn name(&self) -> &str;
}

/// 常量缓冲区
///
/// 上传堆上的一块持久映射内存。
pub trait ConstantBuffer: Send + Sync {
    /// 把字节写入缓冲区起始处
    fn copy_data(&self, data: &[u8]) -> Result<()>;

    /// GPU 虚拟地址（绑定根 CBV 时使用）
    fn gpu_virtual_address(&self) -> u64;

    /// 缓冲区大小（已对齐）
    fn size(&self) -> usize;
}

// ========== 根签名 ==========

/// 着色器可见性
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShaderVisibility {
    All,
    Vertex,
    Pixel,
}

/// 描述符表范围类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeKind {
    Srv,
    Uav,
    Cbv,
    Sampler,
}

/// 描述符表中的一段连续范围
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DescriptorRangeDesc {
    pub kind: RangeKind,
    pub num_descriptors: u32,
    pub base_shader_register: u32,
    pub register_space: u32,
}

/// 根参数描述
#[derive(Debug, Clone, PartialEq)]
pub enum RootParameterDesc {
    /// 根描述符 CBV（直接 GPU 虚拟地址）
    Cbv {
        shader_register: u32,
        register_space: u32,
        visibility: ShaderVisibility,
    },
    /// 描述符表
    DescriptorTable {
        ranges: Vec<DescriptorRangeDesc>,
        visibility: ShaderVisibility,
    },
}

/// 静态采样器的过滤方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SamplerFilter {
    Point,
    Linear,
    Anisotropic,
}

/// 静态采样器的寻址模式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SamplerAddressMode {
    Wrap,
    Clamp,
}

/// 静态采样器描述
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StaticSamplerDesc {
    pub shader_register: u32,
    pub filter: SamplerFilter,
    pub address_mode: SamplerAddressMode,
}

impl StaticSamplerDesc {
    /// 标准的六个静态采样器：point/linear/anisotropic × wrap/clamp，
    /// 依次占用 s0..s5
    pub fn standard_set() -> Vec<StaticSamplerDesc> {
        vec![
            StaticSamplerDesc {
                shader_register: 0,
                filter: SamplerFilter::Point,
                address_mode: SamplerAddressMode::Wrap,
            },
            StaticSamplerDesc {
                shader_register: 1,
                filter: SamplerFilter::Point,
                address_mode: SamplerAddressMode::Clamp,
            },
            StaticSamplerDesc {
                shader_register: 2,
                filter: SamplerFilter::Linear,
                address_mode: SamplerAddressMode::Wrap,
            },
            StaticSamplerDesc {
                shader_register: 3,
                filter: SamplerFilter::Linear,
                address_mode: SamplerAddressMode::Clamp,
            },
            StaticSamplerDesc {
                shader_register: 4,
                filter: SamplerFilter::Anisotropic,
                address_mode: SamplerAddressMode::Wrap,
            },
            StaticSamplerDesc {
                shader_register: 5,
                filter: SamplerFilter::Anisotropic,
                address_mode: SamplerAddressMode::Clamp,
            },
        ]
    }
}

/// 根签名描述
#[derive(Debug, Clone, PartialEq)]
pub struct RootSignatureDesc {
    pub parameters: Vec<RootParameterDesc>,
    pub static_samplers: Vec<StaticSamplerDesc>,
}

/// 根签名
///
/// 对核心层不透明。
pub trait RootSignature: Send + Sync {
    fn as_any(&self) -> &dyn Any;
}

// ========== 着色器编译 ==========

/// 着色器阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    Vertex,
    Pixel,
    Compute,
}

impl ShaderStage {
    /// 编译目标 profile
    pub fn target_profile(&self) -> &'static str {
        match self {
            ShaderStage::Vertex => "vs_5_0",
            ShaderStage::Pixel => "ps_5_0",
            ShaderStage::Compute => "cs_5_0",
        }
    }

    /// 阶段名称
    pub fn name(&self) -> &'static str {
        match self {
            ShaderStage::Vertex => "VS",
            ShaderStage::Pixel => "PS",
            ShaderStage::Compute => "CS",
        }
    }
}

/// 常量缓冲区内单个变量的布局
#[derive(Debug, Clone, PartialEq)]
pub struct VariableLayout {
    /// 变量名
    pub name: String,
    /// 距缓冲区起始的字节偏移
    pub offset: u32,
    /// 字节大小
    pub size: u32,
    /// HLSL 类型名（如 "float4x4"）
    pub type_name: String,
}

/// 常量缓冲区的反射布局
#[derive(Debug, Clone, PartialEq)]
pub struct ConstantBufferLayout {
    /// 缓冲区总大小（字节）
    pub size: u32,
    /// 成员变量
    pub variables: Vec<VariableLayout>,
}

/// 反射得到的绑定资源类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundResourceKind {
    /// cbuffer（映射为根 CBV）
    ConstantBuffer,
    /// 纹理（映射为 SRV）
    Texture,
    /// 结构化缓冲区（映射为 SRV）
    StructuredBuffer,
    /// 可读写资源（映射为 UAV，仅计算阶段）
    ReadWrite,
    /// 采样器（仅像素阶段，由静态采样器覆盖，不进入根签名）
    Sampler,
    /// 无法分类的资源
    Unknown,
}

/// 反射得到的单个绑定资源
#[derive(Debug, Clone, PartialEq)]
pub struct BoundResourceDesc {
    /// 着色器中的名称
    pub name: String,
    /// 资源类型
    pub kind: BoundResourceKind,
    /// 绑定寄存器起点
    pub bind_point: u32,
    /// 数组长度（非数组为 1）
    pub bind_count: u32,
    /// 寄存器空间
    pub register_space: u32,
    /// cbuffer 的成员布局（仅 `ConstantBuffer` 有）
    pub buffer_layout: Option<ConstantBufferLayout>,
}

/// 单个阶段的编译结果
#[derive(Debug, Clone)]
pub struct CompiledStage {
    /// 字节码
    pub bytecode: Vec<u8>,
    /// 反射出的绑定资源
    pub bound_resources: Vec<BoundResourceDesc>,
}

/// 着色器编译器
///
/// 编译一个阶段并反射其绑定资源。DX12 后端用
/// `D3DCompile` + `D3DReflect` 实现；测试用模拟实现。
pub trait ShaderCompiler {
    /// 编译并反射一个着色器阶段
    fn compile(
        &self,
        file: &Path,
        entry_point: &str,
        stage: ShaderStage,
        defines: &[(String, String)],
    ) -> Result<CompiledStage>;
}

// ========== 命令录制 ==========

/// 命令录制器
///
/// `Shader::bind_parameters` 通过它发出根绑定命令。
pub trait CommandRecorder {
    /// 绑定图形管线的根 CBV
    fn set_graphics_root_constant_buffer(&mut self, slot: u32, gpu_virtual_address: u64);

    /// 绑定计算管线的根 CBV
    fn set_compute_root_constant_buffer(&mut self, slot: u32, gpu_virtual_address: u64);

    /// 绑定图形管线的描述符表
    fn set_graphics_root_descriptor_table(&mut self, slot: u32, handle: GpuDescriptorHandle);

    /// 绑定计算管线的描述符表
    fn set_compute_root_descriptor_table(&mut self, slot: u32, handle: GpuDescriptorHandle);
}

// ========== 设备 ==========

/// 渲染设备
///
/// 核心层创建堆、视图、缓冲区和根签名的唯一入口。
pub trait RenderDevice: Send + Sync {
    /// 创建描述符堆
    fn create_descriptor_heap(&self, desc: &DescriptorHeapDesc) -> Result<Box<dyn DescriptorHeap>>;

    /// 把一组分散的 CPU 描述符拷贝到连续的目标区域
    fn copy_descriptors(
        &self,
        kind: HeapKind,
        dst: CpuDescriptorHandle,
        src: &[CpuDescriptorHandle],
    );

    /// 在目标句柄处写入资源视图
    fn create_view(
        &self,
        desc: &ViewDescription,
        resource: &dyn GpuResource,
        dst: CpuDescriptorHandle,
    ) -> Result<()>;

    /// 创建常量缓冲区（上传堆，256 字节对齐）
    fn create_constant_buffer(&self, size: usize, name: &str) -> Result<Arc<dyn ConstantBuffer>>;

    /// 从描述创建根签名
    fn create_root_signature(&self, desc: &RootSignatureDesc) -> Result<Arc<dyn RootSignature>>;
}
