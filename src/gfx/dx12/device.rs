//! `crate::rhi` 设备抽象的 D3D12 实现
//!
//! 把 RHI 的堆/视图/缓冲区/根签名描述翻译为原生 D3D12 调用。
//! 所有包装类型都持有对应的 COM 接口，核心层通过 `as_any`
//! 在需要时取回原生对象。

use std::any::Any;
use std::sync::Arc;
use tracing::debug;
use windows::{
    core::HSTRING, Win32::Graphics::Direct3D12::*, Win32::Graphics::Dxgi::Common::*,
};

use crate::core::error::{GraphicsError, Result};
use crate::rhi::descriptor::{CpuDescriptorHandle, GpuDescriptorHandle};
use crate::rhi::device::{
    ConstantBuffer, DescriptorHeap, DescriptorHeapDesc, GpuResource, HeapKind, RangeKind,
    RenderDevice, RootParameterDesc, RootSignature, RootSignatureDesc, SamplerAddressMode,
    SamplerFilter, ShaderVisibility, TextureFormat, ViewDescription,
};

// ========== 类型翻译 ==========

fn native_heap_type(kind: HeapKind) -> D3D12_DESCRIPTOR_HEAP_TYPE {
    match kind {
        HeapKind::CbvSrvUav => D3D12_DESCRIPTOR_HEAP_TYPE_CBV_SRV_UAV,
        HeapKind::Rtv => D3D12_DESCRIPTOR_HEAP_TYPE_RTV,
        HeapKind::Dsv => D3D12_DESCRIPTOR_HEAP_TYPE_DSV,
        HeapKind::Sampler => D3D12_DESCRIPTOR_HEAP_TYPE_SAMPLER,
    }
}

fn native_format(format: TextureFormat) -> DXGI_FORMAT {
    match format {
        TextureFormat::Rgba8Unorm => DXGI_FORMAT_R8G8B8A8_UNORM,
        TextureFormat::Bgra8Unorm => DXGI_FORMAT_B8G8R8A8_UNORM,
        TextureFormat::D24UnormS8Uint => DXGI_FORMAT_D24_UNORM_S8_UINT,
        TextureFormat::R32Float => DXGI_FORMAT_R32_FLOAT,
        TextureFormat::Unknown => DXGI_FORMAT_UNKNOWN,
    }
}

fn native_visibility(visibility: ShaderVisibility) -> D3D12_SHADER_VISIBILITY {
    match visibility {
        ShaderVisibility::All => D3D12_SHADER_VISIBILITY_ALL,
        ShaderVisibility::Vertex => D3D12_SHADER_VISIBILITY_VERTEX,
        ShaderVisibility::Pixel => D3D12_SHADER_VISIBILITY_PIXEL,
    }
}

fn native_range_type(kind: RangeKind) -> D3D12_DESCRIPTOR_RANGE_TYPE {
    match kind {
        RangeKind::Srv => D3D12_DESCRIPTOR_RANGE_TYPE_SRV,
        RangeKind::Uav => D3D12_DESCRIPTOR_RANGE_TYPE_UAV,
        RangeKind::Cbv => D3D12_DESCRIPTOR_RANGE_TYPE_CBV,
        RangeKind::Sampler => D3D12_DESCRIPTOR_RANGE_TYPE_SAMPLER,
    }
}

fn native_filter(filter: SamplerFilter) -> D3D12_FILTER {
    match filter {
        SamplerFilter::Point => D3D12_FILTER_MIN_MAG_MIP_POINT,
        SamplerFilter::Linear => D3D12_FILTER_MIN_MAG_MIP_LINEAR,
        SamplerFilter::Anisotropic => D3D12_FILTER_ANISOTROPIC,
    }
}

fn native_address_mode(mode: SamplerAddressMode) -> D3D12_TEXTURE_ADDRESS_MODE {
    match mode {
        SamplerAddressMode::Wrap => D3D12_TEXTURE_ADDRESS_MODE_WRAP,
        SamplerAddressMode::Clamp => D3D12_TEXTURE_ADDRESS_MODE_CLAMP,
    }
}

// ========== 描述符堆 ==========

/// D3D12 描述符堆包装
pub struct Dx12DescriptorHeap {
    heap: ID3D12DescriptorHeap,
    kind: HeapKind,
    capacity: u32,
    increment: u32,
    cpu_base: usize,
    gpu_base: Option<u64>,
}

unsafe impl Send for Dx12DescriptorHeap {}
unsafe impl Sync for Dx12DescriptorHeap {}

impl Dx12DescriptorHeap {
    /// 原生堆接口
    pub fn native(&self) -> &ID3D12DescriptorHeap {
        &self.heap
    }
}

impl DescriptorHeap for Dx12DescriptorHeap {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn kind(&self) -> HeapKind {
        self.kind
    }

    fn capacity(&self) -> u32 {
        self.capacity
    }

    fn increment_size(&self) -> u32 {
        self.increment
    }

    fn cpu_start(&self) -> CpuDescriptorHandle {
        CpuDescriptorHandle::new(self.cpu_base, 0)
    }

    fn gpu_start(&self) -> Option<GpuDescriptorHandle> {
        self.gpu_base.map(|ptr| GpuDescriptorHandle::new(ptr, 0))
    }
}

// ========== GPU 资源 ==========

/// D3D12 资源包装（纹理、缓冲区）
pub struct Dx12Resource {
    resource: ID3D12Resource,
    name: String,
}

unsafe impl Send for Dx12Resource {}
unsafe impl Sync for Dx12Resource {}

impl Dx12Resource {
    pub fn new(resource: ID3D12Resource, name: impl Into<String>) -> Self {
        let name = name.into();
        unsafe {
            let _ = resource.SetName(&HSTRING::from(name.as_str()));
        }
        Self { resource, name }
    }

    /// 原生资源接口
    pub fn native(&self) -> &ID3D12Resource {
        &self.resource
    }
}

impl GpuResource for Dx12Resource {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn name(&self) -> &str {
        &self.name
    }
}

// ========== 常量缓冲区 ==========

/// 上传堆上的常量缓冲区，持久映射
pub struct Dx12ConstantBuffer {
    resource: ID3D12Resource,
    mapped: *mut u8,
    gpu_virtual_address: u64,
    size: usize,
}

unsafe impl Send for Dx12ConstantBuffer {}
unsafe impl Sync for Dx12ConstantBuffer {}

impl ConstantBuffer for Dx12ConstantBuffer {
    fn copy_data(&self, data: &[u8]) -> Result<()> {
        if data.len() > self.size {
            return Err(GraphicsError::CommandExecution(format!(
                "constant buffer write of {} bytes exceeds capacity {}",
                data.len(),
                self.size
            ))
            .into());
        }
        unsafe {
            std::ptr::copy_nonoverlapping(data.as_ptr(), self.mapped, data.len());
        }
        Ok(())
    }

    fn gpu_virtual_address(&self) -> u64 {
        self.gpu_virtual_address
    }

    fn size(&self) -> usize {
        self.size
    }
}

impl Drop for Dx12ConstantBuffer {
    fn drop(&mut self) {
        unsafe {
            self.resource.Unmap(0, None);
        }
    }
}

// ========== 根签名 ==========

/// D3D12 根签名包装
pub struct Dx12RootSignature {
    root_signature: ID3D12RootSignature,
}

unsafe impl Send for Dx12RootSignature {}
unsafe impl Sync for Dx12RootSignature {}

impl Dx12RootSignature {
    /// 原生根签名接口
    pub fn native(&self) -> &ID3D12RootSignature {
        &self.root_signature
    }
}

impl RootSignature for Dx12RootSignature {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

// ========== 命令录制 ==========

/// 命令列表上的根绑定录制器
pub struct Dx12CommandRecorder<'a> {
    list: &'a ID3D12GraphicsCommandList,
}

impl<'a> Dx12CommandRecorder<'a> {
    pub fn new(list: &'a ID3D12GraphicsCommandList) -> Self {
        Self { list }
    }
}

impl crate::rhi::device::CommandRecorder for Dx12CommandRecorder<'_> {
    fn set_graphics_root_constant_buffer(&mut self, slot: u32, gpu_virtual_address: u64) {
        unsafe {
            self.list
                .SetGraphicsRootConstantBufferView(slot, gpu_virtual_address);
        }
    }

    fn set_compute_root_constant_buffer(&mut self, slot: u32, gpu_virtual_address: u64) {
        unsafe {
            self.list
                .SetComputeRootConstantBufferView(slot, gpu_virtual_address);
        }
    }

    fn set_graphics_root_descriptor_table(&mut self, slot: u32, handle: GpuDescriptorHandle) {
        unsafe {
            self.list.SetGraphicsRootDescriptorTable(
                slot,
                D3D12_GPU_DESCRIPTOR_HANDLE { ptr: handle.ptr },
            );
        }
    }

    fn set_compute_root_descriptor_table(&mut self, slot: u32, handle: GpuDescriptorHandle) {
        unsafe {
            self.list.SetComputeRootDescriptorTable(
                slot,
                D3D12_GPU_DESCRIPTOR_HANDLE { ptr: handle.ptr },
            );
        }
    }
}

// ========== 设备 ==========

/// `RenderDevice` 的 D3D12 实现
pub struct Dx12Device {
    device: ID3D12Device,
}

unsafe impl Send for Dx12Device {}
unsafe impl Sync for Dx12Device {}

impl Dx12Device {
    pub fn new(device: ID3D12Device) -> Self {
        Self { device }
    }

    /// 原生设备接口
    pub fn native(&self) -> &ID3D12Device {
        &self.device
    }

    /// 取回 `GpuResource` 背后的原生资源
    fn native_resource<'a>(&self, resource: &'a dyn GpuResource) -> Result<&'a ID3D12Resource> {
        match resource.as_any().downcast_ref::<Dx12Resource>() {
            Some(dx12) => Ok(dx12.native()),
            None => Err(GraphicsError::ResourceCreation(format!(
                "resource '{}' is not a D3D12 resource",
                resource.name()
            ))
            .into()),
        }
    }
}

impl RenderDevice for Dx12Device {
    fn create_descriptor_heap(&self, desc: &DescriptorHeapDesc) -> Result<Box<dyn DescriptorHeap>> {
        let flags = if desc.shader_visible {
            D3D12_DESCRIPTOR_HEAP_FLAG_SHADER_VISIBLE
        } else {
            D3D12_DESCRIPTOR_HEAP_FLAG_NONE
        };
        let heap_desc = D3D12_DESCRIPTOR_HEAP_DESC {
            Type: native_heap_type(desc.kind),
            NumDescriptors: desc.num_descriptors,
            Flags: flags,
            NodeMask: 0,
        };

        unsafe {
            let heap: ID3D12DescriptorHeap =
                self.device.CreateDescriptorHeap(&heap_desc).map_err(|e| {
                    GraphicsError::ResourceCreation(format!(
                        "Failed to create descriptor heap: {:?}",
                        e
                    ))
                })?;
            if let Some(name) = &desc.name {
                let _ = heap.SetName(&HSTRING::from(name.as_str()));
            }

            let increment = self
                .device
                .GetDescriptorHandleIncrementSize(native_heap_type(desc.kind));
            let cpu_base = heap.GetCPUDescriptorHandleForHeapStart().ptr;
            let gpu_base = if desc.shader_visible {
                Some(heap.GetGPUDescriptorHandleForHeapStart().ptr)
            } else {
                None
            };

            debug!(
                kind = desc.kind.name(),
                capacity = desc.num_descriptors,
                shader_visible = desc.shader_visible,
                "Descriptor heap created"
            );

            Ok(Box::new(Dx12DescriptorHeap {
                heap,
                kind: desc.kind,
                capacity: desc.num_descriptors,
                increment,
                cpu_base,
                gpu_base,
            }))
        }
    }

    fn copy_descriptors(
        &self,
        kind: HeapKind,
        dst: CpuDescriptorHandle,
        src: &[CpuDescriptorHandle],
    ) {
        let heap_type = native_heap_type(kind);
        unsafe {
            let increment = self.device.GetDescriptorHandleIncrementSize(heap_type) as usize;
            for (i, handle) in src.iter().enumerate() {
                self.device.CopyDescriptorsSimple(
                    1,
                    D3D12_CPU_DESCRIPTOR_HANDLE {
                        ptr: dst.ptr + i * increment,
                    },
                    D3D12_CPU_DESCRIPTOR_HANDLE { ptr: handle.ptr },
                    heap_type,
                );
            }
        }
    }

    fn create_view(
        &self,
        desc: &ViewDescription,
        resource: &dyn GpuResource,
        dst: CpuDescriptorHandle,
    ) -> Result<()> {
        let native = self.native_resource(resource)?;
        let dst = D3D12_CPU_DESCRIPTOR_HANDLE { ptr: dst.ptr };

        unsafe {
            match *desc {
                ViewDescription::ShaderResource {
                    format,
                    most_detailed_mip,
                    mip_levels,
                } => {
                    let srv_desc = D3D12_SHADER_RESOURCE_VIEW_DESC {
                        Format: native_format(format),
                        ViewDimension: D3D12_SRV_DIMENSION_TEXTURE2D,
                        Shader4ComponentMapping: D3D12_DEFAULT_SHADER_4_COMPONENT_MAPPING,
                        Anonymous: D3D12_SHADER_RESOURCE_VIEW_DESC_0 {
                            Texture2D: D3D12_TEX2D_SRV {
                                MostDetailedMip: most_detailed_mip,
                                MipLevels: mip_levels,
                                PlaneSlice: 0,
                                ResourceMinLODClamp: 0.0,
                            },
                        },
                    };
                    self.device
                        .CreateShaderResourceView(native, Some(&srv_desc), dst);
                }
                ViewDescription::RenderTarget { format, mip_slice } => {
                    let rtv_desc = D3D12_RENDER_TARGET_VIEW_DESC {
                        Format: native_format(format),
                        ViewDimension: D3D12_RTV_DIMENSION_TEXTURE2D,
                        Anonymous: D3D12_RENDER_TARGET_VIEW_DESC_0 {
                            Texture2D: D3D12_TEX2D_RTV {
                                MipSlice: mip_slice,
                                PlaneSlice: 0,
                            },
                        },
                    };
                    self.device
                        .CreateRenderTargetView(native, Some(&rtv_desc), dst);
                }
                ViewDescription::DepthStencil { format, mip_slice } => {
                    let dsv_desc = D3D12_DEPTH_STENCIL_VIEW_DESC {
                        Format: native_format(format),
                        ViewDimension: D3D12_DSV_DIMENSION_TEXTURE2D,
                        Flags: D3D12_DSV_FLAG_NONE,
                        Anonymous: D3D12_DEPTH_STENCIL_VIEW_DESC_0 {
                            Texture2D: D3D12_TEX2D_DSV {
                                MipSlice: mip_slice,
                            },
                        },
                    };
                    self.device
                        .CreateDepthStencilView(native, Some(&dsv_desc), dst);
                }
                ViewDescription::UnorderedAccess { format, mip_slice } => {
                    let uav_desc = D3D12_UNORDERED_ACCESS_VIEW_DESC {
                        Format: native_format(format),
                        ViewDimension: D3D12_UAV_DIMENSION_TEXTURE2D,
                        Anonymous: D3D12_UNORDERED_ACCESS_VIEW_DESC_0 {
                            Texture2D: D3D12_TEX2D_UAV {
                                MipSlice: mip_slice,
                                PlaneSlice: 0,
                            },
                        },
                    };
                    self.device.CreateUnorderedAccessView(
                        native,
                        None::<&ID3D12Resource>,
                        Some(&uav_desc),
                        dst,
                    );
                }
            }
        }
        Ok(())
    }

    fn create_constant_buffer(&self, size: usize, name: &str) -> Result<Arc<dyn ConstantBuffer>> {
        // 常量缓冲区大小按 256 字节对齐
        let aligned_size =
            (size + D3D12_CONSTANT_BUFFER_DATA_PLACEMENT_ALIGNMENT as usize - 1)
                & !(D3D12_CONSTANT_BUFFER_DATA_PLACEMENT_ALIGNMENT as usize - 1);

        let heap_props = D3D12_HEAP_PROPERTIES {
            Type: D3D12_HEAP_TYPE_UPLOAD,
            ..Default::default()
        };
        let resource_desc = D3D12_RESOURCE_DESC {
            Dimension: D3D12_RESOURCE_DIMENSION_BUFFER,
            Width: aligned_size as u64,
            Height: 1,
            DepthOrArraySize: 1,
            MipLevels: 1,
            SampleDesc: DXGI_SAMPLE_DESC {
                Count: 1,
                Quality: 0,
            },
            Layout: D3D12_TEXTURE_LAYOUT_ROW_MAJOR,
            ..Default::default()
        };

        unsafe {
            let mut resource: Option<ID3D12Resource> = None;
            self.device
                .CreateCommittedResource(
                    &heap_props,
                    D3D12_HEAP_FLAG_NONE,
                    &resource_desc,
                    D3D12_RESOURCE_STATE_GENERIC_READ,
                    None,
                    &mut resource,
                )
                .map_err(|e| {
                    GraphicsError::ResourceCreation(format!(
                        "Failed to create constant buffer '{}': {:?}",
                        name, e
                    ))
                })?;
            let resource = match resource {
                Some(resource) => resource,
                None => {
                    return Err(GraphicsError::ResourceCreation(format!(
                        "constant buffer '{}' creation returned no resource",
                        name
                    ))
                    .into())
                }
            };
            let _ = resource.SetName(&HSTRING::from(name));

            // 持久映射，缓冲区存活期间一直可写
            let mut mapped = std::ptr::null_mut();
            resource.Map(0, None, Some(&mut mapped)).map_err(|e| {
                GraphicsError::ResourceCreation(format!(
                    "Failed to map constant buffer '{}': {:?}",
                    name, e
                ))
            })?;

            let gpu_virtual_address = resource.GetGPUVirtualAddress();

            debug!(name, size = aligned_size, "Constant buffer created");

            Ok(Arc::new(Dx12ConstantBuffer {
                resource,
                mapped: mapped as *mut u8,
                gpu_virtual_address,
                size: aligned_size,
            }))
        }
    }

    fn create_root_signature(&self, desc: &RootSignatureDesc) -> Result<Arc<dyn RootSignature>> {
        // 描述符表的 range 数组必须活到序列化完成
        let range_storage: Vec<Vec<D3D12_DESCRIPTOR_RANGE>> = desc
            .parameters
            .iter()
            .map(|param| match param {
                RootParameterDesc::DescriptorTable { ranges, .. } => ranges
                    .iter()
                    .map(|range| D3D12_DESCRIPTOR_RANGE {
                        RangeType: native_range_type(range.kind),
                        NumDescriptors: range.num_descriptors,
                        BaseShaderRegister: range.base_shader_register,
                        RegisterSpace: range.register_space,
                        OffsetInDescriptorsFromTableStart: D3D12_DESCRIPTOR_RANGE_OFFSET_APPEND,
                    })
                    .collect(),
                RootParameterDesc::Cbv { .. } => Vec::new(),
            })
            .collect();

        let parameters: Vec<D3D12_ROOT_PARAMETER> = desc
            .parameters
            .iter()
            .zip(range_storage.iter())
            .map(|(param, ranges)| match param {
                RootParameterDesc::Cbv {
                    shader_register,
                    register_space,
                    visibility,
                } => D3D12_ROOT_PARAMETER {
                    ParameterType: D3D12_ROOT_PARAMETER_TYPE_CBV,
                    Anonymous: D3D12_ROOT_PARAMETER_0 {
                        Descriptor: D3D12_ROOT_DESCRIPTOR {
                            ShaderRegister: *shader_register,
                            RegisterSpace: *register_space,
                        },
                    },
                    ShaderVisibility: native_visibility(*visibility),
                },
                RootParameterDesc::DescriptorTable { visibility, .. } => D3D12_ROOT_PARAMETER {
                    ParameterType: D3D12_ROOT_PARAMETER_TYPE_DESCRIPTOR_TABLE,
                    Anonymous: D3D12_ROOT_PARAMETER_0 {
                        DescriptorTable: D3D12_ROOT_DESCRIPTOR_TABLE {
                            NumDescriptorRanges: ranges.len() as u32,
                            pDescriptorRanges: ranges.as_ptr(),
                        },
                    },
                    ShaderVisibility: native_visibility(*visibility),
                },
            })
            .collect();

        let static_samplers: Vec<D3D12_STATIC_SAMPLER_DESC> = desc
            .static_samplers
            .iter()
            .map(|sampler| D3D12_STATIC_SAMPLER_DESC {
                Filter: native_filter(sampler.filter),
                AddressU: native_address_mode(sampler.address_mode),
                AddressV: native_address_mode(sampler.address_mode),
                AddressW: native_address_mode(sampler.address_mode),
                MipLODBias: 0.0,
                MaxAnisotropy: 8,
                MinLOD: 0.0,
                MaxLOD: D3D12_FLOAT32_MAX,
                ShaderRegister: sampler.shader_register,
                RegisterSpace: 0,
                ShaderVisibility: D3D12_SHADER_VISIBILITY_ALL,
                ..Default::default()
            })
            .collect();

        let root_desc = D3D12_ROOT_SIGNATURE_DESC {
            NumParameters: parameters.len() as u32,
            pParameters: if parameters.is_empty() {
                std::ptr::null()
            } else {
                parameters.as_ptr()
            },
            NumStaticSamplers: static_samplers.len() as u32,
            pStaticSamplers: if static_samplers.is_empty() {
                std::ptr::null()
            } else {
                static_samplers.as_ptr()
            },
            Flags: D3D12_ROOT_SIGNATURE_FLAG_ALLOW_INPUT_ASSEMBLER_INPUT_LAYOUT,
        };

        unsafe {
            let mut blob = None;
            let mut error_blob = None;
            let serialize_result = D3D12SerializeRootSignature(
                &root_desc,
                D3D_ROOT_SIGNATURE_VERSION_1,
                &mut blob,
                Some(&mut error_blob),
            );
            if let Err(e) = serialize_result {
                let detail = error_blob
                    .map(|error| {
                        String::from_utf8_lossy(std::slice::from_raw_parts(
                            error.GetBufferPointer() as *const u8,
                            error.GetBufferSize(),
                        ))
                        .to_string()
                    })
                    .unwrap_or_else(|| format!("{:?}", e));
                return Err(GraphicsError::RootSignatureCreation(detail).into());
            }
            let blob = match blob {
                Some(blob) => blob,
                None => {
                    return Err(GraphicsError::RootSignatureCreation(
                        "serialization returned no blob".to_string(),
                    )
                    .into())
                }
            };

            let root_signature: ID3D12RootSignature = self
                .device
                .CreateRootSignature(
                    0,
                    std::slice::from_raw_parts(
                        blob.GetBufferPointer() as *const u8,
                        blob.GetBufferSize(),
                    ),
                )
                .map_err(|e| {
                    GraphicsError::RootSignatureCreation(format!(
                        "Failed to create root signature: {:?}",
                        e
                    ))
                })?;

            debug!(
                parameters = desc.parameters.len(),
                static_samplers = desc.static_samplers.len(),
                "Root signature created"
            );

            Ok(Arc::new(Dx12RootSignature { root_signature }))
        }
    }
}
