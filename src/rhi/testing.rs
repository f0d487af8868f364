//! RHI 核心的模拟后端（仅测试）
//!
//! 提供 `RenderDevice`、`ShaderCompiler`、`CommandRecorder` 的内存
//! 实现，让描述符、着色器和材质逻辑可以在没有 GPU 的环境下验证。
//! 所有调用都被记录下来供断言检查。

use std::any::Any;
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::core::error::{GraphicsError, Result};
use super::descriptor::{CpuDescriptorHandle, GpuDescriptorHandle};
use super::device::{
    BoundResourceDesc, CommandRecorder, CompiledStage, ConstantBuffer, DescriptorHeap,
    DescriptorHeapDesc, GpuResource, HeapKind, RenderDevice, RootSignature, RootSignatureDesc,
    ShaderCompiler, ShaderStage, TextureFormat, ViewDescription,
};

/// 固定的描述符增量大小
pub const MOCK_INCREMENT: u32 = 32;

/// 模拟描述符堆
pub struct MockHeap {
    kind: HeapKind,
    capacity: u32,
    cpu_base: usize,
    gpu_base: Option<u64>,
}

impl DescriptorHeap for MockHeap {
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
        MOCK_INCREMENT
    }

    fn cpu_start(&self) -> CpuDescriptorHandle {
        CpuDescriptorHandle::new(self.cpu_base, 0)
    }

    fn gpu_start(&self) -> Option<GpuDescriptorHandle> {
        self.gpu_base.map(|p| GpuDescriptorHandle::new(p, 0))
    }
}

/// 模拟常量缓冲区
pub struct MockConstantBuffer {
    pub data: Mutex<Vec<u8>>,
    gpu_virtual_address: u64,
    size: usize,
}

impl ConstantBuffer for MockConstantBuffer {
    fn copy_data(&self, data: &[u8]) -> Result<()> {
        let mut stored = self.data.lock().unwrap();
        assert!(data.len() <= self.size, "constant buffer write out of bounds");
        stored.clear();
        stored.extend_from_slice(data);
        Ok(())
    }

    fn gpu_virtual_address(&self) -> u64 {
        self.gpu_virtual_address
    }

    fn size(&self) -> usize {
        self.size
    }
}

/// 模拟根签名，持有创建时的描述供测试检查
pub struct MockRootSignature {
    pub desc: RootSignatureDesc,
}

impl RootSignature for MockRootSignature {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// 模拟 GPU 资源
pub struct MockResource {
    pub name: String,
}

impl MockResource {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl GpuResource for MockResource {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// 一次描述符拷贝的记录
#[derive(Debug, Clone)]
pub struct CopyRecord {
    pub kind: HeapKind,
    pub dst: CpuDescriptorHandle,
    pub src: Vec<CpuDescriptorHandle>,
}

/// 一次视图写入的记录
#[derive(Debug, Clone)]
pub struct ViewRecord {
    pub desc: ViewDescription,
    pub resource_name: String,
    pub dst: CpuDescriptorHandle,
}

/// 模拟渲染设备
pub struct MockDevice {
    next_cpu_base: AtomicUsize,
    next_gpu_base: AtomicU64,
    next_buffer_address: AtomicU64,
    pub copies: Mutex<Vec<CopyRecord>>,
    pub views: Mutex<Vec<ViewRecord>>,
    pub root_signatures: Mutex<Vec<RootSignatureDesc>>,
    pub buffers: Mutex<Vec<Arc<MockConstantBuffer>>>,
    /// 设为 true 让堆创建失败（用于错误传播测试）
    pub fail_heap_creation: Mutex<bool>,
}

impl MockDevice {
    pub fn new() -> Self {
        Self {
            next_cpu_base: AtomicUsize::new(0x1000),
            next_gpu_base: AtomicU64::new(0x10_0000),
            next_buffer_address: AtomicU64::new(0x100_0000),
            copies: Mutex::new(Vec::new()),
            views: Mutex::new(Vec::new()),
            root_signatures: Mutex::new(Vec::new()),
            buffers: Mutex::new(Vec::new()),
            fail_heap_creation: Mutex::new(false),
        }
    }

    /// 最近一次创建的根签名描述
    pub fn last_root_signature(&self) -> Option<RootSignatureDesc> {
        self.root_signatures.lock().unwrap().last().cloned()
    }
}

impl Default for MockDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl RenderDevice for MockDevice {
    fn create_descriptor_heap(&self, desc: &DescriptorHeapDesc) -> Result<Box<dyn DescriptorHeap>> {
        if *self.fail_heap_creation.lock().unwrap() {
            return Err(GraphicsError::ResourceCreation(
                "mock heap creation failure".to_string(),
            )
            .into());
        }

        // 堆之间留一段空隙，保证不同堆的句柄空间互不相邻
        let span = (desc.num_descriptors * MOCK_INCREMENT) as usize + 256;
        let cpu_base = self.next_cpu_base.fetch_add(span, Ordering::SeqCst);
        let gpu_base = if desc.shader_visible {
            Some(self.next_gpu_base.fetch_add(span as u64, Ordering::SeqCst))
        } else {
            None
        };

        Ok(Box::new(MockHeap {
            kind: desc.kind,
            capacity: desc.num_descriptors,
            cpu_base,
            gpu_base,
        }))
    }

    fn copy_descriptors(
        &self,
        kind: HeapKind,
        dst: CpuDescriptorHandle,
        src: &[CpuDescriptorHandle],
    ) {
        self.copies.lock().unwrap().push(CopyRecord {
            kind,
            dst,
            src: src.to_vec(),
        });
    }

    fn create_view(
        &self,
        desc: &ViewDescription,
        resource: &dyn GpuResource,
        dst: CpuDescriptorHandle,
    ) -> Result<()> {
        self.views.lock().unwrap().push(ViewRecord {
            desc: *desc,
            resource_name: resource.name().to_string(),
            dst,
        });
        Ok(())
    }

    fn create_constant_buffer(&self, size: usize, _name: &str) -> Result<Arc<dyn ConstantBuffer>> {
        let address = self
            .next_buffer_address
            .fetch_add(((size + 255) & !255) as u64, Ordering::SeqCst);
        let buffer = Arc::new(MockConstantBuffer {
            data: Mutex::new(Vec::new()),
            gpu_virtual_address: address,
            size,
        });
        self.buffers.lock().unwrap().push(Arc::clone(&buffer));
        Ok(buffer)
    }

    fn create_root_signature(&self, desc: &RootSignatureDesc) -> Result<Arc<dyn RootSignature>> {
        self.root_signatures.lock().unwrap().push(desc.clone());
        Ok(Arc::new(MockRootSignature { desc: desc.clone() }))
    }
}

/// 模拟着色器编译器
///
/// 预先配置每个阶段的反射结果。
pub struct MockCompiler {
    stages: HashMap<ShaderStage, CompiledStage>,
}

impl MockCompiler {
    pub fn new() -> Self {
        Self {
            stages: HashMap::new(),
        }
    }

    pub fn with_stage(mut self, stage: ShaderStage, resources: Vec<BoundResourceDesc>) -> Self {
        self.stages.insert(
            stage,
            CompiledStage {
                bytecode: vec![0xDE, 0xAD, 0xBE, 0xEF],
                bound_resources: resources,
            },
        );
        self
    }
}

impl Default for MockCompiler {
    fn default() -> Self {
        Self::new()
    }
}

impl ShaderCompiler for MockCompiler {
    fn compile(
        &self,
        _file: &Path,
        _entry_point: &str,
        stage: ShaderStage,
        _defines: &[(String, String)],
    ) -> Result<CompiledStage> {
        self.stages.get(&stage).cloned().ok_or_else(|| {
            GraphicsError::ShaderCompilation(format!(
                "no mock reflection configured for stage {}",
                stage.name()
            ))
            .into()
        })
    }
}

/// 记录的绑定命令
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordedBinding {
    GraphicsCbv { slot: u32, address: u64 },
    ComputeCbv { slot: u32, address: u64 },
    GraphicsTable { slot: u32, handle_ptr: u64 },
    ComputeTable { slot: u32, handle_ptr: u64 },
}

/// 模拟命令录制器
pub struct MockRecorder {
    pub bindings: Vec<RecordedBinding>,
}

impl MockRecorder {
    pub fn new() -> Self {
        Self {
            bindings: Vec::new(),
        }
    }
}

impl Default for MockRecorder {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandRecorder for MockRecorder {
    fn set_graphics_root_constant_buffer(&mut self, slot: u32, gpu_virtual_address: u64) {
        self.bindings.push(RecordedBinding::GraphicsCbv {
            slot,
            address: gpu_virtual_address,
        });
    }

    fn set_compute_root_constant_buffer(&mut self, slot: u32, gpu_virtual_address: u64) {
        self.bindings.push(RecordedBinding::ComputeCbv {
            slot,
            address: gpu_virtual_address,
        });
    }

    fn set_graphics_root_descriptor_table(&mut self, slot: u32, handle: GpuDescriptorHandle) {
        self.bindings.push(RecordedBinding::GraphicsTable {
            slot,
            handle_ptr: handle.ptr,
        });
    }

    fn set_compute_root_descriptor_table(&mut self, slot: u32, handle: GpuDescriptorHandle) {
        self.bindings.push(RecordedBinding::ComputeTable {
            slot,
            handle_ptr: handle.ptr,
        });
    }
}

/// 构造一个 2D 纹理 SRV 描述的便捷函数
pub fn srv_desc() -> ViewDescription {
    ViewDescription::ShaderResource {
        format: TextureFormat::Rgba8Unorm,
        most_detailed_mip: 0,
        mip_levels: 1,
    }
}
