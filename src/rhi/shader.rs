//! 着色器反射与根签名构建
//!
//! [`Shader`] 在构造时编译并反射各阶段，把绑定资源分类为
//! CBV/SRV/UAV/采样器参数，按固定布局合成根签名（每个 cbuffer 一个
//! 根 CBV，一个 SRV 表，一个 UAV 表，六个静态采样器），并建立
//! 名称到参数的注册表。调用方按名称设置参数，绑定时一次性发出全部
//! 根绑定命令。
//!
//! # 错误边界
//!
//! - 编译/反射/根签名创建失败：`Err`，向上传播
//! - 无法分类的绑定资源、阶段不匹配（图形阶段出现 UAV、非像素阶段
//!   出现采样器）：着色器本身写错了，致命断言
//! - 设置参数时名称未知、类别不符、数组长度不符：`Err`，由调用方
//!   决定是否致命
//! - 绑定时存在未设置的参数：致命断言

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::Arc;

use tracing::debug;

use crate::core::error::{BoxRenderError, Result};
use super::cache::DescriptorCacheGpu;
use super::descriptor::CpuDescriptorHandle;
use super::device::{
    BoundResourceDesc, BoundResourceKind, CommandRecorder, ConstantBuffer, DescriptorRangeDesc,
    RangeKind, RenderDevice, RootParameterDesc, RootSignature, RootSignatureDesc, ShaderCompiler,
    ShaderStage, ShaderVisibility, StaticSamplerDesc,
};
use super::view::{ResourceView, ViewKind};

// ========== 构建输入 ==========

/// 着色器宏定义集合
///
/// 使用有序映射保证编译参数的顺序稳定。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShaderDefines {
    defines: BTreeMap<String, String>,
}

impl ShaderDefines {
    pub fn new() -> Self {
        Self::default()
    }

    /// 设置宏定义（重复设置覆盖旧值）
    pub fn set_define(&mut self, name: impl Into<String>, definition: impl Into<String>) {
        self.defines.insert(name.into(), definition.into());
    }

    /// 导出为编译器需要的键值对列表
    pub fn as_pairs(&self) -> Vec<(String, String)> {
        self.defines
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.defines.is_empty()
    }
}

/// 着色器构建描述
///
/// 计算阶段与图形阶段互斥：要么 VS（可选 PS），要么 CS。
#[derive(Debug, Clone)]
pub struct ShaderInfo {
    /// 着色器名称（调试用）
    pub shader_name: String,
    /// HLSL 源文件
    pub file_name: PathBuf,
    /// 宏定义
    pub defines: ShaderDefines,
    /// 顶点着色器入口点
    pub vertex_entry: Option<String>,
    /// 像素着色器入口点
    pub pixel_entry: Option<String>,
    /// 计算着色器入口点
    pub compute_entry: Option<String>,
}

impl ShaderInfo {
    /// 标准图形着色器：VS + PS，入口点 "VS"/"PS"
    pub fn graphics(shader_name: impl Into<String>, file_name: impl Into<PathBuf>) -> Self {
        Self {
            shader_name: shader_name.into(),
            file_name: file_name.into(),
            defines: ShaderDefines::new(),
            vertex_entry: Some("VS".to_string()),
            pixel_entry: Some("PS".to_string()),
            compute_entry: None,
        }
    }

    /// 计算着色器：入口点 "CS"
    pub fn compute(shader_name: impl Into<String>, file_name: impl Into<PathBuf>) -> Self {
        Self {
            shader_name: shader_name.into(),
            file_name: file_name.into(),
            defines: ShaderDefines::new(),
            vertex_entry: None,
            pixel_entry: None,
            compute_entry: None,
        }
        .with_compute_entry("CS")
    }

    /// 设置计算入口点
    pub fn with_compute_entry(mut self, entry: impl Into<String>) -> Self {
        self.compute_entry = Some(entry.into());
        self
    }

    /// 是否是计算着色器
    pub fn is_compute(&self) -> bool {
        self.compute_entry.is_some()
    }
}

// ========== 反射结果 ==========

/// 常量缓冲区成员属性
#[derive(Debug, Clone, PartialEq)]
pub struct ConstantBufferAttribute {
    /// 成员名
    pub name: String,
    /// 距缓冲区起始的字节偏移
    pub offset: u32,
    /// 字节大小
    pub size: u32,
    /// HLSL 类型名（如 "float4x4"）
    pub type_name: String,
}

/// 一个 cbuffer 的完整反射信息
#[derive(Debug, Clone, PartialEq)]
pub struct ConstantBufferReflection {
    /// 缓冲区总大小（字节）
    pub size: u32,
    /// 成员属性表
    pub attributes: Vec<ConstantBufferAttribute>,
}

// ========== 参数表 ==========

struct CbvParameter {
    name: String,
    stage: ShaderStage,
    bind_point: u32,
    register_space: u32,
    bound: Option<Arc<dyn ConstantBuffer>>,
}

struct SrvParameter {
    name: String,
    bind_point: u32,
    bind_count: u32,
    bound: Vec<Arc<ResourceView>>,
}

struct UavParameter {
    name: String,
    bind_point: u32,
    bind_count: u32,
    bound: Vec<Arc<ResourceView>>,
}

struct SamplerParameter {
    #[allow(dead_code)]
    name: String,
    #[allow(dead_code)]
    bind_point: u32,
}

/// 参数类别
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ParamKind {
    Cbv,
    Srv,
    Uav,
}

impl ParamKind {
    fn name(&self) -> &'static str {
        match self {
            ParamKind::Cbv => "constant buffer",
            ParamKind::Srv => "shader resource",
            ParamKind::Uav => "unordered access",
        }
    }
}

/// 注册表槽位：一个名称对应的参数类别与索引
///
/// 同名参数可能出现在多个阶段（例如 VS 和 PS 共用的 cbuffer），
/// 因此一个名称可以指向多个同类参数。
struct ParamSlot {
    kind: ParamKind,
    indices: Vec<usize>,
}

// ========== Shader ==========

/// 编译好的着色器及其根签名
pub struct Shader {
    info: ShaderInfo,
    stages: HashMap<ShaderStage, Vec<u8>>,
    root_signature: Arc<dyn RootSignature>,

    cbv_params: Vec<CbvParameter>,
    srv_params: Vec<SrvParameter>,
    uav_params: Vec<UavParameter>,
    #[allow(dead_code)]
    sampler_params: Vec<SamplerParameter>,

    cb_reflections: HashMap<String, ConstantBufferReflection>,
    registry: HashMap<String, ParamSlot>,

    cbv_base_slot: Option<u32>,
    srv_slot: Option<u32>,
    srv_count: u32,
    uav_slot: Option<u32>,
    uav_count: u32,
}

impl Shader {
    /// 编译、反射并构建根签名
    pub fn new(
        info: ShaderInfo,
        device: &dyn RenderDevice,
        compiler: &dyn ShaderCompiler,
    ) -> Result<Self> {
        let has_graphics = info.vertex_entry.is_some() || info.pixel_entry.is_some();
        assert!(
            has_graphics ^ info.compute_entry.is_some(),
            "shader '{}' must be either graphics (VS/PS) or compute (CS), not both",
            info.shader_name
        );

        let mut tables = ParameterTables::default();
        let mut stages = HashMap::new();

        let defines = info.defines.as_pairs();
        let entries = [
            (ShaderStage::Vertex, info.vertex_entry.clone()),
            (ShaderStage::Pixel, info.pixel_entry.clone()),
            (ShaderStage::Compute, info.compute_entry.clone()),
        ];
        for (stage, entry) in entries {
            if let Some(entry) = entry {
                let compiled = compiler.compile(&info.file_name, &entry, stage, &defines)?;
                tables.classify(&compiled.bound_resources, stage, &info.shader_name);
                stages.insert(stage, compiled.bytecode);
            }
        }

        let root_signature = tables.create_root_signature(device, info.is_compute())?;
        let mut shader = Self {
            info,
            stages,
            root_signature,
            cbv_base_slot: tables.cbv_base_slot,
            srv_slot: tables.srv_slot,
            srv_count: tables.srv_count,
            uav_slot: tables.uav_slot,
            uav_count: tables.uav_count,
            cbv_params: tables.cbv_params,
            srv_params: tables.srv_params,
            uav_params: tables.uav_params,
            sampler_params: tables.sampler_params,
            cb_reflections: tables.cb_reflections,
            registry: HashMap::new(),
        };
        shader.build_registry();

        debug!(
            shader = %shader.info.shader_name,
            cbv = shader.cbv_params.len(),
            srv = shader.srv_params.len(),
            uav = shader.uav_params.len(),
            "shader reflected"
        );
        Ok(shader)
    }

    /// 按名称设置常量缓冲区参数
    pub fn set_constant_buffer(
        &mut self,
        name: &str,
        buffer: Arc<dyn ConstantBuffer>,
    ) -> Result<()> {
        let indices = self.lookup(name, ParamKind::Cbv)?;
        for index in indices {
            self.cbv_params[index].bound = Some(Arc::clone(&buffer));
        }
        Ok(())
    }

    /// 按名称设置单个 SRV 参数
    pub fn set_shader_resource(&mut self, name: &str, view: Arc<ResourceView>) -> Result<()> {
        self.set_shader_resources(name, vec![view])
    }

    /// 按名称设置 SRV 数组参数
    ///
    /// 列表长度必须等于反射出的数组长度。
    pub fn set_shader_resources(
        &mut self,
        name: &str,
        views: Vec<Arc<ResourceView>>,
    ) -> Result<()> {
        for view in &views {
            if view.kind() != ViewKind::ShaderResource {
                return Err(BoxRenderError::Runtime(format!(
                    "parameter '{}' expects shader resource views",
                    name
                )));
            }
        }
        let indices = self.lookup(name, ParamKind::Srv)?;
        for index in indices {
            let param = &mut self.srv_params[index];
            if param.bind_count as usize != views.len() {
                return Err(BoxRenderError::Runtime(format!(
                    "parameter '{}' expects {} views, got {}",
                    name,
                    param.bind_count,
                    views.len()
                )));
            }
            param.bound = views.clone();
        }
        Ok(())
    }

    /// 按名称设置单个 UAV 参数
    pub fn set_unordered_access(&mut self, name: &str, view: Arc<ResourceView>) -> Result<()> {
        self.set_unordered_accesses(name, vec![view])
    }

    /// 按名称设置 UAV 数组参数
    pub fn set_unordered_accesses(
        &mut self,
        name: &str,
        views: Vec<Arc<ResourceView>>,
    ) -> Result<()> {
        for view in &views {
            if view.kind() != ViewKind::UnorderedAccess {
                return Err(BoxRenderError::Runtime(format!(
                    "parameter '{}' expects unordered access views",
                    name
                )));
            }
        }
        let indices = self.lookup(name, ParamKind::Uav)?;
        for index in indices {
            let param = &mut self.uav_params[index];
            if param.bind_count as usize != views.len() {
                return Err(BoxRenderError::Runtime(format!(
                    "parameter '{}' expects {} views, got {}",
                    name,
                    param.bind_count,
                    views.len()
                )));
            }
            param.bound = views.clone();
        }
        Ok(())
    }

    /// 发出全部根绑定命令，然后清空已设置的参数
    ///
    /// 所有参数必须已设置，缺失是致命错误。
    pub fn bind_parameters(
        &mut self,
        recorder: &mut dyn CommandRecorder,
        cache: &mut DescriptorCacheGpu,
    ) {
        self.check_bindings();

        let is_compute = self.info.is_compute();

        // 根 CBV：基槽位起连续排布
        for (i, param) in self.cbv_params.iter().enumerate() {
            let slot = self.cbv_base_slot.unwrap_or(0) + i as u32;
            // check_bindings 已保证 bound 非空
            let address = match &param.bound {
                Some(buffer) => buffer.gpu_virtual_address(),
                None => unreachable!(),
            };
            if is_compute {
                recorder.set_compute_root_constant_buffer(slot, address);
            } else {
                recorder.set_graphics_root_constant_buffer(slot, address);
            }
        }

        // SRV 表：按 bind_point + 数组内偏移聚拢到缓存的连续区域
        if self.srv_count > 0 {
            let mut src = vec![CpuDescriptorHandle::new(0, 0); self.srv_count as usize];
            for param in &self.srv_params {
                for (i, view) in param.bound.iter().enumerate() {
                    src[(param.bind_point as usize) + i] = view.cpu_handle();
                }
            }
            let table = cache.append_cbv_srv_uav_descriptors(&src);
            let slot = match self.srv_slot {
                Some(slot) => slot,
                None => unreachable!(),
            };
            if is_compute {
                recorder.set_compute_root_descriptor_table(slot, table);
            } else {
                recorder.set_graphics_root_descriptor_table(slot, table);
            }
        }

        // UAV 表：只允许出现在计算管线
        if self.uav_count > 0 {
            let mut src = vec![CpuDescriptorHandle::new(0, 0); self.uav_count as usize];
            for param in &self.uav_params {
                for (i, view) in param.bound.iter().enumerate() {
                    src[(param.bind_point as usize) + i] = view.cpu_handle();
                }
            }
            let table = cache.append_cbv_srv_uav_descriptors(&src);
            let slot = match self.uav_slot {
                Some(slot) => slot,
                None => unreachable!(),
            };
            if is_compute {
                recorder.set_compute_root_descriptor_table(slot, table);
            } else {
                panic!("UAV descriptor tables are only bound on the compute path");
            }
        }

        self.clear_bindings();
    }

    /// 获取一个 cbuffer 的反射信息
    ///
    /// 名称必须存在于反射结果中。
    pub fn constant_buffer_reflection(&self, name: &str) -> &ConstantBufferReflection {
        match self.cb_reflections.get(name) {
            Some(reflection) => reflection,
            None => panic!("shader '{}' has no constant buffer '{}'", self.info.shader_name, name),
        }
    }

    /// 某阶段的字节码（创建管线状态对象时使用）
    pub fn stage_bytecode(&self, stage: ShaderStage) -> Option<&[u8]> {
        self.stages.get(&stage).map(|b| b.as_slice())
    }

    /// 根签名
    pub fn root_signature(&self) -> &Arc<dyn RootSignature> {
        &self.root_signature
    }

    /// 构建描述
    pub fn info(&self) -> &ShaderInfo {
        &self.info
    }

    /// 根 CBV 的基槽位（测试与调试用）
    pub fn cbv_base_slot(&self) -> Option<u32> {
        self.cbv_base_slot
    }

    /// SRV 表的槽位（测试与调试用）
    pub fn srv_slot(&self) -> Option<u32> {
        self.srv_slot
    }

    // ========== 内部 ==========

    fn build_registry(&mut self) {
        let entries = self
            .cbv_params
            .iter()
            .enumerate()
            .map(|(i, p)| (p.name.clone(), ParamKind::Cbv, i))
            .chain(
                self.srv_params
                    .iter()
                    .enumerate()
                    .map(|(i, p)| (p.name.clone(), ParamKind::Srv, i)),
            )
            .chain(
                self.uav_params
                    .iter()
                    .enumerate()
                    .map(|(i, p)| (p.name.clone(), ParamKind::Uav, i)),
            )
            .collect::<Vec<_>>();

        for (name, kind, index) in entries {
            match self.registry.get_mut(&name) {
                Some(slot) => {
                    assert!(
                        slot.kind == kind,
                        "parameter '{}' is both a {} and a {}",
                        name,
                        slot.kind.name(),
                        kind.name()
                    );
                    slot.indices.push(index);
                }
                None => {
                    self.registry.insert(
                        name,
                        ParamSlot {
                            kind,
                            indices: vec![index],
                        },
                    );
                }
            }
        }
    }

    fn lookup(&self, name: &str, kind: ParamKind) -> Result<Vec<usize>> {
        let slot = self.registry.get(name).ok_or_else(|| {
            BoxRenderError::Runtime(format!(
                "shader '{}' has no parameter '{}'",
                self.info.shader_name, name
            ))
        })?;
        if slot.kind != kind {
            return Err(BoxRenderError::Runtime(format!(
                "parameter '{}' is a {}, not a {}",
                name,
                slot.kind.name(),
                kind.name()
            )));
        }
        Ok(slot.indices.clone())
    }

    fn check_bindings(&self) {
        for param in &self.cbv_params {
            assert!(
                param.bound.is_some(),
                "constant buffer parameter '{}' was never set",
                param.name
            );
        }
        for param in &self.srv_params {
            assert!(
                !param.bound.is_empty(),
                "shader resource parameter '{}' was never set",
                param.name
            );
        }
        for param in &self.uav_params {
            assert!(
                !param.bound.is_empty(),
                "unordered access parameter '{}' was never set",
                param.name
            );
        }
    }

    fn clear_bindings(&mut self) {
        for param in &mut self.cbv_params {
            param.bound = None;
        }
        for param in &mut self.srv_params {
            param.bound.clear();
        }
        for param in &mut self.uav_params {
            param.bound.clear();
        }
    }
}

fn stage_visibility(stage: ShaderStage) -> ShaderVisibility {
    match stage {
        ShaderStage::Vertex => ShaderVisibility::Vertex,
        ShaderStage::Pixel => ShaderVisibility::Pixel,
        ShaderStage::Compute => ShaderVisibility::All,
    }
}

/// 反射过程中积累的参数表，构建完成后移交给 [`Shader`]
#[derive(Default)]
struct ParameterTables {
    cbv_params: Vec<CbvParameter>,
    srv_params: Vec<SrvParameter>,
    uav_params: Vec<UavParameter>,
    sampler_params: Vec<SamplerParameter>,
    cb_reflections: HashMap<String, ConstantBufferReflection>,
    cbv_base_slot: Option<u32>,
    srv_slot: Option<u32>,
    srv_count: u32,
    uav_slot: Option<u32>,
    uav_count: u32,
}

impl ParameterTables {
    fn classify(&mut self, resources: &[BoundResourceDesc], stage: ShaderStage, shader_name: &str) {
        for resource in resources {
            match resource.kind {
                BoundResourceKind::ConstantBuffer => {
                    self.cbv_params.push(CbvParameter {
                        name: resource.name.clone(),
                        stage,
                        bind_point: resource.bind_point,
                        register_space: resource.register_space,
                        bound: None,
                    });
                    let layout = match &resource.buffer_layout {
                        Some(layout) => layout,
                        None => panic!(
                            "constant buffer '{}' reflected without a layout",
                            resource.name
                        ),
                    };
                    self.cb_reflections.insert(
                        resource.name.clone(),
                        ConstantBufferReflection {
                            size: layout.size,
                            attributes: layout
                                .variables
                                .iter()
                                .map(|v| ConstantBufferAttribute {
                                    name: v.name.clone(),
                                    offset: v.offset,
                                    size: v.size,
                                    type_name: v.type_name.clone(),
                                })
                                .collect(),
                        },
                    );
                }
                BoundResourceKind::Texture | BoundResourceKind::StructuredBuffer => {
                    self.srv_params.push(SrvParameter {
                        name: resource.name.clone(),
                        bind_point: resource.bind_point,
                        bind_count: resource.bind_count,
                        bound: Vec::new(),
                    });
                }
                BoundResourceKind::ReadWrite => {
                    assert!(
                        stage == ShaderStage::Compute,
                        "read-write resource '{}' outside a compute shader",
                        resource.name
                    );
                    self.uav_params.push(UavParameter {
                        name: resource.name.clone(),
                        bind_point: resource.bind_point,
                        bind_count: resource.bind_count,
                        bound: Vec::new(),
                    });
                }
                BoundResourceKind::Sampler => {
                    assert!(
                        stage == ShaderStage::Pixel,
                        "sampler '{}' outside a pixel shader",
                        resource.name
                    );
                    self.sampler_params.push(SamplerParameter {
                        name: resource.name.clone(),
                        bind_point: resource.bind_point,
                    });
                }
                BoundResourceKind::Unknown => {
                    panic!(
                        "cannot classify bound resource '{}' in shader '{}'",
                        resource.name, shader_name
                    );
                }
            }
        }
    }

    fn create_root_signature(
        &mut self,
        device: &dyn RenderDevice,
        is_compute: bool,
    ) -> Result<Arc<dyn RootSignature>> {
        let mut parameters = Vec::new();

        // 每个 cbuffer 一个根 CBV，按反射顺序连续排布
        for param in &self.cbv_params {
            if self.cbv_base_slot.is_none() {
                self.cbv_base_slot = Some(parameters.len() as u32);
            }
            parameters.push(RootParameterDesc::Cbv {
                shader_register: param.bind_point,
                register_space: param.register_space,
                visibility: stage_visibility(param.stage),
            });
        }

        // 一个 SRV 表，容量为所有 SRV 参数数组长度之和
        self.srv_count = self.srv_params.iter().map(|p| p.bind_count).sum();
        if self.srv_count > 0 {
            self.srv_slot = Some(parameters.len() as u32);
            parameters.push(RootParameterDesc::DescriptorTable {
                ranges: vec![DescriptorRangeDesc {
                    kind: RangeKind::Srv,
                    num_descriptors: self.srv_count,
                    base_shader_register: 0,
                    register_space: 0,
                }],
                visibility: if is_compute {
                    ShaderVisibility::All
                } else {
                    ShaderVisibility::Pixel
                },
            });
        }

        // 一个 UAV 表
        self.uav_count = self.uav_params.iter().map(|p| p.bind_count).sum();
        if self.uav_count > 0 {
            self.uav_slot = Some(parameters.len() as u32);
            parameters.push(RootParameterDesc::DescriptorTable {
                ranges: vec![DescriptorRangeDesc {
                    kind: RangeKind::Uav,
                    num_descriptors: self.uav_count,
                    base_shader_register: 0,
                    register_space: 0,
                }],
                visibility: ShaderVisibility::All,
            });
        }

        device.create_root_signature(&RootSignatureDesc {
            parameters,
            static_samplers: StaticSamplerDesc::standard_set(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rhi::descriptor::DescriptorAllocator;
    use crate::rhi::device::{ConstantBufferLayout, HeapKind, VariableLayout};
    use crate::rhi::testing::{
        srv_desc, MockCompiler, MockDevice, MockRecorder, MockResource, MockRootSignature,
        RecordedBinding,
    };
    use std::sync::Mutex;

    fn cbuffer_resource(name: &str, bind_point: u32) -> BoundResourceDesc {
        BoundResourceDesc {
            name: name.to_string(),
            kind: BoundResourceKind::ConstantBuffer,
            bind_point,
            bind_count: 1,
            register_space: 0,
            buffer_layout: Some(ConstantBufferLayout {
                size: 64,
                variables: vec![VariableLayout {
                    name: "gWorldViewProj".to_string(),
                    offset: 0,
                    size: 64,
                    type_name: "float4x4".to_string(),
                }],
            }),
        }
    }

    fn texture_resource(name: &str, bind_point: u32, bind_count: u32) -> BoundResourceDesc {
        BoundResourceDesc {
            name: name.to_string(),
            kind: BoundResourceKind::Texture,
            bind_point,
            bind_count,
            register_space: 0,
            buffer_layout: None,
        }
    }

    fn sampler_resource(name: &str) -> BoundResourceDesc {
        BoundResourceDesc {
            name: name.to_string(),
            kind: BoundResourceKind::Sampler,
            bind_point: 0,
            bind_count: 1,
            register_space: 0,
            buffer_layout: None,
        }
    }

    fn box_shader(device: &MockDevice) -> Shader {
        let compiler = MockCompiler::new()
            .with_stage(
                ShaderStage::Vertex,
                vec![cbuffer_resource("cbPerObject", 0)],
            )
            .with_stage(
                ShaderStage::Pixel,
                vec![
                    texture_resource("gDiffuseMap", 0, 1),
                    sampler_resource("gsamLinearWrap"),
                ],
            );
        Shader::new(
            ShaderInfo::graphics("box", "shaders/box.hlsl"),
            device,
            &compiler,
        )
        .unwrap()
    }

    #[test]
    fn test_root_signature_matches_reflection() {
        let device = MockDevice::new();
        let shader = box_shader(&device);

        assert_eq!(shader.cbv_base_slot(), Some(0));
        assert_eq!(shader.srv_slot(), Some(1));

        let desc = device.last_root_signature().unwrap();
        assert_eq!(desc.parameters.len(), 2);
        assert_eq!(
            desc.parameters[0],
            RootParameterDesc::Cbv {
                shader_register: 0,
                register_space: 0,
                visibility: ShaderVisibility::Vertex,
            }
        );
        match &desc.parameters[1] {
            RootParameterDesc::DescriptorTable { ranges, visibility } => {
                assert_eq!(ranges.len(), 1);
                assert_eq!(ranges[0].kind, RangeKind::Srv);
                assert_eq!(ranges[0].num_descriptors, 1);
                assert_eq!(*visibility, ShaderVisibility::Pixel);
            }
            other => panic!("expected SRV table, got {:?}", other),
        }
        assert_eq!(desc.static_samplers.len(), 6);

        // 着色器持有的根签名就是设备按该描述创建的那一个
        let held = shader
            .root_signature()
            .as_any()
            .downcast_ref::<MockRootSignature>()
            .unwrap();
        assert_eq!(held.desc, desc);
    }

    #[test]
    fn test_srv_table_sums_bind_counts() {
        let device = MockDevice::new();
        let compiler = MockCompiler::new().with_stage(
            ShaderStage::Pixel,
            vec![
                texture_resource("gShadowMaps", 0, 4),
                texture_resource("gDiffuseMap", 4, 1),
            ],
        );
        let mut info = ShaderInfo::graphics("multi", "shaders/multi.hlsl");
        info.vertex_entry = None;
        let shader = Shader::new(info, &device, &compiler).unwrap();

        let desc = device.last_root_signature().unwrap();
        match &desc.parameters[0] {
            RootParameterDesc::DescriptorTable { ranges, .. } => {
                assert_eq!(ranges[0].num_descriptors, 5);
            }
            other => panic!("expected SRV table, got {:?}", other),
        }
        assert_eq!(shader.srv_slot(), Some(0));
    }

    #[test]
    fn test_setters_reject_bad_input() {
        let device = MockDevice::new();
        let mut shader = box_shader(&device);

        let buffer = device.create_constant_buffer(64, "cb").unwrap();
        // 未知名称
        assert!(shader
            .set_constant_buffer("cbNoSuchThing", Arc::clone(&buffer))
            .is_err());
        // 类别不符：对纹理参数设置常量缓冲区
        assert!(shader
            .set_constant_buffer("gDiffuseMap", Arc::clone(&buffer))
            .is_err());
        // 正确设置成功
        assert!(shader.set_constant_buffer("cbPerObject", buffer).is_ok());
    }

    #[test]
    fn test_srv_bind_count_mismatch_rejected() {
        let device = Arc::new(MockDevice::new());
        let compiler = MockCompiler::new().with_stage(
            ShaderStage::Pixel,
            vec![texture_resource("gShadowMaps", 0, 4)],
        );
        let mut info = ShaderInfo::graphics("shadow", "shaders/shadow.hlsl");
        info.vertex_entry = None;
        let mut shader = Shader::new(info, device.as_ref(), &compiler).unwrap();

        let allocator = Arc::new(Mutex::new(DescriptorAllocator::new(
            Arc::clone(&device) as Arc<dyn RenderDevice>,
            HeapKind::CbvSrvUav,
            8,
        )));
        let resource = MockResource::new("map");
        let view = Arc::new(
            ResourceView::new(device.as_ref(), allocator, &srv_desc(), &resource).unwrap(),
        );

        // 反射要求 4 个视图，只给 1 个
        assert!(shader.set_shader_resource("gShadowMaps", view).is_err());
    }

    #[test]
    #[should_panic(expected = "never set")]
    fn test_missing_binding_is_fatal() {
        let device = Arc::new(MockDevice::new());
        let mut shader = box_shader(&device);

        let buffer = device.create_constant_buffer(64, "cb").unwrap();
        shader.set_constant_buffer("cbPerObject", buffer).unwrap();
        // gDiffuseMap 没有设置

        let mut recorder = MockRecorder::new();
        let mut cache =
            DescriptorCacheGpu::new(Arc::clone(&device) as Arc<dyn RenderDevice>, 16).unwrap();
        shader.bind_parameters(&mut recorder, &mut cache);
    }

    #[test]
    fn test_bind_parameters_end_to_end() {
        let device = Arc::new(MockDevice::new());
        let mut shader = box_shader(&device);

        let buffer = device.create_constant_buffer(64, "cbPerObject").unwrap();
        let address = buffer.gpu_virtual_address();
        shader
            .set_constant_buffer("cbPerObject", buffer)
            .unwrap();

        let allocator = Arc::new(Mutex::new(DescriptorAllocator::new(
            Arc::clone(&device) as Arc<dyn RenderDevice>,
            HeapKind::CbvSrvUav,
            8,
        )));
        let resource = MockResource::new("crate texture");
        let view = Arc::new(
            ResourceView::new(device.as_ref(), allocator, &srv_desc(), &resource).unwrap(),
        );
        shader.set_shader_resource("gDiffuseMap", view).unwrap();

        let mut recorder = MockRecorder::new();
        let mut cache =
            DescriptorCacheGpu::new(Arc::clone(&device) as Arc<dyn RenderDevice>, 16).unwrap();
        let table_base = cache.cbv_srv_uav_heap().gpu_start().unwrap();
        shader.bind_parameters(&mut recorder, &mut cache);

        // 根 CBV 在槽位 0，SRV 表在槽位 1，描述符落在缓存偏移 0
        assert_eq!(
            recorder.bindings,
            vec![
                RecordedBinding::GraphicsCbv { slot: 0, address },
                RecordedBinding::GraphicsTable {
                    slot: 1,
                    handle_ptr: table_base.ptr,
                },
            ]
        );
        assert_eq!(cache.cbv_srv_uav_used(), 1);

        // 绑定后参数被清空，直接再次绑定会因缺失而失败
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let mut recorder = MockRecorder::new();
            shader.bind_parameters(&mut recorder, &mut cache);
        }));
        assert!(result.is_err());
    }

    #[test]
    fn test_compute_shader_binds_on_compute_path() {
        let device = Arc::new(MockDevice::new());
        let compiler = MockCompiler::new().with_stage(
            ShaderStage::Compute,
            vec![
                cbuffer_resource("cbSettings", 0),
                BoundResourceDesc {
                    name: "gOutput".to_string(),
                    kind: BoundResourceKind::ReadWrite,
                    bind_point: 0,
                    bind_count: 1,
                    register_space: 0,
                    buffer_layout: None,
                },
            ],
        );
        let mut shader = Shader::new(
            ShaderInfo::compute("blur", "shaders/blur.hlsl"),
            device.as_ref(),
            &compiler,
        )
        .unwrap();

        let buffer = device.create_constant_buffer(64, "cb").unwrap();
        shader.set_constant_buffer("cbSettings", buffer).unwrap();

        let allocator = Arc::new(Mutex::new(DescriptorAllocator::new(
            Arc::clone(&device) as Arc<dyn RenderDevice>,
            HeapKind::CbvSrvUav,
            8,
        )));
        let resource = MockResource::new("output");
        let uav_desc = crate::rhi::device::ViewDescription::UnorderedAccess {
            format: crate::rhi::device::TextureFormat::Rgba8Unorm,
            mip_slice: 0,
        };
        let view = Arc::new(
            ResourceView::new(device.as_ref(), allocator, &uav_desc, &resource).unwrap(),
        );
        shader.set_unordered_access("gOutput", view).unwrap();

        let mut recorder = MockRecorder::new();
        let mut cache =
            DescriptorCacheGpu::new(Arc::clone(&device) as Arc<dyn RenderDevice>, 16).unwrap();
        shader.bind_parameters(&mut recorder, &mut cache);

        assert!(matches!(
            recorder.bindings[0],
            RecordedBinding::ComputeCbv { slot: 0, .. }
        ));
        assert!(matches!(
            recorder.bindings[1],
            RecordedBinding::ComputeTable { slot: 1, .. }
        ));
    }

    #[test]
    #[should_panic(expected = "outside a compute shader")]
    fn test_uav_in_graphics_stage_is_fatal() {
        let device = MockDevice::new();
        let compiler = MockCompiler::new().with_stage(
            ShaderStage::Pixel,
            vec![BoundResourceDesc {
                name: "gOutput".to_string(),
                kind: BoundResourceKind::ReadWrite,
                bind_point: 0,
                bind_count: 1,
                register_space: 0,
                buffer_layout: None,
            }],
        );
        let mut info = ShaderInfo::graphics("bad", "shaders/bad.hlsl");
        info.vertex_entry = None;
        let _ = Shader::new(info, &device, &compiler);
    }

    #[test]
    #[should_panic(expected = "cannot classify")]
    fn test_unknown_resource_kind_is_fatal() {
        let device = MockDevice::new();
        let compiler = MockCompiler::new().with_stage(
            ShaderStage::Pixel,
            vec![BoundResourceDesc {
                name: "gMystery".to_string(),
                kind: BoundResourceKind::Unknown,
                bind_point: 0,
                bind_count: 1,
                register_space: 0,
                buffer_layout: None,
            }],
        );
        let mut info = ShaderInfo::graphics("bad", "shaders/bad.hlsl");
        info.vertex_entry = None;
        let _ = Shader::new(info, &device, &compiler);
    }

    #[test]
    #[should_panic(expected = "not both")]
    fn test_compute_and_graphics_stages_are_exclusive() {
        let device = MockDevice::new();
        let compiler = MockCompiler::new();
        let info = ShaderInfo::graphics("bad", "shaders/bad.hlsl").with_compute_entry("CS");
        let _ = Shader::new(info, &device, &compiler);
    }

    #[test]
    fn test_constant_buffer_reflection_lookup() {
        let device = MockDevice::new();
        let shader = box_shader(&device);
        let reflection = shader.constant_buffer_reflection("cbPerObject");
        assert_eq!(reflection.size, 64);
        assert_eq!(reflection.attributes.len(), 1);
        assert_eq!(reflection.attributes[0].name, "gWorldViewProj");
        assert_eq!(reflection.attributes[0].type_name, "float4x4");
    }
}
