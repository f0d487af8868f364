//! 材质与逐对象绑定编排
//!
//! [`Material`] 持有一个着色器和一块按 `cbPerObject` 反射布局
//! 开辟的 CPU 暂存缓冲区。矩阵参数按反射偏移以原始字节写入暂存区，
//! 不做任何隐式转置；调用方如需行主序上传，先用
//! [`crate::core::math::to_shader_matrix`] 转置。每帧
//! [`Material::pass_parameters_to_shader`] 把暂存区上传到 GPU 常量
//! 缓冲区并发出全部根绑定。

use std::collections::HashMap;
use std::sync::Arc;

use crate::core::error::Result;
use crate::core::math::{matrix_to_bytes, Matrix4};
use super::cache::DescriptorCacheGpu;
use super::device::{CommandRecorder, ConstantBuffer, RenderDevice, RootSignature};
use super::shader::{ConstantBufferAttribute, Shader};
use super::view::ResourceView;

/// 逐对象常量缓冲区在着色器中的名称
const CB_PER_OBJECT: &str = "cbPerObject";

/// 材质
pub struct Material {
    shader: Option<Shader>,
    cb_per_object: Option<Arc<dyn ConstantBuffer>>,
    cb_size: usize,
    staging: Vec<u8>,
    attributes: HashMap<String, ConstantBufferAttribute>,
    textures: HashMap<String, Arc<ResourceView>>,
}

impl Material {
    pub fn new() -> Self {
        Self {
            shader: None,
            cb_per_object: None,
            cb_size: 0,
            staging: Vec::new(),
            attributes: HashMap::new(),
            textures: HashMap::new(),
        }
    }

    /// 设置材质使用的着色器
    pub fn set_shader(&mut self, shader: Shader) {
        self.shader = Some(shader);
    }

    /// 按着色器反射出的 `cbPerObject` 布局创建常量缓冲区
    ///
    /// 必须先设置着色器，且着色器必须声明 `cbPerObject`，否则致命。
    /// 重复调用会丢弃旧缓冲区重建。
    pub fn create_constant_buffer(&mut self, device: &dyn RenderDevice) -> Result<()> {
        // 先在受限借用里取出反射数据，再写回自身字段
        let (size, attributes) = {
            let reflection = self.shader_ref().constant_buffer_reflection(CB_PER_OBJECT);
            let attributes: HashMap<String, ConstantBufferAttribute> = reflection
                .attributes
                .iter()
                .map(|attr| (attr.name.clone(), attr.clone()))
                .collect();
            (reflection.size as usize, attributes)
        };

        self.cb_size = size;
        self.attributes = attributes;
        self.staging = vec![0u8; self.cb_size];
        self.cb_per_object = Some(device.create_constant_buffer(self.cb_size, CB_PER_OBJECT)?);
        Ok(())
    }

    /// 写入一个 `float4x4` 参数
    ///
    /// 名称必须存在于 `cbPerObject` 且反射类型为 `float4x4`，否则致命。
    /// 矩阵按内存顺序原样写入反射偏移处。
    pub fn set_matrix(&mut self, name: &str, matrix: &Matrix4) {
        assert!(
            !self.staging.is_empty(),
            "material constant buffer was never created"
        );
        let attr = match self.attributes.get(name) {
            Some(attr) => attr,
            None => panic!("cbPerObject has no attribute '{}'", name),
        };
        assert!(
            attr.type_name == "float4x4",
            "attribute '{}' is a {}, not a float4x4",
            name,
            attr.type_name
        );

        let bytes = matrix_to_bytes(matrix);
        let offset = attr.offset as usize;
        self.staging[offset..offset + bytes.len()].copy_from_slice(&bytes);
    }

    /// 绑定一个纹理参数
    ///
    /// 名称必须是着色器的 SRV 参数，否则致命。材质会保留纹理，
    /// 每帧由 [`Material::pass_parameters_to_shader`] 重新应用，
    /// 调用方只需在纹理变化时设置一次。
    pub fn set_texture(&mut self, name: &str, view: Arc<ResourceView>) {
        let shader = match self.shader.as_mut() {
            Some(shader) => shader,
            None => panic!("material has no shader"),
        };
        if let Err(e) = shader.set_shader_resource(name, Arc::clone(&view)) {
            panic!("failed to set material texture '{}': {}", name, e);
        }
        self.textures.insert(name.to_string(), view);
    }

    /// 上传暂存区并发出全部根绑定
    pub fn pass_parameters_to_shader(
        &mut self,
        recorder: &mut dyn CommandRecorder,
        cache: &mut DescriptorCacheGpu,
    ) -> Result<()> {
        let buffer = match self.cb_per_object.as_ref() {
            Some(buffer) => Arc::clone(buffer),
            None => panic!("material constant buffer was never created"),
        };
        buffer.copy_data(&self.staging)?;

        let shader = match self.shader.as_mut() {
            Some(shader) => shader,
            None => panic!("material has no shader"),
        };
        if let Err(e) = shader.set_constant_buffer(CB_PER_OBJECT, buffer) {
            panic!("failed to bind {}: {}", CB_PER_OBJECT, e);
        }
        // 着色器每帧录制后清空绑定，这里重新应用材质保留的全部纹理
        for (name, view) in &self.textures {
            if let Err(e) = shader.set_shader_resource(name, Arc::clone(view)) {
                panic!("failed to bind material texture '{}': {}", name, e);
            }
        }
        shader.bind_parameters(recorder, cache);
        Ok(())
    }

    /// 材质的根签名（录制命令列表时设置）
    pub fn root_signature(&self) -> &Arc<dyn RootSignature> {
        self.shader_ref().root_signature()
    }

    /// 材质的着色器
    pub fn shader(&self) -> Option<&Shader> {
        self.shader.as_ref()
    }

    /// 当前暂存区内容（测试用）
    #[cfg(test)]
    pub(crate) fn staging_bytes(&self) -> &[u8] {
        &self.staging
    }

    fn shader_ref(&self) -> &Shader {
        match self.shader.as_ref() {
            Some(shader) => shader,
            None => panic!("material has no shader"),
        }
    }
}

impl Default for Material {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::math::{matrix_from_bytes, to_shader_matrix, Vector3};
    use crate::rhi::descriptor::DescriptorAllocator;
    use crate::rhi::device::{
        BoundResourceDesc, BoundResourceKind, ConstantBufferLayout, HeapKind, ShaderStage,
        VariableLayout,
    };
    use crate::rhi::shader::ShaderInfo;
    use crate::rhi::testing::{
        srv_desc, MockCompiler, MockDevice, MockRecorder, MockResource, RecordedBinding,
    };
    use std::sync::Mutex;

    fn box_material(device: &MockDevice) -> Material {
        let compiler = MockCompiler::new()
            .with_stage(
                ShaderStage::Vertex,
                vec![BoundResourceDesc {
                    name: "cbPerObject".to_string(),
                    kind: BoundResourceKind::ConstantBuffer,
                    bind_point: 0,
                    bind_count: 1,
                    register_space: 0,
                    buffer_layout: Some(ConstantBufferLayout {
                        size: 128,
                        variables: vec![
                            VariableLayout {
                                name: "gWorldViewProj".to_string(),
                                offset: 0,
                                size: 64,
                                type_name: "float4x4".to_string(),
                            },
                            VariableLayout {
                                name: "gTexTransform".to_string(),
                                offset: 64,
                                size: 64,
                                type_name: "float4x4".to_string(),
                            },
                        ],
                    }),
                }],
            )
            .with_stage(
                ShaderStage::Pixel,
                vec![BoundResourceDesc {
                    name: "gDiffuseMap".to_string(),
                    kind: BoundResourceKind::Texture,
                    bind_point: 0,
                    bind_count: 1,
                    register_space: 0,
                    buffer_layout: None,
                }],
            );
        let shader = Shader::new(
            ShaderInfo::graphics("box", "shaders/box.hlsl"),
            device,
            &compiler,
        )
        .unwrap();

        let mut material = Material::new();
        material.set_shader(shader);
        material
    }

    #[test]
    fn test_constant_buffer_sized_from_reflection() {
        let device = MockDevice::new();
        let mut material = box_material(&device);
        material.create_constant_buffer(&device).unwrap();

        assert_eq!(material.staging_bytes().len(), 128);
        let buffers = device.buffers.lock().unwrap();
        assert_eq!(buffers.len(), 1);
        assert_eq!(buffers[0].size(), 128);
    }

    #[test]
    fn test_matrix_byte_round_trip() {
        let device = MockDevice::new();
        let mut material = box_material(&device);
        material.create_constant_buffer(&device).unwrap();

        let m = Matrix4::new_translation(&Vector3::new(1.0, 2.0, 3.0));
        material.set_matrix("gTexTransform", &m);

        let mut bytes = [0u8; 64];
        bytes.copy_from_slice(&material.staging_bytes()[64..128]);
        assert_eq!(matrix_from_bytes(&bytes), m);

        // 前 64 字节未被触碰
        assert!(material.staging_bytes()[..64].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_transpose_is_callers_responsibility() {
        let device = MockDevice::new();
        let mut material = box_material(&device);
        material.create_constant_buffer(&device).unwrap();

        #[rustfmt::skip]
        let m = Matrix4::new(
            1.0, 2.0, 3.0, 4.0,
            5.0, 6.0, 7.0, 8.0,
            9.0, 10.0, 11.0, 12.0,
            13.0, 14.0, 15.0, 16.0,
        );
        material.set_matrix("gWorldViewProj", &to_shader_matrix(&m));

        let mut bytes = [0u8; 64];
        bytes.copy_from_slice(&material.staging_bytes()[..64]);
        assert_eq!(matrix_from_bytes(&bytes), m.transpose());
    }

    #[test]
    #[should_panic(expected = "not a float4x4")]
    fn test_wrong_attribute_type_is_fatal() {
        let device = MockDevice::new();
        let compiler = MockCompiler::new().with_stage(
            ShaderStage::Vertex,
            vec![BoundResourceDesc {
                name: "cbPerObject".to_string(),
                kind: BoundResourceKind::ConstantBuffer,
                bind_point: 0,
                bind_count: 1,
                register_space: 0,
                buffer_layout: Some(ConstantBufferLayout {
                    size: 16,
                    variables: vec![VariableLayout {
                        name: "gTime".to_string(),
                        offset: 0,
                        size: 4,
                        type_name: "float".to_string(),
                    }],
                }),
            }],
        );
        let mut info = ShaderInfo::graphics("bad", "shaders/bad.hlsl");
        info.pixel_entry = None;
        let shader = Shader::new(info, &device, &compiler).unwrap();

        let mut material = Material::new();
        material.set_shader(shader);
        material.create_constant_buffer(&device).unwrap();
        material.set_matrix("gTime", &Matrix4::identity());
    }

    #[test]
    #[should_panic(expected = "no attribute")]
    fn test_unknown_attribute_is_fatal() {
        let device = MockDevice::new();
        let mut material = box_material(&device);
        material.create_constant_buffer(&device).unwrap();
        material.set_matrix("gNoSuchThing", &Matrix4::identity());
    }

    #[test]
    fn test_pass_parameters_end_to_end() {
        let device = Arc::new(MockDevice::new());
        let mut material = box_material(&device);
        material.create_constant_buffer(device.as_ref()).unwrap();

        let allocator = Arc::new(Mutex::new(DescriptorAllocator::new(
            Arc::clone(&device) as Arc<dyn RenderDevice>,
            HeapKind::CbvSrvUav,
            8,
        )));
        let resource = MockResource::new("crate texture");
        let view = Arc::new(
            ResourceView::new(device.as_ref(), allocator, &srv_desc(), &resource).unwrap(),
        );

        material.set_matrix("gWorldViewProj", &Matrix4::identity());
        material.set_matrix("gTexTransform", &Matrix4::identity());
        material.set_texture("gDiffuseMap", view);

        let mut recorder = MockRecorder::new();
        let mut cache =
            DescriptorCacheGpu::new(Arc::clone(&device) as Arc<dyn RenderDevice>, 16).unwrap();
        material
            .pass_parameters_to_shader(&mut recorder, &mut cache)
            .unwrap();

        // 暂存区已上传到常量缓冲区
        let buffers = device.buffers.lock().unwrap();
        assert_eq!(buffers[0].data.lock().unwrap().len(), 128);
        let address = buffers[0].gpu_virtual_address();
        drop(buffers);

        // 根 CBV 在槽位 0，SRV 表在槽位 1
        assert_eq!(recorder.bindings.len(), 2);
        assert_eq!(
            recorder.bindings[0],
            RecordedBinding::GraphicsCbv { slot: 0, address }
        );
        assert!(matches!(
            recorder.bindings[1],
            RecordedBinding::GraphicsTable { slot: 1, .. }
        ));
        assert_eq!(cache.cbv_srv_uav_used(), 1);
    }

    #[test]
    fn test_texture_rebinds_every_frame() {
        let device = Arc::new(MockDevice::new());
        let mut material = box_material(&device);
        material.create_constant_buffer(device.as_ref()).unwrap();

        let allocator = Arc::new(Mutex::new(DescriptorAllocator::new(
            Arc::clone(&device) as Arc<dyn RenderDevice>,
            HeapKind::CbvSrvUav,
            8,
        )));
        let resource = MockResource::new("crate texture");
        let view = Arc::new(
            ResourceView::new(device.as_ref(), allocator, &srv_desc(), &resource).unwrap(),
        );

        // 纹理只设置一次，矩阵每帧更新
        material.set_texture("gDiffuseMap", view);

        let mut cache =
            DescriptorCacheGpu::new(Arc::clone(&device) as Arc<dyn RenderDevice>, 16).unwrap();
        for frame in 0..3u32 {
            cache.reset_cached_heaps();
            material.set_matrix("gWorldViewProj", &Matrix4::identity());
            material.set_matrix("gTexTransform", &Matrix4::identity());

            let mut recorder = MockRecorder::new();
            material
                .pass_parameters_to_shader(&mut recorder, &mut cache)
                .unwrap();

            // 每帧都发出根 CBV 和 SRV 表两条绑定
            assert_eq!(recorder.bindings.len(), 2, "frame {}", frame);
            assert!(matches!(
                recorder.bindings[0],
                RecordedBinding::GraphicsCbv { slot: 0, .. }
            ));
            assert!(matches!(
                recorder.bindings[1],
                RecordedBinding::GraphicsTable { slot: 1, .. }
            ));
            assert_eq!(cache.cbv_srv_uav_used(), 1);
        }
    }

    #[test]
    #[should_panic(expected = "failed to set material texture")]
    fn test_unknown_texture_name_is_fatal() {
        let device = Arc::new(MockDevice::new());
        let mut material = box_material(&device);
        material.create_constant_buffer(device.as_ref()).unwrap();

        let allocator = Arc::new(Mutex::new(DescriptorAllocator::new(
            Arc::clone(&device) as Arc<dyn RenderDevice>,
            HeapKind::CbvSrvUav,
            8,
        )));
        let resource = MockResource::new("tex");
        let view = Arc::new(
            ResourceView::new(device.as_ref(), allocator, &srv_desc(), &resource).unwrap(),
        );
        material.set_texture("gNoSuchMap", view);
    }
}
