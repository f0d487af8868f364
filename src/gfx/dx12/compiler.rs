//! FXC 着色器编译与反射
//!
//! 用 `D3DCompile` 编译 HLSL（SM 5.0），再用 `D3DReflect` 提取
//! 绑定资源与 cbuffer 成员布局，供根签名构建和按名设参使用。

use std::ffi::CString;
use std::path::Path;

use tracing::{debug, info};
use windows::{
    core::{Interface, PCSTR},
    Win32::Graphics::Direct3D::Fxc::*,
    Win32::Graphics::Direct3D::*,
    Win32::Graphics::Direct3D12::*,
};

use crate::core::error::{GraphicsError, Result};
use crate::rhi::device::{
    BoundResourceDesc, BoundResourceKind, CompiledStage, ConstantBufferLayout, ShaderCompiler,
    ShaderStage, VariableLayout,
};

/// 基于 FXC 的 `ShaderCompiler` 实现
pub struct FxcShaderCompiler;

impl FxcShaderCompiler {
    pub fn new() -> Self {
        Self
    }
}

impl Default for FxcShaderCompiler {
    fn default() -> Self {
        Self::new()
    }
}

fn classify(input_type: D3D_SHADER_INPUT_TYPE) -> BoundResourceKind {
    match input_type {
        D3D_SIT_CBUFFER => BoundResourceKind::ConstantBuffer,
        D3D_SIT_TEXTURE => BoundResourceKind::Texture,
        D3D_SIT_STRUCTURED => BoundResourceKind::StructuredBuffer,
        D3D_SIT_UAV_RWTYPED | D3D_SIT_UAV_RWSTRUCTURED => BoundResourceKind::ReadWrite,
        D3D_SIT_SAMPLER => BoundResourceKind::Sampler,
        _ => BoundResourceKind::Unknown,
    }
}

/// 反射 cbuffer 的成员布局
unsafe fn reflect_buffer_layout(
    reflection: &ID3D12ShaderReflection,
    name: &CString,
) -> Result<ConstantBufferLayout> {
    let cbuffer = reflection.GetConstantBufferByName(PCSTR(name.as_ptr() as *const u8));
    let mut buffer_desc = D3D12_SHADER_BUFFER_DESC::default();
    cbuffer.GetDesc(&mut buffer_desc).map_err(|e| {
        GraphicsError::ShaderCompilation(format!(
            "Failed to reflect cbuffer '{}': {:?}",
            name.to_string_lossy(),
            e
        ))
    })?;

    let mut variables = Vec::with_capacity(buffer_desc.Variables as usize);
    for i in 0..buffer_desc.Variables {
        let variable = cbuffer.GetVariableByIndex(i);
        let mut variable_desc = D3D12_SHADER_VARIABLE_DESC::default();
        variable.GetDesc(&mut variable_desc).map_err(|e| {
            GraphicsError::ShaderCompilation(format!(
                "Failed to reflect cbuffer variable {}: {:?}",
                i, e
            ))
        })?;

        let variable_type = variable.GetType();
        let mut type_desc = D3D12_SHADER_TYPE_DESC::default();
        variable_type.GetDesc(&mut type_desc).map_err(|e| {
            GraphicsError::ShaderCompilation(format!(
                "Failed to reflect cbuffer variable type {}: {:?}",
                i, e
            ))
        })?;

        variables.push(VariableLayout {
            name: variable_desc.Name.to_string().unwrap_or_default(),
            offset: variable_desc.StartOffset,
            size: variable_desc.Size,
            type_name: type_desc.Name.to_string().unwrap_or_default(),
        });
    }

    Ok(ConstantBufferLayout {
        size: buffer_desc.Size,
        variables,
    })
}

impl ShaderCompiler for FxcShaderCompiler {
    fn compile(
        &self,
        file: &Path,
        entry_point: &str,
        stage: ShaderStage,
        defines: &[(String, String)],
    ) -> Result<CompiledStage> {
        let source = std::fs::read(file).map_err(|e| {
            GraphicsError::ShaderCompilation(format!(
                "Failed to read shader file {}: {}",
                file.display(),
                e
            ))
        })?;

        let source_name = CString::new(file.display().to_string())
            .map_err(|e| GraphicsError::ShaderCompilation(e.to_string()))?;
        let entry = CString::new(entry_point)
            .map_err(|e| GraphicsError::ShaderCompilation(e.to_string()))?;
        let target = CString::new(stage.target_profile())
            .map_err(|e| GraphicsError::ShaderCompilation(e.to_string()))?;

        // 宏定义数组以全零项结尾，CString 要活到编译结束
        let define_strings: Vec<(CString, CString)> = defines
            .iter()
            .map(|(name, value)| {
                Ok((
                    CString::new(name.as_str())
                        .map_err(|e| GraphicsError::ShaderCompilation(e.to_string()))?,
                    CString::new(value.as_str())
                        .map_err(|e| GraphicsError::ShaderCompilation(e.to_string()))?,
                ))
            })
            .collect::<Result<_>>()?;
        let mut macros: Vec<D3D_SHADER_MACRO> = define_strings
            .iter()
            .map(|(name, value)| D3D_SHADER_MACRO {
                Name: PCSTR(name.as_ptr() as *const u8),
                Definition: PCSTR(value.as_ptr() as *const u8),
            })
            .collect();
        macros.push(D3D_SHADER_MACRO::default());

        #[cfg(debug_assertions)]
        let flags = D3DCOMPILE_DEBUG | D3DCOMPILE_SKIP_OPTIMIZATION;
        #[cfg(not(debug_assertions))]
        let flags = 0u32;

        unsafe {
            let mut blob = None;
            let mut error_blob = None;
            let compile_result = D3DCompile(
                source.as_ptr() as *const _,
                source.len(),
                PCSTR(source_name.as_ptr() as *const u8),
                Some(macros.as_ptr()),
                None,
                PCSTR(entry.as_ptr() as *const u8),
                PCSTR(target.as_ptr() as *const u8),
                flags,
                0,
                &mut blob,
                Some(&mut error_blob),
            );
            if let Err(e) = compile_result {
                let detail = error_blob
                    .map(|error| {
                        String::from_utf8_lossy(std::slice::from_raw_parts(
                            error.GetBufferPointer() as *const u8,
                            error.GetBufferSize(),
                        ))
                        .to_string()
                    })
                    .unwrap_or_else(|| format!("{:?}", e));
                return Err(GraphicsError::ShaderCompilation(format!(
                    "{} {} in {}: {}",
                    stage.name(),
                    entry_point,
                    file.display(),
                    detail
                ))
                .into());
            }
            let blob = match blob {
                Some(blob) => blob,
                None => {
                    return Err(GraphicsError::ShaderCompilation(format!(
                        "{} compilation returned no bytecode",
                        stage.name()
                    ))
                    .into())
                }
            };
            let bytecode = std::slice::from_raw_parts(
                blob.GetBufferPointer() as *const u8,
                blob.GetBufferSize(),
            )
            .to_vec();

            // 反射绑定资源
            let mut reflector: Option<ID3D12ShaderReflection> = None;
            D3DReflect(
                bytecode.as_ptr() as *const _,
                bytecode.len(),
                &ID3D12ShaderReflection::IID,
                &mut reflector as *mut _ as *mut *mut std::ffi::c_void,
            )
            .map_err(|e| {
                GraphicsError::ShaderCompilation(format!(
                    "Failed to reflect {} {}: {:?}",
                    stage.name(),
                    entry_point,
                    e
                ))
            })?;
            let reflection = match reflector {
                Some(reflection) => reflection,
                None => {
                    return Err(GraphicsError::ShaderCompilation(format!(
                        "{} reflection returned no interface",
                        stage.name()
                    ))
                    .into())
                }
            };

            let mut shader_desc = D3D12_SHADER_DESC::default();
            reflection.GetDesc(&mut shader_desc).map_err(|e| {
                GraphicsError::ShaderCompilation(format!(
                    "Failed to get {} shader description: {:?}",
                    stage.name(),
                    e
                ))
            })?;

            let mut bound_resources = Vec::with_capacity(shader_desc.BoundResources as usize);
            for i in 0..shader_desc.BoundResources {
                let mut bind_desc = D3D12_SHADER_INPUT_BIND_DESC::default();
                reflection.GetResourceBindingDesc(i, &mut bind_desc).map_err(|e| {
                    GraphicsError::ShaderCompilation(format!(
                        "Failed to get resource binding {} of {}: {:?}",
                        i,
                        stage.name(),
                        e
                    ))
                })?;

                let name = bind_desc.Name.to_string().unwrap_or_default();
                let kind = classify(bind_desc.Type);
                let buffer_layout = if kind == BoundResourceKind::ConstantBuffer {
                    let cname = CString::new(name.as_str())
                        .map_err(|e| GraphicsError::ShaderCompilation(e.to_string()))?;
                    Some(reflect_buffer_layout(&reflection, &cname)?)
                } else {
                    None
                };

                debug!(
                    name,
                    kind = ?kind,
                    bind_point = bind_desc.BindPoint,
                    bind_count = bind_desc.BindCount,
                    space = bind_desc.Space,
                    "Shader resource reflected"
                );

                bound_resources.push(BoundResourceDesc {
                    name,
                    kind,
                    bind_point: bind_desc.BindPoint,
                    bind_count: bind_desc.BindCount,
                    register_space: bind_desc.Space,
                    buffer_layout,
                });
            }

            info!(
                file = %file.display(),
                entry = entry_point,
                stage = stage.name(),
                bytecode_size = bytecode.len(),
                resources = bound_resources.len(),
                "Shader compiled"
            );

            Ok(CompiledStage {
                bytecode,
                bound_resources,
            })
        }
    }
}
