/// Build script for BoxRender
///
/// # Shader Compilation Strategy:
/// - HLSL shaders are compiled at runtime via D3DCompile; this script only
///   triggers a rebuild when the shader source changes
fn main() {
    println!("cargo:rerun-if-changed=src/gfx/dx12/shaders/box.hlsl");
}
