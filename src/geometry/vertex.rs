//! 几何体顶点定义模块
//!
//! 定义上传到顶点缓冲区的顶点结构。

use bytemuck::{Pod, Zeroable};

/// 标准顶点结构
///
/// 内存布局与 GPU 输入布局一致，使用 `#[repr(C)]` 保证顺序和对齐。
///
/// # 内存布局
///
/// - position: 12 bytes (POSITION, offset 0)
/// - normal: 12 bytes (NORMAL, offset 12)
/// - tangent: 12 bytes (TANGENT, offset 24)
/// - texcoord: 8 bytes (TEXCOORD, offset 36)
/// - **总计**: 44 bytes
#[repr(C)]
#[derive(Default, Clone, Copy, Debug, Pod, Zeroable)]
pub struct Vertex {
    /// 顶点位置 (x, y, z)
    pub position: [f32; 3],

    /// 法线向量，归一化
    pub normal: [f32; 3],

    /// 切线向量，用于切线空间计算
    pub tangent: [f32; 3],

    /// 纹理坐标 (u, v)
    pub texcoord: [f32; 2],
}

impl Vertex {
    /// 创建一个新的顶点
    #[inline]
    pub fn new(
        position: [f32; 3],
        normal: [f32; 3],
        tangent: [f32; 3],
        texcoord: [f32; 2],
    ) -> Self {
        Self {
            position,
            normal,
            tangent,
            texcoord,
        }
    }

    /// 顶点字节跨距
    #[inline]
    pub const fn stride() -> usize {
        std::mem::size_of::<Self>()
    }
}
