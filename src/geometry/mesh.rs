//! 网格数据结构模块
//!
//! CPU 侧的网格数据容器，以及内置的几何体生成器。
//! 目前没有模型文件，几何来源是程序化生成的基础形状。

use super::vertex::Vertex;

/// CPU 侧网格数据
///
/// 持有顶点与 16 位索引，上传前通过
/// [`MeshData::vertex_bytes`] / [`MeshData::index_bytes`] 取得原始字节。
#[derive(Debug, Clone, Default)]
pub struct MeshData {
    /// 顶点数组
    pub vertices: Vec<Vertex>,

    /// 索引数组（16 位，3 个一组构成三角形）
    pub indices: Vec<u16>,
}

impl MeshData {
    /// 创建空网格
    pub fn new() -> Self {
        Self::default()
    }

    /// 顶点数量
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    /// 索引数量
    pub fn index_count(&self) -> usize {
        self.indices.len()
    }

    /// 三角形数量
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// 顶点数据的原始字节，用于填充顶点缓冲区
    pub fn vertex_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.vertices)
    }

    /// 索引数据的原始字节，用于填充索引缓冲区
    pub fn index_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.indices)
    }

    // ========== 几何体生成 ==========

    /// 生成立方体网格
    ///
    /// 每个面 4 个独立顶点（法线与 UV 不共享），共 24 个顶点、
    /// 12 个三角形。UV 原点在每个面的左上角。
    pub fn create_box(width: f32, height: f32, depth: f32) -> Self {
        let w2 = 0.5 * width;
        let h2 = 0.5 * height;
        let d2 = 0.5 * depth;

        #[rustfmt::skip]
        let vertices = vec![
            // 前面 (-Z)
            Vertex::new([-w2, -h2, -d2], [0.0, 0.0, -1.0], [1.0, 0.0, 0.0], [0.0, 1.0]),
            Vertex::new([-w2,  h2, -d2], [0.0, 0.0, -1.0], [1.0, 0.0, 0.0], [0.0, 0.0]),
            Vertex::new([ w2,  h2, -d2], [0.0, 0.0, -1.0], [1.0, 0.0, 0.0], [1.0, 0.0]),
            Vertex::new([ w2, -h2, -d2], [0.0, 0.0, -1.0], [1.0, 0.0, 0.0], [1.0, 1.0]),
            // 后面 (+Z)
            Vertex::new([-w2, -h2,  d2], [0.0, 0.0, 1.0], [-1.0, 0.0, 0.0], [1.0, 1.0]),
            Vertex::new([ w2, -h2,  d2], [0.0, 0.0, 1.0], [-1.0, 0.0, 0.0], [0.0, 1.0]),
            Vertex::new([ w2,  h2,  d2], [0.0, 0.0, 1.0], [-1.0, 0.0, 0.0], [0.0, 0.0]),
            Vertex::new([-w2,  h2,  d2], [0.0, 0.0, 1.0], [-1.0, 0.0, 0.0], [1.0, 0.0]),
            // 顶面 (+Y)
            Vertex::new([-w2,  h2, -d2], [0.0, 1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0]),
            Vertex::new([-w2,  h2,  d2], [0.0, 1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0]),
            Vertex::new([ w2,  h2,  d2], [0.0, 1.0, 0.0], [1.0, 0.0, 0.0], [1.0, 0.0]),
            Vertex::new([ w2,  h2, -d2], [0.0, 1.0, 0.0], [1.0, 0.0, 0.0], [1.0, 1.0]),
            // 底面 (-Y)
            Vertex::new([-w2, -h2, -d2], [0.0, -1.0, 0.0], [-1.0, 0.0, 0.0], [1.0, 1.0]),
            Vertex::new([ w2, -h2, -d2], [0.0, -1.0, 0.0], [-1.0, 0.0, 0.0], [0.0, 1.0]),
            Vertex::new([ w2, -h2,  d2], [0.0, -1.0, 0.0], [-1.0, 0.0, 0.0], [0.0, 0.0]),
            Vertex::new([-w2, -h2,  d2], [0.0, -1.0, 0.0], [-1.0, 0.0, 0.0], [1.0, 0.0]),
            // 左面 (-X)
            Vertex::new([-w2, -h2,  d2], [-1.0, 0.0, 0.0], [0.0, 0.0, -1.0], [0.0, 1.0]),
            Vertex::new([-w2,  h2,  d2], [-1.0, 0.0, 0.0], [0.0, 0.0, -1.0], [0.0, 0.0]),
            Vertex::new([-w2,  h2, -d2], [-1.0, 0.0, 0.0], [0.0, 0.0, -1.0], [1.0, 0.0]),
            Vertex::new([-w2, -h2, -d2], [-1.0, 0.0, 0.0], [0.0, 0.0, -1.0], [1.0, 1.0]),
            // 右面 (+X)
            Vertex::new([ w2, -h2, -d2], [1.0, 0.0, 0.0], [0.0, 0.0, 1.0], [0.0, 1.0]),
            Vertex::new([ w2,  h2, -d2], [1.0, 0.0, 0.0], [0.0, 0.0, 1.0], [0.0, 0.0]),
            Vertex::new([ w2,  h2,  d2], [1.0, 0.0, 0.0], [0.0, 0.0, 1.0], [1.0, 0.0]),
            Vertex::new([ w2, -h2,  d2], [1.0, 0.0, 0.0], [0.0, 0.0, 1.0], [1.0, 1.0]),
        ];

        #[rustfmt::skip]
        let indices: Vec<u16> = vec![
            // 前面
            0, 1, 2,    0, 2, 3,
            // 后面
            4, 5, 6,    4, 6, 7,
            // 顶面
            8, 9, 10,   8, 10, 11,
            // 底面
            12, 13, 14, 12, 14, 15,
            // 左面
            16, 17, 18, 16, 18, 19,
            // 右面
            20, 21, 22, 20, 22, 23,
        ];

        Self { vertices, indices }
    }
}
