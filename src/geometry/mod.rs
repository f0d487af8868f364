//! 几何体模块
//!
//! 提供顶点定义与 CPU 侧网格数据，几何来源是程序化生成的
//! 基础形状。

pub mod mesh;
pub mod vertex;

pub use mesh::MeshData;
pub use vertex::Vertex;
