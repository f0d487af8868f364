//! 纹理模块
//!
//! 负责从文件解码纹理像素并生成对应的着色器资源视图描述。
//! 解码使用 `image` crate，像素统一转换为 RGBA8。

use crate::core::error::{Result, TextureLoadError};
use crate::rhi::device::{TextureFormat, ViewDescription};
use std::path::{Path, PathBuf};
use tracing::info;

/// CPU 侧纹理数据
///
/// 持有解码后的 RGBA8 像素，GPU 资源由后端在上传时创建。
pub struct TextureData {
    /// 纹理名称（用于查找和调试）
    name: String,

    /// 源文件路径
    file_path: PathBuf,

    /// 宽度（像素）
    width: u32,

    /// 高度（像素）
    height: u32,

    /// RGBA8 像素数据，行优先
    pixels: Vec<u8>,
}

impl TextureData {
    /// 从文件加载纹理
    ///
    /// 任意 `image` 支持的格式都会被解码并转换为 RGBA8。
    pub fn load_from_file(name: impl Into<String>, path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(TextureLoadError::FileNotFound(path.to_path_buf()).into());
        }

        let decoded = image::open(path)
            .map_err(|e| TextureLoadError::DecodeError(e.to_string()))?;
        let rgba = decoded.to_rgba8();
        let (width, height) = rgba.dimensions();

        let name = name.into();
        info!(
            "Loaded texture '{}' from {} ({}x{})",
            name,
            path.display(),
            width,
            height
        );

        Ok(Self {
            name,
            file_path: path.to_path_buf(),
            width,
            height,
            pixels: rgba.into_raw(),
        })
    }

    /// 从内存中已解码的 RGBA8 像素创建纹理
    pub fn from_rgba8(
        name: impl Into<String>,
        width: u32,
        height: u32,
        pixels: Vec<u8>,
    ) -> Result<Self> {
        if pixels.len() != (width as usize) * (height as usize) * 4 {
            return Err(TextureLoadError::DecodeError(format!(
                "pixel buffer size {} does not match {}x{} RGBA8",
                pixels.len(),
                width,
                height
            ))
            .into());
        }

        Ok(Self {
            name: name.into(),
            file_path: PathBuf::new(),
            width,
            height,
            pixels,
        })
    }

    /// 纹理名称
    pub fn name(&self) -> &str {
        &self.name
    }

    /// 源文件路径
    pub fn file_path(&self) -> &Path {
        &self.file_path
    }

    /// 宽度（像素）
    pub fn width(&self) -> u32 {
        self.width
    }

    /// 高度（像素）
    pub fn height(&self) -> u32 {
        self.height
    }

    /// 一行像素的字节数
    pub fn row_pitch(&self) -> u32 {
        self.width * 4
    }

    /// RGBA8 像素字节
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// 像素格式
    pub fn format(&self) -> TextureFormat {
        TextureFormat::Rgba8Unorm
    }

    /// 生成该纹理对应的着色器资源视图描述
    pub fn srv_description(&self) -> ViewDescription {
        ViewDescription::ShaderResource {
            format: self.format(),
            most_detailed_mip: 0,
            mip_levels: 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::BoxRenderError;

    fn checker_pixels(width: u32, height: u32) -> Vec<u8> {
        let mut pixels = Vec::with_capacity((width * height * 4) as usize);
        for y in 0..height {
            for x in 0..width {
                let v = if (x + y) % 2 == 0 { 255 } else { 0 };
                pixels.extend_from_slice(&[v, v, v, 255]);
            }
        }
        pixels
    }

    #[test]
    fn test_from_rgba8() {
        let texture = TextureData::from_rgba8("checker", 4, 4, checker_pixels(4, 4))
            .expect("valid pixel buffer");
        assert_eq!(texture.name(), "checker");
        assert_eq!(texture.width(), 4);
        assert_eq!(texture.height(), 4);
        assert_eq!(texture.row_pitch(), 16);
        assert_eq!(texture.pixels().len(), 64);
    }

    #[test]
    fn test_from_rgba8_size_mismatch() {
        let result = TextureData::from_rgba8("bad", 4, 4, vec![0u8; 10]);
        assert!(matches!(
            result,
            Err(BoxRenderError::TextureLoading(TextureLoadError::DecodeError(_)))
        ));
    }

    #[test]
    fn test_missing_file() {
        let result =
            TextureData::load_from_file("missing", Path::new("/nonexistent/texture.png"));
        assert!(matches!(
            result,
            Err(BoxRenderError::TextureLoading(TextureLoadError::FileNotFound(_)))
        ));
    }

    #[test]
    fn test_load_from_file_round_trip() {
        let dir = std::env::temp_dir().join("box_render_texture_test");
        std::fs::create_dir_all(&dir).expect("create temp dir");
        let path = dir.join("checker.png");

        let img = image::RgbaImage::from_raw(4, 4, checker_pixels(4, 4))
            .expect("valid image buffer");
        img.save(&path).expect("save png");

        let texture = TextureData::load_from_file("checker", &path).expect("decode png");
        assert_eq!(texture.width(), 4);
        assert_eq!(texture.height(), 4);
        assert_eq!(texture.pixels(), checker_pixels(4, 4).as_slice());
        assert_eq!(
            texture.srv_description(),
            ViewDescription::ShaderResource {
                format: TextureFormat::Rgba8Unorm,
                most_detailed_mip: 0,
                mip_levels: 1,
            }
        );

        std::fs::remove_file(&path).ok();
    }
}
