//! 错误处理模块
//!
//! 定义了引擎中使用的统一错误类型，为每种错误提供清晰的上下文信息。
//!
//! # 错误分类
//!
//! - **设备/驱动失败**（着色器编译失败、资源创建失败、根签名序列化失败）：
//!   以 `Err` 的形式向上传播，在初始化阶段立即中止，不做重试
//! - **程序契约违规**（描述符缓存溢出、绑定缺失、参数类型不匹配等）：
//!   使用 `assert!`/`panic!` 直接终止，这些属于配置/代码错误，
//!   不属于可恢复的运行时路径

use std::fmt;
use std::path::PathBuf;

/// 引擎统一的 Result 类型
///
/// 所有可能返回错误的函数都应该使用这个类型。
pub type Result<T> = std::result::Result<T, BoxRenderError>;

/// BoxRender 引擎的错误类型
///
/// 包含了引擎运行过程中可能遇到的各种错误情况。
#[derive(Debug)]
pub enum BoxRenderError {
    /// 配置错误
    Config(ConfigError),

    /// 图形 API 错误
    Graphics(GraphicsError),

    /// 纹理加载错误
    TextureLoading(TextureLoadError),

    /// IO 错误
    Io(std::io::Error),

    /// 初始化错误
    Initialization(String),

    /// 运行时错误
    Runtime(String),
}

/// 配置相关的错误
#[derive(Debug)]
pub enum ConfigError {
    /// 配置文件未找到
    FileNotFound(String),

    /// 配置文件解析失败
    ParseError(String),

    /// 配置值无效
    InvalidValue { field: String, reason: String },
}

/// 图形 API 相关的错误
#[derive(Debug)]
pub enum GraphicsError {
    /// 设备创建失败
    DeviceCreation(String),

    /// 交换链错误
    SwapchainError(String),

    /// 着色器编译失败
    ShaderCompilation(String),

    /// 着色器反射失败
    ShaderReflection(String),

    /// 根签名序列化/创建失败
    RootSignatureCreation(String),

    /// 资源创建失败
    ResourceCreation(String),

    /// 渲染命令执行失败
    CommandExecution(String),
}

/// 纹理加载相关的错误
#[derive(Debug)]
pub enum TextureLoadError {
    /// 文件不存在
    FileNotFound(PathBuf),

    /// 解码失败
    DecodeError(String),

    /// 不支持的像素格式
    UnsupportedFormat(String),
}

impl fmt::Display for BoxRenderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BoxRenderError::Config(e) => write!(f, "Configuration error: {}", e),
            BoxRenderError::Graphics(e) => write!(f, "Graphics error: {}", e),
            BoxRenderError::TextureLoading(e) => write!(f, "Texture loading error: {}", e),
            BoxRenderError::Io(e) => write!(f, "IO error: {}", e),
            BoxRenderError::Initialization(msg) => write!(f, "Initialization error: {}", msg),
            BoxRenderError::Runtime(msg) => write!(f, "Runtime error: {}", msg),
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::FileNotFound(path) => write!(f, "Config file not found: {}", path),
            ConfigError::ParseError(msg) => write!(f, "Failed to parse config: {}", msg),
            ConfigError::InvalidValue { field, reason } => {
                write!(f, "Invalid value for '{}': {}", field, reason)
            }
        }
    }
}

impl fmt::Display for GraphicsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GraphicsError::DeviceCreation(msg) => write!(f, "Device creation failed: {}", msg),
            GraphicsError::SwapchainError(msg) => write!(f, "Swapchain error: {}", msg),
            GraphicsError::ShaderCompilation(msg) => {
                write!(f, "Shader compilation failed: {}", msg)
            }
            GraphicsError::ShaderReflection(msg) => write!(f, "Shader reflection failed: {}", msg),
            GraphicsError::RootSignatureCreation(msg) => {
                write!(f, "Root signature creation failed: {}", msg)
            }
            GraphicsError::ResourceCreation(msg) => write!(f, "Resource creation failed: {}", msg),
            GraphicsError::CommandExecution(msg) => write!(f, "Command execution failed: {}", msg),
        }
    }
}

impl fmt::Display for TextureLoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TextureLoadError::FileNotFound(path) => {
                write!(f, "Texture file not found: {}", path.display())
            }
            TextureLoadError::DecodeError(msg) => write!(f, "Failed to decode texture: {}", msg),
            TextureLoadError::UnsupportedFormat(msg) => {
                write!(f, "Unsupported texture format: {}", msg)
            }
        }
    }
}

impl std::error::Error for BoxRenderError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            BoxRenderError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl std::error::Error for ConfigError {}
impl std::error::Error for GraphicsError {}
impl std::error::Error for TextureLoadError {}

// 实现 From trait 以便于错误转换
impl From<std::io::Error> for BoxRenderError {
    fn from(err: std::io::Error) -> Self {
        BoxRenderError::Io(err)
    }
}

impl From<ConfigError> for BoxRenderError {
    fn from(err: ConfigError) -> Self {
        BoxRenderError::Config(err)
    }
}

impl From<GraphicsError> for BoxRenderError {
    fn from(err: GraphicsError) -> Self {
        BoxRenderError::Graphics(err)
    }
}

impl From<TextureLoadError> for BoxRenderError {
    fn from(err: TextureLoadError) -> Self {
        BoxRenderError::TextureLoading(err)
    }
}
