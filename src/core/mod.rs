//! 核心模块
//!
//! 包含配置、日志、错误处理和数学类型等基础设施。

pub mod config;
pub mod error;
pub mod log;
pub mod math;

pub use config::Config;
pub use error::{BoxRenderError, GraphicsError, Result};
