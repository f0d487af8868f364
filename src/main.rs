//! BoxRender - DirectX 12 盒子渲染器
//!
//! 在窗口里绘制一个带纹理的旋转盒子，展示整条渲染管线：
//! 描述符分配、着色器反射、根签名构建、材质按名设参。
//!
//! # 使用方法
//!
//! ```bash
//! cargo run
//!
//! # 命令行覆盖窗口尺寸
//! cargo run -- --width 1280 --height 720
//! ```
//!
//! # 初始化流程
//!
//! 1. 加载配置文件（config.toml）
//! 2. 应用命令行参数覆盖
//! 3. 初始化日志系统
//! 4. 创建事件循环和渲染器
//! 5. 启动主循环
//!
//! # 事件处理
//!
//! - `WindowEvent::CloseRequested`：等待 GPU 空闲后退出
//! - `WindowEvent::Resized`：重建交换链和深度缓冲
//! - `WindowEvent::RedrawRequested`：绘制一帧
//! - `Event::AboutToWait`：请求下一次重绘，保持持续渲染

use box_render::core::{log, Config};
use tracing::info;

fn main() {
    // 1. 加载配置（在初始化日志之前）
    let mut config = Config::from_file_or_default("config.toml");

    // 2. 应用命令行参数
    config.apply_args(std::env::args());

    // 3. 验证配置
    if let Err(e) = config.validate() {
        eprintln!("Invalid configuration: {}", e);
        std::process::exit(1);
    }

    // 4. 初始化日志系统
    let log_file = if config.logging.file_output {
        Some(config.logging.log_file.as_str())
    } else {
        None
    };
    log::init_logger(config.logging.level, config.logging.file_output, log_file);
    info!("BoxRender starting...");
    info!(version = env!("CARGO_PKG_VERSION"), "Application initialized");

    info!(
        width = config.window.width,
        height = config.window.height,
        vsync = config.graphics.vsync,
        "Graphics configuration"
    );

    #[cfg(target_os = "windows")]
    run(config);

    #[cfg(not(target_os = "windows"))]
    {
        tracing::error!("BoxRender requires DirectX 12 and only runs on Windows");
        eprintln!("BoxRender requires DirectX 12 and only runs on Windows");
        std::process::exit(1);
    }
}

/// 创建渲染器并驱动主循环
#[cfg(target_os = "windows")]
fn run(config: Config) {
    use box_render::gfx::Renderer;
    use tracing::{debug, error};
    use winit::event::{Event, WindowEvent};
    use winit::event_loop::EventLoop;

    let event_loop = match EventLoop::new() {
        Ok(event_loop) => event_loop,
        Err(e) => {
            error!("Failed to create event loop: {}", e);
            eprintln!("Failed to create event loop: {}", e);
            std::process::exit(1);
        }
    };

    let mut renderer = match Renderer::new(&event_loop, &config) {
        Ok(renderer) => renderer,
        Err(e) => {
            error!("Failed to initialize renderer: {}", e);
            eprintln!("Failed to initialize renderer: {}", e);
            std::process::exit(1);
        }
    };

    info!("Renderer initialized successfully");
    info!("Entering main loop...");

    let result = event_loop.run(move |event, elwt| match event {
        Event::WindowEvent { event, .. } => match event {
            WindowEvent::CloseRequested => {
                info!("Close requested, shutting down...");
                if let Err(e) = renderer.wait_idle() {
                    error!("Failed to flush GPU on shutdown: {}", e);
                }
                elwt.exit();
            }
            WindowEvent::Resized(new_size) => {
                debug!(
                    width = new_size.width,
                    height = new_size.height,
                    "Window resized"
                );
                if let Err(e) = renderer.resize(new_size.width, new_size.height) {
                    error!("Resize failed: {}", e);
                    elwt.exit();
                }
            }
            WindowEvent::RedrawRequested => {
                if let Err(e) = renderer.draw() {
                    error!("Draw failed: {}", e);
                    elwt.exit();
                }
            }
            _ => (),
        },
        Event::AboutToWait => renderer.window().request_redraw(),
        _ => (),
    });

    if let Err(e) = result {
        error!("Event loop terminated with error: {}", e);
    }
}
