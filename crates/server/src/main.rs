/// Voice Relay - Server
/// 
/// 房间级 WebSocket 转发服务：在浏览器 user 与外部 AI agent 之间转发控制消息和音频帧，
/// 并提供简单的实例分配目录

mod api;
mod app;
mod app_state;
mod config;
mod services;
mod ws;

use tracing::info;

use crate::app_state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 加载环境变量
    dotenvy::dotenv().ok();

    // 加载配置
    let cfg = config::Config::from_env()?;

    // 初始化日志
    tracing_subscriber::fmt()
        .with_target(false)
        .with_thread_ids(true)
        .with_line_number(true)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cfg.log_level))
        )
        .init();

    info!("🚀 启动 Voice Relay Server...");
    info!("✅ 配置加载成功: 发送队列容量 {}", cfg.outbound_queue_capacity);

    // 创建应用状态（房间注册表和实例目录均为进程内存）
    let bind_addr = cfg.bind_addr();
    let app_state = AppState::new(cfg);

    // 构建应用路由
    let app = app::build_router(app_state);

    // 启动服务器
    info!("🎯 服务器监听在 http://{}", bind_addr);
    info!("  WebSocket: /ws?room=ROOM_ID&clientId=CLIENT_ID&type=user|agent");
    info!("  REST: GET /rooms, GET /room/ROOM_ID, POST /register, GET /allocate, GET /list");

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("服务器已停止");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("监听退出信号失败: {}", e);
    }
    info!("收到退出信号，正在关闭...");
}
