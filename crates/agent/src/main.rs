/// Voice Relay - Agent
/// 
/// 以 agent 身份加入一个房间的传输层代理，负责连接保持和消息收发

mod config;
mod session;

use tracing::info;

use session::AgentSession;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 加载配置
    dotenvy::dotenv().ok();
    let cfg = config::Config::from_env()?;

    // 初始化日志
    // 可以通过环境变量 RUST_LOG 设置日志级别，例如：
    // RUST_LOG=agent=debug cargo run -p agent
    tracing_subscriber::fmt()
        .with_target(false)
        .with_thread_ids(true)
        .with_line_number(true)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cfg.log_level))
        )
        .init();

    info!("🚀 启动 Voice Relay Agent...");
    info!("🎯 Relay: {}", cfg.relay_url);
    info!("📌 房间: {}, Agent ID: {}", cfg.room_id, cfg.agent_id);

    // 运行会话（会自动重连）
    AgentSession::new(cfg).run().await
}
