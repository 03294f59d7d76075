/// 配置管理

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub relay_url: String,
    pub room_id: String,
    pub agent_id: String,
    pub greeting: String,
    pub reconnect_interval: u64,
    pub log_level: String,
}

impl Config {
    /// 从环境变量加载配置
    pub fn from_env() -> anyhow::Result<Self> {
        let relay_url = std::env::var("RELAY_URL")
            .unwrap_or_else(|_| "ws://localhost:8080/ws".to_string());

        let room_id = std::env::var("ROOM_ID")
            .map_err(|_| anyhow::anyhow!("缺少环境变量 ROOM_ID"))?;

        let agent_id = std::env::var("AGENT_ID")
            .unwrap_or_else(|_| uuid::Uuid::new_v4().to_string());

        let greeting = std::env::var("GREETING")
            .unwrap_or_else(|_| "Hi, I'm connected and ready.".to_string());

        let reconnect_interval = std::env::var("RECONNECT_INTERVAL")
            .unwrap_or_else(|_| "5".to_string())
            .parse()?;

        let log_level = std::env::var("LOG_LEVEL")
            .unwrap_or_else(|_| "debug".to_string());

        Ok(Self {
            relay_url,
            room_id,
            agent_id,
            greeting,
            reconnect_interval,
            log_level,
        })
    }
}
