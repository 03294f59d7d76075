/// 配置管理

use common::protocol::constants::DEFAULT_RELAY_PORT;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server_host: String,
    pub server_port: u16,
    /// 每个连接的发送队列容量
    pub outbound_queue_capacity: usize,
    pub log_level: String,
}

impl Config {
    /// 从环境变量加载配置
    pub fn from_env() -> anyhow::Result<Self> {
        let server_host = std::env::var("SERVER_HOST")
            .unwrap_or_else(|_| "0.0.0.0".to_string());

        let server_port = std::env::var("SERVER_PORT")
            .unwrap_or_else(|_| DEFAULT_RELAY_PORT.to_string())
            .parse()?;

        let outbound_queue_capacity: usize = std::env::var("OUTBOUND_QUEUE_CAPACITY")
            .unwrap_or_else(|_| "256".to_string())
            .parse()?;

        if outbound_queue_capacity == 0 {
            anyhow::bail!("OUTBOUND_QUEUE_CAPACITY 必须大于 0");
        }

        let log_level = std::env::var("LOG_LEVEL")
            .unwrap_or_else(|_| "debug".to_string());

        Ok(Self {
            server_host,
            server_port,
            outbound_queue_capacity,
            log_level,
        })
    }

    /// 监听地址
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server_host, self.server_port)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_host: "0.0.0.0".to_string(),
            server_port: DEFAULT_RELAY_PORT,
            outbound_queue_capacity: 256,
            log_level: "debug".to_string(),
        }
    }
}
