/// Relay 协议模块
/// 
/// 定义 Relay Server 与 user / agent 客户端之间的消息格式和共享数据结构

pub mod message;
pub mod types;

pub use message::{Envelope, InboundEnvelope, MessageKind};
pub use types::*;

/// 常量定义
pub mod constants {
    /// 系统消息的发送者 ID
    pub const SYSTEM_SENDER: &str = "system";

    /// 默认 Relay 端口
    pub const DEFAULT_RELAY_PORT: u16 = 8080;

    /// WebSocket 入口路径
    pub const WS_PATH: &str = "/ws";
}
