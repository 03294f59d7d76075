/// 协议共享数据结构

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// 客户端类型
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ClientType {
    User,
    Agent,
}

impl ClientType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClientType::User => "user",
            ClientType::Agent => "agent",
        }
    }

    /// 解析查询参数中的 type，缺失或非法时默认为 user
    pub fn from_param(value: Option<&str>) -> Self {
        match value {
            Some("agent") => ClientType::Agent,
            _ => ClientType::User,
        }
    }

    /// 音频转发的目标类型
    pub fn opposite(&self) -> Self {
        match self {
            ClientType::User => ClientType::Agent,
            ClientType::Agent => ClientType::User,
        }
    }
}

impl std::fmt::Display for ClientType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 后端实例信息（分配目录条目）
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct ServerInfo {
    pub address: String,
    pub port: u16,
}

/// welcome 消息负载
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WelcomeData {
    pub room_id: String,
    pub client_id: String,
    pub client_type: ClientType,
    pub users: Vec<String>,
    pub agents: Vec<String>,
}

/// client_joined / client_left 消息负载
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PresenceData {
    pub client_id: String,
    pub client_type: ClientType,
}

/// 房间成员信息
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RoomMember {
    pub client_id: String,
    pub metadata: Map<String, Value>,
}

/// 房间详情（GET /room/{roomId}）
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RoomInfo {
    pub room_id: String,
    pub users: Vec<RoomMember>,
    pub agents: Vec<RoomMember>,
    pub created_at: i64,
}

/// 房间概要（GET /rooms）
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RoomSummary {
    pub room_id: String,
    pub user_count: usize,
    pub agent_count: usize,
    pub created_at: i64,
}
