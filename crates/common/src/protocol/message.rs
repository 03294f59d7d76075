/// Relay 消息信封定义

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::constants::SYSTEM_SENDER;
use super::types::{PresenceData, WelcomeData};
use crate::utils::now_millis;

/// 消息类型标签
///
/// 只有路由类标签会改变投递方式，其余标签原样透传并按广播处理。
/// `null` 与缺省一样视为空标签
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "Option<String>", into = "String")]
pub enum MessageKind {
    // 路由类
    Broadcast,
    Selective,
    AgentOnly,
    UserOnly,
    Metadata,

    // 系统生成
    Welcome,
    ClientJoined,
    ClientLeft,

    // Agent 应用消息
    Transcription,
    BotMessage,
    CancelAudio,

    // 信令类
    Offer,
    Answer,
    IceCandidate,

    /// 未识别的标签，原样透传
    Other(String),
}

impl MessageKind {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Broadcast => "broadcast",
            Self::Selective => "selective",
            Self::AgentOnly => "agent_only",
            Self::UserOnly => "user_only",
            Self::Metadata => "metadata",
            Self::Welcome => "welcome",
            Self::ClientJoined => "client_joined",
            Self::ClientLeft => "client_left",
            Self::Transcription => "transcription",
            Self::BotMessage => "bot_message",
            Self::CancelAudio => "cancel_audio",
            Self::Offer => "offer",
            Self::Answer => "answer",
            Self::IceCandidate => "ice_candidate",
            Self::Other(tag) => tag,
        }
    }
}

impl Default for MessageKind {
    fn default() -> Self {
        Self::Other(String::new())
    }
}

impl From<&str> for MessageKind {
    fn from(tag: &str) -> Self {
        match tag {
            "broadcast" => Self::Broadcast,
            "selective" => Self::Selective,
            "agent_only" => Self::AgentOnly,
            "user_only" => Self::UserOnly,
            "metadata" => Self::Metadata,
            "welcome" => Self::Welcome,
            "client_joined" => Self::ClientJoined,
            "client_left" => Self::ClientLeft,
            "transcription" => Self::Transcription,
            "bot_message" => Self::BotMessage,
            "cancel_audio" => Self::CancelAudio,
            "offer" => Self::Offer,
            "answer" => Self::Answer,
            "ice_candidate" => Self::IceCandidate,
            other => Self::Other(other.to_string()),
        }
    }
}

impl From<String> for MessageKind {
    fn from(tag: String) -> Self {
        Self::from(tag.as_str())
    }
}

impl From<Option<String>> for MessageKind {
    fn from(tag: Option<String>) -> Self {
        tag.map(Self::from).unwrap_or_default()
    }
}

impl From<MessageKind> for String {
    fn from(kind: MessageKind) -> Self {
        match kind {
            MessageKind::Other(tag) => tag,
            known => known.as_str().to_string(),
        }
    }
}

impl std::fmt::Display for MessageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 客户端发来的消息
///
/// `from` / `timestamp` 即使存在也会被忽略，由服务端重新填写
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InboundEnvelope {
    #[serde(rename = "type", default)]
    pub kind: MessageKind,

    /// 显式接收者列表（selective 时使用）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<Vec<String>>,

    #[serde(default)]
    pub data: Value,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Map<String, Value>>,
}

impl InboundEnvelope {
    pub fn new(kind: impl Into<MessageKind>, data: Value) -> Self {
        Self {
            kind: kind.into(),
            to: None,
            data,
            metadata: None,
        }
    }

    pub fn with_recipients(mut self, to: Vec<String>) -> Self {
        self.to = Some(to);
        self
    }

    /// 从 JSON 文本解析
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// 使用服务端确定的发送者和接收时间盖章
    pub fn stamp(self, from: impl Into<String>, timestamp: i64) -> Envelope {
        Envelope {
            kind: self.kind,
            from: from.into(),
            to: self.to.unwrap_or_default(),
            data: self.data,
            metadata: self.metadata,
            timestamp,
        }
    }
}

/// 服务端发出的消息
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(rename = "type")]
    pub kind: MessageKind,

    pub from: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub to: Vec<String>,

    #[serde(default)]
    pub data: Value,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Map<String, Value>>,

    pub timestamp: i64,
}

impl Envelope {
    /// 创建系统消息
    pub fn system(kind: MessageKind, data: Value) -> Self {
        Self {
            kind,
            from: SYSTEM_SENDER.to_string(),
            to: Vec::new(),
            data,
            metadata: None,
            timestamp: now_millis(),
        }
    }

    pub fn welcome(data: &WelcomeData) -> Result<Self, serde_json::Error> {
        Ok(Self::system(MessageKind::Welcome, serde_json::to_value(data)?))
    }

    pub fn client_joined(data: &PresenceData) -> Result<Self, serde_json::Error> {
        Ok(Self::system(MessageKind::ClientJoined, serde_json::to_value(data)?))
    }

    pub fn client_left(data: &PresenceData) -> Result<Self, serde_json::Error> {
        Ok(Self::system(MessageKind::ClientLeft, serde_json::to_value(data)?))
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}
