/// 客户端连接句柄
/// 
/// 每个 WebSocket 连接对应一个句柄，持有有界发送队列和关闭信号。
/// 所有投递都通过非阻塞入队完成，队列满时断开该慢速连接。

use chrono::{DateTime, Utc};
use common::ClientType;
use serde_json::{Map, Value};
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};
use tokio::sync::mpsc::error::TrySendError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// 待写出的帧
#[derive(Debug, Clone, PartialEq)]
pub enum OutboundFrame {
    /// 已序列化的 JSON 消息
    Text(String),
    /// 音频数据
    Binary(Vec<u8>),
}

/// 投递错误
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum DeliveryError {
    #[error("发送队列已满，连接已断开")]
    Overflow,

    #[error("连接已关闭")]
    Closed,
}

/// 客户端连接
pub struct ClientHandle {
    /// 连接 ID（服务端生成，区分同一 client_id 的先后连接）
    pub connection_id: String,

    /// 所在房间
    pub room_id: String,

    /// 客户端 ID
    pub client_id: String,

    /// 客户端类型
    pub client_type: ClientType,

    /// 连接时间
    pub connected_at: DateTime<Utc>,

    /// 发送队列
    sender: mpsc::Sender<OutboundFrame>,

    /// 关闭信号，写任务监听
    closer: CancellationToken,

    /// 客户端元数据
    metadata: RwLock<Map<String, Value>>,
}

impl ClientHandle {
    pub fn new(
        room_id: impl Into<String>,
        client_id: impl Into<String>,
        client_type: ClientType,
        sender: mpsc::Sender<OutboundFrame>,
        closer: CancellationToken,
    ) -> Self {
        Self {
            connection_id: common::utils::generate_id(),
            room_id: room_id.into(),
            client_id: client_id.into(),
            client_type,
            connected_at: Utc::now(),
            sender,
            closer,
            metadata: RwLock::new(Map::new()),
        }
    }

    /// 非阻塞投递一帧
    pub fn deliver(&self, frame: OutboundFrame) -> Result<(), DeliveryError> {
        match self.sender.try_send(frame) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => {
                warn!(
                    "客户端 {} (room {}) 发送队列已满，断开连接",
                    self.client_id, self.room_id
                );
                self.disconnect();
                Err(DeliveryError::Overflow)
            }
            Err(TrySendError::Closed(_)) => Err(DeliveryError::Closed),
        }
    }

    /// 通知写任务关闭连接
    pub fn disconnect(&self) {
        self.closer.cancel();
    }

    pub fn is_disconnected(&self) -> bool {
        self.closer.is_cancelled()
    }

    /// 合并元数据，相同的 key 被覆盖
    pub async fn merge_metadata(&self, patch: Map<String, Value>) {
        let mut metadata = self.metadata.write().await;
        for (key, value) in patch {
            metadata.insert(key, value);
        }
    }

    /// 获取元数据副本
    pub async fn metadata(&self) -> Map<String, Value> {
        self.metadata.read().await.clone()
    }
}

impl std::fmt::Debug for ClientHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientHandle")
            .field("connection_id", &self.connection_id)
            .field("room_id", &self.room_id)
            .field("client_id", &self.client_id)
            .field("client_type", &self.client_type)
            .finish()
    }
}

/// 向一组接收者逐个投递，单个失败不影响其余接收者
///
/// 返回成功入队的数量
pub fn fan_out(recipients: &[Arc<ClientHandle>], frame: OutboundFrame) -> usize {
    let mut count = 0;

    for client in recipients {
        // 正在断开的连接不再入队
        if client.is_disconnected() {
            continue;
        }
        match client.deliver(frame.clone()) {
            Ok(()) => count += 1,
            Err(e) => {
                warn!("向客户端 {} 投递失败: {}", client.client_id, e);
            }
        }
    }

    debug!("消息已投递到 {}/{} 个客户端", count, recipients.len());
    count
}
