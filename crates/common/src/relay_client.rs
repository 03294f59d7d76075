/// Relay WebSocket 客户端
/// 
/// 以 user 或 agent 身份加入房间，收发控制消息和音频帧

use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message as WsMessage};
use tracing::{debug, info, warn};
use url::Url;

use crate::errors::{Error, Result};
use crate::protocol::{ClientType, Envelope, InboundEnvelope, MessageKind};

/// 客户端收到的事件
#[derive(Debug, Clone, PartialEq)]
pub enum RelayEvent {
    /// 控制消息
    Message(Envelope),
    /// 音频帧
    Audio(Vec<u8>),
    /// 连接已关闭
    Closed,
}

/// Relay 客户端
#[derive(Clone)]
pub struct RelayClient {
    room_id: String,
    client_id: String,
    client_type: ClientType,

    /// 发送消息的通道，由写任务独占 WebSocket 写端
    sender: mpsc::UnboundedSender<WsMessage>,
}

impl RelayClient {
    /// 构造加入房间的 WebSocket 地址
    pub fn endpoint(
        base_url: &str,
        room_id: &str,
        client_id: &str,
        client_type: ClientType,
    ) -> Result<Url> {
        let mut url = Url::parse(base_url)
            .map_err(|e| Error::InvalidArgument(format!("无效的 Relay 地址 {}: {}", base_url, e)))?;

        url.query_pairs_mut()
            .append_pair("room", room_id)
            .append_pair("clientId", client_id)
            .append_pair("type", client_type.as_str());

        Ok(url)
    }

    /// 连接 Relay 并加入房间
    pub async fn connect(
        base_url: &str,
        room_id: &str,
        client_id: &str,
        client_type: ClientType,
    ) -> Result<(Self, mpsc::UnboundedReceiver<RelayEvent>)> {
        let url = Self::endpoint(base_url, room_id, client_id, client_type)?;
        let (ws_stream, _) = connect_async(url.as_str()).await?;
        info!("✅ 已连接 Relay: room={}, client={} ({})", room_id, client_id, client_type);

        let (mut ws_sender, mut ws_receiver) = ws_stream.split();
        let (tx, mut rx) = mpsc::unbounded_channel::<WsMessage>();
        let (event_tx, event_rx) = mpsc::unbounded_channel::<RelayEvent>();

        // 写任务
        tokio::spawn(async move {
            while let Some(msg) = rx.recv().await {
                let closing = matches!(msg, WsMessage::Close(_));
                if let Err(e) = ws_sender.send(msg).await {
                    warn!("发送 Relay 消息失败: {}", e);
                    break;
                }
                if closing {
                    break;
                }
            }
            debug!("Relay 客户端发送任务结束");
        });

        // 读任务
        tokio::spawn(async move {
            while let Some(result) = ws_receiver.next().await {
                let event = match result {
                    Ok(WsMessage::Text(text)) => match Envelope::from_json(&text) {
                        Ok(envelope) => RelayEvent::Message(envelope),
                        Err(e) => {
                            warn!("解析 Relay 消息失败: {}", e);
                            continue;
                        }
                    },
                    Ok(WsMessage::Binary(data)) => RelayEvent::Audio(data),
                    Ok(WsMessage::Close(_)) => break,
                    Ok(_) => continue,
                    Err(e) => {
                        debug!("接收 Relay 消息错误: {}", e);
                        break;
                    }
                };

                if event_tx.send(event).is_err() {
                    break;
                }
            }
            let _ = event_tx.send(RelayEvent::Closed);
            debug!("Relay 客户端接收任务结束");
        });

        let client = Self {
            room_id: room_id.to_string(),
            client_id: client_id.to_string(),
            client_type,
            sender: tx,
        };

        Ok((client, event_rx))
    }

    pub fn room_id(&self) -> &str {
        &self.room_id
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    pub fn client_type(&self) -> ClientType {
        self.client_type
    }

    /// 发送控制消息
    pub fn send(&self, envelope: &InboundEnvelope) -> Result<()> {
        let json = envelope.to_json()?;
        self.sender
            .send(WsMessage::Text(json))
            .map_err(|_| Error::ConnectionClosed)
    }

    /// 发送指定类型的控制消息
    pub fn send_message(&self, kind: impl Into<MessageKind>, data: Value) -> Result<()> {
        self.send(&InboundEnvelope::new(kind, data))
    }

    /// 发送音频帧
    pub fn send_audio(&self, bytes: Vec<u8>) -> Result<()> {
        self.sender
            .send(WsMessage::Binary(bytes))
            .map_err(|_| Error::ConnectionClosed)
    }

    /// 主动关闭连接
    pub fn close(&self) -> Result<()> {
        self.sender
            .send(WsMessage::Close(None))
            .map_err(|_| Error::ConnectionClosed)
    }
}
