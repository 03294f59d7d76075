/// WebSocket 连接网关
/// 
/// 校验加入参数、管理每个连接的读写循环，并在连接结束时从注册表中注销

use axum::extract::ws::{Message as AxumWsMessage, WebSocket};
use axum::extract::{Query, State, WebSocketUpgrade};
use axum::response::{IntoResponse, Response};
use common::protocol::{Envelope, InboundEnvelope, PresenceData, WelcomeData};
use common::utils::now_millis;
use common::ClientType;
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::audio::relay_audio;
use super::connection::{ClientHandle, OutboundFrame};
use super::registry::{RoomRegistry, RoomSnapshot};
use super::router::{broadcast_system, dispatch};
use crate::api::ApiError;
use crate::app_state::AppState;

/// 关闭握手的最长等待时间，对端不再读取时放弃握手直接断开
const CLOSE_TIMEOUT: Duration = Duration::from_secs(1);

/// 加入房间的查询参数
#[derive(Debug, Deserialize)]
pub struct JoinQuery {
    pub room: Option<String>,
    #[serde(rename = "clientId")]
    pub client_id: Option<String>,
    #[serde(rename = "type")]
    pub client_type: Option<String>,
}

/// WebSocket 升级处理器
pub async fn handle_room_websocket(
    ws: WebSocketUpgrade,
    Query(query): Query<JoinQuery>,
    State(state): State<AppState>,
) -> Response {
    let Some(room_id) = query.room.filter(|r| !r.is_empty()) else {
        return ApiError::BadRequest("缺少 room 参数".to_string()).into_response();
    };

    let Some(client_id) = query.client_id.filter(|c| !c.is_empty()) else {
        return ApiError::BadRequest("缺少 clientId 参数".to_string()).into_response();
    };

    let client_type = ClientType::from_param(query.client_type.as_deref());

    ws.on_upgrade(move |socket| handle_room_connection(socket, state, room_id, client_id, client_type))
}

/// 处理一个房间连接的完整生命周期
async fn handle_room_connection(
    socket: WebSocket,
    state: AppState,
    room_id: String,
    client_id: String,
    client_type: ClientType,
) {
    let registry = state.registry();
    let (mut ws_sender, mut ws_receiver) = socket.split();

    // 有界发送队列，写任务独占 WebSocket 写端
    let (tx, mut rx) = mpsc::channel::<OutboundFrame>(state.config().outbound_queue_capacity);
    let closer = CancellationToken::new();
    let client = Arc::new(ClientHandle::new(room_id, client_id, client_type, tx, closer.clone()));

    // welcome 在注册表写锁内入队，先于任何其他成员的通告
    let stale = registry
        .admit(client.clone(), |snapshot| send_welcome(&client, snapshot))
        .await;
    if let Some(stale) = stale {
        warn!(
            "客户端 {} 重复加入房间 {}，关闭旧连接 {}",
            client.client_id, client.room_id, stale.connection_id
        );
        stale.disconnect();
    }

    info!(
        "客户端 {} ({}) 加入房间 {}, connection={}",
        client.client_id, client.client_type, client.room_id, client.connection_id
    );

    announce(&registry, &client, Envelope::client_joined).await;

    // 创建消息发送任务
    // 写入本身也与关闭信号竞争，对端停止读取时写入会一直阻塞
    let writer_closer = closer.clone();
    let mut send_task = tokio::spawn(async move {
        loop {
            let frame = tokio::select! {
                biased;
                _ = writer_closer.cancelled() => break,
                frame = rx.recv() => match frame {
                    Some(frame) => frame,
                    None => break,
                },
            };

            tokio::select! {
                biased;
                _ = writer_closer.cancelled() => break,
                result = ws_sender.send(to_ws_message(frame)) => {
                    if let Err(e) = result {
                        error!("发送 WebSocket 消息失败: {}", e);
                        break;
                    }
                }
            }
        }

        if tokio::time::timeout(CLOSE_TIMEOUT, ws_sender.close()).await.is_err() {
            debug!("关闭握手超时，直接断开");
        }
        debug!("消息发送任务结束");
    });

    // 创建消息接收任务
    let recv_client = client.clone();
    let recv_registry = registry.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(result) = ws_receiver.next().await {
            match result {
                Ok(msg) => {
                    if !handle_incoming_message(msg, &recv_client, &recv_registry).await {
                        break;
                    }
                }
                Err(e) => {
                    warn!("接收消息错误 (room {}, client {}): {}", recv_client.room_id, recv_client.client_id, e);
                    break;
                }
            }
        }
        debug!("消息接收任务结束");
    });

    // 等待任一任务完成，或连接被判定为慢速 / 被新连接替换
    tokio::select! {
        _ = &mut send_task => {
            debug!("发送任务已结束");
            recv_task.abort();
        }
        _ = &mut recv_task => {
            debug!("接收任务已结束");
            closer.cancel();
            let _ = send_task.await;
        }
        _ = closer.cancelled() => {
            debug!("连接 {} 被服务端关闭", client.connection_id);
            recv_task.abort();
        }
    }

    // 清理：从注册表中注销
    let outcome = registry.remove(&client).await;
    if outcome.room_evicted {
        debug!("当前房间数: {}", registry.count().await);
    } else if outcome.removed {
        announce(&registry, &client, Envelope::client_left).await;
    }

    let duration = chrono::Utc::now() - client.connected_at;
    info!(
        "客户端 {} ({}) 离开房间 {}, connection={}, 在线 {} 秒",
        client.client_id,
        client.client_type,
        client.room_id,
        client.connection_id,
        duration.num_seconds()
    );
}

/// 处理收到的帧，返回 false 表示连接应当结束
async fn handle_incoming_message(
    ws_msg: AxumWsMessage,
    client: &ClientHandle,
    registry: &RoomRegistry,
) -> bool {
    match ws_msg {
        AxumWsMessage::Text(text) => {
            match InboundEnvelope::from_json(&text) {
                Ok(inbound) => {
                    let envelope = inbound.stamp(client.client_id.clone(), now_millis());
                    dispatch(registry, client, envelope).await;
                }
                Err(e) => {
                    warn!(
                        "解析 JSON 失败 (room {}, client {}): {}",
                        client.room_id, client.client_id, e
                    );
                }
            }
            true
        }
        AxumWsMessage::Binary(data) => {
            relay_audio(registry, client, data).await;
            true
        }
        AxumWsMessage::Close(_) => {
            debug!("客户端 {} 关闭连接", client.client_id);
            false
        }
        other => {
            debug!("忽略其他类型的帧: {:?}", other);
            true
        }
    }
}

/// 向新加入的客户端发送 welcome
///
/// 在注册表写锁内调用，只做序列化和非阻塞入队
fn send_welcome(client: &ClientHandle, snapshot: &RoomSnapshot) {
    let data = WelcomeData {
        room_id: client.room_id.clone(),
        client_id: client.client_id.clone(),
        client_type: client.client_type,
        users: snapshot.user_ids(),
        agents: snapshot.agent_ids(),
    };

    match Envelope::welcome(&data).and_then(|envelope| envelope.to_json()) {
        Ok(json) => {
            if let Err(e) = client.deliver(OutboundFrame::Text(json)) {
                warn!("发送 welcome 失败: {}", e);
            }
        }
        Err(e) => error!("序列化 welcome 失败: {}", e),
    }
}

/// 向房间内其他成员通告加入 / 离开
async fn announce(
    registry: &RoomRegistry,
    client: &ClientHandle,
    build: fn(&PresenceData) -> Result<Envelope, serde_json::Error>,
) {
    let data = PresenceData {
        client_id: client.client_id.clone(),
        client_type: client.client_type,
    };

    match build(&data) {
        Ok(envelope) => {
            let count = broadcast_system(registry, &client.room_id, &client.connection_id, &envelope).await;
            debug!("{} 通告已发送到 {} 个客户端", envelope.kind, count);
        }
        Err(e) => error!("序列化系统消息失败: {}", e),
    }
}

fn to_ws_message(frame: OutboundFrame) -> AxumWsMessage {
    match frame {
        OutboundFrame::Text(text) => AxumWsMessage::Text(text),
        OutboundFrame::Binary(data) => AxumWsMessage::Binary(data),
    }
}
