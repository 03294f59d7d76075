/// 消息路由
/// 
/// 按消息类型标签把控制消息分发给房间内的接收者

use common::protocol::Envelope;
use common::MessageKind;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, warn};

use super::connection::{fan_out, ClientHandle, OutboundFrame};
use super::registry::{RoomRegistry, RoomSnapshot};

/// 投递规则
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// 房间内除发送者外的所有成员
    Broadcast,
    /// 显式接收者列表
    Selective,
    /// 除发送者外的所有 agent
    AgentOnly,
    /// 除发送者外的所有 user
    UserOnly,
    /// 不转发，合并到发送者自身的元数据
    UpdateMetadata,
}

impl From<&MessageKind> for Route {
    fn from(kind: &MessageKind) -> Self {
        match kind {
            MessageKind::Selective => Route::Selective,
            MessageKind::AgentOnly => Route::AgentOnly,
            MessageKind::UserOnly => Route::UserOnly,
            MessageKind::Metadata => Route::UpdateMetadata,
            _ => Route::Broadcast,
        }
    }
}

/// 解析接收者
///
/// `sender_connection_id` 用于排除发送者本身；selective 不排除发送者
pub fn resolve_recipients(
    snapshot: &RoomSnapshot,
    sender_connection_id: &str,
    route: Route,
    targets: &[String],
) -> Vec<Arc<ClientHandle>> {
    let not_sender = |c: &&Arc<ClientHandle>| c.connection_id != sender_connection_id;

    match route {
        Route::Selective if !targets.is_empty() => {
            let mut seen = HashSet::new();
            let mut recipients = Vec::new();

            for target in targets {
                if !seen.insert(target.as_str()) {
                    continue;
                }
                // 两个池都查找，同名时两边都收到
                recipients.extend(snapshot.members().filter(|c| &c.client_id == target).cloned());
            }

            recipients
        }
        Route::Broadcast | Route::Selective => snapshot.members().filter(not_sender).cloned().collect(),
        Route::AgentOnly => snapshot.agents.iter().filter(not_sender).cloned().collect(),
        Route::UserOnly => snapshot.users.iter().filter(not_sender).cloned().collect(),
        Route::UpdateMetadata => Vec::new(),
    }
}

/// 分发一条已盖章的消息
///
/// 返回成功入队的接收者数量
pub async fn dispatch(registry: &RoomRegistry, sender: &ClientHandle, envelope: Envelope) -> usize {
    let route = Route::from(&envelope.kind);

    if route == Route::UpdateMetadata {
        update_metadata(sender, envelope.data).await;
        return 0;
    }

    let Some(snapshot) = registry.snapshot(&sender.room_id).await else {
        debug!("房间 {} 不存在，丢弃消息", sender.room_id);
        return 0;
    };

    let recipients = resolve_recipients(&snapshot, &sender.connection_id, route, &envelope.to);
    if recipients.is_empty() {
        return 0;
    }

    let json = match envelope.to_json() {
        Ok(json) => json,
        Err(e) => {
            warn!("序列化消息失败: {}", e);
            return 0;
        }
    };

    let count = fan_out(&recipients, OutboundFrame::Text(json));
    debug!(
        "消息 {} 来自 {} (room {}) 已投递到 {} 个客户端",
        envelope.kind, sender.client_id, sender.room_id, count
    );
    count
}

/// 向房间内除指定连接外的所有成员广播系统消息
pub async fn broadcast_system(
    registry: &RoomRegistry,
    room_id: &str,
    exclude_connection_id: &str,
    envelope: &Envelope,
) -> usize {
    let Some(snapshot) = registry.snapshot(room_id).await else {
        return 0;
    };

    let recipients = resolve_recipients(&snapshot, exclude_connection_id, Route::Broadcast, &[]);
    if recipients.is_empty() {
        return 0;
    }

    match envelope.to_json() {
        Ok(json) => fan_out(&recipients, OutboundFrame::Text(json)),
        Err(e) => {
            warn!("序列化系统消息失败: {}", e);
            0
        }
    }
}

async fn update_metadata(sender: &ClientHandle, data: Value) {
    match data {
        Value::Object(patch) => {
            debug!("更新客户端 {} 的元数据: {} 个字段", sender.client_id, patch.len());
            sender.merge_metadata(patch).await;
        }
        other => {
            warn!("客户端 {} 的 metadata 负载不是对象，已忽略: {}", sender.client_id, other);
        }
    }
}
