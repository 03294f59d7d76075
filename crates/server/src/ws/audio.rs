/// 音频转发
/// 
/// 二进制帧原样转发：user 发出的帧送给房间内所有 agent，agent 发出的帧送给所有 user。
/// 这里不做任何缓冲、重采样或静音检测。

use std::sync::Arc;
use tracing::debug;

use super::connection::{fan_out, ClientHandle, OutboundFrame};
use super::registry::RoomRegistry;

/// 转发一帧音频，返回成功入队的接收者数量
pub async fn relay_audio(registry: &RoomRegistry, sender: &ClientHandle, data: Vec<u8>) -> usize {
    let Some(snapshot) = registry.snapshot(&sender.room_id).await else {
        return 0;
    };

    let targets: Vec<Arc<ClientHandle>> = snapshot
        .pool(sender.client_type.opposite())
        .iter()
        .filter(|c| c.connection_id != sender.connection_id)
        .cloned()
        .collect();

    if targets.is_empty() {
        return 0;
    }

    let bytes = data.len();
    let count = fan_out(&targets, OutboundFrame::Binary(data));
    debug!(
        "音频帧 {} bytes 来自 {} ({}) 已转发到 {} 个客户端",
        bytes, sender.client_id, sender.client_type, count
    );
    count
}
