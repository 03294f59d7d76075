/// Agent 会话
/// 
/// 以 agent 身份加入房间并保持连接，断开后自动重连。
/// 只负责传输：记录收到的控制消息和音频，不做任何语音处理。

use common::protocol::WelcomeData;
use common::utils::format_bytes;
use common::{ClientType, MessageKind, RelayClient, RelayEvent};
use serde_json::json;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::config::Config;

/// 会话统计
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SessionStats {
    pub messages: u64,
    pub audio_frames: u64,
    pub audio_bytes: u64,
}

impl SessionStats {
    pub fn record(&mut self, event: &RelayEvent) {
        match event {
            RelayEvent::Message(_) => self.messages += 1,
            RelayEvent::Audio(data) => {
                self.audio_frames += 1;
                self.audio_bytes += data.len() as u64;
            }
            RelayEvent::Closed => {}
        }
    }
}

pub struct AgentSession {
    config: Config,
}

impl AgentSession {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// 启动会话（连接并保持）
    pub async fn run(&self) -> anyhow::Result<()> {
        loop {
            info!("尝试连接到 Relay: {} (room {})", self.config.relay_url, self.config.room_id);

            match self.connect_and_run().await {
                Ok(stats) => {
                    info!(
                        "连接已关闭: {} 条消息, {} 个音频帧 ({})",
                        stats.messages,
                        stats.audio_frames,
                        format_bytes(stats.audio_bytes)
                    );
                }
                Err(e) => {
                    error!("连接错误: {}", e);
                }
            }

            // 等待后重连
            warn!("{}秒后重新连接...", self.config.reconnect_interval);
            tokio::time::sleep(Duration::from_secs(self.config.reconnect_interval)).await;
        }
    }

    /// 连接并运行直到断开
    async fn connect_and_run(&self) -> common::Result<SessionStats> {
        let (client, mut events) = RelayClient::connect(
            &self.config.relay_url,
            &self.config.room_id,
            &self.config.agent_id,
            ClientType::Agent,
        )
        .await?;
        info!("已连接: {} ({})", client.client_id(), client.client_type());

        client.send_message(MessageKind::BotMessage, json!({"text": self.config.greeting}))?;

        let mut stats = SessionStats::default();
        while let Some(event) = events.recv().await {
            stats.record(&event);
            match event {
                RelayEvent::Message(envelope) => handle_message(&client, envelope),
                RelayEvent::Audio(data) => {
                    debug!("收到音频帧: {}", format_bytes(data.len() as u64));
                }
                RelayEvent::Closed => break,
            }
        }

        Ok(stats)
    }
}

fn handle_message(client: &RelayClient, envelope: common::Envelope) {
    match envelope.kind {
        MessageKind::Welcome => match serde_json::from_value::<WelcomeData>(envelope.data) {
            Ok(welcome) => info!(
                "已加入房间 {}: users={:?}, agents={:?}",
                welcome.room_id, welcome.users, welcome.agents
            ),
            Err(e) => warn!("解析 welcome 失败: {}", e),
        },
        MessageKind::ClientJoined | MessageKind::ClientLeft => {
            info!("房间 {} 成员变化: {} {}", client.room_id(), envelope.kind, envelope.data);
        }
        kind => {
            info!("收到消息: type={}, from={}", kind, envelope.from);
            debug!("消息内容: {}", envelope.data);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_count_messages_and_audio() {
        let mut stats = SessionStats::default();
        let envelope = common::Envelope::system(MessageKind::Welcome, json!({}));

        stats.record(&RelayEvent::Message(envelope));
        stats.record(&RelayEvent::Audio(vec![0; 320]));
        stats.record(&RelayEvent::Audio(vec![0; 160]));
        stats.record(&RelayEvent::Closed);

        assert_eq!(
            stats,
            SessionStats {
                messages: 1,
                audio_frames: 2,
                audio_bytes: 480,
            }
        );
    }
}
