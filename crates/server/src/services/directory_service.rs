/// 后端实例分配目录
/// 
/// 只追加的 (address, port) 列表，客户端在建立 WebSocket 之前从这里随机选择一个实例。
/// 不做健康检查，也不支持注销。

use common::{Error, Result, ServerInfo};
use rand::seq::SliceRandom;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;

#[derive(Clone, Default)]
pub struct ServerDirectory {
    servers: Arc<RwLock<Vec<ServerInfo>>>,
}

impl ServerDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册实例，(address, port) 已存在时返回冲突
    pub async fn register(&self, server: ServerInfo) -> Result<ServerInfo> {
        let mut servers = self.servers.write().await;

        if servers.contains(&server) {
            return Err(Error::AlreadyExists(format!("{}:{}", server.address, server.port)));
        }

        servers.push(server.clone());
        info!("实例已注册: {}:{} (共 {} 个)", server.address, server.port, servers.len());
        Ok(server)
    }

    /// 随机分配一个实例
    pub async fn allocate(&self) -> Result<ServerInfo> {
        let servers = self.servers.read().await;

        servers
            .choose(&mut rand::thread_rng())
            .cloned()
            .ok_or_else(|| Error::Unavailable("没有可用的实例".to_string()))
    }

    /// 按注册顺序列出所有实例
    pub async fn list(&self) -> Vec<ServerInfo> {
        self.servers.read().await.clone()
    }
}
