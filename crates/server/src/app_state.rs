/// 应用全局状态

use std::sync::Arc;

use crate::config::Config;
use crate::services::ServerDirectory;
use crate::ws::RoomRegistry;

/// 应用状态
#[derive(Clone)]
pub struct AppState {
    /// 房间注册表
    pub registry: RoomRegistry,
    /// 实例分配目录
    pub directory: ServerDirectory,
    /// 运行配置
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        Self {
            registry: RoomRegistry::new(),
            directory: ServerDirectory::new(),
            config: Arc::new(config),
        }
    }

    /// 获取房间注册表
    pub fn registry(&self) -> RoomRegistry {
        self.registry.clone()
    }

    /// 获取实例分配目录
    pub fn directory(&self) -> ServerDirectory {
        self.directory.clone()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }
}
