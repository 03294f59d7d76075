/// WebSocket 模块
/// 
/// 房间注册表、连接网关、消息路由和音频转发

pub mod audio;
pub mod connection;
pub mod handler;
pub mod registry;
pub mod router;

pub use handler::handle_room_websocket;
pub use registry::RoomRegistry;
