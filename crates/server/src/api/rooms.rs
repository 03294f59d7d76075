/// 房间查询接口

use axum::{
    extract::{Path, State},
    routing::get,
    Json,
    Router,
};
use common::protocol::{RoomInfo, RoomSummary};

use super::ApiError;
use crate::app_state::AppState;

/// 房间路由
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/rooms", get(list_rooms))
        .route("/room/:room_id", get(get_room))
}

/// 获取所有活跃房间
pub async fn list_rooms(State(state): State<AppState>) -> Json<Vec<RoomSummary>> {
    Json(state.registry().list().await)
}

/// 获取单个房间详情
pub async fn get_room(
    State(state): State<AppState>,
    Path(room_id): Path<String>,
) -> Result<Json<RoomInfo>, ApiError> {
    let snapshot = state
        .registry()
        .snapshot(&room_id)
        .await
        .ok_or_else(|| common::Error::NotFound(format!("房间 {}", room_id)))?;

    Ok(Json(snapshot.info().await))
}
