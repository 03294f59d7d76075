/// 应用路由装配

use axum::{routing::get, Router};
use common::protocol::constants::WS_PATH;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::{api, app_state::AppState, ws};

/// 构建应用路由
pub fn build_router(state: AppState) -> Router {
    // 设置CORS
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(root_handler))
        .route("/health", get(health_handler))
        .route(WS_PATH, get(ws::handle_room_websocket))
        .merge(api::api_routes())
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn root_handler() -> &'static str {
    "Voice Relay Server v1"
}

async fn health_handler() -> &'static str {
    "OK"
}
