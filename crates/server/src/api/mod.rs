pub mod directory;
pub mod error;
pub mod rooms;

pub use error::ApiError;

use axum::Router;

use crate::app_state::AppState;

/// 所有 REST 路由（统一入口）
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .merge(directory::routes())
        .merge(rooms::routes())
}
