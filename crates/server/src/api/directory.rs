/// 实例分配目录接口

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    routing::{get, post},
    Json,
    Router,
};
use common::ServerInfo;
use serde::Deserialize;
use validator::Validate;

use super::ApiError;
use crate::app_state::AppState;

/// 目录路由
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(register_server))
        .route("/allocate", get(allocate_server))
        .route("/list", get(list_servers))
}

/// 注册实例 DTO
#[derive(Debug, Deserialize, Validate)]
pub struct RegisterServerDto {
    #[validate(length(min = 1, max = 255))]
    pub address: String,

    #[validate(range(min = 1))]
    pub port: u16,
}

/// 注册实例
pub async fn register_server(
    State(state): State<AppState>,
    payload: Result<Json<RegisterServerDto>, JsonRejection>,
) -> Result<(StatusCode, Json<ServerInfo>), ApiError> {
    let Json(dto) = payload.map_err(|e| ApiError::BadRequest(format!("无效的 JSON: {}", e)))?;

    // 验证输入
    dto.validate()
        .map_err(|e| ApiError::BadRequest(format!("验证失败: {}", e)))?;

    let server = state
        .directory()
        .register(ServerInfo {
            address: dto.address,
            port: dto.port,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(server)))
}

/// 随机分配一个实例
pub async fn allocate_server(State(state): State<AppState>) -> Result<Json<ServerInfo>, ApiError> {
    Ok(Json(state.directory().allocate().await?))
}

/// 获取全部实例
pub async fn list_servers(State(state): State<AppState>) -> Json<Vec<ServerInfo>> {
    Json(state.directory().list().await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::build_router;
    use crate::config::Config;
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    fn register_request(body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/register")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get_request(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    async fn body_json(response: axum::response::Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_register_then_conflict() {
        let app = build_router(AppState::new(Config::default()));

        let response = app
            .clone()
            .oneshot(register_request(r#"{"address":"10.0.0.5","port":8080}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(body_json(response).await, json!({"address": "10.0.0.5", "port": 8080}));

        let response = app
            .oneshot(register_request(r#"{"address":"10.0.0.5","port":8080}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CONFLICT);
        assert_eq!(body_json(response).await["success"], json!(false));
    }

    #[tokio::test]
    async fn test_register_rejects_invalid_body() {
        let app = build_router(AppState::new(Config::default()));

        for body in ["not json", r#"{"address":"","port":80}"#, r#"{"address":"a","port":0}"#, r#"{"port":80}"#] {
            let response = app.clone().oneshot(register_request(body)).await.unwrap();
            assert_eq!(response.status(), StatusCode::BAD_REQUEST, "body: {}", body);
        }
    }

    #[tokio::test]
    async fn test_allocate_and_list() {
        let state = AppState::new(Config::default());
        let app = build_router(state.clone());

        let response = app.clone().oneshot(get_request("/allocate")).await.unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

        let response = app.clone().oneshot(get_request("/list")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await, json!([]));

        state
            .directory()
            .register(ServerInfo { address: "relay-1".to_string(), port: 9000 })
            .await
            .unwrap();

        let response = app.clone().oneshot(get_request("/allocate")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await, json!({"address": "relay-1", "port": 9000}));

        let response = app.oneshot(get_request("/list")).await.unwrap();
        assert_eq!(body_json(response).await, json!([{"address": "relay-1", "port": 9000}]));
    }
}
