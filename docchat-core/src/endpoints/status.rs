use axum::response::Json;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

pub const DOCCHAT_VERSION: &str = env!("CARGO_PKG_VERSION");

/// A handler for a simple liveness check
pub async fn status_handler() -> Json<StatusResponse> {
    Json(StatusResponse {
        status: "ok".to_string(),
        version: DOCCHAT_VERSION.to_string(),
    })
}

#[derive(Debug, Deserialize, Serialize)]
pub struct StatusResponse {
    pub status: String,
    pub version: String,
}

/// A handler for a health check. The gateway has no backing services, so
/// this only reports the gateway itself.
pub async fn health_handler() -> Json<Value> {
    Json(json!({
        "gateway": "ok",
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_status_handler() {
        let response = status_handler().await;
        assert_eq!(response.status, "ok");
        assert_eq!(response.version, DOCCHAT_VERSION);
    }

    #[tokio::test]
    async fn test_health_handler() {
        let response = health_handler().await;
        assert_eq!(response.0, json!({"gateway": "ok"}));
    }
}
