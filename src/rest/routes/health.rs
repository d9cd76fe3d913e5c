//! Health check endpoint.

use axum::{extract::State, Json};

use crate::rest::dto::HealthResponse;
use crate::rest::state::ApiState;

/// Health check endpoint
#[utoipa::path(
    get,
    path = "/api/health",
    tag = "Health",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse)
    )
)]
pub async fn health(State(state): State<ApiState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        step_count: state.store.step_count().await,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    #[tokio::test]
    async fn test_health() {
        let state = ApiState::new(Config::default());
        let resp = health(State(state)).await;
        assert_eq!(resp.status, "ok");
        assert!(!resp.version.is_empty());
        assert_eq!(resp.step_count, 0);
    }
}
