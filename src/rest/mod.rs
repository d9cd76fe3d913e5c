//! REST API for the Mahakrama step catalog and progression history.
//!
//! Serves the `/api/mahakrama` endpoints over an in-memory store. The same
//! endpoints are what [`crate::store::HttpStore`] talks to.

use std::net::SocketAddr;

use anyhow::Result;
use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub mod dto;
pub mod error;
pub mod openapi;
pub mod routes;
pub mod state;

pub use error::ApiError;
pub use openapi::ApiDoc;
pub use state::ApiState;

/// Default port for the REST API server
pub const DEFAULT_PORT: u16 = 7010;

/// Build the API router with all routes
pub fn build_router(state: ApiState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let mahakrama = Router::new()
        // Step endpoints
        .route("/steps", get(routes::steps::list).post(routes::steps::create))
        .route("/steps/import", post(routes::steps::import))
        .route(
            "/steps/:id",
            get(routes::steps::get_one)
                .put(routes::steps::update)
                .delete(routes::steps::delete),
        )
        // History endpoints
        .route(
            "/person/:person_id/history",
            get(routes::history::list).post(routes::history::start),
        )
        .route(
            "/person/:person_id/history/:history_id/complete",
            post(routes::history::complete),
        )
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_bearer,
        ));

    Router::new()
        .route("/api/health", get(routes::health::health))
        .route("/api/openapi.json", get(openapi_json))
        .nest("/api/mahakrama", mahakrama)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Reject requests without the configured bearer token
async fn require_bearer(State(state): State<ApiState>, request: Request, next: Next) -> Response {
    let Some(expected) = state.auth_token() else {
        return next.run(request).await;
    };

    let presented = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "));

    if presented == Some(expected) {
        next.run(request).await
    } else {
        tracing::warn!(path = %request.uri().path(), "Rejected request without valid bearer token");
        ApiError::Unauthorized.into_response()
    }
}

async fn openapi_json() -> Result<Response, ApiError> {
    let spec = ApiDoc::json()?;
    Ok((
        [(axum::http::header::CONTENT_TYPE, "application/json")],
        spec,
    )
        .into_response())
}

/// Start the REST API server
pub async fn serve(state: ApiState, port: u16) -> Result<()> {
    let app = build_router(state);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));

    tracing::info!("REST API listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use axum::body::Body;
    use axum::http::{Method, StatusCode};
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    fn step_body(sequence_number: f64) -> String {
        serde_json::json!({
            "sequenceNumber": sequence_number,
            "groupId": "G1",
            "groupName": "Foundations",
            "stepId": format!("S{}", sequence_number),
            "stepName": "Step",
        })
        .to_string()
    }

    fn post_json(uri: &str, body: String) -> axum::http::Request<Body> {
        axum::http::Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body))
            .unwrap()
    }

    fn get(uri: &str) -> axum::http::Request<Body> {
        axum::http::Request::builder()
            .uri(uri)
            .body(Body::empty())
            .unwrap()
    }

    fn locked_router() -> Router {
        let mut config = Config::default();
        config.server.auth_token = Some("s3cret".to_string());
        build_router(ApiState::new(config))
    }

    #[tokio::test]
    async fn test_health_is_open() {
        let response = locked_router().oneshot(get("/api/health")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_openapi_json_is_served() {
        let response = locked_router()
            .oneshot(get("/api/openapi.json"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let spec: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(spec["info"]["title"], "Mahakrama API");
    }

    #[tokio::test]
    async fn test_missing_token_is_unauthorized() {
        let response = locked_router()
            .oneshot(get("/api/mahakrama/steps"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_valid_token_is_accepted() {
        let request = axum::http::Request::builder()
            .uri("/api/mahakrama/steps")
            .header(AUTHORIZATION, "Bearer s3cret")
            .body(Body::empty())
            .unwrap();
        let response = locked_router().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_create_step_returns_created() {
        let router = build_router(ApiState::new(Config::default()));
        let response = router
            .oneshot(post_json("/api/mahakrama/steps", step_body(1.0)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let step: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(step["sequenceNumber"], 1.0);
        assert_eq!(step["groupId"], "G1");
    }

    #[tokio::test]
    async fn test_invalid_step_returns_error_body() {
        let router = build_router(ApiState::new(Config::default()));
        let response = router
            .oneshot(post_json("/api/mahakrama/steps", step_body(0.0)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let json: error::ErrorResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(json.error, "validation_error");
        assert!(json.message.contains("sequenceNumber"));
    }

    #[tokio::test]
    async fn test_unknown_step_is_not_found() {
        let router = build_router(ApiState::new(Config::default()));
        let uri = format!("/api/mahakrama/steps/{}", uuid::Uuid::new_v4());
        let response = router.oneshot(get(&uri)).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
