//! Per-person progression history endpoints.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use crate::rest::dto::SuccessResponse;
use crate::rest::error::{ApiError, ErrorResponse};
use crate::rest::state::ApiState;
use crate::store::MahakramaStore;
use crate::types::{CompleteProgressionRequest, MahakramaHistory, StartProgressionRequest};

/// List a person's history with step details
#[utoipa::path(
    get,
    path = "/api/mahakrama/person/{person_id}/history",
    tag = "History",
    params(
        ("person_id" = Uuid, Path, description = "Person id")
    ),
    responses(
        (status = 200, description = "History records", body = Vec<MahakramaHistory>)
    )
)]
pub async fn list(
    State(state): State<ApiState>,
    Path(person_id): Path<Uuid>,
) -> Result<Json<Vec<MahakramaHistory>>, ApiError> {
    Ok(Json(state.store.list_history(person_id).await?))
}

/// Start a step for a person
#[utoipa::path(
    post,
    path = "/api/mahakrama/person/{person_id}/history",
    tag = "History",
    params(
        ("person_id" = Uuid, Path, description = "Person id")
    ),
    request_body = StartProgressionRequest,
    responses(
        (status = 201, description = "Step started", body = MahakramaHistory),
        (status = 404, description = "Step not found", body = ErrorResponse),
        (status = 409, description = "A step is already in progress", body = ErrorResponse)
    )
)]
pub async fn start(
    State(state): State<ApiState>,
    Path(person_id): Path<Uuid>,
    Json(request): Json<StartProgressionRequest>,
) -> Result<(StatusCode, Json<MahakramaHistory>), ApiError> {
    let record = state.store.start_history(person_id, request).await?;
    Ok((StatusCode::CREATED, Json(record)))
}

/// Complete the person's current step
#[utoipa::path(
    post,
    path = "/api/mahakrama/person/{person_id}/history/{history_id}/complete",
    tag = "History",
    params(
        ("person_id" = Uuid, Path, description = "Person id"),
        ("history_id" = Uuid, Path, description = "History record id")
    ),
    request_body = CompleteProgressionRequest,
    responses(
        (status = 200, description = "Step completed", body = SuccessResponse),
        (status = 400, description = "Record is not current or date precedes start", body = ErrorResponse),
        (status = 404, description = "History record not found", body = ErrorResponse)
    )
)]
pub async fn complete(
    State(state): State<ApiState>,
    Path((person_id, history_id)): Path<(Uuid, Uuid)>,
    Json(request): Json<CompleteProgressionRequest>,
) -> Result<Json<SuccessResponse>, ApiError> {
    state
        .store
        .complete_history(person_id, history_id, request)
        .await?;
    Ok(Json(SuccessResponse::ok()))
}
