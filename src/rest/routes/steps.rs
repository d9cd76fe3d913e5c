//! Step catalog endpoints.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use crate::rest::dto::{ImportStepsRequest, ImportStepsResponse, SuccessResponse};
use crate::rest::error::{ApiError, ErrorResponse};
use crate::rest::state::ApiState;
use crate::store::MahakramaStore;
use crate::types::{MahakramaStep, StepInput, StepUpdate};

/// List all steps in sequence order
#[utoipa::path(
    get,
    path = "/api/mahakrama/steps",
    tag = "Steps",
    responses(
        (status = 200, description = "Steps ordered by sequence number", body = Vec<MahakramaStep>)
    )
)]
pub async fn list(State(state): State<ApiState>) -> Result<Json<Vec<MahakramaStep>>, ApiError> {
    Ok(Json(state.store.list_steps().await?))
}

/// Get a single step
#[utoipa::path(
    get,
    path = "/api/mahakrama/steps/{id}",
    tag = "Steps",
    params(
        ("id" = Uuid, Path, description = "Step id")
    ),
    responses(
        (status = 200, description = "Step details", body = MahakramaStep),
        (status = 404, description = "Step not found", body = ErrorResponse)
    )
)]
pub async fn get_one(
    State(state): State<ApiState>,
    Path(id): Path<Uuid>,
) -> Result<Json<MahakramaStep>, ApiError> {
    Ok(Json(state.store.get_step(id).await?))
}

/// Create a step
#[utoipa::path(
    post,
    path = "/api/mahakrama/steps",
    tag = "Steps",
    request_body = StepInput,
    responses(
        (status = 201, description = "Step created", body = MahakramaStep),
        (status = 400, description = "Validation error", body = ErrorResponse),
        (status = 409, description = "Sequence number already in use", body = ErrorResponse)
    )
)]
pub async fn create(
    State(state): State<ApiState>,
    Json(input): Json<StepInput>,
) -> Result<(StatusCode, Json<MahakramaStep>), ApiError> {
    let step = state.store.create_step(input).await?;
    Ok((StatusCode::CREATED, Json(step)))
}

/// Insert many steps atomically
#[utoipa::path(
    post,
    path = "/api/mahakrama/steps/import",
    tag = "Steps",
    request_body = ImportStepsRequest,
    responses(
        (status = 200, description = "All records inserted", body = ImportStepsResponse),
        (status = 400, description = "A record is invalid; nothing inserted", body = ErrorResponse),
        (status = 409, description = "Sequence numbers collide; nothing inserted", body = ErrorResponse)
    )
)]
pub async fn import(
    State(state): State<ApiState>,
    Json(request): Json<ImportStepsRequest>,
) -> Result<Json<ImportStepsResponse>, ApiError> {
    let inserted = state.store.bulk_create_steps(request.records).await?;
    Ok(Json(ImportStepsResponse {
        success: true,
        inserted,
    }))
}

/// Update a step
#[utoipa::path(
    put,
    path = "/api/mahakrama/steps/{id}",
    tag = "Steps",
    params(
        ("id" = Uuid, Path, description = "Step id")
    ),
    request_body = StepUpdate,
    responses(
        (status = 200, description = "Step updated", body = MahakramaStep),
        (status = 400, description = "Validation error", body = ErrorResponse),
        (status = 404, description = "Step not found", body = ErrorResponse),
        (status = 409, description = "Sequence number already in use", body = ErrorResponse)
    )
)]
pub async fn update(
    State(state): State<ApiState>,
    Path(id): Path<Uuid>,
    Json(update): Json<StepUpdate>,
) -> Result<Json<MahakramaStep>, ApiError> {
    Ok(Json(state.store.update_step(id, update).await?))
}

/// Delete a step that no history references
#[utoipa::path(
    delete,
    path = "/api/mahakrama/steps/{id}",
    tag = "Steps",
    params(
        ("id" = Uuid, Path, description = "Step id")
    ),
    responses(
        (status = 200, description = "Step deleted", body = SuccessResponse),
        (status = 404, description = "Step not found", body = ErrorResponse),
        (status = 409, description = "Step is used in history", body = ErrorResponse)
    )
)]
pub async fn delete(
    State(state): State<ApiState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SuccessResponse>, ApiError> {
    state.store.delete_step(id).await?;
    Ok(Json(SuccessResponse::ok()))
}
