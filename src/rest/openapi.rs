//! OpenAPI specification builder using utoipa.

use utoipa::OpenApi;

use crate::rest::dto::{HealthResponse, ImportStepsRequest, ImportStepsResponse, SuccessResponse};
use crate::rest::error::ErrorResponse;
use crate::types::{
    CompleteProgressionRequest, HistoryStatus, MahakramaHistory, MahakramaStep,
    StartProgressionRequest, StepInput, StepUpdate,
};

/// OpenAPI documentation for the Mahakrama REST API
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Mahakrama API",
        description = "REST API for the Mahakrama step catalog and per-person progression history.",
        license(name = "MIT")
    ),
    paths(
        crate::rest::routes::health::health,
        // Step endpoints
        crate::rest::routes::steps::list,
        crate::rest::routes::steps::get_one,
        crate::rest::routes::steps::create,
        crate::rest::routes::steps::import,
        crate::rest::routes::steps::update,
        crate::rest::routes::steps::delete,
        // History endpoints
        crate::rest::routes::history::list,
        crate::rest::routes::history::start,
        crate::rest::routes::history::complete,
    ),
    components(
        schemas(
            // Response types
            HealthResponse,
            MahakramaStep,
            MahakramaHistory,
            HistoryStatus,
            ImportStepsResponse,
            SuccessResponse,
            ErrorResponse,
            // Request types
            StepInput,
            StepUpdate,
            ImportStepsRequest,
            StartProgressionRequest,
            CompleteProgressionRequest,
        )
    ),
    tags(
        (name = "Health", description = "Health check endpoint"),
        (name = "Steps", description = "Step catalog management"),
        (name = "History", description = "Per-person progression history"),
    )
)]
pub struct ApiDoc;

impl ApiDoc {
    /// Generate the OpenAPI specification as a JSON string
    pub fn json() -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&Self::openapi())
    }

    /// Generate the OpenAPI specification as a YAML string
    pub fn yaml() -> Result<String, serde_yaml::Error> {
        serde_yaml::to_string(&Self::openapi())
    }
}
