//! Data Transfer Objects for the REST API.
//!
//! Steps and history records travel as the domain types themselves; only the
//! envelopes live here.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::types::StepInput;

/// Body of `POST /steps/import`
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ImportStepsRequest {
    pub records: Vec<StepInput>,
}

/// Result of a bulk import
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ImportStepsResponse {
    pub success: bool,
    pub inserted: usize,
}

/// Acknowledgement for mutations with no payload
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SuccessResponse {
    pub success: bool,
}

impl SuccessResponse {
    pub fn ok() -> Self {
        Self { success: true }
    }
}

/// Health check response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub step_count: usize,
}
