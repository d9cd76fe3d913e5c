//! Remote store boundary for steps and progression history.
//!
//! Every mutation is a single request that either fully applies or leaves the
//! store untouched. Callers own no cache: after a successful write, previously
//! fetched step lists and histories are stale and must be fetched again.

mod http;
mod memory;

pub use http::HttpStore;
pub use memory::InMemoryStore;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::ProgressionError;
use crate::types::{
    CompleteProgressionRequest, MahakramaHistory, MahakramaStep, StartProgressionRequest,
    StepInput, StepUpdate,
};

/// Store holding the step catalog and every person's history
#[async_trait]
pub trait MahakramaStore: Send + Sync {
    /// Store name used in logs (e.g. "memory", "http")
    fn name(&self) -> &str;

    /// All steps, in no particular order
    async fn list_steps(&self) -> Result<Vec<MahakramaStep>, ProgressionError>;

    async fn get_step(&self, id: Uuid) -> Result<MahakramaStep, ProgressionError>;

    async fn create_step(&self, input: StepInput) -> Result<MahakramaStep, ProgressionError>;

    /// Create every record or none. Returns the number inserted.
    async fn bulk_create_steps(&self, records: Vec<StepInput>) -> Result<usize, ProgressionError>;

    async fn update_step(
        &self,
        id: Uuid,
        update: StepUpdate,
    ) -> Result<MahakramaStep, ProgressionError>;

    async fn delete_step(&self, id: Uuid) -> Result<(), ProgressionError>;

    /// Every history record of a person, in no particular order
    async fn list_history(&self, person_id: Uuid)
        -> Result<Vec<MahakramaHistory>, ProgressionError>;

    /// Create a `current` record for the person
    async fn start_history(
        &self,
        person_id: Uuid,
        request: StartProgressionRequest,
    ) -> Result<MahakramaHistory, ProgressionError>;

    /// Move a `current` record to `completed`
    async fn complete_history(
        &self,
        person_id: Uuid,
        history_id: Uuid,
        request: CompleteProgressionRequest,
    ) -> Result<(), ProgressionError>;
}
