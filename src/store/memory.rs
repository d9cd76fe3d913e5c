//! In-process store enforcing the server-side invariants.
//!
//! Backs the REST server and the test suites. One write lock is held for the
//! whole of each mutation and every check runs before the first change, so a
//! rejected request leaves no trace.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::MahakramaStore;
use crate::config::{ProgressionConfig, StartPolicy};
use crate::error::ProgressionError;
use crate::types::{
    by_sequence, CompleteProgressionRequest, HistoryStatus, MahakramaHistory, MahakramaStep,
    StartProgressionRequest, StepInput, StepUpdate,
};

#[derive(Debug, Default)]
struct StoreData {
    steps: Vec<MahakramaStep>,
    history: Vec<MahakramaHistory>,
    /// Display names for instructor ids
    instructors: HashMap<Uuid, String>,
}

impl StoreData {
    fn step(&self, id: Uuid) -> Option<&MahakramaStep> {
        self.steps.iter().find(|s| s.id == id)
    }

    fn sequence_taken(&self, sequence_number: f64, except: Option<Uuid>) -> bool {
        self.steps
            .iter()
            .any(|s| s.sequence_number == sequence_number && Some(s.id) != except)
    }

    /// Refresh the step and instructor display fields from their sources
    fn denormalize(&self, mut record: MahakramaHistory) -> MahakramaHistory {
        if let Some(step) = self.step(record.mahakrama_step_id) {
            record.step_sequence_number = step.sequence_number;
            record.group_id = step.group_id.clone();
            record.group_name = step.group_name.clone();
            record.step_id = step.step_id.clone();
            record.step_name = step.step_name.clone();
            record.description = step.description.clone();
        }
        record.instructor_name = record
            .instructor_id
            .and_then(|id| self.instructors.get(&id).cloned());
        record
    }
}

/// Thread-safe in-memory implementation of [`MahakramaStore`]
#[derive(Debug, Default)]
pub struct InMemoryStore {
    data: RwLock<StoreData>,
    policy: ProgressionConfig,
}

impl InMemoryStore {
    pub fn new(policy: ProgressionConfig) -> Self {
        Self {
            data: RwLock::new(StoreData::default()),
            policy,
        }
    }

    /// Register an instructor's display name
    pub async fn register_instructor(&self, id: Uuid, name: impl Into<String>) {
        self.data.write().await.instructors.insert(id, name.into());
    }

    pub fn policy(&self) -> &ProgressionConfig {
        &self.policy
    }

    pub async fn step_count(&self) -> usize {
        self.data.read().await.steps.len()
    }
}

fn validation(problems: Vec<String>) -> ProgressionError {
    ProgressionError::Validation(problems)
}

fn join_sequences(values: &[f64]) -> String {
    values
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

#[async_trait]
impl MahakramaStore for InMemoryStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn list_steps(&self) -> Result<Vec<MahakramaStep>, ProgressionError> {
        let mut steps = self.data.read().await.steps.clone();
        steps.sort_by(by_sequence);
        Ok(steps)
    }

    async fn get_step(&self, id: Uuid) -> Result<MahakramaStep, ProgressionError> {
        self.data
            .read()
            .await
            .step(id)
            .cloned()
            .ok_or_else(|| ProgressionError::NotFound("Mahakrama step not found".to_string()))
    }

    async fn create_step(&self, input: StepInput) -> Result<MahakramaStep, ProgressionError> {
        input.validate().map_err(validation)?;

        let mut data = self.data.write().await;
        if data.sequence_taken(input.sequence_number, None) {
            return Err(ProgressionError::Conflict(format!(
                "Sequence number {} already exists.",
                input.sequence_number
            )));
        }

        let step = MahakramaStep::from_input(input, Utc::now());
        tracing::info!(step_id = %step.id, sequence = step.sequence_number, "Created Mahakrama step");
        data.steps.push(step.clone());
        Ok(step)
    }

    async fn bulk_create_steps(&self, records: Vec<StepInput>) -> Result<usize, ProgressionError> {
        if records.is_empty() {
            return Ok(0);
        }

        let mut problems = Vec::new();
        for (index, record) in records.iter().enumerate() {
            if let Err(errors) = record.validate() {
                problems.extend(
                    errors
                        .into_iter()
                        .map(|e| format!("record {}: {}", index + 1, e)),
                );
            }
        }
        if !problems.is_empty() {
            return Err(validation(problems));
        }

        let mut sorted: Vec<f64> = records.iter().map(|r| r.sequence_number).collect();
        sorted.sort_by(f64::total_cmp);
        let mut duplicates: Vec<f64> = sorted
            .windows(2)
            .filter(|pair| pair[0] == pair[1])
            .map(|pair| pair[0])
            .collect();
        duplicates.dedup();
        if !duplicates.is_empty() {
            return Err(ProgressionError::Conflict(format!(
                "Duplicate sequence numbers in import: {}",
                join_sequences(&duplicates)
            )));
        }

        let mut data = self.data.write().await;
        let existing: Vec<f64> = sorted
            .iter()
            .copied()
            .filter(|value| data.sequence_taken(*value, None))
            .collect();
        if !existing.is_empty() {
            return Err(ProgressionError::Conflict(format!(
                "Sequence numbers already exist: {}",
                join_sequences(&existing)
            )));
        }

        let now = Utc::now();
        let inserted = records.len();
        data.steps
            .extend(records.into_iter().map(|r| MahakramaStep::from_input(r, now)));
        tracing::info!(inserted, "Bulk created Mahakrama steps");
        Ok(inserted)
    }

    async fn update_step(
        &self,
        id: Uuid,
        update: StepUpdate,
    ) -> Result<MahakramaStep, ProgressionError> {
        update.validate().map_err(validation)?;

        let mut data = self.data.write().await;
        if data.step(id).is_none() {
            return Err(ProgressionError::NotFound(
                "Mahakrama step not found".to_string(),
            ));
        }
        if let Some(sequence_number) = update.sequence_number {
            if data.sequence_taken(sequence_number, Some(id)) {
                return Err(ProgressionError::Conflict(format!(
                    "Sequence number {} already exists.",
                    sequence_number
                )));
            }
        }

        let step = data
            .steps
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or_else(|| ProgressionError::NotFound("Mahakrama step not found".to_string()))?;
        step.apply(update, Utc::now());
        tracing::info!(step_id = %id, "Updated Mahakrama step");
        Ok(step.clone())
    }

    async fn delete_step(&self, id: Uuid) -> Result<(), ProgressionError> {
        let mut data = self.data.write().await;
        if data.history.iter().any(|h| h.mahakrama_step_id == id) {
            return Err(ProgressionError::Conflict(
                "Cannot delete step because it is used in Mahakrama history.".to_string(),
            ));
        }

        let before = data.steps.len();
        data.steps.retain(|s| s.id != id);
        if data.steps.len() == before {
            return Err(ProgressionError::NotFound(
                "Mahakrama step not found".to_string(),
            ));
        }
        tracing::info!(step_id = %id, "Deleted Mahakrama step");
        Ok(())
    }

    async fn list_history(
        &self,
        person_id: Uuid,
    ) -> Result<Vec<MahakramaHistory>, ProgressionError> {
        let data = self.data.read().await;
        let mut records: Vec<MahakramaHistory> = data
            .history
            .iter()
            .filter(|h| h.person_id == person_id)
            .cloned()
            .map(|h| data.denormalize(h))
            .collect();
        records.sort_by(|a, b| a.step_sequence_number.total_cmp(&b.step_sequence_number));
        Ok(records)
    }

    async fn start_history(
        &self,
        person_id: Uuid,
        request: StartProgressionRequest,
    ) -> Result<MahakramaHistory, ProgressionError> {
        let mut data = self.data.write().await;

        let mut existing = data.history.iter().filter(|h| h.person_id == person_id);
        match self.policy.start_policy {
            StartPolicy::SingleCurrent => {
                if existing.any(MahakramaHistory::is_current) {
                    return Err(ProgressionError::AlreadyInProgress(
                        "A Mahakrama step is already in progress for this person.".to_string(),
                    ));
                }
            }
            StartPolicy::SingleTrack => {
                if existing.next().is_some() {
                    return Err(ProgressionError::AlreadyInProgress(
                        "Mahakrama history already exists for this person.".to_string(),
                    ));
                }
            }
        }

        let step = data
            .step(request.mahakrama_step_id)
            .cloned()
            .ok_or_else(|| ProgressionError::NotFound("Mahakrama step not found".to_string()))?;

        let record = data.denormalize(MahakramaHistory::started(
            person_id,
            &step,
            &request,
            Utc::now(),
        ));
        tracing::info!(
            person_id = %person_id,
            history_id = %record.id,
            step = %step.label(),
            "Started Mahakrama step"
        );
        data.history.push(record.clone());
        Ok(record)
    }

    async fn complete_history(
        &self,
        person_id: Uuid,
        history_id: Uuid,
        request: CompleteProgressionRequest,
    ) -> Result<(), ProgressionError> {
        let mut data = self.data.write().await;

        let position = data
            .history
            .iter()
            .position(|h| h.id == history_id && h.person_id == person_id)
            .ok_or_else(|| {
                ProgressionError::NotFound("Mahakrama history record not found".to_string())
            })?;

        let record = &data.history[position];
        if record.status != HistoryStatus::Current {
            return Err(ProgressionError::Precondition(
                "Only the current Mahakrama step can be completed.".to_string(),
            ));
        }
        if request.completed_date <= record.start_date {
            return Err(ProgressionError::Precondition(
                "Completed date must be after the start date.".to_string(),
            ));
        }

        let current_sequence = data
            .step(record.mahakrama_step_id)
            .map_or(record.step_sequence_number, |s| s.sequence_number);
        let next_step = if self.policy.auto_advance {
            data.steps
                .iter()
                .filter(|s| s.sequence_number > current_sequence)
                .min_by(|a, b| by_sequence(a, b))
                .cloned()
        } else {
            None
        };

        let now = Utc::now();
        let record = &mut data.history[position];
        record.status = HistoryStatus::Completed;
        record.end_date = Some(request.completed_date);
        record.instructor_id = Some(request.instructor_id);
        record.completion_notes = request.completion_notes;
        record.updated_at = Some(now);
        tracing::info!(person_id = %person_id, history_id = %history_id, "Completed Mahakrama step");

        if let Some(step) = next_step {
            let start = StartProgressionRequest {
                mahakrama_step_id: step.id,
                start_date: request.completed_date + Duration::days(1),
                instructor_id: request.instructor_id,
                notes: None,
            };
            let next = data.denormalize(MahakramaHistory::started(person_id, &step, &start, now));
            tracing::info!(
                person_id = %person_id,
                history_id = %next.id,
                step = %step.label(),
                "Advanced to next Mahakrama step"
            );
            data.history.push(next);
        }

        Ok(())
    }
}
