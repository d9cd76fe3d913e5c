//! Per-person progression history records and transition payloads.

use std::cmp::Ordering;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::step::MahakramaStep;

/// Status of a history record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum HistoryStatus {
    /// In progress. At most one per person.
    Current,
    /// Finished. Terminal.
    Completed,
}

impl fmt::Display for HistoryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HistoryStatus::Current => write!(f, "current"),
            HistoryStatus::Completed => write!(f, "completed"),
        }
    }
}

/// One person's attempt at one step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MahakramaHistory {
    pub id: Uuid,
    pub person_id: Uuid,
    pub mahakrama_step_id: Uuid,
    pub status: HistoryStatus,
    pub start_date: DateTime<Utc>,
    #[serde(default)]
    pub end_date: Option<DateTime<Utc>>,
    #[serde(default, alias = "mahakramaInstructorId")]
    pub instructor_id: Option<Uuid>,
    /// Start notes until completion replaces them
    #[serde(default)]
    pub completion_notes: Option<String>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,

    // Denormalized from the step and instructor for display
    pub step_sequence_number: f64,
    pub group_id: String,
    pub group_name: String,
    pub step_id: String,
    pub step_name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub instructor_name: Option<String>,
}

impl MahakramaHistory {
    /// New `current` record for `person_id` on `step`
    pub fn started(
        person_id: Uuid,
        step: &MahakramaStep,
        start: &StartProgressionRequest,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            person_id,
            mahakrama_step_id: step.id,
            status: HistoryStatus::Current,
            start_date: start.start_date,
            end_date: None,
            instructor_id: Some(start.instructor_id),
            completion_notes: start.notes.clone(),
            updated_at: Some(now),
            step_sequence_number: step.sequence_number,
            group_id: step.group_id.clone(),
            group_name: step.group_name.clone(),
            step_id: step.step_id.clone(),
            step_name: step.step_name.clone(),
            description: step.description.clone(),
            instructor_name: None,
        }
    }

    pub fn is_current(&self) -> bool {
        self.status == HistoryStatus::Current
    }

    /// Whole calendar days (UTC) between the start date and `completed_date`
    pub fn days_elapsed(&self, completed_date: DateTime<Utc>) -> i64 {
        (completed_date.date_naive() - self.start_date.date_naive()).num_days()
    }
}

/// Display order: newest start first, ties by curriculum position
pub fn by_display_order(a: &MahakramaHistory, b: &MahakramaHistory) -> Ordering {
    b.start_date.cmp(&a.start_date).then_with(|| {
        a.step_sequence_number
            .total_cmp(&b.step_sequence_number)
    })
}

/// Body of `POST /person/:personId/history`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StartProgressionRequest {
    pub mahakrama_step_id: Uuid,
    pub start_date: DateTime<Utc>,
    pub instructor_id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// Body of `POST /person/:personId/history/:historyId/complete`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CompleteProgressionRequest {
    pub completed_date: DateTime<Utc>,
    pub instructor_id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completion_notes: Option<String>,
}
