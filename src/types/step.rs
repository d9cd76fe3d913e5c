//! Curriculum step definitions and their create/update payloads.

use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Smallest sequence number a step may carry
pub const MIN_SEQUENCE_NUMBER: f64 = 0.01;

/// A single step of the Mahakrama curriculum
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MahakramaStep {
    pub id: Uuid,
    /// Position in the curriculum. Fractional values slot a step between two others.
    pub sequence_number: f64,
    pub group_id: String,
    pub group_name: String,
    pub step_id: String,
    pub step_name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl MahakramaStep {
    /// Build a fresh step from validated input
    pub fn from_input(input: StepInput, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            sequence_number: input.sequence_number,
            group_id: input.group_id,
            group_name: input.group_name,
            step_id: input.step_id,
            step_name: input.step_name,
            description: input.description,
            created_at: Some(now),
            updated_at: Some(now),
        }
    }

    /// Apply a partial update in place
    pub fn apply(&mut self, update: StepUpdate, now: DateTime<Utc>) {
        if let Some(sequence_number) = update.sequence_number {
            self.sequence_number = sequence_number;
        }
        if let Some(group_id) = update.group_id {
            self.group_id = group_id;
        }
        if let Some(group_name) = update.group_name {
            self.group_name = group_name;
        }
        if let Some(step_id) = update.step_id {
            self.step_id = step_id;
        }
        if let Some(step_name) = update.step_name {
            self.step_name = step_name;
        }
        if let Some(description) = update.description {
            self.description = description;
        }
        self.updated_at = Some(now);
    }

    /// Label used in operator-facing output, e.g. `G1/S1 Step One`
    pub fn label(&self) -> String {
        format!("{}/{} {}", self.group_id, self.step_id, self.step_name)
    }
}

/// Ascending order by sequence number
pub fn by_sequence(a: &MahakramaStep, b: &MahakramaStep) -> Ordering {
    a.sequence_number.total_cmp(&b.sequence_number)
}

/// Payload for creating or importing a step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StepInput {
    pub sequence_number: f64,
    pub group_id: String,
    pub group_name: String,
    pub step_id: String,
    pub step_name: String,
    #[serde(default)]
    pub description: Option<String>,
}

impl StepInput {
    /// Check field-level rules. Returns every problem found.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut problems = Vec::new();

        if let Some(problem) = check_sequence(self.sequence_number) {
            problems.push(problem);
        }
        for (field, value) in [
            ("groupId", &self.group_id),
            ("groupName", &self.group_name),
            ("stepId", &self.step_id),
            ("stepName", &self.step_name),
        ] {
            if value.trim().is_empty() {
                problems.push(format!("{} is required", field));
            }
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(problems)
        }
    }
}

/// Partial update of a step. `description: null` clears the description.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StepUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sequence_number: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step_name: Option<String>,
    #[serde(
        default,
        deserialize_with = "present",
        skip_serializing_if = "Option::is_none"
    )]
    #[schema(value_type = Option<String>)]
    pub description: Option<Option<String>>,
}

impl StepUpdate {
    /// True when no field is set
    pub fn is_empty(&self) -> bool {
        self.sequence_number.is_none()
            && self.group_id.is_none()
            && self.group_name.is_none()
            && self.step_id.is_none()
            && self.step_name.is_none()
            && self.description.is_none()
    }

    pub fn validate(&self) -> Result<(), Vec<String>> {
        if self.is_empty() {
            return Err(vec!["No fields provided for update".to_string()]);
        }

        let mut problems = Vec::new();
        if let Some(problem) = self.sequence_number.and_then(check_sequence) {
            problems.push(problem);
        }
        for (field, value) in [
            ("groupId", &self.group_id),
            ("groupName", &self.group_name),
            ("stepId", &self.step_id),
            ("stepName", &self.step_name),
        ] {
            if value.as_deref().is_some_and(|v| v.trim().is_empty()) {
                problems.push(format!("{} must not be empty", field));
            }
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(problems)
        }
    }
}

fn check_sequence(value: f64) -> Option<String> {
    if !value.is_finite() || value < MIN_SEQUENCE_NUMBER {
        Some(format!(
            "sequenceNumber must be at least {} (got {})",
            MIN_SEQUENCE_NUMBER, value
        ))
    } else {
        None
    }
}

/// Distinguishes an explicit `null` from an absent field.
fn present<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    T::deserialize(deserializer).map(Some)
}
