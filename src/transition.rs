//! Start/complete state machine for Mahakrama progression.
//!
//! A person has no record until a step is started. Starting creates a
//! `current` record; completing moves it to `completed`, once, for good.
//! A later step gets its own new record.
//!
//! Completing within `fast_completion_days` calendar days of the start is
//! allowed but must be confirmed by the operator. The engine never prompts:
//! callers ask [`TransitionEngine::assess_completion`], show the prompt, and
//! pass the operator's answer to [`TransitionEngine::complete_current`].

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{info, warn};
use uuid::Uuid;

use crate::catalog::StepCatalog;
use crate::config::{ProgressionConfig, StartPolicy};
use crate::error::ProgressionError;
use crate::progression::PersonProgressionStore;
use crate::store::MahakramaStore;
use crate::types::{
    CompleteProgressionRequest, MahakramaHistory, MahakramaStep, StartProgressionRequest,
};

/// Operator's answer to the fast-completion prompt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confirmation {
    Confirmed,
    Unconfirmed,
}

impl From<bool> for Confirmation {
    fn from(confirmed: bool) -> Self {
        if confirmed {
            Confirmation::Confirmed
        } else {
            Confirmation::Unconfirmed
        }
    }
}

/// What completing the current step on a given date would mean
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionAssessment {
    pub current: MahakramaHistory,
    pub days_elapsed: i64,
    pub requires_confirmation: bool,
}

impl CompletionAssessment {
    /// Question to put to the operator before a fast completion
    pub fn prompt(&self) -> String {
        format!(
            "This Mahakrama step was completed within {} day{}. Do you want to continue?",
            self.days_elapsed,
            if self.days_elapsed == 1 { "" } else { "s" }
        )
    }
}

/// Result of a committed completion
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionOutcome {
    /// The record re-read from the store after the write
    pub completed: MahakramaHistory,
    pub days_elapsed: i64,
}

/// The only component that mutates progression state
#[derive(Clone)]
pub struct TransitionEngine {
    store: Arc<dyn MahakramaStore>,
    catalog: StepCatalog,
    progression: PersonProgressionStore,
    policy: ProgressionConfig,
}

impl TransitionEngine {
    pub fn new(store: Arc<dyn MahakramaStore>, policy: ProgressionConfig) -> Self {
        Self {
            catalog: StepCatalog::new(store.clone()),
            progression: PersonProgressionStore::new(store.clone()),
            store,
            policy,
        }
    }

    pub fn catalog(&self) -> &StepCatalog {
        &self.catalog
    }

    pub fn progression(&self) -> &PersonProgressionStore {
        &self.progression
    }

    pub fn policy(&self) -> &ProgressionConfig {
        &self.policy
    }

    /// Steps an operator may pick when starting a progression
    pub async fn selectable_steps(&self) -> Result<Vec<MahakramaStep>, ProgressionError> {
        self.catalog.list().await
    }

    /// Check the start precondition under the configured policy
    pub async fn can_start(&self, person_id: Uuid) -> Result<bool, ProgressionError> {
        Ok(self.start_blocker(person_id).await?.is_none())
    }

    async fn start_blocker(&self, person_id: Uuid) -> Result<Option<String>, ProgressionError> {
        let blocker = match self.policy.start_policy {
            StartPolicy::SingleCurrent => {
                self.progression.current_for(person_id).await?.map(|h| {
                    format!(
                        "Step {}/{} ({}) is already in progress since {}",
                        h.group_id,
                        h.step_id,
                        h.step_name,
                        h.start_date.format("%Y-%m-%d")
                    )
                })
            }
            StartPolicy::SingleTrack => self
                .progression
                .has_history(person_id)
                .await?
                .then(|| "Mahakrama history already exists for this person.".to_string()),
        };
        Ok(blocker)
    }

    /// Begin a step for a person who has none in progress
    pub async fn start_progression(
        &self,
        person_id: Uuid,
        step_id: Uuid,
        start_date: DateTime<Utc>,
        instructor_id: Uuid,
        notes: Option<String>,
    ) -> Result<MahakramaHistory, ProgressionError> {
        if let Some(reason) = self.start_blocker(person_id).await? {
            warn!(person_id = %person_id, %reason, "Refused to start Mahakrama step");
            return Err(ProgressionError::AlreadyInProgress(reason));
        }

        let request = StartProgressionRequest {
            mahakrama_step_id: step_id,
            start_date,
            instructor_id,
            notes: notes.filter(|n| !n.trim().is_empty()),
        };
        let record = self.store.start_history(person_id, request).await?;
        info!(
            person_id = %person_id,
            history_id = %record.id,
            step = %record.step_name,
            "Started Mahakrama step"
        );
        Ok(record)
    }

    /// Check the completion preconditions and compute the confirmation policy
    pub async fn assess_completion(
        &self,
        person_id: Uuid,
        completed_date: DateTime<Utc>,
    ) -> Result<CompletionAssessment, ProgressionError> {
        let current = self
            .progression
            .current_for(person_id)
            .await?
            .ok_or_else(|| {
                ProgressionError::NoCurrentStep(format!(
                    "No Mahakrama step is in progress for person {}.",
                    person_id
                ))
            })?;

        if completed_date <= current.start_date {
            return Err(ProgressionError::Precondition(
                "Completed date must be after the start date.".to_string(),
            ));
        }

        let days_elapsed = current.days_elapsed(completed_date);
        Ok(CompletionAssessment {
            requires_confirmation: days_elapsed <= self.policy.fast_completion_days,
            days_elapsed,
            current,
        })
    }

    /// Complete the person's current step
    pub async fn complete_current(
        &self,
        person_id: Uuid,
        completed_date: DateTime<Utc>,
        instructor_id: Uuid,
        completion_notes: Option<String>,
        confirmation: Confirmation,
    ) -> Result<CompletionOutcome, ProgressionError> {
        let assessment = self.assess_completion(person_id, completed_date).await?;
        if assessment.requires_confirmation && confirmation == Confirmation::Unconfirmed {
            warn!(
                person_id = %person_id,
                days_elapsed = assessment.days_elapsed,
                "Fast completion not confirmed"
            );
            return Err(ProgressionError::ConfirmationRequired {
                days_elapsed: assessment.days_elapsed,
            });
        }

        let request = CompleteProgressionRequest {
            completed_date,
            instructor_id,
            completion_notes: completion_notes.filter(|n| !n.trim().is_empty()),
        };
        let history_id = assessment.current.id;
        self.store
            .complete_history(person_id, history_id, request)
            .await?;

        let completed = self
            .progression
            .history_for(person_id)
            .await?
            .into_iter()
            .find(|h| h.id == history_id)
            .ok_or_else(|| {
                ProgressionError::NotFound("Mahakrama history record not found".to_string())
            })?;
        info!(
            person_id = %person_id,
            history_id = %completed.id,
            days_elapsed = assessment.days_elapsed,
            "Completed Mahakrama step"
        );

        Ok(CompletionOutcome {
            completed,
            days_elapsed: assessment.days_elapsed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryStore;
    use crate::types::{HistoryStatus, StepInput};
    use chrono::TimeZone;

    fn date(month: u32, day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, month, day, 0, 0, 0).unwrap()
    }

    async fn engine_with(policy: ProgressionConfig) -> (TransitionEngine, Vec<MahakramaStep>) {
        let engine = TransitionEngine::new(Arc::new(InMemoryStore::new(policy.clone())), policy);
        let mut steps = Vec::new();
        for (sequence_number, step_id) in [(1.0, "S1"), (2.0, "S2")] {
            steps.push(
                engine
                    .catalog()
                    .create(StepInput {
                        sequence_number,
                        group_id: "G1".to_string(),
                        group_name: "Foundations".to_string(),
                        step_id: step_id.to_string(),
                        step_name: format!("Step {}", step_id),
                        description: None,
                    })
                    .await
                    .unwrap(),
            );
        }
        (engine, steps)
    }

    async fn engine() -> (TransitionEngine, Vec<MahakramaStep>) {
        engine_with(ProgressionConfig::default()).await
    }

    #[tokio::test]
    async fn test_selectable_steps_in_sequence_order() {
        let (engine, steps) = engine().await;
        let selectable = engine.selectable_steps().await.unwrap();
        assert_eq!(selectable, steps);
    }

    #[tokio::test]
    async fn test_start_creates_current_record() {
        let (engine, steps) = engine().await;
        let person = Uuid::new_v4();

        assert!(engine.can_start(person).await.unwrap());
        let record = engine
            .start_progression(person, steps[0].id, date(1, 1), Uuid::new_v4(), None)
            .await
            .unwrap();

        assert_eq!(record.status, HistoryStatus::Current);
        assert_eq!(record.end_date, None);
        assert_eq!(record.step_id, "S1");
        assert!(!engine.can_start(person).await.unwrap());
    }

    #[tokio::test]
    async fn test_second_start_is_already_in_progress() {
        let (engine, steps) = engine().await;
        let person = Uuid::new_v4();
        let instructor = Uuid::new_v4();

        engine
            .start_progression(person, steps[0].id, date(1, 1), instructor, None)
            .await
            .unwrap();
        let err = engine
            .start_progression(person, steps[1].id, date(1, 2), instructor, None)
            .await
            .unwrap_err();

        assert!(matches!(err, ProgressionError::AlreadyInProgress(ref m) if m.contains("S1")));
        assert_eq!(engine.progression().history_for(person).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_fast_completion_needs_confirmation() {
        let (engine, steps) = engine().await;
        let person = Uuid::new_v4();
        let instructor = Uuid::new_v4();
        engine
            .start_progression(person, steps[0].id, date(1, 1), instructor, None)
            .await
            .unwrap();

        let assessment = engine.assess_completion(person, date(1, 10)).await.unwrap();
        assert_eq!(assessment.days_elapsed, 9);
        assert!(assessment.requires_confirmation);
        assert_eq!(
            assessment.prompt(),
            "This Mahakrama step was completed within 9 days. Do you want to continue?"
        );

        let err = engine
            .complete_current(person, date(1, 10), instructor, None, Confirmation::Unconfirmed)
            .await
            .unwrap_err();
        assert_eq!(err, ProgressionError::ConfirmationRequired { days_elapsed: 9 });
        assert!(engine.progression().current_for(person).await.unwrap().is_some());

        let outcome = engine
            .complete_current(
                person,
                date(1, 10),
                instructor,
                Some("quick learner".to_string()),
                Confirmation::Confirmed,
            )
            .await
            .unwrap();
        assert_eq!(outcome.days_elapsed, 9);
        assert_eq!(outcome.completed.status, HistoryStatus::Completed);
        assert_eq!(outcome.completed.end_date, Some(date(1, 10)));
    }

    #[tokio::test]
    async fn test_outcome_names_completing_instructor() {
        let store = Arc::new(InMemoryStore::default());
        let engine = TransitionEngine::new(store.clone(), ProgressionConfig::default());
        let step = engine
            .catalog()
            .create(StepInput {
                sequence_number: 1.0,
                group_id: "G1".to_string(),
                group_name: "Foundations".to_string(),
                step_id: "S1".to_string(),
                step_name: "Step S1".to_string(),
                description: None,
            })
            .await
            .unwrap();
        let starter = Uuid::new_v4();
        let finisher = Uuid::new_v4();
        store.register_instructor(starter, "Ayu").await;
        store.register_instructor(finisher, "Budi").await;
        let person = Uuid::new_v4();

        let started = engine
            .start_progression(person, step.id, date(1, 1), starter, None)
            .await
            .unwrap();
        assert_eq!(started.instructor_name.as_deref(), Some("Ayu"));

        let outcome = engine
            .complete_current(person, date(3, 1), finisher, None, Confirmation::Unconfirmed)
            .await
            .unwrap();
        assert_eq!(outcome.completed.id, started.id);
        assert_eq!(outcome.completed.instructor_id, Some(finisher));
        assert_eq!(outcome.completed.instructor_name.as_deref(), Some("Budi"));
        assert_eq!(
            outcome.completed,
            engine.progression().history_for(person).await.unwrap()[0]
        );
    }

    #[tokio::test]
    async fn test_thirty_days_is_still_fast() {
        let (engine, steps) = engine().await;
        let person = Uuid::new_v4();
        engine
            .start_progression(person, steps[0].id, date(1, 1), Uuid::new_v4(), None)
            .await
            .unwrap();

        let at_limit = engine.assess_completion(person, date(1, 31)).await.unwrap();
        assert_eq!(at_limit.days_elapsed, 30);
        assert!(at_limit.requires_confirmation);

        let past_limit = engine.assess_completion(person, date(2, 1)).await.unwrap();
        assert_eq!(past_limit.days_elapsed, 31);
        assert!(!past_limit.requires_confirmation);
    }

    #[tokio::test]
    async fn test_slow_completion_needs_no_confirmation() {
        let (engine, steps) = engine().await;
        let person = Uuid::new_v4();
        let instructor = Uuid::new_v4();
        engine
            .start_progression(person, steps[0].id, date(1, 1), instructor, None)
            .await
            .unwrap();

        engine
            .complete_current(person, date(3, 1), instructor, None, Confirmation::Unconfirmed)
            .await
            .unwrap();

        assert!(engine.progression().current_for(person).await.unwrap().is_none());
        let history = engine.progression().history_for(person).await.unwrap();
        assert_eq!(history[0].status, HistoryStatus::Completed);
        assert_eq!(history[0].end_date, Some(date(3, 1)));
    }

    #[tokio::test]
    async fn test_completion_must_follow_start() {
        let (engine, steps) = engine().await;
        let person = Uuid::new_v4();
        let instructor = Uuid::new_v4();
        engine
            .start_progression(person, steps[0].id, date(1, 10), instructor, None)
            .await
            .unwrap();

        for completed in [date(1, 10), date(1, 5)] {
            let err = engine
                .complete_current(person, completed, instructor, None, Confirmation::Confirmed)
                .await
                .unwrap_err();
            assert!(matches!(err, ProgressionError::Precondition(_)));
        }

        let current = engine.progression().current_for(person).await.unwrap().unwrap();
        assert_eq!(current.status, HistoryStatus::Current);
        assert_eq!(current.end_date, None);
    }

    #[tokio::test]
    async fn test_complete_without_current_step() {
        let (engine, _) = engine().await;
        let err = engine
            .complete_current(
                Uuid::new_v4(),
                date(1, 10),
                Uuid::new_v4(),
                None,
                Confirmation::Confirmed,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ProgressionError::NoCurrentStep(_)));
    }

    #[tokio::test]
    async fn test_new_record_after_completion() {
        let (engine, steps) = engine().await;
        let person = Uuid::new_v4();
        let instructor = Uuid::new_v4();

        engine
            .start_progression(person, steps[0].id, date(1, 1), instructor, None)
            .await
            .unwrap();
        engine
            .complete_current(person, date(3, 1), instructor, None, Confirmation::Confirmed)
            .await
            .unwrap();
        assert!(engine.can_start(person).await.unwrap());

        let next = engine
            .start_progression(person, steps[1].id, date(3, 2), instructor, None)
            .await
            .unwrap();

        let history = engine.progression().history_for(person).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].id, next.id);
        assert_eq!(
            history.iter().filter(|h| h.is_current()).count(),
            1,
            "at most one current record"
        );
    }

    #[tokio::test]
    async fn test_single_track_refuses_restart() {
        let policy = ProgressionConfig {
            start_policy: StartPolicy::SingleTrack,
            ..Default::default()
        };
        let (engine, steps) = engine_with(policy).await;
        let person = Uuid::new_v4();
        let instructor = Uuid::new_v4();

        engine
            .start_progression(person, steps[0].id, date(1, 1), instructor, None)
            .await
            .unwrap();
        engine
            .complete_current(person, date(3, 1), instructor, None, Confirmation::Confirmed)
            .await
            .unwrap();

        assert!(!engine.can_start(person).await.unwrap());
        let err = engine
            .start_progression(person, steps[1].id, date(3, 2), instructor, None)
            .await
            .unwrap_err();
        assert!(matches!(err, ProgressionError::AlreadyInProgress(_)));
    }

    #[tokio::test]
    async fn test_auto_advance_moves_to_next_step() {
        let policy = ProgressionConfig {
            auto_advance: true,
            ..Default::default()
        };
        let (engine, steps) = engine_with(policy).await;
        let person = Uuid::new_v4();
        let instructor = Uuid::new_v4();

        engine
            .start_progression(person, steps[0].id, date(1, 1), instructor, None)
            .await
            .unwrap();
        engine
            .complete_current(person, date(3, 1), instructor, None, Confirmation::Confirmed)
            .await
            .unwrap();

        let current = engine.progression().current_for(person).await.unwrap().unwrap();
        assert_eq!(current.mahakrama_step_id, steps[1].id);
        assert_eq!(current.start_date, date(3, 2));
    }

    #[test]
    fn test_prompt_singular_day() {
        let start = date(1, 1);
        let step = MahakramaStep::from_input(
            StepInput {
                sequence_number: 1.0,
                group_id: "G1".to_string(),
                group_name: "Foundations".to_string(),
                step_id: "S1".to_string(),
                step_name: "Step".to_string(),
                description: None,
            },
            start,
        );
        let request = StartProgressionRequest {
            mahakrama_step_id: step.id,
            start_date: start,
            instructor_id: Uuid::new_v4(),
            notes: None,
        };
        let assessment = CompletionAssessment {
            current: MahakramaHistory::started(Uuid::new_v4(), &step, &request, start),
            days_elapsed: 1,
            requires_confirmation: true,
        };
        assert!(assessment.prompt().contains("within 1 day."));
    }

    #[test]
    fn test_confirmation_from_bool() {
        assert_eq!(Confirmation::from(true), Confirmation::Confirmed);
        assert_eq!(Confirmation::from(false), Confirmation::Unconfirmed);
    }
}
