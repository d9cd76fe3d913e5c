//! Ordered catalog of curriculum steps.

use std::sync::Arc;

use uuid::Uuid;

use crate::error::ProgressionError;
use crate::store::MahakramaStore;
use crate::types::{by_sequence, MahakramaStep, StepInput, StepUpdate};

/// Step catalog backed by a [`MahakramaStore`]
///
/// Validates payloads before they leave the process and always returns steps
/// in ascending sequence order. Sequence numbers are chosen by the caller
/// (manual entry) or by the CSV importer; the catalog never renumbers.
#[derive(Clone)]
pub struct StepCatalog {
    store: Arc<dyn MahakramaStore>,
}

impl StepCatalog {
    pub fn new(store: Arc<dyn MahakramaStore>) -> Self {
        Self { store }
    }

    /// All steps sorted ascending by sequence number
    pub async fn list(&self) -> Result<Vec<MahakramaStep>, ProgressionError> {
        let mut steps = self.store.list_steps().await?;
        steps.sort_by(by_sequence);
        Ok(steps)
    }

    pub async fn get(&self, id: Uuid) -> Result<MahakramaStep, ProgressionError> {
        self.store.get_step(id).await
    }

    /// Highest sequence number in use, 0 for an empty catalog
    pub async fn max_sequence(&self) -> Result<f64, ProgressionError> {
        Ok(self
            .list()
            .await?
            .last()
            .map_or(0.0, |step| step.sequence_number))
    }

    pub async fn create(&self, input: StepInput) -> Result<MahakramaStep, ProgressionError> {
        input.validate().map_err(ProgressionError::Validation)?;
        self.store.create_step(input).await
    }

    /// Create every record or none
    pub async fn bulk_create(&self, records: Vec<StepInput>) -> Result<usize, ProgressionError> {
        let problems: Vec<String> = records
            .iter()
            .enumerate()
            .filter_map(|(index, record)| {
                record
                    .validate()
                    .err()
                    .map(|errors| format!("record {}: {}", index + 1, errors.join(", ")))
            })
            .collect();
        if !problems.is_empty() {
            return Err(ProgressionError::Validation(problems));
        }

        self.store.bulk_create_steps(records).await
    }

    pub async fn update(
        &self,
        id: Uuid,
        update: StepUpdate,
    ) -> Result<MahakramaStep, ProgressionError> {
        update.validate().map_err(ProgressionError::Validation)?;
        self.store.update_step(id, update).await
    }

    pub async fn delete(&self, id: Uuid) -> Result<(), ProgressionError> {
        self.store.delete_step(id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryStore;

    fn catalog() -> StepCatalog {
        StepCatalog::new(Arc::new(InMemoryStore::default()))
    }

    fn input(sequence_number: f64, step_id: &str) -> StepInput {
        StepInput {
            sequence_number,
            group_id: "G1".to_string(),
            group_name: "Foundations".to_string(),
            step_id: step_id.to_string(),
            step_name: format!("Step {}", step_id),
            description: None,
        }
    }

    #[tokio::test]
    async fn test_empty_catalog_max_sequence() {
        assert_eq!(catalog().max_sequence().await.unwrap(), 0.0);
    }

    #[tokio::test]
    async fn test_list_sorted_with_inserted_fraction() {
        let catalog = catalog();
        catalog.create(input(1.0, "A")).await.unwrap();
        catalog.create(input(2.0, "C")).await.unwrap();
        catalog.create(input(1.5, "B")).await.unwrap();

        let ids: Vec<String> = catalog
            .list()
            .await
            .unwrap()
            .into_iter()
            .map(|s| s.step_id)
            .collect();
        assert_eq!(ids, vec!["A", "B", "C"]);
        assert_eq!(catalog.max_sequence().await.unwrap(), 2.0);
    }

    #[tokio::test]
    async fn test_create_validates_before_store() {
        let catalog = catalog();
        let mut bad = input(0.0, "A");
        bad.group_id = String::new();

        let err = catalog.create(bad).await.unwrap_err();
        match err {
            ProgressionError::Validation(problems) => assert_eq!(problems.len(), 2),
            other => panic!("Expected Validation, got {:?}", other),
        }
        assert!(catalog.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_bulk_create_validates_every_record() {
        let catalog = catalog();
        let mut bad = input(2.0, "B");
        bad.step_name = " ".to_string();

        let err = catalog
            .bulk_create(vec![input(1.0, "A"), bad])
            .await
            .unwrap_err();
        assert_eq!(
            err,
            ProgressionError::Validation(vec!["record 2: stepName is required".to_string()])
        );
        assert!(catalog.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_update_and_delete() {
        let catalog = catalog();
        let step = catalog.create(input(1.0, "A")).await.unwrap();

        let updated = catalog
            .update(
                step.id,
                StepUpdate {
                    description: Some(Some("Sit quietly".to_string())),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.description.as_deref(), Some("Sit quietly"));
        assert_eq!(catalog.get(step.id).await.unwrap(), updated);

        assert!(matches!(
            catalog.update(step.id, StepUpdate::default()).await,
            Err(ProgressionError::Validation(_))
        ));

        catalog.delete(step.id).await.unwrap();
        assert!(matches!(
            catalog.get(step.id).await,
            Err(ProgressionError::NotFound(_))
        ));
    }
}
