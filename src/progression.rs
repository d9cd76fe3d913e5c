//! Read side of a person's Mahakrama history.

use std::sync::Arc;

use uuid::Uuid;

use crate::error::ProgressionError;
use crate::store::MahakramaStore;
use crate::types::{by_display_order, MahakramaHistory};

/// Per-person history reads
#[derive(Clone)]
pub struct PersonProgressionStore {
    store: Arc<dyn MahakramaStore>,
}

impl PersonProgressionStore {
    pub fn new(store: Arc<dyn MahakramaStore>) -> Self {
        Self { store }
    }

    /// Full history, newest start first, ties by sequence number
    pub async fn history_for(
        &self,
        person_id: Uuid,
    ) -> Result<Vec<MahakramaHistory>, ProgressionError> {
        let mut history = self.store.list_history(person_id).await?;
        history.sort_by(by_display_order);
        Ok(history)
    }

    /// The record currently in progress, if any
    pub async fn current_for(
        &self,
        person_id: Uuid,
    ) -> Result<Option<MahakramaHistory>, ProgressionError> {
        let history = self.history_for(person_id).await?;
        Ok(current_of(history, person_id))
    }

    pub async fn has_history(&self, person_id: Uuid) -> Result<bool, ProgressionError> {
        Ok(!self.store.list_history(person_id).await?.is_empty())
    }
}

/// Pick the `current` record out of a display-ordered history
pub fn current_of(history: Vec<MahakramaHistory>, person_id: Uuid) -> Option<MahakramaHistory> {
    let mut current = history.into_iter().filter(MahakramaHistory::is_current);
    let first = current.next();
    if current.next().is_some() {
        tracing::warn!(
            person_id = %person_id,
            "Store returned more than one current Mahakrama record; using the most recent"
        );
    }
    first
}
