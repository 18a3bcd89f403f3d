use assess_core::model::{Instrument, ProgressState};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Persisted shape for one instrument's progress.
///
/// `saved_at` is bookkeeping for diagnostics; it is not used to merge
/// concurrent writers. The last write to a storage key wins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressRecord {
    pub instrument: Instrument,
    pub state: ProgressState,
    pub saved_at: DateTime<Utc>,
}

impl ProgressRecord {
    #[must_use]
    pub fn new(instrument: Instrument, state: ProgressState, saved_at: DateTime<Utc>) -> Self {
        Self {
            instrument,
            state,
            saved_at,
        }
    }

    #[must_use]
    pub fn storage_key(&self) -> String {
        self.instrument.storage_key()
    }
}

/// Repository contract for durable assessment progress, one slot per instrument.
#[async_trait]
pub trait ProgressRepository: Send + Sync {
    /// Fetch the stored progress for an instrument, if any.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be read or the stored
    /// payload cannot be decoded.
    async fn load_progress(
        &self,
        instrument: Instrument,
    ) -> Result<Option<ProgressRecord>, StorageError>;

    /// Persist progress, replacing whatever was stored under the same key.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the record cannot be stored.
    async fn save_progress(&self, record: &ProgressRecord) -> Result<(), StorageError>;

    /// Remove stored progress for an instrument. Missing entries are not an error.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend rejects the delete.
    async fn clear_progress(&self, instrument: Instrument) -> Result<(), StorageError>;
}

/// Simple in-memory repository implementation for testing and prototyping.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    progress: Arc<Mutex<HashMap<String, ProgressRecord>>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ProgressRepository for InMemoryRepository {
    async fn load_progress(
        &self,
        instrument: Instrument,
    ) -> Result<Option<ProgressRecord>, StorageError> {
        let guard = self
            .progress
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(guard.get(&instrument.storage_key()).cloned())
    }

    async fn save_progress(&self, record: &ProgressRecord) -> Result<(), StorageError> {
        let mut guard = self
            .progress
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard.insert(record.storage_key(), record.clone());
        Ok(())
    }

    async fn clear_progress(&self, instrument: Instrument) -> Result<(), StorageError> {
        let mut guard = self
            .progress
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard.remove(&instrument.storage_key());
        Ok(())
    }
}

/// Aggregates repositories behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub progress: Arc<dyn ProgressRepository>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            progress: Arc::new(InMemoryRepository::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assess_core::model::{AnswerValue, AssessmentId};
    use assess_core::time::fixed_now;

    fn started_state(id: &str) -> ProgressState {
        let spec = Instrument::Tki.spec();
        let mut state = ProgressState::new();
        state.begin(AssessmentId::new(id));
        state.record_answer(spec.question_id(0).unwrap(), AnswerValue::Scale(4));
        state.current_index = 1;
        state
    }

    #[tokio::test]
    async fn round_trips_progress_per_instrument() {
        let repo = InMemoryRepository::new();
        let record = ProgressRecord::new(Instrument::Tki, started_state("t-1"), fixed_now());
        repo.save_progress(&record).await.unwrap();

        let fetched = repo.load_progress(Instrument::Tki).await.unwrap();
        assert_eq!(fetched, Some(record));
        assert!(repo.load_progress(Instrument::Mbti).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn last_write_wins_for_same_key() {
        let repo = InMemoryRepository::new();
        repo.save_progress(&ProgressRecord::new(
            Instrument::Tki,
            started_state("first"),
            fixed_now(),
        ))
        .await
        .unwrap();
        repo.save_progress(&ProgressRecord::new(
            Instrument::Tki,
            started_state("second"),
            fixed_now(),
        ))
        .await
        .unwrap();

        let fetched = repo.load_progress(Instrument::Tki).await.unwrap().unwrap();
        assert_eq!(fetched.state.assessment_id, Some(AssessmentId::new("second")));
    }

    #[tokio::test]
    async fn clear_is_idempotent() {
        let repo = InMemoryRepository::new();
        repo.clear_progress(Instrument::Wellness).await.unwrap();
        repo.save_progress(&ProgressRecord::new(
            Instrument::Wellness,
            ProgressState::new(),
            fixed_now(),
        ))
        .await
        .unwrap();
        repo.clear_progress(Instrument::Wellness).await.unwrap();
        assert!(repo.load_progress(Instrument::Wellness).await.unwrap().is_none());
    }
}
