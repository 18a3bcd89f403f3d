use assess_core::model::Instrument;
use async_trait::async_trait;

use super::SqliteRepository;
use super::mapping::{answers_to_json, index_to_i64, map_progress_row};
use crate::repository::{ProgressRecord, ProgressRepository, StorageError};

#[async_trait]
impl ProgressRepository for SqliteRepository {
    async fn load_progress(
        &self,
        instrument: Instrument,
    ) -> Result<Option<ProgressRecord>, StorageError> {
        let row = sqlx::query(
            r"
            SELECT assessment_id, answers, current_index, saved_at
            FROM assessment_progress
            WHERE storage_key = ?1
            ",
        )
        .bind(instrument.storage_key())
        .fetch_optional(&self.pool)
        .await
        .map_err(|err| StorageError::Connection(err.to_string()))?;

        row.map(|row| map_progress_row(instrument, &row)).transpose()
    }

    async fn save_progress(&self, record: &ProgressRecord) -> Result<(), StorageError> {
        let answers = answers_to_json(&record.state.answers)?;
        let current_index = index_to_i64(record.state.current_index)?;

        sqlx::query(
            r"
            INSERT INTO assessment_progress (
                storage_key,
                assessment_id,
                answers,
                current_index,
                saved_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(storage_key) DO UPDATE SET
                assessment_id = excluded.assessment_id,
                answers = excluded.answers,
                current_index = excluded.current_index,
                saved_at = excluded.saved_at
            ",
        )
        .bind(record.storage_key())
        .bind(record.state.assessment_id.as_ref().map(|id| id.as_str().to_owned()))
        .bind(answers)
        .bind(current_index)
        .bind(record.saved_at)
        .execute(&self.pool)
        .await
        .map_err(|err| StorageError::Connection(err.to_string()))?;

        Ok(())
    }

    async fn clear_progress(&self, instrument: Instrument) -> Result<(), StorageError> {
        sqlx::query("DELETE FROM assessment_progress WHERE storage_key = ?1")
            .bind(instrument.storage_key())
            .execute(&self.pool)
            .await
            .map_err(|err| StorageError::Connection(err.to_string()))?;
        Ok(())
    }
}
