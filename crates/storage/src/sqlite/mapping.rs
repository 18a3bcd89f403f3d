use assess_core::model::{Answers, AssessmentId, Instrument, ProgressState};
use chrono::{DateTime, Utc};
use sqlx::Row;

use crate::repository::{ProgressRecord, StorageError};

fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

pub(crate) fn index_to_i64(v: usize) -> Result<i64, StorageError> {
    i64::try_from(v).map_err(|_| StorageError::Serialization("current_index overflow".into()))
}

fn index_from_i64(v: i64) -> Result<usize, StorageError> {
    usize::try_from(v)
        .map_err(|_| StorageError::Serialization(format!("invalid current_index: {v}")))
}

pub(crate) fn answers_to_json(answers: &Answers) -> Result<String, StorageError> {
    serde_json::to_string(answers).map_err(ser)
}

pub(crate) fn map_progress_row(
    instrument: Instrument,
    row: &sqlx::sqlite::SqliteRow,
) -> Result<ProgressRecord, StorageError> {
    let assessment_id = row
        .try_get::<Option<String>, _>("assessment_id")
        .map_err(ser)?
        .map(AssessmentId::new);
    let answers: Answers =
        serde_json::from_str(&row.try_get::<String, _>("answers").map_err(ser)?).map_err(ser)?;
    let current_index = index_from_i64(row.try_get::<i64, _>("current_index").map_err(ser)?)?;
    let saved_at: DateTime<Utc> = row.try_get("saved_at").map_err(ser)?;

    Ok(ProgressRecord::new(
        instrument,
        ProgressState {
            assessment_id,
            answers,
            current_index,
        },
        saved_at,
    ))
}
