//! Reconciliation of backend assessment records into a UI-facing status.
//!
//! The backend's `status` field is free text and has been seen to lag behind
//! the answer counts, so counts win whenever they prove completion.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Assessment record as reported by the backend. Read-only here.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteAssessmentRecord {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub answer_count: u32,
    #[serde(default)]
    pub total_questions: u32,
}

impl RemoteAssessmentRecord {
    #[must_use]
    pub fn new(status: impl Into<String>, answer_count: u32, total_questions: u32) -> Self {
        Self {
            status: status.into(),
            answer_count,
            total_questions,
        }
    }

    /// Lenient parse of a raw backend payload.
    ///
    /// Counts may arrive as numbers or numeric strings; anything negative or
    /// unparsable becomes 0. Returns `None` when `value` is not an object.
    #[must_use]
    pub fn from_json(value: &Value) -> Option<Self> {
        let object = value.as_object()?;
        let status = object
            .get("status")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        Some(Self {
            status,
            answer_count: lenient_count(object.get("answer_count")),
            total_questions: lenient_count(object.get("total_questions")),
        })
    }
}

fn lenient_count(value: Option<&Value>) -> u32 {
    let parsed = match value {
        Some(Value::Number(n)) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite() && *f > 0.0).map(|f| f as u64)),
        Some(Value::String(s)) => s.trim().parse::<u64>().ok(),
        _ => None,
    };
    parsed
        .and_then(|n| u32::try_from(n).ok())
        .unwrap_or_default()
}

/// Three-valued classification used to gate dashboard rendering and actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DisplayStatus {
    Completed,
    InProgress,
    Available,
}

impl DisplayStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::InProgress => "in-progress",
            Self::Available => "available",
        }
    }

    /// The action a dashboard offers for an assessment in this status.
    #[must_use]
    pub fn primary_action(self) -> AssessmentAction {
        match self {
            Self::Available => AssessmentAction::Start,
            Self::InProgress => AssessmentAction::Resume,
            Self::Completed => AssessmentAction::ViewResults,
        }
    }
}

impl fmt::Display for DisplayStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssessmentAction {
    Start,
    Resume,
    ViewResults,
}

/// Collapse case and `_`/`-` separators: `"NOT_STARTED"` → `"notstarted"`.
#[must_use]
pub fn normalize_status(raw: &str) -> String {
    raw.trim()
        .chars()
        .filter(|c| *c != '_' && *c != '-')
        .flat_map(char::to_lowercase)
        .collect()
}

/// Map a possibly-absent backend record to exactly one display status.
///
/// Pure and total: never panics, never performs I/O.
#[must_use]
pub fn determine_assessment_status(record: Option<&RemoteAssessmentRecord>) -> DisplayStatus {
    let Some(record) = record else {
        return DisplayStatus::Available;
    };

    if record.total_questions > 0 && record.answer_count >= record.total_questions {
        return DisplayStatus::Completed;
    }

    let started = record.answer_count > 0;
    match normalize_status(&record.status).as_str() {
        "completed" | "complete" => DisplayStatus::Completed,
        "inprogress" => DisplayStatus::InProgress,
        // "notstarted" shares the fallback: answers on record mean the label is stale.
        _ if started => DisplayStatus::InProgress,
        _ => DisplayStatus::Available,
    }
}
