use serde::{Deserialize, Serialize};

use crate::model::answer::{AnswerValue, Answers};
use crate::model::ids::{AssessmentId, QuestionId};
use crate::model::instrument::InstrumentSpec;

/// Durable part of one instrument's in-session progress.
///
/// Only these three fields are persisted; loading flags and errors live on
/// the store that owns this value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressState {
    pub assessment_id: Option<AssessmentId>,
    #[serde(default)]
    pub answers: Answers,
    #[serde(default)]
    pub current_index: usize,
}

impl ProgressState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Begin a fresh session under `assessment_id`, discarding prior answers.
    pub fn begin(&mut self, assessment_id: AssessmentId) {
        self.assessment_id = Some(assessment_id);
        self.answers.clear();
        self.current_index = 0;
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.assessment_id.is_some()
    }

    /// Merge an answer. Returns `true` if the mapping changed.
    pub fn record_answer(&mut self, question: QuestionId, value: AnswerValue) -> bool {
        self.answers.set(question, value)
    }

    /// Advance the cursor, honouring the instrument's navigation ceiling.
    pub fn next_question(&mut self, spec: &InstrumentSpec) {
        self.current_index = (self.current_index + 1).min(spec.max_cursor());
    }

    /// Step back one question, stopping at the first.
    pub fn previous_question(&mut self) {
        self.current_index = self.current_index.saturating_sub(1);
    }

    #[must_use]
    pub fn answered_count(&self) -> usize {
        self.answers.len()
    }

    /// Whether every question in the schema has an answer.
    #[must_use]
    pub fn is_fully_answered(&self, spec: &InstrumentSpec) -> bool {
        spec.question_count > 0 && self.answered_count() >= spec.question_count
    }

    /// Rounded percentage of answered questions, in `0..=100`.
    #[must_use]
    pub fn progress_percent(&self, spec: &InstrumentSpec) -> u8 {
        percent(self.answered_count(), spec.question_count)
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

fn percent(answered: usize, total: usize) -> u8 {
    if total == 0 {
        return 0;
    }
    let answered = answered.min(total);
    let rounded = (answered * 100 + total / 2) / total;
    u8::try_from(rounded).unwrap_or(100)
}
