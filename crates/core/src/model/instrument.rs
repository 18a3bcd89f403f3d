use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::model::answer::{AnswerError, AnswerValue};
use crate::model::ids::QuestionId;

//
// ─── INSTRUMENT ────────────────────────────────────────────────────────────────
//

/// The four independent assessment instruments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Instrument {
    Mbti,
    Tki,
    #[serde(rename = "360-feedback")]
    Feedback360,
    Wellness,
}

impl Instrument {
    pub const ALL: [Instrument; 4] = [
        Instrument::Mbti,
        Instrument::Tki,
        Instrument::Feedback360,
        Instrument::Wellness,
    ];

    /// Slug used in gateway URLs and question ids.
    #[must_use]
    pub fn slug(self) -> &'static str {
        match self {
            Self::Mbti => "mbti",
            Self::Tki => "tki",
            Self::Feedback360 => "360-feedback",
            Self::Wellness => "wellness",
        }
    }

    /// Key under which this instrument's progress is persisted.
    #[must_use]
    pub fn storage_key(self) -> String {
        format!("assessment-progress:{}", self.slug())
    }

    #[must_use]
    pub fn spec(self) -> InstrumentSpec {
        match self {
            Self::Mbti => InstrumentSpec {
                instrument: self,
                question_count: 40,
                response: ResponseKind::Preference,
                navigation: NavigationPolicy::ClampAtLast,
                submit_gate: SubmitGate::RequireAllAnswers,
                after_submit: AfterSubmit::Retain,
            },
            Self::Tki => InstrumentSpec {
                instrument: self,
                question_count: 30,
                response: ResponseKind::Scale { min: 1, max: 12 },
                navigation: NavigationPolicy::ClampAtLast,
                submit_gate: SubmitGate::None,
                after_submit: AfterSubmit::Reset,
            },
            Self::Feedback360 => InstrumentSpec {
                instrument: self,
                question_count: 40,
                response: ResponseKind::Scale { min: 1, max: 5 },
                navigation: NavigationPolicy::ClampAtLast,
                submit_gate: SubmitGate::None,
                after_submit: AfterSubmit::Retain,
            },
            Self::Wellness => InstrumentSpec {
                instrument: self,
                question_count: 25,
                response: ResponseKind::Scale { min: 1, max: 5 },
                navigation: NavigationPolicy::CompletionSentinel,
                submit_gate: SubmitGate::None,
                after_submit: AfterSubmit::Reset,
            },
        }
    }
}

impl fmt::Display for Instrument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}

/// Error type for parsing an instrument slug
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseInstrumentError(String);

impl fmt::Display for ParseInstrumentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown instrument: {}", self.0)
    }
}

impl std::error::Error for ParseInstrumentError {}

impl FromStr for Instrument {
    type Err = ParseInstrumentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|instrument| instrument.slug() == s.trim())
            .ok_or_else(|| ParseInstrumentError(s.to_string()))
    }
}

//
// ─── POLICIES ──────────────────────────────────────────────────────────────────
//

/// Shape of a valid response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseKind {
    /// Any of the eight MBTI preference codes.
    Preference,
    /// Integer in `min..=max`.
    Scale { min: u8, max: u8 },
}

/// How far `next_question` may move the cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavigationPolicy {
    /// The cursor stops at the last question.
    ClampAtLast,
    /// The cursor may step one past the last question to mark the flow finished.
    CompletionSentinel,
}

/// Client-side check applied before `submit` reaches the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitGate {
    None,
    RequireAllAnswers,
}

/// What a successful submit does to local progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AfterSubmit {
    /// Clear everything; the assessment is closed.
    Reset,
    /// Keep answers and id so a results view can read them.
    Retain,
}

//
// ─── INSTRUMENT SPEC ───────────────────────────────────────────────────────────
//

/// Fixed question schema and per-instrument policies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InstrumentSpec {
    pub instrument: Instrument,
    pub question_count: usize,
    pub response: ResponseKind,
    pub navigation: NavigationPolicy,
    pub submit_gate: SubmitGate,
    pub after_submit: AfterSubmit,
}

impl InstrumentSpec {
    /// Last valid question index (0 for an empty schema).
    #[must_use]
    pub fn last_index(&self) -> usize {
        self.question_count.saturating_sub(1)
    }

    /// Highest cursor value `next_question` may reach.
    #[must_use]
    pub fn max_cursor(&self) -> usize {
        match self.navigation {
            NavigationPolicy::ClampAtLast => self.last_index(),
            NavigationPolicy::CompletionSentinel => self.question_count,
        }
    }

    /// Question id for a zero-based position, e.g. `tki-1` for index 0.
    #[must_use]
    pub fn question_id(&self, index: usize) -> Option<QuestionId> {
        (index < self.question_count)
            .then(|| QuestionId::new(format!("{}-{}", self.instrument.slug(), index + 1)))
    }

    pub fn question_ids(&self) -> impl Iterator<Item = QuestionId> + '_ {
        (0..self.question_count).filter_map(|index| self.question_id(index))
    }

    /// Check that `value` has the shape this instrument answers with.
    ///
    /// Question ids are opaque backend keys and are not checked here.
    ///
    /// # Errors
    ///
    /// Returns `AnswerError` if a scale value is out of bounds or the value
    /// is of the wrong kind.
    pub fn validate_answer(&self, value: AnswerValue) -> Result<(), AnswerError> {
        match (self.response, value) {
            (ResponseKind::Preference, AnswerValue::Preference(_)) => Ok(()),
            (ResponseKind::Scale { min, max }, AnswerValue::Scale(v)) => {
                if (min..=max).contains(&v) {
                    Ok(())
                } else {
                    Err(AnswerError::OutOfRange { value: v, min, max })
                }
            }
            (ResponseKind::Preference, AnswerValue::Scale(_)) => Err(AnswerError::WrongKind {
                expected: "preference",
            }),
            (ResponseKind::Scale { .. }, AnswerValue::Preference(_)) => {
                Err(AnswerError::WrongKind { expected: "scale" })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::answer::MbtiPreference;

    #[test]
    fn slugs_round_trip_through_from_str() {
        for instrument in Instrument::ALL {
            assert_eq!(instrument.slug().parse::<Instrument>().unwrap(), instrument);
        }
        assert!("disc".parse::<Instrument>().is_err());
    }

    #[test]
    fn storage_keys_are_distinct_per_instrument() {
        let keys: std::collections::HashSet<_> =
            Instrument::ALL.iter().map(|i| i.storage_key()).collect();
        assert_eq!(keys.len(), 4);
        assert_eq!(Instrument::Tki.storage_key(), "assessment-progress:tki");
    }

    #[test]
    fn question_ids_are_one_based() {
        let spec = Instrument::Tki.spec();
        assert_eq!(spec.question_id(0).unwrap().as_str(), "tki-1");
        assert_eq!(spec.question_id(29).unwrap().as_str(), "tki-30");
        assert!(spec.question_id(30).is_none());
        assert_eq!(spec.question_ids().count(), 30);
        assert_eq!(
            Instrument::Feedback360.spec().question_id(4).unwrap().as_str(),
            "360-feedback-5"
        );
    }

    #[test]
    fn mbti_accepts_every_preference_code() {
        let spec = Instrument::Mbti.spec();
        for code in ["E", "I", "S", "N", "T", "F", "J", "P"] {
            let pref: MbtiPreference = code.parse().unwrap();
            assert!(spec.validate_answer(pref.into()).is_ok(), "{code}");
        }
        assert!(matches!(
            spec.validate_answer(AnswerValue::Scale(3)),
            Err(AnswerError::WrongKind { .. })
        ));
    }

    #[test]
    fn scale_answers_are_bounded() {
        let spec = Instrument::Wellness.spec();
        assert!(spec.validate_answer(AnswerValue::Scale(1)).is_ok());
        assert!(spec.validate_answer(AnswerValue::Scale(5)).is_ok());
        assert_eq!(
            spec.validate_answer(AnswerValue::Scale(6)),
            Err(AnswerError::OutOfRange {
                value: 6,
                min: 1,
                max: 5
            })
        );
        assert!(spec.validate_answer(AnswerValue::Scale(0)).is_err());
        assert!(matches!(
            spec.validate_answer(MbtiPreference::E.into()),
            Err(AnswerError::WrongKind { expected: "scale" })
        ));

        assert!(Instrument::Tki.spec().validate_answer(AnswerValue::Scale(12)).is_ok());
    }

    #[test]
    fn cursor_ceiling_follows_navigation_policy() {
        assert_eq!(Instrument::Mbti.spec().max_cursor(), 39);
        assert_eq!(Instrument::Wellness.spec().max_cursor(), 25);
    }
}
