use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::model::ids::QuestionId;

//
// ─── ERRORS ───────────────────────────────────────────────────────────────────
//

/// Reasons an answer is rejected before it reaches local state or the gateway.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum AnswerError {
    #[error("scale value {value} is outside {min}..={max}")]
    OutOfRange { value: u8, min: u8, max: u8 },

    #[error("expected a {expected} answer")]
    WrongKind { expected: &'static str },

    #[error("invalid preference code: {0}")]
    InvalidPreference(String),
}

//
// ─── MBTI PREFERENCES ─────────────────────────────────────────────────────────
//

/// One of the eight MBTI preference codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MbtiPreference {
    E,
    I,
    S,
    N,
    T,
    F,
    J,
    P,
}

impl MbtiPreference {
    #[must_use]
    pub fn code(self) -> char {
        match self {
            Self::E => 'E',
            Self::I => 'I',
            Self::S => 'S',
            Self::N => 'N',
            Self::T => 'T',
            Self::F => 'F',
            Self::J => 'J',
            Self::P => 'P',
        }
    }
}

impl fmt::Display for MbtiPreference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

impl FromStr for MbtiPreference {
    type Err = AnswerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "E" => Ok(Self::E),
            "I" => Ok(Self::I),
            "S" => Ok(Self::S),
            "N" => Ok(Self::N),
            "T" => Ok(Self::T),
            "F" => Ok(Self::F),
            "J" => Ok(Self::J),
            "P" => Ok(Self::P),
            _ => Err(AnswerError::InvalidPreference(s.to_string())),
        }
    }
}

//
// ─── ANSWER VALUES ────────────────────────────────────────────────────────────
//

/// A single response. MBTI answers are preference codes, every other
/// instrument answers on a bounded integer scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AnswerValue {
    Preference(MbtiPreference),
    Scale(u8),
}

impl fmt::Display for AnswerValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Preference(p) => write!(f, "{p}"),
            Self::Scale(v) => write!(f, "{v}"),
        }
    }
}

impl From<MbtiPreference> for AnswerValue {
    fn from(value: MbtiPreference) -> Self {
        Self::Preference(value)
    }
}

impl From<u8> for AnswerValue {
    fn from(value: u8) -> Self {
        Self::Scale(value)
    }
}

//
// ─── ANSWER MAPPING ───────────────────────────────────────────────────────────
//

/// Question id → response. Each question appears at most once; writing an
/// existing question overwrites it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Answers(BTreeMap<QuestionId, AnswerValue>);

impl Answers {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite an answer. Returns `true` if the mapping changed.
    pub fn set(&mut self, question: QuestionId, value: AnswerValue) -> bool {
        match self.0.insert(question, value) {
            Some(previous) => previous != value,
            None => true,
        }
    }

    #[must_use]
    pub fn get(&self, question: &QuestionId) -> Option<AnswerValue> {
        self.0.get(question).copied()
    }

    #[must_use]
    pub fn contains(&self, question: &QuestionId) -> bool {
        self.0.contains_key(question)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&QuestionId, &AnswerValue)> {
        self.0.iter()
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }
}

impl FromIterator<(QuestionId, AnswerValue)> for Answers {
    fn from_iter<T: IntoIterator<Item = (QuestionId, AnswerValue)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}
