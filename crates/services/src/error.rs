//! Shared error types for the services crate.

use thiserror::Error;

use assess_core::model::AnswerError;
use storage::repository::StorageError;
use storage::sqlite::SqliteInitError;

/// Shown when neither the API nor the transport produced a usable message.
pub const FALLBACK_ERROR_MESSAGE: &str = "Something went wrong. Please try again.";

/// Errors emitted by `AssessmentGateway` implementations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum GatewayError {
    #[error("assessment api returned status {status}")]
    Api {
        status: reqwest::StatusCode,
        message: Option<String>,
    },
    #[error("unexpected assessment api response: {0}")]
    InvalidResponse(String),
    #[error("{0}")]
    Unavailable(String),
    #[error(transparent)]
    Transport(#[from] reqwest::Error),
}

impl GatewayError {
    /// Best-effort human-readable message: the API's own message, then the
    /// raw error text, then a generic fallback.
    #[must_use]
    pub fn user_message(&self) -> String {
        if let Self::Api {
            message: Some(message),
            ..
        } = self
        {
            if !message.trim().is_empty() {
                return message.trim().to_string();
            }
        }
        let raw = self.to_string();
        if raw.trim().is_empty() {
            FALLBACK_ERROR_MESSAGE.to_string()
        } else {
            raw
        }
    }
}

/// Errors emitted by `ProgressStore`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ProgressError {
    #[error("no active assessment")]
    NoActiveAssessment,
    #[error("assessment incomplete: {answered} of {required} questions answered")]
    Incomplete { answered: usize, required: usize },
    #[error("another assessment request is already in flight")]
    Busy,
    #[error("response discarded because progress was reset while the request was in flight")]
    Superseded,
    #[error(transparent)]
    InvalidAnswer(#[from] AnswerError),
    #[error("{message}")]
    Remote {
        message: String,
        #[source]
        source: GatewayError,
    },
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl ProgressError {
    pub(crate) fn remote(source: GatewayError) -> Self {
        Self::Remote {
            message: source.user_message(),
            source,
        }
    }
}

/// Errors emitted while reading gateway configuration.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("missing required setting {0}")]
    Missing(&'static str),
    #[error("invalid base URL: {0}")]
    InvalidBaseUrl(String),
    #[error("invalid timeout seconds: {0}")]
    InvalidTimeout(String),
}

/// Errors emitted while bootstrapping assessment services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AssessmentServicesError {
    #[error(transparent)]
    Sqlite(#[from] SqliteInitError),
    #[error(transparent)]
    Gateway(#[from] GatewayError),
    #[error(transparent)]
    Progress(#[from] ProgressError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_message_prefers_api_body() {
        let err = GatewayError::Api {
            status: reqwest::StatusCode::CONFLICT,
            message: Some("Assessment already submitted".into()),
        };
        assert_eq!(err.user_message(), "Assessment already submitted");
    }

    #[test]
    fn user_message_falls_back_to_raw_error() {
        let err = GatewayError::Api {
            status: reqwest::StatusCode::INTERNAL_SERVER_ERROR,
            message: Some("   ".into()),
        };
        assert_eq!(
            err.user_message(),
            "assessment api returned status 500 Internal Server Error"
        );
    }

    #[test]
    fn user_message_uses_fallback_for_blank_errors() {
        let err = GatewayError::Unavailable(String::new());
        assert_eq!(err.user_message(), FALLBACK_ERROR_MESSAGE);
    }

    #[test]
    fn remote_error_displays_user_message() {
        let err = ProgressError::remote(GatewayError::Unavailable("offline".into()));
        assert_eq!(err.to_string(), "offline");
    }
}
