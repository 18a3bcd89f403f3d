use assess_core::model::{AnswerValue, AssessmentId, Instrument, QuestionId};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::GatewayConfig;
use crate::error::GatewayError;

/// Remote calls the progress stores depend on.
#[async_trait]
pub trait AssessmentGateway: Send + Sync {
    /// Open a new assessment session for `instrument`.
    ///
    /// # Errors
    ///
    /// Returns `GatewayError` if the backend rejects the request or is unreachable.
    async fn start(&self, instrument: Instrument) -> Result<AssessmentId, GatewayError>;

    /// Persist one answer on the backend.
    ///
    /// # Errors
    ///
    /// Returns `GatewayError` if the answer could not be saved.
    async fn save_answer(
        &self,
        assessment_id: &AssessmentId,
        question: &QuestionId,
        value: AnswerValue,
    ) -> Result<(), GatewayError>;

    /// Close the assessment for scoring.
    ///
    /// # Errors
    ///
    /// Returns `GatewayError` if the backend rejects the submission.
    async fn submit(&self, assessment_id: &AssessmentId) -> Result<(), GatewayError>;
}

/// `AssessmentGateway` over the backend's JSON REST API.
#[derive(Clone)]
pub struct HttpAssessmentGateway {
    client: Client,
    config: GatewayConfig,
}

impl HttpAssessmentGateway {
    /// Build a gateway with its own HTTP client.
    ///
    /// # Errors
    ///
    /// Returns `GatewayError::Transport` if the HTTP client cannot be built.
    pub fn new(config: GatewayConfig) -> Result<Self, GatewayError> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { client, config })
    }

    #[must_use]
    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    fn post(&self, path: &str) -> RequestBuilder {
        let url = format!("{}/{}", self.config.base_url.trim_end_matches('/'), path);
        let request = self.client.post(url);
        match self.config.api_token.as_deref() {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }
}

#[async_trait]
impl AssessmentGateway for HttpAssessmentGateway {
    async fn start(&self, instrument: Instrument) -> Result<AssessmentId, GatewayError> {
        let response = self
            .post(&format!("assessments/{}/start", instrument.slug()))
            .send()
            .await?;
        let body: Value = ensure_success(response).await?.json().await?;
        parse_assessment_id(&body)
    }

    async fn save_answer(
        &self,
        assessment_id: &AssessmentId,
        question: &QuestionId,
        value: AnswerValue,
    ) -> Result<(), GatewayError> {
        let payload = SaveAnswerRequest {
            question_id: question,
            value,
        };
        let response = self
            .post(&format!("assessments/{assessment_id}/answers"))
            .json(&payload)
            .send()
            .await?;
        ensure_success(response).await?;
        Ok(())
    }

    async fn submit(&self, assessment_id: &AssessmentId) -> Result<(), GatewayError> {
        let response = self
            .post(&format!("assessments/{assessment_id}/submit"))
            .send()
            .await?;
        ensure_success(response).await?;
        Ok(())
    }
}

#[derive(Debug, Serialize)]
struct SaveAnswerRequest<'a> {
    question_id: &'a QuestionId,
    value: AnswerValue,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: Option<String>,
    detail: Option<String>,
    error: Option<String>,
}

async fn ensure_success(response: Response) -> Result<Response, GatewayError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(GatewayError::Api {
        status,
        message: api_error_message(&body),
    })
}

/// Pull a message out of a structured error body, if there is one.
fn api_error_message(body: &str) -> Option<String> {
    let parsed: ApiErrorBody = serde_json::from_str(body).ok()?;
    [parsed.message, parsed.detail, parsed.error]
        .into_iter()
        .flatten()
        .map(|m| m.trim().to_string())
        .find(|m| !m.is_empty())
}

fn parse_assessment_id(body: &Value) -> Result<AssessmentId, GatewayError> {
    let raw = ["assessment_id", "id"]
        .into_iter()
        .filter_map(|key| body.get(key))
        .find_map(|value| match value {
            Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
        .ok_or_else(|| GatewayError::InvalidResponse("missing assessment id".into()))?;
    Ok(AssessmentId::new(raw))
}
