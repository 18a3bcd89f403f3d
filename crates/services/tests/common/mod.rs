#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use assess_core::model::{AnswerValue, AssessmentId, Instrument, QuestionId};
use async_trait::async_trait;
use services::{AssessmentGateway, GatewayError};
use storage::repository::{InMemoryRepository, ProgressRecord, ProgressRepository, StorageError};
use tokio::sync::Notify;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Start(Instrument),
    Save(AssessmentId, QuestionId, AnswerValue),
    Submit(AssessmentId),
}

/// Lets a test pause a call until it has done something else.
#[derive(Default)]
pub struct Gate {
    pub entered: Notify,
    pub release: Notify,
}

#[derive(Default)]
pub struct FakeGateway {
    calls: Mutex<Vec<Call>>,
    next_id: AtomicU64,
    pub fail_start: AtomicBool,
    pub fail_save: AtomicBool,
    pub fail_submit: AtomicBool,
    hold_start: Option<Arc<Gate>>,
}

impl FakeGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn holding_start(gate: Arc<Gate>) -> Self {
        Self {
            hold_start: Some(gate),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.calls().iter().filter(|c| pred(c)).count()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl AssessmentGateway for FakeGateway {
    async fn start(&self, instrument: Instrument) -> Result<AssessmentId, GatewayError> {
        self.record(Call::Start(instrument));
        if let Some(gate) = &self.hold_start {
            gate.entered.notify_one();
            gate.release.notified().await;
        }
        if self.fail_start.load(Ordering::SeqCst) {
            return Err(GatewayError::Api {
                status: reqwest::StatusCode::SERVICE_UNAVAILABLE,
                message: Some("Assessments are temporarily unavailable".into()),
            });
        }
        let n = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(AssessmentId::new(format!("{instrument}-{n}")))
    }

    async fn save_answer(
        &self,
        assessment_id: &AssessmentId,
        question: &QuestionId,
        value: AnswerValue,
    ) -> Result<(), GatewayError> {
        self.record(Call::Save(assessment_id.clone(), question.clone(), value));
        if self.fail_save.load(Ordering::SeqCst) {
            return Err(GatewayError::Unavailable("connection reset".into()));
        }
        Ok(())
    }

    async fn submit(&self, assessment_id: &AssessmentId) -> Result<(), GatewayError> {
        self.record(Call::Submit(assessment_id.clone()));
        if self.fail_submit.load(Ordering::SeqCst) {
            return Err(GatewayError::Api {
                status: reqwest::StatusCode::UNPROCESSABLE_ENTITY,
                message: None,
            });
        }
        Ok(())
    }
}

/// In-memory repository that can pause one save on a [`Gate`].
pub struct HoldingRepository {
    inner: InMemoryRepository,
    gate: Arc<Gate>,
    armed: AtomicBool,
}

impl HoldingRepository {
    pub fn new(inner: InMemoryRepository, gate: Arc<Gate>) -> Self {
        Self {
            inner,
            gate,
            armed: AtomicBool::new(false),
        }
    }

    /// Hold the next `save_progress` until the gate is released.
    pub fn hold_next_save(&self) {
        self.armed.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl ProgressRepository for HoldingRepository {
    async fn load_progress(
        &self,
        instrument: Instrument,
    ) -> Result<Option<ProgressRecord>, StorageError> {
        self.inner.load_progress(instrument).await
    }

    async fn save_progress(&self, record: &ProgressRecord) -> Result<(), StorageError> {
        if self.armed.swap(false, Ordering::SeqCst) {
            self.gate.entered.notify_one();
            self.gate.release.notified().await;
        }
        self.inner.save_progress(record).await
    }

    async fn clear_progress(&self, instrument: Instrument) -> Result<(), StorageError> {
        self.inner.clear_progress(instrument).await
    }
}
