//! Per-instrument progress store.
//!
//! Local state is mutated synchronously under a short-lived lock before any
//! await point, so callers always see their own writes immediately. Remote
//! calls run with the lock released. Every `reset` (and every successful
//! `start`) bumps an epoch; start/submit responses that come back under an
//! older epoch are dropped instead of being written into the new state.
//!
//! Storage writes are serialized per store and always write the latest
//! in-memory state. A write queued under an older epoch is skipped, so a
//! reset session never lands back in storage.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use assess_core::Clock;
use assess_core::model::{
    AfterSubmit, AnswerValue, Answers, AssessmentId, Instrument, InstrumentSpec, ProgressState,
    QuestionId, SubmitGate,
};
use storage::repository::{ProgressRecord, ProgressRepository};
use tokio::sync::Mutex as AsyncMutex;

use crate::error::ProgressError;
use crate::gateway::AssessmentGateway;

/// Read-only view of a store, including the transient flags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressSnapshot {
    pub instrument: Instrument,
    pub assessment_id: Option<AssessmentId>,
    pub answers: Answers,
    pub current_index: usize,
    pub is_loading: bool,
    pub last_error: Option<String>,
    pub progress: u8,
}

#[derive(Debug, Default)]
struct StoreInner {
    state: ProgressState,
    is_loading: bool,
    last_error: Option<String>,
    epoch: u64,
}

/// Owns one instrument's in-session progress and mediates gateway calls.
pub struct ProgressStore {
    spec: InstrumentSpec,
    clock: Clock,
    gateway: Arc<dyn AssessmentGateway>,
    repo: Arc<dyn ProgressRepository>,
    inner: Mutex<StoreInner>,
    write_lock: AsyncMutex<()>,
}

impl ProgressStore {
    #[must_use]
    pub fn new(
        instrument: Instrument,
        clock: Clock,
        gateway: Arc<dyn AssessmentGateway>,
        repo: Arc<dyn ProgressRepository>,
    ) -> Self {
        Self {
            spec: instrument.spec(),
            clock,
            gateway,
            repo,
            inner: Mutex::new(StoreInner::default()),
            write_lock: AsyncMutex::new(()),
        }
    }

    #[must_use]
    pub fn instrument(&self) -> Instrument {
        self.spec.instrument
    }

    #[must_use]
    pub fn spec(&self) -> &InstrumentSpec {
        &self.spec
    }

    fn lock(&self) -> MutexGuard<'_, StoreInner> {
        // No invariant spans a panic point, so a poisoned guard is still usable.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    //
    // ─── READS ─────────────────────────────────────────────────────────────────
    //

    #[must_use]
    pub fn snapshot(&self) -> ProgressSnapshot {
        let inner = self.lock();
        ProgressSnapshot {
            instrument: self.spec.instrument,
            assessment_id: inner.state.assessment_id.clone(),
            answers: inner.state.answers.clone(),
            current_index: inner.state.current_index,
            is_loading: inner.is_loading,
            last_error: inner.last_error.clone(),
            progress: inner.state.progress_percent(&self.spec),
        }
    }

    /// The durable subset of the current state.
    #[must_use]
    pub fn state(&self) -> ProgressState {
        self.lock().state.clone()
    }

    #[must_use]
    pub fn answers(&self) -> Answers {
        self.lock().state.answers.clone()
    }

    #[must_use]
    pub fn current_index(&self) -> usize {
        self.lock().state.current_index
    }

    #[must_use]
    pub fn assessment_id(&self) -> Option<AssessmentId> {
        self.lock().state.assessment_id.clone()
    }

    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.lock().is_loading
    }

    #[must_use]
    pub fn last_error(&self) -> Option<String> {
        self.lock().last_error.clone()
    }

    /// Rounded percentage of answered questions, in `0..=100`.
    #[must_use]
    pub fn progress(&self) -> u8 {
        self.lock().state.progress_percent(&self.spec)
    }

    //
    // ─── PERSISTENCE ───────────────────────────────────────────────────────────
    //

    /// Load persisted progress so a returning user resumes without `start`.
    ///
    /// Returns `true` if a stored snapshot was applied. A store that already
    /// holds a session, or that changed while the read was in flight, keeps
    /// its live state and returns `false`.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::Storage` if the repository cannot be read.
    pub async fn hydrate(&self) -> Result<bool, ProgressError> {
        let instrument = self.spec.instrument;
        let epoch = self.lock().epoch;
        let Some(record) = self.repo.load_progress(instrument).await? else {
            tracing::debug!(%instrument, "no stored progress");
            return Ok(false);
        };

        let mut state = record.state;
        state.current_index = state.current_index.min(self.spec.max_cursor());

        let mut inner = self.lock();
        if inner.epoch != epoch || inner.is_loading || inner.state != ProgressState::default() {
            tracing::debug!(%instrument, "store already live; ignoring stored progress");
            return Ok(false);
        }
        tracing::debug!(
            %instrument,
            answered = state.answered_count(),
            saved_at = %record.saved_at,
            "rehydrated progress"
        );
        inner.state = state;
        Ok(true)
    }

    /// Write the current state unless the store was reset after `epoch`.
    async fn persist(&self, epoch: u64) {
        let instrument = self.spec.instrument;
        let _write = self.write_lock.lock().await;
        let state = {
            let inner = self.lock();
            if inner.epoch != epoch {
                tracing::debug!(%instrument, "skipping write for a session that has been reset");
                return;
            }
            inner.state.clone()
        };
        let record = ProgressRecord::new(instrument, state, self.clock.now());
        if let Err(err) = self.repo.save_progress(&record).await {
            tracing::warn!(%instrument, error = %err, "failed to persist progress");
        }
    }

    async fn clear_persisted(&self) {
        let instrument = self.spec.instrument;
        let _write = self.write_lock.lock().await;
        if let Err(err) = self.repo.clear_progress(instrument).await {
            tracing::warn!(%instrument, error = %err, "failed to clear stored progress");
        }
    }

    //
    // ─── ACTIONS ───────────────────────────────────────────────────────────────
    //

    /// Open a new session through the gateway.
    ///
    /// On success the answers and cursor are cleared. On failure prior state is
    /// untouched and `last_error` carries the user-facing message.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::Busy` if a start or submit is already in flight,
    /// `ProgressError::Remote` if the gateway fails, or
    /// `ProgressError::Superseded` if the store was reset meanwhile.
    pub async fn start(&self) -> Result<AssessmentId, ProgressError> {
        let instrument = self.spec.instrument;
        let epoch = self.begin_request()?;

        tracing::info!(%instrument, "starting assessment");
        let result = self.gateway.start(instrument).await;

        let (assessment_id, epoch) = {
            let mut inner = self.lock();
            if inner.epoch != epoch {
                tracing::debug!(%instrument, "discarding start response after reset");
                return Err(ProgressError::Superseded);
            }
            inner.is_loading = false;
            match result {
                Ok(assessment_id) => {
                    inner.state.begin(assessment_id.clone());
                    inner.epoch += 1;
                    (assessment_id, inner.epoch)
                }
                Err(err) => {
                    let err = ProgressError::remote(err);
                    tracing::warn!(%instrument, error = %err, "failed to start assessment");
                    inner.last_error = Some(err.to_string());
                    return Err(err);
                }
            }
        };

        self.persist(epoch).await;
        tracing::info!(%instrument, %assessment_id, "assessment started");
        Ok(assessment_id)
    }

    /// Record an answer locally, then save it remotely on a best-effort basis.
    ///
    /// The local merge happens before the first await. A failed remote save is
    /// logged and otherwise ignored; the local answer is kept.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::NoActiveAssessment` if no session has been
    /// started, or `ProgressError::InvalidAnswer` if the value does not fit the
    /// instrument's response scale. No remote call is made in either case.
    pub async fn set_answer(
        &self,
        question: QuestionId,
        value: AnswerValue,
    ) -> Result<(), ProgressError> {
        let instrument = self.spec.instrument;
        let (assessment_id, epoch) = {
            let mut inner = self.lock();
            let assessment_id = inner
                .state
                .assessment_id
                .clone()
                .ok_or(ProgressError::NoActiveAssessment)?;
            self.spec.validate_answer(value)?;
            inner.state.record_answer(question.clone(), value);
            (assessment_id, inner.epoch)
        };

        self.persist(epoch).await;

        if let Err(err) = self
            .gateway
            .save_answer(&assessment_id, &question, value)
            .await
        {
            tracing::warn!(
                %instrument,
                %assessment_id,
                %question,
                error = %err,
                "failed to save answer; keeping local copy"
            );
        } else if self.lock().epoch != epoch {
            tracing::debug!(%instrument, %question, "answer saved for a session that has since been reset");
        }
        Ok(())
    }

    /// Move to the next question, bounded by the instrument's navigation policy.
    pub async fn next_question(&self) {
        let epoch = {
            let mut inner = self.lock();
            inner.state.next_question(&self.spec);
            inner.epoch
        };
        self.persist(epoch).await;
    }

    /// Move to the previous question, stopping at the first.
    pub async fn previous_question(&self) {
        let epoch = {
            let mut inner = self.lock();
            inner.state.previous_question();
            inner.epoch
        };
        self.persist(epoch).await;
    }

    /// Submit the active assessment.
    ///
    /// Depending on the instrument, a successful submit either clears local
    /// progress or keeps it for a results view.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::NoActiveAssessment` without a session,
    /// `ProgressError::Incomplete` when the instrument requires every question
    /// answered, `ProgressError::Busy` if another request is in flight,
    /// `ProgressError::Remote` if the gateway fails, or
    /// `ProgressError::Superseded` if the store was reset meanwhile.
    pub async fn submit(&self) -> Result<(), ProgressError> {
        let instrument = self.spec.instrument;
        let (assessment_id, epoch) = {
            let mut inner = self.lock();
            if inner.is_loading {
                return Err(ProgressError::Busy);
            }
            let assessment_id = inner
                .state
                .assessment_id
                .clone()
                .ok_or(ProgressError::NoActiveAssessment)?;
            if self.spec.submit_gate == SubmitGate::RequireAllAnswers
                && !inner.state.is_fully_answered(&self.spec)
            {
                return Err(ProgressError::Incomplete {
                    answered: inner.state.answered_count(),
                    required: self.spec.question_count,
                });
            }
            inner.is_loading = true;
            inner.last_error = None;
            (assessment_id, inner.epoch)
        };

        tracing::info!(%instrument, %assessment_id, "submitting assessment");
        let result = self.gateway.submit(&assessment_id).await;

        let cleared = {
            let mut inner = self.lock();
            if inner.epoch != epoch {
                tracing::debug!(%instrument, "discarding submit response after reset");
                return Err(ProgressError::Superseded);
            }
            inner.is_loading = false;
            if let Err(err) = result {
                let err = ProgressError::remote(err);
                tracing::warn!(%instrument, %assessment_id, error = %err, "failed to submit assessment");
                inner.last_error = Some(err.to_string());
                return Err(err);
            }
            match self.spec.after_submit {
                AfterSubmit::Reset => {
                    inner.state.reset();
                    inner.epoch += 1;
                    true
                }
                AfterSubmit::Retain => false,
            }
        };

        if cleared {
            self.clear_persisted().await;
        }
        tracing::info!(%instrument, %assessment_id, retained = !cleared, "assessment submitted");
        Ok(())
    }

    /// Return to the initial empty state. Always succeeds; no remote call.
    ///
    /// Any start/submit still in flight will have its response discarded.
    pub async fn reset(&self) {
        {
            let mut inner = self.lock();
            inner.state.reset();
            inner.is_loading = false;
            inner.last_error = None;
            inner.epoch += 1;
        }
        self.clear_persisted().await;
        tracing::debug!(instrument = %self.spec.instrument, "progress reset");
    }

    fn begin_request(&self) -> Result<u64, ProgressError> {
        let mut inner = self.lock();
        if inner.is_loading {
            return Err(ProgressError::Busy);
        }
        inner.is_loading = true;
        inner.last_error = None;
        Ok(inner.epoch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GatewayError;
    use assess_core::model::MbtiPreference;
    use assess_core::time::fixed_clock;
    use async_trait::async_trait;
    use storage::repository::InMemoryRepository;

    struct EchoGateway;

    #[async_trait]
    impl AssessmentGateway for EchoGateway {
        async fn start(&self, instrument: Instrument) -> Result<AssessmentId, GatewayError> {
            Ok(AssessmentId::new(format!("{instrument}-session")))
        }

        async fn save_answer(
            &self,
            _assessment_id: &AssessmentId,
            _question: &QuestionId,
            _value: AnswerValue,
        ) -> Result<(), GatewayError> {
            Ok(())
        }

        async fn submit(&self, _assessment_id: &AssessmentId) -> Result<(), GatewayError> {
            Ok(())
        }
    }

    fn store(instrument: Instrument) -> ProgressStore {
        ProgressStore::new(
            instrument,
            fixed_clock(),
            Arc::new(EchoGateway),
            Arc::new(InMemoryRepository::new()),
        )
    }

    #[tokio::test]
    async fn fresh_store_is_empty() {
        let store = store(Instrument::Tki);
        let snapshot = store.snapshot();
        assert_eq!(snapshot.assessment_id, None);
        assert!(snapshot.answers.is_empty());
        assert_eq!(snapshot.current_index, 0);
        assert!(!snapshot.is_loading);
        assert_eq!(snapshot.last_error, None);
        assert_eq!(snapshot.progress, 0);
    }

    #[tokio::test]
    async fn start_assigns_id_and_clears_flags() {
        let store = store(Instrument::Wellness);
        let id = store.start().await.unwrap();
        assert_eq!(id.as_str(), "wellness-session");
        assert_eq!(store.assessment_id(), Some(id));
        assert!(!store.is_loading());
    }

    #[tokio::test]
    async fn answer_is_visible_immediately() {
        let store = store(Instrument::Tki);
        store.start().await.unwrap();
        let q = store.spec().question_id(0).unwrap();
        store.set_answer(q.clone(), AnswerValue::Scale(7)).await.unwrap();
        assert_eq!(store.answers().get(&q), Some(AnswerValue::Scale(7)));
        assert_eq!(store.progress(), 3);
    }

    #[tokio::test]
    async fn invalid_answer_is_rejected_before_merge() {
        let store = store(Instrument::Wellness);
        store.start().await.unwrap();
        let q = store.spec().question_id(0).unwrap();
        let err = store.set_answer(q, AnswerValue::Scale(9)).await.unwrap_err();
        assert!(matches!(err, ProgressError::InvalidAnswer(_)));
        assert!(store.answers().is_empty());
    }

    #[tokio::test]
    async fn opaque_question_ids_are_accepted() {
        let store = store(Instrument::Mbti);
        store.start().await.unwrap();
        let q = QuestionId::new("q_8f2c");
        store.set_answer(q.clone(), MbtiPreference::T.into()).await.unwrap();
        assert_eq!(store.answers().get(&q), Some(AnswerValue::Preference(MbtiPreference::T)));
    }

    #[tokio::test]
    async fn hydrate_leaves_live_session_alone() {
        let repo = Arc::new(InMemoryRepository::new());
        let store = ProgressStore::new(
            Instrument::Tki,
            fixed_clock(),
            Arc::new(EchoGateway),
            repo.clone(),
        );
        store.start().await.unwrap();
        let q = store.spec().question_id(0).unwrap();
        store.set_answer(q.clone(), AnswerValue::Scale(4)).await.unwrap();

        let mut stale = ProgressState::default();
        stale.begin(AssessmentId::new("older-session"));
        repo.save_progress(&ProgressRecord::new(Instrument::Tki, stale, fixed_clock().now()))
            .await
            .unwrap();

        assert!(!store.hydrate().await.unwrap());
        assert_eq!(store.assessment_id(), Some(AssessmentId::new("tki-session")));
        assert_eq!(store.answers().get(&q), Some(AnswerValue::Scale(4)));
    }

    #[tokio::test]
    async fn retained_instrument_keeps_state_after_submit() {
        let store = store(Instrument::Feedback360);
        store.start().await.unwrap();
        let q = store.spec().question_id(0).unwrap();
        store.set_answer(q, AnswerValue::Scale(2)).await.unwrap();
        store.submit().await.unwrap();
        assert!(store.assessment_id().is_some());
        assert_eq!(store.answers().len(), 1);
    }
}
