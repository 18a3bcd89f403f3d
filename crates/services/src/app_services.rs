use std::sync::Arc;

use assess_core::model::Instrument;
use storage::repository::{ProgressRepository, Storage};

use crate::Clock;
use crate::config::GatewayConfig;
use crate::error::{AssessmentServicesError, ProgressError};
use crate::gateway::{AssessmentGateway, HttpAssessmentGateway};
use crate::progress_store::ProgressStore;

/// Owns exactly one progress store per instrument for the lifetime of a session.
#[derive(Clone)]
pub struct AssessmentServices {
    mbti: Arc<ProgressStore>,
    tki: Arc<ProgressStore>,
    feedback_360: Arc<ProgressStore>,
    wellness: Arc<ProgressStore>,
}

impl AssessmentServices {
    /// Build the four stores over a shared gateway and repository.
    ///
    /// Stores start empty; call [`AssessmentServices::hydrate_all`] to resume
    /// persisted progress.
    #[must_use]
    pub fn new(
        gateway: Arc<dyn AssessmentGateway>,
        repo: Arc<dyn ProgressRepository>,
        clock: Clock,
    ) -> Self {
        let build = |instrument| {
            Arc::new(ProgressStore::new(
                instrument,
                clock,
                Arc::clone(&gateway),
                Arc::clone(&repo),
            ))
        };
        Self {
            mbti: build(Instrument::Mbti),
            tki: build(Instrument::Tki),
            feedback_360: build(Instrument::Feedback360),
            wellness: build(Instrument::Wellness),
        }
    }

    /// Build services backed by `SQLite` storage and the HTTP gateway, with
    /// every store rehydrated.
    ///
    /// # Errors
    ///
    /// Returns `AssessmentServicesError` if storage initialization, gateway
    /// construction, or rehydration fails.
    pub async fn new_sqlite(
        db_url: &str,
        gateway_config: GatewayConfig,
        clock: Clock,
    ) -> Result<Self, AssessmentServicesError> {
        let storage = Storage::sqlite(db_url).await?;
        let gateway: Arc<dyn AssessmentGateway> =
            Arc::new(HttpAssessmentGateway::new(gateway_config)?);
        let services = Self::new(gateway, Arc::clone(&storage.progress), clock);
        services.hydrate_all().await?;
        Ok(services)
    }

    /// Rehydrate every store from durable storage.
    ///
    /// # Errors
    ///
    /// Returns the first `ProgressError` raised by a store.
    pub async fn hydrate_all(&self) -> Result<(), ProgressError> {
        for instrument in Instrument::ALL {
            self.store(instrument).hydrate().await?;
        }
        Ok(())
    }

    #[must_use]
    pub fn store(&self, instrument: Instrument) -> Arc<ProgressStore> {
        let store = match instrument {
            Instrument::Mbti => &self.mbti,
            Instrument::Tki => &self.tki,
            Instrument::Feedback360 => &self.feedback_360,
            Instrument::Wellness => &self.wellness,
        };
        Arc::clone(store)
    }
}
