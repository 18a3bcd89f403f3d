#![forbid(unsafe_code)]

pub mod app_services;
pub mod config;
pub mod error;
pub mod gateway;
pub mod progress_store;

pub use assess_core::Clock;
pub use assess_core::model::determine_assessment_status;

pub use app_services::AssessmentServices;
pub use config::GatewayConfig;
pub use error::{AssessmentServicesError, ConfigError, GatewayError, ProgressError};
pub use gateway::{AssessmentGateway, HttpAssessmentGateway};
pub use progress_store::{ProgressSnapshot, ProgressStore};
