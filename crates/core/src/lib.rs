#![forbid(unsafe_code)]

pub mod model;
pub mod time;

pub use model::determine_assessment_status;
pub use time::Clock;
