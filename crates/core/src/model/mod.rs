mod answer;
mod ids;
mod instrument;
mod progress;
pub mod status;

pub use answer::{AnswerError, AnswerValue, Answers, MbtiPreference};
pub use ids::{AssessmentId, ParseIdError, QuestionId};
pub use instrument::{
    AfterSubmit, Instrument, InstrumentSpec, NavigationPolicy, ParseInstrumentError,
    ResponseKind, SubmitGate,
};
pub use progress::ProgressState;
pub use status::{
    AssessmentAction, DisplayStatus, RemoteAssessmentRecord, determine_assessment_status,
    normalize_status,
};
