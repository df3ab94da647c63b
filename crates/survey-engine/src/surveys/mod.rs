//! Survey session engine: definitions, conditional eligibility, per-type
//! response validation, progress tracking, suggestion policy, and the
//! orchestrator tying them together over the storage port.

pub mod catalog;
pub mod definition;
pub(crate) mod eligibility;
pub mod export;
pub(crate) mod progress;
pub mod router;
pub mod service;
pub mod session;
pub mod store;
pub(crate) mod suggestion;
pub mod validation;

#[cfg(test)]
mod tests;

pub use catalog::{DefinitionError, SurveyCatalog};
pub use definition::{
    ChoiceOption, Condition, ConditionOperator, ConditionalLogic, MatrixConfig, MatrixRow,
    QuestionDefinition, QuestionId, QuestionType, ScaleConfig, SurveyDefinition, SurveyId,
    SurveySettings, TenantId, ValidationRules,
};
pub use eligibility::{enrich, evaluate, EligibilityStatus};
pub use progress::calculate as calculate_progress;
pub use router::session_router;
pub use service::{
    CompletionSummary, ExportPayload, ProgressReport, ResumeReport, SessionServiceError,
    StartedSession, SubmitOutcome, SurveySessionService, SurveySummary,
};
pub use session::{
    AnswerValue, EligibilityDelta, EnrichedQuestion, MatrixCell, ParticipantId,
    ParticipantSession, SessionId, SessionProgress, SessionStatus, SurveyResponse,
};
pub use store::{
    Clock, ExportBatch, ExportFormat, SequenceIdGenerator, SessionFilters, SessionIdGenerator,
    SessionStore, StoreError, SystemClock,
};
pub use suggestion::suggest;
pub use validation::{validate, ConstraintKind, ValidationIssue, ValidationOutcome};
