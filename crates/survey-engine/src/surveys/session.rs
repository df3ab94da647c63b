use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::definition::{QuestionDefinition, QuestionId, SurveyId, TenantId};

/// Identifier wrapper for participant sessions.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SessionId(pub String);

/// Identifier wrapper for survey participants.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ParticipantId(pub String);

/// Recorded answer value. The shape depends on the owning question's type:
/// scalar for most types, a string list for multiple-select, and a row-keyed
/// map for matrix questions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AnswerValue {
    Null,
    Bool(bool),
    Number(f64),
    Text(String),
    List(Vec<String>),
    Matrix(BTreeMap<String, MatrixCell>),
}

impl AnswerValue {
    /// Null and empty-string values count as omitted for the required check.
    pub fn is_empty(&self) -> bool {
        matches!(self, AnswerValue::Null) || matches!(self, AnswerValue::Text(text) if text.is_empty())
    }

    pub const fn shape(&self) -> &'static str {
        match self {
            AnswerValue::Null => "null",
            AnswerValue::Bool(_) => "boolean",
            AnswerValue::Number(_) => "number",
            AnswerValue::Text(_) => "string",
            AnswerValue::List(_) => "string array",
            AnswerValue::Matrix(_) => "matrix object",
        }
    }
}

/// One matrix cell: a single column value, or several when the question
/// allows multiple answers per row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MatrixCell {
    One(String),
    Many(Vec<String>),
}

impl MatrixCell {
    pub fn values(&self) -> &[String] {
        match self {
            MatrixCell::One(value) => std::slice::from_ref(value),
            MatrixCell::Many(values) => values,
        }
    }
}

/// Lifecycle of a participant session. `Completed` is terminal; `Abandoned`
/// is set by an external timeout policy, not by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SessionStatus {
    InProgress,
    Completed,
    Abandoned,
}

impl SessionStatus {
    pub const fn label(self) -> &'static str {
        match self {
            SessionStatus::InProgress => "in-progress",
            SessionStatus::Completed => "completed",
            SessionStatus::Abandoned => "abandoned",
        }
    }
}

/// A successfully recorded answer to one question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SurveyResponse {
    pub question_id: QuestionId,
    pub value: AnswerValue,
    pub answered_at: DateTime<Utc>,
    /// Incremented on every successful write for the same question id.
    pub attempt_count: u32,
}

/// Derived completion metrics, recomputed after every successful write.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionProgress {
    pub total_questions: usize,
    pub answered_questions: usize,
    pub required_answered: usize,
    pub required_remaining: usize,
    pub percent_complete: u8,
    pub estimated_time_remaining: String,
}

/// One participant's attempt at a survey. Mutated only through the session
/// orchestrator; persisted behind the storage port.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantSession {
    pub session_id: SessionId,
    pub tenant_id: TenantId,
    pub survey_id: SurveyId,
    pub participant_id: ParticipantId,
    pub status: SessionStatus,
    pub started_at: DateTime<Utc>,
    pub last_activity_at: DateTime<Utc>,
    /// Non-null exactly when `status` is `Completed`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    pub responses: BTreeMap<QuestionId, SurveyResponse>,
    pub progress: SessionProgress,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
    /// Optimistic concurrency token checked by `update_session`.
    pub version: u64,
}

impl ParticipantSession {
    pub fn is_completed(&self) -> bool {
        self.status == SessionStatus::Completed
    }

    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.last_activity_at = now;
    }

    /// Record a validated answer, incrementing the attempt counter when the
    /// question was answered before.
    pub fn record_response(
        &mut self,
        question_id: QuestionId,
        value: AnswerValue,
        answered_at: DateTime<Utc>,
    ) -> &SurveyResponse {
        let attempt_count = self
            .responses
            .get(&question_id)
            .map(|previous| previous.attempt_count + 1)
            .unwrap_or(1);

        self.responses.insert(
            question_id.clone(),
            SurveyResponse {
                question_id: question_id.clone(),
                value,
                answered_at,
                attempt_count,
            },
        );

        &self.responses[&question_id]
    }
}

/// A question definition overlaid, at read time only, with session-relative
/// state. Never persisted; recomputed on every read.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrichedQuestion {
    #[serde(flatten)]
    pub question: QuestionDefinition,
    pub currently_eligible: bool,
    pub eligibility_reason: String,
    pub already_answered: bool,
}

/// Eligibility flip produced by diffing before/after a single response write.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EligibilityDelta {
    pub question_id: QuestionId,
    pub now_eligible: bool,
    pub reason: String,
}
