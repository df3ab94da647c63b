use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::catalog::SurveyCatalog;
use super::definition::{QuestionId, SurveyDefinition, SurveyId, TenantId};
use super::eligibility;
use super::progress;
use super::session::{
    AnswerValue, EligibilityDelta, EnrichedQuestion, ParticipantId, ParticipantSession, SessionId,
    SessionProgress, SessionStatus, SurveyResponse,
};
use super::store::{
    Clock, ExportFormat, SequenceIdGenerator, SessionFilters, SessionIdGenerator, SessionStore,
    StoreError, SystemClock,
};
use super::suggestion;
use super::validation::{self, ValidationOutcome};

/// Stateful coordinator sequencing validation, eligibility, progress, and
/// suggestion over a session lifecycle, persisting through the store port.
pub struct SurveySessionService<S> {
    catalog: Arc<SurveyCatalog>,
    store: Arc<S>,
    clock: Arc<dyn Clock>,
    ids: Arc<dyn SessionIdGenerator>,
}

impl<S> SurveySessionService<S>
where
    S: SessionStore + 'static,
{
    pub fn new(catalog: Arc<SurveyCatalog>, store: Arc<S>) -> Self {
        Self::with_capabilities(
            catalog,
            store,
            Arc::new(SystemClock),
            Arc::new(SequenceIdGenerator::default()),
        )
    }

    pub fn with_capabilities(
        catalog: Arc<SurveyCatalog>,
        store: Arc<S>,
        clock: Arc<dyn Clock>,
        ids: Arc<dyn SessionIdGenerator>,
    ) -> Self {
        Self {
            catalog,
            store,
            clock,
            ids,
        }
    }

    pub fn list_available_surveys(&self, tenant: &TenantId) -> Vec<SurveySummary> {
        self.catalog
            .visible_to(tenant)
            .into_iter()
            .map(SurveySummary::from_definition)
            .collect()
    }

    pub fn start_session(
        &self,
        survey_id: &SurveyId,
        participant_id: ParticipantId,
        tenant_id: TenantId,
        metadata: BTreeMap<String, String>,
    ) -> Result<StartedSession, SessionServiceError> {
        let survey = self.visible_survey(survey_id, &tenant_id)?;
        let now = self.clock.now();

        let responses = BTreeMap::new();
        let session = ParticipantSession {
            session_id: self.ids.next_session_id(),
            tenant_id,
            survey_id: survey.id.clone(),
            participant_id,
            status: SessionStatus::InProgress,
            started_at: now,
            last_activity_at: now,
            completed_at: None,
            progress: progress::calculate(survey, &responses),
            responses,
            metadata,
            version: 1,
        };

        let stored = self.store.create_session(session)?;
        let questions = eligibility::enrich(&survey.questions, &stored.responses);
        let suggested_questions = self.suggest_for(survey, &questions);

        Ok(StartedSession {
            session: stored,
            questions,
            suggested_questions,
        })
    }

    pub fn get_question(
        &self,
        tenant: &TenantId,
        session_id: &SessionId,
        question_id: &QuestionId,
    ) -> Result<EnrichedQuestion, SessionServiceError> {
        let (session, survey) = self.load_session(session_id, tenant)?;

        if survey.question(question_id).is_none() {
            return Err(SessionServiceError::QuestionNotFound {
                survey: survey.id.clone(),
                question: question_id.clone(),
            });
        }

        let enriched = eligibility::enrich(&survey.questions, &session.responses);
        enriched
            .into_iter()
            .find(|question| &question.question.id == question_id)
            .ok_or_else(|| {
                SessionServiceError::Internal(format!(
                    "enrichment produced no result for question '{}'",
                    question_id.0
                ))
            })
    }

    /// Record one answer. Validation failures come back as data inside an
    /// `Ok` so the conversational layer can re-prompt; the session is only
    /// mutated on a successful write.
    pub fn submit_response(
        &self,
        tenant: &TenantId,
        session_id: &SessionId,
        question_id: &QuestionId,
        value: AnswerValue,
    ) -> Result<SubmitOutcome, SessionServiceError> {
        let (mut session, survey) = self.load_session(session_id, tenant)?;

        if session.is_completed() {
            return Err(SessionServiceError::SessionCompleted(session_id.clone()));
        }

        let Some(question) = survey.question(question_id) else {
            return Err(SessionServiceError::QuestionNotFound {
                survey: survey.id.clone(),
                question: question_id.clone(),
            });
        };

        // Eligibility is re-checked at submit time; the last read is no
        // guarantee once other answers have landed.
        let before = eligibility::enrich(&survey.questions, &session.responses);
        let current = before
            .iter()
            .find(|enriched| &enriched.question.id == question_id)
            .ok_or_else(|| {
                SessionServiceError::Internal(format!(
                    "enrichment produced no result for question '{}'",
                    question_id.0
                ))
            })?;
        if !current.currently_eligible {
            return Err(SessionServiceError::QuestionNotEligible {
                question: question_id.clone(),
                reason: current.eligibility_reason.clone(),
            });
        }

        let today = self.clock.now().date_naive();
        let validation = validation::validate(question, &value, today);
        if !validation.valid {
            return Ok(SubmitOutcome::rejected(validation));
        }

        let now = self.clock.now();
        let response = session
            .record_response(question_id.clone(), value, now)
            .clone();
        session.touch(now);
        session.progress = progress::calculate(survey, &session.responses);

        let stored = self.store.update_session(session)?;

        let after = eligibility::enrich(&survey.questions, &stored.responses);
        let eligibility_changes = diff_eligibility(&before, &after);
        let suggested_questions = self.suggest_for(survey, &after);

        Ok(SubmitOutcome::accepted(
            response,
            stored.progress.clone(),
            eligibility_changes,
            suggested_questions,
        ))
    }

    pub fn get_progress(
        &self,
        tenant: &TenantId,
        session_id: &SessionId,
    ) -> Result<ProgressReport, SessionServiceError> {
        let (session, survey) = self.load_session(session_id, tenant)?;

        let enriched = eligibility::enrich(&survey.questions, &session.responses);
        let (required_remaining, optional_remaining) = partition_remaining(&enriched);
        let can_complete = required_remaining.is_empty();

        Ok(ProgressReport {
            progress: progress::calculate(survey, &session.responses),
            required_remaining,
            optional_remaining,
            can_complete,
        })
    }

    pub fn complete_session(
        &self,
        tenant: &TenantId,
        session_id: &SessionId,
    ) -> Result<CompletionSummary, SessionServiceError> {
        let (mut session, survey) = self.load_session(session_id, tenant)?;

        if session.is_completed() {
            return Err(SessionServiceError::SessionCompleted(session_id.clone()));
        }

        let enriched = eligibility::enrich(&survey.questions, &session.responses);
        let (required_remaining, _) = partition_remaining(&enriched);
        if !required_remaining.is_empty() {
            return Err(SessionServiceError::CompletionBlocked {
                session: session_id.clone(),
                blockers: required_remaining
                    .into_iter()
                    .map(|question| question.question.id)
                    .collect(),
            });
        }

        let now = self.clock.now();
        session.status = SessionStatus::Completed;
        session.completed_at = Some(now);
        session.touch(now);

        let stored = self.store.update_session(session)?;

        let duration_minutes = ((now - stored.started_at).num_seconds() as f64 / 60.0).round() as i64;

        Ok(CompletionSummary {
            session_id: stored.session_id,
            completed_at: now,
            duration_minutes,
        })
    }

    pub fn resume_session(
        &self,
        tenant: &TenantId,
        session_id: &SessionId,
    ) -> Result<ResumeReport, SessionServiceError> {
        let (mut session, survey) = self.load_session(session_id, tenant)?;

        if session.is_completed() {
            return Err(SessionServiceError::SessionCompleted(session_id.clone()));
        }

        let now = self.clock.now();
        let idle_minutes = (now - session.last_activity_at).num_minutes().max(0);

        session.touch(now);
        let stored = self.store.update_session(session)?;

        let questions = eligibility::enrich(&survey.questions, &stored.responses);
        let suggested_questions = self.suggest_for(survey, &questions);

        Ok(ResumeReport {
            elapsed_since_last_activity: format_elapsed(idle_minutes),
            progress: progress::calculate(survey, &stored.responses),
            questions,
            suggested_questions,
        })
    }

    pub fn export_results(
        &self,
        tenant: &TenantId,
        survey_id: &SurveyId,
        format: ExportFormat,
        filters: SessionFilters,
    ) -> Result<ExportPayload, SessionServiceError> {
        let survey = self.visible_survey(survey_id, tenant)?;

        let batch = self
            .store
            .export_results(survey, tenant, format, &filters)?;

        Ok(ExportPayload {
            survey_id: survey.id.clone(),
            format,
            generated_at: self.clock.now(),
            record_count: batch.record_count,
            data: batch.data,
        })
    }

    pub fn store_healthy(&self) -> bool {
        self.store.health_check()
    }

    fn visible_survey(
        &self,
        survey_id: &SurveyId,
        tenant: &TenantId,
    ) -> Result<&SurveyDefinition, SessionServiceError> {
        self.catalog
            .get(survey_id)
            .filter(|survey| survey.visible_to(tenant))
            .ok_or_else(|| SessionServiceError::SurveyNotFound(survey_id.clone()))
    }

    fn load_session(
        &self,
        session_id: &SessionId,
        tenant: &TenantId,
    ) -> Result<(ParticipantSession, &SurveyDefinition), SessionServiceError> {
        let session = self
            .store
            .session(session_id, tenant)?
            .ok_or_else(|| SessionServiceError::SessionNotFound(session_id.clone()))?;

        let survey = self.catalog.get(&session.survey_id).ok_or_else(|| {
            SessionServiceError::Internal(format!(
                "session '{}' references unknown survey '{}'",
                session_id.0, session.survey_id.0
            ))
        })?;

        Ok((session, survey))
    }

    fn suggest_for(
        &self,
        survey: &SurveyDefinition,
        enriched: &[EnrichedQuestion],
    ) -> Vec<EnrichedQuestion> {
        suggestion::suggest(
            enriched,
            survey.settings.suggest_min,
            survey.settings.suggest_max,
        )
    }
}

fn partition_remaining(
    enriched: &[EnrichedQuestion],
) -> (Vec<EnrichedQuestion>, Vec<EnrichedQuestion>) {
    let mut required = Vec::new();
    let mut optional = Vec::new();

    for question in enriched {
        if !question.currently_eligible || question.already_answered {
            continue;
        }
        if question.question.required {
            required.push(question.clone());
        } else {
            optional.push(question.clone());
        }
    }

    (required, optional)
}

fn diff_eligibility(
    before: &[EnrichedQuestion],
    after: &[EnrichedQuestion],
) -> Vec<EligibilityDelta> {
    before
        .iter()
        .zip(after.iter())
        .filter(|(was, now)| was.currently_eligible != now.currently_eligible)
        .map(|(_, now)| EligibilityDelta {
            question_id: now.question.id.clone(),
            now_eligible: now.currently_eligible,
            reason: now.eligibility_reason.clone(),
        })
        .collect()
}

/// Idle-time wording for resume: minute granularity under an hour, floor
/// hours after that (90 minutes reads "1 hours").
fn format_elapsed(minutes: i64) -> String {
    if minutes < 60 {
        format!("{minutes} minutes")
    } else {
        format!("{} hours", minutes / 60)
    }
}

/// Trimmed catalog view for listing available surveys.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SurveySummary {
    pub id: SurveyId,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub version: u32,
    pub question_count: usize,
    pub estimated_minutes: u32,
}

impl SurveySummary {
    fn from_definition(definition: &SurveyDefinition) -> Self {
        Self {
            id: definition.id.clone(),
            title: definition.title.clone(),
            description: definition.description.clone(),
            version: definition.version,
            question_count: definition.questions.len(),
            estimated_minutes: definition.settings.estimated_minutes,
        }
    }
}

/// Payload returned by `start_session`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StartedSession {
    pub session: ParticipantSession,
    pub questions: Vec<EnrichedQuestion>,
    pub suggested_questions: Vec<EnrichedQuestion>,
}

/// Result of a submit: either an accepted write with its downstream effects,
/// or the validation failures, returned as data so callers can re-prompt.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitOutcome {
    pub accepted: bool,
    pub validation: ValidationOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<SurveyResponse>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress: Option<SessionProgress>,
    pub eligibility_changes: Vec<EligibilityDelta>,
    pub suggested_questions: Vec<EnrichedQuestion>,
}

impl SubmitOutcome {
    fn rejected(validation: ValidationOutcome) -> Self {
        Self {
            accepted: false,
            validation,
            response: None,
            progress: None,
            eligibility_changes: Vec::new(),
            suggested_questions: Vec::new(),
        }
    }

    fn accepted(
        response: SurveyResponse,
        progress: SessionProgress,
        eligibility_changes: Vec<EligibilityDelta>,
        suggested_questions: Vec<EnrichedQuestion>,
    ) -> Self {
        Self {
            accepted: true,
            validation: ValidationOutcome::passed(),
            response: Some(response),
            progress: Some(progress),
            eligibility_changes,
            suggested_questions,
        }
    }
}

/// Payload returned by `get_progress`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressReport {
    pub progress: SessionProgress,
    pub required_remaining: Vec<EnrichedQuestion>,
    pub optional_remaining: Vec<EnrichedQuestion>,
    /// True iff no eligible, unanswered, required question remains.
    pub can_complete: bool,
}

/// Payload returned by `complete_session`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionSummary {
    pub session_id: SessionId,
    pub completed_at: DateTime<Utc>,
    pub duration_minutes: i64,
}

/// Payload returned by `resume_session`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResumeReport {
    pub elapsed_since_last_activity: String,
    pub progress: SessionProgress,
    pub questions: Vec<EnrichedQuestion>,
    pub suggested_questions: Vec<EnrichedQuestion>,
}

/// Payload returned by `export_results`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportPayload {
    pub survey_id: SurveyId,
    pub format: ExportFormat,
    pub generated_at: DateTime<Utc>,
    pub record_count: usize,
    pub data: String,
}

/// Error raised by the session orchestrator. Validation failures are never
/// errors; they travel inside `SubmitOutcome`.
#[derive(Debug, thiserror::Error)]
pub enum SessionServiceError {
    #[error("survey '{}' not found", .0 .0)]
    SurveyNotFound(SurveyId),
    #[error("session '{}' not found", .0 .0)]
    SessionNotFound(SessionId),
    #[error("question '{}' not found in survey '{}'", question.0, survey.0)]
    QuestionNotFound {
        survey: SurveyId,
        question: QuestionId,
    },
    #[error("session '{}' is already completed", .0 .0)]
    SessionCompleted(SessionId),
    #[error("question '{}' is not currently eligible: {reason}", question.0)]
    QuestionNotEligible { question: QuestionId, reason: String },
    #[error(
        "session '{}' cannot be completed; unanswered required questions: {}",
        session.0,
        blockers.iter().map(|id| id.0.as_str()).collect::<Vec<_>>().join(", ")
    )]
    CompletionBlocked {
        session: SessionId,
        blockers: Vec<QuestionId>,
    },
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("internal invariant violated: {0}")]
    Internal(String),
}
