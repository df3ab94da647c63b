use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, TimeZone, Utc};

use crate::surveys::catalog::SurveyCatalog;
use crate::surveys::definition::{
    ChoiceOption, Condition, ConditionOperator, ConditionalLogic, QuestionDefinition, QuestionId,
    QuestionType, ScaleConfig, SurveyDefinition, SurveyId, SurveySettings, TenantId,
    ValidationRules,
};
use crate::surveys::export;
use crate::surveys::service::SurveySessionService;
use crate::surveys::session::{AnswerValue, ParticipantId, ParticipantSession, SessionId};
use crate::surveys::store::{
    Clock, ExportBatch, ExportFormat, SequenceIdGenerator, SessionFilters, SessionStore,
    StoreError,
};

pub(super) fn tenant() -> TenantId {
    TenantId("acme".to_string())
}

pub(super) fn participant() -> ParticipantId {
    ParticipantId("participant-1".to_string())
}

pub(super) fn question(id: &str, question_type: QuestionType) -> QuestionDefinition {
    QuestionDefinition {
        id: QuestionId(id.to_string()),
        prompt: format!("Question {id}"),
        question_type,
        required: false,
        options: Vec::new(),
        scale: None,
        matrix: None,
        validation: None,
        conditional: None,
    }
}

pub(super) fn show_if_true(depends_on: &str) -> ConditionalLogic {
    ConditionalLogic::Single(Condition {
        depends_on: QuestionId(depends_on.to_string()),
        show_if: vec![AnswerValue::Bool(true)],
    })
}

/// Pet check-in with a branch behind `q-pet` and a mix of optional types.
pub(super) fn sample_survey() -> SurveyDefinition {
    SurveyDefinition {
        id: SurveyId("sample".to_string()),
        title: "Pet owner check-in".to_string(),
        description: Some("Branching survey used across the engine tests".to_string()),
        version: 1,
        tenant_id: None,
        questions: vec![
            QuestionDefinition {
                required: true,
                ..question("q-pet", QuestionType::Boolean)
            },
            QuestionDefinition {
                validation: Some(ValidationRules {
                    min_length: Some(2),
                    ..ValidationRules::default()
                }),
                conditional: Some(show_if_true("q-pet")),
                ..question("q-pet-name", QuestionType::FreeForm)
            },
            QuestionDefinition {
                required: true,
                scale: Some(ScaleConfig {
                    min: 1.0,
                    max: 5.0,
                    step: 2.0,
                }),
                ..question("q-rating", QuestionType::RatingScale)
            },
            question("q-email", QuestionType::Email),
            QuestionDefinition {
                options: vec![
                    ChoiceOption::new("email"),
                    ChoiceOption::new("sms"),
                    ChoiceOption::new("phone"),
                ],
                validation: Some(ValidationRules {
                    min_selections: Some(1),
                    max_selections: Some(2),
                    ..ValidationRules::default()
                }),
                ..question("q-channels", QuestionType::MultipleSelect)
            },
        ],
        settings: SurveySettings {
            estimated_minutes: 6,
            suggest_min: 2,
            suggest_max: 3,
        },
    }
}

/// A required question hidden behind an unmet consent condition.
pub(super) fn gated_survey() -> SurveyDefinition {
    SurveyDefinition {
        id: SurveyId("gated".to_string()),
        title: "Consent-gated follow-up".to_string(),
        description: None,
        version: 1,
        tenant_id: None,
        questions: vec![
            QuestionDefinition {
                required: true,
                ..question("q-consent", QuestionType::Boolean)
            },
            QuestionDefinition {
                required: true,
                conditional: Some(show_if_true("q-consent")),
                ..question("q-reason", QuestionType::FreeForm)
            },
        ],
        settings: SurveySettings::default(),
    }
}

/// AND-compound branch requiring two booleans to be answered `true`.
pub(super) fn and_survey() -> SurveyDefinition {
    SurveyDefinition {
        id: SurveyId("and-compound".to_string()),
        title: "Compound condition".to_string(),
        description: None,
        version: 1,
        tenant_id: None,
        questions: vec![
            question("q-a", QuestionType::Boolean),
            question("q-b", QuestionType::Boolean),
            QuestionDefinition {
                conditional: Some(ConditionalLogic::Compound {
                    operator: ConditionOperator::And,
                    conditions: vec![
                        Condition {
                            depends_on: QuestionId("q-a".to_string()),
                            show_if: vec![AnswerValue::Bool(true)],
                        },
                        Condition {
                            depends_on: QuestionId("q-b".to_string()),
                            show_if: vec![AnswerValue::Bool(true)],
                        },
                    ],
                }),
                ..question("q-both", QuestionType::FreeForm)
            },
        ],
        settings: SurveySettings::default(),
    }
}

pub(super) fn catalog() -> Arc<SurveyCatalog> {
    Arc::new(
        SurveyCatalog::new(vec![sample_survey(), gated_survey(), and_survey()])
            .expect("fixture catalog is valid"),
    )
}

/// Deterministic clock shared between the test and the orchestrator.
pub(super) struct FixedClock {
    now: Mutex<DateTime<Utc>>,
}

impl FixedClock {
    pub(super) fn default_start() -> Self {
        Self {
            now: Mutex::new(Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap()),
        }
    }

    pub(super) fn advance_minutes(&self, minutes: i64) {
        let mut now = self.now.lock().expect("clock mutex poisoned");
        *now += Duration::minutes(minutes);
    }

    pub(super) fn current(&self) -> DateTime<Utc> {
        *self.now.lock().expect("clock mutex poisoned")
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.current()
    }
}

/// In-memory store double with CAS-versioned updates.
#[derive(Default)]
pub(super) struct MemoryStore {
    sessions: Mutex<BTreeMap<(TenantId, SessionId), ParticipantSession>>,
}

impl MemoryStore {
    pub(super) fn session_snapshot(
        &self,
        id: &SessionId,
        tenant: &TenantId,
    ) -> Option<ParticipantSession> {
        let guard = self.sessions.lock().expect("store mutex poisoned");
        guard.get(&(tenant.clone(), id.clone())).cloned()
    }
}

impl SessionStore for MemoryStore {
    fn create_session(
        &self,
        session: ParticipantSession,
    ) -> Result<ParticipantSession, StoreError> {
        let mut guard = self.sessions.lock().expect("store mutex poisoned");
        let key = (session.tenant_id.clone(), session.session_id.clone());
        if guard.contains_key(&key) {
            return Err(StoreError::Conflict);
        }
        guard.insert(key, session.clone());
        Ok(session)
    }

    fn session(
        &self,
        id: &SessionId,
        tenant: &TenantId,
    ) -> Result<Option<ParticipantSession>, StoreError> {
        let guard = self.sessions.lock().expect("store mutex poisoned");
        Ok(guard.get(&(tenant.clone(), id.clone())).cloned())
    }

    fn update_session(
        &self,
        mut session: ParticipantSession,
    ) -> Result<ParticipantSession, StoreError> {
        let mut guard = self.sessions.lock().expect("store mutex poisoned");
        let key = (session.tenant_id.clone(), session.session_id.clone());
        let existing = guard.get(&key).ok_or(StoreError::NotFound)?;

        if existing.version != session.version {
            return Err(StoreError::VersionConflict {
                expected: existing.version,
                found: session.version,
            });
        }

        session.version += 1;
        guard.insert(key, session.clone());
        Ok(session)
    }

    fn sessions_by_survey(
        &self,
        survey: &SurveyId,
        tenant: &TenantId,
        filters: &SessionFilters,
    ) -> Result<Vec<ParticipantSession>, StoreError> {
        let guard = self.sessions.lock().expect("store mutex poisoned");
        Ok(guard
            .values()
            .filter(|session| {
                &session.survey_id == survey
                    && &session.tenant_id == tenant
                    && filters.matches(session)
            })
            .cloned()
            .collect())
    }

    fn export_results(
        &self,
        survey: &SurveyDefinition,
        tenant: &TenantId,
        format: ExportFormat,
        filters: &SessionFilters,
    ) -> Result<ExportBatch, StoreError> {
        let sessions = self.sessions_by_survey(&survey.id, tenant, filters)?;
        export::render(survey, &sessions, format)
    }

    fn health_check(&self) -> bool {
        true
    }
}

/// Store double that refuses every call, for availability mapping tests.
pub(super) struct UnavailableStore;

impl SessionStore for UnavailableStore {
    fn create_session(
        &self,
        _session: ParticipantSession,
    ) -> Result<ParticipantSession, StoreError> {
        Err(StoreError::Unavailable("store offline".to_string()))
    }

    fn session(
        &self,
        _id: &SessionId,
        _tenant: &TenantId,
    ) -> Result<Option<ParticipantSession>, StoreError> {
        Err(StoreError::Unavailable("store offline".to_string()))
    }

    fn update_session(
        &self,
        _session: ParticipantSession,
    ) -> Result<ParticipantSession, StoreError> {
        Err(StoreError::Unavailable("store offline".to_string()))
    }

    fn sessions_by_survey(
        &self,
        _survey: &SurveyId,
        _tenant: &TenantId,
        _filters: &SessionFilters,
    ) -> Result<Vec<ParticipantSession>, StoreError> {
        Err(StoreError::Unavailable("store offline".to_string()))
    }

    fn export_results(
        &self,
        _survey: &SurveyDefinition,
        _tenant: &TenantId,
        _format: ExportFormat,
        _filters: &SessionFilters,
    ) -> Result<ExportBatch, StoreError> {
        Err(StoreError::Unavailable("store offline".to_string()))
    }

    fn health_check(&self) -> bool {
        false
    }
}

pub(super) fn build_service() -> (
    Arc<SurveySessionService<MemoryStore>>,
    Arc<MemoryStore>,
    Arc<FixedClock>,
) {
    let store = Arc::new(MemoryStore::default());
    let clock = Arc::new(FixedClock::default_start());
    let service = Arc::new(SurveySessionService::with_capabilities(
        catalog(),
        store.clone(),
        clock.clone(),
        Arc::new(SequenceIdGenerator::default()),
    ));
    (service, store, clock)
}

pub(super) fn start_session(
    service: &SurveySessionService<MemoryStore>,
    survey: &str,
) -> SessionId {
    service
        .start_session(
            &SurveyId(survey.to_string()),
            participant(),
            tenant(),
            BTreeMap::new(),
        )
        .expect("session starts")
        .session
        .session_id
}

pub(super) fn text(value: &str) -> AnswerValue {
    AnswerValue::Text(value.to_string())
}

pub(super) async fn read_json_body(response: axum::response::Response) -> serde_json::Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
