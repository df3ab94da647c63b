use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use metrics_exporter_prometheus::PrometheusHandle;
use std::collections::BTreeMap;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};
use survey_engine::surveys::catalog::{DefinitionError, SurveyCatalog};
use survey_engine::surveys::definition::{
    ChoiceOption, Condition, ConditionalLogic, MatrixConfig, MatrixRow, QuestionDefinition,
    QuestionId, QuestionType, ScaleConfig, SurveyDefinition, SurveyId, SurveySettings, TenantId,
    ValidationRules,
};
use survey_engine::surveys::export;
use survey_engine::surveys::session::{AnswerValue, ParticipantSession, SessionId};
use survey_engine::surveys::store::{
    ExportBatch, ExportFormat, SessionFilters, SessionStore, StoreError,
};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Tenant-keyed session store backing the service until a durable adapter
/// lands. Updates are compare-and-swap on the session version.
#[derive(Default)]
pub(crate) struct InMemorySessionStore {
    sessions: Mutex<BTreeMap<(TenantId, SessionId), ParticipantSession>>,
}

impl SessionStore for InMemorySessionStore {
    fn create_session(&self, session: ParticipantSession) -> Result<ParticipantSession, StoreError> {
        let mut guard = self.sessions.lock().expect("session store mutex poisoned");
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
        let guard = self.sessions.lock().expect("session store mutex poisoned");
        Ok(guard.get(&(tenant.clone(), id.clone())).cloned())
    }

    fn update_session(
        &self,
        mut session: ParticipantSession,
    ) -> Result<ParticipantSession, StoreError> {
        let mut guard = self.sessions.lock().expect("session store mutex poisoned");
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
        let guard = self.sessions.lock().expect("session store mutex poisoned");
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

/// Catalog for deployments without a definitions directory configured.
pub(crate) fn sample_catalog() -> Result<SurveyCatalog, DefinitionError> {
    SurveyCatalog::new(vec![customer_feedback_survey(), onboarding_consent_survey()])
}

fn question(id: &str, prompt: &str, question_type: QuestionType) -> QuestionDefinition {
    QuestionDefinition {
        id: QuestionId(id.to_string()),
        prompt: prompt.to_string(),
        question_type,
        required: false,
        options: Vec::new(),
        scale: None,
        matrix: None,
        validation: None,
        conditional: None,
    }
}

fn customer_feedback_survey() -> SurveyDefinition {
    SurveyDefinition {
        id: SurveyId("customer-feedback".to_string()),
        title: "Customer feedback".to_string(),
        description: Some("Post-visit feedback with a follow-up branch for low scores".to_string()),
        version: 1,
        tenant_id: None,
        questions: vec![
            QuestionDefinition {
                required: true,
                scale: Some(ScaleConfig {
                    min: 1.0,
                    max: 10.0,
                    step: 1.0,
                }),
                ..question(
                    "q-score",
                    "How satisfied were you with your visit?",
                    QuestionType::RatingScale,
                )
            },
            QuestionDefinition {
                required: true,
                validation: Some(ValidationRules {
                    min_length: Some(10),
                    ..ValidationRules::default()
                }),
                conditional: Some(ConditionalLogic::Single(Condition {
                    depends_on: QuestionId("q-score".to_string()),
                    show_if: vec![
                        AnswerValue::Number(1.0),
                        AnswerValue::Number(2.0),
                        AnswerValue::Number(3.0),
                    ],
                })),
                ..question(
                    "q-improvements",
                    "What should we improve?",
                    QuestionType::FreeForm,
                )
            },
            QuestionDefinition {
                options: vec![
                    ChoiceOption::new("staff"),
                    ChoiceOption::new("speed"),
                    ChoiceOption::new("pricing"),
                    ChoiceOption::new("facilities"),
                ],
                validation: Some(ValidationRules {
                    max_selections: Some(2),
                    ..ValidationRules::default()
                }),
                ..question(
                    "q-highlights",
                    "What stood out? (pick up to two)",
                    QuestionType::MultipleSelect,
                )
            },
            QuestionDefinition {
                matrix: Some(MatrixConfig {
                    rows: vec![
                        MatrixRow {
                            id: "cleanliness".to_string(),
                            label: Some("Cleanliness".to_string()),
                        },
                        MatrixRow {
                            id: "service".to_string(),
                            label: Some("Service".to_string()),
                        },
                    ],
                    columns: vec![
                        ChoiceOption::new("poor"),
                        ChoiceOption::new("fair"),
                        ChoiceOption::new("good"),
                        ChoiceOption::new("excellent"),
                    ],
                    allow_multiple_per_row: false,
                }),
                ..question(
                    "q-aspects",
                    "Rate each aspect of your visit",
                    QuestionType::Matrix,
                )
            },
            question(
                "q-contact-email",
                "Email address, if we may follow up",
                QuestionType::Email,
            ),
            QuestionDefinition {
                validation: Some(ValidationRules {
                    allow_future: Some(false),
                    ..ValidationRules::default()
                }),
                ..question("q-visit-date", "When did you visit?", QuestionType::Date)
            },
        ],
        settings: SurveySettings {
            estimated_minutes: 5,
            suggest_min: 2,
            suggest_max: 3,
        },
    }
}

fn onboarding_consent_survey() -> SurveyDefinition {
    SurveyDefinition {
        id: SurveyId("onboarding-consent".to_string()),
        title: "Onboarding consent".to_string(),
        description: None,
        version: 1,
        tenant_id: None,
        questions: vec![
            QuestionDefinition {
                required: true,
                ..question(
                    "q-consent",
                    "May we process your usage data?",
                    QuestionType::Boolean,
                )
            },
            QuestionDefinition {
                required: true,
                options: vec![ChoiceOption::new("analytics"), ChoiceOption::new("marketing")],
                validation: Some(ValidationRules {
                    min_selections: Some(1),
                    ..ValidationRules::default()
                }),
                conditional: Some(ConditionalLogic::Single(Condition {
                    depends_on: QuestionId("q-consent".to_string()),
                    show_if: vec![AnswerValue::Bool(true)],
                })),
                ..question(
                    "q-data-uses",
                    "Which uses do you consent to?",
                    QuestionType::MultipleSelect,
                )
            },
        ],
        settings: SurveySettings::default(),
    }
}

pub(crate) fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|err| format!("failed to parse '{raw}' as YYYY-MM-DD ({err})"))
}

pub(crate) fn day_start(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(NaiveTime::MIN).and_utc()
}

pub(crate) fn parse_export_format(raw: &str) -> Result<ExportFormat, String> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "csv" => Ok(ExportFormat::Csv),
        "json" => Ok(ExportFormat::Json),
        other => Err(format!("unknown export format '{other}' (expected csv or json)")),
    }
}
