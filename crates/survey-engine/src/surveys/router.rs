use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use serde_json::json;

use super::definition::{QuestionId, SurveyId, TenantId};
use super::service::{SessionServiceError, SurveySessionService};
use super::session::{AnswerValue, ParticipantId, SessionId};
use super::store::{ExportFormat, SessionFilters, SessionStore, StoreError};

/// Router builder exposing the tenant-scoped session operation surface.
pub fn session_router<S>(service: Arc<SurveySessionService<S>>) -> Router
where
    S: SessionStore + 'static,
{
    Router::new()
        .route("/api/v1/tenants/:tenant_id/surveys", get(list_surveys_handler::<S>))
        .route(
            "/api/v1/tenants/:tenant_id/surveys/:survey_id/sessions",
            post(start_session_handler::<S>),
        )
        .route(
            "/api/v1/tenants/:tenant_id/surveys/:survey_id/export",
            post(export_handler::<S>),
        )
        .route(
            "/api/v1/tenants/:tenant_id/sessions/:session_id/questions/:question_id",
            get(get_question_handler::<S>),
        )
        .route(
            "/api/v1/tenants/:tenant_id/sessions/:session_id/responses",
            post(submit_response_handler::<S>),
        )
        .route(
            "/api/v1/tenants/:tenant_id/sessions/:session_id/progress",
            get(get_progress_handler::<S>),
        )
        .route(
            "/api/v1/tenants/:tenant_id/sessions/:session_id/complete",
            post(complete_session_handler::<S>),
        )
        .route(
            "/api/v1/tenants/:tenant_id/sessions/:session_id/resume",
            post(resume_session_handler::<S>),
        )
        .with_state(service)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct StartSessionRequest {
    pub(crate) participant_id: ParticipantId,
    #[serde(default)]
    pub(crate) metadata: BTreeMap<String, String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SubmitResponseRequest {
    pub(crate) question_id: QuestionId,
    pub(crate) value: AnswerValue,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ExportRequest {
    pub(crate) format: ExportFormat,
    #[serde(default)]
    pub(crate) filters: SessionFilters,
}

pub(crate) async fn list_surveys_handler<S>(
    State(service): State<Arc<SurveySessionService<S>>>,
    Path(tenant_id): Path<String>,
) -> Response
where
    S: SessionStore + 'static,
{
    let summaries = service.list_available_surveys(&TenantId(tenant_id));
    (StatusCode::OK, axum::Json(summaries)).into_response()
}

pub(crate) async fn start_session_handler<S>(
    State(service): State<Arc<SurveySessionService<S>>>,
    Path((tenant_id, survey_id)): Path<(String, String)>,
    axum::Json(request): axum::Json<StartSessionRequest>,
) -> Response
where
    S: SessionStore + 'static,
{
    match service.start_session(
        &SurveyId(survey_id),
        request.participant_id,
        TenantId(tenant_id),
        request.metadata,
    ) {
        Ok(started) => (StatusCode::CREATED, axum::Json(started)).into_response(),
        Err(err) => service_error_response(err),
    }
}

pub(crate) async fn get_question_handler<S>(
    State(service): State<Arc<SurveySessionService<S>>>,
    Path((tenant_id, session_id, question_id)): Path<(String, String, String)>,
) -> Response
where
    S: SessionStore + 'static,
{
    match service.get_question(
        &TenantId(tenant_id),
        &SessionId(session_id),
        &QuestionId(question_id),
    ) {
        Ok(question) => (StatusCode::OK, axum::Json(question)).into_response(),
        Err(err) => service_error_response(err),
    }
}

pub(crate) async fn submit_response_handler<S>(
    State(service): State<Arc<SurveySessionService<S>>>,
    Path((tenant_id, session_id)): Path<(String, String)>,
    axum::Json(request): axum::Json<SubmitResponseRequest>,
) -> Response
where
    S: SessionStore + 'static,
{
    match service.submit_response(
        &TenantId(tenant_id),
        &SessionId(session_id),
        &request.question_id,
        request.value,
    ) {
        // Validation rejections are part of the success shape so the
        // conversational layer can re-prompt without error handling.
        Ok(outcome) => (StatusCode::OK, axum::Json(outcome)).into_response(),
        Err(err) => service_error_response(err),
    }
}

pub(crate) async fn get_progress_handler<S>(
    State(service): State<Arc<SurveySessionService<S>>>,
    Path((tenant_id, session_id)): Path<(String, String)>,
) -> Response
where
    S: SessionStore + 'static,
{
    match service.get_progress(&TenantId(tenant_id), &SessionId(session_id)) {
        Ok(report) => (StatusCode::OK, axum::Json(report)).into_response(),
        Err(err) => service_error_response(err),
    }
}

pub(crate) async fn complete_session_handler<S>(
    State(service): State<Arc<SurveySessionService<S>>>,
    Path((tenant_id, session_id)): Path<(String, String)>,
) -> Response
where
    S: SessionStore + 'static,
{
    match service.complete_session(&TenantId(tenant_id), &SessionId(session_id)) {
        Ok(summary) => (StatusCode::OK, axum::Json(summary)).into_response(),
        Err(err) => service_error_response(err),
    }
}

pub(crate) async fn resume_session_handler<S>(
    State(service): State<Arc<SurveySessionService<S>>>,
    Path((tenant_id, session_id)): Path<(String, String)>,
) -> Response
where
    S: SessionStore + 'static,
{
    match service.resume_session(&TenantId(tenant_id), &SessionId(session_id)) {
        Ok(report) => (StatusCode::OK, axum::Json(report)).into_response(),
        Err(err) => service_error_response(err),
    }
}

pub(crate) async fn export_handler<S>(
    State(service): State<Arc<SurveySessionService<S>>>,
    Path((tenant_id, survey_id)): Path<(String, String)>,
    axum::Json(request): axum::Json<ExportRequest>,
) -> Response
where
    S: SessionStore + 'static,
{
    match service.export_results(
        &TenantId(tenant_id),
        &SurveyId(survey_id),
        request.format,
        request.filters,
    ) {
        Ok(payload) => (StatusCode::OK, axum::Json(payload)).into_response(),
        Err(err) => service_error_response(err),
    }
}

fn service_error_response(error: SessionServiceError) -> Response {
    let status = match &error {
        SessionServiceError::SurveyNotFound(_)
        | SessionServiceError::SessionNotFound(_)
        | SessionServiceError::QuestionNotFound { .. } => StatusCode::NOT_FOUND,
        SessionServiceError::SessionCompleted(_)
        | SessionServiceError::QuestionNotEligible { .. }
        | SessionServiceError::CompletionBlocked { .. } => StatusCode::CONFLICT,
        SessionServiceError::Store(StoreError::VersionConflict { .. })
        | SessionServiceError::Store(StoreError::Conflict) => StatusCode::CONFLICT,
        SessionServiceError::Store(StoreError::Unavailable(_)) => StatusCode::SERVICE_UNAVAILABLE,
        SessionServiceError::Store(_) | SessionServiceError::Internal(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };

    let body = axum::Json(json!({ "error": error.to_string() }));
    (status, body).into_response()
}
