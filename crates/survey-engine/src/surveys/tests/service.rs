use std::collections::BTreeMap;

use super::common::*;
use crate::surveys::definition::{QuestionId, SurveyId};
use crate::surveys::service::SessionServiceError;
use crate::surveys::session::{AnswerValue, SessionId, SessionStatus};
use crate::surveys::store::{ExportFormat, SessionFilters, SessionStore, StoreError};
use crate::surveys::validation::ConstraintKind;

fn qid(id: &str) -> QuestionId {
    QuestionId(id.to_string())
}

#[test]
fn start_fails_for_unknown_survey() {
    let (service, _, _) = build_service();

    match service.start_session(
        &SurveyId("missing".to_string()),
        participant(),
        tenant(),
        BTreeMap::new(),
    ) {
        Err(SessionServiceError::SurveyNotFound(id)) => assert_eq!(id.0, "missing"),
        other => panic!("expected survey not found, got {other:?}"),
    }
}

#[test]
fn start_returns_enriched_questions_and_suggestions() {
    let (service, _, clock) = build_service();

    let started = service
        .start_session(
            &SurveyId("sample".to_string()),
            participant(),
            tenant(),
            BTreeMap::new(),
        )
        .expect("session starts");

    assert_eq!(started.session.status, SessionStatus::InProgress);
    assert_eq!(started.session.started_at, clock.current());
    assert_eq!(started.session.version, 1);
    assert_eq!(started.session.progress.percent_complete, 0);

    let pet_name = started
        .questions
        .iter()
        .find(|question| question.question.id.0 == "q-pet-name")
        .expect("dependent question enriched");
    assert!(!pet_name.currently_eligible);
    assert_eq!(
        pet_name.eligibility_reason,
        "depends on unanswered question q-pet"
    );

    // Both required questions fill the window; no optional top-up needed.
    let suggested: Vec<&str> = started
        .suggested_questions
        .iter()
        .map(|question| question.question.id.0.as_str())
        .collect();
    assert_eq!(suggested, vec!["q-pet", "q-rating"]);
}

#[test]
fn submit_flips_dependent_eligibility_and_reports_the_delta() {
    let (service, _, _) = build_service();
    let session_id = start_session(&service, "sample");

    let before = service
        .get_question(&tenant(), &session_id, &qid("q-pet-name"))
        .expect("question readable");
    assert!(!before.currently_eligible);

    let outcome = service
        .submit_response(&tenant(), &session_id, &qid("q-pet"), AnswerValue::Bool(true))
        .expect("submit succeeds");

    assert!(outcome.accepted);
    assert_eq!(outcome.eligibility_changes.len(), 1);
    let delta = &outcome.eligibility_changes[0];
    assert_eq!(delta.question_id.0, "q-pet-name");
    assert!(delta.now_eligible);

    let after = service
        .get_question(&tenant(), &session_id, &qid("q-pet-name"))
        .expect("question readable");
    assert!(after.currently_eligible);
    assert_eq!(after.eligibility_reason, "condition on question q-pet satisfied");
}

#[test]
fn submit_rejects_ineligible_questions_at_submit_time() {
    let (service, _, _) = build_service();
    let session_id = start_session(&service, "sample");

    match service.submit_response(&tenant(), &session_id, &qid("q-pet-name"), text("Rex")) {
        Err(SessionServiceError::QuestionNotEligible { question, reason }) => {
            assert_eq!(question.0, "q-pet-name");
            assert_eq!(reason, "depends on unanswered question q-pet");
        }
        other => panic!("expected eligibility rejection, got {other:?}"),
    }
}

#[test]
fn submit_returns_validation_failures_without_mutating_the_session() {
    let (service, store, _) = build_service();
    let session_id = start_session(&service, "sample");

    let outcome = service
        .submit_response(&tenant(), &session_id, &qid("q-rating"), AnswerValue::Number(2.0))
        .expect("validation failure is not an error");

    assert!(!outcome.accepted);
    assert_eq!(outcome.validation.errors.len(), 1);
    assert_eq!(outcome.validation.errors[0].constraint, ConstraintKind::Step);
    assert!(outcome.response.is_none());

    let session = store
        .session_snapshot(&session_id, &tenant())
        .expect("session persisted");
    assert!(session.responses.is_empty());
    assert_eq!(session.version, 1);
}

#[test]
fn unknown_question_is_not_found() {
    let (service, _, _) = build_service();
    let session_id = start_session(&service, "sample");

    match service.submit_response(&tenant(), &session_id, &qid("q-missing"), text("x")) {
        Err(SessionServiceError::QuestionNotFound { question, .. }) => {
            assert_eq!(question.0, "q-missing");
        }
        other => panic!("expected question not found, got {other:?}"),
    }
}

#[test]
fn attempt_count_increments_only_on_successful_rewrites() {
    let (service, store, _) = build_service();
    let session_id = start_session(&service, "sample");

    service
        .submit_response(&tenant(), &session_id, &qid("q-rating"), AnswerValue::Number(3.0))
        .expect("first write");

    // A rejected correction does not bump the counter.
    service
        .submit_response(&tenant(), &session_id, &qid("q-rating"), AnswerValue::Number(4.0))
        .expect("rejected write is ok-shaped");

    service
        .submit_response(&tenant(), &session_id, &qid("q-rating"), AnswerValue::Number(5.0))
        .expect("second successful write");

    let session = store
        .session_snapshot(&session_id, &tenant())
        .expect("session persisted");
    assert_eq!(session.responses[&qid("q-rating")].attempt_count, 2);
    assert_eq!(
        session.responses[&qid("q-rating")].value,
        AnswerValue::Number(5.0)
    );
}

#[test]
fn progress_report_ignores_ineligible_required_questions() {
    let (service, _, _) = build_service();
    let session_id = start_session(&service, "gated");

    // Consent answered `false`: the required follow-up stays ineligible and
    // must not block completion.
    service
        .submit_response(&tenant(), &session_id, &qid("q-consent"), AnswerValue::Bool(false))
        .expect("submit succeeds");

    let report = service
        .get_progress(&tenant(), &session_id)
        .expect("progress readable");
    assert!(report.can_complete);
    assert!(report.required_remaining.is_empty());
    assert_eq!(report.progress.answered_questions, 1);
}

#[test]
fn completion_is_blocked_while_required_questions_are_open() {
    let (service, _, _) = build_service();
    let session_id = start_session(&service, "sample");

    match service.complete_session(&tenant(), &session_id) {
        Err(SessionServiceError::CompletionBlocked { blockers, .. }) => {
            let ids: Vec<&str> = blockers.iter().map(|id| id.0.as_str()).collect();
            assert_eq!(ids, vec!["q-pet", "q-rating"]);
        }
        other => panic!("expected completion blocked, got {other:?}"),
    }
}

#[test]
fn complete_stamps_timestamp_and_reports_duration() {
    let (service, store, clock) = build_service();
    let session_id = start_session(&service, "sample");

    service
        .submit_response(&tenant(), &session_id, &qid("q-pet"), AnswerValue::Bool(false))
        .expect("submit succeeds");
    service
        .submit_response(&tenant(), &session_id, &qid("q-rating"), AnswerValue::Number(3.0))
        .expect("submit succeeds");

    clock.advance_minutes(12);
    let summary = service
        .complete_session(&tenant(), &session_id)
        .expect("completion allowed");

    assert_eq!(summary.duration_minutes, 12);
    assert_eq!(summary.completed_at, clock.current());

    let session = store
        .session_snapshot(&session_id, &tenant())
        .expect("session persisted");
    assert_eq!(session.status, SessionStatus::Completed);
    assert_eq!(session.completed_at, Some(clock.current()));
}

#[test]
fn completed_sessions_reject_further_writes_and_completion() {
    let (service, _, _) = build_service();
    let session_id = start_session(&service, "gated");

    service
        .submit_response(&tenant(), &session_id, &qid("q-consent"), AnswerValue::Bool(false))
        .expect("submit succeeds");
    service
        .complete_session(&tenant(), &session_id)
        .expect("completion allowed");

    match service.submit_response(&tenant(), &session_id, &qid("q-consent"), AnswerValue::Bool(true)) {
        Err(SessionServiceError::SessionCompleted(_)) => {}
        other => panic!("expected completed-session rejection, got {other:?}"),
    }
    match service.complete_session(&tenant(), &session_id) {
        Err(SessionServiceError::SessionCompleted(_)) => {}
        other => panic!("expected completed-session rejection, got {other:?}"),
    }
    match service.resume_session(&tenant(), &session_id) {
        Err(SessionServiceError::SessionCompleted(_)) => {}
        other => panic!("expected completed-session rejection, got {other:?}"),
    }
}

#[test]
fn get_question_is_idempotent_between_writes() {
    let (service, _, _) = build_service();
    let session_id = start_session(&service, "sample");

    let first = service
        .get_question(&tenant(), &session_id, &qid("q-pet-name"))
        .expect("question readable");
    let second = service
        .get_question(&tenant(), &session_id, &qid("q-pet-name"))
        .expect("question readable");

    assert_eq!(first.currently_eligible, second.currently_eligible);
    assert_eq!(first.eligibility_reason, second.eligibility_reason);
    assert_eq!(first.already_answered, second.already_answered);
}

#[test]
fn eligibility_persists_once_dependency_matches() {
    let (service, _, _) = build_service();
    let session_id = start_session(&service, "sample");

    service
        .submit_response(&tenant(), &session_id, &qid("q-pet"), AnswerValue::Bool(true))
        .expect("submit succeeds");

    // Later unrelated writes never retract the branch.
    service
        .submit_response(&tenant(), &session_id, &qid("q-rating"), AnswerValue::Number(1.0))
        .expect("submit succeeds");
    service
        .submit_response(&tenant(), &session_id, &qid("q-email"), text("p@example.com"))
        .expect("submit succeeds");

    let question = service
        .get_question(&tenant(), &session_id, &qid("q-pet-name"))
        .expect("question readable");
    assert!(question.currently_eligible);
}

#[test]
fn resume_reports_minutes_below_an_hour_and_floor_hours_after() {
    let (service, store, clock) = build_service();
    let session_id = start_session(&service, "sample");

    clock.advance_minutes(45);
    let report = service
        .resume_session(&tenant(), &session_id)
        .expect("resume succeeds");
    assert_eq!(report.elapsed_since_last_activity, "45 minutes");

    let touched = store
        .session_snapshot(&session_id, &tenant())
        .expect("session persisted");
    assert_eq!(touched.last_activity_at, clock.current());

    clock.advance_minutes(90);
    let report = service
        .resume_session(&tenant(), &session_id)
        .expect("resume succeeds");
    assert_eq!(report.elapsed_since_last_activity, "1 hours");
}

#[test]
fn resume_returns_the_same_payload_shape_as_a_fresh_read() {
    let (service, _, clock) = build_service();
    let session_id = start_session(&service, "sample");

    service
        .submit_response(&tenant(), &session_id, &qid("q-pet"), AnswerValue::Bool(true))
        .expect("submit succeeds");

    clock.advance_minutes(5);
    let report = service
        .resume_session(&tenant(), &session_id)
        .expect("resume succeeds");

    assert_eq!(report.questions.len(), 5);
    assert_eq!(report.progress.answered_questions, 1);
    assert!(report
        .suggested_questions
        .iter()
        .all(|question| !question.already_answered));
}

#[test]
fn export_stamps_generation_time_and_counts_records() {
    let (service, _, clock) = build_service();
    let session_id = start_session(&service, "sample");

    service
        .submit_response(&tenant(), &session_id, &qid("q-pet"), AnswerValue::Bool(true))
        .expect("submit succeeds");
    service
        .submit_response(
            &tenant(),
            &session_id,
            &qid("q-channels"),
            AnswerValue::List(vec!["email".to_string(), "sms".to_string()]),
        )
        .expect("submit succeeds");

    let payload = service
        .export_results(
            &tenant(),
            &SurveyId("sample".to_string()),
            ExportFormat::Csv,
            SessionFilters::default(),
        )
        .expect("export succeeds");

    assert_eq!(payload.record_count, 1);
    assert_eq!(payload.generated_at, clock.current());

    let mut lines = payload.data.lines();
    let header = lines.next().expect("header row");
    assert_eq!(
        header,
        "sessionId,participantId,status,startedAt,completedAt,q-pet,q-pet-name,q-rating,q-email,q-channels"
    );
    let row = lines.next().expect("data row");
    assert!(row.contains("participant-1"));
    assert!(row.contains("true"));
    assert!(row.contains("email;sms"));
}

#[test]
fn export_with_unmatched_filters_yields_zero_records() {
    let (service, _, _) = build_service();
    let session_id = start_session(&service, "sample");
    service
        .submit_response(&tenant(), &session_id, &qid("q-pet"), AnswerValue::Bool(true))
        .expect("submit succeeds");

    let filters = SessionFilters {
        status: Some(SessionStatus::Completed),
        ..SessionFilters::default()
    };
    let payload = service
        .export_results(
            &tenant(),
            &SurveyId("sample".to_string()),
            ExportFormat::Json,
            filters,
        )
        .expect("export succeeds");

    assert_eq!(payload.record_count, 0);
}

#[test]
fn sessions_are_scoped_by_tenant() {
    let (service, _, _) = build_service();
    let session_id = start_session(&service, "sample");

    let other_tenant = crate::surveys::definition::TenantId("globex".to_string());
    match service.get_progress(&other_tenant, &session_id) {
        Err(SessionServiceError::SessionNotFound(_)) => {}
        other => panic!("expected session not found, got {other:?}"),
    }
}

#[test]
fn stale_session_writes_are_rejected_by_the_store() {
    let (service, store, _) = build_service();
    let session_id = start_session(&service, "sample");

    let mut stale = store
        .session_snapshot(&session_id, &tenant())
        .expect("session persisted");
    stale.version = 0;

    match store.update_session(stale) {
        Err(StoreError::VersionConflict { expected, found }) => {
            assert_eq!(expected, 1);
            assert_eq!(found, 0);
        }
        other => panic!("expected version conflict, got {other:?}"),
    }
}

#[test]
fn store_outages_surface_as_store_errors() {
    let store = std::sync::Arc::new(UnavailableStore);
    let service = crate::surveys::service::SurveySessionService::with_capabilities(
        catalog(),
        store,
        std::sync::Arc::new(FixedClock::default_start()),
        std::sync::Arc::new(crate::surveys::store::SequenceIdGenerator::default()),
    );

    assert!(!service.store_healthy());
    match service.start_session(
        &SurveyId("sample".to_string()),
        participant(),
        tenant(),
        BTreeMap::new(),
    ) {
        Err(SessionServiceError::Store(StoreError::Unavailable(_))) => {}
        other => panic!("expected store unavailability, got {other:?}"),
    }
}

#[test]
fn unknown_session_is_not_found() {
    let (service, _, _) = build_service();

    match service.get_progress(&tenant(), &SessionId("sess-999999".to_string())) {
        Err(SessionServiceError::SessionNotFound(_)) => {}
        other => panic!("expected session not found, got {other:?}"),
    }
}

#[test]
fn list_available_surveys_summarizes_the_catalog() {
    let (service, _, _) = build_service();

    let summaries = service.list_available_surveys(&tenant());
    assert_eq!(summaries.len(), 3);

    let sample = summaries
        .iter()
        .find(|summary| summary.id.0 == "sample")
        .expect("sample listed");
    assert_eq!(sample.question_count, 5);
    assert_eq!(sample.estimated_minutes, 6);
}
