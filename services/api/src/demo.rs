use crate::infra::{day_start, parse_date, parse_export_format, sample_catalog, InMemorySessionStore};
use chrono::NaiveDate;
use clap::Args;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use survey_engine::error::AppError;
use survey_engine::surveys::catalog::SurveyCatalog;
use survey_engine::surveys::definition::{QuestionId, SurveyId, TenantId};
use survey_engine::surveys::service::{SubmitOutcome, SurveySessionService};
use survey_engine::surveys::session::{AnswerValue, ParticipantId};
use survey_engine::surveys::store::{ExportFormat, SessionFilters};

#[derive(Args, Debug)]
pub(crate) struct DemoArgs {
    /// Satisfaction score to submit (1-10); 3 or lower opens the follow-up branch
    #[arg(long, default_value_t = 2.0)]
    pub(crate) score: f64,
    /// Export format for the final results dump
    #[arg(long, default_value = "csv", value_parser = parse_export_format)]
    pub(crate) export_format: ExportFormat,
    /// Only export sessions started on or after this date (YYYY-MM-DD)
    #[arg(long, value_parser = parse_date)]
    pub(crate) started_after: Option<NaiveDate>,
    /// Skip the export portion of the demo
    #[arg(long)]
    pub(crate) skip_export: bool,
}

#[derive(Args, Debug)]
pub(crate) struct CatalogCheckArgs {
    /// Directory of survey definition JSON files
    #[arg(long)]
    pub(crate) definitions_dir: PathBuf,
}

pub(crate) fn run_catalog_check(args: CatalogCheckArgs) -> Result<(), AppError> {
    let catalog = SurveyCatalog::load_dir(&args.definitions_dir)?;
    println!(
        "Loaded {} survey definition(s) from {}",
        catalog.len(),
        args.definitions_dir.display()
    );
    for survey in catalog.surveys() {
        println!(
            "- {} | {} (v{}) | {} question(s), {} required",
            survey.id.0,
            survey.title,
            survey.version,
            survey.questions.len(),
            survey.required_count()
        );
    }
    Ok(())
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let tenant = TenantId("demo".to_string());
    let participant = ParticipantId("demo-participant".to_string());
    let survey_id = SurveyId("customer-feedback".to_string());

    let catalog = Arc::new(sample_catalog()?);
    let store = Arc::new(InMemorySessionStore::default());
    let service = SurveySessionService::new(catalog, store);

    println!("Survey session demo");
    println!("\nAvailable surveys");
    for summary in service.list_available_surveys(&tenant) {
        println!(
            "- {} | {} (v{}) | {} question(s), ~{} minutes",
            summary.id.0, summary.title, summary.version, summary.question_count, summary.estimated_minutes
        );
    }

    let started = service.start_session(
        &survey_id,
        participant,
        tenant.clone(),
        BTreeMap::from([("channel".to_string(), "cli".to_string())]),
    )?;
    let session_id = started.session.session_id.clone();
    println!("\nStarted session {} for survey '{}'", session_id.0, survey_id.0);

    println!("\nQuestion eligibility at start");
    for question in &started.questions {
        let marker = if question.currently_eligible { "+" } else { "-" };
        println!(
            "  {marker} {} ({}): {}",
            question.question.id.0,
            question.question.question_type.label(),
            question.eligibility_reason
        );
    }
    print_suggestions(&started.suggested_questions.iter().map(|q| q.question.id.clone()).collect::<Vec<_>>());

    // An out-of-range score shows validation travelling as data.
    println!("\nSubmitting an out-of-range score (0)");
    let outcome = service.submit_response(
        &tenant,
        &session_id,
        &QuestionId("q-score".to_string()),
        AnswerValue::Number(0.0),
    )?;
    print_validation(&outcome);

    println!("\nSubmitting score {}", args.score);
    let outcome = service.submit_response(
        &tenant,
        &session_id,
        &QuestionId("q-score".to_string()),
        AnswerValue::Number(args.score),
    )?;
    print_validation(&outcome);
    let branch_opened = outcome
        .eligibility_changes
        .iter()
        .any(|delta| delta.now_eligible && delta.question_id.0 == "q-improvements");
    for delta in &outcome.eligibility_changes {
        println!(
            "  Eligibility change: {} is now {} ({})",
            delta.question_id.0,
            if delta.now_eligible { "eligible" } else { "hidden" },
            delta.reason
        );
    }

    if branch_opened {
        println!("\nAnswering the follow-up branch");
        let outcome = service.submit_response(
            &tenant,
            &session_id,
            &QuestionId("q-improvements".to_string()),
            AnswerValue::Text("too short".to_string()),
        )?;
        print_validation(&outcome);

        let outcome = service.submit_response(
            &tenant,
            &session_id,
            &QuestionId("q-improvements".to_string()),
            AnswerValue::Text("Shorter queues at the front desk would help a lot".to_string()),
        )?;
        print_validation(&outcome);
    }

    service.submit_response(
        &tenant,
        &session_id,
        &QuestionId("q-highlights".to_string()),
        AnswerValue::List(vec!["staff".to_string(), "speed".to_string()]),
    )?;

    let report = service.get_progress(&tenant, &session_id)?;
    println!(
        "\nProgress: {}% complete | {} of {} answered | {} remaining",
        report.progress.percent_complete,
        report.progress.answered_questions,
        report.progress.total_questions,
        report.progress.estimated_time_remaining
    );
    println!(
        "Can complete: {} ({} required question(s) open)",
        report.can_complete,
        report.required_remaining.len()
    );

    if report.can_complete {
        let summary = service.complete_session(&tenant, &session_id)?;
        println!(
            "Completed session {} in {} minute(s)",
            summary.session_id.0, summary.duration_minutes
        );
    } else {
        println!("Leaving the session open; required questions remain");
    }

    if args.skip_export {
        return Ok(());
    }

    let filters = SessionFilters {
        started_after: args.started_after.map(day_start),
        ..SessionFilters::default()
    };
    let payload = service.export_results(&tenant, &survey_id, args.export_format, filters)?;
    println!(
        "\nExport ({}, generated {}): {} record(s)",
        payload.format.label(),
        payload.generated_at.to_rfc3339(),
        payload.record_count
    );
    println!("{}", payload.data);

    Ok(())
}

fn print_suggestions(suggested: &[QuestionId]) {
    if suggested.is_empty() {
        println!("  Suggested next: none");
    } else {
        let ids: Vec<&str> = suggested.iter().map(|id| id.0.as_str()).collect();
        println!("  Suggested next: {}", ids.join(", "));
    }
}

fn print_validation(outcome: &SubmitOutcome) {
    if outcome.accepted {
        let attempts = outcome
            .response
            .as_ref()
            .map(|response| response.attempt_count)
            .unwrap_or(1);
        println!("  Accepted (attempt {attempts})");
    } else {
        println!("  Rejected:");
        for issue in &outcome.validation.errors {
            println!("    - {:?}: {}", issue.constraint, issue.message);
        }
    }
}
