use std::collections::BTreeMap;

use super::definition::{QuestionId, SurveyDefinition};
use super::session::{SessionProgress, SurveyResponse};

/// Derive completion metrics from the recorded responses. Once answered, a
/// question stays counted regardless of its eligibility at read time.
pub fn calculate(
    survey: &SurveyDefinition,
    responses: &BTreeMap<QuestionId, SurveyResponse>,
) -> SessionProgress {
    let total_questions = survey.questions.len();
    let answered_questions = responses.len();

    let required_answered = survey
        .questions
        .iter()
        .filter(|question| question.required && responses.contains_key(&question.id))
        .count();
    let required_remaining = survey.required_count() - required_answered;

    // Surveys carry at least one question by definition invariant, so the
    // division is safe. The partial case floors instead of rounding: 100 is
    // reserved for a fully answered session no matter how many questions the
    // survey carries.
    let percent_complete = if answered_questions == total_questions {
        100
    } else {
        ((answered_questions as f64 / total_questions as f64) * 100.0).floor() as u8
    };

    let estimated_time_remaining =
        estimate_remaining(total_questions, answered_questions, survey.settings.estimated_minutes);

    SessionProgress {
        total_questions,
        answered_questions,
        required_answered,
        required_remaining,
        percent_complete,
        estimated_time_remaining,
    }
}

/// Coarse advisory heuristic: once at least half complete, assume roughly two
/// answers per minute; before that, fall back to the declared estimate.
fn estimate_remaining(total: usize, answered: usize, declared_minutes: u32) -> String {
    if answered * 2 >= total {
        let remaining = total - answered;
        let minutes = ((remaining as f64) / 2.0).round().max(1.0) as u64;
        format!("{minutes} minutes")
    } else {
        format!("{declared_minutes} minutes")
    }
}
