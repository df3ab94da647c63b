use std::collections::BTreeMap;

use super::definition::{Condition, ConditionOperator, ConditionalLogic, QuestionDefinition, QuestionId};
use super::session::{EnrichedQuestion, SurveyResponse};

/// Outcome of evaluating one question's conditional rule.
#[derive(Debug, Clone, PartialEq)]
pub struct EligibilityStatus {
    pub eligible: bool,
    pub reason: String,
}

impl EligibilityStatus {
    fn eligible(reason: impl Into<String>) -> Self {
        Self {
            eligible: true,
            reason: reason.into(),
        }
    }

    fn ineligible(reason: impl Into<String>) -> Self {
        Self {
            eligible: false,
            reason: reason.into(),
        }
    }
}

/// Overlay every question with its current eligibility and answered state.
///
/// This must be recomputed on every read and after every write: recording one
/// response can flip the eligibility of any number of other questions.
pub fn enrich(
    questions: &[QuestionDefinition],
    responses: &BTreeMap<QuestionId, SurveyResponse>,
) -> Vec<EnrichedQuestion> {
    questions
        .iter()
        .map(|question| {
            let status = evaluate(question.conditional.as_ref(), responses);
            EnrichedQuestion {
                question: question.clone(),
                currently_eligible: status.eligible,
                eligibility_reason: status.reason,
                already_answered: responses.contains_key(&question.id),
            }
        })
        .collect()
}

/// Evaluate a conditional rule against the recorded responses.
pub fn evaluate(
    conditional: Option<&ConditionalLogic>,
    responses: &BTreeMap<QuestionId, SurveyResponse>,
) -> EligibilityStatus {
    match conditional {
        None => EligibilityStatus::eligible("no conditional logic"),
        Some(ConditionalLogic::Single(condition)) => evaluate_condition(condition, responses),
        Some(ConditionalLogic::Compound {
            operator,
            conditions,
        }) => evaluate_compound(*operator, conditions, responses),
    }
}

fn evaluate_condition(
    condition: &Condition,
    responses: &BTreeMap<QuestionId, SurveyResponse>,
) -> EligibilityStatus {
    let Some(response) = responses.get(&condition.depends_on) else {
        return EligibilityStatus::ineligible(format!(
            "depends on unanswered question {}",
            condition.depends_on.0
        ));
    };

    if condition
        .show_if
        .iter()
        .any(|allowed| allowed == &response.value)
    {
        EligibilityStatus::eligible(format!(
            "condition on question {} satisfied",
            condition.depends_on.0
        ))
    } else {
        EligibilityStatus::ineligible(format!(
            "response to question {} does not match any allowed value",
            condition.depends_on.0
        ))
    }
}

fn evaluate_compound(
    operator: ConditionOperator,
    conditions: &[Condition],
    responses: &BTreeMap<QuestionId, SurveyResponse>,
) -> EligibilityStatus {
    let statuses: Vec<EligibilityStatus> = conditions
        .iter()
        .map(|condition| evaluate_condition(condition, responses))
        .collect();

    match operator {
        ConditionOperator::And => {
            let failing: Vec<&str> = statuses
                .iter()
                .filter(|status| !status.eligible)
                .map(|status| status.reason.as_str())
                .collect();

            if failing.is_empty() {
                EligibilityStatus::eligible("all conditions met")
            } else {
                EligibilityStatus::ineligible(failing.join("; "))
            }
        }
        ConditionOperator::Or => {
            // The first satisfied sub-reason is surfaced, matching the
            // single-reason contract callers rely on.
            match statuses.iter().find(|status| status.eligible) {
                Some(satisfied) => EligibilityStatus::eligible(satisfied.reason.clone()),
                None => EligibilityStatus::ineligible(format!(
                    "none of {} conditions were met",
                    conditions.len()
                )),
            }
        }
    }
}
