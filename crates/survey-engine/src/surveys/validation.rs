use std::collections::BTreeSet;
use std::sync::OnceLock;

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, NaiveTime, Weekday};
use regex::Regex;
use serde::Serialize;
use serde_json::{json, Value};

use super::definition::{QuestionDefinition, QuestionType, ScaleConfig, ValidationRules};
use super::session::{AnswerValue, MatrixCell};

/// Names the violated rule so conversational layers can build corrective
/// prompts without parsing messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ConstraintKind {
    #[serde(rename = "required")]
    Required,
    #[serde(rename = "type")]
    Shape,
    #[serde(rename = "minLength")]
    MinLength,
    #[serde(rename = "maxLength")]
    MaxLength,
    #[serde(rename = "pattern")]
    Pattern,
    #[serde(rename = "invalidPattern")]
    InvalidPattern,
    #[serde(rename = "membership")]
    Membership,
    #[serde(rename = "minSelections")]
    MinSelections,
    #[serde(rename = "maxSelections")]
    MaxSelections,
    #[serde(rename = "min")]
    Min,
    #[serde(rename = "max")]
    Max,
    #[serde(rename = "step")]
    Step,
    #[serde(rename = "integer")]
    Integer,
    #[serde(rename = "email")]
    Email,
    #[serde(rename = "format")]
    Format,
    #[serde(rename = "minDate")]
    MinDate,
    #[serde(rename = "maxDate")]
    MaxDate,
    #[serde(rename = "allowWeekends")]
    Weekend,
    #[serde(rename = "allowPast")]
    Past,
    #[serde(rename = "allowFuture")]
    Future,
    #[serde(rename = "excludedDates")]
    ExcludedDate,
    #[serde(rename = "matrixRow")]
    MatrixRow,
    #[serde(rename = "matrixColumn")]
    MatrixColumn,
    #[serde(rename = "allowMultiplePerRow")]
    MatrixMultiple,
}

/// One violated constraint with enough context to re-prompt the participant.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationIssue {
    pub constraint: ConstraintKind,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actual: Option<Value>,
}

impl ValidationIssue {
    fn new(constraint: ConstraintKind, message: impl Into<String>) -> Self {
        Self {
            constraint,
            message: message.into(),
            expected: None,
            actual: None,
        }
    }

    fn with_detail(mut self, expected: Value, actual: Value) -> Self {
        self.expected = Some(expected);
        self.actual = Some(actual);
        self
    }
}

/// Result of validating one value against one question. Returned as data,
/// never raised, so callers can re-prompt without exception handling.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationOutcome {
    pub valid: bool,
    pub errors: Vec<ValidationIssue>,
}

impl ValidationOutcome {
    pub fn passed() -> Self {
        Self {
            valid: true,
            errors: Vec::new(),
        }
    }

    pub fn failed(errors: Vec<ValidationIssue>) -> Self {
        Self {
            valid: false,
            errors,
        }
    }

    fn from_issues(errors: Vec<ValidationIssue>) -> Self {
        if errors.is_empty() {
            Self::passed()
        } else {
            Self::failed(errors)
        }
    }
}

/// Validate a single response value against a question's declared rules.
///
/// The required/empty fast path short-circuits; every other branch collects
/// all violations so the caller can surface them together. `today` anchors
/// the calendar-relative date rules and comes from the orchestrator's clock.
pub fn validate(
    question: &QuestionDefinition,
    value: &AnswerValue,
    today: NaiveDate,
) -> ValidationOutcome {
    if value.is_empty() {
        if question.required {
            return ValidationOutcome::failed(vec![ValidationIssue::new(
                ConstraintKind::Required,
                format!("question '{}' requires an answer", question.id.0),
            )]);
        }
        return ValidationOutcome::passed();
    }

    let rules = question.validation.clone().unwrap_or_default();

    let issues = match question.question_type {
        QuestionType::FreeForm => match value {
            AnswerValue::Text(text) => check_text(text, &rules),
            other => vec![shape_issue("string", other)],
        },
        QuestionType::MultipleChoice => match value {
            AnswerValue::Text(text) => check_choice(question, text),
            other => vec![shape_issue("string", other)],
        },
        QuestionType::MultipleSelect => match value {
            AnswerValue::List(selections) => check_selections(question, selections, &rules),
            other => vec![shape_issue("string array", other)],
        },
        QuestionType::RatingScale => match value {
            AnswerValue::Number(rating) => question
                .scale
                .as_ref()
                .map(|scale| check_rating(*rating, scale))
                .unwrap_or_default(),
            other => vec![shape_issue("number", other)],
        },
        QuestionType::Email => match value {
            AnswerValue::Text(text) => check_email(text),
            other => vec![shape_issue("string", other)],
        },
        QuestionType::Number => match value {
            AnswerValue::Number(number) => check_number(*number, &rules),
            other => vec![shape_issue("number", other)],
        },
        QuestionType::Boolean => match value {
            AnswerValue::Bool(_) => Vec::new(),
            other => vec![shape_issue("boolean", other)],
        },
        QuestionType::Date => match value {
            AnswerValue::Text(text) => check_date(text, &rules, today),
            other => vec![shape_issue("string", other)],
        },
        QuestionType::DateTime => match value {
            AnswerValue::Text(text) => check_datetime(text, &rules, today),
            other => vec![shape_issue("string", other)],
        },
        QuestionType::Time => match value {
            AnswerValue::Text(text) => check_time(text),
            other => vec![shape_issue("string", other)],
        },
        QuestionType::Matrix => match value {
            AnswerValue::Matrix(cells) => check_matrix(question, cells),
            other => vec![shape_issue("matrix object", other)],
        },
    };

    ValidationOutcome::from_issues(issues)
}

fn shape_issue(expected: &'static str, actual: &AnswerValue) -> ValidationIssue {
    ValidationIssue::new(
        ConstraintKind::Shape,
        format!("expected a {} value, received {}", expected, actual.shape()),
    )
    .with_detail(json!(expected), json!(actual.shape()))
}

fn check_text(text: &str, rules: &ValidationRules) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();
    let length = text.chars().count();

    if let Some(min_length) = rules.min_length {
        if length < min_length {
            issues.push(
                ValidationIssue::new(
                    ConstraintKind::MinLength,
                    format!("answer must be at least {min_length} characters"),
                )
                .with_detail(json!(min_length), json!(length)),
            );
        }
    }

    if let Some(max_length) = rules.max_length {
        if length > max_length {
            issues.push(
                ValidationIssue::new(
                    ConstraintKind::MaxLength,
                    format!("answer must be at most {max_length} characters"),
                )
                .with_detail(json!(max_length), json!(length)),
            );
        }
    }

    if let Some(pattern) = &rules.pattern {
        match Regex::new(pattern) {
            Ok(regex) => {
                if !regex.is_match(text) {
                    issues.push(
                        ValidationIssue::new(
                            ConstraintKind::Pattern,
                            "answer does not match the required pattern",
                        )
                        .with_detail(json!(pattern), json!(text)),
                    );
                }
            }
            // A broken pattern is a defect in the survey definition, surfaced
            // as an error rather than a crash.
            Err(_) => issues.push(
                ValidationIssue::new(
                    ConstraintKind::InvalidPattern,
                    format!("question definition has an invalid pattern '{pattern}'"),
                )
                .with_detail(json!(pattern), json!(text)),
            ),
        }
    }

    issues
}

fn check_choice(question: &QuestionDefinition, text: &str) -> Vec<ValidationIssue> {
    if question.option_values().any(|option| option == text) {
        return Vec::new();
    }

    vec![
        ValidationIssue::new(
            ConstraintKind::Membership,
            format!("'{text}' is not one of the allowed options"),
        )
        .with_detail(
            json!(question.option_values().collect::<Vec<_>>()),
            json!(text),
        ),
    ]
}

fn check_selections(
    question: &QuestionDefinition,
    selections: &[String],
    rules: &ValidationRules,
) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();

    for selection in selections {
        if !question.option_values().any(|option| option == selection) {
            issues.push(
                ValidationIssue::new(
                    ConstraintKind::Membership,
                    format!("'{selection}' is not one of the allowed options"),
                )
                .with_detail(
                    json!(question.option_values().collect::<Vec<_>>()),
                    json!(selection),
                ),
            );
        }
    }

    if let Some(min_selections) = rules.min_selections {
        if selections.len() < min_selections {
            issues.push(
                ValidationIssue::new(
                    ConstraintKind::MinSelections,
                    format!("select at least {min_selections} option(s)"),
                )
                .with_detail(json!(min_selections), json!(selections.len())),
            );
        }
    }

    if let Some(max_selections) = rules.max_selections {
        if selections.len() > max_selections {
            issues.push(
                ValidationIssue::new(
                    ConstraintKind::MaxSelections,
                    format!("select at most {max_selections} option(s)"),
                )
                .with_detail(json!(max_selections), json!(selections.len())),
            );
        }
    }

    issues
}

fn check_rating(rating: f64, scale: &ScaleConfig) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();

    if rating < scale.min {
        issues.push(
            ValidationIssue::new(
                ConstraintKind::Min,
                format!("rating {rating} is below the scale minimum {}", scale.min),
            )
            .with_detail(json!(scale.min), json!(rating)),
        );
    }

    if rating > scale.max {
        issues.push(
            ValidationIssue::new(
                ConstraintKind::Max,
                format!("rating {rating} is above the scale maximum {}", scale.max),
            )
            .with_detail(json!(scale.max), json!(rating)),
        );
    }

    if scale.step > 0.0 && !step_aligned(rating, scale.min, scale.step) {
        issues.push(
            ValidationIssue::new(
                ConstraintKind::Step,
                format!(
                    "rating must move in steps of {} starting from {}",
                    scale.step, scale.min
                ),
            )
            .with_detail(json!(scale.step), json!(rating)),
        );
    }

    issues
}

fn step_aligned(value: f64, min: f64, step: f64) -> bool {
    let remainder = ((value - min) % step).abs();
    remainder < 1e-9 || (step - remainder).abs() < 1e-9
}

fn check_number(number: f64, rules: &ValidationRules) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();

    if rules.integer == Some(true) && number.fract() != 0.0 {
        issues.push(
            ValidationIssue::new(
                ConstraintKind::Integer,
                format!("answer must be a whole number, received {number}"),
            )
            .with_detail(json!("integer"), json!(number)),
        );
    }

    if let Some(min) = rules.min {
        if number < min {
            issues.push(
                ValidationIssue::new(
                    ConstraintKind::Min,
                    format!("answer {number} is below the minimum {min}"),
                )
                .with_detail(json!(min), json!(number)),
            );
        }
    }

    if let Some(max) = rules.max {
        if number > max {
            issues.push(
                ValidationIssue::new(
                    ConstraintKind::Max,
                    format!("answer {number} is above the maximum {max}"),
                )
                .with_detail(json!(max), json!(number)),
            );
        }
    }

    issues
}

fn email_regex() -> &'static Regex {
    static EMAIL: OnceLock<Regex> = OnceLock::new();
    // Permissive on purpose: one '@', non-empty local part, dotted domain.
    EMAIL.get_or_init(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email regex compiles"))
}

fn check_email(text: &str) -> Vec<ValidationIssue> {
    if email_regex().is_match(text) {
        return Vec::new();
    }

    vec![
        ValidationIssue::new(
            ConstraintKind::Email,
            format!("'{text}' is not a valid email address"),
        )
        .with_detail(json!("name@example.com"), json!(text)),
    ]
}

fn check_date(text: &str, rules: &ValidationRules, today: NaiveDate) -> Vec<ValidationIssue> {
    match NaiveDate::parse_from_str(text, "%Y-%m-%d") {
        Ok(date) => check_temporal(date, rules, today),
        Err(_) => vec![ValidationIssue::new(
            ConstraintKind::Format,
            format!("'{text}' is not a valid ISO-8601 date (YYYY-MM-DD)"),
        )
        .with_detail(json!("YYYY-MM-DD"), json!(text))],
    }
}

fn check_datetime(text: &str, rules: &ValidationRules, today: NaiveDate) -> Vec<ValidationIssue> {
    let date = DateTime::parse_from_rfc3339(text)
        .map(|instant| instant.date_naive())
        .or_else(|_| {
            NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S")
                .map(|naive| naive.date())
        });

    match date {
        // Temporal rules compare by calendar date, never by instant.
        Ok(date) => check_temporal(date, rules, today),
        Err(_) => vec![ValidationIssue::new(
            ConstraintKind::Format,
            format!("'{text}' is not a valid ISO-8601 datetime"),
        )
        .with_detail(json!("YYYY-MM-DDThh:mm:ss"), json!(text))],
    }
}

fn check_time(text: &str) -> Vec<ValidationIssue> {
    let parsed = NaiveTime::parse_from_str(text, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(text, "%H:%M"));

    if parsed.is_ok() {
        return Vec::new();
    }

    vec![ValidationIssue::new(
        ConstraintKind::Format,
        format!("'{text}' is not a valid ISO-8601 time (hh:mm or hh:mm:ss)"),
    )
    .with_detail(json!("hh:mm:ss"), json!(text))]
}

fn check_temporal(date: NaiveDate, rules: &ValidationRules, today: NaiveDate) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();

    if let Some(min_date) = rules.min_date {
        if date < min_date {
            issues.push(
                ValidationIssue::new(
                    ConstraintKind::MinDate,
                    format!("date {date} is before the earliest allowed {min_date}"),
                )
                .with_detail(json!(min_date), json!(date)),
            );
        }
    }

    if let Some(max_date) = rules.max_date {
        if date > max_date {
            issues.push(
                ValidationIssue::new(
                    ConstraintKind::MaxDate,
                    format!("date {date} is after the latest allowed {max_date}"),
                )
                .with_detail(json!(max_date), json!(date)),
            );
        }
    }

    if rules.allow_weekends == Some(false)
        && matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
    {
        issues.push(
            ValidationIssue::new(
                ConstraintKind::Weekend,
                format!("date {date} falls on a weekend"),
            )
            .with_detail(json!("weekday"), json!(date)),
        );
    }

    if rules.allow_past == Some(false) && date < today {
        issues.push(
            ValidationIssue::new(
                ConstraintKind::Past,
                format!("date {date} is in the past"),
            )
            .with_detail(json!(today), json!(date)),
        );
    }

    if rules.allow_future == Some(false) && date > today {
        issues.push(
            ValidationIssue::new(
                ConstraintKind::Future,
                format!("date {date} is in the future"),
            )
            .with_detail(json!(today), json!(date)),
        );
    }

    if rules.excluded_dates.contains(&date) {
        issues.push(
            ValidationIssue::new(
                ConstraintKind::ExcludedDate,
                format!("date {date} is excluded for this question"),
            )
            .with_detail(json!(rules.excluded_dates), json!(date)),
        );
    }

    issues
}

fn check_matrix(
    question: &QuestionDefinition,
    cells: &std::collections::BTreeMap<String, MatrixCell>,
) -> Vec<ValidationIssue> {
    let Some(config) = &question.matrix else {
        return Vec::new();
    };

    let mut issues = Vec::new();
    let declared_rows: BTreeSet<&str> = config.rows.iter().map(|row| row.id.as_str()).collect();

    for row_id in cells.keys() {
        if !declared_rows.contains(row_id.as_str()) {
            issues.push(
                ValidationIssue::new(
                    ConstraintKind::MatrixRow,
                    format!("'{row_id}' is not a declared matrix row"),
                )
                .with_detail(json!(declared_rows), json!(row_id)),
            );
        }
    }

    // Missing rows only block required matrix questions.
    if question.required {
        let missing: Vec<&str> = config
            .rows
            .iter()
            .map(|row| row.id.as_str())
            .filter(|row_id| !cells.contains_key(*row_id))
            .collect();

        if !missing.is_empty() {
            issues.push(
                ValidationIssue::new(
                    ConstraintKind::MatrixRow,
                    format!("missing answers for rows: {}", missing.join(", ")),
                )
                .with_detail(json!(declared_rows), json!(cells.keys().collect::<Vec<_>>())),
            );
        }
    }

    for (row_id, cell) in cells {
        if matches!(cell, MatrixCell::Many(_)) && !config.allow_multiple_per_row {
            issues.push(
                ValidationIssue::new(
                    ConstraintKind::MatrixMultiple,
                    format!("row '{row_id}' accepts a single answer"),
                )
                .with_detail(json!(false), json!(cell.values().len())),
            );
        }

        for value in cell.values() {
            if !config.columns.iter().any(|column| &column.value == value) {
                issues.push(
                    ValidationIssue::new(
                        ConstraintKind::MatrixColumn,
                        format!("'{value}' is not a declared column for row '{row_id}'"),
                    )
                    .with_detail(
                        json!(config
                            .columns
                            .iter()
                            .map(|column| column.value.as_str())
                            .collect::<Vec<_>>()),
                        json!(value),
                    ),
                );
            }
        }
    }

    issues
}
