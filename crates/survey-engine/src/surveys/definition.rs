use serde::{Deserialize, Serialize};

use super::session::AnswerValue;

/// Identifier wrapper for survey definitions.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SurveyId(pub String);

/// Identifier wrapper for questions, unique within their survey.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct QuestionId(pub String);

/// Identifier wrapper scoping sessions and exports to a tenant.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TenantId(pub String);

/// Static, versioned description of a question set and its rules. Loaded once
/// at startup and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SurveyDefinition {
    pub id: SurveyId,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default = "default_version")]
    pub version: u32,
    /// Definitions without a tenant are visible to every tenant.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<TenantId>,
    pub questions: Vec<QuestionDefinition>,
    #[serde(default)]
    pub settings: SurveySettings,
}

fn default_version() -> u32 {
    1
}

impl SurveyDefinition {
    pub fn question(&self, id: &QuestionId) -> Option<&QuestionDefinition> {
        self.questions.iter().find(|question| &question.id == id)
    }

    pub fn required_count(&self) -> usize {
        self.questions
            .iter()
            .filter(|question| question.required)
            .count()
    }

    pub fn visible_to(&self, tenant: &TenantId) -> bool {
        match &self.tenant_id {
            Some(owner) => owner == tenant,
            None => true,
        }
    }
}

/// Behavioral knobs carried alongside the question list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SurveySettings {
    /// Declared total time estimate surfaced while progress is below half.
    #[serde(default = "default_estimated_minutes")]
    pub estimated_minutes: u32,
    /// Lower bound of the suggestion window.
    #[serde(default = "default_suggest_min")]
    pub suggest_min: usize,
    /// Upper bound of the suggestion window.
    #[serde(default = "default_suggest_max")]
    pub suggest_max: usize,
}

fn default_estimated_minutes() -> u32 {
    10
}

fn default_suggest_min() -> usize {
    1
}

fn default_suggest_max() -> usize {
    3
}

impl Default for SurveySettings {
    fn default() -> Self {
        Self {
            estimated_minutes: default_estimated_minutes(),
            suggest_min: default_suggest_min(),
            suggest_max: default_suggest_max(),
        }
    }
}

/// One question inside a survey definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionDefinition {
    pub id: QuestionId,
    pub prompt: String,
    #[serde(rename = "type")]
    pub question_type: QuestionType,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<ChoiceOption>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale: Option<ScaleConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matrix: Option<MatrixConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation: Option<ValidationRules>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conditional: Option<ConditionalLogic>,
}

impl QuestionDefinition {
    pub fn option_values(&self) -> impl Iterator<Item = &str> {
        self.options.iter().map(|option| option.value.as_str())
    }
}

/// Closed set of supported question types so validation dispatch stays
/// exhaustive when new types are added.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum QuestionType {
    FreeForm,
    MultipleChoice,
    MultipleSelect,
    RatingScale,
    Email,
    Number,
    Boolean,
    Date,
    #[serde(rename = "datetime")]
    DateTime,
    Time,
    Matrix,
}

impl QuestionType {
    pub const fn label(self) -> &'static str {
        match self {
            QuestionType::FreeForm => "free-form",
            QuestionType::MultipleChoice => "multiple-choice",
            QuestionType::MultipleSelect => "multiple-select",
            QuestionType::RatingScale => "rating-scale",
            QuestionType::Email => "email",
            QuestionType::Number => "number",
            QuestionType::Boolean => "boolean",
            QuestionType::Date => "date",
            QuestionType::DateTime => "datetime",
            QuestionType::Time => "time",
            QuestionType::Matrix => "matrix",
        }
    }
}

/// Selectable option for choice, select, and matrix-column configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChoiceOption {
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl ChoiceOption {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            label: None,
        }
    }
}

/// Numeric bounds for rating-scale questions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScaleConfig {
    pub min: f64,
    pub max: f64,
    #[serde(default = "default_step")]
    pub step: f64,
}

fn default_step() -> f64 {
    1.0
}

/// Row/column grid configuration for matrix questions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatrixConfig {
    pub rows: Vec<MatrixRow>,
    pub columns: Vec<ChoiceOption>,
    #[serde(default)]
    pub allow_multiple_per_row: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatrixRow {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

/// Declarative constraints checked by the validation engine. All fields are
/// optional; absent fields impose nothing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationRules {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_length: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_selections: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_selections: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub integer: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_date: Option<chrono::NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_date: Option<chrono::NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allow_weekends: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allow_past: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allow_future: Option<bool>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub excluded_dates: Vec<chrono::NaiveDate>,
}

/// Branching rule deciding whether a question is currently askable. A rule is
/// either a single condition on one prior response or an AND/OR compound of
/// single conditions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConditionalLogic {
    Compound {
        operator: ConditionOperator,
        conditions: Vec<Condition>,
    },
    Single(Condition),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConditionOperator {
    #[serde(rename = "AND")]
    And,
    #[serde(rename = "OR")]
    Or,
}

/// A single condition: the referenced question must have a recorded response
/// equal to one of the listed values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    pub depends_on: QuestionId,
    pub show_if: Vec<AnswerValue>,
}
