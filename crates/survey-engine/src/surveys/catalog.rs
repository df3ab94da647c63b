use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

use super::definition::{
    Condition, ConditionalLogic, QuestionId, QuestionType, SurveyDefinition, SurveyId, TenantId,
};

/// Immutable survey-definition arena, built once at startup and handed to the
/// orchestrator by reference. No runtime insertion.
#[derive(Debug)]
pub struct SurveyCatalog {
    surveys: BTreeMap<SurveyId, SurveyDefinition>,
}

impl SurveyCatalog {
    pub fn new(definitions: Vec<SurveyDefinition>) -> Result<Self, DefinitionError> {
        let mut surveys = BTreeMap::new();

        for definition in definitions {
            validate_definition(&definition)?;
            let id = definition.id.clone();
            if surveys.insert(id.clone(), definition).is_some() {
                return Err(DefinitionError::DuplicateSurvey(id));
            }
        }

        Ok(Self { surveys })
    }

    /// Load one JSON document per survey from a directory.
    pub fn load_dir(path: &Path) -> Result<Self, DefinitionError> {
        let mut definitions = Vec::new();

        let mut entries: Vec<PathBuf> = fs::read_dir(path)?
            .filter_map(|entry| entry.ok().map(|entry| entry.path()))
            .filter(|path| path.extension().is_some_and(|ext| ext == "json"))
            .collect();
        entries.sort();

        for path in entries {
            let raw = fs::read_to_string(&path)?;
            let definition: SurveyDefinition =
                serde_json::from_str(&raw).map_err(|source| DefinitionError::Parse {
                    path: path.clone(),
                    source,
                })?;
            definitions.push(definition);
        }

        Self::new(definitions)
    }

    pub fn get(&self, id: &SurveyId) -> Option<&SurveyDefinition> {
        self.surveys.get(id)
    }

    pub fn surveys(&self) -> impl Iterator<Item = &SurveyDefinition> {
        self.surveys.values()
    }

    pub fn visible_to(&self, tenant: &TenantId) -> Vec<&SurveyDefinition> {
        self.surveys
            .values()
            .filter(|survey| survey.visible_to(tenant))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.surveys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.surveys.is_empty()
    }
}

fn validate_definition(definition: &SurveyDefinition) -> Result<(), DefinitionError> {
    if definition.questions.is_empty() {
        return Err(DefinitionError::EmptySurvey(definition.id.clone()));
    }

    let mut seen: BTreeSet<&QuestionId> = BTreeSet::new();
    for question in &definition.questions {
        if !seen.insert(&question.id) {
            return Err(DefinitionError::DuplicateQuestion {
                survey: definition.id.clone(),
                question: question.id.clone(),
            });
        }

        match question.question_type {
            QuestionType::RatingScale if question.scale.is_none() => {
                return Err(DefinitionError::MissingScale {
                    survey: definition.id.clone(),
                    question: question.id.clone(),
                });
            }
            QuestionType::Matrix if question.matrix.is_none() => {
                return Err(DefinitionError::MissingMatrix {
                    survey: definition.id.clone(),
                    question: question.id.clone(),
                });
            }
            _ => {}
        }
    }

    let known: BTreeSet<&QuestionId> = definition
        .questions
        .iter()
        .map(|question| &question.id)
        .collect();

    for question in &definition.questions {
        for condition in conditions_of(question.conditional.as_ref()) {
            if !known.contains(&condition.depends_on) {
                return Err(DefinitionError::UnknownDependency {
                    survey: definition.id.clone(),
                    question: question.id.clone(),
                    depends_on: condition.depends_on.clone(),
                });
            }
        }
    }

    Ok(())
}

fn conditions_of(conditional: Option<&ConditionalLogic>) -> Vec<&Condition> {
    match conditional {
        None => Vec::new(),
        Some(ConditionalLogic::Single(condition)) => vec![condition],
        Some(ConditionalLogic::Compound { conditions, .. }) => conditions.iter().collect(),
    }
}

/// Problems detected while building the catalog. Definitions are validated up
/// front so the engine never has to defend against a malformed survey at
/// request time.
#[derive(Debug, thiserror::Error)]
pub enum DefinitionError {
    #[error("duplicate survey id '{}'", .0 .0)]
    DuplicateSurvey(SurveyId),
    #[error("survey '{}' declares no questions", .0 .0)]
    EmptySurvey(SurveyId),
    #[error("survey '{}' declares question '{}' more than once", survey.0, question.0)]
    DuplicateQuestion {
        survey: SurveyId,
        question: QuestionId,
    },
    #[error(
        "survey '{}' question '{}' depends on unknown question '{}'",
        survey.0,
        question.0,
        depends_on.0
    )]
    UnknownDependency {
        survey: SurveyId,
        question: QuestionId,
        depends_on: QuestionId,
    },
    #[error("survey '{}' rating question '{}' is missing its scale", survey.0, question.0)]
    MissingScale {
        survey: SurveyId,
        question: QuestionId,
    },
    #[error("survey '{}' matrix question '{}' is missing its grid", survey.0, question.0)]
    MissingMatrix {
        survey: SurveyId,
        question: QuestionId,
    },
    #[error("failed to read survey definitions: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse survey definition {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}
