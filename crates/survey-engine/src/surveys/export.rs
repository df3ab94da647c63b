use super::definition::SurveyDefinition;
use super::session::{AnswerValue, MatrixCell, ParticipantSession};
use super::store::{ExportBatch, ExportFormat, StoreError};

/// Serialize sessions for export. CSV carries one column per question id
/// after the session metadata columns; JSON is the raw persisted shape.
///
/// Store adapters delegate here so every backend produces the same documents.
pub fn render(
    survey: &SurveyDefinition,
    sessions: &[ParticipantSession],
    format: ExportFormat,
) -> Result<ExportBatch, StoreError> {
    let data = match format {
        ExportFormat::Csv => render_csv(survey, sessions)?,
        ExportFormat::Json => serde_json::to_string_pretty(sessions)
            .map_err(|err| StoreError::Export(err.to_string()))?,
    };

    Ok(ExportBatch {
        data,
        record_count: sessions.len(),
    })
}

fn render_csv(
    survey: &SurveyDefinition,
    sessions: &[ParticipantSession],
) -> Result<String, StoreError> {
    let mut writer = csv::Writer::from_writer(Vec::new());

    let mut header = vec![
        "sessionId".to_string(),
        "participantId".to_string(),
        "status".to_string(),
        "startedAt".to_string(),
        "completedAt".to_string(),
    ];
    header.extend(survey.questions.iter().map(|question| question.id.0.clone()));
    writer
        .write_record(&header)
        .map_err(|err| StoreError::Export(err.to_string()))?;

    for session in sessions {
        let mut record = vec![
            session.session_id.0.clone(),
            session.participant_id.0.clone(),
            session.status.label().to_string(),
            session.started_at.to_rfc3339(),
            session
                .completed_at
                .map(|completed| completed.to_rfc3339())
                .unwrap_or_default(),
        ];

        for question in &survey.questions {
            let cell = session
                .responses
                .get(&question.id)
                .map(|response| render_value(&response.value))
                .unwrap_or_default();
            record.push(cell);
        }

        writer
            .write_record(&record)
            .map_err(|err| StoreError::Export(err.to_string()))?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|err| StoreError::Export(err.to_string()))?;
    String::from_utf8(bytes).map_err(|err| StoreError::Export(err.to_string()))
}

fn render_value(value: &AnswerValue) -> String {
    match value {
        AnswerValue::Null => String::new(),
        AnswerValue::Bool(flag) => flag.to_string(),
        AnswerValue::Number(number) => number.to_string(),
        AnswerValue::Text(text) => text.clone(),
        AnswerValue::List(values) => values.join(";"),
        AnswerValue::Matrix(cells) => cells
            .iter()
            .map(|(row, cell)| format!("{row}={}", render_cell(cell)))
            .collect::<Vec<_>>()
            .join(";"),
    }
}

fn render_cell(cell: &MatrixCell) -> String {
    match cell {
        MatrixCell::One(value) => value.clone(),
        MatrixCell::Many(values) => values.join("|"),
    }
}
