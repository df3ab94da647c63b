use super::session::EnrichedQuestion;

/// Select a bounded window of next-askable questions.
///
/// Required questions fill the window first, up to `max`; optional questions
/// only top it up until `min` is reached or the optional pool runs out.
/// Ordering within each partition follows survey-definition order.
pub fn suggest(enriched: &[EnrichedQuestion], min: usize, max: usize) -> Vec<EnrichedQuestion> {
    let askable = enriched
        .iter()
        .filter(|question| question.currently_eligible && !question.already_answered);

    let mut required = Vec::new();
    let mut optional = Vec::new();
    for question in askable {
        if question.question.required {
            required.push(question.clone());
        } else {
            optional.push(question.clone());
        }
    }

    let mut window: Vec<EnrichedQuestion> = required.into_iter().take(max).collect();

    let mut optional = optional.into_iter();
    while window.len() < min {
        match optional.next() {
            Some(question) => window.push(question),
            None => break,
        }
    }

    window.truncate(max);
    window
}
