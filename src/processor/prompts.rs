//! Prompt builders.
//!
//! Pure functions from `(operation, sanitized text, options, question)` to
//! the provider prompt. User content is fenced inside a delimited block so
//! instructions and data stay visually separated for the model.

use super::{
    operations::Operation,
    types::ProcessingOptions,
};

const USER_TEXT_OPEN: &str = "---USER TEXT START---";
const USER_TEXT_CLOSE: &str = "---USER TEXT END---";

pub fn build_prompt(
    operation: Operation,
    text: &str,
    options: &ProcessingOptions,
    question: Option<&str>,
) -> String {
    let instruction = match operation {
        Operation::Summarize => {
            let length = options.max_length.unwrap_or(150);
            let detail = options
                .detail_level
                .as_deref()
                .map(|level| format!(" Write at a {level} level of detail."))
                .unwrap_or_default();
            format!(
                "Summarize the text below in at most {length} words.{detail} \
                 Respond with the summary only."
            )
        }
        Operation::Sentiment => "Classify the overall sentiment of the text below. Respond with \
                                 a single JSON object of the form {\"sentiment\": \
                                 \"positive|negative|neutral\", \"confidence\": 0.0-1.0, \
                                 \"explanation\": \"...\"} and nothing else."
            .to_string(),
        Operation::KeyPoints => {
            let points = options.max_points.unwrap_or(5);
            format!(
                "Extract up to {points} key points from the text below. \
                 Respond with one point per line, no preamble."
            )
        }
        Operation::Questions => {
            let count = options.num_questions.unwrap_or(5);
            format!(
                "Write {count} insightful questions a careful reader would ask about \
                 the text below. Respond with one question per line, no preamble."
            )
        }
        Operation::Qa => {
            let question = question.unwrap_or_default();
            format!(
                "Answer the question using only the text below. If the text does not \
                 contain the answer, say so briefly.\nQuestion: {question}"
            )
        }
    };

    format!("{instruction}\n{USER_TEXT_OPEN}\n{text}\n{USER_TEXT_CLOSE}")
}
