//! Coercion of validated model output into typed results.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;

use super::{
    operations::FallbackKind,
    types::{ResultValue, Sentiment, SentimentResult},
};
use crate::error::ServiceError;

static BULLET_PREFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*(?:[-*•]|\d+[.)])\s*").expect("static pattern compiles"));

/// Parse raw output into the operation's declared result shape.
///
/// Shape mismatches are retryable invalid responses: a second attempt
/// often produces conformant output.
pub fn parse_result(raw: &str, kind: FallbackKind) -> Result<ResultValue, ServiceError> {
    match kind {
        FallbackKind::Text => Ok(ResultValue::Text(raw.trim().to_string())),
        FallbackKind::List => parse_list(raw),
        FallbackKind::Sentiment => parse_sentiment(raw),
    }
}

fn parse_list(raw: &str) -> Result<ResultValue, ServiceError> {
    let items: Vec<String> = raw
        .lines()
        .map(|line| BULLET_PREFIX.replace(line, "").trim().to_string())
        .filter(|line| !line.is_empty())
        .collect();

    if items.is_empty() {
        return Err(ServiceError::InvalidResponse(
            "expected a list but found no items".to_string(),
        ));
    }
    Ok(ResultValue::Items(items))
}

#[derive(Deserialize)]
struct RawSentiment {
    sentiment: String,
    #[serde(default)]
    confidence: f32,
    #[serde(default)]
    explanation: String,
}

fn parse_sentiment(raw: &str) -> Result<ResultValue, ServiceError> {
    let json = strip_code_fences(raw);
    let parsed: RawSentiment = serde_json::from_str(json.trim()).map_err(|e| {
        ServiceError::InvalidResponse(format!("sentiment output is not valid JSON: {e}"))
    })?;

    let sentiment = match parsed.sentiment.to_lowercase().as_str() {
        "positive" => Sentiment::Positive,
        "negative" => Sentiment::Negative,
        "neutral" => Sentiment::Neutral,
        other => {
            return Err(ServiceError::InvalidResponse(format!(
                "unknown sentiment label '{other}'"
            )));
        }
    };

    Ok(ResultValue::Sentiment(SentimentResult {
        sentiment,
        confidence: parsed.confidence.clamp(0.0, 1.0),
        explanation: parsed.explanation,
    }))
}

/// Models frequently wrap JSON in markdown fences; unwrap one level.
fn strip_code_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest)
}
