//! Request and response types for the processing surface.

use serde::{Deserialize, Serialize};

use super::operations::Operation;

/// Per-operation tuning knobs. Unknown keys are rejected at the HTTP
/// boundary rather than silently dropped.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct ProcessingOptions {
    /// Target summary length in words (summarize).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_length: Option<u32>,

    /// Maximum number of key points (key_points).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_points: Option<u32>,

    /// Number of questions to generate (questions).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub num_questions: Option<u32>,

    /// Free-form detail hint, e.g. "brief" or "detailed" (summarize).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail_level: Option<String>,
}

impl ProcessingOptions {
    /// Canonical map form for cache-key generation: sorted keys, no
    /// absent fields.
    pub fn to_canonical_map(&self) -> std::collections::BTreeMap<String, serde_json::Value> {
        match serde_json::to_value(self) {
            Ok(serde_json::Value::Object(map)) => map
                .into_iter()
                .filter(|(_, v)| !v.is_null())
                .collect(),
            _ => Default::default(),
        }
    }
}

/// One text-processing request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProcessingRequest {
    pub text: String,
    pub operation: Operation,
    #[serde(default)]
    pub options: ProcessingOptions,
    /// Required for (and only for) the qa operation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub question: Option<String>,
    /// Correlation id; generated when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trace_id: Option<String>,
}

/// Sentiment classification labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sentiment {
    Positive,
    Negative,
    Neutral,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SentimentResult {
    pub sentiment: Sentiment,
    /// Confidence in [0, 1].
    pub confidence: f32,
    pub explanation: String,
}

/// Typed operation result, matching the operation's fallback kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum ResultValue {
    Text(String),
    Items(Vec<String>),
    Sentiment(SentimentResult),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseMetadata {
    /// True when the result was served from cache (or a sibling in-flight
    /// computation) rather than a fresh model call.
    pub cached: bool,
    /// True when the result is a typed fallback.
    pub degraded: bool,
    pub duration_ms: u64,
    pub model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tokens: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingResponse {
    pub success: bool,
    pub operation: Operation,
    pub result: ResultValue,
    pub metadata: ResponseMetadata,
    pub trace_id: String,
}

/// Batch of independent processing requests sharing one batch id.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BatchRequest {
    pub batch_id: String,
    pub items: Vec<ProcessingRequest>,
}

/// Per-item outcome. Failures carry the error taxonomy code, never a
/// stack trace.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PerItemResult {
    Ok { response: ProcessingResponse },
    Err {
        error_code: String,
        error_message: String,
    },
}

impl PerItemResult {
    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Ok { .. })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchResponse {
    pub batch_id: String,
    pub total: usize,
    pub completed: usize,
    pub failed: usize,
    pub items: Vec<PerItemResult>,
}

/// What actually gets cached: the typed result plus provenance. Degraded
/// results are never stored, so `degraded` is only true for values that
/// travel through single-flight to sibling callers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct CachedOutcome {
    pub result: ResultValue,
    pub model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tokens: Option<u64>,
    #[serde(default)]
    pub degraded: bool,
    /// Unix timestamp of the originating computation.
    #[serde(default)]
    pub cached_at: i64,
}
