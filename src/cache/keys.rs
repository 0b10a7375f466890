//! Deterministic cache key generation.
//!
//! Keys collapse large inputs to stable fingerprints so that no raw text
//! beyond the hash threshold ever appears in the key namespace:
//!
//! ```text
//! v1|{op_tag}|{text_fp}|{opts_fp}|{q_fp}
//! ```
//!
//! - `text_fp`: the text verbatim when short, else the first 32 hex chars
//!   of its SHA-256 digest prefixed with `hash:`
//! - `opts_fp`: 16 hex chars of the SHA-256 of the canonical (sorted-key)
//!   JSON encoding of the options
//! - `q_fp`: 16 hex chars of the SHA-256 of the question, present only for
//!   the qa operation
//!
//! The `v1|` prefix is reserved; operators must not write keys under it by
//! other means.

use std::collections::BTreeMap;

use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::config::TextSizeTiers;

/// Reserved namespace prefix for generated keys.
pub const KEY_NAMESPACE: &str = "v1|";

/// Input size classification, recorded in metrics. The tier never changes
/// the key itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TextSizeTier {
    Small,
    Medium,
    Large,
    Xlarge,
}

impl TextSizeTier {
    pub fn classify(len: usize, tiers: &TextSizeTiers) -> Self {
        if len < tiers.small {
            Self::Small
        } else if len < tiers.medium {
            Self::Medium
        } else if len < tiers.large {
            Self::Large
        } else {
            Self::Xlarge
        }
    }
}

/// Key generator, frozen at facade construction.
#[derive(Debug, Clone)]
pub struct KeyGenerator {
    /// Texts longer than this are fingerprinted instead of embedded.
    text_hash_threshold: usize,
    tiers: TextSizeTiers,
}

impl KeyGenerator {
    pub fn new(text_hash_threshold: usize, tiers: TextSizeTiers) -> Self {
        Self {
            text_hash_threshold,
            tiers,
        }
    }

    /// Build the deterministic key for `(operation, text, options, question)`.
    ///
    /// Options are canonicalized through a sorted map, so insertion order
    /// never affects the key. The question fingerprint is appended only
    /// when a question is given (qa operation).
    pub fn build(
        &self,
        op_tag: &str,
        text: &str,
        options: &BTreeMap<String, serde_json::Value>,
        question: Option<&str>,
    ) -> String {
        let text_fp = if text.chars().count() <= self.text_hash_threshold {
            text.to_string()
        } else {
            format!("hash:{}", &hex_sha256(text.as_bytes())[..32])
        };

        let canonical_opts =
            serde_json::to_vec(options).expect("BTreeMap<String, Value> serializes");
        let opts_hash = hex_sha256(&canonical_opts);
        let opts_fp = &opts_hash[..16];

        let q_fp = question
            .map(|q| hex_sha256(q.as_bytes())[..16].to_string())
            .unwrap_or_default();

        format!("{KEY_NAMESPACE}{op_tag}|{text_fp}|{opts_fp}|{q_fp}")
    }

    pub fn tier(&self, text: &str) -> TextSizeTier {
        TextSizeTier::classify(text.chars().count(), &self.tiers)
    }
}

fn hex_sha256(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}
