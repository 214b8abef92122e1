//! Best-effort recovery of syntactically broken tool-call argument strings.
//!
//! Streamed argument JSON is truncated or polluted by the model far more
//! often at the tail than at the head, so every strategy here biases toward
//! salvaging a valid prefix.

use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

const PREVIEW_LIMIT: usize = 200;

/// Terminal, non-retryable failure: the argument string could not be turned
/// into valid JSON by any repair strategy.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("tool arguments are not valid JSON: {reason} (preview: {preview:?}, length {length})")]
pub struct RepairError {
    pub reason: String,
    pub preview: String,
    pub length: usize,
}

impl RepairError {
    fn new(raw: &str, source: &serde_json::Error) -> Self {
        Self {
            reason: source.to_string(),
            preview: truncate_preview(raw),
            length: raw.len(),
        }
    }
}

fn truncate_preview(raw: &str) -> String {
    if raw.len() <= PREVIEW_LIMIT {
        return raw.to_string();
    }
    let mut end = PREVIEW_LIMIT;
    while !raw.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &raw[..end])
}

fn is_valid_json(candidate: &str) -> Result<(), serde_json::Error> {
    serde_json::from_str::<Value>(candidate).map(|_| ())
}

/// Repair a raw tool-call argument string into valid JSON.
///
/// Deterministic and pure; ordered strategy, first success wins:
/// 1. parse as-is,
/// 2. strip trailing runs of `{}`, `[]`, and `""` the model sometimes
///    appends after a complete object,
/// 3. extract the first balanced top-level object, honoring string
///    literals and escape sequences.
///
/// Repair of already-valid JSON is the identity, which also makes the
/// function idempotent for every recoverable input.
pub fn repair(raw: &str) -> Result<String, RepairError> {
    let original_error = match is_valid_json(raw) {
        Ok(()) => return Ok(raw.to_string()),
        Err(err) => err,
    };

    debug!(
        length = raw.len(),
        error = %original_error,
        "tool arguments failed to parse, attempting repair"
    );

    let cleaned = strip_trailing_garbage(raw.trim());
    if is_valid_json(cleaned).is_ok() {
        debug!(
            original_length = raw.len(),
            cleaned_length = cleaned.len(),
            "repaired tool arguments by removing trailing garbage"
        );
        return Ok(cleaned.to_string());
    }

    if cleaned.starts_with('{') {
        if let Some(first_object) = extract_first_object(cleaned) {
            if is_valid_json(first_object).is_ok() {
                debug!(
                    original_length = raw.len(),
                    extracted_length = first_object.len(),
                    "repaired tool arguments by extracting first balanced object"
                );
                return Ok(first_object.to_string());
            }
        }
    }

    warn!(
        length = raw.len(),
        error = %original_error,
        "tool arguments are unrepairable"
    );
    Err(RepairError::new(raw, &original_error))
}

/// Remove trailing runs of empty containers and quote pairs, for example
/// `{"a":1}{}{}` becomes `{"a":1}`.
fn strip_trailing_garbage(raw: &str) -> &str {
    let mut rest = raw.trim_end();
    loop {
        let before = rest;
        for suffix in ["{}", "[]", "\"\""] {
            if let Some(stripped) = rest.strip_suffix(suffix) {
                rest = stripped.trim_end();
            }
        }
        if rest == before {
            return rest;
        }
    }
}

/// Scan for the first balanced top-level JSON object, returning the prefix
/// up to and including its closing brace. Braces inside string literals do
/// not affect the depth count; a backslash escapes the following character.
fn extract_first_object(input: &str) -> Option<&str> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escape_next = false;

    for (position, ch) in input.char_indices() {
        if escape_next {
            escape_next = false;
            continue;
        }
        match ch {
            '\\' if in_string => escape_next = true,
            '"' => in_string = !in_string,
            '{' if !in_string => depth += 1,
            '}' if !in_string => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(&input[..=position]);
                }
            }
            _ => {}
        }
    }
    None
}
