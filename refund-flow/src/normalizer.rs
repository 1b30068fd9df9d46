//! Turns backend analysis text into something fit for display.
//!
//! The backend is asked for prose but sometimes answers with a JSON object, or a JSON
//! object followed by prose. [`normalize`] pulls the leading object apart into display
//! text, key points and steps, and strips stray brace blocks from plain text so raw
//! JSON fragments never reach the user. None of these functions fail.

use regex::Regex;
use serde_json::{Map, Value};
use std::sync::LazyLock;

use crate::models::lenient;

/// Fields consulted for display text when an object carries no trailing prose.
const TEXT_FIELDS: [&str; 3] = ["analysis", "summary", "explanation"];

static BRACE_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)\{.*?\}").expect("brace block pattern is valid"));

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NormalizedAnalysis {
    pub display_text: Option<String>,
    pub key_points: Vec<String>,
    pub steps: Vec<String>,
}

impl NormalizedAnalysis {
    pub fn is_empty(&self) -> bool {
        self.display_text.is_none() && self.key_points.is_empty() && self.steps.is_empty()
    }
}

/// Normalizes `input` with no sibling fields to fall back on.
pub fn normalize(input: &str) -> NormalizedAnalysis {
    normalize_with(input, &[], &[])
}

/// Normalizes `input`, using `key_points` and `steps` from the containing record
/// when the text itself provides none.
pub fn normalize_with(input: &str, key_points: &[String], steps: &[String]) -> NormalizedAnalysis {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return NormalizedAnalysis::default();
    }

    if let Some((object, remainder)) = extract_leading_json(trimmed) {
        return from_object(&object, remainder, key_points, steps);
    }

    let stripped = strip_brace_blocks(trimmed);
    NormalizedAnalysis {
        display_text: non_empty(stripped.trim()),
        key_points: key_points.to_vec(),
        steps: steps.to_vec(),
    }
}

/// Display bundle for an already structured object plus any prose that followed it.
///
/// Brace blocks in the trailing prose are stripped like in plain text.
pub fn from_object(
    object: &Map<String, Value>,
    remainder: &str,
    key_points: &[String],
    steps: &[String],
) -> NormalizedAnalysis {
    let display_text = non_empty(strip_brace_blocks(remainder).trim()).or_else(|| {
        TEXT_FIELDS
            .iter()
            .filter_map(|field| object.get(*field).and_then(Value::as_str))
            .find_map(|text| non_empty(text.trim()))
    });

    NormalizedAnalysis {
        display_text,
        key_points: list_or(object, "key_points", key_points),
        steps: list_or(object, "steps", steps),
    }
}

/// Splits a leading JSON object off `text`.
///
/// Returns the object and the trimmed text after it. Only objects count; the
/// scan tracks string literals so braces inside quoted values do not close it.
pub fn extract_leading_json(text: &str) -> Option<(Map<String, Value>, &str)> {
    let text = text.trim();
    if !text.starts_with('{') {
        return None;
    }

    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (idx, ch) in text.char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }

        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' if depth > 0 => {
                depth -= 1;
                if depth == 0 {
                    let end = idx + ch.len_utf8();
                    if let Ok(Value::Object(object)) = serde_json::from_str(&text[..end]) {
                        return Some((object, text[end..].trim()));
                    }
                }
            }
            _ => {}
        }
    }

    match serde_json::from_str(text) {
        Ok(Value::Object(object)) => Some((object, "")),
        _ => None,
    }
}

/// Removes every `{...}` block, shortest match first.
pub fn strip_brace_blocks(text: &str) -> String {
    BRACE_BLOCK.replace_all(text, "").into_owned()
}

fn list_or(object: &Map<String, Value>, key: &str, fallback: &[String]) -> Vec<String> {
    let items = object
        .get(key)
        .map(lenient::list_from_value)
        .unwrap_or_default();
    if items.is_empty() {
        fallback.to_vec()
    } else {
        items
    }
}

fn non_empty(text: &str) -> Option<String> {
    (!text.is_empty()).then(|| text.to_string())
}
