//! Best-effort recovery of a JSON object from model replies.
//!
//! Local models asked for "JSON only" still wrap the object in prose, code
//! fences, or trailing chatter. Extraction tries progressively looser
//! strategies and never fails: when nothing can be recovered the caller gets
//! an empty map and decides on a fallback.
use crate::util::truncate_string;
use regex::Regex;
use serde_json::{Map, Value};
use std::sync::OnceLock;

/// A key-value mapping recovered from a model reply.
pub type ExtractedObject = Map<String, Value>;

/// Bytes of the raw reply included in the extraction-failure diagnostic.
const DIAGNOSTIC_PREVIEW_BYTES: usize = 200;

/// Which strategy recovered the object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionMethod {
    /// The whole trimmed reply parsed as a JSON object.
    Direct,
    /// The interior of a ```json (or bare ```) fence parsed.
    Fenced,
    /// The first balanced `{...}` span parsed.
    BraceScan,
}

impl std::fmt::Display for ExtractionMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Direct => write!(f, "direct"),
            Self::Fenced => write!(f, "fenced"),
            Self::BraceScan => write!(f, "brace_scan"),
        }
    }
}

fn fence_regex() -> &'static Regex {
    static FENCE: OnceLock<Regex> = OnceLock::new();
    FENCE.get_or_init(|| {
        Regex::new(r"(?s)```(?i:json)?[ \t]*\r?\n?\s*(\{.*?\})\s*```").expect("fence regex")
    })
}

/// Extract a JSON object from `text`, or an empty map if none can be found.
pub fn extract_object(text: &str) -> ExtractedObject {
    match extract_with_method(text) {
        Some((object, method)) => {
            tracing::debug!(%method, keys = object.len(), "extracted model object");
            object
        }
        None => {
            tracing::warn!(
                preview = %truncate_string(text.trim(), DIAGNOSTIC_PREVIEW_BYTES),
                "no JSON object found in model reply"
            );
            Map::new()
        }
    }
}

/// Run the extraction strategies in order and report which one succeeded.
pub fn extract_with_method(text: &str) -> Option<(ExtractedObject, ExtractionMethod)> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Some(object) = parse_object(trimmed) {
        return Some((object, ExtractionMethod::Direct));
    }

    if let Some(object) = fence_regex()
        .captures_iter(trimmed)
        .filter_map(|caps| caps.get(1))
        .find_map(|inner| parse_object(inner.as_str()))
    {
        return Some((object, ExtractionMethod::Fenced));
    }

    first_balanced_object(trimmed)
        .and_then(parse_object)
        .map(|object| (object, ExtractionMethod::BraceScan))
}

fn parse_object(candidate: &str) -> Option<ExtractedObject> {
    match serde_json::from_str::<Value>(candidate) {
        Ok(Value::Object(object)) => Some(object),
        _ => None,
    }
}

/// Find the first balanced top-level `{...}` span.
///
/// Braces inside string literals are skipped, and a backslash escapes the
/// next character within a string.
fn first_balanced_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in text[start..].char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + offset + 1]);
                }
            }
            _ => {}
        }
    }
    None
}
