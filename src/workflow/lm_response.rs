//! Stage reply handling.
//!
//! Models answer either with the flat publish shape (`tags`, `summary`) or
//! with the envelope the prompts ask for (`thought`, `message`, `data`,
//! `issues`). `StageOutput` reads both so the fallback rules in the pipeline
//! only deal with one type.
use crate::extract::ExtractedObject;
use crate::schema::{normalize_tags, summary_text};
use serde::Serialize;
use serde_json::{Map, Value};

/// Where a stage's final values came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StageSource {
    /// The model's reply was used as-is.
    Model,
    /// Model reply combined with values from an earlier stage or defaults.
    Merged,
    /// The model's reply was discarded for the previous stage's values.
    PriorStage,
    /// The model's reply was discarded for configured defaults.
    Defaults,
}

impl std::fmt::Display for StageSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Model => write!(f, "model"),
            Self::Merged => write!(f, "merged"),
            Self::PriorStage => write!(f, "prior_stage"),
            Self::Defaults => write!(f, "defaults"),
        }
    }
}

/// Tags, summaries, and commentary recovered from one stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StageOutput {
    pub tags: Vec<String>,
    pub summaries: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thought: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub issues: Vec<String>,
    pub source: StageSource,
}

impl StageOutput {
    /// Read a stage reply. Tags and summaries come from `data` when it holds
    /// them, otherwise from the top level.
    pub fn from_object(object: &ExtractedObject) -> Self {
        let payload = match object.get("data") {
            Some(Value::Object(data)) if has_payload(data) => data,
            _ => object,
        };
        Self {
            tags: normalize_tags(payload.get("tags")),
            summaries: read_summaries(payload),
            thought: read_text(object.get("thought")),
            message: read_text(object.get("message")),
            issues: read_issues(object.get("issues")),
            source: StageSource::Model,
        }
    }

    pub fn first_summary(&self) -> Option<&str> {
        self.summaries.first().map(String::as_str)
    }

    /// Flat `{tags, summary}` view for the schema enforcer and later prompts.
    pub fn to_publish_object(&self) -> Map<String, Value> {
        let mut object = Map::new();
        object.insert(
            "tags".to_string(),
            Value::Array(self.tags.iter().cloned().map(Value::String).collect()),
        );
        object.insert(
            "summary".to_string(),
            Value::String(self.first_summary().unwrap_or_default().to_string()),
        );
        object
    }
}

fn has_payload(data: &Map<String, Value>) -> bool {
    ["tags", "summary", "summaries"]
        .iter()
        .any(|key| data.contains_key(*key))
}

fn read_text(value: Option<&Value>) -> Option<String> {
    let text = summary_text(value);
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}

/// Collect `summaries` (list) then `summary` (string or list), trimmed and
/// deduplicated in order.
fn read_summaries(payload: &Map<String, Value>) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    let mut push = |value: &Value| {
        let text = match value {
            Value::String(text) => text.trim().to_string(),
            Value::Null | Value::Array(_) | Value::Object(_) => return,
            other => other.to_string(),
        };
        if !text.is_empty() && !out.contains(&text) {
            out.push(text);
        }
    };
    for key in ["summaries", "summary"] {
        match payload.get(key) {
            Some(Value::Array(items)) => items.iter().for_each(&mut push),
            Some(value) => push(value),
            None => {}
        }
    }
    out
}

fn read_issues(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| read_text(Some(item)))
            .collect(),
        Some(Value::String(text)) if !text.trim().is_empty() => vec![text.trim().to_string()],
        _ => Vec::new(),
    }
}
