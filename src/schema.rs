//! Publish schema and its enforcement.
//!
//! Whatever the model produced, `enforce` turns it into a `PublishRecord`
//! with exactly three unique lowercase tags and a bounded summary. It is total:
//! there is no input for which it fails.
use regex::Regex;
use serde::Serialize;
use serde_json::{Map, Value};
use std::sync::OnceLock;

/// Number of tags every publish record carries.
pub const TAG_COUNT: usize = 3;

/// Maximum number of words kept in a summary.
pub const MAX_SUMMARY_WORDS: usize = 25;

/// Final tags + summary artifact. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PublishRecord {
    tags: Vec<String>,
    summary: String,
}

impl PublishRecord {
    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    pub fn summary(&self) -> &str {
        &self.summary
    }
}

/// Placeholder tag literals shared by padding and placeholder detection.
///
/// `tags` are the literals used to pad short tag lists (slot order);
/// `markers` are extra literals that only count as placeholders when seen in
/// model output (e.g. `t1` echoed from a prompt example).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaceholderSet {
    tags: Vec<String>,
    markers: Vec<String>,
}

impl Default for PlaceholderSet {
    fn default() -> Self {
        Self::new(
            ["tag1", "tag2", "tag3"].map(String::from).to_vec(),
            ["t1", "t2", "t3"].map(String::from).to_vec(),
        )
    }
}

impl PlaceholderSet {
    pub fn new(tags: Vec<String>, markers: Vec<String>) -> Self {
        let clean = |items: Vec<String>| -> Vec<String> {
            let mut out: Vec<String> = Vec::new();
            for item in items {
                let item = item.trim().to_lowercase();
                if !item.is_empty() && !out.contains(&item) {
                    out.push(item);
                }
            }
            out
        };
        Self {
            tags: clean(tags),
            markers: clean(markers),
        }
    }

    /// True when `tag` is one of the padding literals or a known marker.
    pub fn looks_like_placeholder(&self, tag: &str) -> bool {
        let tag = tag.trim().to_lowercase();
        self.tags.contains(&tag) || self.markers.contains(&tag)
    }

    pub fn any_placeholder<S: AsRef<str>>(&self, tags: &[S]) -> bool {
        tags.iter().any(|tag| self.looks_like_placeholder(tag.as_ref()))
    }

    /// Pick the placeholder for `slot`, skipping literals already in `taken`.
    fn pad_tag(&self, slot: usize, taken: &[String]) -> String {
        if let Some(preferred) = self.tags.get(slot) {
            if !taken.contains(preferred) {
                return preferred.clone();
            }
        }
        if let Some(unused) = self.tags.iter().find(|tag| !taken.contains(tag)) {
            return unused.clone();
        }
        let mut n = self.tags.len().max(slot) + 1;
        loop {
            let candidate = format!("tag{n}");
            if !taken.contains(&candidate) {
                return candidate;
            }
            n += 1;
        }
    }
}

/// Normalize a raw `tags` value: strings only, trimmed, lowercased, non-empty,
/// first occurrence wins. Non-list values yield no tags.
pub fn normalize_tags(value: Option<&Value>) -> Vec<String> {
    let Some(Value::Array(items)) = value else {
        return Vec::new();
    };
    let mut tags: Vec<String> = Vec::new();
    for item in items {
        let Value::String(raw) = item else {
            continue;
        };
        let tag = raw.trim().to_lowercase();
        if tag.is_empty() || tags.contains(&tag) {
            continue;
        }
        tags.push(tag);
    }
    tags
}

/// Coerce a raw `summary` value into text. Missing and null become empty.
pub fn summary_text(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(text)) => text.clone(),
        Some(other) => other.to_string(),
    }
}

fn word_regex() -> &'static Regex {
    static WORD: OnceLock<Regex> = OnceLock::new();
    WORD.get_or_init(|| Regex::new(r"[\p{L}\p{N}'-]+").expect("word regex"))
}

/// Limit `text` to `max_words` words. Text within the limit both in words and
/// in whitespace-delimited tokens is only trimmed; anything else is rebuilt
/// from its first `max_words` words joined by single spaces.
pub fn truncate_words(text: &str, max_words: usize) -> String {
    let words: Vec<&str> = word_regex().find_iter(text).map(|m| m.as_str()).collect();
    if words.len() <= max_words && text.split_whitespace().count() <= max_words {
        return text.trim().to_string();
    }
    words[..words.len().min(max_words)].join(" ")
}

/// Build a schema-conformant record from any mapping.
pub fn enforce(object: &Map<String, Value>, placeholders: &PlaceholderSet) -> PublishRecord {
    let mut tags = normalize_tags(object.get("tags"));
    tags.truncate(TAG_COUNT);
    while tags.len() < TAG_COUNT {
        let pad = placeholders.pad_tag(tags.len(), &tags);
        tags.push(pad);
    }

    let summary = truncate_words(&summary_text(object.get("summary")), MAX_SUMMARY_WORDS);
    PublishRecord { tags, summary }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn object(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            other => panic!("expected object, got {other}"),
        }
    }

    fn word_count(text: &str) -> usize {
        word_regex().find_iter(text).count()
    }

    fn assert_invariants(record: &PublishRecord) {
        assert_eq!(record.tags().len(), TAG_COUNT);
        for tag in record.tags() {
            assert!(!tag.is_empty());
            assert_eq!(tag, &tag.to_lowercase());
        }
        for (i, a) in record.tags().iter().enumerate() {
            for b in &record.tags()[i + 1..] {
                assert!(!a.eq_ignore_ascii_case(b), "duplicate tag {a}");
            }
        }
        assert!(word_count(record.summary()) <= MAX_SUMMARY_WORDS);
        assert!(record.summary().split_whitespace().count() <= MAX_SUMMARY_WORDS);
    }

    #[test]
    fn pads_single_tag_with_slot_placeholders() {
        let record = enforce(&object(json!({"tags": ["Alpha"]})), &PlaceholderSet::default());
        assert_eq!(record.tags(), ["alpha", "tag2", "tag3"]);
        assert_eq!(record.summary(), "");
    }

    #[test]
    fn total_over_malformed_inputs() {
        let inputs = [
            json!({}),
            json!({"tags": "rust, cli"}),
            json!({"tags": null, "summary": null}),
            json!({"tags": [1, 2, {"x": 1}], "summary": 42}),
            json!({"tags": ["", "   ", "A", "a", " A "], "summary": ["list"]}),
            json!({"tags": ["tag2", "tag1"]}),
            json!({"tags": ["tag1", "tag2", "tag3", "tag4"]}),
        ];
        for input in inputs {
            let record = enforce(&object(input), &PlaceholderSet::default());
            assert_invariants(&record);
        }
    }

    #[test]
    fn dedupes_case_insensitively_and_keeps_first_three_in_order() {
        let record = enforce(
            &object(json!({"tags": ["Rust", " rust ", "CLI", "LLM", "extra"]})),
            &PlaceholderSet::default(),
        );
        assert_eq!(record.tags(), ["rust", "cli", "llm"]);
    }

    #[test]
    fn padding_skips_placeholders_already_used() {
        let record = enforce(&object(json!({"tags": ["tag2"]})), &PlaceholderSet::default());
        assert_eq!(record.tags(), ["tag2", "tag1", "tag3"]);

        let record = enforce(
            &object(json!({"tags": ["tag1", "tag2"]})),
            &PlaceholderSet::new(vec!["tag1".into(), "tag2".into()], Vec::new()),
        );
        assert_eq!(record.tags(), ["tag1", "tag2", "tag3"]);
    }

    #[test]
    fn truncates_thirty_words_to_first_twenty_five() {
        let words: Vec<String> = (1..=30).map(|n| format!("w{n}")).collect();
        let record = enforce(
            &object(json!({"tags": ["a", "b", "c"], "summary": words.join(", ")})),
            &PlaceholderSet::default(),
        );
        assert_eq!(record.summary(), words[..25].join(" "));
    }

    #[test]
    fn detached_punctuation_counts_against_the_token_limit() {
        let words: Vec<String> = (1..=25).map(|n| format!("w{n}")).collect();
        let record = enforce(
            &object(json!({"summary": words.join(" — ")})),
            &PlaceholderSet::default(),
        );
        assert_eq!(record.summary(), words.join(" "));
        assert_eq!(record.summary().split_whitespace().count(), MAX_SUMMARY_WORDS);
    }

    #[test]
    fn short_summary_is_kept_verbatim() {
        let record = enforce(
            &object(json!({"summary": "  It's a well-known trick.  "})),
            &PlaceholderSet::default(),
        );
        assert_eq!(record.summary(), "It's a well-known trick.");
    }

    #[test]
    fn non_string_summary_uses_json_text() {
        assert_eq!(summary_text(Some(&json!(42))), "42");
        assert_eq!(summary_text(Some(&json!(true))), "true");
        assert_eq!(summary_text(Some(&Value::Null)), "");
        assert_eq!(summary_text(None), "");
    }

    #[test]
    fn placeholder_predicate_matches_padding_and_markers() {
        let set = PlaceholderSet::default();
        assert!(set.looks_like_placeholder("T1"));
        assert!(set.looks_like_placeholder(" tag3 "));
        assert!(!set.looks_like_placeholder("t4"));
        assert!(!set.looks_like_placeholder("http1"));
        assert!(set.any_placeholder(&["rust", "t2"]));
        assert!(!set.any_placeholder(&["rust", "cli"]));
    }

    #[test]
    fn serializes_as_tags_and_summary() {
        let record = enforce(
            &object(json!({"tags": ["x", "y", "z"], "summary": "ok"})),
            &PlaceholderSet::default(),
        );
        assert_eq!(
            serde_json::to_value(&record).unwrap(),
            json!({"tags": ["x", "y", "z"], "summary": "ok"})
        );
    }
}
