//! Prompt assembly for the three stages.
use crate::schema::{MAX_SUMMARY_WORDS, TAG_COUNT};
use crate::templates;
use crate::workflow::lm_response::StageOutput;
use crate::workflow::PostInput;
use serde_json::{json, Value};

const PLANNER_CANDIDATE_TAGS: usize = 5;
const PLANNER_CANDIDATE_SUMMARIES: usize = 2;

/// System + user text for one stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagePrompt {
    pub system: String,
    pub user: String,
}

pub fn planner_prompt(post: &PostInput) -> StagePrompt {
    let candidate_tags = PLANNER_CANDIDATE_TAGS.to_string();
    let candidate_summaries = PLANNER_CANDIDATE_SUMMARIES.to_string();
    let max_words = MAX_SUMMARY_WORDS.to_string();
    StagePrompt {
        system: fill(
            templates::PLANNER_SYSTEM_MD,
            &[
                ("candidate_tags", &candidate_tags),
                ("candidate_summaries", &candidate_summaries),
                ("max_words", &max_words),
            ],
        ),
        user: fill(
            templates::POST_USER_MD,
            &[("title", &post.title), ("content", &post.content)],
        ),
    }
}

pub fn reviewer_prompt(post: &PostInput, planner: &StageOutput) -> StagePrompt {
    let planner_json = pretty(json!({
        "thought": planner.thought,
        "message": planner.message,
        "data": {
            "tags": planner.tags,
            "summaries": planner.summaries,
        },
        "issues": planner.issues,
    }));
    StagePrompt {
        system: fill(templates::REVIEWER_SYSTEM_MD, &stage_limits()),
        user: fill(
            templates::REVIEWER_USER_MD,
            &[
                ("title", &post.title),
                ("content", &post.content),
                ("planner_json", &planner_json),
            ],
        ),
    }
}

pub fn finalizer_prompt(post: &PostInput, reviewer: &StageOutput) -> StagePrompt {
    let reviewer_json = pretty(Value::Object(reviewer.to_publish_object()));
    StagePrompt {
        system: fill(templates::FINALIZER_SYSTEM_MD, &stage_limits()),
        user: fill(
            templates::FINALIZER_USER_MD,
            &[("title", &post.title), ("reviewer_json", &reviewer_json)],
        ),
    }
}

fn stage_limits() -> [(&'static str, String); 2] {
    [
        ("tag_count", TAG_COUNT.to_string()),
        ("max_words", MAX_SUMMARY_WORDS.to_string()),
    ]
}

fn pretty(value: Value) -> String {
    serde_json::to_string_pretty(&value).unwrap_or_else(|_| value.to_string())
}

/// Substitute `{key}` markers in a single pass so values that themselves
/// contain `{...}` text are never expanded.
fn fill<V: AsRef<str>>(template: &str, values: &[(&str, V)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let tail = &rest[open..];
        let matched = values.iter().find_map(|(key, value)| {
            let marker_len = key.len() + 2;
            let is_marker = tail.len() >= marker_len
                && tail[1..].starts_with(key)
                && tail[1 + key.len()..].starts_with('}');
            is_marker.then_some((marker_len, value.as_ref()))
        });
        match matched {
            Some((marker_len, value)) => {
                out.push_str(value);
                rest = &tail[marker_len..];
            }
            None => {
                out.push('{');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    out
}
