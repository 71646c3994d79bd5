//! Planner → Reviewer → Finalizer tagging pipeline.
//!
//! Stages run strictly in order, one model call each. A stage whose reply is
//! unusable never re-prompts: it falls back to the previous stage's values
//! (or, for the Planner, to configured defaults) so a run always ends with a
//! publishable record.
pub(crate) mod lm_client;
pub(crate) mod lm_response;
mod prompts;
mod publish;
mod run;

use crate::config::FallbackConfig;
use crate::extract::extract_object;
use crate::schema::{enforce, PlaceholderSet, PublishRecord, TAG_COUNT};
use lm_client::{GenerationRequest, TextGenerator};
use lm_response::{StageOutput, StageSource};
use prompts::StagePrompt;
use std::time::{Duration, Instant};

pub use publish::PublishPackage;
pub use run::run_tagging;

/// Pipeline stages in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Planner,
    Reviewer,
    Finalizer,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Planner => write!(f, "Planner"),
            Self::Reviewer => write!(f, "Reviewer"),
            Self::Finalizer => write!(f, "Finalizer"),
        }
    }
}

impl Stage {
    /// Banner printed before a stage's raw output.
    pub fn banner(&self) -> String {
        format!("--- {self} ---")
    }
}

/// The blog post being annotated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostInput {
    pub title: String,
    pub content: String,
}

/// What one stage sent back and what the pipeline kept from it.
#[derive(Debug, Clone)]
pub struct StageReport {
    pub stage: Stage,
    /// Raw reply text; empty when the call itself failed.
    pub raw: String,
    pub output: StageOutput,
    /// Why the model's values were replaced or topped up, if they were.
    pub fallback_reason: Option<String>,
    pub elapsed: Duration,
}

/// Result of a full pipeline run.
#[derive(Debug, Clone)]
pub struct PipelineRun {
    pub planner: StageReport,
    pub reviewer: StageReport,
    pub finalizer: StageReport,
    pub record: PublishRecord,
}

impl PipelineRun {
    pub fn stages(&self) -> [&StageReport; 3] {
        [&self.planner, &self.reviewer, &self.finalizer]
    }
}

/// Sequences the three stages over a text generator.
pub struct Pipeline<'a, G: TextGenerator> {
    generator: &'a G,
    fallback: &'a FallbackConfig,
    placeholders: PlaceholderSet,
}

impl<'a, G: TextGenerator> Pipeline<'a, G> {
    pub fn new(generator: &'a G, fallback: &'a FallbackConfig) -> Self {
        Self {
            generator,
            fallback,
            placeholders: fallback.placeholders(),
        }
    }

    /// Run all stages, calling `on_stage` as each one completes.
    pub fn run(&self, post: &PostInput, mut on_stage: impl FnMut(&StageReport)) -> PipelineRun {
        let planner = self.run_stage(Stage::Planner, &prompts::planner_prompt(post), |output| {
            self.settle_planner(output)
        });
        on_stage(&planner);

        let reviewer = self.run_stage(
            Stage::Reviewer,
            &prompts::reviewer_prompt(post, &planner.output),
            |output| self.settle_reviewer(output, &planner.output),
        );
        on_stage(&reviewer);

        let finalizer = self.run_stage(
            Stage::Finalizer,
            &prompts::finalizer_prompt(post, &reviewer.output),
            |output| self.settle_finalizer(output, &reviewer.output),
        );
        on_stage(&finalizer);

        let record = enforce(&finalizer.output.to_publish_object(), &self.placeholders);
        tracing::info!(tags = ?record.tags(), summary = record.summary(), "publish record ready");

        PipelineRun {
            planner,
            reviewer,
            finalizer,
            record,
        }
    }

    fn run_stage(
        &self,
        stage: Stage,
        prompt: &StagePrompt,
        settle: impl FnOnce(StageOutput) -> (StageOutput, Option<String>),
    ) -> StageReport {
        tracing::info!(%stage, "stage start");
        let start = Instant::now();
        let request = GenerationRequest {
            system: &prompt.system,
            user: &prompt.user,
            json_only: true,
        };
        let raw = match self.generator.generate(&request) {
            Ok(raw) => raw,
            Err(err) => {
                tracing::warn!(%stage, error = %format!("{err:#}"), "model call failed");
                String::new()
            }
        };
        tracing::debug!(%stage, raw = %raw, "stage reply");

        let parsed = StageOutput::from_object(&extract_object(&raw));
        let (output, fallback_reason) = settle(parsed);
        if let Some(reason) = &fallback_reason {
            tracing::warn!(%stage, source = %output.source, reason = %reason, "stage fallback");
        }

        StageReport {
            stage,
            raw,
            output,
            fallback_reason,
            elapsed: start.elapsed(),
        }
    }

    /// Planner: drop placeholder tags, then fill any empty field from the
    /// configured defaults.
    fn settle_planner(&self, mut output: StageOutput) -> (StageOutput, Option<String>) {
        output
            .tags
            .retain(|tag| !self.placeholders.looks_like_placeholder(tag));

        let mut missing = Vec::new();
        if output.tags.is_empty() {
            output.tags = clean_defaults(&self.fallback.default_tags, true);
            missing.push("tags");
        }
        if output.summaries.is_empty() {
            output.summaries = clean_defaults(&self.fallback.default_summaries, false);
            missing.push("summaries");
        }
        if missing.is_empty() {
            return (output, None);
        }

        output.source = if missing.len() == 2 {
            StageSource::Defaults
        } else {
            StageSource::Merged
        };
        let reason = format!("no usable {} in reply; using defaults", missing.join(" or "));
        (output, Some(reason))
    }

    /// Reviewer: needs three real tags, otherwise reuse the Planner's first
    /// three tags and first summary.
    fn settle_reviewer(
        &self,
        mut output: StageOutput,
        planner: &StageOutput,
    ) -> (StageOutput, Option<String>) {
        let rejection = if output.tags.is_empty() && output.summaries.is_empty() {
            Some("empty reply")
        } else if output.tags.len() < TAG_COUNT {
            Some("fewer than three tags")
        } else if self.placeholders.any_placeholder(&output.tags) {
            Some("placeholder tags")
        } else {
            None
        };

        if let Some(rejection) = rejection {
            let fallback = StageOutput {
                tags: planner.tags.iter().take(TAG_COUNT).cloned().collect(),
                summaries: planner.summaries.iter().take(1).cloned().collect(),
                thought: output.thought,
                message: output.message,
                issues: output.issues,
                source: StageSource::PriorStage,
            };
            return (
                fallback,
                Some(format!("{rejection}; reusing Planner tags and summary")),
            );
        }

        output.tags.truncate(TAG_COUNT);
        if output.summaries.is_empty() {
            output.summaries = planner.summaries.iter().take(1).cloned().collect();
            output.source = StageSource::Merged;
            return (output, Some("missing summary; reusing Planner summary".into()));
        }
        output.summaries.truncate(1);
        (output, None)
    }

    /// Finalizer: placeholder or missing tags mean the Reviewer's choice is
    /// published directly; a short tag list is topped up from the Reviewer.
    fn settle_finalizer(
        &self,
        mut output: StageOutput,
        reviewer: &StageOutput,
    ) -> (StageOutput, Option<String>) {
        let rejection = if output.tags.is_empty() {
            Some("missing tags")
        } else if self.placeholders.any_placeholder(&output.tags) {
            Some("placeholder tags")
        } else {
            None
        };

        if let Some(rejection) = rejection {
            let fallback = StageOutput {
                tags: reviewer.tags.clone(),
                summaries: reviewer.summaries.clone(),
                thought: output.thought,
                message: output.message,
                issues: output.issues,
                source: StageSource::PriorStage,
            };
            return (
                fallback,
                Some(format!("{rejection}; publishing Reviewer choice")),
            );
        }

        let mut topped_up = Vec::new();
        for tag in &reviewer.tags {
            if output.tags.len() >= TAG_COUNT {
                break;
            }
            if !output.tags.contains(tag) {
                output.tags.push(tag.clone());
                topped_up.push("tags");
            }
        }
        output.tags.truncate(TAG_COUNT);
        if output.summaries.is_empty() {
            output.summaries = reviewer.summaries.iter().take(1).cloned().collect();
            topped_up.push("summary");
        }
        output.summaries.truncate(1);

        if topped_up.is_empty() {
            return (output, None);
        }
        topped_up.dedup();
        output.source = StageSource::Merged;
        let reason = format!("incomplete {}; filled from Reviewer", topped_up.join(" and "));
        (output, Some(reason))
    }
}

fn clean_defaults(values: &[String], lowercase: bool) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for value in values {
        let value = value.trim();
        let value = if lowercase {
            value.to_lowercase()
        } else {
            value.to_string()
        };
        if !value.is_empty() && !out.contains(&value) {
            out.push(value);
        }
    }
    out
}

#[cfg(test)]
#[path = "pipeline_tests.rs"]
mod tests;
