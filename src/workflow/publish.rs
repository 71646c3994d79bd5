//! Publish package printed at the end of a run.
use crate::schema::PublishRecord;
use crate::workflow::lm_response::StageSource;
use crate::workflow::{PipelineRun, PostInput, StageReport};
use serde::Serialize;

/// Envelope around the publish record with per-stage provenance.
#[derive(Debug, Clone, Serialize)]
pub struct PublishPackage {
    pub title: String,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thought: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub agents: Vec<AgentSummary>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub issues: Vec<String>,
    #[serde(rename = "final")]
    pub record: PublishRecord,
}

#[derive(Debug, Clone, Serialize)]
pub struct AgentSummary {
    pub role: String,
    pub summary: String,
    pub source: StageSource,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback_reason: Option<String>,
    pub elapsed_ms: u64,
}

impl PublishPackage {
    pub fn new(post: &PostInput, email: Option<&str>, run: &PipelineRun) -> Self {
        let mut issues: Vec<String> = Vec::new();
        for report in run.stages() {
            for issue in &report.output.issues {
                if !issues.contains(issue) {
                    issues.push(issue.clone());
                }
            }
        }
        Self {
            title: post.title.clone(),
            content: post.content.clone(),
            email: email
                .map(str::trim)
                .filter(|email| !email.is_empty())
                .map(str::to_string),
            thought: run.planner.output.thought.clone(),
            message: run.planner.output.message.clone(),
            agents: run.stages().into_iter().map(agent_summary).collect(),
            issues,
            record: run.record.clone(),
        }
    }
}

fn agent_summary(report: &StageReport) -> AgentSummary {
    AgentSummary {
        role: report.stage.to_string(),
        summary: report.output.first_summary().unwrap_or_default().to_string(),
        source: report.output.source,
        fallback_reason: report.fallback_reason.clone(),
        elapsed_ms: u64::try_from(report.elapsed.as_millis()).unwrap_or(u64::MAX),
    }
}
