//! Ollama client for the tagging stages.
//!
//! Each stage sends one blocking `POST /api/chat` with a system instruction
//! and a user message and waits for the full reply. Before the pipeline starts
//! the client probes `GET /api/version` with a bounded retry so an absent
//! server aborts the run instead of failing three times.
//!
//! Replies are returned as raw text. The model is asked for JSON via the
//! `format` hint, but nothing here trusts that; extraction happens later.
use crate::config::{AppConfig, HealthConfig};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use ureq::Agent;

/// A single request to the text-generation collaborator.
#[derive(Debug, Clone, Copy)]
pub struct GenerationRequest<'a> {
    pub system: &'a str,
    pub user: &'a str,
    /// Ask the backend to constrain output to JSON.
    pub json_only: bool,
}

/// Text generation seam used by the pipeline.
pub trait TextGenerator {
    fn generate(&self, request: &GenerationRequest<'_>) -> Result<String>;
}

/// Blocking client for a local Ollama server.
pub struct OllamaClient {
    chat_agent: Agent,
    probe_agent: Agent,
    base_url: String,
    model: String,
    options: ChatOptions,
}

#[derive(Debug, Clone, Copy, Serialize)]
struct ChatOptions {
    temperature: f32,
    num_ctx: u32,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    format: Option<&'a str>,
    options: ChatOptions,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    #[serde(default)]
    content: String,
}

#[derive(Deserialize)]
struct VersionResponse {
    #[serde(default)]
    version: String,
}

impl OllamaClient {
    pub fn new(config: &AppConfig) -> Self {
        let chat_agent = Agent::new_with_config(
            Agent::config_builder()
                .timeout_global(Some(Duration::from_millis(config.request_timeout_ms)))
                .build(),
        );
        let probe_agent = Agent::new_with_config(
            Agent::config_builder()
                .timeout_global(Some(Duration::from_millis(config.health.timeout_ms)))
                .build(),
        );
        Self {
            chat_agent,
            probe_agent,
            base_url: config.base_url.trim().trim_end_matches('/').to_string(),
            model: config.model.clone(),
            options: ChatOptions {
                temperature: config.temperature,
                num_ctx: config.num_ctx,
            },
        }
    }

    /// Probe the server until it answers or the attempt budget runs out.
    ///
    /// Returns false when the server never became reachable.
    pub fn wait_until_reachable(&self, health: &HealthConfig) -> bool {
        let attempts = health.attempts.max(1);
        for attempt in 1..=attempts {
            match self.probe() {
                Ok(version) => {
                    tracing::info!(attempt, version = %version, "ollama reachable");
                    return true;
                }
                Err(err) => {
                    tracing::warn!(attempt, attempts, error = %err, "ollama not reachable");
                    if attempt < attempts {
                        std::thread::sleep(Duration::from_millis(health.delay_ms));
                    }
                }
            }
        }
        false
    }

    fn probe(&self) -> Result<String> {
        let url = format!("{}/api/version", self.base_url);
        let mut response = self
            .probe_agent
            .get(&url)
            .call()
            .with_context(|| format!("GET {url}"))?;
        // Any 2xx counts as reachable; the version is informational.
        let version = response
            .body_mut()
            .read_json::<VersionResponse>()
            .map(|body| body.version)
            .unwrap_or_default();
        Ok(version)
    }
}

impl TextGenerator for OllamaClient {
    fn generate(&self, request: &GenerationRequest<'_>) -> Result<String> {
        let url = format!("{}/api/chat", self.base_url);
        let body = ChatRequest {
            model: &self.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: request.system,
                },
                ChatMessage {
                    role: "user",
                    content: request.user,
                },
            ],
            stream: false,
            format: request.json_only.then_some("json"),
            options: self.options,
        };

        let start = Instant::now();
        let mut response = self
            .chat_agent
            .post(&url)
            .send_json(&body)
            .with_context(|| format!("POST {url}"))?;
        let reply: ChatResponse = response
            .body_mut()
            .read_json()
            .context("decode ollama chat response")?;
        let elapsed_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);

        tracing::info!(
            elapsed_ms,
            model = %self.model,
            prompt_bytes = request.system.len() + request.user.len(),
            response_bytes = reply.message.content.len(),
            "lm invoke complete"
        );

        Ok(reply.message.content)
    }
}
