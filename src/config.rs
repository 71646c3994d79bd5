//! Run configuration.
//!
//! Everything the pipeline would otherwise hardcode (endpoint, model options,
//! health probe budget, fallback literals) lives here so it can be injected at
//! startup and overridden from a JSON file, the environment, or CLI flags.
use crate::schema::PlaceholderSet;
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_MODEL: &str = "phi3:3.8b";
pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:11434";

const CONFIG_DIR_NAME: &str = "post-tagger";
const CONFIG_FILE_NAME: &str = "config.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    pub model: String,
    pub base_url: String,
    pub temperature: f32,
    pub num_ctx: u32,
    /// Per-request timeout for chat calls.
    pub request_timeout_ms: u64,
    pub health: HealthConfig,
    pub fallback: FallbackConfig,
}

/// Bounded retry budget for the one-time reachability probe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HealthConfig {
    pub attempts: u32,
    pub delay_ms: u64,
    pub timeout_ms: u64,
}

/// Literals used when the model's output cannot be used.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FallbackConfig {
    /// Planner tags of last resort.
    pub default_tags: Vec<String>,
    /// Planner summaries of last resort.
    pub default_summaries: Vec<String>,
    /// Padding literals; also detected as placeholders.
    pub placeholder_tags: Vec<String>,
    /// Extra literals detected as placeholders but never emitted.
    pub placeholder_markers: Vec<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            temperature: 0.2,
            num_ctx: 2048,
            request_timeout_ms: 120_000,
            health: HealthConfig::default(),
            fallback: FallbackConfig::default(),
        }
    }
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            attempts: 5,
            delay_ms: 1000,
            timeout_ms: 3000,
        }
    }
}

impl Default for FallbackConfig {
    fn default() -> Self {
        Self {
            default_tags: ["blogging", "writing", "ideas"].map(String::from).to_vec(),
            default_summaries: vec![
                "A blog post sharing the author's ideas and experience on its topic.".to_string(),
            ],
            placeholder_tags: ["tag1", "tag2", "tag3"].map(String::from).to_vec(),
            placeholder_markers: ["t1", "t2", "t3"].map(String::from).to_vec(),
        }
    }
}

impl FallbackConfig {
    pub fn placeholders(&self) -> PlaceholderSet {
        PlaceholderSet::new(
            self.placeholder_tags.clone(),
            self.placeholder_markers.clone(),
        )
    }
}

/// `$XDG_CONFIG_HOME/post-tagger/config.json` (or the platform equivalent).
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
}

/// Load a JSON config file. Missing keys take their defaults.
pub fn load_config(path: &Path) -> Result<AppConfig> {
    let bytes = fs::read(path).with_context(|| format!("read config {}", path.display()))?;
    let config: AppConfig = serde_json::from_slice(&bytes)
        .with_context(|| format!("parse config JSON {}", path.display()))?;
    Ok(config)
}

/// Resolve the base config: an explicit path must exist; the default path is
/// used only when present.
pub fn resolve_config(explicit: Option<&Path>) -> Result<AppConfig> {
    if let Some(path) = explicit {
        return load_config(path);
    }
    match default_config_path() {
        Some(path) if path.is_file() => {
            tracing::debug!(path = %path.display(), "loading default config");
            load_config(&path)
        }
        _ => Ok(AppConfig::default()),
    }
}

pub fn validate_config(config: &AppConfig) -> Result<()> {
    if config.model.trim().is_empty() {
        return Err(anyhow!("model must be non-empty"));
    }
    let base_url = config.base_url.trim();
    if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
        return Err(anyhow!(
            "base_url must start with http:// or https:// (got {base_url:?})"
        ));
    }
    if !(0.0..=2.0).contains(&config.temperature) {
        return Err(anyhow!(
            "temperature must be within 0.0..=2.0 (got {})",
            config.temperature
        ));
    }
    if config.num_ctx == 0 {
        return Err(anyhow!("num_ctx must be positive"));
    }
    if config.health.attempts == 0 {
        return Err(anyhow!("health.attempts must be at least 1"));
    }
    let fallback = &config.fallback;
    if fallback.default_tags.iter().all(|tag| tag.trim().is_empty()) {
        return Err(anyhow!("fallback.default_tags must contain a non-empty tag"));
    }
    if fallback
        .default_summaries
        .iter()
        .all(|summary| summary.trim().is_empty())
    {
        return Err(anyhow!(
            "fallback.default_summaries must contain a non-empty summary"
        ));
    }
    let placeholders = fallback.placeholders();
    if let Some(tag) = fallback
        .default_tags
        .iter()
        .find(|tag| placeholders.looks_like_placeholder(tag))
    {
        return Err(anyhow!(
            "fallback.default_tags must not contain placeholder literal {tag:?}"
        ));
    }
    Ok(())
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
