//! The `ptag run` command.
//!
//! Resolves config, probes the server once, runs the pipeline, and prints each
//! stage's raw reply followed by the publish package.
use crate::cli::RunArgs;
use crate::config::{resolve_config, validate_config, AppConfig};
use crate::util::{load_text, preview};
use crate::workflow::lm_client::OllamaClient;
use crate::workflow::{Pipeline, PostInput, PublishPackage};
use anyhow::{anyhow, Context, Result};

const CONTENT_PREVIEW_CHARS: usize = 100;

pub fn run_tagging(args: &RunArgs) -> Result<()> {
    let config = resolve_run_config(args)?;
    let post = PostInput {
        title: args.title.trim().to_string(),
        content: load_content(args)?,
    };

    if !args.json {
        println!("Topic: {}", post.title);
        if !post.content.is_empty() {
            println!("Content: {}", preview(&post.content, CONTENT_PREVIEW_CHARS));
        }
    }

    let client = OllamaClient::new(&config);
    if !client.wait_until_reachable(&config.health) {
        println!(
            "Cannot connect to Ollama at {}. Please ensure it's running.",
            config.base_url
        );
        return Ok(());
    }

    let pipeline = Pipeline::new(&client, &config.fallback);
    let run = pipeline.run(&post, |report| {
        if args.json {
            return;
        }
        println!("\n{}\n", report.stage.banner());
        println!("{}", report.raw);
        if let Some(reason) = &report.fallback_reason {
            println!("(fallback: {reason})");
        }
    });

    let package = PublishPackage::new(&post, args.email.as_deref(), &run);
    let text = serde_json::to_string_pretty(&package).context("serialize publish package")?;
    if !args.json {
        println!("\n=== Publish Package ===\n");
    }
    println!("{text}");
    Ok(())
}

/// Defaults, then config file, then environment/CLI overrides.
fn resolve_run_config(args: &RunArgs) -> Result<AppConfig> {
    let mut config = resolve_config(args.config.as_deref())?;
    if let Some(model) = &args.model {
        config.model = model.clone();
    }
    if let Some(base_url) = &args.base_url {
        config.base_url = base_url.clone();
    }
    if let Some(temperature) = args.temperature {
        config.temperature = temperature;
    }
    if let Some(num_ctx) = args.num_ctx {
        config.num_ctx = num_ctx;
    }
    if let Some(attempts) = args.health_retries {
        config.health.attempts = attempts;
    }
    if let Some(delay_ms) = args.health_delay_ms {
        config.health.delay_ms = delay_ms;
    }
    validate_config(&config).context("invalid configuration")?;
    tracing::debug!(model = %config.model, base_url = %config.base_url, "resolved config");
    Ok(config)
}

fn load_content(args: &RunArgs) -> Result<String> {
    match (&args.content, &args.content_file) {
        (Some(content), None) => Ok(content.trim().to_string()),
        (None, Some(path)) => Ok(load_text(path)?.trim().to_string()),
        _ => Err(anyhow!(
            "exactly one of --content or --content-file is required"
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::{Command, RootArgs};
    use clap::Parser;

    fn run_args(argv: &[&str]) -> RunArgs {
        let root = RootArgs::try_parse_from(argv).expect("parse args");
        match root.command {
            Command::Run(args) => args,
        }
    }

    #[test]
    fn cli_overrides_config_file() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let config_path = dir.path().join("config.json");
        std::fs::write(
            &config_path,
            r#"{"model": "from-file", "health": {"attempts": 9}}"#,
        )
        .expect("write config");

        let args = run_args(&[
            "ptag",
            "run",
            "--title",
            "T",
            "--content",
            "C",
            "--config",
            config_path.to_str().unwrap(),
            "--base-url",
            "http://example.invalid:1234",
            "--health-retries",
            "2",
        ]);
        let config = resolve_run_config(&args).expect("resolve config");
        assert_eq!(config.base_url, "http://example.invalid:1234");
        assert_eq!(config.health.attempts, 2);
        // PTAG_MODEL may be set in the environment running the tests.
        if std::env::var_os("PTAG_MODEL").is_none() {
            assert_eq!(config.model, "from-file");
        }
    }

    #[test]
    fn invalid_override_is_rejected() {
        let args = run_args(&[
            "ptag",
            "run",
            "--title",
            "T",
            "--content",
            "C",
            "--base-url",
            "localhost:11434",
        ]);
        let err = resolve_run_config(&args).expect_err("bad base url");
        assert!(format!("{err:#}").contains("base_url"));
    }

    #[test]
    fn content_file_is_read_and_trimmed() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let path = dir.path().join("post.txt");
        std::fs::write(&path, "\n  Body text.  \n").expect("write post");
        let args = run_args(&[
            "ptag",
            "run",
            "--title",
            "T",
            "--content-file",
            path.to_str().unwrap(),
        ]);
        assert_eq!(load_content(&args).unwrap(), "Body text.");
    }

    #[test]
    fn missing_content_file_is_an_error() {
        let args = run_args(&[
            "ptag",
            "run",
            "--title",
            "T",
            "--content-file",
            "/nonexistent/post-tagger/post.txt",
        ]);
        assert!(load_content(&args).is_err());
    }
}
