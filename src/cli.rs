//! CLI argument parsing for the tagging pipeline.
use clap::{ArgGroup, Parser, Subcommand};
use std::path::PathBuf;

/// Root CLI entrypoint.
#[derive(Parser, Debug)]
#[command(
    name = "ptag",
    version,
    about = "Tag and summarize a blog post with a Planner/Reviewer/Finalizer model pipeline",
    after_help = "Examples:\n  ptag run --title \"Async Rust\" --content \"Futures and executors...\"\n  ptag run --title \"Async Rust\" --content-file post.md --model llama3\n  ptag run --title \"Async Rust\" --content-file post.md --json",
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct RootArgs {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    Run(RunArgs),
}

/// Run command inputs for a single post.
#[derive(Parser, Debug)]
#[command(about = "Run the tagging pipeline over one post")]
#[command(group(
    ArgGroup::new("body")
        .required(true)
        .args(["content", "content_file"])
))]
pub struct RunArgs {
    /// Post title
    #[arg(long, value_name = "TEXT")]
    pub title: String,

    /// Post body, inline
    #[arg(long, value_name = "TEXT")]
    pub content: Option<String>,

    /// Path to a UTF-8 file containing the post body
    #[arg(long, value_name = "PATH")]
    pub content_file: Option<PathBuf>,

    /// Ollama model name
    #[arg(long, value_name = "NAME", env = "PTAG_MODEL")]
    pub model: Option<String>,

    /// Ollama server base URL
    #[arg(long, value_name = "URL", env = "PTAG_BASE_URL")]
    pub base_url: Option<String>,

    /// Author email copied into the publish package
    #[arg(long, value_name = "ADDR")]
    pub email: Option<String>,

    /// JSON config file (defaults to the user config dir when present)
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Sampling temperature
    #[arg(long, value_name = "FLOAT")]
    pub temperature: Option<f32>,

    /// Model context window in tokens
    #[arg(long, value_name = "TOKENS")]
    pub num_ctx: Option<u32>,

    /// Reachability probe attempts before giving up
    #[arg(long, value_name = "N")]
    pub health_retries: Option<u32>,

    /// Delay between reachability probe attempts
    #[arg(long, value_name = "MS")]
    pub health_delay_ms: Option<u64>,

    /// Print only the publish package as JSON
    #[arg(long)]
    pub json: bool,

    /// Emit debug logging on stderr
    #[arg(long)]
    pub verbose: bool,
}
