use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

mod cli;
mod config;
mod extract;
mod schema;
mod templates;
mod util;
mod workflow;

use cli::{Command, RootArgs};

fn main() -> Result<()> {
    let args = RootArgs::parse();
    install_interrupt_handler()?;

    match args.command {
        Command::Run(run_args) => {
            init_tracing(run_args.verbose);
            workflow::run_tagging(&run_args)
        }
    }
}

/// Logs go to stderr so stdout carries only the pipeline transcript.
fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Exit with status 1 on Ctrl-C instead of the default signal status.
fn install_interrupt_handler() -> Result<()> {
    ctrlc::set_handler(|| {
        eprintln!("\nInterrupted.");
        std::process::exit(1);
    })
    .context("install Ctrl-C handler")
}
