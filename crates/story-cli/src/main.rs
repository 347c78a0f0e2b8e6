//! Story wizard CLI
//!
//! Terminal host for the story submission wizard.

mod args;
mod cli;
mod renderer;
mod session;

use std::time::Duration;

use anyhow::{Context, Result};
use args::{Args, Commands};
use clap::Parser;
use cli::Cli;
use log::info;
use renderer::TerminalRenderer;
use session::Session;
use story_core::{AutosaveDelays, WizardBuilder};
use tokio::io::BufReader;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let Args {
        database_file,
        no_color,
        autosave_ms,
        command,
    } = Args::parse();

    let defaults = AutosaveDelays::default();
    let commit = Duration::from_millis(autosave_ms);
    let delays = AutosaveDelays {
        indicator: defaults.indicator.min(commit),
        commit,
    };

    let mut builder = WizardBuilder::new().with_autosave_delays(delays);
    if let Some(path) = database_file {
        builder = builder.with_database_path(path);
    }
    let wizard = builder.build().await.context("Failed to initialize wizard")?;

    let renderer = TerminalRenderer::new(!no_color);

    info!("Story wizard started");

    match command {
        None | Some(Commands::Session) => {
            Session::new(wizard, renderer)
                .run(BufReader::new(tokio::io::stdin()))
                .await
        }
        Some(Commands::Draft { command }) => {
            Cli::new(wizard, renderer).handle_draft_command(command)
        }
        Some(Commands::Validate(args)) => Cli::new(wizard, renderer).validate(&args),
    }
}
