//! Command-line argument definitions using clap.

use std::path::PathBuf;

use clap::{Args as ClapArgs, Parser, Subcommand};

/// Terminal host for the story submission wizard
///
/// Collects a story over five validated steps, autosaving a draft as you go.
/// Without a subcommand an interactive session is started on stdin.
#[derive(Parser)]
#[command(version, about, name = "story")]
pub struct Args {
    /// Path to the SQLite draft database. Defaults to
    /// $XDG_DATA_HOME/story-wizard/drafts.db
    #[arg(long, global = true)]
    pub database_file: Option<PathBuf>,

    /// Disable colored output and use plain text
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Quiet period in milliseconds before an edit is written to the draft
    #[arg(long, global = true, default_value_t = 2000)]
    pub autosave_ms: u64,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available commands
#[derive(Subcommand)]
pub enum Commands {
    /// Fill in the wizard interactively (default)
    #[command(alias = "s")]
    Session,
    /// Inspect or remove the stored draft
    #[command(alias = "d")]
    Draft {
        #[command(subcommand)]
        command: DraftCommands,
    },
    /// Validate the stored draft
    Validate(ValidateArgs),
}

/// Draft maintenance commands
#[derive(Subcommand)]
pub enum DraftCommands {
    /// Show the stored draft
    Show,
    /// Delete the stored draft
    Clear,
}

/// Validate the stored draft, either one step or the full record
#[derive(ClapArgs)]
pub struct ValidateArgs {
    /// Only validate this step (1-5)
    #[arg(long, value_parser = clap::value_parser!(u8).range(1..=5))]
    pub step: Option<u8>,
}
