pub mod accounts;
pub mod categorize;
pub mod check;
pub mod report;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::settings::{shellexpand_path, Settings};

#[derive(Parser)]
#[command(
    name = "tally",
    version,
    about = "Categorize and reconcile personal spending exports."
)]
pub struct Cli {
    /// Data directory holding raw/ and the history file (default: from settings)
    pub data_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Commands {
    /// Process raw exports, merge with history and categorize interactively.
    Categorize,
    /// Process raw exports and validate them against history without prompting.
    Check,
    /// Spending per category from the saved history.
    Report,
    /// List supported accounts and their expected columns.
    Accounts,
}

/// The positional argument wins over the configured directory.
pub fn resolve_data_dir(arg: Option<PathBuf>, settings: &Settings) -> PathBuf {
    arg.unwrap_or_else(|| shellexpand_path(&settings.data_dir))
}
