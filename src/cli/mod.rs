//! Command-line interface.

pub mod commands;
pub mod output;

use std::path::PathBuf;

use clap::{ArgAction, Parser};

pub use commands::Commands;
pub use output::OutputMode;

#[derive(Parser, Debug)]
#[command(name = "packs", version, about = "Install skills, agents and hooks from pack repositories")]
pub struct Cli {
    /// Machine-readable JSON output on stdout
    #[arg(long, global = true)]
    pub robot: bool,

    /// Increase log verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Disable logging
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Use this config file instead of the global and project files
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Workspace root (defaults to the current directory)
    #[arg(long, global = true, env = "PACKS_WORKSPACE", value_name = "DIR")]
    pub workspace: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    #[must_use]
    pub const fn output_mode(&self) -> OutputMode {
        if self.robot {
            OutputMode::Robot
        } else {
            OutputMode::Human
        }
    }
}
