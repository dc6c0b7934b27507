use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Competition leaderboard tracker
#[derive(Parser, Debug)]
#[command(name = "rankwatch")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Run the scheduler and HTTP API (default)
    Serve,

    /// Refresh once, print the leaderboard and exit
    Once {
        /// Also write the ranking as CSV to this path
        #[arg(long)]
        csv: Option<PathBuf>,
    },
}

impl Cli {
    /// The requested subcommand; no subcommand means `serve`.
    pub fn selected(self) -> Command {
        self.command.unwrap_or(Command::Serve)
    }
}
