use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "oddsagent",
    about = "Odds tracking, AI match analysis and Telegram tips"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run one cycle: retry deliveries, fetch odds, analyze and deliver new matches
    Run,
    /// List tracked matches with their lifecycle status
    Status {
        /// Only show matches in this status (new, analyzed, delivered, abandoned, expired)
        #[arg(long)]
        status: Option<String>,
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Show the odds snapshot history of a match, oldest first
    History { match_id: String },
    /// Drop a match's recommendation so the next cycle analyzes it again
    Reset { match_id: String },
    /// Show recent cycle summaries
    Runs {
        #[arg(long, default_value = "10")]
        limit: usize,
    },
    /// Validate the strategy file and print its ranked priorities
    CheckConfig {
        /// Strategy file (defaults to ODDSAGENT_STRATEGY or config.json)
        #[arg(long)]
        path: Option<String>,
    },
}
