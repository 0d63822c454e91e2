//! CLI for popfeed.

mod commands;

use anyhow::Result;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use popfeed_core::config;

use commands::{run_config, run_daemon, run_status};

/// Top-level CLI for popfeed.
#[derive(Debug, Parser)]
#[command(name = "popfeed")]
#[command(about = "popfeed: track the most popular recent posts for one language", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Fetch, score, and persist popular posts until interrupted (Ctrl-C).
    Run {
        /// Language to track, overriding `language_key` from the config file.
        #[arg(long, value_name = "CODE")]
        language: Option<String>,
        /// Maximum number of posts kept, overriding `capacity`.
        #[arg(long, value_name = "N")]
        capacity: Option<usize>,
    },

    /// Show the persisted posts for a day (default: today, UTC), highest score first.
    Status {
        /// Day to show, as YYYY-MM-DD.
        #[arg(long, value_name = "DATE")]
        date: Option<NaiveDate>,
        /// Also list how many posts are stored per day.
        #[arg(long)]
        days: bool,
    },

    /// Print the config file path and the resolved configuration.
    Config,
}

impl CliCommand {
    pub async fn run_from_args() -> Result<()> {
        let cli = Cli::parse();
        let mut cfg = config::load_or_init()?;
        tracing::debug!(language = %cfg.language_key, capacity = cfg.capacity, "loaded config");

        match cli.command {
            CliCommand::Run { language, capacity } => {
                if let Some(language) = language {
                    cfg.language_key = language;
                }
                if let Some(capacity) = capacity {
                    cfg.capacity = capacity;
                }
                run_daemon(&cfg).await?;
            }
            CliCommand::Status { date, days } => run_status(date, days).await?,
            CliCommand::Config => run_config(&cfg)?,
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests;
