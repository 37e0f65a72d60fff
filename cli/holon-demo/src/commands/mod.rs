//! CLI commands.

mod scenario;
mod stress;

use anyhow::Result;
use clap::{Parser, Subcommand};
use holon_object::RuntimeConfig;

/// holon - actor-backed records with virtual attributes.
#[derive(Debug, Parser)]
#[command(name = "holon")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Emit logs as JSON.
    #[arg(long, global = true, env = "HOLON_LOG_JSON")]
    pub log_json: bool,

    /// Inbox capacity per object (overrides HOLON_MAILBOX_SIZE).
    #[arg(long, global = true)]
    mailbox_size: Option<usize>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Walk through get/set/merge on a person object.
    Scenario(scenario::ScenarioCommand),

    /// Apply concurrent updates to several counters and verify the totals.
    Stress(stress::StressCommand),
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        let mut config = RuntimeConfig::from_env();
        if let Some(size) = self.mailbox_size {
            config = config.with_mailbox_size(size);
        }

        match self.command {
            Commands::Scenario(cmd) => cmd.run(config).await,
            Commands::Stress(cmd) => cmd.run(config).await,
        }
    }
}
