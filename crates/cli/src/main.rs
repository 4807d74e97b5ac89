//! vitalsctl - command-line client for the vitals agent
//!
//! Queries a running `vitals-agent` for the current health status, recent
//! tick history and component health.

mod client;
mod commands;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{health, records, status};

/// Default number of records listed
const DEFAULT_LIMIT: usize = 10;

/// Vitals host health monitor CLI
#[derive(Parser, Debug)]
#[command(name = "vitalsctl")]
#[command(author, version, about = "CLI for the vitals host health monitor", long_about = None)]
pub struct Cli {
    /// Agent URL (can also be set via VITALS_API_URL env var)
    #[arg(long, env = "VITALS_API_URL", default_value = "http://localhost:8080")]
    pub api_url: String,

    /// Output format
    #[arg(long, short, value_enum, default_value = "table")]
    pub format: output::OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug, PartialEq)]
pub enum Commands {
    /// Show the current health score, tier and readings
    Status,

    /// List recent tick results, newest first
    Records {
        /// Maximum number of records to show
        #[arg(long, short, default_value_t = DEFAULT_LIMIT)]
        limit: usize,
    },

    /// Read back ticks from the agent's persistent log, newest first
    Log {
        /// Maximum number of records to show
        #[arg(long, short, default_value_t = DEFAULT_LIMIT)]
        limit: usize,
    },

    /// Show agent component health and readiness
    Health,

    /// Force the agent to sample immediately
    Tick,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let client = client::ApiClient::new(&cli.api_url)?;

    match cli.command {
        Commands::Status => status::show_status(&client, cli.format).await?,
        Commands::Records { limit } => records::show_records(&client, limit, cli.format).await?,
        Commands::Log { limit } => records::show_log(&client, limit, cli.format).await?,
        Commands::Health => health::show_health(&client, cli.format).await?,
        Commands::Tick => status::run_tick(&client, cli.format).await?,
    }

    Ok(())
}
