//! Command-line interface definition.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(version, about = "Hourly electricity market data for US balancing authorities", long_about = None)]
pub struct Cli {
    /// Path to a TOML configuration file.
    #[arg(short, long, env = "GRIDPULSE_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Serve the JSON API
    Serve {
        /// Overrides `server.bind_address`
        #[arg(short, long)]
        bind: Option<String>,
    },
    /// Print the dashboard panels for one balancing authority
    Report {
        /// Respondent code, e.g. CISO
        #[arg(short, long, default_value = "CISO")]
        region: String,

        /// Rows of each table to print
        #[arg(long, default_value_t = 24)]
        rows: usize,
    },
    /// List the configured balancing authorities
    Regions,
}

impl Cli {
    pub fn import() -> Result<Self, clap::Error> {
        Self::try_parse()
    }
}
