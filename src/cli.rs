//! CLI interface for poly-updown
//!
//! Provides subcommands for:
//! - `run`: Start the trading loop
//! - `config`: Show the effective configuration

use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "poly-updown")]
#[command(about = "Lag-arbitrage bot for Polymarket up/down markets")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    pub config: String,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the trading loop
    Run(RunArgs),
    /// Show the effective configuration
    Config,
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Run a single cycle and exit
    #[arg(long)]
    pub once: bool,
}
