use clap::{Parser, Subcommand};

/// Command line interface definition
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Application command to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file path
    #[arg(long, short)]
    pub config_path: Option<String>,

    /// Log file path override
    #[arg(long, short)]
    pub log_path: Option<String>,

    /// Disable terminal logging
    #[arg(long, short)]
    pub term_log_off: bool,

    /// Solver tick interval override in milliseconds
    #[arg(long)]
    pub tick_interval_ms: Option<u64>,
}

/// Available application commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run solver loop against simulated market and exchange
    Run {
        /// Stop after this many ticks, otherwise run until Ctrl-C
        #[arg(long)]
        ticks: Option<u64>,
    },
    /// Print current price of the configured index
    Price {},
}
