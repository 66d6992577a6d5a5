//! CLI argument parsing definitions

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(long, value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,

    /// Set the log level (trace, debug, info, warn, error)
    #[arg(long, value_name = "LEVEL", global = true)]
    pub log_level: Option<String>,

    /// Run as worker process (internal use)
    #[arg(long, hide = true)]
    pub worker: bool,

    /// Worker type to host (used with --worker)
    #[arg(long, value_name = "TYPE", hide = true)]
    pub worker_type: Option<String>,

    /// Worker ID (used with --worker)
    #[arg(long, value_name = "ID", hide = true)]
    pub worker_id: Option<String>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start a worker, send it operations and print what it reports
    Run {
        /// Worker type to start; defaults to worker.worker_type from the configuration
        #[arg(value_name = "TYPE")]
        worker_type: Option<String>,

        /// Positional construction arguments (example: --args-json='[5]')
        #[arg(long, value_name = "JSON")]
        args_json: Option<String>,

        /// Keyword construction arguments (example: --kwargs-json='{"start":5}')
        #[arg(long, value_name = "JSON")]
        kwargs_json: Option<String>,

        /// Operation to send, optionally with keyword arguments
        /// (example: --send 'increment:{"by":2}')
        #[arg(long = "send", value_name = "OP[:JSON]")]
        send: Vec<String>,

        /// How long to collect worker messages after each operation
        #[arg(long, value_name = "MS", default_value_t = 200)]
        settle_ms: u64,
    },

    /// Configuration management commands
    Config {
        #[command(subcommand)]
        config_cmd: ConfigCommands,
    },

    /// List the worker types this executable can host
    Workers,
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Print the effective configuration
    Show,

    /// Validate the configuration and exit
    Validate,

    /// Print a sample configuration file
    Sample,
}
