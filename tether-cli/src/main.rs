use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use std::path::PathBuf;
use std::time::Duration;
use tether_config::{ConfigLoader, TetherConfig};
use tether_worker::{shutdown_channel, Channel};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

mod cli;
mod commands;
mod logging;
mod workers;

use cli::{Cli, Commands};
use commands::RunOptions;
use logging::{init_logging, init_worker_tracing};

/// Load configuration from file if provided, otherwise from environment
fn load_config(config_path: Option<&PathBuf>) -> Result<TetherConfig> {
    let loader = ConfigLoader::new();

    match config_path {
        Some(path) => {
            info!("Loading configuration from: {:?}", path);
            loader
                .from_file(path)
                .with_context(|| format!("Failed to load configuration from {:?}", path))
        }
        None => {
            debug!("No configuration file specified. Loading from environment or defaults.");
            loader
                .from_env()
                .context("Failed to load configuration from environment")
        }
    }
}

/// Host one worker on stdin/stdout until it terminates; returns the exit code
async fn run_worker_process(worker_type: Option<String>, worker_id: Option<String>) -> i32 {
    let worker_id = worker_id.unwrap_or_else(|| Uuid::new_v4().to_string());
    let Some(worker_type) = worker_type else {
        error!("Worker {} started without --worker-type", worker_id);
        return 2;
    };
    info!("Starting worker process {} ({})", worker_id, worker_type);

    let (trigger, shutdown) = shutdown_channel();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupt received, finishing current operation");
            trigger.trigger();
        }
    });

    let host = workers::host();
    match host.run(&worker_type, Channel::stdio(), shutdown).await {
        Ok(()) => {
            info!("Worker {} shutting down", worker_id);
            0
        }
        Err(e) => {
            error!("Worker {} failed: {}", worker_id, e);
            1
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Handle worker mode first (before any logging setup to avoid conflicts)
    if cli.worker {
        init_worker_tracing(cli.log_level.as_ref())?;
        let code = run_worker_process(cli.worker_type, cli.worker_id).await;
        // Exit directly: the runtime would otherwise wait on the blocking stdin reader
        std::process::exit(code);
    }

    let config = load_config(cli.config.as_ref())?;
    init_logging(&config.logging, cli.log_level.as_ref())?;

    match cli.command {
        Some(Commands::Run {
            worker_type,
            args_json,
            kwargs_json,
            send,
            settle_ms,
        }) => {
            let options = RunOptions {
                worker_type,
                args_json,
                kwargs_json,
                send,
                settle: Duration::from_millis(settle_ms),
                log_level: cli.log_level,
            };
            commands::run_worker(&config, options).await
        }
        Some(Commands::Config { config_cmd }) => {
            commands::handle_config_command(&config, &config_cmd)
        }
        Some(Commands::Workers) => {
            for worker_type in workers::host().worker_types() {
                println!("{}", worker_type);
            }
            Ok(())
        }
        None => {
            warn!("No command given");
            Cli::command().print_help()?;
            Ok(())
        }
    }
}
