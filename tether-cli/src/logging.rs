//! Tracing setup. Everything goes to stderr; stdout belongs to the worker channel.

use anyhow::Result;
use tether_config::{LogFormat, LoggingConfig};
use tracing::debug;
use tracing_subscriber::EnvFilter;

/// Level precedence: `--log-level`, then `RUST_LOG`, then `logging.level`
fn env_filter(config_level: &str, log_level: Option<&String>) -> EnvFilter {
    match log_level {
        Some(level) => EnvFilter::try_new(level).unwrap_or_else(|_| {
            eprintln!("Invalid log level '{}', falling back to '{}'", level, config_level);
            EnvFilter::new(config_level)
        }),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(config_level)),
    }
}

/// Initialize tracing for the supervising CLI from configuration
pub fn init_logging(config: &LoggingConfig, log_level: Option<&String>) -> Result<()> {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter(&config.level.to_string(), log_level))
        .with_writer(std::io::stderr)
        .with_ansi(config.ansi);

    let result = match config.format {
        LogFormat::Full => builder.try_init(),
        LogFormat::Compact => builder.compact().try_init(),
    };

    if result.is_err() {
        debug!("Global tracing subscriber already initialized, skipping");
    }
    Ok(())
}

/// Initialize tracing inside a worker process
pub fn init_worker_tracing(log_level: Option<&String>) -> Result<()> {
    // Worker processes output to stderr to avoid conflicts with IPC on stdout
    tracing_subscriber::fmt()
        .with_env_filter(env_filter("info", log_level))
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize worker tracing: {}", e))?;

    debug!("Worker tracing initialized");
    Ok(())
}
