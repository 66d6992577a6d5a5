//! Subcommand implementations

use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use serde_json::{Map, Value as JsonValue};
use tether_config::{TetherConfig, WorkerConfig};
use tether_ipc::Arguments;
use tether_supervisor::{Supervisor, Update, WorkerCommand};
use tokio::time::Instant;
use tracing::{info, warn};

use crate::cli::ConfigCommands;

/// Options of the `run` subcommand
pub struct RunOptions {
    pub worker_type: Option<String>,
    pub args_json: Option<String>,
    pub kwargs_json: Option<String>,
    pub send: Vec<String>,
    pub settle: Duration,
    pub log_level: Option<String>,
}

/// Start a worker, send each operation in turn, print what comes back, then stop it
pub async fn run_worker(config: &TetherConfig, options: RunOptions) -> Result<()> {
    let worker_type = options
        .worker_type
        .as_deref()
        .or(config.worker.worker_type.as_deref())
        .context("No worker type given; pass TYPE or set worker.worker_type")?
        .to_string();

    let payload = build_payload(
        &config.worker,
        options.args_json.as_deref(),
        options.kwargs_json.as_deref(),
    )?;
    let operations = options
        .send
        .iter()
        .map(|spec| parse_operation(spec))
        .collect::<Result<Vec<_>>>()?;

    let mut command = WorkerCommand::from_config(&config.worker)?;
    if let Some(level) = options.log_level {
        command = command.arg("--log-level").arg(level);
    }
    let mut supervisor = Supervisor::new(command, config.supervisor.clone());

    supervisor
        .start(&worker_type, payload, true)
        .await
        .with_context(|| format!("Failed to start worker '{}'", worker_type))?;
    info!(
        "Worker '{}' running as {:?} (pid {:?})",
        worker_type,
        supervisor.worker_id(),
        supervisor.pid()
    );
    println!("state {}", supervisor.state());

    for (operation, arguments) in operations {
        supervisor
            .send(&operation, arguments)
            .with_context(|| format!("Failed to send '{}'", operation))?;
        settle(&mut supervisor, options.settle).await?;
    }

    supervisor.stop(true).await.context("Failed to stop worker")?;
    println!("final state {}", supervisor.state());
    Ok(())
}

/// Print every message the worker sends within `window`
async fn settle(supervisor: &mut Supervisor, window: Duration) -> Result<()> {
    let deadline = Instant::now() + window;
    let poll_interval = supervisor.config().poll_interval;

    while Instant::now() < deadline {
        match supervisor.update(poll_interval).await {
            Ok(Some(Update::State { state, .. })) => println!("state {}", state),
            Ok(Some(Update::Event {
                name, arguments, ..
            })) => println!("event {} {}", name, serde_json::to_string(&arguments)?),
            Ok(None) => {}
            Err(e) if e.is_worker_error() => {
                warn!("Worker reported an error: {}", e);
                println!("error {}", e);
            }
            Err(e) => return Err(e).context("Failed to read from worker"),
        }

        if !supervisor.is_alive() {
            break;
        }
    }
    Ok(())
}

/// Construction payload from configuration overlaid with command line JSON
pub fn build_payload(
    worker: &WorkerConfig,
    args_json: Option<&str>,
    kwargs_json: Option<&str>,
) -> Result<Arguments> {
    let mut payload = Arguments {
        args: worker.args.clone(),
        kwargs: worker.kwargs.clone(),
    };

    if let Some(json) = args_json {
        payload.args = match parse_json(json, "--args-json")? {
            JsonValue::Array(args) => args,
            other => bail!("--args-json must be a JSON array, got {}", other),
        };
    }

    if let Some(json) = kwargs_json {
        payload.kwargs.extend(parse_object(json, "--kwargs-json")?);
    }

    Ok(payload)
}

/// Parse `OP` or `OP:{"kw": value}`
pub fn parse_operation(spec: &str) -> Result<(String, Arguments)> {
    let (operation, kwargs) = match spec.split_once(':') {
        Some((operation, json)) => (operation, parse_object(json, operation)?),
        None => (spec, Map::new()),
    };

    if operation.is_empty() {
        return Err(anyhow!("Operation name missing in '{}'", spec));
    }

    Ok((
        operation.to_string(),
        Arguments {
            args: Vec::new(),
            kwargs,
        },
    ))
}

fn parse_json(json: &str, what: &str) -> Result<JsonValue> {
    serde_json::from_str(json).with_context(|| format!("Failed to parse JSON for {}", what))
}

fn parse_object(json: &str, what: &str) -> Result<Map<String, JsonValue>> {
    match parse_json(json, what)? {
        JsonValue::Object(map) => Ok(map),
        other => bail!("{} must be a JSON object, got {}", what, other),
    }
}

pub fn handle_config_command(config: &TetherConfig, command: &ConfigCommands) -> Result<()> {
    match command {
        ConfigCommands::Show => {
            let yaml = serde_yaml::to_string(config).context("Failed to serialize configuration")?;
            print!("{}", yaml);
        }
        ConfigCommands::Validate => {
            config.validate_all().context("Configuration is invalid")?;
            println!("Configuration is valid");
        }
        ConfigCommands::Sample => {
            print!("{}", TetherConfig::generate_sample());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_operation() {
        let (operation, arguments) = parse_operation("increment").unwrap();
        assert_eq!(operation, "increment");
        assert!(arguments.is_empty());

        let (operation, arguments) = parse_operation(r#"increment:{"by":2}"#).unwrap();
        assert_eq!(operation, "increment");
        assert_eq!(arguments.kwargs["by"], json!(2));

        assert!(parse_operation(":{}").is_err());
        assert!(parse_operation("increment:[2]").is_err());
        assert!(parse_operation("increment:{oops").is_err());
    }

    #[test]
    fn test_build_payload_overlays_config() {
        let mut worker = WorkerConfig::default();
        worker.args = vec![json!(1)];
        worker.kwargs.insert("start".to_string(), json!(5));
        worker.kwargs.insert("label".to_string(), json!("a"));

        let payload = build_payload(&worker, None, None).unwrap();
        assert_eq!(payload.args, vec![json!(1)]);
        assert_eq!(payload.kwargs["start"], json!(5));

        let payload = build_payload(&worker, Some("[2, 3]"), Some(r#"{"start": 7}"#)).unwrap();
        assert_eq!(payload.args, vec![json!(2), json!(3)]);
        assert_eq!(payload.kwargs["start"], json!(7));
        assert_eq!(payload.kwargs["label"], json!("a"));

        assert!(build_payload(&worker, Some(r#"{"a": 1}"#), None).is_err());
        assert!(build_payload(&worker, None, Some("[1]")).is_err());
    }
}
