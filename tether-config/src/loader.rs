//! Loading configuration from YAML and `<PREFIX>_*` environment variables

use crate::domains::logging::LoggingConfig;
use crate::domains::supervisor::SupervisorConfig;
use crate::domains::worker::WorkerConfig;
use crate::domains::TetherConfig;
use crate::error::{ConfigError, ConfigResult};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Loads [`TetherConfig`], applying environment overrides on top of the file
/// (or the defaults) and validating the result.
///
/// | Variable | Field |
/// |---|---|
/// | `TETHER_POLL_INTERVAL_MS` | `supervisor.poll_interval` |
/// | `TETHER_STARTUP_TIMEOUT_MS` | `supervisor.startup_timeout` (empty: no deadline) |
/// | `TETHER_SHUTDOWN_GRACE_MS` | `supervisor.shutdown_grace` (empty: no deadline) |
/// | `TETHER_WORKER_PROGRAM` | `worker.program` |
/// | `TETHER_WORKER_TYPE` | `worker.worker_type` |
/// | `TETHER_LOG_LEVEL` | `logging.level` |
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    prefix: String,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self::with_prefix("TETHER")
    }

    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    pub fn from_file(&self, path: impl AsRef<Path>) -> ConfigResult<TetherConfig> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        self.finish(serde_yaml::from_str(&content)?)
    }

    pub fn from_env(&self) -> ConfigResult<TetherConfig> {
        self.finish(TetherConfig::default())
    }

    /// `from_file` when a path is given, `from_env` otherwise
    pub fn load(&self, config_path: Option<impl AsRef<Path>>) -> ConfigResult<TetherConfig> {
        match config_path {
            Some(path) => self.from_file(path),
            None => self.from_env(),
        }
    }

    fn finish(&self, mut config: TetherConfig) -> ConfigResult<TetherConfig> {
        self.override_supervisor(&mut config.supervisor)?;
        self.override_worker(&mut config.worker);
        self.override_logging(&mut config.logging)?;
        config.validate_all()?;
        Ok(config)
    }

    fn override_supervisor(&self, config: &mut SupervisorConfig) -> ConfigResult<()> {
        if let Some(value) = self.var("POLL_INTERVAL_MS") {
            config.poll_interval = self.millis("POLL_INTERVAL_MS", &value)?;
        }
        if let Some(value) = self.var("STARTUP_TIMEOUT_MS") {
            config.startup_timeout = self.optional_millis("STARTUP_TIMEOUT_MS", &value)?;
        }
        if let Some(value) = self.var("SHUTDOWN_GRACE_MS") {
            config.shutdown_grace = self.optional_millis("SHUTDOWN_GRACE_MS", &value)?;
        }
        Ok(())
    }

    fn override_worker(&self, config: &mut WorkerConfig) {
        if let Some(program) = self.var("WORKER_PROGRAM") {
            config.program = Some(PathBuf::from(program));
        }
        if let Some(worker_type) = self.var("WORKER_TYPE") {
            config.worker_type = Some(worker_type);
        }
    }

    fn override_logging(&self, config: &mut LoggingConfig) -> ConfigResult<()> {
        if let Some(level) = self.var("LOG_LEVEL") {
            config.level = level
                .parse()
                .map_err(|reason| self.env_error("LOG_LEVEL", reason))?;
        }
        Ok(())
    }

    fn var(&self, name: &str) -> Option<String> {
        std::env::var(self.var_name(name)).ok()
    }

    fn var_name(&self, name: &str) -> String {
        format!("{}_{}", self.prefix, name)
    }

    fn env_error(&self, name: &str, reason: impl Into<String>) -> ConfigError {
        ConfigError::Env {
            var: self.var_name(name),
            reason: reason.into(),
        }
    }

    fn millis(&self, name: &str, value: &str) -> ConfigResult<Duration> {
        value
            .trim()
            .parse::<u64>()
            .map(Duration::from_millis)
            .map_err(|e| {
                self.env_error(name, format!("'{}' is not a millisecond count: {}", value, e))
            })
    }

    fn optional_millis(&self, name: &str, value: &str) -> ConfigResult<Option<Duration>> {
        if value.trim().is_empty() {
            return Ok(None);
        }
        self.millis(name, value).map(Some)
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}
