//! Configuration domains

pub mod logging;
pub mod supervisor;
pub mod utils;
pub mod worker;

use crate::error::ConfigResult;
use crate::validation::Validatable;
use serde::{Deserialize, Serialize};

/// Root of the YAML configuration file. Every section is optional.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct TetherConfig {
    pub supervisor: supervisor::SupervisorConfig,
    pub worker: worker::WorkerConfig,
    pub logging: logging::LoggingConfig,
}

impl TetherConfig {
    pub fn validate_all(&self) -> ConfigResult<()> {
        self.supervisor.validate()?;
        self.worker.validate()?;
        self.logging.validate()
    }

    /// The default configuration rendered as YAML
    pub fn generate_sample() -> String {
        match serde_yaml::to_string(&TetherConfig::default()) {
            Ok(yaml) => yaml,
            Err(e) => format!("# sample unavailable: {}\n", e),
        }
    }
}
