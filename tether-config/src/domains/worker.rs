//! Worker launch configuration

use crate::error::ConfigResult;
use crate::validation::{validate_required_string, Validatable};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use std::path::PathBuf;

/// How the worker process is launched and what it is constructed with
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Worker executable; the running executable when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub program: Option<PathBuf>,

    /// Arguments placed before the worker-mode flags
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub program_args: Vec<String>,

    /// Worker type to start when none is given on the command line
    #[serde(skip_serializing_if = "Option::is_none")]
    pub worker_type: Option<String>,

    /// Positional construction arguments
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<JsonValue>,

    /// Keyword construction arguments
    #[serde(skip_serializing_if = "Map::is_empty")]
    pub kwargs: Map<String, JsonValue>,
}

impl Validatable for WorkerConfig {
    fn validate(&self) -> ConfigResult<()> {
        if let Some(ref program) = self.program {
            if program.as_os_str().is_empty() {
                return Err(self.validation_error("program cannot be empty"));
            }
        }

        if let Some(ref worker_type) = self.worker_type {
            validate_required_string(worker_type, "worker_type", self.domain_name())?;
        }

        Ok(())
    }

    fn domain_name(&self) -> &'static str {
        "worker"
    }
}
