//! Supervisor timing configuration

use crate::error::ConfigResult;
use crate::validation::{validate_positive_duration, Validatable};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Supervisor timing configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SupervisorConfig {
    /// Timeout of each `update` step inside the blocking start/stop waits
    #[serde(with = "crate::domains::utils::serde_duration_ms", default = "default_poll_interval")]
    pub poll_interval: Duration,

    /// Deadline for the worker's first state report; `None` waits forever
    #[serde(
        with = "crate::domains::utils::serde_duration_ms_option",
        default = "default_startup_timeout"
    )]
    pub startup_timeout: Option<Duration>,

    /// Time a stopping worker gets before it is killed; `None` waits forever
    #[serde(
        with = "crate::domains::utils::serde_duration_ms_option",
        default = "default_shutdown_grace"
    )]
    pub shutdown_grace: Option<Duration>,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            poll_interval: default_poll_interval(),
            startup_timeout: default_startup_timeout(),
            shutdown_grace: default_shutdown_grace(),
        }
    }
}

impl Validatable for SupervisorConfig {
    fn validate(&self) -> ConfigResult<()> {
        validate_positive_duration(self.poll_interval, "poll_interval", self.domain_name())?;

        if let Some(timeout) = self.startup_timeout {
            validate_positive_duration(timeout, "startup_timeout", self.domain_name())?;
        }

        if let Some(grace) = self.shutdown_grace {
            validate_positive_duration(grace, "shutdown_grace", self.domain_name())?;
        }

        Ok(())
    }

    fn domain_name(&self) -> &'static str {
        "supervisor"
    }
}

fn default_poll_interval() -> Duration {
    Duration::from_millis(1)
}

fn default_startup_timeout() -> Option<Duration> {
    Some(Duration::from_secs(30))
}

fn default_shutdown_grace() -> Option<Duration> {
    Some(Duration::from_secs(5))
}
