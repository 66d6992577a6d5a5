//! Configuration errors

use std::path::PathBuf;
use thiserror::Error;

pub type ConfigResult<T> = Result<T, ConfigError>;

#[derive(Error, Debug)]
pub enum ConfigError {
    /// The configuration file could not be read
    #[error("Cannot read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The file is not valid YAML for [`crate::TetherConfig`]
    #[error("Invalid configuration file: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// An override variable holds an unusable value
    #[error("Invalid value in {var}: {reason}")]
    Env { var: String, reason: String },

    /// A value parsed but violates a domain rule
    #[error("Invalid {domain} configuration: {message}")]
    Invalid {
        domain: &'static str,
        message: String,
    },
}

impl ConfigError {
    /// Name of the domain or variable the error is about
    pub fn origin(&self) -> &str {
        match self {
            ConfigError::Read { .. } | ConfigError::Yaml(_) => "file",
            ConfigError::Env { var, .. } => var,
            ConfigError::Invalid { domain, .. } => domain,
        }
    }
}
