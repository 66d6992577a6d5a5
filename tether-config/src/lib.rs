//! Domain-driven configuration management for Tether
//!
//! Configuration is split by functional domain (supervisor timing, worker
//! launch, logging), loaded from YAML with `TETHER_*` environment overrides
//! and validated per domain.

pub mod error;
pub mod loader;
pub mod validation;

// Domain-specific configuration modules
pub mod domains;

// Re-export main types
pub use error::{ConfigError, ConfigResult};
pub use loader::ConfigLoader;
pub use validation::Validatable;

// Re-export domain configurations
pub use domains::{
    logging::{LogFormat, LogLevel, LoggingConfig},
    supervisor::SupervisorConfig,
    worker::WorkerConfig,
    TetherConfig,
};

// Re-export utilities
pub use domains::utils::{serde_duration_ms, serde_duration_ms_option};
