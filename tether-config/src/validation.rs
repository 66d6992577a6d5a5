//! Per-domain validation

use crate::error::{ConfigError, ConfigResult};
use std::time::Duration;

/// Implemented by every configuration domain; checked after loading
pub trait Validatable {
    fn validate(&self) -> ConfigResult<()>;

    /// Domain name used in error messages
    fn domain_name(&self) -> &'static str;

    fn validation_error(&self, message: impl Into<String>) -> ConfigError {
        ConfigError::Invalid {
            domain: self.domain_name(),
            message: message.into(),
        }
    }
}

/// Reject empty or whitespace-only names
pub fn validate_required_string(
    value: &str,
    field: &str,
    domain: &'static str,
) -> ConfigResult<()> {
    if value.trim().is_empty() {
        return Err(ConfigError::Invalid {
            domain,
            message: format!("{} cannot be empty", field),
        });
    }
    Ok(())
}

/// Reject zero durations; a zero poll interval or deadline would spin or fire immediately
pub fn validate_positive_duration(
    value: Duration,
    field: &str,
    domain: &'static str,
) -> ConfigResult<()> {
    if value.is_zero() {
        return Err(ConfigError::Invalid {
            domain,
            message: format!("{} must be at least 1ms", field),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_required_string() {
        assert!(validate_required_string("counter", "worker_type", "worker").is_ok());
        assert!(validate_required_string("  ", "worker_type", "worker").is_err());
    }

    #[test]
    fn test_positive_duration() {
        let one = Duration::from_millis(1);
        assert!(validate_positive_duration(one, "poll_interval", "supervisor").is_ok());

        let err =
            validate_positive_duration(Duration::ZERO, "poll_interval", "supervisor").unwrap_err();
        assert_eq!(err.origin(), "supervisor");
        assert!(err.to_string().contains("poll_interval"));
    }
}
