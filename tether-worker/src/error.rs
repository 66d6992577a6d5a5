//! Error types for the worker runtime

use serde_json::Value as JsonValue;
use thiserror::Error;

use tether_ipc::{ArgumentError, IpcError, ProtocolError, WorkerError};

/// Failure of a worker operation or constructor.
///
/// Sent back to the supervisor inside an error signal; `details` travels
/// unchanged for the supervisor to inspect.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{message}")]
pub struct OperationError {
    pub message: String,
    pub details: Option<JsonValue>,
}

impl OperationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            details: None,
        }
    }

    /// Attach structured details
    pub fn with_details(mut self, details: JsonValue) -> Self {
        self.details = Some(details);
        self
    }
}

impl From<ArgumentError> for OperationError {
    fn from(err: ArgumentError) -> Self {
        OperationError::new(err.to_string())
    }
}

impl From<IpcError> for OperationError {
    fn from(err: IpcError) -> Self {
        OperationError::new(err.to_string())
    }
}

impl From<ProtocolError> for OperationError {
    fn from(err: ProtocolError) -> Self {
        OperationError::new(err.to_string())
    }
}

/// Errors that end the worker runtime
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// Channel failure
    #[error("IPC error: {0}")]
    Ipc(#[from] IpcError),

    /// Worker construction failed; already reported to the supervisor
    #[error("{0}")]
    Initialization(WorkerError),

    /// No worker registered under the requested type
    #[error("Unknown worker type: {0}")]
    UnknownWorkerType(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_operation_error_details() {
        let err = OperationError::new("division by zero").with_details(json!({"divisor": 0}));
        assert_eq!(err.to_string(), "division by zero");
        assert_eq!(err.details, Some(json!({"divisor": 0})));
    }

    #[test]
    fn test_argument_error_conversion() {
        let err: OperationError = ArgumentError::Missing {
            name: "by".to_string(),
            index: 0,
        }
        .into();
        assert!(err.message.contains("'by'"));
        assert!(err.details.is_none());
    }
}
