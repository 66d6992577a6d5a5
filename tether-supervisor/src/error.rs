//! Error types for the supervisor

use std::time::Duration;
use thiserror::Error;

use tether_ipc::{IpcError, ProtocolError, WorkerError};

use crate::callbacks::SubscriptionId;

/// Supervisor errors
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum SupervisorError {
    /// Worker failed before reporting its first state
    #[error("Worker '{worker_type}' failed to start: {reason}")]
    StartupFailure { worker_type: String, reason: String },

    /// Worker did not report its first state before the deadline
    #[error("Worker '{worker_type}' did not report state within {timeout:?}")]
    StartupTimeout {
        worker_type: String,
        timeout: Duration,
    },

    /// Operation name rejected before transmission
    #[error("Invalid operation '{operation}': {reason}")]
    InvalidOperation { operation: String, reason: String },

    /// `detach` with an id that is not registered
    #[error("Unknown subscription: {0}")]
    UnknownSubscription(SubscriptionId),

    /// No worker process is attached
    #[error("No worker process is running")]
    NotRunning,

    /// Worker process could not be spawned or reaped
    #[error("Failed to spawn or reap worker process: {0}")]
    Spawn(String),

    /// Error signal reported by the worker
    #[error("Worker error: {0}")]
    Worker(WorkerError),

    /// Channel failure
    #[error("IPC error: {0}")]
    Ipc(#[from] IpcError),

    /// Protocol rule violated
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),
}

impl SupervisorError {
    /// Returns a short stable label (snake_case) for use in logs
    pub fn as_label(&self) -> &'static str {
        match self {
            SupervisorError::StartupFailure { .. } => "startup_failure",
            SupervisorError::StartupTimeout { .. } => "startup_timeout",
            SupervisorError::InvalidOperation { .. } => "invalid_operation",
            SupervisorError::UnknownSubscription(_) => "unknown_subscription",
            SupervisorError::NotRunning => "not_running",
            SupervisorError::Spawn(_) => "spawn",
            SupervisorError::Worker(_) => "worker",
            SupervisorError::Ipc(_) => "ipc",
            SupervisorError::Protocol(_) => "protocol",
        }
    }

    /// Whether this error is an error signal sent by the worker
    pub fn is_worker_error(&self) -> bool {
        matches!(self, SupervisorError::Worker(_))
    }

    /// The worker's error signal, if this is one
    pub fn worker_error(&self) -> Option<&WorkerError> {
        match self {
            SupervisorError::Worker(error) => Some(error),
            _ => None,
        }
    }
}

impl From<std::io::Error> for SupervisorError {
    fn from(err: std::io::Error) -> Self {
        SupervisorError::Spawn(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_labels_and_worker_errors() {
        let err = SupervisorError::Worker(WorkerError::UnknownOperation {
            operation: "fly".to_string(),
        });
        assert_eq!(err.as_label(), "worker");
        assert!(err.is_worker_error());
        assert!(matches!(
            err.worker_error(),
            Some(WorkerError::UnknownOperation { .. })
        ));

        let err = SupervisorError::UnknownSubscription(SubscriptionId::from(7));
        assert_eq!(err.to_string(), "Unknown subscription: #7");
        assert!(!err.is_worker_error());
    }
}
