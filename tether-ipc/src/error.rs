//! IPC error types

use thiserror::Error;

/// IPC error types
#[derive(Debug, Error)]
pub enum IpcError {
    /// Serialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Deserialization error
    #[error("Deserialization error: {0}")]
    DeserializationError(String),

    /// IO error
    #[error("IO error: {0}")]
    IoError(String),

    /// Connection closed
    #[error("Connection closed")]
    ConnectionClosed,

    /// Protocol version mismatch
    #[error("Protocol version mismatch: expected {expected}, got {actual}")]
    ProtocolVersionMismatch { expected: u32, actual: u32 },

    /// Invalid message format
    #[error("Invalid message format: {0}")]
    InvalidMessage(String),
}

impl IpcError {
    /// Check if this error only affects a single frame, leaving the channel usable
    pub fn is_frame_error(&self) -> bool {
        matches!(
            self,
            IpcError::DeserializationError(_)
                | IpcError::InvalidMessage(_)
                | IpcError::ProtocolVersionMismatch { .. }
        )
    }

    /// Check if this error indicates the channel can no longer be used
    pub fn is_fatal(&self) -> bool {
        matches!(self, IpcError::ConnectionClosed | IpcError::IoError(_))
    }
}

impl From<std::io::Error> for IpcError {
    fn from(err: std::io::Error) -> Self {
        IpcError::IoError(err.to_string())
    }
}

impl From<serde_json::Error> for IpcError {
    fn from(err: serde_json::Error) -> Self {
        if err.is_io() {
            IpcError::IoError(err.to_string())
        } else if err.is_data() || err.is_syntax() || err.is_eof() {
            IpcError::DeserializationError(err.to_string())
        } else {
            IpcError::SerializationError(err.to_string())
        }
    }
}

/// Violations of the operation naming rules
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    /// Operation names must not be empty
    #[error("Operation name cannot be empty")]
    EmptyOperation,

    /// Reserved names cannot be used for application operations or events
    #[error("Operation name '{0}' is reserved")]
    ReservedOperation(String),

    /// The same operation was registered twice
    #[error("Operation '{0}' is already registered")]
    DuplicateOperation(String),

    /// A reserved message arrived on the side that never receives it
    #[error("Reserved operation '{0}' is not valid in this direction")]
    UnexpectedOperation(String),
}

/// Failure to extract a typed parameter from message arguments
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ArgumentError {
    /// Required parameter is absent both positionally and by keyword
    #[error("Missing argument '{name}' (position {index})")]
    Missing { name: String, index: usize },

    /// Parameter is present but does not deserialize into the requested type
    #[error("Invalid argument '{name}': {error}")]
    Invalid { name: String, error: String },
}
