//! IPC protocol definitions and message types

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use std::fmt;

use crate::error::{ArgumentError, IpcError, ProtocolError};

/// IPC protocol version for compatibility checking
pub const IPC_PROTOCOL_VERSION: u32 = 1;

/// Supervisor to worker: construction payload, always the first message
pub const INIT_OPERATION: &str = "init";

/// Supervisor to worker: terminate after the current operation
pub const EXIT_OPERATION: &str = "exit";

/// Worker to supervisor: authoritative state report
pub const STATE_OPERATION: &str = "state";

/// Worker to supervisor: error signal
pub const ERROR_OPERATION: &str = "error";

/// Names that may never be used for application operations or events
pub const RESERVED_OPERATIONS: [&str; 4] = [
    INIT_OPERATION,
    EXIT_OPERATION,
    STATE_OPERATION,
    ERROR_OPERATION,
];

/// Final state reported by a worker right before its process exits
pub const TERMINATED_STATE: &str = "exit";

/// Check that `operation` may be used as an application operation or event name
pub fn validate_application_name(operation: &str) -> Result<(), ProtocolError> {
    if operation.is_empty() {
        return Err(ProtocolError::EmptyOperation);
    }
    if RESERVED_OPERATIONS.contains(&operation) {
        return Err(ProtocolError::ReservedOperation(operation.to_string()));
    }
    Ok(())
}

/// What a message means, decided from its operation name alone
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    Init,
    Exit,
    State,
    Error,
    /// Worker operation (supervisor to worker) or event (worker to supervisor)
    Application,
}

impl MessageKind {
    /// Classify an operation name
    pub fn classify(operation: &str) -> Self {
        match operation {
            INIT_OPERATION => MessageKind::Init,
            EXIT_OPERATION => MessageKind::Exit,
            STATE_OPERATION => MessageKind::State,
            ERROR_OPERATION => MessageKind::Error,
            _ => MessageKind::Application,
        }
    }

    /// Whether this kind uses one of the reserved names
    pub fn is_reserved(self) -> bool {
        self != MessageKind::Application
    }
}

/// Positional and keyword arguments carried by a message
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Arguments {
    #[serde(default)]
    pub args: Vec<JsonValue>,
    #[serde(default)]
    pub kwargs: Map<String, JsonValue>,
}

impl Arguments {
    /// Create empty arguments
    pub fn new() -> Self {
        Self::default()
    }

    /// Create arguments from positional values only
    pub fn positional(args: Vec<JsonValue>) -> Self {
        Self {
            args,
            kwargs: Map::new(),
        }
    }

    /// Append a positional argument
    pub fn arg(mut self, value: impl Into<JsonValue>) -> Self {
        self.args.push(value.into());
        self
    }

    /// Set a keyword argument
    pub fn kwarg(mut self, name: impl Into<String>, value: impl Into<JsonValue>) -> Self {
        self.kwargs.insert(name.into(), value.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.args.is_empty() && self.kwargs.is_empty()
    }

    /// Look up a parameter by keyword `name`, falling back to position `index`
    pub fn get<T: DeserializeOwned>(
        &self,
        index: usize,
        name: &str,
    ) -> Result<Option<T>, ArgumentError> {
        let value = match self.kwargs.get(name).or_else(|| self.args.get(index)) {
            Some(value) => value,
            None => return Ok(None),
        };

        serde_json::from_value(value.clone())
            .map(Some)
            .map_err(|e| ArgumentError::Invalid {
                name: name.to_string(),
                error: e.to_string(),
            })
    }

    /// Like [`Arguments::get`], but absence is an error
    pub fn required<T: DeserializeOwned>(
        &self,
        index: usize,
        name: &str,
    ) -> Result<T, ArgumentError> {
        self.get(index, name)?.ok_or_else(|| ArgumentError::Missing {
            name: name.to_string(),
            index,
        })
    }

    /// Like [`Arguments::get`], substituting `default` when absent
    pub fn get_or<T: DeserializeOwned>(
        &self,
        index: usize,
        name: &str,
        default: T,
    ) -> Result<T, ArgumentError> {
        Ok(self.get(index, name)?.unwrap_or(default))
    }
}

/// A single control message: `(operation, args, kwargs)`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub operation: String,
    #[serde(flatten)]
    pub arguments: Arguments,
}

impl Message {
    /// Create a message for an arbitrary operation
    pub fn new(operation: impl Into<String>, arguments: Arguments) -> Self {
        Self {
            operation: operation.into(),
            arguments,
        }
    }

    /// Construction payload sent right after spawn
    pub fn init(payload: Arguments) -> Self {
        Self::new(INIT_OPERATION, payload)
    }

    /// Termination instruction
    pub fn exit() -> Self {
        Self::new(EXIT_OPERATION, Arguments::new())
    }

    /// State report carrying `state` as its only positional argument
    pub fn state(state: JsonValue) -> Self {
        Self::new(STATE_OPERATION, Arguments::positional(vec![state]))
    }

    /// Final state report
    pub fn terminated() -> Self {
        Self::state(JsonValue::String(TERMINATED_STATE.to_string()))
    }

    /// Error signal carrying `error` as its only positional argument
    pub fn error(error: &WorkerError) -> Result<Self, IpcError> {
        let value = serde_json::to_value(error)?;
        Ok(Self::new(ERROR_OPERATION, Arguments::positional(vec![value])))
    }

    pub fn kind(&self) -> MessageKind {
        MessageKind::classify(&self.operation)
    }

    /// Extract the reported value of a state report
    pub fn into_state(self) -> Result<JsonValue, IpcError> {
        self.arguments.args.into_iter().next().ok_or_else(|| {
            IpcError::InvalidMessage("state report carries no value".to_string())
        })
    }

    /// Extract the error payload of an error signal
    pub fn into_error(self) -> Result<WorkerError, IpcError> {
        let value = self.arguments.args.into_iter().next().ok_or_else(|| {
            IpcError::InvalidMessage("error signal carries no payload".to_string())
        })?;
        Ok(serde_json::from_value(value)?)
    }
}

/// Worker error types, transported back to the supervisor as error signals
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "error_type", rename_all = "snake_case")]
pub enum WorkerError {
    /// Worker construction failed; the process exits afterwards
    InitializationFailed { worker_type: String, error: String },

    /// The requested operation is not registered by the worker
    UnknownOperation { operation: String },

    /// A registered operation returned an error or panicked
    OperationFailed {
        operation: String,
        error: String,
        details: Option<JsonValue>,
    },

    /// A reserved operation arrived where it is not accepted
    UnexpectedOperation { operation: String },

    /// An inbound frame could not be decoded
    MessageParseError { error: String },
}

impl WorkerError {
    /// Returns a short stable label (snake_case) for use in logs
    pub fn as_label(&self) -> &'static str {
        match self {
            WorkerError::InitializationFailed { .. } => "initialization_failed",
            WorkerError::UnknownOperation { .. } => "unknown_operation",
            WorkerError::OperationFailed { .. } => "operation_failed",
            WorkerError::UnexpectedOperation { .. } => "unexpected_operation",
            WorkerError::MessageParseError { .. } => "message_parse_error",
        }
    }
}

impl fmt::Display for WorkerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkerError::InitializationFailed { worker_type, error } => {
                write!(f, "Worker '{}' initialization failed: {}", worker_type, error)
            }
            WorkerError::UnknownOperation { operation } => {
                write!(f, "Unknown operation: {}", operation)
            }
            WorkerError::OperationFailed {
                operation, error, ..
            } => {
                write!(f, "Operation '{}' failed: {}", operation, error)
            }
            WorkerError::UnexpectedOperation { operation } => {
                write!(f, "Unexpected reserved operation: {}", operation)
            }
            WorkerError::MessageParseError { error } => {
                write!(f, "Message parse error: {}", error)
            }
        }
    }
}

impl std::error::Error for WorkerError {}

/// Message envelope for all IPC communications
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageEnvelope {
    pub protocol_version: u32,
    pub timestamp: DateTime<Utc>,
    pub message: Message,
}

impl MessageEnvelope {
    /// Create a new message envelope
    pub fn new(message: Message) -> Self {
        Self {
            protocol_version: IPC_PROTOCOL_VERSION,
            timestamp: Utc::now(),
            message,
        }
    }

    /// Check if protocol version is compatible
    pub fn is_compatible(&self) -> bool {
        self.protocol_version == IPC_PROTOCOL_VERSION
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_classify_reserved_names() {
        assert_eq!(MessageKind::classify("init"), MessageKind::Init);
        assert_eq!(MessageKind::classify("exit"), MessageKind::Exit);
        assert_eq!(MessageKind::classify("state"), MessageKind::State);
        assert_eq!(MessageKind::classify("error"), MessageKind::Error);
        assert_eq!(MessageKind::classify("increment"), MessageKind::Application);
        assert!(!MessageKind::Application.is_reserved());
        assert!(MessageKind::Exit.is_reserved());
    }

    #[test]
    fn test_validate_application_name() {
        assert!(validate_application_name("increment").is_ok());
        assert_eq!(
            validate_application_name("state"),
            Err(ProtocolError::ReservedOperation("state".to_string()))
        );
        assert_eq!(validate_application_name(""), Err(ProtocolError::EmptyOperation));
    }

    #[test]
    fn test_arguments_keyword_then_position() {
        let args = Arguments::new().arg(7).kwarg("by", 5);

        assert_eq!(args.get::<i64>(0, "by").unwrap(), Some(5));
        assert_eq!(args.get::<i64>(0, "seconds").unwrap(), Some(7));
        assert_eq!(args.get::<i64>(1, "missing").unwrap(), None);
        assert_eq!(args.get_or::<i64>(1, "missing", 1).unwrap(), 1);
        assert!(matches!(
            args.required::<i64>(3, "total"),
            Err(ArgumentError::Missing { index: 3, .. })
        ));
        assert!(matches!(
            Arguments::new().kwarg("by", "five").get::<i64>(0, "by"),
            Err(ArgumentError::Invalid { .. })
        ));
    }

    #[test]
    fn test_message_wire_shape() {
        let message = Message::new("echo", Arguments::new().arg(1).arg(2).kwarg("x", 3));
        let value = serde_json::to_value(&message).unwrap();

        assert_eq!(
            value,
            json!({"operation": "echo", "args": [1, 2], "kwargs": {"x": 3}})
        );

        // args and kwargs may be omitted on the wire
        let bare: Message = serde_json::from_value(json!({"operation": "exit"})).unwrap();
        assert_eq!(bare, Message::exit());
    }

    #[test]
    fn test_state_and_error_payloads() {
        let state = Message::state(json!(5));
        assert_eq!(state.kind(), MessageKind::State);
        assert_eq!(state.into_state().unwrap(), json!(5));

        let empty = Message::new(STATE_OPERATION, Arguments::new());
        assert!(matches!(empty.into_state(), Err(IpcError::InvalidMessage(_))));

        let error = WorkerError::OperationFailed {
            operation: "divide".to_string(),
            error: "division by zero".to_string(),
            details: Some(json!({"divisor": 0})),
        };
        let signal = Message::error(&error).unwrap();
        assert_eq!(signal.kind(), MessageKind::Error);
        assert_eq!(
            signal.arguments.args[0]["error_type"],
            json!("operation_failed")
        );
        assert_eq!(signal.into_error().unwrap(), error);
    }

    #[test]
    fn test_terminated_state() {
        let message = Message::terminated();
        assert_eq!(message.into_state().unwrap(), json!(TERMINATED_STATE));
    }

    #[test]
    fn test_worker_error_display() {
        let error = WorkerError::UnknownOperation {
            operation: "fly".to_string(),
        };
        assert_eq!(error.to_string(), "Unknown operation: fly");
        assert_eq!(error.as_label(), "unknown_operation");
    }

    #[test]
    fn test_message_envelope() {
        let envelope = MessageEnvelope::new(Message::exit());
        assert_eq!(envelope.protocol_version, IPC_PROTOCOL_VERSION);
        assert!(envelope.is_compatible());

        let json = serde_json::to_string(&envelope).unwrap();
        let deserialized: MessageEnvelope = serde_json::from_str(&json).unwrap();
        assert_eq!(deserialized.message, Message::exit());
    }
}
