//! Inter-process communication for Tether
//!
//! This crate provides the message protocol and the duplex channel used for
//! communication between a supervisor and the worker process it spawned.

pub mod channel;
pub mod error;
pub mod protocol;
pub mod transport;

// Re-export commonly used types
pub use channel::Channel;
pub use error::{ArgumentError, IpcError, ProtocolError};
pub use protocol::{
    validate_application_name, Arguments, Message, MessageEnvelope, MessageKind, WorkerError,
    ERROR_OPERATION, EXIT_OPERATION, INIT_OPERATION, IPC_PROTOCOL_VERSION, RESERVED_OPERATIONS,
    STATE_OPERATION, TERMINATED_STATE,
};
pub use transport::{FrameReader, FrameWriter};
