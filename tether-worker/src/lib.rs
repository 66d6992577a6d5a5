//! Worker runtime for Tether
//!
//! Runs inside the spawned process: receives the construction payload,
//! builds the worker and its operation registry, then serves operations
//! from the channel until told to exit.

pub mod context;
pub mod error;
pub mod host;
pub mod operations;
pub mod runtime;
pub mod shutdown;
pub mod worker;

pub use context::WorkerContext;
pub use error::{OperationError, RuntimeError};
pub use host::WorkerHost;
pub use operations::{Handler, Operations};
pub use runtime::{serve, WorkerRuntime};
pub use shutdown::{shutdown_channel, ShutdownSignal, ShutdownTrigger};
pub use worker::Worker;

// Re-export protocol types handlers work with
pub use tether_ipc::{Arguments, Channel, ProtocolError};
