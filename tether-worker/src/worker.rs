//! The trait implemented by every worker type

use serde_json::{json, Value as JsonValue};
use tether_ipc::{Arguments, ProtocolError};

use crate::context::WorkerContext;
use crate::error::OperationError;
use crate::operations::Operations;

/// A unit of work hosted in its own process.
///
/// The runtime constructs the worker from the `init` payload, asks it for its
/// operation table once, and then dispatches incoming messages through that
/// table. State is only reported when a handler calls
/// [`WorkerContext::report_state`].
pub trait Worker: Sized + Send + 'static {
    /// Worker type identifier used by the supervisor to select this worker
    const NAME: &'static str;

    /// Build the worker from its construction payload
    fn construct(payload: &Arguments) -> Result<Self, OperationError>;

    /// Register the operations this worker exposes
    fn operations(operations: &mut Operations<Self>) -> Result<(), ProtocolError>;

    /// State reported once construction succeeded. Must not be `null`, since
    /// the supervisor treats `null` as "no state reported yet".
    fn initial_state(&self) -> JsonValue {
        json!("ready")
    }

    /// Cleanup run when the worker is told to exit
    fn on_exit(&mut self, _ctx: &mut WorkerContext<'_>) {}
}
