//! Handle given to operations for talking back to the supervisor

use serde_json::Value as JsonValue;
use tether_ipc::{validate_application_name, Arguments, Channel, Message};

use crate::error::OperationError;

/// Outbound side of the channel as seen from inside an operation
pub struct WorkerContext<'a> {
    channel: &'a Channel,
    worker_type: &'a str,
    state_reports: usize,
}

impl<'a> WorkerContext<'a> {
    pub(crate) fn new(channel: &'a Channel, worker_type: &'a str) -> Self {
        Self {
            channel,
            worker_type,
            state_reports: 0,
        }
    }

    /// Replace the supervisor's cached state with `state`
    pub fn report_state(&mut self, state: impl Into<JsonValue>) -> Result<(), OperationError> {
        self.channel.send(Message::state(state.into()))?;
        self.state_reports += 1;
        Ok(())
    }

    /// Emit a named event to the supervisor's subscribers
    pub fn emit(&mut self, event: &str, arguments: Arguments) -> Result<(), OperationError> {
        validate_application_name(event)?;
        self.channel.send(Message::new(event, arguments))?;
        Ok(())
    }

    pub fn worker_type(&self) -> &str {
        self.worker_type
    }

    /// Number of state reports sent through this context
    pub fn state_reports(&self) -> usize {
        self.state_reports
    }
}
