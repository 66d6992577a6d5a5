//! Explicit operation registry, built once per worker instance

use std::collections::HashMap;

use tether_ipc::{validate_application_name, Arguments, ProtocolError};

use crate::context::WorkerContext;
use crate::error::OperationError;

/// A registered operation handler
pub type Handler<W> = Box<
    dyn Fn(&mut W, &mut WorkerContext<'_>, &Arguments) -> Result<(), OperationError> + Send + Sync,
>;

/// Mapping from operation name to handler
pub struct Operations<W> {
    handlers: HashMap<String, Handler<W>>,
}

impl<W> Operations<W> {
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Register `handler` under `name`.
    ///
    /// Reserved protocol names and duplicates are rejected here, so a worker
    /// with a bad table never reaches its receive loop.
    pub fn register<F>(&mut self, name: &str, handler: F) -> Result<&mut Self, ProtocolError>
    where
        F: Fn(&mut W, &mut WorkerContext<'_>, &Arguments) -> Result<(), OperationError>
            + Send
            + Sync
            + 'static,
    {
        validate_application_name(name)?;
        if self.handlers.contains_key(name) {
            return Err(ProtocolError::DuplicateOperation(name.to_string()));
        }

        self.handlers.insert(name.to_string(), Box::new(handler));
        Ok(self)
    }

    pub fn get(&self, name: &str) -> Option<&Handler<W>> {
        self.handlers.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    /// Registered operation names, sorted
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl<W> Default for Operations<W> {
    fn default() -> Self {
        Self::new()
    }
}
