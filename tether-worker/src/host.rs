//! Worker-type table used by the worker process entry point

use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;

use tether_ipc::Channel;
use tracing::error;

use crate::error::RuntimeError;
use crate::runtime::{abort_initialization, serve};
use crate::shutdown::ShutdownSignal;
use crate::worker::Worker;

type ServeFuture = Pin<Box<dyn Future<Output = Result<(), RuntimeError>> + Send>>;
type EntryPoint = fn(Channel, ShutdownSignal) -> ServeFuture;

/// Maps worker type identifiers to their runtimes.
///
/// A worker executable registers every worker type it can host, then runs the
/// one the supervisor selected on its command line.
#[derive(Default)]
pub struct WorkerHost {
    entries: BTreeMap<&'static str, EntryPoint>,
}

impl WorkerHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `W` available under [`Worker::NAME`]
    pub fn register<W: Worker>(&mut self) -> &mut Self {
        self.entries.insert(W::NAME, entry_point::<W>);
        self
    }

    pub fn contains(&self, worker_type: &str) -> bool {
        self.entries.contains_key(worker_type)
    }

    /// Registered worker types, sorted
    pub fn worker_types(&self) -> Vec<&'static str> {
        self.entries.keys().copied().collect()
    }

    /// Serve `worker_type` on `channel` until it terminates
    pub async fn run(
        &self,
        worker_type: &str,
        mut channel: Channel,
        shutdown: ShutdownSignal,
    ) -> Result<(), RuntimeError> {
        match self.entries.get(worker_type) {
            Some(entry) => entry(channel, shutdown).await,
            None => {
                error!(
                    "Unknown worker type '{}'; available: {:?}",
                    worker_type,
                    self.worker_types()
                );
                let reason = format!("unknown worker type '{}'", worker_type);
                abort_initialization(&mut channel, worker_type, reason).await;
                Err(RuntimeError::UnknownWorkerType(worker_type.to_string()))
            }
        }
    }
}

fn entry_point<W: Worker>(channel: Channel, shutdown: ShutdownSignal) -> ServeFuture {
    Box::pin(serve::<W>(channel, shutdown))
}
