//! Worker receive loop
//!
//! ```text
//! initializing ──► ready ◄──► executing
//!                    │
//!                    ▼ (exit / shutdown / channel closed)
//!               terminating ──► terminated
//! ```

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use tether_ipc::{Channel, IpcError, Message, MessageKind, WorkerError, INIT_OPERATION};
use tracing::{debug, error, info, warn};

use crate::context::WorkerContext;
use crate::error::{OperationError, RuntimeError};
use crate::operations::Operations;
use crate::shutdown::ShutdownSignal;
use crate::worker::Worker;

enum Flow {
    Continue,
    Exit,
}

/// Initialize a `W` from the channel and serve it until it exits
pub async fn serve<W: Worker>(
    channel: Channel,
    shutdown: ShutdownSignal,
) -> Result<(), RuntimeError> {
    WorkerRuntime::<W>::initialize(channel, shutdown)
        .await?
        .run()
        .await
}

/// A constructed worker bound to its channel
pub struct WorkerRuntime<W: Worker> {
    worker_type: String,
    worker: W,
    operations: Operations<W>,
    channel: Channel,
    shutdown: ShutdownSignal,
}

impl<W: Worker> WorkerRuntime<W> {
    /// Receive the construction payload, build the worker and report its
    /// initial state. Failures are reported as an error signal before
    /// returning.
    pub async fn initialize(
        mut channel: Channel,
        mut shutdown: ShutdownSignal,
    ) -> Result<Self, RuntimeError> {
        let worker_type = W::NAME.to_string();
        debug!("Worker '{}' waiting for construction payload", worker_type);

        let first = tokio::select! {
            biased;
            _ = shutdown.triggered() => {
                let reason = "shutdown requested during initialization".to_string();
                return Err(abort_initialization(&mut channel, &worker_type, reason).await);
            }
            first = channel.recv() => first,
        };

        let payload = match first {
            Ok(message) if message.kind() == MessageKind::Init => message.arguments,
            Ok(message) => {
                let reason = format!(
                    "expected '{}' as first message, got '{}'",
                    INIT_OPERATION, message.operation
                );
                return Err(abort_initialization(&mut channel, &worker_type, reason).await);
            }
            Err(e) => {
                return Err(abort_initialization(&mut channel, &worker_type, e.to_string()).await);
            }
        };

        let constructed = panic::catch_unwind(AssertUnwindSafe(|| W::construct(&payload)));
        let worker = match constructed {
            Ok(Ok(worker)) => worker,
            Ok(Err(e)) => {
                return Err(abort_initialization(&mut channel, &worker_type, e.message).await);
            }
            Err(payload) => {
                let reason = format!("constructor panicked: {}", panic_message(payload.as_ref()));
                return Err(abort_initialization(&mut channel, &worker_type, reason).await);
            }
        };

        let mut operations = Operations::new();
        if let Err(e) = W::operations(&mut operations) {
            return Err(abort_initialization(&mut channel, &worker_type, e.to_string()).await);
        }

        let initial_state = worker.initial_state();
        if initial_state.is_null() {
            warn!(
                "Worker '{}' reported a null initial state; supervisor will keep waiting",
                worker_type
            );
        }
        channel.send(Message::state(initial_state))?;

        info!(
            "Worker '{}' ready with operations {:?}",
            worker_type,
            operations.names()
        );

        Ok(Self {
            worker_type,
            worker,
            operations,
            channel,
            shutdown,
        })
    }

    /// Serve operations until `exit`, shutdown or the supervisor going away
    pub async fn run(mut self) -> Result<(), RuntimeError> {
        loop {
            let received = tokio::select! {
                biased;
                _ = self.shutdown.triggered() => {
                    info!("Worker '{}' shutdown requested", self.worker_type);
                    break;
                }
                received = self.channel.recv() => received,
            };

            match received {
                Ok(message) => {
                    if let Flow::Exit = self.handle_message(message)? {
                        info!("Worker '{}' received exit", self.worker_type);
                        break;
                    }
                }
                Err(IpcError::ConnectionClosed) => {
                    info!("Worker '{}' channel closed by supervisor", self.worker_type);
                    break;
                }
                Err(e) if e.is_frame_error() => {
                    self.signal(WorkerError::MessageParseError {
                        error: e.to_string(),
                    })?;
                }
                Err(e) => {
                    error!("Worker '{}' failed to receive: {}", self.worker_type, e);
                    return Err(e.into());
                }
            }
        }

        self.terminate().await;
        Ok(())
    }

    fn handle_message(&mut self, message: Message) -> Result<Flow, RuntimeError> {
        match message.kind() {
            MessageKind::Exit => Ok(Flow::Exit),
            MessageKind::Application => {
                self.dispatch(message)?;
                Ok(Flow::Continue)
            }
            MessageKind::Init | MessageKind::State | MessageKind::Error => {
                self.signal(WorkerError::UnexpectedOperation {
                    operation: message.operation,
                })?;
                Ok(Flow::Continue)
            }
        }
    }

    fn dispatch(&mut self, message: Message) -> Result<(), RuntimeError> {
        let Message {
            operation,
            arguments,
        } = message;

        let Some(handler) = self.operations.get(&operation) else {
            return self.signal(WorkerError::UnknownOperation { operation });
        };

        debug!("Worker '{}' executing '{}'", self.worker_type, operation);

        let mut ctx = WorkerContext::new(&self.channel, &self.worker_type);
        let worker = &mut self.worker;
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            handler(worker, &mut ctx, &arguments)
        }));
        let state_reports = ctx.state_reports();

        let failure = match outcome {
            Ok(Ok(())) => {
                debug!(
                    "Worker '{}' finished '{}' ({} state reports)",
                    self.worker_type, operation, state_reports
                );
                return Ok(());
            }
            Ok(Err(OperationError { message, details })) => (message, details),
            Err(payload) => (format!("panicked: {}", panic_message(payload.as_ref())), None),
        };

        self.signal(WorkerError::OperationFailed {
            operation,
            error: failure.0,
            details: failure.1,
        })
    }

    /// Send an error signal to the supervisor
    fn signal(&self, error: WorkerError) -> Result<(), RuntimeError> {
        warn!(
            "Worker '{}' signalling {}: {}",
            self.worker_type,
            error.as_label(),
            error
        );
        self.channel.send(Message::error(&error)?)?;
        Ok(())
    }

    async fn terminate(&mut self) {
        debug!("Worker '{}' terminating", self.worker_type);
        let mut ctx = WorkerContext::new(&self.channel, &self.worker_type);
        let worker = &mut self.worker;
        if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| worker.on_exit(&mut ctx))) {
            warn!(
                "Worker '{}' cleanup panicked: {}",
                self.worker_type,
                panic_message(payload.as_ref())
            );
        }

        if let Err(e) = self.channel.send(Message::terminated()) {
            debug!("Worker '{}' could not report termination: {}", self.worker_type, e);
        }
        self.channel.close().await;
        info!("Worker '{}' terminated", self.worker_type);
    }
}

/// Report an initialization failure, flush the channel and build the error
pub(crate) async fn abort_initialization(
    channel: &mut Channel,
    worker_type: &str,
    reason: String,
) -> RuntimeError {
    let error = WorkerError::InitializationFailed {
        worker_type: worker_type.to_string(),
        error: reason,
    };
    error!("{}", error);

    match Message::error(&error) {
        Ok(message) => {
            if let Err(e) = channel.send(message) {
                debug!("Could not report initialization failure: {}", e);
            }
        }
        Err(e) => debug!("Could not encode initialization failure: {}", e),
    }
    channel.close().await;

    RuntimeError::Initialization(error)
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
