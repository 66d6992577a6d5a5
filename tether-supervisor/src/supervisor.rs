//! The supervisor: owns one worker process at a time

use std::time::Duration;

use serde_json::Value as JsonValue;
use tether_config::{SupervisorConfig, TetherConfig};
use tether_ipc::{
    Arguments, IpcError, Message, MessageKind, ProtocolError, STATE_OPERATION, TERMINATED_STATE,
};
use tokio::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::callbacks::{CallbackRegistry, SubscriptionId};
use crate::error::SupervisorError;
use crate::process::{WorkerCommand, WorkerProcess};

/// Upper bound on reading what a worker wrote before it exited
const FINAL_DRAIN: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorPhase {
    /// Never started
    Idle,
    /// A worker process was spawned and has not been stopped
    Running,
    /// The last worker was stopped or failed to start
    Stopped,
}

/// What a single `update` step processed
#[derive(Debug, Clone, PartialEq)]
pub enum Update {
    /// The cached state was replaced; `delivered` state subscribers ran
    State { state: JsonValue, delivered: usize },
    /// A worker event was fanned out to `delivered` subscribers
    Event {
        name: String,
        arguments: Arguments,
        delivered: usize,
    },
}

pub struct Supervisor {
    command: WorkerCommand,
    config: SupervisorConfig,
    process: Option<WorkerProcess>,
    state: JsonValue,
    callbacks: CallbackRegistry,
    phase: SupervisorPhase,
}

impl Supervisor {
    pub fn new(command: WorkerCommand, config: SupervisorConfig) -> Self {
        Self {
            command,
            config,
            process: None,
            state: JsonValue::Null,
            callbacks: CallbackRegistry::new(),
            phase: SupervisorPhase::Idle,
        }
    }

    /// Supervisor launching the configured worker program
    pub fn from_config(config: &TetherConfig) -> Result<Self, SupervisorError> {
        let command = WorkerCommand::from_config(&config.worker)?;
        Ok(Self::new(command, config.supervisor.clone()))
    }

    /// Spawn a `worker_type` worker constructed from `payload`.
    ///
    /// Does nothing while a worker is alive. With `wait`, returns once the
    /// worker has reported its first state.
    pub async fn start(
        &mut self,
        worker_type: &str,
        payload: Arguments,
        wait: bool,
    ) -> Result<(), SupervisorError> {
        if self.is_alive() {
            debug!("Worker already running; start ignored");
            return Ok(());
        }
        self.reap().await;

        let process = WorkerProcess::spawn(&self.command, worker_type)?;
        self.state = JsonValue::Null;
        self.phase = SupervisorPhase::Running;

        let sent = process.channel().send(Message::init(payload));
        self.process = Some(process);
        if let Err(e) = sent {
            self.discard().await;
            return Err(SupervisorError::StartupFailure {
                worker_type: worker_type.to_string(),
                reason: e.to_string(),
            });
        }

        if wait {
            if let Err(e) = self.wait_for_state(worker_type).await {
                warn!("Worker '{}' failed to start: {}", worker_type, e);
                self.discard().await;
                return Err(e);
            }
            info!("Worker '{}' ready with state {}", worker_type, self.state);
        }
        Ok(())
    }

    async fn wait_for_state(&mut self, worker_type: &str) -> Result<(), SupervisorError> {
        let deadline = self.config.startup_timeout.map(|t| Instant::now() + t);

        while self.state.is_null() {
            if let Some(deadline) = deadline {
                if Instant::now() >= deadline {
                    return Err(SupervisorError::StartupTimeout {
                        worker_type: worker_type.to_string(),
                        timeout: self.config.startup_timeout.unwrap_or_default(),
                    });
                }
            }

            match self.update(self.config.poll_interval).await {
                Ok(_) => {}
                Err(SupervisorError::Worker(error)) => {
                    return Err(SupervisorError::StartupFailure {
                        worker_type: worker_type.to_string(),
                        reason: error.to_string(),
                    });
                }
                Err(e) => return Err(e),
            }

            if self.state.is_null() && self.channel_closed() {
                return Err(SupervisorError::StartupFailure {
                    worker_type: worker_type.to_string(),
                    reason: "worker exited before reporting state".to_string(),
                });
            }
        }
        Ok(())
    }

    /// Ask the worker to exit.
    ///
    /// With `wait`, drains messages until the process is gone, killing it
    /// once the shutdown grace period elapses, then reaps it.
    pub async fn stop(&mut self, wait: bool) -> Result<(), SupervisorError> {
        let Some(process) = self.process.as_mut() else {
            return Ok(());
        };

        if !process.is_alive() {
            self.reap().await;
            return Ok(());
        }

        if let Err(e) = process.channel().send(Message::exit()) {
            debug!("Exit already requested: {}", e);
        }
        process.channel_mut().finish_sending();
        if !wait {
            return Ok(());
        }

        let deadline = self.config.shutdown_grace.map(|t| Instant::now() + t);
        while self.is_alive() {
            if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
                warn!(
                    "Worker did not exit within {:?}; killing it",
                    self.config.shutdown_grace.unwrap_or_default()
                );
                if let Some(process) = self.process.as_mut() {
                    process.kill().await?;
                }
                break;
            }
            self.drain_step().await;
        }

        self.reap().await;
        Ok(())
    }

    /// Queue `operation` for the worker. Never waits for a reply.
    pub fn send(&self, operation: &str, arguments: Arguments) -> Result<(), SupervisorError> {
        let rejected = |reason: &str| SupervisorError::InvalidOperation {
            operation: operation.to_string(),
            reason: reason.to_string(),
        };

        if operation.is_empty() {
            return Err(rejected("operation name cannot be empty"));
        }
        match MessageKind::classify(operation) {
            MessageKind::State | MessageKind::Error => {
                return Err(rejected("reserved for messages sent by the worker"))
            }
            MessageKind::Init => return Err(rejected("sent by start")),
            MessageKind::Exit | MessageKind::Application => {}
        }

        let process = self.process.as_ref().ok_or(SupervisorError::NotRunning)?;
        process
            .channel()
            .send(Message::new(operation, arguments))?;
        Ok(())
    }

    /// Process at most one message, waiting up to `timeout` for it.
    ///
    /// Error signals from the worker are returned as `SupervisorError::Worker`.
    pub async fn update(&mut self, timeout: Duration) -> Result<Option<Update>, SupervisorError> {
        let Some(process) = self.process.as_mut() else {
            return Ok(None);
        };

        let channel = process.channel_mut();
        if channel.is_closed() {
            tokio::time::sleep(timeout).await;
            return Ok(None);
        }

        let message = match channel.recv_timeout(timeout).await {
            Ok(Some(message)) => message,
            Ok(None) => return Ok(None),
            Err(IpcError::ConnectionClosed) => {
                debug!("Worker closed its channel");
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };

        self.handle_message(message).map(Some)
    }

    fn handle_message(&mut self, message: Message) -> Result<Update, SupervisorError> {
        match message.kind() {
            MessageKind::State => {
                let arguments = message.arguments.clone();
                let state = message.into_state()?;
                debug!("Worker reported state {}", state);
                self.set_state(state.clone());
                let delivered = self.callbacks.dispatch(STATE_OPERATION, &arguments);
                Ok(Update::State { state, delivered })
            }
            MessageKind::Error => Err(SupervisorError::Worker(message.into_error()?)),
            MessageKind::Init | MessageKind::Exit => {
                Err(ProtocolError::UnexpectedOperation(message.operation).into())
            }
            MessageKind::Application => {
                let delivered = self
                    .callbacks
                    .dispatch(&message.operation, &message.arguments);
                Ok(Update::Event {
                    name: message.operation,
                    arguments: message.arguments,
                    delivered,
                })
            }
        }
    }

    /// Call `callback` for every `event` the worker emits. `state` fires
    /// after each state report with the new state as the only argument.
    pub fn attach<F>(
        &mut self,
        event: &str,
        callback: F,
    ) -> Result<SubscriptionId, SupervisorError>
    where
        F: FnMut(&Arguments) + Send + 'static,
    {
        self.callbacks.attach(event, Box::new(callback))
    }

    pub fn detach(&mut self, id: SubscriptionId) -> Result<(), SupervisorError> {
        self.callbacks.detach(id)
    }

    /// Last state reported by the worker; `null` before the first report
    pub fn state(&self) -> &JsonValue {
        &self.state
    }

    /// Process one pending message, then return the cached state
    pub async fn refresh_state(&mut self) -> Result<&JsonValue, SupervisorError> {
        self.update(self.config.poll_interval).await?;
        Ok(&self.state)
    }

    pub(crate) fn set_state(&mut self, state: JsonValue) {
        self.state = state;
    }

    /// Whether the worker reported its terminal state
    pub fn is_terminated(&self) -> bool {
        self.state.as_str() == Some(TERMINATED_STATE)
    }

    pub fn is_alive(&mut self) -> bool {
        self.process.as_mut().is_some_and(WorkerProcess::is_alive)
    }

    pub fn phase(&self) -> SupervisorPhase {
        self.phase
    }

    pub fn worker_id(&self) -> Option<Uuid> {
        self.process.as_ref().map(WorkerProcess::worker_id)
    }

    pub fn pid(&self) -> Option<u32> {
        self.process.as_ref().and_then(WorkerProcess::pid)
    }

    pub fn config(&self) -> &SupervisorConfig {
        &self.config
    }

    fn channel_closed(&self) -> bool {
        self.process
            .as_ref()
            .map_or(true, |process| process.channel().is_closed())
    }

    async fn drain_step(&mut self) {
        match self.update(self.config.poll_interval).await {
            Ok(_) => {}
            Err(SupervisorError::Worker(error)) => {
                warn!("Worker reported {} while stopping: {}", error.as_label(), error);
            }
            Err(e) => debug!("Ignoring {} while stopping: {}", e.as_label(), e),
        }
    }

    /// Read what an exited worker left in the channel, then wait for it
    async fn reap(&mut self) {
        if self.process.is_none() {
            return;
        }

        let deadline = Instant::now() + FINAL_DRAIN;
        while !self.channel_closed() && Instant::now() < deadline {
            self.drain_step().await;
        }

        if let Some(process) = self.process.take() {
            let worker_id = process.worker_id();
            match process.join().await {
                Ok(status) => info!("Worker {} stopped ({})", worker_id, status),
                Err(e) => warn!("Failed to reap worker {}: {}", worker_id, e),
            }
        }
        self.phase = SupervisorPhase::Stopped;
    }

    /// Kill and reap the current process without draining it
    async fn discard(&mut self) {
        if let Some(mut process) = self.process.take() {
            if process.is_alive() {
                if let Err(e) = process.kill().await {
                    warn!("Failed to kill worker {}: {}", process.worker_id(), e);
                }
            }
            if let Err(e) = process.join().await {
                warn!("Failed to reap worker: {}", e);
            }
        }
        self.phase = SupervisorPhase::Stopped;
    }
}

impl std::fmt::Debug for Supervisor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Supervisor")
            .field("command", &self.command)
            .field("phase", &self.phase)
            .field("worker_id", &self.worker_id())
            .field("state", &self.state)
            .field("callbacks", &self.callbacks)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::{Arc, Mutex};
    use tether_ipc::WorkerError;

    fn supervisor() -> Supervisor {
        Supervisor::new(WorkerCommand::new("tether"), SupervisorConfig::default())
    }

    #[test]
    fn test_send_validation() {
        let supervisor = supervisor();

        for operation in ["", "state", "error", "init"] {
            assert!(
                matches!(
                    supervisor.send(operation, Arguments::new()),
                    Err(SupervisorError::InvalidOperation { .. })
                ),
                "{operation:?} should be rejected"
            );
        }

        assert!(matches!(
            supervisor.send("exit", Arguments::new()),
            Err(SupervisorError::NotRunning)
        ));
        assert!(matches!(
            supervisor.send("increment", Arguments::new()),
            Err(SupervisorError::NotRunning)
        ));
    }

    #[tokio::test]
    async fn test_idle_supervisor() {
        let mut supervisor = supervisor();

        assert_eq!(supervisor.phase(), SupervisorPhase::Idle);
        assert!(!supervisor.is_alive());
        assert!(supervisor.worker_id().is_none());
        assert!(supervisor.pid().is_none());
        assert_eq!(*supervisor.state(), JsonValue::Null);

        assert!(supervisor.update(Duration::from_millis(1)).await.unwrap().is_none());
        assert_eq!(*supervisor.refresh_state().await.unwrap(), JsonValue::Null);
        supervisor.stop(true).await.unwrap();
        assert_eq!(supervisor.phase(), SupervisorPhase::Idle);
    }

    #[test]
    fn test_state_report_updates_cache_then_notifies() {
        let mut supervisor = supervisor();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        supervisor
            .attach("state", move |args| sink.lock().unwrap().push(args.args[0].clone()))
            .unwrap();

        let update = supervisor.handle_message(Message::state(json!(6))).unwrap();
        assert_eq!(
            update,
            Update::State {
                state: json!(6),
                delivered: 1
            }
        );
        assert_eq!(*supervisor.state(), json!(6));
        assert_eq!(*seen.lock().unwrap(), vec![json!(6)]);

        supervisor.handle_message(Message::terminated()).unwrap();
        assert!(supervisor.is_terminated());
    }

    #[test]
    fn test_events_fan_out() {
        let mut supervisor = supervisor();
        let count = Arc::new(Mutex::new(0));
        let sink = Arc::clone(&count);
        let id = supervisor
            .attach("incremented", move |args| {
                *sink.lock().unwrap() += args.get_or::<i64>(0, "by", 0).unwrap();
            })
            .unwrap();

        let event = Message::new("incremented", Arguments::new().kwarg("by", 3));
        let update = supervisor.handle_message(event.clone()).unwrap();
        assert_eq!(
            update,
            Update::Event {
                name: "incremented".to_string(),
                arguments: Arguments::new().kwarg("by", 3),
                delivered: 1
            }
        );
        assert_eq!(*count.lock().unwrap(), 3);

        supervisor.detach(id).unwrap();
        let update = supervisor.handle_message(event).unwrap();
        assert!(matches!(update, Update::Event { delivered: 0, .. }));
        assert_eq!(*count.lock().unwrap(), 3);
        assert!(supervisor.detach(id).is_err());
    }

    #[test]
    fn test_error_signal_and_misdirected_messages() {
        let mut supervisor = supervisor();
        let error = WorkerError::UnknownOperation {
            operation: "fly".to_string(),
        };

        let result = supervisor.handle_message(Message::error(&error).unwrap());
        assert!(matches!(result, Err(SupervisorError::Worker(ref e)) if *e == error));

        assert!(matches!(
            supervisor.handle_message(Message::exit()),
            Err(SupervisorError::Protocol(ProtocolError::UnexpectedOperation(_)))
        ));
        assert_eq!(*supervisor.state(), JsonValue::Null);
    }
}
