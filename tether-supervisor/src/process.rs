//! Spawning and reaping the worker process

use std::ffi::OsString;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};

use tether_config::WorkerConfig;
use tether_ipc::Channel;
use tokio::process::{Child, Command};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::SupervisorError;

/// Executable and leading arguments used to launch workers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerCommand {
    pub program: PathBuf,
    pub args: Vec<OsString>,
}

impl WorkerCommand {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// The configured program, or the running executable when none is set
    pub fn from_config(config: &WorkerConfig) -> Result<Self, SupervisorError> {
        let program = match config.program {
            Some(ref program) => program.clone(),
            None => std::env::current_exe()?,
        };

        Ok(Self {
            program,
            args: config.program_args.iter().map(OsString::from).collect(),
        })
    }

    fn build(&self, worker_type: &str, worker_id: Uuid) -> Command {
        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .arg("--worker")
            .arg("--worker-type")
            .arg(worker_type)
            .arg("--worker-id")
            .arg(worker_id.to_string())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);
        command
    }
}

/// A running worker process and the supervisor's end of its channel
pub struct WorkerProcess {
    child: Child,
    channel: Channel,
    worker_id: Uuid,
    worker_type: String,
    pid: Option<u32>,
}

impl WorkerProcess {
    /// Launch `worker_type` and connect to its stdin/stdout
    pub fn spawn(command: &WorkerCommand, worker_type: &str) -> Result<Self, SupervisorError> {
        let worker_id = Uuid::new_v4();
        debug!(
            "Spawning worker {} ({}) via {}",
            worker_id,
            worker_type,
            command.program.display()
        );

        let mut child = command.build(worker_type, worker_id).spawn().map_err(|e| {
            SupervisorError::Spawn(format!("{}: {}", command.program.display(), e))
        })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| SupervisorError::Spawn("worker stdin was not captured".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| SupervisorError::Spawn("worker stdout was not captured".to_string()))?;

        let pid = child.id();
        info!("Worker {} ({}) started with pid {:?}", worker_id, worker_type, pid);

        Ok(Self {
            child,
            channel: Channel::new(stdout, stdin),
            worker_id,
            worker_type: worker_type.to_string(),
            pid,
        })
    }

    pub fn channel(&self) -> &Channel {
        &self.channel
    }

    pub fn channel_mut(&mut self) -> &mut Channel {
        &mut self.channel
    }

    pub fn worker_id(&self) -> Uuid {
        self.worker_id
    }

    pub fn worker_type(&self) -> &str {
        &self.worker_type
    }

    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// Whether the process has not exited yet. Reaps it if it has.
    pub fn is_alive(&mut self) -> bool {
        match self.child.try_wait() {
            Ok(None) => true,
            Ok(Some(_)) => false,
            Err(e) => {
                warn!("Failed to query worker {}: {}", self.worker_id, e);
                false
            }
        }
    }

    /// Force-terminate the process and reap it
    pub async fn kill(&mut self) -> Result<(), SupervisorError> {
        warn!("Killing worker {} (pid {:?})", self.worker_id, self.pid);
        self.child.kill().await?;
        Ok(())
    }

    /// Wait for the process to exit
    pub async fn join(mut self) -> Result<ExitStatus, SupervisorError> {
        self.channel.finish_sending();
        let status = self.child.wait().await?;
        debug!("Worker {} exited with {}", self.worker_id, status);
        Ok(status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_from_config() {
        let config = WorkerConfig {
            program: Some(PathBuf::from("/usr/local/bin/tether")),
            program_args: vec!["--log-level".to_string(), "debug".to_string()],
            ..WorkerConfig::default()
        };

        let command = WorkerCommand::from_config(&config).unwrap();
        assert_eq!(command.program, PathBuf::from("/usr/local/bin/tether"));
        assert_eq!(command.args, vec![OsString::from("--log-level"), OsString::from("debug")]);
    }

    #[test]
    fn test_command_defaults_to_current_exe() {
        let command = WorkerCommand::from_config(&WorkerConfig::default()).unwrap();
        assert_eq!(command.program, std::env::current_exe().unwrap());
        assert!(command.args.is_empty());
    }

    #[test]
    fn test_command_line_layout() {
        let command = WorkerCommand::new("tether").arg("--quiet");
        let id = Uuid::nil();
        let built = command.build("counter", id);
        let args: Vec<_> = built.as_std().get_args().collect();

        assert_eq!(
            args,
            vec![
                "--quiet",
                "--worker",
                "--worker-type",
                "counter",
                "--worker-id",
                "00000000-0000-0000-0000-000000000000",
            ]
        );
    }

    #[tokio::test]
    async fn test_spawn_missing_program() {
        let command = WorkerCommand::new("/nonexistent/tether-worker-binary");
        let result = WorkerProcess::spawn(&command, "counter");
        assert!(matches!(result, Err(SupervisorError::Spawn(_))));
    }
}
