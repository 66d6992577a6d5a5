//! Supervisor side of Tether
//!
//! A [`Supervisor`] launches one worker process, talks to it over a private
//! channel, mirrors the state the worker reports, and fans worker events out
//! to attached callbacks.

pub mod callbacks;
pub mod error;
pub mod process;
pub mod supervisor;

pub use callbacks::{Callback, CallbackRegistry, SubscriptionId};
pub use error::SupervisorError;
pub use process::{WorkerCommand, WorkerProcess};
pub use supervisor::{Supervisor, SupervisorPhase, Update};

// Re-export protocol types callers need to drive a worker
pub use tether_ipc::{Arguments, WorkerError, TERMINATED_STATE};
