//! Worker types hosted by the `tether` executable

use std::time::Duration;

use serde_json::{json, Value as JsonValue};
use tether_worker::{
    Arguments, OperationError, Operations, ProtocolError, Worker, WorkerContext, WorkerHost,
};
use tracing::{debug, info};

/// Every worker type this executable can run with `--worker`
pub fn host() -> WorkerHost {
    let mut host = WorkerHost::new();
    host.register::<Counter>()
        .register::<Echo>()
        .register::<Sleepy>()
        .register::<Failing>();
    host
}

/// Keeps a running total
pub struct Counter {
    total: i64,
}

impl Counter {
    fn increment(
        &mut self,
        ctx: &mut WorkerContext<'_>,
        args: &Arguments,
    ) -> Result<(), OperationError> {
        let by = args.get_or::<i64>(0, "by", 1)?;
        self.total = self.total.checked_add(by).ok_or_else(|| {
            OperationError::new("counter overflow")
                .with_details(json!({"total": self.total, "by": by}))
        })?;

        ctx.report_state(self.total)?;
        ctx.emit(
            "incremented",
            Arguments::new().kwarg("by", by).kwarg("total", self.total),
        )
    }

    fn reset(
        &mut self,
        ctx: &mut WorkerContext<'_>,
        _args: &Arguments,
    ) -> Result<(), OperationError> {
        self.total = 0;
        ctx.report_state(self.total)
    }
}

impl Worker for Counter {
    const NAME: &'static str = "counter";

    fn construct(payload: &Arguments) -> Result<Self, OperationError> {
        Ok(Self {
            total: payload.get_or::<i64>(0, "start", 0)?,
        })
    }

    fn operations(operations: &mut Operations<Self>) -> Result<(), ProtocolError> {
        operations
            .register("increment", Counter::increment)?
            .register("reset", Counter::reset)?;
        Ok(())
    }

    fn initial_state(&self) -> JsonValue {
        json!(self.total)
    }

    fn on_exit(&mut self, _ctx: &mut WorkerContext<'_>) {
        info!("Counter exiting at {}", self.total);
    }
}

/// Reports its arguments back as state: positional values followed by the keyword map
pub struct Echo;

impl Worker for Echo {
    const NAME: &'static str = "echo";

    fn construct(_payload: &Arguments) -> Result<Self, OperationError> {
        Ok(Echo)
    }

    fn operations(operations: &mut Operations<Self>) -> Result<(), ProtocolError> {
        operations.register("echo", |_, ctx, args| {
            let mut state = args.args.clone();
            state.push(JsonValue::Object(args.kwargs.clone()));
            ctx.report_state(state)
        })?;
        Ok(())
    }
}

/// Blocks inside operations; optionally also during construction
pub struct Sleepy {
    naps: u64,
}

fn seconds(
    args: &Arguments,
    index: usize,
    name: &str,
    default: f64,
) -> Result<Duration, OperationError> {
    let seconds = args.get_or::<f64>(index, name, default)?;
    Duration::try_from_secs_f64(seconds)
        .map_err(|e| OperationError::new(format!("invalid {}: {}", name, e)))
}

impl Worker for Sleepy {
    const NAME: &'static str = "sleepy";

    fn construct(payload: &Arguments) -> Result<Self, OperationError> {
        let delay = seconds(payload, 0, "delay", 0.0)?;
        if !delay.is_zero() {
            debug!("Delaying construction by {:?}", delay);
            std::thread::sleep(delay);
        }
        Ok(Self { naps: 0 })
    }

    fn operations(operations: &mut Operations<Self>) -> Result<(), ProtocolError> {
        operations.register("sleep", |sleepy, ctx, args| {
            let duration = seconds(args, 0, "seconds", 1.0)?;
            std::thread::sleep(duration);
            sleepy.naps += 1;
            ctx.report_state(json!({"naps": sleepy.naps}))
        })?;
        Ok(())
    }

    fn initial_state(&self) -> JsonValue {
        json!("awake")
    }
}

/// Refuses to be constructed
pub struct Failing;

impl Worker for Failing {
    const NAME: &'static str = "failing";

    fn construct(payload: &Arguments) -> Result<Self, OperationError> {
        let reason = payload.get_or::<String>(0, "reason", "refusing to start".to_string())?;
        Err(OperationError::new(reason))
    }

    fn operations(_operations: &mut Operations<Self>) -> Result<(), ProtocolError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_host_registers_builtin_workers() {
        assert_eq!(
            host().worker_types(),
            vec!["counter", "echo", "failing", "sleepy"]
        );
    }

    #[test]
    fn test_construction_payloads() {
        let counter = Counter::construct(&Arguments::new().kwarg("start", 5)).unwrap();
        assert_eq!(counter.initial_state(), json!(5));
        assert_eq!(
            Counter::construct(&Arguments::new().arg(7)).unwrap().total,
            7
        );
        assert!(Counter::construct(&Arguments::new().kwarg("start", "five")).is_err());

        let error = Failing::construct(&Arguments::new().kwarg("reason", "nope"))
            .err()
            .unwrap();
        assert_eq!(error.to_string(), "nope");
    }

    #[test]
    fn test_seconds_argument() {
        let args = Arguments::new().kwarg("seconds", 0.25);
        assert_eq!(
            seconds(&args, 0, "seconds", 1.0).unwrap(),
            Duration::from_millis(250)
        );
        assert_eq!(
            seconds(&Arguments::new(), 0, "seconds", 1.0).unwrap(),
            Duration::from_secs(1)
        );
        assert!(seconds(&Arguments::new().arg(-1.0), 0, "seconds", 1.0).is_err());
    }
}
