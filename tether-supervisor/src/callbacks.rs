//! Two-level callback registry: event name → subscription id → callback

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use tether_ipc::{validate_application_name, Arguments, ProtocolError, STATE_OPERATION};

use crate::error::SupervisorError;

/// Callback invoked with the arguments of a worker event
pub type Callback = Box<dyn FnMut(&Arguments) + Send>;

/// Handle returned by `attach`. Unique for the registry's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SubscriptionId(u64);

impl SubscriptionId {
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl From<u64> for SubscriptionId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Default)]
pub struct CallbackRegistry {
    events: HashMap<String, BTreeMap<SubscriptionId, Callback>>,
    index: HashMap<SubscriptionId, String>,
    next_id: u64,
}

impl CallbackRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `callback` for `event`.
    ///
    /// `state` is accepted and fires after every state report; the other
    /// reserved names never reach subscribers and are rejected.
    pub fn attach(
        &mut self,
        event: &str,
        callback: Callback,
    ) -> Result<SubscriptionId, SupervisorError> {
        if event != STATE_OPERATION {
            validate_application_name(event)?;
        }

        self.next_id += 1;
        let id = SubscriptionId(self.next_id);

        self.events
            .entry(event.to_string())
            .or_default()
            .insert(id, callback);
        self.index.insert(id, event.to_string());
        Ok(id)
    }

    /// Remove exactly the callback registered under `id`
    pub fn detach(&mut self, id: SubscriptionId) -> Result<(), SupervisorError> {
        let event = self
            .index
            .remove(&id)
            .ok_or(SupervisorError::UnknownSubscription(id))?;

        if let Some(callbacks) = self.events.get_mut(&event) {
            callbacks.remove(&id);
            if callbacks.is_empty() {
                self.events.remove(&event);
            }
        }
        Ok(())
    }

    /// Invoke every callback for `event` in subscription order; returns how many ran
    pub fn dispatch(&mut self, event: &str, arguments: &Arguments) -> usize {
        match self.events.get_mut(event) {
            Some(callbacks) => {
                for callback in callbacks.values_mut() {
                    callback(arguments);
                }
                callbacks.len()
            }
            None => 0,
        }
    }

    pub fn subscriber_count(&self, event: &str) -> usize {
        self.events.get(event).map_or(0, BTreeMap::len)
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }
}

impl fmt::Debug for CallbackRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallbackRegistry")
            .field("subscriptions", &self.index)
            .field("next_id", &self.next_id)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashSet;
    use std::sync::{Arc, Mutex};

    fn recorder(log: &Arc<Mutex<Vec<String>>>, tag: &'static str) -> Callback {
        let log = Arc::clone(log);
        Box::new(move |args: &Arguments| {
            log.lock().unwrap().push(format!("{}:{}", tag, json!(args.args)));
        })
    }

    #[test]
    fn test_ids_are_distinct_across_events() {
        let mut registry = CallbackRegistry::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        let ids: Vec<_> = ["tick", "tick", "tock", "state"]
            .iter()
            .map(|event| registry.attach(event, recorder(&log, "x")).unwrap())
            .collect();

        let unique: HashSet<_> = ids.iter().collect();
        assert_eq!(unique.len(), ids.len());
        assert_eq!(registry.len(), 4);
        assert_eq!(registry.subscriber_count("tick"), 2);
    }

    #[test]
    fn test_dispatch_in_subscription_order() {
        let mut registry = CallbackRegistry::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        registry.attach("tick", recorder(&log, "first")).unwrap();
        registry.attach("tick", recorder(&log, "second")).unwrap();

        let delivered = registry.dispatch("tick", &Arguments::new().arg(1));
        assert_eq!(delivered, 2);
        assert_eq!(*log.lock().unwrap(), vec!["first:[1]", "second:[1]"]);

        assert_eq!(registry.dispatch("nobody", &Arguments::new()), 0);
    }

    #[test]
    fn test_detach_removes_exactly_one() {
        let mut registry = CallbackRegistry::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        let first = registry.attach("tick", recorder(&log, "first")).unwrap();
        registry.attach("tick", recorder(&log, "second")).unwrap();

        registry.detach(first).unwrap();
        registry.dispatch("tick", &Arguments::new());
        assert_eq!(*log.lock().unwrap(), vec!["second:[]"]);

        assert!(matches!(
            registry.detach(first),
            Err(SupervisorError::UnknownSubscription(id)) if id == first
        ));
    }

    #[test]
    fn test_ids_are_not_reused_after_detach() {
        let mut registry = CallbackRegistry::new();
        let id = registry.attach("tick", Box::new(|_| {})).unwrap();
        registry.detach(id).unwrap();
        assert!(registry.is_empty());

        let next = registry.attach("tick", Box::new(|_| {})).unwrap();
        assert!(next > id);
    }

    #[test]
    fn test_reserved_events_rejected_except_state() {
        let mut registry = CallbackRegistry::new();
        for event in ["error", "init", "exit"] {
            assert!(matches!(
                registry.attach(event, Box::new(|_| {})),
                Err(SupervisorError::Protocol(ProtocolError::ReservedOperation(_)))
            ));
        }
        assert!(matches!(
            registry.attach("", Box::new(|_| {})),
            Err(SupervisorError::Protocol(ProtocolError::EmptyOperation))
        ));
        assert!(registry.attach("state", Box::new(|_| {})).is_ok());
    }
}
