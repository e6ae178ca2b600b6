//! Concurrent execution of effectful actions.

use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::action::{EffectfulAction, EventDispatcher};
use crate::event::StateMachineEvent;

/// Schedules actions as independent tokio tasks.
///
/// Completion order is unspecified: a slow action's follow-up events may be
/// interleaved arbitrarily with those of faster actions. The executor keeps
/// an in-flight identifier set and coalesces duplicates: dispatching an
/// action whose identifier is already running is a logged no-op.
pub struct EffectExecutor<E, Env> {
    dispatcher: EventDispatcher<E>,
    environment: Arc<Env>,
    in_flight: Arc<Mutex<HashSet<String>>>,
}

impl<E, Env> EffectExecutor<E, Env>
where
    E: StateMachineEvent,
    Env: Send + Sync + 'static,
{
    pub fn new(dispatcher: EventDispatcher<E>, environment: Arc<Env>) -> Self {
        Self {
            dispatcher,
            environment,
            in_flight: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// Schedule one action. Returns immediately.
    pub fn dispatch(&self, action: Box<dyn EffectfulAction<Event = E, Environment = Env>>) {
        let id = action.id().to_owned();
        {
            let mut in_flight = self.in_flight.lock();
            if !in_flight.insert(id.clone()) {
                tracing::debug!(action = %id, "action already in flight, coalescing");
                return;
            }
        }
        tracing::debug!(action = %id, "executing action");

        let dispatcher = self.dispatcher.clone();
        let environment = Arc::clone(&self.environment);
        let in_flight = Arc::clone(&self.in_flight);
        tokio::spawn(async move {
            action.execute(dispatcher, environment).await;
            in_flight.lock().remove(&id);
        });
    }

    /// Identifiers of actions currently running.
    pub fn in_flight(&self) -> Vec<String> {
        self.in_flight.lock().iter().cloned().collect()
    }
}
