//! Effectful actions and the dispatcher they report back through.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::event::StateMachineEvent;

/// The actions returned by one resolution.
pub type ActionList<E, Env> = Vec<Box<dyn EffectfulAction<Event = E, Environment = Env>>>;

/// A named asynchronous side effect scheduled by a resolution.
///
/// Actions are where all I/O lives: network calls, crypto computation,
/// storage reads. An action never touches machine state directly; on
/// completion it sends one or more follow-up events through the dispatcher
/// and the machine resolves those like any other input.
///
/// The identifier names the effect for logging and for in-flight
/// coalescing in the executor: two dispatches with the same identifier
/// while the first is still running collapse into one.
#[async_trait]
pub trait EffectfulAction: Send + Sync + std::fmt::Debug {
    /// Event type this action reports back with.
    type Event: StateMachineEvent;
    /// Shared collaborators the action executes against.
    type Environment: Send + Sync + 'static;

    /// Stable identifier of this effect.
    fn id(&self) -> &str;

    /// Run the effect. Failures are classified into a typed error event
    /// before crossing back into the machine; this method itself is
    /// infallible.
    async fn execute(
        self: Box<Self>,
        dispatcher: EventDispatcher<Self::Event>,
        environment: Arc<Self::Environment>,
    );
}

/// Hands events from running actions (or external callers) back to a
/// state machine's mailbox.
///
/// Cheap to clone; sending never blocks. Events sent after the owning
/// machine has shut down are dropped with a debug log.
pub struct EventDispatcher<E> {
    send: Arc<dyn Fn(E) + Send + Sync>,
}

impl<E> Clone for EventDispatcher<E> {
    fn clone(&self) -> Self {
        Self {
            send: Arc::clone(&self.send),
        }
    }
}

impl<E: StateMachineEvent> EventDispatcher<E> {
    /// Wrap an arbitrary sink. The machine uses this to point the
    /// dispatcher at its own mailbox.
    pub fn new(send: impl Fn(E) + Send + Sync + 'static) -> Self {
        Self {
            send: Arc::new(send),
        }
    }

    /// A dispatcher that records every event into a channel. Used by unit
    /// tests to assert on the events an action emits.
    pub fn capture() -> (Self, mpsc::UnboundedReceiver<E>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let dispatcher = Self::new(move |event| {
            let _ = tx.send(event);
        });
        (dispatcher, rx)
    }

    /// Send an event.
    pub fn send(&self, event: E) {
        tracing::trace!(kind = event.kind(), id = %event.id(), "dispatching event");
        (self.send)(event);
    }
}

impl<E> std::fmt::Debug for EventDispatcher<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("EventDispatcher")
    }
}
