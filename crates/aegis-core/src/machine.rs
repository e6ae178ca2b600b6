//! The single-writer state machine.
//!
//! The machine runs as a mailbox task: events, subscriptions, and
//! cancellations all arrive through one channel and are applied serially, so
//! no two resolutions ever race on the current state. Actions returned by a
//! resolution are handed to the [`EffectExecutor`] and run concurrently;
//! they feed results back as new events through the machine's dispatcher.

use std::collections::HashMap;
use std::collections::HashSet;
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::action::EventDispatcher;
use crate::event::StateMachineEvent;
use crate::executor::EffectExecutor;
use crate::state::Resolver;

type Listener<S> = dyn Fn(&S) + Send + Sync;

/// Handle returned by [`StateMachine::listen`].
///
/// The token owns the callback: dropping it lets the machine prune the
/// subscription the next time a notification would have been delivered.
/// For deterministic teardown (tests, explicit flows) call
/// [`StateMachine::cancel`] instead of relying on the drop.
pub struct ListenerToken<S> {
    id: Uuid,
    // Keeps the callback alive; the machine only holds a weak reference.
    _callback: Arc<Listener<S>>,
}

impl<S> ListenerToken<S> {
    /// Opaque id of this subscription.
    pub fn id(&self) -> Uuid {
        self.id
    }
}

impl<S> std::fmt::Debug for ListenerToken<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListenerToken").field("id", &self.id).finish()
    }
}

enum Command<S, E> {
    Send(E),
    Subscribe { id: Uuid, listener: Weak<Listener<S>> },
    Unsubscribe { id: Uuid },
}

/// Single-writer coordinator owning one state value.
///
/// Cloning the handle is cheap; all clones feed the same mailbox. The
/// background task exits once every handle and dispatcher clone is gone.
pub struct StateMachine<R: Resolver> {
    tx: mpsc::UnboundedSender<Command<R::State, R::Event>>,
    snapshot: Arc<RwLock<R::State>>,
    pending_cancellations: Arc<Mutex<HashSet<Uuid>>>,
}

impl<R: Resolver> Clone for StateMachine<R> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            snapshot: Arc::clone(&self.snapshot),
            pending_cancellations: Arc::clone(&self.pending_cancellations),
        }
    }
}

impl<R: Resolver> StateMachine<R> {
    /// Spawn a machine with the given resolver, initial state, and shared
    /// environment for its actions.
    pub fn new(resolver: R, initial_state: R::State, environment: Arc<R::Environment>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let snapshot = Arc::new(RwLock::new(initial_state.clone()));
        let pending_cancellations = Arc::new(Mutex::new(HashSet::new()));

        let dispatcher = {
            let tx = tx.clone();
            EventDispatcher::new(move |event| {
                if tx.send(Command::Send(event)).is_err() {
                    tracing::debug!("state machine gone, dropping event");
                }
            })
        };
        let executor = EffectExecutor::new(dispatcher, environment);

        let task = MachineTask::<R> {
            resolver,
            state: initial_state,
            snapshot: Arc::clone(&snapshot),
            subscribers: HashMap::new(),
            pending_cancellations: Arc::clone(&pending_cancellations),
            executor,
        };
        tokio::spawn(task.run(rx));

        Self {
            tx,
            snapshot,
            pending_cancellations,
        }
    }

    /// Submit an event. Events from one caller are processed in submission
    /// order; processing happens on the machine task, not here.
    pub fn send(&self, event: R::Event) {
        tracing::trace!(kind = event.kind(), id = %event.id(), "event queued");
        if self.tx.send(Command::Send(event)).is_err() {
            tracing::debug!("state machine gone, dropping event");
        }
    }

    /// The dispatcher actions (or external feeders) use to submit events.
    pub fn dispatcher(&self) -> EventDispatcher<R::Event> {
        let tx = self.tx.clone();
        EventDispatcher::new(move |event| {
            if tx.send(Command::Send(event)).is_err() {
                tracing::debug!("state machine gone, dropping event");
            }
        })
    }

    /// Register a state listener.
    ///
    /// The callback is invoked once with the current state on the machine's
    /// next scheduling turn (never synchronously from `listen`), then on
    /// every subsequent change.
    pub fn listen(
        &self,
        callback: impl Fn(&R::State) + Send + Sync + 'static,
    ) -> ListenerToken<R::State> {
        let callback: Arc<Listener<R::State>> = Arc::new(callback);
        let id = Uuid::new_v4();
        let _ = self.tx.send(Command::Subscribe {
            id,
            listener: Arc::downgrade(&callback),
        });
        ListenerToken {
            id,
            _callback: callback,
        }
    }

    /// Cancel a subscription.
    ///
    /// The cancellation is recorded synchronously in the shared
    /// pending-cancellation set before the subscription entry is removed
    /// asynchronously, so a notification already scheduled on the machine
    /// task can never be delivered to a canceled listener.
    pub fn cancel(&self, token: &ListenerToken<R::State>) {
        self.pending_cancellations.lock().insert(token.id);
        let _ = self.tx.send(Command::Unsubscribe { id: token.id });
    }

    /// A copy of the current state. Written only by the machine task.
    pub fn current_state(&self) -> R::State {
        self.snapshot.read().clone()
    }
}

struct MachineTask<R: Resolver> {
    resolver: R,
    state: R::State,
    snapshot: Arc<RwLock<R::State>>,
    subscribers: HashMap<Uuid, Weak<Listener<R::State>>>,
    pending_cancellations: Arc<Mutex<HashSet<Uuid>>>,
    executor: EffectExecutor<R::Event, R::Environment>,
}

impl<R: Resolver> MachineTask<R> {
    async fn run(mut self, mut rx: mpsc::UnboundedReceiver<Command<R::State, R::Event>>) {
        while let Some(command) = rx.recv().await {
            match command {
                Command::Send(event) => self.apply(event),
                Command::Subscribe { id, listener } => {
                    // Deliver the current state to the new listener only,
                    // unless the subscription was already canceled.
                    let canceled = self.pending_cancellations.lock().contains(&id);
                    if !canceled {
                        if let Some(callback) = listener.upgrade() {
                            callback(&self.state);
                        }
                        self.subscribers.insert(id, listener);
                    }
                }
                Command::Unsubscribe { id } => {
                    self.subscribers.remove(&id);
                    self.pending_cancellations.lock().remove(&id);
                }
            }
        }
    }

    fn apply(&mut self, event: R::Event) {
        let resolution = self.resolver.resolve(&self.state, &event);
        if resolution.new_state != self.state {
            tracing::debug!(
                kind = event.kind(),
                new_state = ?resolution.new_state,
                "state transition"
            );
            self.state = resolution.new_state;
            *self.snapshot.write() = self.state.clone();
            self.notify_subscribers();
        }
        // Actions run regardless of whether the state value changed.
        for action in resolution.actions {
            self.executor.dispatch(action);
        }
    }

    fn notify_subscribers(&mut self) {
        // Snapshot the set, then deliver without the lock: a cancellation
        // recorded before this read is honored, and a listener may call
        // cancel() from inside its own callback without deadlocking the
        // machine task.
        let pending = self.pending_cancellations.lock().clone();
        let state = &self.state;
        self.subscribers.retain(|id, listener| {
            if pending.contains(id) {
                // Removal arrives via the Unsubscribe command; keep the
                // entry but deliver nothing.
                return true;
            }
            match listener.upgrade() {
                Some(callback) => {
                    callback(state);
                    true
                }
                // Token holder is gone; prune.
                None => false,
            }
        });
    }
}
