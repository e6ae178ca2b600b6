//! States, resolutions, and the pure resolver contract.

use crate::action::ActionList;
use crate::event::StateMachineEvent;

/// An immutable, value-equatable description of a subsystem's condition.
///
/// States compose into trees: a composite state owns its sub-states as plain
/// fields and total state is the recursive composition. Every transition
/// replaces the whole value; nothing is mutated in place.
pub trait State: Clone + PartialEq + std::fmt::Debug + Send + Sync + 'static {}

/// The outcome of applying one event to one state: the (possibly unchanged)
/// new state plus the side effects the transition requires.
pub struct StateResolution<S, E, Env>
where
    S: State,
    E: StateMachineEvent,
    Env: Send + Sync + 'static,
{
    /// The state after the event. May equal the old state.
    pub new_state: S,
    /// Actions to hand to the effect executor. Dispatched even when the
    /// state value did not change (a no-op resolution may still retry).
    pub actions: ActionList<E, Env>,
}

impl<S, E, Env> StateResolution<S, E, Env>
where
    S: State,
    E: StateMachineEvent,
    Env: Send + Sync + 'static,
{
    /// A resolution that transitions (or stays) with no side effects.
    pub fn from(state: S) -> Self {
        Self {
            new_state: state,
            actions: Vec::new(),
        }
    }

    /// A resolution carrying side effects.
    pub fn with_actions(state: S, actions: ActionList<E, Env>) -> Self {
        Self {
            new_state: state,
            actions,
        }
    }
}

impl<S, E, Env> std::fmt::Debug for StateResolution<S, E, Env>
where
    S: State,
    E: StateMachineEvent,
    Env: Send + Sync + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateResolution")
            .field("new_state", &self.new_state)
            .field(
                "actions",
                &self.actions.iter().map(|a| a.id()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

/// A pure transition function `(old state, event) -> (new state, actions)`.
///
/// Resolvers perform no I/O and never mutate their input. An event a
/// resolver does not recognize resolves to the old state with no actions
/// (identity), never to an error.
///
/// Composite resolvers follow a two-phase pattern: first delegate the event
/// to every child resolver and collect the children's results, then derive
/// the parent-level outcome from the *new* child states. Parent decisions
/// based on stale child state are a bug.
pub trait Resolver: Send + Sync + 'static {
    /// The state this resolver transitions.
    type State: State;
    /// The event type the owning machine processes.
    type Event: StateMachineEvent;
    /// The environment actions produced by this resolver execute against.
    type Environment: Send + Sync + 'static;

    /// Apply `event` to `old_state`.
    fn resolve(
        &self,
        old_state: &Self::State,
        event: &Self::Event,
    ) -> StateResolution<Self::State, Self::Event, Self::Environment>;
}
