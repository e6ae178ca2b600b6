//! Generic hierarchical state-machine engine.
//!
//! This crate provides the building blocks the auth state tree is made of:
//!
//! - [`State`]: an immutable, value-equatable description of a subsystem
//! - [`StateMachineEvent`]: a fact that happened, with an id and timestamp
//! - [`Resolver`]: a pure function `(old state, event) -> (new state, actions)`
//! - [`EffectfulAction`]: a named asynchronous side effect
//! - [`EffectExecutor`]: runs actions concurrently, coalescing duplicates
//! - [`StateMachine`]: the single-writer coordinator that owns the state
//!
//! # Architecture
//!
//! ```text
//! send(event) ──► resolver ──► new state ──► subscribers
//!                    │
//!                    └──► actions ──► executor ──► (async work) ──► send(event)
//! ```
//!
//! Resolution is serialized: the machine runs as a mailbox task and no two
//! events ever race on the current state. Actions are the only place I/O is
//! allowed; they communicate back exclusively by sending follow-up events
//! through an [`EventDispatcher`].

pub mod action;
pub mod event;
pub mod executor;
pub mod machine;
pub mod state;

pub use action::{ActionList, EffectfulAction, EventDispatcher};
pub use event::StateMachineEvent;
pub use executor::EffectExecutor;
pub use machine::{ListenerToken, StateMachine};
pub use state::{Resolver, State, StateResolution};
