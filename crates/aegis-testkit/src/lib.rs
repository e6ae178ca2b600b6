//! Test doubles for the auth engine.
//!
//! Everything here is deterministic and in-memory: a [`MemorySecureStore`]
//! and [`MemoryLocalSettings`] standing in for platform storage, a
//! [`MockIdentityProvider`] that plays back scripted service responses,
//! and canned payloads in [`fixtures`].

pub mod fixtures;
pub mod provider;
pub mod store;

pub use provider::MockIdentityProvider;
pub use store::{MemoryLocalSettings, MemorySecureStore};
