//! Session, authentication, and credential management.
//!
//! Everything here runs on the [`aegis_core`] state machine: callers submit
//! events through the [`AuthEngine`], the pure state tree decides transitions,
//! and effectful actions talk to the identity provider and the credential
//! store, feeding their results back in as events.
//!
//! The tree has two machines:
//!
//! - the session machine, whose root [`SessionState`] pairs an
//!   authentication lifecycle (signed out, SRP sign-in, sign-out chains,
//!   user deletion) with an authorization lifecycle (session fetch and
//!   token refresh)
//! - the credential-store machine, which serializes persistence and runs
//!   the one-time store migration
//!
//! [`SessionState`]: states::SessionState

pub mod actions;
pub mod api;
pub mod configuration;
pub mod credentials;
pub mod environment;
pub mod error;
pub mod events;
pub mod provider;
pub mod states;
pub mod store;

pub use api::{AuthEngine, EngineOptions, SignInOutcome, SignOutOptions};
pub use configuration::{
    AuthConfiguration, IdentityPoolConfiguration, UserPoolConfiguration,
};
pub use credentials::{
    AuthCredentials, AwsCredentials, SecretString, SignInMethod, SignedInData, SignedOutData,
    UserPoolTokens,
};
pub use error::{AuthError, CredentialStoreError, SessionError};
pub use provider::{IdentityProviderClient, ServiceError};
