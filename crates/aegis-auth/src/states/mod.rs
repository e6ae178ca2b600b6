//! The concrete state tree and its resolvers.
//!
//! `SessionState` is the root the machine holds; everything below it is
//! a plain value resolved by delegation. Only the root implements the
//! engine's `Resolver` trait; child resolvers are ordinary structs the
//! root calls in its two-phase pass.

pub mod authentication;
pub mod authorization;
pub mod credential_store;
pub mod session;
pub mod sign_in;
pub mod sign_out;
pub mod srp;

pub use authentication::AuthenticationState;
pub use authorization::AuthorizationState;
pub use credential_store::CredentialStoreState;
pub use session::{SessionResolver, SessionState};
pub use sign_in::{PublishedChallenge, SignInChallengeState, SignInState};
pub use sign_out::SignOutState;
pub use srp::{SrpSignInState, SrpStateData};
