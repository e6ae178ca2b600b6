//! Error taxonomy of the auth engine.
//!
//! Resolvers never produce errors; they encode failures as terminal state
//! variants carrying one of these types. Actions that catch collaborator
//! failures classify them here before the error crosses the action/event
//! boundary, so an opaque error never enters the state tree.

use aegis_srp::SrpError;

use crate::provider::ServiceError;

/// What went wrong with an authentication operation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    /// Caller or service misconfiguration. Not retryable without caller
    /// action.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Malformed input. Not retryable.
    #[error("validation error: {0}")]
    Validation(String),

    /// The remote rejected the call; retryability depends on the kind.
    #[error("service error: {0}")]
    Service(#[from] ServiceError),

    /// Local cryptographic or arithmetic failure. Indicates a bug or
    /// corrupted input; not retryable.
    #[error("calculation error: {0}")]
    Calculation(#[from] SrpError),

    /// The remote violated the protocol contract (missing challenge
    /// parameter, absent tokens). Not retryable.
    #[error("invalid service response: {0}")]
    InvalidServiceResponse(String),

    /// The caller must re-authenticate.
    #[error("not authorized")]
    NotAuthorized,

    /// Catch-all. Always carries diagnostic context.
    #[error("unknown error: {0}")]
    Unknown(String),
}

impl AuthError {
    /// Classify a raw service failure for the sign-in flows.
    pub fn from_service(error: ServiceError) -> Self {
        match error {
            ServiceError::NotAuthorized(_) => AuthError::NotAuthorized,
            other => AuthError::Service(other),
        }
    }
}

/// Closed set of session fetch and refresh failures, so callers can pick
/// distinct recovery policies (for example, force sign-out only on
/// `NotAuthorized`/`InvalidTokens`).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("no identity pool configured")]
    NoIdentityPool,

    #[error("no user pool configured")]
    NoUserPool,

    #[error("not authorized to refresh the session")]
    NotAuthorized,

    #[error("stored identity id is invalid")]
    InvalidIdentityId,

    #[error("stored tokens are invalid")]
    InvalidTokens,

    #[error("no credentials available to refresh")]
    NoCredentialsToRefresh,

    #[error("service failure during session refresh: {0}")]
    Service(ServiceError),
}

/// Credential-store machine failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CredentialStoreError {
    /// The underlying secure store refused the operation.
    #[error("secure store failure: {0}")]
    Store(String),

    /// Persisted payload could not be encoded or decoded.
    #[error("credential coding failure: {0}")]
    Coding(String),

    /// The store was built against an unusable configuration.
    #[error("credential store misconfigured: {0}")]
    Configuration(String),
}
