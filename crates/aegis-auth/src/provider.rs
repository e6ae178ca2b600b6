//! Identity provider client boundary.
//!
//! Everything the engine needs from the backing service is expressed
//! through [`IdentityProviderClient`]; production transports and test
//! doubles both implement it.

use std::collections::HashMap;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;

use crate::error::AuthError;

/// Challenge parameter names on the wire.
pub mod challenge_params {
    pub const USERNAME: &str = "USERNAME";
    pub const USER_ID_FOR_SRP: &str = "USER_ID_FOR_SRP";
    pub const SALT: &str = "SALT";
    pub const SECRET_BLOCK: &str = "SECRET_BLOCK";
    pub const SRP_A: &str = "SRP_A";
    pub const SRP_B: &str = "SRP_B";
    pub const TIMESTAMP: &str = "TIMESTAMP";
    pub const PASSWORD_CLAIM_SECRET_BLOCK: &str = "PASSWORD_CLAIM_SECRET_BLOCK";
    pub const PASSWORD_CLAIM_SIGNATURE: &str = "PASSWORD_CLAIM_SIGNATURE";
    pub const SECRET_HASH: &str = "SECRET_HASH";
    pub const DEVICE_KEY: &str = "DEVICE_KEY";
}

/// Service-level failures, classified for retry and error-mapping
/// decisions.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ServiceError {
    /// A referenced resource (user, device) does not exist.
    #[error("resource not found: {0}")]
    ResourceNotFound(String),
    #[error("not authorized: {0}")]
    NotAuthorized(String),
    #[error("invalid request: {0}")]
    Validation(String),
    /// Network-level failure before a service response was received.
    #[error("transport failure: {0}")]
    Transport(String),
    /// The service answered with a retriable fault.
    #[error("service unavailable: {0}")]
    Unavailable(String),
    #[error("service error: {0}")]
    Service(String),
}

impl ServiceError {
    /// Whether a bounded retry of the same request is reasonable.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ServiceError::Transport(_) | ServiceError::Unavailable(_)
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitiateAuthRequest {
    pub client_id: String,
    pub auth_flow: AuthFlow,
    pub auth_parameters: HashMap<String, String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthFlow {
    UserSrpAuth,
    RefreshTokenAuth,
}

/// An initiation or challenge response from the service. Either a next
/// challenge is posed or tokens are issued.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthResponse {
    pub challenge_name: Option<ChallengeName>,
    pub challenge_parameters: Option<HashMap<String, String>>,
    pub session: Option<String>,
    pub authentication_result: Option<AuthenticationResult>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChallengeName {
    PasswordVerifier,
    SmsMfa,
    CustomChallenge,
    DeviceSrpAuth,
    NewPasswordRequired,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticationResult {
    pub id_token: String,
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_in_seconds: i64,
    pub new_device_metadata: Option<NewDeviceMetadata>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewDeviceMetadata {
    pub device_key: String,
    pub device_group_key: String,
}

/// The parameters needed to answer a challenge, as accumulated by the
/// sign-in flow.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RespondToAuthChallenge {
    pub challenge_name: Option<ChallengeName>,
    pub challenge_parameters: Option<HashMap<String, String>>,
    pub session: Option<String>,
}

impl RespondToAuthChallenge {
    pub fn parameter(&self, name: &str) -> Option<&str> {
        self.challenge_parameters
            .as_ref()
            .and_then(|params| params.get(name))
            .map(String::as_str)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RespondToChallengeRequest {
    pub client_id: String,
    pub challenge_name: ChallengeName,
    pub challenge_responses: HashMap<String, String>,
    pub session: Option<String>,
}

/// Device confirmation payload: the verifier attributes the service
/// stores for later device SRP.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceVerifierAttributes {
    pub salt_base64: String,
    pub password_verifier_base64: String,
}

/// Attributes returned by a user lookup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserProfile {
    pub username: String,
    pub attributes: HashMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityCredentials {
    pub identity_id: String,
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: String,
    pub expires_at: chrono::DateTime<chrono::Utc>,
}

/// The service client the engine talks to. All methods are cancel-safe;
/// the engine may drop a call without observing its result.
#[async_trait]
pub trait IdentityProviderClient: Send + Sync + 'static {
    async fn initiate_auth(&self, request: InitiateAuthRequest)
        -> Result<AuthResponse, ServiceError>;

    async fn respond_to_challenge(
        &self,
        request: RespondToChallengeRequest,
    ) -> Result<AuthResponse, ServiceError>;

    async fn confirm_device(
        &self,
        access_token: &str,
        device_key: &str,
        verifier: DeviceVerifierAttributes,
    ) -> Result<(), ServiceError>;

    async fn global_sign_out(&self, access_token: &str) -> Result<(), ServiceError>;

    async fn forgot_password(
        &self,
        client_id: &str,
        secret_hash: Option<&str>,
        username: &str,
    ) -> Result<(), ServiceError>;

    async fn confirm_forgot_password(
        &self,
        client_id: &str,
        secret_hash: Option<&str>,
        username: &str,
        confirmation_code: &str,
        new_password: &str,
    ) -> Result<(), ServiceError>;

    async fn get_user(&self, access_token: &str) -> Result<UserProfile, ServiceError>;

    async fn revoke_token(
        &self,
        client_id: &str,
        client_secret: Option<&str>,
        refresh_token: &str,
    ) -> Result<(), ServiceError>;

    async fn delete_user(&self, access_token: &str) -> Result<(), ServiceError>;

    /// Exchange user pool tokens for identity pool AWS credentials.
    /// `id_token` is `None` for unauthenticated (guest) identities.
    async fn fetch_identity_credentials(
        &self,
        identity_pool_id: &str,
        id_token: Option<&str>,
    ) -> Result<IdentityCredentials, ServiceError>;
}

/// `base64(HMAC-SHA256(client_secret, username + client_id))`, required
/// on every request when the app client has a secret.
pub fn secret_hash(username: &str, client_id: &str, client_secret: &str) -> Result<String, AuthError> {
    let mut mac = Hmac::<Sha256>::new_from_slice(client_secret.as_bytes())
        .map_err(|e| AuthError::Configuration(format!("invalid client secret: {e}")))?;
    mac.update(username.as_bytes());
    mac.update(client_id.as_bytes());
    Ok(BASE64.encode(mac.finalize().into_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_classification_covers_transport_and_unavailable() {
        assert!(ServiceError::Transport("reset".into()).is_transient());
        assert!(ServiceError::Unavailable("throttled".into()).is_transient());
        assert!(!ServiceError::NotAuthorized("denied".into()).is_transient());
        assert!(!ServiceError::ResourceNotFound("device".into()).is_transient());
    }

    #[test]
    fn secret_hash_is_deterministic_and_base64() {
        let a = secret_hash("alice", "client-1", "s3cret").unwrap();
        let b = secret_hash("alice", "client-1", "s3cret").unwrap();
        assert_eq!(a, b);
        assert!(BASE64.decode(&a).is_ok());
        assert_ne!(a, secret_hash("bob", "client-1", "s3cret").unwrap());
    }
}
