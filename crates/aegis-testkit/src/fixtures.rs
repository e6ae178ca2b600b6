//! Canned configurations and wire payloads.
//!
//! The SRP values here are well-formed hex, not a real handshake; the
//! mock provider never verifies the password proof, so tests only need
//! the parameters that the client-side math consumes.

use std::collections::HashMap;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use chrono::{Duration, Utc};

use aegis_auth::configuration::{
    AuthConfiguration, IdentityPoolConfiguration, UserPoolConfiguration,
};
use aegis_auth::provider::{
    challenge_params, AuthResponse, AuthenticationResult, ChallengeName, IdentityCredentials,
    NewDeviceMetadata,
};

pub const USERNAME: &str = "alice";
pub const PASSWORD: &str = "correct-horse";
pub const USER_ID_FOR_SRP: &str = "userid-alice";
pub const DEVICE_KEY: &str = "us-east-1_device-1";
pub const DEVICE_GROUP_KEY: &str = "group-1";

pub fn user_pool_configuration() -> AuthConfiguration {
    AuthConfiguration::UserPools(user_pool())
}

pub fn user_pool_with_secret() -> AuthConfiguration {
    let mut pool = user_pool();
    pool.client_secret = Some("app-secret".into());
    AuthConfiguration::UserPools(pool)
}

pub fn dual_pool_configuration() -> AuthConfiguration {
    AuthConfiguration::UserPoolsAndIdentityPools(
        user_pool(),
        IdentityPoolConfiguration {
            pool_id: "us-east-1:identity-pool".into(),
            region: "us-east-1".into(),
        },
    )
}

fn user_pool() -> UserPoolConfiguration {
    UserPoolConfiguration {
        pool_id: "us-east-1_testpool".into(),
        client_id: "client-1".into(),
        client_secret: None,
        region: "us-east-1".into(),
    }
}

/// The `PASSWORD_VERIFIER` challenge posed after SRP initiation.
pub fn password_verifier_challenge() -> AuthResponse {
    AuthResponse {
        challenge_name: Some(ChallengeName::PasswordVerifier),
        challenge_parameters: Some(password_verifier_parameters()),
        session: Some("session-1".into()),
        authentication_result: None,
    }
}

/// Same challenge with the salt dropped, for protocol-violation tests.
pub fn password_verifier_challenge_missing_salt() -> AuthResponse {
    let mut response = password_verifier_challenge();
    if let Some(params) = response.challenge_parameters.as_mut() {
        params.remove(challenge_params::SALT);
    }
    response
}

fn password_verifier_parameters() -> HashMap<String, String> {
    HashMap::from([
        (challenge_params::USERNAME.to_owned(), USERNAME.to_owned()),
        (
            challenge_params::USER_ID_FOR_SRP.to_owned(),
            USER_ID_FOR_SRP.to_owned(),
        ),
        (
            challenge_params::SALT.to_owned(),
            "a5d9c3".to_owned(),
        ),
        (
            challenge_params::SECRET_BLOCK.to_owned(),
            BASE64.encode(b"opaque-secret-block"),
        ),
        (
            challenge_params::SRP_B.to_owned(),
            "1b2c3d4e5f60718293a4b5c6d7e8f9010aabbccd".to_owned(),
        ),
    ])
}

/// A successful token issue, optionally asking the client to confirm a
/// new device.
pub fn tokens_response(with_new_device: bool) -> AuthResponse {
    AuthResponse {
        challenge_name: None,
        challenge_parameters: None,
        session: None,
        authentication_result: Some(AuthenticationResult {
            id_token: "id-token-1".into(),
            access_token: "access-token-1".into(),
            refresh_token: Some("refresh-token-1".into()),
            expires_in_seconds: 3600,
            new_device_metadata: with_new_device.then(|| NewDeviceMetadata {
                device_key: DEVICE_KEY.into(),
                device_group_key: DEVICE_GROUP_KEY.into(),
            }),
        }),
    }
}

/// A refreshed token issue: new id/access tokens, no rotated refresh
/// token, no device prompt.
pub fn refreshed_tokens_response() -> AuthResponse {
    AuthResponse {
        challenge_name: None,
        challenge_parameters: None,
        session: None,
        authentication_result: Some(AuthenticationResult {
            id_token: "id-token-2".into(),
            access_token: "access-token-2".into(),
            refresh_token: None,
            expires_in_seconds: 3600,
            new_device_metadata: None,
        }),
    }
}

/// An SMS MFA follow-up posed instead of tokens.
pub fn sms_mfa_challenge() -> AuthResponse {
    AuthResponse {
        challenge_name: Some(ChallengeName::SmsMfa),
        challenge_parameters: Some(HashMap::from([(
            challenge_params::USERNAME.to_owned(),
            USERNAME.to_owned(),
        )])),
        session: Some("session-2".into()),
        authentication_result: None,
    }
}

pub fn identity_credentials() -> IdentityCredentials {
    IdentityCredentials {
        identity_id: "us-east-1:identity-1".into(),
        access_key_id: "AKIDEXAMPLE".into(),
        secret_access_key: "secret-key".into(),
        session_token: "session-token".into(),
        expires_at: Utc::now() + Duration::hours(1),
    }
}
