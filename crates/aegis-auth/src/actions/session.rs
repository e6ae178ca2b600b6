//! Session actions: building credentials from sign-in data, refreshing
//! them, and persisting the result.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use aegis_core::{EffectfulAction, EventDispatcher};

use crate::actions::optional_secret_hash;
use crate::credentials::{AuthCredentials, AwsCredentials, SignedInData, UserPoolTokens};
use crate::environment::AuthEnvironment;
use crate::error::SessionError;
use crate::events::{AuthEvent, AuthEventPayload, AuthorizationEvent};
use crate::provider::{challenge_params, AuthFlow, InitiateAuthRequest, ServiceError};

const REFRESH_ATTEMPTS: usize = 3;

fn authorization_event(payload: AuthorizationEvent) -> AuthEvent {
    AuthEvent::new(AuthEventPayload::Authorization(payload))
}

/// Hand the authorization machine a fetch request. Used by the session
/// resolver's cross-cut so the fetch flows through the normal
/// `fetchingSession` transition instead of bypassing it.
#[derive(Debug)]
pub struct InitializeSessionFetch {
    pub data: Option<SignedInData>,
}

#[async_trait]
impl EffectfulAction for InitializeSessionFetch {
    type Event = AuthEvent;
    type Environment = AuthEnvironment;

    fn id(&self) -> &str {
        "InitializeSessionFetch"
    }

    async fn execute(
        self: Box<Self>,
        dispatcher: EventDispatcher<AuthEvent>,
        _environment: Arc<AuthEnvironment>,
    ) {
        dispatcher.send(authorization_event(AuthorizationEvent::FetchSession(
            self.data,
        )));
    }
}

/// Build the session's credentials from what authentication produced,
/// exchanging tokens for identity-pool credentials when one is
/// configured.
#[derive(Debug)]
pub struct FetchAuthSession {
    pub data: Option<SignedInData>,
}

#[async_trait]
impl EffectfulAction for FetchAuthSession {
    type Event = AuthEvent;
    type Environment = AuthEnvironment;

    fn id(&self) -> &str {
        "FetchAuthSession"
    }

    async fn execute(
        self: Box<Self>,
        dispatcher: EventDispatcher<AuthEvent>,
        environment: Arc<AuthEnvironment>,
    ) {
        let identity_pool = environment.configuration.identity_pool();
        let result = match (self.data, identity_pool) {
            // Signed in, no identity pool: the tokens are the session.
            (Some(data), None) => Ok(AuthCredentials::UserPoolOnly {
                signed_in_data: data,
            }),
            (Some(data), Some(identity_pool)) => environment
                .provider
                .fetch_identity_credentials(&identity_pool.pool_id, Some(&data.tokens.id_token))
                .await
                .map(|identity| AuthCredentials::UserPoolAndIdentityPool {
                    signed_in_data: data,
                    identity_id: identity.identity_id,
                    credentials: AwsCredentials {
                        access_key_id: identity.access_key_id,
                        secret_access_key: identity.secret_access_key,
                        session_token: identity.session_token,
                        expires_at: identity.expires_at,
                    },
                })
                .map_err(SessionError::Service),
            // Guest session through the identity pool.
            (None, Some(identity_pool)) => environment
                .provider
                .fetch_identity_credentials(&identity_pool.pool_id, None)
                .await
                .map(|identity| AuthCredentials::IdentityPoolOnly {
                    identity_id: identity.identity_id,
                    credentials: AwsCredentials {
                        access_key_id: identity.access_key_id,
                        secret_access_key: identity.secret_access_key,
                        session_token: identity.session_token,
                        expires_at: identity.expires_at,
                    },
                })
                .map_err(SessionError::Service),
            // Nothing to build a session from; an empty session is still
            // an established one.
            (None, None) => Ok(AuthCredentials::NoCredentials),
        };
        match result {
            Ok(credentials) => {
                dispatcher.send(authorization_event(AuthorizationEvent::SessionEstablished(
                    credentials,
                )));
            }
            Err(error) => {
                dispatcher.send(authorization_event(AuthorizationEvent::ThrowError(
                    map_session_error(error),
                )));
            }
        }
    }
}

/// Renew expiring credentials with the refresh token, then re-fetch the
/// identity-pool side when present. Transient service failures are
/// retried a bounded number of times here, not by the caller.
#[derive(Debug)]
pub struct RefreshSession {
    pub credentials: AuthCredentials,
}

impl RefreshSession {
    async fn refresh_tokens(
        environment: &Arc<AuthEnvironment>,
        data: &SignedInData,
    ) -> Result<UserPoolTokens, SessionError> {
        let user_pool = environment
            .configuration
            .user_pool()
            .ok_or(SessionError::NoUserPool)?;

        let mut auth_parameters = HashMap::new();
        auth_parameters.insert(
            "REFRESH_TOKEN".to_owned(),
            data.tokens.refresh_token.clone(),
        );
        match optional_secret_hash(user_pool, &data.username) {
            Ok(Some(hash)) => {
                auth_parameters.insert(challenge_params::SECRET_HASH.to_owned(), hash);
            }
            Ok(None) => {}
            Err(_) => return Err(SessionError::NoUserPool),
        }
        if let Ok(Some(device)) = environment
            .credential_store
            .retrieve_device_metadata(&data.username)
        {
            auth_parameters.insert(challenge_params::DEVICE_KEY.to_owned(), device.device_key);
        }

        let request = InitiateAuthRequest {
            client_id: user_pool.client_id.clone(),
            auth_flow: AuthFlow::RefreshTokenAuth,
            auth_parameters,
        };

        let mut last_error = None;
        for attempt in 1..=REFRESH_ATTEMPTS {
            match environment.provider.initiate_auth(request.clone()).await {
                Ok(response) => {
                    let Some(result) = response.authentication_result else {
                        return Err(SessionError::InvalidTokens);
                    };
                    let now = chrono::Utc::now();
                    let expires_at = UserPoolTokens::earliest_expiry(
                        &result.id_token,
                        &result.access_token,
                        now + chrono::Duration::seconds(result.expires_in_seconds),
                    );
                    return Ok(UserPoolTokens {
                        id_token: result.id_token,
                        access_token: result.access_token,
                        // Refresh does not rotate the refresh token.
                        refresh_token: data.tokens.refresh_token.clone(),
                        expires_at,
                    });
                }
                Err(error) if error.is_transient() && attempt < REFRESH_ATTEMPTS => {
                    debug!(%error, attempt, "transient refresh failure, retrying");
                    last_error = Some(error);
                }
                Err(ServiceError::NotAuthorized(_)) => return Err(SessionError::NotAuthorized),
                Err(error) => return Err(SessionError::Service(error)),
            }
        }
        Err(SessionError::Service(last_error.unwrap_or(
            ServiceError::Service("refresh retries exhausted".into()),
        )))
    }
}

#[async_trait]
impl EffectfulAction for RefreshSession {
    type Event = AuthEvent;
    type Environment = AuthEnvironment;

    fn id(&self) -> &str {
        "RefreshSession"
    }

    async fn execute(
        self: Box<Self>,
        dispatcher: EventDispatcher<AuthEvent>,
        environment: Arc<AuthEnvironment>,
    ) {
        let throw = |error: SessionError| {
            dispatcher.send(authorization_event(AuthorizationEvent::ThrowError(error)));
        };

        let refreshed = match &self.credentials {
            AuthCredentials::NoCredentials => Err(SessionError::NoCredentialsToRefresh),
            AuthCredentials::IdentityPoolOnly { .. } => {
                // Guest credentials are not refreshed, they are re-fetched.
                match environment.configuration.identity_pool() {
                    Some(identity_pool) => environment
                        .provider
                        .fetch_identity_credentials(&identity_pool.pool_id, None)
                        .await
                        .map(|identity| AuthCredentials::IdentityPoolOnly {
                            identity_id: identity.identity_id,
                            credentials: AwsCredentials {
                                access_key_id: identity.access_key_id,
                                secret_access_key: identity.secret_access_key,
                                session_token: identity.session_token,
                                expires_at: identity.expires_at,
                            },
                        })
                        .map_err(SessionError::Service),
                    None => Err(SessionError::NoIdentityPool),
                }
            }
            AuthCredentials::UserPoolOnly { signed_in_data } => {
                Self::refresh_tokens(&environment, signed_in_data)
                    .await
                    .map(|tokens| {
                        let mut data = signed_in_data.clone();
                        data.tokens = tokens;
                        AuthCredentials::UserPoolOnly {
                            signed_in_data: data,
                        }
                    })
            }
            AuthCredentials::UserPoolAndIdentityPool { signed_in_data, .. } => {
                match Self::refresh_tokens(&environment, signed_in_data).await {
                    Ok(tokens) => {
                        let mut data = signed_in_data.clone();
                        data.tokens = tokens;
                        match environment.configuration.identity_pool() {
                            Some(identity_pool) => environment
                                .provider
                                .fetch_identity_credentials(
                                    &identity_pool.pool_id,
                                    Some(&data.tokens.id_token),
                                )
                                .await
                                .map(|identity| AuthCredentials::UserPoolAndIdentityPool {
                                    signed_in_data: data,
                                    identity_id: identity.identity_id,
                                    credentials: AwsCredentials {
                                        access_key_id: identity.access_key_id,
                                        secret_access_key: identity.secret_access_key,
                                        session_token: identity.session_token,
                                        expires_at: identity.expires_at,
                                    },
                                })
                                .map_err(SessionError::Service),
                            None => Err(SessionError::NoIdentityPool),
                        }
                    }
                    Err(error) => Err(error),
                }
            }
        };

        match refreshed {
            Ok(credentials) => {
                debug!("session refreshed");
                dispatcher.send(authorization_event(AuthorizationEvent::SessionRefreshed(
                    credentials,
                )));
            }
            Err(error) => throw(error),
        }
    }
}

/// Persist established credentials. Storage failure is logged, never
/// fatal to the session that was just built.
#[derive(Debug)]
pub struct StoreSessionCredentials {
    pub credentials: AuthCredentials,
}

#[async_trait]
impl EffectfulAction for StoreSessionCredentials {
    type Event = AuthEvent;
    type Environment = AuthEnvironment;

    fn id(&self) -> &str {
        "StoreSessionCredentials"
    }

    async fn execute(
        self: Box<Self>,
        _dispatcher: EventDispatcher<AuthEvent>,
        environment: Arc<AuthEnvironment>,
    ) {
        if let Err(error) = environment.credential_store.save_credentials(&self.credentials) {
            warn!(%error, "failed to persist session credentials");
        }
    }
}

fn map_session_error(error: SessionError) -> SessionError {
    match error {
        SessionError::Service(ServiceError::NotAuthorized(_)) => SessionError::NotAuthorized,
        SessionError::Service(ServiceError::ResourceNotFound(message))
            if message.contains("identity") =>
        {
            SessionError::InvalidIdentityId
        }
        other => other,
    }
}
