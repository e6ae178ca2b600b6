//! Sign-in actions: SRP initiation, the password proof, and follow-up
//! challenge verification.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use chrono::Duration;
use rand::rngs::OsRng;
use rand::RngCore as _;
use tracing::{debug, warn};

use aegis_core::{EffectfulAction, EventDispatcher};
use aegis_srp::{generate_device_password_verifier, srp_timestamp};

use crate::actions::optional_secret_hash;
use crate::credentials::{SecretString, SignInCredentials, SignInMethod, SignedInData};
use crate::environment::AuthEnvironment;
use crate::error::AuthError;
use crate::events::{
    AuthEvent, AuthEventPayload, SignInChallengeEvent, SrpSignInEvent,
};
use crate::provider::{
    challenge_params, AuthFlow, AuthResponse, AuthenticationResult, ChallengeName,
    DeviceVerifierAttributes, InitiateAuthRequest, RespondToAuthChallenge,
    RespondToChallengeRequest, ServiceError,
};
use crate::states::sign_in::{challenge_event, PublishedChallenge};
use crate::states::srp::SrpStateData;
use crate::store::DeviceMetadata;

fn srp_event(payload: SrpSignInEvent) -> AuthEvent {
    AuthEvent::new(AuthEventPayload::SrpSignIn(payload))
}

/// Start an SRP exchange: generate the ephemeral pair and send `SRP_A`.
#[derive(Debug)]
pub struct InitiateSrpAuth {
    pub credentials: SignInCredentials,
}

#[async_trait]
impl EffectfulAction for InitiateSrpAuth {
    type Event = AuthEvent;
    type Environment = AuthEnvironment;

    fn id(&self) -> &str {
        "InitiateSrpAuth"
    }

    async fn execute(
        self: Box<Self>,
        dispatcher: EventDispatcher<AuthEvent>,
        environment: Arc<AuthEnvironment>,
    ) {
        // A new attempt supersedes any stale cancellation.
        environment.sign_in_cancelled.clear();

        let Some(user_pool) = environment.configuration.user_pool() else {
            dispatcher.send(srp_event(SrpSignInEvent::ThrowAuthError(
                AuthError::Configuration("no user pool configured for sign-in".into()),
            )));
            return;
        };

        let key_pair = match environment.srp_client.generate_key_pair() {
            Ok(pair) => pair,
            Err(error) => {
                dispatcher.send(srp_event(SrpSignInEvent::ThrowAuthError(error.into())));
                return;
            }
        };

        let mut auth_parameters = HashMap::new();
        auth_parameters.insert(
            challenge_params::USERNAME.to_owned(),
            self.credentials.username.clone(),
        );
        auth_parameters.insert(
            challenge_params::SRP_A.to_owned(),
            key_pair.public_key_hex().to_owned(),
        );
        match optional_secret_hash(user_pool, &self.credentials.username) {
            Ok(Some(hash)) => {
                auth_parameters.insert(challenge_params::SECRET_HASH.to_owned(), hash);
            }
            Ok(None) => {}
            Err(error) => {
                dispatcher.send(srp_event(SrpSignInEvent::ThrowAuthError(error)));
                return;
            }
        }
        if let Ok(Some(device)) = environment
            .credential_store
            .retrieve_device_metadata(&self.credentials.username)
        {
            auth_parameters.insert(challenge_params::DEVICE_KEY.to_owned(), device.device_key);
        }

        let request = InitiateAuthRequest {
            client_id: user_pool.client_id.clone(),
            auth_flow: AuthFlow::UserSrpAuth,
            auth_parameters,
        };

        debug!(username = %self.credentials.username, "initiating SRP auth");
        match environment.provider.initiate_auth(request).await {
            Ok(response) if response.challenge_name == Some(ChallengeName::PasswordVerifier) => {
                let state_data = SrpStateData {
                    username: self.credentials.username.clone(),
                    password: self.credentials.password.clone(),
                    key_pair,
                    started_at: chrono::Utc::now(),
                };
                let challenge = RespondToAuthChallenge {
                    challenge_name: response.challenge_name,
                    challenge_parameters: response.challenge_parameters,
                    session: response.session,
                };
                dispatcher.send(srp_event(SrpSignInEvent::RespondPasswordVerifier {
                    state_data,
                    challenge,
                }));
            }
            Ok(_) => {
                dispatcher.send(srp_event(SrpSignInEvent::ThrowAuthError(
                    AuthError::InvalidServiceResponse(
                        "SRP initiation did not return a password verifier challenge".into(),
                    ),
                )));
            }
            Err(error) => {
                dispatcher.send(srp_event(SrpSignInEvent::ThrowAuthError(
                    AuthError::from_service(error),
                )));
            }
        }
    }
}

/// Compute and submit the password claim proof.
#[derive(Debug)]
pub struct VerifyPasswordSrp {
    pub state_data: SrpStateData,
    pub challenge: RespondToAuthChallenge,
    /// Set on the one retry allowed after a `ResourceNotFound` for the
    /// remembered device.
    pub retried: bool,
}

impl VerifyPasswordSrp {
    fn missing(parameter: &str) -> AuthError {
        AuthError::InvalidServiceResponse(format!(
            "password verifier challenge is missing {parameter}"
        ))
    }

    fn signed_in_data(
        result: &AuthenticationResult,
        user_id: &str,
        username: &str,
        method: SignInMethod,
    ) -> Result<SignedInData, AuthError> {
        let Some(refresh_token) = result.refresh_token.clone() else {
            return Err(AuthError::InvalidServiceResponse(
                "authentication result carries no refresh token".into(),
            ));
        };
        let now = chrono::Utc::now();
        Ok(SignedInData {
            user_id: user_id.to_owned(),
            username: username.to_owned(),
            signed_in_at: now,
            sign_in_method: method,
            tokens: crate::credentials::UserPoolTokens {
                id_token: result.id_token.clone(),
                access_token: result.access_token.clone(),
                refresh_token,
                expires_at: crate::credentials::UserPoolTokens::earliest_expiry(
                    &result.id_token,
                    &result.access_token,
                    now + Duration::seconds(result.expires_in_seconds),
                ),
            },
        })
    }
}

#[async_trait]
impl EffectfulAction for VerifyPasswordSrp {
    type Event = AuthEvent;
    type Environment = AuthEnvironment;

    fn id(&self) -> &str {
        if self.retried {
            "VerifyPasswordSrpRetry"
        } else {
            "VerifyPasswordSrp"
        }
    }

    async fn execute(
        self: Box<Self>,
        dispatcher: EventDispatcher<AuthEvent>,
        environment: Arc<AuthEnvironment>,
    ) {
        let throw = |error: AuthError| {
            dispatcher.send(srp_event(SrpSignInEvent::ThrowPasswordVerifierError(error)));
        };

        let Some(user_pool) = environment.configuration.user_pool() else {
            throw(AuthError::Configuration(
                "no user pool configured for sign-in".into(),
            ));
            return;
        };

        let salt = match self.challenge.parameter(challenge_params::SALT) {
            Some(salt) if !salt.is_empty() => salt.to_owned(),
            _ => {
                throw(Self::missing(challenge_params::SALT));
                return;
            }
        };
        let Some(secret_block) = self.challenge.parameter(challenge_params::SECRET_BLOCK) else {
            throw(Self::missing(challenge_params::SECRET_BLOCK));
            return;
        };
        let Some(server_public) = self.challenge.parameter(challenge_params::SRP_B) else {
            throw(Self::missing(challenge_params::SRP_B));
            return;
        };
        let Ok(secret_block_bytes) = BASE64.decode(secret_block) else {
            throw(AuthError::InvalidServiceResponse(
                "secret block is not valid base64".into(),
            ));
            return;
        };

        let username = self
            .challenge
            .parameter(challenge_params::USERNAME)
            .unwrap_or(&self.state_data.username)
            .to_owned();
        let user_id_for_srp = self
            .challenge
            .parameter(challenge_params::USER_ID_FOR_SRP)
            .unwrap_or(&username)
            .to_owned();

        let device = if self.retried {
            None
        } else {
            environment
                .credential_store
                .retrieve_device_metadata(&username)
                .unwrap_or_else(|error| {
                    warn!(%error, "device metadata unavailable, continuing without it");
                    None
                })
        };

        let timestamp = srp_timestamp(self.state_data.started_at);
        let srp_username = format!("{}{user_id_for_srp}", user_pool.pool_name());
        let srp = &environment.srp_client;

        let proof = (|| -> Result<(String, String), AuthError> {
            let u = srp.calculate_u(
                self.state_data.key_pair.public_key_hex(),
                server_public,
            )?;
            let shared_secret = srp.calculate_shared_secret(
                &srp_username,
                self.state_data.password.expose(),
                &salt,
                self.state_data.key_pair.private_key_hex(),
                self.state_data.key_pair.public_key_hex(),
                server_public,
            )?;
            let key = srp.authentication_key(&shared_secret, &u.to_str_radix(16))?;
            let signature = srp.authentication_signature(
                &key,
                user_pool.pool_name(),
                &user_id_for_srp,
                &secret_block_bytes,
                &timestamp,
            )?;
            Ok((BASE64.encode(signature), timestamp.clone()))
        })();
        let (signature, timestamp) = match proof {
            Ok(proof) => proof,
            Err(error) => {
                throw(error);
                return;
            }
        };

        let mut responses = HashMap::new();
        responses.insert(challenge_params::USERNAME.to_owned(), username.clone());
        responses.insert(
            challenge_params::PASSWORD_CLAIM_SECRET_BLOCK.to_owned(),
            secret_block.to_owned(),
        );
        responses.insert(
            challenge_params::PASSWORD_CLAIM_SIGNATURE.to_owned(),
            signature,
        );
        responses.insert(challenge_params::TIMESTAMP.to_owned(), timestamp);
        match optional_secret_hash(user_pool, &username) {
            Ok(Some(hash)) => {
                responses.insert(challenge_params::SECRET_HASH.to_owned(), hash);
            }
            Ok(None) => {}
            Err(error) => {
                throw(error);
                return;
            }
        }
        if let Some(device) = &device {
            responses.insert(
                challenge_params::DEVICE_KEY.to_owned(),
                device.device_key.clone(),
            );
        }

        let request = RespondToChallengeRequest {
            client_id: user_pool.client_id.clone(),
            challenge_name: ChallengeName::PasswordVerifier,
            challenge_responses: responses,
            session: self.challenge.session.clone(),
        };

        match environment.provider.respond_to_challenge(request).await {
            Ok(response) => {
                handle_sign_in_response(
                    response,
                    &user_id_for_srp,
                    &username,
                    SignInMethod::Srp,
                    &dispatcher,
                    &environment,
                )
                .await;
            }
            Err(ServiceError::ResourceNotFound(reason)) if !self.retried => {
                // The remembered device is gone server side; retry once
                // without device association.
                debug!(%reason, "device not found, retrying without device data");
                if let Err(error) = environment.credential_store.remove_device_metadata(&username)
                {
                    warn!(%error, "failed to drop stale device metadata");
                }
                dispatcher.send(srp_event(SrpSignInEvent::RetryRespondPasswordVerifier {
                    state_data: self.state_data,
                    challenge: self.challenge,
                }));
            }
            Err(error) => throw(AuthError::from_service(error)),
        }
    }
}

/// Shared tail of the proof and challenge-answer actions: tokens become
/// `SignedInData`, a named challenge becomes its dedicated event.
async fn handle_sign_in_response(
    response: AuthResponse,
    user_id: &str,
    username: &str,
    method: SignInMethod,
    dispatcher: &EventDispatcher<AuthEvent>,
    environment: &Arc<AuthEnvironment>,
) {
    if let Some(result) = &response.authentication_result {
        let data = match VerifyPasswordSrp::signed_in_data(result, user_id, username, method) {
            Ok(data) => data,
            Err(error) => {
                dispatcher.send(srp_event(SrpSignInEvent::ThrowPasswordVerifierError(error)));
                return;
            }
        };
        if let Some(new_device) = &result.new_device_metadata {
            confirm_device(new_device, &data, username, environment).await;
        }
        if environment.sign_in_cancelled.is_raised() {
            // A sign-out won the race; the result is discarded before it
            // can reach the machine.
            debug!(%username, "sign-in was cancelled, dropping completed attempt");
            return;
        }
        dispatcher.send(srp_event(SrpSignInEvent::FinalizeSrpSignIn(data)));
        return;
    }

    let Some(name) = response.challenge_name else {
        dispatcher.send(srp_event(SrpSignInEvent::ThrowPasswordVerifierError(
            AuthError::InvalidServiceResponse(
                "response carried neither tokens nor a challenge".into(),
            ),
        )));
        return;
    };
    let published = PublishedChallenge {
        challenge: RespondToAuthChallenge {
            challenge_name: Some(name),
            challenge_parameters: response.challenge_parameters,
            session: response.session,
        },
        username: username.to_owned(),
    };
    match challenge_event(name, published) {
        Some(event) => dispatcher.send(AuthEvent::new(AuthEventPayload::Challenge(event))),
        None => dispatcher.send(srp_event(SrpSignInEvent::ThrowPasswordVerifierError(
            AuthError::InvalidServiceResponse(
                "service repeated the password verifier challenge".into(),
            ),
        ))),
    }
}

/// Register the newly issued device: derive a verifier, confirm it with
/// the service, and remember the material for future `DEVICE_KEY` use.
/// Failures are logged and do not fail the sign-in.
async fn confirm_device(
    new_device: &crate::provider::NewDeviceMetadata,
    data: &SignedInData,
    username: &str,
    environment: &Arc<AuthEnvironment>,
) {
    let mut password_bytes = [0u8; 16];
    OsRng.fill_bytes(&mut password_bytes);
    let device_password = hex::encode(password_bytes);

    let verifier = match generate_device_password_verifier(
        &new_device.device_group_key,
        &new_device.device_key,
        &device_password,
        environment.srp_client.group(),
    ) {
        Ok(verifier) => verifier,
        Err(error) => {
            warn!(%error, "device verifier generation failed, skipping device confirmation");
            return;
        }
    };
    let attributes = DeviceVerifierAttributes {
        salt_base64: BASE64.encode(&verifier.salt),
        password_verifier_base64: BASE64.encode(&verifier.password_verifier),
    };
    if let Err(error) = environment
        .provider
        .confirm_device(&data.tokens.access_token, &new_device.device_key, attributes)
        .await
    {
        warn!(%error, "device confirmation failed");
        return;
    }
    let metadata = DeviceMetadata {
        device_key: new_device.device_key.clone(),
        device_group_key: new_device.device_group_key.clone(),
        device_secret: device_password,
    };
    if let Err(error) = environment
        .credential_store
        .save_device_metadata(username, &metadata)
    {
        warn!(%error, "failed to persist device metadata");
    }
}

/// Raise the cancellation flag so the in-flight attempt cannot commit.
#[derive(Debug)]
pub struct CancelSignIn;

#[async_trait]
impl EffectfulAction for CancelSignIn {
    type Event = AuthEvent;
    type Environment = AuthEnvironment;

    fn id(&self) -> &str {
        "CancelSignIn"
    }

    async fn execute(
        self: Box<Self>,
        _dispatcher: EventDispatcher<AuthEvent>,
        environment: Arc<AuthEnvironment>,
    ) {
        environment.sign_in_cancelled.raise();
    }
}

/// Answer a named follow-up challenge with the caller's response.
#[derive(Debug)]
pub struct VerifySignInChallenge {
    pub challenge: PublishedChallenge,
    pub answer: SecretString,
}

impl VerifySignInChallenge {
    /// The response key the service expects for each challenge kind.
    fn answer_key(name: ChallengeName) -> Option<&'static str> {
        match name {
            ChallengeName::SmsMfa => Some("SMS_MFA_CODE"),
            ChallengeName::NewPasswordRequired => Some("NEW_PASSWORD"),
            ChallengeName::CustomChallenge => Some("ANSWER"),
            ChallengeName::DeviceSrpAuth | ChallengeName::PasswordVerifier => None,
        }
    }
}

#[async_trait]
impl EffectfulAction for VerifySignInChallenge {
    type Event = AuthEvent;
    type Environment = AuthEnvironment;

    fn id(&self) -> &str {
        "VerifySignInChallenge"
    }

    async fn execute(
        self: Box<Self>,
        dispatcher: EventDispatcher<AuthEvent>,
        environment: Arc<AuthEnvironment>,
    ) {
        let throw = |error: AuthError| {
            dispatcher.send(AuthEvent::new(AuthEventPayload::Challenge(
                SignInChallengeEvent::ThrowError(error),
            )));
        };

        let Some(user_pool) = environment.configuration.user_pool() else {
            throw(AuthError::Configuration(
                "no user pool configured for sign-in".into(),
            ));
            return;
        };
        let Some(name) = self.challenge.challenge.challenge_name else {
            throw(AuthError::Validation("challenge has no name".into()));
            return;
        };
        let Some(answer_key) = Self::answer_key(name) else {
            throw(AuthError::Validation(format!(
                "challenge {name:?} cannot be answered with a plain response"
            )));
            return;
        };

        let username = self.challenge.username.clone();
        let mut responses = HashMap::new();
        responses.insert(challenge_params::USERNAME.to_owned(), username.clone());
        responses.insert(answer_key.to_owned(), self.answer.expose().to_owned());
        match optional_secret_hash(user_pool, &username) {
            Ok(Some(hash)) => {
                responses.insert(challenge_params::SECRET_HASH.to_owned(), hash);
            }
            Ok(None) => {}
            Err(error) => {
                throw(error);
                return;
            }
        }

        let request = RespondToChallengeRequest {
            client_id: user_pool.client_id.clone(),
            challenge_name: name,
            challenge_responses: responses,
            session: self.challenge.challenge.session.clone(),
        };
        match environment.provider.respond_to_challenge(request).await {
            Ok(response) => {
                handle_sign_in_response(
                    response,
                    &username,
                    &username,
                    SignInMethod::Challenge,
                    &dispatcher,
                    &environment,
                )
                .await;
            }
            Err(error) => throw(AuthError::from_service(error)),
        }
    }
}
