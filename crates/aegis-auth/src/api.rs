//! The caller-facing engine: one initiating event per operation, one
//! completion per call, observed through the machines' listeners.

use std::sync::Arc;

use chrono::Duration;
use parking_lot::Mutex;
use tokio::sync::oneshot;
use tracing::{debug, warn};

use aegis_core::{ListenerToken, Resolver, StateMachine};

use crate::configuration::AuthConfiguration;
use crate::credentials::{
    AuthCredentials, SecretString, SignInCredentials, SignedInData, SignedOutData,
};
use crate::environment::AuthEnvironment;
use crate::error::{AuthError, SessionError};
use crate::events::{
    AuthEvent, AuthEventPayload, AuthenticationEvent, AuthorizationEvent, CredentialStoreEvent,
    CredentialStoreEventPayload, SignInChallengeEvent,
};
use crate::provider::{IdentityProviderClient, UserProfile};
use crate::states::authentication::DeleteUserState;
use crate::states::credential_store::{CredentialStoreResolver, CredentialStoreState};
use crate::states::{
    AuthenticationState, AuthorizationState, SessionResolver, SessionState, SignInChallengeState,
    SignInState,
};
use crate::store::{AuthCredentialStore, LocalSettings, SecureStore};

/// How a sign-in call finished: either fully signed in, or parked on a
/// challenge the caller must answer through `confirm_sign_in`.
#[derive(Debug, Clone)]
pub enum SignInOutcome {
    Done(SignedInData),
    ChallengeRequired(crate::states::PublishedChallenge),
}

/// How sign-out should behave.
#[derive(Debug, Clone, Copy, Default)]
pub struct SignOutOptions {
    /// Revoke every issued token on every device, not just this one.
    pub global_sign_out: bool,
}

/// Construction knobs beyond the configuration itself.
#[derive(Debug, Clone, Default)]
pub struct EngineOptions {
    /// Shared storage scope for credentials, when the platform has one.
    pub access_group: Option<String>,
    /// Move existing items into a newly configured access group.
    pub migrate_shared_store: bool,
    /// Refresh lead time; `None` uses the two-minute default.
    pub refresh_lead_time: Option<Duration>,
}

/// The authentication engine: a session machine, a credential store
/// machine, and the operations that drive them.
pub struct AuthEngine {
    environment: Arc<AuthEnvironment>,
    session: StateMachine<SessionResolver>,
    store: StateMachine<CredentialStoreResolver>,
}

impl AuthEngine {
    pub fn new(
        configuration: AuthConfiguration,
        provider: Arc<dyn IdentityProviderClient>,
        secure_store: Arc<dyn SecureStore>,
        settings: Arc<dyn LocalSettings>,
        options: EngineOptions,
    ) -> Self {
        let credential_store = Arc::new(AuthCredentialStore::new(
            configuration.clone(),
            secure_store,
            settings,
            options.access_group.clone(),
            options.migrate_shared_store,
        ));
        let mut environment =
            AuthEnvironment::new(configuration, provider, credential_store);
        if let Some(lead) = options.refresh_lead_time {
            environment.token_refresh_lead_time = lead;
        }
        let environment = Arc::new(environment);

        let session = StateMachine::new(
            SessionResolver::new(environment.token_refresh_lead_time),
            SessionState::not_configured(),
            Arc::clone(&environment),
        );
        let store = StateMachine::new(
            CredentialStoreResolver,
            CredentialStoreState::Idle,
            Arc::clone(&environment),
        );
        Self {
            environment,
            session,
            store,
        }
    }

    /// Run store migration, restore any persisted session, and bring the
    /// state tree out of `notConfigured`.
    pub async fn configure(&self) -> Result<(), AuthError> {
        self.session
            .send(AuthEvent::new(AuthEventPayload::Authentication(
                AuthenticationEvent::Configure,
            )));
        self.store.send(CredentialStoreEvent::new(
            CredentialStoreEventPayload::MigrateLegacyStore,
        ));
        let outcome = wait_for(&self.store, |state: &CredentialStoreState| match state {
            CredentialStoreState::Idle => Some(Ok(())),
            CredentialStoreState::Error(error) => Some(Err(error.clone())),
            _ => None,
        })
        .await?;
        if let Err(error) = outcome {
            warn!(%error, "credential store unusable, configuring without stored session");
        }

        let restored = self
            .environment
            .credential_store
            .retrieve_credentials()
            .ok()
            .and_then(|credentials| credentials.signed_in_data().cloned());

        let starts_signed_out = restored.is_none();
        self.session
            .send(AuthEvent::new(AuthEventPayload::Authentication(
                AuthenticationEvent::Configured(restored),
            )));
        if starts_signed_out {
            // No restored user; still establish a (possibly guest)
            // session. The signed-in path fetches via the resolver.
            self.session
                .send(AuthEvent::new(AuthEventPayload::Authorization(
                    AuthorizationEvent::FetchSession(None),
                )));
        }
        // Do not return while the tree is still `notConfigured`; callers
        // may consult state immediately after.
        wait_for(&self.session, |state: &SessionState| {
            (!matches!(
                state.authentication,
                AuthenticationState::NotConfigured | AuthenticationState::Configuring
            ))
            .then_some(())
        })
        .await?;
        debug!("engine configured");
        Ok(())
    }

    /// SRP sign-in. Completes exactly once: with the signed-in user, a
    /// pending challenge, or a typed failure.
    pub async fn sign_in(
        &self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Result<SignInOutcome, AuthError> {
        match self.session.current_state().authentication {
            AuthenticationState::SignedOut(_) | AuthenticationState::Error(_) => {}
            AuthenticationState::NotConfigured | AuthenticationState::Configuring => {
                return Err(AuthError::Configuration("engine is not configured".into()))
            }
            _ => {
                return Err(AuthError::Validation(
                    "another authentication flow is already in progress".into(),
                ))
            }
        }

        self.session
            .send(AuthEvent::new(AuthEventPayload::Authentication(
                AuthenticationEvent::SignInRequested(SignInCredentials {
                    username: username.into(),
                    password: SecretString::new(password.into()),
                }),
            )));
        self.await_sign_in_outcome().await
    }

    /// Answer the pending sign-in challenge (`confirmSignIn`).
    pub async fn confirm_sign_in(
        &self,
        answer: impl Into<String>,
    ) -> Result<SignInOutcome, AuthError> {
        let waiting = matches!(
            self.session.current_state().authentication,
            AuthenticationState::SigningIn(SignInState::ResolvingChallenge(
                SignInChallengeState::WaitingForAnswer(_)
            ))
        );
        if !waiting {
            return Err(AuthError::Validation(
                "no sign-in challenge is awaiting an answer".into(),
            ));
        }
        self.session
            .send(AuthEvent::new(AuthEventPayload::Challenge(
                SignInChallengeEvent::VerifyChallengeAnswer(SecretString::new(answer.into())),
            )));
        self.await_sign_in_outcome().await
    }

    async fn await_sign_in_outcome(&self) -> Result<SignInOutcome, AuthError> {
        wait_for(&self.session, |state: &SessionState| {
            match &state.authentication {
                AuthenticationState::SignedIn(data) => Some(Ok(SignInOutcome::Done(data.clone()))),
                AuthenticationState::Error(error) => Some(Err(error.clone())),
                AuthenticationState::SignedOut(_) => Some(Err(AuthError::Unknown(
                    "sign-in was cancelled before completion".into(),
                ))),
                AuthenticationState::SigningIn(SignInState::ResolvingChallenge(
                    SignInChallengeState::WaitingForAnswer(challenge),
                )) => Some(Ok(SignInOutcome::ChallengeRequired(challenge.clone()))),
                _ => None,
            }
        })
        .await?
    }

    /// Sign out. Remote failures degrade to a local sign-out whose
    /// partial errors are reported in the returned data.
    pub async fn sign_out(&self, options: SignOutOptions) -> Result<SignedOutData, AuthError> {
        if matches!(
            self.session.current_state().authentication,
            AuthenticationState::NotConfigured | AuthenticationState::Configuring
        ) {
            return Err(AuthError::Configuration("engine is not configured".into()));
        }
        self.session
            .send(AuthEvent::new(AuthEventPayload::Authentication(
                AuthenticationEvent::SignOutRequested {
                    global_sign_out: options.global_sign_out,
                },
            )));
        wait_for(&self.session, |state: &SessionState| {
            match &state.authentication {
                AuthenticationState::SignedOut(data) => Some(Ok(data.clone())),
                AuthenticationState::Error(error) => Some(Err(error.clone())),
                _ => None,
            }
        })
        .await?
    }

    /// Current session credentials, refreshing them when expiring or
    /// when `force_refresh` is set.
    pub async fn fetch_session(
        &self,
        force_refresh: bool,
    ) -> Result<AuthCredentials, SessionError> {
        let SessionState {
            authentication,
            authorization,
        } = self.session.current_state();
        let signed_in_data = match &authentication {
            AuthenticationState::SignedIn(data) => Some(data.clone()),
            _ => None,
        };
        match &authorization {
            // A signed-in user whose session holds no credentials is
            // stale (the post-sign-in fetch has not landed yet); fetch
            // rather than refresh.
            AuthorizationState::SessionEstablished(AuthCredentials::NoCredentials)
                if signed_in_data.is_some() =>
            {
                self.session
                    .send(AuthEvent::new(AuthEventPayload::Authorization(
                        AuthorizationEvent::FetchSession(signed_in_data),
                    )));
            }
            AuthorizationState::SessionEstablished(_) => {
                self.session
                    .send(AuthEvent::new(AuthEventPayload::Authorization(
                        AuthorizationEvent::RefreshSession {
                            force: force_refresh,
                        },
                    )));
            }
            AuthorizationState::NotConfigured | AuthorizationState::Error(_) => {
                self.session
                    .send(AuthEvent::new(AuthEventPayload::Authorization(
                        AuthorizationEvent::FetchSession(signed_in_data),
                    )));
            }
            // A fetch or refresh is already in flight; share its result.
            AuthorizationState::FetchingSession | AuthorizationState::RefreshingSession(_) => {}
        }
        wait_for(&self.session, |state: &SessionState| {
            match &state.authorization {
                AuthorizationState::SessionEstablished(credentials) => {
                    Some(Ok(credentials.clone()))
                }
                AuthorizationState::Error(error) => Some(Err(error.clone())),
                _ => None,
            }
        })
        .await
        .map_err(|_| SessionError::NoCredentialsToRefresh)?
    }

    /// Delete the signed-in user's account, then tear the session down.
    pub async fn delete_user(&self) -> Result<SignedOutData, AuthError> {
        if !matches!(
            self.session.current_state().authentication,
            AuthenticationState::SignedIn(_)
        ) {
            return Err(AuthError::Validation("no user is signed in".into()));
        }
        self.session
            .send(AuthEvent::new(AuthEventPayload::Authentication(
                AuthenticationEvent::DeleteUserRequested,
            )));
        wait_for(&self.session, |state: &SessionState| {
            match &state.authentication {
                AuthenticationState::SignedOut(data) => Some(Ok(data.clone())),
                AuthenticationState::DeletingUser(DeleteUserState::Failed(error, _)) => {
                    Some(Err(error.clone()))
                }
                _ => None,
            }
        })
        .await?
    }

    /// Start a password reset for `username`.
    pub async fn forgot_password(&self, username: &str) -> Result<(), AuthError> {
        let user_pool = self
            .environment
            .configuration
            .user_pool()
            .ok_or_else(|| AuthError::Configuration("no user pool configured".into()))?;
        let hash = crate::actions::optional_secret_hash(user_pool, username)?;
        self.environment
            .provider
            .forgot_password(&user_pool.client_id, hash.as_deref(), username)
            .await
            .map_err(AuthError::from_service)
    }

    /// Complete a password reset with the emailed/texted code.
    pub async fn confirm_forgot_password(
        &self,
        username: &str,
        confirmation_code: &str,
        new_password: &str,
    ) -> Result<(), AuthError> {
        let user_pool = self
            .environment
            .configuration
            .user_pool()
            .ok_or_else(|| AuthError::Configuration("no user pool configured".into()))?;
        let hash = crate::actions::optional_secret_hash(user_pool, username)?;
        self.environment
            .provider
            .confirm_forgot_password(
                &user_pool.client_id,
                hash.as_deref(),
                username,
                confirmation_code,
                new_password,
            )
            .await
            .map_err(AuthError::from_service)
    }

    /// Attributes of the signed-in user.
    pub async fn fetch_user_profile(&self) -> Result<UserProfile, AuthError> {
        let AuthenticationState::SignedIn(data) = self.session.current_state().authentication
        else {
            return Err(AuthError::Validation("no user is signed in".into()));
        };
        self.environment
            .provider
            .get_user(&data.tokens.access_token)
            .await
            .map_err(AuthError::from_service)
    }

    /// Observe every top-level state transition.
    pub fn listen(
        &self,
        callback: impl Fn(&SessionState) + Send + Sync + 'static,
    ) -> ListenerToken<SessionState> {
        self.session.listen(callback)
    }

    pub fn cancel(&self, token: &ListenerToken<SessionState>) {
        self.session.cancel(token);
    }

    pub fn current_state(&self) -> SessionState {
        self.session.current_state()
    }
}

/// Wait until the machine's state satisfies `predicate`, delivering its
/// mapped value exactly once. The subscription is registered after any
/// already-queued events, so a predicate match reflects the operation
/// the caller just submitted.
async fn wait_for<R, T>(
    machine: &StateMachine<R>,
    predicate: impl Fn(&R::State) -> Option<T> + Send + Sync + 'static,
) -> Result<T, AuthError>
where
    R: Resolver,
    T: Send + 'static,
{
    let (tx, rx) = oneshot::channel();
    let slot = Mutex::new(Some(tx));
    let token = machine.listen(move |state| {
        if let Some(value) = predicate(state) {
            if let Some(tx) = slot.lock().take() {
                let _ = tx.send(value);
            }
        }
    });
    let value = rx
        .await
        .map_err(|_| AuthError::Unknown("state machine terminated".into()));
    machine.cancel(&token);
    value
}
