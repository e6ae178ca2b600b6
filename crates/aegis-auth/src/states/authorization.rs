//! Authorization state: session fetch and refresh.

use chrono::Duration;

use aegis_core::StateResolution;
use tracing::debug;

use crate::actions::session::{FetchAuthSession, RefreshSession};
use crate::credentials::AuthCredentials;
use crate::environment::AuthEnvironment;
use crate::error::SessionError;
use crate::events::{AuthEvent, AuthEventPayload, AuthorizationEvent};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthorizationState {
    NotConfigured,
    FetchingSession,
    SessionEstablished(AuthCredentials),
    RefreshingSession(AuthCredentials),
    Error(SessionError),
}

impl AuthorizationState {
    pub fn credentials(&self) -> Option<&AuthCredentials> {
        match self {
            AuthorizationState::SessionEstablished(credentials)
            | AuthorizationState::RefreshingSession(credentials) => Some(credentials),
            _ => None,
        }
    }
}

impl aegis_core::State for AuthorizationState {}

type AuthorizationResolution = StateResolution<AuthorizationState, AuthEvent, AuthEnvironment>;

#[derive(Debug)]
pub struct AuthorizationResolver {
    /// Tokens whose expiry falls inside this window of the event time
    /// are refreshed rather than reused.
    refresh_lead_time: Duration,
}

impl AuthorizationResolver {
    pub fn new(refresh_lead_time: Duration) -> Self {
        Self { refresh_lead_time }
    }

    pub fn resolve(
        &self,
        old_state: &AuthorizationState,
        event: &AuthEvent,
    ) -> AuthorizationResolution {
        let AuthEventPayload::Authorization(authorization_event) = &event.payload else {
            return AuthorizationResolution::from(old_state.clone());
        };
        match (old_state, authorization_event) {
            (
                AuthorizationState::NotConfigured
                | AuthorizationState::SessionEstablished(_)
                | AuthorizationState::Error(_),
                AuthorizationEvent::FetchSession(data),
            ) => AuthorizationResolution::with_actions(
                AuthorizationState::FetchingSession,
                vec![Box::new(FetchAuthSession { data: data.clone() })],
            ),
            (
                AuthorizationState::FetchingSession,
                AuthorizationEvent::SessionEstablished(credentials),
            ) => AuthorizationResolution::from(AuthorizationState::SessionEstablished(
                credentials.clone(),
            )),
            (
                AuthorizationState::SessionEstablished(credentials),
                AuthorizationEvent::RefreshSession { force },
            ) => {
                if *force || self.is_expiring(credentials, event) {
                    AuthorizationResolution::with_actions(
                        AuthorizationState::RefreshingSession(credentials.clone()),
                        vec![Box::new(RefreshSession {
                            credentials: credentials.clone(),
                        })],
                    )
                } else {
                    debug!("session still valid, skipping refresh");
                    AuthorizationResolution::from(old_state.clone())
                }
            }
            (
                AuthorizationState::RefreshingSession(_),
                AuthorizationEvent::SessionRefreshed(credentials),
            ) => AuthorizationResolution::from(AuthorizationState::SessionEstablished(
                credentials.clone(),
            )),
            (
                AuthorizationState::FetchingSession | AuthorizationState::RefreshingSession(_),
                AuthorizationEvent::ThrowError(error),
            ) => AuthorizationResolution::from(AuthorizationState::Error(error.clone())),
            (_, AuthorizationEvent::ClearSession) => AuthorizationResolution::from(
                AuthorizationState::SessionEstablished(AuthCredentials::NoCredentials),
            ),
            _ => AuthorizationResolution::from(old_state.clone()),
        }
    }

    /// Any present credential inside the lead window makes the whole
    /// session expiring; the most conservative expiry governs.
    fn is_expiring(&self, credentials: &AuthCredentials, event: &AuthEvent) -> bool {
        let now = event.time;
        let tokens_expiring = credentials
            .user_pool_tokens()
            .is_some_and(|tokens| tokens.is_expiring_within(self.refresh_lead_time, now));
        let aws_expiring = credentials
            .aws_credentials()
            .is_some_and(|aws| aws.is_expiring_within(self.refresh_lead_time, now));
        tokens_expiring || aws_expiring
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::{SignInMethod, SignedInData, UserPoolTokens};
    use assert_matches::assert_matches;
    use chrono::Utc;

    fn resolver() -> AuthorizationResolver {
        AuthorizationResolver::new(Duration::minutes(2))
    }

    fn credentials(expires_in: Duration) -> AuthCredentials {
        AuthCredentials::UserPoolOnly {
            signed_in_data: SignedInData {
                user_id: "user-1".into(),
                username: "alice".into(),
                signed_in_at: Utc::now(),
                sign_in_method: SignInMethod::Srp,
                tokens: UserPoolTokens {
                    id_token: "id".into(),
                    access_token: "access".into(),
                    refresh_token: "refresh".into(),
                    expires_at: Utc::now() + expires_in,
                },
            },
        }
    }

    fn refresh_event(force: bool) -> AuthEvent {
        AuthEvent::new(AuthEventPayload::Authorization(
            AuthorizationEvent::RefreshSession { force },
        ))
    }

    #[test]
    fn valid_session_is_not_refreshed_without_force() {
        let state = AuthorizationState::SessionEstablished(credentials(Duration::hours(1)));
        let resolution = resolver().resolve(&state, &refresh_event(false));
        assert_eq!(resolution.new_state, state);
        assert!(resolution.actions.is_empty());
    }

    #[test]
    fn expiring_session_triggers_refresh() {
        let state = AuthorizationState::SessionEstablished(credentials(Duration::seconds(30)));
        let resolution = resolver().resolve(&state, &refresh_event(false));
        assert_matches!(resolution.new_state, AuthorizationState::RefreshingSession(_));
        assert_eq!(resolution.actions[0].id(), "RefreshSession");
    }

    #[test]
    fn force_refreshes_even_a_valid_session() {
        let state = AuthorizationState::SessionEstablished(credentials(Duration::hours(1)));
        let resolution = resolver().resolve(&state, &refresh_event(true));
        assert_matches!(resolution.new_state, AuthorizationState::RefreshingSession(_));
    }

    #[test]
    fn clear_resets_to_no_credentials() {
        let state = AuthorizationState::SessionEstablished(credentials(Duration::hours(1)));
        let resolution = resolver().resolve(
            &state,
            &AuthEvent::new(AuthEventPayload::Authorization(
                AuthorizationEvent::ClearSession,
            )),
        );
        assert_eq!(
            resolution.new_state,
            AuthorizationState::SessionEstablished(AuthCredentials::NoCredentials)
        );
    }
}
