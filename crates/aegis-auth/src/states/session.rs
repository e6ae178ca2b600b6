//! Root session state: authentication and authorization side by side.
//!
//! The resolver runs the mandatory two-phase pass: children first, then
//! cross-cutting decisions from the children's new values. Nothing here
//! inspects the raw event for cross-cuts.

use aegis_core::{Resolver, StateResolution};
use chrono::Duration;
use tracing::info;

use crate::actions::session::{InitializeSessionFetch, StoreSessionCredentials};
use crate::credentials::AuthCredentials;
use crate::environment::AuthEnvironment;
use crate::events::AuthEvent;
use crate::states::authentication::{AuthenticationResolver, AuthenticationState};
use crate::states::authorization::{AuthorizationResolver, AuthorizationState};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionState {
    pub authentication: AuthenticationState,
    pub authorization: AuthorizationState,
}

impl SessionState {
    pub fn not_configured() -> Self {
        Self {
            authentication: AuthenticationState::NotConfigured,
            authorization: AuthorizationState::NotConfigured,
        }
    }

    /// Signed in with an established session.
    pub fn is_ready(&self) -> bool {
        matches!(self.authentication, AuthenticationState::SignedIn(_))
            && matches!(
                self.authorization,
                AuthorizationState::SessionEstablished(_)
            )
    }
}

impl aegis_core::State for SessionState {}

type SessionResolution = StateResolution<SessionState, AuthEvent, AuthEnvironment>;

pub struct SessionResolver {
    authentication: AuthenticationResolver,
    authorization: AuthorizationResolver,
}

impl SessionResolver {
    pub fn new(refresh_lead_time: Duration) -> Self {
        Self {
            authentication: AuthenticationResolver::default(),
            authorization: AuthorizationResolver::new(refresh_lead_time),
        }
    }
}

impl Resolver for SessionResolver {
    type State = SessionState;
    type Event = AuthEvent;
    type Environment = AuthEnvironment;

    fn resolve(&self, old_state: &SessionState, event: &AuthEvent) -> SessionResolution {
        // Phase one: delegate to both children.
        let auth_resolution = self
            .authentication
            .resolve(&old_state.authentication, event);
        let authz_resolution = self.authorization.resolve(&old_state.authorization, event);

        let mut actions = auth_resolution.actions;
        actions.extend(authz_resolution.actions);
        let authentication = auth_resolution.new_state;
        let mut authorization = authz_resolution.new_state;

        // Phase two: derive cross-cuts from the new child states.

        // A fresh sign-in needs a session built from its tokens.
        let newly_signed_in = matches!(authentication, AuthenticationState::SignedIn(_))
            && !matches!(old_state.authentication, AuthenticationState::SignedIn(_));
        if newly_signed_in {
            if let AuthenticationState::SignedIn(data) = &authentication {
                actions.push(Box::new(InitializeSessionFetch {
                    data: Some(data.clone()),
                }));
            }
        }

        // A completed sign-out invalidates whatever session existed.
        let newly_signed_out = matches!(authentication, AuthenticationState::SignedOut(_))
            && matches!(old_state.authentication, AuthenticationState::SigningOut(_));
        if newly_signed_out {
            authorization =
                AuthorizationState::SessionEstablished(AuthCredentials::NoCredentials);
        }

        // An established or refreshed session is persisted.
        let session_changed = authorization != old_state.authorization;
        if session_changed {
            if let AuthorizationState::SessionEstablished(credentials) = &authorization {
                if *credentials != AuthCredentials::NoCredentials {
                    actions.push(Box::new(StoreSessionCredentials {
                        credentials: credentials.clone(),
                    }));
                }
            }
        }

        let new_state = SessionState {
            authentication,
            authorization,
        };
        if new_state.is_ready() && !old_state.is_ready() {
            info!("session ready");
        }
        SessionResolution::with_actions(new_state, actions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::{SignInMethod, SignedInData, SignedOutData, UserPoolTokens};
    use crate::events::{AuthEventPayload, AuthorizationEvent, SignOutEvent, SrpSignInEvent};
    use crate::states::sign_in::SignInState;
    use crate::states::sign_out::SignOutState;
    use crate::states::srp::{SrpSignInState, SrpStateData};
    use crate::credentials::SecretString;
    use aegis_srp::SrpKeyPair;
    use chrono::Utc;

    fn signed_in() -> SignedInData {
        SignedInData {
            user_id: "user-1".into(),
            username: "alice".into(),
            signed_in_at: Utc::now(),
            sign_in_method: SignInMethod::Srp,
            tokens: UserPoolTokens {
                id_token: "id".into(),
                access_token: "access".into(),
                refresh_token: "refresh".into(),
                expires_at: Utc::now() + Duration::hours(1),
            },
        }
    }

    fn resolver() -> SessionResolver {
        SessionResolver::new(Duration::minutes(2))
    }

    #[test]
    fn finalized_sign_in_kicks_off_a_session_fetch() {
        let old = SessionState {
            authentication: AuthenticationState::SigningIn(SignInState::Srp(
                SrpSignInState::NeedsPasswordVerifier(SrpStateData {
                    username: "alice".into(),
                    password: SecretString::new("hunter2"),
                    key_pair: SrpKeyPair::from_hex("ab", "cd"),
                    started_at: Utc::now(),
                }),
            )),
            authorization: AuthorizationState::NotConfigured,
        };
        let resolution = resolver().resolve(
            &old,
            &AuthEvent::new(AuthEventPayload::SrpSignIn(
                SrpSignInEvent::FinalizeSrpSignIn(signed_in()),
            )),
        );
        assert!(matches!(
            resolution.new_state.authentication,
            AuthenticationState::SignedIn(_)
        ));
        let ids: Vec<&str> = resolution.actions.iter().map(|a| a.id()).collect();
        assert!(ids.contains(&"InitializeSessionFetch"));
    }

    #[test]
    fn completed_sign_out_clears_the_session() {
        let old = SessionState {
            authentication: AuthenticationState::SigningOut(SignOutState::SigningOutLocally(
                SignedOutData::default(),
            )),
            authorization: AuthorizationState::SessionEstablished(AuthCredentials::UserPoolOnly {
                signed_in_data: signed_in(),
            }),
        };
        let resolution = resolver().resolve(
            &old,
            &AuthEvent::new(AuthEventPayload::SignOut(SignOutEvent::SignedOut(
                SignedOutData::default(),
            ))),
        );
        assert!(matches!(
            resolution.new_state.authentication,
            AuthenticationState::SignedOut(_)
        ));
        assert_eq!(
            resolution.new_state.authorization,
            AuthorizationState::SessionEstablished(AuthCredentials::NoCredentials)
        );
    }

    #[test]
    fn established_session_is_persisted() {
        let old = SessionState {
            authentication: AuthenticationState::SignedIn(signed_in()),
            authorization: AuthorizationState::FetchingSession,
        };
        let resolution = resolver().resolve(
            &old,
            &AuthEvent::new(AuthEventPayload::Authorization(
                AuthorizationEvent::SessionEstablished(AuthCredentials::UserPoolOnly {
                    signed_in_data: signed_in(),
                }),
            )),
        );
        let ids: Vec<&str> = resolution.actions.iter().map(|a| a.id()).collect();
        assert_eq!(ids, vec!["StoreSessionCredentials"]);
    }

    #[test]
    fn resolution_is_pure_for_fixed_inputs() {
        let old = SessionState::not_configured();
        let event = AuthEvent::new(AuthEventPayload::Authorization(
            AuthorizationEvent::FetchSession(None),
        ));
        let first = resolver().resolve(&old, &event);
        let second = resolver().resolve(&old, &event);
        assert_eq!(first.new_state, second.new_state);
        let first_ids: Vec<&str> = first.actions.iter().map(|a| a.id()).collect();
        let second_ids: Vec<&str> = second.actions.iter().map(|a| a.id()).collect();
        assert_eq!(first_ids, second_ids);
    }
}
