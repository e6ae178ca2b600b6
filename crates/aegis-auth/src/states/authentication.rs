//! Top-level authentication state: configured-ness, the nested sign-in
//! and sign-out flows, and user deletion.

use aegis_core::StateResolution;
use tracing::debug;

use crate::actions::delete_user::DeleteUser;
use crate::actions::sign_in::CancelSignIn;
use crate::actions::sign_out::SignOutLocally;
use crate::credentials::{SignedInData, SignedOutData};
use crate::environment::AuthEnvironment;
use crate::error::AuthError;
use crate::events::{AuthEvent, AuthEventPayload, AuthenticationEvent, SignOutEvent};
use crate::states::sign_in::{SignInResolver, SignInState};
use crate::states::sign_out::{SignOutResolver, SignOutState};
use crate::states::srp::SrpSignInState;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeleteUserState {
    Deleting(SignedInData),
    Failed(AuthError, SignedInData),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthenticationState {
    NotConfigured,
    Configuring,
    SignedOut(SignedOutData),
    SigningIn(SignInState),
    SignedIn(SignedInData),
    SigningOut(SignOutState),
    DeletingUser(DeleteUserState),
    Error(AuthError),
}

impl aegis_core::State for AuthenticationState {}

type AuthenticationResolution = StateResolution<AuthenticationState, AuthEvent, AuthEnvironment>;

#[derive(Debug, Default)]
pub struct AuthenticationResolver {
    sign_in: SignInResolver,
    sign_out: SignOutResolver,
}

impl AuthenticationResolver {
    pub fn resolve(
        &self,
        old_state: &AuthenticationState,
        event: &AuthEvent,
    ) -> AuthenticationResolution {
        match old_state {
            AuthenticationState::NotConfigured | AuthenticationState::Configuring => {
                self.resolve_not_configured(old_state, event)
            }
            AuthenticationState::SignedOut(_) => self.resolve_signed_out(old_state, event),
            AuthenticationState::SigningIn(sign_in_state) => {
                self.resolve_signing_in(sign_in_state, event)
            }
            AuthenticationState::SignedIn(data) => self.resolve_signed_in(old_state, data, event),
            AuthenticationState::SigningOut(sign_out_state) => {
                self.resolve_signing_out(old_state, sign_out_state, event)
            }
            AuthenticationState::DeletingUser(delete_state) => {
                self.resolve_deleting(old_state, delete_state, event)
            }
            // A failed flow is recoverable: a fresh sign-in or sign-out
            // request restarts from the error state.
            AuthenticationState::Error(_) => self.resolve_signed_out(old_state, event),
        }
    }

    fn resolve_not_configured(
        &self,
        old_state: &AuthenticationState,
        event: &AuthEvent,
    ) -> AuthenticationResolution {
        match &event.payload {
            AuthEventPayload::Authentication(AuthenticationEvent::Configure) => {
                AuthenticationResolution::from(AuthenticationState::Configuring)
            }
            AuthEventPayload::Authentication(AuthenticationEvent::Configured(restored)) => {
                match restored {
                    Some(data) => {
                        debug!(username = %data.username, "restored previous session");
                        AuthenticationResolution::from(AuthenticationState::SignedIn(data.clone()))
                    }
                    None => AuthenticationResolution::from(AuthenticationState::SignedOut(
                        SignedOutData::default(),
                    )),
                }
            }
            _ => AuthenticationResolution::from(old_state.clone()),
        }
    }

    fn resolve_signed_out(
        &self,
        old_state: &AuthenticationState,
        event: &AuthEvent,
    ) -> AuthenticationResolution {
        match &event.payload {
            AuthEventPayload::Authentication(AuthenticationEvent::SignInRequested(_)) => {
                // Enter the sign-in sub-machine at its start and let it
                // consume the same event on the next delegation turn.
                let child = SignInState::Srp(SrpSignInState::NotStarted);
                let resolution = self.sign_in.resolve(
                    &child,
                    &remap_sign_in_request(event),
                );
                AuthenticationResolution::with_actions(
                    AuthenticationState::SigningIn(resolution.new_state),
                    resolution.actions,
                )
            }
            // Guest sign-out: nothing remote to revoke.
            AuthEventPayload::Authentication(AuthenticationEvent::SignOutRequested { .. }) => {
                let data = SignedOutData::default();
                AuthenticationResolution::with_actions(
                    AuthenticationState::SigningOut(SignOutState::SigningOutLocally(data.clone())),
                    vec![Box::new(SignOutLocally { data })],
                )
            }
            _ => AuthenticationResolution::from(old_state.clone()),
        }
    }

    fn resolve_signing_in(
        &self,
        sign_in_state: &SignInState,
        event: &AuthEvent,
    ) -> AuthenticationResolution {
        // A sign-out request wins over an in-flight sign-in: the pending
        // verifier action checks the raised flag before it can commit.
        if let AuthEventPayload::Authentication(AuthenticationEvent::SignOutRequested { .. }) =
            &event.payload
        {
            let data = SignedOutData::default();
            return AuthenticationResolution::with_actions(
                AuthenticationState::SigningOut(SignOutState::SigningOutLocally(data.clone())),
                vec![
                    Box::new(CancelSignIn),
                    Box::new(SignOutLocally { data }),
                ],
            );
        }

        let resolution = self.sign_in.resolve(sign_in_state, event);
        if let Some(data) = resolution.new_state.signed_in_data() {
            return AuthenticationResolution::with_actions(
                AuthenticationState::SignedIn(data.clone()),
                resolution.actions,
            );
        }
        if let Some(error) = resolution.new_state.error() {
            return AuthenticationResolution::with_actions(
                AuthenticationState::Error(error.clone()),
                resolution.actions,
            );
        }
        if resolution.new_state == SignInState::Srp(SrpSignInState::Cancelled) {
            return AuthenticationResolution::with_actions(
                AuthenticationState::SignedOut(SignedOutData::default()),
                resolution.actions,
            );
        }
        AuthenticationResolution::with_actions(
            AuthenticationState::SigningIn(resolution.new_state),
            resolution.actions,
        )
    }

    fn resolve_signed_in(
        &self,
        old_state: &AuthenticationState,
        data: &SignedInData,
        event: &AuthEvent,
    ) -> AuthenticationResolution {
        match &event.payload {
            AuthEventPayload::Authentication(AuthenticationEvent::SignOutRequested {
                global_sign_out,
            }) => {
                let child = SignOutState::NotStarted;
                let kickoff = if *global_sign_out {
                    SignOutEvent::SignOutGlobally(data.clone())
                } else {
                    SignOutEvent::RevokeToken(data.clone())
                };
                let resolution = self
                    .sign_out
                    .resolve(&child, &AuthEvent::new(AuthEventPayload::SignOut(kickoff)));
                AuthenticationResolution::with_actions(
                    AuthenticationState::SigningOut(resolution.new_state),
                    resolution.actions,
                )
            }
            AuthEventPayload::Authentication(AuthenticationEvent::DeleteUserRequested) => {
                AuthenticationResolution::with_actions(
                    AuthenticationState::DeletingUser(DeleteUserState::Deleting(data.clone())),
                    vec![Box::new(DeleteUser { data: data.clone() })],
                )
            }
            _ => AuthenticationResolution::from(old_state.clone()),
        }
    }

    fn resolve_signing_out(
        &self,
        _old_state: &AuthenticationState,
        sign_out_state: &SignOutState,
        event: &AuthEvent,
    ) -> AuthenticationResolution {
        let resolution = self.sign_out.resolve(sign_out_state, event);
        if let SignOutState::SignedOut(data) = &resolution.new_state {
            return AuthenticationResolution::with_actions(
                AuthenticationState::SignedOut(data.clone()),
                resolution.actions,
            );
        }
        AuthenticationResolution::with_actions(
            AuthenticationState::SigningOut(resolution.new_state),
            resolution.actions,
        )
    }

    fn resolve_deleting(
        &self,
        old_state: &AuthenticationState,
        delete_state: &DeleteUserState,
        event: &AuthEvent,
    ) -> AuthenticationResolution {
        match (&event.payload, delete_state) {
            (
                AuthEventPayload::Authentication(AuthenticationEvent::UserDeleted),
                DeleteUserState::Deleting(data),
            ) => {
                // Deletion revokes everything server side; only the
                // local teardown remains.
                let signed_out = SignedOutData {
                    last_known_username: Some(data.username.clone()),
                    ..SignedOutData::default()
                };
                AuthenticationResolution::with_actions(
                    AuthenticationState::SigningOut(SignOutState::SigningOutLocally(
                        signed_out.clone(),
                    )),
                    vec![Box::new(SignOutLocally { data: signed_out })],
                )
            }
            (
                AuthEventPayload::Authentication(AuthenticationEvent::DeleteUserFailed(error)),
                DeleteUserState::Deleting(data),
            ) => AuthenticationResolution::from(AuthenticationState::DeletingUser(
                DeleteUserState::Failed(error.clone(), data.clone()),
            )),
            // A failed deletion leaves a signed-in user who can retry,
            // sign out, or carry on.
            (_, DeleteUserState::Failed(_, data)) => {
                self.resolve_signed_in(old_state, &data.clone(), event)
            }
            _ => AuthenticationResolution::from(old_state.clone()),
        }
    }
}

/// `SignInRequested` carries the credentials the SRP machine starts
/// from; hand the child the equivalent initiation event.
fn remap_sign_in_request(event: &AuthEvent) -> AuthEvent {
    match &event.payload {
        AuthEventPayload::Authentication(AuthenticationEvent::SignInRequested(credentials)) => {
            AuthEvent {
                id: event.id,
                time: event.time,
                payload: AuthEventPayload::SrpSignIn(crate::events::SrpSignInEvent::InitiateSrp(
                    credentials.clone(),
                )),
            }
        }
        _ => event.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::{SecretString, SignInCredentials, SignInMethod, UserPoolTokens};
    use assert_matches::assert_matches;
    use chrono::{Duration, Utc};

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

    fn sign_in_requested() -> AuthEvent {
        AuthEvent::new(AuthEventPayload::Authentication(
            AuthenticationEvent::SignInRequested(SignInCredentials {
                username: "alice".into(),
                password: SecretString::new("hunter2"),
            }),
        ))
    }

    #[test]
    fn configure_passes_through_configuring_before_settling() {
        let resolver = AuthenticationResolver::default();
        let configuring = resolver.resolve(
            &AuthenticationState::NotConfigured,
            &AuthEvent::new(AuthEventPayload::Authentication(
                AuthenticationEvent::Configure,
            )),
        );
        assert_eq!(configuring.new_state, AuthenticationState::Configuring);

        let restored = resolver.resolve(
            &configuring.new_state,
            &AuthEvent::new(AuthEventPayload::Authentication(
                AuthenticationEvent::Configured(Some(signed_in())),
            )),
        );
        assert_matches!(restored.new_state, AuthenticationState::SignedIn(_));

        let fresh = resolver.resolve(
            &configuring.new_state,
            &AuthEvent::new(AuthEventPayload::Authentication(
                AuthenticationEvent::Configured(None),
            )),
        );
        assert_matches!(fresh.new_state, AuthenticationState::SignedOut(_));
    }

    #[test]
    fn sign_in_request_enters_srp_and_schedules_initiation() {
        let resolver = AuthenticationResolver::default();
        let resolution = resolver.resolve(
            &AuthenticationState::SignedOut(SignedOutData::default()),
            &sign_in_requested(),
        );
        assert_matches!(
            resolution.new_state,
            AuthenticationState::SigningIn(SignInState::Srp(SrpSignInState::InitiatingSrp(_)))
        );
        assert_eq!(resolution.actions[0].id(), "InitiateSrpAuth");
    }

    #[test]
    fn sign_out_during_sign_in_wins_and_cancels() {
        let resolver = AuthenticationResolver::default();
        let signing_in =
            AuthenticationState::SigningIn(SignInState::Srp(SrpSignInState::NotStarted));
        let resolution = resolver.resolve(
            &signing_in,
            &AuthEvent::new(AuthEventPayload::Authentication(
                AuthenticationEvent::SignOutRequested {
                    global_sign_out: false,
                },
            )),
        );
        assert_matches!(
            resolution.new_state,
            AuthenticationState::SigningOut(SignOutState::SigningOutLocally(_))
        );
        let ids: Vec<&str> = resolution.actions.iter().map(|a| a.id()).collect();
        assert_eq!(ids, vec!["CancelSignIn", "SignOutLocally"]);
    }

    #[test]
    fn global_sign_out_option_starts_the_global_chain() {
        let resolver = AuthenticationResolver::default();
        let resolution = resolver.resolve(
            &AuthenticationState::SignedIn(signed_in()),
            &AuthEvent::new(AuthEventPayload::Authentication(
                AuthenticationEvent::SignOutRequested {
                    global_sign_out: true,
                },
            )),
        );
        assert_matches!(
            resolution.new_state,
            AuthenticationState::SigningOut(SignOutState::SigningOutGlobally(_))
        );
        assert_eq!(resolution.actions[0].id(), "SignOutGlobally");
    }

    #[test]
    fn failed_deletion_leaves_a_recoverable_signed_in_user() {
        let resolver = AuthenticationResolver::default();
        let failed = AuthenticationState::DeletingUser(DeleteUserState::Failed(
            AuthError::NotAuthorized,
            signed_in(),
        ));
        let resolution = resolver.resolve(
            &failed,
            &AuthEvent::new(AuthEventPayload::Authentication(
                AuthenticationEvent::SignOutRequested {
                    global_sign_out: false,
                },
            )),
        );
        assert_matches!(resolution.new_state, AuthenticationState::SigningOut(_));
    }
}
