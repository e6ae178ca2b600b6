//! Sign-out chain: global revocation first, then token revocation, then
//! the local sign-out that can never fail.
//!
//! Remote failures degrade rather than abort; their messages ride along
//! in `SignedOutData` so callers can see what was skipped.

use aegis_core::StateResolution;

use crate::actions::sign_out::{RevokeToken, SignOutGlobally, SignOutLocally};
use crate::credentials::{SignedInData, SignedOutData};
use crate::environment::AuthEnvironment;
use crate::events::{AuthEvent, AuthEventPayload, SignOutEvent};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignOutState {
    NotStarted,
    SigningOutGlobally(SignedInData),
    RevokingToken(SignedInData),
    SigningOutLocally(SignedOutData),
    SignedOut(SignedOutData),
}

impl aegis_core::State for SignOutState {}

type SignOutResolution = StateResolution<SignOutState, AuthEvent, AuthEnvironment>;

#[derive(Debug, Default)]
pub struct SignOutResolver;

impl SignOutResolver {
    pub fn resolve(&self, old_state: &SignOutState, event: &AuthEvent) -> SignOutResolution {
        let AuthEventPayload::SignOut(sign_out_event) = &event.payload else {
            return SignOutResolution::from(old_state.clone());
        };
        match (old_state, sign_out_event) {
            (SignOutState::NotStarted, SignOutEvent::SignOutGlobally(data)) => {
                SignOutResolution::with_actions(
                    SignOutState::SigningOutGlobally(data.clone()),
                    vec![Box::new(SignOutGlobally { data: data.clone() })],
                )
            }
            (
                SignOutState::NotStarted | SignOutState::SigningOutGlobally(_),
                SignOutEvent::RevokeToken(data),
            ) => SignOutResolution::with_actions(
                SignOutState::RevokingToken(data.clone()),
                vec![Box::new(RevokeToken { data: data.clone() })],
            ),
            (
                SignOutState::SigningOutGlobally(_),
                SignOutEvent::GlobalSignOutError { data, error },
            ) => {
                let partial = SignedOutData {
                    last_known_username: Some(data.username.clone()),
                    global_sign_out_error: Some(error.clone()),
                    revoke_token_error: None,
                };
                SignOutResolution::with_actions(
                    SignOutState::SigningOutLocally(partial.clone()),
                    vec![Box::new(SignOutLocally { data: partial })],
                )
            }
            (SignOutState::RevokingToken(_), SignOutEvent::RevokeTokenError { data, error }) => {
                let partial = SignedOutData {
                    last_known_username: Some(data.username.clone()),
                    global_sign_out_error: None,
                    revoke_token_error: Some(error.clone()),
                };
                SignOutResolution::with_actions(
                    SignOutState::SigningOutLocally(partial.clone()),
                    vec![Box::new(SignOutLocally { data: partial })],
                )
            }
            (
                SignOutState::NotStarted
                | SignOutState::RevokingToken(_)
                | SignOutState::SigningOutGlobally(_),
                SignOutEvent::SignOutLocally(data),
            ) => SignOutResolution::with_actions(
                SignOutState::SigningOutLocally(data.clone()),
                vec![Box::new(SignOutLocally { data: data.clone() })],
            ),
            (SignOutState::SigningOutLocally(_), SignOutEvent::SignedOut(data)) => {
                SignOutResolution::from(SignOutState::SignedOut(data.clone()))
            }
            _ => SignOutResolution::from(old_state.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::{SignInMethod, UserPoolTokens};
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

    fn event(payload: SignOutEvent) -> AuthEvent {
        AuthEvent::new(AuthEventPayload::SignOut(payload))
    }

    #[test]
    fn global_failure_degrades_to_local_with_error_recorded() {
        let resolver = SignOutResolver;
        let resolution = resolver.resolve(
            &SignOutState::SigningOutGlobally(signed_in()),
            &event(SignOutEvent::GlobalSignOutError {
                data: signed_in(),
                error: "network down".into(),
            }),
        );
        assert_matches!(
            &resolution.new_state,
            SignOutState::SigningOutLocally(data) if data.global_sign_out_error.as_deref() == Some("network down")
        );
        assert_eq!(resolution.actions[0].id(), "SignOutLocally");
    }

    #[test]
    fn chain_walks_global_then_revoke_then_local() {
        let resolver = SignOutResolver;
        let start = resolver.resolve(
            &SignOutState::NotStarted,
            &event(SignOutEvent::SignOutGlobally(signed_in())),
        );
        assert_matches!(start.new_state, SignOutState::SigningOutGlobally(_));

        let revoking = resolver.resolve(
            &start.new_state,
            &event(SignOutEvent::RevokeToken(signed_in())),
        );
        assert_matches!(revoking.new_state, SignOutState::RevokingToken(_));

        let local = resolver.resolve(
            &revoking.new_state,
            &event(SignOutEvent::SignOutLocally(SignedOutData::default())),
        );
        assert_matches!(local.new_state, SignOutState::SigningOutLocally(_));

        let done = resolver.resolve(
            &local.new_state,
            &event(SignOutEvent::SignedOut(SignedOutData::default())),
        );
        assert_matches!(done.new_state, SignOutState::SignedOut(_));
    }
}
