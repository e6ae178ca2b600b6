//! SRP sign-in leaf state machine.
//!
//! Ephemeral key material lives only inside `SrpStateData`; every
//! transition replaces the whole value and the secrets drop with it.
//! Nothing from here is ever serialized.

use chrono::{DateTime, Utc};

use aegis_core::StateResolution;
use aegis_srp::SrpKeyPair;

use crate::actions::sign_in::{InitiateSrpAuth, VerifyPasswordSrp};
use crate::credentials::{SecretString, SignInCredentials, SignedInData};
use crate::environment::AuthEnvironment;
use crate::error::AuthError;
use crate::events::{AuthEvent, AuthEventPayload, SignInChallengeEvent, SrpSignInEvent};

/// Everything carried between SRP initiation and the password proof.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SrpStateData {
    pub username: String,
    pub password: SecretString,
    pub key_pair: SrpKeyPair,
    /// Instant the attempt started; also the proof timestamp.
    pub started_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SrpSignInState {
    NotStarted,
    InitiatingSrp(SignInCredentials),
    NeedsPasswordVerifier(SrpStateData),
    /// The password proof was accepted but the service posed a further
    /// named challenge; the parent sign-in state takes over from here.
    RespondedToChallenge,
    SignedIn(SignedInData),
    Cancelled,
    Error(AuthError),
}

impl SrpSignInState {
    fn is_terminal(&self) -> bool {
        matches!(
            self,
            SrpSignInState::SignedIn(_) | SrpSignInState::Cancelled | SrpSignInState::Error(_)
        )
    }
}

impl aegis_core::State for SrpSignInState {}

type SrpResolution = StateResolution<SrpSignInState, AuthEvent, AuthEnvironment>;

#[derive(Debug, Default)]
pub struct SrpSignInResolver;

impl SrpSignInResolver {
    pub fn resolve(&self, old_state: &SrpSignInState, event: &AuthEvent) -> SrpResolution {
        if old_state.is_terminal() {
            return SrpResolution::from(old_state.clone());
        }
        match &event.payload {
            AuthEventPayload::SrpSignIn(srp_event) => self.resolve_srp(old_state, srp_event),
            AuthEventPayload::Challenge(challenge_event) => {
                self.resolve_challenge(old_state, challenge_event)
            }
            _ => SrpResolution::from(old_state.clone()),
        }
    }

    fn resolve_srp(&self, old_state: &SrpSignInState, event: &SrpSignInEvent) -> SrpResolution {
        match (old_state, event) {
            (SrpSignInState::NotStarted, SrpSignInEvent::InitiateSrp(credentials)) => {
                SrpResolution::with_actions(
                    SrpSignInState::InitiatingSrp(credentials.clone()),
                    vec![Box::new(InitiateSrpAuth {
                        credentials: credentials.clone(),
                    })],
                )
            }
            (
                SrpSignInState::InitiatingSrp(_),
                SrpSignInEvent::RespondPasswordVerifier {
                    state_data,
                    challenge,
                },
            ) => SrpResolution::with_actions(
                SrpSignInState::NeedsPasswordVerifier(state_data.clone()),
                vec![Box::new(VerifyPasswordSrp {
                    state_data: state_data.clone(),
                    challenge: challenge.clone(),
                    retried: false,
                })],
            ),
            (
                SrpSignInState::NeedsPasswordVerifier(_),
                SrpSignInEvent::RetryRespondPasswordVerifier {
                    state_data,
                    challenge,
                },
            ) => SrpResolution::with_actions(
                SrpSignInState::NeedsPasswordVerifier(state_data.clone()),
                vec![Box::new(VerifyPasswordSrp {
                    state_data: state_data.clone(),
                    challenge: challenge.clone(),
                    retried: true,
                })],
            ),
            (
                SrpSignInState::NeedsPasswordVerifier(_),
                SrpSignInEvent::FinalizeSrpSignIn(data),
            ) => SrpResolution::from(SrpSignInState::SignedIn(data.clone())),
            (_, SrpSignInEvent::Cancel) => SrpResolution::from(SrpSignInState::Cancelled),
            (_, SrpSignInEvent::ThrowPasswordVerifierError(error))
            | (_, SrpSignInEvent::ThrowAuthError(error)) => {
                SrpResolution::from(SrpSignInState::Error(error.clone()))
            }
            _ => SrpResolution::from(old_state.clone()),
        }
    }

    /// A named follow-up challenge ends this machine's part of the flow;
    /// the parent re-derives a challenge sub-state from the same event.
    fn resolve_challenge(
        &self,
        old_state: &SrpSignInState,
        event: &SignInChallengeEvent,
    ) -> SrpResolution {
        match (old_state, event) {
            (
                SrpSignInState::NeedsPasswordVerifier(_),
                SignInChallengeEvent::ReceivedSmsMfaChallenge(_)
                | SignInChallengeEvent::ReceivedNewPasswordChallenge(_)
                | SignInChallengeEvent::ReceivedCustomChallenge(_)
                | SignInChallengeEvent::ReceivedDeviceSrpChallenge(_),
            ) => SrpResolution::from(SrpSignInState::RespondedToChallenge),
            _ => SrpResolution::from(old_state.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::AuthenticationEvent;
    use aegis_srp::SrpClient;
    use assert_matches::assert_matches;

    fn credentials() -> SignInCredentials {
        SignInCredentials {
            username: "alice".into(),
            password: SecretString::new("hunter2"),
        }
    }

    fn state_data() -> SrpStateData {
        SrpStateData {
            username: "alice".into(),
            password: SecretString::new("hunter2"),
            key_pair: SrpKeyPair::from_hex("ab", "cd"),
            started_at: Utc::now(),
        }
    }

    fn event(payload: SrpSignInEvent) -> AuthEvent {
        AuthEvent::new(AuthEventPayload::SrpSignIn(payload))
    }

    #[test]
    fn initiate_transitions_and_schedules_the_initiation_call() {
        let resolver = SrpSignInResolver;
        let resolution = resolver.resolve(
            &SrpSignInState::NotStarted,
            &event(SrpSignInEvent::InitiateSrp(credentials())),
        );
        assert_matches!(resolution.new_state, SrpSignInState::InitiatingSrp(_));
        assert_eq!(resolution.actions.len(), 1);
        assert_eq!(resolution.actions[0].id(), "InitiateSrpAuth");
    }

    #[test]
    fn retry_keeps_needs_password_verifier_with_distinct_action_id() {
        let resolver = SrpSignInResolver;
        let data = state_data();
        let challenge = crate::provider::RespondToAuthChallenge::default();
        let resolution = resolver.resolve(
            &SrpSignInState::NeedsPasswordVerifier(data.clone()),
            &event(SrpSignInEvent::RetryRespondPasswordVerifier {
                state_data: data,
                challenge,
            }),
        );
        assert_matches!(resolution.new_state, SrpSignInState::NeedsPasswordVerifier(_));
        assert_eq!(resolution.actions[0].id(), "VerifyPasswordSrpRetry");
    }

    #[test]
    fn unrelated_event_is_identity() {
        let resolver = SrpSignInResolver;
        let state = SrpSignInState::InitiatingSrp(credentials());
        let resolution = resolver.resolve(
            &state,
            &AuthEvent::new(AuthEventPayload::Authentication(
                AuthenticationEvent::DeleteUserRequested,
            )),
        );
        assert_eq!(resolution.new_state, state);
        assert!(resolution.actions.is_empty());
    }

    #[test]
    fn cancel_abandons_the_attempt_from_any_phase() {
        let resolver = SrpSignInResolver;
        let resolution = resolver.resolve(
            &SrpSignInState::NeedsPasswordVerifier(state_data()),
            &event(SrpSignInEvent::Cancel),
        );
        assert_eq!(resolution.new_state, SrpSignInState::Cancelled);
        assert!(resolution.actions.is_empty());
    }

    #[test]
    fn terminal_states_absorb_everything() {
        let resolver = SrpSignInResolver;
        let resolution = resolver.resolve(
            &SrpSignInState::Cancelled,
            &event(SrpSignInEvent::InitiateSrp(credentials())),
        );
        assert_eq!(resolution.new_state, SrpSignInState::Cancelled);
        assert!(resolution.actions.is_empty());
    }

    #[test]
    fn ephemeral_keys_never_leak_through_debug() {
        let pair = SrpClient::standard().generate_key_pair().unwrap();
        let private = pair.private_key_hex().to_owned();
        let data = SrpStateData {
            username: "alice".into(),
            password: SecretString::new("hunter2"),
            key_pair: pair,
            started_at: Utc::now(),
        };
        let printed = format!("{:?}", SrpSignInState::NeedsPasswordVerifier(data));
        assert!(!printed.contains(&private));
        assert!(!printed.contains("hunter2"));
    }
}
