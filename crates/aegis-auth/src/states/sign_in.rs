//! Sign-in composite: the SRP leaf plus the follow-up challenge flow
//! (`confirmSignIn`).

use aegis_core::StateResolution;

use crate::actions::sign_in::VerifySignInChallenge;
use crate::credentials::SignedInData;
use crate::environment::AuthEnvironment;
use crate::error::AuthError;
use crate::events::{AuthEvent, AuthEventPayload, SignInChallengeEvent, SrpSignInEvent};
use crate::provider::RespondToAuthChallenge;
use crate::states::srp::{SrpSignInResolver, SrpSignInState};

/// A challenge the service posed after the password proof, held while
/// waiting for the caller's answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedChallenge {
    pub challenge: RespondToAuthChallenge,
    pub username: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignInChallengeState {
    WaitingForAnswer(PublishedChallenge),
    Verifying(PublishedChallenge),
    Verified(SignedInData),
    Error(AuthError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignInState {
    Srp(SrpSignInState),
    ResolvingChallenge(SignInChallengeState),
}

impl SignInState {
    /// The signed-in data once either path has finished.
    pub fn signed_in_data(&self) -> Option<&SignedInData> {
        match self {
            SignInState::Srp(SrpSignInState::SignedIn(data))
            | SignInState::ResolvingChallenge(SignInChallengeState::Verified(data)) => Some(data),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&AuthError> {
        match self {
            SignInState::Srp(SrpSignInState::Error(error))
            | SignInState::ResolvingChallenge(SignInChallengeState::Error(error)) => Some(error),
            _ => None,
        }
    }
}

impl aegis_core::State for SignInState {}

type SignInResolution = StateResolution<SignInState, AuthEvent, AuthEnvironment>;

#[derive(Debug, Default)]
pub struct SignInResolver {
    srp: SrpSignInResolver,
}

impl SignInResolver {
    pub fn resolve(&self, old_state: &SignInState, event: &AuthEvent) -> SignInResolution {
        match old_state {
            SignInState::Srp(srp_state) => {
                let resolution = self.srp.resolve(srp_state, event);
                // Re-derive from the child's new state: the SRP machine
                // stepping aside for a named challenge hands control to
                // the challenge sub-state carried by the same event.
                if resolution.new_state == SrpSignInState::RespondedToChallenge {
                    if let AuthEventPayload::Challenge(challenge_event) = &event.payload {
                        if let Some(published) = published_challenge(challenge_event) {
                            return SignInResolution::with_actions(
                                SignInState::ResolvingChallenge(
                                    SignInChallengeState::WaitingForAnswer(published.clone()),
                                ),
                                resolution.actions,
                            );
                        }
                    }
                }
                SignInResolution::with_actions(
                    SignInState::Srp(resolution.new_state),
                    resolution.actions,
                )
            }
            SignInState::ResolvingChallenge(challenge_state) => {
                self.resolve_challenge(challenge_state, event)
            }
        }
    }

    fn resolve_challenge(
        &self,
        old_state: &SignInChallengeState,
        event: &AuthEvent,
    ) -> SignInResolution {
        let unchanged =
            || SignInResolution::from(SignInState::ResolvingChallenge(old_state.clone()));
        match &event.payload {
            AuthEventPayload::Challenge(challenge_event) => match (old_state, challenge_event) {
                (
                    SignInChallengeState::WaitingForAnswer(published),
                    SignInChallengeEvent::VerifyChallengeAnswer(answer),
                ) => SignInResolution::with_actions(
                    SignInState::ResolvingChallenge(SignInChallengeState::Verifying(
                        published.clone(),
                    )),
                    vec![Box::new(VerifySignInChallenge {
                        challenge: published.clone(),
                        answer: answer.clone(),
                    })],
                ),
                // Another round (custom challenge chains are legal).
                (SignInChallengeState::Verifying(_), other) => match published_challenge(other) {
                    Some(published) => SignInResolution::from(SignInState::ResolvingChallenge(
                        SignInChallengeState::WaitingForAnswer(published.clone()),
                    )),
                    None => match other {
                        SignInChallengeEvent::ThrowError(error) => {
                            SignInResolution::from(SignInState::ResolvingChallenge(
                                SignInChallengeState::Error(error.clone()),
                            ))
                        }
                        _ => unchanged(),
                    },
                },
                (_, SignInChallengeEvent::ThrowError(error)) => {
                    SignInResolution::from(SignInState::ResolvingChallenge(
                        SignInChallengeState::Error(error.clone()),
                    ))
                }
                _ => unchanged(),
            },
            AuthEventPayload::SrpSignIn(SrpSignInEvent::FinalizeSrpSignIn(data)) => {
                match old_state {
                    SignInChallengeState::Verifying(_) => SignInResolution::from(
                        SignInState::ResolvingChallenge(SignInChallengeState::Verified(
                            data.clone(),
                        )),
                    ),
                    _ => unchanged(),
                }
            }
            AuthEventPayload::SrpSignIn(
                SrpSignInEvent::ThrowPasswordVerifierError(error)
                | SrpSignInEvent::ThrowAuthError(error),
            ) => match old_state {
                SignInChallengeState::Verifying(_) => SignInResolution::from(
                    SignInState::ResolvingChallenge(SignInChallengeState::Error(error.clone())),
                ),
                _ => unchanged(),
            },
            _ => unchanged(),
        }
    }
}

fn published_challenge(event: &SignInChallengeEvent) -> Option<&PublishedChallenge> {
    match event {
        SignInChallengeEvent::ReceivedSmsMfaChallenge(published)
        | SignInChallengeEvent::ReceivedNewPasswordChallenge(published)
        | SignInChallengeEvent::ReceivedCustomChallenge(published)
        | SignInChallengeEvent::ReceivedDeviceSrpChallenge(published) => Some(published),
        _ => None,
    }
}

/// Map a challenge name to its dedicated event. Each named challenge is
/// its own event so downstream consumers never branch on strings.
pub fn challenge_event(
    name: crate::provider::ChallengeName,
    published: PublishedChallenge,
) -> Option<SignInChallengeEvent> {
    use crate::provider::ChallengeName;
    match name {
        ChallengeName::SmsMfa => Some(SignInChallengeEvent::ReceivedSmsMfaChallenge(published)),
        ChallengeName::NewPasswordRequired => {
            Some(SignInChallengeEvent::ReceivedNewPasswordChallenge(published))
        }
        ChallengeName::CustomChallenge => {
            Some(SignInChallengeEvent::ReceivedCustomChallenge(published))
        }
        ChallengeName::DeviceSrpAuth => {
            Some(SignInChallengeEvent::ReceivedDeviceSrpChallenge(published))
        }
        ChallengeName::PasswordVerifier => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::SecretString;
    use crate::states::srp::SrpStateData;
    use aegis_srp::SrpKeyPair;
    use assert_matches::assert_matches;
    use chrono::Utc;

    fn published() -> PublishedChallenge {
        PublishedChallenge {
            challenge: RespondToAuthChallenge::default(),
            username: "alice".into(),
        }
    }

    fn needs_verifier() -> SignInState {
        SignInState::Srp(SrpSignInState::NeedsPasswordVerifier(SrpStateData {
            username: "alice".into(),
            password: SecretString::new("hunter2"),
            key_pair: SrpKeyPair::from_hex("ab", "cd"),
            started_at: Utc::now(),
        }))
    }

    #[test]
    fn named_challenge_moves_from_srp_to_challenge_substate() {
        let resolver = SignInResolver::default();
        let resolution = resolver.resolve(
            &needs_verifier(),
            &AuthEvent::new(AuthEventPayload::Challenge(
                SignInChallengeEvent::ReceivedSmsMfaChallenge(published()),
            )),
        );
        assert_matches!(
            resolution.new_state,
            SignInState::ResolvingChallenge(SignInChallengeState::WaitingForAnswer(_))
        );
    }

    #[test]
    fn answer_schedules_verification() {
        let resolver = SignInResolver::default();
        let resolution = resolver.resolve(
            &SignInState::ResolvingChallenge(SignInChallengeState::WaitingForAnswer(published())),
            &AuthEvent::new(AuthEventPayload::Challenge(
                SignInChallengeEvent::VerifyChallengeAnswer(SecretString::new("123456")),
            )),
        );
        assert_matches!(
            resolution.new_state,
            SignInState::ResolvingChallenge(SignInChallengeState::Verifying(_))
        );
        assert_eq!(resolution.actions[0].id(), "VerifySignInChallenge");
    }
}
