//! Event types flowing through the session and credential store machines.
//!
//! Every event carries an id and a timestamp assigned at construction;
//! resolvers treat the payload as the only input to resolution.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use aegis_core::StateMachineEvent;

use crate::credentials::{
    AuthCredentials, SecretString, SignInCredentials, SignedInData, SignedOutData,
};
use crate::error::{AuthError, CredentialStoreError, SessionError};
use crate::provider::RespondToAuthChallenge;
use crate::states::sign_in::PublishedChallenge;
use crate::states::srp::SrpStateData;

/// An event for the session machine.
#[derive(Debug, Clone)]
pub struct AuthEvent {
    pub id: Uuid,
    pub time: DateTime<Utc>,
    pub payload: AuthEventPayload,
}

impl AuthEvent {
    pub fn new(payload: AuthEventPayload) -> Self {
        Self {
            id: Uuid::new_v4(),
            time: Utc::now(),
            payload,
        }
    }
}

impl StateMachineEvent for AuthEvent {
    fn id(&self) -> Uuid {
        self.id
    }

    fn kind(&self) -> &'static str {
        self.payload.kind()
    }

    fn time(&self) -> DateTime<Utc> {
        self.time
    }
}

#[derive(Debug, Clone)]
pub enum AuthEventPayload {
    Authentication(AuthenticationEvent),
    SrpSignIn(SrpSignInEvent),
    Challenge(SignInChallengeEvent),
    SignOut(SignOutEvent),
    Authorization(AuthorizationEvent),
}

impl AuthEventPayload {
    fn kind(&self) -> &'static str {
        match self {
            AuthEventPayload::Authentication(event) => event.kind(),
            AuthEventPayload::SrpSignIn(event) => event.kind(),
            AuthEventPayload::Challenge(event) => event.kind(),
            AuthEventPayload::SignOut(event) => event.kind(),
            AuthEventPayload::Authorization(event) => event.kind(),
        }
    }
}

/// Lifecycle events for the top-level authentication state.
#[derive(Debug, Clone)]
pub enum AuthenticationEvent {
    /// Configuration started loading.
    Configure,
    /// Configuration finished loading; `Some` when a previous session was
    /// restored from the credential store.
    Configured(Option<SignedInData>),
    SignInRequested(SignInCredentials),
    SignOutRequested { global_sign_out: bool },
    DeleteUserRequested,
    UserDeleted,
    DeleteUserFailed(AuthError),
}

impl AuthenticationEvent {
    fn kind(&self) -> &'static str {
        match self {
            AuthenticationEvent::Configure => "Authentication.Configure",
            AuthenticationEvent::Configured(_) => "Authentication.Configured",
            AuthenticationEvent::SignInRequested(_) => "Authentication.SignInRequested",
            AuthenticationEvent::SignOutRequested { .. } => "Authentication.SignOutRequested",
            AuthenticationEvent::DeleteUserRequested => "Authentication.DeleteUserRequested",
            AuthenticationEvent::UserDeleted => "Authentication.UserDeleted",
            AuthenticationEvent::DeleteUserFailed(_) => "Authentication.DeleteUserFailed",
        }
    }
}

/// Events driving the SRP sign-in sub-machine.
#[derive(Debug, Clone)]
pub enum SrpSignInEvent {
    InitiateSrp(SignInCredentials),
    /// The service answered the initiation with a password verifier
    /// challenge.
    RespondPasswordVerifier {
        state_data: SrpStateData,
        challenge: RespondToAuthChallenge,
    },
    /// One retry without device data after the service reported the
    /// remembered device as unknown.
    RetryRespondPasswordVerifier {
        state_data: SrpStateData,
        challenge: RespondToAuthChallenge,
    },
    FinalizeSrpSignIn(SignedInData),
    ThrowPasswordVerifierError(AuthError),
    ThrowAuthError(AuthError),
    Cancel,
}

impl SrpSignInEvent {
    fn kind(&self) -> &'static str {
        match self {
            SrpSignInEvent::InitiateSrp(_) => "SrpSignIn.InitiateSrp",
            SrpSignInEvent::RespondPasswordVerifier { .. } => "SrpSignIn.RespondPasswordVerifier",
            SrpSignInEvent::RetryRespondPasswordVerifier { .. } => {
                "SrpSignIn.RetryRespondPasswordVerifier"
            }
            SrpSignInEvent::FinalizeSrpSignIn(_) => "SrpSignIn.FinalizeSrpSignIn",
            SrpSignInEvent::ThrowPasswordVerifierError(_) => {
                "SrpSignIn.ThrowPasswordVerifierError"
            }
            SrpSignInEvent::ThrowAuthError(_) => "SrpSignIn.ThrowAuthError",
            SrpSignInEvent::Cancel => "SrpSignIn.Cancel",
        }
    }
}

/// Named follow-up challenges after the password proof, plus the events
/// that answer them. Each challenge kind is its own event so callers and
/// resolvers never have to switch on a stringly-typed name.
#[derive(Debug, Clone)]
pub enum SignInChallengeEvent {
    ReceivedSmsMfaChallenge(PublishedChallenge),
    ReceivedNewPasswordChallenge(PublishedChallenge),
    ReceivedCustomChallenge(PublishedChallenge),
    ReceivedDeviceSrpChallenge(PublishedChallenge),
    /// The caller answered the pending challenge (`confirmSignIn`).
    VerifyChallengeAnswer(SecretString),
    ThrowError(AuthError),
}

impl SignInChallengeEvent {
    fn kind(&self) -> &'static str {
        match self {
            SignInChallengeEvent::ReceivedSmsMfaChallenge(_) => "Challenge.ReceivedSmsMfa",
            SignInChallengeEvent::ReceivedNewPasswordChallenge(_) => {
                "Challenge.ReceivedNewPassword"
            }
            SignInChallengeEvent::ReceivedCustomChallenge(_) => "Challenge.ReceivedCustom",
            SignInChallengeEvent::ReceivedDeviceSrpChallenge(_) => "Challenge.ReceivedDeviceSrp",
            SignInChallengeEvent::VerifyChallengeAnswer(_) => "Challenge.VerifyAnswer",
            SignInChallengeEvent::ThrowError(_) => "Challenge.ThrowError",
        }
    }
}

/// Events driving the sign-out chain.
#[derive(Debug, Clone)]
pub enum SignOutEvent {
    SignOutGlobally(SignedInData),
    /// Global sign-out failed; carry the error forward and keep going.
    GlobalSignOutError {
        data: SignedInData,
        error: String,
    },
    RevokeToken(SignedInData),
    RevokeTokenError {
        data: SignedInData,
        error: String,
    },
    SignOutLocally(SignedOutData),
    SignedOut(SignedOutData),
}

impl SignOutEvent {
    fn kind(&self) -> &'static str {
        match self {
            SignOutEvent::SignOutGlobally(_) => "SignOut.SignOutGlobally",
            SignOutEvent::GlobalSignOutError { .. } => "SignOut.GlobalSignOutError",
            SignOutEvent::RevokeToken(_) => "SignOut.RevokeToken",
            SignOutEvent::RevokeTokenError { .. } => "SignOut.RevokeTokenError",
            SignOutEvent::SignOutLocally(_) => "SignOut.SignOutLocally",
            SignOutEvent::SignedOut(_) => "SignOut.SignedOut",
        }
    }
}

/// Events driving session fetch and refresh.
#[derive(Debug, Clone)]
pub enum AuthorizationEvent {
    /// Establish a session from stored or freshly issued sign-in data.
    /// `None` fetches an unauthenticated (guest) session.
    FetchSession(Option<SignedInData>),
    SessionEstablished(AuthCredentials),
    RefreshSession {
        force: bool,
    },
    SessionRefreshed(AuthCredentials),
    ClearSession,
    ThrowError(SessionError),
}

impl AuthorizationEvent {
    fn kind(&self) -> &'static str {
        match self {
            AuthorizationEvent::FetchSession(_) => "Authorization.FetchSession",
            AuthorizationEvent::SessionEstablished(_) => "Authorization.SessionEstablished",
            AuthorizationEvent::RefreshSession { .. } => "Authorization.RefreshSession",
            AuthorizationEvent::SessionRefreshed(_) => "Authorization.SessionRefreshed",
            AuthorizationEvent::ClearSession => "Authorization.ClearSession",
            AuthorizationEvent::ThrowError(_) => "Authorization.ThrowError",
        }
    }
}

/// An event for the credential store machine.
#[derive(Debug, Clone)]
pub struct CredentialStoreEvent {
    pub id: Uuid,
    pub time: DateTime<Utc>,
    pub payload: CredentialStoreEventPayload,
}

impl CredentialStoreEvent {
    pub fn new(payload: CredentialStoreEventPayload) -> Self {
        Self {
            id: Uuid::new_v4(),
            time: Utc::now(),
            payload,
        }
    }
}

impl StateMachineEvent for CredentialStoreEvent {
    fn id(&self) -> Uuid {
        self.id
    }

    fn kind(&self) -> &'static str {
        match &self.payload {
            CredentialStoreEventPayload::MigrateLegacyStore => "CredentialStore.MigrateLegacyStore",
            CredentialStoreEventPayload::LoadCredentials => "CredentialStore.LoadCredentials",
            CredentialStoreEventPayload::StoreCredentials(_) => "CredentialStore.StoreCredentials",
            CredentialStoreEventPayload::ClearCredentials => "CredentialStore.ClearCredentials",
            CredentialStoreEventPayload::CompletedOperation(_) => {
                "CredentialStore.CompletedOperation"
            }
            CredentialStoreEventPayload::Error(_) => "CredentialStore.Error",
        }
    }

    fn time(&self) -> DateTime<Utc> {
        self.time
    }
}

#[derive(Debug, Clone)]
pub enum CredentialStoreEventPayload {
    /// Apply configuration-change and fresh-install policy before any
    /// load or store.
    MigrateLegacyStore,
    LoadCredentials,
    StoreCredentials(AuthCredentials),
    ClearCredentials,
    CompletedOperation(AuthCredentials),
    Error(CredentialStoreError),
}
