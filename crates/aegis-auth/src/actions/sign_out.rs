//! Sign-out actions. Remote steps report failure as degrade events so
//! the chain always reaches the local sign-out.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use aegis_core::{EffectfulAction, EventDispatcher};

use crate::credentials::{SignedInData, SignedOutData};
use crate::environment::AuthEnvironment;
use crate::events::{AuthEvent, AuthEventPayload, SignOutEvent};

fn sign_out_event(payload: SignOutEvent) -> AuthEvent {
    AuthEvent::new(AuthEventPayload::SignOut(payload))
}

/// Invalidate every issued token for the user, everywhere.
#[derive(Debug)]
pub struct SignOutGlobally {
    pub data: SignedInData,
}

#[async_trait]
impl EffectfulAction for SignOutGlobally {
    type Event = AuthEvent;
    type Environment = AuthEnvironment;

    fn id(&self) -> &str {
        "SignOutGlobally"
    }

    async fn execute(
        self: Box<Self>,
        dispatcher: EventDispatcher<AuthEvent>,
        environment: Arc<AuthEnvironment>,
    ) {
        match environment
            .provider
            .global_sign_out(&self.data.tokens.access_token)
            .await
        {
            Ok(()) => dispatcher.send(sign_out_event(SignOutEvent::RevokeToken(self.data))),
            Err(error) => {
                warn!(%error, "global sign-out failed, continuing locally");
                dispatcher.send(sign_out_event(SignOutEvent::GlobalSignOutError {
                    data: self.data,
                    error: error.to_string(),
                }));
            }
        }
    }
}

/// Revoke the refresh token so it cannot mint new sessions.
#[derive(Debug)]
pub struct RevokeToken {
    pub data: SignedInData,
}

#[async_trait]
impl EffectfulAction for RevokeToken {
    type Event = AuthEvent;
    type Environment = AuthEnvironment;

    fn id(&self) -> &str {
        "RevokeToken"
    }

    async fn execute(
        self: Box<Self>,
        dispatcher: EventDispatcher<AuthEvent>,
        environment: Arc<AuthEnvironment>,
    ) {
        let Some(user_pool) = environment.configuration.user_pool() else {
            // Nothing to revoke against; fall through to local.
            dispatcher.send(sign_out_event(SignOutEvent::SignOutLocally(SignedOutData {
                last_known_username: Some(self.data.username),
                ..SignedOutData::default()
            })));
            return;
        };
        match environment
            .provider
            .revoke_token(
                &user_pool.client_id,
                user_pool.client_secret.as_deref(),
                &self.data.tokens.refresh_token,
            )
            .await
        {
            Ok(()) => {
                dispatcher.send(sign_out_event(SignOutEvent::SignOutLocally(SignedOutData {
                    last_known_username: Some(self.data.username),
                    ..SignedOutData::default()
                })));
            }
            Err(error) => {
                warn!(%error, "token revocation failed, continuing locally");
                dispatcher.send(sign_out_event(SignOutEvent::RevokeTokenError {
                    data: self.data,
                    error: error.to_string(),
                }));
            }
        }
    }
}

/// Drop everything stored locally; this step cannot fail the sign-out.
#[derive(Debug)]
pub struct SignOutLocally {
    pub data: SignedOutData,
}

#[async_trait]
impl EffectfulAction for SignOutLocally {
    type Event = AuthEvent;
    type Environment = AuthEnvironment;

    fn id(&self) -> &str {
        "SignOutLocally"
    }

    async fn execute(
        self: Box<Self>,
        dispatcher: EventDispatcher<AuthEvent>,
        environment: Arc<AuthEnvironment>,
    ) {
        if let Err(error) = environment.credential_store.clear_credentials() {
            warn!(%error, "failed to clear stored credentials during sign-out");
        }
        debug!("signed out locally");
        dispatcher.send(sign_out_event(SignOutEvent::SignedOut(self.data)));
    }
}
