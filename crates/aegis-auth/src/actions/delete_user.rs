//! Account deletion. Success tears the local session down; failure
//! leaves the user signed in and recoverable.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use aegis_core::{EffectfulAction, EventDispatcher};

use crate::credentials::SignedInData;
use crate::environment::AuthEnvironment;
use crate::error::AuthError;
use crate::events::{AuthEvent, AuthEventPayload, AuthenticationEvent};

#[derive(Debug)]
pub struct DeleteUser {
    pub data: SignedInData,
}

#[async_trait]
impl EffectfulAction for DeleteUser {
    type Event = AuthEvent;
    type Environment = AuthEnvironment;

    fn id(&self) -> &str {
        "DeleteUser"
    }

    async fn execute(
        self: Box<Self>,
        dispatcher: EventDispatcher<AuthEvent>,
        environment: Arc<AuthEnvironment>,
    ) {
        match environment
            .provider
            .delete_user(&self.data.tokens.access_token)
            .await
        {
            Ok(()) => {
                info!(username = %self.data.username, "user deleted");
                dispatcher.send(AuthEvent::new(AuthEventPayload::Authentication(
                    AuthenticationEvent::UserDeleted,
                )));
            }
            Err(error) => {
                warn!(%error, "user deletion failed");
                dispatcher.send(AuthEvent::new(AuthEventPayload::Authentication(
                    AuthenticationEvent::DeleteUserFailed(AuthError::from_service(error)),
                )));
            }
        }
    }
}
