//! Credential store machine actions: one store operation each, with the
//! result reported back as a store event.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use aegis_core::{EffectfulAction, EventDispatcher};

use crate::credentials::AuthCredentials;
use crate::environment::AuthEnvironment;
use crate::events::{CredentialStoreEvent, CredentialStoreEventPayload};

fn store_event(payload: CredentialStoreEventPayload) -> CredentialStoreEvent {
    CredentialStoreEvent::new(payload)
}

/// Run the construction-time migration policy, then chain into a load.
#[derive(Debug)]
pub struct MigrateCredentialStore;

#[async_trait]
impl EffectfulAction for MigrateCredentialStore {
    type Event = CredentialStoreEvent;
    type Environment = AuthEnvironment;

    fn id(&self) -> &str {
        "MigrateCredentialStore"
    }

    async fn execute(
        self: Box<Self>,
        dispatcher: EventDispatcher<CredentialStoreEvent>,
        environment: Arc<AuthEnvironment>,
    ) {
        match environment.credential_store.migrate() {
            Ok(()) => {
                debug!("credential store migration complete");
                dispatcher.send(store_event(CredentialStoreEventPayload::LoadCredentials));
            }
            Err(error) => dispatcher.send(store_event(CredentialStoreEventPayload::Error(error))),
        }
    }
}

#[derive(Debug)]
pub struct LoadCredentialStore;

#[async_trait]
impl EffectfulAction for LoadCredentialStore {
    type Event = CredentialStoreEvent;
    type Environment = AuthEnvironment;

    fn id(&self) -> &str {
        "LoadCredentialStore"
    }

    async fn execute(
        self: Box<Self>,
        dispatcher: EventDispatcher<CredentialStoreEvent>,
        environment: Arc<AuthEnvironment>,
    ) {
        match environment.credential_store.retrieve_credentials() {
            Ok(credentials) => dispatcher.send(store_event(
                CredentialStoreEventPayload::CompletedOperation(credentials),
            )),
            Err(error) => dispatcher.send(store_event(CredentialStoreEventPayload::Error(error))),
        }
    }
}

#[derive(Debug)]
pub struct StoreCredentialStore {
    pub credentials: AuthCredentials,
}

#[async_trait]
impl EffectfulAction for StoreCredentialStore {
    type Event = CredentialStoreEvent;
    type Environment = AuthEnvironment;

    fn id(&self) -> &str {
        "StoreCredentialStore"
    }

    async fn execute(
        self: Box<Self>,
        dispatcher: EventDispatcher<CredentialStoreEvent>,
        environment: Arc<AuthEnvironment>,
    ) {
        match environment.credential_store.save_credentials(&self.credentials) {
            Ok(()) => dispatcher.send(store_event(
                CredentialStoreEventPayload::CompletedOperation(self.credentials),
            )),
            Err(error) => dispatcher.send(store_event(CredentialStoreEventPayload::Error(error))),
        }
    }
}

#[derive(Debug)]
pub struct ClearCredentialStore;

#[async_trait]
impl EffectfulAction for ClearCredentialStore {
    type Event = CredentialStoreEvent;
    type Environment = AuthEnvironment;

    fn id(&self) -> &str {
        "ClearCredentialStore"
    }

    async fn execute(
        self: Box<Self>,
        dispatcher: EventDispatcher<CredentialStoreEvent>,
        environment: Arc<AuthEnvironment>,
    ) {
        match environment.credential_store.clear_credentials() {
            Ok(()) => dispatcher.send(store_event(
                CredentialStoreEventPayload::CompletedOperation(AuthCredentials::NoCredentials),
            )),
            Err(error) => dispatcher.send(store_event(CredentialStoreEventPayload::Error(error))),
        }
    }
}
