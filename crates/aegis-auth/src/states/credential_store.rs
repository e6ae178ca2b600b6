//! Credential store state machine: migration first, then one I/O
//! operation at a time.

use aegis_core::{Resolver, StateResolution};

use crate::actions::credential_store::{
    ClearCredentialStore, LoadCredentialStore, MigrateCredentialStore, StoreCredentialStore,
};
use crate::credentials::AuthCredentials;
use crate::environment::AuthEnvironment;
use crate::error::CredentialStoreError;
use crate::events::{CredentialStoreEvent, CredentialStoreEventPayload};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialStoreState {
    Idle,
    MigratingLegacyStore,
    Loading,
    Storing(AuthCredentials),
    Clearing,
    Error(CredentialStoreError),
}

impl aegis_core::State for CredentialStoreState {}

type StoreResolution = StateResolution<CredentialStoreState, CredentialStoreEvent, AuthEnvironment>;

#[derive(Debug, Default)]
pub struct CredentialStoreResolver;

impl Resolver for CredentialStoreResolver {
    type State = CredentialStoreState;
    type Event = CredentialStoreEvent;
    type Environment = AuthEnvironment;

    fn resolve(&self, old_state: &Self::State, event: &Self::Event) -> StoreResolution {
        match (old_state, &event.payload) {
            (CredentialStoreState::Idle, CredentialStoreEventPayload::MigrateLegacyStore) => {
                StoreResolution::with_actions(
                    CredentialStoreState::MigratingLegacyStore,
                    vec![Box::new(MigrateCredentialStore)],
                )
            }
            (
                CredentialStoreState::Idle | CredentialStoreState::MigratingLegacyStore,
                CredentialStoreEventPayload::LoadCredentials,
            ) => StoreResolution::with_actions(
                CredentialStoreState::Loading,
                vec![Box::new(LoadCredentialStore)],
            ),
            (CredentialStoreState::Idle, CredentialStoreEventPayload::StoreCredentials(creds)) => {
                StoreResolution::with_actions(
                    CredentialStoreState::Storing(creds.clone()),
                    vec![Box::new(StoreCredentialStore {
                        credentials: creds.clone(),
                    })],
                )
            }
            (CredentialStoreState::Idle, CredentialStoreEventPayload::ClearCredentials) => {
                StoreResolution::with_actions(
                    CredentialStoreState::Clearing,
                    vec![Box::new(ClearCredentialStore)],
                )
            }
            (
                CredentialStoreState::Loading
                | CredentialStoreState::Storing(_)
                | CredentialStoreState::Clearing,
                CredentialStoreEventPayload::CompletedOperation(_),
            ) => StoreResolution::from(CredentialStoreState::Idle),
            (
                CredentialStoreState::MigratingLegacyStore
                | CredentialStoreState::Loading
                | CredentialStoreState::Storing(_)
                | CredentialStoreState::Clearing,
                CredentialStoreEventPayload::Error(error),
            ) => StoreResolution::from(CredentialStoreState::Error(error.clone())),
            // Errors are recoverable: the next operation starts fresh.
            (CredentialStoreState::Error(_), CredentialStoreEventPayload::LoadCredentials) => {
                StoreResolution::with_actions(
                    CredentialStoreState::Loading,
                    vec![Box::new(LoadCredentialStore)],
                )
            }
            _ => StoreResolution::from(old_state.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn migration_precedes_loading() {
        let resolver = CredentialStoreResolver;
        let migrating = resolver.resolve(
            &CredentialStoreState::Idle,
            &CredentialStoreEvent::new(CredentialStoreEventPayload::MigrateLegacyStore),
        );
        assert_eq!(
            migrating.new_state,
            CredentialStoreState::MigratingLegacyStore
        );
        assert_eq!(migrating.actions[0].id(), "MigrateCredentialStore");

        let loading = resolver.resolve(
            &migrating.new_state,
            &CredentialStoreEvent::new(CredentialStoreEventPayload::LoadCredentials),
        );
        assert_eq!(loading.new_state, CredentialStoreState::Loading);
    }

    #[test]
    fn store_request_schedules_persistence() {
        let resolver = CredentialStoreResolver;
        let resolution = resolver.resolve(
            &CredentialStoreState::Idle,
            &CredentialStoreEvent::new(CredentialStoreEventPayload::StoreCredentials(
                AuthCredentials::NoCredentials,
            )),
        );
        assert_matches!(resolution.new_state, CredentialStoreState::Storing(_));
        assert_eq!(resolution.actions[0].id(), "StoreCredentialStore");
    }

    #[test]
    fn busy_store_ignores_new_operations() {
        let resolver = CredentialStoreResolver;
        let resolution = resolver.resolve(
            &CredentialStoreState::Loading,
            &CredentialStoreEvent::new(CredentialStoreEventPayload::ClearCredentials),
        );
        assert_eq!(resolution.new_state, CredentialStoreState::Loading);
        assert!(resolution.actions.is_empty());
    }

    #[test]
    fn completed_operation_returns_to_idle() {
        let resolver = CredentialStoreResolver;
        let resolution = resolver.resolve(
            &CredentialStoreState::Clearing,
            &CredentialStoreEvent::new(CredentialStoreEventPayload::CompletedOperation(
                AuthCredentials::NoCredentials,
            )),
        );
        assert_eq!(resolution.new_state, CredentialStoreState::Idle);
    }

    #[test]
    fn error_state_recovers_on_next_load() {
        let resolver = CredentialStoreResolver;
        let resolution = resolver.resolve(
            &CredentialStoreState::Error(CredentialStoreError::Store("disk".into())),
            &CredentialStoreEvent::new(CredentialStoreEventPayload::LoadCredentials),
        );
        assert_matches!(resolution.new_state, CredentialStoreState::Loading);
    }
}
