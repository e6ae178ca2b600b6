//! Construction-time migration policy of the credential store: fresh
//! installs, configuration changes, and access-group moves.

use std::sync::Arc;

use chrono::{TimeZone, Utc};

use aegis_auth::configuration::{IdentityPoolConfiguration, UserPoolConfiguration};
use aegis_auth::store::{AuthCredentialStore, DeviceMetadata, SecureStore, StoreScope};
use aegis_auth::{AuthConfiguration, AuthCredentials, AwsCredentials};
use aegis_testkit::{MemoryLocalSettings, MemorySecureStore};

fn user_pool(client_id: &str) -> UserPoolConfiguration {
    UserPoolConfiguration {
        pool_id: "us-east-1_pool".into(),
        client_id: client_id.into(),
        client_secret: None,
        region: "us-east-1".into(),
    }
}

fn identity_pool(pool_id: &str) -> IdentityPoolConfiguration {
    IdentityPoolConfiguration {
        pool_id: pool_id.into(),
        region: "us-east-1".into(),
    }
}

fn identity_credentials() -> AuthCredentials {
    AuthCredentials::IdentityPoolOnly {
        identity_id: "identity-1".into(),
        credentials: AwsCredentials {
            access_key_id: "AKIA".into(),
            secret_access_key: "secret".into(),
            session_token: "session".into(),
            // Pinned so that save-then-retrieve compares equal.
            expires_at: Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0).unwrap(),
        },
    }
}

fn build(
    config: AuthConfiguration,
    store: Arc<MemorySecureStore>,
    settings: Arc<MemoryLocalSettings>,
) -> AuthCredentialStore {
    let credential_store = AuthCredentialStore::new(config, store, settings, None, false);
    credential_store.migrate().unwrap();
    credential_store
}

#[test]
fn unrelated_configuration_change_preserves_credentials() {
    let store = Arc::new(MemorySecureStore::default());
    let settings = Arc::new(MemoryLocalSettings::default());

    let mut config = user_pool("client-1");
    let first = build(
        AuthConfiguration::UserPools(config.clone()),
        store.clone(),
        settings.clone(),
    );
    first.save_credentials(&identity_credentials()).unwrap();

    config.client_secret = Some("new-secret".into());
    let second = build(AuthConfiguration::UserPools(config), store, settings);
    assert_eq!(second.retrieve_credentials().unwrap(), identity_credentials());
}

#[test]
fn identity_pool_change_clears_credentials() {
    let store = Arc::new(MemorySecureStore::default());
    let settings = Arc::new(MemoryLocalSettings::default());

    let first = build(
        AuthConfiguration::IdentityPools(identity_pool("us-east-1:old")),
        store.clone(),
        settings.clone(),
    );
    first.save_credentials(&identity_credentials()).unwrap();

    let second = build(
        AuthConfiguration::IdentityPools(identity_pool("us-east-1:new")),
        store,
        settings,
    );
    assert_eq!(
        second.retrieve_credentials().unwrap(),
        AuthCredentials::NoCredentials
    );
}

#[test]
fn user_pool_added_keeps_identity_credentials_readable() {
    let store = Arc::new(MemorySecureStore::default());
    let settings = Arc::new(MemoryLocalSettings::default());

    let first = build(
        AuthConfiguration::IdentityPools(identity_pool("us-east-1:only")),
        store.clone(),
        settings.clone(),
    );
    first.save_credentials(&identity_credentials()).unwrap();

    let second = build(
        AuthConfiguration::UserPoolsAndIdentityPools(
            user_pool("client-1"),
            identity_pool("us-east-1:only"),
        ),
        store,
        settings,
    );
    assert_eq!(second.retrieve_credentials().unwrap(), identity_credentials());
}

#[test]
fn fresh_install_clears_private_scope_only() {
    let store = Arc::new(MemorySecureStore::default());
    let settings = Arc::new(MemoryLocalSettings::default());

    let shared = StoreScope::Shared("group".into());
    store.set("leftover", b"private", &StoreScope::Private).unwrap();
    store.set("shared-item", b"shared", &shared).unwrap();

    // No configured flag in settings: simulated reinstall.
    let _ = build(
        AuthConfiguration::UserPools(user_pool("client-1")),
        store.clone(),
        settings.clone(),
    );

    assert_eq!(store.get("leftover", &StoreScope::Private).unwrap(), None);
    assert_eq!(
        store.get("shared-item", &shared).unwrap(),
        Some(b"shared".to_vec())
    );

    // Flag now set: a second construction leaves items alone.
    let first = build(
        AuthConfiguration::UserPools(user_pool("client-1")),
        store.clone(),
        settings.clone(),
    );
    first.save_credentials(&identity_credentials()).unwrap();
    let second = build(
        AuthConfiguration::UserPools(user_pool("client-1")),
        store,
        settings,
    );
    assert_eq!(second.retrieve_credentials().unwrap(), identity_credentials());
}

#[test]
fn access_group_change_without_migrate_flag_starts_empty() {
    let store = Arc::new(MemorySecureStore::default());
    let settings = Arc::new(MemoryLocalSettings::default());
    let config = AuthConfiguration::UserPools(user_pool("client-1"));

    let private = build(config.clone(), store.clone(), settings.clone());
    private.save_credentials(&identity_credentials()).unwrap();

    let shared = AuthCredentialStore::new(
        config.clone(),
        store.clone(),
        settings.clone(),
        Some("group".into()),
        false,
    );
    shared.migrate().unwrap();
    assert_eq!(
        shared.retrieve_credentials().unwrap(),
        AuthCredentials::NoCredentials
    );
    // Source scope untouched.
    let private_again = build(config, store, settings);
    assert_eq!(
        private_again.retrieve_credentials().unwrap(),
        identity_credentials()
    );
}

#[test]
fn access_group_change_with_migrate_flag_copies_items() {
    let store = Arc::new(MemorySecureStore::default());
    let settings = Arc::new(MemoryLocalSettings::default());
    let config = AuthConfiguration::UserPools(user_pool("client-1"));

    let private = build(config.clone(), store.clone(), settings.clone());
    private.save_credentials(&identity_credentials()).unwrap();

    let shared = AuthCredentialStore::new(config, store, settings, Some("group".into()), true);
    shared.migrate().unwrap();
    assert_eq!(shared.retrieve_credentials().unwrap(), identity_credentials());
}

#[test]
fn device_metadata_round_trips_and_clears_with_namespace() {
    let store = Arc::new(MemorySecureStore::default());
    let settings = Arc::new(MemoryLocalSettings::default());
    let credential_store = build(
        AuthConfiguration::UserPools(user_pool("client-1")),
        store,
        settings,
    );

    let metadata = DeviceMetadata {
        device_key: "device-key".into(),
        device_group_key: "group-key".into(),
        device_secret: "device-secret".into(),
    };
    credential_store
        .save_device_metadata("alice", &metadata)
        .unwrap();
    assert_eq!(
        credential_store.retrieve_device_metadata("alice").unwrap(),
        Some(metadata)
    );

    credential_store.clear_credentials().unwrap();
    assert_eq!(
        credential_store.retrieve_device_metadata("alice").unwrap(),
        None
    );
}
