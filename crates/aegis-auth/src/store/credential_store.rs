//! Namespaced credential persistence with configuration-change policy.
//!
//! Construction is where all migration decisions happen: fresh-install
//! detection, access-group moves, and reconciliation against the
//! configuration the stored data was written under. After construction
//! the store is a plain typed facade over the secure store.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::configuration::{AuthConfiguration, UserPoolConfiguration};
use crate::credentials::AuthCredentials;
use crate::error::CredentialStoreError;
use crate::store::{LocalSettings, SecureStore, StoreScope};

/// Raised in local settings once the secure store has been initialized
/// on this install. Absent after a reinstall even though secure-store
/// items may have survived.
const STORE_CONFIGURED_FLAG: &str = "aegis.storeConfigured";
/// The access group the store was last constructed with, empty string
/// for the private scope.
const ACCESS_GROUP_KEY: &str = "aegis.storeAccessGroup";
/// The configuration the currently stored credentials were written
/// under, recorded scope-wide (not namespaced).
const CONFIGURATION_KEY: &str = "aegis.configuration";

/// Remembered-device material persisted per username.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceMetadata {
    pub device_key: String,
    pub device_group_key: String,
    pub device_secret: String,
}

/// Typed credential persistence bound to one [`AuthConfiguration`].
///
/// [`migrate`](Self::migrate) must run once per construction before the
/// first read or write; the credential store state machine drives it
/// through its `migratingLegacyStore` state.
pub struct AuthCredentialStore {
    configuration: AuthConfiguration,
    store: Arc<dyn SecureStore>,
    settings: Arc<dyn LocalSettings>,
    access_group: Option<String>,
    migrate_on_access_group_change: bool,
    scope: StoreScope,
    namespace: String,
}

impl AuthCredentialStore {
    pub fn new(
        configuration: AuthConfiguration,
        store: Arc<dyn SecureStore>,
        settings: Arc<dyn LocalSettings>,
        access_group: Option<String>,
        migrate_on_access_group_change: bool,
    ) -> Self {
        let scope = match &access_group {
            Some(group) => StoreScope::Shared(group.clone()),
            None => StoreScope::Private,
        };
        let namespace = configuration.store_key();
        Self {
            configuration,
            store,
            settings,
            access_group,
            migrate_on_access_group_change,
            scope,
            namespace,
        }
    }

    /// Apply migration policy against whatever a previous construction
    /// left behind: fresh-install detection, access-group moves, and
    /// reconciliation with the recorded configuration.
    pub fn migrate(&self) -> Result<(), CredentialStoreError> {
        if self.settings.get(STORE_CONFIGURED_FLAG).is_none() {
            // Fresh install: secure-store items can outlive the app, so
            // clear the private partition. Shared partitions belong to
            // the group, not this install, and are never cleared here.
            debug!("fresh install detected, clearing private store scope");
            self.store.remove_all(&StoreScope::Private)?;
            self.settings.set(STORE_CONFIGURED_FLAG, "true");
        }

        let recorded_group = self.settings.get(ACCESS_GROUP_KEY).unwrap_or_default();
        let current_group = self.access_group.clone().unwrap_or_default();
        if recorded_group != current_group {
            if self.migrate_on_access_group_change {
                let old_scope = if recorded_group.is_empty() {
                    StoreScope::Private
                } else {
                    StoreScope::Shared(recorded_group)
                };
                debug!("migrating store items to new access group");
                for key in self.store.keys(&old_scope)? {
                    if let Some(value) = self.store.get(&key, &old_scope)? {
                        self.store.set(&key, &value, &self.scope)?;
                    }
                }
            }
            self.settings.set(ACCESS_GROUP_KEY, &current_group);
        }

        self.reconcile_configuration(&self.configuration.clone())
    }

    /// Compare `new` against the recorded configuration and preserve,
    /// copy, or clear stored credentials accordingly.
    fn reconcile_configuration(
        &self,
        new: &AuthConfiguration,
    ) -> Result<(), CredentialStoreError> {
        let old = match self.store.get(CONFIGURATION_KEY, &self.scope)? {
            Some(bytes) => serde_json::from_slice::<AuthConfiguration>(&bytes)
                .map_err(|e| CredentialStoreError::Coding(e.to_string()))?,
            None => {
                self.record_configuration(new)?;
                return Ok(());
            }
        };

        if old != *new {
            let identity_changed = match (old.identity_pool(), new.identity_pool()) {
                (Some(a), Some(b)) => a != b,
                _ => false,
            };
            let user_pool_added =
                old.user_pool().is_none() && new.user_pool().is_some() && !identity_changed;

            if identity_changed {
                // Identity pool id or region changed: stored AWS
                // credentials and identity ids are no longer valid.
                warn!("identity pool configuration changed, clearing stored credentials");
                self.remove_namespace(&old.store_key())?;
            } else if UserPoolConfiguration::is_namespacing_equal(
                old.user_pool(),
                new.user_pool(),
            ) {
                // Only unrelated fields changed; stored data stays put.
                debug!("configuration change does not affect namespacing, preserving credentials");
            } else if user_pool_added {
                // A user pool appeared on a previously identity-only
                // configuration. Carry the identity-pool credentials
                // into the new namespace so they remain readable.
                let old_key = session_key(&old.store_key());
                if let Some(value) = self.store.get(&old_key, &self.scope)? {
                    self.store
                        .set(&session_key(&self.namespace), &value, &self.scope)?;
                }
            }
        }
        self.record_configuration(new)
    }

    fn record_configuration(&self, config: &AuthConfiguration) -> Result<(), CredentialStoreError> {
        let bytes = serde_json::to_vec(config)
            .map_err(|e| CredentialStoreError::Coding(e.to_string()))?;
        self.store.set(CONFIGURATION_KEY, &bytes, &self.scope)
    }

    fn remove_namespace(&self, namespace: &str) -> Result<(), CredentialStoreError> {
        let prefix = format!("{namespace}.");
        for key in self.store.keys(&self.scope)? {
            if key.starts_with(&prefix) {
                self.store.remove(&key, &self.scope)?;
            }
        }
        Ok(())
    }

    pub fn retrieve_credentials(&self) -> Result<AuthCredentials, CredentialStoreError> {
        match self
            .store
            .get(&session_key(&self.namespace), &self.scope)?
        {
            Some(bytes) => serde_json::from_slice(&bytes)
                .map_err(|e| CredentialStoreError::Coding(e.to_string())),
            None => Ok(AuthCredentials::NoCredentials),
        }
    }

    pub fn save_credentials(
        &self,
        credentials: &AuthCredentials,
    ) -> Result<(), CredentialStoreError> {
        let bytes = serde_json::to_vec(credentials)
            .map_err(|e| CredentialStoreError::Coding(e.to_string()))?;
        self.store
            .set(&session_key(&self.namespace), &bytes, &self.scope)
    }

    /// Remove everything under this configuration's namespace, device
    /// metadata included.
    pub fn clear_credentials(&self) -> Result<(), CredentialStoreError> {
        self.remove_namespace(&self.namespace)
    }

    pub fn retrieve_device_metadata(
        &self,
        username: &str,
    ) -> Result<Option<DeviceMetadata>, CredentialStoreError> {
        match self
            .store
            .get(&device_key(&self.namespace, username), &self.scope)?
        {
            Some(bytes) => serde_json::from_slice(&bytes)
                .map(Some)
                .map_err(|e| CredentialStoreError::Coding(e.to_string())),
            None => Ok(None),
        }
    }

    pub fn save_device_metadata(
        &self,
        username: &str,
        metadata: &DeviceMetadata,
    ) -> Result<(), CredentialStoreError> {
        let bytes = serde_json::to_vec(metadata)
            .map_err(|e| CredentialStoreError::Coding(e.to_string()))?;
        self.store
            .set(&device_key(&self.namespace, username), &bytes, &self.scope)
    }

    pub fn remove_device_metadata(&self, username: &str) -> Result<(), CredentialStoreError> {
        self.store
            .remove(&device_key(&self.namespace, username), &self.scope)
    }
}

fn session_key(namespace: &str) -> String {
    format!("{namespace}.session")
}

fn device_key(namespace: &str, username: &str) -> String {
    format!("{namespace}.{username}.deviceMetadata")
}
