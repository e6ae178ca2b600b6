//! In-memory stand-ins for the platform's secure store and settings.

use std::collections::HashMap;

use parking_lot::Mutex;

use aegis_auth::error::CredentialStoreError;
use aegis_auth::store::{LocalSettings, SecureStore, StoreScope};

/// A scope-partitioned in-memory byte store.
#[derive(Debug, Default)]
pub struct MemorySecureStore {
    scopes: Mutex<HashMap<StoreScope, HashMap<String, Vec<u8>>>>,
    /// When set, every operation fails with this message.
    failure: Mutex<Option<String>>,
}

impl MemorySecureStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent operation fail, for error-path tests.
    pub fn fail_with(&self, message: impl Into<String>) {
        *self.failure.lock() = Some(message.into());
    }

    pub fn heal(&self) {
        *self.failure.lock() = None;
    }

    fn check(&self) -> Result<(), CredentialStoreError> {
        match self.failure.lock().as_ref() {
            Some(message) => Err(CredentialStoreError::Store(message.clone())),
            None => Ok(()),
        }
    }
}

impl SecureStore for MemorySecureStore {
    fn get(&self, key: &str, scope: &StoreScope) -> Result<Option<Vec<u8>>, CredentialStoreError> {
        self.check()?;
        Ok(self
            .scopes
            .lock()
            .get(scope)
            .and_then(|items| items.get(key).cloned()))
    }

    fn set(&self, key: &str, value: &[u8], scope: &StoreScope) -> Result<(), CredentialStoreError> {
        self.check()?;
        self.scopes
            .lock()
            .entry(scope.clone())
            .or_default()
            .insert(key.to_owned(), value.to_vec());
        Ok(())
    }

    fn remove(&self, key: &str, scope: &StoreScope) -> Result<(), CredentialStoreError> {
        self.check()?;
        if let Some(items) = self.scopes.lock().get_mut(scope) {
            items.remove(key);
        }
        Ok(())
    }

    fn remove_all(&self, scope: &StoreScope) -> Result<(), CredentialStoreError> {
        self.check()?;
        self.scopes.lock().remove(scope);
        Ok(())
    }

    fn keys(&self, scope: &StoreScope) -> Result<Vec<String>, CredentialStoreError> {
        self.check()?;
        Ok(self
            .scopes
            .lock()
            .get(scope)
            .map(|items| items.keys().cloned().collect())
            .unwrap_or_default())
    }
}

/// Plain key/value settings that do not survive a "reinstall"
/// (dropping the value).
#[derive(Debug, Default)]
pub struct MemoryLocalSettings {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryLocalSettings {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LocalSettings for MemoryLocalSettings {
    fn get(&self, key: &str) -> Option<String> {
        self.values.lock().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) {
        self.values.lock().insert(key.to_owned(), value.to_owned());
    }

    fn remove(&self, key: &str) {
        self.values.lock().remove(key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scopes_are_isolated() {
        let store = MemorySecureStore::new();
        store.set("k", b"private", &StoreScope::Private).unwrap();
        store
            .set("k", b"shared", &StoreScope::Shared("group".into()))
            .unwrap();
        assert_eq!(
            store.get("k", &StoreScope::Private).unwrap(),
            Some(b"private".to_vec())
        );
        store.remove_all(&StoreScope::Private).unwrap();
        assert_eq!(store.get("k", &StoreScope::Private).unwrap(), None);
        assert_eq!(
            store.get("k", &StoreScope::Shared("group".into())).unwrap(),
            Some(b"shared".to_vec())
        );
    }

    #[test]
    fn injected_failure_surfaces_as_store_error() {
        let store = MemorySecureStore::new();
        store.fail_with("disk on fire");
        assert!(store.get("k", &StoreScope::Private).is_err());
        store.heal();
        assert!(store.get("k", &StoreScope::Private).is_ok());
    }
}
