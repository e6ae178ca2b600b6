//! Persistence boundary: a keyed secure store and a small settings
//! store for non-secret bookkeeping.

mod credential_store;

pub use credential_store::{AuthCredentialStore, DeviceMetadata};

use crate::error::CredentialStoreError;

/// Where an item lives. Private is this process's own partition; shared
/// partitions are visible to cooperating processes under a group id.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum StoreScope {
    Private,
    Shared(String),
}

/// A keyed byte store with secure-at-rest semantics. Implementations
/// are expected to be safe for concurrent use.
pub trait SecureStore: Send + Sync + 'static {
    fn get(&self, key: &str, scope: &StoreScope) -> Result<Option<Vec<u8>>, CredentialStoreError>;

    fn set(
        &self,
        key: &str,
        value: &[u8],
        scope: &StoreScope,
    ) -> Result<(), CredentialStoreError>;

    fn remove(&self, key: &str, scope: &StoreScope) -> Result<(), CredentialStoreError>;

    fn remove_all(&self, scope: &StoreScope) -> Result<(), CredentialStoreError>;

    /// All keys currently present in a scope.
    fn keys(&self, scope: &StoreScope) -> Result<Vec<String>, CredentialStoreError>;
}

/// Plain (non-secret) key/value settings. Unlike the secure store these
/// do not survive an app reinstall, which is what lets the credential
/// store detect a fresh install.
pub trait LocalSettings: Send + Sync + 'static {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str);
    fn remove(&self, key: &str);
}
