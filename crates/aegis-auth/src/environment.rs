//! The shared environment handed to every effectful action.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::Duration;

use aegis_srp::SrpClient;

use crate::configuration::AuthConfiguration;
use crate::provider::IdentityProviderClient;
use crate::store::AuthCredentialStore;

/// A raised flag asking in-flight sign-in actions to stop before they
/// commit a result. Cleared when a new sign-in starts.
#[derive(Debug, Default)]
pub struct CancellationFlag(AtomicBool);

impl CancellationFlag {
    pub fn raise(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn clear(&self) {
        self.0.store(false, Ordering::SeqCst);
    }

    pub fn is_raised(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Everything actions need that is not carried in state or events.
pub struct AuthEnvironment {
    pub configuration: AuthConfiguration,
    pub provider: Arc<dyn IdentityProviderClient>,
    pub srp_client: Arc<SrpClient>,
    pub credential_store: Arc<AuthCredentialStore>,
    /// Raised while a sign-out interrupts an in-flight sign-in.
    pub sign_in_cancelled: CancellationFlag,
    /// How close to expiry tokens may get before a session fetch
    /// refreshes them instead of reusing them.
    pub token_refresh_lead_time: Duration,
}

impl AuthEnvironment {
    pub fn new(
        configuration: AuthConfiguration,
        provider: Arc<dyn IdentityProviderClient>,
        credential_store: Arc<AuthCredentialStore>,
    ) -> Self {
        Self {
            configuration,
            provider,
            srp_client: Arc::new(SrpClient::standard()),
            credential_store,
            sign_in_cancelled: CancellationFlag::default(),
            token_refresh_lead_time: Duration::minutes(2),
        }
    }
}
