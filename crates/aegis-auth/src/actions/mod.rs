//! Effectful actions: the only place I/O happens. Each action runs as
//! its own task, talks to the collaborators in the environment, and
//! reports back exclusively by dispatching events.

pub mod credential_store;
pub mod delete_user;
pub mod session;
pub mod sign_in;
pub mod sign_out;

use crate::configuration::UserPoolConfiguration;
use crate::error::AuthError;
use crate::provider::secret_hash;

/// The `SECRET_HASH` parameter when the app client carries a secret,
/// `None` otherwise.
pub(crate) fn optional_secret_hash(
    user_pool: &UserPoolConfiguration,
    username: &str,
) -> Result<Option<String>, AuthError> {
    match &user_pool.client_secret {
        Some(secret) => Ok(Some(secret_hash(username, &user_pool.client_id, secret)?)),
        None => Ok(None),
    }
}
