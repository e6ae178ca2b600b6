//! Auth configuration: which pools exist and how stored data is namespaced.

use serde::{Deserialize, Serialize};

/// User-pool (token issuing) side of the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserPoolConfiguration {
    /// Pool id, `<region>_<suffix>`.
    pub pool_id: String,
    /// App client id.
    pub client_id: String,
    /// Optional app client secret; when present every provider call carries
    /// a `SECRET_HASH`.
    pub client_secret: Option<String>,
    pub region: String,
}

impl UserPoolConfiguration {
    /// The pool suffix after the region separator, hashed into the SRP
    /// password verifier.
    pub fn pool_name(&self) -> &str {
        match self.pool_id.split_once('_') {
            Some((_, suffix)) => suffix,
            None => &self.pool_id,
        }
    }

    /// Whether two configurations store data under the same namespace.
    /// Secondary fields (client secret) do not participate.
    pub fn is_namespacing_equal(lhs: Option<&Self>, rhs: Option<&Self>) -> bool {
        match (lhs, rhs) {
            (Some(a), Some(b)) => a.pool_id == b.pool_id && a.client_id == b.client_id,
            (None, None) => true,
            _ => false,
        }
    }
}

/// Identity-pool (AWS credential vending) side of the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityPoolConfiguration {
    pub pool_id: String,
    pub region: String,
}

/// The supported configuration shapes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuthConfiguration {
    UserPools(UserPoolConfiguration),
    IdentityPools(IdentityPoolConfiguration),
    UserPoolsAndIdentityPools(UserPoolConfiguration, IdentityPoolConfiguration),
}

impl AuthConfiguration {
    pub fn user_pool(&self) -> Option<&UserPoolConfiguration> {
        match self {
            AuthConfiguration::UserPools(up) => Some(up),
            AuthConfiguration::UserPoolsAndIdentityPools(up, _) => Some(up),
            AuthConfiguration::IdentityPools(_) => None,
        }
    }

    pub fn identity_pool(&self) -> Option<&IdentityPoolConfiguration> {
        match self {
            AuthConfiguration::IdentityPools(ip) => Some(ip),
            AuthConfiguration::UserPoolsAndIdentityPools(_, ip) => Some(ip),
            AuthConfiguration::UserPools(_) => None,
        }
    }

    /// Namespace prefix stored data is keyed under. Derived from the pool
    /// ids so that a pool change lands in a fresh namespace.
    pub fn store_key(&self) -> String {
        let suffix = match self {
            AuthConfiguration::UserPools(up) => up.pool_id.clone(),
            AuthConfiguration::IdentityPools(ip) => ip.pool_id.clone(),
            AuthConfiguration::UserPoolsAndIdentityPools(up, ip) => {
                format!("{}.{}", up.pool_id, ip.pool_id)
            }
        };
        format!("aegis.{suffix}")
    }
}
