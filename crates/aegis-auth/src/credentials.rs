//! Credential value types: tokens, AWS credentials, and the combined
//! `AuthCredentials` sum type the authorization machine produces.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use chrono::{DateTime, Duration, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

/// A secret that must not appear in logs and is wiped on drop.
///
/// Exists for in-flight material (passwords, challenge answers). It is
/// deliberately not serializable.
#[derive(Clone)]
pub struct SecretString(Zeroizing<String>);

impl SecretString {
    pub fn new(value: impl Into<String>) -> Self {
        Self(Zeroizing::new(value.into()))
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl PartialEq for SecretString {
    fn eq(&self, other: &Self) -> bool {
        *self.0 == *other.0
    }
}

impl Eq for SecretString {}

impl std::fmt::Debug for SecretString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SecretString(<redacted>)")
    }
}

/// The credentials a sign-in starts from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignInCredentials {
    pub username: String,
    pub password: SecretString,
}

/// Tokens issued by the user pool.
///
/// `expires_at` is the earlier of the id- and access-token `exp` claims,
/// recorded at issue time, falling back to the service-reported lifetime
/// when neither claim can be read; the more conservative value governs
/// refresh decisions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserPoolTokens {
    pub id_token: String,
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: DateTime<Utc>,
}

impl UserPoolTokens {
    /// Whether the tokens are considered expiring within `lead_time` of
    /// `now`.
    ///
    /// The boundary is inclusive-valid: tokens expiring exactly at
    /// `now + lead_time` are *not* expiring. Expiring ⇔
    /// `expires_at < now + lead_time`.
    pub fn is_expiring_within(&self, lead_time: Duration, now: DateTime<Utc>) -> bool {
        self.expires_at < now + lead_time
    }

    /// The earliest `exp` claim across the two tokens, `fallback` when
    /// neither token carries a readable claim.
    pub fn earliest_expiry(
        id_token: &str,
        access_token: &str,
        fallback: DateTime<Utc>,
    ) -> DateTime<Utc> {
        [id_token, access_token]
            .into_iter()
            .filter_map(jwt_expiry)
            .min()
            .unwrap_or(fallback)
    }
}

fn jwt_expiry(token: &str) -> Option<DateTime<Utc>> {
    let payload = token.split('.').nth(1)?;
    let bytes = URL_SAFE_NO_PAD.decode(payload).ok()?;
    let claims: serde_json::Value = serde_json::from_slice(&bytes).ok()?;
    Utc.timestamp_opt(claims.get("exp")?.as_i64()?, 0).single()
}

/// Temporary AWS credentials vended through the identity pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AwsCredentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: String,
    pub expires_at: DateTime<Utc>,
}

impl AwsCredentials {
    /// Same inclusive boundary rule as [`UserPoolTokens::is_expiring_within`].
    pub fn is_expiring_within(&self, lead_time: Duration, now: DateTime<Utc>) -> bool {
        self.expires_at < now + lead_time
    }
}

/// The result of a completed authorization fetch.
///
/// `NoCredentials` is the only valid value before the first successful
/// fetch; established credentials are never silently reset except by an
/// explicit sign-out or clear.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuthCredentials {
    NoCredentials,
    UserPoolOnly {
        signed_in_data: SignedInData,
    },
    IdentityPoolOnly {
        identity_id: String,
        credentials: AwsCredentials,
    },
    UserPoolAndIdentityPool {
        signed_in_data: SignedInData,
        identity_id: String,
        credentials: AwsCredentials,
    },
}

impl AuthCredentials {
    pub fn signed_in_data(&self) -> Option<&SignedInData> {
        match self {
            AuthCredentials::UserPoolOnly { signed_in_data }
            | AuthCredentials::UserPoolAndIdentityPool { signed_in_data, .. } => {
                Some(signed_in_data)
            }
            _ => None,
        }
    }

    pub fn user_pool_tokens(&self) -> Option<&UserPoolTokens> {
        self.signed_in_data().map(|data| &data.tokens)
    }

    pub fn aws_credentials(&self) -> Option<&AwsCredentials> {
        match self {
            AuthCredentials::IdentityPoolOnly { credentials, .. }
            | AuthCredentials::UserPoolAndIdentityPool { credentials, .. } => Some(credentials),
            _ => None,
        }
    }
}

/// How the user signed in. Drives which refresh and sign-out paths apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SignInMethod {
    Srp,
    Challenge,
}

/// Everything recorded about a signed-in user.
///
/// Only derived tokens survive past the SRP sub-state; ephemeral key
/// material never reaches this type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedInData {
    pub user_id: String,
    pub username: String,
    pub signed_in_at: DateTime<Utc>,
    pub sign_in_method: SignInMethod,
    pub tokens: UserPoolTokens,
}

/// What remains after a sign-out, including partial failures of the
/// remote steps (which degrade to a local sign-out, not an abort).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SignedOutData {
    pub last_known_username: Option<String>,
    pub global_sign_out_error: Option<String>,
    pub revoke_token_error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(expires_at: DateTime<Utc>) -> UserPoolTokens {
        UserPoolTokens {
            id_token: "id".into(),
            access_token: "access".into(),
            refresh_token: "refresh".into(),
            expires_at,
        }
    }

    #[test]
    fn expiry_boundary_is_inclusive_valid() {
        let now = Utc::now();
        let lead = Duration::minutes(2);
        // exp exactly at now + lead: NOT expiring.
        assert!(!tokens(now + lead).is_expiring_within(lead, now));
        // One second inside the window: expiring.
        assert!(tokens(now + lead - Duration::seconds(1)).is_expiring_within(lead, now));
        // One second beyond the window: not expiring.
        assert!(!tokens(now + lead + Duration::seconds(1)).is_expiring_within(lead, now));
    }

    fn jwt_with_exp(exp: i64) -> String {
        let payload = URL_SAFE_NO_PAD.encode(format!("{{\"exp\":{exp}}}"));
        format!("eyJhbGciOiJub25lIn0.{payload}.sig")
    }

    #[test]
    fn expiry_is_the_earlier_of_the_two_exp_claims() {
        let early = Utc.timestamp_opt(2_000_000_000, 0).single().unwrap();
        let late = Utc.timestamp_opt(2_000_003_600, 0).single().unwrap();
        let fallback = Utc::now();

        let id = jwt_with_exp(late.timestamp());
        let access = jwt_with_exp(early.timestamp());
        assert_eq!(UserPoolTokens::earliest_expiry(&id, &access, fallback), early);
        assert_eq!(UserPoolTokens::earliest_expiry(&access, &id, fallback), early);
    }

    #[test]
    fn unreadable_tokens_fall_back_to_the_reported_lifetime() {
        let fallback = Utc.timestamp_opt(2_000_000_000, 0).single().unwrap();
        assert_eq!(
            UserPoolTokens::earliest_expiry("id-token-1", "access-token-1", fallback),
            fallback
        );
        // One readable claim is enough.
        let access = jwt_with_exp(1_900_000_000);
        assert_eq!(
            UserPoolTokens::earliest_expiry("opaque", &access, fallback),
            Utc.timestamp_opt(1_900_000_000, 0).single().unwrap()
        );
    }

    #[test]
    fn secret_string_redacts_debug_output() {
        let secret = SecretString::new("hunter2");
        assert!(!format!("{secret:?}").contains("hunter2"));
        assert_eq!(secret.expose(), "hunter2");
    }
}
