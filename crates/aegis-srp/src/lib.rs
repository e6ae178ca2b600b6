//! SRP-6a protocol engine, in the dialect spoken by Cognito-style user pools.
//!
//! The password never leaves the client: both sides derive a shared secret
//! from a password-derived value `x` and ephemeral Diffie-Hellman-style
//! exponents, and the client proves possession with an HMAC over the
//! server's secret block.
//!
//! Everything here is pure computation. Network calls, state transitions,
//! and retry policy live in `aegis-auth`; this crate only does the math and
//! reports typed failures.
//!
//! # Flow
//!
//! ```text
//! generate_key_pair()          a, A = g^a mod N
//!         │                    ── initiate auth (A) ──►  server
//!         ▼                    ◄─ salt, secret block, B ─
//! calculate_u(A, B)            u = H(PAD(A) ‖ PAD(B))
//! calculate_shared_secret()    S = (B - k·g^x)^(a + u·x) mod N
//! authentication_key()         HKDF-SHA256(salt = PAD(u), ikm = PAD(S))
//! authentication_signature()   M1 = HMAC(key, pool ‖ user ‖ block ‖ ts)
//! ```

mod client;
mod device;
mod error;
mod group;

pub use client::{SrpClient, SrpKeyPair};
pub use device::{generate_device_password_verifier, DevicePasswordVerifier};
pub use error::SrpError;
pub use group::SrpGroup;

use chrono::{DateTime, Utc};

/// Format an instant the way the password-verifier challenge expects it:
/// `EEE MMM d HH:mm:ss UTC yyyy`, POSIX locale, day of month not padded.
pub fn srp_timestamp(time: DateTime<Utc>) -> String {
    time.format("%a %b %-d %H:%M:%S UTC %Y").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn timestamp_uses_posix_format_with_unpadded_day() {
        let t = Utc.with_ymd_and_hms(2023, 1, 1, 12, 0, 0).single();
        let t = t.expect("valid timestamp");
        assert_eq!(srp_timestamp(t), "Sun Jan 1 12:00:00 UTC 2023");
    }
}
