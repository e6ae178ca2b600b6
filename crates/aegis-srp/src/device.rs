//! Device password verifiers for the remembered-device flow.
//!
//! Confirming a device registers a verifier derived from the device group
//! key, device key, and a device password. This is computable without an
//! active SRP session: the confirm-device sub-flow runs after tokens have
//! already been issued.

use num_bigint::BigUint;
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::{Digest, Sha256};

use crate::error::SrpError;
use crate::group::{pad_bytes, SrpGroup};

/// The salted verifier registered for a remembered device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DevicePasswordVerifier {
    /// Random salt, big-endian.
    pub salt: Vec<u8>,
    /// `g^x mod N`, big-endian, signed-integer padded.
    pub password_verifier: Vec<u8>,
}

/// Derive a device password verifier.
///
/// Fails with [`SrpError::Configuration`] when the secure RNG is
/// unavailable and with [`SrpError::Calculation`] on any arithmetic
/// failure; it never panics on malformed input.
pub fn generate_device_password_verifier(
    device_group_key: &str,
    device_key: &str,
    device_password: &str,
    group: &SrpGroup,
) -> Result<DevicePasswordVerifier, SrpError> {
    let mut salt = [0u8; 16];
    OsRng
        .try_fill_bytes(&mut salt)
        .map_err(|err| SrpError::Configuration(format!("secure RNG unavailable: {err}")))?;

    let verifier = verifier_for_salt(device_group_key, device_key, device_password, &salt, group)?;
    Ok(DevicePasswordVerifier {
        salt: salt.to_vec(),
        password_verifier: verifier,
    })
}

fn verifier_for_salt(
    device_group_key: &str,
    device_key: &str,
    device_password: &str,
    salt: &[u8],
    group: &SrpGroup,
) -> Result<Vec<u8>, SrpError> {
    if salt.is_empty() {
        return Err(SrpError::Calculation("empty verifier salt".into()));
    }

    // x = H(PAD(salt) ‖ H(groupKey ‖ deviceKey ‖ ":" ‖ password))
    let mut inner = Sha256::new();
    inner.update(device_group_key.as_bytes());
    inner.update(device_key.as_bytes());
    inner.update(b":");
    inner.update(device_password.as_bytes());
    let identity_hash = inner.finalize();

    let salt_value = BigUint::from_bytes_be(salt);
    let mut outer = Sha256::new();
    outer.update(pad_bytes(&salt_value));
    outer.update(identity_hash);
    let x = BigUint::from_bytes_be(&outer.finalize());

    let verifier = group.g.modpow(&x, &group.n);
    Ok(pad_bytes(&verifier))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verifier_is_deterministic_for_fixed_salt() {
        let group = SrpGroup::standard();
        let salt = [0x42u8; 16];
        let a = verifier_for_salt("groupKey", "deviceKey", "devicePassword", &salt, &group)
            .expect("verifier");
        let b = verifier_for_salt("groupKey", "deviceKey", "devicePassword", &salt, &group)
            .expect("verifier");
        assert_eq!(a, b);
        assert!(!a.is_empty());
    }

    #[test]
    fn verifier_depends_on_every_input() {
        let group = SrpGroup::standard();
        let salt = [0x42u8; 16];
        let base = verifier_for_salt("groupKey", "deviceKey", "devicePassword", &salt, &group)
            .expect("verifier");
        let other_key = verifier_for_salt("groupKey", "otherDevice", "devicePassword", &salt, &group)
            .expect("verifier");
        let other_password = verifier_for_salt("groupKey", "deviceKey", "other", &salt, &group)
            .expect("verifier");
        assert_ne!(base, other_key);
        assert_ne!(base, other_password);
    }

    #[test]
    fn fresh_verifiers_use_distinct_salts() {
        let group = SrpGroup::standard();
        let a = generate_device_password_verifier("groupKey", "deviceKey", "pw", &group)
            .expect("verifier");
        let b = generate_device_password_verifier("groupKey", "deviceKey", "pw", &group)
            .expect("verifier");
        assert_ne!(a.salt, b.salt);
    }
}
