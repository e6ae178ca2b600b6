//! SRP group parameters.

use num_bigint::BigUint;
use num_traits::Zero;
use sha2::{Digest, Sha256};

use crate::error::SrpError;

/// The RFC 5054 3072-bit prime used by Cognito-style user pools, hex encoded.
const STANDARD_N_HEX: &str = concat!(
    "FFFFFFFFFFFFFFFFC90FDAA22168C234C4C6628B80DC1CD129024E08",
    "8A67CC74020BBEA63B139B22514A08798E3404DDEF9519B3CD3A431B",
    "302B0A6DF25F14374FE1356D6D51C245E485B576625E7EC6F44C42E9",
    "A637ED6B0BFF5CB6F406B7EDEE386BFB5A899FA5AE9F24117C4B1FE6",
    "49286651ECE45B3DC2007CB8A163BF0598DA48361C55D39A69163FA8",
    "FD24CF5F83655D23DCA3AD961C62F356208552BB9ED529077096966D",
    "670C354E4ABC9804F1746C08CA18217C32905E462E36CE3BE39E772C",
    "180E86039B2783A2EC07A28FB5C55DF06F4C52C9DE2BCBF695581718",
    "3995497CEA956AE515D2261898FA051015728E5A8AAAC42DAD33170D",
    "04507A33A85521ABDF1CBA64ECFB850458DBEF0A8AEA71575D060C7D",
    "B3970F85A6E1E4C7ABF5AE8CDB0933D71E8C94E04A25619DCEE3D226",
    "1AD2EE6BF12FFA06D98A0864D87602733EC86A64521F2B18177B200C",
    "BBE117577A615D6C770988C0BAD946E208E24FA074E5AB3143DB5BFC",
    "E0FD108E4B82D120A93AD2CAFFFFFFFFFFFFFFFF",
);

/// An SRP group: the prime modulus `N`, generator `g`, and the multiplier
/// `k = H(PAD(N) ‖ PAD(g))` derived from them.
#[derive(Debug, Clone)]
pub struct SrpGroup {
    pub(crate) n: BigUint,
    pub(crate) g: BigUint,
    pub(crate) k: BigUint,
}

impl SrpGroup {
    /// The standard 3072-bit group with `g = 2`.
    pub fn standard() -> Self {
        // The constants are well formed; parsing them cannot fail.
        match Self::from_hex(STANDARD_N_HEX, "2") {
            Ok(group) => group,
            Err(_) => unreachable!("builtin SRP group constants are valid hex"),
        }
    }

    /// Build a group from hex-encoded `N` and `g`.
    pub fn from_hex(n_hex: &str, g_hex: &str) -> Result<Self, SrpError> {
        let n = parse_hex(n_hex)
            .ok_or_else(|| SrpError::Configuration("group modulus N is not valid hex".into()))?;
        let g = parse_hex(g_hex)
            .ok_or_else(|| SrpError::Configuration("group generator g is not valid hex".into()))?;
        if n.is_zero() || g.is_zero() {
            return Err(SrpError::Configuration("group parameters must be non-zero".into()));
        }
        let k = multiplier(&n, &g);
        Ok(Self { n, g, k })
    }

    /// Hex value of the multiplier `k`, uppercased. Exposed for fixtures.
    pub fn k_hex(&self) -> String {
        self.k.to_str_radix(16).to_uppercase()
    }
}

/// `k = H(PAD(N) ‖ PAD(g))`, both values padded the way a signed big-endian
/// integer encoding would (leading zero byte when the high bit is set).
fn multiplier(n: &BigUint, g: &BigUint) -> BigUint {
    let mut hasher = Sha256::new();
    hasher.update(pad_bytes(n));
    hasher.update(pad_bytes(g));
    BigUint::from_bytes_be(&hasher.finalize())
}

/// Parse a hex string into a `BigUint`, tolerating odd length.
pub(crate) fn parse_hex(value: &str) -> Option<BigUint> {
    if value.is_empty() {
        return None;
    }
    BigUint::parse_bytes(value.as_bytes(), 16)
}

/// Big-endian bytes of `value`, with a leading zero byte when the top bit is
/// set. This mirrors the two's-complement padding every Cognito SRP client
/// applies before hashing, so digests agree across implementations.
pub(crate) fn pad_bytes(value: &BigUint) -> Vec<u8> {
    let bytes = value.to_bytes_be();
    match bytes.first() {
        Some(&first) if first >= 0x80 => {
            let mut padded = Vec::with_capacity(bytes.len() + 1);
            padded.push(0);
            padded.extend_from_slice(&bytes);
            padded
        }
        _ => bytes,
    }
}
