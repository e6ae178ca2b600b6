//! The SRP client computations: ephemeral keys, `u`, `x`, the shared
//! secret, and the password-claim proof.

use hkdf::Hkdf;
use hmac::{Hmac, Mac};
use num_bigint::BigUint;
use num_traits::Zero;
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::{Digest, Sha256};
use zeroize::Zeroizing;

use crate::error::SrpError;
use crate::group::{pad_bytes, parse_hex, SrpGroup};

/// HKDF info string fixed by the protocol dialect.
const DERIVED_KEY_INFO: &[u8] = b"Caldera Derived Key";
/// Derived authentication keys are truncated to 128 bits.
const DERIVED_KEY_LEN: usize = 16;

/// An ephemeral SRP key pair `(a, A = g^a mod N)`, hex encoded.
///
/// The private exponent is wiped when the pair is dropped. It lives only
/// inside the transient sign-in state value and is never serialized.
#[derive(Clone)]
pub struct SrpKeyPair {
    private_key_hex: Zeroizing<String>,
    public_key_hex: String,
}

impl SrpKeyPair {
    /// Reassemble a pair from hex values (fixtures, persisted test data).
    pub fn from_hex(private_key_hex: &str, public_key_hex: &str) -> Self {
        Self {
            private_key_hex: Zeroizing::new(private_key_hex.to_owned()),
            public_key_hex: public_key_hex.to_owned(),
        }
    }

    /// Hex value of the private exponent `a`.
    pub fn private_key_hex(&self) -> &str {
        &self.private_key_hex
    }

    /// Hex value of the public value `A`.
    pub fn public_key_hex(&self) -> &str {
        &self.public_key_hex
    }
}

impl PartialEq for SrpKeyPair {
    fn eq(&self, other: &Self) -> bool {
        *self.private_key_hex == *other.private_key_hex
            && self.public_key_hex == other.public_key_hex
    }
}

impl Eq for SrpKeyPair {}

impl std::fmt::Debug for SrpKeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SrpKeyPair")
            .field("private_key_hex", &"<redacted>")
            .field("public_key_hex", &self.public_key_hex)
            .finish()
    }
}

/// Stateless SRP computations over one group.
#[derive(Debug, Clone)]
pub struct SrpClient {
    group: SrpGroup,
}

impl SrpClient {
    pub fn new(group: SrpGroup) -> Self {
        Self { group }
    }

    /// Client over the standard 3072-bit group.
    pub fn standard() -> Self {
        Self::new(SrpGroup::standard())
    }

    /// The group this client computes in.
    pub fn group(&self) -> &SrpGroup {
        &self.group
    }

    /// Generate an ephemeral key pair with a 256-bit private exponent,
    /// rejecting the degenerate values the protocol forbids.
    pub fn generate_key_pair(&self) -> Result<SrpKeyPair, SrpError> {
        for _ in 0..8 {
            let mut buf = [0u8; 32];
            OsRng
                .try_fill_bytes(&mut buf)
                .map_err(|err| SrpError::Configuration(format!("secure RNG unavailable: {err}")))?;
            let a = BigUint::from_bytes_be(&buf) % &self.group.n;
            if a.is_zero() {
                continue;
            }
            let a_pub = self.group.g.modpow(&a, &self.group.n);
            if a_pub.is_zero() {
                continue;
            }
            return Ok(SrpKeyPair {
                private_key_hex: Zeroizing::new(a.to_str_radix(16).to_uppercase()),
                public_key_hex: a_pub.to_str_radix(16).to_uppercase(),
            });
        }
        Err(SrpError::Calculation(
            "failed to generate a usable ephemeral key pair".into(),
        ))
    }

    /// `u = H(PAD(A) ‖ PAD(B))`. Zero is forbidden: it would collapse the
    /// proof to a value independent of the password.
    pub fn calculate_u(
        &self,
        client_public_hex: &str,
        server_public_hex: &str,
    ) -> Result<BigUint, SrpError> {
        let a_pub =
            parse_hex(client_public_hex).ok_or(SrpError::InvalidHex("client public value"))?;
        let b_pub =
            parse_hex(server_public_hex).ok_or(SrpError::InvalidHex("server public value"))?;
        let mut hasher = Sha256::new();
        hasher.update(pad_bytes(&a_pub));
        hasher.update(pad_bytes(&b_pub));
        let u = BigUint::from_bytes_be(&hasher.finalize());
        if u.is_zero() {
            return Err(SrpError::IllegalParameter("u computed to zero"));
        }
        Ok(u)
    }

    /// `x = H(PAD(salt) ‖ H(username ‖ ":" ‖ password))`.
    ///
    /// `username` is the full identity hashed into the verifier; for user
    /// pools that is the pool suffix concatenated with the user id.
    fn calculate_x(&self, username: &str, password: &str, salt: &BigUint) -> BigUint {
        let mut inner = Sha256::new();
        inner.update(username.as_bytes());
        inner.update(b":");
        inner.update(password.as_bytes());
        let identity_hash = inner.finalize();

        let mut outer = Sha256::new();
        outer.update(pad_bytes(salt));
        outer.update(identity_hash);
        BigUint::from_bytes_be(&outer.finalize())
    }

    /// `S = (B - k·g^x)^(a + u·x) mod N`, returned as uppercase hex.
    ///
    /// The returned buffer is zeroed on drop; the secret must not outlive
    /// the sign-in attempt that produced it.
    pub fn calculate_shared_secret(
        &self,
        username: &str,
        password: &str,
        salt_hex: &str,
        client_private_hex: &str,
        client_public_hex: &str,
        server_public_hex: &str,
    ) -> Result<Zeroizing<String>, SrpError> {
        let n = &self.group.n;
        let a = parse_hex(client_private_hex).ok_or(SrpError::InvalidHex("client private key"))?;
        let b_pub =
            parse_hex(server_public_hex).ok_or(SrpError::InvalidHex("server public value"))?;
        let salt = parse_hex(salt_hex).ok_or(SrpError::InvalidHex("salt"))?;

        if (&b_pub % n).is_zero() {
            return Err(SrpError::IllegalParameter(
                "server public value is a multiple of N",
            ));
        }

        let u = self.calculate_u(client_public_hex, server_public_hex)?;
        let x = self.calculate_x(username, password, &salt);

        let k_g_x = (&self.group.k * self.group.g.modpow(&x, n)) % n;
        // (B - k·g^x) mod N without going negative.
        let base = ((&b_pub % n) + n - k_g_x) % n;
        let exponent = &a + &u * &x;
        let secret = base.modpow(&exponent, n);
        Ok(Zeroizing::new(secret.to_str_radix(16).to_uppercase()))
    }

    /// Derive the 128-bit password-claim signing key:
    /// `HKDF-SHA256(salt = PAD(u), ikm = PAD(S), info = "Caldera Derived Key")`.
    pub fn authentication_key(
        &self,
        shared_secret_hex: &str,
        u_hex: &str,
    ) -> Result<Zeroizing<Vec<u8>>, SrpError> {
        let secret = parse_hex(shared_secret_hex).ok_or(SrpError::InvalidHex("shared secret"))?;
        let u = parse_hex(u_hex).ok_or(SrpError::InvalidHex("u value"))?;
        let ikm = Zeroizing::new(pad_bytes(&secret));
        let salt = pad_bytes(&u);
        let hk = Hkdf::<Sha256>::new(Some(&salt), &ikm);
        let mut okm = Zeroizing::new(vec![0u8; DERIVED_KEY_LEN]);
        hk.expand(DERIVED_KEY_INFO, &mut okm)
            .map_err(|err| SrpError::Calculation(format!("key derivation failed: {err}")))?;
        Ok(okm)
    }

    /// The password-claim proof `M1`:
    /// `HMAC-SHA256(key, poolName ‖ username ‖ secretBlock ‖ timestamp)`.
    pub fn authentication_signature(
        &self,
        authentication_key: &[u8],
        pool_name: &str,
        username: &str,
        secret_block: &[u8],
        timestamp: &str,
    ) -> Result<Vec<u8>, SrpError> {
        let mut mac = Hmac::<Sha256>::new_from_slice(authentication_key)
            .map_err(|err| SrpError::Calculation(format!("invalid signature key: {err}")))?;
        mac.update(pool_name.as_bytes());
        mac.update(username.as_bytes());
        mac.update(secret_block);
        mac.update(timestamp.as_bytes());
        Ok(mac.finalize().into_bytes().to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    // Vectors recorded from a live user-pool exchange.

    const U_CLIENT_PUBLIC: &str = concat!(
        "27042f8575322fee79d27caaec003ab3dd7bf6b7c40c3438ebac8c7532",
        "9d2fdcf8f344c33dce23fcb7d265b681600eeef19a83be4bed41e368f2",
        "5a3913a71203c1744f66cd2a7b5e4c06a0c062c5fce4b07b1a73fc7adc",
        "f6233db976d1ce417ff4eb9153df873970326a9c18e36c2ae8490149d9",
        "8422ce57a001853279761260316321f4b4e90d6fd9e4ff55b3cea2a55b",
        "e9446f13736aad842e9af0763e83f4208320a326fb592eac84f3c65ac4",
        "6573c41443f4c4673189e6b4afe8b84a43327de73577145927bc240839",
        "0ab63724a17b150225cbb1620f5607c8676641ee49f6c06071a5a009be",
        "48b7449efabfdfa9b26edea8f731b579aa803d1333dd1472dd1ae59fea",
        "12d0a5200925be31979ac37911f67aed2f9ba4b1a326488e1a03b1e10f",
        "2287f06df83b04c955a4776dffb49dd4cc17f9a20f0f14ec22342c2d97",
        "795a24e5e86810d21430713fd6c9612a59e864ba251fca59e36555c4ab",
        "b28cf6b1049544dcea3cfe3d024ed57b81a3366e0e9daee4616e7b2774",
        "12032ec6b50e57",
    );

    const U_SERVER_PUBLIC: &str = concat!(
        "b5619b2e02a66d7681acc7ab0d4baa69921d8b8e2e1b67828c5d88d403",
        "c93b176879a0f9c93127109f2b72120231238a3b56adefb53e8e454679",
        "f5d3e4874926a7b1cd9515999f57867e265b30a918628bba40ccffc7ef",
        "29f71e92e60c1acb3f48e7240ad621add7fb8c80646309d2fc980976b2",
        "f41219d877d1264a13f52cb7233ab06e4c056bcd0af7a4a3f5e4e887e9",
        "0da816c1e599fcc8b62d9ee2fd5f9c011f14119af03e1b39ffbfc54426",
        "14746f1b9a8f3650244ae7711b9e0b5adb499711c81ad65d5e50f554e4",
        "add08e499f387f517d8269cc80302f935cb6c4029782bd65ef55b315fb",
        "ec657288b2dab1699cf32ef8c09b822e650ffe9f7ecac5eed47bc6e63a",
        "9f9f46bd9bb3eabc7c758ca944aedb7a5a4a204fc4f5a67093a7f4ea44",
        "4417b85e71bf7363b98a982d4f5bb77e4a6ac66f15054663775bc56744",
        "5b62685f1d4e9bf20ac14bf00453c5b666e88e1c72a6539bfda079e4de",
        "05b324629b160935d15cdb18d1f8dfe55f2d84afaef0f761bec33eba21",
        "78b426a7bf2985",
    );

    const S_CLIENT_PRIVATE: &str =
        "98fba2902c23b5e55de97ae4e9497f0b7dfbb639f1539243029ddabd0ed10c8";

    const S_CLIENT_PUBLIC: &str = concat!(
        "c4808c3cee673f869923c08c3f42aa4b2a98197f2187ce9af9736a27",
        "c1689bf7f423cc5a20973ed1b4db7daead68a54467308dd80701adb3",
        "1756f43286cb88b1d441115e4eddcaa1730ecb3164068db45d0960b8",
        "1a652798cf018369c5a3f581036cee2b36b4e63839b4d9b313a21b54",
        "e658dbc2c7aa1b0bb0c73be9d9dcb713462e6630fc748e4d4899b4e1",
        "db4b579d1a24f9fd7ecdd43ded934a5bde8e90bc488a8f49d6b849f9",
        "5cac284e17589285d6bbcd1c86d57ccfbbb991dc3cd2b66f56d197fd",
        "acb9cc2da9f79b582bf2e632266f73cfe2f6ae9373e1438a48aaf7fe",
        "c6be9bf4f87415c7a500ddf8181c075f2284ab2c2810b03eb211696d",
        "2d47584c6e9d2810ec17466ea5a2adfc99193746942b5abb48d3957d",
        "e4ab3249d17af696b18b36d05f6051ba41dd732e23f05c378625459f",
        "0971cffe702badd6dd4d40e06e012636fb29784f7541caaa6c8c09b9",
        "465f7d364850228661c1573c446ef5fb859f2ee8eb6cc3642de42b47",
        "d777b1148c4dede62819458df94a83e526c0cd9f",
    );

    const S_SERVER_PUBLIC: &str = concat!(
        "cccd551910a5a4a05af370b8f7340bd4a4cbf2daed273fcfc3c4ec112",
        "f1424f064635e9ad8337af7a7372212793c057f24570ea2c2e87f1b47",
        "a9153dfdeb470772f2985dc3e7ffca700a3b826ad4fe559f3d3cbdd5e",
        "33d02a4008cd6cd1104df09236647c59ea3645beebaffefe34ea5915c",
        "db974e905ac06e7daf4932327f1bd7c9d8e0778c971996497cecd8b17",
        "a4e49636024ef1b6c6ba293d06d5cb49684aa8a6c03a51d6e9eb6c612",
        "e886ad2b553e75918043150f73114f7e455f7559560f7b67f21340c5c",
        "3dff8b1af71fe3bfa73bd0a7443d197c19ab7927d25ad360589da9ab2",
        "e20e7fc2278eda238323ac7f1d2bd7dc909c1f96560eff8214ae0026f",
        "67891fe97ccd49702263ee9ef93888c5797beab21bdeeba688668f1d6",
        "002809afbd726506e7aa527ad867235aaf34131b2ba2b09e12733ad3f",
        "cd00ea945c0ca546911d0bf23234852ae507800aa81e2722d0494ae5a",
        "c735e7ed5c0288fd749835b9a58dd7c340a824191a9f177f12ef82410",
        "2c3582b92bb608ab090ca34e246",
    );

    const S_EXPECTED: &str = concat!(
        "eaf55a5aab2cacc78e84aea5bf6e01c4d63fc3bc7fb19c3360144e79d",
        "cc0b2fb1f1b55203d430d396027e64cd5ad4561f7bc4c5395f43ce386",
        "3055c522ab252cc5ec488e0f2321dcb675d410d19c042a8a3dcb51760",
        "9dc2ebb3db42a70a91849bd0cd7ca36a2aded7bf137643e0f02da31b9",
        "b32804bb41e5a877cd72a45a2211c90c71deea91d004baf7258e179af",
        "d9299d91279c7a268473cfb3255d4750be7ba1da07366c8329a157703",
        "45243132416c908a89739fd2d3e980ff0a697d628b49966a9683575ae",
        "f37b5d3f33cc0258fb2c492123c0c01cd703680cbceff1f2c117711da",
        "53ce9322a74a1ab5355f51e358347adfed8c40d413059a07ba1a1f53c",
        "8f341560de8f94bff0cf027cc5a6ab556c9d3e60ac2efebc5716454ca",
        "80e9c50d6ef2561ac23148179e37b7490baba57ff7bd65ddababaa335",
        "454a4eb4738c42bf5166b7e99acdef377e584e00dcc01cd2e631b77fe",
        "a29e48efb0f22409e35ab625f4b9bed94fe9af5d9fb4cd1e16a6c4c8f",
        "3edf54d1f2b24e4afcd40d69888",
    );

    #[test]
    fn generated_key_pair_is_well_formed() {
        let client = SrpClient::standard();
        let pair = client.generate_key_pair().expect("key generation");
        assert!(!pair.private_key_hex().is_empty());
        assert!(!pair.public_key_hex().is_empty());
        // A fresh pair must be usable for a u computation against itself.
        let u = client.calculate_u(pair.public_key_hex(), pair.public_key_hex());
        assert!(u.is_ok());
    }

    #[test]
    fn u_value_matches_recorded_vector() {
        let client = SrpClient::standard();
        let u = client
            .calculate_u(U_CLIENT_PUBLIC, U_SERVER_PUBLIC)
            .expect("u value");
        assert_eq!(
            u.to_str_radix(16),
            "c3a1193f8683863acc9c1d9532105c589696e3347b860080853435906b61342a"
        );
    }

    #[test]
    fn shared_secret_matches_recorded_vector() {
        let client = SrpClient::standard();
        let secret = client
            .calculate_shared_secret(
                "VEUHc88gProyji7",
                "dummy123@",
                "8bb7dcf905f418bf27b6623aa4d2f58f",
                S_CLIENT_PRIVATE,
                S_CLIENT_PUBLIC,
                S_SERVER_PUBLIC,
            )
            .expect("shared secret");
        assert_eq!(secret.as_str(), S_EXPECTED.to_uppercase());
    }

    #[test]
    fn server_value_divisible_by_n_is_rejected() {
        // B = N is the canonical degenerate value: B mod N == 0.
        let client = SrpClient::standard();
        let b_equals_n = client.group().n.to_str_radix(16);
        let result = client.calculate_shared_secret(
            "VEUHc88gProyji7",
            "dummy123@",
            "8bb7dcf905f418bf27b6623aa4d2f58f",
            S_CLIENT_PRIVATE,
            S_CLIENT_PUBLIC,
            &b_equals_n,
        );
        assert_matches!(result, Err(SrpError::IllegalParameter(_)));
    }

    #[test]
    fn malformed_hex_is_a_typed_error() {
        let client = SrpClient::standard();
        let result = client.calculate_shared_secret(
            "user",
            "password",
            "not-hex!",
            S_CLIENT_PRIVATE,
            S_CLIENT_PUBLIC,
            S_SERVER_PUBLIC,
        );
        assert_matches!(result, Err(SrpError::InvalidHex("salt")));
    }

    #[test]
    fn authentication_key_is_deterministic_and_128_bit() {
        let client = SrpClient::standard();
        let u = client
            .calculate_u(U_CLIENT_PUBLIC, U_SERVER_PUBLIC)
            .expect("u value");
        let key_a = client
            .authentication_key(S_EXPECTED, &u.to_str_radix(16))
            .expect("derived key");
        let key_b = client
            .authentication_key(S_EXPECTED, &u.to_str_radix(16))
            .expect("derived key");
        assert_eq!(key_a.len(), 16);
        assert_eq!(*key_a, *key_b);
    }

    #[test]
    fn signature_covers_all_proof_inputs() {
        let client = SrpClient::standard();
        let key = [7u8; 16];
        let base = client
            .authentication_signature(&key, "pool", "user", b"block", "Sun Jan 1 12:00:00 UTC 2023")
            .expect("signature");
        let other = client
            .authentication_signature(&key, "pool", "user", b"block", "Sun Jan 1 12:00:01 UTC 2023")
            .expect("signature");
        assert_eq!(base.len(), 32);
        assert_ne!(base, other);
    }
}
