//! P-256 ECDH key agreement.
//!
//! Public keys travel as 65-byte uncompressed SEC1 points (`0x04 || X || Y`),
//! hex-encoded on the wire. The shared secret is the 32-byte X coordinate of
//! `d · Q`, with no further hashing here; the caller runs HKDF over it.

use crate::encoding::to_hex;
use crate::error::CryptoError;
use crate::memory::{constant_time_eq, SecretBytes};
use p256::ecdh::diffie_hellman;
use p256::elliptic_curve::sec1::ToEncodedPoint;
use p256::{PublicKey, SecretKey};
use rand::rngs::OsRng;
use std::fmt;

/// Length of an uncompressed SEC1 P-256 point.
pub const PUBLIC_KEY_LEN: usize = 65;

/// Length of the ECDH shared secret (X coordinate).
pub const SHARED_SECRET_LEN: usize = 32;

/// SEC1 tag byte for an uncompressed point.
const UNCOMPRESSED_TAG: u8 = 0x04;

/// A P-256 key pair. The secret scalar is zeroized on drop by `p256`.
pub struct AgreementKeyPair {
    secret: SecretKey,
    public: [u8; PUBLIC_KEY_LEN],
}

impl AgreementKeyPair {
    /// Generate a fresh key pair from the OS CSPRNG.
    #[must_use]
    pub fn generate() -> Self {
        let secret = SecretKey::random(&mut OsRng);
        let encoded = secret.public_key().to_encoded_point(false);
        let mut public = [0u8; PUBLIC_KEY_LEN];
        public.copy_from_slice(encoded.as_bytes());
        Self { secret, public }
    }

    /// Uncompressed public point.
    #[must_use]
    pub const fn public_key(&self) -> &[u8; PUBLIC_KEY_LEN] {
        &self.public
    }

    /// Lowercase hex of the uncompressed public point (130 characters).
    #[must_use]
    pub fn public_key_hex(&self) -> String {
        to_hex(&self.public)
    }

    /// Compute the shared secret with a peer's uncompressed public key.
    ///
    /// # Errors
    ///
    /// - `CryptoError::InvalidKeyMaterial` if `peer` is not a 65-byte
    ///   uncompressed point on the curve
    /// - `CryptoError::KeyAgreement` if the computed secret is degenerate
    pub fn shared_secret(&self, peer: &[u8]) -> Result<SecretBytes<SHARED_SECRET_LEN>, CryptoError> {
        let peer_key = parse_public_key(peer)?;
        let shared = diffie_hellman(self.secret.to_nonzero_scalar(), peer_key.as_affine());
        let secret = SecretBytes::<SHARED_SECRET_LEN>::from_slice(shared.raw_secret_bytes())
            .map_err(|_| CryptoError::KeyAgreement("unexpected shared secret length".into()))?;
        if constant_time_eq(secret.expose(), &[0u8; SHARED_SECRET_LEN]) {
            return Err(CryptoError::KeyAgreement("degenerate shared secret".into()));
        }
        Ok(secret)
    }
}

impl fmt::Debug for AgreementKeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AgreementKeyPair")
            .field("public", &self.public_key_hex())
            .field("secret", &"***")
            .finish()
    }
}

/// Decode and validate an uncompressed SEC1 point.
///
/// # Errors
///
/// Returns `CryptoError::InvalidKeyMaterial` on wrong length, wrong tag byte,
/// or a point that is not on the curve.
pub fn parse_public_key(bytes: &[u8]) -> Result<PublicKey, CryptoError> {
    if bytes.len() != PUBLIC_KEY_LEN {
        return Err(CryptoError::InvalidKeyMaterial(format!(
            "public key is {} bytes (expected {PUBLIC_KEY_LEN})",
            bytes.len()
        )));
    }
    if bytes[0] != UNCOMPRESSED_TAG {
        return Err(CryptoError::InvalidKeyMaterial(
            "public key is not an uncompressed point".into(),
        ));
    }
    PublicKey::from_sec1_bytes(bytes)
        .map_err(|_| CryptoError::InvalidKeyMaterial("public key is not on P-256".into()))
}
