//! AES-256-CBC encryption with strict PKCS#7 padding checks.
//!
//! This module provides:
//! - [`encrypt`]: random IV, PKCS#7, returns `iv || ciphertext`
//! - [`decrypt`]: inverse of [`encrypt`], returns [`SecretBuffer`]
//! - [`encrypt_with_iv`] / [`decrypt_with_iv`]: same cipher with the IV
//!   carried separately (password bundles)
//!
//! # Padding
//!
//! Decryption runs the cipher without padding removal and then checks the
//! padding by hand: the final byte must be in `1..=16` and no larger than the
//! buffer, and every padding byte must equal it. The two failure kinds are
//! reported separately as [`CryptoError::InvalidPadding`] and
//! [`CryptoError::PaddingVerificationFailed`].
//!
//! CBC carries no authentication. Integrity of flash records rests on the
//! padding check and on the JSON parse that follows decryption.

use crate::error::CryptoError;
use crate::memory::SecretBuffer;
use aes::Aes256;
use cbc::cipher::block_padding::{NoPadding, Pkcs7};
use cbc::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use cbc::{Decryptor, Encryptor};
use rand::rngs::OsRng;
use rand::RngCore;
use zeroize::Zeroize;

type Aes256CbcEnc = Encryptor<Aes256>;
type Aes256CbcDec = Decryptor<Aes256>;

/// AES-256 key length in bytes.
pub const KEY_LEN: usize = 32;

/// CBC initialization vector length in bytes.
pub const IV_LEN: usize = 16;

/// AES block length in bytes.
pub const BLOCK_LEN: usize = 16;

/// Shortest valid `iv || ciphertext`: one IV and one padded block.
const MIN_SEALED_LEN: usize = IV_LEN + BLOCK_LEN;

// ---------------------------------------------------------------------------
// Separate-IV API
// ---------------------------------------------------------------------------

/// Encrypt with an explicit IV and PKCS#7 padding.
///
/// The output is always a non-empty multiple of 16 bytes; an empty plaintext
/// yields one block of padding.
///
/// # Errors
///
/// Returns `CryptoError::Encryption` if the key is not 32 bytes or the IV is
/// not 16 bytes.
pub fn encrypt_with_iv(plaintext: &[u8], key: &[u8], iv: &[u8]) -> Result<Vec<u8>, CryptoError> {
    let cipher = Aes256CbcEnc::new_from_slices(key, iv).map_err(|_| {
        CryptoError::Encryption(format!(
            "invalid key/iv length: {}/{} bytes (expected {KEY_LEN}/{IV_LEN})",
            key.len(),
            iv.len()
        ))
    })?;
    Ok(cipher.encrypt_padded_vec_mut::<Pkcs7>(plaintext))
}

/// Decrypt with an explicit IV and strict PKCS#7 verification.
///
/// # Errors
///
/// - `CryptoError::DecryptionFailed` if the key/IV lengths are wrong or the
///   ciphertext is empty or not block-aligned
/// - `CryptoError::InvalidPadding` / `CryptoError::PaddingVerificationFailed`
///   on bad padding
pub fn decrypt_with_iv(
    ciphertext: &[u8],
    key: &[u8],
    iv: &[u8],
) -> Result<SecretBuffer, CryptoError> {
    if ciphertext.is_empty() || ciphertext.len() % BLOCK_LEN != 0 {
        return Err(CryptoError::DecryptionFailed);
    }
    let cipher =
        Aes256CbcDec::new_from_slices(key, iv).map_err(|_| CryptoError::DecryptionFailed)?;
    let mut buffer = cipher
        .decrypt_padded_vec_mut::<NoPadding>(ciphertext)
        .map_err(|_| CryptoError::DecryptionFailed)?;

    let unpadded = strip_padding(&buffer);
    let result = unpadded.map(|len| SecretBuffer::new(&buffer[..len]));
    buffer.zeroize();
    result
}

/// Validate PKCS#7 padding and return the unpadded length.
fn strip_padding(buffer: &[u8]) -> Result<usize, CryptoError> {
    let Some(&last) = buffer.last() else {
        return Err(CryptoError::InvalidPadding);
    };
    let pad = usize::from(last);
    if pad == 0 || pad > BLOCK_LEN || pad > buffer.len() {
        return Err(CryptoError::InvalidPadding);
    }
    let body_len = buffer
        .len()
        .checked_sub(pad)
        .ok_or(CryptoError::InvalidPadding)?;
    let mut diff = 0u8;
    for &b in &buffer[body_len..] {
        diff |= b ^ last;
    }
    if diff != 0 {
        return Err(CryptoError::PaddingVerificationFailed);
    }
    Ok(body_len)
}

// ---------------------------------------------------------------------------
// IV-prefixed API
// ---------------------------------------------------------------------------

/// Encrypt under `key` with a fresh random IV; returns `iv || ciphertext`.
///
/// # Errors
///
/// Returns `CryptoError::Encryption` if the key is not 32 bytes.
pub fn encrypt(plaintext: &[u8], key: &[u8]) -> Result<Vec<u8>, CryptoError> {
    let mut iv = [0u8; IV_LEN];
    OsRng.fill_bytes(&mut iv);
    let ciphertext = encrypt_with_iv(plaintext, key, &iv)?;

    let mut out = Vec::with_capacity(IV_LEN.saturating_add(ciphertext.len()));
    out.extend_from_slice(&iv);
    out.extend_from_slice(&ciphertext);
    Ok(out)
}

/// Decrypt `iv || ciphertext` produced by [`encrypt`].
///
/// # Errors
///
/// - `CryptoError::DecryptionFailed` if the input is shorter than 32 bytes,
///   not a multiple of 16, or the key length is wrong
/// - `CryptoError::InvalidPadding` / `CryptoError::PaddingVerificationFailed`
///   on bad padding
pub fn decrypt(sealed: &[u8], key: &[u8]) -> Result<SecretBuffer, CryptoError> {
    if sealed.len() < MIN_SEALED_LEN || sealed.len() % BLOCK_LEN != 0 {
        return Err(CryptoError::DecryptionFailed);
    }
    let (iv, ciphertext) = sealed.split_at(IV_LEN);
    decrypt_with_iv(ciphertext, key, iv)
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
