//! Client half of the secure channel, as the web UI implements it.
//!
//! Used by integration tests and native tools. Both handshakes end with the
//! client deriving the same session key as the device.

use securegen_crypto_core::encoding::{from_base64, from_hex, to_hex};
use securegen_crypto_core::{
    apply_keystream, client_nonce, decrypt_with_password, derive_session_key,
    encrypt_with_password, unxor_hex, AgreementKeyPair, CryptoError, NoopWatchdog, SecretBytes,
    SESSION_KEY_LEN,
};
use serde_json::{json, Value};

use rand::rngs::OsRng;
use rand::RngCore;

use super::{SecureEnvelope, ENVELOPE_IV_LEN, ENVELOPE_TAG_LEN, SESSION_KEY_XOR_KEY};
use crate::error::{HandshakeError, SessionError, VaultError};

/// Browser-side state for one `client_id`.
pub struct SecureChannelClient {
    client_id: String,
    key_pair: AgreementKeyPair,
    session_key: Option<SecretBytes<SESSION_KEY_LEN>>,
    tx_counter: u64,
    rx_counter: u64,
}

impl SecureChannelClient {
    #[must_use]
    pub fn new(client_id: &str) -> Self {
        Self {
            client_id: client_id.to_owned(),
            key_pair: AgreementKeyPair::generate(),
            session_key: None,
            tx_counter: 0,
            rx_counter: 0,
        }
    }

    #[must_use]
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    #[must_use]
    pub const fn is_established(&self) -> bool {
        self.session_key.is_some()
    }

    /// `{"client_id","pubkey"}`
    #[must_use]
    pub fn key_exchange_request(&self) -> String {
        json!({
            "client_id": self.client_id,
            "pubkey": self.key_pair.public_key_hex(),
        })
        .to_string()
    }

    /// `{"client_id","encrypted_pubkey"}` wrapped under the device static key.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::Crypto`] if wrapping fails.
    pub fn protected_key_exchange_request(
        &self,
        static_key: &str,
        iterations: u32,
    ) -> Result<String, VaultError> {
        let bundle = encrypt_with_password(
            self.key_pair.public_key_hex().as_bytes(),
            static_key,
            iterations,
            &NoopWatchdog,
        )?;
        Ok(json!({
            "client_id": self.client_id,
            "encrypted_pubkey": bundle,
        })
        .to_string())
    }

    /// Finish the unprotected handshake from the device response.
    ///
    /// The derived key must match the XOR-obscured `encryptedSessionKey`.
    ///
    /// # Errors
    ///
    /// - [`HandshakeError::InvalidRequest`] for an error or malformed response
    /// - [`HandshakeError::InvalidPublicKeyFormat`] / [`HandshakeError::EcdhComputeFailure`]
    /// - [`HandshakeError::KeyDerivationFailure`] if the keys disagree
    pub fn complete_key_exchange(&mut self, response: &str) -> Result<(), HandshakeError> {
        let body = success_body(response)?;
        let server_pubkey = string_field(&body, "pubkey")?;
        let key = self.derive(server_pubkey)?;

        let announced = string_field(&body, "encryptedSessionKey")?;
        let announced = unxor_hex(announced, SESSION_KEY_XOR_KEY)
            .map_err(|_| HandshakeError::KeyDerivationFailure)?;
        if announced != to_hex(key.expose()) {
            return Err(HandshakeError::KeyDerivationFailure);
        }
        self.install(key);
        Ok(())
    }

    /// Finish the protected handshake.
    ///
    /// # Errors
    ///
    /// [`HandshakeError::KeyUnwrapFailed`] if the server key does not open,
    /// otherwise as [`Self::complete_key_exchange`].
    pub fn complete_protected_key_exchange(
        &mut self,
        response: &str,
        static_key: &str,
        iterations: u32,
    ) -> Result<(), HandshakeError> {
        let body = success_body(response)?;
        let wrapped = string_field(&body, "encrypted_pubkey")?;
        let bundle = from_base64(wrapped)
            .ok()
            .and_then(|b| String::from_utf8(b).ok())
            .ok_or(HandshakeError::KeyUnwrapFailed)?;
        let server_pubkey = decrypt_with_password(&bundle, static_key, iterations, &NoopWatchdog)
            .and_then(|pt| pt.to_utf8())
            .map_err(|_| HandshakeError::KeyUnwrapFailed)?;
        let key = self.derive(&server_pubkey)?;
        self.install(key);
        Ok(())
    }

    /// Seal a request with the next counter.
    ///
    /// # Errors
    ///
    /// [`SessionError::NotEstablished`] before a handshake.
    pub fn seal_request(&mut self, plaintext: &str) -> Result<String, VaultError> {
        let counter = self.tx_counter.saturating_add(1);
        let sealed = self.seal_request_with_counter(plaintext, counter)?;
        self.tx_counter = counter;
        Ok(sealed)
    }

    /// Seal a request with an explicit counter, e.g. to replay one.
    ///
    /// # Errors
    ///
    /// [`SessionError::NotEstablished`] before a handshake.
    pub fn seal_request_with_counter(&self, plaintext: &str, counter: u64) -> Result<String, VaultError> {
        let key = self.session_key.as_ref().ok_or(SessionError::NotEstablished)?;
        let mut iv = [0u8; ENVELOPE_IV_LEN];
        OsRng.fill_bytes(&mut iv);
        let mut tag = [0u8; ENVELOPE_TAG_LEN];
        OsRng.fill_bytes(&mut tag);

        let mut data = plaintext.as_bytes().to_vec();
        apply_keystream(&mut data, key.expose(), &iv)?;
        SecureEnvelope {
            kind: "secure".to_owned(),
            counter,
            data: to_hex(&data),
            iv: to_hex(&iv),
            tag: to_hex(&tag),
        }
        .to_json()
    }

    /// Open a device response, rejecting counters already seen.
    ///
    /// # Errors
    ///
    /// - [`SessionError::NotEstablished`] before a handshake
    /// - [`SessionError::ReplayDetected`] for a stale counter
    /// - [`CryptoError::MalformedEnvelope`] / [`CryptoError::Encoding`]
    pub fn open_response(&mut self, envelope_json: &str) -> Result<String, VaultError> {
        let key = self.session_key.as_ref().ok_or(SessionError::NotEstablished)?;
        let (envelope, mut data, iv) = SecureEnvelope::parse(envelope_json)?;
        if envelope.counter <= self.rx_counter {
            return Err(SessionError::ReplayDetected {
                counter: envelope.counter,
                last_accepted: self.rx_counter,
            }
            .into());
        }
        apply_keystream(&mut data, key.expose(), &iv)?;
        let plaintext = String::from_utf8(data)
            .map_err(|_| CryptoError::Encoding("plaintext is not UTF-8".into()))?;
        self.rx_counter = envelope.counter;
        Ok(plaintext)
    }

    fn derive(&self, server_pubkey_hex: &str) -> Result<SecretBytes<SESSION_KEY_LEN>, HandshakeError> {
        let peer = from_hex(server_pubkey_hex).map_err(|_| HandshakeError::InvalidPublicKeyFormat)?;
        let shared = self.key_pair.shared_secret(&peer).map_err(|e| match e {
            CryptoError::InvalidKeyMaterial(_) => HandshakeError::InvalidPublicKeyFormat,
            _ => HandshakeError::EcdhComputeFailure,
        })?;
        Ok(derive_session_key(
            shared.expose(),
            &client_nonce(&self.client_id),
        ))
    }

    fn install(&mut self, key: SecretBytes<SESSION_KEY_LEN>) {
        self.session_key = Some(key);
        self.tx_counter = 0;
        self.rx_counter = 0;
    }
}

fn success_body(response: &str) -> Result<Value, HandshakeError> {
    let body: Value = serde_json::from_str(response)
        .map_err(|e| HandshakeError::InvalidRequest(e.to_string()))?;
    if body["status"] != "success" {
        let message = body["message"].as_str().unwrap_or("key exchange failed");
        return Err(HandshakeError::InvalidRequest(message.to_owned()));
    }
    Ok(body)
}

fn string_field<'a>(body: &'a Value, name: &str) -> Result<&'a str, HandshakeError> {
    body[name]
        .as_str()
        .ok_or_else(|| HandshakeError::InvalidRequest(format!("missing {name}")))
}
