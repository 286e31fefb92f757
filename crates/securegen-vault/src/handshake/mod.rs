//! Secure channel handshake and per-message transport.
//!
//! One P-256 key pair per server run; one [`SecureSession`] per browser
//! `client_id`. A session walks `NoSession → Exchanging → Established` and
//! only an established session may encrypt or decrypt.
//!
//! Locking: the table lock is held only to find, insert or remove entries.
//! Each entry has its own mutex, so ECDH for one client never blocks
//! message traffic for another.

pub mod client;
pub mod session;

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::thread;

use rand::rngs::OsRng;
use rand::RngCore;
use securegen_crypto_core::encoding::{from_base64, from_hex, to_base64, to_hex};
use securegen_crypto_core::watchdog::guarded;
use securegen_crypto_core::{
    apply_keystream, decrypt_with_password, derive_session_key, encrypt_with_password, xor_hex,
    AgreementKeyPair, CryptoError, DeviceIdentity, Watchdog,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::config::{SecurityConfig, TimingJitter};
use crate::error::{HandshakeError, SessionError, VaultError};
use crate::platform::Clock;

pub use client::SecureChannelClient;
pub use session::{SecureSession, SessionState};

/// Repeating XOR key for `encryptedSessionKey` in the unprotected handshake.
/// Browsers embed the same string.
pub const SESSION_KEY_XOR_KEY: &str = "SecureStaticKey2024!";

/// Random IV length on outbound envelopes.
pub const ENVELOPE_IV_LEN: usize = 16;

/// Random (unchecked) tag length on outbound envelopes.
pub const ENVELOPE_TAG_LEN: usize = 16;

/// IV lengths accepted on inbound envelopes.
const ACCEPTED_IV_LENS: [usize; 2] = [12, 16];

/// `{"type":"secure","counter","data","iv","tag"}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecureEnvelope {
    #[serde(rename = "type", default = "secure_type")]
    pub kind: String,
    pub counter: u64,
    /// Hex ciphertext.
    pub data: String,
    /// Hex IV.
    pub iv: String,
    /// Hex tag, 1 to 16 bytes. Carried for wire compatibility, never verified.
    pub tag: String,
}

fn secure_type() -> String {
    "secure".to_owned()
}

impl SecureEnvelope {
    /// Serialize to the wire JSON.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::Serialization`] if serialization fails.
    pub fn to_json(&self) -> Result<String, VaultError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parse and sanity-check an inbound envelope.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::MalformedEnvelope`] for invalid JSON, missing
    /// fields, bad hex, an IV of unexpected length, or a tag that is empty
    /// or longer than 16 bytes.
    pub fn parse(json: &str) -> Result<(Self, Vec<u8>, Vec<u8>), CryptoError> {
        let envelope: Self = serde_json::from_str(json)
            .map_err(|e| CryptoError::MalformedEnvelope(e.to_string()))?;
        let tag = from_hex(&envelope.tag)
            .map_err(|_| CryptoError::MalformedEnvelope("tag is not hex".into()))?;
        if tag.is_empty() || tag.len() > ENVELOPE_TAG_LEN {
            return Err(CryptoError::MalformedEnvelope(format!(
                "tag is {} bytes",
                tag.len()
            )));
        }
        let data = from_hex(&envelope.data)
            .map_err(|_| CryptoError::MalformedEnvelope("data is not hex".into()))?;
        let iv = from_hex(&envelope.iv)
            .map_err(|_| CryptoError::MalformedEnvelope("iv is not hex".into()))?;
        if !ACCEPTED_IV_LENS.contains(&iv.len()) {
            return Err(CryptoError::MalformedEnvelope(format!(
                "iv is {} bytes",
                iv.len()
            )));
        }
        Ok((envelope, data, iv))
    }
}

/// First eight characters of a client id, for logs.
pub(crate) fn id_prefix(client_id: &str) -> &str {
    client_id
        .char_indices()
        .nth(8)
        .map_or(client_id, |(idx, _)| &client_id[..idx])
}

type SessionHandle = Arc<Mutex<SecureSession>>;

/// Retired ids remembered per table slot. Oldest are forgotten first.
const RETIRED_PER_SLOT: usize = 4;

/// Server side of the secure channel.
pub struct HandshakeCoordinator {
    identity: Arc<DeviceIdentity>,
    server_key: RwLock<Option<AgreementKeyPair>>,
    sessions: Mutex<HashMap<String, SessionHandle>>,
    /// Clients whose established session was removed. They never get
    /// plaintext passthrough again.
    retired: Mutex<VecDeque<String>>,
    max_sessions: usize,
    jitter: TimingJitter,
    export_iterations: u32,
    clock: Arc<dyn Clock>,
    watchdog: Arc<dyn Watchdog>,
}

impl HandshakeCoordinator {
    #[must_use]
    pub fn new(
        identity: Arc<DeviceIdentity>,
        config: &SecurityConfig,
        clock: Arc<dyn Clock>,
        watchdog: Arc<dyn Watchdog>,
    ) -> Self {
        Self {
            identity,
            server_key: RwLock::new(None),
            sessions: Mutex::new(HashMap::new()),
            retired: Mutex::new(VecDeque::new()),
            max_sessions: config.max_secure_sessions.max(1),
            jitter: config.response_jitter,
            export_iterations: config.export_iterations,
            clock,
            watchdog,
        }
    }

    // ── Lifecycle ──────────────────────────────────────────────────

    /// Generate the server key pair. Idempotent.
    pub fn begin(&self) {
        let mut key = self.server_key.write().unwrap_or_else(PoisonError::into_inner);
        if key.is_none() {
            *key = Some(guarded(self.watchdog.as_ref(), AgreementKeyPair::generate));
            info!("secure layer started");
        }
    }

    /// Drop the server key pair and every session.
    pub fn end(&self) {
        let mut key = self.server_key.write().unwrap_or_else(PoisonError::into_inner);
        if key.take().is_some() {
            let drained: Vec<(String, SessionHandle)> = self.table().drain().collect();
            for (client_id, handle) in drained {
                self.wipe_and_retire(client_id, &handle);
            }
            info!("secure layer stopped");
        }
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.server_key
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Uncompressed server public key in hex, if running.
    #[must_use]
    pub fn server_public_key_hex(&self) -> Option<String> {
        self.server_key
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(AgreementKeyPair::public_key_hex)
    }

    // ── Handshake ──────────────────────────────────────────────────

    /// Unprotected key exchange.
    ///
    /// Returns the success response body. On failure an existing session
    /// for `client_id` keeps its previous state and key.
    ///
    /// # Errors
    ///
    /// - [`HandshakeError::ServerNotInitialized`] before [`Self::begin`]
    /// - [`HandshakeError::SessionLimitExceeded`] if the table is full
    /// - [`HandshakeError::InvalidPublicKeyFormat`] for a bad client key
    /// - [`HandshakeError::EcdhComputeFailure`] if agreement fails
    pub fn process_key_exchange(
        &self,
        client_id: &str,
        client_pubkey_hex: &str,
    ) -> Result<Value, HandshakeError> {
        info!(client = id_prefix(client_id), "key exchange start");
        let server_key = self.server_key.read().unwrap_or_else(PoisonError::into_inner);
        let server = server_key.as_ref().ok_or(HandshakeError::ServerNotInitialized)?;

        let handle = self.find_or_create(client_id)?;
        let mut session = lock_session(&handle);
        let key_hex = self.agree(server, &mut session, client_pubkey_hex)?;

        let encrypted_session_key = xor_hex(&key_hex, SESSION_KEY_XOR_KEY)
            .map_err(|_| HandshakeError::KeyDerivationFailure)?;
        drop(session);

        info!(
            client = id_prefix(client_id),
            sessions = self.active_session_count(),
            "key exchange ok"
        );
        Ok(json!({
            "type": "keyexchange",
            "status": "success",
            "pubkey": server.public_key_hex(),
            "encryptedSessionKey": encrypted_session_key,
        }))
    }

    /// Protected key exchange: both public keys travel password-wrapped
    /// under the device static key.
    ///
    /// `encrypted_pubkey` is the `{"salt","iv","ciphertext"}` bundle JSON.
    ///
    /// # Errors
    ///
    /// As [`Self::process_key_exchange`], plus
    /// [`HandshakeError::KeyUnwrapFailed`] and [`HandshakeError::KeyWrapFailed`].
    pub fn process_protected_key_exchange(
        &self,
        client_id: &str,
        encrypted_pubkey: &str,
    ) -> Result<Value, HandshakeError> {
        info!(client = id_prefix(client_id), "protected key exchange start");
        let server_key = self.server_key.read().unwrap_or_else(PoisonError::into_inner);
        let server = server_key.as_ref().ok_or(HandshakeError::ServerNotInitialized)?;

        let static_key = self.identity.static_key();
        let client_pubkey_hex = decrypt_with_password(
            encrypted_pubkey,
            static_key,
            self.export_iterations,
            self.watchdog.as_ref(),
        )
        .and_then(|pt| pt.to_utf8())
        .map_err(|e| {
            warn!(client = id_prefix(client_id), error = %e, "client key unwrap failed");
            HandshakeError::KeyUnwrapFailed
        })?;

        let handle = self.find_or_create(client_id)?;
        let mut session = lock_session(&handle);
        self.agree(server, &mut session, client_pubkey_hex.trim())?;
        drop(session);

        let wrapped = encrypt_with_password(
            server.public_key_hex().as_bytes(),
            static_key,
            self.export_iterations,
            self.watchdog.as_ref(),
        )
        .map_err(|_| HandshakeError::KeyWrapFailed)?;

        info!(
            client = id_prefix(client_id),
            sessions = self.active_session_count(),
            "protected key exchange ok"
        );
        Ok(json!({
            "type": "keyexchange",
            "status": "success",
            "encrypted_pubkey": to_base64(wrapped.as_bytes()),
        }))
    }

    /// JSON entry point for `{"client_id","pubkey"}` (or `client_public_key`).
    ///
    /// Always returns a response body, success or error.
    #[must_use]
    pub fn handle_key_exchange(&self, body: &str) -> String {
        let result = parse_request(body, &["pubkey", "client_public_key"]).and_then(
            |(client_id, pubkey)| self.process_key_exchange(&client_id, &pubkey),
        );
        result
            .unwrap_or_else(|e| e.to_response_json())
            .to_string()
    }

    /// JSON entry point for `{"client_id","encrypted_pubkey"}`.
    ///
    /// `encrypted_pubkey` may be the bundle object itself, its JSON text, or
    /// that text in base64.
    #[must_use]
    pub fn handle_protected_key_exchange(&self, body: &str) -> String {
        let result = parse_request(body, &["encrypted_pubkey"]).and_then(
            |(client_id, bundle)| self.process_protected_key_exchange(&client_id, &bundle),
        );
        result
            .unwrap_or_else(|e| e.to_response_json())
            .to_string()
    }

    /// Steps shared by both handshakes: parse, ECDH, HKDF, establish.
    /// `session` is only touched once every step has succeeded.
    fn agree(
        &self,
        server: &AgreementKeyPair,
        session: &mut SecureSession,
        client_pubkey_hex: &str,
    ) -> Result<String, HandshakeError> {
        let peer = from_hex(client_pubkey_hex).map_err(|_| HandshakeError::InvalidPublicKeyFormat)?;
        securegen_crypto_core::agreement::parse_public_key(&peer)
            .map_err(|_| HandshakeError::InvalidPublicKeyFormat)?;

        self.watchdog.feed();
        let shared = server
            .shared_secret(&peer)
            .map_err(|_| HandshakeError::EcdhComputeFailure)?;
        let key = derive_session_key(shared.expose(), session.client_nonce());
        let key_hex = to_hex(key.expose());
        session.establish(key, self.clock.monotonic_millis());
        debug!(client = id_prefix(session.client_id()), "session key derived");
        Ok(key_hex)
    }

    // ── Transport ──────────────────────────────────────────────────

    /// Encrypt a response body for an established client.
    ///
    /// Sleeps the configured jitter: the success range after encrypting,
    /// the failure range when the session is missing or not established.
    ///
    /// # Errors
    ///
    /// - [`SessionError::NotFound`] without a session
    /// - [`SessionError::NotEstablished`] before the key exchange completes
    pub fn encrypt_response(
        &self,
        client_id: &str,
        plaintext: &str,
    ) -> Result<SecureEnvelope, VaultError> {
        match self.seal(client_id, plaintext) {
            Ok(envelope) => {
                thread::sleep(self.jitter.success_delay());
                Ok(envelope)
            }
            Err(e) => {
                thread::sleep(self.jitter.failure_delay());
                Err(e)
            }
        }
    }

    fn seal(&self, client_id: &str, plaintext: &str) -> Result<SecureEnvelope, VaultError> {
        let handle = self.get(client_id).ok_or(SessionError::NotFound)?;
        let mut session = lock_session(&handle);
        session.key()?;

        let mut iv = [0u8; ENVELOPE_IV_LEN];
        OsRng.fill_bytes(&mut iv);
        let mut tag = [0u8; ENVELOPE_TAG_LEN];
        OsRng.fill_bytes(&mut tag);

        let mut data = plaintext.as_bytes().to_vec();
        apply_keystream(&mut data, session.key()?, &iv)?;
        let counter = session.next_tx_counter(self.clock.monotonic_millis());

        Ok(SecureEnvelope {
            kind: secure_type(),
            counter,
            data: to_hex(&data),
            iv: to_hex(&iv),
            tag: to_hex(&tag),
        })
    }

    /// Decrypt an inbound envelope from an established client.
    ///
    /// The counter is checked and recorded before decryption.
    ///
    /// # Errors
    ///
    /// - [`SessionError::NotFound`] / [`SessionError::NotEstablished`]
    /// - [`CryptoError::MalformedEnvelope`] for a bad envelope
    /// - [`SessionError::ReplayDetected`] if `counter <= last accepted`
    /// - [`CryptoError::Encoding`] if the plaintext is not UTF-8
    pub fn decrypt_request(&self, client_id: &str, envelope_json: &str) -> Result<String, VaultError> {
        let handle = self.get(client_id).ok_or(SessionError::NotFound)?;
        let mut session = lock_session(&handle);
        session.key()?;

        let (envelope, mut data, iv) = SecureEnvelope::parse(envelope_json)?;
        if let Err(e) = session.accept_counter(envelope.counter, self.clock.monotonic_millis()) {
            warn!(
                client = id_prefix(client_id),
                counter = envelope.counter,
                last_accepted = session.rx_counter(),
                "replay detected"
            );
            return Err(e.into());
        }
        apply_keystream(&mut data, session.key()?, &iv)?;
        drop(session);

        String::from_utf8(data)
            .map_err(|_| CryptoError::Encoding("plaintext is not UTF-8".into()).into())
    }

    /// Encrypt `response` if the client has a session; pass it through if
    /// the client never had one.
    ///
    /// # Errors
    ///
    /// A client with a session whose encryption fails gets the error, never
    /// the plaintext. So does a client whose established session was
    /// invalidated or dropped by [`Self::end`] ([`SessionError::NotFound`]).
    pub fn wrap_response(&self, client_id: &str, response: &str) -> Result<String, VaultError> {
        if self.passes_through(client_id) {
            return Ok(response.to_owned());
        }
        self.encrypt_response(client_id, response)?.to_json()
    }

    /// Decrypt `body` if the client has a session; pass it through if the
    /// client never had one.
    ///
    /// # Errors
    ///
    /// A client with a session whose decryption fails is rejected, as is a
    /// client whose established session was removed.
    pub fn unwrap_request(&self, client_id: &str, body: &str) -> Result<String, VaultError> {
        if self.passes_through(client_id) {
            return Ok(body.to_owned());
        }
        self.decrypt_request(client_id, body)
    }

    /// Plaintext is allowed only for clients that never established a
    /// session (within the retired-id window).
    fn passes_through(&self, client_id: &str) -> bool {
        client_id.is_empty() || (self.get(client_id).is_none() && !self.was_retired(client_id))
    }

    // ── Table ──────────────────────────────────────────────────────

    #[must_use]
    pub fn is_secure_session_valid(&self, client_id: &str) -> bool {
        self.get(client_id)
            .is_some_and(|handle| lock_session(&handle).is_established())
    }

    /// Zero the key and remove the entry. No-op for unknown clients.
    pub fn invalidate(&self, client_id: &str) {
        let removed = self.table().remove(client_id);
        if let Some(handle) = removed {
            self.wipe_and_retire(client_id.to_owned(), &handle);
            debug!(
                client = id_prefix(client_id),
                remaining = self.active_session_count(),
                "secure session removed"
            );
        }
    }

    #[must_use]
    pub fn active_session_count(&self) -> usize {
        self.table().len()
    }

    #[must_use]
    pub const fn max_sessions(&self) -> usize {
        self.max_sessions
    }

    /// `{"secure_sessions","max_sessions"[,"client_session_active"]}`
    #[must_use]
    pub fn status_json(&self, client_id: Option<&str>) -> Value {
        let mut body = json!({
            "secure_sessions": self.active_session_count(),
            "max_sessions": self.max_sessions,
        });
        if let Some(id) = client_id.filter(|id| !id.is_empty()) {
            body["client_session_active"] = Value::Bool(self.is_secure_session_valid(id));
        }
        body
    }

    /// Snapshot of one session's counters, for diagnostics and tests.
    #[must_use]
    pub fn session_counters(&self, client_id: &str) -> Option<(u64, u64)> {
        self.get(client_id).map(|handle| {
            let session = lock_session(&handle);
            (session.rx_counter(), session.tx_counter())
        })
    }

    fn table(&self) -> std::sync::MutexGuard<'_, HashMap<String, SessionHandle>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn wipe_and_retire(&self, client_id: String, handle: &SessionHandle) {
        let mut session = lock_session(handle);
        let was_established = session.is_established();
        session.wipe();
        drop(session);
        if !was_established {
            return;
        }
        let capacity = self.max_sessions.saturating_mul(RETIRED_PER_SLOT);
        let mut retired = self.retired.lock().unwrap_or_else(PoisonError::into_inner);
        if retired.contains(&client_id) {
            return;
        }
        if retired.len() >= capacity {
            retired.pop_front();
        }
        retired.push_back(client_id);
    }

    fn was_retired(&self, client_id: &str) -> bool {
        self.retired
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .any(|id| id == client_id)
    }

    fn get(&self, client_id: &str) -> Option<SessionHandle> {
        self.table().get(client_id).cloned()
    }

    fn find_or_create(&self, client_id: &str) -> Result<SessionHandle, HandshakeError> {
        let mut table = self.table();
        if let Some(handle) = table.get(client_id) {
            return Ok(Arc::clone(handle));
        }
        if table.len() >= self.max_sessions {
            warn!(limit = self.max_sessions, "secure session limit reached");
            return Err(HandshakeError::SessionLimitExceeded);
        }
        let handle = Arc::new(Mutex::new(SecureSession::new(
            client_id,
            self.clock.monotonic_millis(),
        )));
        table.insert(client_id.to_owned(), Arc::clone(&handle));
        debug!(client = id_prefix(client_id), total = table.len(), "secure session created");
        Ok(handle)
    }
}

fn lock_session(handle: &SessionHandle) -> std::sync::MutexGuard<'_, SecureSession> {
    handle.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Pull `client_id` and the first present field of `keys` out of a request body.
fn parse_request(body: &str, keys: &[&str]) -> Result<(String, String), HandshakeError> {
    let value: Value = serde_json::from_str(body)
        .map_err(|e| HandshakeError::InvalidRequest(format!("body is not JSON: {e}")))?;
    let client_id = value
        .get("client_id")
        .and_then(Value::as_str)
        .filter(|id| !id.is_empty())
        .ok_or_else(|| HandshakeError::InvalidRequest("missing client_id".into()))?;
    let field = keys
        .iter()
        .find_map(|k| value.get(*k))
        .ok_or_else(|| HandshakeError::InvalidRequest(format!("missing {}", keys.join("/"))))?;
    let payload = match field {
        Value::String(s) => normalize_bundle(s),
        Value::Object(_) => field.to_string(),
        _ => return Err(HandshakeError::InvalidRequest("field is not a string".into())),
    };
    Ok((client_id.to_owned(), payload))
}

/// Bundle JSON as-is, or decoded from base64 when it does not look like JSON.
fn normalize_bundle(s: &str) -> String {
    let trimmed = s.trim();
    if trimmed.starts_with('{') {
        return trimmed.to_owned();
    }
    from_base64(trimmed)
        .ok()
        .and_then(|bytes| String::from_utf8(bytes).ok())
        .filter(|decoded| decoded.trim_start().starts_with('{'))
        .unwrap_or_else(|| trimmed.to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_config;
    use crate::platform::ManualClock;
    use securegen_crypto_core::{HardwareFingerprint, NoopWatchdog};

    fn coordinator() -> HandshakeCoordinator {
        let c = HandshakeCoordinator::new(
            Arc::new(DeviceIdentity::new(HardwareFingerprint::host_stand_in())),
            &test_config(),
            Arc::new(ManualClock::new(1_000, 1_750_000_000)),
            Arc::new(NoopWatchdog),
        );
        c.begin();
        c
    }

    #[test]
    fn id_prefix_truncates_to_eight_chars() {
        assert_eq!(id_prefix("abcdefghijkl"), "abcdefgh");
        assert_eq!(id_prefix("abc"), "abc");
        assert_eq!(id_prefix("ääääääääää"), "ääääääää");
    }

    #[test]
    fn not_initialized_before_begin() {
        let c = HandshakeCoordinator::new(
            Arc::new(DeviceIdentity::new(HardwareFingerprint::host_stand_in())),
            &test_config(),
            Arc::new(ManualClock::new(0, 0)),
            Arc::new(NoopWatchdog),
        );
        let pk = AgreementKeyPair::generate().public_key_hex();
        assert_eq!(
            c.process_key_exchange("abc", &pk),
            Err(HandshakeError::ServerNotInitialized)
        );
        assert!(c.server_public_key_hex().is_none());
    }

    #[test]
    fn bad_key_leaves_entry_exchanging() {
        let c = coordinator();
        assert_eq!(
            c.process_key_exchange("abc", "04zz"),
            Err(HandshakeError::InvalidPublicKeyFormat)
        );
        assert_eq!(c.active_session_count(), 1);
        assert!(!c.is_secure_session_valid("abc"));
        assert!(matches!(
            c.decrypt_request("abc", "{}"),
            Err(VaultError::Session(SessionError::NotEstablished))
        ));
    }

    #[test]
    fn wrong_length_key_is_invalid_format() {
        let c = coordinator();
        let short = "04".repeat(64);
        assert_eq!(
            c.process_key_exchange("abc", &short),
            Err(HandshakeError::InvalidPublicKeyFormat)
        );
    }

    #[test]
    fn envelope_parse_rejects_bad_iv() {
        let bad = r#"{"type":"secure","counter":1,"data":"00","iv":"0011","tag":"00"}"#;
        assert!(matches!(
            SecureEnvelope::parse(bad),
            Err(CryptoError::MalformedEnvelope(_))
        ));
        let missing = r#"{"type":"secure","data":"00","iv":"00","tag":"00"}"#;
        assert!(SecureEnvelope::parse(missing).is_err());
    }

    #[test]
    fn envelope_parse_checks_tag() {
        let iv = "00".repeat(16);
        let with_tag = |tag: &str| {
            format!(r#"{{"type":"secure","counter":1,"data":"00","iv":"{iv}","tag":"{tag}"}}"#)
        };
        assert!(SecureEnvelope::parse(&with_tag(&"ab".repeat(16))).is_ok());
        assert!(SecureEnvelope::parse(&with_tag("ab")).is_ok());
        let too_long = "ab".repeat(17);
        for bad in ["", "zz", "abc", too_long.as_str()] {
            assert!(
                matches!(
                    SecureEnvelope::parse(&with_tag(bad)),
                    Err(CryptoError::MalformedEnvelope(_))
                ),
                "{bad:?}"
            );
        }
    }

    #[test]
    fn request_parsing_accepts_both_field_names() {
        let (id, pk) = parse_request(r#"{"client_id":"a","client_public_key":"04"}"#, &["pubkey", "client_public_key"]).unwrap();
        assert_eq!((id.as_str(), pk.as_str()), ("a", "04"));
        assert!(matches!(
            parse_request(r#"{"pubkey":"04"}"#, &["pubkey"]),
            Err(HandshakeError::InvalidRequest(_))
        ));
    }

    #[test]
    fn bundle_normalization() {
        let json = r#"{"salt":"a","iv":"b","ciphertext":"c"}"#;
        assert_eq!(normalize_bundle(json), json);
        assert_eq!(normalize_bundle(&to_base64(json.as_bytes())), json);
        assert_eq!(normalize_bundle("garbage"), "garbage");
    }

    #[test]
    fn status_json_shape() {
        let c = coordinator();
        let body = c.status_json(Some("abc"));
        assert_eq!(body["secure_sessions"], 0);
        assert_eq!(body["max_sessions"], 5);
        assert_eq!(body["client_session_active"], false);
        assert!(c.status_json(None).get("client_session_active").is_none());
    }

    #[test]
    fn end_clears_sessions() {
        let c = coordinator();
        let _ = c.process_key_exchange("abc", "bad");
        assert_eq!(c.active_session_count(), 1);
        c.end();
        assert_eq!(c.active_session_count(), 0);
        assert!(!c.is_running());
    }
}
