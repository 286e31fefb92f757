//! One entry of the secure session table.

use securegen_crypto_core::{client_nonce, SecretBytes, CLIENT_NONCE_LEN, SESSION_KEY_LEN};
use zeroize::Zeroize;

use crate::error::SessionError;

/// Where a client stands in the key exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Entry exists, no key yet (or the last exchange failed before completing).
    Exchanging,
    /// Session key derived; messages may flow.
    Established,
}

/// Per-client transport state. The key is zeroized on drop.
pub struct SecureSession {
    client_id: String,
    client_nonce: [u8; CLIENT_NONCE_LEN],
    session_key: SecretBytes<SESSION_KEY_LEN>,
    rx_counter: u64,
    tx_counter: u64,
    state: SessionState,
    last_activity_millis: u32,
}

impl SecureSession {
    pub(crate) fn new(client_id: &str, now_millis: u32) -> Self {
        Self {
            client_id: client_id.to_owned(),
            client_nonce: client_nonce(client_id),
            session_key: SecretBytes::zeroed(),
            rx_counter: 0,
            tx_counter: 0,
            state: SessionState::Exchanging,
            last_activity_millis: now_millis,
        }
    }

    #[must_use]
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    #[must_use]
    pub const fn client_nonce(&self) -> &[u8; CLIENT_NONCE_LEN] {
        &self.client_nonce
    }

    #[must_use]
    pub const fn state(&self) -> SessionState {
        self.state
    }

    #[must_use]
    pub const fn is_established(&self) -> bool {
        matches!(self.state, SessionState::Established)
    }

    #[must_use]
    pub const fn rx_counter(&self) -> u64 {
        self.rx_counter
    }

    #[must_use]
    pub const fn tx_counter(&self) -> u64 {
        self.tx_counter
    }

    #[must_use]
    pub const fn last_activity_millis(&self) -> u32 {
        self.last_activity_millis
    }

    /// Install a fresh key and reset both counters.
    pub(crate) fn establish(&mut self, key: SecretBytes<SESSION_KEY_LEN>, now_millis: u32) {
        self.session_key = key;
        self.rx_counter = 0;
        self.tx_counter = 0;
        self.state = SessionState::Established;
        self.last_activity_millis = now_millis;
    }

    /// Session key, only once established.
    pub(crate) fn key(&self) -> Result<&[u8; SESSION_KEY_LEN], SessionError> {
        if self.is_established() {
            Ok(self.session_key.expose())
        } else {
            Err(SessionError::NotEstablished)
        }
    }

    /// Accept `counter` if it is strictly greater than the last one.
    pub(crate) fn accept_counter(&mut self, counter: u64, now_millis: u32) -> Result<(), SessionError> {
        if counter <= self.rx_counter {
            return Err(SessionError::ReplayDetected {
                counter,
                last_accepted: self.rx_counter,
            });
        }
        self.rx_counter = counter;
        self.last_activity_millis = now_millis;
        Ok(())
    }

    /// Pre-increment the outbound counter; the first response carries 1.
    pub(crate) fn next_tx_counter(&mut self, now_millis: u32) -> u64 {
        self.tx_counter = self.tx_counter.saturating_add(1);
        self.last_activity_millis = now_millis;
        self.tx_counter
    }

    /// Zero the key and drop back to `Exchanging`.
    pub(crate) fn wipe(&mut self) {
        self.session_key.zeroize();
        self.rx_counter = 0;
        self.tx_counter = 0;
        self.state = SessionState::Exchanging;
    }
}

impl std::fmt::Debug for SecureSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecureSession")
            .field("client_id", &self.client_id)
            .field("state", &self.state)
            .field("rx_counter", &self.rx_counter)
            .field("tx_counter", &self.tx_counter)
            .field("session_key", &"***")
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_session_is_exchanging() {
        let s = SecureSession::new("abc123", 0);
        assert_eq!(s.state(), SessionState::Exchanging);
        assert!(matches!(s.key(), Err(SessionError::NotEstablished)));
        assert_eq!(&s.client_nonce()[..6], b"abc123");
        assert_eq!(&s.client_nonce()[6..], &[0u8; 10]);
    }

    #[test]
    fn counters_reset_on_establish() {
        let mut s = SecureSession::new("c", 0);
        s.establish(SecretBytes::new([1; 32]), 5);
        s.accept_counter(4, 6).unwrap();
        assert_eq!(s.next_tx_counter(7), 1);
        s.establish(SecretBytes::new([2; 32]), 8);
        assert_eq!(s.rx_counter(), 0);
        assert_eq!(s.tx_counter(), 0);
        assert_eq!(s.key().unwrap(), &[2; 32]);
    }

    #[test]
    fn replay_window() {
        let mut s = SecureSession::new("c", 0);
        s.establish(SecretBytes::new([1; 32]), 0);
        assert!(matches!(
            s.accept_counter(0, 0),
            Err(SessionError::ReplayDetected { counter: 0, last_accepted: 0 })
        ));
        s.accept_counter(5, 0).unwrap();
        assert!(s.accept_counter(5, 0).is_err());
        assert!(s.accept_counter(4, 0).is_err());
        s.accept_counter(6, 0).unwrap();
        assert_eq!(s.rx_counter(), 6);
    }

    #[test]
    fn wipe_zeroes_key() {
        let mut s = SecureSession::new("c", 0);
        s.establish(SecretBytes::new([9; 32]), 0);
        s.wipe();
        assert!(!s.is_established());
        assert!(s.session_key.is_zeroed());
    }

    #[test]
    fn debug_hides_key() {
        let mut s = SecureSession::new("c", 0);
        s.establish(SecretBytes::new([0xEE; 32]), 0);
        assert!(!format!("{s:?}").contains("238"));
    }
}
