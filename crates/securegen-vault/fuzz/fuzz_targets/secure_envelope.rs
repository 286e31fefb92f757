//! Fuzz target for inbound secure envelopes.
//!
//! Parses arbitrary strings as `{"type","counter","data","iv","tag"}` and
//! feeds them to an established session; must never panic.
//!
//! # Usage
//!
//! ```sh
//! cd crates/securegen-vault
//! cargo +nightly fuzz run secure_envelope -- -max_len=4096
//! ```

#![no_main]

use std::sync::{Arc, OnceLock};

use libfuzzer_sys::fuzz_target;
use securegen_crypto_core::{DeviceIdentity, HardwareFingerprint, NoopWatchdog};
use securegen_vault::{
    HandshakeCoordinator, ManualClock, SecureChannelClient, SecureEnvelope, SecurityConfig,
    TimingJitter,
};

fn coordinator() -> &'static HandshakeCoordinator {
    static COORDINATOR: OnceLock<HandshakeCoordinator> = OnceLock::new();
    COORDINATOR.get_or_init(|| {
        let config = SecurityConfig {
            response_jitter: TimingJitter::disabled(),
            ..SecurityConfig::default()
        };
        let c = HandshakeCoordinator::new(
            Arc::new(DeviceIdentity::new(HardwareFingerprint::host_stand_in())),
            &config,
            Arc::new(ManualClock::new(0, 1_750_000_000)),
            Arc::new(NoopWatchdog),
        );
        c.begin();
        let mut client = SecureChannelClient::new("fuzz-client");
        if let Ok(response) = c.process_key_exchange("fuzz-client", &client_pubkey(&client)) {
            let _ = client.complete_key_exchange(&response.to_string());
        }
        c
    })
}

fn client_pubkey(client: &SecureChannelClient) -> String {
    serde_json::from_str::<serde_json::Value>(&client.key_exchange_request())
        .ok()
        .and_then(|v| v["pubkey"].as_str().map(str::to_owned))
        .unwrap_or_default()
}

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        let _ = SecureEnvelope::parse(s);
        let _ = coordinator().decrypt_request("fuzz-client", s);
    }
});
