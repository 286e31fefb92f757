#![allow(clippy::unwrap_used, clippy::arithmetic_side_effects)]

//! Property-based tests for inbound counter ordering on the secure channel.

use std::sync::{Arc, OnceLock};

use proptest::prelude::*;
use securegen_crypto_core::{DeviceIdentity, HardwareFingerprint, NoopWatchdog};
use securegen_vault::{
    HandshakeCoordinator, ManualClock, SecureChannelClient, SecurityConfig, TimingJitter,
};

fn coordinator() -> &'static HandshakeCoordinator {
    static COORDINATOR: OnceLock<HandshakeCoordinator> = OnceLock::new();
    COORDINATOR.get_or_init(|| {
        let config = SecurityConfig {
            response_jitter: TimingJitter::disabled(),
            max_secure_sessions: 4,
            ..SecurityConfig::default()
        };
        let c = HandshakeCoordinator::new(
            Arc::new(DeviceIdentity::new(HardwareFingerprint::host_stand_in())),
            &config,
            Arc::new(ManualClock::new(0, 1_750_000_000)),
            Arc::new(NoopWatchdog),
        );
        c.begin();
        c
    })
}

/// Fresh handshake for every case so counters start at zero.
/// Each property uses its own client id; tests run in parallel.
fn fresh_client(client_id: &str) -> SecureChannelClient {
    let c = coordinator();
    c.invalidate(client_id);
    let mut client = SecureChannelClient::new(client_id);
    let response = c.handle_key_exchange(&client.key_exchange_request());
    client.complete_key_exchange(&response).unwrap();
    client
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// A counter is accepted exactly when it exceeds every counter accepted before it.
    #[test]
    fn accepts_only_strictly_increasing(counters in proptest::collection::vec(0u64..64, 1..24)) {
        let c = coordinator();
        let client = fresh_client("ordering");
        let mut high_water = 0u64;
        for counter in counters {
            let sealed = client.seal_request_with_counter("m", counter).unwrap();
            let result = c.decrypt_request("ordering", &sealed);
            if counter > high_water {
                prop_assert_eq!(result.unwrap(), "m");
                high_water = counter;
            } else {
                prop_assert!(result.unwrap_err().is_replay());
            }
        }
    }

    /// Any UTF-8 text survives a request and a response.
    #[test]
    fn text_roundtrips_both_directions(text in "\\PC{0,200}") {
        let c = coordinator();
        let mut client = fresh_client("roundtrip");
        let sealed = client.seal_request(&text).unwrap();
        prop_assert_eq!(c.decrypt_request("roundtrip", &sealed).unwrap(), text.clone());
        let envelope = c.encrypt_response("roundtrip", &text).unwrap();
        prop_assert_eq!(client.open_response(&envelope.to_json().unwrap()).unwrap(), text);
    }
}
