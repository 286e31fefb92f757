//! Fuzz target for key-exchange request bodies.
//!
//! Both JSON entry points must answer every input with a response body and
//! never panic. Sessions are torn down between runs so the table never fills.
//!
//! # Usage
//!
//! ```sh
//! cd crates/securegen-vault
//! cargo +nightly fuzz run key_exchange_request -- -max_len=2048
//! ```

#![no_main]

use std::sync::Arc;

use libfuzzer_sys::fuzz_target;
use securegen_crypto_core::{DeviceIdentity, HardwareFingerprint, NoopWatchdog};
use securegen_vault::{HandshakeCoordinator, ManualClock, SecurityConfig};

fuzz_target!(|data: &[u8]| {
    let Ok(s) = std::str::from_utf8(data) else {
        return;
    };
    let config = SecurityConfig {
        export_iterations: 1,
        ..SecurityConfig::default()
    };
    let coordinator = HandshakeCoordinator::new(
        Arc::new(DeviceIdentity::new(HardwareFingerprint::host_stand_in())),
        &config,
        Arc::new(ManualClock::new(0, 0)),
        Arc::new(NoopWatchdog),
    );
    coordinator.begin();
    assert!(!coordinator.handle_key_exchange(s).is_empty());
    assert!(!coordinator.handle_protected_key_exchange(s).is_empty());
    coordinator.end();
});
