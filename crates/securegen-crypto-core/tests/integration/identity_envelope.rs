//! The device static key as a bundle password, as the protected handshake uses it.

use securegen_crypto_core::{
    decrypt_with_password, encrypt_with_password, AgreementKeyPair, CryptoError, DeviceIdentity,
    HardwareFingerprint, NoopWatchdog,
};

const ITER: u32 = 2;

#[test]
fn public_key_wrapped_under_static_key() {
    let identity = DeviceIdentity::new(HardwareFingerprint::host_stand_in());
    let browser = AgreementKeyPair::generate();

    let bundle = encrypt_with_password(
        browser.public_key_hex().as_bytes(),
        identity.static_key(),
        ITER,
        &NoopWatchdog,
    )
    .unwrap();

    let opened =
        decrypt_with_password(&bundle, identity.static_key(), ITER, &NoopWatchdog).unwrap();
    assert_eq!(opened.to_utf8().unwrap(), browser.public_key_hex());
}

#[test]
fn other_device_cannot_unwrap() {
    let ours = DeviceIdentity::new(HardwareFingerprint::host_stand_in());
    let theirs = DeviceIdentity::new(HardwareFingerprint {
        chip_id: 42,
        ..HardwareFingerprint::host_stand_in()
    });
    let bundle = encrypt_with_password(b"0411223344", ours.static_key(), ITER, &NoopWatchdog)
        .unwrap();
    match decrypt_with_password(&bundle, theirs.static_key(), ITER, &NoopWatchdog) {
        Ok(pt) => assert_ne!(pt.expose(), b"0411223344"),
        Err(e) => assert!(matches!(
            e,
            CryptoError::InvalidPadding | CryptoError::PaddingVerificationFailed
        )),
    }
}
