//! Security regression tests for sealed packets and key derivation.
//!
//! - Keys derived from different channel secrets differ, and neither can
//!   open the other's packets.
//! - The key depends on the provisioned secret; nothing fixed is baked in.
//! - Packets have the `base64(nonce || ciphertext || tag)` layout.
//! - Arbitrary input never panics the open path, and any tampering is caught.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use proptest::prelude::*;

use fadechat::crypto::aead::{AesGcmSession, NONCE_LEN, TAG_LEN, packet_nonce};
use fadechat::crypto::keys::{DerivationScheme, SessionKey};
use fadechat::crypto::{CryptoError, CryptoSession};
use fadechat_proto::codec;
use fadechat_proto::message::{ClientId, Envelope, MessageId};

fn session(secret: &str) -> AesGcmSession {
    AesGcmSession::new(&DerivationScheme::Sha256.derive_key(secret.as_bytes()).unwrap())
}

#[test]
fn rooms_with_different_passwords_are_isolated() {
    let room1 = session("secret1");
    let room2 = session("secret2");

    let packet = room1.seal(b"meet at noon").unwrap();
    assert!(matches!(
        room2.open(&packet),
        Err(CryptoError::AuthenticationFailure)
    ));
    assert_eq!(room1.open(&packet).unwrap(), b"meet at noon");
}

#[test]
fn key_follows_the_secret() {
    for scheme in [DerivationScheme::Sha256, DerivationScheme::Raw] {
        let a = scheme.derive_key(b"alpha").unwrap();
        let b = scheme.derive_key(b"bravo").unwrap();
        assert_ne!(a, b, "{scheme} produced the same key for different secrets");
        assert_ne!(a, SessionKey::from_bytes([0u8; 32]));
    }
}

#[test]
fn empty_secret_is_refused() {
    assert!(DerivationScheme::Sha256.derive_key(b"").is_err());
    assert!(DerivationScheme::Raw.derive_key(b"").is_err());
}

#[test]
fn wire_layout_is_nonce_ciphertext_tag() {
    let s = session("secret1");
    let plaintext = codec::encode(&Envelope::message(
        MessageId::from("m1"),
        ClientId::from("alice"),
        "hello",
    ))
    .unwrap();

    let packet = s.seal(&plaintext).unwrap();
    let raw = STANDARD.decode(&packet).unwrap();
    assert_eq!(raw.len(), NONCE_LEN + plaintext.len() + TAG_LEN);
    assert_eq!(&raw[..NONCE_LEN], &packet_nonce(&packet).unwrap());

    // Nothing of the envelope is visible on the wire.
    assert!(!packet.contains("MESSAGE"));
    assert!(!packet.contains("alice"));
}

#[test]
fn nonces_are_fresh_per_packet() {
    let s = session("secret1");
    let a = s.seal(b"same").unwrap();
    let b = s.seal(b"same").unwrap();
    assert_ne!(a, b);
    assert_ne!(packet_nonce(&a).unwrap(), packet_nonce(&b).unwrap());
}

proptest! {
    #[test]
    fn seal_then_open_returns_plaintext(
        secret in "[ -~]{1,64}",
        plaintext in proptest::collection::vec(any::<u8>(), 0..2048),
    ) {
        let s = session(&secret);
        let packet = s.seal(&plaintext).unwrap();
        prop_assert_eq!(s.open(&packet).unwrap(), plaintext);
    }

    #[test]
    fn open_never_panics_on_arbitrary_text(input in ".{0,512}") {
        let _ = session("secret1").open(&input);
    }

    #[test]
    fn open_never_panics_on_arbitrary_base64(bytes in proptest::collection::vec(any::<u8>(), 0..256)) {
        let result = session("secret1").open(&STANDARD.encode(&bytes));
        prop_assert!(result.is_err());
    }

    #[test]
    fn any_flipped_byte_is_rejected(
        plaintext in proptest::collection::vec(any::<u8>(), 1..256),
        index in any::<prop::sample::Index>(),
        flip in 1u8..=255,
    ) {
        let s = session("secret1");
        let mut raw = STANDARD.decode(s.seal(&plaintext).unwrap()).unwrap();
        let i = index.index(raw.len());
        raw[i] ^= flip;
        prop_assert!(matches!(
            s.open(&STANDARD.encode(&raw)),
            Err(CryptoError::AuthenticationFailure)
        ));
    }
}
