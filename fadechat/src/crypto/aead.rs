//! AES-256-GCM packet sealing.
//!
//! Each sealed packet carries its own random 96-bit nonce in front of the
//! ciphertext, and the whole thing is base64-encoded so it can travel as a
//! WebSocket text frame. No associated data is bound.
//!
//! Random nonces keep collision probability negligible for session-scale
//! volumes (2^96 space). They are not suitable for a key used across many
//! sessions; keys here live for one session only.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use rand::RngCore;

use super::keys::SessionKey;
use super::{CryptoError, CryptoSession};

/// Size of the nonce prefix in bytes (96 bits).
pub const NONCE_LEN: usize = 12;

/// Size of the authentication tag in bytes (128 bits).
pub const TAG_LEN: usize = 16;

/// [`CryptoSession`] backed by AES-256-GCM with a fixed session key.
pub struct AesGcmSession {
    cipher: Aes256Gcm,
    fingerprint: String,
}

impl AesGcmSession {
    /// Create a session sealing under `key`.
    #[must_use]
    pub fn new(key: &SessionKey) -> Self {
        Self {
            cipher: Aes256Gcm::new(key.as_bytes().into()),
            fingerprint: key.fingerprint(),
        }
    }

    /// Fingerprint of the session key (see [`SessionKey::fingerprint`]).
    #[must_use]
    pub fn key_fingerprint(&self) -> &str {
        &self.fingerprint
    }

    /// Seal with a caller-chosen nonce.
    ///
    /// Only [`CryptoSession::seal`] should call this outside of tests.
    fn seal_with_nonce(
        &self,
        nonce: &[u8; NONCE_LEN],
        plaintext: &[u8],
    ) -> Result<String, CryptoError> {
        let ciphertext = self
            .cipher
            .encrypt(Nonce::from_slice(nonce), plaintext)
            .map_err(|_| CryptoError::EncryptionFailed)?;

        let mut packet = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        packet.extend_from_slice(nonce);
        packet.extend_from_slice(&ciphertext);
        Ok(STANDARD.encode(packet))
    }
}

impl std::fmt::Debug for AesGcmSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AesGcmSession")
            .field("key", &self.fingerprint)
            .finish_non_exhaustive()
    }
}

impl CryptoSession for AesGcmSession {
    fn seal(&self, plaintext: &[u8]) -> Result<String, CryptoError> {
        let mut nonce = [0u8; NONCE_LEN];
        rand::rng().fill_bytes(&mut nonce);
        self.seal_with_nonce(&nonce, plaintext)
    }

    fn open(&self, packet: &str) -> Result<Vec<u8>, CryptoError> {
        let bytes = STANDARD
            .decode(packet.trim())
            .map_err(|e| CryptoError::MalformedPacket(format!("invalid base64: {e}")))?;

        if bytes.len() < NONCE_LEN {
            return Err(CryptoError::MalformedPacket(format!(
                "need at least {NONCE_LEN} bytes for the nonce, got {}",
                bytes.len()
            )));
        }

        let (nonce, ciphertext) = bytes.split_at(NONCE_LEN);
        self.cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| CryptoError::AuthenticationFailure)
    }
}

/// Extract the nonce prefix of a sealed packet without decrypting it.
///
/// # Errors
///
/// Returns [`CryptoError::MalformedPacket`] if the packet is not base64 or
/// is shorter than a nonce.
pub fn packet_nonce(packet: &str) -> Result<[u8; NONCE_LEN], CryptoError> {
    let bytes = STANDARD
        .decode(packet.trim())
        .map_err(|e| CryptoError::MalformedPacket(format!("invalid base64: {e}")))?;
    bytes
        .get(..NONCE_LEN)
        .and_then(|prefix| <[u8; NONCE_LEN]>::try_from(prefix).ok())
        .ok_or_else(|| CryptoError::MalformedPacket("packet shorter than nonce".into()))
}
