//! Cryptographic envelope layer for `FadeChat`.
//!
//! Defines the [`CryptoSession`] trait for seal/open operations and its
//! error type. The trait is the **only** boundary where plaintext exists:
//! everything entering [`CryptoSession::seal`] is plaintext and everything
//! leaving it is a transport-safe sealed packet.
//!
//! Sealed packet layout:
//!
//! ```text
//! base64( nonce[12] || AEAD ciphertext || tag[16] )
//! ```

pub mod aead;
pub mod keys;

/// Errors that can occur while sealing or opening packets.
///
/// Every AEAD failure on the open path maps to the single
/// [`CryptoError::AuthenticationFailure`] variant, which carries no detail
/// from the primitive.
#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    /// The packet is structurally invalid (bad base64, too short for a nonce).
    #[error("malformed packet: {0}")]
    MalformedPacket(String),

    /// The authentication tag did not verify (tampered packet or wrong key).
    #[error("packet authentication failed")]
    AuthenticationFailure,

    /// Encryption failed.
    #[error("encryption failed")]
    EncryptionFailed,
}

/// Trait for sealing and opening message payloads.
///
/// # Invariant
///
/// All data passed to [`Transport::send`](super::transport::Transport::send)
/// must have come out of `seal`. All data received from
/// [`Transport::recv`](super::transport::Transport::recv) must pass through
/// `open` before being interpreted.
///
/// # Implementors
///
/// - [`aead::AesGcmSession`]: AES-256-GCM with a random 96-bit nonce per packet
pub trait CryptoSession: Send + Sync {
    /// Encrypt a plaintext payload, returning transport-safe text.
    ///
    /// Each call uses a fresh nonce, so sealing the same plaintext twice
    /// yields different packets.
    fn seal(&self, plaintext: &[u8]) -> Result<String, CryptoError>;

    /// Decrypt a sealed packet, recovering the original plaintext.
    ///
    /// Returns [`CryptoError::MalformedPacket`] if the packet cannot be
    /// parsed and [`CryptoError::AuthenticationFailure`] if it was tampered
    /// with or sealed under a different key.
    fn open(&self, packet: &str) -> Result<Vec<u8>, CryptoError>;
}
