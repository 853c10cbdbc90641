//! Session key material and key derivation.
//!
//! Every party in a room shares one symmetric key for the lifetime of the
//! session. The key is derived once, at startup, from provisioned secret
//! material (an explicit secret or the room password) by a
//! [`KeyDerivation`] implementation. Nothing here generates or exchanges
//! keys between peers.

use sha2::{Digest, Sha256};
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Length of an AES-256 key in bytes.
pub const KEY_LEN: usize = 32;

/// Domain separation label mixed into SHA-256 derivation.
const DERIVATION_LABEL: &[u8] = b"fadechat/v1/session-key";

/// Errors raised while deriving a session key.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum KeyError {
    /// The secret material is empty.
    #[error("secret material is empty")]
    EmptySecret,
}

/// A fixed-length symmetric key, zeroized on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SessionKey([u8; KEY_LEN]);

impl SessionKey {
    /// Wraps raw key bytes.
    #[must_use]
    pub const fn from_bytes(bytes: [u8; KEY_LEN]) -> Self {
        Self(bytes)
    }

    /// Raw key bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }

    /// Short, non-reversible fingerprint for logs and the status bar.
    ///
    /// Two clients showing the same fingerprint hold the same key.
    #[must_use]
    pub fn fingerprint(&self) -> String {
        let digest = Sha256::digest(self.0);
        digest[..4].iter().map(|b| format!("{b:02x}")).collect()
    }
}

impl PartialEq for SessionKey {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl Eq for SessionKey {}

impl std::fmt::Debug for SessionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SessionKey({})", self.fingerprint())
    }
}

/// Derives a fixed-length session key from secret material.
pub trait KeyDerivation {
    /// Derive a [`KEY_LEN`]-byte key from `secret`.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::EmptySecret`] if `secret` is empty.
    fn derive(&self, secret: &[u8]) -> Result<SessionKey, KeyError>;
}

/// SHA-256 over a domain label and the secret.
///
/// Accepts secrets of any length and spreads short passwords over the whole
/// key. This is the default.
#[derive(Debug, Clone, Copy, Default)]
pub struct Sha256Derivation;

impl KeyDerivation for Sha256Derivation {
    fn derive(&self, secret: &[u8]) -> Result<SessionKey, KeyError> {
        if secret.is_empty() {
            return Err(KeyError::EmptySecret);
        }
        let mut hasher = Sha256::new();
        hasher.update(DERIVATION_LABEL);
        hasher.update(secret);
        Ok(SessionKey(hasher.finalize().into()))
    }
}

/// Uses the secret bytes directly, zero-padded or truncated to [`KEY_LEN`].
///
/// A 32-byte secret becomes the key verbatim, which keeps sealed packets
/// interoperable with clients that import the raw secret as an AES key.
#[derive(Debug, Clone, Copy, Default)]
pub struct PaddedDerivation;

impl KeyDerivation for PaddedDerivation {
    fn derive(&self, secret: &[u8]) -> Result<SessionKey, KeyError> {
        if secret.is_empty() {
            return Err(KeyError::EmptySecret);
        }
        let mut key = [0u8; KEY_LEN];
        let len = secret.len().min(KEY_LEN);
        key[..len].copy_from_slice(&secret[..len]);
        Ok(SessionKey(key))
    }
}

/// Derivation scheme selected in configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum DerivationScheme {
    /// [`Sha256Derivation`].
    #[default]
    Sha256,
    /// [`PaddedDerivation`].
    Raw,
}

impl DerivationScheme {
    /// Derive a session key with this scheme.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::EmptySecret`] if `secret` is empty.
    pub fn derive_key(self, secret: &[u8]) -> Result<SessionKey, KeyError> {
        match self {
            Self::Sha256 => Sha256Derivation.derive(secret),
            Self::Raw => PaddedDerivation.derive(secret),
        }
    }
}

impl std::fmt::Display for DerivationScheme {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sha256 => write!(f, "sha256"),
            Self::Raw => write!(f, "raw"),
        }
    }
}
