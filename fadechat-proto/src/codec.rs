//! Serialization and deserialization of [`Envelope`]s.
//!
//! The plaintext form of an envelope is a UTF-8 JSON object. Decoding
//! ignores unknown fields, so newer peers can add fields without breaking
//! older ones; those fields are not carried through a re-encode.

use crate::message::Envelope;

/// Error type for codec encode/decode operations.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// The plaintext is not a well-formed envelope: not JSON, a required
    /// field is missing, or the `type` tag is not recognised.
    #[error("malformed envelope: {0}")]
    MalformedEnvelope(String),
    /// Serialization of an outbound envelope failed.
    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Encodes an [`Envelope`] into its JSON plaintext bytes.
///
/// # Errors
///
/// Returns `CodecError::Serialization` if the envelope cannot be serialized.
pub fn encode(envelope: &Envelope) -> Result<Vec<u8>, CodecError> {
    serde_json::to_vec(envelope).map_err(|e| CodecError::Serialization(e.to_string()))
}

/// Decodes an [`Envelope`] from JSON plaintext bytes.
///
/// # Errors
///
/// Returns `CodecError::MalformedEnvelope` if the bytes are not a valid
/// `MESSAGE` or `ACK` record.
pub fn decode(bytes: &[u8]) -> Result<Envelope, CodecError> {
    serde_json::from_slice(bytes).map_err(|e| CodecError::MalformedEnvelope(e.to_string()))
}
