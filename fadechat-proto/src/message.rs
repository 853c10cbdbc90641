//! Wire envelope types for the `FadeChat` protocol.
//!
//! Every packet on the relay is one [`Envelope`], serialized as a JSON
//! record and sealed before transmission. Two shapes exist:
//!
//! ```text
//! MESSAGE: { "type": "MESSAGE", "id": <string>, "senderId": <string>, "text": <string> }
//! ACK:     { "type": "ACK",     "id": <string>, "senderId": <string> }
//! ```

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Maximum allowed text length of a chat message in bytes (16 KB).
pub const MAX_TEXT_SIZE: usize = 16 * 1024;

/// Produce a fresh random identifier.
///
/// Backed by a UUID v4 (122 random bits), so two calls within one session
/// collide with negligible probability. No global uniqueness is implied.
#[must_use]
pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}

/// Identifier correlating a MESSAGE with the ACKs sent for it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(String);

impl MessageId {
    /// Generates a new random message identifier.
    #[must_use]
    pub fn new() -> Self {
        Self(new_id())
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for MessageId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<&str> for MessageId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for MessageId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identity of a chat client, generated once per session and never persisted.
///
/// Used to recognise (and drop) our own packets when the relay echoes them.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClientId(String);

impl ClientId {
    /// Generates a new random client identity.
    #[must_use]
    pub fn new() -> Self {
        Self(new_id())
    }

    /// Returns the identity as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ClientId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<&str> for ClientId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for ClientId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for ClientId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A chat message as carried inside a `MESSAGE` envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    /// Unique identifier of this message.
    pub id: MessageId,
    /// Who sent it.
    pub sender_id: ClientId,
    /// The message body.
    pub text: String,
}

impl ChatMessage {
    /// Validates the message for sending.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::Empty`] for blank text and
    /// [`ValidationError::TooLarge`] when the text exceeds [`MAX_TEXT_SIZE`].
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.text.trim().is_empty() {
            return Err(ValidationError::Empty);
        }
        if self.text.len() > MAX_TEXT_SIZE {
            return Err(ValidationError::TooLarge {
                size: self.text.len(),
                max: MAX_TEXT_SIZE,
            });
        }
        Ok(())
    }
}

/// Read receipt for a previously received message, carried inside an `ACK` envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ack {
    /// The message being acknowledged.
    pub id: MessageId,
    /// Who observed it.
    pub sender_id: ClientId,
}

/// The unit exchanged between clients (after unsealing).
///
/// The `text` field exists only on the `Message` variant, so an ACK can never
/// carry a body and a MESSAGE can never lack one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Envelope {
    /// A chat message.
    #[serde(rename = "MESSAGE")]
    Message(ChatMessage),
    /// An acknowledgment that a message was seen.
    #[serde(rename = "ACK")]
    Ack(Ack),
}

impl Envelope {
    /// Builds a `MESSAGE` envelope.
    pub fn message(id: MessageId, sender_id: ClientId, text: impl Into<String>) -> Self {
        Self::Message(ChatMessage {
            id,
            sender_id,
            text: text.into(),
        })
    }

    /// Builds an `ACK` envelope.
    #[must_use]
    pub const fn ack(id: MessageId, sender_id: ClientId) -> Self {
        Self::Ack(Ack { id, sender_id })
    }

    /// The message identifier this envelope refers to.
    #[must_use]
    pub const fn id(&self) -> &MessageId {
        match self {
            Self::Message(m) => &m.id,
            Self::Ack(a) => &a.id,
        }
    }

    /// The client that produced this envelope.
    #[must_use]
    pub const fn sender_id(&self) -> &ClientId {
        match self {
            Self::Message(m) => &m.sender_id,
            Self::Ack(a) => &a.sender_id,
        }
    }

    /// Wire tag of this envelope (`"MESSAGE"` or `"ACK"`).
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Message(_) => "MESSAGE",
            Self::Ack(_) => "ACK",
        }
    }
}

/// Reasons a message fails validation before sending.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// The message text is empty or whitespace only.
    #[error("message text is empty")]
    Empty,
    /// The message text exceeds the size limit.
    #[error("message too large: {size} bytes (max {max} bytes)")]
    TooLarge {
        /// Actual size in bytes.
        size: usize,
        /// Maximum allowed size.
        max: usize,
    },
}
