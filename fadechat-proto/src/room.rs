//! Room join parameters shared by the client and the relay.
//!
//! A client joins a room by opening the relay's WebSocket endpoint with the
//! room identifier and its password as query parameters:
//!
//! ```text
//! ws://relay.example:8080/ws?chatId=room1&password=secret1
//! ```

use serde::{Deserialize, Serialize};

/// Query parameter carrying the room identifier.
pub const CHAT_ID_PARAM: &str = "chatId";

/// Query parameter carrying the room password.
pub const PASSWORD_PARAM: &str = "password";

/// Credentials presented when joining a room.
///
/// Both fields are optional at the wire level so the relay can tell a
/// missing parameter (bad request) from a wrong one (unauthorized).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinParams {
    /// Room identifier.
    pub chat_id: Option<String>,
    /// Room password.
    pub password: Option<String>,
}

impl JoinParams {
    /// Creates join parameters for a room.
    pub fn new(chat_id: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            chat_id: Some(chat_id.into()),
            password: Some(password.into()),
        }
    }

    /// Returns `(chat_id, password)` when both are present and non-empty.
    #[must_use]
    pub fn complete(&self) -> Option<(&str, &str)> {
        match (self.chat_id.as_deref(), self.password.as_deref()) {
            (Some(chat_id), Some(password)) if !chat_id.is_empty() && !password.is_empty() => {
                Some((chat_id, password))
            }
            _ => None,
        }
    }
}
