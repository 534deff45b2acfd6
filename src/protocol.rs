//! Wire schema for the chat room socket.
//!
//! Frames are JSON text tagged by a `type` field. Inbound frames that carry an
//! unrecognized tag decode to [`Inbound::Unknown`] instead of failing, so a
//! newer server never breaks an older client. Payloads without a `type` field
//! (the untyped `{message, username}` variant) are rejected as protocol errors.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ProtocolError;
use crate::message::TempId;

/// Close code for an intentional shutdown; any other code is abnormal.
pub const NORMAL_CLOSE: u16 = 1000;

/// Close code reported when the socket dropped without a close frame.
pub const ABNORMAL_CLOSE: u16 = 1006;

/// Server-assigned message id. The server may send it as a number or a string.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ServerId {
    Number(u64),
    Text(String),
}

impl fmt::Display for ServerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

/// Frames received from the server.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Inbound {
    /// A broadcast chat message, possibly echoing one of ours.
    ChatMessage {
        id: ServerId,
        message: String,
        username: String,
        timestamp: String,
        #[serde(default)]
        temp_id: Option<TempId>,
    },
    /// Another participant started or stopped typing.
    Typing { typing: bool, username: String },
    /// Server-reported failure, optionally tied to one of our messages.
    Error {
        error: String,
        #[serde(default)]
        temp_id: Option<TempId>,
    },
    #[serde(other)]
    Unknown,
}

/// Frames sent to the server.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Outbound {
    ChatMessage { message: String, temp_id: TempId },
    Typing { typing: bool },
}

/// Decode one inbound text frame.
///
/// # Errors
///
/// Returns [`ProtocolError::Json`] when the text is not JSON or does not match
/// any known frame shape.
pub fn decode_inbound(text: &str) -> Result<Inbound, ProtocolError> {
    Ok(serde_json::from_str(text)?)
}

/// Encode one outbound frame as JSON text.
#[must_use]
pub fn encode_outbound(frame: &Outbound) -> String {
    // Serializing plain strings and bools into a String cannot fail.
    serde_json::to_string(frame).unwrap_or_default()
}

#[cfg(test)]
#[path = "protocol_test.rs"]
mod tests;
