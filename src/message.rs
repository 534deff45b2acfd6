//! Rendered chat entries and the in-memory message list.
//!
//! SYSTEM CONTEXT
//! ==============
//! `ChatLog` is the client's projection of the room: optimistic entries we
//! rendered before the server answered, plus everything the server broadcast.
//! Entries are correlated by [`TempId`] and are never removed; a failed send
//! stays visible with its annotation.

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use rand::Rng;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;

use crate::protocol::ServerId;

/// Display name used for the session user's own messages.
pub const OWN_SENDER_NAME: &str = "You";

/// Provisional time label for entries the server has not stamped yet.
pub const SENDING_LABEL: &str = "sending…";

/// Client-local correlation token for an optimistic entry.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TempId(String);

impl TempId {
    /// Generate a fresh id: wall-clock milliseconds plus a random suffix.
    #[must_use]
    pub fn generate() -> Self {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |d| d.as_millis());
        let suffix: u32 = rand::rng().random();
        Self(format!("t{millis}-{suffix:08x}"))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for TempId {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

impl fmt::Display for TempId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A server-provided timestamp. Unparseable values are kept verbatim so they
/// can still be shown.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Timestamp {
    raw: String,
    at: Option<OffsetDateTime>,
}

impl Timestamp {
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        Self { raw: raw.to_owned(), at: OffsetDateTime::parse(raw, &Rfc3339).ok() }
    }

    #[must_use]
    pub fn instant(&self) -> Option<OffsetDateTime> {
        self.at
    }

    /// `HH:MM:SS` in the timestamp's own offset, or the raw text.
    #[must_use]
    pub fn label(&self) -> String {
        let format = format_description!("[hour]:[minute]:[second]");
        self.at
            .and_then(|at| at.format(format).ok())
            .unwrap_or_else(|| self.raw.clone())
    }
}

/// Delivery lifecycle of one rendered entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeliveryState {
    Pending,
    Confirmed,
    Failed,
}

/// One rendered chat entry.
#[derive(Clone, Debug, PartialEq)]
pub struct ChatMessage {
    pub content: String,
    pub sender_name: String,
    pub is_own: bool,
    pub timestamp: Option<Timestamp>,
    pub server_id: Option<ServerId>,
    pub temp_id: Option<TempId>,
    pub delivery: DeliveryState,
    /// Inline annotation shown on failed entries.
    pub failure: Option<String>,
}

impl ChatMessage {
    /// Optimistic entry for a message the session user just submitted.
    #[must_use]
    pub fn pending(content: &str, temp_id: TempId) -> Self {
        Self {
            content: content.to_owned(),
            sender_name: OWN_SENDER_NAME.to_owned(),
            is_own: true,
            timestamp: None,
            server_id: None,
            temp_id: Some(temp_id),
            delivery: DeliveryState::Pending,
            failure: None,
        }
    }

    /// Entry for a server broadcast with no local counterpart.
    #[must_use]
    pub fn broadcast(id: ServerId, content: &str, username: &str, timestamp: &str, is_own: bool) -> Self {
        Self {
            content: content.to_owned(),
            sender_name: if is_own { OWN_SENDER_NAME.to_owned() } else { username.to_owned() },
            is_own,
            timestamp: Some(Timestamp::parse(timestamp)),
            server_id: Some(id),
            temp_id: None,
            delivery: DeliveryState::Confirmed,
            failure: None,
        }
    }

    /// Label shown next to the entry: real time, "sending…", or the failure.
    #[must_use]
    pub fn time_label(&self) -> String {
        if self.delivery == DeliveryState::Failed {
            return format!("failed: {}", self.failure.as_deref().unwrap_or("unknown error"));
        }
        self.timestamp
            .as_ref()
            .map_or_else(|| SENDING_LABEL.to_owned(), Timestamp::label)
    }
}

/// Ordered list of rendered entries.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ChatLog {
    entries: Vec<ChatMessage>,
}

impl ChatLog {
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<&ChatMessage> {
        self.entries.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ChatMessage> {
        self.entries.iter()
    }

    /// Index of the entry carrying `temp_id`, if any.
    #[must_use]
    pub fn position_of(&self, temp_id: &TempId) -> Option<usize> {
        self.entries
            .iter()
            .position(|m| m.temp_id.as_ref() == Some(temp_id))
    }

    /// Append a Pending entry and return its index.
    pub fn push_pending(&mut self, content: &str, temp_id: TempId) -> usize {
        self.entries.push(ChatMessage::pending(content, temp_id));
        self.entries.len() - 1
    }

    /// Append an entry that needs no reconciliation.
    pub fn push(&mut self, message: ChatMessage) -> usize {
        self.entries.push(message);
        self.entries.len() - 1
    }

    /// Confirm the entry tagged `temp_id` in place.
    ///
    /// Re-applying the same confirmation leaves the entry unchanged. A failed
    /// entry is upgraded because the server evidently received it.
    pub fn confirm(&mut self, temp_id: &TempId, server_id: ServerId, timestamp: &str) -> Option<usize> {
        let index = self.position_of(temp_id)?;
        let entry = &mut self.entries[index];
        entry.server_id = Some(server_id);
        entry.timestamp = Some(Timestamp::parse(timestamp));
        entry.delivery = DeliveryState::Confirmed;
        entry.failure = None;
        Some(index)
    }

    /// Attach the timestamp returned by the HTTP save call.
    ///
    /// Only fills a missing timestamp; the socket confirmation is authoritative
    /// once it has arrived.
    pub fn apply_saved_timestamp(&mut self, temp_id: &TempId, timestamp: &str) -> Option<usize> {
        let index = self.position_of(temp_id)?;
        let entry = &mut self.entries[index];
        if entry.timestamp.is_some() {
            return None;
        }
        entry.timestamp = Some(Timestamp::parse(timestamp));
        Some(index)
    }

    /// Mark the Pending entry tagged `temp_id` as Failed.
    ///
    /// Returns `None` when no Pending entry matches; confirmed entries are
    /// never downgraded.
    pub fn fail(&mut self, temp_id: &TempId, reason: &str) -> Option<usize> {
        let index = self.position_of(temp_id)?;
        let entry = &mut self.entries[index];
        if entry.delivery != DeliveryState::Pending {
            return None;
        }
        entry.delivery = DeliveryState::Failed;
        entry.failure = Some(reason.to_owned());
        Some(index)
    }

    /// Mark every Pending entry as Failed and return their indices.
    pub fn fail_pending(&mut self, reason: &str) -> Vec<usize> {
        let mut failed = Vec::new();
        for (index, entry) in self.entries.iter_mut().enumerate() {
            if entry.delivery == DeliveryState::Pending {
                entry.delivery = DeliveryState::Failed;
                entry.failure = Some(reason.to_owned());
                failed.push(index);
            }
        }
        failed
    }
}

#[cfg(test)]
#[path = "message_test.rs"]
mod tests;
