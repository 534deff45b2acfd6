//! Synchronous core of the chat client.
//!
//! DESIGN
//! ======
//! `ChatSession` owns every piece of client state: connection lifecycle,
//! message list, typing debounce, banners, and the compose input. Each entry
//! point handles one event to completion:
//! - frames go straight out through the attached [`FrameSink`], so a send
//!   failure is known before the handler returns;
//! - anything that needs a clock or I/O (connect, reconnect timer, typing
//!   timer, HTTP save) comes back as an [`Effect`] for the runtime to run;
//! - observable changes are queued as [`ClientEvent`]s for subscribers.
//!
//! Socket events carry the connection id they were issued with, so events from
//! a socket that has since been replaced are dropped.

use tracing::{debug, info, warn};

use crate::api::SaveReceipt;
use crate::config::ChatConfig;
use crate::connection::{CloseOutcome, ConnectionManager, ConnectionState};
use crate::error::{ConnectionError, PersistenceError};
use crate::message::{ChatMessage, TempId};
use crate::protocol::{Inbound, NORMAL_CLOSE, Outbound, ServerId, decode_inbound, encode_outbound};
use crate::typing::{TypingDebouncer, apply_remote_typing};
use crate::view::ChatView;

/// Longest message the server accepts, in characters.
pub const MAX_MESSAGE_CHARS: usize = 500;

pub const NOT_CONNECTED_ERROR: &str = "Not connected. Please wait for the chat to reconnect.";
pub const RECONNECT_EXHAUSTED_ERROR: &str = "Connection lost. Please refresh the page to reconnect.";

/// Annotation for entries still unconfirmed when their connection closed.
pub const CONNECTION_LOST_FAILURE: &str = "connection lost before delivery";

/// Write half of an open socket.
pub trait FrameSink: Send {
    /// Queue one text frame.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectionError::Closed`] when the socket can no longer send.
    fn send_text(&mut self, text: String) -> Result<(), ConnectionError>;

    /// Close the socket with `code`.
    fn close(&mut self, code: u16);
}

/// Work the runtime performs on behalf of the session.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Effect {
    /// Open a socket to `url`, tagging its events with `conn_id`.
    Connect { conn_id: u64, url: String },
    /// Call [`ChatSession::on_reconnect_due`] after `delay`.
    ScheduleReconnect { attempt: u32, delay: std::time::Duration },
    /// Call [`ChatSession::on_typing_due`] with `generation` after `delay`.
    ScheduleTypingStop { generation: u64, delay: std::time::Duration },
    /// Persist `content` over HTTP and report back with `temp_id`.
    SaveMessage { temp_id: TempId, content: String },
}

/// Observable change, published to subscribers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ClientEvent {
    ConnectionChanged(ConnectionState),
    MessageAdded { index: usize },
    MessageUpdated { index: usize },
    TypingChanged(Option<String>),
    InlineError(String),
    Banner { id: u64, text: String },
}

pub struct ChatSession {
    room: String,
    username: String,
    ws_url: String,
    persist: bool,
    conn: ConnectionManager,
    typing: TypingDebouncer,
    view: ChatView,
    sink: Option<Box<dyn FrameSink>>,
    conn_id: u64,
    stopped: bool,
    events: Vec<ClientEvent>,
}

impl ChatSession {
    /// `persist` enables the HTTP save effect for submitted messages.
    #[must_use]
    pub fn new(config: &ChatConfig, persist: bool) -> Self {
        Self {
            room: config.room.clone(),
            username: config.username.clone(),
            ws_url: config.ws_url(),
            persist,
            conn: ConnectionManager::new(config.reconnect),
            typing: TypingDebouncer::new(config.typing_debounce),
            view: ChatView::default(),
            sink: None,
            conn_id: 0,
            stopped: false,
            events: Vec::new(),
        }
    }

    #[must_use]
    pub fn view(&self) -> &ChatView {
        &self.view
    }

    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.conn.state()
    }

    #[must_use]
    pub fn connection(&self) -> &ConnectionManager {
        &self.conn
    }

    /// Id of the most recently requested connection.
    #[must_use]
    pub fn conn_id(&self) -> u64 {
        self.conn_id
    }

    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    /// Drain events queued since the last call.
    pub fn take_events(&mut self) -> Vec<ClientEvent> {
        std::mem::take(&mut self.events)
    }

    // =========================================================================
    // LIFECYCLE
    // =========================================================================

    pub fn start(&mut self) -> Vec<Effect> {
        if self.stopped || self.conn.state() != ConnectionState::Disconnected {
            return Vec::new();
        }
        vec![self.begin_connect()]
    }

    /// Close intentionally. No reconnect follows.
    pub fn stop(&mut self) {
        if self.stopped {
            return;
        }
        self.stopped = true;
        if let Some(mut sink) = self.sink.take() {
            sink.close(NORMAL_CLOSE);
        }
        self.typing.reset();
        self.conn.on_close(NORMAL_CLOSE);
        self.set_status(ConnectionState::Disconnected);
        info!(room = %self.room, "chat: stopped");
    }

    pub fn on_open(&mut self, conn_id: u64, mut sink: Box<dyn FrameSink>) {
        if conn_id != self.conn_id || self.stopped {
            sink.close(NORMAL_CLOSE);
            return;
        }
        self.sink = Some(sink);
        self.conn.on_open();
        self.set_status(ConnectionState::Connected);
        info!(room = %self.room, conn_id, "chat: connected");
    }

    /// The socket could not be constructed at all. Reported, never retried.
    pub fn on_construct_failed(&mut self, conn_id: u64, error: &ConnectionError) {
        if conn_id != self.conn_id {
            return;
        }
        warn!(room = %self.room, %error, "chat: socket construction failed");
        self.conn.on_construct_failed();
        self.set_status(ConnectionState::Disconnected);
        self.banner(format!("Unable to open chat connection: {error}"));
    }

    pub fn on_close(&mut self, conn_id: u64, code: u16) -> Vec<Effect> {
        if conn_id != self.conn_id || self.stopped {
            return Vec::new();
        }
        self.sink = None;
        self.typing.reset();
        let outcome = self.conn.on_close(code);
        self.set_status(ConnectionState::Disconnected);

        // Frames still queued on the closed socket are lost with it.
        for index in self.view.messages.fail_pending(CONNECTION_LOST_FAILURE) {
            self.events.push(ClientEvent::MessageUpdated { index });
        }

        match outcome {
            CloseOutcome::Normal => {
                info!(room = %self.room, "chat: closed normally");
                Vec::new()
            }
            CloseOutcome::Reconnect { attempt, delay } => {
                info!(room = %self.room, code, attempt, ?delay, "chat: reconnect scheduled");
                vec![Effect::ScheduleReconnect { attempt, delay }]
            }
            CloseOutcome::GaveUp => {
                warn!(room = %self.room, code, "chat: reconnect attempts exhausted");
                self.banner(RECONNECT_EXHAUSTED_ERROR);
                Vec::new()
            }
        }
    }

    pub fn on_reconnect_due(&mut self) -> Vec<Effect> {
        if self.stopped || self.conn.state() != ConnectionState::Disconnected || self.conn.is_exhausted() {
            return Vec::new();
        }
        vec![self.begin_connect()]
    }

    fn begin_connect(&mut self) -> Effect {
        self.conn_id += 1;
        self.conn.on_connecting();
        self.set_status(ConnectionState::Connecting);
        Effect::Connect { conn_id: self.conn_id, url: self.ws_url.clone() }
    }

    // =========================================================================
    // OUTBOUND
    // =========================================================================

    /// Send a chat frame over the live connection.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectionError::NotConnected`] unless connected, or the
    /// sink's error if the frame could not be queued.
    pub fn send_chat_message(&mut self, content: &str, temp_id: &TempId) -> Result<(), ConnectionError> {
        self.send(&Outbound::ChatMessage { message: content.to_owned(), temp_id: temp_id.clone() })
    }

    /// Send a typing signal. Fire and forget.
    ///
    /// # Errors
    ///
    /// Same as [`Self::send_chat_message`].
    pub fn send_typing(&mut self, is_typing: bool) -> Result<(), ConnectionError> {
        self.send(&Outbound::Typing { typing: is_typing })
    }

    fn send(&mut self, frame: &Outbound) -> Result<(), ConnectionError> {
        if !self.conn.is_connected() {
            return Err(ConnectionError::NotConnected);
        }
        let sink = self.sink.as_mut().ok_or(ConnectionError::NotConnected)?;
        sink.send_text(encode_outbound(frame))
    }

    // =========================================================================
    // USER INPUT
    // =========================================================================

    /// Replace the compose text. Counts as a keystroke for the typing signal.
    pub fn set_input(&mut self, text: &str) -> Vec<Effect> {
        self.view.input = text.to_owned();
        if !self.conn.is_connected() {
            return Vec::new();
        }
        let key = self.typing.keystroke();
        if key.send_start
            && let Err(error) = self.send_typing(true)
        {
            debug!(%error, "chat: typing start not sent");
        }
        vec![Effect::ScheduleTypingStop { generation: key.generation, delay: self.typing.window() }]
    }

    pub fn on_typing_due(&mut self, generation: u64) {
        if !self.typing.expire(generation) {
            return;
        }
        if let Err(error) = self.send_typing(false) {
            debug!(%error, "chat: typing stop not sent");
        }
    }

    /// Submit the compose text.
    pub fn submit(&mut self) -> Vec<Effect> {
        let raw = self.view.input.clone();
        let content = raw.trim();
        if content.is_empty() {
            return Vec::new();
        }
        if !self.conn.is_connected() {
            self.inline_error(NOT_CONNECTED_ERROR);
            return Vec::new();
        }
        if content.chars().count() > MAX_MESSAGE_CHARS {
            self.inline_error(&format!("Message is too long (max {MAX_MESSAGE_CHARS} characters)."));
            return Vec::new();
        }
        let content = content.to_owned();

        let temp_id = TempId::generate();
        let index = self.view.messages.push_pending(&content, temp_id.clone());
        self.events.push(ClientEvent::MessageAdded { index });
        self.view.input.clear();
        self.view.inline_error = None;

        match self.send_chat_message(&content, &temp_id) {
            Ok(()) => {
                debug!(room = %self.room, %temp_id, "chat: message sent");
                if self.persist {
                    vec![Effect::SaveMessage { temp_id, content }]
                } else {
                    Vec::new()
                }
            }
            Err(error) => {
                warn!(room = %self.room, %temp_id, %error, "chat: send failed");
                if let Some(index) = self.view.messages.fail(&temp_id, &error.to_string()) {
                    self.events.push(ClientEvent::MessageUpdated { index });
                }
                self.inline_error(&format!("Failed to send message: {error}"));
                if self.view.input.is_empty() {
                    self.view.input = raw;
                }
                Vec::new()
            }
        }
    }

    pub fn on_saved(&mut self, temp_id: &TempId, result: Result<SaveReceipt, PersistenceError>) {
        match result {
            Ok(receipt) => {
                let Some(timestamp) = receipt.timestamp else {
                    return;
                };
                if let Some(index) = self.view.messages.apply_saved_timestamp(temp_id, &timestamp) {
                    self.events.push(ClientEvent::MessageUpdated { index });
                }
            }
            Err(error) => {
                warn!(room = %self.room, %temp_id, %error, "chat: save failed");
                self.banner(format!("Failed to save message: {error}"));
            }
        }
    }

    pub fn dismiss_banner(&mut self, id: u64) -> bool {
        self.view.dismiss_banner(id)
    }

    // =========================================================================
    // INBOUND
    // =========================================================================

    /// Handle one inbound text frame. Malformed frames are logged and dropped.
    pub fn on_text(&mut self, text: &str) {
        match decode_inbound(text) {
            Ok(frame) => self.dispatch(frame),
            Err(error) => warn!(room = %self.room, %error, "chat: dropping malformed frame"),
        }
    }

    pub fn dispatch(&mut self, frame: Inbound) {
        match frame {
            Inbound::ChatMessage { id, message, username, timestamp, temp_id } => {
                self.on_chat_message(id, &message, &username, &timestamp, temp_id.as_ref());
            }
            Inbound::Typing { typing, username } => {
                if apply_remote_typing(&mut self.view.typing_line, &self.username, &username, typing) {
                    self.events.push(ClientEvent::TypingChanged(self.view.typing_line.clone()));
                }
            }
            Inbound::Error { error, temp_id } => self.on_server_error(&error, temp_id.as_ref()),
            Inbound::Unknown => warn!(room = %self.room, "chat: ignoring frame with unknown type"),
        }
    }

    fn on_chat_message(
        &mut self,
        id: ServerId,
        message: &str,
        username: &str,
        timestamp: &str,
        temp_id: Option<&TempId>,
    ) {
        if let Some(temp_id) = temp_id
            && let Some(index) = self.view.messages.position_of(temp_id)
        {
            let before = self.view.messages.get(index).cloned();
            self.view.messages.confirm(temp_id, id, timestamp);
            if before.as_ref() != self.view.messages.get(index) {
                self.events.push(ClientEvent::MessageUpdated { index });
            }
            return;
        }

        let is_own = username == self.username;
        let index = self
            .view
            .messages
            .push(ChatMessage::broadcast(id, message, username, timestamp, is_own));
        self.events.push(ClientEvent::MessageAdded { index });
    }

    fn on_server_error(&mut self, error: &str, temp_id: Option<&TempId>) {
        warn!(room = %self.room, error, "chat: server reported error");
        if let Some(temp_id) = temp_id
            && let Some(index) = self.view.messages.fail(temp_id, error)
        {
            self.events.push(ClientEvent::MessageUpdated { index });
            return;
        }
        self.banner(error.to_owned());
    }

    // =========================================================================
    // VIEW HELPERS
    // =========================================================================

    fn set_status(&mut self, state: ConnectionState) {
        if self.view.status == state {
            return;
        }
        self.view.status = state;
        self.events.push(ClientEvent::ConnectionChanged(state));
        if state != ConnectionState::Connected && self.view.typing_line.take().is_some() {
            self.events.push(ClientEvent::TypingChanged(None));
        }
    }

    fn inline_error(&mut self, text: &str) {
        self.view.inline_error = Some(text.to_owned());
        self.events.push(ClientEvent::InlineError(text.to_owned()));
    }

    fn banner(&mut self, text: impl Into<String>) {
        let text = text.into();
        let id = self.view.push_banner(text.clone());
        self.events.push(ClientEvent::Banner { id, text });
    }
}

#[cfg(test)]
#[path = "session_test.rs"]
mod tests;
