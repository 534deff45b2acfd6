//! Renderable projection of one chat room.
//!
//! SYSTEM CONTEXT
//! ==============
//! `ChatView` stands in for the host page's anchors: status line, message
//! list, typing line, compose input, inline error, and dismissible banners.
//! Front ends draw it; they never mutate it directly.

use crate::connection::ConnectionState;
use crate::message::{ChatLog, ChatMessage, DeliveryState};

/// Dismissible notice shown above the message list.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Banner {
    pub id: u64,
    pub text: String,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ChatView {
    pub status: ConnectionState,
    pub messages: ChatLog,
    pub typing_line: Option<String>,
    /// Error shown next to the compose field.
    pub inline_error: Option<String>,
    pub banners: Vec<Banner>,
    /// Current compose field text.
    pub input: String,
    next_banner_id: u64,
}

impl ChatView {
    #[must_use]
    pub fn status_text(&self) -> &'static str {
        self.status.status_text()
    }

    /// The send control is enabled only while connected.
    #[must_use]
    pub fn send_enabled(&self) -> bool {
        self.status == ConnectionState::Connected
    }

    pub fn push_banner(&mut self, text: impl Into<String>) -> u64 {
        self.next_banner_id += 1;
        let id = self.next_banner_id;
        self.banners.push(Banner { id, text: text.into() });
        id
    }

    pub fn dismiss_banner(&mut self, id: u64) -> bool {
        let before = self.banners.len();
        self.banners.retain(|b| b.id != id);
        self.banners.len() != before
    }
}

/// One-line text rendering, e.g. `You: hi  [sending…]`.
#[must_use]
pub fn render_line(message: &ChatMessage) -> String {
    format!("{}: {}  [{}]", message.sender_name, message.content, message.time_label())
}

/// HTML fragment for one entry. Content and names are escaped.
#[must_use]
pub fn render_html(message: &ChatMessage) -> String {
    let align = if message.is_own { "text-end" } else { "text-start" };
    let bubble = if message.is_own { "bg-primary text-white" } else { "bg-light text-dark" };
    let state = match message.delivery {
        DeliveryState::Pending => "pending",
        DeliveryState::Confirmed => "confirmed",
        DeliveryState::Failed => "failed",
    };
    format!(
        r#"<div class="chat-message {align} mb-3" data-state="{state}"><div class="{bubble} p-3 rounded-3 shadow-sm"><p class="mb-1"><strong>{}:</strong> {}</p><small>{}</small></div></div>"#,
        escape_html(&message.sender_name),
        escape_html(&message.content),
        escape_html(&message.time_label()),
    )
}

#[must_use]
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
#[path = "view_test.rs"]
mod tests;
