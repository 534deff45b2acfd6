//! Real-time chat client for club rooms.
//!
//! SYSTEM CONTEXT
//! ==============
//! The server owns persistence, broadcast, and typing fan-out. This crate
//! holds one socket per room, renders messages optimistically, reconciles
//! them against server echoes by temp id, and reconnects with backoff.
//!
//! `session` is the synchronous core; `client` runs it on tokio with
//! `socket` (WebSocket transport) and `api` (HTTP save call) at the edges.

pub mod api;
pub mod client;
pub mod config;
pub mod connection;
pub mod error;
pub mod message;
pub mod protocol;
pub mod session;
pub mod socket;
pub mod typing;
pub mod view;

pub use client::{ChatClient, ChatHandle};
pub use config::ChatConfig;
pub use error::ChatError;
pub use session::{ChatSession, ClientEvent};
pub use view::ChatView;
