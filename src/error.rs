//! Error taxonomy for the chat client.
//!
//! ERROR HANDLING
//! ==============
//! Every failure class degrades to a visible status line, inline annotation,
//! or banner. Nothing here is fatal to a running client; only `ConfigError`
//! stops the binary, and only at startup.

/// Transport-level open/send failures.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    /// The socket URL or handshake request could not be built.
    #[error("invalid websocket url {url}: {reason}")]
    InvalidUrl { url: String, reason: String },
    /// The socket could not be opened.
    #[error("websocket connect failed: {0}")]
    Connect(String),
    /// A frame was submitted while the connection is not open.
    #[error("not connected")]
    NotConnected,
    /// The socket writer has gone away.
    #[error("websocket closed")]
    Closed,
}

/// Malformed inbound payloads.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// The payload is not JSON or does not match any frame shape.
    #[error("invalid frame: {0}")]
    Json(#[from] serde_json::Error),
    /// A binary frame arrived where only text frames are defined.
    #[error("unexpected binary frame ({0} bytes)")]
    Binary(usize),
}

/// Failures of the companion HTTP save call.
#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    /// Transport or body decoding failure.
    #[error("save request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// The CSRF token or session cookie cannot be sent as a header value.
    #[error("invalid save request header: {0}")]
    InvalidHeader(#[from] reqwest::header::InvalidHeaderValue),
    /// The endpoint answered with a non-success status code.
    #[error("save request failed: {0}")]
    Status(u16),
    /// The endpoint answered `success: false`.
    #[error("{0}")]
    Rejected(String),
}

/// Invalid or missing configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required setting `{0}`")]
    Missing(&'static str),
    #[error("invalid value for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

/// Umbrella error for callers that handle every class uniformly.
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error(transparent)]
    Connection(#[from] ConnectionError),
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
    /// Server-reported error frame.
    #[error("server error: {0}")]
    Application(String),
    #[error(transparent)]
    Persistence(#[from] PersistenceError),
    #[error(transparent)]
    Config(#[from] ConfigError),
}
