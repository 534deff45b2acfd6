//! WebSocket transport task.
//!
//! One task per connection attempt. It opens the socket, hands the session a
//! [`ChannelSink`] for outbound frames, forwards inbound text, and reports the
//! close code when the connection ends. Reconnect decisions are not made here.
//!
//! ERROR HANDLING
//! ==============
//! A request that cannot be built is a construction failure (no retry). A
//! socket that fails to open or drops without a close frame is reported as
//! an abnormal close so the session's backoff applies, the same way a
//! browser socket reports it.

use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::handshake::client::Request;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::http::header::COOKIE;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::{Message, Utf8Bytes};
use tracing::{debug, warn};

use crate::error::{ConnectionError, ProtocolError};
use crate::protocol::{ABNORMAL_CLOSE, NORMAL_CLOSE};
use crate::session::FrameSink;

/// Close code reported when the peer closed without a status.
pub const NO_STATUS_CLOSE: u16 = 1005;

/// Instruction for the socket writer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SocketCommand {
    Text(String),
    Close(u16),
}

/// Lifecycle report from a socket task, tagged with its connection id.
#[derive(Debug)]
pub enum SocketEvent {
    Opened { conn_id: u64, sink: ChannelSink },
    ConstructFailed { conn_id: u64, error: ConnectionError },
    Text { conn_id: u64, text: String },
    Closed { conn_id: u64, code: u16 },
}

/// [`FrameSink`] backed by the socket task's command channel.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<SocketCommand>,
}

impl ChannelSink {
    #[must_use]
    pub fn new(tx: mpsc::UnboundedSender<SocketCommand>) -> Self {
        Self { tx }
    }
}

impl FrameSink for ChannelSink {
    fn send_text(&mut self, text: String) -> Result<(), ConnectionError> {
        self.tx
            .send(SocketCommand::Text(text))
            .map_err(|_| ConnectionError::Closed)
    }

    fn close(&mut self, code: u16) {
        let _ = self.tx.send(SocketCommand::Close(code));
    }
}

/// Build the handshake request, forwarding the session cookie when present.
///
/// # Errors
///
/// Returns [`ConnectionError::InvalidUrl`] when the URL or cookie cannot form
/// a valid request.
pub fn build_request(url: &str, cookie: Option<&str>) -> Result<Request, ConnectionError> {
    let invalid = |reason: String| ConnectionError::InvalidUrl { url: url.to_owned(), reason };
    let mut request = url.into_client_request().map_err(|e| invalid(e.to_string()))?;
    if let Some(cookie) = cookie {
        let value = HeaderValue::from_str(cookie).map_err(|e| invalid(e.to_string()))?;
        request.headers_mut().insert(COOKIE, value);
    }
    Ok(request)
}

/// Run one connection to completion, reporting through `emit`.
pub async fn run_socket<F>(conn_id: u64, url: String, cookie: Option<String>, emit: F)
where
    F: Fn(SocketEvent),
{
    let request = match build_request(&url, cookie.as_deref()) {
        Ok(request) => request,
        Err(error) => {
            emit(SocketEvent::ConstructFailed { conn_id, error });
            return;
        }
    };

    let stream = match connect_async(request).await {
        Ok((stream, _response)) => stream,
        Err(error) => {
            warn!(conn_id, %url, %error, "socket: connect failed");
            emit(SocketEvent::Closed { conn_id, code: ABNORMAL_CLOSE });
            return;
        }
    };

    let (cmd_tx, mut cmd_rx) = mpsc::unbounded_channel();
    emit(SocketEvent::Opened { conn_id, sink: ChannelSink::new(cmd_tx) });

    let (mut write, mut read) = stream.split();
    let code = loop {
        tokio::select! {
            cmd = cmd_rx.recv() => match cmd {
                Some(SocketCommand::Text(text)) => {
                    if let Err(error) = write.send(Message::text(text)).await {
                        warn!(conn_id, %error, "socket: send failed");
                        break ABNORMAL_CLOSE;
                    }
                }
                Some(SocketCommand::Close(code)) => {
                    let frame = CloseFrame { code: CloseCode::from(code), reason: Utf8Bytes::from_static("client closing") };
                    let _ = write.send(Message::Close(Some(frame))).await;
                    break code;
                }
                None => {
                    let _ = write.send(Message::Close(None)).await;
                    break NORMAL_CLOSE;
                }
            },
            msg = read.next() => match msg {
                Some(Ok(Message::Text(text))) => {
                    emit(SocketEvent::Text { conn_id, text: text.as_str().to_owned() });
                }
                Some(Ok(Message::Binary(bytes))) => {
                    let error = ProtocolError::Binary(bytes.len());
                    warn!(conn_id, %error, "socket: dropping frame");
                }
                Some(Ok(Message::Close(frame))) => {
                    break frame.map_or(NO_STATUS_CLOSE, |f| u16::from(f.code));
                }
                Some(Ok(_)) => {}
                Some(Err(error)) => {
                    warn!(conn_id, %error, "socket: receive failed");
                    break ABNORMAL_CLOSE;
                }
                None => break ABNORMAL_CLOSE,
            },
        }
    };

    debug!(conn_id, code, "socket: closed");
    emit(SocketEvent::Closed { conn_id, code });
}

#[cfg(test)]
#[path = "socket_test.rs"]
mod tests;
