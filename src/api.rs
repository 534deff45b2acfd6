//! Companion HTTP call persisting a message to durable storage.
//!
//! ERROR HANDLING
//! ==============
//! A failed save never removes the message: the socket path already rendered
//! it. Callers surface the error as a banner and move on.

use reqwest::header::{CONTENT_TYPE, COOKIE, HeaderMap, HeaderValue};
use serde::Deserialize;

use crate::config::ChatConfig;
use crate::error::PersistenceError;

/// Header carrying the CSRF token on the save call (`X-CSRFToken`).
pub const CSRF_HEADER: &str = "x-csrftoken";

/// Successful save; `timestamp` replaces the provisional "sending…" label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveReceipt {
    pub timestamp: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct SaveResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    timestamp: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Clone)]
pub struct SaveMessageClient {
    http: reqwest::Client,
    url: String,
    headers: HeaderMap,
}

impl SaveMessageClient {
    /// Build a client for the configured club, or `None` when persistence is off.
    ///
    /// # Errors
    ///
    /// Returns [`PersistenceError::InvalidHeader`] when the CSRF token or
    /// session cookie is not a valid header value, or
    /// [`PersistenceError::Http`] if the HTTP client cannot be built.
    pub fn from_config(config: &ChatConfig) -> Result<Option<Self>, PersistenceError> {
        let Some(url) = config.save_message_url() else {
            return Ok(None);
        };

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if let Some(token) = config.csrf_token.as_deref() {
            headers.insert(CSRF_HEADER, HeaderValue::from_str(token)?);
        }
        if let Some(cookie) = config.cookie_header() {
            headers.insert(COOKIE, HeaderValue::from_str(&cookie)?);
        }

        let http = reqwest::Client::builder().build()?;
        Ok(Some(Self { http, url, headers }))
    }

    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// `POST {content}` to the save endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`PersistenceError`] on transport failure, a non-success status,
    /// or a `success: false` body.
    pub async fn save(&self, content: &str) -> Result<SaveReceipt, PersistenceError> {
        let response = self
            .http
            .post(&self.url)
            .headers(self.headers.clone())
            .json(&serde_json::json!({ "content": content }))
            .send()
            .await?;
        let status = response.status();
        let body = response.json::<SaveResponse>().await.ok();
        interpret_save_response(status.is_success(), status.as_u16(), body)
    }
}

fn interpret_save_response(
    status_ok: bool,
    status: u16,
    body: Option<SaveResponse>,
) -> Result<SaveReceipt, PersistenceError> {
    match body {
        Some(body) if status_ok && body.success => Ok(SaveReceipt { timestamp: body.timestamp }),
        Some(SaveResponse { error: Some(error), .. }) => Err(PersistenceError::Rejected(error)),
        _ if status_ok => Err(PersistenceError::Rejected("Unknown error".to_owned())),
        _ => Err(PersistenceError::Status(status)),
    }
}

#[cfg(test)]
#[path = "api_test.rs"]
mod tests;
