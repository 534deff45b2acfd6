//! Client configuration.
//!
//! `CLUBCHAT_*` keys are the single source of configuration. The binary's
//! command-line flags only override individual keys before parsing, so both
//! paths share the defaults and validation in [`ChatConfig::from_lookup`].

use std::time::Duration;

use crate::connection::{
    DEFAULT_MAX_RECONNECT_ATTEMPTS, DEFAULT_RECONNECT_BASE, DEFAULT_RECONNECT_CAP, ReconnectPolicy,
};
use crate::error::ConfigError;
use crate::typing::DEFAULT_TYPING_DEBOUNCE;

pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8000";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatConfig {
    /// `http://` or `https://` origin of the site, without a trailing slash.
    pub base_url: String,
    pub room: String,
    /// Session username; inbound messages from it render as own.
    pub username: String,
    /// Club whose save endpoint persists messages. `None` disables the HTTP save.
    pub club_id: Option<u64>,
    pub csrf_token: Option<String>,
    /// Raw `sessionid` cookie value forwarded with socket and HTTP requests.
    pub session_cookie: Option<String>,
    pub reconnect: ReconnectPolicy,
    pub typing_debounce: Duration,
}

impl ChatConfig {
    /// Build a config with default timings.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] for a base URL that is not http(s), a
    /// room name outside `[A-Za-z0-9_-]`, or an empty username.
    pub fn new(base_url: &str, room: &str, username: &str) -> Result<Self, ConfigError> {
        let base_url = base_url.trim().trim_end_matches('/');
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(ConfigError::Invalid {
                key: "base_url",
                reason: format!("expected http:// or https:// url, got '{base_url}'"),
            });
        }
        validate_room(room)?;
        if username.trim().is_empty() {
            return Err(ConfigError::Invalid { key: "username", reason: "must not be empty".into() });
        }

        Ok(Self {
            base_url: base_url.to_owned(),
            room: room.to_owned(),
            username: username.trim().to_owned(),
            club_id: None,
            csrf_token: None,
            session_cookie: None,
            reconnect: ReconnectPolicy::default(),
            typing_debounce: DEFAULT_TYPING_DEBOUNCE,
        })
    }

    /// Build typed config from environment variables.
    ///
    /// # Errors
    ///
    /// Same as [`Self::from_lookup`].
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build typed config from `CLUBCHAT_*` keys resolved through `lookup`.
    ///
    /// Required:
    /// - `CLUBCHAT_ROOM`
    /// - `CLUBCHAT_USERNAME`
    ///
    /// Optional:
    /// - `CLUBCHAT_BASE_URL`: default `http://127.0.0.1:8000`
    /// - `CLUBCHAT_CLUB_ID`: enables the HTTP save call
    /// - `CLUBCHAT_CSRF_TOKEN`, `CLUBCHAT_SESSION_COOKIE`
    /// - `CLUBCHAT_RECONNECT_MAX_ATTEMPTS`: default 5
    /// - `CLUBCHAT_RECONNECT_BASE_MS`: default 2000
    /// - `CLUBCHAT_RECONNECT_CAP_MS`: default 30000
    /// - `CLUBCHAT_TYPING_DEBOUNCE_MS`: default 1000
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Missing`] when a required key is absent and
    /// [`ConfigError::Invalid`] when a value does not parse or fails validation.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let base_url = lookup("CLUBCHAT_BASE_URL").unwrap_or_else(|| DEFAULT_BASE_URL.to_owned());
        let room = lookup("CLUBCHAT_ROOM").ok_or(ConfigError::Missing("CLUBCHAT_ROOM"))?;
        let username = lookup("CLUBCHAT_USERNAME").ok_or(ConfigError::Missing("CLUBCHAT_USERNAME"))?;

        let mut cfg = Self::new(&base_url, &room, &username)?;
        cfg.club_id = parse_key(&lookup, "CLUBCHAT_CLUB_ID")?;
        cfg.csrf_token = lookup("CLUBCHAT_CSRF_TOKEN");
        cfg.session_cookie = lookup("CLUBCHAT_SESSION_COOKIE");
        cfg.reconnect = ReconnectPolicy {
            max_attempts: parse_key(&lookup, "CLUBCHAT_RECONNECT_MAX_ATTEMPTS")?
                .unwrap_or(DEFAULT_MAX_RECONNECT_ATTEMPTS),
            base: parse_millis(&lookup, "CLUBCHAT_RECONNECT_BASE_MS")?.unwrap_or(DEFAULT_RECONNECT_BASE),
            cap: parse_millis(&lookup, "CLUBCHAT_RECONNECT_CAP_MS")?.unwrap_or(DEFAULT_RECONNECT_CAP),
        };
        cfg.typing_debounce = parse_millis(&lookup, "CLUBCHAT_TYPING_DEBOUNCE_MS")?.unwrap_or(DEFAULT_TYPING_DEBOUNCE);
        Ok(cfg)
    }

    /// Whether the page origin is served over a secure transport.
    #[must_use]
    pub fn is_secure(&self) -> bool {
        self.base_url.starts_with("https://")
    }

    /// `ws://` or `wss://` endpoint of this room's socket.
    #[must_use]
    pub fn ws_url(&self) -> String {
        let (scheme, host) = match self.base_url.strip_prefix("https://") {
            Some(host) => ("wss", host),
            None => ("ws", self.base_url.trim_start_matches("http://")),
        };
        format!("{scheme}://{host}/ws/chat/{}/", self.room)
    }

    /// HTTP endpoint persisting messages, when a club is configured.
    #[must_use]
    pub fn save_message_url(&self) -> Option<String> {
        self.club_id
            .map(|club_id| format!("{}/club/{club_id}/save_message/", self.base_url))
    }

    /// `Cookie` header value carrying the session and CSRF cookies.
    #[must_use]
    pub fn cookie_header(&self) -> Option<String> {
        let parts: Vec<String> = [
            self.session_cookie.as_ref().map(|v| format!("sessionid={v}")),
            self.csrf_token.as_ref().map(|v| format!("csrftoken={v}")),
        ]
        .into_iter()
        .flatten()
        .collect();
        (!parts.is_empty()).then(|| parts.join("; "))
    }
}

fn validate_room(room: &str) -> Result<(), ConfigError> {
    let valid = !room.is_empty()
        && room
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if valid {
        Ok(())
    } else {
        Err(ConfigError::Invalid {
            key: "room",
            reason: format!("'{room}' must match [A-Za-z0-9_-]+"),
        })
    }
}

fn parse_key<T>(lookup: impl Fn(&str) -> Option<String>, key: &'static str) -> Result<Option<T>, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    lookup(key)
        .map(|raw| {
            raw.trim()
                .parse::<T>()
                .map_err(|e| ConfigError::Invalid { key, reason: format!("'{raw}': {e}") })
        })
        .transpose()
}

fn parse_millis(lookup: impl Fn(&str) -> Option<String>, key: &'static str) -> Result<Option<Duration>, ConfigError> {
    Ok(parse_key::<u64>(lookup, key)?.map(Duration::from_millis))
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
