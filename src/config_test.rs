use super::*;
use std::sync::{Mutex, PoisonError};

static ENV_LOCK: Mutex<()> = Mutex::new(());

const VARS: &[&str] = &[
    "CLUBCHAT_BASE_URL",
    "CLUBCHAT_ROOM",
    "CLUBCHAT_USERNAME",
    "CLUBCHAT_CLUB_ID",
    "CLUBCHAT_CSRF_TOKEN",
    "CLUBCHAT_SESSION_COOKIE",
    "CLUBCHAT_RECONNECT_MAX_ATTEMPTS",
    "CLUBCHAT_RECONNECT_BASE_MS",
    "CLUBCHAT_RECONNECT_CAP_MS",
    "CLUBCHAT_TYPING_DEBOUNCE_MS",
];

/// # Safety
/// Callers hold `ENV_LOCK` so no other test mutates the environment concurrently.
unsafe fn clear_env() {
    for var in VARS {
        unsafe { std::env::remove_var(var) };
    }
}

// =============================================================
// ChatConfig::new
// =============================================================

#[test]
fn new_applies_defaults() {
    let cfg = ChatConfig::new("http://localhost:8000/", "club_7", "alice").unwrap();
    assert_eq!(cfg.base_url, "http://localhost:8000");
    assert_eq!(cfg.reconnect, ReconnectPolicy::default());
    assert_eq!(cfg.typing_debounce, DEFAULT_TYPING_DEBOUNCE);
    assert!(cfg.club_id.is_none());
}

#[test]
fn ws_url_uses_ws_for_plain_http() {
    let cfg = ChatConfig::new("http://localhost:8000", "club_7", "alice").unwrap();
    assert!(!cfg.is_secure());
    assert_eq!(cfg.ws_url(), "ws://localhost:8000/ws/chat/club_7/");
}

#[test]
fn ws_url_uses_wss_for_https() {
    let cfg = ChatConfig::new("https://clubs.example.edu", "room-1", "alice").unwrap();
    assert!(cfg.is_secure());
    assert_eq!(cfg.ws_url(), "wss://clubs.example.edu/ws/chat/room-1/");
}

#[test]
fn new_rejects_invalid_room_names() {
    for room in ["", "has space", "slash/room", "émoji"] {
        let err = ChatConfig::new("http://localhost", room, "alice").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "room", .. }), "room {room:?}");
    }
}

#[test]
fn new_rejects_non_http_base_and_blank_username() {
    assert!(matches!(
        ChatConfig::new("ftp://host", "r", "alice"),
        Err(ConfigError::Invalid { key: "base_url", .. })
    ));
    assert!(matches!(
        ChatConfig::new("http://host", "r", "  "),
        Err(ConfigError::Invalid { key: "username", .. })
    ));
}

#[test]
fn save_message_url_requires_club_id() {
    let mut cfg = ChatConfig::new("http://localhost:8000", "r", "alice").unwrap();
    assert!(cfg.save_message_url().is_none());
    cfg.club_id = Some(12);
    assert_eq!(cfg.save_message_url().as_deref(), Some("http://localhost:8000/club/12/save_message/"));
}

#[test]
fn cookie_header_combines_session_and_csrf() {
    let mut cfg = ChatConfig::new("http://localhost", "r", "alice").unwrap();
    assert!(cfg.cookie_header().is_none());
    cfg.session_cookie = Some("abc".into());
    cfg.csrf_token = Some("tok".into());
    assert_eq!(cfg.cookie_header().as_deref(), Some("sessionid=abc; csrftoken=tok"));
}

// =============================================================
// ChatConfig::from_env
// =============================================================

#[test]
fn from_env_requires_room_and_username() {
    let _guard = ENV_LOCK.lock().unwrap_or_else(PoisonError::into_inner);
    unsafe { clear_env() };

    assert!(matches!(ChatConfig::from_env(), Err(ConfigError::Missing("CLUBCHAT_ROOM"))));
    unsafe { std::env::set_var("CLUBCHAT_ROOM", "general") };
    assert!(matches!(ChatConfig::from_env(), Err(ConfigError::Missing("CLUBCHAT_USERNAME"))));

    unsafe { clear_env() };
}

#[test]
fn from_env_parses_overrides() {
    let _guard = ENV_LOCK.lock().unwrap_or_else(PoisonError::into_inner);
    unsafe {
        clear_env();
        std::env::set_var("CLUBCHAT_BASE_URL", "https://clubs.example.edu/");
        std::env::set_var("CLUBCHAT_ROOM", "chess");
        std::env::set_var("CLUBCHAT_USERNAME", "alice");
        std::env::set_var("CLUBCHAT_CLUB_ID", "3");
        std::env::set_var("CLUBCHAT_CSRF_TOKEN", "tok");
        std::env::set_var("CLUBCHAT_RECONNECT_MAX_ATTEMPTS", "2");
        std::env::set_var("CLUBCHAT_RECONNECT_BASE_MS", "50");
        std::env::set_var("CLUBCHAT_RECONNECT_CAP_MS", "75");
        std::env::set_var("CLUBCHAT_TYPING_DEBOUNCE_MS", "1500");
    }

    let cfg = ChatConfig::from_env().unwrap();
    assert_eq!(cfg.ws_url(), "wss://clubs.example.edu/ws/chat/chess/");
    assert_eq!(cfg.club_id, Some(3));
    assert_eq!(cfg.csrf_token.as_deref(), Some("tok"));
    assert_eq!(
        cfg.reconnect,
        ReconnectPolicy { max_attempts: 2, base: Duration::from_millis(50), cap: Duration::from_millis(75) }
    );
    assert_eq!(cfg.typing_debounce, Duration::from_millis(1500));

    unsafe { clear_env() };
}

#[test]
fn from_env_rejects_non_numeric_club_id() {
    let _guard = ENV_LOCK.lock().unwrap_or_else(PoisonError::into_inner);
    unsafe {
        clear_env();
        std::env::set_var("CLUBCHAT_ROOM", "chess");
        std::env::set_var("CLUBCHAT_USERNAME", "alice");
        std::env::set_var("CLUBCHAT_CLUB_ID", "chess-club");
    }

    assert!(matches!(ChatConfig::from_env(), Err(ConfigError::Invalid { key: "CLUBCHAT_CLUB_ID", .. })));

    unsafe { clear_env() };
}

#[test]
fn from_env_rejects_unparseable_timings() {
    let _guard = ENV_LOCK.lock().unwrap_or_else(PoisonError::into_inner);
    unsafe {
        clear_env();
        std::env::set_var("CLUBCHAT_ROOM", "chess");
        std::env::set_var("CLUBCHAT_USERNAME", "alice");
        std::env::set_var("CLUBCHAT_RECONNECT_BASE_MS", "soon");
    }

    assert!(matches!(
        ChatConfig::from_env(),
        Err(ConfigError::Invalid { key: "CLUBCHAT_RECONNECT_BASE_MS", .. })
    ));

    unsafe { clear_env() };
}

// =============================================================
// ChatConfig::from_lookup
// =============================================================

fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map: std::collections::HashMap<String, String> =
        pairs.iter().map(|(k, v)| ((*k).to_owned(), (*v).to_owned())).collect();
    move |key: &str| map.get(key).cloned()
}

#[test]
fn from_lookup_applies_defaults_for_absent_keys() {
    let cfg = ChatConfig::from_lookup(lookup_from(&[("CLUBCHAT_ROOM", "chess"), ("CLUBCHAT_USERNAME", "alice")])).unwrap();
    assert_eq!(cfg.base_url, DEFAULT_BASE_URL);
    assert_eq!(cfg.reconnect, ReconnectPolicy::default());
    assert_eq!(cfg.typing_debounce, DEFAULT_TYPING_DEBOUNCE);
    assert!(cfg.club_id.is_none());
}

#[test]
fn from_lookup_rejects_bad_attempt_ceiling() {
    let err = ChatConfig::from_lookup(lookup_from(&[
        ("CLUBCHAT_ROOM", "chess"),
        ("CLUBCHAT_USERNAME", "alice"),
        ("CLUBCHAT_RECONNECT_MAX_ATTEMPTS", "-1"),
    ]))
    .unwrap_err();
    assert!(matches!(err, ConfigError::Invalid { key: "CLUBCHAT_RECONNECT_MAX_ATTEMPTS", .. }));
}
