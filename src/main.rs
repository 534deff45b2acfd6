use std::collections::HashMap;

use clap::Parser;
use clubchat::view::render_line;
use clubchat::{ChatClient, ChatConfig, ChatError, ChatHandle, ChatView, ClientEvent};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::{broadcast, watch};
use tracing_subscriber::EnvFilter;

/// Flags override the matching `CLUBCHAT_*` environment variable.
#[derive(Parser, Debug)]
#[command(name = "clubchat", about = "Terminal client for club chat rooms")]
struct Cli {
    /// Site origin, e.g. `https://clubs.example.edu` [CLUBCHAT_BASE_URL]
    #[arg(long)]
    base_url: Option<String>,

    /// [CLUBCHAT_ROOM]
    #[arg(long)]
    room: Option<String>,

    /// [CLUBCHAT_USERNAME]
    #[arg(long)]
    username: Option<String>,

    /// Enables persisting each message through the club's save endpoint [CLUBCHAT_CLUB_ID]
    #[arg(long)]
    club_id: Option<String>,

    /// [CLUBCHAT_CSRF_TOKEN]
    #[arg(long)]
    csrf_token: Option<String>,

    /// [CLUBCHAT_SESSION_COOKIE]
    #[arg(long)]
    session_cookie: Option<String>,

    /// [CLUBCHAT_RECONNECT_MAX_ATTEMPTS]
    #[arg(long)]
    reconnect_max_attempts: Option<String>,

    /// [CLUBCHAT_RECONNECT_BASE_MS]
    #[arg(long)]
    reconnect_base_ms: Option<String>,

    /// [CLUBCHAT_RECONNECT_CAP_MS]
    #[arg(long)]
    reconnect_cap_ms: Option<String>,

    /// [CLUBCHAT_TYPING_DEBOUNCE_MS]
    #[arg(long)]
    typing_debounce_ms: Option<String>,
}

impl Cli {
    fn into_config(self) -> Result<ChatConfig, ChatError> {
        let overrides: HashMap<&'static str, String> = [
            ("CLUBCHAT_BASE_URL", self.base_url),
            ("CLUBCHAT_ROOM", self.room),
            ("CLUBCHAT_USERNAME", self.username),
            ("CLUBCHAT_CLUB_ID", self.club_id),
            ("CLUBCHAT_CSRF_TOKEN", self.csrf_token),
            ("CLUBCHAT_SESSION_COOKIE", self.session_cookie),
            ("CLUBCHAT_RECONNECT_MAX_ATTEMPTS", self.reconnect_max_attempts),
            ("CLUBCHAT_RECONNECT_BASE_MS", self.reconnect_base_ms),
            ("CLUBCHAT_RECONNECT_CAP_MS", self.reconnect_cap_ms),
            ("CLUBCHAT_TYPING_DEBOUNCE_MS", self.typing_debounce_ms),
        ]
        .into_iter()
        .filter_map(|(key, value)| value.map(|v| (key, v)))
        .collect();

        let config = ChatConfig::from_lookup(|key| {
            overrides
                .get(key)
                .cloned()
                .or_else(|| std::env::var(key).ok())
        })?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<(), ChatError> {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("clubchat=info")))
        .with_writer(std::io::stderr)
        .init();

    let config = Cli::parse().into_config()?;
    let handle = ChatClient::new(config).start()?;
    let printer = tokio::spawn(print_events(handle.subscribe(), handle.watch()));

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => match line {
                Ok(Some(line)) => {
                    if !handle_line(&handle, &line) {
                        break;
                    }
                }
                Ok(None) => break,
                Err(error) => {
                    tracing::warn!(%error, "stdin read failed");
                    break;
                }
            },
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    handle.stop().await;
    printer.abort();
    Ok(())
}

/// Returns `false` when the user asked to quit.
fn handle_line(handle: &ChatHandle, line: &str) -> bool {
    if line.trim() == "/quit" {
        return false;
    }
    if let Some(rest) = line.trim().strip_prefix("/dismiss") {
        match rest.trim().parse::<u64>() {
            Ok(id) => {
                handle.dismiss_banner(id);
            }
            Err(_) => eprintln!("usage: /dismiss <banner id>"),
        }
        return true;
    }
    handle.set_input(line);
    handle.submit()
}

async fn print_events(mut events: broadcast::Receiver<ClientEvent>, view: watch::Receiver<ChatView>) {
    loop {
        let event = match events.recv().await {
            Ok(event) => event,
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::debug!(skipped, "event printer lagged");
                continue;
            }
            Err(broadcast::error::RecvError::Closed) => return,
        };
        let snapshot = view.borrow().clone();
        match event {
            ClientEvent::ConnectionChanged(_) => println!("-- {}", snapshot.status_text()),
            ClientEvent::MessageAdded { index } => {
                if let Some(message) = snapshot.messages.get(index) {
                    println!("{}", render_line(message));
                }
            }
            ClientEvent::MessageUpdated { index } => {
                if let Some(message) = snapshot.messages.get(index) {
                    println!("   ~ {}", render_line(message));
                }
            }
            ClientEvent::TypingChanged(Some(line)) => println!("   {line}"),
            ClientEvent::TypingChanged(None) => {}
            ClientEvent::InlineError(text) => println!("!! {text}"),
            ClientEvent::Banner { id, text } => println!("[{id}] {text}  (/dismiss {id})"),
        }
    }
}
