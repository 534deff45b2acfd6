//! Async runtime driving one [`ChatSession`].
//!
//! DESIGN
//! ======
//! A single task owns the session. Socket tasks, timers, and HTTP saves run
//! on their own and report back through one unbounded channel, so every state
//! change happens sequentially on the owner task with no locks.
//!
//! Front ends talk to the runtime through [`ChatHandle`]: commands go in over
//! the same channel, the rendered view comes out on a `watch` channel, and
//! individual changes are published on a `broadcast` channel.

use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::api::{SaveMessageClient, SaveReceipt};
use crate::config::ChatConfig;
use crate::error::{ChatError, PersistenceError};
use crate::message::TempId;
use crate::session::{ChatSession, ClientEvent, Effect};
use crate::socket::{SocketEvent, run_socket};
use crate::view::ChatView;

const EVENT_CHANNEL_CAPACITY: usize = 256;

#[derive(Debug)]
enum Input {
    Socket(SocketEvent),
    SetInput(String),
    Submit,
    DismissBanner(u64),
    ReconnectDue,
    TypingDue(u64),
    Saved { temp_id: TempId, result: Result<SaveReceipt, PersistenceError> },
    Stop,
}

/// Chat client for one room. Call [`ChatClient::start`] to connect.
#[derive(Debug, Clone)]
pub struct ChatClient {
    config: ChatConfig,
}

impl ChatClient {
    #[must_use]
    pub fn new(config: ChatConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub fn config(&self) -> &ChatConfig {
        &self.config
    }

    /// Spawn the runtime task and begin connecting.
    ///
    /// Must be called inside a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::Persistence`] if the HTTP client for the save
    /// endpoint cannot be built.
    pub fn start(self) -> Result<ChatHandle, ChatError> {
        let saver = SaveMessageClient::from_config(&self.config)?;
        let session = ChatSession::new(&self.config, saver.is_some());
        let (tx, rx) = mpsc::unbounded_channel();
        let (view_tx, view_rx) = watch::channel(session.view().clone());
        let (events_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        let runtime = Runtime {
            session,
            saver,
            cookie: self.config.cookie_header(),
            tx: tx.clone(),
            view_tx,
            events_tx: events_tx.clone(),
        };
        info!(room = %self.config.room, url = %self.config.ws_url(), "chat: starting");
        let task = tokio::spawn(runtime.run(rx));

        Ok(ChatHandle { tx, view: view_rx, events: events_tx, task: Some(task) })
    }
}

/// Control surface of a running client.
///
/// Dropping the handle stops the client the same way [`ChatHandle::stop`]
/// does, without waiting for the runtime to exit.
#[derive(Debug)]
pub struct ChatHandle {
    tx: mpsc::UnboundedSender<Input>,
    view: watch::Receiver<ChatView>,
    events: broadcast::Sender<ClientEvent>,
    task: Option<JoinHandle<()>>,
}

impl ChatHandle {
    /// Replace the compose text (one keystroke).
    ///
    /// Returns `false` if the client has stopped.
    pub fn set_input(&self, text: &str) -> bool {
        self.tx.send(Input::SetInput(text.to_owned())).is_ok()
    }

    /// Submit the compose text.
    pub fn submit(&self) -> bool {
        self.tx.send(Input::Submit).is_ok()
    }

    pub fn dismiss_banner(&self, id: u64) -> bool {
        self.tx.send(Input::DismissBanner(id)).is_ok()
    }

    /// Snapshot of the current view.
    #[must_use]
    pub fn view(&self) -> ChatView {
        self.view.borrow().clone()
    }

    /// Receiver that observes every published view.
    #[must_use]
    pub fn watch(&self) -> watch::Receiver<ChatView> {
        self.view.clone()
    }

    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<ClientEvent> {
        self.events.subscribe()
    }

    /// Close with code 1000 and wait for the runtime to exit.
    pub async fn stop(mut self) {
        let _ = self.tx.send(Input::Stop);
        if let Some(task) = self.task.take()
            && let Err(error) = task.await
        {
            debug!(%error, "chat: runtime task ended abnormally");
        }
    }
}

impl Drop for ChatHandle {
    fn drop(&mut self) {
        if self.task.is_some() {
            let _ = self.tx.send(Input::Stop);
        }
    }
}

struct Runtime {
    session: ChatSession,
    saver: Option<SaveMessageClient>,
    cookie: Option<String>,
    tx: mpsc::UnboundedSender<Input>,
    view_tx: watch::Sender<ChatView>,
    events_tx: broadcast::Sender<ClientEvent>,
}

impl Runtime {
    async fn run(mut self, mut rx: mpsc::UnboundedReceiver<Input>) {
        let effects = self.session.start();
        self.execute(effects);
        self.publish();

        while let Some(input) = rx.recv().await {
            let effects = self.handle(input);
            self.execute(effects);
            self.publish();
            if self.session.is_stopped() {
                break;
            }
        }
    }

    fn handle(&mut self, input: Input) -> Vec<Effect> {
        match input {
            Input::Socket(SocketEvent::Opened { conn_id, sink }) => {
                self.session.on_open(conn_id, Box::new(sink));
                Vec::new()
            }
            Input::Socket(SocketEvent::ConstructFailed { conn_id, error }) => {
                self.session.on_construct_failed(conn_id, &error);
                Vec::new()
            }
            Input::Socket(SocketEvent::Text { conn_id, text }) => {
                if conn_id == self.session.conn_id() {
                    self.session.on_text(&text);
                }
                Vec::new()
            }
            Input::Socket(SocketEvent::Closed { conn_id, code }) => self.session.on_close(conn_id, code),
            Input::SetInput(text) => self.session.set_input(&text),
            Input::Submit => self.session.submit(),
            Input::DismissBanner(id) => {
                self.session.dismiss_banner(id);
                Vec::new()
            }
            Input::ReconnectDue => self.session.on_reconnect_due(),
            Input::TypingDue(generation) => {
                self.session.on_typing_due(generation);
                Vec::new()
            }
            Input::Saved { temp_id, result } => {
                self.session.on_saved(&temp_id, result);
                Vec::new()
            }
            Input::Stop => {
                self.session.stop();
                Vec::new()
            }
        }
    }

    fn execute(&self, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::Connect { conn_id, url } => {
                    let tx = self.tx.clone();
                    let emit = move |event| {
                        let _ = tx.send(Input::Socket(event));
                    };
                    tokio::spawn(run_socket(conn_id, url, self.cookie.clone(), emit));
                }
                Effect::ScheduleReconnect { delay, .. } => {
                    let tx = self.tx.clone();
                    tokio::spawn(async move {
                        tokio::time::sleep(delay).await;
                        let _ = tx.send(Input::ReconnectDue);
                    });
                }
                Effect::ScheduleTypingStop { generation, delay } => {
                    let tx = self.tx.clone();
                    tokio::spawn(async move {
                        tokio::time::sleep(delay).await;
                        let _ = tx.send(Input::TypingDue(generation));
                    });
                }
                Effect::SaveMessage { temp_id, content } => {
                    let Some(saver) = self.saver.clone() else {
                        continue;
                    };
                    let tx = self.tx.clone();
                    tokio::spawn(async move {
                        let result = saver.save(&content).await;
                        let _ = tx.send(Input::Saved { temp_id, result });
                    });
                }
            }
        }
    }

    /// Publish the view before the events so subscribers reading the view on
    /// an event never see an older snapshot.
    fn publish(&mut self) {
        let current = self.session.view();
        self.view_tx.send_if_modified(|view| {
            if view == current {
                false
            } else {
                view.clone_from(current);
                true
            }
        });
        for event in self.session.take_events() {
            let _ = self.events_tx.send(event);
        }
    }
}

#[cfg(test)]
#[path = "client_test.rs"]
mod tests;
