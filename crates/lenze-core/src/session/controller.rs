//! Session stream controller
//!
//! A cheap, cloneable handle over an event loop that owns all session state.
//! Commands from handles and events from connection tasks are processed one
//! at a time, in order, on that loop; subscriber callbacks run there too.
//!
//! ```rust,no_run
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! use lenze_core::{ClientConfig, SessionId, SessionStreamController};
//!
//! let controller = SessionStreamController::from_config(&ClientConfig::default())?;
//! let _subscription = controller.subscribe(|snapshot| {
//!     println!("{}: {}", snapshot.phase, snapshot.answer_text);
//! })?;
//! controller.start_search(SessionId::new("42"), "what is rust")?;
//! # controller.dispose().await;
//! # Ok(())
//! # }
//! ```

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info};

use super::connection::{run_connection, ConnectionEvent, Tagged};
use super::state::{ControllerState, SearchSnapshot};
use crate::api::SearchApiClient;
use crate::config::ClientConfig;
use crate::error::{ConfigError, ControllerError};
use crate::history::ConversationHistoryLoader;
use crate::stream::transport::{HttpStreamTransport, StreamTransport};
use crate::types::SessionId;

/// Callback invoked with every new snapshot
pub type SnapshotCallback = Box<dyn Fn(&SearchSnapshot) + Send + 'static>;

enum Command {
    StartSearch {
        session_id: SessionId,
        query: String,
    },
    Cancel,
    Subscribe {
        id: u64,
        active: Arc<AtomicBool>,
        callback: SnapshotCallback,
    },
    Unsubscribe {
        id: u64,
    },
    Snapshot {
        reply: oneshot::Sender<SearchSnapshot>,
    },
    Dispose {
        done: oneshot::Sender<()>,
    },
}

/// Handle to a session's streaming controller
///
/// Dropping every handle disposes the controller.
#[derive(Clone)]
pub struct SessionStreamController {
    commands: mpsc::UnboundedSender<Command>,
    next_subscription: Arc<AtomicU64>,
}

impl SessionStreamController {
    /// Spawn a controller on the current tokio runtime
    pub fn new(transport: Arc<dyn StreamTransport>, history: ConversationHistoryLoader) -> Self {
        let (commands, command_rx) = mpsc::unbounded_channel();
        let (events, event_rx) = mpsc::unbounded_channel();
        let event_loop = EventLoop {
            state: ControllerState::new(),
            subscribers: Vec::new(),
            transport,
            history,
            events,
        };
        tokio::spawn(event_loop.run(command_rx, event_rx));

        Self {
            commands,
            next_subscription: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Controller talking SSE over HTTP to the configured server
    pub fn from_config(config: &ClientConfig) -> Result<Self, ConfigError> {
        let client = SearchApiClient::new(config.endpoints()?);
        Ok(Self::with_client(client))
    }

    pub fn with_client(client: SearchApiClient) -> Self {
        let history = ConversationHistoryLoader::new(Arc::new(client.clone()));
        Self::new(Arc::new(HttpStreamTransport::new(client)), history)
    }

    /// Start a search, cancelling any search still in flight
    ///
    /// The previous connection is cancelled before the new one is opened; its
    /// events are discarded even if they are already queued.
    pub fn start_search(
        &self,
        session_id: SessionId,
        query: impl Into<String>,
    ) -> Result<(), ControllerError> {
        self.send(Command::StartSearch {
            session_id,
            query: query.into(),
        })
    }

    /// Cancel the search in flight, if any
    pub fn cancel(&self) {
        // Nothing to cancel once disposed
        let _ = self.send(Command::Cancel);
    }

    /// Register a callback for snapshots
    ///
    /// The callback first receives the current snapshot, then one after every
    /// change. It runs on the controller's event loop and must not block.
    pub fn subscribe<F>(&self, callback: F) -> Result<Subscription, ControllerError>
    where
        F: Fn(&SearchSnapshot) + Send + 'static,
    {
        let id = self.next_subscription.fetch_add(1, Ordering::Relaxed);
        let active = Arc::new(AtomicBool::new(true));
        self.send(Command::Subscribe {
            id,
            active: Arc::clone(&active),
            callback: Box::new(callback),
        })?;
        Ok(Subscription {
            id,
            active,
            commands: self.commands.downgrade(),
        })
    }

    /// Current snapshot
    pub async fn snapshot(&self) -> Result<SearchSnapshot, ControllerError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Snapshot { reply })?;
        rx.await.map_err(|_| ControllerError::Disposed)
    }

    /// Cancel any live connection and stop the controller
    ///
    /// Resolves once the event loop has exited; no callback fires afterwards.
    pub async fn dispose(&self) {
        let (done, rx) = oneshot::channel();
        if self.send(Command::Dispose { done }).is_ok() {
            let _ = rx.await;
        }
    }

    fn send(&self, command: Command) -> Result<(), ControllerError> {
        self.commands
            .send(command)
            .map_err(|_| ControllerError::Disposed)
    }
}

/// Registration returned by [`SessionStreamController::subscribe`]
///
/// Unsubscribes when dropped. Does not keep the controller alive.
pub struct Subscription {
    id: u64,
    active: Arc<AtomicBool>,
    commands: mpsc::WeakUnboundedSender<Command>,
}

impl Subscription {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Stop receiving snapshots; the search itself is unaffected
    pub fn unsubscribe(self) {
        drop(self);
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.active.store(false, Ordering::SeqCst);
        if let Some(commands) = self.commands.upgrade() {
            let _ = commands.send(Command::Unsubscribe { id: self.id });
        }
    }
}

struct Subscriber {
    id: u64,
    active: Arc<AtomicBool>,
    callback: SnapshotCallback,
}

struct EventLoop {
    state: ControllerState,
    subscribers: Vec<Subscriber>,
    transport: Arc<dyn StreamTransport>,
    history: ConversationHistoryLoader,
    /// Cloned into every connection and history task
    events: mpsc::UnboundedSender<Tagged>,
}

impl EventLoop {
    async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<Command>,
        mut events: mpsc::UnboundedReceiver<Tagged>,
    ) {
        debug!("Session controller started");
        loop {
            // Commands first: a queued cancel or restart beats queued frames
            tokio::select! {
                biased;
                command = commands.recv() => match command {
                    Some(Command::Dispose { done }) => {
                        self.shutdown();
                        commands.close();
                        let _ = done.send(());
                        return;
                    }
                    Some(command) => self.handle_command(command),
                    None => {
                        self.shutdown();
                        return;
                    }
                },
                Some(tagged) = events.recv() => {
                    if self.state.apply(tagged) {
                        self.emit();
                    }
                }
            }
        }
    }

    fn handle_command(&mut self, command: Command) {
        match command {
            Command::StartSearch { session_id, query } => self.start_search(session_id, query),
            Command::Cancel => {
                if self.state.cancel_active() {
                    self.emit();
                }
            }
            Command::Subscribe {
                id,
                active,
                callback,
            } => {
                let subscriber = Subscriber {
                    id,
                    active,
                    callback,
                };
                if subscriber.active.load(Ordering::SeqCst) {
                    (subscriber.callback)(&self.state.snapshot());
                }
                self.subscribers.push(subscriber);
            }
            Command::Unsubscribe { id } => self.subscribers.retain(|s| s.id != id),
            Command::Snapshot { reply } => {
                let _ = reply.send(self.state.snapshot());
            }
            // Handled by the loop itself
            Command::Dispose { .. } => {}
        }
    }

    fn start_search(&mut self, session_id: SessionId, query: String) {
        // Subscribers see the superseded search close before the new one starts
        if self.state.has_active_connection() {
            self.state.cancel_active();
            self.emit();
        }
        let cancellation = self.state.begin_search(session_id.clone(), query.clone());
        let connection_id = cancellation.connection_id();
        self.emit();

        let history = self.history.clone();
        let events = self.events.clone();
        let history_session = session_id.clone();
        tokio::spawn(async move {
            let load = history.load(&history_session).await;
            let _ = events.send(Tagged {
                connection_id,
                event: ConnectionEvent::History(load),
            });
        });

        tokio::spawn(run_connection(
            Arc::clone(&self.transport),
            session_id,
            query,
            cancellation,
            self.events.clone(),
        ));
    }

    fn emit(&self) {
        let snapshot = self.state.snapshot();
        for subscriber in &self.subscribers {
            if subscriber.active.load(Ordering::SeqCst) {
                (subscriber.callback)(&snapshot);
            }
        }
    }

    fn shutdown(&mut self) {
        if self.state.cancel_active() {
            info!("Cancelled live connection on dispose");
        }
        self.subscribers.clear();
        debug!("Session controller stopped");
    }
}
