//! Controller state
//!
//! Everything a session view shows, owned by exactly one controller and
//! mutated only from its event loop. Kept free of I/O so the single-flight
//! and ordering rules can be tested synchronously.

use serde::Serialize;
use tracing::{debug, error, info};

use super::cancellation::ConnectionCancellation;
use super::connection::{ConnectionEvent, Tagged};
use crate::stream::buffer::PartialAnswerBuffer;
use crate::stream::codec::StreamEvent;
use crate::stream::lifecycle::{LifecycleInput, SearchLifecycle, SearchPhase};
use crate::types::{ConversationTurn, SessionId, Source};

/// Immutable view handed to subscribers
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SearchSnapshot {
    pub session_id: Option<SessionId>,
    pub query: Option<String>,
    pub phase: SearchPhase,
    /// Live connection and no sources yet
    pub searching: bool,
    /// Answer tokens are arriving
    pub streaming: bool,
    pub answer_text: String,
    pub sources: Vec<Source>,
    pub related_queries: Vec<String>,
    pub time_taken: String,
    /// Fatal error of the current search, if any
    pub last_error: Option<String>,
    /// Completed turns of the session as last loaded
    pub history: Vec<ConversationTurn>,
    pub history_warning: Option<String>,
    /// Turn built from the current search once it finalized
    pub turn: Option<ConversationTurn>,
}

#[derive(Debug, Default)]
pub(crate) struct ControllerState {
    lifecycle: SearchLifecycle,
    buffer: PartialAnswerBuffer,
    session_id: Option<SessionId>,
    query: Option<String>,
    sources: Vec<Source>,
    related_queries: Vec<String>,
    time_taken: String,
    last_error: Option<String>,
    history: Vec<ConversationTurn>,
    history_warning: Option<String>,
    turn: Option<ConversationTurn>,
    /// Id of the most recent search; history results are matched against it
    search_id: u64,
    /// Live connection of the most recent search
    active: Option<ConnectionCancellation>,
}

impl ControllerState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has_active_connection(&self) -> bool {
        self.active.is_some()
    }

    /// Start a new search, superseding any live connection
    ///
    /// Returns the cancellation handle of the new connection.
    pub fn begin_search(&mut self, session_id: SessionId, query: String) -> ConnectionCancellation {
        self.cancel_active();

        self.search_id += 1;
        info!(
            connection_id = self.search_id,
            session_id = %session_id,
            "Starting search"
        );

        if self.session_id.as_ref() != Some(&session_id) {
            self.history.clear();
            self.history_warning = None;
        }
        self.buffer.reset();
        self.sources.clear();
        self.related_queries.clear();
        self.time_taken.clear();
        self.last_error = None;
        self.turn = None;
        self.session_id = Some(session_id);
        self.query = Some(query);
        self.lifecycle.apply(LifecycleInput::Start);

        let cancellation = ConnectionCancellation::new(self.search_id);
        self.active = Some(cancellation.clone());
        cancellation
    }

    /// Cancel the live connection, if any. Returns whether anything changed.
    pub fn cancel_active(&mut self) -> bool {
        let Some(active) = self.active.take() else {
            return false;
        };
        active.cancel();
        debug!(
            connection_id = active.connection_id(),
            "Cancelled connection"
        );
        self.lifecycle.apply(LifecycleInput::Cancel).is_some()
    }

    /// Apply one tagged event. Returns whether the view changed.
    pub fn apply(&mut self, tagged: Tagged) -> bool {
        let Tagged {
            connection_id,
            event,
        } = tagged;

        if connection_id != self.search_id {
            debug!(
                connection_id,
                current = self.search_id,
                "Discarding event from superseded connection"
            );
            return false;
        }

        if let ConnectionEvent::History(load) = event {
            self.history = load.turns;
            self.history_warning = load.warning;
            return true;
        }

        // Cancellation is checked before every event is applied
        match &self.active {
            Some(active) if !active.is_cancelled() => {}
            _ => {
                debug!(connection_id, "Discarding event from closed connection");
                return false;
            }
        }

        match event {
            ConnectionEvent::Opened => self.lifecycle.apply(LifecycleInput::Opened).is_some(),
            ConnectionEvent::Event(event) => self.apply_stream_event(event),
            ConnectionEvent::Closed => {
                self.release_active();
                self.lifecycle.apply(LifecycleInput::PeerClosed).is_some()
            }
            ConnectionEvent::Failed(e) if e.is_cancelled() => {
                self.release_active();
                self.lifecycle.apply(LifecycleInput::Cancel).is_some()
            }
            ConnectionEvent::Failed(e) => {
                error!(connection_id, "Search failed: {}", e);
                self.release_active();
                let changed = self.lifecycle.apply(LifecycleInput::Error).is_some();
                if changed {
                    self.last_error = Some(e.to_string());
                }
                changed
            }
            ConnectionEvent::History(_) => false,
        }
    }

    fn apply_stream_event(&mut self, event: StreamEvent) -> bool {
        if self.lifecycle.apply(LifecycleInput::from(&event)).is_none() {
            return false;
        }

        match event {
            StreamEvent::Token(text) => self.buffer.append(&text),
            StreamEvent::SourceList(sources) => self.sources = sources,
            StreamEvent::Final {
                related,
                time_taken,
            } => {
                self.related_queries = related;
                self.time_taken = time_taken;
                self.turn = Some(ConversationTurn {
                    query: self.query.clone().unwrap_or_default(),
                    answer_text: self.buffer.snapshot(),
                    sources: self.sources.clone(),
                    related_queries: self.related_queries.clone(),
                    time_taken: self.time_taken.clone(),
                });
                self.release_active();
            }
        }
        true
    }

    /// Connection reached a terminal outcome on its own
    fn release_active(&mut self) {
        if let Some(active) = self.active.take() {
            active.cancel();
        }
    }

    pub fn snapshot(&self) -> SearchSnapshot {
        SearchSnapshot {
            session_id: self.session_id.clone(),
            query: self.query.clone(),
            phase: self.lifecycle.phase(),
            searching: self.lifecycle.is_searching(),
            streaming: self.lifecycle.is_streaming(),
            answer_text: self.buffer.snapshot(),
            sources: self.sources.clone(),
            related_queries: self.related_queries.clone(),
            time_taken: self.time_taken.clone(),
            last_error: self.last_error.clone(),
            history: self.history.clone(),
            history_warning: self.history_warning.clone(),
            turn: self.turn.clone(),
        }
    }
}
