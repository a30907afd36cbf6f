//! Search Lifecycle State Machine
//!
//! Replaces separate searching/streaming flags with one enum driven by one
//! input at a time. No I/O; the controller feeds it and reads it back.
//!
//! ```text
//! Idle ─start─▶ Connecting ─opened─▶ Searching ─token─▶ Streaming
//!                   │                    │                  │
//!                   └──── final ─▶ Finalized ◀── final ─────┘
//!                   └──── close/cancel ─▶ Closed
//!                   └──── error ─▶ Failed
//! ```
//!
//! `Finalized`, `Closed` and `Failed` are terminal: only a new `start` leaves
//! them.

use serde::Serialize;

use super::codec::StreamEvent;

/// Phase of the current search
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchPhase {
    #[default]
    Idle,
    Connecting,
    Searching,
    Streaming,
    Finalized,
    Closed,
    Failed,
}

impl SearchPhase {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            SearchPhase::Finalized | SearchPhase::Closed | SearchPhase::Failed
        )
    }

    /// A connection is pending or open
    pub fn is_live(self) -> bool {
        matches!(
            self,
            SearchPhase::Connecting | SearchPhase::Searching | SearchPhase::Streaming
        )
    }
}

impl std::fmt::Display for SearchPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            SearchPhase::Idle => "idle",
            SearchPhase::Connecting => "connecting",
            SearchPhase::Searching => "searching",
            SearchPhase::Streaming => "streaming",
            SearchPhase::Finalized => "finalized",
            SearchPhase::Closed => "closed",
            SearchPhase::Failed => "failed",
        };
        f.write_str(label)
    }
}

/// Inputs that drive the lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleInput {
    Start,
    Opened,
    Token,
    Sources,
    Final,
    PeerClosed,
    Error,
    Cancel,
}

impl From<&StreamEvent> for LifecycleInput {
    fn from(event: &StreamEvent) -> Self {
        match event {
            StreamEvent::Token(_) => LifecycleInput::Token,
            StreamEvent::SourceList(_) => LifecycleInput::Sources,
            StreamEvent::Final { .. } => LifecycleInput::Final,
        }
    }
}

/// Lifecycle of one search, reused across searches via `Start`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SearchLifecycle {
    phase: SearchPhase,
    sources_received: bool,
}

impl SearchLifecycle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> SearchPhase {
        self.phase
    }

    /// The pre-answer search has produced its source list
    pub fn sources_received(&self) -> bool {
        self.sources_received
    }

    /// Show a "searching" indicator: live connection, no sources yet
    pub fn is_searching(&self) -> bool {
        self.phase.is_live() && !self.sources_received
    }

    /// Show a "streaming" indicator: answer tokens are arriving
    pub fn is_streaming(&self) -> bool {
        self.phase == SearchPhase::Streaming
    }

    /// Apply one input
    ///
    /// Returns the resulting phase when the input was accepted, `None` when it
    /// does not apply in the current phase (the state is left untouched). A
    /// connection's events are only accepted while that connection is live.
    pub fn apply(&mut self, input: LifecycleInput) -> Option<SearchPhase> {
        use LifecycleInput as In;
        use SearchPhase as P;

        let next = match (self.phase, input) {
            (P::Idle | P::Finalized | P::Closed | P::Failed, In::Start) => P::Connecting,
            (P::Connecting, In::Opened) => P::Searching,
            (P::Connecting | P::Searching | P::Streaming, In::Token) => P::Streaming,
            (phase @ (P::Connecting | P::Searching | P::Streaming), In::Sources) => phase,
            (P::Connecting | P::Searching | P::Streaming, In::Final) => P::Finalized,
            (P::Connecting | P::Searching | P::Streaming, In::PeerClosed | In::Cancel) => {
                P::Closed
            }
            (P::Connecting | P::Searching | P::Streaming, In::Error) => P::Failed,
            _ => return None,
        };

        match input {
            In::Start => self.sources_received = false,
            In::Sources => self.sources_received = true,
            _ => {}
        }
        self.phase = next;
        Some(next)
    }
}
