//! Lenze core library
//!
//! Client side of a streaming web-search service: a search query opens a
//! server push stream, answer tokens are assembled in order, and the session's
//! completed turns are loaded alongside.
//!
//! - [`stream`] turns bytes into typed events and tracks the search lifecycle
//! - [`session`] runs one streaming connection per session view
//! - [`api`] and [`history`] cover the plain request/response endpoints

pub mod api;
pub mod config;
pub mod error;
pub mod history;
pub mod session;
pub mod stream;
pub mod types;

pub use api::{SearchApiClient, TurnSource};
pub use config::{ClientConfig, Endpoints};
pub use error::{ApiError, ConfigError, ControllerError, StreamError};
pub use history::{ConversationHistoryLoader, HistoryLoad};
pub use session::{SearchSnapshot, SessionStreamController, Subscription};
pub use stream::{SearchPhase, StreamEvent};
pub use types::{ConversationTurn, SessionId, SessionSummary, Source, TurnRecord};
