//! HTTP client for the search server's plain endpoints
//!
//! Session allocation, the past-sessions listing, per-session history, and
//! opening the raw streaming response. Interpreting the stream is left to
//! [`crate::stream`].

use async_trait::async_trait;
use tracing::{debug, info};

use crate::config::Endpoints;
use crate::error::ApiError;
use crate::types::{CreatedSession, SessionId, SessionSummary, TurnRecord};

const EVENT_STREAM: &str = "text/event-stream";

/// Anything that can list the completed turns of a session
#[async_trait]
pub trait TurnSource: Send + Sync {
    async fn fetch_turns(&self, session_id: &SessionId) -> Result<Vec<TurnRecord>, ApiError>;
}

/// Client for the search server
#[derive(Debug, Clone)]
pub struct SearchApiClient {
    endpoints: Endpoints,
    http: reqwest::Client,
}

impl SearchApiClient {
    pub fn new(endpoints: Endpoints) -> Self {
        Self {
            endpoints,
            http: reqwest::Client::new(),
        }
    }

    /// Create a client with a custom reqwest client
    pub fn with_client(endpoints: Endpoints, http: reqwest::Client) -> Self {
        Self { endpoints, http }
    }

    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    /// Allocate a new session on the server
    pub async fn create_session(&self) -> Result<SessionId, ApiError> {
        let response = self
            .http
            .post(self.endpoints.create_session_url())
            .send()
            .await?;
        let created: CreatedSession = Self::handle_response(response).await?;
        info!(session_id = %created.session_id, "Created search session");
        Ok(created.session_id)
    }

    /// Past sessions, in the order the server returns them
    pub async fn list_sessions(&self) -> Result<Vec<SessionSummary>, ApiError> {
        let response = self.http.get(self.endpoints.sessions_url()).send().await?;
        Self::handle_response(response).await
    }

    /// Open the streaming response for `query`
    ///
    /// Only checks the status; the body is left unread for the caller.
    pub async fn open_stream(
        &self,
        session_id: &SessionId,
        query: &str,
    ) -> Result<reqwest::Response, ApiError> {
        let url = self.endpoints.stream_url(session_id, query);
        debug!("Opening stream: {}", url);
        let response = self
            .http
            .post(url)
            .header(reqwest::header::ACCEPT, EVENT_STREAM)
            .send()
            .await?;
        Self::check_status(response).await
    }

    async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let message = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".into());
        Err(ApiError::Status {
            status: status.as_u16(),
            message,
        })
    }

    async fn handle_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, ApiError> {
        let response = Self::check_status(response).await?;
        let body = response.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }
}

#[async_trait]
impl TurnSource for SearchApiClient {
    async fn fetch_turns(&self, session_id: &SessionId) -> Result<Vec<TurnRecord>, ApiError> {
        let response = self
            .http
            .get(self.endpoints.history_url(session_id))
            .send()
            .await?;
        Self::handle_response(response).await
    }
}
