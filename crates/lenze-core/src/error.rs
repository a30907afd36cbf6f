//! Error types
//!
//! One enum per concern: the live stream, the REST collaborators, configuration,
//! and the controller handle.

use thiserror::Error;

/// Failures of a single streaming connection
#[derive(Debug, Error)]
pub enum StreamError {
    /// Transport could not be opened, or the server refused the stream
    #[error("connection failed ({status}): {message}")]
    Connection { status: u16, message: String },

    /// Server answered the open with HTTP 429
    #[error("rate limited by server: {message}")]
    RateLimited { message: String },

    /// Transport broke while the stream was open
    #[error("transport error: {0}")]
    Transport(String),

    /// A structured frame carried malformed JSON
    #[error("malformed `{event}` frame: {source}")]
    Decode {
        event: String,
        #[source]
        source: serde_json::Error,
    },

    /// Connection was superseded or torn down; never user-visible
    #[error("stream cancelled")]
    Cancelled,
}

impl StreamError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, StreamError::Cancelled)
    }
}

impl From<reqwest::Error> for StreamError {
    fn from(err: reqwest::Error) -> Self {
        match err.status() {
            Some(status) => StreamError::Connection {
                status: status.as_u16(),
                message: err.to_string(),
            },
            None => StreamError::Transport(err.to_string()),
        }
    }
}

impl From<ApiError> for StreamError {
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::Status { status: 429, message } => StreamError::RateLimited { message },
            ApiError::Status { status, message } => StreamError::Connection { status, message },
            ApiError::Http(e) => e.into(),
            other => StreamError::Transport(other.to_string()),
        }
    }
}

/// Failures of the plain request/response endpoints
#[derive(Debug, Error)]
pub enum ApiError {
    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Server returned a non-success status
    #[error("API error ({status}): {message}")]
    Status { status: u16, message: String },

    /// Could not build an endpoint URL
    #[error("invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Response body did not match the expected shape
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Configuration loading and validation failures
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid base URL: {0}")]
    BaseUrl(#[from] url::ParseError),

    /// Base URL parsed but cannot take a path, e.g. `localhost:8000`
    #[error("base URL `{0}` must be an http(s) URL with a host")]
    UnsupportedBaseUrl(String),

    /// A session-scoped path template lacks the `{session_id}` placeholder
    #[error("path template `{0}` must contain {{session_id}}")]
    Template(String),
}

/// Returned by controller handle methods once the controller is gone
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ControllerError {
    #[error("controller has been disposed")]
    Disposed,
}
