//! Client configuration
//!
//! Where the search server lives and how its endpoints are laid out. Loaded
//! from `~/.config/lenze/config.toml` when present; every field has a default
//! matching the reference server.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use url::Url;

use crate::error::ConfigError;
use crate::types::SessionId;

const SESSION_PLACEHOLDER: &str = "{session_id}";

/// Raw configuration as written in the TOML file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Server root, e.g. `http://localhost:8000`
    pub base_url: String,
    /// Streaming endpoint, per session
    pub stream_path: String,
    /// Completed turns of a session
    pub history_path: String,
    /// Past sessions listing
    pub sessions_path: String,
    /// Session allocation
    pub create_session_path: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            stream_path: "/web-search-stream/{session_id}".to_string(),
            history_path: "/conversation/{session_id}".to_string(),
            sessions_path: "/search-history".to_string(),
            create_session_path: "/start-session".to_string(),
        }
    }
}

impl ClientConfig {
    /// Default config file location
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("lenze").join("config.toml"))
    }

    /// Load from a TOML file; missing keys fall back to defaults
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let config = toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })?;
        info!("Loaded client config from {}", path.display());
        Ok(config)
    }

    /// Load from `path` if given, else from the default location if it exists,
    /// else defaults
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = path {
            return Self::load(path);
        }
        match Self::default_path() {
            Some(path) if path.exists() => Self::load(&path),
            _ => {
                debug!("No config file found, using defaults");
                Ok(Self::default())
            }
        }
    }

    /// Validate and resolve into concrete endpoints
    pub fn endpoints(&self) -> Result<Endpoints, ConfigError> {
        let base_url = Url::parse(&self.base_url)?;
        if base_url.cannot_be_a_base() || !matches!(base_url.scheme(), "http" | "https") {
            return Err(ConfigError::UnsupportedBaseUrl(self.base_url.clone()));
        }
        for template in [&self.stream_path, &self.history_path] {
            if !template.split('/').any(|segment| segment == SESSION_PLACEHOLDER) {
                return Err(ConfigError::Template(template.clone()));
            }
        }
        Ok(Endpoints {
            base_url,
            stream_path: self.stream_path.clone(),
            history_path: self.history_path.clone(),
            sessions_path: self.sessions_path.clone(),
            create_session_path: self.create_session_path.clone(),
        })
    }
}

/// Validated endpoint layout
#[derive(Debug, Clone)]
pub struct Endpoints {
    base_url: Url,
    stream_path: String,
    history_path: String,
    sessions_path: String,
    create_session_path: String,
}

impl Endpoints {
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Stream URL with the query carried as `?query=`
    pub fn stream_url(&self, session_id: &SessionId, query: &str) -> Url {
        let mut url = self.resolve(&self.stream_path, Some(session_id));
        url.query_pairs_mut().append_pair("query", query);
        url
    }

    pub fn history_url(&self, session_id: &SessionId) -> Url {
        self.resolve(&self.history_path, Some(session_id))
    }

    pub fn sessions_url(&self) -> Url {
        self.resolve(&self.sessions_path, None)
    }

    pub fn create_session_url(&self) -> Url {
        self.resolve(&self.create_session_path, None)
    }

    /// Append a path template to the base URL, substituting the session id as
    /// a single encoded segment
    fn resolve(&self, template: &str, session_id: Option<&SessionId>) -> Url {
        let mut url = self.base_url.clone();
        url.set_query(None);
        url.set_fragment(None);
        // `endpoints()` only admits base URLs that can take a path
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty();
            for segment in template.split('/').filter(|s| !s.is_empty()) {
                match (segment, session_id) {
                    (SESSION_PLACEHOLDER, Some(id)) => segments.push(id.as_str()),
                    _ => segments.push(segment),
                };
            }
        }
        url
    }
}
