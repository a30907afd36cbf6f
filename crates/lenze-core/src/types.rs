//! Shared data model for search sessions

use serde::{Deserialize, Serialize};

/// Opaque, server-assigned session token
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct SessionId(String);

// Some servers hand out numeric ids; both forms are kept as text.
impl<'de> Deserialize<'de> for SessionId {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Text(String),
            Number(i64),
        }

        Ok(match Raw::deserialize(deserializer)? {
            Raw::Text(text) => Self(text),
            Raw::Number(n) => Self(n.to_string()),
        })
    }
}

impl SessionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A cited web source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    pub title: String,
    pub link: String,
}

/// A completed query/answer pair
///
/// Built either when a stream delivers its final metadata or when loaded from
/// the server's history. History entries carry no sources or related queries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub query: String,
    pub answer_text: String,
    #[serde(default)]
    pub sources: Vec<Source>,
    #[serde(default)]
    pub related_queries: Vec<String>,
    #[serde(default)]
    pub time_taken: String,
}

impl From<TurnRecord> for ConversationTurn {
    fn from(record: TurnRecord) -> Self {
        Self {
            query: record.query,
            answer_text: record.response,
            sources: Vec::new(),
            related_queries: Vec::new(),
            time_taken: String::new(),
        }
    }
}

/// Wire shape of one history entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnRecord {
    pub query: String,
    pub response: String,
}

/// Entry of the past-sessions listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub session_id: SessionId,
    pub first_query: String,
}

/// Response of the session-creation endpoint
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct CreatedSession {
    pub session_id: SessionId,
}
