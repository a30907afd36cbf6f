//! Conversation history loading
//!
//! Fails soft: a session view must render even when its history cannot be
//! fetched, so errors come back as a warning next to an empty list.

use std::sync::Arc;
use tracing::{debug, warn};

use crate::api::TurnSource;
use crate::types::{ConversationTurn, SessionId};

/// Outcome of a history load
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HistoryLoad {
    /// Completed turns, oldest first
    pub turns: Vec<ConversationTurn>,
    /// Set when the load failed; `turns` is then empty
    pub warning: Option<String>,
}

/// Loads the completed turns of a session
#[derive(Clone)]
pub struct ConversationHistoryLoader {
    source: Arc<dyn TurnSource>,
}

impl ConversationHistoryLoader {
    pub fn new(source: Arc<dyn TurnSource>) -> Self {
        Self { source }
    }

    /// Read-only; never mutates server state
    pub async fn load(&self, session_id: &SessionId) -> HistoryLoad {
        match self.source.fetch_turns(session_id).await {
            Ok(records) => {
                debug!(
                    session_id = %session_id,
                    turns = records.len(),
                    "Loaded conversation history"
                );
                HistoryLoad {
                    turns: records.into_iter().map(ConversationTurn::from).collect(),
                    warning: None,
                }
            }
            Err(e) => {
                warn!(session_id = %session_id, error = %e, "Failed to load conversation history");
                HistoryLoad {
                    turns: Vec::new(),
                    warning: Some(format!("history unavailable: {e}")),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ApiError;
    use crate::types::TurnRecord;
    use async_trait::async_trait;

    struct FixedTurns(Vec<TurnRecord>);

    #[async_trait]
    impl TurnSource for FixedTurns {
        async fn fetch_turns(&self, _: &SessionId) -> Result<Vec<TurnRecord>, ApiError> {
            Ok(self.0.clone())
        }
    }

    struct Unreachable;

    #[async_trait]
    impl TurnSource for Unreachable {
        async fn fetch_turns(&self, _: &SessionId) -> Result<Vec<TurnRecord>, ApiError> {
            Err(ApiError::Status {
                status: 503,
                message: "down".to_string(),
            })
        }
    }

    #[tokio::test]
    async fn test_empty_session() {
        let loader = ConversationHistoryLoader::new(Arc::new(FixedTurns(Vec::new())));
        let load = loader.load(&SessionId::new("s")).await;
        assert_eq!(load, HistoryLoad::default());
    }

    #[tokio::test]
    async fn test_turns_keep_order() {
        let records = vec![
            TurnRecord {
                query: "first".into(),
                response: "one".into(),
            },
            TurnRecord {
                query: "second".into(),
                response: "two".into(),
            },
        ];
        let loader = ConversationHistoryLoader::new(Arc::new(FixedTurns(records)));
        let load = loader.load(&SessionId::new("s")).await;
        let queries: Vec<_> = load.turns.iter().map(|t| t.query.as_str()).collect();
        assert_eq!(queries, ["first", "second"]);
        assert_eq!(load.turns[1].answer_text, "two");
        assert!(load.warning.is_none());
    }

    #[tokio::test]
    async fn test_failure_is_soft() {
        let loader = ConversationHistoryLoader::new(Arc::new(Unreachable));
        let load = loader.load(&SessionId::new("s")).await;
        assert!(load.turns.is_empty());
        let warning = load.warning.unwrap();
        assert!(warning.contains("503"), "{warning}");
    }
}
