//! Stream event codec
//!
//! Maps one [`RawFrame`] to a typed [`StreamEvent`]. Pure: no state, no I/O.
//!
//! | event name  | payload                                   |
//! |-------------|-------------------------------------------|
//! | (none)      | raw answer text, used verbatim            |
//! | `source`    | JSON array of `{title, link}`             |
//! | `finaljson` | JSON object `{related, time_taken}`       |
//!
//! Any other name is ignored so newer servers can add events freely.

use serde::Deserialize;

use super::sse::RawFrame;
use crate::error::StreamError;
use crate::types::Source;

pub const SOURCE_EVENT: &str = "source";
pub const FINAL_EVENT: &str = "finaljson";

/// Typed protocol event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// Answer fragment, appended verbatim in arrival order
    Token(String),
    /// Sources for the current turn
    SourceList(Vec<Source>),
    /// Terminal metadata; nothing follows it
    Final {
        related: Vec<String>,
        time_taken: String,
    },
}

impl StreamEvent {
    /// Short label for logging
    pub fn kind(&self) -> &'static str {
        match self {
            StreamEvent::Token(_) => "token",
            StreamEvent::SourceList(_) => "source",
            StreamEvent::Final { .. } => "final",
        }
    }
}

#[derive(Deserialize)]
struct FinalPayload {
    related: Vec<String>,
    time_taken: String,
}

/// Decode one frame
///
/// `Ok(None)` means the frame is ignored (unknown name, or empty unnamed data).
/// Only malformed JSON in a structured frame is an error.
pub fn decode(frame: &RawFrame) -> Result<Option<StreamEvent>, StreamError> {
    match frame.event.as_deref() {
        None | Some("") | Some("message") => {
            if frame.data.is_empty() {
                Ok(None)
            } else {
                Ok(Some(StreamEvent::Token(frame.data.clone())))
            }
        }
        Some(SOURCE_EVENT) => {
            let sources: Vec<Source> =
                serde_json::from_str(&frame.data).map_err(|source| StreamError::Decode {
                    event: SOURCE_EVENT.to_string(),
                    source,
                })?;
            Ok(Some(StreamEvent::SourceList(sources)))
        }
        Some(FINAL_EVENT) => {
            let payload: FinalPayload =
                serde_json::from_str(&frame.data).map_err(|source| StreamError::Decode {
                    event: FINAL_EVENT.to_string(),
                    source,
                })?;
            Ok(Some(StreamEvent::Final {
                related: payload.related,
                time_taken: payload.time_taken,
            }))
        }
        Some(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unnamed_frame_is_verbatim_token() {
        let event = decode(&RawFrame::data(" {\"not\": \"json\"}")).unwrap();
        assert_eq!(
            event,
            Some(StreamEvent::Token(" {\"not\": \"json\"}".to_string()))
        );
    }

    #[test]
    fn test_empty_unnamed_frame_ignored() {
        assert_eq!(decode(&RawFrame::data("")).unwrap(), None);
    }

    #[test]
    fn test_source_frame() {
        let frame = RawFrame::named(
            "source",
            r#"[{"title":"S1","link":"http://x"},{"title":"S2","link":"http://y"}]"#,
        );
        let Some(StreamEvent::SourceList(sources)) = decode(&frame).unwrap() else {
            panic!("expected source list");
        };
        assert_eq!(sources.len(), 2);
        assert_eq!(sources[0].title, "S1");
        assert_eq!(sources[1].link, "http://y");
    }

    #[test]
    fn test_empty_source_list() {
        let event = decode(&RawFrame::named("source", "[]")).unwrap();
        assert_eq!(event, Some(StreamEvent::SourceList(Vec::new())));
    }

    #[test]
    fn test_final_frame() {
        let frame = RawFrame::named("finaljson", r#"{"related":["q1","q2"],"time_taken":"1.2s"}"#);
        assert_eq!(
            decode(&frame).unwrap(),
            Some(StreamEvent::Final {
                related: vec!["q1".to_string(), "q2".to_string()],
                time_taken: "1.2s".to_string(),
            })
        );
    }

    #[test]
    fn test_malformed_structured_frames_error() {
        let err = decode(&RawFrame::named("source", "[{oops")).unwrap_err();
        assert!(matches!(err, StreamError::Decode { ref event, .. } if event == "source"));

        let err = decode(&RawFrame::named("finaljson", r#"{"related":"q1"}"#)).unwrap_err();
        assert!(matches!(err, StreamError::Decode { ref event, .. } if event == "finaljson"));
    }

    #[test]
    fn test_unknown_event_ignored() {
        assert_eq!(
            decode(&RawFrame::named("progress", "{\"step\": 2}")).unwrap(),
            None
        );
        assert_eq!(decode(&RawFrame::named("heartbeat", "")).unwrap(), None);
    }
}
