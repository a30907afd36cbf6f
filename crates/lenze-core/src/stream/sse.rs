//! SSE (Server-Sent Events) framing
//!
//! Splits a `text/event-stream` body into discrete frames. Knows nothing about
//! what the frames mean; see [`super::codec`] for that.

use bytes::Bytes;
use std::time::Instant;
use tracing::{debug, info};

/// One dispatched event: optional name plus its data payload
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawFrame {
    pub event: Option<String>,
    pub data: String,
}

impl RawFrame {
    /// Unnamed frame carrying `data`
    pub fn data(data: impl Into<String>) -> Self {
        Self {
            event: None,
            data: data.into(),
        }
    }

    /// Named frame carrying `data`
    pub fn named(event: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            event: Some(event.into()),
            data: data.into(),
        }
    }
}

/// Incremental SSE reader that handles partial lines across chunks
pub struct SseFrameReader {
    /// Accumulated partial line from previous chunks
    partial_line: String,
    /// Trailing bytes of a UTF-8 sequence cut by a chunk boundary
    partial_utf8: Vec<u8>,
    /// Event name of the frame being built
    pending_event: Option<String>,
    /// Data lines of the frame being built
    pending_data: Vec<String>,
    /// When the stream started
    stream_start: Instant,
    /// Frames dispatched so far
    frame_count: usize,
    /// Bytes received counter
    bytes_received: usize,
}

impl SseFrameReader {
    pub fn new() -> Self {
        Self {
            partial_line: String::new(),
            partial_utf8: Vec::new(),
            pending_event: None,
            pending_data: Vec::new(),
            stream_start: Instant::now(),
            frame_count: 0,
            bytes_received: 0,
        }
    }

    /// Feed a chunk of bytes, returning every frame it completes
    pub fn process_chunk(&mut self, bytes: &Bytes) -> Vec<RawFrame> {
        self.bytes_received += bytes.len();
        debug!(
            "SSE chunk received: {} bytes (total: {} bytes)",
            bytes.len(),
            self.bytes_received
        );

        let mut raw = std::mem::take(&mut self.partial_utf8);
        raw.extend_from_slice(bytes);
        // Hold back an incomplete multi-byte sequence for the next chunk
        if let Err(e) = std::str::from_utf8(&raw) {
            if e.error_len().is_none() {
                self.partial_utf8 = raw.split_off(e.valid_up_to());
            }
        }
        let mut combined = std::mem::take(&mut self.partial_line);
        combined.push_str(&String::from_utf8_lossy(&raw));

        // Everything after the last newline is an unterminated line
        let complete_len = match combined.rfind('\n') {
            Some(idx) => idx + 1,
            None => {
                self.partial_line = combined;
                return Vec::new();
            }
        };
        self.partial_line = combined[complete_len..].to_string();

        let mut frames = Vec::new();
        for line in combined[..complete_len].lines() {
            if let Some(frame) = self.process_line(line) {
                frames.push(frame);
            }
        }
        frames
    }

    /// Flush at end of body: a trailing line or frame without its blank-line
    /// terminator is still delivered
    pub fn finish(&mut self) -> Option<RawFrame> {
        let mut trailing = std::mem::take(&mut self.partial_line);
        trailing.push_str(&String::from_utf8_lossy(&std::mem::take(&mut self.partial_utf8)));
        if !trailing.is_empty() {
            if let Some(frame) = self.process_line(trailing.trim_end_matches('\r')) {
                return Some(frame);
            }
        }
        let frame = self.dispatch();
        info!(
            "SSE reader finishing: {:?} elapsed, {} frames, {} bytes total",
            self.stream_start.elapsed(),
            self.frame_count,
            self.bytes_received
        );
        frame
    }

    fn process_line(&mut self, line: &str) -> Option<RawFrame> {
        if line.is_empty() {
            return self.dispatch();
        }

        // SSE comment
        if line.starts_with(':') {
            return None;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };

        match field {
            "event" => self.pending_event = Some(value.to_string()),
            "data" => self.pending_data.push(value.to_string()),
            // id / retry carry nothing this protocol uses
            _ => {}
        }
        None
    }

    fn dispatch(&mut self) -> Option<RawFrame> {
        let event = self.pending_event.take();
        if event.is_none() && self.pending_data.is_empty() {
            return None;
        }
        let data = std::mem::take(&mut self.pending_data).join("\n");
        self.frame_count += 1;
        debug!(
            "SSE frame #{} at {:?}: event={:?}, {} bytes",
            self.frame_count,
            self.stream_start.elapsed(),
            event,
            data.len()
        );
        Some(RawFrame { event, data })
    }
}

impl Default for SseFrameReader {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed(reader: &mut SseFrameReader, chunk: &str) -> Vec<RawFrame> {
        reader.process_chunk(&Bytes::copy_from_slice(chunk.as_bytes()))
    }

    #[test]
    fn test_unnamed_and_named_frames() {
        let mut reader = SseFrameReader::new();
        let frames = feed(
            &mut reader,
            "data: Hello\n\nevent: source\ndata: [{\"title\":\"S1\",\"link\":\"http://x\"}]\n\n",
        );
        assert_eq!(
            frames,
            vec![
                RawFrame::data("Hello"),
                RawFrame::named("source", r#"[{"title":"S1","link":"http://x"}]"#),
            ]
        );
    }

    #[test]
    fn test_only_one_leading_space_stripped() {
        let mut reader = SseFrameReader::new();
        let frames = feed(&mut reader, "data:  world\n\ndata:!\n\n");
        assert_eq!(frames, vec![RawFrame::data(" world"), RawFrame::data("!")]);
    }

    #[test]
    fn test_line_split_across_chunks() {
        let mut reader = SseFrameReader::new();
        assert!(feed(&mut reader, "event: final").is_empty());
        assert!(feed(&mut reader, "json\ndata: {\"related\":[]").is_empty());
        let frames = feed(&mut reader, ",\"time_taken\":\"1s\"}\r\n\r\n");
        assert_eq!(
            frames,
            vec![RawFrame::named(
                "finaljson",
                r#"{"related":[],"time_taken":"1s"}"#
            )]
        );
    }

    #[test]
    fn test_multibyte_char_split_across_chunks() {
        let mut reader = SseFrameReader::new();
        let bytes = "data: caf\u{e9}\n\n".as_bytes();
        // Split inside the two-byte encoding of the accented letter
        let split = bytes.len() - 3;
        assert!(reader
            .process_chunk(&Bytes::copy_from_slice(&bytes[..split]))
            .is_empty());
        let frames = reader.process_chunk(&Bytes::copy_from_slice(&bytes[split..]));
        assert_eq!(frames, vec![RawFrame::data("caf\u{e9}")]);
    }

    #[test]
    fn test_multiline_data_joined() {
        let mut reader = SseFrameReader::new();
        let frames = feed(&mut reader, "data: line one\ndata: line two\n\n");
        assert_eq!(frames, vec![RawFrame::data("line one\nline two")]);
    }

    #[test]
    fn test_comments_and_unknown_fields_skipped() {
        let mut reader = SseFrameReader::new();
        let frames = feed(&mut reader, ": ping\nid: 7\nretry: 100\n\ndata: x\n\n");
        assert_eq!(frames, vec![RawFrame::data("x")]);
    }

    #[test]
    fn test_empty_data_frame_still_dispatched() {
        let mut reader = SseFrameReader::new();
        let frames = feed(&mut reader, "data:\n\n\n\n");
        assert_eq!(frames, vec![RawFrame::data("")]);
    }

    #[test]
    fn test_finish_flushes_unterminated_frame() {
        let mut reader = SseFrameReader::new();
        assert!(feed(&mut reader, "data: tail\n").is_empty());
        assert_eq!(reader.finish(), Some(RawFrame::data("tail")));
        assert_eq!(reader.finish(), None);
    }

    #[test]
    fn test_finish_flushes_partial_line() {
        let mut reader = SseFrameReader::new();
        assert!(feed(&mut reader, "data: no newline").is_empty());
        assert_eq!(reader.finish(), Some(RawFrame::data("no newline")));
    }
}
