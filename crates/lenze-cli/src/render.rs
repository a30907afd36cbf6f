//! Terminal rendering of search snapshots
//!
//! Snapshots carry the whole answer so far; the printer writes only the part
//! not yet on screen, then the sources, related queries and timing once the
//! search ends.

use lenze_core::{ConversationTurn, SearchPhase, SearchSnapshot};
use std::io::{self, Write};

#[derive(Debug, Default)]
pub struct AnswerPrinter {
    /// Bytes of the current answer already written
    printed: usize,
    finished: bool,
}

impl AnswerPrinter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Render one snapshot. Returns the terminal phase the first time the
    /// current search reaches one.
    pub fn render(
        &mut self,
        snapshot: &SearchSnapshot,
        out: &mut impl Write,
    ) -> io::Result<Option<SearchPhase>> {
        match snapshot.phase {
            SearchPhase::Idle => return Ok(None),
            SearchPhase::Connecting if snapshot.answer_text.is_empty() => {
                self.printed = 0;
                self.finished = false;
                return Ok(None);
            }
            _ => {}
        }
        if self.finished {
            return Ok(None);
        }

        if snapshot.answer_text.len() < self.printed {
            self.printed = 0;
        }
        if let Some(delta) = snapshot.answer_text.get(self.printed..) {
            if !delta.is_empty() {
                out.write_all(delta.as_bytes())?;
                out.flush()?;
                self.printed = snapshot.answer_text.len();
            }
        }

        if !snapshot.phase.is_terminal() {
            return Ok(None);
        }
        self.finished = true;
        if self.printed > 0 {
            writeln!(out)?;
        }

        match snapshot.phase {
            SearchPhase::Finalized => write_details(snapshot, out)?,
            SearchPhase::Failed => {
                let error = snapshot.last_error.as_deref().unwrap_or("unknown error");
                writeln!(out, "Search failed: {error}")?;
            }
            _ => {}
        }
        out.flush()?;
        Ok(Some(snapshot.phase))
    }
}

fn write_details(snapshot: &SearchSnapshot, out: &mut impl Write) -> io::Result<()> {
    if !snapshot.sources.is_empty() {
        writeln!(out, "\nSources:")?;
        for (i, source) in snapshot.sources.iter().enumerate() {
            writeln!(out, "  [{}] {} - {}", i + 1, source.title, source.link)?;
        }
    }
    if !snapshot.related_queries.is_empty() {
        writeln!(out, "\nRelated:")?;
        for query in &snapshot.related_queries {
            writeln!(out, "  - {query}")?;
        }
    }
    if !snapshot.time_taken.is_empty() {
        writeln!(out, "\nTime taken: {}", snapshot.time_taken)?;
    }
    Ok(())
}

/// One completed turn, as listed by `lenze history`
pub fn write_turn(index: usize, turn: &ConversationTurn, out: &mut impl Write) -> io::Result<()> {
    writeln!(out, "[{}] {}", index + 1, turn.query)?;
    writeln!(out, "{}", turn.answer_text)?;
    writeln!(out)
}
