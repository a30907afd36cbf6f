//! Partial answer accumulation

/// Append-only answer text for the turn currently streaming
///
/// Fragments are kept exactly as received; arrival order is display order.
#[derive(Debug, Clone, Default)]
pub struct PartialAnswerBuffer {
    text: String,
    fragments: usize,
}

impl PartialAnswerBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, fragment: &str) {
        self.text.push_str(fragment);
        self.fragments += 1;
    }

    /// Current concatenation of every fragment
    pub fn snapshot(&self) -> String {
        self.text.clone()
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn reset(&mut self) {
        self.text.clear();
        self.fragments = 0;
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Number of fragments appended since the last reset
    pub fn fragment_count(&self) -> usize {
        self.fragments
    }
}
