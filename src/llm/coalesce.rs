//! Batching of decoded deltas into fewer downstream events.

/// Number of accepted deltas that triggers a flush.
///
/// A tunable constant, not a protocol requirement: it trades per-token latency
/// for roughly 5x fewer downstream events.
pub const BUFFER_THRESHOLD: usize = 5;

/// Batches consecutive deltas and suppresses immediate duplicates.
///
/// Duplicate suppression only applies to non-empty deltas: upstream APIs have
/// been observed repeating a token on retry, and dropping the repeat keeps the
/// output clean. Every accepted delta, empty ones included, updates the
/// last-accepted pointer and counts toward the threshold, so two consecutive
/// empty deltas are both accepted.
#[derive(Debug)]
pub struct TokenCoalescer {
    buffer: Vec<String>,
    last_accepted: Option<String>,
    threshold: usize,
}

impl Default for TokenCoalescer {
    fn default() -> Self {
        Self::with_threshold(BUFFER_THRESHOLD)
    }
}

impl TokenCoalescer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_threshold(threshold: usize) -> Self {
        Self {
            buffer: Vec::new(),
            last_accepted: None,
            threshold: threshold.max(1),
        }
    }

    /// Accept one delta, returning the joined batch when the threshold is
    /// reached.
    pub fn push(&mut self, delta: &str) -> Option<String> {
        if !delta.is_empty() && self.last_accepted.as_deref() == Some(delta) {
            return None;
        }

        self.buffer.push(delta.to_string());
        self.last_accepted = Some(delta.to_string());

        if self.buffer.len() >= self.threshold {
            Some(self.drain())
        } else {
            None
        }
    }

    /// Flush any remaining buffered tokens at stream end.
    pub fn flush(&mut self) -> Option<String> {
        if self.buffer.is_empty() {
            None
        } else {
            Some(self.drain())
        }
    }

    fn drain(&mut self) -> String {
        let joined = self.buffer.join(" ");
        self.buffer.clear();
        joined
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_five_distinct_deltas_emit_one_batch() {
        let mut coalescer = TokenCoalescer::new();

        assert_eq!(coalescer.push("a"), None);
        assert_eq!(coalescer.push("b"), None);
        assert_eq!(coalescer.push("c"), None);
        assert_eq!(coalescer.push("d"), None);
        assert_eq!(coalescer.push("e"), Some("a b c d e".to_string()));

        // State is cleared for subsequent pushes.
        assert_eq!(coalescer.push("f"), None);
        assert_eq!(coalescer.flush(), Some("f".to_string()));
    }

    #[test]
    fn test_duplicate_suppression() {
        let mut coalescer = TokenCoalescer::new();

        assert_eq!(coalescer.push("Hi"), None);
        assert_eq!(coalescer.push("Hi"), None);
        assert_eq!(coalescer.push("Hi"), None);

        // Only the first "Hi" was accepted.
        assert_eq!(coalescer.flush(), Some("Hi".to_string()));
    }

    #[test]
    fn test_duplicate_suppression_survives_batch_flush() {
        let mut coalescer = TokenCoalescer::with_threshold(2);

        assert_eq!(coalescer.push("a"), None);
        assert_eq!(coalescer.push("b"), Some("a b".to_string()));
        // "b" is still the last accepted delta after the flush.
        assert_eq!(coalescer.push("b"), None);
        assert_eq!(coalescer.flush(), None);
    }

    #[test]
    fn test_empty_deltas_not_suppressed() {
        // Chosen rule: suppression only applies to non-empty deltas, so
        // consecutive empty deltas are all accepted.
        let mut coalescer = TokenCoalescer::new();

        assert_eq!(coalescer.push(""), None);
        assert_eq!(coalescer.push(""), None);
        assert_eq!(coalescer.flush(), Some(" ".to_string()));
    }

    #[test]
    fn test_empty_delta_resets_duplicate_tracking() {
        let mut coalescer = TokenCoalescer::new();

        assert_eq!(coalescer.push("x"), None);
        assert_eq!(coalescer.push(""), None);
        // "x" no longer matches the last accepted delta.
        assert_eq!(coalescer.push("x"), None);
        assert_eq!(coalescer.flush(), Some("x  x".to_string()));
    }

    #[test]
    fn test_flush_empty_buffer_is_none() {
        let mut coalescer = TokenCoalescer::new();
        assert_eq!(coalescer.flush(), None);
    }

    #[test]
    fn test_interleaved_duplicates_accepted() {
        let mut coalescer = TokenCoalescer::new();

        assert_eq!(coalescer.push("a"), None);
        assert_eq!(coalescer.push("b"), None);
        assert_eq!(coalescer.push("a"), None);
        assert_eq!(coalescer.flush(), Some("a b a".to_string()));
    }
}
