//! User-facing diagnostic output.
//!
//! The sink is the host's output channel: append-only, ordered lines meant
//! for people. Structured logs go through `tracing` separately.

use std::sync::{Mutex, PoisonError};

/// Append-only line sink.
pub trait DiagnosticSink: Send + Sync {
    fn append_line(&self, line: &str);
}

/// Forwards lines to `tracing` at INFO level.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn append_line(&self, line: &str) {
        tracing::info!(target: "webroll::output", "{line}");
    }
}

/// Collects lines in memory.
#[derive(Debug, Default)]
pub struct BufferSink {
    lines: Mutex<Vec<String>>,
}

impl BufferSink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// All lines appended so far.
    #[must_use]
    pub fn lines(&self) -> Vec<String> {
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Whether any line contains `needle`.
    #[must_use]
    pub fn contains(&self, needle: &str) -> bool {
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .any(|l| l.contains(needle))
    }
}

impl DiagnosticSink for BufferSink {
    fn append_line(&self, line: &str) {
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(line.to_string());
    }
}
