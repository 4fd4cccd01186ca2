use std::io::Write;
use webroll_core::DiagnosticSink;

/// Output channel on stderr, one line per diagnostic.
#[derive(Debug, Clone, Copy, Default)]
pub struct OutputChannel;

impl DiagnosticSink for OutputChannel {
    fn append_line(&self, line: &str) {
        let mut stderr = std::io::stderr().lock();
        let _ = writeln!(stderr, "[webroll] {line}");
    }
}
