use std::sync::Mutex;

use tracing::{debug, error, info, warn};

use crate::{LogLine, Severity, Stream};

/// Destination for classified child output.
///
/// Shared by every concurrently running child, so implementations must be
/// safe to call from many tasks at once.
pub trait LineSink: Send + Sync {
    fn emit(&self, line: LogLine);
}

/// Forwards lines to the global `tracing` subscriber.
///
/// `tracing` has no level above `ERROR`; critical lines are logged at `ERROR`
/// with `severity = "critical"`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl LineSink for TracingSink {
    fn emit(&self, line: LogLine) {
        let LogLine {
            context,
            tool,
            stream,
            severity,
            text,
        } = line;
        let repo = &*context;
        let tool = &*tool;
        let stream = stream.as_str();

        match severity {
            Severity::Debug => debug!(repo, tool, stream, "{text}"),
            Severity::Info => info!(repo, tool, stream, "{text}"),
            Severity::Warning => warn!(repo, tool, stream, "{text}"),
            Severity::Error => error!(repo, tool, stream, "{text}"),
            Severity::Critical => error!(repo, tool, stream, severity = "critical", "{text}"),
        }
    }
}

/// Keeps every line in memory, in delivery order.
#[derive(Debug, Default)]
pub struct MemorySink {
    lines: Mutex<Vec<LogLine>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything emitted so far.
    pub fn lines(&self) -> Vec<LogLine> {
        self.lines.lock().map(|g| g.clone()).unwrap_or_default()
    }

    /// Texts of lines from `stream`, optionally restricted to one context.
    pub fn texts(&self, context: Option<&str>, stream: Stream) -> Vec<String> {
        self.lines()
            .into_iter()
            .filter(|l| l.stream == stream)
            .filter(|l| context.is_none_or(|c| &*l.context == c))
            .map(|l| l.text)
            .collect()
    }
}

impl LineSink for MemorySink {
    fn emit(&self, line: LogLine) {
        if let Ok(mut guard) = self.lines.lock() {
            guard.push(line);
        }
    }
}
