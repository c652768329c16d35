use std::{fmt, sync::Arc};

use crate::Severity;

/// Which pipe of the child a line came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stream {
    Stdout,
    Stderr,
}

impl Stream {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Stdout => "stdout",
            Self::Stderr => "stderr",
        }
    }
}

impl fmt::Display for Stream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One classified line of child output, delivered to a sink and then dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogLine {
    /// Caller context, usually the repository name.
    pub context: Arc<str>,
    /// Short name of the tool that produced the line.
    pub tool: Arc<str>,
    pub stream: Stream,
    pub severity: Severity,
    pub text: String,
}

/// Reassembles arbitrarily chunked bytes into lines.
///
/// Lines are split on `\n`, trimmed of trailing whitespace (which also drops a
/// `\r`), and empty results are skipped. Bytes are buffered undecoded, so a
/// multi-byte UTF-8 sequence split across chunks survives; invalid sequences
/// are replaced lossily per line.
#[derive(Debug, Default)]
pub struct LineBuffer {
    pending: Vec<u8>,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk and emit every line it completes.
    pub fn feed<F>(&mut self, chunk: &[u8], mut emit: F)
    where
        F: FnMut(String),
    {
        let mut scan_from = self.pending.len();
        self.pending.extend_from_slice(chunk);

        let mut line_start = 0;
        while let Some(offset) = self.pending[scan_from..].iter().position(|&b| b == b'\n') {
            let end = scan_from + offset;
            emit_trimmed(&self.pending[line_start..end], &mut emit);
            line_start = end + 1;
            scan_from = line_start;
        }
        self.pending.drain(..line_start);
    }

    /// Flush the unterminated remainder at end of stream.
    pub fn finish<F>(self, mut emit: F)
    where
        F: FnMut(String),
    {
        emit_trimmed(&self.pending, &mut emit);
    }

    /// Bytes waiting for a terminator.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }
}

fn emit_trimmed<F>(raw: &[u8], emit: &mut F)
where
    F: FnMut(String),
{
    let text = String::from_utf8_lossy(raw);
    let text = text.trim_end();
    if !text.is_empty() {
        emit(text.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(chunks: &[&[u8]]) -> Vec<String> {
        let mut out = Vec::new();
        let mut buf = LineBuffer::new();
        for chunk in chunks {
            buf.feed(chunk, |l| out.push(l));
        }
        buf.finish(|l| out.push(l));
        out
    }

    #[test]
    fn partial_line_across_flushes_is_one_line() {
        assert_eq!(run(&[b"AB", b"CD\n"]), vec!["ABCD"]);
    }

    #[test]
    fn several_lines_in_one_chunk() {
        assert_eq!(run(&[b"one\ntwo\nthree\n"]), vec!["one", "two", "three"]);
    }

    #[test]
    fn terminator_split_from_text() {
        assert_eq!(run(&[b"a", b"b", b"\n", b"c\n"]), vec!["ab", "c"]);
    }

    #[test]
    fn remainder_is_flushed_at_end() {
        assert_eq!(run(&[b"done\nno newline"]), vec!["done", "no newline"]);
    }

    #[test]
    fn trailing_whitespace_and_crlf_are_trimmed() {
        assert_eq!(run(&[b"  indented  \r\nx\t\n"]), vec!["  indented", "x"]);
    }

    #[test]
    fn blank_lines_are_skipped() {
        assert_eq!(run(&[b"\n\n  \nreal\n\n", b"   "]), vec!["real"]);
    }

    #[test]
    fn utf8_split_across_chunks_survives() {
        let bytes = "größe\n".as_bytes();
        let (a, b) = bytes.split_at(3);
        assert_eq!(run(&[a, b]), vec!["größe"]);
    }

    #[test]
    fn pending_is_released_after_terminator() {
        let mut buf = LineBuffer::new();
        buf.feed(b"abc", |_| {});
        assert_eq!(buf.pending_len(), 3);
        buf.feed(b"\nde", |_| {});
        assert_eq!(buf.pending_len(), 2);
    }
}
