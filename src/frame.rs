//! Line framing for the board's text stream.
//!
//! Both directions are one message per line:
//! ```text
//! vm volume -s 42\n
//! {"type":"VolumeResponse","value":{"volume":42}}\n
//! ```

use tracing::debug;

/// Default message delimiter.
pub const DEFAULT_DELIMITER: &str = "\n";

const TARGET: &str = "vmlink::frame";

/// Splits a byte stream into delimiter-terminated lines. Buffers partial
/// data across calls, so it can be fed arbitrary TCP segment boundaries,
/// including a multi-byte delimiter split between two reads.
pub struct LineSplitter {
    delimiter: Vec<u8>,
    buf: Vec<u8>,
    /// Offset in `buf` before which no delimiter can start.
    scanned: usize,
}

impl LineSplitter {
    /// Create a splitter for `delimiter`. An empty delimiter falls back to
    /// [`DEFAULT_DELIMITER`].
    pub fn new(delimiter: &str) -> Self {
        let delimiter = if delimiter.is_empty() { DEFAULT_DELIMITER } else { delimiter };
        Self {
            delimiter: delimiter.as_bytes().to_vec(),
            buf: Vec::with_capacity(512),
            scanned: 0,
        }
    }

    /// Feed new data and extract any complete lines.
    ///
    /// Lines are returned without their delimiter; a trailing `\r` is
    /// stripped and blank lines are skipped. Partial lines are buffered
    /// for the next call.
    pub fn feed(&mut self, data: &[u8]) -> Vec<String> {
        self.buf.extend_from_slice(data);
        let mut lines = Vec::new();
        let dlen = self.delimiter.len();

        let mut start = 0;
        let mut pos = self.scanned;
        while pos + dlen <= self.buf.len() {
            if self.buf[pos..pos + dlen] != self.delimiter[..] {
                pos += 1;
                continue;
            }
            if let Some(line) = to_line(&self.buf[start..pos]) {
                lines.push(line);
            }
            pos += dlen;
            start = pos;
        }

        self.buf.drain(..start);
        // A delimiter may begin in the last dlen-1 bytes; rescan those next time.
        self.scanned = self.buf.len().saturating_sub(dlen - 1);
        lines
    }

    /// Discard any buffered partial line.
    pub fn reset(&mut self) {
        self.buf.clear();
        self.scanned = 0;
    }

    /// Number of buffered bytes not yet terminated by a delimiter.
    pub fn pending(&self) -> usize {
        self.buf.len()
    }
}

impl Default for LineSplitter {
    fn default() -> Self {
        Self::new(DEFAULT_DELIMITER)
    }
}

fn to_line(bytes: &[u8]) -> Option<String> {
    let bytes = bytes.strip_suffix(b"\r").unwrap_or(bytes);
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return None;
    }
    match String::from_utf8(bytes.to_vec()) {
        Ok(line) => Some(line),
        Err(e) => {
            debug!(target: TARGET, error = %e, "replacing invalid UTF-8 in line");
            Some(String::from_utf8_lossy(bytes).into_owned())
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    const MSG: &str = "{\"type\":\"VolumeResponse\",\"value\":{\"volume\":42}}";

    #[test]
    fn splitter_basic() {
        let mut splitter = LineSplitter::default();
        let lines = splitter.feed(format!("{MSG}\n").as_bytes());
        assert_eq!(lines, vec![MSG.to_string()]);
        assert_eq!(splitter.pending(), 0);
    }

    #[test]
    fn splitter_partial() {
        let mut splitter = LineSplitter::default();
        assert!(splitter.feed(&MSG.as_bytes()[..10]).is_empty());
        assert_eq!(splitter.pending(), 10);
        let lines = splitter.feed(format!("{}\n", &MSG[10..]).as_bytes());
        assert_eq!(lines, vec![MSG.to_string()]);
    }

    #[test]
    fn splitter_multiple_in_one_read() {
        let mut splitter = LineSplitter::default();
        let lines = splitter.feed(b"one\ntwo\nthree\npart");
        assert_eq!(lines, vec!["one", "two", "three"]);
        assert_eq!(splitter.pending(), 4);
    }

    #[test]
    fn splitter_strips_carriage_return_and_blank_lines() {
        let mut splitter = LineSplitter::default();
        let lines = splitter.feed(b"first\r\n\r\n\nsecond\n");
        assert_eq!(lines, vec!["first", "second"]);
    }

    #[test]
    fn splitter_lossy_utf8() {
        let mut splitter = LineSplitter::default();
        let lines = splitter.feed(b"ok \xFF\n");
        assert_eq!(lines.len(), 1);
        assert!(lines[0].starts_with("ok "));
    }

    #[test]
    fn reset_discards_partial_line() {
        let mut splitter = LineSplitter::default();
        splitter.feed(b"stale");
        splitter.reset();
        assert_eq!(splitter.feed(b"fresh\n"), vec!["fresh"]);
    }

    /// Every way of cutting the input into two writes yields the line once.
    #[rstest]
    #[case("\n")]
    #[case("\r\n")]
    #[case("<EOM>")]
    fn delimiter_spanning_writes(#[case] delimiter: &str) {
        let wire = format!("{MSG}{delimiter}");
        let bytes = wire.as_bytes();
        for cut in 0..=bytes.len() {
            let mut splitter = LineSplitter::new(delimiter);
            let mut lines = splitter.feed(&bytes[..cut]);
            lines.extend(splitter.feed(&bytes[cut..]));
            assert_eq!(lines, vec![MSG.to_string()], "cut at {cut}");
            assert_eq!(splitter.pending(), 0);
        }
    }

    #[test]
    fn byte_at_a_time() {
        let mut splitter = LineSplitter::new("\r\n");
        let mut lines = Vec::new();
        for b in b"alpha\r\nbeta\r\n" {
            lines.extend(splitter.feed(std::slice::from_ref(b)));
        }
        assert_eq!(lines, vec!["alpha", "beta"]);
    }

    #[test]
    fn empty_delimiter_falls_back_to_newline() {
        let mut splitter = LineSplitter::new("");
        assert_eq!(splitter.feed(b"a\nb\n"), vec!["a", "b"]);
    }
}
