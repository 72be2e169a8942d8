//! Delimited Line Framer
//!
//! The control head writes status lines terminated by a form feed followed by
//! a carriage return. Reads from the serial port can split a line (or the
//! delimiter itself) anywhere, so bytes are accumulated across reads until a
//! full delimiter is present.

use crate::error::ProtocolError;
use tracing::trace;

/// Line delimiter used by the control head (`"\f\r"`)
pub const DEVICE_DELIMITER: &[u8] = b"\x0c\r";

/// Default limit on bytes held without seeing a delimiter (64 KiB)
pub const DEFAULT_MAX_BUFFER: usize = 64 * 1024;

/// Result of feeding one read into the framer
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Framed {
    /// Lines completed by this read, in stream order
    pub lines: Vec<String>,
    /// Set when the unframed remainder exceeds the buffer limit
    pub overflow: Option<ProtocolError>,
}

/// Reassembles complete, trimmed lines from an unbounded byte stream
#[derive(Debug, Clone)]
pub struct LineFramer {
    /// Bytes received but not yet framed
    buffer: Vec<u8>,
    /// Multi-byte line delimiter
    delimiter: Vec<u8>,
    /// Maximum bytes kept while waiting for a delimiter
    max_buffer: usize,
    /// Offset below which the buffer holds no delimiter start
    scanned: usize,
}

impl LineFramer {
    /// Create a framer with the default buffer limit
    pub fn new(delimiter: &[u8]) -> Self {
        Self::with_max_buffer(delimiter, DEFAULT_MAX_BUFFER)
    }

    /// Create a framer that holds at most `max_buffer` unframed bytes
    ///
    /// # Panics
    /// Panics if `delimiter` is empty.
    pub fn with_max_buffer(delimiter: &[u8], max_buffer: usize) -> Self {
        assert!(!delimiter.is_empty(), "line delimiter must not be empty");
        Self {
            buffer: Vec::new(),
            delimiter: delimiter.to_vec(),
            max_buffer,
            scanned: 0,
        }
    }

    /// Append freshly read bytes without framing them
    pub fn extend(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }

    /// Extract the next non-empty line, or `None` if more bytes are needed
    pub fn next_line(&mut self) -> Option<String> {
        loop {
            let start = self.scanned;
            match find(&self.buffer[start..], &self.delimiter) {
                Some(offset) => {
                    let end = start + offset;
                    let line = String::from_utf8_lossy(&self.buffer[..end])
                        .trim()
                        .to_string();
                    self.buffer.drain(..end + self.delimiter.len());
                    self.scanned = 0;

                    if line.is_empty() {
                        trace!("Discarding blank segment");
                        continue;
                    }
                    return Some(line);
                }
                None => {
                    // A delimiter may still complete across the tail, so only
                    // the bytes that cannot begin one are marked as scanned.
                    self.scanned = self
                        .buffer
                        .len()
                        .saturating_sub(self.delimiter.len() - 1);
                    return None;
                }
            }
        }
    }

    /// Append bytes and drain every complete line
    ///
    /// Lines completed by this call are always returned, even when the
    /// remainder left behind them overflows the buffer limit.
    pub fn push(&mut self, bytes: &[u8]) -> Framed {
        self.extend(bytes);

        let mut lines = Vec::new();
        while let Some(line) = self.next_line() {
            lines.push(line);
        }

        Framed {
            lines,
            overflow: self.check_capacity().err(),
        }
    }

    /// Fail if the unframed remainder exceeds the buffer limit
    pub fn check_capacity(&self) -> Result<(), ProtocolError> {
        if self.buffer.len() > self.max_buffer {
            return Err(ProtocolError::BufferOverflow {
                len: self.buffer.len(),
                limit: self.max_buffer,
            });
        }
        Ok(())
    }

    /// Bytes carried over to the next read
    pub fn pending(&self) -> &[u8] {
        &self.buffer
    }

    /// Check whether any unframed bytes are held
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Drop all unframed bytes
    pub fn clear(&mut self) {
        self.buffer.clear();
        self.scanned = 0;
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_two_lines_no_residue() {
        let mut framer = LineFramer::new(DEVICE_DELIMITER);
        let lines = framer.push(b"hello\x0c\rworld\x0c\r").lines;
        assert_eq!(lines, vec!["hello", "world"]);
        assert!(framer.is_empty());
    }

    #[test]
    fn test_needs_more_bytes() {
        let mut framer = LineFramer::new(DEVICE_DELIMITER);
        framer.extend(b"FA00014250000");
        assert_eq!(framer.next_line(), None);
        assert_eq!(framer.pending(), b"FA00014250000");
    }

    #[test]
    fn test_delimiter_split_across_reads() {
        let mut framer = LineFramer::new(DEVICE_DELIMITER);
        assert!(framer.push(b"  VFO A 14.250\x0c").lines.is_empty());
        let lines = framer.push(b"\rnext").lines;
        assert_eq!(lines, vec!["VFO A 14.250"]);
        assert_eq!(framer.pending(), b"next");
    }

    #[test]
    fn test_blank_segments_discarded() {
        let mut framer = LineFramer::new(DEVICE_DELIMITER);
        let lines = framer.push(b"\x0c\r   \x0c\r\t\n\x0c\rok\x0c\r").lines;
        assert_eq!(lines, vec!["ok"]);
    }

    #[test]
    fn test_partial_delimiter_is_not_a_boundary() {
        let mut framer = LineFramer::new(DEVICE_DELIMITER);
        let lines = framer.push(b"a\rb\x0cc\x0c\r").lines;
        // The lone CR and FF stay inside the line, only the outer edges are trimmed
        assert_eq!(lines, vec!["a\rb\x0cc"]);
    }

    #[test]
    fn test_overflow_without_delimiter() {
        let mut framer = LineFramer::with_max_buffer(DEVICE_DELIMITER, 8);
        assert_eq!(framer.push(b"12345678").overflow, None);
        let framed = framer.push(b"9");
        assert!(framed.lines.is_empty());
        assert_eq!(
            framed.overflow,
            Some(ProtocolError::BufferOverflow { len: 9, limit: 8 })
        );
        assert!(framer.check_capacity().is_err());
    }

    #[test]
    fn test_overflow_keeps_lines_completed_first() {
        let mut bytes = b"status\x0c\r".to_vec();
        bytes.extend_from_slice(&[b'x'; 9]);

        let mut whole = LineFramer::with_max_buffer(DEVICE_DELIMITER, 8);
        let framed = whole.push(&bytes);
        assert_eq!(framed.lines, vec!["status"]);
        assert_eq!(
            framed.overflow,
            Some(ProtocolError::BufferOverflow { len: 9, limit: 8 })
        );

        let mut chunked = LineFramer::with_max_buffer(DEVICE_DELIMITER, 8);
        let first = chunked.push(&bytes[..8]);
        assert_eq!(first.lines, vec!["status"]);
        assert_eq!(first.overflow, None);
        let second = chunked.push(&bytes[8..]);
        assert!(second.lines.is_empty());
        assert_eq!(second.overflow, framed.overflow);
    }

    #[test]
    fn test_overflow_counts_only_remainder() {
        let mut framer = LineFramer::with_max_buffer(DEVICE_DELIMITER, 4);
        let framed = framer.push(b"long status line\x0c\rab");
        assert_eq!(framed.lines, vec!["long status line"]);
        assert_eq!(framed.overflow, None);
        assert_eq!(framer.pending(), b"ab");
    }

    #[test]
    fn test_clear() {
        let mut framer = LineFramer::new(DEVICE_DELIMITER);
        framer.extend(b"garbage\x0c");
        framer.clear();
        assert_eq!(framer.push(b"\rline\x0c\r").lines, vec!["line"]);
    }

    fn stream_bytes() -> impl Strategy<Value = Vec<u8>> {
        prop::collection::vec(
            prop::sample::select(vec![b'a', b'Z', b'0', b' ', b'\t', b'\x0c', b'\r', b'\n', b';']),
            0..256,
        )
    }

    proptest! {
        #[test]
        fn prop_split_invariance(
            bytes in stream_bytes(),
            cuts in prop::collection::vec(any::<prop::sample::Index>(), 0..16),
        ) {
            let mut whole = LineFramer::new(DEVICE_DELIMITER);
            let expected = whole.push(&bytes).lines;

            let mut points: Vec<usize> = cuts.iter().map(|c| c.index(bytes.len() + 1)).collect();
            points.push(0);
            points.push(bytes.len());
            points.sort_unstable();

            let mut chunked = LineFramer::new(DEVICE_DELIMITER);
            let mut actual = Vec::new();
            for pair in points.windows(2) {
                actual.extend(chunked.push(&bytes[pair[0]..pair[1]]).lines);
            }

            prop_assert_eq!(actual, expected);
            prop_assert_eq!(chunked.pending(), whole.pending());
        }

        #[test]
        fn prop_straddling_delimiter_is_one_boundary(
            head in "[a-z]{1,12}",
            tail in "[a-z]{1,12}",
        ) {
            let mut framer = LineFramer::new(DEVICE_DELIMITER);
            let mut first = head.clone().into_bytes();
            first.push(b'\x0c');
            let mut second = vec![b'\r'];
            second.extend_from_slice(tail.as_bytes());
            second.extend_from_slice(DEVICE_DELIMITER);

            let mut lines = framer.push(&first).lines;
            prop_assert!(lines.is_empty());
            lines.extend(framer.push(&second).lines);
            prop_assert_eq!(lines, vec![head, tail]);
            prop_assert!(framer.is_empty());
        }
    }
}
