/*!
 * Candidate Codec
 * Fixed-width framing shared by every pipe in the chain
 *
 * A candidate travels as exactly `WORD_WIDTH` little-endian bytes with no
 * length prefix or delimiter. End-of-stream is the only terminator.
 */

use super::types::PipeError;
use crate::core::limits::WORD_WIDTH;
use crate::core::types::Candidate;
use std::io::{ErrorKind, Read, Write};

#[inline]
pub fn encode(value: Candidate) -> [u8; WORD_WIDTH] {
    value.to_le_bytes()
}

#[inline]
pub fn decode(bytes: [u8; WORD_WIDTH]) -> Candidate {
    Candidate::from_le_bytes(bytes)
}

/// Read one candidate.
///
/// Returns `Ok(None)` when the stream ends on a word boundary and
/// `PipeError::ShortRead` when it ends inside a word.
pub fn read_candidate<R: Read>(reader: &mut R) -> Result<Option<Candidate>, PipeError> {
    let mut buf = [0u8; WORD_WIDTH];
    let mut filled = 0;

    while filled < WORD_WIDTH {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(PipeError::Io(e)),
        }
    }

    match filled {
        0 => Ok(None),
        WORD_WIDTH => Ok(Some(decode(buf))),
        got => Err(PipeError::ShortRead {
            got,
            expected: WORD_WIDTH,
        }),
    }
}

/// Write one candidate as a single word
pub fn write_candidate<W: Write>(writer: &mut W, value: Candidate) -> Result<(), PipeError> {
    writer
        .write_all(&encode(value))
        .map_err(PipeError::from_write)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{self, Cursor};

    #[test]
    fn test_little_endian_layout() {
        assert_eq!(encode(0x0102_0304), [0x04, 0x03, 0x02, 0x01]);
        assert_eq!(decode([0x23, 0, 0, 0]), 35);
    }

    #[test]
    fn test_stream_of_words() {
        let mut bytes = Vec::new();
        for v in [2, 3, 5, 7] {
            write_candidate(&mut bytes, v).unwrap();
        }
        assert_eq!(bytes.len(), 4 * WORD_WIDTH);

        let mut cursor = Cursor::new(bytes);
        let mut seen = Vec::new();
        while let Some(v) = read_candidate(&mut cursor).unwrap() {
            seen.push(v);
        }
        assert_eq!(seen, vec![2, 3, 5, 7]);
    }

    #[test]
    fn test_empty_stream_is_end() {
        let mut cursor = Cursor::new(Vec::<u8>::new());
        assert!(read_candidate(&mut cursor).unwrap().is_none());
    }

    #[test]
    fn test_truncated_word_is_short_read() {
        let mut cursor = Cursor::new(vec![7u8, 0, 0]);
        let err = read_candidate(&mut cursor).unwrap_err();
        assert!(matches!(err, PipeError::ShortRead { got: 3, expected: 4 }));
    }

    /// Hands out one byte per call and fails with EINTR in between
    struct Trickle {
        bytes: Vec<u8>,
        pos: usize,
        interrupt_next: bool,
    }

    impl Read for Trickle {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if self.interrupt_next {
                self.interrupt_next = false;
                return Err(io::Error::from(ErrorKind::Interrupted));
            }
            self.interrupt_next = true;
            if self.pos == self.bytes.len() || buf.is_empty() {
                return Ok(0);
            }
            buf[0] = self.bytes[self.pos];
            self.pos += 1;
            Ok(1)
        }
    }

    #[test]
    fn test_word_reassembled_across_partial_reads() {
        let mut reader = Trickle {
            bytes: encode(1_000_003).to_vec(),
            pos: 0,
            interrupt_next: false,
        };
        assert_eq!(read_candidate(&mut reader).unwrap(), Some(1_000_003));
        assert!(read_candidate(&mut reader).unwrap().is_none());
    }
}
