//! Incremental decoder for run output streams
//!
//! Bytes arrive in chunks that have nothing to do with record boundaries.
//! The decoder keeps the unterminated tail between calls, splits on `\n`,
//! and turns every complete record into a [`StreamEvent`]. Its output depends
//! only on the byte sequence, never on where the chunks were split.

mod record;

use a2abase_core::run::StreamEvent;
use a2abase_core::{Error, Result};

pub use record::decode_record;

/// Longest record accepted before the stream is declared undecodable.
pub const DEFAULT_MAX_RECORD_LEN: usize = 1024 * 1024;

const DELIMITER: u8 = b'\n';

#[derive(Debug)]
pub struct StreamDecoder {
    buffer: Vec<u8>,
    max_record_len: usize,
    failed: bool,
}

impl Default for StreamDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamDecoder {
    pub fn new() -> Self {
        Self::with_max_record_len(DEFAULT_MAX_RECORD_LEN)
    }

    pub fn with_max_record_len(max_record_len: usize) -> Self {
        Self {
            buffer: Vec::new(),
            max_record_len: max_record_len.max(1),
            failed: false,
        }
    }

    /// Feed a chunk, appending every event it completes to `out`.
    ///
    /// A malformed record becomes an error event and decoding carries on. A
    /// record longer than the limit cannot be resynchronised: events before
    /// it are still appended, then `Err(Decode)` is returned and every later
    /// call fails the same way.
    pub fn feed(&mut self, chunk: &[u8], out: &mut Vec<StreamEvent>) -> Result<()> {
        if self.failed {
            return Err(self.overflow_error());
        }
        self.buffer.extend_from_slice(chunk);

        let mut start = 0;
        while let Some(offset) = self.buffer[start..].iter().position(|b| *b == DELIMITER) {
            let end = start + offset;
            if end - start > self.max_record_len {
                return Err(self.fail());
            }
            if let Some(event) = decode_record(&self.buffer[start..end]) {
                out.push(event);
            }
            start = end + 1;
        }
        self.buffer.drain(..start);

        if self.buffer.len() > self.max_record_len {
            return Err(self.fail());
        }
        Ok(())
    }

    /// Decode a trailing record that never got its delimiter.
    pub fn finish(&mut self, out: &mut Vec<StreamEvent>) -> Result<()> {
        if self.failed {
            return Err(self.overflow_error());
        }
        let tail = std::mem::take(&mut self.buffer);
        if let Some(event) = decode_record(&tail) {
            out.push(event);
        }
        Ok(())
    }

    /// Bytes held back waiting for a delimiter
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    /// Decode a complete byte sequence in one go.
    pub fn decode_all(input: &[u8]) -> Result<Vec<StreamEvent>> {
        let mut decoder = Self::new();
        let mut events = Vec::new();
        decoder.feed(input, &mut events)?;
        decoder.finish(&mut events)?;
        Ok(events)
    }

    fn fail(&mut self) -> Error {
        self.failed = true;
        self.buffer.clear();
        self.overflow_error()
    }

    fn overflow_error(&self) -> Error {
        Error::decode(format!(
            "record exceeds {} bytes without a delimiter; cannot resynchronise",
            self.max_record_len
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use a2abase_core::run::{ErrorOrigin, RunStatusUpdate};

    fn feed_chunks(chunks: &[&[u8]]) -> Vec<StreamEvent> {
        let mut decoder = StreamDecoder::new();
        let mut events = Vec::new();
        for chunk in chunks {
            decoder.feed(chunk, &mut events).unwrap();
        }
        decoder.finish(&mut events).unwrap();
        events
    }

    #[test]
    fn test_two_chunk_shorthand_stream() {
        let events = feed_chunks(&[b"tok:hi\ntok:the", b"re\nstatus:done\n"]);
        assert_eq!(
            events,
            vec![
                StreamEvent::token("hi"),
                StreamEvent::token("there"),
                StreamEvent::status(RunStatusUpdate::Completed),
            ]
        );
    }

    #[test]
    fn test_partial_record_is_held_back() {
        let mut decoder = StreamDecoder::new();
        let mut events = Vec::new();
        decoder.feed(b"tok:par", &mut events).unwrap();
        assert!(events.is_empty());
        assert_eq!(decoder.pending(), 7);

        decoder.feed(b"tial\n", &mut events).unwrap();
        assert_eq!(events, vec![StreamEvent::token("partial")]);
        assert_eq!(decoder.pending(), 0);
    }

    #[test]
    fn test_every_split_point_decodes_identically() {
        let input = concat!(
            "data: {\"type\":\"status\",\"status\":\"running\"}\r\n",
            "\n",
            ": keepalive\n",
            "tok:héllo wörld\n",
            "data: {\"type\":\"tool_call\",\"name\":\"sb_files_tool\",\"arguments\":{\"path\":\"/\"}}\n",
            "data: {not json}\n",
            "tool_result:{\"files\":[\"a.txt\"]}\n",
            "tok: ✓ done\n",
            "status:completed"
        )
        .as_bytes();

        let expected = StreamDecoder::decode_all(input).unwrap();
        assert_eq!(expected.len(), 7);

        for split in 0..=input.len() {
            let (a, b) = input.split_at(split);
            assert_eq!(feed_chunks(&[a, b]), expected, "split at {}", split);
        }

        let one_byte: Vec<&[u8]> = input.chunks(1).collect();
        assert_eq!(feed_chunks(&one_byte), expected);
    }

    #[test]
    fn test_malformed_record_does_not_stop_decoding() {
        let events = feed_chunks(&[b"tok:a\nbogus_kind:zzz\ntok:b\n"]);
        assert_eq!(events.len(), 3);
        assert_eq!(events[0], StreamEvent::token("a"));
        match &events[1] {
            StreamEvent::Error { origin, raw, .. } => {
                assert_eq!(*origin, ErrorOrigin::Decode);
                assert_eq!(raw.as_deref(), Some("bogus_kind:zzz"));
            }
            other => panic!("Expected decode error, got {:?}", other),
        }
        assert_eq!(events[2], StreamEvent::token("b"));
    }

    #[test]
    fn test_invalid_utf8_is_a_malformed_record() {
        let events = feed_chunks(&[b"tok:\xff\xfe\n", b"tok:ok\n"]);
        assert!(matches!(
            events[0],
            StreamEvent::Error { origin: ErrorOrigin::Decode, .. }
        ));
        assert_eq!(events[1], StreamEvent::token("ok"));
    }

    #[test]
    fn test_oversized_record_fails_the_stream() {
        let mut decoder = StreamDecoder::with_max_record_len(16);
        let mut events = Vec::new();

        decoder.feed(b"tok:fine\n", &mut events).unwrap();
        let err = decoder.feed(&[b'a'; 32], &mut events).unwrap_err();
        assert!(matches!(err, Error::Decode(_)));
        assert_eq!(events, vec![StreamEvent::token("fine")]);

        assert!(decoder.feed(b"\ntok:late\n", &mut events).is_err());
        assert!(decoder.finish(&mut events).is_err());
    }

    #[test]
    fn test_oversized_record_fails_regardless_of_delimiter_position() {
        let mut whole = b"tok:ok\n".to_vec();
        whole.extend_from_slice(&[b'a'; 32]);
        whole.push(b'\n');

        let mut decoder = StreamDecoder::with_max_record_len(16);
        let mut events = Vec::new();
        assert!(decoder.feed(&whole, &mut events).is_err());
        assert_eq!(events, vec![StreamEvent::token("ok")]);
    }

    #[test]
    fn test_empty_input() {
        assert!(StreamDecoder::decode_all(b"").unwrap().is_empty());
        assert!(StreamDecoder::decode_all(b"\n\n\r\n").unwrap().is_empty());
    }
}
