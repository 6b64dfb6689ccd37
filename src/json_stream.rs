//! Typed JSON record streams
//! -------------------------
//!
//! Metadata that can grow without bound (a directory listing can hold millions
//! of children) is stored as a single JSON document whose records can be read
//! one at a time:
//!
//! ```ascii
//!     {"stream":"<type tag>","entries":[
//!     {...record 0...},
//!     {...record 1...}
//!     ]}
//! ```
//!
//! The type tag says what kind of records follow, so a reader can refuse a
//! stream of the wrong kind before parsing any record. Each record is framed by
//! matching braces (honouring JSON strings and escapes) and then handed to
//! `serde_json` on its own, so only one record is buffered at a time.
use std::io::{self, BufRead, Write};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::trace;

use crate::error::{Error, Result};
use crate::options::DEFAULT_MAX_RECORD_SIZE;

const STREAM_KEY: &str = "stream";
const ENTRIES_KEY: &str = "entries";

// Header strings (keys and the type tag) are short; anything longer is garbage.
const MAX_HEADER_STRING: usize = 4096;

pub struct JsonStreamReader<R> {
    reader: R,
    max_record_size: usize,
    first: bool,
    finished: bool,
}

impl<R: BufRead> JsonStreamReader<R> {
    /// Consume the stream header and check its type tag against `stream_type`.
    pub fn new(reader: R, stream_type: &str) -> Result<Self> {
        Self::with_max_record_size(reader, stream_type, DEFAULT_MAX_RECORD_SIZE)
    }

    pub fn with_max_record_size(
        reader: R,
        stream_type: &str,
        max_record_size: usize,
    ) -> Result<Self> {
        let mut stream = JsonStreamReader {
            reader,
            max_record_size,
            first: true,
            finished: false,
        };
        stream.read_header(stream_type)?;
        Ok(stream)
    }

    /// Read the next record, or `None` once the entries array is closed.
    pub fn read<T: DeserializeOwned>(&mut self) -> Result<Option<T>> {
        if self.finished {
            return Ok(None);
        }

        self.skip_whitespace()?;
        if self.first {
            self.first = false;
            if self.peek()? == Some(b']') {
                self.consume(1);
                return self.finish();
            }
        } else {
            match self.next_byte()? {
                Some(b',') => {}
                Some(b']') => return self.finish(),
                Some(b) => {
                    return Err(Error::InvalidFormat(format!(
                        "expected ',' or ']' between records, got '{}'",
                        b as char
                    )))
                }
                None => return Err(Error::UnexpectedEof),
            }
            self.skip_whitespace()?;
        }

        let record = self.frame_object()?;
        Ok(Some(serde_json::from_slice(&record)?))
    }

    fn read_header(&mut self, stream_type: &str) -> Result<()> {
        self.expect_byte(b'{')?;
        self.expect_key(STREAM_KEY)?;

        self.skip_whitespace()?;
        let actual = self.read_string()?;
        if actual != stream_type {
            return Err(Error::UnexpectedStreamType {
                expected: stream_type.to_string(),
                actual,
            });
        }

        self.expect_byte(b',')?;
        self.expect_key(ENTRIES_KEY)?;
        self.expect_byte(b'[')?;
        trace!(stream_type, "accepted stream header");
        Ok(())
    }

    // Entries array is closed; only the document's closing brace may follow.
    fn finish<T>(&mut self) -> Result<Option<T>> {
        self.expect_byte(b'}')?;
        self.skip_whitespace()?;
        if let Some(b) = self.peek()? {
            return Err(Error::InvalidFormat(format!(
                "trailing data after stream: '{}'",
                b as char
            )));
        }
        self.finished = true;
        Ok(None)
    }

    fn expect_key(&mut self, key: &str) -> Result<()> {
        self.skip_whitespace()?;
        let actual = self.read_string()?;
        if actual != key {
            return Err(Error::InvalidFormat(format!(
                "expected key '{key}', got '{actual}'"
            )));
        }
        self.expect_byte(b':')
    }

    fn expect_byte(&mut self, expected: u8) -> Result<()> {
        self.skip_whitespace()?;
        match self.next_byte()? {
            Some(b) if b == expected => Ok(()),
            Some(b) => Err(Error::InvalidFormat(format!(
                "expected '{}', got '{}'",
                expected as char, b as char
            ))),
            None => Err(Error::InvalidFormat(format!(
                "unexpected end of stream, expected '{}'",
                expected as char
            ))),
        }
    }

    fn read_string(&mut self) -> Result<String> {
        if self.next_byte()? != Some(b'"') {
            return Err(Error::InvalidFormat("expected a string".to_string()));
        }

        let mut raw = vec![b'"'];
        let mut escaped = false;
        loop {
            let b = match self.next_byte()? {
                Some(b) => b,
                None => {
                    return Err(Error::InvalidFormat(
                        "unterminated string in stream header".to_string(),
                    ))
                }
            };
            raw.push(b);
            if raw.len() > MAX_HEADER_STRING {
                return Err(Error::InvalidFormat(
                    "stream header string too long".to_string(),
                ));
            }
            match (escaped, b) {
                (true, _) => escaped = false,
                (false, b'\\') => escaped = true,
                (false, b'"') => break,
                _ => {}
            }
        }

        serde_json::from_slice(&raw)
            .map_err(|e| Error::InvalidFormat(format!("bad string in stream header: {e}")))
    }

    // Copies one complete `{...}` object into a buffer, chunk by chunk.
    fn frame_object(&mut self) -> Result<Vec<u8>> {
        match self.peek()? {
            Some(b'{') => {}
            Some(b) => {
                return Err(Error::InvalidFormat(format!(
                    "expected record object, got '{}'",
                    b as char
                )))
            }
            None => return Err(Error::UnexpectedEof),
        }

        let mut record = Vec::new();
        let mut depth = 0usize;
        let mut in_string = false;
        let mut escaped = false;

        loop {
            let chunk = self.fill()?;
            if chunk.is_empty() {
                return Err(Error::UnexpectedEof);
            }

            let mut used = 0;
            let mut done = false;
            for &b in chunk {
                used += 1;
                if in_string {
                    match (escaped, b) {
                        (true, _) => escaped = false,
                        (false, b'\\') => escaped = true,
                        (false, b'"') => in_string = false,
                        _ => {}
                    }
                    continue;
                }
                match b {
                    b'"' => in_string = true,
                    b'{' | b'[' => depth += 1,
                    b'}' | b']' => {
                        depth -= 1;
                        if depth == 0 {
                            done = true;
                            break;
                        }
                    }
                    _ => {}
                }
            }

            record.extend_from_slice(&chunk[..used]);
            self.reader.consume(used);

            if record.len() > self.max_record_size {
                return Err(Error::InvalidFormat(format!(
                    "record exceeds {} bytes",
                    self.max_record_size
                )));
            }
            if done {
                return Ok(record);
            }
        }
    }

    fn skip_whitespace(&mut self) -> Result<()> {
        loop {
            let chunk = self.fill()?;
            if chunk.is_empty() {
                return Ok(());
            }
            let skipped = chunk
                .iter()
                .take_while(|b| b.is_ascii_whitespace())
                .count();
            let exhausted = skipped == chunk.len();
            self.reader.consume(skipped);
            if !exhausted {
                return Ok(());
            }
        }
    }

    // fill_buf, retried when a signal interrupts the underlying read. The
    // second fill_buf only hands back what is already buffered.
    fn fill(&mut self) -> Result<&[u8]> {
        loop {
            match self.reader.fill_buf() {
                Ok(buf) if buf.is_empty() => return Ok(&[]),
                Ok(_) => break,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Ok(self.reader.fill_buf()?)
    }

    fn peek(&mut self) -> Result<Option<u8>> {
        Ok(self.fill()?.first().copied())
    }

    fn next_byte(&mut self) -> Result<Option<u8>> {
        let b = self.peek()?;
        if b.is_some() {
            self.consume(1);
        }
        Ok(b)
    }

    fn consume(&mut self, amount: usize) {
        self.reader.consume(amount);
    }
}

pub struct JsonStreamWriter<W: Write> {
    writer: W,
    first: bool,
}

impl<W: Write> JsonStreamWriter<W> {
    /// Write the stream header declaring `stream_type`.
    pub fn new(mut writer: W, stream_type: &str) -> Result<Self> {
        write!(
            writer,
            "{{\"{STREAM_KEY}\":{},\"{ENTRIES_KEY}\":[",
            serde_json::to_string(stream_type)?
        )?;
        Ok(JsonStreamWriter {
            writer,
            first: true,
        })
    }

    pub fn write<T: Serialize>(&mut self, record: &T) -> Result<()> {
        let separator: &[u8] = if self.first { b"\n" } else { b",\n" };
        self.first = false;
        self.writer.write_all(separator)?;
        serde_json::to_writer(&mut self.writer, record)?;
        Ok(())
    }

    /// Close the entries array and hand back the underlying writer.
    pub fn finalize(mut self) -> Result<W> {
        self.writer.write_all(b"\n]}")?;
        self.writer.flush()?;
        Ok(self.writer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use std::io::{BufReader, Cursor, Read};

    #[derive(Debug, PartialEq, Deserialize, Serialize)]
    struct Item {
        name: String,
    }

    fn open(data: &str) -> Result<JsonStreamReader<Cursor<&[u8]>>> {
        JsonStreamReader::new(Cursor::new(data.as_bytes()), "test:items")
    }

    #[test]
    fn test_read_records() {
        let mut r = open(
            r#" { "stream" : "test:items", "entries" : [ {"name":"a"} , {"name":"b}{\"x"} ] } "#,
        )
        .unwrap();
        assert_eq!(r.read::<Item>().unwrap().unwrap().name, "a");
        assert_eq!(r.read::<Item>().unwrap().unwrap().name, "b}{\"x");
        assert!(r.read::<Item>().unwrap().is_none());
        assert!(r.read::<Item>().unwrap().is_none());
    }

    #[test]
    fn test_empty_entries() {
        let mut r = open(r#"{"stream":"test:items","entries":[]}"#).unwrap();
        assert!(r.read::<Item>().unwrap().is_none());
    }

    #[test]
    fn test_wrong_stream_type() {
        let err = open(r#"{"stream":"other","entries":[]}"#).err().unwrap();
        assert_eq!(err.kind(), ErrorKind::Format);
        assert!(matches!(err, Error::UnexpectedStreamType { .. }));
    }

    #[test]
    fn test_bad_header() {
        for data in [
            "",
            "[]",
            r#"{"entries":[]}"#,
            r#"{"stream":"test:items"}"#,
            r#"{"stream":"test:items","entries":{}}"#,
            r#"{"stream":"test:items"#,
        ] {
            let err = open(data).err().unwrap();
            assert_eq!(err.kind(), ErrorKind::Format, "{data:?}");
        }
    }

    #[test]
    fn test_bad_framing_between_records() {
        let mut r =
            open(r#"{"stream":"test:items","entries":[{"name":"a"} {"name":"b"}]}"#).unwrap();
        r.read::<Item>().unwrap();
        assert_eq!(r.read::<Item>().err().unwrap().kind(), ErrorKind::Format);

        let mut r = open(r#"{"stream":"test:items","entries":[1]}"#).unwrap();
        assert_eq!(r.read::<Item>().err().unwrap().kind(), ErrorKind::Format);

        let mut r = open(r#"{"stream":"test:items","entries":[]} junk"#).unwrap();
        assert_eq!(r.read::<Item>().err().unwrap().kind(), ErrorKind::Format);
    }

    #[test]
    fn test_truncated_record() {
        let mut r = open(r#"{"stream":"test:items","entries":[{"name":"a"#).unwrap();
        let err = r.read::<Item>().err().unwrap();
        assert!(matches!(err, Error::UnexpectedEof));
        assert_eq!(err.kind(), ErrorKind::Decode);
    }

    #[test]
    fn test_malformed_record() {
        let mut r = open(r#"{"stream":"test:items","entries":[{"name":5}]}"#).unwrap();
        let err = r.read::<Item>().err().unwrap();
        assert!(matches!(err, Error::JsonError(_)));
    }

    #[test]
    fn test_record_size_limit() {
        let data = r#"{"stream":"test:items","entries":[{"name":"abcdefghijklmnop"}]}"#;
        let mut r =
            JsonStreamReader::with_max_record_size(Cursor::new(data.as_bytes()), "test:items", 8)
                .unwrap();
        assert!(matches!(r.read::<Item>(), Err(Error::InvalidFormat(_))));
    }

    #[test]
    fn test_small_buffer_reads() {
        let data = r#"{"stream":"test:items","entries":[{"name":"first"},{"name":"second"}]}"#;
        let reader = BufReader::with_capacity(1, data.as_bytes());
        let mut r = JsonStreamReader::new(reader, "test:items").unwrap();
        assert_eq!(r.read::<Item>().unwrap().unwrap().name, "first");
        assert_eq!(r.read::<Item>().unwrap().unwrap().name, "second");
        assert!(r.read::<Item>().unwrap().is_none());
    }

    // Yields one byte per read, failing with `Interrupted` before each one.
    struct Flaky<'a> {
        data: &'a [u8],
        interrupt: bool,
    }

    impl Read for Flaky<'_> {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            self.interrupt = !self.interrupt;
            if self.interrupt {
                return Err(io::Error::new(io::ErrorKind::Interrupted, "signal"));
            }
            if self.data.is_empty() || buf.is_empty() {
                return Ok(0);
            }
            buf[0] = self.data[0];
            self.data = &self.data[1..];
            Ok(1)
        }
    }

    #[test]
    fn test_interrupted_reads_are_retried() {
        let data = r#"{"stream":"test:items","entries":[{"name":"a"},{"name":"b"}]}"#;
        let reader = BufReader::with_capacity(
            4,
            Flaky {
                data: data.as_bytes(),
                interrupt: false,
            },
        );
        let mut r = JsonStreamReader::new(reader, "test:items").unwrap();
        assert_eq!(r.read::<Item>().unwrap().unwrap().name, "a");
        assert_eq!(r.read::<Item>().unwrap().unwrap().name, "b");
        assert!(r.read::<Item>().unwrap().is_none());
    }

    #[test]
    fn test_writer_output_reads_back() {
        let mut w = JsonStreamWriter::new(Vec::new(), "test:items").unwrap();
        w.write(&Item { name: "x".into() }).unwrap();
        w.write(&Item { name: "y".into() }).unwrap();
        let bytes = w.finalize().unwrap();
        assert_eq!(
            String::from_utf8(bytes.clone()).unwrap(),
            "{\"stream\":\"test:items\",\"entries\":[\n{\"name\":\"x\"},\n{\"name\":\"y\"}\n]}"
        );

        let mut r = JsonStreamReader::new(Cursor::new(&bytes[..]), "test:items").unwrap();
        assert_eq!(r.read::<Item>().unwrap(), Some(Item { name: "x".into() }));
        assert_eq!(r.read::<Item>().unwrap(), Some(Item { name: "y".into() }));
        assert_eq!(r.read::<Item>().unwrap(), None);
    }
}
