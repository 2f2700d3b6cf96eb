use std::collections::BTreeMap;
use std::io::{BufRead, BufReader, Read};

use super::Value;

/// Bencode streams are buffered in chunks this size to keep syscall overhead
/// low on large metainfo files (piece arrays can run to tens of MiB).
const READ_BUFFER_CAPACITY: usize = 1024 * 1024;

#[derive(Debug, thiserror::Error, PartialEq, Eq, Clone)]
#[error("bencode parse error at offset {offset}: {reason}")]
pub struct BencodeParse {
    pub offset: u64,
    pub reason: String,
}

impl BencodeParse {
    fn at(offset: u64, reason: impl Into<String>) -> Self {
        BencodeParse {
            offset,
            reason: reason.into(),
        }
    }
}

/// Decode a complete bencode value from an in-memory byte slice.
pub fn decode(data: &[u8]) -> Result<Value, BencodeParse> {
    decode_reader(data)
}

/// Decode a complete bencode value from any byte stream.
pub fn decode_reader<R: Read>(reader: R) -> Result<Value, BencodeParse> {
    let mut cursor = Cursor {
        reader: BufReader::with_capacity(READ_BUFFER_CAPACITY, reader),
        offset: 0,
    };
    cursor.parse_value()
}

/// Tracks the running byte offset over a buffered reader so parse errors can
/// report where in the stream they occurred, mirroring `BufferedReader.tell()`
/// in the reference implementation this was derived from.
struct Cursor<R: Read> {
    reader: BufReader<R>,
    offset: u64,
}

impl<R: Read> Cursor<R> {
    fn peek_byte(&mut self) -> Result<Option<u8>, BencodeParse> {
        let buf = self
            .reader
            .fill_buf()
            .map_err(|e| BencodeParse::at(self.offset, format!("io error: {e}")))?;
        Ok(buf.first().copied())
    }

    fn read_byte(&mut self) -> Result<u8, BencodeParse> {
        match self.peek_byte()? {
            Some(b) => {
                self.reader.consume(1);
                self.offset += 1;
                Ok(b)
            }
            None => Err(BencodeParse::at(self.offset, "unexpected end of input")),
        }
    }

    fn read_exact_bytes(&mut self, len: usize) -> Result<Vec<u8>, BencodeParse> {
        let mut buf = vec![0u8; len];
        self.reader
            .read_exact(&mut buf)
            .map_err(|e| BencodeParse::at(self.offset, format!("truncated input: {e}")))?;
        self.offset += len as u64;
        Ok(buf)
    }

    fn parse_value(&mut self) -> Result<Value, BencodeParse> {
        let start = self.offset;
        match self.peek_byte()?.ok_or_else(|| {
            BencodeParse::at(start, "unexpected end of input while expecting a value")
        })? {
            b'i' => self.parse_integer().map(Value::Int),
            b'l' => self.parse_list().map(Value::List),
            b'd' => self.parse_dict().map(Value::Dict),
            b'0'..=b'9' => self.parse_byte_string().map(Value::Bytes),
            other => Err(BencodeParse::at(
                start,
                format!("unknown type sigil '{}'", other as char),
            )),
        }
    }

    fn parse_integer(&mut self) -> Result<i64, BencodeParse> {
        let start = self.offset;
        let sigil = self.read_byte()?;
        debug_assert_eq!(sigil, b'i');
        let mut digits = Vec::new();
        loop {
            let b = self.read_byte()?;
            if b == b'e' {
                break;
            }
            digits.push(b);
        }
        let text = std::str::from_utf8(&digits)
            .map_err(|_| BencodeParse::at(start, "integer is not valid ASCII"))?;
        text.parse::<i64>()
            .map_err(|_| BencodeParse::at(start, format!("malformed integer '{text}'")))
    }

    fn parse_byte_string(&mut self) -> Result<Vec<u8>, BencodeParse> {
        let start = self.offset;
        let mut digits = Vec::new();
        loop {
            let b = self.read_byte()?;
            if b == b':' {
                break;
            }
            if !b.is_ascii_digit() {
                return Err(BencodeParse::at(
                    start,
                    "non-numeric byte-string length prefix",
                ));
            }
            digits.push(b);
        }
        if digits.is_empty() {
            return Err(BencodeParse::at(start, "empty byte-string length prefix"));
        }
        let text = std::str::from_utf8(&digits).expect("digits are ASCII");
        let len: usize = text
            .parse()
            .map_err(|_| BencodeParse::at(start, format!("malformed length prefix '{text}'")))?;
        self.read_exact_bytes(len)
    }

    fn parse_list(&mut self) -> Result<Vec<Value>, BencodeParse> {
        let sigil = self.read_byte()?;
        debug_assert_eq!(sigil, b'l');
        let mut values = Vec::new();
        loop {
            match self.peek_byte()? {
                Some(b'e') => {
                    self.read_byte()?;
                    break;
                }
                Some(_) => values.push(self.parse_value()?),
                None => {
                    return Err(BencodeParse::at(self.offset, "unterminated list"));
                }
            }
        }
        Ok(values)
    }

    fn parse_dict(&mut self) -> Result<BTreeMap<Vec<u8>, Value>, BencodeParse> {
        let sigil = self.read_byte()?;
        debug_assert_eq!(sigil, b'd');
        let mut values = BTreeMap::new();
        loop {
            match self.peek_byte()? {
                Some(b'e') => {
                    self.read_byte()?;
                    break;
                }
                Some(b) if b.is_ascii_digit() => {
                    let key_start = self.offset;
                    let key = self.parse_byte_string()?;
                    if values.contains_key(&key) {
                        // Bencode permits it in principle; we keep last-write-wins
                        // semantics rather than treating it as a hard parse error.
                        let _ = key_start;
                    }
                    let value = self.parse_value()?;
                    values.insert(key, value);
                }
                Some(_) => {
                    return Err(BencodeParse::at(
                        self.offset,
                        "dict key is not a byte-string",
                    ));
                }
                None => {
                    return Err(BencodeParse::at(self.offset, "unterminated dict"));
                }
            }
        }
        Ok(values)
    }
}
