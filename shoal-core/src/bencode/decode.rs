//! Bencode decoding and raw-span lookup.

use std::collections::BTreeMap;
use std::ops::Range;

use bytes::Bytes;

use super::{BencodeError, MAX_DEPTH, Value};

/// Decodes a complete bencode value from `data`.
///
/// # Errors
///
/// - `BencodeError::UnexpectedEof` - Truncated input or unterminated container
/// - `BencodeError::InvalidLength` - Non-numeric byte string length prefix
/// - `BencodeError::InvalidInteger` - Malformed integer body
/// - `BencodeError::TrailingData` - Bytes left over after the value
pub fn decode(data: &[u8]) -> Result<Value, BencodeError> {
    let mut decoder = Decoder::new(data);
    let value = decoder.value(0)?;
    decoder.finish()?;
    Ok(value)
}

/// Returns the exact source bytes of `key`'s value in a top-level dictionary.
///
/// The whole input is validated; `Ok(None)` means the document is a valid
/// dictionary without that key.
///
/// # Errors
///
/// - `BencodeError::UnexpectedChar` - Root value is not a dictionary
/// - Any error `decode` would report for the same input
pub fn dict_entry_bytes<'a>(data: &'a [u8], key: &[u8]) -> Result<Option<&'a [u8]>, BencodeError> {
    let mut decoder = Decoder::new(data);
    let span = decoder.dict_entry_span(key)?;
    decoder.finish()?;
    Ok(span.map(|range| &data[range]))
}

struct Decoder<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Decoder<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn finish(&self) -> Result<(), BencodeError> {
        if self.pos != self.data.len() {
            return Err(BencodeError::TrailingData { position: self.pos });
        }
        Ok(())
    }

    fn peek(&self) -> Result<u8, BencodeError> {
        self.data
            .get(self.pos)
            .copied()
            .ok_or(BencodeError::UnexpectedEof { position: self.pos })
    }

    fn value(&mut self, depth: usize) -> Result<Value, BencodeError> {
        if depth > MAX_DEPTH {
            return Err(BencodeError::NestingTooDeep);
        }

        match self.peek()? {
            b'i' => self.integer(),
            b'l' => self.list(depth),
            b'd' => self.dict(depth),
            b'0'..=b'9' => self.bytes().map(Value::Bytes),
            other => Err(BencodeError::UnexpectedChar {
                position: self.pos,
                found: other as char,
            }),
        }
    }

    /// Scans forward to `terminator`, returning the skipped slice.
    fn take_until(&mut self, terminator: u8) -> Result<&'a [u8], BencodeError> {
        let start = self.pos;
        let offset = self.data[start..]
            .iter()
            .position(|&b| b == terminator)
            .ok_or(BencodeError::UnexpectedEof {
                position: self.data.len(),
            })?;
        self.pos = start + offset + 1;
        Ok(&self.data[start..start + offset])
    }

    fn integer(&mut self) -> Result<Value, BencodeError> {
        let position = self.pos;
        self.pos += 1;
        let digits = self.take_until(b'e')?;

        let invalid = |reason: &str| BencodeError::InvalidInteger {
            position,
            reason: reason.to_string(),
        };

        let text = std::str::from_utf8(digits).map_err(|_| invalid("not ASCII"))?;
        let magnitude = text.strip_prefix('-').unwrap_or(text);
        if magnitude.is_empty() {
            return Err(invalid("empty"));
        }
        if !magnitude.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid(text));
        }
        if text.starts_with("-0") || (text.starts_with('0') && text.len() > 1) {
            return Err(invalid("leading zero"));
        }

        text.parse::<i64>()
            .map(Value::Integer)
            .map_err(|_| invalid(text))
    }

    fn bytes(&mut self) -> Result<Bytes, BencodeError> {
        let position = self.pos;
        let prefix = self.take_until(b':')?;

        let len: usize = std::str::from_utf8(prefix)
            .ok()
            .filter(|text| text.bytes().all(|b| b.is_ascii_digit()))
            .and_then(|text| text.parse().ok())
            .ok_or(BencodeError::InvalidLength { position })?;

        let end = self
            .pos
            .checked_add(len)
            .filter(|&end| end <= self.data.len())
            .ok_or(BencodeError::UnexpectedEof {
                position: self.data.len(),
            })?;

        let bytes = Bytes::copy_from_slice(&self.data[self.pos..end]);
        self.pos = end;
        Ok(bytes)
    }

    fn list(&mut self, depth: usize) -> Result<Value, BencodeError> {
        self.pos += 1;
        let mut items = Vec::new();
        while self.peek()? != b'e' {
            items.push(self.value(depth + 1)?);
        }
        self.pos += 1;
        Ok(Value::List(items))
    }

    fn dict(&mut self, depth: usize) -> Result<Value, BencodeError> {
        self.pos += 1;
        let mut entries = BTreeMap::new();
        while self.peek()? != b'e' {
            let key = self.key()?;
            let value = self.value(depth + 1)?;
            entries.insert(key, value);
        }
        self.pos += 1;
        Ok(Value::Dict(entries))
    }

    fn key(&mut self) -> Result<Bytes, BencodeError> {
        match self.peek()? {
            b'0'..=b'9' => self.bytes(),
            _ => Err(BencodeError::NonStringKey { position: self.pos }),
        }
    }

    fn dict_entry_span(&mut self, wanted: &[u8]) -> Result<Option<Range<usize>>, BencodeError> {
        let root = self.peek()?;
        if root != b'd' {
            return Err(BencodeError::UnexpectedChar {
                position: self.pos,
                found: root as char,
            });
        }

        self.pos += 1;
        let mut span = None;
        while self.peek()? != b'e' {
            let key = self.key()?;
            let start = self.pos;
            self.value(1)?;
            if key.as_ref() == wanted {
                span = Some(start..self.pos);
            }
        }
        self.pos += 1;
        Ok(span)
    }
}
