//! Decoded bencode values and typed accessors.

use std::collections::BTreeMap;

use bytes::Bytes;

/// A decoded bencode value.
///
/// Dictionaries are kept in a `BTreeMap` so iteration, and therefore
/// encoding, always follows ascending key order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    /// Signed 64-bit integer.
    Integer(i64),
    /// Byte string, not necessarily UTF-8.
    Bytes(Bytes),
    /// Ordered list of values.
    List(Vec<Value>),
    /// Dictionary keyed by byte strings.
    Dict(BTreeMap<Bytes, Value>),
}

impl Value {
    /// Creates a byte string value from UTF-8 text.
    pub fn string(s: &str) -> Self {
        Value::Bytes(Bytes::copy_from_slice(s.as_bytes()))
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Returns the integer if it is non-negative.
    pub fn as_u64(&self) -> Option<u64> {
        self.as_integer().and_then(|i| u64::try_from(i).ok())
    }

    pub fn as_bytes(&self) -> Option<&Bytes> {
        match self {
            Value::Bytes(b) => Some(b),
            _ => None,
        }
    }

    /// Returns the byte string as text when it is valid UTF-8.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Bytes(b) => std::str::from_utf8(b).ok(),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&Vec<Value>> {
        match self {
            Value::List(l) => Some(l),
            _ => None,
        }
    }

    pub fn as_dict(&self) -> Option<&BTreeMap<Bytes, Value>> {
        match self {
            Value::Dict(d) => Some(d),
            _ => None,
        }
    }

    /// Looks up `key` when this value is a dictionary.
    pub fn get(&self, key: &[u8]) -> Option<&Value> {
        self.as_dict()?.get(key)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Integer(i)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::string(s)
    }
}

impl From<Bytes> for Value {
    fn from(b: Bytes) -> Self {
        Value::Bytes(b)
    }
}

impl From<Vec<Value>> for Value {
    fn from(l: Vec<Value>) -> Self {
        Value::List(l)
    }
}

impl From<BTreeMap<Bytes, Value>> for Value {
    fn from(d: BTreeMap<Bytes, Value>) -> Self {
        Value::Dict(d)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_as_u64_rejects_negative() {
        assert_eq!(Value::Integer(7).as_u64(), Some(7));
        assert_eq!(Value::Integer(-1).as_u64(), None);
        assert_eq!(Value::string("7").as_u64(), None);
    }

    #[test]
    fn test_as_str_rejects_invalid_utf8() {
        let value = Value::Bytes(Bytes::from_static(&[0xFF, 0xFE]));
        assert_eq!(value.as_str(), None);
        assert_eq!(value.as_bytes().map(|b| b.len()), Some(2));
    }

    #[test]
    fn test_get_on_non_dictionary() {
        assert_eq!(Value::Integer(1).get(b"key"), None);
    }
}
