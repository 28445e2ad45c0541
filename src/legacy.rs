//! Decoder for the serialized-array bodies served by Vimeo's deprecated
//! `api/v2` endpoints (`/video/{id}.php`).
//!
//! The format is PHP's `serialize()` output. Only the subset those endpoints
//! emit is understood: null, booleans, integers, doubles, strings, arrays and
//! plain objects. Everything is decoded into [`serde_json::Value`] so callers
//! can treat both remote paths the same way. Keep this module self-contained;
//! when the endpoint goes away it can be deleted along with the direct path.

use serde_json::{Map, Number, Value};
use thiserror::Error;

/// Deepest array/object nesting accepted, matching serde_json's recursion
/// limit.
const MAX_DEPTH: usize = 128;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LegacyError {
    #[error("unexpected end of input at byte {0}")]
    Eof(usize),
    #[error("unexpected byte {found:?} at {pos}, expected {expected}")]
    Unexpected {
        pos: usize,
        found: char,
        expected: &'static str,
    },
    #[error("invalid number {raw:?} at byte {pos}")]
    InvalidNumber { pos: usize, raw: String },
    #[error("string at byte {0} is not valid UTF-8")]
    InvalidUtf8(usize),
    #[error("array key at byte {0} is neither an integer nor a string")]
    InvalidKey(usize),
    #[error("nesting deeper than 128 levels at byte {0}")]
    TooDeep(usize),
}

/// Decodes one serialized value from the start of `input`. Trailing bytes are
/// ignored.
pub fn parse(input: &str) -> Result<Value, LegacyError> {
    Parser::new(input.as_bytes()).value()
}

/// Returns the first record of a decoded list response, which is where the
/// direct endpoint puts the requested video.
pub fn first_record(value: &Value) -> Option<&Map<String, Value>> {
    match value {
        Value::Array(items) => items.first().and_then(Value::as_object),
        Value::Object(map) => map.get("0").and_then(Value::as_object),
        _ => None,
    }
}

enum Key {
    Index(i64),
    Name(String),
}

impl Key {
    fn into_string(self) -> String {
        match self {
            Key::Index(index) => index.to_string(),
            Key::Name(name) => name,
        }
    }
}

struct Parser<'a> {
    bytes: &'a [u8],
    pos: usize,
    depth: usize,
}

impl<'a> Parser<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self {
            bytes,
            pos: 0,
            depth: 0,
        }
    }

    fn value(&mut self) -> Result<Value, LegacyError> {
        let start = self.pos;
        match self.next_byte()? {
            b'N' => {
                self.expect(b';')?;
                Ok(Value::Null)
            }
            b'b' => {
                self.expect(b':')?;
                match self.until(b';')? {
                    "0" => Ok(Value::Bool(false)),
                    "1" => Ok(Value::Bool(true)),
                    raw => Err(LegacyError::InvalidNumber {
                        pos: start,
                        raw: raw.to_string(),
                    }),
                }
            }
            b'i' => {
                self.expect(b':')?;
                let raw = self.until(b';')?;
                raw.parse::<i64>()
                    .map(Value::from)
                    .map_err(|_| LegacyError::InvalidNumber {
                        pos: start,
                        raw: raw.to_string(),
                    })
            }
            b'd' => {
                self.expect(b':')?;
                let raw = self.until(b';')?;
                let number = raw.parse::<f64>().map_err(|_| LegacyError::InvalidNumber {
                    pos: start,
                    raw: raw.to_string(),
                })?;
                // INF and NAN have no JSON representation.
                Ok(Number::from_f64(number).map_or(Value::Null, Value::Number))
            }
            b's' => {
                self.expect(b':')?;
                let text = self.string_body()?;
                self.expect(b';')?;
                Ok(Value::String(text))
            }
            b'a' => {
                self.expect(b':')?;
                let count = self.length()?;
                self.expect(b'{')?;
                let entries = self.nested(start, count)?;
                self.expect(b'}')?;
                Ok(collect_array(entries))
            }
            b'O' => {
                self.expect(b':')?;
                // Class name is irrelevant; objects decode as maps.
                self.string_body()?;
                self.expect(b':')?;
                let count = self.length()?;
                self.expect(b'{')?;
                let entries = self.nested(start, count)?;
                self.expect(b'}')?;
                Ok(Value::Object(
                    entries
                        .into_iter()
                        .map(|(key, value)| (key.into_string(), value))
                        .collect(),
                ))
            }
            other => Err(LegacyError::Unexpected {
                pos: start,
                found: char::from(other),
                expected: "a type tag",
            }),
        }
    }

    /// Reads `count` entries one level deeper, refusing to go past
    /// [`MAX_DEPTH`].
    fn nested(&mut self, start: usize, count: usize) -> Result<Vec<(Key, Value)>, LegacyError> {
        if self.depth >= MAX_DEPTH {
            return Err(LegacyError::TooDeep(start));
        }
        self.depth += 1;
        let entries = self.entries(count);
        self.depth -= 1;
        entries
    }

    fn entries(&mut self, count: usize) -> Result<Vec<(Key, Value)>, LegacyError> {
        let mut entries = Vec::with_capacity(count.min(1024));
        for _ in 0..count {
            let key = self.key()?;
            let value = self.value()?;
            entries.push((key, value));
        }
        Ok(entries)
    }

    fn key(&mut self) -> Result<Key, LegacyError> {
        let start = self.pos;
        match self.value()? {
            Value::Number(number) => number
                .as_i64()
                .map(Key::Index)
                .ok_or(LegacyError::InvalidKey(start)),
            Value::String(name) => Ok(Key::Name(name)),
            _ => Err(LegacyError::InvalidKey(start)),
        }
    }

    /// Reads `<len>:"<bytes>"` and returns the quoted bytes as text.
    fn string_body(&mut self) -> Result<String, LegacyError> {
        let len = self.length()?;
        self.expect(b'"')?;
        let start = self.pos;
        let end = start.checked_add(len).ok_or(LegacyError::Eof(start))?;
        let slice = self
            .bytes
            .get(start..end)
            .ok_or(LegacyError::Eof(self.bytes.len()))?;
        let text =
            std::str::from_utf8(slice).map_err(|_| LegacyError::InvalidUtf8(start))?;
        self.pos = end;
        self.expect(b'"')?;
        Ok(text.to_string())
    }

    /// Reads a decimal length terminated by `:`.
    fn length(&mut self) -> Result<usize, LegacyError> {
        let start = self.pos;
        let raw = self.until(b':')?;
        raw.parse::<usize>().map_err(|_| LegacyError::InvalidNumber {
            pos: start,
            raw: raw.to_string(),
        })
    }

    /// Consumes bytes up to and including `delimiter`, returning the bytes
    /// before it.
    fn until(&mut self, delimiter: u8) -> Result<&'a str, LegacyError> {
        let bytes = self.bytes;
        let start = self.pos;
        let offset = bytes[start..]
            .iter()
            .position(|&byte| byte == delimiter)
            .ok_or(LegacyError::Eof(bytes.len()))?;
        let raw = std::str::from_utf8(&bytes[start..start + offset])
            .map_err(|_| LegacyError::InvalidUtf8(start))?;
        self.pos = start + offset + 1;
        Ok(raw)
    }

    fn next_byte(&mut self) -> Result<u8, LegacyError> {
        let byte = *self.bytes.get(self.pos).ok_or(LegacyError::Eof(self.pos))?;
        self.pos += 1;
        Ok(byte)
    }

    fn expect(&mut self, wanted: u8) -> Result<(), LegacyError> {
        let pos = self.pos;
        let found = self.next_byte()?;
        if found != wanted {
            return Err(LegacyError::Unexpected {
                pos,
                found: char::from(found),
                expected: match wanted {
                    b';' => "';'",
                    b':' => "':'",
                    b'{' => "'{'",
                    b'}' => "'}'",
                    b'"' => "'\"'",
                    _ => "a delimiter",
                },
            });
        }
        Ok(())
    }
}

/// Lists keyed `0..n` in order become JSON arrays; anything else is a map.
fn collect_array(entries: Vec<(Key, Value)>) -> Value {
    let sequential = entries
        .iter()
        .enumerate()
        .all(|(index, (key, _))| matches!(key, Key::Index(i) if *i == index as i64));
    if sequential {
        Value::Array(entries.into_iter().map(|(_, value)| value).collect())
    } else {
        Value::Object(
            entries
                .into_iter()
                .map(|(key, value)| (key.into_string(), value))
                .collect(),
        )
    }
}
