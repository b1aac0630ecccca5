//! Recursive-descent JSON decoder over a mutable packet buffer.
//!
//! Strings are decoded in place: escape sequences are rewritten over the
//! original bytes (the decoded form is never longer than the encoded form)
//! and the result is returned as a slice borrowing from the buffer. The
//! parser consumes the buffer front-to-back by splitting decoded regions off
//! the mutable tail, so every borrowed slice is disjoint from the bytes
//! still being scanned.

use std::mem;
use std::str;

use thiserror::Error;

use super::value::{Object, Value};

/// Decode failure with an approximate byte offset into the packet.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{message} at byte {position}")]
pub struct SyntaxError {
    message: String,
    position: usize,
}

impl SyntaxError {
    /// Human-readable description of the failure.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Approximate byte offset where decoding stopped.
    pub fn position(&self) -> usize {
        self.position
    }
}

/// Parses one packet as a single JSON value.
///
/// Trailing bytes other than whitespace after the top-level value are an
/// error. Decoded strings borrow from `buffer`.
///
/// # Errors
///
/// Returns a [`SyntaxError`] describing the first violation encountered;
/// a failure inside a nested container aborts the whole parse.
pub fn parse(buffer: &mut [u8]) -> Result<Value<'_>, SyntaxError> {
    let mut parser = Parser {
        rest: buffer,
        consumed: 0,
    };
    let value = parser.parse_value()?;
    parser.skip_spaces();
    if parser.rest.is_empty() {
        Ok(value)
    } else {
        Err(parser.error("extra text after the top-level value"))
    }
}

fn is_numeric(byte: u8) -> bool {
    matches!(byte, b'0'..=b'9' | b'-' | b'+' | b'.' | b'e' | b'E')
}

struct Parser<'buf> {
    rest: &'buf mut [u8],
    consumed: usize,
}

impl<'buf> Parser<'buf> {
    fn error(&self, message: impl Into<String>) -> SyntaxError {
        SyntaxError {
            message: message.into(),
            position: self.consumed,
        }
    }

    fn peek(&self) -> Option<u8> {
        self.rest.first().copied()
    }

    /// Splits `count` bytes off the front of the unconsumed tail. Callers
    /// must have checked that `count` bytes are available.
    fn advance(&mut self, count: usize) -> &'buf mut [u8] {
        let tail = mem::take(&mut self.rest);
        let (head, rest) = tail.split_at_mut(count);
        self.rest = rest;
        self.consumed += count;
        head
    }

    fn skip_spaces(&mut self) {
        while self.peek().is_some_and(|byte| byte.is_ascii_whitespace()) {
            self.advance(1);
        }
    }

    fn expect_literal(&mut self, literal: &'static str) -> Result<(), SyntaxError> {
        if self.rest.starts_with(literal.as_bytes()) {
            self.advance(literal.len());
            Ok(())
        } else {
            Err(self.error(format!("invalid JSON value ({literal}?)")))
        }
    }

    fn parse_value(&mut self) -> Result<Value<'buf>, SyntaxError> {
        self.skip_spaces();
        let Some(byte) = self.peek() else {
            return Err(self.error("unexpected end of input"));
        };
        match byte {
            b'n' => {
                self.expect_literal("null")?;
                Ok(Value::Null)
            }
            b't' => {
                self.expect_literal("true")?;
                Ok(Value::Bool(true))
            }
            b'f' => {
                self.expect_literal("false")?;
                Ok(Value::Bool(false))
            }
            b'"' => Ok(Value::Str(self.parse_string()?)),
            b'{' => self.parse_object(),
            b'[' => self.parse_array(),
            _ if is_numeric(byte) => self.parse_number(),
            _ => Err(self.error("invalid JSON value")),
        }
    }

    /// Decodes a quoted string in place. The unconsumed tail must start at
    /// the opening quote.
    fn parse_string(&mut self) -> Result<&'buf str, SyntaxError> {
        self.advance(1); // opening quote
        let mut read = 0;
        let mut write = 0;
        loop {
            let Some(&byte) = self.rest.get(read) else {
                return Err(self.error("unterminated string"));
            };
            let decoded = match byte {
                b'"' => break,
                b'\\' => {
                    read += 1;
                    let Some(&escape) = self.rest.get(read) else {
                        return Err(self.error("unterminated string"));
                    };
                    match escape {
                        b'"' | b'\\' | b'/' => escape,
                        b'b' => 0x08,
                        b'f' => 0x0c,
                        b'n' => b'\n',
                        b'r' => b'\r',
                        b't' => b'\t',
                        _ => {
                            return Err(
                                self.error("hex and unicode escape sequences are not supported")
                            );
                        }
                    }
                }
                _ if byte < 0x20 => {
                    return Err(self.error("unescaped control character in string"));
                }
                _ => byte,
            };
            self.rest[write] = decoded;
            read += 1;
            write += 1;
        }
        let raw = self.advance(read + 1); // body plus closing quote
        str::from_utf8(&raw[..write]).map_err(|_| self.error("invalid UTF-8 in string"))
    }

    fn parse_object(&mut self) -> Result<Value<'buf>, SyntaxError> {
        self.advance(1); // '{'
        let mut object = Object::new();
        loop {
            self.skip_spaces();
            match self.peek() {
                Some(b'}') => {
                    self.advance(1);
                    break;
                }
                None => return Err(self.error("unterminated object")),
                _ => {}
            }
            if !object.is_empty() {
                if self.peek() == Some(b',') {
                    self.advance(1);
                    self.skip_spaces();
                } else {
                    return Err(self.error("expected , or } after object property"));
                }
            }
            if self.peek() != Some(b'"') {
                return Err(self.error("expected object key"));
            }
            let key = self.parse_string()?;
            self.skip_spaces();
            if self.peek() == Some(b':') {
                self.advance(1);
            } else {
                return Err(self.error("expected : after object key"));
            }
            let value = self.parse_value()?;
            object.insert(key, value);
        }
        Ok(Value::Object(object))
    }

    fn parse_array(&mut self) -> Result<Value<'buf>, SyntaxError> {
        self.advance(1); // '['
        let mut elements = Vec::new();
        loop {
            self.skip_spaces();
            match self.peek() {
                Some(b']') => {
                    self.advance(1);
                    break;
                }
                None => return Err(self.error("unterminated array")),
                _ => {}
            }
            if !elements.is_empty() {
                if self.peek() == Some(b',') {
                    self.advance(1);
                } else {
                    return Err(self.error("expected , or ] after array element"));
                }
            }
            elements.push(self.parse_value()?);
        }
        Ok(Value::Array(elements))
    }

    fn parse_number(&mut self) -> Result<Value<'buf>, SyntaxError> {
        let length = self
            .rest
            .iter()
            .take_while(|byte| is_numeric(**byte))
            .count();
        let raw = self.advance(length);
        // Numeric characters are ASCII, so the conversion cannot fail.
        let text = str::from_utf8(raw).map_err(|_| self.error("invalid JSON value"))?;
        if let Ok(integer) = text.parse::<i64>() {
            return Ok(Value::Int(integer));
        }
        text.parse::<f64>()
            .map(Value::Double)
            .map_err(|_| self.error("invalid JSON value"))
    }
}
