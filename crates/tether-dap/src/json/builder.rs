//! Streaming JSON encoder over an append-only byte buffer.
//!
//! Output is indented two spaces per nesting level. Comma placement is
//! driven by a per-depth "a sibling was already written" stack, so callers
//! emit fields and elements without tracking separators themselves.

use super::value::Value;

const INDENT_STEP: usize = 2;
const INITIAL_CAPACITY: usize = 16 * 1024;

/// Append-only builder for one outgoing message.
///
/// The buffer reaches the wire in a single piece via
/// [`Wire::send`](crate::framing::Wire::send), which consumes the builder.
#[derive(Debug)]
pub struct Builder {
    buffer: Vec<u8>,
    indent: usize,
    siblings: Vec<bool>,
}

impl Default for Builder {
    fn default() -> Self {
        Self::new()
    }
}

impl Builder {
    /// Creates an empty builder.
    pub fn new() -> Self {
        Self {
            buffer: Vec::with_capacity(INITIAL_CAPACITY),
            indent: 0,
            siblings: Vec::new(),
        }
    }

    /// Consumes the builder, yielding the serialised message bytes.
    pub fn finish(self) -> Vec<u8> {
        self.buffer
    }

    fn append(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }

    fn newline(&mut self) {
        self.buffer.push(b'\n');
        self.buffer.extend(std::iter::repeat_n(b' ', self.indent));
    }

    /// Starts the next element at the current depth: emits the separating
    /// comma when a sibling has already been written, then a fresh line.
    pub fn element(&mut self) {
        if let Some(seen) = self.siblings.last_mut() {
            if *seen {
                self.buffer.push(b',');
            }
            *seen = true;
        }
        self.newline();
    }

    fn open(&mut self, brace: u8) {
        self.buffer.push(brace);
        self.indent += INDENT_STEP;
        self.siblings.push(false);
    }

    fn close(&mut self, brace: u8) {
        self.indent = self.indent.saturating_sub(INDENT_STEP);
        self.siblings.pop();
        self.newline();
        self.buffer.push(brace);
    }

    /// Opens an object.
    pub fn begin_object(&mut self) {
        self.open(b'{');
    }

    /// Closes the innermost object.
    pub fn end_object(&mut self) {
        self.close(b'}');
    }

    /// Opens an array.
    pub fn begin_array(&mut self) {
        self.open(b'[');
    }

    /// Closes the innermost array.
    pub fn end_array(&mut self) {
        self.close(b']');
    }

    /// Emits `"name": `, ready for the field's value.
    pub fn field(&mut self, name: &str) {
        self.element();
        self.raw_quoted(name);
        self.append(b": ");
    }

    /// Quotes `text` without escaping; for protocol constants known to
    /// contain no characters that need it.
    pub fn raw_quoted(&mut self, text: &str) {
        self.buffer.push(b'"');
        self.append(text.as_bytes());
        self.buffer.push(b'"');
    }

    /// Quotes `text`, escaping quotes, backslashes, and control characters.
    /// Control characters outside the named escapes use the standard
    /// `\u00XX` form.
    pub fn quoted(&mut self, text: &str) {
        self.buffer.push(b'"');
        for byte in text.bytes() {
            match byte {
                b'"' => self.append(b"\\\""),
                b'\\' => self.append(b"\\\\"),
                0x08 => self.append(b"\\b"),
                0x0c => self.append(b"\\f"),
                b'\n' => self.append(b"\\n"),
                b'\r' => self.append(b"\\r"),
                b'\t' => self.append(b"\\t"),
                _ if byte < 0x20 => {
                    self.append(b"\\u00");
                    self.buffer.push(hex_nybble(byte >> 4));
                    self.buffer.push(hex_nybble(byte));
                }
                _ => self.buffer.push(byte),
            }
        }
        self.buffer.push(b'"');
    }

    /// Emits a bare unsigned number.
    pub fn unsigned(&mut self, value: u64) {
        self.append(value.to_string().as_bytes());
    }

    /// Emits a bare signed number.
    pub fn integer(&mut self, value: i64) {
        self.append(value.to_string().as_bytes());
    }

    /// Emits a bare boolean.
    pub fn boolean(&mut self, value: bool) {
        self.append(if value { b"true" } else { b"false" });
    }

    /// Emits a field holding an escaped string.
    pub fn string_field(&mut self, name: &str, value: &str) {
        self.field(name);
        self.quoted(value);
    }

    /// Emits a field holding an unescaped protocol constant.
    pub fn raw_string_field(&mut self, name: &str, value: &str) {
        self.field(name);
        self.raw_quoted(value);
    }

    /// Emits a field holding an unsigned number.
    pub fn unsigned_field(&mut self, name: &str, value: u64) {
        self.field(name);
        self.unsigned(value);
    }

    /// Emits a field holding a signed number.
    pub fn int_field(&mut self, name: &str, value: i64) {
        self.field(name);
        self.integer(value);
    }

    /// Emits a field holding a boolean.
    pub fn bool_field(&mut self, name: &str, value: bool) {
        self.field(name);
        self.boolean(value);
    }

    /// Emits a field holding an arbitrary value tree.
    pub fn value_field(&mut self, name: &str, value: &Value<'_>) {
        self.field(name);
        self.write_value(value);
    }

    /// Emits an arbitrary value tree at the current position.
    pub fn write_value(&mut self, value: &Value<'_>) {
        match value {
            Value::Null => self.append(b"null"),
            Value::Bool(flag) => self.boolean(*flag),
            Value::Int(number) => self.integer(*number),
            Value::Double(number) => self.append(number.to_string().as_bytes()),
            Value::Str(text) => self.quoted(text),
            Value::Object(object) => {
                self.begin_object();
                for (name, field) in object.iter() {
                    self.value_field(name, field);
                }
                self.end_object();
            }
            Value::Array(elements) => {
                self.begin_array();
                for element in elements {
                    self.element();
                    self.write_value(element);
                }
                self.end_array();
            }
        }
    }
}

fn hex_nybble(value: u8) -> u8 {
    b"0123456789ABCDEF"[usize::from(value & 0xf)]
}

#[cfg(test)]
mod tests {
    use crate::json::{Object, parse};

    use super::*;

    #[test]
    fn lays_out_an_indented_object() {
        let mut builder = Builder::new();
        builder.begin_object();
        builder.int_field("seq", 1);
        builder.raw_string_field("type", "event");
        builder.raw_string_field("event", "stopped");
        builder.end_object();

        let text = String::from_utf8(builder.finish()).expect("utf8 output");
        assert_eq!(
            text,
            "{\n  \"seq\": 1,\n  \"type\": \"event\",\n  \"event\": \"stopped\"\n}"
        );
    }

    #[test]
    fn escapes_strings_with_named_and_unicode_forms() {
        let mut builder = Builder::new();
        builder.quoted("a\"b\\c\u{8}d\u{c}e\nf\rg\th\u{1}i");

        let text = String::from_utf8(builder.finish()).expect("utf8 output");
        assert_eq!(text, r#""a\"b\\c\bd\fe\nf\rg\th\u0001i""#);
    }

    #[test]
    fn output_is_standard_json() {
        let mut builder = Builder::new();
        builder.begin_object();
        builder.string_field("text", "line one\nline two\u{1b}[0m");
        builder.field("items");
        builder.begin_array();
        builder.element();
        builder.unsigned(1);
        builder.element();
        builder.boolean(false);
        builder.end_array();
        builder.end_object();

        let bytes = builder.finish();
        let decoded: serde_json::Value =
            serde_json::from_slice(&bytes).expect("standard JSON output");
        assert_eq!(decoded["text"], "line one\nline two\u{1b}[0m");
        assert_eq!(decoded["items"][0], 1);
        assert_eq!(decoded["items"][1], false);
    }

    #[test]
    fn nests_deeper_than_a_fixed_bit_register() {
        let mut builder = Builder::new();
        for _ in 0..80 {
            builder.begin_array();
            builder.element();
        }
        builder.unsigned(1);
        for _ in 0..80 {
            builder.end_array();
        }

        let bytes = builder.finish();
        assert!(serde_json::from_slice::<serde_json::Value>(&bytes).is_ok());
    }

    #[test]
    fn round_trips_a_value_tree_through_the_parser() {
        let mut items = Object::new();
        items.insert("flag", Value::Bool(true));
        items.insert("count", Value::Int(-9000));
        items.insert("ratio", Value::Double(3.25));
        items.insert("text", Value::Str("tab\there \"quoted\" back\\slash\nend"));
        let tree = Value::Object({
            let mut root = Object::new();
            root.insert("items", Value::Object(items));
            root.insert(
                "list",
                Value::Array(vec![Value::Null, Value::Int(1), Value::Str("two")]),
            );
            root
        });

        let mut builder = Builder::new();
        builder.write_value(&tree);
        let mut bytes = builder.finish();
        let reparsed = parse(&mut bytes).expect("reparse");
        assert_eq!(reparsed, tree);
    }
}
