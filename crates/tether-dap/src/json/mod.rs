//! JSON value model and codec for the packet payloads.
//!
//! The decoder is zero-copy: parsed strings are slices borrowed from the
//! packet buffer, which is rewritten in place while escapes are decoded. The
//! encoder appends indented JSON text to a growable buffer that is handed to
//! the wire in one piece.

mod builder;
mod parser;
mod value;

pub use self::builder::Builder;
pub use self::parser::{SyntaxError, parse};
pub use self::value::{Object, Value};
