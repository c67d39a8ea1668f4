//! Event-level JSON output.
//!
//! [`JsonGenerator`] writes a JSON document one event at a time (begin
//! object, field name, scalar, end array, ...) to any [`io::Write`] sink.
//! Layout is delegated to a [`serde_json::ser::Formatter`], so compact and
//! pretty output are byte-compatible with `serde_json::to_writer` and
//! `serde_json::to_writer_pretty`.
//!
//! The generator tracks its position in the document and rejects events
//! that would produce malformed JSON, such as a value inside an object
//! without a preceding field name.

use std::io;

use serde::Serialize;
use serde_json::ser::{CharEscape, CompactFormatter, Formatter, PrettyFormatter};
use serde_json::Value;
use thiserror::Error;

/// Errors raised while writing JSON.
#[derive(Debug, Error)]
pub enum WriteError {
    #[error("failed to write to the output sink: {0}")]
    Io(#[from] io::Error),

    #[error("the output sink has already been closed")]
    Closed,

    #[error("invalid JSON event: {0}")]
    InvalidState(&'static str),

    #[error("relation {0:?} has nothing to write")]
    EmptyRelation(String),

    #[error("could not encode value: {0}")]
    Encode(#[source] serde_json::Error),
}

#[derive(Debug, Clone, Copy)]
enum Scope {
    Object { first: bool, awaiting_value: bool },
    Array { first: bool },
}

/// A streaming JSON writer.
///
/// Several top-level values written to the same generator are separated by
/// a single space. [`close`](Self::close) flushes and drops the sink; every
/// later event fails with [`WriteError::Closed`].
pub struct JsonGenerator<W, F = CompactFormatter> {
    writer: Option<W>,
    formatter: F,
    scopes: Vec<Scope>,
    roots: usize,
    escape_non_ascii: bool,
}

impl<W: io::Write> JsonGenerator<W> {
    /// A generator producing compact output.
    pub fn new(writer: W) -> Self {
        Self::with_formatter(writer, CompactFormatter)
    }
}

impl<W: io::Write> JsonGenerator<W, PrettyFormatter<'static>> {
    /// A generator producing two-space indented output.
    pub fn pretty(writer: W) -> Self {
        Self::with_formatter(writer, PrettyFormatter::new())
    }
}

impl<W: io::Write, F: Formatter> JsonGenerator<W, F> {
    pub fn with_formatter(writer: W, formatter: F) -> Self {
        Self {
            writer: Some(writer),
            formatter,
            scopes: Vec::new(),
            roots: 0,
            escape_non_ascii: false,
        }
    }

    /// Write every non-ASCII character as a `\uXXXX` escape.
    pub fn set_escape_non_ascii(&mut self, enabled: bool) {
        self.escape_non_ascii = enabled;
    }

    pub fn escape_non_ascii(&self) -> bool {
        self.escape_non_ascii
    }

    /// Number of currently open objects and arrays.
    pub fn depth(&self) -> usize {
        self.scopes.len()
    }

    pub fn is_closed(&self) -> bool {
        self.writer.is_none()
    }

    /// The sink, unless the generator has been closed.
    pub fn get_ref(&self) -> Option<&W> {
        self.writer.as_ref()
    }

    /// Give back the sink, unless the generator has been closed.
    pub fn into_inner(self) -> Option<W> {
        self.writer
    }

    // --- structure -----------------------------------------------------------

    pub fn begin_object(&mut self) -> Result<(), WriteError> {
        self.before_value()?;
        let w = Self::sink(&mut self.writer)?;
        self.formatter.begin_object(w)?;
        self.scopes.push(Scope::Object {
            first: true,
            awaiting_value: false,
        });
        Ok(())
    }

    pub fn end_object(&mut self) -> Result<(), WriteError> {
        match self.scopes.last() {
            Some(Scope::Object {
                awaiting_value: false,
                ..
            }) => {}
            Some(Scope::Object { .. }) => {
                return Err(WriteError::InvalidState("object closed while a value was expected"))
            }
            _ => return Err(WriteError::InvalidState("end_object without a matching begin_object")),
        }
        let w = Self::sink(&mut self.writer)?;
        self.formatter.end_object(w)?;
        self.scopes.pop();
        self.after_value()
    }

    pub fn begin_array(&mut self) -> Result<(), WriteError> {
        self.before_value()?;
        let w = Self::sink(&mut self.writer)?;
        self.formatter.begin_array(w)?;
        self.scopes.push(Scope::Array { first: true });
        Ok(())
    }

    pub fn end_array(&mut self) -> Result<(), WriteError> {
        if !matches!(self.scopes.last(), Some(Scope::Array { .. })) {
            return Err(WriteError::InvalidState("end_array without a matching begin_array"));
        }
        let w = Self::sink(&mut self.writer)?;
        self.formatter.end_array(w)?;
        self.scopes.pop();
        self.after_value()
    }

    /// Write the name of the next member of the current object.
    pub fn field_name(&mut self, name: &str) -> Result<(), WriteError> {
        let w = Self::sink(&mut self.writer)?;
        let Some(Scope::Object {
            first,
            awaiting_value,
        }) = self.scopes.last_mut()
        else {
            return Err(WriteError::InvalidState("field name outside of an object"));
        };
        if *awaiting_value {
            return Err(WriteError::InvalidState("field name written while a value was expected"));
        }
        self.formatter.begin_object_key(w, *first)?;
        *first = false;
        write_escaped(&mut self.formatter, w, name, self.escape_non_ascii)?;
        self.formatter.end_object_key(w)?;
        *awaiting_value = true;
        Ok(())
    }

    /// `"name": {` in one call.
    pub fn begin_object_field(&mut self, name: &str) -> Result<(), WriteError> {
        self.field_name(name)?;
        self.begin_object()
    }

    /// `"name": [` in one call.
    pub fn begin_array_field(&mut self, name: &str) -> Result<(), WriteError> {
        self.field_name(name)?;
        self.begin_array()
    }

    // --- scalars -------------------------------------------------------------

    pub fn write_null(&mut self) -> Result<(), WriteError> {
        self.scalar(|f, w, _| f.write_null(w))
    }

    pub fn write_bool(&mut self, value: bool) -> Result<(), WriteError> {
        self.scalar(|f, w, _| f.write_bool(w, value))
    }

    pub fn write_i64(&mut self, value: i64) -> Result<(), WriteError> {
        self.scalar(|f, w, _| f.write_i64(w, value))
    }

    pub fn write_u64(&mut self, value: u64) -> Result<(), WriteError> {
        self.scalar(|f, w, _| f.write_u64(w, value))
    }

    /// Non-finite numbers have no JSON form and are written as `null`.
    pub fn write_f64(&mut self, value: f64) -> Result<(), WriteError> {
        if value.is_finite() {
            self.scalar(|f, w, _| f.write_f64(w, value))
        } else {
            self.write_null()
        }
    }

    pub fn write_str(&mut self, value: &str) -> Result<(), WriteError> {
        self.scalar(|f, w, escape_non_ascii| write_escaped(f, w, value, escape_non_ascii))
    }

    /// Write an arbitrary JSON value, recursing into arrays and objects.
    pub fn write_value(&mut self, value: &Value) -> Result<(), WriteError> {
        match value {
            Value::Null => self.write_null(),
            Value::Bool(b) => self.write_bool(*b),
            Value::Number(n) => match (n.as_u64(), n.as_i64()) {
                (Some(u), _) => self.write_u64(u),
                (None, Some(i)) => self.write_i64(i),
                (None, None) => self.write_f64(n.as_f64().unwrap_or(f64::NAN)),
            },
            Value::String(s) => self.write_str(s),
            Value::Array(items) => {
                self.begin_array()?;
                for item in items {
                    self.write_value(item)?;
                }
                self.end_array()
            }
            Value::Object(members) => {
                self.begin_object()?;
                for (name, member) in members {
                    self.field_name(name)?;
                    self.write_value(member)?;
                }
                self.end_object()
            }
        }
    }

    /// Encode any serde value through [`serde_json::to_value`] and write it.
    pub fn write_serialize<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), WriteError> {
        let value = serde_json::to_value(value).map_err(WriteError::Encode)?;
        self.write_value(&value)
    }

    // --- lifecycle -----------------------------------------------------------

    pub fn flush(&mut self) -> Result<(), WriteError> {
        Self::sink(&mut self.writer)?.flush()?;
        Ok(())
    }

    /// Flush and drop the sink. Closing twice is a no-op.
    pub fn close(&mut self) -> Result<(), WriteError> {
        self.scopes.clear();
        if let Some(mut writer) = self.writer.take() {
            writer.flush()?;
        }
        Ok(())
    }

    // --- helpers -------------------------------------------------------------

    fn sink(writer: &mut Option<W>) -> Result<&mut W, WriteError> {
        writer.as_mut().ok_or(WriteError::Closed)
    }

    fn scalar(
        &mut self,
        emit: impl FnOnce(&mut F, &mut W, bool) -> io::Result<()>,
    ) -> Result<(), WriteError> {
        self.before_value()?;
        let w = Self::sink(&mut self.writer)?;
        emit(&mut self.formatter, w, self.escape_non_ascii)?;
        self.after_value()
    }

    fn before_value(&mut self) -> Result<(), WriteError> {
        let w = Self::sink(&mut self.writer)?;
        match self.scopes.last_mut() {
            None => {
                if self.roots > 0 {
                    w.write_all(b" ")?;
                }
            }
            Some(Scope::Array { first }) => {
                self.formatter.begin_array_value(w, *first)?;
                *first = false;
            }
            Some(Scope::Object {
                awaiting_value: true,
                ..
            }) => self.formatter.begin_object_value(w)?,
            Some(Scope::Object { .. }) => {
                return Err(WriteError::InvalidState("object member written without a field name"))
            }
        }
        Ok(())
    }

    fn after_value(&mut self) -> Result<(), WriteError> {
        let w = Self::sink(&mut self.writer)?;
        match self.scopes.last_mut() {
            None => self.roots += 1,
            Some(Scope::Array { .. }) => self.formatter.end_array_value(w)?,
            Some(Scope::Object { awaiting_value, .. }) => {
                self.formatter.end_object_value(w)?;
                *awaiting_value = false;
            }
        }
        Ok(())
    }
}

/// Write `value` as a quoted JSON string, escaping the way serde_json does.
fn write_escaped<W, F>(
    formatter: &mut F,
    writer: &mut W,
    value: &str,
    escape_non_ascii: bool,
) -> io::Result<()>
where
    W: ?Sized + io::Write,
    F: ?Sized + Formatter,
{
    formatter.begin_string(writer)?;
    let mut start = 0;
    for (index, ch) in value.char_indices() {
        let escape = match ch {
            '"' => Some(CharEscape::Quote),
            '\\' => Some(CharEscape::ReverseSolidus),
            '\n' => Some(CharEscape::LineFeed),
            '\r' => Some(CharEscape::CarriageReturn),
            '\t' => Some(CharEscape::Tab),
            '\u{08}' => Some(CharEscape::Backspace),
            '\u{0c}' => Some(CharEscape::FormFeed),
            c if c < '\u{20}' => Some(CharEscape::AsciiControl(c as u8)),
            _ => None,
        };
        if escape.is_none() && (ch.is_ascii() || !escape_non_ascii) {
            continue;
        }
        if start < index {
            formatter.write_string_fragment(writer, &value[start..index])?;
        }
        match escape {
            Some(escape) => formatter.write_char_escape(writer, escape)?,
            None => {
                let mut units = [0u16; 2];
                for unit in ch.encode_utf16(&mut units).iter() {
                    formatter.write_string_fragment(writer, &format!("\\u{unit:04x}"))?;
                }
            }
        }
        start = index + ch.len_utf8();
    }
    if start < value.len() {
        formatter.write_string_fragment(writer, &value[start..])?;
    }
    formatter.end_string(writer)
}

// --- tests -------------------------------------------------------------------
