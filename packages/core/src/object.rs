//! Field-level description of renderable values.
//!
//! The HAL writer does not inspect types at runtime. Instead, every value it
//! renders as a JSON object implements [`HalObject`] and declares its fields
//! into a [`Fields`] collector. A typed resource wraps a [`Resource`], declares
//! its own fields, and then hands over to the wrapped value with
//! [`Fields::inherit`], so fields appear most-derived first:
//!
//! ```rust,ignore
//! struct Order {
//!     resource: Resource,
//!     total: f64,
//!     items: Vec<Item>,
//! }
//!
//! impl HalObject for Order {
//!     fn resource(&self) -> Option<&Resource> {
//!         Some(&self.resource)
//!     }
//!
//!     fn fields<'a>(&'a self, fields: &mut Fields<'a>) {
//!         fields.data("total", &self.total).objects("items", &self.items);
//!         fields.inherit(&self.resource);
//!     }
//! }
//! ```

use std::borrow::Cow;

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::resource::Resource;

/// Written in place of a field whose value could not be encoded.
pub const UNREADABLE_FIELD: &str = "N/A";

/// A value the HAL writer can render as a JSON object.
pub trait HalObject {
    /// The HAL part of this value, if it is a resource.
    ///
    /// When `Some`, the writer emits `_links` and `_embedded` from the
    /// returned resource before the fields.
    fn resource(&self) -> Option<&Resource> {
        None
    }

    /// Declare the data fields of this value, in output order.
    fn fields<'a>(&'a self, fields: &mut Fields<'a>);
}

/// A plain resource renders its links, its embedded resources and its
/// properties.
impl HalObject for Resource {
    fn resource(&self) -> Option<&Resource> {
        Some(self)
    }

    fn fields<'a>(&'a self, fields: &mut Fields<'a>) {
        for (name, value) in self.properties() {
            fields.value(name, value);
        }
    }
}

impl<T: HalObject + ?Sized> HalObject for &T {
    fn resource(&self) -> Option<&Resource> {
        (**self).resource()
    }

    fn fields<'a>(&'a self, fields: &mut Fields<'a>) {
        (**self).fields(fields)
    }
}

impl<T: HalObject + ?Sized> HalObject for Box<T> {
    fn resource(&self) -> Option<&Resource> {
        (**self).resource()
    }

    fn fields<'a>(&'a self, fields: &mut Fields<'a>) {
        (**self).fields(fields)
    }
}

/// The value of one declared field.
pub enum FieldValue<'a> {
    /// Absent. Omitted from the output unless nulls are written.
    Null,
    /// Plain data, written through the generic encoder.
    Data(Cow<'a, Value>),
    /// A nested object, rendered recursively (as HAL if it is a resource).
    Object(&'a dyn HalObject),
    /// A sequence whose elements are rendered one by one.
    List(Vec<FieldValue<'a>>),
}

impl std::fmt::Debug for FieldValue<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FieldValue::Null => f.write_str("Null"),
            FieldValue::Data(value) => f.debug_tuple("Data").field(value).finish(),
            FieldValue::Object(object) => f
                .debug_tuple("Object")
                .field(&if object.resource().is_some() { "resource" } else { "record" })
                .finish(),
            FieldValue::List(items) => f.debug_tuple("List").field(items).finish(),
        }
    }
}

/// A field that could not be encoded and was replaced by [`UNREADABLE_FIELD`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("field {field:?} could not be read: {message}")]
pub struct FieldFailure {
    pub field: String,
    pub message: String,
}

/// Collects the fields a [`HalObject`] declares.
#[derive(Debug, Default)]
pub struct Fields<'a> {
    entries: Vec<(&'a str, FieldValue<'a>)>,
    failures: Vec<FieldFailure>,
}

impl<'a> Fields<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Collect the fields of `object`.
    pub fn of(object: &'a dyn HalObject) -> Self {
        let mut fields = Self::new();
        object.fields(&mut fields);
        fields
    }

    /// Declare a plain data field, encoded with serde.
    ///
    /// A value that encodes to `null` (such as `None`) is an absent field.
    /// A value serde cannot encode (such as a map with non-string keys) is
    /// replaced by [`UNREADABLE_FIELD`]; the failure is logged and recorded.
    ///
    /// The value is never rendered as HAL, even if it contains a
    /// [`Resource`]. Declare resources with [`object`](Self::object) or
    /// [`objects`](Self::objects).
    pub fn data<T: Serialize + ?Sized>(&mut self, name: &'a str, value: &T) -> &mut Self {
        let value = match serde_json::to_value(value) {
            Ok(Value::Null) => FieldValue::Null,
            Ok(value) => FieldValue::Data(Cow::Owned(value)),
            Err(e) => {
                tracing::error!(field = name, "could not read field: {e}");
                self.failures.push(FieldFailure {
                    field: name.to_string(),
                    message: e.to_string(),
                });
                FieldValue::Data(Cow::Owned(Value::String(UNREADABLE_FIELD.to_string())))
            }
        };
        self.entries.push((name, value));
        self
    }

    /// Declare a field holding an existing JSON value, without copying it.
    pub fn value(&mut self, name: &'a str, value: &'a Value) -> &mut Self {
        let value = match value {
            Value::Null => FieldValue::Null,
            other => FieldValue::Data(Cow::Borrowed(other)),
        };
        self.entries.push((name, value));
        self
    }

    /// Declare a nested object field.
    pub fn object<T: HalObject>(&mut self, name: &'a str, value: &'a T) -> &mut Self {
        self.entries.push((name, FieldValue::Object(value)));
        self
    }

    /// Declare an optional nested object field; `None` is an absent field.
    pub fn object_opt<T: HalObject>(&mut self, name: &'a str, value: Option<&'a T>) -> &mut Self {
        let value = match value {
            Some(object) => FieldValue::Object(object),
            None => FieldValue::Null,
        };
        self.entries.push((name, value));
        self
    }

    /// Declare a collection field whose elements are nested objects.
    pub fn objects<T: HalObject + 'a>(
        &mut self,
        name: &'a str,
        values: impl IntoIterator<Item = &'a T>,
    ) -> &mut Self {
        let items = values
            .into_iter()
            .map(|object| FieldValue::Object(object as &dyn HalObject))
            .collect();
        self.entries.push((name, FieldValue::List(items)));
        self
    }

    /// Declare a field from an already built [`FieldValue`].
    pub fn field(&mut self, name: &'a str, value: FieldValue<'a>) -> &mut Self {
        self.entries.push((name, value));
        self
    }

    /// Append the fields declared by `base`.
    pub fn inherit(&mut self, base: &'a dyn HalObject) -> &mut Self {
        base.fields(self);
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'a str, &FieldValue<'a>)> {
        self.entries.iter().map(|(name, value)| (*name, value))
    }

    /// Fields that had to be replaced by [`UNREADABLE_FIELD`].
    pub fn failures(&self) -> &[FieldFailure] {
        &self.failures
    }

    pub fn into_parts(self) -> (Vec<(&'a str, FieldValue<'a>)>, Vec<FieldFailure>) {
        (self.entries, self.failures)
    }
}

// --- tests -------------------------------------------------------------------
