//! HAL-JSON rendering.
//!
//! [`HalWriter`] walks a [`HalObject`] and emits one JSON document:
//!
//! ```text
//! {
//!   "_links":    { "<rel>": {<link>} | [{<link>}, ...], ... },
//!   "_embedded": { "<rel>": {<resource>} | [{<resource>}, ...], ... },
//!   "<field>": <value>, ...
//! }
//! ```
//!
//! A relation with exactly one entry is written as a single object, a relation
//! with several as an array. The decision is made purely on the count.
//! Values without a resource are written as plain objects of their fields.

use std::io;

use serde::Serialize;
use serde_json::ser::{CompactFormatter, Formatter, PrettyFormatter};
use serde_json::Value;

use crate::generator::{JsonGenerator, WriteError};
use crate::object::{FieldFailure, FieldValue, Fields, HalObject};
use crate::options::{HalOption, OptionError, WriterOptions};
use crate::resource::Resource;
use crate::types::Link;

/// Serialises HAL objects to a JSON generator.
///
/// A writer built from a raw sink ([`new`](Self::new), [`pretty`](Self::pretty))
/// owns its generator and closes it after each top-level write. A writer built
/// with [`from_generator`](Self::from_generator) only flushes, leaving the
/// generator open for the caller.
pub struct HalWriter<'g, W: io::Write, F: Formatter = CompactFormatter> {
    target: Target<'g, W, F>,
    options: WriterOptions,
    diagnostics: Vec<FieldFailure>,
}

enum Target<'g, W, F> {
    Owned(JsonGenerator<W, F>),
    Borrowed(&'g mut JsonGenerator<W, F>),
}

impl<'g, W: io::Write> HalWriter<'g, W> {
    /// A writer producing compact output into `writer`.
    pub fn new(writer: W) -> Self {
        Self::owned(JsonGenerator::new(writer))
    }
}

impl<'g, W: io::Write> HalWriter<'g, W, PrettyFormatter<'static>> {
    /// A writer producing indented output into `writer`.
    pub fn pretty(writer: W) -> Self {
        Self::owned(JsonGenerator::pretty(writer))
    }
}

impl<'g, W: io::Write, F: Formatter> HalWriter<'g, W, F> {
    fn owned(generator: JsonGenerator<W, F>) -> Self {
        Self {
            target: Target::Owned(generator),
            options: WriterOptions::default(),
            diagnostics: Vec::new(),
        }
    }

    /// A writer that emits into a generator owned by the caller.
    ///
    /// `close_on_finish` starts out `false`.
    pub fn from_generator(generator: &'g mut JsonGenerator<W, F>) -> Self {
        Self {
            target: Target::Borrowed(generator),
            options: WriterOptions {
                close_on_finish: false,
                ..WriterOptions::default()
            },
            diagnostics: Vec::new(),
        }
    }

    /// Replace every option at once.
    pub fn with_options(mut self, options: WriterOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> &WriterOptions {
        &self.options
    }

    pub fn options_mut(&mut self) -> &mut WriterOptions {
        &mut self.options
    }

    /// Set one option from a JSON value. See [`WriterOptions::set`].
    pub fn set_option(&mut self, option: HalOption, value: &Value) -> Result<(), OptionError> {
        self.options.set(option, value)
    }

    /// Fields replaced by the sentinel during the last top-level write.
    pub fn diagnostics(&self) -> &[FieldFailure] {
        &self.diagnostics
    }

    /// The generator this writer emits into.
    pub fn generator(&mut self) -> &mut JsonGenerator<W, F> {
        match &mut self.target {
            Target::Owned(generator) => generator,
            Target::Borrowed(generator) => &mut **generator,
        }
    }

    // --- top-level writes ----------------------------------------------------

    /// Write `value` as one complete JSON document, then flush the sink (or
    /// close it, if `close_on_finish` is set).
    ///
    /// The sink is flushed or closed even if rendering fails; the first error
    /// is returned.
    pub fn write(&mut self, value: &dyn HalObject) -> Result<(), WriteError> {
        self.diagnostics.clear();
        let result = self.render(|r| r.object(value));
        self.finish(result)
    }

    /// Write a sequence of values as one JSON array document, each element
    /// rendered like [`write`](Self::write) renders a single value.
    ///
    /// A `Vec<Resource>` or a `&[&dyn HalObject]` goes here, not through
    /// [`write_data`](Self::write_data).
    pub fn write_list<T: HalObject>(&mut self, values: &[T]) -> Result<(), WriteError> {
        self.diagnostics.clear();
        let result = self.render(|r| r.list(values));
        self.finish(result)
    }

    /// Write a plain serde value as one complete JSON document.
    ///
    /// The value goes through the generic encoder only and never produces
    /// HAL: a [`Resource`] reached this way is written in its flat binding
    /// form. Use [`write`](Self::write) or [`write_list`](Self::write_list)
    /// for resources.
    ///
    /// Unlike a field, a top-level value that cannot be encoded is an error.
    pub fn write_data<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), WriteError> {
        self.diagnostics.clear();
        let result = self.render(|r| r.json.write_serialize(value));
        self.finish(result)
    }

    fn finish(&mut self, result: Result<(), WriteError>) -> Result<(), WriteError> {
        let close = self.options.close_on_finish;
        let generator = self.generator();
        let done = if close {
            generator.close()
        } else {
            generator.flush()
        };
        match &result {
            Ok(()) => tracing::debug!(close, "HAL document written"),
            Err(e) => tracing::debug!(close, "HAL document aborted: {e}"),
        }
        result.and(done)
    }

    // --- fragments -----------------------------------------------------------
    //
    // These write into the current position of the generator and neither
    // flush nor close it. They are meant for callers assembling a larger
    // document around HAL pieces.

    /// Write `value` as a JSON object (HAL if it is a resource).
    pub fn write_object(&mut self, value: &dyn HalObject) -> Result<(), WriteError> {
        self.render(|r| r.object(value))
    }

    /// Write the `_links` member of `resource`.
    pub fn write_links(&mut self, resource: &Resource) -> Result<(), WriteError> {
        self.render(|r| r.links(resource))
    }

    /// Write one relation of `_links`: a single object for one link, an array
    /// for several.
    ///
    /// # Errors
    ///
    /// [`WriteError::EmptyRelation`] if `links` is empty.
    pub fn write_link(&mut self, rel: &str, links: &[Link]) -> Result<(), WriteError> {
        self.render(|r| r.link_relation(rel, links))
    }

    /// Write the `_embedded` member of `resource`.
    pub fn write_embedded(&mut self, resource: &Resource) -> Result<(), WriteError> {
        self.render(|r| r.embedded(resource))
    }

    /// Write one relation of `_embedded`.
    ///
    /// # Errors
    ///
    /// [`WriteError::EmptyRelation`] if `resources` is empty.
    pub fn write_embedded_rel(&mut self, rel: &str, resources: &[Resource]) -> Result<(), WriteError> {
        self.render(|r| r.embedded_relation(rel, resources))
    }

    /// Run one rendering pass. The generator's escaping mode follows the
    /// options for the pass and is restored afterwards.
    fn render(
        &mut self,
        pass: impl FnOnce(&mut Renderer<'_, W, F>) -> Result<(), WriteError>,
    ) -> Result<(), WriteError> {
        let options = self.options;
        let generator = match &mut self.target {
            Target::Owned(generator) => generator,
            Target::Borrowed(generator) => &mut **generator,
        };
        let escape = generator.escape_non_ascii();
        generator.set_escape_non_ascii(options.escape_non_ascii);
        let mut renderer = Renderer {
            json: generator,
            options,
            diagnostics: &mut self.diagnostics,
        };
        let result = pass(&mut renderer);
        renderer.json.set_escape_non_ascii(escape);
        result
    }
}

/// One pass over a value graph.
struct Renderer<'w, W, F> {
    json: &'w mut JsonGenerator<W, F>,
    options: WriterOptions,
    diagnostics: &'w mut Vec<FieldFailure>,
}

impl<W: io::Write, F: Formatter> Renderer<'_, W, F> {
    fn object(&mut self, value: &dyn HalObject) -> Result<(), WriteError> {
        let fields = Fields::of(value);
        let (entries, failures) = fields.into_parts();
        self.diagnostics.extend(failures);

        self.json.begin_object()?;
        if let Some(resource) = value.resource() {
            self.links(resource)?;
            self.embedded(resource)?;
        }
        for (name, field) in &entries {
            if matches!(field, FieldValue::Null) && !self.options.write_nulls {
                continue;
            }
            self.json.field_name(name)?;
            self.field(field)?;
        }
        self.json.end_object()
    }

    fn list<T: HalObject>(&mut self, values: &[T]) -> Result<(), WriteError> {
        self.json.begin_array()?;
        for value in values {
            self.object(value)?;
        }
        self.json.end_array()
    }

    fn field(&mut self, value: &FieldValue<'_>) -> Result<(), WriteError> {
        match value {
            FieldValue::Null => self.json.write_null(),
            FieldValue::Data(data) => self.json.write_value(data),
            FieldValue::Object(object) => self.object(*object),
            FieldValue::List(items) => {
                self.json.begin_array()?;
                for item in items {
                    self.field(item)?;
                }
                self.json.end_array()
            }
        }
    }

    // links

    fn links(&mut self, resource: &Resource) -> Result<(), WriteError> {
        let relations = resource.link_relations();
        if relations.is_empty() && !self.options.write_empty_links {
            return Ok(());
        }
        self.json.begin_object_field("_links")?;
        for rel in relations {
            self.link_relation(rel, resource.links_with_rel(rel))?;
        }
        self.json.end_object()
    }

    fn link_relation(&mut self, rel: &str, links: &[Link]) -> Result<(), WriteError> {
        match links {
            [] => Err(WriteError::EmptyRelation(rel.to_string())),
            [link] => {
                self.json.field_name(rel)?;
                self.link(link)
            }
            links => {
                self.json.begin_array_field(rel)?;
                for link in links {
                    self.link(link)?;
                }
                self.json.end_array()
            }
        }
    }

    fn link(&mut self, link: &Link) -> Result<(), WriteError> {
        self.json.begin_object()?;
        self.opt_str("name", link.name())?;
        self.opt_str("title", link.title())?;
        self.json.field_name("href")?;
        self.json.write_str(link.href())?;
        self.opt_str("hreflang", link.hreflang())?;
        self.opt_str("type", link.media_type())?;
        self.opt_str("profile", link.profile())?;
        self.opt_str("deprecation", link.deprecation())?;
        match link.templated() {
            Some(templated) => {
                self.json.field_name("templated")?;
                self.json.write_bool(templated)?;
            }
            None if self.options.write_nulls => {
                self.json.field_name("templated")?;
                self.json.write_null()?;
            }
            None => {}
        }
        self.json.end_object()
    }

    fn opt_str(&mut self, name: &str, value: Option<&str>) -> Result<(), WriteError> {
        match value {
            Some(value) => {
                self.json.field_name(name)?;
                self.json.write_str(value)
            }
            None if self.options.write_nulls => {
                self.json.field_name(name)?;
                self.json.write_null()
            }
            None => Ok(()),
        }
    }

    // embedded

    fn embedded(&mut self, resource: &Resource) -> Result<(), WriteError> {
        let relations = resource.embedded_relations();
        if relations.is_empty() && !self.options.write_empty_embedded {
            return Ok(());
        }
        self.json.begin_object_field("_embedded")?;
        for rel in relations {
            self.embedded_relation(rel, resource.embedded_with_rel(rel))?;
        }
        self.json.end_object()
    }

    fn embedded_relation(&mut self, rel: &str, resources: &[Resource]) -> Result<(), WriteError> {
        match resources {
            [] => Err(WriteError::EmptyRelation(rel.to_string())),
            [resource] => {
                self.json.field_name(rel)?;
                self.object(resource)
            }
            resources => {
                self.json.begin_array_field(rel)?;
                for resource in resources {
                    self.object(resource)?;
                }
                self.json.end_array()
            }
        }
    }
}

// --- convenience -------------------------------------------------------------

/// Render `value` as a compact HAL-JSON string with default options.
pub fn to_string(value: &dyn HalObject) -> Result<String, WriteError> {
    to_string_with(value, WriterOptions::default())
}

/// Render `value` as a compact HAL-JSON string.
pub fn to_string_with(value: &dyn HalObject, options: WriterOptions) -> Result<String, WriteError> {
    let bytes = to_vec(value, options)?;
    // The generator only ever writes valid UTF-8.
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Render `value` as an indented HAL-JSON string with default options.
pub fn to_string_pretty(value: &dyn HalObject) -> Result<String, WriteError> {
    let mut buf = Vec::new();
    HalWriter::pretty(&mut buf).write(value)?;
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

/// Render `value` as compact HAL-JSON bytes.
pub fn to_vec(value: &dyn HalObject, options: WriterOptions) -> Result<Vec<u8>, WriteError> {
    let mut buf = Vec::new();
    to_writer(&mut buf, value, options)?;
    Ok(buf)
}

/// Render `value` into `writer` as compact HAL JSON.
pub fn to_writer<W: io::Write>(
    writer: W,
    value: &dyn HalObject,
    options: WriterOptions,
) -> Result<(), WriteError> {
    HalWriter::new(writer).with_options(options).write(value)
}

// --- tests -------------------------------------------------------------------
