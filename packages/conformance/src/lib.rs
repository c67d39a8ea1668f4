//! Shared fixtures for the halite conformance test suite.
//!
//! Provides typed values that exercise every rendering path of
//! [`HalWriter`]: a plain record ([`Measurement`]), a record nested inside a
//! resource ([`OrderLine`]), and a typed resource with a two-level ancestor
//! chain ([`Order`] wraps [`Entity`], which wraps [`Resource`]). The render
//! helpers panic on failure so that tests can assert on the output directly.

use std::io;

use halite::{Fields, HalObject, HalWriter, Resource, WriterOptions};
use serde::Serialize;
use serde_json::Value;

/// A plain record without links.
#[derive(Debug, Clone, Serialize)]
pub struct Measurement {
    pub name: String,
    pub size: u32,
    pub scale: f64,
}

impl HalObject for Measurement {
    fn fields<'a>(&'a self, fields: &mut Fields<'a>) {
        fields
            .data("name", &self.name)
            .data("size", &self.size)
            .data("scale", &self.scale);
    }
}

/// The common base of stored resources: an id and an optimistic-lock version.
#[derive(Debug, Clone)]
pub struct Entity {
    pub resource: Resource,
    pub id: u64,
    pub version: Option<u32>,
}

impl Entity {
    pub fn new(href: &str, id: u64) -> Self {
        Self {
            resource: Resource::new(href),
            id,
            version: None,
        }
    }
}

impl HalObject for Entity {
    fn resource(&self) -> Option<&Resource> {
        Some(&self.resource)
    }

    fn fields<'a>(&'a self, fields: &mut Fields<'a>) {
        fields.data("id", &self.id).data("version", &self.version);
        fields.inherit(&self.resource);
    }
}

/// One line of an [`Order`]; rendered as a plain nested object.
#[derive(Debug, Clone)]
pub struct OrderLine {
    pub sku: String,
    pub quantity: u32,
}

impl HalObject for OrderLine {
    fn fields<'a>(&'a self, fields: &mut Fields<'a>) {
        fields.data("sku", &self.sku).data("quantity", &self.quantity);
    }
}

/// A typed resource two levels above [`Resource`].
#[derive(Debug, Clone)]
pub struct Order {
    pub entity: Entity,
    pub total: f64,
    pub currency: String,
    pub lines: Vec<OrderLine>,
    /// Rendered inline as a nested HAL object, not under `_embedded`.
    pub customer: Option<Resource>,
}

impl Order {
    pub fn new(href: &str, id: u64) -> Self {
        Self {
            entity: Entity::new(href, id),
            total: 0.0,
            currency: "EUR".into(),
            lines: Vec::new(),
            customer: None,
        }
    }

    pub fn resource_mut(&mut self) -> &mut Resource {
        &mut self.entity.resource
    }
}

impl HalObject for Order {
    fn resource(&self) -> Option<&Resource> {
        Some(&self.entity.resource)
    }

    fn fields<'a>(&'a self, fields: &mut Fields<'a>) {
        fields
            .data("total", &self.total)
            .data("currency", &self.currency)
            .objects("lines", &self.lines)
            .object_opt("customer", self.customer.as_ref());
        fields.inherit(&self.entity);
    }
}

/// A chain of `depth` resources, each embedding the next under `child`.
/// The outermost resource is `/0`.
pub fn nested(depth: usize) -> Resource {
    let mut node = Resource::new(format!("/{}", depth.saturating_sub(1)));
    for level in (0..depth.saturating_sub(1)).rev() {
        let mut parent = Resource::new(format!("/{level}"));
        parent.embed("child", [node]);
        node = parent;
    }
    node
}

/// Compact HAL JSON with default options.
pub fn render(value: &dyn HalObject) -> String {
    render_with(value, WriterOptions::default())
}

/// Compact HAL JSON with the given options.
pub fn render_with(value: &dyn HalObject, options: WriterOptions) -> String {
    halite::to_string_with(value, options).expect("render HAL JSON")
}

/// Indented HAL JSON with default options.
pub fn render_pretty(value: &dyn HalObject) -> String {
    halite::to_string_pretty(value).expect("render pretty HAL JSON")
}

/// Render and parse back, for structural assertions.
pub fn render_value(value: &dyn HalObject) -> Value {
    serde_json::from_str(&render(value)).expect("rendered output is valid JSON")
}

/// Render `value` with an owned writer and return the output together with
/// the number of field failures recorded.
pub fn render_diagnosed(value: &dyn HalObject) -> (String, usize) {
    let mut buf = Vec::new();
    let mut writer = HalWriter::new(&mut buf);
    writer.write(value).expect("render HAL JSON");
    let failures = writer.diagnostics().len();
    drop(writer);
    (String::from_utf8(buf).expect("UTF-8 output"), failures)
}

/// A sink that accepts `budget` bytes and then fails every write.
/// Counts flushes so tests can check that the sink was finished.
#[derive(Debug, Default)]
pub struct ShortSink {
    pub written: Vec<u8>,
    pub budget: usize,
    pub flushes: usize,
}

impl ShortSink {
    pub fn new(budget: usize) -> Self {
        Self {
            budget,
            ..Self::default()
        }
    }
}

impl io::Write for ShortSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let room = self.budget - self.written.len();
        if room == 0 {
            return Err(io::Error::new(io::ErrorKind::WriteZero, "sink is full"));
        }
        let n = room.min(buf.len());
        self.written.extend_from_slice(&buf[..n]);
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.flushes += 1;
        Ok(())
    }
}
