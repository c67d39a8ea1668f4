//! HAL resource model and HAL-JSON writer.
//!
//! A [`Resource`] carries typed hyperlinks grouped by relation, may embed
//! other resources (also grouped by relation) and holds an ordered bag of
//! state properties. [`HalWriter`] renders resources, and any other value
//! implementing [`HalObject`], as HAL JSON with `_links` and `_embedded`
//! sections followed by the value's own fields.
//!
//! This crate is the foundation for the `halite` CLI and the
//! `halite-conformance` suite.
//!
//! # Crate layout
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`types`] | [`Link`], the validated [`Uri`], and well-known relations in [`rel`] |
//! | [`validation`] | URI reference checking via [`validate_uri`] |
//! | [`resource`] | The relation-keyed [`Resource`] model and its flat serde form |
//! | [`options`] | [`WriterOptions`], typed option setting, environment overrides |
//! | [`generator`] | [`JsonGenerator`], event-level JSON output |
//! | [`object`] | The [`HalObject`] trait and the [`Fields`] collector |
//! | [`writer`] | [`HalWriter`] and the `to_string`/`to_writer` helpers |
//!
//! # Quick start
//!
//! ```rust,ignore
//! use halite::Resource;
//!
//! let mut order = Resource::new("/orders/1");
//! order.add_link("customer", "/customers/7").set_title("Buyer");
//! order.embed("item", [Resource::new("/items/1"), Resource::new("/items/2")]);
//! order.set_property("total", 30.5)?;
//!
//! let json = halite::to_string(&order)?;
//! // {"_links":{"self":{"href":"/orders/1"},"customer":{"title":"Buyer","href":"/customers/7"}},
//! //  "_embedded":{"item":[{...},{...}]},"total":30.5}
//! ```

pub mod generator;
pub mod object;
pub mod options;
pub mod resource;
pub mod types;
pub mod validation;
pub mod writer;

pub use generator::{JsonGenerator, WriteError};
pub use object::{FieldFailure, FieldValue, Fields, HalObject, UNREADABLE_FIELD};
pub use options::{HalOption, OptionError, WriterOptions};
pub use resource::{Resource, ResourceError, RESERVED_PROPERTIES};
pub use types::{rel, Link, Uri};
pub use validation::{validate_uri, InvalidUri, UriDefect};
pub use writer::{to_string, to_string_pretty, to_string_with, to_vec, to_writer, HalWriter};
