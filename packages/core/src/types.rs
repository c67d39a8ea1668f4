//! Core value types of the HAL model.
//!
//! This module defines the [`Link`] that resources carry, the validated
//! [`Uri`] a resource resolves to, and the well-known relation names in
//! [`rel`]. Links serialise in their flat binding form: every link carries
//! its own `rel`, and optional attributes are omitted when absent.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::resource::Resource;
use crate::validation::{validate_uri, InvalidUri};

/// Well-known link relation names.
pub mod rel {
    /// The canonical location of a resource.
    pub const SELF: &str = "self";
    /// The next page of a paged collection.
    pub const NEXT: &str = "next";
    /// The previous page of a paged collection.
    pub const PREV: &str = "prev";
    /// The first page of a paged collection.
    pub const FIRST: &str = "first";
    /// The last page of a paged collection.
    pub const LAST: &str = "last";
}

/// A typed hyperlink from a resource to a target reference.
///
/// `rel` and `href` are fixed at construction; every other attribute is
/// optional and configured through the chainable `set_*` methods, each of
/// which returns the same link:
///
/// ```rust,ignore
/// let mut link = Link::new("next", "/orders?page=2");
/// link.set_title("Next page").set_templated(false);
/// ```
///
/// A link does not know which resources it is attached to. Attaching it to a
/// resource stores a copy in that resource's relation map.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    /// Relation identifier used for grouping.
    #[serde(default)]
    rel: String,

    /// Target reference. Stored verbatim; validated only when resolved.
    href: String,

    /// Secondary identifier distinguishing links that share a `rel`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    title: Option<String>,

    /// Media type hint for the target.
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    media_type: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    hreflang: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    profile: Option<String>,

    /// URL documenting the deprecation of this link.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    deprecation: Option<String>,

    /// Tri-state: `Some(true)`, `Some(false)`, or absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    templated: Option<bool>,
}

impl Link {
    /// Create a link with the two mandatory attributes.
    pub fn new(rel: impl Into<String>, href: impl Into<String>) -> Self {
        Self {
            rel: rel.into(),
            href: href.into(),
            ..Self::default()
        }
    }

    pub fn rel(&self) -> &str {
        &self.rel
    }

    pub fn href(&self) -> &str {
        &self.href
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    /// The `type` attribute.
    pub fn media_type(&self) -> Option<&str> {
        self.media_type.as_deref()
    }

    pub fn hreflang(&self) -> Option<&str> {
        self.hreflang.as_deref()
    }

    pub fn profile(&self) -> Option<&str> {
        self.profile.as_deref()
    }

    pub fn deprecation(&self) -> Option<&str> {
        self.deprecation.as_deref()
    }

    pub fn templated(&self) -> Option<bool> {
        self.templated
    }

    pub fn set_name(&mut self, value: impl Into<String>) -> &mut Self {
        self.name = Some(value.into());
        self
    }

    pub fn set_title(&mut self, value: impl Into<String>) -> &mut Self {
        self.title = Some(value.into());
        self
    }

    pub fn set_media_type(&mut self, value: impl Into<String>) -> &mut Self {
        self.media_type = Some(value.into());
        self
    }

    pub fn set_hreflang(&mut self, value: impl Into<String>) -> &mut Self {
        self.hreflang = Some(value.into());
        self
    }

    pub fn set_profile(&mut self, value: impl Into<String>) -> &mut Self {
        self.profile = Some(value.into());
        self
    }

    pub fn set_deprecation(&mut self, value: impl Into<String>) -> &mut Self {
        self.deprecation = Some(value.into());
        self
    }

    pub fn set_templated(&mut self, value: bool) -> &mut Self {
        self.templated = Some(value);
        self
    }

    /// Make the `templated` attribute absent again.
    pub fn clear_templated(&mut self) -> &mut Self {
        self.templated = None;
        self
    }

    /// Attach a copy of this link to `resource`, grouped under this link's
    /// `rel`. Returns the link so it can be attached to further resources.
    pub fn add_to(&self, resource: &mut Resource) -> &Self {
        resource.add_links([self.clone()]);
        self
    }

    /// Resolve `href` as a [`Uri`].
    pub fn uri(&self) -> Result<Uri, InvalidUri> {
        validate_uri(&self.href)
    }
}

/// A syntactically valid URI reference, either absolute or relative.
///
/// The original string is preserved and used for equality and display, so
/// a resource built from `"orders/1"` reports exactly `"orders/1"` back.
/// Absolute references additionally expose the parsed [`Url`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Uri {
    raw: String,
    #[serde(skip)]
    url: Option<Url>,
}

impl Uri {
    /// Parse and validate a URI reference. Equivalent to [`validate_uri`].
    pub fn parse(s: &str) -> Result<Self, InvalidUri> {
        validate_uri(s)
    }

    pub(crate) fn from_parts(raw: String, url: Option<Url>) -> Self {
        Self { raw, url }
    }

    /// The reference exactly as it was written.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// `true` when the reference carries a scheme.
    pub fn is_absolute(&self) -> bool {
        self.url.is_some()
    }

    /// The parsed URL of an absolute reference; `None` for relative ones.
    pub fn as_url(&self) -> Option<&Url> {
        self.url.as_ref()
    }

    /// The scheme of an absolute reference (e.g. `"https"`).
    pub fn scheme(&self) -> Option<&str> {
        self.url.as_ref().map(Url::scheme)
    }
}

impl fmt::Display for Uri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl FromStr for Uri {
    type Err = InvalidUri;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        validate_uri(s)
    }
}

impl TryFrom<String> for Uri {
    type Error = InvalidUri;
    fn try_from(s: String) -> Result<Self, Self::Error> {
        validate_uri(&s)
    }
}

impl From<Uri> for String {
    fn from(uri: Uri) -> Self {
        uri.raw
    }
}

impl AsRef<str> for Uri {
    fn as_ref(&self) -> &str {
        &self.raw
    }
}

// --- tests -------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn setters_chain_on_the_same_link() {
        let mut link = Link::new("search", "/orders{?q}");
        link.set_name("find")
            .set_title("Find orders")
            .set_media_type("application/hal+json")
            .set_templated(true);

        assert_eq!(link.rel(), "search");
        assert_eq!(link.href(), "/orders{?q}");
        assert_eq!(link.name(), Some("find"));
        assert_eq!(link.title(), Some("Find orders"));
        assert_eq!(link.media_type(), Some("application/hal+json"));
        assert_eq!(link.templated(), Some(true));
        assert_eq!(link.hreflang(), None);
    }

    #[test]
    fn templated_is_tri_state() {
        let mut link = Link::new("a", "/a");
        assert_eq!(link.templated(), None);
        link.set_templated(false);
        assert_eq!(link.templated(), Some(false));
        link.clear_templated();
        assert_eq!(link.templated(), None);
    }

    #[test]
    fn flat_form_omits_absent_attributes() {
        let mut link = Link::new("next", "/p/2");
        link.set_media_type("text/html");
        let json = serde_json::to_value(&link).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "rel": "next", "href": "/p/2", "type": "text/html" })
        );
    }

    #[test]
    fn flat_form_parses_back() {
        let link: Link =
            serde_json::from_str(r#"{"rel":"self","href":"http://test.com","name":"aName","templated":false}"#)
                .unwrap();
        assert_eq!(link.rel(), "self");
        assert_eq!(link.name(), Some("aName"));
        assert_eq!(link.templated(), Some(false));
    }

    #[test]
    fn uri_keeps_the_original_string() {
        let uri: Uri = "orders/1?expand=items".parse().unwrap();
        assert_eq!(uri.as_str(), "orders/1?expand=items");
        assert!(!uri.is_absolute());
        assert_eq!(uri.to_string(), "orders/1?expand=items");

        let abs = Uri::parse("https://api.example.com/orders/1").unwrap();
        assert!(abs.is_absolute());
        assert_eq!(abs.scheme(), Some("https"));
        assert_eq!(abs.as_url().map(|u| u.path()), Some("/orders/1"));
    }

    #[test]
    fn uri_deserialisation_validates() {
        assert!(serde_json::from_str::<Uri>(r#""http://ok.example""#).is_ok());
        assert!(serde_json::from_str::<Uri>(r#""not a uri""#).is_err());
    }
}
