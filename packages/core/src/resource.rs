use std::sync::OnceLock;

use indexmap::IndexMap;
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;
use thiserror::Error;

use crate::types::{rel, Link, Uri};
use crate::validation::{validate_uri, InvalidUri};

/// Errors raised by [`Resource`] accessors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ResourceError {
    #[error("the resource has no self-related link set")]
    NoSelfLink,

    #[error(transparent)]
    InvalidUri(#[from] InvalidUri),

    #[error("cannot embed a resource that carries no relation")]
    MissingRelation,

    #[error("{0:?} is a reserved member name and cannot be used as a property")]
    ReservedProperty(String),
}

/// Member names that the HAL output or the flat binding form already use.
pub const RESERVED_PROPERTIES: [&str; 5] = ["_links", "_embedded", "rel", "links", "embedded"];

/// A HAL resource: links and embedded resources, both grouped by relation,
/// plus an ordered bag of resource state (properties).
///
/// Every collection keeps insertion order, both across relations and within
/// one relation, so the views below and the rendered JSON are deterministic.
///
/// Two views are offered over the same data:
///
/// - relation-scoped: [`links_with_rel`](Self::links_with_rel),
///   [`link_relations`](Self::link_relations),
///   [`embedded_with_rel`](Self::embedded_with_rel), …
/// - flat: [`links`](Self::links) and [`embedded`](Self::embedded), in the
///   order a binding format that writes a plain sequence needs.
///
/// Embedded children are owned values. Embedding the same child into two
/// parents means embedding two clones.
///
/// The resource is not internally synchronised. Shared references may be
/// read (and serialised) from several threads; mutation requires `&mut`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(try_from = "FlatResource")]
pub struct Resource {
    links: IndexMap<String, Vec<Link>>,
    embedded: IndexMap<String, Vec<Resource>>,
    properties: IndexMap<String, Value>,

    /// Relation this resource was embedded under. Only meaningful for
    /// wholesale replacement through [`Resource::set_embedded`].
    rel: Option<String>,

    uri: Option<Uri>,
    derived_uri: OnceLock<Uri>,
}

impl Resource {
    /// Create a resource with a `self` link to `href`.
    ///
    /// The href is not validated here; [`Resource::uri`] reports a malformed
    /// href when it is first asked for.
    pub fn new(href: impl Into<String>) -> Self {
        let mut resource = Self::default();
        resource.add_link(rel::SELF, href);
        resource
    }

    /// Create a resource from an already validated URI. The URI becomes both
    /// the explicit canonical URI and the target of the `self` link.
    pub fn with_uri(uri: Uri) -> Self {
        let mut resource = Self::new(uri.as_str());
        resource.uri = Some(uri);
        resource
    }

    /// The relation tag recorded by the last [`embed`](Self::embed).
    pub fn rel(&self) -> Option<&str> {
        self.rel.as_deref()
    }

    /// Tag this resource with a relation so that
    /// [`embed_tagged`](Self::embed_tagged) and
    /// [`set_embedded`](Self::set_embedded) know where to put it.
    pub fn set_rel(&mut self, rel: impl Into<String>) -> &mut Self {
        self.rel = Some(rel.into());
        self
    }

    /// The canonical URI of this resource.
    ///
    /// An explicit URI (see [`with_uri`](Self::with_uri)) wins. Otherwise the
    /// href of the unnamed `self` link is parsed on first access and cached.
    ///
    /// # Errors
    ///
    /// [`ResourceError::NoSelfLink`] when there is no unnamed `self` link,
    /// [`ResourceError::InvalidUri`] when its href is not a valid URI.
    pub fn uri(&self) -> Result<&Uri, ResourceError> {
        if let Some(uri) = &self.uri {
            return Ok(uri);
        }
        if let Some(uri) = self.derived_uri.get() {
            return Ok(uri);
        }
        let self_link = self.link(rel::SELF).ok_or(ResourceError::NoSelfLink)?;
        let uri = validate_uri(self_link.href())?;
        Ok(self.derived_uri.get_or_init(|| uri))
    }

    // --- links ---------------------------------------------------------------

    /// Attach a new link and return it for further configuration.
    ///
    /// Links accumulate: adding a second link with the same `rel` keeps the
    /// first one.
    pub fn add_link(&mut self, rel: impl Into<String>, href: impl Into<String>) -> &mut Link {
        let link = Link::new(rel, href);
        let bucket = self.links.entry(link.rel().to_string()).or_default();
        let index = bucket.len();
        bucket.push(link);
        &mut bucket[index]
    }

    /// Attach pre-built links, each under its own `rel`.
    pub fn add_links(&mut self, links: impl IntoIterator<Item = Link>) -> &mut Self {
        for link in links {
            self.links
                .entry(link.rel().to_string())
                .or_default()
                .push(link);
        }
        self
    }

    /// Replace every link. The relation map is cleared first and a URI
    /// derived from the previous `self` link is forgotten.
    pub fn set_links(&mut self, links: impl IntoIterator<Item = Link>) -> &mut Self {
        self.links.clear();
        self.derived_uri = OnceLock::new();
        self.add_links(links)
    }

    /// All links, grouped by relation in first-use order.
    pub fn links(&self) -> Vec<&Link> {
        self.links.values().flatten().collect()
    }

    /// The links of one relation in insertion order; empty if there are none.
    pub fn links_with_rel(&self, rel: &str) -> &[Link] {
        self.links.get(rel).map(Vec::as_slice).unwrap_or(&[])
    }

    /// The link of `rel` that has no name.
    ///
    /// Returns `None` when every link of that relation is named, even though
    /// links exist under it.
    pub fn link(&self, rel: &str) -> Option<&Link> {
        self.links_with_rel(rel)
            .iter()
            .find(|link| link.name().is_none())
    }

    /// The link matching both `rel` and `name` exactly.
    pub fn named_link(&self, rel: &str, name: &str) -> Option<&Link> {
        self.links_with_rel(rel)
            .iter()
            .find(|link| link.name() == Some(name))
    }

    /// Relations that currently have at least one link, in first-use order.
    pub fn link_relations(&self) -> Vec<&str> {
        self.links
            .iter()
            .filter(|(_, links)| !links.is_empty())
            .map(|(rel, _)| rel.as_str())
            .collect()
    }

    // --- embedded ------------------------------------------------------------

    /// Embed resources under `rel`, tagging each of them with that relation.
    ///
    /// Repeated calls accumulate. Embedding nothing leaves `rel` unpopulated.
    pub fn embed(
        &mut self,
        rel: impl Into<String>,
        resources: impl IntoIterator<Item = Resource>,
    ) -> &mut Self {
        let rel = rel.into();
        let mut resources = resources.into_iter().peekable();
        if resources.peek().is_none() {
            return self;
        }
        let bucket = self.embedded.entry(rel.clone()).or_default();
        for mut resource in resources {
            resource.rel = Some(rel.clone());
            bucket.push(resource);
        }
        self
    }

    /// Embed a resource under the relation it is already tagged with.
    ///
    /// # Errors
    ///
    /// [`ResourceError::MissingRelation`] if the resource carries no tag.
    pub fn embed_tagged(&mut self, resource: Resource) -> Result<&mut Self, ResourceError> {
        let rel = resource.rel.clone().ok_or(ResourceError::MissingRelation)?;
        self.embedded.entry(rel).or_default().push(resource);
        Ok(self)
    }

    /// Replace every embedded resource. Each resource goes under its own
    /// relation tag; untagged resources are skipped.
    pub fn set_embedded(&mut self, resources: impl IntoIterator<Item = Resource>) -> &mut Self {
        self.embedded.clear();
        for resource in resources {
            if let Err(e) = self.embed_tagged(resource) {
                tracing::warn!("skipping embedded resource: {e}");
            }
        }
        self
    }

    /// All embedded resources, grouped by relation in first-use order.
    pub fn embedded(&self) -> Vec<&Resource> {
        self.embedded.values().flatten().collect()
    }

    /// The resources embedded under one relation; empty if there are none.
    pub fn embedded_with_rel(&self, rel: &str) -> &[Resource] {
        self.embedded.get(rel).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Relations that currently have at least one embedded resource.
    pub fn embedded_relations(&self) -> Vec<&str> {
        self.embedded
            .iter()
            .filter(|(_, resources)| !resources.is_empty())
            .map(|(rel, _)| rel.as_str())
            .collect()
    }

    // --- properties ----------------------------------------------------------

    /// Set a state property. Replacing an existing property keeps its position.
    ///
    /// # Errors
    ///
    /// [`ResourceError::ReservedProperty`] if `name` is one of
    /// [`RESERVED_PROPERTIES`]; the resource is left unchanged.
    pub fn set_property(
        &mut self,
        name: impl Into<String>,
        value: impl Into<Value>,
    ) -> Result<&mut Self, ResourceError> {
        let name = name.into();
        if RESERVED_PROPERTIES.contains(&name.as_str()) {
            return Err(ResourceError::ReservedProperty(name));
        }
        self.properties.insert(name, value.into());
        Ok(self)
    }

    pub fn property(&self, name: &str) -> Option<&Value> {
        self.properties.get(name)
    }

    pub fn properties(&self) -> &IndexMap<String, Value> {
        &self.properties
    }

    pub fn remove_property(&mut self, name: &str) -> Option<Value> {
        self.properties.shift_remove(name)
    }
}

/// Resources compare by links, embedded resources, and properties. The
/// relation tag and the URI cache are not part of a resource's identity.
impl PartialEq for Resource {
    fn eq(&self, other: &Self) -> bool {
        self.links == other.links
            && self.embedded == other.embedded
            && self.properties == other.properties
    }
}

// --- flat binding form -------------------------------------------------------

/// Serialises the flat binding form:
/// `{"rel"?, "links": [...], "embedded"?: [...], <property>...}`.
///
/// This is not HAL JSON; use [`HalWriter`](crate::HalWriter) for that.
impl Serialize for Resource {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        if let Some(rel) = &self.rel {
            map.serialize_entry("rel", rel)?;
        }
        map.serialize_entry("links", &self.links())?;
        if !self.embedded.is_empty() {
            map.serialize_entry("embedded", &self.embedded())?;
        }
        for (name, value) in &self.properties {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

#[derive(Deserialize)]
struct FlatResource {
    #[serde(default)]
    rel: Option<String>,
    #[serde(default)]
    links: Vec<Link>,
    #[serde(default)]
    embedded: Vec<Resource>,
    #[serde(flatten)]
    properties: IndexMap<String, Value>,
}

impl TryFrom<FlatResource> for Resource {
    type Error = ResourceError;

    fn try_from(flat: FlatResource) -> Result<Self, Self::Error> {
        let mut resource = Resource {
            rel: flat.rel,
            ..Resource::default()
        };
        for (name, value) in flat.properties {
            resource.set_property(name, value)?;
        }
        resource.set_links(flat.links);
        resource.set_embedded(flat.embedded);
        Ok(resource)
    }
}

// --- tests -------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::UriDefect;

    fn tagged(rel: &str) -> Resource {
        let mut res = Resource::default();
        res.set_rel(rel);
        res
    }

    fn named(rel: &str, href: &str, name: &str) -> Link {
        let mut link = Link::new(rel, href);
        link.set_name(name);
        link
    }

    #[test]
    fn new_creates_self_link_and_uri() {
        let res = Resource::new("http://example.com/orders/1");
        let self_link = res.link("self").expect("self link");
        assert_eq!(self_link.href(), "http://example.com/orders/1");
        assert_eq!(res.uri().unwrap().as_str(), "http://example.com/orders/1");
    }

    #[test]
    fn bare_resource_with_later_self_link_has_same_uri() {
        let mut bare = Resource::default();
        bare.add_link("self", "orders/1");
        assert_eq!(bare.uri().unwrap(), Resource::new("orders/1").uri().unwrap());
    }

    #[test]
    fn explicit_uri_wins() {
        let res = Resource::with_uri(Uri::parse("https://example.com/a").unwrap());
        assert_eq!(res.uri().unwrap().as_str(), "https://example.com/a");
        assert_eq!(res.links_with_rel("self").len(), 1);
    }

    #[test]
    fn uri_without_self_link_fails() {
        let mut res = Resource::default();
        res.add_link("next", "/p/2");
        assert_eq!(res.uri().unwrap_err(), ResourceError::NoSelfLink);
    }

    #[test]
    fn uri_with_only_named_self_links_fails() {
        let mut res = Resource::default();
        res.add_links([named("self", "/a", "alias")]);
        assert_eq!(res.uri().unwrap_err(), ResourceError::NoSelfLink);
    }

    #[test]
    fn malformed_href_fails_only_when_resolved() {
        let res = Resource::new("not a uri");
        assert_eq!(res.link("self").map(Link::href), Some("not a uri"));
        match res.uri().unwrap_err() {
            ResourceError::InvalidUri(e) => {
                assert_eq!(e.invalid_uri(), "not a uri");
                assert_eq!(e.defect(), &UriDefect::ForbiddenCharacter(' ', 3));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn set_links_forgets_derived_uri() {
        let mut res = Resource::new("/old");
        assert_eq!(res.uri().unwrap().as_str(), "/old");
        res.set_links([Link::new("self", "/new")]);
        assert_eq!(res.uri().unwrap().as_str(), "/new");
    }

    #[test]
    fn add_link_is_additive_and_ordered() {
        let mut res = Resource::default();
        for i in 0..5 {
            res.add_link("item", format!("/items/{i}"));
        }
        let hrefs: Vec<&str> = res.links_with_rel("item").iter().map(Link::href).collect();
        assert_eq!(hrefs, ["/items/0", "/items/1", "/items/2", "/items/3", "/items/4"]);
    }

    #[test]
    fn add_link_returns_the_attached_link() {
        let mut res = Resource::default();
        res.add_link("next", "/p/2").set_title("Next").set_name("page");
        let link = res.named_link("next", "page").expect("named link");
        assert_eq!(link.title(), Some("Next"));
    }

    #[test]
    fn add_links_groups_by_rel() {
        let mut res = Resource::default();
        res.add_links([
            Link::new("next", "http://test.com"),
            Link::new("other", "http://test2.com"),
            Link::new("next", "http://test3.com"),
        ]);
        assert_eq!(res.links_with_rel("next").len(), 2);
        assert_eq!(res.links_with_rel("other").len(), 1);
        assert_eq!(res.link_relations(), ["next", "other"]);
        let flat: Vec<&str> = res.links().into_iter().map(Link::href).collect();
        assert_eq!(flat, ["http://test.com", "http://test3.com", "http://test2.com"]);
    }

    #[test]
    fn links_with_unknown_rel_is_empty() {
        assert!(Resource::default().links_with_rel("next").is_empty());
    }

    #[test]
    fn link_skips_named_links() {
        let mut res = Resource::default();
        res.add_links([named("alt", "/a", "a"), Link::new("alt", "/b")]);
        assert_eq!(res.link("alt").map(Link::href), Some("/b"));
    }

    #[test]
    fn link_is_absent_when_all_are_named() {
        let mut res = Resource::default();
        res.add_links([named("alt", "/a", "a"), named("alt", "/b", "b")]);
        assert_eq!(res.links_with_rel("alt").len(), 2);
        assert!(res.link("alt").is_none());
    }

    #[test]
    fn named_link_matches_exactly() {
        let mut res = Resource::default();
        res.add_links([named("alt", "/a", "a"), named("other", "/b", "b")]);
        assert_eq!(res.named_link("alt", "a").map(Link::href), Some("/a"));
        assert!(res.named_link("alt", "b").is_none());
        assert!(res.named_link("missing", "a").is_none());
    }

    #[test]
    fn set_links_replaces_everything() {
        let mut res = Resource::default();
        res.set_links([Link::new("a", "/a")]);
        res.set_links([Link::new("b", "/b")]);
        assert_eq!(res.link_relations(), ["b"]);
        assert!(res.links_with_rel("a").is_empty());
    }

    #[test]
    fn link_add_to_copies_into_each_resource() {
        let mut first = Resource::default();
        let mut second = Resource::default();
        Link::new("up", "/").add_to(&mut first).add_to(&mut second);
        assert_eq!(first.links_with_rel("up").len(), 1);
        assert_eq!(second.links_with_rel("up").len(), 1);
    }

    #[test]
    fn embed_tags_and_accumulates() {
        let mut res = Resource::default();
        res.embed("next", [Resource::new("/1")]);
        res.embed("other", [Resource::new("/2"), Resource::new("/3")]);
        res.embed("other", [Resource::new("/4")]);

        assert_eq!(res.embedded_with_rel("next").len(), 1);
        assert_eq!(res.embedded_with_rel("other").len(), 3);
        assert!(res
            .embedded_with_rel("other")
            .iter()
            .all(|child| child.rel() == Some("other")));
        assert_eq!(res.embedded_relations(), ["next", "other"]);
        assert_eq!(res.embedded().len(), 4);
    }

    #[test]
    fn embed_nothing_leaves_relation_unpopulated() {
        let mut res = Resource::default();
        res.embed("next", Vec::<Resource>::new());
        assert!(res.embedded_with_rel("next").is_empty());
        assert!(res.embedded_relations().is_empty());
    }

    #[test]
    fn embed_tagged_requires_a_relation() {
        let mut res = Resource::default();
        assert_eq!(
            res.embed_tagged(Resource::new("/x")).unwrap_err(),
            ResourceError::MissingRelation
        );
        res.embed_tagged(tagged("item")).unwrap();
        assert_eq!(res.embedded_with_rel("item").len(), 1);
    }

    #[test]
    fn set_embedded_groups_by_tag_and_replaces() {
        let mut res = Resource::default();
        res.set_embedded([tagged("next"), tagged("other"), tagged("other")]);
        assert_eq!(res.embedded_with_rel("other").len(), 2);
        assert_eq!(res.embedded_with_rel("next").len(), 1);

        res.set_embedded([tagged("rel")]);
        assert_eq!(res.embedded_relations(), ["rel"]);
    }

    #[test]
    fn set_embedded_skips_untagged() {
        let mut res = Resource::default();
        res.set_embedded([Resource::default()]);
        assert!(res.embedded().is_empty());
    }

    #[test]
    fn properties_keep_insertion_order() {
        let mut res = Resource::default();
        res.set_property("total", 30.5)
            .and_then(|r| r.set_property("currency", "EUR"))
            .and_then(|r| r.set_property("total", 31.0))
            .unwrap();
        let names: Vec<&str> = res.properties().keys().map(String::as_str).collect();
        assert_eq!(names, ["total", "currency"]);
        assert_eq!(res.property("total"), Some(&serde_json::json!(31.0)));
        assert_eq!(res.remove_property("currency"), Some(serde_json::json!("EUR")));
        assert!(res.property("currency").is_none());
    }

    #[test]
    fn flat_form_round_trips() {
        let mut res = Resource::new("parent");
        res.add_link("self", "http://test.com")
            .set_name("aName")
            .set_title("aTitle")
            .set_media_type("aType");
        res.embed("other", [Resource::new("child")]);
        res.set_property("status", "open").unwrap();

        let json = serde_json::to_value(&res).unwrap();
        assert_eq!(json["embedded"][0]["rel"], "other");
        assert_eq!(json["links"][1]["name"], "aName");
        assert_eq!(json["status"], "open");

        let back: Resource = serde_json::from_value(json).unwrap();
        assert_eq!(back, res);
        assert_eq!(back.embedded_with_rel("other")[0].rel(), Some("other"));
        assert_eq!(back.named_link("self", "aName").and_then(Link::title), Some("aTitle"));
    }

    #[test]
    fn flat_form_groups_an_unordered_sequence() {
        let res: Resource = serde_json::from_str(
            r#"{
                "links": [
                    {"rel": "item", "href": "/1"},
                    {"rel": "self", "href": "/list"},
                    {"rel": "item", "href": "/2"}
                ],
                "embedded": [
                    {"rel": "item", "links": [{"rel": "self", "href": "/1"}]},
                    {"links": []}
                ]
            }"#,
        )
        .unwrap();
        assert_eq!(res.link_relations(), ["item", "self"]);
        assert_eq!(res.links_with_rel("item").len(), 2);
        assert_eq!(res.embedded().len(), 1);
        assert_eq!(res.uri().unwrap().as_str(), "/list");
    }

    #[test]
    fn reserved_property_names_are_rejected() {
        let mut res = Resource::new("/a");
        for name in RESERVED_PROPERTIES {
            assert_eq!(
                res.set_property(name, "x").err(),
                Some(ResourceError::ReservedProperty(name.to_string()))
            );
        }
        assert!(res.properties().is_empty());

        let json = serde_json::to_string(&res).unwrap();
        assert_eq!(json, r#"{"links":[{"rel":"self","href":"/a"}]}"#);
        let back: Resource = serde_json::from_str(&json).unwrap();
        assert_eq!(back, res);
    }

    #[test]
    fn flat_form_rejects_hal_member_names_as_properties() {
        let err = serde_json::from_str::<Resource>(r#"{"links":[],"_links":{"self":{"href":"/a"}}}"#)
            .unwrap_err();
        assert!(err.to_string().contains("_links"), "{err}");
    }
}
