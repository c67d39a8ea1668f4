use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;
use url::Url;

use crate::types::Uri;

/// Returned when an href cannot be resolved to a [`Uri`].
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{uri:?} is no valid URI: {defect}")]
pub struct InvalidUri {
    uri: String,
    defect: UriDefect,
}

impl InvalidUri {
    fn new(uri: &str, defect: UriDefect) -> Self {
        Self {
            uri: uri.to_string(),
            defect,
        }
    }

    /// The string that failed to parse.
    pub fn invalid_uri(&self) -> &str {
        &self.uri
    }

    pub fn defect(&self) -> &UriDefect {
        &self.defect
    }
}

/// What exactly is wrong with a rejected URI reference.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum UriDefect {
    #[error("character {0:?} at offset {1} is not permitted in a URI")]
    ForbiddenCharacter(char, usize),

    #[error("'%' must be followed by two hexadecimal digits")]
    MalformedEscape,

    #[error("{0}")]
    Unparseable(url::ParseError),
}

/// Validate a URI reference and wrap it as a [`Uri`].
///
/// Accepts absolute references (`scheme:...`) and relative references
/// (`orders/1`, `/orders`, `?page=2`, `//host/path`, and the empty string).
/// Rejected are whitespace, control characters, the delimiters
/// `< > " { } | \ ^ `` ` and a `%` that does not start a two-digit hex
/// escape. Absolute references must additionally parse as a URL; relative
/// ones must resolve against a base.
pub fn validate_uri(raw: &str) -> Result<Uri, InvalidUri> {
    if let Some(m) = FORBIDDEN_RE.find(raw) {
        let ch = raw[m.start()..].chars().next().unwrap_or_default();
        return Err(InvalidUri::new(raw, UriDefect::ForbiddenCharacter(ch, m.start())));
    }

    if raw.matches('%').count() != ESCAPE_RE.find_iter(raw).count() {
        return Err(InvalidUri::new(raw, UriDefect::MalformedEscape));
    }

    if SCHEME_RE.is_match(raw) {
        let url = Url::parse(raw).map_err(|e| InvalidUri::new(raw, UriDefect::Unparseable(e)))?;
        return Ok(Uri::from_parts(raw.to_string(), Some(url)));
    }

    RELATIVE_BASE
        .join(raw)
        .map_err(|e| InvalidUri::new(raw, UriDefect::Unparseable(e)))?;
    Ok(Uri::from_parts(raw.to_string(), None))
}

// --- helpers -----------------------------------------------------------------

/// Whitespace, controls, and delimiters excluded by RFC 3986.
static FORBIDDEN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"[\s\x00-\x1f\x7f<>"{}|\\^`]"#).expect("invalid forbidden-character regex")
});

/// `%XX`
static ESCAPE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"%[0-9A-Fa-f]{2}").expect("invalid escape regex"));

/// `^scheme:`
static SCHEME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z][A-Za-z0-9+.\-]*:").expect("invalid scheme regex")
});

// Relative references are checked by resolving them against this base.
static RELATIVE_BASE: LazyLock<Url> = LazyLock::new(|| {
    Url::parse("http://relative.invalid/").expect("invalid relative base")
});

// --- tests -------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_absolute_references() {
        for s in [
            "http://test.com",
            "https://api.example.com/orders/1?expand=items#top",
            "urn:isbn:0451450523",
            "mailto:ops@example.com",
        ] {
            let uri = validate_uri(s).unwrap_or_else(|e| panic!("{s}: {e}"));
            assert!(uri.is_absolute(), "{s}");
            assert_eq!(uri.as_str(), s);
        }
    }

    #[test]
    fn accepts_relative_references() {
        for s in ["parent", "child/1", "/orders", "?page=2", "#frag", "//cdn.example.com/x", ""] {
            let uri = validate_uri(s).unwrap_or_else(|e| panic!("{s:?}: {e}"));
            assert!(!uri.is_absolute(), "{s}");
        }
    }

    #[test]
    fn accepts_percent_escapes() {
        assert!(validate_uri("/search?q=caf%C3%A9").is_ok());
    }

    #[test]
    fn rejects_whitespace() {
        let err = validate_uri("not a uri").unwrap_err();
        assert_eq!(err.invalid_uri(), "not a uri");
        assert_eq!(err.defect(), &UriDefect::ForbiddenCharacter(' ', 3));
    }

    #[test]
    fn rejects_template_braces() {
        assert!(matches!(
            validate_uri("/orders{?page}").unwrap_err().defect(),
            UriDefect::ForbiddenCharacter('{', 7)
        ));
    }

    #[test]
    fn rejects_malformed_escape() {
        assert_eq!(
            validate_uri("/a%2").unwrap_err().defect(),
            &UriDefect::MalformedEscape
        );
        assert_eq!(
            validate_uri("/100%").unwrap_err().defect(),
            &UriDefect::MalformedEscape
        );
    }

    #[test]
    fn rejects_unparseable_absolute() {
        assert!(matches!(
            validate_uri("http://[::1").unwrap_err().defect(),
            UriDefect::Unparseable(_)
        ));
    }

    #[test]
    fn error_message_names_the_uri() {
        let err = validate_uri("a b").unwrap_err();
        assert!(err.to_string().starts_with("\"a b\" is no valid URI"));
    }
}
