//! Location-independent identifiers for scientific data resources.
//!
//! ### Text format
//!
//! ```text
//! scidd:/<domain>/<resource-type>/<path>/<segments>#<fragment>
//! scidd:/<domain>/search?<query>
//! ```
//!
//! - The scheme is the literal `scidd`, matched case-insensitively.
//! - The domain is every segment before the first resource-type tag
//!   (`file`, `table-row`, `column-value`, `search`, `collection`), so
//!   multi-segment domains like `astro/radio` are allowed. Domain segments are
//!   lowercased and restricted to `[a-z0-9-]`.
//! - Empty segments are dropped, so `scidd://astro//file/x/` normalizes to
//!   `scidd:/astro/file/x`.
//! - Only `file` identifiers may carry a `#fragment`; only `search`
//!   identifiers carry a `?query` (and never a path).
//!
//! Two identifiers are equal iff their normalized strings are equal.

mod resource_type;

pub use resource_type::ResourceType;

use crate::Error;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

/// The scheme literal every identifier starts with.
pub const SCHEME: &str = "scidd";

#[derive(Debug, Clone)]
enum Locator {
    Path(Vec<String>),
    Query(String),
}

/// An immutable, normalized identifier.
#[derive(Debug, Clone)]
pub struct Identifier {
    domain: String,
    resource_type: ResourceType,
    locator: Locator,
    fragment: Option<String>,
    normalized: String,
}

impl Identifier {
    /// Parse identifier text.
    ///
    /// # Errors
    ///
    /// - `MalformedIdentifier` if the scheme is missing or unrecognized, the
    ///   domain is empty, the resource type cannot be inferred from the path,
    ///   or a segment contains characters outside the allowed set.
    /// - `UnsupportedFragment` if a fragment is attached to a non-file resource.
    pub fn parse(text: &str) -> Result<Self, Error> {
        let trimmed = text.trim();
        let malformed = |reason: &str| Error::MalformedIdentifier(format!("{reason}: '{trimmed}'"));

        let (scheme, rest) = trimmed.split_once(':').ok_or_else(|| malformed("missing scheme"))?;
        if !scheme.eq_ignore_ascii_case(SCHEME) {
            return Err(malformed("unrecognized scheme"));
        }
        if !rest.starts_with('/') {
            return Err(malformed("expected '/' after scheme"));
        }

        let (body, fragment) = match rest.split_once('#') {
            Some((body, fragment)) => (body, Some(fragment)),
            None => (rest, None),
        };
        let (body, query) = match body.split_once('?') {
            Some((body, query)) => (body, Some(query)),
            None => (body, None),
        };

        let segments: Vec<&str> = body.split('/').filter(|s| !s.is_empty()).collect();
        let (type_index, resource_type) = segments
            .iter()
            .enumerate()
            .find_map(|(i, s)| ResourceType::from_tag(s).map(|t| (i, t)))
            .ok_or_else(|| malformed("cannot infer resource type from path"))?;

        if type_index == 0 {
            return Err(malformed("empty domain"));
        }
        let domain = normalize_domain(&segments[..type_index])?;

        let remainder = &segments[type_index + 1..];
        let locator = if resource_type == ResourceType::Search {
            if !remainder.is_empty() {
                return Err(malformed("search identifiers carry a query, not a path"));
            }
            let query = query.ok_or_else(|| malformed("search identifier requires a '?query'"))?;
            validate_query(query)?;
            Locator::Query(query.to_string())
        } else {
            if query.is_some() {
                return Err(malformed("only search identifiers may carry a query"));
            }
            if remainder.is_empty() {
                return Err(malformed("missing resource path"));
            }
            let mut path = Vec::with_capacity(remainder.len());
            for segment in remainder {
                validate_path_segment(segment)?;
                path.push((*segment).to_string());
            }
            Locator::Path(path)
        };

        let fragment = match fragment {
            Some(f) => {
                if !resource_type.permits_fragment() {
                    return Err(Error::UnsupportedFragment(format!(
                        "{resource_type} identifiers do not permit fragments: '{trimmed}'"
                    )));
                }
                validate_fragment(f)?;
                Some(f.to_string())
            }
            None => None,
        };

        Ok(Self::assemble(domain, resource_type, locator, fragment))
    }

    /// Build a non-search identifier from its parts.
    ///
    /// `domain` may contain `/` to express a multi-segment domain.
    pub fn new<I, S>(domain: &str, resource_type: ResourceType, path: I) -> Result<Self, Error>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        if resource_type == ResourceType::Search {
            return Err(Error::MalformedIdentifier(
                "search identifiers carry a query; use Identifier::search".into(),
            ));
        }
        let domain_segments: Vec<&str> = domain.split('/').filter(|s| !s.is_empty()).collect();
        if domain_segments.is_empty() {
            return Err(Error::MalformedIdentifier("empty domain".into()));
        }
        let domain = normalize_domain(&domain_segments)?;

        let mut segments = Vec::new();
        for segment in path {
            let segment = segment.as_ref();
            validate_path_segment(segment)?;
            segments.push(segment.to_string());
        }
        if segments.is_empty() {
            return Err(Error::MalformedIdentifier(format!("missing resource path for {resource_type} identifier")));
        }

        Ok(Self::assemble(domain, resource_type, Locator::Path(segments), None))
    }

    /// Build a search identifier carrying `query` as its payload.
    pub fn search(domain: &str, query: &str) -> Result<Self, Error> {
        let domain_segments: Vec<&str> = domain.split('/').filter(|s| !s.is_empty()).collect();
        if domain_segments.is_empty() {
            return Err(Error::MalformedIdentifier("empty domain".into()));
        }
        let domain = normalize_domain(&domain_segments)?;
        validate_query(query)?;
        Ok(Self::assemble(domain, ResourceType::Search, Locator::Query(query.to_string()), None))
    }

    /// Return a copy of this identifier selecting `fragment`.
    ///
    /// Replaces any existing fragment.
    pub fn with_fragment(&self, fragment: &str) -> Result<Self, Error> {
        if !self.resource_type.permits_fragment() {
            return Err(Error::UnsupportedFragment(format!(
                "{} identifiers do not permit fragments: '{}'",
                self.resource_type, self.normalized
            )));
        }
        validate_fragment(fragment)?;
        Ok(Self::assemble(self.domain.clone(), self.resource_type, self.locator.clone(), Some(fragment.to_string())))
    }

    /// Return a copy of this identifier without its fragment.
    pub fn without_fragment(&self) -> Self {
        if self.fragment.is_none() {
            return self.clone();
        }
        Self::assemble(self.domain.clone(), self.resource_type, self.locator.clone(), None)
    }

    fn assemble(domain: String, resource_type: ResourceType, locator: Locator, fragment: Option<String>) -> Self {
        let mut normalized = format!("{SCHEME}:/{domain}/{}", resource_type.tag());
        match &locator {
            Locator::Path(segments) => {
                normalized.push('/');
                normalized.push_str(&segments.join("/"));
            }
            Locator::Query(query) => {
                normalized.push('?');
                normalized.push_str(query);
            }
        }
        if let Some(fragment) = &fragment {
            normalized.push('#');
            normalized.push_str(fragment);
        }

        Self { domain, resource_type, locator, fragment, normalized }
    }

    /// Canonical text form; `Identifier::parse` of it yields an equal identifier.
    pub fn normalized_string(&self) -> String {
        self.normalized.clone()
    }

    pub fn as_str(&self) -> &str {
        &self.normalized
    }

    pub fn scheme(&self) -> &'static str {
        SCHEME
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    pub fn resource_type(&self) -> ResourceType {
        self.resource_type
    }

    /// Path segments after the resource-type tag. Empty for search identifiers.
    pub fn path_segments(&self) -> &[String] {
        match &self.locator {
            Locator::Path(segments) => segments,
            Locator::Query(_) => &[],
        }
    }

    /// Query payload of a search identifier.
    pub fn query(&self) -> Option<&str> {
        match &self.locator {
            Locator::Query(query) => Some(query),
            Locator::Path(_) => None,
        }
    }

    pub fn fragment(&self) -> Option<&str> {
        self.fragment.as_deref()
    }

    /// Last path segment. Not guaranteed to be unique across identifiers.
    pub fn filename(&self) -> Option<&str> {
        self.path_segments().last().map(String::as_str)
    }
}

fn normalize_domain(segments: &[&str]) -> Result<String, Error> {
    let mut normalized = Vec::with_capacity(segments.len());
    for segment in segments {
        let lower = segment.to_ascii_lowercase();
        if !lower.bytes().all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-') {
            return Err(Error::MalformedIdentifier(format!(
                "domain segment '{segment}' must contain only lowercase letters, digits and '-'"
            )));
        }
        if ResourceType::from_tag(&lower).is_some() {
            return Err(Error::MalformedIdentifier(format!(
                "domain segment '{segment}' collides with a resource-type tag"
            )));
        }
        normalized.push(lower);
    }
    Ok(normalized.join("/"))
}

fn is_printable_ascii(s: &str) -> bool {
    s.bytes().all(|b| b.is_ascii_graphic())
}

fn validate_path_segment(segment: &str) -> Result<(), Error> {
    if segment.is_empty() || segment == "." || segment == ".." {
        return Err(Error::MalformedIdentifier(format!("invalid path segment '{segment}'")));
    }
    if !is_printable_ascii(segment) || segment.contains(['/', '?', '#']) {
        return Err(Error::MalformedIdentifier(format!(
            "path segment '{segment}' must be printable ASCII without '/', '?' or '#'"
        )));
    }
    Ok(())
}

fn validate_query(query: &str) -> Result<(), Error> {
    if query.is_empty() || !is_printable_ascii(query) || query.contains('#') {
        return Err(Error::MalformedIdentifier(format!(
            "search query '{query}' must be non-empty printable ASCII without '#'"
        )));
    }
    Ok(())
}

fn validate_fragment(fragment: &str) -> Result<(), Error> {
    if fragment.is_empty() || !is_printable_ascii(fragment) || fragment.contains('#') {
        return Err(Error::MalformedIdentifier(format!(
            "fragment '{fragment}' must be non-empty printable ASCII without '#'"
        )));
    }
    Ok(())
}

impl PartialEq for Identifier {
    fn eq(&self, other: &Self) -> bool {
        self.normalized == other.normalized
    }
}

impl Eq for Identifier {}

impl Hash for Identifier {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.normalized.hash(state);
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.normalized)
    }
}

impl FromStr for Identifier {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for Identifier {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.normalized)
    }
}

impl<'de> Deserialize<'de> for Identifier {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Self::parse(&text).map_err(serde::de::Error::custom)
    }
}
