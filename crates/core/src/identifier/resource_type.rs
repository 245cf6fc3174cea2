//! Resource types an identifier can point at.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of resource an identifier names.
///
/// The type is carried in the identifier text as a path segment tag directly
/// after the domain, e.g. `scidd:/astro/file/...`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "kebab-case")]
pub enum ResourceType {
    File,
    TableRow,
    ColumnValue,
    Search,
    Collection,
}

impl ResourceType {
    pub const ALL: [ResourceType; 5] = [
        ResourceType::File,
        ResourceType::TableRow,
        ResourceType::ColumnValue,
        ResourceType::Search,
        ResourceType::Collection,
    ];

    /// The path tag used in identifier text.
    pub fn tag(self) -> &'static str {
        match self {
            ResourceType::File => "file",
            ResourceType::TableRow => "table-row",
            ResourceType::ColumnValue => "column-value",
            ResourceType::Search => "search",
            ResourceType::Collection => "collection",
        }
    }

    /// Look up a type by its path tag. Tags are case-sensitive.
    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.tag() == tag)
    }

    /// Only file identifiers may select a sub-resource with `#fragment`.
    pub fn permits_fragment(self) -> bool {
        matches!(self, ResourceType::File)
    }

    /// Search identifiers resolve through the API-response cache only.
    pub fn is_artifact(self) -> bool {
        !matches!(self, ResourceType::Search)
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}
