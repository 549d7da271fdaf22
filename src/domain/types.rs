//! Identifiers and enumerations shared across layers, aligned with the
//! persisted schema.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Persistence-assigned key of an entry.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, sqlx::Type,
)]
#[serde(transparent)]
#[sqlx(transparent)]
pub struct EntryId(pub i64);

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Persistence-assigned key of a tag.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, sqlx::Type,
)]
#[serde(transparent)]
#[sqlx(transparent)]
pub struct TagId(pub i64);

impl fmt::Display for TagId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Kind of a tag. Labels are unique per kind, not globally.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, sqlx::Type,
)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "tag_kind", rename_all = "snake_case")]
pub enum TagKind {
    General,
    Category,
    Series,
}

impl TagKind {
    pub const ALL: [TagKind; 3] = [TagKind::General, TagKind::Category, TagKind::Series];

    pub fn as_str(self) -> &'static str {
        match self {
            TagKind::General => "general",
            TagKind::Category => "category",
            TagKind::Series => "series",
        }
    }

    /// Path segment under which tag pages of this kind are served.
    pub fn route_prefix(self) -> &'static str {
        match self {
            TagKind::General => "tags",
            TagKind::Category => "categories",
            TagKind::Series => "series",
        }
    }

    /// Single-character marker used in archive files (`#rust`, `@notes`, `+tutorial`).
    pub fn sigil(self) -> char {
        match self {
            TagKind::General => '#',
            TagKind::Category => '@',
            TagKind::Series => '+',
        }
    }

    pub fn from_sigil(sigil: char) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.sigil() == sigil)
    }

    /// Human label used in page headings.
    pub fn display_name(self) -> &'static str {
        match self {
            TagKind::General => "Tag",
            TagKind::Category => "Category",
            TagKind::Series => "Series",
        }
    }
}

impl fmt::Display for TagKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TagKind {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "general" => Ok(TagKind::General),
            "category" => Ok(TagKind::Category),
            "series" => Ok(TagKind::Series),
            other => Err(format!("unknown tag kind `{other}`")),
        }
    }
}

/// Listing order for published entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    NewestFirst,
    OldestFirst,
}
