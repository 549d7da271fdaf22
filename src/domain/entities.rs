//! Domain entities mirrored from persistent storage.

use serde::Serialize;
use time::OffsetDateTime;

use crate::domain::types::{EntryId, TagId, TagKind};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntryRecord {
    pub id: EntryId,
    pub title: String,
    pub content: String,
    pub image: Option<String>,
    pub created_at: Option<OffsetDateTime>,
    pub posted_at: Option<OffsetDateTime>,
    pub modified_at: Option<OffsetDateTime>,
    pub identifier: Option<String>,
}

impl EntryRecord {
    /// Entries without a posted timestamp are drafts and never listed.
    pub fn is_published(&self) -> bool {
        self.posted_at.is_some()
    }

    /// Fallback location for entries that have lost their canonical slug.
    pub fn id_path(&self) -> String {
        format!("/entry/id/{}", self.id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SlugRecord {
    pub id: i64,
    pub entry_id: EntryId,
    pub text: String,
    pub is_current: bool,
}

impl SlugRecord {
    pub fn path(&self) -> String {
        entry_path(&self.text)
    }
}

pub fn entry_path(slug: &str) -> String {
    format!("/entry/{slug}")
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TagRecord {
    pub id: TagId,
    pub label: String,
    pub kind: TagKind,
    pub description: Option<String>,
    pub slug: String,
}

impl TagRecord {
    pub fn path(&self) -> String {
        format!("/{}/{}", self.kind.route_prefix(), self.slug)
    }

    /// Archive notation: sigil followed by the label.
    pub fn marker(&self) -> String {
        format!("{}{}", self.kind.sigil(), self.label)
    }
}

/// Snapshot kept after an entry is taken down.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RemovedEntryRecord {
    pub id: i64,
    pub title: String,
    pub content: String,
    pub tags: Vec<String>,
    pub slugs: Vec<String>,
    pub removed_at: OffsetDateTime,
}
