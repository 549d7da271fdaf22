//! Repository traits describing persistence adapters.

use async_trait::async_trait;
use thiserror::Error;
use time::OffsetDateTime;

use crate::domain::entities::{EntryRecord, RemovedEntryRecord, SlugRecord, TagRecord};
use crate::domain::types::{EntryId, SortOrder, TagId, TagKind};

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("duplicate record violates unique constraint `{constraint}`")]
    Duplicate { constraint: String },
    #[error("resource not found")]
    NotFound,
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
    #[error("integrity error: {message}")]
    Integrity { message: String },
    #[error("database timeout")]
    Timeout,
}

impl RepoError {
    pub fn from_persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }
}

/// Narrows the candidate entries of a listing.
#[derive(Debug, Clone, Default)]
pub struct EntryQueryFilter {
    /// Only entries posted strictly before this instant. Unposted entries pass.
    pub posted_before: Option<OffsetDateTime>,
    /// Case-insensitive substring of the title.
    pub search: Option<String>,
}

impl EntryQueryFilter {
    pub fn matches(&self, entry: &EntryRecord) -> bool {
        if let (Some(cutoff), Some(posted)) = (self.posted_before, entry.posted_at)
            && posted >= cutoff
        {
            return false;
        }

        match self.search.as_deref() {
            Some(needle) => entry
                .title
                .to_lowercase()
                .contains(&needle.to_lowercase()),
            None => true,
        }
    }
}

/// How a tag is addressed: by its label (authoring) or its slug (URLs).
#[derive(Debug, Clone, Copy)]
pub enum TagLookup<'a> {
    Label(&'a str),
    Slug(&'a str),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagWithCount {
    pub tag: TagRecord,
    /// Published entries carrying the tag.
    pub entry_count: u64,
}

#[derive(Debug, Clone)]
pub struct CreateEntryParams {
    pub title: String,
    pub content: String,
    pub image: Option<String>,
    pub created_at: OffsetDateTime,
    pub posted_at: Option<OffsetDateTime>,
    pub identifier: Option<String>,
    pub slug: String,
    /// Non-current slugs that keep redirecting to the entry.
    pub aliases: Vec<String>,
    pub tags: Vec<TagId>,
}

#[derive(Debug, Clone)]
pub struct UpdateEntryParams {
    pub id: EntryId,
    pub title: String,
    pub content: String,
    pub image: Option<String>,
    pub posted_at: Option<OffsetDateTime>,
    pub modified_at: OffsetDateTime,
}

#[derive(Debug, Clone)]
pub struct RetitleEntryParams {
    pub id: EntryId,
    pub title: String,
    /// Slug the entry is served under afterwards.
    pub slug: String,
    pub modified_at: OffsetDateTime,
}

#[derive(Debug, Clone)]
pub struct CreateTagParams {
    pub label: String,
    pub kind: TagKind,
    pub slug: String,
    pub description: Option<String>,
}

#[async_trait]
pub trait EntriesRepo: Send + Sync {
    async fn find_entry(&self, id: EntryId) -> Result<Option<EntryRecord>, RepoError>;

    /// Closest published entry posted before `entry`, ordered by `(posted_at, id)`.
    async fn previous_entry(&self, entry: &EntryRecord) -> Result<Option<EntryRecord>, RepoError>;

    /// Closest published entry posted after `entry`, ordered by `(posted_at, id)`.
    async fn next_entry(&self, entry: &EntryRecord) -> Result<Option<EntryRecord>, RepoError>;

    async fn count_published(&self) -> Result<u64, RepoError>;

    async fn list_published(
        &self,
        order: SortOrder,
        limit: u32,
        offset: u64,
    ) -> Result<Vec<EntryRecord>, RepoError>;

    /// Every entry carrying `tag` that passes `filter`, posted or not.
    async fn list_for_tag(
        &self,
        tag: TagId,
        filter: &EntryQueryFilter,
    ) -> Result<Vec<EntryRecord>, RepoError>;

    /// Every live entry ordered by id.
    async fn list_all(&self) -> Result<Vec<EntryRecord>, RepoError>;
}

#[async_trait]
pub trait SlugsRepo: Send + Sync {
    async fn find_slug(&self, text: &str) -> Result<Option<SlugRecord>, RepoError>;

    async fn current_slug(&self, entry: EntryId) -> Result<Option<SlugRecord>, RepoError>;

    /// All slugs of an entry, current first, then historical by age.
    async fn slugs_for_entry(&self, entry: EntryId) -> Result<Vec<SlugRecord>, RepoError>;
}

#[async_trait]
pub trait TagsRepo: Send + Sync {
    async fn find_tag(
        &self,
        kind: TagKind,
        lookup: TagLookup<'_>,
    ) -> Result<Option<TagRecord>, RepoError>;

    async fn list_for_entry(&self, entry: EntryId) -> Result<Vec<TagRecord>, RepoError>;

    async fn list_with_counts(&self) -> Result<Vec<TagWithCount>, RepoError>;
}

#[async_trait]
pub trait EntriesWriteRepo: Send + Sync {
    /// Insert the entry with its current slug, aliases and tag links, all or
    /// nothing.
    async fn create_entry(&self, params: CreateEntryParams) -> Result<EntryRecord, RepoError>;

    async fn update_entry(&self, params: UpdateEntryParams) -> Result<EntryRecord, RepoError>;

    /// Store the new title and make `params.slug` current in one write. A
    /// historical slug of the same entry is reused; the previous current slug
    /// stays as an alias.
    async fn retitle_entry(
        &self,
        params: RetitleEntryParams,
    ) -> Result<(EntryRecord, SlugRecord), RepoError>;

    /// Snapshot the entry into the removed-entries table and drop the live rows.
    async fn remove_entry(&self, entry: EntryId) -> Result<RemovedEntryRecord, RepoError>;
}

#[async_trait]
pub trait TagsWriteRepo: Send + Sync {
    async fn create_tag(&self, params: CreateTagParams) -> Result<TagRecord, RepoError>;
}

#[async_trait]
pub trait HealthCheck: Send + Sync {
    async fn check(&self) -> Result<(), RepoError>;
}
