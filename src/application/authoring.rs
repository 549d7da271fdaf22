//! Write-side flows: creating, retitling, publishing and removing entries.

use std::{collections::BTreeSet, num::NonZeroUsize, sync::Arc};

use thiserror::Error;
use time::OffsetDateTime;
use tracing::info;

use crate::{
    application::repos::{
        CreateEntryParams, CreateTagParams, EntriesRepo, EntriesWriteRepo, RepoError,
        RetitleEntryParams, SlugsRepo, TagLookup, TagsRepo, TagsWriteRepo, UpdateEntryParams,
    },
    domain::{
        entities::{EntryRecord, RemovedEntryRecord, SlugRecord, TagRecord},
        error::DomainError,
        slug::{SlugAsyncError, generate_unique_slug_async, normalize_slug},
        types::{EntryId, TagKind},
    },
};

#[derive(Debug, Error)]
pub enum AuthoringError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

impl From<SlugAsyncError<RepoError>> for AuthoringError {
    fn from(err: SlugAsyncError<RepoError>) -> Self {
        match err {
            SlugAsyncError::Slug(err) => AuthoringError::Domain(err.into()),
            SlugAsyncError::Predicate(err) => AuthoringError::Repo(err),
        }
    }
}

/// A tag named by kind and label, as written in `#label` marker notation.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct TagRef {
    pub kind: TagKind,
    pub label: String,
}

/// Parse `#rust`, `@notes` or `+advent`. A marker without a sigil is a
/// general tag.
pub fn parse_tag_marker(marker: &str) -> Result<TagRef, DomainError> {
    let marker = marker.trim();
    let mut chars = marker.chars();
    let (kind, label) = match chars.next().and_then(TagKind::from_sigil) {
        Some(kind) => (kind, chars.as_str()),
        None => (TagKind::General, marker),
    };

    let label = label.trim();
    if label.is_empty() {
        return Err(DomainError::validation("tag", "label must not be empty"));
    }

    Ok(TagRef {
        kind,
        label: label.to_string(),
    })
}

#[derive(Debug, Clone, Default)]
pub struct NewEntry {
    pub title: String,
    pub content: String,
    pub image: Option<String>,
    /// Defaults to now.
    pub created_at: Option<OffsetDateTime>,
    pub posted_at: Option<OffsetDateTime>,
    pub identifier: Option<String>,
    pub tags: Vec<TagRef>,
    /// Explicit current slug; derived from the title when absent.
    pub slug: Option<String>,
    /// Historical slugs that keep redirecting to the entry.
    pub aliases: Vec<String>,
}

#[derive(Clone)]
pub struct AuthoringService {
    entries: Arc<dyn EntriesRepo>,
    slugs: Arc<dyn SlugsRepo>,
    tags: Arc<dyn TagsRepo>,
    entry_writer: Arc<dyn EntriesWriteRepo>,
    tag_writer: Arc<dyn TagsWriteRepo>,
    token_bound: NonZeroUsize,
}

impl AuthoringService {
    pub fn new(
        entries: Arc<dyn EntriesRepo>,
        slugs: Arc<dyn SlugsRepo>,
        tags: Arc<dyn TagsRepo>,
        entry_writer: Arc<dyn EntriesWriteRepo>,
        tag_writer: Arc<dyn TagsWriteRepo>,
        token_bound: NonZeroUsize,
    ) -> Self {
        Self {
            entries,
            slugs,
            tags,
            entry_writer,
            tag_writer,
            token_bound,
        }
    }

    pub async fn create_entry(&self, new: NewEntry) -> Result<EntryRecord, AuthoringError> {
        ensure_non_empty(&new.title, "title")?;
        ensure_non_empty(&new.content, "content")?;

        let slug = match new.slug.as_deref() {
            Some(explicit) => normalize_slug(explicit).map_err(DomainError::from)?,
            None => self.unique_entry_slug(&new.title, None).await?,
        };

        let mut aliases = BTreeSet::new();
        for alias in &new.aliases {
            let alias = normalize_slug(alias).map_err(DomainError::from)?;
            if alias != slug {
                aliases.insert(alias);
            }
        }

        let mut tag_ids = BTreeSet::new();
        for tag in &new.tags {
            let record = self.ensure_tag(tag.kind, &tag.label, None).await?;
            tag_ids.insert(record.id);
        }

        let entry = self
            .entry_writer
            .create_entry(CreateEntryParams {
                title: new.title.trim().to_string(),
                content: new.content,
                image: new.image,
                created_at: new.created_at.unwrap_or_else(OffsetDateTime::now_utc),
                posted_at: new.posted_at,
                identifier: new.identifier,
                slug: slug.clone(),
                aliases: aliases.into_iter().collect(),
                tags: tag_ids.into_iter().collect(),
            })
            .await?;

        info!(
            target = "scriptorium::authoring",
            entry_id = %entry.id,
            slug = %slug,
            posted = entry.is_published(),
            "entry created"
        );

        Ok(entry)
    }

    /// Change the title and, when the derived slug differs, make that slug
    /// current. Returns the slug the entry is served under afterwards.
    pub async fn retitle_entry(
        &self,
        id: EntryId,
        title: &str,
    ) -> Result<SlugRecord, AuthoringError> {
        ensure_non_empty(title, "title")?;
        let title = title.trim();
        let entry = self.load_entry(id).await?;
        let current = self.slugs.current_slug(id).await?;

        if let Some(current) = current.as_ref()
            && entry.title == title
        {
            return Ok(current.clone());
        }

        let slug = self.unique_entry_slug(title, Some(id)).await?;
        let (_, serving) = self
            .entry_writer
            .retitle_entry(RetitleEntryParams {
                id,
                title: title.to_string(),
                slug,
                modified_at: OffsetDateTime::now_utc(),
            })
            .await?;

        info!(
            target = "scriptorium::authoring",
            entry_id = %id,
            slug = %serving.text,
            "entry retitled"
        );

        Ok(serving)
    }

    /// Publish at `posted_at`, or unpublish with `None`.
    pub async fn set_posted(
        &self,
        id: EntryId,
        posted_at: Option<OffsetDateTime>,
    ) -> Result<EntryRecord, AuthoringError> {
        let entry = self.load_entry(id).await?;
        let updated = self
            .entry_writer
            .update_entry(UpdateEntryParams {
                id,
                title: entry.title,
                content: entry.content,
                image: entry.image,
                posted_at,
                modified_at: OffsetDateTime::now_utc(),
            })
            .await?;
        Ok(updated)
    }

    pub async fn remove_entry(&self, id: EntryId) -> Result<RemovedEntryRecord, AuthoringError> {
        self.load_entry(id).await?;
        let removed = self.entry_writer.remove_entry(id).await?;

        info!(
            target = "scriptorium::authoring",
            entry_id = %id,
            slugs = removed.slugs.len(),
            "entry removed"
        );

        Ok(removed)
    }

    /// Find the tag by label or create it with a fresh slug.
    pub async fn ensure_tag(
        &self,
        kind: TagKind,
        label: &str,
        description: Option<String>,
    ) -> Result<TagRecord, AuthoringError> {
        let label = label.trim();
        ensure_non_empty(label, "tag")?;

        if let Some(existing) = self.tags.find_tag(kind, TagLookup::Label(label)).await? {
            return Ok(existing);
        }

        let tags = self.tags.clone();
        let slug = generate_unique_slug_async(label, self.token_bound, move |candidate| {
            let tags = tags.clone();
            async move {
                tags.find_tag(kind, TagLookup::Slug(&candidate))
                    .await
                    .map(|existing| existing.is_none())
            }
        })
        .await?;

        let tag = self
            .tag_writer
            .create_tag(CreateTagParams {
                label: label.to_string(),
                kind,
                slug,
                description,
            })
            .await?;
        Ok(tag)
    }

    /// Slug for `title`; with `owner` set, slugs the entry already owns count
    /// as free so a retitle back to an old title reuses its old slug.
    async fn unique_entry_slug(
        &self,
        title: &str,
        owner: Option<EntryId>,
    ) -> Result<String, AuthoringError> {
        let slugs = self.slugs.clone();
        let slug = generate_unique_slug_async(title, self.token_bound, move |candidate| {
            let slugs = slugs.clone();
            async move {
                slugs.find_slug(&candidate).await.map(|existing| match existing {
                    None => true,
                    Some(found) => Some(found.entry_id) == owner,
                })
            }
        })
        .await?;
        Ok(slug)
    }

    async fn load_entry(&self, id: EntryId) -> Result<EntryRecord, AuthoringError> {
        self.entries
            .find_entry(id)
            .await?
            .ok_or_else(|| DomainError::not_found("entry", id).into())
    }
}

fn ensure_non_empty(value: &str, field: &'static str) -> Result<(), DomainError> {
    if value.trim().is_empty() {
        return Err(DomainError::validation(field, "must not be empty"));
    }
    Ok(())
}
