//! Import/export of site content as a TOML archive.

use std::{path::Path, sync::Arc};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use time::OffsetDateTime;
use tracing::info;

use crate::{
    application::{
        authoring::{AuthoringError, AuthoringService, NewEntry, parse_tag_marker},
        repos::{
            CreateTagParams, EntriesRepo, RepoError, SlugsRepo, TagLookup, TagsRepo,
            TagsWriteRepo,
        },
    },
    domain::{error::DomainError, slug::normalize_slug, types::TagKind},
};

#[derive(Debug, Error)]
pub enum TransferError {
    #[error("failed to access archive: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to encode archive: {0}")]
    Encode(#[from] toml::ser::Error),
    #[error("invalid archive: {0}")]
    Decode(#[from] toml::de::Error),
    #[error(transparent)]
    Authoring(#[from] AuthoringError),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

impl From<DomainError> for TransferError {
    fn from(err: DomainError) -> Self {
        TransferError::Authoring(err.into())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SiteArchive {
    #[serde(default)]
    pub tags: Vec<ArchivedTag>,
    #[serde(default)]
    pub entries: Vec<ArchivedEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArchivedTag {
    pub kind: TagKind,
    pub label: String,
    pub slug: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArchivedEntry {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slug: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub aliases: Vec<String>,
    /// Tag markers (`#rust`, `@notes`, `+advent`).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identifier: Option<String>,
    #[serde(
        default,
        with = "time::serde::rfc3339::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub created_at: Option<OffsetDateTime>,
    #[serde(
        default,
        with = "time::serde::rfc3339::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub posted_at: Option<OffsetDateTime>,
    #[serde(
        default,
        with = "time::serde::rfc3339::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub modified_at: Option<OffsetDateTime>,
    pub content: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub tags_created: usize,
    pub entries_created: usize,
}

#[derive(Clone)]
pub struct SiteTransfer {
    entries: Arc<dyn EntriesRepo>,
    slugs: Arc<dyn SlugsRepo>,
    tags: Arc<dyn TagsRepo>,
    tag_writer: Arc<dyn TagsWriteRepo>,
    authoring: AuthoringService,
}

impl SiteTransfer {
    pub fn new(
        entries: Arc<dyn EntriesRepo>,
        slugs: Arc<dyn SlugsRepo>,
        tags: Arc<dyn TagsRepo>,
        tag_writer: Arc<dyn TagsWriteRepo>,
        authoring: AuthoringService,
    ) -> Self {
        Self {
            entries,
            slugs,
            tags,
            tag_writer,
            authoring,
        }
    }

    pub async fn export_archive(&self) -> Result<SiteArchive, TransferError> {
        let tags = self
            .tags
            .list_with_counts()
            .await?
            .into_iter()
            .map(|counted| ArchivedTag {
                kind: counted.tag.kind,
                label: counted.tag.label,
                slug: counted.tag.slug,
                description: counted.tag.description,
            })
            .collect();

        let mut entries = Vec::new();
        for entry in self.entries.list_all().await? {
            let mut slug = None;
            let mut aliases = Vec::new();
            for record in self.slugs.slugs_for_entry(entry.id).await? {
                if record.is_current && slug.is_none() {
                    slug = Some(record.text);
                } else {
                    aliases.push(record.text);
                }
            }
            let tags = self
                .tags
                .list_for_entry(entry.id)
                .await?
                .iter()
                .map(|tag| tag.marker())
                .collect();

            entries.push(ArchivedEntry {
                title: entry.title,
                slug,
                aliases,
                tags,
                image: entry.image,
                identifier: entry.identifier,
                created_at: entry.created_at,
                posted_at: entry.posted_at,
                modified_at: entry.modified_at,
                content: entry.content,
            });
        }

        Ok(SiteArchive { tags, entries })
    }

    /// Recreate archived content. Existing tags with the same label are
    /// reused; entries conflicting with live ones fail the import.
    pub async fn import_archive(&self, archive: SiteArchive) -> Result<ImportSummary, TransferError> {
        let mut summary = ImportSummary::default();

        for tag in archive.tags {
            let existing = self
                .tags
                .find_tag(tag.kind, TagLookup::Label(tag.label.trim()))
                .await?;
            if existing.is_some() {
                continue;
            }
            self.tag_writer
                .create_tag(CreateTagParams {
                    label: tag.label.trim().to_string(),
                    kind: tag.kind,
                    slug: normalize_slug(&tag.slug).map_err(DomainError::from)?,
                    description: tag.description,
                })
                .await?;
            summary.tags_created += 1;
        }

        for entry in archive.entries {
            let tags = entry
                .tags
                .iter()
                .map(|marker| parse_tag_marker(marker))
                .collect::<Result<Vec<_>, _>>()?;

            self.authoring
                .create_entry(NewEntry {
                    title: entry.title,
                    content: entry.content,
                    image: entry.image,
                    created_at: entry.created_at,
                    posted_at: entry.posted_at,
                    identifier: entry.identifier,
                    tags,
                    slug: entry.slug,
                    aliases: entry.aliases,
                })
                .await?;
            summary.entries_created += 1;
        }

        Ok(summary)
    }
}

/// Export the current site data to the provided path as a TOML archive.
pub async fn export_site(transfer: &SiteTransfer, path: &Path) -> Result<(), TransferError> {
    let archive = transfer.export_archive().await?;
    let encoded = toml::to_string_pretty(&archive)?;
    tokio::fs::write(path, encoded).await?;

    info!(
        target = "scriptorium::transfer",
        path = %path.display(),
        entries = archive.entries.len(),
        tags = archive.tags.len(),
        "site exported"
    );
    Ok(())
}

/// Import site data from the provided TOML archive path.
pub async fn import_site(
    transfer: &SiteTransfer,
    path: &Path,
) -> Result<ImportSummary, TransferError> {
    let data = tokio::fs::read_to_string(path).await?;
    let archive: SiteArchive = toml::from_str(&data)?;
    let summary = transfer.import_archive(archive).await?;

    info!(
        target = "scriptorium::transfer",
        path = %path.display(),
        entries = summary.entries_created,
        tags = summary.tags_created,
        "site imported"
    );
    Ok(summary)
}
