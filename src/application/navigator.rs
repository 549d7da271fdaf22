//! Previous/next links between published entries.

use std::sync::Arc;

use crate::{
    application::repos::{EntriesRepo, RepoError, SlugsRepo},
    domain::entities::EntryRecord,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryLink {
    pub title: String,
    pub url: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntryNeighbors {
    /// Older neighbour.
    pub previous: Option<EntryLink>,
    /// Newer neighbour.
    pub next: Option<EntryLink>,
}

#[derive(Clone)]
pub struct EntryNavigator {
    entries: Arc<dyn EntriesRepo>,
    slugs: Arc<dyn SlugsRepo>,
}

impl EntryNavigator {
    pub fn new(entries: Arc<dyn EntriesRepo>, slugs: Arc<dyn SlugsRepo>) -> Self {
        Self { entries, slugs }
    }

    pub async fn neighbors(&self, entry: &EntryRecord) -> Result<EntryNeighbors, RepoError> {
        if !entry.is_published() {
            return Ok(EntryNeighbors::default());
        }

        let previous = match self.entries.previous_entry(entry).await? {
            Some(found) => Some(self.link_for(&found).await?),
            None => None,
        };
        let next = match self.entries.next_entry(entry).await? {
            Some(found) => Some(self.link_for(&found).await?),
            None => None,
        };

        Ok(EntryNeighbors { previous, next })
    }

    pub async fn link_for(&self, entry: &EntryRecord) -> Result<EntryLink, RepoError> {
        Ok(EntryLink {
            title: entry.title.clone(),
            url: canonical_entry_path(self.slugs.as_ref(), entry).await?,
        })
    }
}

/// Path of the entry's current slug, or its id route when it has none.
pub async fn canonical_entry_path(
    slugs: &dyn SlugsRepo,
    entry: &EntryRecord,
) -> Result<String, RepoError> {
    Ok(match slugs.current_slug(entry.id).await? {
        Some(slug) => slug.path(),
        None => entry.id_path(),
    })
}
