//! Slug resolution: map a requested slug to its entry, redirecting anything
//! that is not the entry's canonical slug.

use std::sync::Arc;

use metrics::counter;
use tracing::warn;

use crate::{
    application::{
        error::{NotFoundReason, SiteError},
        repos::{EntriesRepo, SlugsRepo},
    },
    domain::{
        entities::{EntryRecord, SlugRecord},
        slug::normalize_slug,
        types::EntryId,
    },
};

pub const METRIC_RESOLUTION_TOTAL: &str = "scriptorium_resolution_total";

/// Outcome of a lookup: either content to render or a location to send the
/// client to instead.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution<T> {
    Render(T),
    Redirect(String),
}

impl<T> Resolution<T> {
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Resolution<U> {
        match self {
            Resolution::Render(value) => Resolution::Render(f(value)),
            Resolution::Redirect(location) => Resolution::Redirect(location),
        }
    }
}

/// An entry together with the slug it is served under.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedEntry {
    pub entry: EntryRecord,
    pub slug: SlugRecord,
}

#[derive(Clone)]
pub struct SlugResolver {
    entries: Arc<dyn EntriesRepo>,
    slugs: Arc<dyn SlugsRepo>,
}

impl SlugResolver {
    pub fn new(entries: Arc<dyn EntriesRepo>, slugs: Arc<dyn SlugsRepo>) -> Self {
        Self { entries, slugs }
    }

    /// Resolve `requested` as it appeared in the URL.
    ///
    /// The entry is only rendered when `requested` is byte-for-byte its
    /// current slug; historical and non-normalized spellings redirect.
    pub async fn resolve(&self, requested: &str) -> Result<Resolution<ResolvedEntry>, SiteError> {
        let Ok(normalized) = normalize_slug(requested) else {
            record_outcome("not_found");
            return Err(SiteError::NotFound(NotFoundReason::SlugNotFound));
        };

        let Some(slug) = self.slugs.find_slug(&normalized).await? else {
            record_outcome("not_found");
            return Err(SiteError::NotFound(NotFoundReason::SlugNotFound));
        };

        let Some(entry) = self.entries.find_entry(slug.entry_id).await? else {
            warn!(
                target = "scriptorium::resolver",
                slug = %slug.text,
                entry_id = %slug.entry_id,
                "slug references a missing entry"
            );
            record_outcome("inconsistent");
            return Err(SiteError::NotFound(NotFoundReason::SlugHasNoEntry));
        };

        let current = if slug.is_current {
            Some(slug.clone())
        } else {
            self.slugs.current_slug(entry.id).await?
        };

        let serving = match current {
            Some(current) => current,
            None => {
                warn!(
                    target = "scriptorium::resolver",
                    slug = %slug.text,
                    entry_id = %entry.id,
                    "entry has no current slug; serving under requested slug"
                );
                slug
            }
        };

        if serving.text != requested {
            record_outcome("redirect");
            return Ok(Resolution::Redirect(serving.path()));
        }

        record_outcome("current");
        Ok(Resolution::Render(ResolvedEntry {
            entry,
            slug: serving,
        }))
    }

    /// Location of an entry addressed by its numeric key.
    pub async fn canonical_for_id(&self, id: EntryId) -> Result<String, SiteError> {
        let Some(entry) = self.entries.find_entry(id).await? else {
            record_outcome("not_found");
            return Err(SiteError::NotFound(NotFoundReason::EntryIdNotFound));
        };

        match self.slugs.current_slug(entry.id).await? {
            Some(current) => {
                record_outcome("redirect");
                Ok(current.path())
            }
            None => {
                warn!(
                    target = "scriptorium::resolver",
                    entry_id = %entry.id,
                    "entry has no current slug"
                );
                record_outcome("inconsistent");
                Err(SiteError::NotFound(NotFoundReason::EntryHasNoSlug))
            }
        }
    }
}

fn record_outcome(outcome: &'static str) {
    counter!(METRIC_RESOLUTION_TOTAL, "outcome" => outcome).increment(1);
}
