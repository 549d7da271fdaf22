//! Tag aggregation: the tag itself, its rendered description and every entry
//! carrying it.

use std::sync::Arc;

use async_trait::async_trait;

use crate::{
    application::{
        error::{NotFoundReason, SiteError},
        markdown::MarkdownRenderer,
        repos::{EntriesRepo, EntryQueryFilter, TagLookup, TagsRepo},
    },
    domain::{
        entities::{EntryRecord, TagRecord},
        types::TagKind,
    },
};

/// Where long-form tag descriptions (Markdown) come from.
#[async_trait]
pub trait DescriptionSource: Send + Sync {
    /// `Ok(None)` when the tag simply has no description.
    async fn load(&self, tag: &TagRecord) -> std::io::Result<Option<String>>;
}

/// Falls back to the description stored with the tag row.
pub struct StoredDescriptions;

#[async_trait]
impl DescriptionSource for StoredDescriptions {
    async fn load(&self, tag: &TagRecord) -> std::io::Result<Option<String>> {
        Ok(tag.description.clone())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TagAggregate {
    pub tag: TagRecord,
    pub description_html: Option<String>,
    /// Posted entries, newest first.
    pub entries: Vec<EntryRecord>,
    /// Entries carrying the tag that have not been posted yet.
    pub unposted: usize,
}

#[derive(Clone)]
pub struct TagAggregator {
    tags: Arc<dyn TagsRepo>,
    entries: Arc<dyn EntriesRepo>,
    descriptions: Arc<dyn DescriptionSource>,
    renderer: Arc<MarkdownRenderer>,
}

impl TagAggregator {
    pub fn new(
        tags: Arc<dyn TagsRepo>,
        entries: Arc<dyn EntriesRepo>,
        descriptions: Arc<dyn DescriptionSource>,
        renderer: Arc<MarkdownRenderer>,
    ) -> Self {
        Self {
            tags,
            entries,
            descriptions,
            renderer,
        }
    }

    pub async fn find(&self, kind: TagKind, lookup: TagLookup<'_>) -> Result<TagRecord, SiteError> {
        self.tags
            .find_tag(kind, lookup)
            .await?
            .ok_or(SiteError::NotFound(NotFoundReason::TagNotFound))
    }

    pub async fn aggregate(
        &self,
        tag: TagRecord,
        scope: &EntryQueryFilter,
    ) -> Result<TagAggregate, SiteError> {
        let candidates = self.entries.list_for_tag(tag.id, scope).await?;
        let (mut entries, unposted): (Vec<_>, Vec<_>) = candidates
            .into_iter()
            .filter(|entry| scope.matches(entry))
            .partition(EntryRecord::is_published);
        entries.sort_by(|a, b| (b.posted_at, b.id).cmp(&(a.posted_at, a.id)));

        let description_html = match self.descriptions.load(&tag).await? {
            Some(markdown) if !markdown.trim().is_empty() => {
                Some(self.renderer.render_without_title(&markdown)?)
            }
            _ => None,
        };

        Ok(TagAggregate {
            tag,
            description_html,
            entries,
            unposted: unposted.len(),
        })
    }
}
