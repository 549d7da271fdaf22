//! RSS 2.0 and Atom 1.0 feeds of the most recent published entries.

use std::sync::Arc;

use thiserror::Error;
use time::{
    OffsetDateTime,
    format_description::well_known::{Rfc2822, Rfc3339},
};

use crate::{
    application::{
        markdown::{MarkdownRenderer, markdown_renderer},
        navigator::canonical_entry_path,
        repos::{EntriesRepo, RepoError, SlugsRepo},
    },
    config::SiteSettings,
    domain::types::SortOrder,
};

const SUMMARY_CHARS: usize = 400;

#[derive(Clone)]
pub struct SyndicationService {
    entries: Arc<dyn EntriesRepo>,
    slugs: Arc<dyn SlugsRepo>,
    site: Arc<SiteSettings>,
    renderer: Arc<MarkdownRenderer>,
}

#[derive(Debug, Error)]
pub enum SyndicationError {
    #[error("failed to list entries: {0}")]
    Entries(#[from] RepoError),
}

struct FeedItem {
    title: String,
    link: String,
    published: OffsetDateTime,
    updated: OffsetDateTime,
    summary: String,
}

impl SyndicationService {
    pub fn new(
        entries: Arc<dyn EntriesRepo>,
        slugs: Arc<dyn SlugsRepo>,
        site: Arc<SiteSettings>,
    ) -> Self {
        Self {
            entries,
            slugs,
            site,
            renderer: markdown_renderer(),
        }
    }

    /// Generate RSS 2.0 feed XML.
    pub async fn rss_feed(&self) -> Result<String, SyndicationError> {
        let items = self.recent_items().await?;
        let base = self.site.absolute_url("/");

        let mut body = String::new();
        for item in &items {
            body.push_str(&format!(
                "    <item>\n      <title>{}</title>\n      <link>{}</link>\n      <guid isPermaLink=\"true\">{}</guid>\n      <pubDate>{}</pubDate>\n      <description>{}</description>\n    </item>\n",
                xml_escape(&item.title),
                xml_escape(&item.link),
                xml_escape(&item.link),
                format_timestamp(item.published, &Rfc2822),
                xml_escape(&item.summary),
            ));
        }

        Ok(format!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<rss version=\"2.0\">\n  <channel>\n    <title>{}</title>\n    <link>{}</link>\n    <description>{}</description>\n{}  </channel>\n</rss>\n",
            xml_escape(&self.site.title),
            xml_escape(&base),
            xml_escape(&self.site.description),
            body
        ))
    }

    /// Generate Atom 1.0 feed XML.
    pub async fn atom_feed(&self) -> Result<String, SyndicationError> {
        let items = self.recent_items().await?;
        let base = self.site.absolute_url("/");
        let updated = items
            .iter()
            .map(|item| item.updated)
            .max()
            .unwrap_or(OffsetDateTime::UNIX_EPOCH);

        let mut body = String::new();
        for item in &items {
            body.push_str(&format!(
                "  <entry>\n    <title>{}</title>\n    <link href=\"{}\"/>\n    <id>{}</id>\n    <published>{}</published>\n    <updated>{}</updated>\n    <summary>{}</summary>\n  </entry>\n",
                xml_escape(&item.title),
                xml_escape(&item.link),
                xml_escape(&item.link),
                format_timestamp(item.published, &Rfc3339),
                format_timestamp(item.updated, &Rfc3339),
                xml_escape(&item.summary),
            ));
        }

        let author = if self.site.author.is_empty() {
            String::new()
        } else {
            format!(
                "  <author><name>{}</name></author>\n",
                xml_escape(&self.site.author)
            )
        };

        Ok(format!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<feed xmlns=\"http://www.w3.org/2005/Atom\">\n  <title>{}</title>\n  <id>{}</id>\n  <updated>{}</updated>\n  <link href=\"{}\" rel=\"self\"/>\n  <link href=\"{}\"/>\n{}{}</feed>\n",
            xml_escape(&self.site.title),
            xml_escape(&base),
            format_timestamp(updated, &Rfc3339),
            xml_escape(&self.site.absolute_url("/atom.xml")),
            xml_escape(&base),
            author,
            body
        ))
    }

    async fn recent_items(&self) -> Result<Vec<FeedItem>, SyndicationError> {
        let entries = self
            .entries
            .list_published(SortOrder::NewestFirst, self.site.feed_size.get(), 0)
            .await?;

        let mut items = Vec::with_capacity(entries.len());
        for entry in entries {
            let Some(published) = entry.posted_at else {
                continue;
            };
            let path = canonical_entry_path(self.slugs.as_ref(), &entry).await?;
            items.push(FeedItem {
                link: self.site.absolute_url(&path),
                summary: self.renderer.excerpt(&entry.content, SUMMARY_CHARS),
                updated: entry.modified_at.unwrap_or(published).max(published),
                published,
                title: entry.title,
            });
        }
        Ok(items)
    }
}

fn format_timestamp(
    at: OffsetDateTime,
    format: &(impl time::formatting::Formattable + ?Sized),
) -> String {
    at.format(format).unwrap_or_else(|_| at.to_string())
}

fn xml_escape(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use time::macros::datetime;
    use url::Url;

    use super::*;
    use crate::application::repos::EntryQueryFilter;
    use crate::domain::{
        entities::{EntryRecord, SlugRecord},
        types::{EntryId, TagId},
    };

    struct FeedRepo {
        entries: Vec<EntryRecord>,
    }

    #[async_trait]
    impl EntriesRepo for FeedRepo {
        async fn find_entry(&self, _: EntryId) -> Result<Option<EntryRecord>, RepoError> {
            Ok(None)
        }

        async fn previous_entry(&self, _: &EntryRecord) -> Result<Option<EntryRecord>, RepoError> {
            Ok(None)
        }

        async fn next_entry(&self, _: &EntryRecord) -> Result<Option<EntryRecord>, RepoError> {
            Ok(None)
        }

        async fn count_published(&self) -> Result<u64, RepoError> {
            Ok(self.entries.len() as u64)
        }

        async fn list_published(
            &self,
            order: SortOrder,
            limit: u32,
            offset: u64,
        ) -> Result<Vec<EntryRecord>, RepoError> {
            assert_eq!(order, SortOrder::NewestFirst);
            assert_eq!(offset, 0);
            Ok(self.entries.iter().take(limit as usize).cloned().collect())
        }

        async fn list_for_tag(
            &self,
            _: TagId,
            _: &EntryQueryFilter,
        ) -> Result<Vec<EntryRecord>, RepoError> {
            Ok(Vec::new())
        }

        async fn list_all(&self) -> Result<Vec<EntryRecord>, RepoError> {
            Ok(self.entries.clone())
        }
    }

    #[async_trait]
    impl SlugsRepo for FeedRepo {
        async fn find_slug(&self, _: &str) -> Result<Option<SlugRecord>, RepoError> {
            Ok(None)
        }

        async fn current_slug(&self, entry: EntryId) -> Result<Option<SlugRecord>, RepoError> {
            Ok(Some(SlugRecord {
                id: entry.0,
                entry_id: entry,
                text: format!("entry-{entry}"),
                is_current: true,
            }))
        }

        async fn slugs_for_entry(&self, _: EntryId) -> Result<Vec<SlugRecord>, RepoError> {
            Ok(Vec::new())
        }
    }

    fn service(feed_size: u32) -> SyndicationService {
        let repo = Arc::new(FeedRepo {
            entries: vec![
                EntryRecord {
                    id: EntryId(2),
                    title: "Lenses & Prisms".to_string(),
                    content: "Optics compose <nicely>.".to_string(),
                    image: None,
                    created_at: None,
                    posted_at: Some(datetime!(2021-02-01 10:00 UTC)),
                    modified_at: Some(datetime!(2021-03-01 10:00 UTC)),
                    identifier: None,
                },
                EntryRecord {
                    id: EntryId(1),
                    title: "Hello".to_string(),
                    content: "First post.".to_string(),
                    image: None,
                    created_at: None,
                    posted_at: Some(datetime!(2021-01-01 10:00 UTC)),
                    modified_at: None,
                    identifier: None,
                },
            ],
        });
        let mut site = SiteSettings::new(
            "Notes",
            Url::parse("https://example.com/blog").expect("base url"),
        );
        site.feed_size = std::num::NonZeroU32::new(feed_size).expect("feed size");
        SyndicationService::new(repo.clone(), repo, Arc::new(site))
    }

    #[tokio::test]
    async fn rss_lists_entries_with_escaped_titles() {
        let rss = service(20).rss_feed().await.expect("rss");
        assert!(rss.contains("<rss version=\"2.0\">"));
        assert!(rss.contains("<title>Lenses &amp; Prisms</title>"));
        assert!(rss.contains("<link>https://example.com/blog/entry/entry-2</link>"));
        assert!(rss.contains("<pubDate>Mon, 01 Feb 2021 10:00:00 +0000</pubDate>"));
        assert!(!rss.contains("<nicely>"));
    }

    #[tokio::test]
    async fn atom_updated_tracks_latest_modification() {
        let atom = service(20).atom_feed().await.expect("atom");
        assert!(atom.contains("<updated>2021-03-01T10:00:00Z</updated>\n  <link"));
        assert!(atom.contains("<link href=\"https://example.com/blog/atom.xml\" rel=\"self\"/>"));
        assert_eq!(atom.matches("<entry>").count(), 2);
    }

    #[tokio::test]
    async fn feed_size_caps_items() {
        let rss = service(1).rss_feed().await.expect("rss");
        assert_eq!(rss.matches("<item>").count(), 1);
        assert!(rss.contains("Lenses &amp; Prisms"));
    }
}
