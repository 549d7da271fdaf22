//! Page composition: turns resolved entries, tags and pagination plans into
//! the immutable `PageData` each template renders.

use std::sync::Arc;

use serde_json::json;
use time::{
    OffsetDateTime, format_description::FormatItem, format_description::well_known::Rfc3339,
    macros::format_description,
};

use crate::{
    application::{
        error::NotFoundReason,
        navigator::EntryNeighbors,
        pagination::PagePlan,
        repos::TagWithCount,
        resolver::ResolvedEntry,
        tags::TagAggregate,
    },
    config::SiteSettings,
    domain::{
        entities::{EntryRecord, TagRecord},
        types::TagKind,
    },
    presentation::views::{
        ArchiveItem, ArchiveMonth, ArchiveView, ContentType, EntryCard, EntryView, HeadFragment,
        HomeView, NotFoundView, PageData, PaginationView, SiteChrome, TagBadge, TagGroup,
        TagSummary, TagView,
    },
};

const HUMAN_DATE: &[FormatItem<'static>] =
    format_description!("[month repr:long] [day padding:none], [year]");
const MONTH_LABEL: &[FormatItem<'static>] = format_description!("[month repr:long] [year]");
const MONTH_ANCHOR: &[FormatItem<'static>] = format_description!("[year]-[month]");
const DAY_LABEL: &[FormatItem<'static>] = format_description!("[month repr:short] [day padding:none]");

#[derive(Clone)]
pub struct PageComposer {
    site: Arc<SiteSettings>,
}

impl PageComposer {
    pub fn new(site: Arc<SiteSettings>) -> Self {
        Self { site }
    }

    pub fn site(&self) -> &SiteSettings {
        &self.site
    }

    pub fn card(
        &self,
        entry: &EntryRecord,
        url: String,
        tags: &[TagRecord],
        excerpt: String,
    ) -> EntryCard {
        EntryCard {
            title: entry.title.clone(),
            url,
            posted_iso: entry.posted_at.map(iso_date).unwrap_or_default(),
            posted_label: entry.posted_at.map(human_date).unwrap_or_default(),
            excerpt,
            tags: badges(tags),
        }
    }

    /// `plan` is `None` when nothing has been posted yet.
    pub fn home(&self, plan: Option<&PagePlan>, entries: Vec<EntryCard>) -> PageData<HomeView> {
        let path = plan.map(PagePlan::path).unwrap_or_else(|| "/".to_string());
        let mut page = self.base(
            self.site.title.clone(),
            self.site.description.clone(),
            &path,
            ContentType::Website,
            HomeView {
                entries,
                pagination: PaginationView {
                    page: plan.map_or(1, |plan| plan.page),
                    max_page: plan.map_or(0, |plan| plan.max_page),
                    previous: plan.and_then(PagePlan::previous_link),
                    next: plan.and_then(PagePlan::next_link),
                },
            },
        );

        if let Some(previous) = page.content.pagination.previous.as_deref() {
            page.head
                .push(HeadFragment::link("prev", self.site.absolute_url(previous)));
        }
        if let Some(next) = page.content.pagination.next.as_deref() {
            page.head
                .push(HeadFragment::link("next", self.site.absolute_url(next)));
        }
        page
    }

    pub fn entry(
        &self,
        resolved: &ResolvedEntry,
        body_html: String,
        excerpt: String,
        tags: &[TagRecord],
        neighbors: EntryNeighbors,
    ) -> PageData<EntryView> {
        let entry = &resolved.entry;
        let path = resolved.slug.path();
        let url = self.site.absolute_url(&path);
        let image = entry
            .image
            .as_deref()
            .or(self.site.default_image.as_deref())
            .map(|image| self.asset_url(image));
        let is_draft = !entry.is_published();

        let json_ld = entry.posted_at.and_then(|posted_at| {
            serde_json::to_string(&json!({
                "@context": "https://schema.org",
                "@type": "BlogPosting",
                "headline": entry.title,
                "description": excerpt,
                "datePublished": iso_date(posted_at),
                "dateModified": entry.modified_at.map(iso_date),
                "author": { "@type": "Person", "name": self.site.author },
                "image": image,
                "url": url,
            }))
            .ok()
            .map(|json| json.replace("</", "<\\/"))
        });

        let description = if excerpt.is_empty() {
            self.site.description.clone()
        } else {
            excerpt
        };

        let mut page = self.base(
            self.titled(&entry.title),
            description,
            &path,
            ContentType::Article,
            EntryView {
                title: entry.title.clone(),
                body_html,
                posted_iso: entry.posted_at.map(iso_date),
                posted_label: entry.posted_at.map(human_date),
                modified_label: entry.modified_at.map(human_date),
                image: image.clone(),
                tags: badges(tags),
                previous: neighbors.previous,
                next: neighbors.next,
                is_draft,
                json_ld,
            },
        );
        page.image = image;
        page.js.extend(self.site.entry_scripts.iter().cloned());

        if let Some(previous) = page.content.previous.as_ref() {
            page.head.push(HeadFragment::link(
                "prev",
                self.site.absolute_url(&previous.url),
            ));
        }
        if let Some(next) = page.content.next.as_ref() {
            page.head
                .push(HeadFragment::link("next", self.site.absolute_url(&next.url)));
        }
        if is_draft {
            page.head.push(HeadFragment::meta("robots", "noindex"));
        }
        page
    }

    pub fn tag(&self, aggregate: TagAggregate, entries: Vec<EntryCard>) -> PageData<TagView> {
        let TagAggregate {
            tag,
            description_html,
            unposted,
            ..
        } = aggregate;

        let description = match entries.len() {
            1 => format!("One entry filed under {}.", tag.marker()),
            n => format!("{n} entries filed under {}.", tag.marker()),
        };

        self.base(
            self.titled(&tag.marker()),
            description,
            &tag.path(),
            ContentType::Website,
            TagView {
                kind_label: tag.kind.display_name(),
                label: tag.label,
                description_html,
                entries,
                unposted,
            },
        )
    }

    /// `entries` must already be newest first.
    pub fn archive(
        &self,
        entries: Vec<(EntryRecord, String)>,
        counts: Vec<TagWithCount>,
    ) -> PageData<ArchiveView> {
        let total = entries.len();
        let mut months: Vec<ArchiveMonth> = Vec::new();
        for (entry, url) in entries {
            let Some(posted_at) = entry.posted_at else {
                continue;
            };
            let anchor = posted_at
                .format(MONTH_ANCHOR)
                .unwrap_or_else(|_| posted_at.year().to_string());
            let item = ArchiveItem {
                title: entry.title,
                url,
                day_label: posted_at.format(DAY_LABEL).unwrap_or_default(),
            };
            match months.last_mut() {
                Some(month) if month.anchor == anchor => month.entries.push(item),
                _ => months.push(ArchiveMonth {
                    label: posted_at.format(MONTH_LABEL).unwrap_or_else(|_| anchor.clone()),
                    anchor,
                    entries: vec![item],
                }),
            }
        }

        let tag_groups = TagKind::ALL
            .into_iter()
            .filter_map(|kind| {
                let tags: Vec<TagSummary> = counts
                    .iter()
                    .filter(|count| count.tag.kind == kind && count.entry_count > 0)
                    .map(|count| TagSummary {
                        label: count.tag.marker(),
                        href: count.tag.path(),
                        count: count.entry_count,
                    })
                    .collect();
                (!tags.is_empty()).then(|| TagGroup {
                    kind_label: kind.display_name(),
                    tags,
                })
            })
            .collect();

        self.base(
            self.titled("Archive"),
            format!("All {total} entries on {}.", self.site.title),
            "/archive",
            ContentType::Website,
            ArchiveView {
                total,
                months,
                tag_groups,
            },
        )
    }

    pub fn not_found(&self, reason: Option<NotFoundReason>) -> PageData<NotFoundView> {
        let message = reason
            .map(NotFoundReason::message)
            .unwrap_or("The page you asked for does not exist.");
        let mut page = self.base(
            self.titled("Not found"),
            message.to_string(),
            "/not-found",
            ContentType::Website,
            NotFoundView {
                message,
                code: reason.map(NotFoundReason::code),
            },
        );
        page.head.push(HeadFragment::meta("robots", "noindex"));
        page
    }

    fn base<T>(
        &self,
        title: String,
        description: String,
        path: &str,
        content_type: ContentType,
        content: T,
    ) -> PageData<T> {
        let site = &self.site;
        PageData {
            chrome: SiteChrome {
                title: site.title.clone(),
                author: site.author.clone(),
                tagline: site.description.clone(),
                copyright_year: OffsetDateTime::now_utc().year(),
            },
            title,
            description,
            image: site.default_image.as_deref().map(|image| self.asset_url(image)),
            content_type,
            url: site.absolute_url(path),
            css: site.stylesheets.clone(),
            js: site.scripts.clone(),
            head: vec![
                HeadFragment::alternate(
                    "application/rss+xml",
                    site.absolute_url("/rss.xml"),
                    format!("{} (RSS)", site.title),
                ),
                HeadFragment::alternate(
                    "application/atom+xml",
                    site.absolute_url("/atom.xml"),
                    format!("{} (Atom)", site.title),
                ),
            ],
            content,
        }
    }

    fn titled(&self, title: &str) -> String {
        format!("{title} · {}", self.site.title)
    }

    fn asset_url(&self, image: &str) -> String {
        if image.starts_with("http://") || image.starts_with("https://") {
            image.to_string()
        } else {
            self.site.absolute_url(image)
        }
    }
}

fn badges(tags: &[TagRecord]) -> Vec<TagBadge> {
    tags.iter()
        .map(|tag| TagBadge {
            label: tag.marker(),
            href: tag.path(),
            kind: tag.kind.as_str(),
        })
        .collect()
}

pub(crate) fn iso_date(at: OffsetDateTime) -> String {
    at.format(&Rfc3339).unwrap_or_default()
}

pub(crate) fn human_date(at: OffsetDateTime) -> String {
    at.format(HUMAN_DATE)
        .unwrap_or_else(|_| at.date().to_string())
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;
    use url::Url;

    use super::*;
    use crate::application::{navigator::EntryLink, pagination::plan_page};
    use crate::domain::{
        entities::SlugRecord,
        types::{EntryId, TagId},
    };

    fn composer() -> PageComposer {
        let mut site = SiteSettings::new(
            "Notes",
            Url::parse("https://example.com").expect("base url"),
        );
        site.default_image = Some("/static/cover.png".to_string());
        site.entry_scripts = vec!["/static/math.js".to_string()];
        PageComposer::new(Arc::new(site))
    }

    fn resolved(posted_at: Option<OffsetDateTime>) -> ResolvedEntry {
        ResolvedEntry {
            entry: EntryRecord {
                id: EntryId(3),
                title: "Fun with Lenses".to_string(),
                content: "# Fun with Lenses".to_string(),
                image: None,
                created_at: None,
                posted_at,
                modified_at: None,
                identifier: None,
            },
            slug: SlugRecord {
                id: 1,
                entry_id: EntryId(3),
                text: "fun-with-lenses".to_string(),
                is_current: true,
            },
        }
    }

    fn tag(kind: TagKind, label: &str) -> TagRecord {
        TagRecord {
            id: TagId(1),
            label: label.to_string(),
            kind,
            description: None,
            slug: label.to_lowercase(),
        }
    }

    #[test]
    fn home_title_is_site_title_and_links_pages() {
        let composer = composer();
        let plan = plan_page(15, std::num::NonZeroU32::new(5).expect("size"), 2).expect("plan");
        let page = composer.home(Some(&plan), Vec::new());

        assert_eq!(page.title, "Notes");
        assert_eq!(page.url, "https://example.com/page/2");
        assert_eq!(page.content.pagination.previous.as_deref(), Some("/"));
        assert_eq!(page.content.pagination.next.as_deref(), Some("/page/3"));
        assert!(page.head.contains(&HeadFragment::link("prev", "https://example.com/")));
        assert!(
            page.head
                .contains(&HeadFragment::link("next", "https://example.com/page/3"))
        );
    }

    #[test]
    fn empty_home_has_no_pagination_links() {
        let page = composer().home(None, Vec::new());
        assert_eq!(page.url, "https://example.com/");
        assert_eq!(page.content.pagination.max_page, 0);
        assert_eq!(page.content.pagination.previous, None);
        assert_eq!(page.content.pagination.next, None);
    }

    #[test]
    fn entry_page_carries_article_metadata() {
        let composer = composer();
        let neighbors = EntryNeighbors {
            previous: Some(EntryLink {
                title: "Older".to_string(),
                url: "/entry/older".to_string(),
            }),
            next: None,
        };
        let page = composer.entry(
            &resolved(Some(datetime!(2021-03-04 05:06 UTC))),
            "<p>body</p>".to_string(),
            "An excerpt".to_string(),
            &[tag(TagKind::General, "Haskell")],
            neighbors,
        );

        assert_eq!(page.title, "Fun with Lenses · Notes");
        assert_eq!(page.content_type, ContentType::Article);
        assert_eq!(page.url, "https://example.com/entry/fun-with-lenses");
        assert_eq!(page.description, "An excerpt");
        assert_eq!(
            page.image.as_deref(),
            Some("https://example.com/static/cover.png")
        );
        assert!(page.js.contains(&"/static/math.js".to_string()));
        assert_eq!(page.content.posted_label.as_deref(), Some("March 4, 2021"));
        assert_eq!(page.content.tags[0].href, "/tags/haskell");
        assert_eq!(page.content.tags[0].label, "#Haskell");
        assert!(
            page.head
                .contains(&HeadFragment::link("prev", "https://example.com/entry/older"))
        );
        assert!(!page.head.contains(&HeadFragment::meta("robots", "noindex")));
        assert!(page.content.json_ld.is_some());
    }

    #[test]
    fn draft_entry_is_not_indexed() {
        let page = composer().entry(
            &resolved(None),
            String::new(),
            String::new(),
            &[],
            EntryNeighbors::default(),
        );
        assert!(page.content.is_draft);
        assert!(page.head.contains(&HeadFragment::meta("robots", "noindex")));
        assert_eq!(page.content.json_ld, None);
    }

    #[test]
    fn archive_groups_by_month() {
        let mut first = resolved(Some(datetime!(2021-03-20 00:00 UTC))).entry;
        first.title = "Late March".to_string();
        let mut second = resolved(Some(datetime!(2021-03-02 00:00 UTC))).entry;
        second.title = "Early March".to_string();
        let third = resolved(Some(datetime!(2020-12-31 00:00 UTC))).entry;

        let counts = vec![
            TagWithCount {
                tag: tag(TagKind::Series, "Advent"),
                entry_count: 2,
            },
            TagWithCount {
                tag: tag(TagKind::General, "Unused"),
                entry_count: 0,
            },
        ];

        let page = composer().archive(
            vec![
                (first, "/entry/a".to_string()),
                (second, "/entry/b".to_string()),
                (third, "/entry/c".to_string()),
            ],
            counts,
        );

        let months: Vec<&str> = page
            .content
            .months
            .iter()
            .map(|m| m.label.as_str())
            .collect();
        assert_eq!(months, vec!["March 2021", "December 2020"]);
        assert_eq!(page.content.months[0].anchor, "2021-03");
        assert_eq!(page.content.months[0].entries.len(), 2);
        assert_eq!(page.content.tag_groups.len(), 1);
        assert_eq!(page.content.tag_groups[0].kind_label, "Series");
        assert_eq!(page.content.tag_groups[0].tags[0].label, "+Advent");
    }

    #[test]
    fn not_found_page_echoes_reason() {
        let page = composer().not_found(Some(NotFoundReason::SlugNotFound));
        assert_eq!(page.content.code, Some("SlugNotFound"));
        assert_eq!(page.title, "Not found · Notes");
    }
}
