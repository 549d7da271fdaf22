//! Public site flows. Every request kind ends in either a page to render or a
//! location to redirect to; not-found conditions surface as [`SiteError`].

use std::sync::Arc;

use crate::{
    application::{
        composer::PageComposer,
        error::{NotFoundReason, SiteError},
        markdown::{MarkdownRenderer, markdown_renderer},
        navigator::{EntryNavigator, canonical_entry_path},
        pagination::{ROOT_PATH, parse_page_number, plan_page},
        repos::{EntriesRepo, EntryQueryFilter, SlugsRepo, TagLookup, TagsRepo},
        resolver::{Resolution, SlugResolver},
        tags::{DescriptionSource, TagAggregator},
    },
    config::SiteSettings,
    domain::{
        entities::EntryRecord,
        slug::normalize_slug,
        types::{EntryId, SortOrder, TagKind},
    },
    presentation::views::{
        ArchiveView, EntryCard, EntryView, HomeView, NotFoundView, PageData, TagView,
    },
};

const EXCERPT_CHARS: usize = 240;

#[derive(Clone)]
pub struct SiteService {
    entries: Arc<dyn EntriesRepo>,
    slugs: Arc<dyn SlugsRepo>,
    tags: Arc<dyn TagsRepo>,
    resolver: SlugResolver,
    navigator: EntryNavigator,
    aggregator: TagAggregator,
    composer: PageComposer,
    renderer: Arc<MarkdownRenderer>,
}

impl SiteService {
    pub fn new(
        entries: Arc<dyn EntriesRepo>,
        slugs: Arc<dyn SlugsRepo>,
        tags: Arc<dyn TagsRepo>,
        descriptions: Arc<dyn DescriptionSource>,
        site: Arc<SiteSettings>,
    ) -> Self {
        let renderer = markdown_renderer();
        Self {
            resolver: SlugResolver::new(entries.clone(), slugs.clone()),
            navigator: EntryNavigator::new(entries.clone(), slugs.clone()),
            aggregator: TagAggregator::new(
                tags.clone(),
                entries.clone(),
                descriptions,
                renderer.clone(),
            ),
            composer: PageComposer::new(site),
            entries,
            slugs,
            tags,
            renderer,
        }
    }

    pub fn settings(&self) -> &SiteSettings {
        self.composer.site()
    }

    pub async fn entry_by_slug(
        &self,
        requested: &str,
    ) -> Result<Resolution<PageData<EntryView>>, SiteError> {
        let resolved = match self.resolver.resolve(requested).await? {
            Resolution::Render(resolved) => resolved,
            Resolution::Redirect(location) => return Ok(Resolution::Redirect(location)),
        };

        let entry = &resolved.entry;
        // The template prints the title itself.
        let body_html = self.renderer.render_without_title(&entry.content)?;
        let excerpt = self.renderer.excerpt(&entry.content, EXCERPT_CHARS);
        let tags = self.tags.list_for_entry(entry.id).await?;
        let neighbors = self.navigator.neighbors(entry).await?;

        Ok(Resolution::Render(self.composer.entry(
            &resolved, body_html, excerpt, &tags, neighbors,
        )))
    }

    /// Location of the entry's canonical page.
    pub async fn entry_by_id(&self, id: EntryId) -> Result<String, SiteError> {
        self.resolver.canonical_for_id(id).await
    }

    /// `requested` is the raw `{n}` of `/page/{n}`, or `None` for `/`.
    pub async fn home(
        &self,
        requested: Option<&str>,
    ) -> Result<Resolution<PageData<HomeView>>, SiteError> {
        let page = match requested {
            None => 1,
            Some(raw) => match parse_page_number(raw) {
                Some(page) if page > 1 => page,
                _ => return Ok(Resolution::Redirect(ROOT_PATH.to_string())),
            },
        };

        let count = self.entries.count_published().await?;
        if count == 0 && requested.is_none() {
            return Ok(Resolution::Render(self.composer.home(None, Vec::new())));
        }

        let plan = match plan_page(count, self.settings().page_size, page) {
            Ok(plan) => plan,
            Err(_) => return Ok(Resolution::Redirect(ROOT_PATH.to_string())),
        };

        let entries = self
            .entries
            .list_published(SortOrder::NewestFirst, plan.limit, plan.offset)
            .await?;
        let cards = self.cards(&entries).await?;

        Ok(Resolution::Render(self.composer.home(Some(&plan), cards)))
    }

    /// Tag page for the `{slug}` segment under the kind's prefix. Spellings
    /// that only match after normalization redirect to the tag's own path.
    pub async fn tag(
        &self,
        kind: TagKind,
        requested: &str,
    ) -> Result<Resolution<PageData<TagView>>, SiteError> {
        let normalized = normalize_slug(requested)
            .map_err(|_| SiteError::NotFound(NotFoundReason::TagNotFound))?;
        let tag = self
            .aggregator
            .find(kind, TagLookup::Slug(&normalized))
            .await?;
        if tag.slug != requested {
            return Ok(Resolution::Redirect(tag.path()));
        }

        let aggregate = self
            .aggregator
            .aggregate(tag, &EntryQueryFilter::default())
            .await?;
        let cards = self.cards(&aggregate.entries).await?;

        Ok(Resolution::Render(self.composer.tag(aggregate, cards)))
    }

    pub async fn archive(&self) -> Result<PageData<ArchiveView>, SiteError> {
        let count = self.entries.count_published().await?;
        let limit = u32::try_from(count).unwrap_or(u32::MAX);
        let entries = self
            .entries
            .list_published(SortOrder::NewestFirst, limit, 0)
            .await?;

        let mut linked = Vec::with_capacity(entries.len());
        for entry in entries {
            let url = canonical_entry_path(self.slugs.as_ref(), &entry).await?;
            linked.push((entry, url));
        }
        let counts = self.tags.list_with_counts().await?;

        Ok(self.composer.archive(linked, counts))
    }

    /// Unknown or missing codes fall back to a generic message.
    pub fn not_found(&self, code: Option<&str>) -> PageData<NotFoundView> {
        self.composer
            .not_found(code.and_then(NotFoundReason::from_code))
    }

    async fn cards(&self, entries: &[EntryRecord]) -> Result<Vec<EntryCard>, SiteError> {
        let mut cards = Vec::with_capacity(entries.len());
        for entry in entries {
            let url = canonical_entry_path(self.slugs.as_ref(), entry).await?;
            let tags = self.tags.list_for_entry(entry.id).await?;
            let excerpt = self.renderer.excerpt(&entry.content, EXCERPT_CHARS);
            cards.push(self.composer.card(entry, url, &tags, excerpt));
        }
        Ok(cards)
    }
}
