#![allow(dead_code)]

use std::collections::{BTreeMap, BTreeSet};
use std::num::NonZeroU32;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::Mutex;
use url::Url;

use scriptorium::application::repos::{
    CreateEntryParams, CreateTagParams, EntriesRepo, EntriesWriteRepo, EntryQueryFilter,
    HealthCheck, RepoError, RetitleEntryParams, SlugsRepo, TagLookup, TagWithCount, TagsRepo,
    TagsWriteRepo, UpdateEntryParams,
};
use scriptorium::application::site::SiteService;
use scriptorium::application::tags::StoredDescriptions;
use scriptorium::config::SiteSettings;
use scriptorium::domain::entities::{EntryRecord, RemovedEntryRecord, SlugRecord, TagRecord};
use scriptorium::domain::types::{EntryId, SortOrder, TagId, TagKind};

#[derive(Default)]
struct State {
    entries: BTreeMap<i64, EntryRecord>,
    slugs: Vec<SlugRecord>,
    tags: Vec<TagRecord>,
    links: BTreeSet<(i64, i64)>,
    removed: Vec<RemovedEntryRecord>,
    next_id: i64,
}

impl State {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

/// In-memory stand-in for the Postgres repositories.
#[derive(Default)]
pub struct MemoryRepo {
    state: Mutex<State>,
    unhealthy: AtomicBool,
}

impl MemoryRepo {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_unhealthy(&self) {
        self.unhealthy.store(true, Ordering::SeqCst);
    }

    /// Insert an entry whose current slug is `slug`.
    pub async fn seed_entry(
        &self,
        title: &str,
        content: &str,
        posted_at: Option<OffsetDateTime>,
        slug: &str,
    ) -> EntryId {
        let mut state = self.state.lock().await;
        let id = state.next_id();
        state.entries.insert(
            id,
            EntryRecord {
                id: EntryId(id),
                title: title.to_string(),
                content: content.to_string(),
                image: None,
                created_at: posted_at,
                posted_at,
                modified_at: None,
                identifier: None,
            },
        );
        let slug_id = state.next_id();
        state.slugs.push(SlugRecord {
            id: slug_id,
            entry_id: EntryId(id),
            text: slug.to_string(),
            is_current: true,
        });
        EntryId(id)
    }

    /// Attach a non-current slug.
    pub async fn seed_history(&self, entry: EntryId, text: &str) {
        let mut state = self.state.lock().await;
        let id = state.next_id();
        state.slugs.push(SlugRecord {
            id,
            entry_id: entry,
            text: text.to_string(),
            is_current: false,
        });
    }

    /// Drop every current slug of `entry`, leaving only history.
    pub async fn demote_all(&self, entry: EntryId) {
        let mut state = self.state.lock().await;
        for slug in state.slugs.iter_mut().filter(|slug| slug.entry_id == entry) {
            slug.is_current = false;
        }
    }

    /// A slug pointing at an entry id that no longer exists.
    pub async fn seed_orphan_slug(&self, text: &str, entry: EntryId) {
        let mut state = self.state.lock().await;
        let id = state.next_id();
        state.slugs.push(SlugRecord {
            id,
            entry_id: entry,
            text: text.to_string(),
            is_current: true,
        });
    }

    pub async fn seed_tag(&self, kind: TagKind, label: &str, slug: &str) -> TagId {
        let mut state = self.state.lock().await;
        let id = state.next_id();
        state.tags.push(TagRecord {
            id: TagId(id),
            label: label.to_string(),
            kind,
            description: None,
            slug: slug.to_string(),
        });
        TagId(id)
    }

    pub async fn link(&self, entry: EntryId, tag: TagId) {
        self.state.lock().await.links.insert((entry.0, tag.0));
    }

    pub async fn removed(&self) -> Vec<RemovedEntryRecord> {
        self.state.lock().await.removed.clone()
    }

    pub async fn entry(&self, id: EntryId) -> Option<EntryRecord> {
        self.state.lock().await.entries.get(&id.0).cloned()
    }

    pub async fn slug_texts(&self, entry: EntryId) -> Vec<(String, bool)> {
        let mut slugs = self.slugs_for_entry(entry).await.unwrap_or_default();
        slugs.sort_by_key(|slug| slug.id);
        slugs
            .into_iter()
            .map(|slug| (slug.text, slug.is_current))
            .collect()
    }
}

fn duplicate(constraint: &str) -> RepoError {
    RepoError::Duplicate {
        constraint: constraint.to_string(),
    }
}

fn published_key(entry: &EntryRecord) -> Option<(OffsetDateTime, i64)> {
    entry.posted_at.map(|posted| (posted, entry.id.0))
}

#[async_trait]
impl EntriesRepo for MemoryRepo {
    async fn find_entry(&self, id: EntryId) -> Result<Option<EntryRecord>, RepoError> {
        Ok(self.state.lock().await.entries.get(&id.0).cloned())
    }

    async fn previous_entry(&self, entry: &EntryRecord) -> Result<Option<EntryRecord>, RepoError> {
        let Some(pivot) = published_key(entry) else {
            return Ok(None);
        };
        let state = self.state.lock().await;
        Ok(state
            .entries
            .values()
            .filter_map(|candidate| published_key(candidate).map(|key| (key, candidate)))
            .filter(|(key, _)| *key < pivot)
            .max_by_key(|(key, _)| *key)
            .map(|(_, candidate)| candidate.clone()))
    }

    async fn next_entry(&self, entry: &EntryRecord) -> Result<Option<EntryRecord>, RepoError> {
        let Some(pivot) = published_key(entry) else {
            return Ok(None);
        };
        let state = self.state.lock().await;
        Ok(state
            .entries
            .values()
            .filter_map(|candidate| published_key(candidate).map(|key| (key, candidate)))
            .filter(|(key, _)| *key > pivot)
            .min_by_key(|(key, _)| *key)
            .map(|(_, candidate)| candidate.clone()))
    }

    async fn count_published(&self) -> Result<u64, RepoError> {
        let state = self.state.lock().await;
        Ok(state.entries.values().filter(|e| e.is_published()).count() as u64)
    }

    async fn list_published(
        &self,
        order: SortOrder,
        limit: u32,
        offset: u64,
    ) -> Result<Vec<EntryRecord>, RepoError> {
        let state = self.state.lock().await;
        let mut published: Vec<_> = state
            .entries
            .values()
            .filter(|entry| entry.is_published())
            .cloned()
            .collect();
        published.sort_by_key(published_key);
        if order == SortOrder::NewestFirst {
            published.reverse();
        }
        Ok(published
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .collect())
    }

    async fn list_for_tag(
        &self,
        tag: TagId,
        filter: &EntryQueryFilter,
    ) -> Result<Vec<EntryRecord>, RepoError> {
        let state = self.state.lock().await;
        let mut tagged: Vec<_> = state
            .links
            .iter()
            .filter(|(_, tag_id)| *tag_id == tag.0)
            .filter_map(|(entry_id, _)| state.entries.get(entry_id))
            .filter(|entry| filter.matches(entry))
            .cloned()
            .collect();
        tagged.sort_by(|a, b| {
            b.posted_at
                .is_some()
                .cmp(&a.posted_at.is_some())
                .then(b.posted_at.cmp(&a.posted_at))
                .then(b.id.cmp(&a.id))
        });
        Ok(tagged)
    }

    async fn list_all(&self) -> Result<Vec<EntryRecord>, RepoError> {
        Ok(self.state.lock().await.entries.values().cloned().collect())
    }
}

#[async_trait]
impl SlugsRepo for MemoryRepo {
    async fn find_slug(&self, text: &str) -> Result<Option<SlugRecord>, RepoError> {
        let state = self.state.lock().await;
        Ok(state.slugs.iter().find(|slug| slug.text == text).cloned())
    }

    async fn current_slug(&self, entry: EntryId) -> Result<Option<SlugRecord>, RepoError> {
        let state = self.state.lock().await;
        Ok(state
            .slugs
            .iter()
            .find(|slug| slug.entry_id == entry && slug.is_current)
            .cloned())
    }

    async fn slugs_for_entry(&self, entry: EntryId) -> Result<Vec<SlugRecord>, RepoError> {
        let state = self.state.lock().await;
        let mut slugs: Vec<_> = state
            .slugs
            .iter()
            .filter(|slug| slug.entry_id == entry)
            .cloned()
            .collect();
        slugs.sort_by(|a, b| b.is_current.cmp(&a.is_current).then(a.id.cmp(&b.id)));
        Ok(slugs)
    }
}

#[async_trait]
impl TagsRepo for MemoryRepo {
    async fn find_tag(
        &self,
        kind: TagKind,
        lookup: TagLookup<'_>,
    ) -> Result<Option<TagRecord>, RepoError> {
        let state = self.state.lock().await;
        Ok(state
            .tags
            .iter()
            .find(|tag| {
                tag.kind == kind
                    && match lookup {
                        TagLookup::Label(label) => tag.label == label,
                        TagLookup::Slug(slug) => tag.slug == slug,
                    }
            })
            .cloned())
    }

    async fn list_for_entry(&self, entry: EntryId) -> Result<Vec<TagRecord>, RepoError> {
        let state = self.state.lock().await;
        let mut tags: Vec<_> = state
            .tags
            .iter()
            .filter(|tag| state.links.contains(&(entry.0, tag.id.0)))
            .cloned()
            .collect();
        tags.sort_by(|a, b| {
            a.kind
                .cmp(&b.kind)
                .then(a.label.to_lowercase().cmp(&b.label.to_lowercase()))
        });
        Ok(tags)
    }

    async fn list_with_counts(&self) -> Result<Vec<TagWithCount>, RepoError> {
        let state = self.state.lock().await;
        let mut counted: Vec<_> = state
            .tags
            .iter()
            .map(|tag| TagWithCount {
                entry_count: state
                    .links
                    .iter()
                    .filter(|(entry_id, tag_id)| {
                        *tag_id == tag.id.0
                            && state
                                .entries
                                .get(entry_id)
                                .is_some_and(|entry| entry.is_published())
                    })
                    .count() as u64,
                tag: tag.clone(),
            })
            .collect();
        counted.sort_by(|a, b| {
            a.tag
                .kind
                .cmp(&b.tag.kind)
                .then(a.tag.label.to_lowercase().cmp(&b.tag.label.to_lowercase()))
        });
        Ok(counted)
    }
}

#[async_trait]
impl EntriesWriteRepo for MemoryRepo {
    async fn create_entry(&self, params: CreateEntryParams) -> Result<EntryRecord, RepoError> {
        let mut state = self.state.lock().await;
        if state.entries.values().any(|e| e.title == params.title) {
            return Err(duplicate("entries_title_key"));
        }
        let mut texts = BTreeSet::new();
        for text in std::iter::once(&params.slug).chain(&params.aliases) {
            if !texts.insert(text.as_str()) || state.slugs.iter().any(|slug| &slug.text == text) {
                return Err(duplicate("slugs_text_key"));
            }
        }
        if let Some(tag) = params
            .tags
            .iter()
            .find(|tag| !state.tags.iter().any(|known| known.id == **tag))
        {
            return Err(RepoError::Integrity {
                message: format!("unknown tag {tag}"),
            });
        }

        let id = state.next_id();
        let entry = EntryRecord {
            id: EntryId(id),
            title: params.title,
            content: params.content,
            image: params.image,
            created_at: Some(params.created_at),
            posted_at: params.posted_at,
            modified_at: None,
            identifier: params.identifier,
        };
        state.entries.insert(id, entry.clone());

        let current = std::iter::once((params.slug, true));
        let aliases = params.aliases.into_iter().map(|text| (text, false));
        for (text, is_current) in current.chain(aliases) {
            let slug_id = state.next_id();
            state.slugs.push(SlugRecord {
                id: slug_id,
                entry_id: EntryId(id),
                text,
                is_current,
            });
        }
        for tag in params.tags {
            state.links.insert((id, tag.0));
        }
        Ok(entry)
    }

    async fn update_entry(&self, params: UpdateEntryParams) -> Result<EntryRecord, RepoError> {
        let mut state = self.state.lock().await;
        let entry = state
            .entries
            .get_mut(&params.id.0)
            .ok_or(RepoError::NotFound)?;
        entry.title = params.title;
        entry.content = params.content;
        entry.image = params.image;
        entry.posted_at = params.posted_at;
        entry.modified_at = Some(params.modified_at);
        Ok(entry.clone())
    }

    async fn retitle_entry(
        &self,
        params: RetitleEntryParams,
    ) -> Result<(EntryRecord, SlugRecord), RepoError> {
        let mut state = self.state.lock().await;
        let RetitleEntryParams {
            id,
            title,
            slug: text,
            modified_at,
        } = params;

        if !state.entries.contains_key(&id.0) {
            return Err(RepoError::NotFound);
        }
        if state
            .entries
            .values()
            .any(|entry| entry.id != id && entry.title == title)
        {
            return Err(duplicate("entries_title_key"));
        }
        if state
            .slugs
            .iter()
            .any(|slug| slug.text == text && slug.entry_id != id)
        {
            return Err(duplicate("slugs_text_key"));
        }

        let entry = state.entries.get_mut(&id.0).ok_or(RepoError::NotFound)?;
        entry.title = title;
        entry.modified_at = Some(modified_at);
        let entry = entry.clone();

        for slug in state.slugs.iter_mut().filter(|slug| slug.entry_id == id) {
            slug.is_current = slug.text == text;
        }
        if let Some(existing) = state.slugs.iter().find(|slug| slug.text == text) {
            return Ok((entry, existing.clone()));
        }

        let slug_id = state.next_id();
        let record = SlugRecord {
            id: slug_id,
            entry_id: id,
            text,
            is_current: true,
        };
        state.slugs.push(record.clone());
        Ok((entry, record))
    }

    async fn remove_entry(&self, entry: EntryId) -> Result<RemovedEntryRecord, RepoError> {
        let mut state = self.state.lock().await;
        let live = state.entries.remove(&entry.0).ok_or(RepoError::NotFound)?;

        let mut tags: Vec<_> = state
            .tags
            .iter()
            .filter(|tag| state.links.contains(&(entry.0, tag.id.0)))
            .map(TagRecord::marker)
            .collect();
        tags.sort();
        let mut slugs: Vec<_> = state
            .slugs
            .iter()
            .filter(|slug| slug.entry_id == entry)
            .cloned()
            .collect();
        slugs.sort_by(|a, b| b.is_current.cmp(&a.is_current).then(a.id.cmp(&b.id)));

        state.links.retain(|(entry_id, _)| *entry_id != entry.0);
        state.slugs.retain(|slug| slug.entry_id != entry);

        let removed = RemovedEntryRecord {
            id: entry.0,
            title: live.title,
            content: live.content,
            tags,
            slugs: slugs.into_iter().map(|slug| slug.text).collect(),
            removed_at: OffsetDateTime::now_utc(),
        };
        state.removed.push(removed.clone());
        Ok(removed)
    }
}

#[async_trait]
impl TagsWriteRepo for MemoryRepo {
    async fn create_tag(&self, params: CreateTagParams) -> Result<TagRecord, RepoError> {
        let mut state = self.state.lock().await;
        if state
            .tags
            .iter()
            .any(|tag| tag.kind == params.kind && (tag.label == params.label || tag.slug == params.slug))
        {
            return Err(duplicate("tags_label_kind_key"));
        }
        let id = state.next_id();
        let record = TagRecord {
            id: TagId(id),
            label: params.label,
            kind: params.kind,
            description: params.description,
            slug: params.slug,
        };
        state.tags.push(record.clone());
        Ok(record)
    }
}

#[async_trait]
impl HealthCheck for MemoryRepo {
    async fn check(&self) -> Result<(), RepoError> {
        if self.unhealthy.load(Ordering::SeqCst) {
            Err(RepoError::from_persistence("connection refused"))
        } else {
            Ok(())
        }
    }
}

pub fn site_settings(page_size: u32) -> Arc<SiteSettings> {
    let mut site = SiteSettings::new(
        "Field Notes",
        Url::parse("https://notes.example.com/").expect("valid url"),
    );
    site.page_size = NonZeroU32::new(page_size).expect("non-zero page size");
    Arc::new(site)
}

pub fn site_service(repo: &Arc<MemoryRepo>, page_size: u32) -> SiteService {
    SiteService::new(
        repo.clone(),
        repo.clone(),
        repo.clone(),
        Arc::new(StoredDescriptions),
        site_settings(page_size),
    )
}
