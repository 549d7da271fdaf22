mod support;

use std::num::NonZeroUsize;
use std::sync::Arc;

use scriptorium::application::authoring::{
    AuthoringError, AuthoringService, NewEntry, TagRef, parse_tag_marker,
};
use scriptorium::application::repos::{
    EntriesRepo, EntriesWriteRepo, RepoError, RetitleEntryParams, TagLookup, TagsRepo,
};
use scriptorium::application::resolver::Resolution;
use scriptorium::domain::error::DomainError;
use scriptorium::domain::types::{EntryId, TagKind};
use time::{OffsetDateTime, macros::datetime};

use support::{MemoryRepo, site_service};

fn authoring(repo: &Arc<MemoryRepo>, token_bound: usize) -> AuthoringService {
    AuthoringService::new(
        repo.clone(),
        repo.clone(),
        repo.clone(),
        repo.clone(),
        repo.clone(),
        NonZeroUsize::new(token_bound).expect("non-zero bound"),
    )
}

fn entry(title: &str) -> NewEntry {
    NewEntry {
        title: title.to_string(),
        content: format!("Notes on {title}."),
        posted_at: Some(datetime!(2024-05-01 12:00 UTC)),
        ..NewEntry::default()
    }
}

#[tokio::test]
async fn generated_slugs_take_smallest_free_suffix() {
    let repo = MemoryRepo::new();
    let service = authoring(&repo, 2);

    let first = service
        .create_entry(entry("Hello, World!!!"))
        .await
        .expect("first");
    let second = service
        .create_entry(entry("Hello World, again"))
        .await
        .expect("second");

    assert_eq!(repo.slug_texts(first.id).await, [("hello-world".to_string(), true)]);
    assert_eq!(
        repo.slug_texts(second.id).await,
        [("hello-world-1".to_string(), true)]
    );
}

#[tokio::test]
async fn tags_are_created_once_and_attached() {
    let repo = MemoryRepo::new();
    let service = authoring(&repo, 5);

    let mut first = entry("Lenses");
    first.tags = vec![
        parse_tag_marker("#Haskell").expect("marker"),
        parse_tag_marker("+Optics Series").expect("marker"),
    ];
    let first = service.create_entry(first).await.expect("create");

    let mut second = entry("Prisms");
    second.tags = vec![TagRef {
        kind: TagKind::General,
        label: "Haskell".to_string(),
    }];
    service.create_entry(second).await.expect("create");

    let tags = repo.list_for_entry(first.id).await.expect("tags");
    let markers: Vec<_> = tags.iter().map(|tag| tag.marker()).collect();
    assert_eq!(markers, ["#Haskell", "+Optics Series"]);

    let series = repo
        .find_tag(TagKind::Series, TagLookup::Label("Optics Series"))
        .await
        .expect("lookup")
        .expect("series tag");
    assert_eq!(series.slug, "optics-series");

    let counts = repo.list_with_counts().await.expect("counts");
    let haskell = counts
        .iter()
        .find(|counted| counted.tag.label == "Haskell")
        .expect("haskell");
    assert_eq!(haskell.entry_count, 2);
}

#[tokio::test]
async fn retitle_moves_the_canonical_slug_and_keeps_history() {
    let repo = MemoryRepo::new();
    let service = authoring(&repo, 5);
    let site = site_service(&repo, 5);

    let created = service
        .create_entry(entry("Fun with Lenses"))
        .await
        .expect("create");
    let slug = service
        .retitle_entry(created.id, "Optics Primer")
        .await
        .expect("retitle");
    assert_eq!(slug.text, "optics-primer");
    assert!(slug.is_current);

    let old = site.entry_by_slug("fun-with-lenses").await.expect("resolve");
    assert!(matches!(old, Resolution::Redirect(ref path) if path == "/entry/optics-primer"));

    let renamed = repo.entry(created.id).await.expect("entry");
    assert_eq!(renamed.title, "Optics Primer");
    assert!(renamed.modified_at.is_some());
}

#[tokio::test]
async fn retitle_back_reuses_the_old_slug() {
    let repo = MemoryRepo::new();
    let service = authoring(&repo, 5);

    let created = service
        .create_entry(entry("Fun with Lenses"))
        .await
        .expect("create");
    service
        .retitle_entry(created.id, "Optics Primer")
        .await
        .expect("retitle");
    let back = service
        .retitle_entry(created.id, "Fun with Lenses")
        .await
        .expect("retitle back");

    assert_eq!(back.text, "fun-with-lenses");
    assert_eq!(
        repo.slug_texts(created.id).await,
        [
            ("fun-with-lenses".to_string(), true),
            ("optics-primer".to_string(), false),
        ]
    );
}

#[tokio::test]
async fn retitle_to_same_slug_keeps_it() {
    let repo = MemoryRepo::new();
    let service = authoring(&repo, 5);

    let created = service
        .create_entry(entry("Fun with Lenses"))
        .await
        .expect("create");
    let slug = service
        .retitle_entry(created.id, "Fun with lenses!")
        .await
        .expect("retitle");

    assert_eq!(slug.text, "fun-with-lenses");
    assert_eq!(repo.slug_texts(created.id).await.len(), 1);
}

#[tokio::test]
async fn set_posted_toggles_publication() {
    let repo = MemoryRepo::new();
    let service = authoring(&repo, 5);

    let mut draft = entry("Soon");
    draft.posted_at = None;
    let draft = service.create_entry(draft).await.expect("create");
    assert!(!draft.is_published());

    let posted = service
        .set_posted(draft.id, Some(datetime!(2024-06-01 08:00 UTC)))
        .await
        .expect("post");
    assert!(posted.is_published());

    let withdrawn = service.set_posted(draft.id, None).await.expect("unpost");
    assert!(!withdrawn.is_published());
}

#[tokio::test]
async fn remove_snapshots_entry() {
    let repo = MemoryRepo::new();
    let service = authoring(&repo, 5);

    let mut doomed = entry("Doomed");
    doomed.tags = vec![parse_tag_marker("@Notes").expect("marker")];
    doomed.aliases = vec!["Old Doomed".to_string()];
    let doomed = service.create_entry(doomed).await.expect("create");

    let removed = service.remove_entry(doomed.id).await.expect("remove");
    assert_eq!(removed.title, "Doomed");
    assert_eq!(removed.tags, ["@Notes"]);
    assert_eq!(removed.slugs, ["doomed", "old-doomed"]);
    assert_eq!(repo.removed().await.len(), 1);
    assert!(repo.entry(doomed.id).await.is_none());

    let again = service.remove_entry(doomed.id).await;
    assert!(matches!(
        again,
        Err(AuthoringError::Domain(DomainError::NotFound { .. }))
    ));
}

#[tokio::test]
async fn empty_titles_and_duplicates_are_rejected() {
    let repo = MemoryRepo::new();
    let service = authoring(&repo, 5);

    let blank = service.create_entry(entry("   ")).await;
    assert!(matches!(blank, Err(AuthoringError::Domain(_))));

    service.create_entry(entry("Twice")).await.expect("first");
    let mut clash = entry("Twice");
    clash.slug = Some("twice-again".to_string());
    let duplicate = service.create_entry(clash).await;
    assert!(matches!(
        duplicate,
        Err(AuthoringError::Repo(RepoError::Duplicate { .. }))
    ));

    let missing = service.retitle_entry(EntryId(404), "Anything").await;
    assert!(matches!(missing, Err(AuthoringError::Domain(_))));
}

#[tokio::test]
async fn conflicting_alias_leaves_no_partial_entry() {
    let repo = MemoryRepo::new();
    let service = authoring(&repo, 5);
    service.create_entry(entry("Lenses")).await.expect("first");

    let mut optics = entry("Optics");
    optics.aliases = vec!["lenses".to_string()];
    optics.tags = vec![parse_tag_marker("#Haskell").expect("marker")];
    let failed = service.create_entry(optics).await;
    assert!(matches!(
        failed,
        Err(AuthoringError::Repo(RepoError::Duplicate { ref constraint })) if constraint == "slugs_text_key"
    ));

    let titles: Vec<_> = repo
        .list_all()
        .await
        .expect("entries")
        .into_iter()
        .map(|entry| entry.title)
        .collect();
    assert_eq!(titles, ["Lenses"]);

    let retried = service
        .create_entry(entry("Optics"))
        .await
        .expect("retry without the alias");
    assert_eq!(repo.slug_texts(retried.id).await, [("optics".to_string(), true)]);
}

#[tokio::test]
async fn failed_retitle_keeps_title_and_slug() {
    let repo = MemoryRepo::new();
    let service = authoring(&repo, 5);
    let lenses = service.create_entry(entry("Lenses")).await.expect("lenses");
    service.create_entry(entry("Prisms")).await.expect("prisms");

    let clash = repo
        .retitle_entry(RetitleEntryParams {
            id: lenses.id,
            title: "Lenses, revised".to_string(),
            slug: "prisms".to_string(),
            modified_at: OffsetDateTime::now_utc(),
        })
        .await;
    assert!(matches!(clash, Err(RepoError::Duplicate { .. })));

    let stored = repo.entry(lenses.id).await.expect("entry");
    assert_eq!(stored.title, "Lenses");
    assert_eq!(stored.modified_at, None);
    assert_eq!(repo.slug_texts(lenses.id).await, [("lenses".to_string(), true)]);
}

#[tokio::test]
async fn retitle_to_unchanged_title_keeps_suffixed_slug() {
    let repo = MemoryRepo::new();
    let service = authoring(&repo, 5);
    service.create_entry(entry("Foo")).await.expect("foo");
    let middle = service.create_entry(entry("Foo.")).await.expect("foo-1");
    let last = service.create_entry(entry("Foo?")).await.expect("foo-2");
    assert_eq!(repo.slug_texts(last.id).await, [("foo-2".to_string(), true)]);

    service.remove_entry(middle.id).await.expect("remove");

    let kept = service
        .retitle_entry(last.id, "Foo?")
        .await
        .expect("retitle");
    assert_eq!(kept.text, "foo-2");
    assert_eq!(repo.slug_texts(last.id).await, [("foo-2".to_string(), true)]);
}
