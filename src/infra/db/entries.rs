use async_trait::async_trait;
use sqlx::{Postgres, QueryBuilder};
use time::OffsetDateTime;

use crate::{
    application::repos::{
        CreateEntryParams, EntriesRepo, EntriesWriteRepo, EntryQueryFilter, RepoError,
        RetitleEntryParams, UpdateEntryParams,
    },
    domain::{
        entities::{EntryRecord, RemovedEntryRecord, SlugRecord},
        types::{EntryId, SortOrder, TagId, TagKind},
    },
};

use super::{
    PostgresRepositories, map_sqlx_error,
    slugs::{SLUG_COLUMNS, SlugRow},
};

const ENTRY_COLUMNS: &str =
    "e.id, e.title, e.content, e.image, e.created_at, e.posted_at, e.modified_at, e.identifier";

#[derive(sqlx::FromRow)]
struct EntryRow {
    id: i64,
    title: String,
    content: String,
    image: Option<String>,
    created_at: Option<OffsetDateTime>,
    posted_at: Option<OffsetDateTime>,
    modified_at: Option<OffsetDateTime>,
    identifier: Option<String>,
}

impl From<EntryRow> for EntryRecord {
    fn from(row: EntryRow) -> Self {
        Self {
            id: EntryId(row.id),
            title: row.title,
            content: row.content,
            image: row.image,
            created_at: row.created_at,
            posted_at: row.posted_at,
            modified_at: row.modified_at,
            identifier: row.identifier,
        }
    }
}

#[derive(sqlx::FromRow)]
struct RemovedEntryRow {
    id: i64,
    title: String,
    content: String,
    tags: Vec<String>,
    slugs: Vec<String>,
    removed_at: OffsetDateTime,
}

impl From<RemovedEntryRow> for RemovedEntryRecord {
    fn from(row: RemovedEntryRow) -> Self {
        Self {
            id: row.id,
            title: row.title,
            content: row.content,
            tags: row.tags,
            slugs: row.slugs,
            removed_at: row.removed_at,
        }
    }
}

impl PostgresRepositories {
    async fn adjacent_entry(
        &self,
        entry: &EntryRecord,
        comparison: &str,
        direction: &str,
    ) -> Result<Option<EntryRecord>, RepoError> {
        let Some(posted_at) = entry.posted_at else {
            return Ok(None);
        };

        let row = sqlx::query_as::<_, EntryRow>(&format!(
            r#"
            SELECT {ENTRY_COLUMNS}
            FROM entries e
            WHERE e.posted_at IS NOT NULL
              AND (e.posted_at, e.id) {comparison} ($1, $2)
            ORDER BY e.posted_at {direction}, e.id {direction}
            LIMIT 1
            "#
        ))
        .bind(posted_at)
        .bind(entry.id)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(EntryRecord::from))
    }
}

#[async_trait]
impl EntriesRepo for PostgresRepositories {
    async fn find_entry(&self, id: EntryId) -> Result<Option<EntryRecord>, RepoError> {
        let row = sqlx::query_as::<_, EntryRow>(&format!(
            "SELECT {ENTRY_COLUMNS} FROM entries e WHERE e.id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(EntryRecord::from))
    }

    async fn previous_entry(&self, entry: &EntryRecord) -> Result<Option<EntryRecord>, RepoError> {
        self.adjacent_entry(entry, "<", "DESC").await
    }

    async fn next_entry(&self, entry: &EntryRecord) -> Result<Option<EntryRecord>, RepoError> {
        self.adjacent_entry(entry, ">", "ASC").await
    }

    async fn count_published(&self) -> Result<u64, RepoError> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM entries WHERE posted_at IS NOT NULL")
                .fetch_one(self.pool())
                .await
                .map_err(map_sqlx_error)?;

        Self::convert_count(count)
    }

    async fn list_published(
        &self,
        order: SortOrder,
        limit: u32,
        offset: u64,
    ) -> Result<Vec<EntryRecord>, RepoError> {
        let direction = match order {
            SortOrder::NewestFirst => "DESC",
            SortOrder::OldestFirst => "ASC",
        };

        let mut qb = QueryBuilder::<Postgres>::new(format!(
            "SELECT {ENTRY_COLUMNS} FROM entries e WHERE e.posted_at IS NOT NULL \
             ORDER BY e.posted_at {direction}, e.id {direction} LIMIT "
        ));
        qb.push_bind(i64::from(limit));
        qb.push(" OFFSET ");
        qb.push_bind(Self::convert_offset(offset)?);

        let rows = qb
            .build_query_as::<EntryRow>()
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(EntryRecord::from).collect())
    }

    async fn list_for_tag(
        &self,
        tag: TagId,
        filter: &EntryQueryFilter,
    ) -> Result<Vec<EntryRecord>, RepoError> {
        let mut qb = QueryBuilder::<Postgres>::new(format!(
            "SELECT {ENTRY_COLUMNS} FROM entries e \
             INNER JOIN entry_tags et ON et.entry_id = e.id \
             WHERE et.tag_id = "
        ));
        qb.push_bind(tag);

        if let Some(cutoff) = filter.posted_before {
            qb.push(" AND (e.posted_at IS NULL OR e.posted_at < ");
            qb.push_bind(cutoff);
            qb.push(")");
        }

        if let Some(search) = filter.search.as_ref() {
            qb.push(" AND e.title ILIKE ");
            qb.push_bind(format!("%{search}%"));
        }

        qb.push(" ORDER BY e.posted_at DESC NULLS LAST, e.id DESC");

        let rows = qb
            .build_query_as::<EntryRow>()
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(EntryRecord::from).collect())
    }

    async fn list_all(&self) -> Result<Vec<EntryRecord>, RepoError> {
        let rows = sqlx::query_as::<_, EntryRow>(&format!(
            "SELECT {ENTRY_COLUMNS} FROM entries e ORDER BY e.id"
        ))
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(EntryRecord::from).collect())
    }
}

#[async_trait]
impl EntriesWriteRepo for PostgresRepositories {
    async fn create_entry(&self, params: CreateEntryParams) -> Result<EntryRecord, RepoError> {
        let tag_ids: Vec<i64> = params.tags.iter().map(|tag| tag.0).collect();
        let mut tx = self.begin().await.map_err(map_sqlx_error)?;

        let row = sqlx::query_as::<_, EntryRow>(
            r#"
            INSERT INTO entries (title, content, image, created_at, posted_at, identifier)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, title, content, image, created_at, posted_at, modified_at, identifier
            "#,
        )
        .bind(&params.title)
        .bind(&params.content)
        .bind(&params.image)
        .bind(params.created_at)
        .bind(params.posted_at)
        .bind(&params.identifier)
        .fetch_one(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;

        sqlx::query("INSERT INTO slugs (entry_id, text, is_current) VALUES ($1, $2, TRUE)")
            .bind(row.id)
            .bind(&params.slug)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;

        if !params.aliases.is_empty() {
            sqlx::query(
                r#"
                INSERT INTO slugs (entry_id, text, is_current)
                SELECT $1, alias, FALSE FROM UNNEST($2::TEXT[]) WITH ORDINALITY AS a(alias, n)
                ORDER BY n
                "#,
            )
            .bind(row.id)
            .bind(&params.aliases)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;
        }

        if !tag_ids.is_empty() {
            sqlx::query(
                r#"
                INSERT INTO entry_tags (entry_id, tag_id)
                SELECT $1, tag_id FROM UNNEST($2::BIGINT[]) AS tag_id
                ON CONFLICT DO NOTHING
                "#,
            )
            .bind(row.id)
            .bind(&tag_ids)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;
        }

        tx.commit().await.map_err(map_sqlx_error)?;

        Ok(EntryRecord::from(row))
    }

    async fn update_entry(&self, params: UpdateEntryParams) -> Result<EntryRecord, RepoError> {
        let row = sqlx::query_as::<_, EntryRow>(
            r#"
            UPDATE entries
            SET title = $2, content = $3, image = $4, posted_at = $5, modified_at = $6
            WHERE id = $1
            RETURNING id, title, content, image, created_at, posted_at, modified_at, identifier
            "#,
        )
        .bind(params.id)
        .bind(&params.title)
        .bind(&params.content)
        .bind(&params.image)
        .bind(params.posted_at)
        .bind(params.modified_at)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        row.map(EntryRecord::from).ok_or(RepoError::NotFound)
    }

    async fn retitle_entry(
        &self,
        params: RetitleEntryParams,
    ) -> Result<(EntryRecord, SlugRecord), RepoError> {
        let mut tx = self.begin().await.map_err(map_sqlx_error)?;

        let entry = sqlx::query_as::<_, EntryRow>(
            r#"
            UPDATE entries SET title = $2, modified_at = $3
            WHERE id = $1
            RETURNING id, title, content, image, created_at, posted_at, modified_at, identifier
            "#,
        )
        .bind(params.id)
        .bind(&params.title)
        .bind(params.modified_at)
        .fetch_optional(&mut *tx)
        .await
        .map_err(map_sqlx_error)?
        .ok_or(RepoError::NotFound)?;

        let current = sqlx::query_as::<_, SlugRow>(&format!(
            "SELECT {SLUG_COLUMNS} FROM slugs s WHERE s.entry_id = $1 AND s.is_current"
        ))
        .bind(params.id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(map_sqlx_error)?
        .map(SlugRecord::from);

        let slug = match current {
            Some(current) if current.text == params.slug => current,
            _ => {
                sqlx::query(
                    "UPDATE slugs SET is_current = FALSE WHERE entry_id = $1 AND is_current",
                )
                .bind(params.id)
                .execute(&mut *tx)
                .await
                .map_err(map_sqlx_error)?;

                let reused = sqlx::query_as::<_, SlugRow>(&format!(
                    r#"
                    UPDATE slugs s SET is_current = TRUE
                    WHERE s.entry_id = $1 AND s.text = $2
                    RETURNING {SLUG_COLUMNS}
                    "#
                ))
                .bind(params.id)
                .bind(&params.slug)
                .fetch_optional(&mut *tx)
                .await
                .map_err(map_sqlx_error)?;

                let row = match reused {
                    Some(row) => row,
                    None => sqlx::query_as::<_, SlugRow>(
                        r#"
                        INSERT INTO slugs (entry_id, text, is_current)
                        VALUES ($1, $2, TRUE)
                        RETURNING id, entry_id, text, is_current
                        "#,
                    )
                    .bind(params.id)
                    .bind(&params.slug)
                    .fetch_one(&mut *tx)
                    .await
                    .map_err(map_sqlx_error)?,
                };
                SlugRecord::from(row)
            }
        };

        tx.commit().await.map_err(map_sqlx_error)?;

        Ok((EntryRecord::from(entry), slug))
    }

    async fn remove_entry(&self, entry: EntryId) -> Result<RemovedEntryRecord, RepoError> {
        let mut tx = self.begin().await.map_err(map_sqlx_error)?;

        let live = sqlx::query_as::<_, EntryRow>(&format!(
            "SELECT {ENTRY_COLUMNS} FROM entries e WHERE e.id = $1 FOR UPDATE"
        ))
        .bind(entry)
        .fetch_optional(&mut *tx)
        .await
        .map_err(map_sqlx_error)?
        .ok_or(RepoError::NotFound)?;

        let tags: Vec<(TagKind, String)> = sqlx::query_as(
            r#"
            SELECT t.kind, t.label
            FROM tags t
            INNER JOIN entry_tags et ON et.tag_id = t.id
            WHERE et.entry_id = $1
            ORDER BY t.kind, LOWER(t.label)
            "#,
        )
        .bind(entry)
        .fetch_all(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;
        let markers: Vec<String> = tags
            .into_iter()
            .map(|(kind, label)| format!("{}{label}", kind.sigil()))
            .collect();

        let slugs: Vec<String> = sqlx::query_scalar(
            "SELECT text FROM slugs WHERE entry_id = $1 ORDER BY is_current DESC, created_at, id",
        )
        .bind(entry)
        .fetch_all(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;

        let removed = sqlx::query_as::<_, RemovedEntryRow>(
            r#"
            INSERT INTO removed_entries (id, title, content, tags, slugs)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, title, content, tags, slugs, removed_at
            "#,
        )
        .bind(live.id)
        .bind(&live.title)
        .bind(&live.content)
        .bind(&markers)
        .bind(&slugs)
        .fetch_one(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;

        sqlx::query("DELETE FROM entries WHERE id = $1")
            .bind(entry)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;

        tx.commit().await.map_err(map_sqlx_error)?;

        Ok(RemovedEntryRecord::from(removed))
    }
}
