use async_trait::async_trait;

use crate::{
    application::repos::{
        CreateTagParams, RepoError, TagLookup, TagWithCount, TagsRepo, TagsWriteRepo,
    },
    domain::{
        entities::TagRecord,
        types::{EntryId, TagId, TagKind},
    },
};

use super::{PostgresRepositories, map_sqlx_error};

const TAG_COLUMNS: &str = "t.id, t.label, t.kind, t.description, t.slug";

#[derive(sqlx::FromRow)]
struct TagRow {
    id: i64,
    label: String,
    kind: TagKind,
    description: Option<String>,
    slug: String,
}

impl From<TagRow> for TagRecord {
    fn from(row: TagRow) -> Self {
        Self {
            id: TagId(row.id),
            label: row.label,
            kind: row.kind,
            description: row.description,
            slug: row.slug,
        }
    }
}

#[derive(sqlx::FromRow)]
struct TagCountRow {
    #[sqlx(flatten)]
    tag: TagRow,
    entry_count: i64,
}

#[async_trait]
impl TagsRepo for PostgresRepositories {
    async fn find_tag(
        &self,
        kind: TagKind,
        lookup: TagLookup<'_>,
    ) -> Result<Option<TagRecord>, RepoError> {
        let (column, value) = match lookup {
            TagLookup::Label(label) => ("label", label),
            TagLookup::Slug(slug) => ("slug", slug),
        };

        let row = sqlx::query_as::<_, TagRow>(&format!(
            "SELECT {TAG_COLUMNS} FROM tags t WHERE t.kind = $1 AND t.{column} = $2"
        ))
        .bind(kind)
        .bind(value)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(TagRecord::from))
    }

    async fn list_for_entry(&self, entry: EntryId) -> Result<Vec<TagRecord>, RepoError> {
        let rows = sqlx::query_as::<_, TagRow>(&format!(
            r#"
            SELECT {TAG_COLUMNS}
            FROM tags t
            INNER JOIN entry_tags et ON et.tag_id = t.id
            WHERE et.entry_id = $1
            ORDER BY t.kind, LOWER(t.label)
            "#
        ))
        .bind(entry)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(TagRecord::from).collect())
    }

    async fn list_with_counts(&self) -> Result<Vec<TagWithCount>, RepoError> {
        let rows = sqlx::query_as::<_, TagCountRow>(&format!(
            r#"
            SELECT {TAG_COLUMNS}, COUNT(e.id) AS entry_count
            FROM tags t
            LEFT JOIN entry_tags et ON et.tag_id = t.id
            LEFT JOIN entries e ON e.id = et.entry_id AND e.posted_at IS NOT NULL
            GROUP BY t.id
            ORDER BY t.kind, LOWER(t.label)
            "#
        ))
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        rows.into_iter()
            .map(|row| {
                Ok(TagWithCount {
                    entry_count: Self::convert_count(row.entry_count)?,
                    tag: TagRecord::from(row.tag),
                })
            })
            .collect()
    }
}

#[async_trait]
impl TagsWriteRepo for PostgresRepositories {
    async fn create_tag(&self, params: CreateTagParams) -> Result<TagRecord, RepoError> {
        let row = sqlx::query_as::<_, TagRow>(
            r#"
            INSERT INTO tags (label, kind, slug, description)
            VALUES ($1, $2, $3, $4)
            RETURNING id, label, kind, description, slug
            "#,
        )
        .bind(&params.label)
        .bind(params.kind)
        .bind(&params.slug)
        .bind(&params.description)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(TagRecord::from(row))
    }
}
