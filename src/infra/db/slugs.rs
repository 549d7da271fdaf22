use async_trait::async_trait;

use crate::{
    application::repos::{RepoError, SlugsRepo},
    domain::{entities::SlugRecord, types::EntryId},
};

use super::{PostgresRepositories, map_sqlx_error};

pub(super) const SLUG_COLUMNS: &str = "s.id, s.entry_id, s.text, s.is_current";

#[derive(sqlx::FromRow)]
pub(super) struct SlugRow {
    id: i64,
    entry_id: i64,
    text: String,
    is_current: bool,
}

impl From<SlugRow> for SlugRecord {
    fn from(row: SlugRow) -> Self {
        Self {
            id: row.id,
            entry_id: EntryId(row.entry_id),
            text: row.text,
            is_current: row.is_current,
        }
    }
}

#[async_trait]
impl SlugsRepo for PostgresRepositories {
    async fn find_slug(&self, text: &str) -> Result<Option<SlugRecord>, RepoError> {
        let row = sqlx::query_as::<_, SlugRow>(&format!(
            "SELECT {SLUG_COLUMNS} FROM slugs s WHERE s.text = $1"
        ))
        .bind(text)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(SlugRecord::from))
    }

    async fn current_slug(&self, entry: EntryId) -> Result<Option<SlugRecord>, RepoError> {
        let row = sqlx::query_as::<_, SlugRow>(&format!(
            "SELECT {SLUG_COLUMNS} FROM slugs s WHERE s.entry_id = $1 AND s.is_current"
        ))
        .bind(entry)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(SlugRecord::from))
    }

    async fn slugs_for_entry(&self, entry: EntryId) -> Result<Vec<SlugRecord>, RepoError> {
        let rows = sqlx::query_as::<_, SlugRow>(&format!(
            r#"
            SELECT {SLUG_COLUMNS}
            FROM slugs s
            WHERE s.entry_id = $1
            ORDER BY s.is_current DESC, s.created_at, s.id
            "#
        ))
        .bind(entry)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(SlugRecord::from).collect())
    }
}
