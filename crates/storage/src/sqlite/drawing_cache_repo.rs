use attempt_core::model::{AttemptId, QuestionDetailId};
use chrono::{DateTime, Utc};
use sqlx::Row;
use sqlx::sqlite::SqliteRow;

use super::SqliteRepository;
use crate::repository::{DrawingCacheEntry, DrawingCacheRepository, StorageError, drawing_key};

fn conn<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Connection(e.to_string())
}

fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

fn map_entry(row: &SqliteRow) -> Result<DrawingCacheEntry, StorageError> {
    let attempt_id: String = row.try_get("attempt_id").map_err(ser)?;
    let detail_id: String = row.try_get("detail_id").map_err(ser)?;
    let document: String = row.try_get("document").map_err(ser)?;
    let updated_at: DateTime<Utc> = row.try_get("updated_at").map_err(ser)?;
    Ok(DrawingCacheEntry::new(
        AttemptId::new(attempt_id),
        QuestionDetailId::new(detail_id),
        document,
        updated_at,
    ))
}

#[async_trait::async_trait]
impl DrawingCacheRepository for SqliteRepository {
    async fn put_drawing(&self, entry: &DrawingCacheEntry) -> Result<(), StorageError> {
        sqlx::query(
            r"
            INSERT INTO drawing_cache (cache_key, attempt_id, detail_id, document, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(cache_key) DO UPDATE SET
                document = excluded.document,
                updated_at = excluded.updated_at
            ",
        )
        .bind(entry.key())
        .bind(entry.attempt_id.as_str())
        .bind(entry.detail_id.as_str())
        .bind(&entry.document)
        .bind(entry.updated_at)
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        Ok(())
    }

    async fn get_drawing(
        &self,
        attempt_id: &AttemptId,
        detail_id: &QuestionDetailId,
    ) -> Result<Option<DrawingCacheEntry>, StorageError> {
        let row = sqlx::query(
            r"
            SELECT attempt_id, detail_id, document, updated_at
            FROM drawing_cache
            WHERE cache_key = ?1
            ",
        )
        .bind(drawing_key(attempt_id, detail_id))
        .fetch_optional(&self.pool)
        .await
        .map_err(conn)?;

        row.as_ref().map(map_entry).transpose()
    }

    async fn clear_attempt(&self, attempt_id: &AttemptId) -> Result<usize, StorageError> {
        let res = sqlx::query("DELETE FROM drawing_cache WHERE attempt_id = ?1")
            .bind(attempt_id.as_str())
            .execute(&self.pool)
            .await
            .map_err(conn)?;

        usize::try_from(res.rows_affected())
            .map_err(|_| StorageError::Serialization("row count overflow".into()))
    }
}
