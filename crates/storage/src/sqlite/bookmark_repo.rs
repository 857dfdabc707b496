use quiz_core::model::{Bookmark, QuestionId};

use super::{
    SqliteRepository,
    mapping::{conn, id_i64, map_bookmark_row},
};
use crate::repository::{BookmarkRepository, StorageError};

#[async_trait::async_trait]
impl BookmarkRepository for SqliteRepository {
    async fn get_bookmark(
        &self,
        question_id: QuestionId,
    ) -> Result<Option<Bookmark>, StorageError> {
        let row = sqlx::query(
            "SELECT question_id, created_at FROM bookmarks WHERE question_id = ?1",
        )
        .bind(id_i64("question_id", question_id.value())?)
        .fetch_optional(&self.pool)
        .await
        .map_err(conn)?;

        row.as_ref().map(map_bookmark_row).transpose()
    }

    async fn put_bookmark(&self, bookmark: &Bookmark) -> Result<(), StorageError> {
        sqlx::query(
            r"
            INSERT INTO bookmarks (question_id, created_at)
            VALUES (?1, ?2)
            ON CONFLICT(question_id) DO UPDATE SET created_at = excluded.created_at
            ",
        )
        .bind(id_i64("question_id", bookmark.question_id.value())?)
        .bind(bookmark.created_at)
        .execute(&self.pool)
        .await
        .map_err(conn)?;
        Ok(())
    }

    async fn delete_bookmark(&self, question_id: QuestionId) -> Result<(), StorageError> {
        sqlx::query("DELETE FROM bookmarks WHERE question_id = ?1")
            .bind(id_i64("question_id", question_id.value())?)
            .execute(&self.pool)
            .await
            .map_err(conn)?;
        Ok(())
    }

    async fn list_bookmarks(&self) -> Result<Vec<Bookmark>, StorageError> {
        let rows = sqlx::query(
            "SELECT question_id, created_at FROM bookmarks ORDER BY question_id ASC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            out.push(map_bookmark_row(&row)?);
        }
        Ok(out)
    }

    async fn count_bookmarks(&self) -> Result<u64, StorageError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM bookmarks")
            .fetch_one(&self.pool)
            .await
            .map_err(conn)?;
        u64::try_from(count).map_err(|_| StorageError::Serialization("negative count".into()))
    }
}
