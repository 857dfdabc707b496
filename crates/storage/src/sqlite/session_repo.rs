use quiz_core::model::{ACTIVE_SESSION_KEY, ActiveSession};

use super::{
    SqliteRepository,
    mapping::{conn, map_active_session_row, to_json},
};
use crate::repository::{ActiveSessionRepository, StorageError};

#[async_trait::async_trait]
impl ActiveSessionRepository for SqliteRepository {
    async fn get_active_session(&self) -> Result<Option<ActiveSession>, StorageError> {
        let row = sqlx::query(
            r"
            SELECT mode, chapter, question_ids, current_idx, answers, started_at
            FROM active_sessions
            WHERE id = ?1
            ",
        )
        .bind(ACTIVE_SESSION_KEY)
        .fetch_optional(&self.pool)
        .await
        .map_err(conn)?;

        row.as_ref().map(map_active_session_row).transpose()
    }

    async fn put_active_session(&self, session: &ActiveSession) -> Result<(), StorageError> {
        let current_idx = i64::try_from(session.current_idx())
            .map_err(|_| StorageError::Serialization("current_idx overflow".into()))?;

        let mut tx = self.pool.begin().await.map_err(conn)?;

        // Only the singleton row may exist.
        sqlx::query("DELETE FROM active_sessions WHERE id <> ?1")
            .bind(ACTIVE_SESSION_KEY)
            .execute(&mut *tx)
            .await
            .map_err(conn)?;

        sqlx::query(
            r"
            INSERT INTO active_sessions (
                id, mode, chapter, question_ids, current_idx, answers, started_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ON CONFLICT(id) DO UPDATE SET
                mode = excluded.mode,
                chapter = excluded.chapter,
                question_ids = excluded.question_ids,
                current_idx = excluded.current_idx,
                answers = excluded.answers,
                started_at = excluded.started_at
            ",
        )
        .bind(ACTIVE_SESSION_KEY)
        .bind(session.mode().as_str())
        .bind(session.chapter())
        .bind(to_json(session.question_ids())?)
        .bind(current_idx)
        .bind(to_json(session.answers())?)
        .bind(session.started_at())
        .execute(&mut *tx)
        .await
        .map_err(conn)?;

        tx.commit().await.map_err(conn)?;
        Ok(())
    }

    async fn clear_active_session(&self) -> Result<(), StorageError> {
        sqlx::query("DELETE FROM active_sessions")
            .execute(&self.pool)
            .await
            .map_err(conn)?;
        Ok(())
    }
}
