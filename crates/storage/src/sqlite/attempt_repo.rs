use quiz_core::model::{Attempt, AttemptId};

use super::{
    SqliteRepository,
    mapping::{attempt_id_from_i64, conn, id_i64, map_attempt_row, to_json},
};
use crate::repository::{AttemptRepository, SessionPersistence, StorageError};

const SELECT_COLUMNS: &str = r"
    SELECT id, completed_at, chapter, score, total, mode, question_ids, answers
    FROM attempts
";

const INSERT_ATTEMPT: &str = r"
    INSERT INTO attempts (
        completed_at, chapter, score, total, mode, question_ids, answers
    )
    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
";

/// Bound values for one attempt row.
struct AttemptParams {
    question_ids: String,
    answers: String,
}

impl AttemptParams {
    fn new(attempt: &Attempt) -> Result<Self, StorageError> {
        Ok(Self {
            question_ids: to_json(attempt.question_ids())?,
            answers: to_json(attempt.answers())?,
        })
    }
}

#[async_trait::async_trait]
impl AttemptRepository for SqliteRepository {
    async fn append_attempt(&self, attempt: &Attempt) -> Result<AttemptId, StorageError> {
        let params = AttemptParams::new(attempt)?;
        let res = sqlx::query(INSERT_ATTEMPT)
            .bind(attempt.completed_at())
            .bind(attempt.chapter())
            .bind(i64::from(attempt.score()))
            .bind(i64::from(attempt.total()))
            .bind(attempt.mode().as_str())
            .bind(params.question_ids)
            .bind(params.answers)
            .execute(&self.pool)
            .await
            .map_err(conn)?;

        attempt_id_from_i64(res.last_insert_rowid())
    }

    async fn get_attempt(&self, id: AttemptId) -> Result<Option<Attempt>, StorageError> {
        let row = sqlx::query(&format!("{SELECT_COLUMNS} WHERE id = ?1"))
            .bind(id_i64("attempt_id", id.value())?)
            .fetch_optional(&self.pool)
            .await
            .map_err(conn)?;

        row.as_ref().map(map_attempt_row).transpose()
    }

    async fn list_attempts(&self) -> Result<Vec<Attempt>, StorageError> {
        let rows = sqlx::query(&format!(
            "{SELECT_COLUMNS} ORDER BY completed_at DESC, id DESC"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            out.push(map_attempt_row(&row)?);
        }
        Ok(out)
    }

    async fn count_attempts(&self) -> Result<u64, StorageError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM attempts")
            .fetch_one(&self.pool)
            .await
            .map_err(conn)?;
        u64::try_from(count).map_err(|_| StorageError::Serialization("negative count".into()))
    }

    async fn recent_attempts(&self, limit: usize) -> Result<Vec<Attempt>, StorageError> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows = sqlx::query(&format!(
            "{SELECT_COLUMNS} ORDER BY completed_at DESC, id DESC LIMIT ?1"
        ))
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            out.push(map_attempt_row(&row)?);
        }
        Ok(out)
    }
}

#[async_trait::async_trait]
impl SessionPersistence for SqliteRepository {
    async fn complete_session(&self, attempt: &Attempt) -> Result<AttemptId, StorageError> {
        let params = AttemptParams::new(attempt)?;
        let mut tx = self.pool.begin().await.map_err(conn)?;

        let res = sqlx::query(INSERT_ATTEMPT)
            .bind(attempt.completed_at())
            .bind(attempt.chapter())
            .bind(i64::from(attempt.score()))
            .bind(i64::from(attempt.total()))
            .bind(attempt.mode().as_str())
            .bind(params.question_ids)
            .bind(params.answers)
            .execute(&mut *tx)
            .await
            .map_err(conn)?;

        sqlx::query("DELETE FROM active_sessions")
            .execute(&mut *tx)
            .await
            .map_err(conn)?;

        tx.commit().await.map_err(conn)?;

        attempt_id_from_i64(res.last_insert_rowid())
    }
}
