use std::collections::HashMap;

use quiz_core::model::{Question, QuestionId, ValidatedQuestion};

use super::{
    SqliteRepository,
    mapping::{conn, id_i64, map_question_row, question_id_from_i64, to_json},
};
use crate::repository::{QuestionRepository, StorageError};

const SELECT_COLUMNS: &str = "SELECT id, chapter, text, options, correct_index, explanation FROM questions";

#[async_trait::async_trait]
impl QuestionRepository for SqliteRepository {
    async fn get_question(&self, id: QuestionId) -> Result<Option<Question>, StorageError> {
        let row = sqlx::query(&format!("{SELECT_COLUMNS} WHERE id = ?1"))
            .bind(id_i64("question_id", id.value())?)
            .fetch_optional(&self.pool)
            .await
            .map_err(conn)?;

        row.as_ref().map(map_question_row).transpose()
    }

    async fn upsert_question(&self, question: &Question) -> Result<(), StorageError> {
        sqlx::query(
            r"
            INSERT INTO questions (id, chapter, text, options, correct_index, explanation)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ON CONFLICT(id) DO UPDATE SET
                chapter = excluded.chapter,
                text = excluded.text,
                options = excluded.options,
                correct_index = excluded.correct_index,
                explanation = excluded.explanation
            ",
        )
        .bind(id_i64("question_id", question.id().value())?)
        .bind(question.chapter())
        .bind(question.text())
        .bind(to_json(question.options())?)
        .bind(i64::from(question.correct_index()))
        .bind(question.explanation())
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        Ok(())
    }

    async fn delete_question(&self, id: QuestionId) -> Result<(), StorageError> {
        sqlx::query("DELETE FROM questions WHERE id = ?1")
            .bind(id_i64("question_id", id.value())?)
            .execute(&self.pool)
            .await
            .map_err(conn)?;
        Ok(())
    }

    async fn bulk_get_questions(
        &self,
        ids: &[QuestionId],
    ) -> Result<Vec<Option<Question>>, StorageError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut sql = format!("{SELECT_COLUMNS} WHERE id IN (");
        for i in 0..ids.len() {
            if i > 0 {
                sql.push_str(", ");
            }
            sql.push('?');
            sql.push_str(&(i + 1).to_string());
        }
        sql.push(')');

        let mut q = sqlx::query(&sql);
        for id in ids {
            q = q.bind(id_i64("question_id", id.value())?);
        }

        let rows = q.fetch_all(&self.pool).await.map_err(conn)?;

        let mut by_id: HashMap<QuestionId, Question> = HashMap::with_capacity(rows.len());
        for row in rows {
            let question = map_question_row(&row)?;
            by_id.insert(question.id(), question);
        }

        // Duplicate ids in the request each get their own copy.
        Ok(ids.iter().map(|id| by_id.get(id).cloned()).collect())
    }

    async fn bulk_add_questions(
        &self,
        questions: Vec<ValidatedQuestion>,
    ) -> Result<Vec<QuestionId>, StorageError> {
        let mut tx = self.pool.begin().await.map_err(conn)?;
        let mut ids = Vec::with_capacity(questions.len());

        for question in &questions {
            let res = sqlx::query(
                r"
                INSERT INTO questions (chapter, text, options, correct_index, explanation)
                VALUES (?1, ?2, ?3, ?4, ?5)
                ",
            )
            .bind(question.chapter())
            .bind(question.text())
            .bind(to_json(question.options())?)
            .bind(i64::from(question.correct_index()))
            .bind(question.explanation())
            .execute(&mut *tx)
            .await
            .map_err(conn)?;

            ids.push(question_id_from_i64(res.last_insert_rowid())?);
        }

        tx.commit().await.map_err(conn)?;
        Ok(ids)
    }

    async fn count_questions(&self) -> Result<u64, StorageError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM questions")
            .fetch_one(&self.pool)
            .await
            .map_err(conn)?;
        u64::try_from(count).map_err(|_| StorageError::Serialization("negative count".into()))
    }

    async fn clear_questions(&self) -> Result<(), StorageError> {
        sqlx::query("DELETE FROM questions")
            .execute(&self.pool)
            .await
            .map_err(conn)?;
        Ok(())
    }

    async fn list_questions(&self) -> Result<Vec<Question>, StorageError> {
        let rows = sqlx::query(&format!("{SELECT_COLUMNS} ORDER BY id ASC"))
            .fetch_all(&self.pool)
            .await
            .map_err(conn)?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            out.push(map_question_row(&row)?);
        }
        Ok(out)
    }

    async fn questions_in_chapter(&self, chapter: &str) -> Result<Vec<Question>, StorageError> {
        let rows = sqlx::query(&format!("{SELECT_COLUMNS} WHERE chapter = ?1 ORDER BY id ASC"))
            .bind(chapter)
            .fetch_all(&self.pool)
            .await
            .map_err(conn)?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            out.push(map_question_row(&row)?);
        }
        Ok(out)
    }
}
