use async_trait::async_trait;
use quiz_core::model::{
    ActiveSession, Attempt, AttemptId, Bookmark, Question, QuestionId, ValidatedQuestion,
};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("conflict")]
    Conflict,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Predicate used for full-scan question filtering.
pub type QuestionPredicate<'a> = &'a (dyn Fn(&Question) -> bool + Send + Sync);

/// Repository contract for the question bank.
#[async_trait]
pub trait QuestionRepository: Send + Sync {
    /// Fetch a question by ID.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on repository failures.
    async fn get_question(&self, id: QuestionId) -> Result<Option<Question>, StorageError>;

    /// Persist or replace a question under its ID.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the question cannot be stored.
    async fn upsert_question(&self, question: &Question) -> Result<(), StorageError>;

    /// Delete a question. Deleting a missing question is not an error.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on repository failures.
    async fn delete_question(&self, id: QuestionId) -> Result<(), StorageError>;

    /// Fetch questions in the order of `ids`, leaving `None` holes for missing IDs.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on repository failures.
    async fn bulk_get_questions(
        &self,
        ids: &[QuestionId],
    ) -> Result<Vec<Option<Question>>, StorageError>;

    /// Insert new questions in one batch, returning the assigned IDs in input order.
    ///
    /// Either every question is stored or none is.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the batch cannot be stored.
    async fn bulk_add_questions(
        &self,
        questions: Vec<ValidatedQuestion>,
    ) -> Result<Vec<QuestionId>, StorageError>;

    /// Number of stored questions.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on repository failures.
    async fn count_questions(&self) -> Result<u64, StorageError>;

    /// Remove every question.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on repository failures.
    async fn clear_questions(&self) -> Result<(), StorageError>;

    /// All questions ordered by ID.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on repository failures.
    async fn list_questions(&self) -> Result<Vec<Question>, StorageError>;

    /// Questions whose chapter equals `chapter`, ordered by ID.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on repository failures.
    async fn questions_in_chapter(&self, chapter: &str) -> Result<Vec<Question>, StorageError>;

    /// Full scan keeping questions that satisfy `predicate`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on repository failures.
    async fn filter_questions(
        &self,
        predicate: QuestionPredicate<'_>,
    ) -> Result<Vec<Question>, StorageError> {
        let all = self.list_questions().await?;
        Ok(all.into_iter().filter(|q| predicate(q)).collect())
    }
}

/// Repository contract for the append-only attempt history.
#[async_trait]
pub trait AttemptRepository: Send + Sync {
    /// Append an attempt and return its assigned ID.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the attempt cannot be stored.
    async fn append_attempt(&self, attempt: &Attempt) -> Result<AttemptId, StorageError>;

    /// Fetch an attempt by ID.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on repository failures.
    async fn get_attempt(&self, id: AttemptId) -> Result<Option<Attempt>, StorageError>;

    /// All attempts, most recent first.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on repository failures.
    async fn list_attempts(&self) -> Result<Vec<Attempt>, StorageError>;

    /// Number of stored attempts.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on repository failures.
    async fn count_attempts(&self) -> Result<u64, StorageError>;

    /// The `limit` most recent attempts.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on repository failures.
    async fn recent_attempts(&self, limit: usize) -> Result<Vec<Attempt>, StorageError> {
        let mut all = self.list_attempts().await?;
        all.truncate(limit);
        Ok(all)
    }
}

/// Repository contract for bookmark membership.
#[async_trait]
pub trait BookmarkRepository: Send + Sync {
    /// Fetch the bookmark for a question.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on repository failures.
    async fn get_bookmark(&self, question_id: QuestionId)
    -> Result<Option<Bookmark>, StorageError>;

    /// Insert or replace a bookmark.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the bookmark cannot be stored.
    async fn put_bookmark(&self, bookmark: &Bookmark) -> Result<(), StorageError>;

    /// Delete a bookmark. Deleting a missing bookmark is not an error.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on repository failures.
    async fn delete_bookmark(&self, question_id: QuestionId) -> Result<(), StorageError>;

    /// All bookmarks ordered by question ID.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on repository failures.
    async fn list_bookmarks(&self) -> Result<Vec<Bookmark>, StorageError>;

    /// Number of bookmarks.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on repository failures.
    async fn count_bookmarks(&self) -> Result<u64, StorageError>;
}

/// Repository contract for the singleton in-progress session.
#[async_trait]
pub trait ActiveSessionRepository: Send + Sync {
    /// Fetch the stored session, if any.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on repository failures.
    async fn get_active_session(&self) -> Result<Option<ActiveSession>, StorageError>;

    /// Store `session` as the singleton, replacing any previous one.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the session cannot be stored.
    async fn put_active_session(&self, session: &ActiveSession) -> Result<(), StorageError>;

    /// Remove the stored session. Clearing an empty slot is not an error.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on repository failures.
    async fn clear_active_session(&self) -> Result<(), StorageError>;
}

/// Finalization boundary: records the attempt and drops the singleton together.
#[async_trait]
pub trait SessionPersistence: Send + Sync {
    /// Append `attempt` and clear the active session atomically.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if either write fails; in that case neither is applied.
    async fn complete_session(&self, attempt: &Attempt) -> Result<AttemptId, StorageError>;
}

//
// ─── IN-MEMORY BACKEND ─────────────────────────────────────────────────────────
//

#[derive(Default)]
struct MemoryState {
    next_question_id: u64,
    next_attempt_id: u64,
    questions: BTreeMap<QuestionId, Question>,
    attempts: Vec<Attempt>,
    bookmarks: BTreeMap<QuestionId, Bookmark>,
    active: Option<ActiveSession>,
}

impl MemoryState {
    fn assign_question_id(&mut self) -> QuestionId {
        self.next_question_id += 1;
        QuestionId::new(self.next_question_id)
    }

    fn push_attempt(&mut self, attempt: &Attempt) -> AttemptId {
        self.next_attempt_id += 1;
        let id = AttemptId::new(self.next_attempt_id);
        self.attempts.push(attempt.clone().with_id(id));
        id
    }
}

/// Simple in-memory repository implementation for testing and prototyping.
///
/// IDs are never reused, even after `clear_questions`.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    state: Arc<Mutex<MemoryState>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, MemoryState>, StorageError> {
        self.state
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))
    }
}

#[async_trait]
impl QuestionRepository for InMemoryRepository {
    async fn get_question(&self, id: QuestionId) -> Result<Option<Question>, StorageError> {
        Ok(self.lock()?.questions.get(&id).cloned())
    }

    async fn upsert_question(&self, question: &Question) -> Result<(), StorageError> {
        let mut guard = self.lock()?;
        guard.next_question_id = guard.next_question_id.max(question.id().value());
        guard.questions.insert(question.id(), question.clone());
        Ok(())
    }

    async fn delete_question(&self, id: QuestionId) -> Result<(), StorageError> {
        self.lock()?.questions.remove(&id);
        Ok(())
    }

    async fn bulk_get_questions(
        &self,
        ids: &[QuestionId],
    ) -> Result<Vec<Option<Question>>, StorageError> {
        let guard = self.lock()?;
        Ok(ids.iter().map(|id| guard.questions.get(id).cloned()).collect())
    }

    async fn bulk_add_questions(
        &self,
        questions: Vec<ValidatedQuestion>,
    ) -> Result<Vec<QuestionId>, StorageError> {
        let mut guard = self.lock()?;
        let mut ids = Vec::with_capacity(questions.len());
        for question in questions {
            let id = guard.assign_question_id();
            guard.questions.insert(id, question.assign_id(id));
            ids.push(id);
        }
        Ok(ids)
    }

    async fn count_questions(&self) -> Result<u64, StorageError> {
        Ok(self.lock()?.questions.len() as u64)
    }

    async fn clear_questions(&self) -> Result<(), StorageError> {
        self.lock()?.questions.clear();
        Ok(())
    }

    async fn list_questions(&self) -> Result<Vec<Question>, StorageError> {
        Ok(self.lock()?.questions.values().cloned().collect())
    }

    async fn questions_in_chapter(&self, chapter: &str) -> Result<Vec<Question>, StorageError> {
        Ok(self
            .lock()?
            .questions
            .values()
            .filter(|q| q.chapter() == chapter)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl AttemptRepository for InMemoryRepository {
    async fn append_attempt(&self, attempt: &Attempt) -> Result<AttemptId, StorageError> {
        Ok(self.lock()?.push_attempt(attempt))
    }

    async fn get_attempt(&self, id: AttemptId) -> Result<Option<Attempt>, StorageError> {
        Ok(self
            .lock()?
            .attempts
            .iter()
            .find(|a| a.id() == Some(id))
            .cloned())
    }

    async fn list_attempts(&self) -> Result<Vec<Attempt>, StorageError> {
        let mut all = self.lock()?.attempts.clone();
        all.sort_by(|a, b| {
            b.completed_at()
                .cmp(&a.completed_at())
                .then_with(|| b.id().cmp(&a.id()))
        });
        Ok(all)
    }

    async fn count_attempts(&self) -> Result<u64, StorageError> {
        Ok(self.lock()?.attempts.len() as u64)
    }
}

#[async_trait]
impl BookmarkRepository for InMemoryRepository {
    async fn get_bookmark(
        &self,
        question_id: QuestionId,
    ) -> Result<Option<Bookmark>, StorageError> {
        Ok(self.lock()?.bookmarks.get(&question_id).copied())
    }

    async fn put_bookmark(&self, bookmark: &Bookmark) -> Result<(), StorageError> {
        self.lock()?.bookmarks.insert(bookmark.question_id, *bookmark);
        Ok(())
    }

    async fn delete_bookmark(&self, question_id: QuestionId) -> Result<(), StorageError> {
        self.lock()?.bookmarks.remove(&question_id);
        Ok(())
    }

    async fn list_bookmarks(&self) -> Result<Vec<Bookmark>, StorageError> {
        Ok(self.lock()?.bookmarks.values().copied().collect())
    }

    async fn count_bookmarks(&self) -> Result<u64, StorageError> {
        Ok(self.lock()?.bookmarks.len() as u64)
    }
}

#[async_trait]
impl ActiveSessionRepository for InMemoryRepository {
    async fn get_active_session(&self) -> Result<Option<ActiveSession>, StorageError> {
        Ok(self.lock()?.active.clone())
    }

    async fn put_active_session(&self, session: &ActiveSession) -> Result<(), StorageError> {
        self.lock()?.active = Some(session.clone());
        Ok(())
    }

    async fn clear_active_session(&self) -> Result<(), StorageError> {
        self.lock()?.active = None;
        Ok(())
    }
}

#[async_trait]
impl SessionPersistence for InMemoryRepository {
    async fn complete_session(&self, attempt: &Attempt) -> Result<AttemptId, StorageError> {
        let mut guard = self.lock()?;
        let id = guard.push_attempt(attempt);
        guard.active = None;
        Ok(id)
    }
}

/// Aggregates the record repositories behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub questions: Arc<dyn QuestionRepository>,
    pub attempts: Arc<dyn AttemptRepository>,
    pub bookmarks: Arc<dyn BookmarkRepository>,
    pub sessions: Arc<dyn ActiveSessionRepository>,
    pub persistence: Arc<dyn SessionPersistence>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        Self::from_repo(InMemoryRepository::new())
    }

    /// Build a `Storage` whose every repository is served by `repo`.
    #[must_use]
    pub fn from_repo<R>(repo: R) -> Self
    where
        R: QuestionRepository
            + AttemptRepository
            + BookmarkRepository
            + ActiveSessionRepository
            + SessionPersistence
            + Clone
            + 'static,
    {
        Self {
            questions: Arc::new(repo.clone()),
            attempts: Arc::new(repo.clone()),
            bookmarks: Arc::new(repo.clone()),
            sessions: Arc::new(repo.clone()),
            persistence: Arc::new(repo),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quiz_core::model::{QuestionDraft, SessionMode};
    use quiz_core::time::fixed_now;

    fn draft(chapter: &str, text: &str) -> ValidatedQuestion {
        QuestionDraft {
            chapter: chapter.into(),
            text: text.into(),
            options: vec!["a".into(), "b".into()],
            correct_index: 1,
            explanation: String::new(),
        }
        .validate()
        .unwrap()
    }

    #[tokio::test]
    async fn bulk_get_leaves_holes_for_missing_ids() {
        let repo = InMemoryRepository::new();
        let ids = repo
            .bulk_add_questions(vec![draft("A", "one"), draft("B", "two")])
            .await
            .unwrap();
        assert_eq!(ids, vec![QuestionId::new(1), QuestionId::new(2)]);

        let fetched = repo
            .bulk_get_questions(&[ids[1], QuestionId::new(99), ids[0]])
            .await
            .unwrap();
        assert_eq!(fetched[0].as_ref().unwrap().text(), "two");
        assert!(fetched[1].is_none());
        assert_eq!(fetched[2].as_ref().unwrap().text(), "one");
    }

    #[tokio::test]
    async fn ids_are_not_reused_after_clear() {
        let repo = InMemoryRepository::new();
        repo.bulk_add_questions(vec![draft("A", "one")]).await.unwrap();
        repo.clear_questions().await.unwrap();
        assert_eq!(repo.count_questions().await.unwrap(), 0);

        let ids = repo.bulk_add_questions(vec![draft("A", "again")]).await.unwrap();
        assert_eq!(ids, vec![QuestionId::new(2)]);
    }

    #[tokio::test]
    async fn chapter_lookup_and_filter() {
        let repo = InMemoryRepository::new();
        repo.bulk_add_questions(vec![draft("A", "one"), draft("B", "two"), draft("A", "three")])
            .await
            .unwrap();

        let in_a = repo.questions_in_chapter("A").await.unwrap();
        assert_eq!(in_a.len(), 2);

        let with_t = repo
            .filter_questions(&|q: &Question| q.text().starts_with('t'))
            .await
            .unwrap();
        assert_eq!(with_t.len(), 2);
    }

    #[tokio::test]
    async fn complete_session_appends_and_clears() {
        let repo = InMemoryRepository::new();
        let ids = repo.bulk_add_questions(vec![draft("A", "one")]).await.unwrap();
        let questions: Vec<Question> = repo
            .bulk_get_questions(&ids)
            .await
            .unwrap()
            .into_iter()
            .flatten()
            .collect();
        repo.put_active_session(&ActiveSession::fresh(
            SessionMode::Mock,
            None,
            ids.clone(),
            fixed_now(),
        ))
        .await
        .unwrap();

        let attempt = Attempt::grade(
            &questions,
            vec![Some(1)],
            SessionMode::Mock,
            "Mixed".into(),
            fixed_now(),
        )
        .unwrap();
        let id = repo.complete_session(&attempt).await.unwrap();

        assert!(repo.get_active_session().await.unwrap().is_none());
        let stored = repo.get_attempt(id).await.unwrap().unwrap();
        assert_eq!(stored.score(), 1);
        assert_eq!(stored.id(), Some(id));
    }

    #[tokio::test]
    async fn bookmarks_behave_as_a_set() {
        let repo = InMemoryRepository::new();
        let q = QuestionId::new(5);
        repo.put_bookmark(&Bookmark::new(q, fixed_now())).await.unwrap();
        repo.put_bookmark(&Bookmark::new(q, fixed_now())).await.unwrap();
        assert_eq!(repo.count_bookmarks().await.unwrap(), 1);

        repo.delete_bookmark(q).await.unwrap();
        repo.delete_bookmark(q).await.unwrap();
        assert!(repo.get_bookmark(q).await.unwrap().is_none());
    }
}
