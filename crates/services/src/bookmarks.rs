use std::sync::Arc;

use tracing::debug;

use quiz_core::model::{Bookmark, Question, QuestionId};
use storage::repository::{BookmarkRepository, QuestionRepository};

use crate::Clock;
use crate::error::BankError;

/// Set of questions flagged for later review.
#[derive(Clone)]
pub struct BookmarkService {
    clock: Clock,
    bookmarks: Arc<dyn BookmarkRepository>,
    questions: Arc<dyn QuestionRepository>,
}

impl BookmarkService {
    #[must_use]
    pub fn new(
        clock: Clock,
        bookmarks: Arc<dyn BookmarkRepository>,
        questions: Arc<dyn QuestionRepository>,
    ) -> Self {
        Self {
            clock,
            bookmarks,
            questions,
        }
    }

    /// Whether `question_id` is bookmarked.
    ///
    /// # Errors
    ///
    /// Returns `BankError::Storage` if the lookup fails.
    pub async fn is_bookmarked(&self, question_id: QuestionId) -> Result<bool, BankError> {
        Ok(self.bookmarks.get_bookmark(question_id).await?.is_some())
    }

    /// Flip membership of `question_id`. Returns the new membership.
    ///
    /// # Errors
    ///
    /// Returns `BankError::Storage` if the bookmark cannot be read or written.
    pub async fn toggle(&self, question_id: QuestionId) -> Result<bool, BankError> {
        if self.is_bookmarked(question_id).await? {
            self.bookmarks.delete_bookmark(question_id).await?;
            debug!(question_id = %question_id, "bookmark removed");
            Ok(false)
        } else {
            let bookmark = Bookmark::new(question_id, self.clock.now());
            self.bookmarks.put_bookmark(&bookmark).await?;
            debug!(question_id = %question_id, "bookmark added");
            Ok(true)
        }
    }

    /// Remove `question_id` from the set. Removing a missing bookmark is not an error.
    ///
    /// # Errors
    ///
    /// Returns `BankError::Storage` if the delete fails.
    pub async fn remove(&self, question_id: QuestionId) -> Result<(), BankError> {
        self.bookmarks.delete_bookmark(question_id).await?;
        Ok(())
    }

    /// Bookmarked questions ordered by id. Bookmarks whose question is gone are skipped.
    ///
    /// # Errors
    ///
    /// Returns `BankError::Storage` if either table cannot be read.
    pub async fn list(&self) -> Result<Vec<Question>, BankError> {
        let ids: Vec<QuestionId> = self
            .bookmarks
            .list_bookmarks()
            .await?
            .into_iter()
            .map(|b| b.question_id)
            .collect();
        let found = self.questions.bulk_get_questions(&ids).await?;
        Ok(found.into_iter().flatten().collect())
    }

    /// Number of bookmarks, including ones whose question is gone.
    ///
    /// # Errors
    ///
    /// Returns `BankError::Storage` if the count fails.
    pub async fn count(&self) -> Result<u64, BankError> {
        Ok(self.bookmarks.count_bookmarks().await?)
    }
}
