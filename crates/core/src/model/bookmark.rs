use chrono::{DateTime, Utc};

use crate::model::ids::QuestionId;

/// Membership record flagging a question for later review.
///
/// Keyed by the question id, so a question is bookmarked at most once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bookmark {
    pub question_id: QuestionId,
    pub created_at: DateTime<Utc>,
}

impl Bookmark {
    #[must_use]
    pub fn new(question_id: QuestionId, created_at: DateTime<Utc>) -> Self {
        Self {
            question_id,
            created_at,
        }
    }
}
