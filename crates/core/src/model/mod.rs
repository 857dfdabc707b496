mod attempt;
mod bookmark;
mod ids;
mod question;
mod session;

pub use ids::{AttemptId, ParseIdError, QuestionId};

pub use attempt::{Attempt, AttemptError, percent};
pub use bookmark::Bookmark;
pub use question::{Question, QuestionDraft, QuestionError, ValidatedQuestion};
pub use session::{
    ACTIVE_SESSION_KEY, ActiveSession, ActiveSessionError, MIXED_CHAPTER, ParseModeError,
    SessionMode, chapter_label,
};
