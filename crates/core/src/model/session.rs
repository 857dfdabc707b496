use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::model::ids::QuestionId;

/// Storage key of the singleton in-progress session.
pub const ACTIVE_SESSION_KEY: &str = "current";

/// Chapter label recorded for sessions drawn from the whole bank.
pub const MIXED_CHAPTER: &str = "Mixed";

/// Returns the label an attempt carries for the given chapter filter.
#[must_use]
pub fn chapter_label(filter: Option<&str>) -> String {
    filter.unwrap_or(MIXED_CHAPTER).to_owned()
}

//
// ─── SESSION MODE ─────────────────────────────────────────────────────────────
//

/// How a session treats answers.
///
/// - `Practice`: the first answer per question is locked in and feedback is shown.
/// - `Mock`: answers can be changed freely until the session is finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SessionMode {
    Practice,
    Mock,
}

impl SessionMode {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            SessionMode::Practice => "Practice",
            SessionMode::Mock => "Mock",
        }
    }

    /// Whether the first answer to a question is final.
    #[must_use]
    pub fn locks_first_answer(self) -> bool {
        matches!(self, SessionMode::Practice)
    }
}

impl fmt::Display for SessionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("invalid session mode: {0}")]
pub struct ParseModeError(String);

impl FromStr for SessionMode {
    type Err = ParseModeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "practice" => Ok(SessionMode::Practice),
            "mock" => Ok(SessionMode::Mock),
            _ => Err(ParseModeError(s.to_owned())),
        }
    }
}

//
// ─── ACTIVE SESSION ───────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ActiveSessionError {
    #[error("answers ({answers}) do not line up with questions ({questions})")]
    LengthMismatch { questions: usize, answers: usize },

    #[error("current index {current_idx} is out of range for {questions} question(s)")]
    IndexOutOfRange { current_idx: usize, questions: usize },
}

/// Persisted snapshot of the in-progress quiz.
///
/// At most one exists per installation, stored under [`ACTIVE_SESSION_KEY`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveSession {
    mode: SessionMode,
    chapter: Option<String>,
    question_ids: Vec<QuestionId>,
    current_idx: usize,
    answers: Vec<Option<u32>>,
    started_at: DateTime<Utc>,
}

impl ActiveSession {
    /// A fresh session positioned on the first question with every answer unset.
    #[must_use]
    pub fn fresh(
        mode: SessionMode,
        chapter: Option<String>,
        question_ids: Vec<QuestionId>,
        started_at: DateTime<Utc>,
    ) -> Self {
        let answers = vec![None; question_ids.len()];
        Self {
            mode,
            chapter,
            question_ids,
            current_idx: 0,
            answers,
            started_at,
        }
    }

    /// Rehydrate a session snapshot from persisted storage.
    ///
    /// # Errors
    ///
    /// Returns `ActiveSessionError` if answers and questions are misaligned or the
    /// position does not point at a question.
    pub fn from_persisted(
        mode: SessionMode,
        chapter: Option<String>,
        question_ids: Vec<QuestionId>,
        current_idx: usize,
        answers: Vec<Option<u32>>,
        started_at: DateTime<Utc>,
    ) -> Result<Self, ActiveSessionError> {
        if answers.len() != question_ids.len() {
            return Err(ActiveSessionError::LengthMismatch {
                questions: question_ids.len(),
                answers: answers.len(),
            });
        }
        let in_range = if question_ids.is_empty() {
            current_idx == 0
        } else {
            current_idx < question_ids.len()
        };
        if !in_range {
            return Err(ActiveSessionError::IndexOutOfRange {
                current_idx,
                questions: question_ids.len(),
            });
        }

        Ok(Self {
            mode,
            chapter,
            question_ids,
            current_idx,
            answers,
            started_at,
        })
    }

    /// True when this snapshot was started with the same mode and chapter filter.
    #[must_use]
    pub fn matches(&self, mode: SessionMode, chapter: Option<&str>) -> bool {
        self.mode == mode && self.chapter.as_deref() == chapter
    }

    #[must_use]
    pub fn mode(&self) -> SessionMode {
        self.mode
    }

    #[must_use]
    pub fn chapter(&self) -> Option<&str> {
        self.chapter.as_deref()
    }

    #[must_use]
    pub fn question_ids(&self) -> &[QuestionId] {
        &self.question_ids
    }

    #[must_use]
    pub fn current_idx(&self) -> usize {
        self.current_idx
    }

    #[must_use]
    pub fn answers(&self) -> &[Option<u32>] {
        &self.answers
    }

    #[must_use]
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Number of questions that have an answer recorded.
    #[must_use]
    pub fn answered(&self) -> usize {
        self.answers.iter().filter(|a| a.is_some()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_now;

    fn ids(n: u64) -> Vec<QuestionId> {
        (1..=n).map(QuestionId::new).collect()
    }

    #[test]
    fn fresh_session_starts_unanswered() {
        let s = ActiveSession::fresh(SessionMode::Mock, None, ids(3), fixed_now());
        assert_eq!(s.current_idx(), 0);
        assert_eq!(s.answers(), &[None, None, None]);
        assert_eq!(s.answered(), 0);
    }

    #[test]
    fn persisted_answers_must_align() {
        let err = ActiveSession::from_persisted(
            SessionMode::Practice,
            None,
            ids(2),
            0,
            vec![None],
            fixed_now(),
        )
        .unwrap_err();
        assert_eq!(
            err,
            ActiveSessionError::LengthMismatch {
                questions: 2,
                answers: 1
            }
        );
    }

    #[test]
    fn persisted_index_must_be_in_range() {
        let err = ActiveSession::from_persisted(
            SessionMode::Practice,
            None,
            ids(2),
            2,
            vec![None, None],
            fixed_now(),
        )
        .unwrap_err();
        assert!(matches!(err, ActiveSessionError::IndexOutOfRange { .. }));

        let empty =
            ActiveSession::from_persisted(SessionMode::Mock, None, Vec::new(), 0, Vec::new(), fixed_now());
        assert!(empty.is_ok());
    }

    #[test]
    fn matching_compares_mode_and_chapter() {
        let s = ActiveSession::fresh(
            SessionMode::Practice,
            Some("Radiation Physics".into()),
            ids(1),
            fixed_now(),
        );
        assert!(s.matches(SessionMode::Practice, Some("Radiation Physics")));
        assert!(!s.matches(SessionMode::Mock, Some("Radiation Physics")));
        assert!(!s.matches(SessionMode::Practice, None));

        let mixed = ActiveSession::fresh(SessionMode::Mock, None, ids(1), fixed_now());
        assert!(mixed.matches(SessionMode::Mock, None));
    }

    #[test]
    fn mode_parses_case_insensitively() {
        assert_eq!("MOCK".parse::<SessionMode>().unwrap(), SessionMode::Mock);
        assert_eq!(" practice".parse::<SessionMode>().unwrap(), SessionMode::Practice);
        assert!("exam".parse::<SessionMode>().is_err());
        assert!(SessionMode::Practice.locks_first_answer());
        assert!(!SessionMode::Mock.locks_first_answer());
    }

    #[test]
    fn chapter_label_defaults_to_mixed() {
        assert_eq!(chapter_label(None), "Mixed");
        assert_eq!(chapter_label(Some("Anatomy")), "Anatomy");
    }
}
