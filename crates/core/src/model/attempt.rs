use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::model::ids::{AttemptId, QuestionId};
use crate::model::question::Question;
use crate::model::session::{SessionMode, MIXED_CHAPTER};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum AttemptError {
    #[error("question ids ({questions}), answers ({answers}) and total ({total}) must match")]
    LengthMismatch {
        questions: usize,
        answers: usize,
        total: u32,
    },

    #[error("score {score} exceeds total {total}")]
    ScoreExceedsTotal { score: u32, total: u32 },

    #[error("too many questions for a single attempt: {len}")]
    TooManyQuestions { len: usize },
}

/// Scored record of a completed session. Append-only once stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attempt {
    id: Option<AttemptId>,
    completed_at: DateTime<Utc>,
    chapter: String,
    score: u32,
    total: u32,
    mode: SessionMode,
    question_ids: Vec<QuestionId>,
    answers: Vec<Option<u32>>,
}

impl Attempt {
    /// Score `answers` against `questions` position by position.
    ///
    /// A position counts only when the answer equals the correct index; unanswered
    /// positions are wrong.
    ///
    /// # Errors
    ///
    /// Returns `AttemptError::LengthMismatch` if the answers do not line up with the
    /// questions, or `AttemptError::TooManyQuestions` if the count overflows `u32`.
    pub fn grade(
        questions: &[Question],
        answers: Vec<Option<u32>>,
        mode: SessionMode,
        chapter: String,
        completed_at: DateTime<Utc>,
    ) -> Result<Self, AttemptError> {
        let total = u32::try_from(questions.len())
            .map_err(|_| AttemptError::TooManyQuestions {
                len: questions.len(),
            })?;
        if answers.len() != questions.len() {
            return Err(AttemptError::LengthMismatch {
                questions: questions.len(),
                answers: answers.len(),
                total,
            });
        }

        let mut score = 0_u32;
        for (question, answer) in questions.iter().zip(&answers) {
            if question.is_correct(*answer) {
                score = score.saturating_add(1);
            }
        }

        Self::from_persisted(
            None,
            completed_at,
            chapter,
            score,
            total,
            mode,
            questions.iter().map(Question::id).collect(),
            answers,
        )
    }

    /// Rehydrate an attempt from persisted storage.
    ///
    /// # Errors
    ///
    /// Returns `AttemptError` if the lengths disagree with `total` or the score is
    /// larger than the total.
    #[allow(clippy::too_many_arguments)]
    pub fn from_persisted(
        id: Option<AttemptId>,
        completed_at: DateTime<Utc>,
        chapter: String,
        score: u32,
        total: u32,
        mode: SessionMode,
        question_ids: Vec<QuestionId>,
        answers: Vec<Option<u32>>,
    ) -> Result<Self, AttemptError> {
        let total_len = usize::try_from(total).unwrap_or(usize::MAX);
        if question_ids.len() != answers.len() || question_ids.len() != total_len {
            return Err(AttemptError::LengthMismatch {
                questions: question_ids.len(),
                answers: answers.len(),
                total,
            });
        }
        if score > total {
            return Err(AttemptError::ScoreExceedsTotal { score, total });
        }

        Ok(Self {
            id,
            completed_at,
            chapter,
            score,
            total,
            mode,
            question_ids,
            answers,
        })
    }

    /// Attach the identifier the store assigned on append.
    #[must_use]
    pub fn with_id(mut self, id: AttemptId) -> Self {
        self.id = Some(id);
        self
    }

    #[must_use]
    pub fn id(&self) -> Option<AttemptId> {
        self.id
    }

    #[must_use]
    pub fn completed_at(&self) -> DateTime<Utc> {
        self.completed_at
    }

    #[must_use]
    pub fn chapter(&self) -> &str {
        &self.chapter
    }

    #[must_use]
    pub fn is_mixed(&self) -> bool {
        self.chapter == MIXED_CHAPTER
    }

    #[must_use]
    pub fn score(&self) -> u32 {
        self.score
    }

    #[must_use]
    pub fn total(&self) -> u32 {
        self.total
    }

    #[must_use]
    pub fn mode(&self) -> SessionMode {
        self.mode
    }

    #[must_use]
    pub fn question_ids(&self) -> &[QuestionId] {
        &self.question_ids
    }

    #[must_use]
    pub fn answers(&self) -> &[Option<u32>] {
        &self.answers
    }

    /// Score as a rounded percentage; 0 for an empty attempt.
    #[must_use]
    pub fn percentage(&self) -> u32 {
        percent(self.score, self.total)
    }
}

/// Rounded `part / whole` percentage, 0 when `whole` is 0.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn percent(part: u32, whole: u32) -> u32 {
    if whole == 0 {
        return 0;
    }
    (f64::from(part) / f64::from(whole) * 100.0).round() as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::question::QuestionDraft;
    use crate::time::fixed_now;

    fn question(id: u64, correct_index: u32) -> Question {
        QuestionDraft {
            chapter: "Radiation Physics".into(),
            text: format!("Q{id}"),
            options: vec!["a".into(), "b".into(), "c".into()],
            correct_index,
            explanation: String::new(),
        }
        .validate()
        .unwrap()
        .assign_id(QuestionId::new(id))
    }

    #[test]
    fn grading_counts_strict_matches() {
        let questions = vec![question(1, 0), question(2, 1), question(3, 1)];
        let attempt = Attempt::grade(
            &questions,
            vec![Some(0), Some(1), Some(0)],
            SessionMode::Mock,
            "Radiation Physics".into(),
            fixed_now(),
        )
        .unwrap();

        assert_eq!(attempt.score(), 2);
        assert_eq!(attempt.total(), 3);
        assert_eq!(attempt.percentage(), 67);
        assert_eq!(
            attempt.question_ids(),
            &[QuestionId::new(1), QuestionId::new(2), QuestionId::new(3)]
        );
        assert_eq!(attempt.id(), None);
    }

    #[test]
    fn unanswered_positions_score_as_wrong() {
        let questions = vec![question(1, 0), question(2, 0)];
        let attempt = Attempt::grade(
            &questions,
            vec![None, Some(0)],
            SessionMode::Practice,
            MIXED_CHAPTER.into(),
            fixed_now(),
        )
        .unwrap();
        assert_eq!(attempt.score(), 1);
        assert!(attempt.is_mixed());
    }

    #[test]
    fn misaligned_answers_are_rejected() {
        let questions = vec![question(1, 0)];
        let err = Attempt::grade(
            &questions,
            vec![None, None],
            SessionMode::Mock,
            MIXED_CHAPTER.into(),
            fixed_now(),
        )
        .unwrap_err();
        assert!(matches!(err, AttemptError::LengthMismatch { .. }));
    }

    #[test]
    fn persisted_score_cannot_exceed_total() {
        let err = Attempt::from_persisted(
            None,
            fixed_now(),
            "Ch".into(),
            2,
            1,
            SessionMode::Mock,
            vec![QuestionId::new(1)],
            vec![Some(0)],
        )
        .unwrap_err();
        assert_eq!(err, AttemptError::ScoreExceedsTotal { score: 2, total: 1 });
    }

    #[test]
    fn percent_rounds_and_handles_zero() {
        assert_eq!(percent(0, 0), 0);
        assert_eq!(percent(1, 3), 33);
        assert_eq!(percent(2, 3), 67);
        assert_eq!(percent(5, 5), 100);
    }
}
