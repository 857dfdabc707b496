use chrono::{DateTime, Utc};
use std::fmt;

use quiz_core::model::{ActiveSession, Attempt, Question, SessionMode, chapter_label};

use super::progress::SessionProgress;
use crate::error::SessionError;

//
// ─── ANSWERS ───────────────────────────────────────────────────────────────────
//

/// What `select_answer` did to the current slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnswerOutcome {
    /// The slot was empty and now holds the selection.
    Recorded,
    /// Mock mode replaced an earlier selection.
    Replaced { previous: u32 },
    /// Practice mode keeps the first answer; nothing changed.
    Locked { kept: u32 },
}

impl AnswerOutcome {
    #[must_use]
    pub fn changed(self) -> bool {
        !matches!(self, AnswerOutcome::Locked { .. })
    }
}

/// Practice-mode feedback for an answered question.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnswerFeedback {
    pub selected: u32,
    pub correct: u32,
}

impl AnswerFeedback {
    #[must_use]
    pub fn is_correct(self) -> bool {
        self.selected == self.correct
    }
}

//
// ─── QUIZ SESSION ──────────────────────────────────────────────────────────────
//

/// Live answer state for one quiz. Never empty.
#[derive(Clone, PartialEq, Eq)]
pub struct QuizSession {
    mode: SessionMode,
    chapter: Option<String>,
    questions: Vec<Question>,
    current_idx: usize,
    answers: Vec<Option<u32>>,
    started_at: DateTime<Utc>,
}

impl QuizSession {
    /// Start a session over `questions` with every answer unset.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Empty` if no questions are provided.
    pub fn new(
        mode: SessionMode,
        chapter: Option<String>,
        questions: Vec<Question>,
        started_at: DateTime<Utc>,
    ) -> Result<Self, SessionError> {
        if questions.is_empty() {
            return Err(SessionError::Empty);
        }
        let answers = vec![None; questions.len()];
        Ok(Self {
            mode,
            chapter,
            questions,
            current_idx: 0,
            answers,
            started_at,
        })
    }

    /// Rebuild a session from its persisted snapshot and the questions it names, in
    /// snapshot order.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Empty` if the snapshot holds no questions, and
    /// `SessionError::Stale` if `questions` does not line up with the snapshot ids.
    pub fn resume(snapshot: &ActiveSession, questions: Vec<Question>) -> Result<Self, SessionError> {
        if questions.is_empty() {
            return Err(SessionError::Empty);
        }
        let aligned = questions.len() == snapshot.question_ids().len()
            && questions
                .iter()
                .zip(snapshot.question_ids())
                .all(|(q, id)| q.id() == *id);
        if !aligned {
            return Err(SessionError::Stale);
        }

        Ok(Self {
            mode: snapshot.mode(),
            chapter: snapshot.chapter().map(str::to_owned),
            questions,
            current_idx: snapshot.current_idx(),
            answers: snapshot.answers().to_vec(),
            started_at: snapshot.started_at(),
        })
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
    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    #[must_use]
    pub fn answers(&self) -> &[Option<u32>] {
        &self.answers
    }

    #[must_use]
    pub fn current_idx(&self) -> usize {
        self.current_idx
    }

    #[must_use]
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.questions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    #[must_use]
    pub fn current_question(&self) -> Option<&Question> {
        self.questions.get(self.current_idx)
    }

    #[must_use]
    pub fn current_answer(&self) -> Option<u32> {
        self.answers.get(self.current_idx).copied().flatten()
    }

    #[must_use]
    pub fn answered_count(&self) -> usize {
        self.answers.iter().filter(|a| a.is_some()).count()
    }

    #[must_use]
    pub fn progress(&self) -> SessionProgress {
        let answered = self.answered_count();
        SessionProgress {
            position: self.current_idx,
            total: self.len(),
            answered,
            remaining: self.len().saturating_sub(answered),
            is_complete: answered == self.len(),
        }
    }

    #[must_use]
    pub fn has_next(&self) -> bool {
        self.current_idx + 1 < self.questions.len()
    }

    #[must_use]
    pub fn has_previous(&self) -> bool {
        self.current_idx > 0
    }

    /// Move to the following question.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::AtLastQuestion` when already on the last question.
    pub fn next(&mut self) -> Result<usize, SessionError> {
        if !self.has_next() {
            return Err(SessionError::AtLastQuestion);
        }
        self.current_idx += 1;
        Ok(self.current_idx)
    }

    /// Move to the preceding question.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::AtFirstQuestion` when already on the first question.
    pub fn previous(&mut self) -> Result<usize, SessionError> {
        if !self.has_previous() {
            return Err(SessionError::AtFirstQuestion);
        }
        self.current_idx -= 1;
        Ok(self.current_idx)
    }

    /// Record `option` for the current question without moving.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::InvalidOption` if the current question has no such option.
    /// An answered practice question stays locked whatever `option` is.
    pub fn select_answer(&mut self, option: u32) -> Result<AnswerOutcome, SessionError> {
        let (Some(question), Some(slot)) = (
            self.questions.get(self.current_idx),
            self.answers.get_mut(self.current_idx),
        ) else {
            return Err(SessionError::NotActive);
        };

        let outcome = match (*slot, self.mode) {
            (Some(kept), SessionMode::Practice) => return Ok(AnswerOutcome::Locked { kept }),
            (Some(previous), SessionMode::Mock) => AnswerOutcome::Replaced { previous },
            (None, _) => AnswerOutcome::Recorded,
        };
        if question.option(option).is_none() {
            return Err(SessionError::InvalidOption {
                option,
                options: question.options().len(),
            });
        }
        *slot = Some(option);
        Ok(outcome)
    }

    /// Selected vs correct option for the question at `idx`.
    ///
    /// Only practice sessions reveal the answer before finishing.
    #[must_use]
    pub fn feedback_at(&self, idx: usize) -> Option<AnswerFeedback> {
        if self.mode != SessionMode::Practice {
            return None;
        }
        let selected = self.answers.get(idx).copied().flatten()?;
        let question = self.questions.get(idx)?;
        Some(AnswerFeedback {
            selected,
            correct: question.correct_index(),
        })
    }

    #[must_use]
    pub fn feedback(&self) -> Option<AnswerFeedback> {
        self.feedback_at(self.current_idx)
    }

    /// Snapshot for the active-session record.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::ActiveSession` if the position or answers drifted out of
    /// line with the questions.
    pub fn snapshot(&self) -> Result<ActiveSession, SessionError> {
        Ok(ActiveSession::from_persisted(
            self.mode,
            self.chapter.clone(),
            self.questions.iter().map(Question::id).collect(),
            self.current_idx,
            self.answers.clone(),
            self.started_at,
        )?)
    }

    /// Score the current answers into an unsaved attempt.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Attempt` if the attempt invariants cannot be met.
    pub fn grade(&self, completed_at: DateTime<Utc>) -> Result<Attempt, SessionError> {
        Ok(Attempt::grade(
            &self.questions,
            self.answers.clone(),
            self.mode,
            chapter_label(self.chapter.as_deref()),
            completed_at,
        )?)
    }

    /// Clear every answer and return to the first question, keeping the order.
    pub fn reset(&mut self, started_at: DateTime<Utc>) {
        self.current_idx = 0;
        self.answers.iter_mut().for_each(|a| *a = None);
        self.started_at = started_at;
    }
}

impl fmt::Debug for QuizSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QuizSession")
            .field("mode", &self.mode)
            .field("chapter", &self.chapter)
            .field("questions_len", &self.questions.len())
            .field("current_idx", &self.current_idx)
            .field("answered", &self.answered_count())
            .field("started_at", &self.started_at)
            .finish_non_exhaustive()
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
