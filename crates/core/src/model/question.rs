use thiserror::Error;

use crate::model::ids::QuestionId;

//
// ─── ERRORS ───────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum QuestionError {
    #[error("chapter cannot be empty")]
    EmptyChapter,

    #[error("question text cannot be empty")]
    EmptyText,

    #[error("correct index {index} is out of range for {options} option(s)")]
    CorrectIndexOutOfRange { index: u32, options: usize },
}

//
// ─── QUESTION TYPES ───────────────────────────────────────────────────────────
//

/// A question as supplied by an importer or editor, before the store assigns an id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionDraft {
    pub chapter: String,
    pub text: String,
    pub options: Vec<String>,
    pub correct_index: u32,
    pub explanation: String,
}

impl QuestionDraft {
    /// Check the draft against the question invariants.
    ///
    /// # Errors
    ///
    /// Returns `QuestionError` if the chapter or text is blank, or if the correct
    /// index does not point at one of the options.
    pub fn validate(self) -> Result<ValidatedQuestion, QuestionError> {
        check_fields(&self.chapter, &self.text, &self.options, self.correct_index)?;
        Ok(ValidatedQuestion {
            chapter: self.chapter,
            text: self.text,
            options: self.options,
            correct_index: self.correct_index,
            explanation: self.explanation,
        })
    }
}

/// A question that passed validation but has not been stored yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedQuestion {
    chapter: String,
    text: String,
    options: Vec<String>,
    correct_index: u32,
    explanation: String,
}

impl ValidatedQuestion {
    #[must_use]
    pub fn chapter(&self) -> &str {
        &self.chapter
    }

    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    #[must_use]
    pub fn options(&self) -> &[String] {
        &self.options
    }

    #[must_use]
    pub fn correct_index(&self) -> u32 {
        self.correct_index
    }

    #[must_use]
    pub fn explanation(&self) -> &str {
        &self.explanation
    }

    #[must_use]
    pub fn assign_id(self, id: QuestionId) -> Question {
        Question {
            id,
            chapter: self.chapter,
            text: self.text,
            options: self.options,
            correct_index: self.correct_index,
            explanation: self.explanation,
        }
    }
}

/// A stored multiple-choice question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question {
    id: QuestionId,
    chapter: String,
    text: String,
    options: Vec<String>,
    correct_index: u32,
    explanation: String,
}

impl Question {
    /// Rehydrate a question from persisted storage.
    ///
    /// # Errors
    ///
    /// Returns `QuestionError` if the persisted fields break the question invariants.
    pub fn from_persisted(
        id: QuestionId,
        chapter: String,
        text: String,
        options: Vec<String>,
        correct_index: u32,
        explanation: String,
    ) -> Result<Self, QuestionError> {
        check_fields(&chapter, &text, &options, correct_index)?;
        Ok(Self {
            id,
            chapter,
            text,
            options,
            correct_index,
            explanation,
        })
    }

    #[must_use]
    pub fn id(&self) -> QuestionId {
        self.id
    }

    #[must_use]
    pub fn chapter(&self) -> &str {
        &self.chapter
    }

    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    #[must_use]
    pub fn options(&self) -> &[String] {
        &self.options
    }

    #[must_use]
    pub fn correct_index(&self) -> u32 {
        self.correct_index
    }

    #[must_use]
    pub fn explanation(&self) -> &str {
        &self.explanation
    }

    /// Text of the option at `index`, if any.
    #[must_use]
    pub fn option(&self, index: u32) -> Option<&str> {
        let index = usize::try_from(index).ok()?;
        self.options.get(index).map(String::as_str)
    }

    /// Text of the correct option.
    #[must_use]
    pub fn correct_option(&self) -> Option<&str> {
        self.option(self.correct_index)
    }

    /// Strict comparison against the correct index; `None` is never correct.
    #[must_use]
    pub fn is_correct(&self, answer: Option<u32>) -> bool {
        answer == Some(self.correct_index)
    }
}

fn check_fields(
    chapter: &str,
    text: &str,
    options: &[String],
    correct_index: u32,
) -> Result<(), QuestionError> {
    if chapter.trim().is_empty() {
        return Err(QuestionError::EmptyChapter);
    }
    if text.trim().is_empty() {
        return Err(QuestionError::EmptyText);
    }
    let in_range = usize::try_from(correct_index).is_ok_and(|idx| idx < options.len());
    if !in_range {
        return Err(QuestionError::CorrectIndexOutOfRange {
            index: correct_index,
            options: options.len(),
        });
    }
    Ok(())
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;

    fn draft(correct_index: u32) -> QuestionDraft {
        QuestionDraft {
            chapter: "Radiation Physics".into(),
            text: "The unit of absorbed dose is:".into(),
            options: vec!["Gray".into(), "Sievert".into(), "Roentgen".into()],
            correct_index,
            explanation: "Gy = J/kg".into(),
        }
    }

    #[test]
    fn valid_draft_assigns_id() {
        let question = draft(0).validate().unwrap().assign_id(QuestionId::new(9));
        assert_eq!(question.id(), QuestionId::new(9));
        assert_eq!(question.correct_option(), Some("Gray"));
        assert_eq!(question.option(2), Some("Roentgen"));
        assert_eq!(question.option(3), None);
    }

    #[test]
    fn correct_index_must_point_at_an_option() {
        let err = draft(3).validate().unwrap_err();
        assert_eq!(
            err,
            QuestionError::CorrectIndexOutOfRange {
                index: 3,
                options: 3
            }
        );
    }

    #[test]
    fn blank_text_is_rejected() {
        let mut d = draft(0);
        d.text = "   ".into();
        assert_eq!(d.validate().unwrap_err(), QuestionError::EmptyText);
    }

    #[test]
    fn unanswered_is_never_correct() {
        let question = draft(0).validate().unwrap().assign_id(QuestionId::new(1));
        assert!(question.is_correct(Some(0)));
        assert!(!question.is_correct(Some(1)));
        assert!(!question.is_correct(None));
    }

    #[test]
    fn from_persisted_rechecks_invariants() {
        let err = Question::from_persisted(
            QuestionId::new(1),
            "Ch".into(),
            "Q".into(),
            Vec::new(),
            0,
            String::new(),
        )
        .unwrap_err();
        assert!(matches!(err, QuestionError::CorrectIndexOutOfRange { .. }));
    }
}
