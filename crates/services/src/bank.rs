use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::info;

use quiz_core::model::{Question, QuestionDraft, QuestionId, ValidatedQuestion};
use storage::repository::QuestionRepository;

use crate::error::BankError;

/// Chapter shipped with the built-in starter questions.
pub const SEED_CHAPTER: &str = "Radiation Physics";

/// A chapter and how many questions it holds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChapterSummary {
    pub name: String,
    pub questions: usize,
}

/// Read and maintenance access to the question bank.
#[derive(Clone)]
pub struct QuestionBank {
    questions: Arc<dyn QuestionRepository>,
}

impl QuestionBank {
    #[must_use]
    pub fn new(questions: Arc<dyn QuestionRepository>) -> Self {
        Self { questions }
    }

    /// Insert the starter questions when the bank is empty. Returns how many were added.
    ///
    /// # Errors
    ///
    /// Returns `BankError` if the bank cannot be counted or written.
    pub async fn seed_if_empty(&self) -> Result<usize, BankError> {
        if self.questions.count_questions().await? > 0 {
            return Ok(0);
        }
        let seeds = seed_questions()?;
        let ids = self.questions.bulk_add_questions(seeds).await?;
        info!(added = ids.len(), chapter = SEED_CHAPTER, "seeded empty question bank");
        Ok(ids.len())
    }

    /// Store validated questions in one batch.
    ///
    /// # Errors
    ///
    /// Returns `BankError::Storage` if the batch cannot be stored.
    pub async fn add_all(
        &self,
        questions: Vec<ValidatedQuestion>,
    ) -> Result<Vec<QuestionId>, BankError> {
        Ok(self.questions.bulk_add_questions(questions).await?)
    }

    /// # Errors
    ///
    /// Returns `BankError::Storage` on repository failures.
    pub async fn get(&self, id: QuestionId) -> Result<Option<Question>, BankError> {
        Ok(self.questions.get_question(id).await?)
    }

    /// # Errors
    ///
    /// Returns `BankError::Storage` on repository failures.
    pub async fn count(&self) -> Result<u64, BankError> {
        Ok(self.questions.count_questions().await?)
    }

    /// Every question ordered by id.
    ///
    /// # Errors
    ///
    /// Returns `BankError::Storage` on repository failures.
    pub async fn list(&self) -> Result<Vec<Question>, BankError> {
        Ok(self.questions.list_questions().await?)
    }

    /// Distinct chapters with their question counts, ordered by name.
    ///
    /// # Errors
    ///
    /// Returns `BankError::Storage` on repository failures.
    pub async fn chapters(&self) -> Result<Vec<ChapterSummary>, BankError> {
        let mut counts: BTreeMap<String, usize> = BTreeMap::new();
        for question in self.questions.list_questions().await? {
            *counts.entry(question.chapter().to_owned()).or_default() += 1;
        }
        Ok(counts
            .into_iter()
            .map(|(name, questions)| ChapterSummary { name, questions })
            .collect())
    }

    /// Case-insensitive substring search over question text and chapter.
    ///
    /// Surrounding whitespace is ignored and a blank query matches nothing.
    ///
    /// # Errors
    ///
    /// Returns `BankError::Storage` on repository failures.
    pub async fn search(&self, query: &str) -> Result<Vec<Question>, BankError> {
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return Ok(Vec::new());
        }
        let matches = move |q: &Question| {
            q.text().to_lowercase().contains(&needle) || q.chapter().to_lowercase().contains(&needle)
        };
        Ok(self.questions.filter_questions(&matches).await?)
    }

    /// Delete every question. Attempts and bookmarks are kept.
    ///
    /// # Errors
    ///
    /// Returns `BankError::Storage` on repository failures.
    pub async fn clear(&self) -> Result<u64, BankError> {
        let removed = self.questions.count_questions().await?;
        self.questions.clear_questions().await?;
        info!(removed, "question bank cleared");
        Ok(removed)
    }
}

fn seed_questions() -> Result<Vec<ValidatedQuestion>, BankError> {
    let seeds = [
        (
            "The unit of absorbed dose is:",
            ["Gray", "Sievert", "Coulomb/kg", "Roentgen"],
            0,
            "Absorbed dose is measured in Gray (Gy), defined as joule per kilogram.",
        ),
        (
            "One Gray is equal to:",
            ["1 J/kg", "100 rad", "1 Sv", "0.01 J/kg"],
            0,
            "1 Gray is defined as absorption of 1 joule of energy per kilogram of matter.",
        ),
        (
            "The SI unit of radioactivity is:",
            ["Curie", "Becquerel", "Gray", "Sievert"],
            1,
            "Becquerel (Bq) represents one nuclear disintegration per second.",
        ),
    ];

    seeds
        .into_iter()
        .map(|(text, options, correct_index, explanation)| {
            QuestionDraft {
                chapter: SEED_CHAPTER.to_owned(),
                text: text.to_owned(),
                options: options.into_iter().map(str::to_owned).collect(),
                correct_index,
                explanation: explanation.to_owned(),
            }
            .validate()
            .map_err(BankError::from)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use storage::repository::Storage;

    fn bank() -> QuestionBank {
        QuestionBank::new(Arc::clone(&Storage::in_memory().questions))
    }

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
    async fn seeding_only_fills_an_empty_bank() {
        let bank = bank();
        assert_eq!(bank.seed_if_empty().await.unwrap(), 3);
        assert_eq!(bank.seed_if_empty().await.unwrap(), 0);
        assert_eq!(bank.count().await.unwrap(), 3);

        let questions = bank.list().await.unwrap();
        let correct: Vec<u32> = questions.iter().map(Question::correct_index).collect();
        assert_eq!(correct, vec![0, 0, 1]);
        assert!(questions.iter().all(|q| q.chapter() == SEED_CHAPTER));
    }

    #[tokio::test]
    async fn search_matches_text_or_chapter_ignoring_case() {
        let bank = bank();
        bank.add_all(vec![
            draft("Anatomy", "Which bone is longest?"),
            draft("Radiation Physics", "Define the Gray"),
            draft("Radiobiology", "What is LET?"),
        ])
        .await
        .unwrap();

        let by_text = bank.search("  gray ").await.unwrap();
        assert_eq!(by_text.len(), 1);
        assert_eq!(by_text[0].chapter(), "Radiation Physics");

        let by_chapter = bank.search("RADIO").await.unwrap();
        assert_eq!(by_chapter.len(), 1);
        assert_eq!(by_chapter[0].text(), "What is LET?");

        assert!(bank.search("   ").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn chapters_are_counted_and_sorted() {
        let bank = bank();
        bank.add_all(vec![
            draft("Physics", "1"),
            draft("Anatomy", "2"),
            draft("Physics", "3"),
        ])
        .await
        .unwrap();

        let chapters = bank.chapters().await.unwrap();
        assert_eq!(
            chapters,
            vec![
                ChapterSummary {
                    name: "Anatomy".into(),
                    questions: 1
                },
                ChapterSummary {
                    name: "Physics".into(),
                    questions: 2
                },
            ]
        );
    }

    #[tokio::test]
    async fn clear_empties_the_bank() {
        let bank = bank();
        bank.seed_if_empty().await.unwrap();
        assert_eq!(bank.clear().await.unwrap(), 3);
        assert_eq!(bank.count().await.unwrap(), 0);
        assert!(bank.chapters().await.unwrap().is_empty());
    }
}
