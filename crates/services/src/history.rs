use std::collections::BTreeMap;
use std::sync::Arc;

use quiz_core::model::{ActiveSession, Attempt, percent};
use storage::repository::{ActiveSessionRepository, AttemptRepository};

use crate::bank::{ChapterSummary, QuestionBank};
use crate::error::BankError;

/// Accuracy at or above this is considered mastered.
pub const MASTERY_THRESHOLD: u32 = 70;
/// Accuracy at or above this (and below mastery) is still developing.
pub const DEVELOPING_THRESHOLD: u32 = 40;

/// Number of attempts the dashboard lists.
pub const RECENT_ATTEMPTS: usize = 3;

/// Accuracy band for a chapter or attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MasteryBand {
    Strong,
    Developing,
    Weak,
}

impl MasteryBand {
    #[must_use]
    pub fn classify(accuracy: u32) -> Self {
        if accuracy >= MASTERY_THRESHOLD {
            MasteryBand::Strong
        } else if accuracy >= DEVELOPING_THRESHOLD {
            MasteryBand::Developing
        } else {
            MasteryBand::Weak
        }
    }

    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            MasteryBand::Strong => "strong",
            MasteryBand::Developing => "developing",
            MasteryBand::Weak => "weak",
        }
    }
}

/// Aggregated results for one attempt chapter label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChapterAccuracy {
    pub chapter: String,
    pub correct: u64,
    pub total: u64,
    pub accuracy: u32,
    pub band: MasteryBand,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Analytics {
    pub attempts: usize,
    pub chapters: Vec<ChapterAccuracy>,
}

impl Analytics {
    /// Chapters at or above the mastery threshold.
    #[must_use]
    pub fn mastered(&self) -> usize {
        self.chapters
            .iter()
            .filter(|c| c.accuracy >= MASTERY_THRESHOLD)
            .count()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dashboard {
    pub questions: u64,
    pub attempts: u64,
    pub average_score: u32,
    pub recent: Vec<Attempt>,
    pub chapters: Vec<ChapterSummary>,
    pub pending: Option<ActiveSession>,
}

/// Read side of the attempt history.
#[derive(Clone)]
pub struct HistoryService {
    attempts: Arc<dyn AttemptRepository>,
    sessions: Arc<dyn ActiveSessionRepository>,
    bank: QuestionBank,
}

impl HistoryService {
    #[must_use]
    pub fn new(
        attempts: Arc<dyn AttemptRepository>,
        sessions: Arc<dyn ActiveSessionRepository>,
        bank: QuestionBank,
    ) -> Self {
        Self {
            attempts,
            sessions,
            bank,
        }
    }

    /// All attempts, most recent first.
    ///
    /// # Errors
    ///
    /// Returns `BankError::Storage` on repository failures.
    pub async fn list(&self) -> Result<Vec<Attempt>, BankError> {
        Ok(self.attempts.list_attempts().await?)
    }

    /// Per-chapter accuracy across every attempt.
    ///
    /// # Errors
    ///
    /// Returns `BankError::Storage` on repository failures.
    pub async fn analytics(&self) -> Result<Analytics, BankError> {
        let attempts = self.attempts.list_attempts().await?;
        Ok(analyze(&attempts))
    }

    /// Summary figures for the home screen.
    ///
    /// # Errors
    ///
    /// Returns `BankError::Storage` on repository failures.
    pub async fn dashboard(&self) -> Result<Dashboard, BankError> {
        // The average needs every attempt, so `recent` is cut from the same list
        // instead of a second `recent_attempts` query.
        let attempts = self.attempts.list_attempts().await?;
        let average_score = average_score(&attempts);
        let recent = attempts.iter().take(RECENT_ATTEMPTS).cloned().collect();

        Ok(Dashboard {
            questions: self.bank.count().await?,
            attempts: attempts.len() as u64,
            average_score,
            recent,
            chapters: self.bank.chapters().await?,
            pending: self.sessions.get_active_session().await?,
        })
    }
}

fn analyze(attempts: &[Attempt]) -> Analytics {
    let mut totals: BTreeMap<&str, (u64, u64)> = BTreeMap::new();
    for attempt in attempts {
        let entry = totals.entry(attempt.chapter()).or_default();
        entry.0 += u64::from(attempt.score());
        entry.1 += u64::from(attempt.total());
    }

    let chapters = totals
        .into_iter()
        .map(|(chapter, (correct, total))| {
            let accuracy = ratio_percent(correct, total);
            ChapterAccuracy {
                chapter: chapter.to_owned(),
                correct,
                total,
                accuracy,
                band: MasteryBand::classify(accuracy),
            }
        })
        .collect();

    Analytics {
        attempts: attempts.len(),
        chapters,
    }
}

/// Mean of per-attempt score ratios as a rounded percentage.
#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn average_score(attempts: &[Attempt]) -> u32 {
    if attempts.is_empty() {
        return 0;
    }
    let sum: f64 = attempts
        .iter()
        .map(|a| {
            if a.total() == 0 {
                0.0
            } else {
                f64::from(a.score()) / f64::from(a.total())
            }
        })
        .sum();
    (sum / attempts.len() as f64 * 100.0).round() as u32
}

#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn ratio_percent(part: u64, whole: u64) -> u32 {
    match (u32::try_from(part), u32::try_from(whole)) {
        (Ok(part), Ok(whole)) => percent(part, whole),
        _ => (part as f64 / whole as f64 * 100.0).round() as u32,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use quiz_core::model::{QuestionId, SessionMode};
    use quiz_core::time::fixed_now;
    use storage::repository::Storage;

    fn attempt(chapter: &str, score: u32, total: u32, minutes: i64) -> Attempt {
        let ids = (1..=u64::from(total)).map(QuestionId::new).collect();
        let answers = vec![None; total as usize];
        Attempt::from_persisted(
            None,
            fixed_now() + Duration::minutes(minutes),
            chapter.into(),
            score,
            total,
            SessionMode::Mock,
            ids,
            answers,
        )
        .unwrap()
    }

    fn service(storage: &Storage) -> HistoryService {
        HistoryService::new(
            Arc::clone(&storage.attempts),
            Arc::clone(&storage.sessions),
            QuestionBank::new(Arc::clone(&storage.questions)),
        )
    }

    #[test]
    fn bands_follow_thresholds() {
        assert_eq!(MasteryBand::classify(100), MasteryBand::Strong);
        assert_eq!(MasteryBand::classify(70), MasteryBand::Strong);
        assert_eq!(MasteryBand::classify(69), MasteryBand::Developing);
        assert_eq!(MasteryBand::classify(40), MasteryBand::Developing);
        assert_eq!(MasteryBand::classify(39), MasteryBand::Weak);
    }

    #[test]
    fn analytics_groups_by_chapter_label() {
        let analytics = analyze(&[
            attempt("Physics", 3, 4, 0),
            attempt("Physics", 4, 6, 1),
            attempt("Mixed", 1, 5, 2),
        ]);

        assert_eq!(analytics.attempts, 3);
        assert_eq!(analytics.chapters.len(), 2);
        let mixed = &analytics.chapters[0];
        assert_eq!(mixed.chapter, "Mixed");
        assert_eq!(mixed.accuracy, 20);
        assert_eq!(mixed.band, MasteryBand::Weak);

        let physics = &analytics.chapters[1];
        assert_eq!((physics.correct, physics.total), (7, 10));
        assert_eq!(physics.accuracy, 70);
        assert_eq!(physics.band, MasteryBand::Strong);
        assert_eq!(analytics.mastered(), 1);
    }

    #[test]
    fn average_is_mean_of_ratios() {
        assert_eq!(average_score(&[]), 0);
        // (1/2 + 1/1) / 2 = 75%
        assert_eq!(
            average_score(&[attempt("A", 1, 2, 0), attempt("B", 1, 1, 1)]),
            75
        );
    }

    #[tokio::test]
    async fn dashboard_lists_three_most_recent() {
        let storage = Storage::in_memory();
        for minutes in 0..5 {
            storage
                .attempts
                .append_attempt(&attempt("Physics", 1, 2, minutes))
                .await
                .unwrap();
        }

        let dashboard = service(&storage).dashboard().await.unwrap();
        assert_eq!(dashboard.attempts, 5);
        assert_eq!(dashboard.questions, 0);
        assert_eq!(dashboard.average_score, 50);
        assert_eq!(dashboard.recent.len(), RECENT_ATTEMPTS);
        assert_eq!(
            dashboard.recent[0].completed_at(),
            fixed_now() + Duration::minutes(4)
        );
        assert!(dashboard.pending.is_none());
    }
}
