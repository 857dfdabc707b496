use quiz_core::model::Question;

use super::shuffle::ShuffleSource;

/// Default number of questions drawn into a fresh session.
pub const DEFAULT_SESSION_SIZE: usize = 20;

/// Questions chosen for a fresh session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionPlan {
    pub questions: Vec<Question>,
    pub pool_size: usize,
}

impl SessionPlan {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }
}

/// Draws a fresh session from a candidate pool.
pub struct SessionBuilder<'a> {
    shuffle: &'a dyn ShuffleSource,
    size: usize,
}

impl<'a> SessionBuilder<'a> {
    #[must_use]
    pub fn new(shuffle: &'a dyn ShuffleSource) -> Self {
        Self {
            shuffle,
            size: DEFAULT_SESSION_SIZE,
        }
    }

    #[must_use]
    pub fn with_size(mut self, size: usize) -> Self {
        self.size = size;
        self
    }

    /// Shuffle the whole pool, then keep the first `size` questions.
    pub fn build(self, mut pool: Vec<Question>) -> SessionPlan {
        let pool_size = pool.len();
        self.shuffle.shuffle(&mut pool);
        pool.truncate(self.size);
        SessionPlan {
            questions: pool,
            pool_size,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sessions::shuffle::{IdentityShuffle, SeededShuffle};
    use quiz_core::model::{QuestionDraft, QuestionId};

    fn pool(n: u64) -> Vec<Question> {
        (1..=n)
            .map(|i| {
                QuestionDraft {
                    chapter: "Ch".into(),
                    text: format!("Q{i}"),
                    options: vec!["a".into(), "b".into()],
                    correct_index: 1,
                    explanation: String::new(),
                }
                .validate()
                .unwrap()
                .assign_id(QuestionId::new(i))
            })
            .collect()
    }

    #[test]
    fn caps_at_default_size() {
        let plan = SessionBuilder::new(&IdentityShuffle).build(pool(45));
        assert_eq!(plan.questions.len(), 20);
        assert_eq!(plan.pool_size, 45);
        assert_eq!(plan.questions[0].id(), QuestionId::new(1));
    }

    #[test]
    fn small_pool_is_taken_whole() {
        let plan = SessionBuilder::new(&SeededShuffle::new(3)).build(pool(4));
        assert_eq!(plan.questions.len(), 4);
    }

    #[test]
    fn custom_size_is_honored() {
        let plan = SessionBuilder::new(&IdentityShuffle)
            .with_size(5)
            .build(pool(8));
        assert_eq!(plan.questions.len(), 5);
        assert!(!plan.is_empty());
        assert!(SessionBuilder::new(&IdentityShuffle).build(Vec::new()).is_empty());
    }
}
