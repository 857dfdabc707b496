mod engine;
mod plan;
mod progress;
mod quiz;
mod shuffle;

// Public API of the session subsystem.
pub use crate::error::SessionError;
pub use engine::{SessionEngine, SessionPhase, StartOutcome};
pub use plan::{DEFAULT_SESSION_SIZE, SessionBuilder, SessionPlan};
pub use progress::SessionProgress;
pub use quiz::{AnswerFeedback, AnswerOutcome, QuizSession};
pub use shuffle::{IdentityShuffle, SeededShuffle, ShuffleSource, ThreadRngShuffle};
