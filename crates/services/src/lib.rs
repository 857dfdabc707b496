#![forbid(unsafe_code)]

pub mod app_services;
pub mod bank;
pub mod bookmarks;
pub mod error;
pub mod history;
pub mod sessions;
pub mod vault;

pub use quiz_core::Clock;
pub use sessions as session;

pub use app_services::AppServices;
pub use bank::{ChapterSummary, QuestionBank};
pub use bookmarks::BookmarkService;
pub use error::{AppServicesError, BankError, ImportError, SessionError};
pub use history::{Analytics, ChapterAccuracy, Dashboard, HistoryService, MasteryBand};
pub use sessions::{
    AnswerFeedback, AnswerOutcome, QuizSession, SessionEngine, SessionPhase, SessionProgress,
    StartOutcome,
};
pub use vault::{ImportReport, VaultService};
