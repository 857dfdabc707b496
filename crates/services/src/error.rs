//! Shared error types for the services crate.

use thiserror::Error;

use quiz_core::model::{ActiveSessionError, AttemptError, QuestionError};
use storage::repository::StorageError;
use storage::sqlite::SqliteInitError;

/// Errors emitted by the session engine.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SessionError {
    #[error("no questions available for this session")]
    Empty,
    #[error("no session is active")]
    NotActive,
    #[error("session is not complete")]
    NotComplete,
    #[error("already at the first question")]
    AtFirstQuestion,
    #[error("already at the last question")]
    AtLastQuestion,
    #[error("option {option} does not exist; the question has {options} option(s)")]
    InvalidOption { option: u32, options: usize },
    #[error("stored session no longer matches the question bank")]
    Stale,
    #[error(transparent)]
    Attempt(#[from] AttemptError),
    #[error(transparent)]
    ActiveSession(#[from] ActiveSessionError),
    #[error(transparent)]
    Bookmark(#[from] BankError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `QuestionBank` and `BookmarkService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum BankError {
    #[error(transparent)]
    Question(#[from] QuestionError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted while importing or exporting the question bank.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ImportError {
    #[error("invalid JSON format: {0}")]
    InvalidFormat(#[source] serde_json::Error),
    #[error("question #{index} is invalid: {source}")]
    InvalidQuestion {
        index: usize,
        #[source]
        source: QuestionError,
    },
    #[error("export failed: {0}")]
    Export(#[source] serde_json::Error),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted while bootstrapping app services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppServicesError {
    #[error(transparent)]
    Sqlite(#[from] SqliteInitError),
    #[error(transparent)]
    Bank(#[from] BankError),
}
