use std::sync::Arc;

use tracing::{debug, info, warn};

use quiz_core::model::{ActiveSession, Attempt, Question, QuestionId, SessionMode};
use storage::repository::{
    ActiveSessionRepository, BookmarkRepository, QuestionRepository, SessionPersistence, Storage,
};

use super::plan::{DEFAULT_SESSION_SIZE, SessionBuilder};
use super::progress::SessionProgress;
use super::quiz::{AnswerOutcome, QuizSession};
use super::shuffle::{ShuffleSource, ThreadRngShuffle};
use crate::Clock;
use crate::bookmarks::BookmarkService;
use crate::error::SessionError;

/// Lifecycle phase of the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Uninitialized,
    Loading,
    Active,
    Complete,
}

/// How `start` obtained its session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    Resumed,
    Fresh,
}

#[derive(Debug)]
enum EngineState {
    Uninitialized,
    Loading,
    Active(QuizSession),
    Complete {
        session: QuizSession,
        attempt: Attempt,
    },
}

enum SessionStart {
    Resume(ActiveSession),
    Fresh,
}

/// Owns the single live quiz and mirrors it to storage on every change.
pub struct SessionEngine {
    clock: Clock,
    session_size: usize,
    shuffle: Arc<dyn ShuffleSource>,
    questions: Arc<dyn QuestionRepository>,
    sessions: Arc<dyn ActiveSessionRepository>,
    persistence: Arc<dyn SessionPersistence>,
    bookmarks: BookmarkService,
    state: EngineState,
}

impl SessionEngine {
    #[must_use]
    pub fn new(
        clock: Clock,
        questions: Arc<dyn QuestionRepository>,
        bookmarks: Arc<dyn BookmarkRepository>,
        sessions: Arc<dyn ActiveSessionRepository>,
        persistence: Arc<dyn SessionPersistence>,
    ) -> Self {
        let bookmarks = BookmarkService::new(clock, bookmarks, Arc::clone(&questions));
        Self {
            clock,
            session_size: DEFAULT_SESSION_SIZE,
            shuffle: Arc::new(ThreadRngShuffle),
            questions,
            sessions,
            persistence,
            bookmarks,
            state: EngineState::Uninitialized,
        }
    }

    /// Wire an engine to every repository of `storage`.
    #[must_use]
    pub fn from_storage(clock: Clock, storage: &Storage) -> Self {
        Self::new(
            clock,
            Arc::clone(&storage.questions),
            Arc::clone(&storage.bookmarks),
            Arc::clone(&storage.sessions),
            Arc::clone(&storage.persistence),
        )
    }

    #[must_use]
    pub fn with_shuffle(mut self, shuffle: Arc<dyn ShuffleSource>) -> Self {
        self.shuffle = shuffle;
        self
    }

    #[must_use]
    pub fn with_session_size(mut self, size: usize) -> Self {
        self.session_size = size;
        self
    }

    #[must_use]
    pub fn session_size(&self) -> usize {
        self.session_size
    }

    #[must_use]
    pub fn phase(&self) -> SessionPhase {
        match self.state {
            EngineState::Uninitialized => SessionPhase::Uninitialized,
            EngineState::Loading => SessionPhase::Loading,
            EngineState::Active(_) => SessionPhase::Active,
            EngineState::Complete { .. } => SessionPhase::Complete,
        }
    }

    /// The live or just-finished session.
    #[must_use]
    pub fn session(&self) -> Option<&QuizSession> {
        match &self.state {
            EngineState::Active(session) | EngineState::Complete { session, .. } => Some(session),
            EngineState::Uninitialized | EngineState::Loading => None,
        }
    }

    /// The stored attempt, once finished.
    #[must_use]
    pub fn attempt(&self) -> Option<&Attempt> {
        match &self.state {
            EngineState::Complete { attempt, .. } => Some(attempt),
            _ => None,
        }
    }

    #[must_use]
    pub fn progress(&self) -> Option<SessionProgress> {
        self.session().map(QuizSession::progress)
    }

    //
    // ─── LIFECYCLE ─────────────────────────────────────────────────────────────
    //

    /// Resume the stored session when it was started with the same mode and chapter,
    /// otherwise draw a fresh one and store it as the active session.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Empty` if no question matches; nothing is stored in that
    /// case. Returns `SessionError::Storage` on repository failures, leaving the engine
    /// uninitialized.
    pub async fn start(
        &mut self,
        mode: SessionMode,
        chapter: Option<&str>,
    ) -> Result<StartOutcome, SessionError> {
        self.state = EngineState::Loading;

        let stored = match self.sessions.get_active_session().await {
            Ok(stored) => stored,
            Err(err) => {
                self.state = EngineState::Uninitialized;
                return Err(err.into());
            }
        };
        let start = match stored {
            Some(s) if s.matches(mode, chapter) => SessionStart::Resume(s),
            Some(s) => {
                warn!(
                    stored_mode = %s.mode(),
                    stored_chapter = s.chapter().unwrap_or_default(),
                    "replacing stale session"
                );
                SessionStart::Fresh
            }
            None => SessionStart::Fresh,
        };

        let result = match start {
            SessionStart::Resume(snapshot) => match self.resume(&snapshot).await {
                Err(SessionError::Stale | SessionError::Empty) => {
                    warn!(%mode, "stored session refers to missing questions, starting fresh");
                    self.fresh(mode, chapter).await
                }
                other => other,
            },
            SessionStart::Fresh => self.fresh(mode, chapter).await,
        };

        if result.is_err() && matches!(self.state, EngineState::Loading) {
            self.state = EngineState::Uninitialized;
        }
        result
    }

    async fn resume(&mut self, snapshot: &ActiveSession) -> Result<StartOutcome, SessionError> {
        let found = self
            .questions
            .bulk_get_questions(snapshot.question_ids())
            .await?;
        let Some(questions) = found.into_iter().collect::<Option<Vec<Question>>>() else {
            return Err(SessionError::Stale);
        };
        let session = QuizSession::resume(snapshot, questions)?;
        info!(
            mode = %session.mode(),
            chapter = session.chapter().unwrap_or_default(),
            position = session.current_idx(),
            answered = session.answered_count(),
            "session resumed"
        );
        self.state = EngineState::Active(session);
        Ok(StartOutcome::Resumed)
    }

    async fn fresh(
        &mut self,
        mode: SessionMode,
        chapter: Option<&str>,
    ) -> Result<StartOutcome, SessionError> {
        let pool = match chapter {
            Some(chapter) => self.questions.questions_in_chapter(chapter).await?,
            None => self.questions.list_questions().await?,
        };
        let plan = SessionBuilder::new(self.shuffle.as_ref())
            .with_size(self.session_size)
            .build(pool);
        let pool_size = plan.pool_size;
        let session = QuizSession::new(
            mode,
            chapter.map(str::to_owned),
            plan.questions,
            self.clock.now(),
        )?;
        let snapshot = session.snapshot()?;
        self.sessions.put_active_session(&snapshot).await?;
        info!(
            %mode,
            chapter = chapter.unwrap_or_default(),
            questions = session.len(),
            pool_size,
            "session started"
        );
        self.state = EngineState::Active(session);
        Ok(StartOutcome::Fresh)
    }

    /// Score the session, append the attempt and clear the active-session record in one
    /// storage operation. Unanswered questions count as wrong.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::NotActive` outside the active phase. On a storage failure
    /// the engine stays active so the call can be retried.
    pub async fn finish(&mut self) -> Result<Attempt, SessionError> {
        let attempt = self.active()?.grade(self.clock.now())?;
        let id = self.persistence.complete_session(&attempt).await?;
        let attempt = attempt.with_id(id);
        info!(
            attempt_id = %id,
            mode = %attempt.mode(),
            chapter = attempt.chapter(),
            score = attempt.score(),
            total = attempt.total(),
            "session finished"
        );

        let session = match std::mem::replace(&mut self.state, EngineState::Loading) {
            EngineState::Active(session) => session,
            other => {
                self.state = other;
                return Err(SessionError::NotActive);
            }
        };
        self.state = EngineState::Complete {
            session,
            attempt: attempt.clone(),
        };
        Ok(attempt)
    }

    /// Replay the finished session from the first question with every answer cleared.
    /// The replay becomes the stored active session.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::NotComplete` unless the session has been finished.
    pub async fn review_again(&mut self) -> Result<(), SessionError> {
        let mut session = match std::mem::replace(&mut self.state, EngineState::Loading) {
            EngineState::Complete { session, .. } => session,
            other => {
                self.state = other;
                return Err(SessionError::NotComplete);
            }
        };
        session.reset(self.clock.now());
        info!(mode = %session.mode(), questions = session.len(), "reviewing session again");
        self.state = EngineState::Active(session);
        self.persist().await
    }

    //
    // ─── ACTIVE SESSION EVENTS ─────────────────────────────────────────────────
    //

    /// Advance to the following question and persist the position.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::AtLastQuestion` without changing anything when already on
    /// the last question.
    pub async fn next(&mut self) -> Result<usize, SessionError> {
        let idx = self.active_mut()?.next()?;
        debug!(position = idx, "moved to next question");
        self.persist().await?;
        Ok(idx)
    }

    /// Step back to the preceding question and persist the position.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::AtFirstQuestion` without changing anything when already on
    /// the first question.
    pub async fn previous(&mut self) -> Result<usize, SessionError> {
        let idx = self.active_mut()?.previous()?;
        debug!(position = idx, "moved to previous question");
        self.persist().await?;
        Ok(idx)
    }

    /// Record an answer for the current question. Never moves the position.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::InvalidOption` if the option does not exist.
    pub async fn select_answer(&mut self, option: u32) -> Result<AnswerOutcome, SessionError> {
        let session = self.active_mut()?;
        let position = session.current_idx();
        let outcome = session.select_answer(option)?;
        if outcome.changed() {
            debug!(position, option, "answer recorded");
            self.persist().await?;
        }
        Ok(outcome)
    }

    /// Flip the bookmark of the current question. Returns the new membership.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::NotActive` when no session is loaded.
    pub async fn toggle_bookmark(&mut self) -> Result<bool, SessionError> {
        let question_id = self.current_question_id()?;
        Ok(self.bookmarks.toggle(question_id).await?)
    }

    /// Whether the current question is bookmarked.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::NotActive` when no session is loaded.
    pub async fn current_is_bookmarked(&self) -> Result<bool, SessionError> {
        let question_id = self.current_question_id()?;
        Ok(self.bookmarks.is_bookmarked(question_id).await?)
    }

    /// Write the in-memory session to storage again, e.g. after a failed persist.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::NotActive` outside the active phase.
    pub async fn sync(&self) -> Result<(), SessionError> {
        self.persist().await
    }

    //
    // ─── HELPERS ───────────────────────────────────────────────────────────────
    //

    fn active(&self) -> Result<&QuizSession, SessionError> {
        match &self.state {
            EngineState::Active(session) => Ok(session),
            _ => Err(SessionError::NotActive),
        }
    }

    fn active_mut(&mut self) -> Result<&mut QuizSession, SessionError> {
        match &mut self.state {
            EngineState::Active(session) => Ok(session),
            _ => Err(SessionError::NotActive),
        }
    }

    fn current_question_id(&self) -> Result<QuestionId, SessionError> {
        self.session()
            .and_then(QuizSession::current_question)
            .map(Question::id)
            .ok_or(SessionError::NotActive)
    }

    async fn persist(&self) -> Result<(), SessionError> {
        let snapshot = self.active()?.snapshot()?;
        self.sessions.put_active_session(&snapshot).await?;
        Ok(())
    }
}
