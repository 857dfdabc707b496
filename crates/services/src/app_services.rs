use std::sync::Arc;

use storage::repository::Storage;

use crate::Clock;
use crate::bank::QuestionBank;
use crate::bookmarks::BookmarkService;
use crate::error::AppServicesError;
use crate::history::HistoryService;
use crate::sessions::{DEFAULT_SESSION_SIZE, SessionEngine, ShuffleSource, ThreadRngShuffle};
use crate::vault::VaultService;

/// Assembles app-facing services over one storage backend.
#[derive(Clone)]
pub struct AppServices {
    clock: Clock,
    storage: Storage,
    session_size: usize,
    shuffle: Arc<dyn ShuffleSource>,
    bank: QuestionBank,
    bookmarks: BookmarkService,
    history: HistoryService,
    vault: VaultService,
    seeded: usize,
}

impl AppServices {
    /// Build services backed by `SQLite` storage, seeding an empty bank.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if storage initialization or seeding fails.
    pub async fn new_sqlite(db_url: &str, clock: Clock) -> Result<Self, AppServicesError> {
        let storage = Storage::sqlite(db_url).await?;
        Self::from_storage(storage, clock).await
    }

    /// Build services over an existing storage, seeding an empty bank.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError::Bank` if seeding fails.
    pub async fn from_storage(storage: Storage, clock: Clock) -> Result<Self, AppServicesError> {
        let bank = QuestionBank::new(Arc::clone(&storage.questions));
        let seeded = bank.seed_if_empty().await?;

        let bookmarks = BookmarkService::new(
            clock,
            Arc::clone(&storage.bookmarks),
            Arc::clone(&storage.questions),
        );
        let history = HistoryService::new(
            Arc::clone(&storage.attempts),
            Arc::clone(&storage.sessions),
            bank.clone(),
        );
        let vault = VaultService::new(clock, Arc::clone(&storage.questions));

        Ok(Self {
            clock,
            storage,
            session_size: DEFAULT_SESSION_SIZE,
            shuffle: Arc::new(ThreadRngShuffle),
            bank,
            bookmarks,
            history,
            vault,
            seeded,
        })
    }

    #[must_use]
    pub fn with_session_size(mut self, size: usize) -> Self {
        self.session_size = size;
        self
    }

    #[must_use]
    pub fn with_shuffle(mut self, shuffle: Arc<dyn ShuffleSource>) -> Self {
        self.shuffle = shuffle;
        self
    }

    /// Questions inserted by the seeding step of bootstrap.
    #[must_use]
    pub fn seeded(&self) -> usize {
        self.seeded
    }

    /// A new engine sharing this storage. Only one should drive the active session.
    #[must_use]
    pub fn session_engine(&self) -> SessionEngine {
        SessionEngine::from_storage(self.clock, &self.storage)
            .with_shuffle(Arc::clone(&self.shuffle))
            .with_session_size(self.session_size)
    }

    #[must_use]
    pub fn bank(&self) -> &QuestionBank {
        &self.bank
    }

    #[must_use]
    pub fn bookmarks(&self) -> &BookmarkService {
        &self.bookmarks
    }

    #[must_use]
    pub fn history(&self) -> &HistoryService {
        &self.history
    }

    #[must_use]
    pub fn vault(&self) -> &VaultService {
        &self.vault
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quiz_core::model::SessionMode;
    use quiz_core::time::fixed_clock;

    use crate::sessions::{IdentityShuffle, SessionPhase};

    #[tokio::test]
    async fn bootstrap_seeds_once_and_wires_engine() {
        let storage = Storage::in_memory();
        let services = AppServices::from_storage(storage.clone(), fixed_clock())
            .await
            .unwrap()
            .with_shuffle(Arc::new(IdentityShuffle))
            .with_session_size(2);
        assert_eq!(services.seeded(), 3);

        let again = AppServices::from_storage(storage, fixed_clock()).await.unwrap();
        assert_eq!(again.seeded(), 0);

        let mut engine = services.session_engine();
        assert_eq!(engine.session_size(), 2);
        engine.start(SessionMode::Practice, None).await.unwrap();
        assert_eq!(engine.phase(), SessionPhase::Active);
        assert_eq!(engine.session().unwrap().len(), 2);
    }
}
