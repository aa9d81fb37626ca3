use std::sync::Arc;

use quiz_core::model::{Difficulty, SessionId, SessionResult, UserId};
use storage::repository::{SessionRepository, StorageError};

use crate::recommend::{Progression, progression, suggest_next_difficulty};

/// Read side of past quiz attempts for one learner.
#[derive(Clone)]
pub struct HistoryService {
    sessions: Arc<dyn SessionRepository>,
}

impl HistoryService {
    #[must_use]
    pub fn new(sessions: Arc<dyn SessionRepository>) -> Self {
        Self { sessions }
    }

    /// Results for `user_id`, newest first.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on repository failures.
    pub async fn recent(
        &self,
        user_id: &UserId,
        limit: u32,
    ) -> Result<Vec<SessionResult>, StorageError> {
        self.sessions.list_history(user_id, limit).await
    }

    /// # Errors
    ///
    /// Returns `StorageError::NotFound` for an unknown session.
    pub async fn result(&self, session_id: SessionId) -> Result<SessionResult, StorageError> {
        self.sessions.get_result(session_id).await
    }

    /// Trend over the last `limit` sessions; `None` without history.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on repository failures.
    pub async fn progression(
        &self,
        user_id: &UserId,
        limit: u32,
    ) -> Result<Option<Progression>, StorageError> {
        let history = self.recent(user_id, limit).await?;
        Ok(progression(&history))
    }

    /// # Errors
    ///
    /// Returns `StorageError` on repository failures.
    pub async fn suggested_difficulty(&self, user_id: &UserId) -> Result<Difficulty, StorageError> {
        let history = self.recent(user_id, 3).await?;
        Ok(suggest_next_difficulty(&history))
    }
}
