use async_trait::async_trait;
use quiz_core::model::{
    QuizSession, RecommendationResult, SessionId, SessionResult, UserId,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("conflict")]
    Conflict,

    #[error("invalid record: {0}")]
    Invalid(String),

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Append-only history of finalized sessions.
#[async_trait]
pub trait SessionRepository: Send + Sync {
    /// Persist a finalized session together with its answers and score records.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Invalid` if the session is still open,
    /// `StorageError::Conflict` if the session id was already stored.
    async fn append_session(&self, session: &QuizSession) -> Result<(), StorageError>;

    /// Fetch a full session including its answers.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if missing, or other storage errors.
    async fn get_session(&self, id: SessionId) -> Result<QuizSession, StorageError>;

    /// Fetch the per-domain result of a stored session.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if missing, or other storage errors.
    async fn get_result(&self, id: SessionId) -> Result<SessionResult, StorageError>;

    /// Results for a user, newest first.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn list_history(
        &self,
        user_id: &UserId,
        limit: u32,
    ) -> Result<Vec<SessionResult>, StorageError>;
}

/// Derived recommendations, replaced wholesale per session.
#[async_trait]
pub trait RecommendationRepository: Send + Sync {
    /// Store recommendations for a session, replacing any previous set.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the session was never stored.
    async fn replace_recommendations(
        &self,
        result: &RecommendationResult,
    ) -> Result<(), StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn get_recommendations(
        &self,
        session_id: SessionId,
    ) -> Result<Option<RecommendationResult>, StorageError>;
}

pub(crate) fn result_of(session: &QuizSession) -> Result<SessionResult, StorageError> {
    SessionResult::from_session(session).map_err(|e| StorageError::Invalid(e.to_string()))
}

/// Simple in-memory repository implementation for testing and prototyping.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    sessions: Arc<Mutex<Vec<QuizSession>>>,
    recommendations: Arc<Mutex<HashMap<SessionId, RecommendationResult>>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned<E: std::fmt::Display>(e: E) -> StorageError {
    StorageError::Connection(e.to_string())
}

#[async_trait]
impl SessionRepository for InMemoryRepository {
    async fn append_session(&self, session: &QuizSession) -> Result<(), StorageError> {
        result_of(session)?;
        let mut guard = self.sessions.lock().map_err(poisoned)?;
        if guard.iter().any(|s| s.id() == session.id()) {
            return Err(StorageError::Conflict);
        }
        guard.push(session.clone());
        Ok(())
    }

    async fn get_session(&self, id: SessionId) -> Result<QuizSession, StorageError> {
        let guard = self.sessions.lock().map_err(poisoned)?;
        guard
            .iter()
            .find(|s| s.id() == id)
            .cloned()
            .ok_or(StorageError::NotFound)
    }

    async fn get_result(&self, id: SessionId) -> Result<SessionResult, StorageError> {
        let session = self.get_session(id).await?;
        result_of(&session)
    }

    async fn list_history(
        &self,
        user_id: &UserId,
        limit: u32,
    ) -> Result<Vec<SessionResult>, StorageError> {
        let guard = self.sessions.lock().map_err(poisoned)?;
        // Newest insert first, then a stable sort keeps that order among equal timestamps.
        let mut mine: Vec<&QuizSession> = guard
            .iter()
            .rev()
            .filter(|s| s.user_id() == user_id)
            .collect();
        mine.sort_by(|a, b| b.completed_at().cmp(&a.completed_at()));

        let limit = usize::try_from(limit).unwrap_or(usize::MAX);
        mine.into_iter().take(limit).map(result_of).collect()
    }
}

#[async_trait]
impl RecommendationRepository for InMemoryRepository {
    async fn replace_recommendations(
        &self,
        result: &RecommendationResult,
    ) -> Result<(), StorageError> {
        {
            let sessions = self.sessions.lock().map_err(poisoned)?;
            if !sessions.iter().any(|s| s.id() == result.session_id()) {
                return Err(StorageError::NotFound);
            }
        }
        let mut guard = self.recommendations.lock().map_err(poisoned)?;
        guard.insert(result.session_id(), result.clone());
        Ok(())
    }

    async fn get_recommendations(
        &self,
        session_id: SessionId,
    ) -> Result<Option<RecommendationResult>, StorageError> {
        let guard = self.recommendations.lock().map_err(poisoned)?;
        Ok(guard.get(&session_id).cloned())
    }
}

/// Repository handles behind trait objects, passed explicitly to services.
#[derive(Clone)]
pub struct Storage {
    pub sessions: Arc<dyn SessionRepository>,
    pub recommendations: Arc<dyn RecommendationRepository>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        let repo = InMemoryRepository::new();
        let sessions: Arc<dyn SessionRepository> = Arc::new(repo.clone());
        let recommendations: Arc<dyn RecommendationRepository> = Arc::new(repo);
        Self {
            sessions,
            recommendations,
        }
    }
}
