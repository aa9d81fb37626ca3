use std::sync::Arc;

use quiz_core::model::{RecommendationResult, SessionId, SessionResult};
use storage::repository::{RecommendationRepository, SessionRepository};

use super::engine::RecommendationEngine;
use crate::error::RecommendError;

/// Feeds the engine with stored history and keeps its output.
#[derive(Clone)]
pub struct RecommendationService {
    engine: RecommendationEngine,
    sessions: Arc<dyn SessionRepository>,
    recommendations: Arc<dyn RecommendationRepository>,
    history_window: u32,
}

impl RecommendationService {
    pub const DEFAULT_HISTORY_WINDOW: u32 = 20;

    #[must_use]
    pub fn new(
        engine: RecommendationEngine,
        sessions: Arc<dyn SessionRepository>,
        recommendations: Arc<dyn RecommendationRepository>,
    ) -> Self {
        Self {
            engine,
            sessions,
            recommendations,
            history_window: Self::DEFAULT_HISTORY_WINDOW,
        }
    }

    #[must_use]
    pub fn engine(&self) -> &RecommendationEngine {
        &self.engine
    }

    /// Rank the finalized `result` against the learner's stored history.
    ///
    /// An unreadable history only costs the trend lines; it is logged and
    /// the ranking proceeds without it.
    ///
    /// # Errors
    ///
    /// Returns `RecommendError` if the ranked items are malformed.
    pub async fn generate(
        &self,
        result: &SessionResult,
    ) -> Result<RecommendationResult, RecommendError> {
        let history = match self
            .sessions
            .list_history(result.user_id(), self.history_window)
            .await
        {
            Ok(history) => history,
            Err(e) => {
                tracing::warn!(
                    user_id = %result.user_id(),
                    error = %e,
                    "history unavailable, ranking without trends"
                );
                Vec::new()
            }
        };
        self.engine.recommend(result, &history).await
    }

    /// Store recommendations, replacing any earlier set for the session.
    ///
    /// # Errors
    ///
    /// Returns `RecommendError::Storage` if the write fails or the session
    /// was never stored.
    pub async fn save(&self, recommendations: &RecommendationResult) -> Result<(), RecommendError> {
        self.recommendations
            .replace_recommendations(recommendations)
            .await?;
        Ok(())
    }

    /// Generate then save; the generated set is returned even when saving fails.
    ///
    /// # Errors
    ///
    /// Returns `RecommendError` from generation. A failed save is logged and
    /// reported through the second tuple element.
    pub async fn generate_and_save(
        &self,
        result: &SessionResult,
    ) -> Result<(RecommendationResult, Option<RecommendError>), RecommendError> {
        let recommendations = self.generate(result).await?;
        let save_error = match self.save(&recommendations).await {
            Ok(()) => None,
            Err(e) => {
                tracing::warn!(
                    session_id = %result.session_id(),
                    error = %e,
                    "failed to store recommendations"
                );
                Some(e)
            }
        };
        Ok((recommendations, save_error))
    }

    /// # Errors
    ///
    /// Returns `RecommendError::Storage` on repository failures.
    pub async fn stored(
        &self,
        session_id: SessionId,
    ) -> Result<Option<RecommendationResult>, RecommendError> {
        Ok(self.recommendations.get_recommendations(session_id).await?)
    }
}
