use thiserror::Error;

use crate::model::{
    ParseIdError, QuestionError, RecommendationError, ScoreError, SessionStateError,
    SettingsError,
};

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    #[error(transparent)]
    Question(#[from] QuestionError),
    #[error(transparent)]
    SessionState(#[from] SessionStateError),
    #[error(transparent)]
    Score(#[from] ScoreError),
    #[error(transparent)]
    Recommendation(#[from] RecommendationError),
    #[error(transparent)]
    Settings(#[from] SettingsError),
    #[error(transparent)]
    Id(#[from] ParseIdError),
}
