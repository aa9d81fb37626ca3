//! Shared error types for the services crate.

use thiserror::Error;

use quiz_core::model::{QuestionId, RecommendationError, ScoreError, SessionStateError};
use storage::question_bank::QuestionBankError;
use storage::repository::StorageError;
use storage::sqlite::SqliteInitError;

/// Errors emitted by advice providers.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AdviceError {
    #[error("advice provider returned an empty response")]
    EmptyResponse,
    #[error("advice request failed with status {0}")]
    HttpStatus(reqwest::StatusCode),
    #[error("advice request timed out after {0}s")]
    Timeout(u64),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

/// Errors emitted by the quiz loop.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum QuizError {
    #[error("no questions available for this quiz")]
    Empty,
    #[error("no question is waiting for an answer")]
    NoCurrentQuestion,
    #[error("'{answer}' is not an option of question {question_id}")]
    UnknownOption {
        question_id: QuestionId,
        answer: String,
    },
    #[error("quiz is not finished yet")]
    NotFinished,
    #[error(transparent)]
    Session(#[from] SessionStateError),
    #[error(transparent)]
    Score(#[from] ScoreError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted while producing or storing recommendations.
///
/// Advice failures never show up here; they degrade to rule-based text.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum RecommendError {
    #[error(transparent)]
    Recommendation(#[from] RecommendationError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted while bootstrapping app services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppServicesError {
    #[error(transparent)]
    QuestionBank(#[from] QuestionBankError),
    #[error(transparent)]
    Sqlite(#[from] SqliteInitError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}
