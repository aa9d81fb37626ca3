mod ids;
mod question;
mod recommendation;
mod score;
mod session;
mod settings;

pub use ids::{ParseIdError, QuestionId, SessionId, UserId};
pub use question::{Difficulty, Domain, Question, QuestionDraft, QuestionError, score_answer};
pub use recommendation::{
    Recommendation, RecommendationError, RecommendationResult, StudyEstimate,
};
pub use score::{
    GAP_THRESHOLD, REVIEW_THRESHOLD, ScoreError, ScoreRecord, SessionResult, aggregate_scores,
};
pub use session::{AnswerRecord, QuizLimits, QuizMode, QuizSession, SessionStateError};
pub use settings::{AdviceProviderKind, AdviceSettings, AdviceSettingsDraft, SettingsError};
