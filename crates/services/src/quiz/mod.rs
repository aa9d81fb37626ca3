mod progress;
mod service;
mod workflow;

// Public API of the quiz subsystem.
pub use crate::error::QuizError;
pub use progress::QuizProgress;
pub use service::{ActiveQuiz, AnswerFeedback};
pub use workflow::QuizLoopService;
