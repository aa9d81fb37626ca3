#![forbid(unsafe_code)]

pub mod advice;
pub mod app_services;
pub mod error;
pub mod history_service;
pub mod quiz;
pub mod recommend;

pub use quiz_core::Clock;

pub use advice::{AdviceProvider, OllamaAdvisor, OpenAiAdvisor, build_provider};
pub use app_services::{AppConfig, AppServices};
pub use error::{AdviceError, AppServicesError, QuizError, RecommendError};
pub use history_service::HistoryService;
pub use quiz::{ActiveQuiz, AnswerFeedback, QuizLoopService, QuizProgress};
pub use recommend::{RecommendationEngine, RecommendationService};
