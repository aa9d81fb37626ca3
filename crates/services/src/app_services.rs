use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use quiz_core::model::{AdviceSettings, QuizLimits};
use storage::question_bank::QuestionBank;
use storage::repository::Storage;

use crate::Clock;
use crate::advice::build_provider;
use crate::error::AppServicesError;
use crate::history_service::HistoryService;
use crate::quiz::QuizLoopService;
use crate::recommend::{RecommendationEngine, RecommendationService};

/// Everything needed to wire the services at startup.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub db_url: String,
    pub questions_path: PathBuf,
    pub limits: QuizLimits,
    pub advice: AdviceSettings,
}

/// Assembles app-facing services over one question bank and one store.
#[derive(Clone)]
pub struct AppServices {
    bank: Arc<QuestionBank>,
    quiz_loop: Arc<QuizLoopService>,
    recommendations: Arc<RecommendationService>,
    history: Arc<HistoryService>,
}

impl AppServices {
    /// Build services backed by `SQLite` storage.
    ///
    /// The question bank is loaded first; a missing or malformed file fails
    /// startup before the database is touched.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if the bank cannot be loaded or storage
    /// initialization fails.
    pub async fn new_sqlite(config: &AppConfig, clock: Clock) -> Result<Self, AppServicesError> {
        let bank = Arc::new(QuestionBank::load(&config.questions_path)?);
        let storage = Storage::sqlite(&config.db_url).await?;
        Ok(Self::from_parts(
            bank,
            &storage,
            config.limits,
            &config.advice,
            clock,
        ))
    }

    /// Build services over in-memory storage.
    #[must_use]
    pub fn in_memory(
        bank: Arc<QuestionBank>,
        limits: QuizLimits,
        advice: &AdviceSettings,
        clock: Clock,
    ) -> Self {
        Self::from_parts(bank, &Storage::in_memory(), limits, advice, clock)
    }

    fn from_parts(
        bank: Arc<QuestionBank>,
        storage: &Storage,
        limits: QuizLimits,
        advice: &AdviceSettings,
        clock: Clock,
    ) -> Self {
        let quiz_loop = Arc::new(QuizLoopService::new(
            clock,
            Arc::clone(&bank),
            limits,
            Arc::clone(&storage.sessions),
        ));
        let engine = RecommendationEngine::new(clock).with_advisor(
            build_provider(advice),
            Duration::from_secs(advice.timeout_secs()),
        );
        let recommendations = Arc::new(RecommendationService::new(
            engine,
            Arc::clone(&storage.sessions),
            Arc::clone(&storage.recommendations),
        ));
        let history = Arc::new(HistoryService::new(Arc::clone(&storage.sessions)));

        Self {
            bank,
            quiz_loop,
            recommendations,
            history,
        }
    }

    #[must_use]
    pub fn bank(&self) -> Arc<QuestionBank> {
        Arc::clone(&self.bank)
    }

    #[must_use]
    pub fn quiz_loop(&self) -> Arc<QuizLoopService> {
        Arc::clone(&self.quiz_loop)
    }

    #[must_use]
    pub fn recommendations(&self) -> Arc<RecommendationService> {
        Arc::clone(&self.recommendations)
    }

    #[must_use]
    pub fn history(&self) -> Arc<HistoryService> {
        Arc::clone(&self.history)
    }
}
