use std::sync::Arc;

use quiz_core::model::{
    Question, QuizLimits, QuizMode, QuizSession, SessionId, SessionResult, UserId,
};
use quiz_core::selector::QuestionSelector;
use rand::SeedableRng;
use rand::rngs::StdRng;
use storage::question_bank::QuestionBank;
use storage::repository::{SessionRepository, StorageError};

use super::service::{ActiveQuiz, AnswerFeedback};
use crate::Clock;
use crate::error::QuizError;

/// Orchestrates quiz start, answering, and persisted finalization.
#[derive(Clone)]
pub struct QuizLoopService {
    clock: Clock,
    bank: Arc<QuestionBank>,
    limits: QuizLimits,
    selector: QuestionSelector,
    sessions: Arc<dyn SessionRepository>,
}

impl QuizLoopService {
    #[must_use]
    pub fn new(
        clock: Clock,
        bank: Arc<QuestionBank>,
        limits: QuizLimits,
        sessions: Arc<dyn SessionRepository>,
    ) -> Self {
        Self {
            clock,
            bank,
            limits,
            selector: QuestionSelector::new(),
            sessions,
        }
    }

    #[must_use]
    pub fn bank(&self) -> &QuestionBank {
        &self.bank
    }

    #[must_use]
    pub fn limits(&self) -> QuizLimits {
        self.limits
    }

    /// Start a quiz seeded from the operating system.
    ///
    /// # Errors
    ///
    /// Returns `QuizError` if the mode has no questions.
    pub fn start_quiz(&self, user_id: UserId, mode: QuizMode) -> Result<ActiveQuiz, QuizError> {
        self.start_quiz_with_rng(user_id, mode, StdRng::from_os_rng())
    }

    /// Start a quiz with an explicit random source, for reproducible runs.
    ///
    /// # Errors
    ///
    /// Returns `QuizError` if the mode has no questions.
    pub fn start_quiz_with_rng(
        &self,
        user_id: UserId,
        mode: QuizMode,
        rng: StdRng,
    ) -> Result<ActiveQuiz, QuizError> {
        let limit = self.limits.for_mode(mode);
        let session = QuizSession::start(
            SessionId::generate(),
            user_id,
            mode,
            limit,
            self.clock.now(),
        )?;
        tracing::info!(
            session_id = %session.id(),
            user_id = %session.user_id(),
            mode = %mode,
            limit,
            pool = self.bank.pool(mode).len(),
            "quiz started"
        );
        ActiveQuiz::new(Arc::clone(&self.bank), session, self.selector, rng)
    }

    /// Serve the next question, timestamped with the service clock.
    pub fn next_question<'q>(&self, quiz: &'q mut ActiveQuiz) -> Option<&'q Question> {
        quiz.next_question(self.clock.now())
    }

    /// Score and record an answer to the current question.
    ///
    /// # Errors
    ///
    /// Returns `QuizError` if no question is pending, the option is unknown,
    /// or the session rejects the answer.
    pub fn answer_current(
        &self,
        quiz: &mut ActiveQuiz,
        answer: &str,
    ) -> Result<AnswerFeedback, QuizError> {
        quiz.submit_answer(answer, self.clock.now())
    }

    /// Finalize the quiz and persist it.
    ///
    /// If persistence fails the finalized result stays on `quiz`; call
    /// `persist_result` to retry.
    ///
    /// # Errors
    ///
    /// Returns `QuizError::Storage` when the write fails.
    pub async fn finish(&self, quiz: &mut ActiveQuiz) -> Result<SessionResult, QuizError> {
        quiz.finalize(self.clock.now())?;
        self.persist_result(quiz).await
    }

    /// Persist a finalized quiz. Safe to call repeatedly.
    ///
    /// # Errors
    ///
    /// Returns `QuizError::NotFinished` if the quiz was never finalized and
    /// `QuizError::Storage` if the write fails.
    pub async fn persist_result(&self, quiz: &mut ActiveQuiz) -> Result<SessionResult, QuizError> {
        let result = quiz.result().cloned().ok_or(QuizError::NotFinished)?;
        if quiz.is_persisted() {
            return Ok(result);
        }

        match self.sessions.append_session(quiz.session()).await {
            Ok(()) => {
                quiz.mark_persisted();
                Ok(result)
            }
            Err(StorageError::Conflict) => {
                // Session ids are generated per attempt, so a conflict means an
                // earlier write of this very session landed.
                tracing::debug!(session_id = %result.session_id(), "session already stored");
                quiz.mark_persisted();
                Ok(result)
            }
            Err(e) => {
                tracing::warn!(
                    session_id = %result.session_id(),
                    error = %e,
                    "failed to persist quiz; result kept in memory"
                );
                Err(e.into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use quiz_core::model::{Difficulty, Domain, QuestionDraft, QuestionId};
    use quiz_core::time::fixed_now;
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicU32, Ordering};
    use storage::repository::InMemoryRepository;

    fn bank() -> Arc<QuestionBank> {
        let questions = (1..=4)
            .map(|id| {
                QuestionDraft {
                    id: QuestionId::new(id),
                    domain: Domain::new(if id % 2 == 0 { "gans" } else { "pytorch" }).unwrap(),
                    difficulty: Difficulty::Intermediate,
                    prompt: format!("Q{id}"),
                    options: BTreeMap::from([
                        ("a".into(), "yes".into()),
                        ("b".into(), "no".into()),
                    ]),
                    correct_answer: "a".into(),
                    explanation: Some("because".into()),
                }
                .validate()
                .unwrap()
            })
            .collect();
        Arc::new(QuestionBank::new(questions, vec![QuestionId::new(1), QuestionId::new(2)]).unwrap())
    }

    /// Fails the first `failures` appends, then delegates to memory.
    struct FlakyRepo {
        inner: InMemoryRepository,
        failures: AtomicU32,
    }

    #[async_trait]
    impl SessionRepository for FlakyRepo {
        async fn append_session(&self, session: &QuizSession) -> Result<(), StorageError> {
            if self
                .failures
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
            {
                return Err(StorageError::Connection("database is locked".into()));
            }
            self.inner.append_session(session).await
        }

        async fn get_session(&self, id: SessionId) -> Result<QuizSession, StorageError> {
            self.inner.get_session(id).await
        }

        async fn get_result(&self, id: SessionId) -> Result<SessionResult, StorageError> {
            self.inner.get_result(id).await
        }

        async fn list_history(
            &self,
            user_id: &UserId,
            limit: u32,
        ) -> Result<Vec<SessionResult>, StorageError> {
            self.inner.list_history(user_id, limit).await
        }
    }

    #[tokio::test]
    async fn quick_mode_uses_demo_pool_and_persists() {
        let repo = InMemoryRepository::new();
        let service = QuizLoopService::new(
            Clock::fixed(fixed_now()),
            bank(),
            QuizLimits::new(10, 63).unwrap(),
            Arc::new(repo.clone()),
        );

        let mut quiz = service
            .start_quiz_with_rng(UserId::new("u").unwrap(), QuizMode::Quick, StdRng::seed_from_u64(3))
            .unwrap();
        while service.next_question(&mut quiz).is_some() {
            service.answer_current(&mut quiz, "a").unwrap();
        }
        let result = service.finish(&mut quiz).await.unwrap();

        assert_eq!(result.total_questions(), 2);
        assert!(quiz.is_persisted());
        let stored = repo.get_result(result.session_id()).await.unwrap();
        assert_eq!(stored, result);
    }

    #[tokio::test]
    async fn failed_persist_keeps_result_and_retries() {
        let repo = Arc::new(FlakyRepo {
            inner: InMemoryRepository::new(),
            failures: AtomicU32::new(1),
        });
        let service = QuizLoopService::new(
            Clock::fixed(fixed_now()),
            bank(),
            QuizLimits::default(),
            repo.clone(),
        );

        let mut quiz = service
            .start_quiz_with_rng(UserId::new("u").unwrap(), QuizMode::Full, StdRng::seed_from_u64(5))
            .unwrap();
        while service.next_question(&mut quiz).is_some() {
            service.answer_current(&mut quiz, "b").unwrap();
        }

        let err = service.finish(&mut quiz).await.unwrap_err();
        assert!(matches!(err, QuizError::Storage(StorageError::Connection(_))));
        assert!(!quiz.is_persisted());
        assert_eq!(quiz.result().unwrap().total_questions(), 4);

        let result = service.persist_result(&mut quiz).await.unwrap();
        assert!(quiz.is_persisted());
        // Second call is a no-op.
        let again = service.persist_result(&mut quiz).await.unwrap();
        assert_eq!(result, again);
        let history = repo
            .list_history(&UserId::new("u").unwrap(), 10)
            .await
            .unwrap();
        assert_eq!(history.len(), 1);
    }

    #[tokio::test]
    async fn persisting_an_unfinished_quiz_is_rejected() {
        let service = QuizLoopService::new(
            Clock::fixed(fixed_now()),
            bank(),
            QuizLimits::default(),
            Arc::new(InMemoryRepository::new()),
        );
        let mut quiz = service
            .start_quiz(UserId::new("u").unwrap(), QuizMode::Full)
            .unwrap();
        let err = service.persist_result(&mut quiz).await.unwrap_err();
        assert!(matches!(err, QuizError::NotFinished));
    }
}
