use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use quiz_core::model::{
    AnswerRecord, Domain, Question, QuestionId, QuizSession, SessionResult, SessionStateError,
};
use quiz_core::selector::QuestionSelector;
use rand::rngs::StdRng;
use storage::question_bank::QuestionBank;

use super::progress::QuizProgress;
use crate::Clock;
use crate::error::QuizError;

//
// ─── ANSWER FEEDBACK ───────────────────────────────────────────────────────────
//

/// What the learner sees right after answering.
#[derive(Debug, Clone, PartialEq)]
pub struct AnswerFeedback {
    pub question_id: QuestionId,
    pub domain: Domain,
    pub correct: bool,
    pub correct_answer: String,
    pub correct_text: String,
    pub explanation: String,
    pub time_taken: Duration,
    pub progress: QuizProgress,
}

//
// ─── ACTIVE QUIZ ───────────────────────────────────────────────────────────────
//

/// In-memory quiz attempt.
///
/// Serves one question at a time from the mode's pool, scores answers into
/// the underlying `QuizSession`, and keeps the finalized result until it has
/// been persisted. Timestamps are passed in by the caller so the services
/// layer clock stays the single time source.
pub struct ActiveQuiz {
    bank: Arc<QuestionBank>,
    selector: QuestionSelector,
    rng: StdRng,
    session: QuizSession,
    current: Option<Question>,
    served_at: Option<DateTime<Utc>>,
    exhausted: bool,
    result: Option<SessionResult>,
    persisted: bool,
}

impl ActiveQuiz {
    /// Wrap a freshly started session.
    ///
    /// # Errors
    ///
    /// Returns `QuizError::Empty` if the bank has no questions for the
    /// session's mode.
    pub fn new(
        bank: Arc<QuestionBank>,
        session: QuizSession,
        selector: QuestionSelector,
        rng: StdRng,
    ) -> Result<Self, QuizError> {
        if bank.pool(session.mode()).is_empty() {
            return Err(QuizError::Empty);
        }
        Ok(Self {
            bank,
            selector,
            rng,
            session,
            current: None,
            served_at: None,
            exhausted: false,
            result: None,
            persisted: false,
        })
    }

    #[must_use]
    pub fn session(&self) -> &QuizSession {
        &self.session
    }

    #[must_use]
    pub fn current_question(&self) -> Option<&Question> {
        self.current.as_ref()
    }

    /// Finalized result, once `finalize` has run.
    #[must_use]
    pub fn result(&self) -> Option<&SessionResult> {
        self.result.as_ref()
    }

    #[must_use]
    pub fn is_persisted(&self) -> bool {
        self.persisted
    }

    pub(crate) fn mark_persisted(&mut self) {
        self.persisted = true;
    }

    /// True once no further question will be served.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.session.is_finalized()
            || (self.current.is_none() && (self.session.is_full() || self.exhausted))
    }

    #[must_use]
    pub fn progress(&self) -> QuizProgress {
        let limit = self.session.question_limit();
        let answered = self.session.answered_count();
        QuizProgress {
            limit,
            answered,
            correct: self.session.correct_count(),
            remaining: if self.exhausted {
                0
            } else {
                limit.saturating_sub(answered)
            },
            is_complete: self.is_finished(),
        }
    }

    /// Serve the next question, or the one still awaiting an answer.
    ///
    /// Returns `None` when the limit is reached or the pool has no unseen
    /// question left; the quiz then ends early instead of failing.
    pub fn next_question(&mut self, now: DateTime<Utc>) -> Option<&Question> {
        if self.session.is_finalized() {
            return None;
        }
        if self.current.is_some() {
            return self.current.as_ref();
        }
        if self.session.is_full() || self.exhausted {
            return None;
        }

        let pool = self.bank.pool(self.session.mode());
        let picked = self
            .selector
            .select(pool, self.session.answers(), &HashSet::new(), &mut self.rng)
            .cloned();

        match picked {
            Some(question) => {
                tracing::debug!(
                    session_id = %self.session.id(),
                    question_id = %question.id(),
                    domain = %question.domain(),
                    "question served"
                );
                self.current = Some(question);
                self.served_at = Some(now);
                self.current.as_ref()
            }
            None => {
                tracing::info!(
                    session_id = %self.session.id(),
                    answered = self.session.answered_count(),
                    "question pool exhausted, ending quiz early"
                );
                self.exhausted = true;
                None
            }
        }
    }

    /// Score `answer` against the served question and record it.
    ///
    /// # Errors
    ///
    /// Returns `QuizError::NoCurrentQuestion` if nothing was served,
    /// `QuizError::UnknownOption` if `answer` is not an option key (the
    /// question stays current), or `QuizError::Session` for state violations.
    pub fn submit_answer(
        &mut self,
        answer: &str,
        now: DateTime<Utc>,
    ) -> Result<AnswerFeedback, QuizError> {
        if self.session.is_finalized() {
            return Err(SessionStateError::Finalized.into());
        }
        let question = self.current.as_ref().ok_or(QuizError::NoCurrentQuestion)?;
        if !question.has_option(answer) {
            return Err(QuizError::UnknownOption {
                question_id: question.id(),
                answer: answer.trim().to_string(),
            });
        }

        let time_taken = self
            .served_at
            .map_or_else(Duration::zero, |served| Clock::fixed(now).elapsed_since(served));
        let record = AnswerRecord::score(question, answer, time_taken, now);
        let correct = record.correct;
        self.session.record(record)?;

        let question_id = question.id();
        let domain = question.domain().clone();
        let correct_answer = question.correct_answer().to_string();
        let correct_text = question
            .options()
            .get(&correct_answer)
            .cloned()
            .unwrap_or_default();
        let explanation = question.explanation().to_string();

        self.current = None;
        self.served_at = None;
        Ok(AnswerFeedback {
            question_id,
            domain,
            correct,
            correct_answer,
            correct_text,
            explanation,
            time_taken,
            progress: self.progress(),
        })
    }

    /// Close the session and compute its per-domain result.
    ///
    /// Calling it again returns the result computed the first time.
    ///
    /// # Errors
    ///
    /// Returns `QuizError::Session` if `now` precedes the session start.
    pub fn finalize(&mut self, now: DateTime<Utc>) -> Result<&SessionResult, QuizError> {
        if self.result.is_none() {
            self.session.finalize(now)?;
            self.current = None;
            self.served_at = None;
            let result = SessionResult::from_session(&self.session)?;
            tracing::info!(
                session_id = %result.session_id(),
                answered = result.total_questions(),
                correct = result.correct_answers(),
                "quiz finalized"
            );
            self.result = Some(result);
        }
        self.result.as_ref().ok_or(QuizError::NotFinished)
    }
}

impl fmt::Debug for ActiveQuiz {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActiveQuiz")
            .field("session_id", &self.session.id())
            .field("mode", &self.session.mode())
            .field("answered", &self.session.answered_count())
            .field("current", &self.current.as_ref().map(Question::id))
            .field("exhausted", &self.exhausted)
            .field("persisted", &self.persisted)
            .finish_non_exhaustive()
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use quiz_core::model::{Difficulty, QuestionDraft, QuizMode, SessionId, UserId};
    use quiz_core::time::fixed_now;
    use rand::SeedableRng;
    use std::collections::BTreeMap;

    fn question(id: u64, domain: &str) -> Question {
        QuestionDraft {
            id: QuestionId::new(id),
            domain: Domain::new(domain).unwrap(),
            difficulty: Difficulty::Beginner,
            prompt: format!("Question {id}?"),
            options: BTreeMap::from([
                ("a".into(), "right".into()),
                ("b".into(), "wrong".into()),
            ]),
            correct_answer: "a".into(),
            explanation: None,
        }
        .validate()
        .unwrap()
    }

    fn bank(questions: Vec<Question>) -> Arc<QuestionBank> {
        Arc::new(QuestionBank::new(questions, Vec::new()).unwrap())
    }

    fn quiz(bank: Arc<QuestionBank>, limit: u32) -> ActiveQuiz {
        let session = QuizSession::start(
            SessionId::generate(),
            UserId::new("tester").unwrap(),
            QuizMode::Full,
            limit,
            fixed_now(),
        )
        .unwrap();
        ActiveQuiz::new(
            bank,
            session,
            QuestionSelector::new(),
            StdRng::seed_from_u64(11),
        )
        .unwrap()
    }

    #[test]
    fn answer_count_never_exceeds_limit() {
        let questions = (1..=8).map(|id| question(id, "gans")).collect();
        let mut quiz = quiz(bank(questions), 3);

        let mut served = 0;
        while quiz.next_question(fixed_now()).is_some() {
            quiz.submit_answer("a", fixed_now()).unwrap();
            served += 1;
        }

        assert_eq!(served, 3);
        assert_eq!(quiz.session().answers().len(), 3);
        assert!(quiz.is_finished());
        assert_eq!(quiz.progress().remaining, 0);
    }

    #[test]
    fn exhausted_pool_ends_quiz_early() {
        let questions = (1..=2).map(|id| question(id, "pytorch")).collect();
        let mut quiz = quiz(bank(questions), 10);

        while quiz.next_question(fixed_now()).is_some() {
            quiz.submit_answer("b", fixed_now()).unwrap();
        }

        assert!(quiz.is_finished());
        let result = quiz.finalize(fixed_now()).unwrap();
        assert_eq!(result.total_questions(), 2);
        assert_eq!(result.correct_answers(), 0);
    }

    #[test]
    fn served_question_is_repeated_until_answered() {
        let questions = (1..=5).map(|id| question(id, "gans")).collect();
        let mut quiz = quiz(bank(questions), 5);

        let first = quiz.next_question(fixed_now()).map(Question::id);
        let again = quiz.next_question(fixed_now()).map(Question::id);
        assert_eq!(first, again);
    }

    #[test]
    fn unknown_option_keeps_question_current() {
        let mut quiz = quiz(bank(vec![question(1, "gans"), question(2, "gans")]), 2);
        let served = quiz.next_question(fixed_now()).map(Question::id).unwrap();

        let err = quiz.submit_answer("z", fixed_now()).unwrap_err();
        assert!(matches!(err, QuizError::UnknownOption { .. }));
        assert_eq!(quiz.current_question().map(Question::id), Some(served));
        assert!(quiz.session().answers().is_empty());
    }

    #[test]
    fn answer_without_question_is_rejected() {
        let mut quiz = quiz(bank(vec![question(1, "gans")]), 1);
        let err = quiz.submit_answer("a", fixed_now()).unwrap_err();
        assert!(matches!(err, QuizError::NoCurrentQuestion));
    }

    #[test]
    fn feedback_reports_time_and_explanation() {
        let mut quiz = quiz(bank(vec![question(1, "gans")]), 1);
        quiz.next_question(fixed_now()).unwrap();

        let feedback = quiz
            .submit_answer(" A ", fixed_now() + Duration::seconds(7))
            .unwrap();
        assert!(feedback.correct);
        assert_eq!(feedback.correct_answer, "a");
        assert_eq!(feedback.correct_text, "right");
        assert!(feedback.explanation.contains("right"));
        assert_eq!(feedback.time_taken, Duration::seconds(7));
        assert_eq!(feedback.progress.answered, 1);
        assert!(feedback.progress.is_complete);
    }

    #[test]
    fn clock_stepping_back_reports_zero_time() {
        let mut quiz = quiz(bank(vec![question(1, "gans")]), 1);
        quiz.next_question(fixed_now()).unwrap();

        let feedback = quiz
            .submit_answer("a", fixed_now() - Duration::seconds(5))
            .unwrap();
        assert_eq!(feedback.time_taken, Duration::zero());
    }

    #[test]
    fn scenario_three_of_five_and_two_of_five() {
        let mut questions: Vec<Question> = (1..=5).map(|id| question(id, "domain_a")).collect();
        questions.extend((6..=10).map(|id| question(id, "domain_b")));
        let mut quiz = quiz(bank(questions), 10);

        let (mut a_right, mut b_right) = (0, 0);
        while let Some(q) = quiz.next_question(fixed_now()) {
            let answer = if q.domain().as_str() == "domain_a" && a_right < 3 {
                a_right += 1;
                "a"
            } else if q.domain().as_str() == "domain_b" && b_right < 2 {
                b_right += 1;
                "a"
            } else {
                "b"
            };
            quiz.submit_answer(answer, fixed_now()).unwrap();
        }

        let result = quiz.finalize(fixed_now()).unwrap();
        let pct = |d: &str| {
            result
                .record_for(&Domain::new(d).unwrap())
                .unwrap()
                .percentage()
        };
        assert!((pct("domain_a") - 60.0).abs() < 1e-9);
        assert!((pct("domain_b") - 40.0).abs() < 1e-9);
    }

    #[test]
    fn finalize_is_stable_and_closes_session() {
        let mut quiz = quiz(bank(vec![question(1, "gans")]), 1);
        quiz.next_question(fixed_now()).unwrap();
        quiz.submit_answer("a", fixed_now()).unwrap();

        let first = quiz.finalize(fixed_now()).unwrap().clone();
        let second = quiz.finalize(fixed_now() + Duration::hours(1)).unwrap();
        assert_eq!(&first, second);
        assert!(quiz.next_question(fixed_now()).is_none());
        assert!(matches!(
            quiz.submit_answer("a", fixed_now()),
            Err(QuizError::Session(SessionStateError::Finalized))
        ));
    }
}
