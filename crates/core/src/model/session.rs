use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::ids::{QuestionId, SessionId, UserId};
use crate::model::question::{Difficulty, Domain, Question};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SessionStateError {
    #[error("session already finalized")]
    Finalized,

    #[error("session reached its limit of {limit} questions")]
    LimitReached { limit: u32 },

    #[error("question {0} was already answered in this session")]
    AlreadyAnswered(QuestionId),

    #[error("question limit must be at least 1")]
    ZeroLimit,

    #[error("completed_at is before started_at")]
    InvalidTimeRange,

    #[error("unknown quiz mode: {0}")]
    UnknownMode(String),
}

//
// ─── MODE ──────────────────────────────────────────────────────────────────────
//

/// Length of a quiz attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuizMode {
    /// Short demo run over the bank's demo subset.
    Quick,
    /// Full assessment over the whole bank.
    Full,
}

impl QuizMode {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Quick => "quick",
            Self::Full => "full",
        }
    }
}

impl fmt::Display for QuizMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QuizMode {
    type Err = SessionStateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "quick" | "demo" => Ok(Self::Quick),
            "full" => Ok(Self::Full),
            other => Err(SessionStateError::UnknownMode(other.to_string())),
        }
    }
}

/// Configured question count per mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuizLimits {
    quick: u32,
    full: u32,
}

impl QuizLimits {
    pub const DEFAULT_QUICK: u32 = 10;
    pub const DEFAULT_FULL: u32 = 63;

    /// # Errors
    ///
    /// Returns `SessionStateError::ZeroLimit` if either count is zero.
    pub fn new(quick: u32, full: u32) -> Result<Self, SessionStateError> {
        if quick == 0 || full == 0 {
            return Err(SessionStateError::ZeroLimit);
        }
        Ok(Self { quick, full })
    }

    #[must_use]
    pub fn for_mode(&self, mode: QuizMode) -> u32 {
        match mode {
            QuizMode::Quick => self.quick,
            QuizMode::Full => self.full,
        }
    }
}

impl Default for QuizLimits {
    fn default() -> Self {
        Self {
            quick: Self::DEFAULT_QUICK,
            full: Self::DEFAULT_FULL,
        }
    }
}

//
// ─── ANSWER RECORD ─────────────────────────────────────────────────────────────
//

/// One answered question within a session.
///
/// Domain and difficulty are copied from the question so a persisted session
/// can be re-scored without the bank.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnswerRecord {
    pub question_id: QuestionId,
    pub domain: Domain,
    pub difficulty: Difficulty,
    pub answer: String,
    pub correct: bool,
    pub time_taken: Duration,
    pub answered_at: DateTime<Utc>,
}

impl AnswerRecord {
    /// Score `answer` against `question` and capture the result.
    #[must_use]
    pub fn score(
        question: &Question,
        answer: &str,
        time_taken: Duration,
        answered_at: DateTime<Utc>,
    ) -> Self {
        Self {
            question_id: question.id(),
            domain: question.domain().clone(),
            difficulty: question.difficulty(),
            answer: answer.trim().to_string(),
            correct: question.is_correct(answer),
            time_taken,
            answered_at,
        }
    }
}

//
// ─── SESSION ───────────────────────────────────────────────────────────────────
//

/// A single quiz attempt from start to finalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuizSession {
    id: SessionId,
    user_id: UserId,
    mode: QuizMode,
    question_limit: u32,
    started_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
    answers: Vec<AnswerRecord>,
}

impl QuizSession {
    /// Start a fresh session.
    ///
    /// # Errors
    ///
    /// Returns `SessionStateError::ZeroLimit` if `question_limit` is zero.
    pub fn start(
        id: SessionId,
        user_id: UserId,
        mode: QuizMode,
        question_limit: u32,
        started_at: DateTime<Utc>,
    ) -> Result<Self, SessionStateError> {
        if question_limit == 0 {
            return Err(SessionStateError::ZeroLimit);
        }
        Ok(Self {
            id,
            user_id,
            mode,
            question_limit,
            started_at,
            completed_at: None,
            answers: Vec::new(),
        })
    }

    /// Rehydrate a finalized session from storage.
    ///
    /// # Errors
    ///
    /// Returns `SessionStateError` if the stored answers exceed the limit,
    /// repeat a question, or the time range is inverted.
    pub fn from_persisted(
        id: SessionId,
        user_id: UserId,
        mode: QuizMode,
        question_limit: u32,
        started_at: DateTime<Utc>,
        completed_at: DateTime<Utc>,
        answers: Vec<AnswerRecord>,
    ) -> Result<Self, SessionStateError> {
        let mut session = Self::start(id, user_id, mode, question_limit, started_at)?;
        for answer in answers {
            session.record(answer)?;
        }
        session.finalize(completed_at)?;
        Ok(session)
    }

    #[must_use]
    pub fn id(&self) -> SessionId {
        self.id
    }

    #[must_use]
    pub fn user_id(&self) -> &UserId {
        &self.user_id
    }

    #[must_use]
    pub fn mode(&self) -> QuizMode {
        self.mode
    }

    #[must_use]
    pub fn question_limit(&self) -> u32 {
        self.question_limit
    }

    #[must_use]
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    #[must_use]
    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    #[must_use]
    pub fn answers(&self) -> &[AnswerRecord] {
        &self.answers
    }

    #[must_use]
    pub fn is_finalized(&self) -> bool {
        self.completed_at.is_some()
    }

    #[must_use]
    pub fn is_full(&self) -> bool {
        self.answers.len() >= self.limit_usize()
    }

    #[must_use]
    pub fn has_answered(&self, id: QuestionId) -> bool {
        self.answers.iter().any(|a| a.question_id == id)
    }

    #[must_use]
    pub fn correct_count(&self) -> u32 {
        let correct = self.answers.iter().filter(|a| a.correct).count();
        u32::try_from(correct).unwrap_or(u32::MAX)
    }

    #[must_use]
    pub fn answered_count(&self) -> u32 {
        u32::try_from(self.answers.len()).unwrap_or(u32::MAX)
    }

    /// Append an answer.
    ///
    /// # Errors
    ///
    /// Returns `Finalized`, `LimitReached`, or `AlreadyAnswered`.
    pub fn record(&mut self, answer: AnswerRecord) -> Result<&AnswerRecord, SessionStateError> {
        if self.is_finalized() {
            return Err(SessionStateError::Finalized);
        }
        if self.is_full() {
            return Err(SessionStateError::LimitReached {
                limit: self.question_limit,
            });
        }
        if self.has_answered(answer.question_id) {
            return Err(SessionStateError::AlreadyAnswered(answer.question_id));
        }
        self.answers.push(answer);
        self.answers.last().ok_or(SessionStateError::Finalized)
    }

    /// Close the session. After this the answer list is frozen.
    ///
    /// # Errors
    ///
    /// Returns `Finalized` if already closed, or `InvalidTimeRange`.
    pub fn finalize(&mut self, completed_at: DateTime<Utc>) -> Result<(), SessionStateError> {
        if self.is_finalized() {
            return Err(SessionStateError::Finalized);
        }
        if completed_at < self.started_at {
            return Err(SessionStateError::InvalidTimeRange);
        }
        self.completed_at = Some(completed_at);
        Ok(())
    }

    fn limit_usize(&self) -> usize {
        usize::try_from(self.question_limit).unwrap_or(usize::MAX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_now;

    fn answer(id: u64, domain: &str, correct: bool) -> AnswerRecord {
        AnswerRecord {
            question_id: QuestionId::new(id),
            domain: Domain::new(domain).unwrap(),
            difficulty: Difficulty::Beginner,
            answer: "a".into(),
            correct,
            time_taken: Duration::seconds(3),
            answered_at: fixed_now(),
        }
    }

    fn session(limit: u32) -> QuizSession {
        QuizSession::start(
            SessionId::generate(),
            UserId::new("tester").unwrap(),
            QuizMode::Quick,
            limit,
            fixed_now(),
        )
        .unwrap()
    }

    #[test]
    fn mode_parses_demo_alias() {
        assert_eq!("demo".parse::<QuizMode>().unwrap(), QuizMode::Quick);
        assert_eq!("FULL".parse::<QuizMode>().unwrap(), QuizMode::Full);
        assert!("marathon".parse::<QuizMode>().is_err());
    }

    #[test]
    fn limits_default_and_reject_zero() {
        let limits = QuizLimits::default();
        assert_eq!(limits.for_mode(QuizMode::Quick), 10);
        assert_eq!(limits.for_mode(QuizMode::Full), 63);
        assert!(QuizLimits::new(0, 5).is_err());
    }

    #[test]
    fn record_stops_at_limit() {
        let mut s = session(2);
        s.record(answer(1, "a", true)).unwrap();
        s.record(answer(2, "a", false)).unwrap();
        let err = s.record(answer(3, "a", true)).unwrap_err();
        assert_eq!(err, SessionStateError::LimitReached { limit: 2 });
        assert_eq!(s.answered_count(), 2);
        assert_eq!(s.correct_count(), 1);
    }

    #[test]
    fn record_rejects_repeat_question() {
        let mut s = session(5);
        s.record(answer(1, "a", true)).unwrap();
        let err = s.record(answer(1, "a", true)).unwrap_err();
        assert_eq!(err, SessionStateError::AlreadyAnswered(QuestionId::new(1)));
    }

    #[test]
    fn finalized_session_is_frozen() {
        let mut s = session(5);
        s.finalize(fixed_now()).unwrap();
        assert!(s.is_finalized());
        assert_eq!(
            s.record(answer(1, "a", true)).unwrap_err(),
            SessionStateError::Finalized
        );
        assert_eq!(s.finalize(fixed_now()).unwrap_err(), SessionStateError::Finalized);
    }

    #[test]
    fn finalize_rejects_inverted_range() {
        let mut s = session(5);
        let err = s.finalize(fixed_now() - Duration::seconds(1)).unwrap_err();
        assert_eq!(err, SessionStateError::InvalidTimeRange);
    }

    #[test]
    fn from_persisted_enforces_limit() {
        let err = QuizSession::from_persisted(
            SessionId::generate(),
            UserId::new("tester").unwrap(),
            QuizMode::Quick,
            1,
            fixed_now(),
            fixed_now(),
            vec![answer(1, "a", true), answer(2, "b", true)],
        )
        .unwrap_err();
        assert_eq!(err, SessionStateError::LimitReached { limit: 1 });
    }
}
