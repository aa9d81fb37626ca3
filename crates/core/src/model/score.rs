use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::model::ids::{SessionId, UserId};
use crate::model::question::{Difficulty, Domain};
use crate::model::session::{AnswerRecord, QuizMode, QuizSession};

/// Domains scoring below this accuracy are knowledge gaps.
pub const GAP_THRESHOLD: f64 = 0.6;
/// Domains scoring below this accuracy get a recommendation.
pub const REVIEW_THRESHOLD: f64 = 0.7;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ScoreError {
    #[error("score record for {domain} has no answers")]
    EmptyTotal { domain: Domain },

    #[error("score record for {domain}: correct ({correct}) exceeds total ({total})")]
    CorrectExceedsTotal {
        domain: Domain,
        correct: u32,
        total: u32,
    },

    #[error("session is not finalized")]
    NotFinalized,
}

//
// ─── SCORE RECORD ──────────────────────────────────────────────────────────────
//

/// Per-domain accuracy of one session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoreRecord {
    domain: Domain,
    correct: u32,
    total: u32,
}

impl ScoreRecord {
    /// # Errors
    ///
    /// Returns `ScoreError` if `total` is zero or `correct > total`.
    pub fn new(domain: Domain, correct: u32, total: u32) -> Result<Self, ScoreError> {
        if total == 0 {
            return Err(ScoreError::EmptyTotal { domain });
        }
        if correct > total {
            return Err(ScoreError::CorrectExceedsTotal {
                domain,
                correct,
                total,
            });
        }
        Ok(Self {
            domain,
            correct,
            total,
        })
    }

    #[must_use]
    pub fn domain(&self) -> &Domain {
        &self.domain
    }

    #[must_use]
    pub fn correct(&self) -> u32 {
        self.correct
    }

    #[must_use]
    pub fn total(&self) -> u32 {
        self.total
    }

    /// Fraction correct in `[0, 1]`.
    #[must_use]
    pub fn accuracy(&self) -> f64 {
        (f64::from(self.correct) / f64::from(self.total)).clamp(0.0, 1.0)
    }

    /// `100 * correct / total`, clamped to `[0, 100]`.
    #[must_use]
    pub fn percentage(&self) -> f64 {
        (100.0 * self.accuracy()).clamp(0.0, 100.0)
    }
}

/// Aggregate answers into one record per domain, ordered by domain.
///
/// Domains without answers produce no record, so no total is ever zero.
#[must_use]
pub fn aggregate_scores(answers: &[AnswerRecord]) -> Vec<ScoreRecord> {
    let mut per_domain: BTreeMap<&Domain, (u32, u32)> = BTreeMap::new();
    for answer in answers {
        let entry = per_domain.entry(&answer.domain).or_insert((0, 0));
        if answer.correct {
            entry.0 = entry.0.saturating_add(1);
        }
        entry.1 = entry.1.saturating_add(1);
    }

    per_domain
        .into_iter()
        .map(|(domain, (correct, total))| ScoreRecord {
            domain: domain.clone(),
            correct,
            total,
        })
        .collect()
}

//
// ─── SESSION RESULT ────────────────────────────────────────────────────────────
//

/// Finalized outcome of a session: its identity plus per-domain scores.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionResult {
    session_id: SessionId,
    user_id: UserId,
    mode: QuizMode,
    started_at: DateTime<Utc>,
    completed_at: DateTime<Utc>,
    records: Vec<ScoreRecord>,
}

impl SessionResult {
    /// Score a finalized session.
    ///
    /// # Errors
    ///
    /// Returns `ScoreError::NotFinalized` for an open session.
    pub fn from_session(session: &QuizSession) -> Result<Self, ScoreError> {
        let completed_at = session.completed_at().ok_or(ScoreError::NotFinalized)?;
        Ok(Self {
            session_id: session.id(),
            user_id: session.user_id().clone(),
            mode: session.mode(),
            started_at: session.started_at(),
            completed_at,
            records: aggregate_scores(session.answers()),
        })
    }

    /// Rehydrate from persisted parts. Records are re-sorted by domain.
    #[must_use]
    pub fn from_persisted(
        session_id: SessionId,
        user_id: UserId,
        mode: QuizMode,
        started_at: DateTime<Utc>,
        completed_at: DateTime<Utc>,
        mut records: Vec<ScoreRecord>,
    ) -> Self {
        records.sort_by(|a, b| a.domain.cmp(&b.domain));
        Self {
            session_id,
            user_id,
            mode,
            started_at,
            completed_at,
            records,
        }
    }

    #[must_use]
    pub fn session_id(&self) -> SessionId {
        self.session_id
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
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    #[must_use]
    pub fn completed_at(&self) -> DateTime<Utc> {
        self.completed_at
    }

    #[must_use]
    pub fn records(&self) -> &[ScoreRecord] {
        &self.records
    }

    #[must_use]
    pub fn record_for(&self, domain: &Domain) -> Option<&ScoreRecord> {
        self.records.iter().find(|r| &r.domain == domain)
    }

    #[must_use]
    pub fn total_questions(&self) -> u32 {
        self.records.iter().map(ScoreRecord::total).sum()
    }

    #[must_use]
    pub fn correct_answers(&self) -> u32 {
        self.records.iter().map(ScoreRecord::correct).sum()
    }

    /// Overall fraction correct; zero for a session without answers.
    #[must_use]
    pub fn accuracy(&self) -> f64 {
        let total = self.total_questions();
        if total == 0 {
            return 0.0;
        }
        f64::from(self.correct_answers()) / f64::from(total)
    }

    #[must_use]
    pub fn performance_level(&self) -> Difficulty {
        Difficulty::from_accuracy(self.accuracy())
    }

    /// Domains below `GAP_THRESHOLD`, weakest first.
    #[must_use]
    pub fn knowledge_gaps(&self) -> Vec<&Domain> {
        self.weakest_below(GAP_THRESHOLD)
    }

    /// Domains below `REVIEW_THRESHOLD`, weakest first.
    #[must_use]
    pub fn needs_review(&self) -> Vec<&Domain> {
        self.weakest_below(REVIEW_THRESHOLD)
    }

    /// Domains at or above 80%.
    #[must_use]
    pub fn strengths(&self) -> Vec<&Domain> {
        self.records
            .iter()
            .filter(|r| r.accuracy() >= 0.8)
            .map(ScoreRecord::domain)
            .collect()
    }

    fn weakest_below(&self, threshold: f64) -> Vec<&Domain> {
        let mut below: Vec<&ScoreRecord> = self
            .records
            .iter()
            .filter(|r| r.accuracy() < threshold)
            .collect();
        below.sort_by(|a, b| {
            a.accuracy()
                .total_cmp(&b.accuracy())
                .then_with(|| a.domain.cmp(&b.domain))
        });
        below.into_iter().map(ScoreRecord::domain).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ids::QuestionId;
    use crate::time::fixed_now;
    use chrono::Duration;

    fn domain(name: &str) -> Domain {
        Domain::new(name).unwrap()
    }

    fn answer(id: u64, name: &str, correct: bool) -> AnswerRecord {
        AnswerRecord {
            question_id: QuestionId::new(id),
            domain: domain(name),
            difficulty: Difficulty::Intermediate,
            answer: "a".into(),
            correct,
            time_taken: Duration::seconds(1),
            answered_at: fixed_now(),
        }
    }

    #[test]
    fn percentage_matches_formula() {
        let record = ScoreRecord::new(domain("gans"), 3, 5).unwrap();
        assert!((record.percentage() - 60.0).abs() < f64::EPSILON);
        let perfect = ScoreRecord::new(domain("gans"), 4, 4).unwrap();
        assert!((perfect.percentage() - 100.0).abs() < f64::EPSILON);
        let zero = ScoreRecord::new(domain("gans"), 0, 4).unwrap();
        assert_eq!(zero.percentage(), 0.0);
    }

    #[test]
    fn record_rejects_zero_total_and_overflow() {
        assert!(matches!(
            ScoreRecord::new(domain("gans"), 0, 0),
            Err(ScoreError::EmptyTotal { .. })
        ));
        assert!(matches!(
            ScoreRecord::new(domain("gans"), 3, 2),
            Err(ScoreError::CorrectExceedsTotal { .. })
        ));
    }

    #[test]
    fn aggregate_groups_by_domain() {
        let answers = vec![
            answer(1, "pytorch", true),
            answer(2, "gans", false),
            answer(3, "pytorch", false),
            answer(4, "pytorch", true),
        ];
        let records = aggregate_scores(&answers);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].domain().as_str(), "gans");
        assert_eq!((records[0].correct(), records[0].total()), (0, 1));
        assert_eq!((records[1].correct(), records[1].total()), (2, 3));
        assert!(records.iter().all(|r| r.total() > 0));
    }

    #[test]
    fn aggregate_of_nothing_is_empty() {
        assert!(aggregate_scores(&[]).is_empty());
    }

    #[test]
    fn result_derives_gaps_and_level() {
        let result = SessionResult::from_persisted(
            SessionId::generate(),
            UserId::new("u").unwrap(),
            QuizMode::Quick,
            fixed_now(),
            fixed_now(),
            vec![
                ScoreRecord::new(domain("b"), 1, 4).unwrap(),
                ScoreRecord::new(domain("a"), 4, 4).unwrap(),
                ScoreRecord::new(domain("c"), 2, 3).unwrap(),
            ],
        );
        assert_eq!(result.records()[0].domain().as_str(), "a");
        assert_eq!(result.total_questions(), 11);
        assert_eq!(result.correct_answers(), 7);
        assert_eq!(result.performance_level(), Difficulty::Intermediate);
        let gaps: Vec<&str> = result.knowledge_gaps().iter().map(|d| d.as_str()).collect();
        assert_eq!(gaps, vec!["b"]);
        let review: Vec<&str> = result.needs_review().iter().map(|d| d.as_str()).collect();
        assert_eq!(review, vec!["b", "c"]);
        assert_eq!(result.strengths().len(), 1);
    }

    #[test]
    fn open_session_cannot_be_scored() {
        let session = QuizSession::start(
            SessionId::generate(),
            UserId::new("u").unwrap(),
            QuizMode::Full,
            3,
            fixed_now(),
        )
        .unwrap();
        assert_eq!(
            SessionResult::from_session(&session).unwrap_err(),
            ScoreError::NotFinalized
        );
    }
}
