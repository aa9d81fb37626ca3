use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::model::ids::SessionId;
use crate::model::question::Domain;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum RecommendationError {
    #[error("recommendation rank must start at 1")]
    ZeroRank,

    #[error("unknown study estimate: {0}")]
    UnknownEstimate(String),
}

/// Rough study time needed to close a gap, banded by accuracy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StudyEstimate {
    ThreeToFourWeeks,
    TwoToThreeWeeks,
    OneToTwoWeeks,
    ThreeToFiveDays,
}

impl StudyEstimate {
    #[must_use]
    pub fn from_accuracy(accuracy: f64) -> Self {
        if accuracy < 0.3 {
            Self::ThreeToFourWeeks
        } else if accuracy < 0.5 {
            Self::TwoToThreeWeeks
        } else if accuracy < 0.7 {
            Self::OneToTwoWeeks
        } else {
            Self::ThreeToFiveDays
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ThreeToFourWeeks => "3-4 weeks",
            Self::TwoToThreeWeeks => "2-3 weeks",
            Self::OneToTwoWeeks => "1-2 weeks",
            Self::ThreeToFiveDays => "3-5 days",
        }
    }
}

impl fmt::Display for StudyEstimate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StudyEstimate {
    type Err = RecommendationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "3-4 weeks" => Ok(Self::ThreeToFourWeeks),
            "2-3 weeks" => Ok(Self::TwoToThreeWeeks),
            "1-2 weeks" => Ok(Self::OneToTwoWeeks),
            "3-5 days" => Ok(Self::ThreeToFiveDays),
            other => Err(RecommendationError::UnknownEstimate(other.to_string())),
        }
    }
}

/// One ranked study suggestion.
#[derive(Debug, Clone, PartialEq)]
pub struct Recommendation {
    pub rank: u32,
    pub domain: Domain,
    pub accuracy_pct: f64,
    pub rationale: String,
    pub resources: Vec<String>,
    pub estimate: StudyEstimate,
    /// Generated advice; `None` when the advice service was unavailable.
    pub advice: Option<String>,
}

impl Recommendation {
    /// Text to show the learner: generated advice when present, rationale otherwise.
    #[must_use]
    pub fn display_text(&self) -> &str {
        self.advice.as_deref().unwrap_or(&self.rationale)
    }
}

/// Ranked recommendations for one finalized session.
#[derive(Debug, Clone, PartialEq)]
pub struct RecommendationResult {
    session_id: SessionId,
    generated_at: DateTime<Utc>,
    items: Vec<Recommendation>,
}

impl RecommendationResult {
    /// # Errors
    ///
    /// Returns `RecommendationError::ZeroRank` if any item has rank 0.
    pub fn new(
        session_id: SessionId,
        generated_at: DateTime<Utc>,
        mut items: Vec<Recommendation>,
    ) -> Result<Self, RecommendationError> {
        if items.iter().any(|item| item.rank == 0) {
            return Err(RecommendationError::ZeroRank);
        }
        items.sort_by_key(|item| item.rank);
        Ok(Self {
            session_id,
            generated_at,
            items,
        })
    }

    #[must_use]
    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    #[must_use]
    pub fn generated_at(&self) -> DateTime<Utc> {
        self.generated_at
    }

    #[must_use]
    pub fn items(&self) -> &[Recommendation] {
        &self.items
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Ranked domains, strongest need first.
    #[must_use]
    pub fn ranked_domains(&self) -> Vec<&Domain> {
        self.items.iter().map(|item| &item.domain).collect()
    }
}
