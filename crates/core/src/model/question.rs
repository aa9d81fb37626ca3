use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::ids::QuestionId;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum QuestionError {
    #[error("domain cannot be empty")]
    EmptyDomain,

    #[error("question {id} has an empty prompt")]
    EmptyPrompt { id: QuestionId },

    #[error("question {id} needs at least two options, got {count}")]
    TooFewOptions { id: QuestionId, count: usize },

    #[error("question {id} has an empty option {key:?}")]
    EmptyOption { id: QuestionId, key: String },

    #[error("question {id}: correct answer {key:?} is not one of the options")]
    UnknownCorrectAnswer { id: QuestionId, key: String },

    #[error("unknown difficulty level: {0}")]
    UnknownDifficulty(String),
}

//
// ─── DOMAIN ────────────────────────────────────────────────────────────────────
//

/// Topical category tag of a question (e.g. `transformers`, `ml_basics`).
///
/// Normalized to trimmed lowercase so `"PyTorch"` and `"pytorch"` compare equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Domain(String);

impl Domain {
    /// Create a normalized domain tag.
    ///
    /// # Errors
    ///
    /// Returns `QuestionError::EmptyDomain` if the name is empty after trimming.
    pub fn new(value: impl Into<String>) -> Result<Self, QuestionError> {
        let raw = value.into();
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(QuestionError::EmptyDomain);
        }
        Ok(Self(trimmed.to_lowercase()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Human-facing label: `generative_ai` becomes `Generative Ai`.
    #[must_use]
    pub fn label(&self) -> String {
        self.0
            .split('_')
            .filter(|part| !part.is_empty())
            .map(|part| {
                let mut chars = part.chars();
                match chars.next() {
                    Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                    None => String::new(),
                }
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl TryFrom<String> for Domain {
    type Error = QuestionError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Domain> for String {
    fn from(value: Domain) -> Self {
        value.0
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

//
// ─── DIFFICULTY ────────────────────────────────────────────────────────────────
//

/// Ordinal difficulty of a question, also used as a learner's performance level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Beginner,
    Intermediate,
    Advanced,
}

impl Difficulty {
    /// Level for an overall accuracy in `[0, 1]`.
    #[must_use]
    pub fn from_accuracy(accuracy: f64) -> Self {
        if accuracy >= 0.8 {
            Self::Advanced
        } else if accuracy >= 0.6 {
            Self::Intermediate
        } else {
            Self::Beginner
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Beginner => "beginner",
            Self::Intermediate => "intermediate",
            Self::Advanced => "advanced",
        }
    }

    /// Ordinal rank starting at 1.
    #[must_use]
    pub fn rank(self) -> u8 {
        match self {
            Self::Beginner => 1,
            Self::Intermediate => 2,
            Self::Advanced => 3,
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Difficulty {
    type Err = QuestionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "beginner" => Ok(Self::Beginner),
            "intermediate" => Ok(Self::Intermediate),
            "advanced" => Ok(Self::Advanced),
            other => Err(QuestionError::UnknownDifficulty(other.to_string())),
        }
    }
}

//
// ─── QUESTION ──────────────────────────────────────────────────────────────────
//

/// Unvalidated question as read from the bank file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionDraft {
    pub id: QuestionId,
    pub domain: Domain,
    pub difficulty: Difficulty,
    pub prompt: String,
    pub options: BTreeMap<String, String>,
    pub correct_answer: String,
    pub explanation: Option<String>,
}

impl QuestionDraft {
    /// Validate prompt, options and the correct-answer key.
    ///
    /// Option keys are normalized to trimmed lowercase. A missing explanation
    /// is replaced by one naming the correct option.
    ///
    /// # Errors
    ///
    /// Returns `QuestionError` describing the first invalid field.
    pub fn validate(self) -> Result<Question, QuestionError> {
        let id = self.id;
        let prompt = self.prompt.trim().to_string();
        if prompt.is_empty() {
            return Err(QuestionError::EmptyPrompt { id });
        }

        let mut options = BTreeMap::new();
        for (key, text) in self.options {
            let key = normalize_key(&key);
            let text = text.trim().to_string();
            if key.is_empty() || text.is_empty() {
                return Err(QuestionError::EmptyOption { id, key });
            }
            options.insert(key, text);
        }
        if options.len() < 2 {
            return Err(QuestionError::TooFewOptions {
                id,
                count: options.len(),
            });
        }

        let correct_answer = normalize_key(&self.correct_answer);
        let Some(correct_text) = options.get(&correct_answer) else {
            return Err(QuestionError::UnknownCorrectAnswer {
                id,
                key: self.correct_answer,
            });
        };

        let explanation = self
            .explanation
            .map(|text| text.trim().to_string())
            .filter(|text| !text.is_empty())
            .unwrap_or_else(|| {
                format!(
                    "This is a core {} concept. The correct answer is '{correct_text}'.",
                    self.domain.label()
                )
            });

        Ok(Question {
            id,
            domain: self.domain,
            difficulty: self.difficulty,
            prompt,
            options,
            correct_answer,
            explanation,
        })
    }
}

/// An immutable, validated quiz question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question {
    id: QuestionId,
    domain: Domain,
    difficulty: Difficulty,
    prompt: String,
    options: BTreeMap<String, String>,
    correct_answer: String,
    explanation: String,
}

impl Question {
    #[must_use]
    pub fn id(&self) -> QuestionId {
        self.id
    }

    #[must_use]
    pub fn domain(&self) -> &Domain {
        &self.domain
    }

    #[must_use]
    pub fn difficulty(&self) -> Difficulty {
        self.difficulty
    }

    #[must_use]
    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    /// Options ordered by key.
    #[must_use]
    pub fn options(&self) -> &BTreeMap<String, String> {
        &self.options
    }

    #[must_use]
    pub fn correct_answer(&self) -> &str {
        &self.correct_answer
    }

    #[must_use]
    pub fn explanation(&self) -> &str {
        &self.explanation
    }

    #[must_use]
    pub fn has_option(&self, key: &str) -> bool {
        self.options.contains_key(&normalize_key(key))
    }

    /// Exact comparison of the given option key against the correct one.
    ///
    /// Surrounding whitespace and letter case are ignored.
    #[must_use]
    pub fn is_correct(&self, answer: &str) -> bool {
        normalize_key(answer) == self.correct_answer
    }
}

/// Scores a single answer against the stored correct key.
#[must_use]
pub fn score_answer(question: &Question, answer: &str) -> bool {
    question.is_correct(answer)
}

pub(crate) fn normalize_key(key: &str) -> String {
    key.trim().to_lowercase()
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
